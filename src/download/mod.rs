//! Загрузчик файлов модпака
//!
//! - `types.rs` - DownloadConfig, DownloadUnit, DownloadOutcome
//! - `cache.rs` - CacheRepository (контентный кеш по URL)
//! - `mod.rs` - Fetcher/HttpFetcher, Downloader, DownloadTask
//!
//! ```rust,ignore
//! let downloader = Downloader::http(DownloadConfig::default(), Some(cache))?;
//! let unit = DownloadUnit::new(url, mods_dir.join("jei.jar")).with_caching(true);
//! downloader.download(&unit, &cancel_token).await?;
//! ```

pub mod cache;
pub mod types;

pub use cache::CacheRepository;
pub use types::{part_path, DownloadConfig, DownloadOutcome, DownloadUnit};

use crate::error::{LauncherError, Result};
use crate::task::{Task, TaskContext};
use crate::utils::calculate_sha1;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Перекачивает содержимое URL в локальный файл
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Записывает тело `url` в `destination` (с обрезкой) и
    /// возвращает количество записанных байт
    async fn fetch(&self, url: &str, destination: &Path, cancel: &CancellationToken)
        -> Result<u64>;
}

/// Потоковая загрузка через reqwest
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &DownloadConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(crate::USER_AGENT)
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| {
                LauncherError::InvalidConfig(format!("Failed to create HTTP client: {}", e))
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(
        &self,
        url: &str,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LauncherError::OperationCancelled),
            result = self.client.get(url).send() => result?,
        };

        let status = response.status();
        if !status.is_success() {
            log::error!("HTTP {} for URL: {}", status, url);
            return Err(LauncherError::DownloadFailed(format!("HTTP {}: {}", status, url)));
        }

        let mut file = File::create(destination).map_err(|e| {
            log::error!("Failed to create file {}: {}", destination.display(), e);
            LauncherError::Io(e)
        })?;

        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;
        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(LauncherError::OperationCancelled),
                chunk = stream.next() => chunk,
            };
            match chunk {
                Some(Ok(bytes)) => {
                    file.write_all(&bytes)?;
                    downloaded += bytes.len() as u64;
                }
                Some(Err(e)) => {
                    log::warn!("Stream error for {} after {} bytes: {}", url, downloaded, e);
                    return Err(LauncherError::Http(e));
                }
                None => break,
            }
        }

        file.flush()?;
        Ok(downloaded)
    }
}

/// Удаляет `.part` файл, если не разоружён после успешного rename
struct PartialFile {
    path: PathBuf,
    armed: bool,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.armed {
            match std::fs::remove_file(&self.path) {
                Ok(()) => log::debug!("Removed partial file {}", self.path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("Failed to remove {}: {}", self.path.display(), e),
            }
        }
    }
}

/// Ошибки соединения, которые имеет смысл повторить
fn is_connection_failure(error: &LauncherError) -> bool {
    match error {
        LauncherError::Http(e) => !e.is_status(),
        LauncherError::Io(e) => matches!(
            e.kind(),
            std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::TimedOut
                | std::io::ErrorKind::UnexpectedEof
                | std::io::ErrorKind::Interrupted
        ),
        _ => false,
    }
}

/// Выполняет [`DownloadUnit`]: поиск в кеше, загрузка в `.part`, проверка
/// хеша, сохранение в кеш, rename на целевой путь.
pub struct Downloader {
    fetcher: Arc<dyn Fetcher>,
    cache: Option<CacheRepository>,
    config: DownloadConfig,
}

impl Downloader {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        cache: Option<CacheRepository>,
        config: DownloadConfig,
    ) -> Self {
        Self {
            fetcher,
            cache,
            config,
        }
    }

    /// Загрузчик поверх HTTP
    pub fn http(config: DownloadConfig, cache: Option<CacheRepository>) -> Result<Self> {
        let fetcher = HttpFetcher::new(&config)?;
        Ok(Self::new(Arc::new(fetcher), cache, config))
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    pub fn cache(&self) -> Option<&CacheRepository> {
        self.cache.as_ref()
    }

    pub async fn download(
        &self,
        unit: &DownloadUnit,
        cancel: &CancellationToken,
    ) -> Result<DownloadOutcome> {
        if cancel.is_cancelled() {
            return Err(LauncherError::OperationCancelled);
        }

        let name = unit.display_name();
        if let Some(parent) = unit.target_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let cache = self.cache.as_ref().filter(|_| unit.caching_enabled);
        if let Some(cache) = cache {
            if self.restore_from_cache(cache, unit).await? {
                log::info!("Restored '{}' from cache", name);
                return Ok(DownloadOutcome::Cached);
            }
        }

        let partial = PartialFile::new(unit.part_path());
        let start_time = Instant::now();
        log::info!("Downloading {} from {}", name, unit.source_url);

        let bytes = self.fetch_with_retries(unit, partial.path(), cancel).await?;

        if let Some(expected) = &unit.expected_sha1 {
            let part = partial.path().to_path_buf();
            let actual = tokio::task::spawn_blocking(move || calculate_sha1(&part)).await??;
            if !actual.eq_ignore_ascii_case(expected) {
                log::error!("Hash mismatch for {} - partial file removed", name);
                return Err(LauncherError::HashMismatch {
                    expected: expected.clone(),
                    actual,
                });
            }
            log::debug!("Hash verified for {}", name);
        }

        if let Some(cache) = cache {
            // Кеш необязателен, файл всё равно ставим
            if let Err(e) = cache.store(&unit.source_url, partial.path()).await {
                log::warn!("Failed to cache {}: {}", name, e);
            }
        }

        tokio::fs::rename(partial.path(), &unit.target_path)
            .await
            .map_err(|e| {
                log::error!(
                    "Failed to rename {} to {}: {}",
                    partial.path().display(),
                    unit.target_path.display(),
                    e
                );
                LauncherError::Io(e)
            })?;
        partial.disarm();

        log::info!(
            "Downloaded '{}' ({}) in {:.1}s",
            name,
            crate::utils::format_bytes(bytes),
            start_time.elapsed().as_secs_f64()
        );
        Ok(DownloadOutcome::Fetched { bytes })
    }

    async fn fetch_with_retries(
        &self,
        unit: &DownloadUnit,
        part: &Path,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        let mut attempt = 0;
        loop {
            match self.fetcher.fetch(&unit.source_url, part, cancel).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) if attempt < self.config.retries && is_connection_failure(&e) => {
                    let delay = self.config.retry_delay(attempt);
                    attempt += 1;
                    log::warn!(
                        "Download of {} failed: {}, retry {}/{} in {}ms",
                        unit.source_url,
                        e,
                        attempt,
                        self.config.retries,
                        delay.as_millis()
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(LauncherError::OperationCancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Копирует файл из кеша. false при промахе или битой записи.
    async fn restore_from_cache(&self, cache: &CacheRepository, unit: &DownloadUnit) -> Result<bool> {
        let Some(entry) = cache.lookup(&unit.source_url) else {
            return Ok(false);
        };

        if let Some(expected) = &unit.expected_sha1 {
            let entry_path = entry.clone();
            let actual = tokio::task::spawn_blocking(move || calculate_sha1(&entry_path)).await??;
            if !actual.eq_ignore_ascii_case(expected) {
                log::warn!(
                    "Cache entry for {} has wrong hash, downloading again",
                    unit.source_url
                );
                cache.invalidate(&unit.source_url).await;
                return Ok(false);
            }
        }

        let partial = PartialFile::new(unit.part_path());
        tokio::fs::copy(&entry, partial.path()).await?;
        tokio::fs::rename(partial.path(), &unit.target_path).await?;
        partial.disarm();
        Ok(true)
    }
}

/// Узел планировщика для одного [`DownloadUnit`]
pub struct DownloadTask {
    unit: DownloadUnit,
    downloader: Arc<Downloader>,
}

impl DownloadTask {
    pub fn new(unit: DownloadUnit, downloader: Arc<Downloader>) -> Self {
        Self { unit, downloader }
    }

    pub fn unit(&self) -> &DownloadUnit {
        &self.unit
    }
}

#[async_trait]
impl Task for DownloadTask {
    fn name(&self) -> String {
        format!("download {}", self.unit.display_name())
    }

    async fn execute(&mut self, ctx: &TaskContext) -> Result<()> {
        self.downloader.download(&self.unit, &ctx.cancel).await?;
        Ok(())
    }
}
