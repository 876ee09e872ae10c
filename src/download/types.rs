//! Типы данных для загрузчика

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Конфигурация загрузок
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Таймаут соединения
    pub connect_timeout: Duration,
    /// Общий таймаут запроса
    pub request_timeout: Duration,
    /// Повторы при сетевых ошибках (не для HTTP статусов)
    pub retries: u32,
    /// Базовая задержка между retry (ms), удваивается на каждой попытке
    pub retry_delay_ms: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            retries: 2,
            retry_delay_ms: 500,
        }
    }
}

impl DownloadConfig {
    /// Задержка перед попыткой `attempt` (с нуля)
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_delay_ms.saturating_mul(1u64 << attempt.min(6)))
    }
}

/// One file to materialize: `source_url` → `target_path`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadUnit {
    pub source_url: String,
    pub target_path: PathBuf,
    pub caching_enabled: bool,
    pub expected_sha1: Option<String>,
}

impl DownloadUnit {
    pub fn new(source_url: impl Into<String>, target_path: impl Into<PathBuf>) -> Self {
        Self {
            source_url: source_url.into(),
            target_path: target_path.into(),
            caching_enabled: false,
            expected_sha1: None,
        }
    }

    pub fn with_caching(mut self, enabled: bool) -> Self {
        self.caching_enabled = enabled;
        self
    }

    pub fn with_sha1(mut self, sha1: Option<String>) -> Self {
        self.expected_sha1 = sha1.filter(|h| !h.is_empty());
        self
    }

    /// Имя целевого файла (для логов)
    pub fn display_name(&self) -> String {
        self.target_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source_url.clone())
    }

    /// `<цель>.part`
    pub fn part_path(&self) -> PathBuf {
        part_path(&self.target_path)
    }
}

/// Путь для частично загруженного файла
pub fn part_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}

/// Как был получен файл
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Скопирован из кеша, без сети
    Cached,
    /// Скачан
    Fetched { bytes: u64 },
}
