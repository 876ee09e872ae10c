//! Кеш скачанных файлов, ключ - SHA-1 исходного URL.
//!
//! Раскладка: `cache/files/<первые 2 hex>/<40 hex>`. Запись идёт через
//! временный файл и rename, недокопированную запись никто не увидит.

use crate::error::Result;
use crate::utils::sha1_hex;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct CacheRepository {
    root: PathBuf,
}

impl CacheRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Путь записи кеша для URL (может не существовать)
    pub fn entry_path(&self, url: &str) -> PathBuf {
        let key = sha1_hex(url);
        self.root.join(&key[..2]).join(&key)
    }

    /// Существующая запись для URL
    pub fn lookup(&self, url: &str) -> Option<PathBuf> {
        let path = self.entry_path(url);
        path.is_file().then_some(path)
    }

    /// Копирует файл в кеш под ключом URL
    pub async fn store(&self, url: &str, source: &Path) -> Result<PathBuf> {
        let entry = self.entry_path(url);
        if let Some(parent) = entry.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = entry.with_extension(format!("tmp-{}", uuid::Uuid::new_v4().simple()));
        if let Err(e) = tokio::fs::copy(source, &tmp).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&tmp, &entry).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        log::debug!("Cached {} as {}", url, entry.display());
        Ok(entry)
    }

    /// Удаляет запись (например, при несовпадении хеша)
    pub async fn invalidate(&self, url: &str) {
        let entry = self.entry_path(url);
        if let Err(e) = tokio::fs::remove_file(&entry).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("Failed to remove cache entry {}: {}", entry.display(), e);
            }
        }
    }
}
