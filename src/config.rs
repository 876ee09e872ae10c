use crate::download::DownloadConfig;
use crate::error::{LauncherError, Result};
use crate::paths::LauncherPaths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CURSEFORGE_API_BASE: &str = "https://api.curseforge.com/v1";

/// Конфигурация лаунчера: необязательный TOML файл, поверх него
/// переменные окружения.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Домашняя директория: здесь лежат `versions/`, `cache/` и `logs/`
    pub base_dir: Option<PathBuf>,
    pub curseforge: CurseForgeSettings,
    pub concurrency: ConcurrencySettings,
    pub download: DownloadSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CurseForgeSettings {
    pub api_base: String,
    pub api_key: Option<String>,
}

impl Default for CurseForgeSettings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_CURSEFORGE_API_BASE.to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencySettings {
    /// Параллельные запросы к каталогу при разрешении
    pub lookups: usize,
    /// Параллельные загрузки файлов
    pub downloads: usize,
}

impl Default for ConcurrencySettings {
    fn default() -> Self {
        Self {
            lookups: 8,
            downloads: 16,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadSettings {
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub retries: u32,
    pub retry_delay_ms: u64,
    /// Кеш скачанных файлов модов
    pub caching: bool,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        let defaults = DownloadConfig::default();
        Self {
            connect_timeout_secs: defaults.connect_timeout.as_secs(),
            request_timeout_secs: defaults.request_timeout.as_secs(),
            retries: defaults.retries,
            retry_delay_ms: defaults.retry_delay_ms,
            caching: true,
        }
    }
}

impl Config {
    /// Загрузка: TOML файл (если указан и существует), затем переменные окружения
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(path)?;
                let parsed: Config = toml::from_str(&content)?;
                log::debug!("Loaded config from {}", path.display());
                parsed
            }
            Some(path) => {
                log::warn!("Config file {} not found, using defaults", path.display());
                Config::default()
            }
            None => Config::default(),
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(home) = var("PACKWRIGHT_HOME").filter(|v| !v.trim().is_empty()) {
            self.base_dir = Some(PathBuf::from(home));
        }
        if let Some(key) = var("CURSEFORGE_API_KEY").filter(|v| !v.trim().is_empty()) {
            self.curseforge.api_key = Some(key);
        }
        if let Some(base) = var("CURSEFORGE_API_BASE").filter(|v| !v.trim().is_empty()) {
            self.curseforge.api_base = base;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.concurrency.lookups == 0 || self.concurrency.downloads == 0 {
            return Err(LauncherError::InvalidConfig(
                "concurrency limits must be at least 1".to_string(),
            ));
        }
        if !self.curseforge.api_base.starts_with("http://")
            && !self.curseforge.api_base.starts_with("https://")
        {
            return Err(LauncherError::InvalidConfig(format!(
                "curseforge.api_base must be an http(s) URL, got '{}'",
                self.curseforge.api_base
            )));
        }
        Ok(())
    }

    /// Домашняя директория: из конфига или системная директория данных
    pub fn base_dir(&self) -> PathBuf {
        if let Some(dir) = &self.base_dir {
            return dir.clone();
        }
        directories::ProjectDirs::from("", "", "packwright")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".packwright"))
    }

    pub fn paths(&self) -> LauncherPaths {
        LauncherPaths::new(self.base_dir())
    }

    pub fn download_config(&self) -> DownloadConfig {
        DownloadConfig {
            connect_timeout: Duration::from_secs(self.download.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.download.request_timeout_secs),
            retries: self.download.retries,
            retry_delay_ms: self.download.retry_delay_ms,
        }
    }
}
