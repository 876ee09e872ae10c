use crate::error::{LauncherError, Result};
use packwright_core::FileCategory;
use std::fs;
use std::path::{Path, PathBuf};

/// Имя файла манифеста внутри директории версии
pub const MANIFEST_FILE_NAME: &str = "manifest.json";
/// Имя файла с выбранными пользователем файлами
pub const SELECTION_FILE_NAME: &str = "files.json";

/// Раскладка директорий лаунчера относительно базовой директории
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherPaths {
    base: PathBuf,
}

impl LauncherPaths {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Создаёт основные директории
    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(self.versions_dir())?;
        fs::create_dir_all(self.cache_dir())?;
        fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }

    pub fn base_dir(&self) -> &Path {
        &self.base
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.base.join("versions")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.base.join("cache")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.base.join("logs")
    }

    // Пути к директориям версий
    pub fn version_root(&self, version: &str) -> Result<PathBuf> {
        validate_version_id(version)?;
        Ok(self.versions_dir().join(version))
    }

    pub fn manifest_file(&self, version: &str) -> Result<PathBuf> {
        Ok(self.version_root(version)?.join(MANIFEST_FILE_NAME))
    }

    pub fn selection_file(&self, version: &str) -> Result<PathBuf> {
        Ok(self.version_root(version)?.join(SELECTION_FILE_NAME))
    }

    pub fn mods_dir(&self, version: &str) -> Result<PathBuf> {
        self.category_dir(version, FileCategory::Mod)
    }

    pub fn resourcepacks_dir(&self, version: &str) -> Result<PathBuf> {
        self.category_dir(version, FileCategory::ResourcePack)
    }

    pub fn category_dir(&self, version: &str, category: FileCategory) -> Result<PathBuf> {
        Ok(self.version_root(version)?.join(category.dir_name()))
    }
}

/// Версия не должна выходить за пределы директории versions
fn validate_version_id(version: &str) -> Result<()> {
    let trimmed = version.trim();
    if trimmed.is_empty()
        || trimmed != version
        || version == "."
        || version == ".."
        || version.contains(['/', '\\', ':'])
    {
        return Err(LauncherError::InvalidConfig(format!(
            "Invalid version id '{}'",
            version
        )));
    }
    Ok(())
}
