use crate::error::{LauncherError, Result};
use crate::paths::LauncherPaths;
use packwright_core::FileCategory;
use std::path::PathBuf;

/// Суффикс выключенного мода
pub const DISABLED_SUFFIX: &str = ".disabled";

/// Только чтение: какие файлы уже установлены в версию
#[derive(Debug, Clone)]
pub struct LocalModStore {
    paths: LauncherPaths,
}

impl LocalModStore {
    pub fn new(paths: LauncherPaths) -> Self {
        Self { paths }
    }

    /// Куда ложится файл `file_name` категории `category`
    pub fn target_path_for(
        &self,
        version: &str,
        category: FileCategory,
        file_name: &str,
    ) -> Result<PathBuf> {
        validate_file_name(file_name)?;
        Ok(self.paths.category_dir(version, category)?.join(file_name))
    }

    /// Есть ли файл? Мод считается установленным и в отключённом виде,
    /// чтобы отключённый мод не скачивался заново.
    pub fn exists(&self, version: &str, category: FileCategory, file_name: &str) -> bool {
        let Ok(target) = self.target_path_for(version, category, file_name) else {
            return false;
        };
        if target.is_file() {
            return true;
        }
        match category {
            FileCategory::Mod => {
                let mut disabled = target.into_os_string();
                disabled.push(DISABLED_SUFFIX);
                PathBuf::from(disabled).is_file()
            }
            FileCategory::ResourcePack => false,
        }
    }
}

/// Имя файла из каталога не должно выходить за пределы директории
fn validate_file_name(file_name: &str) -> Result<()> {
    if file_name.is_empty()
        || file_name == "."
        || file_name == ".."
        || file_name.contains(['/', '\\', '\0'])
    {
        return Err(LauncherError::InvalidManifest(format!(
            "invalid file name '{}'",
            file_name
        )));
    }
    Ok(())
}
