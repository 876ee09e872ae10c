use serde::{Deserialize, Serialize};

/// ID класса ресурспаков в CurseForge
pub const CURSEFORGE_RESOURCEPACK_CLASS_ID: u32 = 12;

/// Куда попадает скачанный файл модпака внутри директории версии
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    #[default]
    Mod,
    ResourcePack,
}

impl FileCategory {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Mod => "mod",
            Self::ResourcePack => "resourcepack",
        }
    }

    /// Категория по ID класса проекта CurseForge. Всё, что не ресурспак,
    /// ставится как мод.
    pub fn from_class_id(class_id: u32) -> Self {
        if class_id == CURSEFORGE_RESOURCEPACK_CLASS_ID {
            Self::ResourcePack
        } else {
            Self::Mod
        }
    }

    /// Имя поддиректории в директории версии
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Mod => "mods",
            Self::ResourcePack => "resourcepacks",
        }
    }
}

/// Прогресс операции: `current` из `total` для этапа `stage`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub operation_id: String,
    pub stage: String,
    pub current: u32,
    pub total: u32,
}

impl ProgressEvent {
    pub fn percentage(&self) -> f32 {
        if self.total == 0 {
            100.0
        } else {
            (self.current as f32 / self.total as f32 * 100.0).clamp(0.0, 100.0)
        }
    }
}
