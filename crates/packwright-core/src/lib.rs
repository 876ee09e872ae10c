pub mod error;
pub mod types;

// Реэкспорт часто используемых типов
pub use error::{ErrorInfo, LauncherError, Result};
pub use types::{FileCategory, ProgressEvent, CURSEFORGE_RESOURCEPACK_CLASS_ID};
