use serde::Serialize;
use thiserror::Error;

/// Информация об ошибке с подсказкой для восстановления
#[derive(Debug, Clone, Serialize)]
pub struct ErrorInfo {
    /// Код ошибки для идентификации
    pub code: String,
    /// Человекочитаемое сообщение
    pub message: String,
    /// Подсказка для исправления
    pub recovery_hint: Option<String>,
    /// Технические детали (для логов)
    pub details: Option<String>,
}

impl ErrorInfo {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            recovery_hint: None,
            details: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.recovery_hint = Some(hint.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

#[derive(Error, Debug)]
pub enum LauncherError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Config parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Мод или файл удалён из каталога; повтор не поможет
    #[error("Modpack manifest is incomplete, resource no longer exists upstream: {0}")]
    ResourceGone(String),

    /// Не удалось получить метаданные; повторный запуск запросит их снова
    #[error("Modpack manifest is incomplete, metadata could not be resolved: {0}")]
    ResolutionIncomplete(String),

    #[error("Modpack is incomplete: {failed} of {total} file(s) failed to download")]
    DownloadIncomplete { failed: usize, total: usize },

    /// В архиве нет манифеста; можно только скопировать файлы как есть
    #[error("Archive is a manually created modpack: {0}")]
    ManuallyCreatedArchive(String),

    #[error("Invalid modpack manifest: {0}")]
    InvalidManifest(String),

    #[error("Version already exists: {0}")]
    VersionExists(String),

    #[error("File hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Dependency task failed: {0}")]
    DependencyFailed(String),

    #[error("Join error: {0}")]
    Join(String),

    #[error("Operation cancelled")]
    OperationCancelled,

    #[error("Not found: {0}")]
    NotFound(String),
}

impl LauncherError {
    /// Можно ли повторить операцию без вмешательства пользователя
    pub fn is_retryable(&self) -> bool {
        match self {
            LauncherError::ResolutionIncomplete(_)
            | LauncherError::DownloadIncomplete { .. }
            | LauncherError::DownloadFailed(_)
            | LauncherError::Http(_)
            | LauncherError::ApiError(_)
            | LauncherError::DependencyFailed(_) => true,
            LauncherError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }

    /// Ошибка завершения модпака (любой из трёх видов)
    pub fn is_completion_failure(&self) -> bool {
        matches!(
            self,
            LauncherError::ResourceGone(_)
                | LauncherError::ResolutionIncomplete(_)
                | LauncherError::DownloadIncomplete { .. }
        )
    }

    /// Возвращает информацию об ошибке с подсказкой для восстановления
    pub fn to_error_info(&self) -> ErrorInfo {
        match self {
            LauncherError::Io(e) => {
                let hint = if e.kind() == std::io::ErrorKind::PermissionDenied {
                    "Check access permissions to the launcher folder"
                } else if e.kind() == std::io::ErrorKind::NotFound {
                    "File or folder not found. Try reinstalling the version"
                } else {
                    "Ensure the launcher folder is accessible and not locked by another process"
                };
                ErrorInfo::new("IO_ERROR", format!("Filesystem error: {}", e.kind()))
                    .with_hint(hint)
                    .with_details(e.to_string())
            }
            LauncherError::Http(e) => {
                let (message, hint) = if e.is_timeout() {
                    ("Server timeout", "Check your internet connection and try again")
                } else if e.is_connect() {
                    ("Failed to connect to server", "Check your internet connection. The server might be temporarily unavailable")
                } else if e.status().map(|s| s.as_u16()) == Some(429) {
                    ("Rate limit exceeded", "Wait a minute and try again")
                } else if e.status().map(|s| s.as_u16()) == Some(404) {
                    ("Resource not found", "The mod or modpack may have been deleted")
                } else {
                    ("Network error", "Check your internet connection")
                };
                ErrorInfo::new("HTTP_ERROR", message)
                    .with_hint(hint)
                    .with_details(e.to_string())
            }
            LauncherError::Json(e) => ErrorInfo::new("JSON_ERROR", "Data processing error")
                .with_hint("The file may be corrupted or the API may have changed")
                .with_details(e.to_string()),
            LauncherError::Zip(e) => ErrorInfo::new("ZIP_ERROR", "ZIP archive error")
                .with_hint("The archive may be corrupted. Try downloading it again")
                .with_details(e.to_string()),
            LauncherError::Toml(e) => ErrorInfo::new("CONFIG_PARSE_ERROR", "Config file is not valid TOML")
                .with_hint("Fix the config file or remove it to use defaults")
                .with_details(e.to_string()),
            LauncherError::ResourceGone(msg) => ErrorInfo::new(
                "MODPACK_RESOURCE_GONE",
                "Some mods referenced by the modpack no longer exist on CurseForge",
            )
            .with_hint("Edit the modpack manifest to remove the missing mods, or accept the gap. Retrying will not help")
            .with_details(msg.clone()),
            LauncherError::ResolutionIncomplete(msg) => ErrorInfo::new(
                "MODPACK_INCOMPLETE",
                "Modpack is incomplete: mod information could not be fetched",
            )
            .with_hint("Check your internet connection and run completion again. Already resolved mods will not be queried again")
            .with_details(msg.clone()),
            LauncherError::DownloadIncomplete { failed, total } => ErrorInfo::new(
                "MODPACK_INCOMPLETE",
                format!("Modpack is incomplete: {} of {} file(s) failed to download", failed, total),
            )
            .with_hint("Run completion again. Files that were already downloaded will be skipped"),
            LauncherError::ManuallyCreatedArchive(msg) => ErrorInfo::new(
                "MANUALLY_CREATED_MODPACK",
                "This archive is not a manifest-based modpack",
            )
            .with_hint("It can still be installed by copying its files as-is; mods will not be downloaded or verified")
            .with_details(msg.clone()),
            LauncherError::InvalidManifest(msg) => ErrorInfo::new("INVALID_MANIFEST", "Invalid modpack manifest")
                .with_hint("The modpack may be corrupted or made for another launcher")
                .with_details(msg.clone()),
            LauncherError::VersionExists(name) => ErrorInfo::new("VERSION_EXISTS", format!("Version '{}' already exists", name))
                .with_hint("Choose another name or remove the existing version first"),
            LauncherError::HashMismatch { expected, actual } => ErrorInfo::new("HASH_MISMATCH", "File hash mismatch")
                .with_hint("The file may have been corrupted during download. Try downloading again")
                .with_details(format!("Expected: {}, got: {}", expected, actual)),
            LauncherError::InvalidConfig(msg) => ErrorInfo::new("INVALID_CONFIG", "Invalid configuration")
                .with_hint("Check launcher settings")
                .with_details(msg.clone()),
            LauncherError::DownloadFailed(msg) => ErrorInfo::new("DOWNLOAD_FAILED", "Download failed")
                .with_hint("Check your internet connection and try again")
                .with_details(msg.clone()),
            LauncherError::ApiError(msg) => ErrorInfo::new("API_ERROR", "API error")
                .with_hint("The service may be temporarily unavailable. Try again later")
                .with_details(msg.clone()),
            LauncherError::DependencyFailed(msg) => ErrorInfo::new("TASK_DEPENDENCY_FAILED", "A required step failed")
                .with_details(msg.clone()),
            LauncherError::Join(msg) => ErrorInfo::new("TASK_ERROR", "Task execution error")
                .with_details(msg.clone()),
            LauncherError::OperationCancelled => ErrorInfo::new("CANCELLED", "Operation cancelled"),
            LauncherError::NotFound(msg) => ErrorInfo::new("NOT_FOUND", "Resource not found")
                .with_details(msg.clone()),
        }
    }
}

impl From<tokio::task::JoinError> for LauncherError {
    fn from(err: tokio::task::JoinError) -> Self {
        LauncherError::Join(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LauncherError>;

impl serde::Serialize for LauncherError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        // Сериализуем как ErrorInfo для более полной информации
        self.to_error_info().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_gone_not_retryable() {
        let err = LauncherError::ResourceGone("project 1 file 10".to_string());
        assert!(!err.is_retryable());
        assert!(err.is_completion_failure());
        assert_eq!(err.to_error_info().code, "MODPACK_RESOURCE_GONE");
    }

    #[test]
    fn test_incomplete_errors_retryable() {
        let resolution = LauncherError::ResolutionIncomplete("timeout".to_string());
        let download = LauncherError::DownloadIncomplete { failed: 1, total: 3 };
        assert!(resolution.is_retryable());
        assert!(download.is_retryable());
        assert_eq!(resolution.to_error_info().code, "MODPACK_INCOMPLETE");
        assert_eq!(download.to_error_info().code, "MODPACK_INCOMPLETE");
    }

    #[test]
    fn test_serialize_as_error_info() {
        let err = LauncherError::OperationCancelled;
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "CANCELLED");
        assert!(json["recovery_hint"].is_null());
    }
}
