//! Remote catalog of mod projects and files.
//!
//! The completion engine only needs two lookups, file metadata by
//! `(project, file)` and project metadata by `project`, and it must be able
//! to tell "does not exist upstream" apart from "could not ask right now".

pub mod cache;
pub mod curseforge;

pub use curseforge::CurseForgeCatalog;

use crate::error::LauncherError;
use async_trait::async_trait;
use packwright_core::FileCategory;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Outcome of a failed catalog lookup
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// Project or file was deleted/unpublished
    #[error("not found in catalog: {0}")]
    NotFound(String),
    /// Network, server or decoding failure; may succeed later
    #[error("catalog lookup failed: {0}")]
    Transient(String),
}

impl CatalogError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CatalogError::NotFound(_))
    }
}

impl From<CatalogError> for LauncherError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(what) => LauncherError::NotFound(what),
            CatalogError::Transient(msg) => LauncherError::ApiError(msg),
        }
    }
}

/// Metadata of one downloadable file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFileRecord {
    pub file_name: String,
    pub url: String,
    /// Class of the owning project, when the catalog reports it with the file
    pub parent_project_class: Option<u32>,
    pub sha1: Option<String>,
    pub file_length: u64,
}

/// Metadata of a project, used for classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: u64,
    pub name: String,
    pub class_id: Option<u32>,
}

impl ProjectRecord {
    pub fn category(&self) -> FileCategory {
        self.class_id
            .map(FileCategory::from_class_id)
            .unwrap_or(FileCategory::Mod)
    }
}

#[async_trait]
pub trait RemoteCatalog: Send + Sync {
    async fn lookup_file(
        &self,
        project_id: u64,
        file_id: u64,
    ) -> Result<RemoteFileRecord, CatalogError>;

    async fn lookup_project(&self, project_id: u64) -> Result<ProjectRecord, CatalogError>;
}
