//! CurseForge modpack manifest (`manifest.json`).
//!
//! Entries are rewritten by value: resolution produces new entries and a
//! new manifest via [`Manifest::with_files`], the original is left intact.

use crate::catalog::RemoteFileRecord;
use crate::error::{LauncherError, Result};
use serde::{Deserialize, Serialize};

/// `manifestType` of CurseForge modpacks
pub const MODPACK_MANIFEST_TYPE: &str = "minecraftModpack";

fn default_overrides() -> String {
    "overrides".to_string()
}

fn default_required() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub minecraft: ManifestMinecraft,
    #[serde(rename = "manifestType")]
    pub manifest_type: String,
    #[serde(rename = "manifestVersion", default)]
    pub manifest_version: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default = "default_overrides")]
    pub overrides: String,
    #[serde(default)]
    pub files: Vec<ManifestEntry>,
    /// Unknown keys, kept when the manifest is rewritten
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestMinecraft {
    #[serde(default)]
    pub version: String,
    #[serde(rename = "modLoaders", default)]
    pub mod_loaders: Vec<ModLoader>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModLoader {
    pub id: String,
    #[serde(default)]
    pub primary: bool,
}

/// One mod reference. Identity is `(project_id, file_id)`; `path` is the
/// key used by selections.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawManifestEntry")]
pub struct ManifestEntry {
    #[serde(rename = "projectID")]
    pub project_id: u64,
    #[serde(rename = "fileID")]
    pub file_id: u64,
    pub path: String,
    #[serde(rename = "fileName", skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    pub required: bool,
}

/// Wire form; `path` may be missing in manifests written by CurseForge
#[derive(Deserialize)]
struct RawManifestEntry {
    #[serde(rename = "projectID")]
    project_id: u64,
    #[serde(rename = "fileID")]
    file_id: u64,
    #[serde(default)]
    path: Option<String>,
    #[serde(rename = "fileName", default)]
    file_name: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    sha1: Option<String>,
    #[serde(default = "default_required")]
    required: bool,
}

impl From<RawManifestEntry> for ManifestEntry {
    fn from(raw: RawManifestEntry) -> Self {
        let path = raw
            .path
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| default_entry_path(raw.project_id, raw.file_id));
        Self {
            project_id: raw.project_id,
            file_id: raw.file_id,
            path,
            file_name: raw.file_name.filter(|n| !n.trim().is_empty()),
            url: raw.url.filter(|u| !u.trim().is_empty()),
            sha1: raw.sha1.filter(|h| !h.is_empty()),
            required: raw.required,
        }
    }
}

pub fn default_entry_path(project_id: u64, file_id: u64) -> String {
    format!("{}/{}", project_id, file_id)
}

impl ManifestEntry {
    pub fn new(project_id: u64, file_id: u64) -> Self {
        Self {
            project_id,
            file_id,
            path: default_entry_path(project_id, file_id),
            file_name: None,
            url: None,
            sha1: None,
            required: true,
        }
    }

    pub fn with_name_and_url(mut self, file_name: &str, url: &str) -> Self {
        self.file_name = Some(file_name.to_string());
        self.url = Some(url.to_string());
        self
    }

    pub fn identity(&self) -> (u64, u64) {
        (self.project_id, self.file_id)
    }

    /// Name or URL unknown; only such entries are ever looked up
    pub fn needs_resolution(&self) -> bool {
        self.file_name.is_none() || self.url.is_none()
    }

    /// Copy of this entry with the metadata of `record` filled in
    pub fn with_resolved(&self, record: &RemoteFileRecord) -> Self {
        Self {
            file_name: Some(record.file_name.clone()),
            url: Some(record.url.clone()),
            sha1: record.sha1.clone().or_else(|| self.sha1.clone()),
            ..self.clone()
        }
    }
}

impl Manifest {
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Same manifest with a replaced entry list
    pub fn with_files(&self, files: Vec<ManifestEntry>) -> Self {
        Self {
            files,
            ..self.clone()
        }
    }

    /// Overrides directory inside the archive, with trailing slash
    pub fn overrides_prefix(&self) -> String {
        let dir = self.overrides.trim().trim_matches('/');
        let dir = if dir.is_empty() { "overrides" } else { dir };
        format!("{}/", dir)
    }

    pub fn validate(&self) -> Result<()> {
        if self.manifest_type != MODPACK_MANIFEST_TYPE {
            return Err(LauncherError::InvalidManifest(format!(
                "unsupported manifestType '{}'",
                self.manifest_type
            )));
        }
        Ok(())
    }

    pub fn unresolved_count(&self) -> usize {
        self.files.iter().filter(|f| f.needs_resolution()).count()
    }
}
