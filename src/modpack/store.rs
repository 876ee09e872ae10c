use super::manifest::Manifest;
use super::selection::SelectionSet;
use crate::error::Result;
use crate::paths::LauncherPaths;
use crate::utils::atomic_write;
use std::path::Path;

/// `manifest.json` and `files.json` of a version
#[derive(Debug, Clone)]
pub struct ManifestStore {
    paths: LauncherPaths,
}

impl ManifestStore {
    pub fn new(paths: LauncherPaths) -> Self {
        Self { paths }
    }

    /// `None` when the version has no manifest. An unreadable manifest is
    /// logged and treated the same way.
    pub fn load_manifest(&self, version: &str) -> Result<Option<Manifest>> {
        let path = self.paths.manifest_file(version)?;
        Ok(read_json(&path, "modpack manifest"))
    }

    /// `None` when no selection was persisted
    pub fn load_selection(&self, version: &str) -> Result<Option<SelectionSet>> {
        let path = self.paths.selection_file(version)?;
        Ok(read_json(&path, "modpack file selection"))
    }

    pub fn save_manifest(&self, version: &str, manifest: &Manifest) -> Result<()> {
        let path = self.paths.manifest_file(version)?;
        atomic_write(&path, manifest.to_json()?.as_bytes())?;
        log::debug!("Saved manifest to {}", path.display());
        Ok(())
    }

    pub fn save_selection(&self, version: &str, selection: &SelectionSet) -> Result<()> {
        let path = self.paths.selection_file(version)?;
        atomic_write(&path, serde_json::to_string_pretty(selection)?.as_bytes())?;
        log::debug!("Saved selection ({} files) to {}", selection.len(), path.display());
        Ok(())
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Option<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            log::warn!("Unable to read {} {}: {}", what, path.display(), e);
            return None;
        }
    };

    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!("Unable to parse {} {}: {}", what, path.display(), e);
            None
        }
    }
}
