use super::archive::{extract_all, extract_overrides, read_modpack_archive};
use super::completion::{CompletionEnv, CompletionTask};
use super::selection::SelectionSet;
use crate::error::{LauncherError, Result};
use std::path::{Path, PathBuf};

/// Install a modpack archive as a new version
#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub archive: PathBuf,
    /// Version name to create
    pub name: String,
    /// Entries to install; `None` selects all of them
    pub selection: Option<SelectionSet>,
}

/// Version directory being populated by an import. Removed on drop unless
/// the import got to `keep`, so a failed import can simply be retried.
struct PendingVersion {
    root: PathBuf,
    armed: bool,
}

impl PendingVersion {
    fn root(&self) -> &Path {
        &self.root
    }

    fn keep(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingVersion {
    fn drop(&mut self) {
        if self.armed {
            match std::fs::remove_dir_all(&self.root) {
                Ok(()) => log::debug!("Removed unfinished version {}", self.root.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("Failed to remove {}: {}", self.root.display(), e),
            }
        }
    }
}

/// Creates the version directory, or fails if a non-empty one exists
async fn prepare_version_root(env: &CompletionEnv, name: &str) -> Result<PendingVersion> {
    let root = env.paths.version_root(name)?;
    if root.exists() {
        let mut entries = tokio::fs::read_dir(&root).await?;
        if entries.next_entry().await?.is_some() {
            return Err(LauncherError::VersionExists(name.to_string()));
        }
    }
    tokio::fs::create_dir_all(&root).await?;
    Ok(PendingVersion { root, armed: true })
}

/// Unpack overrides, persist manifest and selection, and return the
/// completion task that will download the mods.
pub async fn install_modpack(env: &CompletionEnv, request: ImportRequest) -> Result<CompletionTask> {
    let archive = read_modpack_archive(&request.archive).await?;
    let manifest = archive.manifest;

    let pending = prepare_version_root(env, &request.name).await?;
    let written =
        extract_overrides(&request.archive, &manifest.overrides_prefix(), pending.root()).await?;
    log::info!(
        "Installing '{}' as '{}': {} override file(s) extracted",
        manifest.name,
        request.name,
        written
    );

    let selection = request
        .selection
        .map(|s| s.retain_known(&manifest))
        .unwrap_or_else(|| SelectionSet::all_of(&manifest));

    let store = env.manifest_store();
    store.save_manifest(&request.name, &manifest)?;
    store.save_selection(&request.name, &selection)?;

    let task = CompletionTask::new(env, &request.name, Some(manifest), Some(selection))?;
    pending.keep();
    Ok(task)
}

/// Install an archive without a manifest by copying its files as-is
pub async fn install_manual_archive(env: &CompletionEnv, archive: &Path, name: &str) -> Result<usize> {
    let pending = prepare_version_root(env, name).await?;
    let written = extract_all(archive, pending.root()).await?;
    pending.keep();
    log::info!("Copied {} file(s) from {} into '{}'", written, archive.display(), name);
    Ok(written)
}
