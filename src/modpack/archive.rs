//! Reading CurseForge modpack archives (`.zip` with `manifest.json`).

use super::manifest::{Manifest, MODPACK_MANIFEST_TYPE};
use crate::error::{LauncherError, Result};
use crate::paths::MANIFEST_FILE_NAME;
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

/// Parsed modpack archive
#[derive(Debug, Clone)]
pub struct ModpackArchive {
    pub path: PathBuf,
    pub manifest: Manifest,
    /// Files under the overrides directory
    pub override_count: usize,
}

/// Open the archive and read its manifest. Archives without a recognizable
/// CurseForge manifest fail with [`LauncherError::ManuallyCreatedArchive`]:
/// such packs can only be installed by copying their files as-is.
pub async fn read_modpack_archive(archive_path: &Path) -> Result<ModpackArchive> {
    let path = archive_path.to_owned();

    tokio::task::spawn_blocking(move || {
        let file = File::open(&path)?;
        let mut archive = zip::ZipArchive::new(file)?;

        let contents = match archive.by_name(MANIFEST_FILE_NAME) {
            Ok(mut entry) => {
                let mut contents = String::new();
                entry.read_to_string(&mut contents)?;
                contents
            }
            Err(zip::result::ZipError::FileNotFound) => {
                log::info!("No {} in {}", MANIFEST_FILE_NAME, path.display());
                return Err(LauncherError::ManuallyCreatedArchive(path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let manifest = match Manifest::from_json(&contents) {
            Ok(m) if m.manifest_type == MODPACK_MANIFEST_TYPE => m,
            Ok(m) => {
                log::warn!(
                    "{} in {} has manifestType '{}', not a CurseForge modpack",
                    MANIFEST_FILE_NAME,
                    path.display(),
                    m.manifest_type
                );
                return Err(LauncherError::ManuallyCreatedArchive(path.display().to_string()));
            }
            Err(e) => {
                log::warn!("Unable to parse {} in {}: {}", MANIFEST_FILE_NAME, path.display(), e);
                return Err(LauncherError::ManuallyCreatedArchive(path.display().to_string()));
            }
        };

        let prefix = PathBuf::from(manifest.overrides_prefix().trim_end_matches('/'));
        let mut override_count = 0;
        for i in 0..archive.len() {
            let entry = archive.by_index(i)?;
            if entry.is_file()
                && entry
                    .enclosed_name()
                    .is_some_and(|name| name.starts_with(&prefix))
            {
                override_count += 1;
            }
        }

        log::info!(
            "Read modpack '{}' {} ({} files, {} overrides)",
            manifest.name,
            manifest.version,
            manifest.files.len(),
            override_count
        );

        Ok(ModpackArchive {
            path,
            manifest,
            override_count,
        })
    })
    .await?
}

/// Extract everything under `prefix` (e.g. `overrides/`) into `destination`.
/// Returns the number of files written.
pub async fn extract_overrides(archive_path: &Path, prefix: &str, destination: &Path) -> Result<usize> {
    let prefix = PathBuf::from(prefix.trim_matches('/'));
    extract_with(archive_path, destination, move |name| {
        name.strip_prefix(&prefix).ok().map(Path::to_path_buf)
    })
    .await
}

/// Extract all files as-is. A single directory shared by every entry is
/// stripped, since hand-made archives are often zipped from the parent.
pub async fn extract_all(archive_path: &Path, destination: &Path) -> Result<usize> {
    let root = shared_root(archive_path).await?;
    if let Some(root) = &root {
        log::debug!("Stripping shared directory '{}'", root.display());
    }
    extract_with(archive_path, destination, move |name| match &root {
        Some(root) => name.strip_prefix(root).ok().map(Path::to_path_buf),
        None => Some(name.to_path_buf()),
    })
    .await
}

async fn shared_root(archive_path: &Path) -> Result<Option<PathBuf>> {
    let path = archive_path.to_owned();

    tokio::task::spawn_blocking(move || {
        let mut archive = zip::ZipArchive::new(File::open(&path)?)?;
        let mut roots: HashSet<PathBuf> = HashSet::new();
        let mut has_top_level_file = false;

        for i in 0..archive.len() {
            let entry = archive.by_index(i)?;
            let Some(name) = entry.enclosed_name() else {
                continue;
            };
            let mut components = name.components();
            if let Some(Component::Normal(first)) = components.next() {
                roots.insert(PathBuf::from(first));
                if entry.is_file() && components.next().is_none() {
                    has_top_level_file = true;
                }
            }
        }

        if has_top_level_file || roots.len() != 1 {
            return Ok(None);
        }
        Ok(roots.into_iter().next())
    })
    .await?
}

async fn extract_with<F>(archive_path: &Path, destination: &Path, relative: F) -> Result<usize>
where
    F: Fn(&Path) -> Option<PathBuf> + Send + 'static,
{
    let archive_path = archive_path.to_owned();
    let destination = destination.to_owned();

    tokio::task::spawn_blocking(move || {
        let mut archive = zip::ZipArchive::new(File::open(&archive_path)?)?;
        let mut written = 0;

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            let Some(name) = entry.enclosed_name() else {
                log::warn!("Skipping unsafe archive entry '{}'", entry.name());
                continue;
            };
            let Some(relative_path) = relative(&name) else {
                continue;
            };
            if relative_path.as_os_str().is_empty() {
                continue;
            }

            let dest_path = destination.join(&relative_path);
            if entry.is_dir() {
                std::fs::create_dir_all(&dest_path)?;
                continue;
            }
            if let Some(parent) = dest_path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let mut dest_file = File::create(&dest_path)?;
            std::io::copy(&mut entry, &mut dest_file)?;
            written += 1;
        }

        Ok(written)
    })
    .await?
}
