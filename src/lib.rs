//! packwright: completes CurseForge modpacks.
//!
//! A version directory holds a `manifest.json` listing mods by
//! `(projectID, fileID)` and a `files.json` with the entries the user chose.
//! Completion looks up whatever metadata is missing, persists it, and
//! downloads the selected files that are not installed yet.
//!
//! ```rust,ignore
//! let config = Config::load(None)?;
//! let env = packwright_lib::completion_env(&config)?;
//! let task = CompletionTask::load(&env, "atm9")?;
//! TaskExecutor::new(ctx, config.concurrency.downloads).run(Box::new(task)).await?;
//! ```

// External workspace crates
use packwright_core as core;

// Re-export for internal use
use core::error;

pub use core::{ErrorInfo, FileCategory, LauncherError, ProgressEvent, Result};

pub mod cancellation;
pub mod catalog;
pub mod config;
pub mod download;
pub mod logging;
pub mod modpack;
pub mod mods;
pub mod paths;
pub mod progress;
pub mod task;
pub mod utils;

#[cfg(test)]
mod testing;

use std::sync::Arc;

/// User-Agent for all HTTP requests
pub const USER_AGENT: &str = concat!("packwright/", env!("CARGO_PKG_VERSION"));

/// Wire the real catalog and downloader according to `config`
pub fn completion_env(config: &config::Config) -> Result<modpack::CompletionEnv> {
    let paths = config.paths();
    paths.init()?;

    let download_config = config.download_config();
    let catalog =
        catalog::CurseForgeCatalog::new(&config.curseforge, download_config.request_timeout)?;

    let cache = config
        .download
        .caching
        .then(|| download::CacheRepository::new(paths.cache_dir().join("files")));
    let downloader = download::Downloader::http(download_config, cache)?;

    Ok(
        modpack::CompletionEnv::new(paths, Arc::new(catalog), Arc::new(downloader))
            .with_lookup_concurrency(config.concurrency.lookups),
    )
}
