//! Modpack completion: bring a version's mod set in line with its manifest.
//!
//! 1. entries missing a file name or URL are looked up in the catalog, in
//!    parallel; failures are recorded in [`ResolutionFlags`] and the entry is
//!    kept as-is;
//! 2. the (partially) resolved manifest and the selection are persisted, so
//!    a later run never asks the catalog about resolved entries again;
//! 3. selected, named entries that are not yet installed become download
//!    sub-tasks, routed to `mods/` or `resourcepacks/` by project class;
//! 4. after every download settled, the run fails if anything is missing.
//!    A vanished upstream resource wins over any other failure.

use super::manifest::{Manifest, ManifestEntry};
use super::selection::SelectionSet;
use super::store::ManifestStore;
use crate::catalog::{CatalogError, RemoteCatalog};
use crate::download::{DownloadTask, DownloadUnit, Downloader};
use crate::error::{LauncherError, Result};
use crate::mods::LocalModStore;
use crate::paths::LauncherPaths;
use crate::progress::StageCounter;
use crate::task::{BoxedTask, DependencyReport, Task, TaskContext};
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt};
use packwright_core::FileCategory;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

pub const STAGE_RESOLVE: &str = "modpack.resolve";
pub const STAGE_DOWNLOAD: &str = "modpack.download";

const DEFAULT_LOOKUP_CONCURRENCY: usize = 8;

/// Collaborators of a completion run
#[derive(Clone)]
pub struct CompletionEnv {
    pub paths: LauncherPaths,
    pub catalog: Arc<dyn RemoteCatalog>,
    pub downloader: Arc<Downloader>,
    pub lookup_concurrency: usize,
}

impl CompletionEnv {
    pub fn new(
        paths: LauncherPaths,
        catalog: Arc<dyn RemoteCatalog>,
        downloader: Arc<Downloader>,
    ) -> Self {
        Self {
            paths,
            catalog,
            downloader,
            lookup_concurrency: DEFAULT_LOOKUP_CONCURRENCY,
        }
    }

    pub fn with_lookup_concurrency(mut self, lookups: usize) -> Self {
        self.lookup_concurrency = lookups.max(1);
        self
    }

    pub fn manifest_store(&self) -> ManifestStore {
        ManifestStore::new(self.paths.clone())
    }

    pub fn mod_store(&self) -> LocalModStore {
        LocalModStore::new(self.paths.clone())
    }
}

/// Aggregate outcome of resolution. Flags only ever move towards failure,
/// so the result does not depend on the order lookups finish in.
#[derive(Debug)]
pub struct ResolutionFlags {
    not_found: AtomicBool,
    all_resolved: AtomicBool,
    finished: AtomicUsize,
}

impl Default for ResolutionFlags {
    fn default() -> Self {
        Self {
            not_found: AtomicBool::new(false),
            all_resolved: AtomicBool::new(true),
            finished: AtomicUsize::new(0),
        }
    }
}

impl ResolutionFlags {
    pub fn mark_not_found(&self) {
        self.not_found.store(true, Ordering::SeqCst);
    }

    pub fn mark_unresolved(&self) {
        self.all_resolved.store(false, Ordering::SeqCst);
    }

    /// Fold a failed lookup into the flags
    pub fn record(&self, error: &CatalogError) {
        match error {
            CatalogError::NotFound(_) => self.mark_not_found(),
            CatalogError::Transient(_) => self.mark_unresolved(),
        }
    }

    pub fn record_finished(&self) -> usize {
        self.finished.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_not_found(&self) -> bool {
        self.not_found.load(Ordering::SeqCst)
    }

    pub fn is_all_resolved(&self) -> bool {
        self.all_resolved.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

/// Completion of one installed version
pub struct CompletionTask {
    version: String,
    manifest: Option<Manifest>,
    selection: SelectionSet,
    catalog: Arc<dyn RemoteCatalog>,
    downloader: Arc<Downloader>,
    manifest_store: ManifestStore,
    mod_store: LocalModStore,
    lookup_concurrency: usize,
    flags: Arc<ResolutionFlags>,
    downloads: Vec<BoxedTask>,
}

impl CompletionTask {
    /// Completion for `version`. A missing manifest is read from the
    /// version directory; a missing selection is read from `files.json`
    /// and, when none was saved, every entry is selected.
    pub fn new(
        env: &CompletionEnv,
        version: &str,
        manifest: Option<Manifest>,
        selection: Option<SelectionSet>,
    ) -> Result<Self> {
        env.paths.version_root(version)?;
        let manifest_store = env.manifest_store();

        let manifest = match manifest {
            Some(manifest) => Some(manifest),
            None => manifest_store.load_manifest(version)?,
        };

        let selection = match &manifest {
            Some(manifest) => {
                let selection = match selection {
                    Some(selection) => Some(selection),
                    None => manifest_store.load_selection(version)?,
                };
                selection
                    .map(|s| s.retain_known(manifest))
                    .unwrap_or_else(|| SelectionSet::all_of(manifest))
            }
            None => SelectionSet::new(),
        };

        Ok(Self {
            version: version.to_string(),
            manifest,
            selection,
            catalog: env.catalog.clone(),
            downloader: env.downloader.clone(),
            manifest_store,
            mod_store: env.mod_store(),
            lookup_concurrency: env.lookup_concurrency.max(1),
            flags: Arc::new(ResolutionFlags::default()),
            downloads: Vec::new(),
        })
    }

    /// Re-run completion from what is persisted for `version`
    pub fn load(env: &CompletionEnv, version: &str) -> Result<Self> {
        Self::new(env, version, None, None)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn flags(&self) -> Arc<ResolutionFlags> {
        self.flags.clone()
    }

    /// Downloads planned by `execute` and not yet handed to the executor
    pub fn planned_downloads(&self) -> usize {
        self.downloads.len()
    }

    /// Step 1. Returns the rewritten manifest and the project classes the
    /// catalog reported alongside file records.
    async fn resolve(
        &self,
        manifest: &Manifest,
        ctx: &TaskContext,
    ) -> (Manifest, HashMap<(u64, u64), u32>) {
        let total = manifest.files.len();
        let counter = StageCounter::new(ctx.progress.clone(), &ctx.operation_id, STAGE_RESOLVE, total);
        counter.start();

        let resolved: Vec<(ManifestEntry, Option<u32>)> = stream::iter(manifest.files.iter().cloned())
            .map(|entry| {
                let counter = counter.clone();
                async move {
                    let outcome = if entry.needs_resolution() {
                        self.resolve_entry(entry).await
                    } else {
                        (entry, None)
                    };
                    self.flags.record_finished();
                    counter.advance();
                    outcome
                }
            })
            .buffered(self.lookup_concurrency)
            .collect()
            .await;

        let mut classes = HashMap::new();
        let mut files = Vec::with_capacity(resolved.len());
        for (entry, class) in resolved {
            if let Some(class) = class {
                classes.insert(entry.identity(), class);
            }
            files.push(entry);
        }

        (manifest.with_files(files), classes)
    }

    async fn resolve_entry(&self, entry: ManifestEntry) -> (ManifestEntry, Option<u32>) {
        match self.catalog.lookup_file(entry.project_id, entry.file_id).await {
            Ok(record) => {
                log::debug!(
                    "Resolved projectID={} fileID={} -> {}",
                    entry.project_id,
                    entry.file_id,
                    record.file_name
                );
                let class = record.parent_project_class;
                (entry.with_resolved(&record), class)
            }
            Err(e) => {
                if e.is_not_found() {
                    log::warn!(
                        "Mod was deleted from the catalog: projectID={}, fileID={}",
                        entry.project_id,
                        entry.file_id
                    );
                } else {
                    log::warn!(
                        "Unable to fetch the file name projectID={}, fileID={}: {}",
                        entry.project_id,
                        entry.file_id,
                        e
                    );
                }
                self.flags.record(&e);
                (entry, None)
            }
        }
    }

    /// Step 3. Download units for selected entries that are not installed
    async fn plan(
        &self,
        manifest: &Manifest,
        classes: &HashMap<(u64, u64), u32>,
    ) -> Vec<DownloadUnit> {
        let mut candidates: Vec<(&ManifestEntry, &str, &str)> = Vec::new();
        for entry in manifest.files.iter().filter(|e| self.selection.contains(e)) {
            // Unresolved entries were already flagged
            let Some(file_name) = entry.file_name.as_deref() else {
                continue;
            };
            let Some(url) = entry.url.as_deref() else {
                log::warn!("No download URL for {} ({})", file_name, entry.path);
                self.flags.mark_unresolved();
                continue;
            };
            candidates.push((entry, file_name, url));
        }

        let lookups: Vec<BoxFuture<'_, (&ManifestEntry, &str, &str, _)>> = candidates
            .into_iter()
            .map(|(entry, file_name, url)| {
                async move {
                    let category = match classes.get(&entry.identity()) {
                        Some(class) => Ok(FileCategory::from_class_id(*class)),
                        None => self
                            .catalog
                            .lookup_project(entry.project_id)
                            .await
                            .map(|project| project.category()),
                    };
                    (entry, file_name, url, category)
                }
                .boxed()
            })
            .collect();
        let classified: Vec<_> = stream::iter(lookups)
            .buffered(self.lookup_concurrency)
            .collect()
            .await;

        let mut planned_targets = HashSet::new();
        let mut units = Vec::new();
        for (entry, file_name, url, category) in classified {
            let category = match category {
                Ok(category) => category,
                Err(e) => {
                    log::warn!(
                        "Unable to classify projectID={} ({}): {}",
                        entry.project_id,
                        file_name,
                        e
                    );
                    self.flags.record(&e);
                    continue;
                }
            };

            if self.mod_store.exists(&self.version, category, file_name) {
                log::debug!("{} {} already installed", category.as_str(), file_name);
                continue;
            }

            let target = match self.mod_store.target_path_for(&self.version, category, file_name) {
                Ok(target) => target,
                Err(e) => {
                    log::warn!("Skipping {}: {}", entry.path, e);
                    self.flags.mark_unresolved();
                    continue;
                }
            };

            if !planned_targets.insert(target.clone()) {
                log::debug!("{} is already planned by another entry", target.display());
                continue;
            }

            units.push(
                DownloadUnit::new(url, target)
                    .with_caching(true)
                    .with_sha1(entry.sha1.clone()),
            );
        }

        units
    }
}

#[async_trait]
impl Task for CompletionTask {
    fn name(&self) -> String {
        format!("complete modpack {}", self.version)
    }

    fn stage(&self) -> Option<String> {
        Some(STAGE_DOWNLOAD.to_string())
    }

    async fn execute(&mut self, ctx: &TaskContext) -> Result<()> {
        let Some(manifest) = self.manifest.take() else {
            log::info!("No modpack manifest for '{}', nothing to complete", self.version);
            return Ok(());
        };

        log::info!(
            "Completing '{}': {} entries, {} selected, {} unresolved",
            self.version,
            manifest.files.len(),
            self.selection.len(),
            manifest.unresolved_count()
        );

        let (manifest, classes) = self.resolve(&manifest, ctx).await;

        self.manifest_store.save_manifest(&self.version, &manifest)?;
        self.manifest_store.save_selection(&self.version, &self.selection)?;

        let units = self.plan(&manifest, &classes).await;
        log::info!("Planned {} download(s) for '{}'", units.len(), self.version);

        self.downloads = units
            .into_iter()
            .map(|unit| Box::new(DownloadTask::new(unit, self.downloader.clone())) as BoxedTask)
            .collect();
        Ok(())
    }

    fn take_dependencies(&mut self) -> Vec<BoxedTask> {
        std::mem::take(&mut self.downloads)
    }

    /// Downloads run even when resolution is incomplete
    fn is_relying_on_dependencies(&self) -> bool {
        false
    }

    async fn post_execute(&mut self, _ctx: &TaskContext, report: &DependencyReport) -> Result<()> {
        if self.flags.is_not_found() {
            return Err(LauncherError::ResourceGone(format!(
                "some mods of '{}' were deleted from the catalog",
                self.version
            )));
        }
        if !self.flags.is_all_resolved() {
            return Err(LauncherError::ResolutionIncomplete(format!(
                "some files of '{}' could not be looked up, run completion again",
                self.version
            )));
        }
        if report.failed > 0 {
            return Err(LauncherError::DownloadIncomplete {
                failed: report.failed,
                total: report.total,
            });
        }

        log::info!(
            "Modpack '{}' is complete ({} file(s) downloaded)",
            self.version,
            report.succeeded
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::{CacheRepository, DownloadConfig};
    use crate::progress::{ChannelProgress, NoProgress};
    use crate::task::TaskExecutor;
    use crate::testing::{fake_url, FakeCatalog, MemoryFetcher};
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    const VERSION: &str = "pack";

    struct Fixture {
        _dir: TempDir,
        paths: LauncherPaths,
        catalog: Arc<FakeCatalog>,
        fetcher: Arc<MemoryFetcher>,
    }

    impl Fixture {
        fn new(catalog: FakeCatalog, fetcher: MemoryFetcher) -> Self {
            let dir = TempDir::new().unwrap();
            let paths = LauncherPaths::new(dir.path());
            Self {
                _dir: dir,
                paths,
                catalog: Arc::new(catalog),
                fetcher: Arc::new(fetcher),
            }
        }

        fn env(&self) -> CompletionEnv {
            let downloader = Downloader::new(
                self.fetcher.clone(),
                Some(CacheRepository::new(self.paths.cache_dir().join("files"))),
                DownloadConfig {
                    retries: 0,
                    retry_delay_ms: 1,
                    ..Default::default()
                },
            );
            CompletionEnv::new(self.paths.clone(), self.catalog.clone(), Arc::new(downloader))
                .with_lookup_concurrency(4)
        }

        async fn run(&self, task: CompletionTask) -> Result<()> {
            let ctx = TaskContext::new("test", CancellationToken::new(), Arc::new(NoProgress));
            TaskExecutor::new(ctx, 4).run(Box::new(task)).await
        }

        async fn complete(&self, manifest: Manifest, selection: Option<SelectionSet>) -> Result<()> {
            let task = CompletionTask::new(&self.env(), VERSION, Some(manifest), selection).unwrap();
            self.run(task).await
        }

        async fn rerun(&self) -> Result<()> {
            self.run(CompletionTask::load(&self.env(), VERSION).unwrap()).await
        }

        fn mod_path(&self, name: &str) -> std::path::PathBuf {
            self.paths.mods_dir(VERSION).unwrap().join(name)
        }

        fn resourcepack_path(&self, name: &str) -> std::path::PathBuf {
            self.paths.resourcepacks_dir(VERSION).unwrap().join(name)
        }

        fn persisted(&self) -> Manifest {
            self.env().manifest_store().load_manifest(VERSION).unwrap().unwrap()
        }
    }

    fn entry(project_id: u64, file_id: u64, path: &str) -> ManifestEntry {
        ManifestEntry {
            path: path.to_string(),
            ..ManifestEntry::new(project_id, file_id)
        }
    }

    fn manifest(files: Vec<ManifestEntry>) -> Manifest {
        Manifest::from_json(r#"{"manifestType": "minecraftModpack", "name": "Test"}"#)
            .unwrap()
            .with_files(files)
    }

    fn select(paths: &[&str]) -> SelectionSet {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[tokio::test]
    async fn test_only_selected_entries_downloaded() {
        let fx = Fixture::new(
            FakeCatalog::new()
                .with_file(1, 10, "a.jar")
                .with_file(2, 20, "b.jar"),
            MemoryFetcher::serving_everything(),
        );

        fx.complete(
            manifest(vec![entry(1, 10, "a"), entry(2, 20, "b")]),
            Some(select(&["a"])),
        )
        .await
        .unwrap();

        assert!(fx.mod_path("a.jar").is_file());
        assert!(!fx.mod_path("b.jar").exists());
        assert_eq!(fx.fetcher.total_fetches(), 1);

        // "b" stays in the manifest only, now with metadata
        let persisted = fx.persisted();
        assert_eq!(persisted.files[1].file_name.as_deref(), Some("b.jar"));
        assert_eq!(persisted.files[1].url.as_deref(), Some(fake_url(20, "b.jar").as_str()));
        let selection = fx.env().manifest_store().load_selection(VERSION).unwrap().unwrap();
        assert_eq!(selection, select(&["a"]));
    }

    #[tokio::test]
    async fn test_not_found_still_downloads_the_rest() {
        let fx = Fixture::new(
            FakeCatalog::new()
                .with_missing_file(1, 10)
                .with_file(2, 20, "b.jar"),
            MemoryFetcher::serving_everything(),
        );

        let result = fx
            .complete(manifest(vec![entry(1, 10, "a"), entry(2, 20, "b")]), None)
            .await;

        assert!(matches!(result, Err(LauncherError::ResourceGone(_))));
        assert!(fx.mod_path("b.jar").is_file());
        assert!(fx.persisted().files[0].needs_resolution());
    }

    #[tokio::test]
    async fn test_resource_gone_takes_priority() {
        let fx = Fixture::new(
            FakeCatalog::new()
                .with_flaky_file(1, 10)
                .with_missing_file(2, 20)
                .with_file(3, 30, "c.jar"),
            MemoryFetcher::serving_everything().without(&fake_url(30, "c.jar")),
        );

        let result = fx
            .complete(
                manifest(vec![entry(1, 10, "a"), entry(2, 20, "b"), entry(3, 30, "c")]),
                None,
            )
            .await;

        assert!(matches!(result, Err(LauncherError::ResourceGone(_))));
    }

    #[tokio::test]
    async fn test_transient_failure_is_resolution_incomplete() {
        let fx = Fixture::new(
            FakeCatalog::new()
                .with_flaky_file(1, 10)
                .with_file(2, 20, "b.jar"),
            MemoryFetcher::serving_everything(),
        );

        let result = fx
            .complete(manifest(vec![entry(1, 10, "a"), entry(2, 20, "b")]), None)
            .await;

        assert!(matches!(result, Err(LauncherError::ResolutionIncomplete(_))));
        assert!(result.unwrap_err().is_retryable());
        assert!(fx.mod_path("b.jar").is_file());
    }

    #[tokio::test]
    async fn test_named_entry_without_url_is_not_downloaded() {
        let fx = Fixture::new(
            FakeCatalog::new().with_flaky_file(1, 10),
            MemoryFetcher::serving_everything(),
        );
        let named = ManifestEntry {
            file_name: Some("a.jar".to_string()),
            ..entry(1, 10, "a")
        };
        let store = fx.env().manifest_store();
        store.save_manifest(VERSION, &manifest(vec![named])).unwrap();
        store.save_selection(VERSION, &select(&["a"])).unwrap();

        let result = fx.rerun().await;

        assert!(matches!(result, Err(LauncherError::ResolutionIncomplete(_))));
        assert_eq!(fx.catalog.file_lookups_for(1, 10), 1);
        assert_eq!(fx.fetcher.total_fetches(), 0);
        assert!(!fx.mod_path("a.jar").exists());
        let persisted = fx.persisted();
        assert_eq!(persisted.files[0].file_name.as_deref(), Some("a.jar"));
        assert_eq!(persisted.files[0].url, None);
    }

    #[tokio::test]
    async fn test_failed_download_is_download_incomplete() {
        let fx = Fixture::new(
            FakeCatalog::new()
                .with_file(1, 10, "a.jar")
                .with_file(2, 20, "b.jar"),
            MemoryFetcher::serving_everything().without(&fake_url(20, "b.jar")),
        );

        let result = fx
            .complete(manifest(vec![entry(1, 10, "a"), entry(2, 20, "b")]), None)
            .await;

        match result {
            Err(LauncherError::DownloadIncomplete { failed, total }) => {
                assert_eq!((failed, total), (1, 2));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(fx.mod_path("a.jar").is_file());
        assert!(!fx.mod_path("b.jar.part").exists());
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let fx = Fixture::new(
            FakeCatalog::new()
                .with_file(1, 10, "a.jar")
                .with_file(2, 20, "b.jar"),
            MemoryFetcher::serving_everything(),
        );

        fx.complete(manifest(vec![entry(1, 10, "a"), entry(2, 20, "b")]), None)
            .await
            .unwrap();
        let lookups = fx.catalog.file_lookups();
        assert_eq!(fx.fetcher.total_fetches(), 2);

        fx.rerun().await.unwrap();

        assert_eq!(fx.fetcher.total_fetches(), 2);
        assert_eq!(fx.catalog.file_lookups(), lookups);
    }

    #[tokio::test]
    async fn test_rerun_only_queries_unresolved_entries() {
        let fx = Fixture::new(
            FakeCatalog::new()
                .with_file(1, 10, "a.jar")
                .with_flaky_file(2, 20),
            MemoryFetcher::serving_everything(),
        );

        let first = fx
            .complete(manifest(vec![entry(1, 10, "a"), entry(2, 20, "b")]), None)
            .await;
        assert!(matches!(first, Err(LauncherError::ResolutionIncomplete(_))));

        // Catalog is reachable again
        fx.catalog.set_file(2, 20, "b.jar");
        fx.rerun().await.unwrap();

        assert_eq!(fx.catalog.file_lookups_for(1, 10), 1);
        assert_eq!(fx.catalog.file_lookups_for(2, 20), 2);
        assert!(fx.mod_path("b.jar").is_file());
        assert_eq!(fx.fetcher.fetch_count(&fake_url(10, "a.jar")), 1);
    }

    #[tokio::test]
    async fn test_interrupted_downloads_resume_without_lookups() {
        let fx = Fixture::new(
            FakeCatalog::new()
                .with_file(1, 10, "a.jar")
                .with_file(2, 20, "b.jar"),
            MemoryFetcher::serving_everything(),
        );
        let manifest = manifest(vec![entry(1, 10, "a"), entry(2, 20, "b")]);

        // execute only: manifest saved, downloads not started
        let mut task = CompletionTask::new(&fx.env(), VERSION, Some(manifest), None).unwrap();
        let ctx = TaskContext::new("interrupted", CancellationToken::new(), Arc::new(NoProgress));
        task.execute(&ctx).await.unwrap();
        assert_eq!(task.planned_downloads(), 2);
        drop(task);
        assert_eq!(fx.catalog.file_lookups(), 2);

        fx.rerun().await.unwrap();

        assert_eq!(fx.catalog.file_lookups(), 2);
        assert!(fx.mod_path("a.jar").is_file());
        assert!(fx.mod_path("b.jar").is_file());
    }

    #[tokio::test]
    async fn test_resource_packs_routed_by_class() {
        let fx = Fixture::new(
            FakeCatalog::new()
                .with_file(1, 10, "jei.jar")
                .with_file(2, 20, "faithful.zip")
                .with_project(2, 12),
            MemoryFetcher::serving_everything(),
        );

        fx.complete(manifest(vec![entry(1, 10, "a"), entry(2, 20, "b")]), None)
            .await
            .unwrap();

        assert!(fx.mod_path("jei.jar").is_file());
        assert!(fx.resourcepack_path("faithful.zip").is_file());
        assert!(!fx.mod_path("faithful.zip").exists());
    }

    #[tokio::test]
    async fn test_class_from_file_record_skips_project_lookup() {
        let record = crate::catalog::RemoteFileRecord {
            file_name: "faithful.zip".into(),
            url: fake_url(20, "faithful.zip"),
            parent_project_class: Some(12),
            sha1: None,
            file_length: 0,
        };
        let fx = Fixture::new(
            FakeCatalog::new().with_record(2, 20, record),
            MemoryFetcher::serving_everything(),
        );

        fx.complete(manifest(vec![entry(2, 20, "b")]), None).await.unwrap();

        assert!(fx.resourcepack_path("faithful.zip").is_file());
        assert_eq!(fx.catalog.project_lookups(), 0);
    }

    #[tokio::test]
    async fn test_classification_failure_is_flagged() {
        let fx = Fixture::new(
            FakeCatalog::new()
                .with_file(1, 10, "a.jar")
                .with_file(2, 20, "b.jar")
                .with_flaky_project(2),
            MemoryFetcher::serving_everything(),
        );

        let result = fx
            .complete(manifest(vec![entry(1, 10, "a"), entry(2, 20, "b")]), None)
            .await;

        assert!(matches!(result, Err(LauncherError::ResolutionIncomplete(_))));
        assert!(fx.mod_path("a.jar").is_file());
        assert!(!fx.mod_path("b.jar").exists());
    }

    #[tokio::test]
    async fn test_existing_and_disabled_mods_not_downloaded() {
        let fx = Fixture::new(
            FakeCatalog::new()
                .with_file(1, 10, "a.jar")
                .with_file(2, 20, "b.jar"),
            MemoryFetcher::serving_everything(),
        );
        let mods = fx.paths.mods_dir(VERSION).unwrap();
        std::fs::create_dir_all(&mods).unwrap();
        std::fs::write(mods.join("a.jar"), b"local").unwrap();
        std::fs::write(mods.join("b.jar.disabled"), b"local").unwrap();

        fx.complete(manifest(vec![entry(1, 10, "a"), entry(2, 20, "b")]), None)
            .await
            .unwrap();

        assert_eq!(fx.fetcher.total_fetches(), 0);
        assert_eq!(std::fs::read(mods.join("a.jar")).unwrap(), b"local");
        assert!(!mods.join("b.jar").exists());
    }

    #[tokio::test]
    async fn test_missing_manifest_is_noop() {
        let fx = Fixture::new(FakeCatalog::new(), MemoryFetcher::serving_everything());

        fx.rerun().await.unwrap();

        assert_eq!(fx.catalog.file_lookups(), 0);
        assert!(!fx.paths.manifest_file(VERSION).unwrap().exists());
    }

    #[tokio::test]
    async fn test_empty_manifest_succeeds() {
        let fx = Fixture::new(FakeCatalog::new(), MemoryFetcher::serving_everything());

        fx.complete(manifest(vec![]), None).await.unwrap();

        assert!(fx.persisted().files.is_empty());
        assert!(fx.paths.selection_file(VERSION).unwrap().is_file());
    }

    #[tokio::test]
    async fn test_unknown_selection_paths_ignored() {
        let fx = Fixture::new(
            FakeCatalog::new().with_file(1, 10, "a.jar"),
            MemoryFetcher::serving_everything(),
        );

        fx.complete(manifest(vec![entry(1, 10, "a")]), Some(select(&["a", "ghost"])))
            .await
            .unwrap();

        let selection = fx.env().manifest_store().load_selection(VERSION).unwrap().unwrap();
        assert_eq!(selection, select(&["a"]));
        assert!(fx.mod_path("a.jar").is_file());
    }

    #[tokio::test]
    async fn test_persisted_selection_used_on_rerun() {
        let fx = Fixture::new(
            FakeCatalog::new()
                .with_file(1, 10, "a.jar")
                .with_file(2, 20, "b.jar"),
            MemoryFetcher::serving_everything(),
        );
        let store = fx.env().manifest_store();
        let manifest = manifest(vec![entry(1, 10, "a"), entry(2, 20, "b")]);
        store.save_manifest(VERSION, &manifest).unwrap();
        store.save_selection(VERSION, &select(&["b"])).unwrap();

        fx.rerun().await.unwrap();

        assert!(!fx.mod_path("a.jar").exists());
        assert!(fx.mod_path("b.jar").is_file());
    }

    #[tokio::test]
    async fn test_flags_independent_of_completion_order() {
        // Same outcome whatever order the lookups finish in
        for (slow, fast) in [((1, 10), (2, 20)), ((2, 20), (1, 10))] {
            let fx = Fixture::new(
                FakeCatalog::new()
                    .with_missing_file(1, 10)
                    .with_flaky_file(2, 20)
                    .with_delay(slow.0, slow.1, Duration::from_millis(30))
                    .with_delay(fast.0, fast.1, Duration::from_millis(1)),
                MemoryFetcher::serving_everything(),
            );
            let task = CompletionTask::new(
                &fx.env(),
                VERSION,
                Some(manifest(vec![entry(1, 10, "a"), entry(2, 20, "b")])),
                None,
            )
            .unwrap();
            let flags = task.flags();

            let result = fx.run(task).await;

            assert!(matches!(result, Err(LauncherError::ResourceGone(_))));
            assert!(flags.is_not_found());
            assert!(!flags.is_all_resolved());
            assert_eq!(flags.finished(), 2);
        }
    }

    #[tokio::test]
    async fn test_concurrent_flag_updates() {
        let flags = Arc::new(ResolutionFlags::default());
        let handles: Vec<_> = (0..64)
            .map(|i| {
                let flags = flags.clone();
                tokio::spawn(async move {
                    match i % 3 {
                        0 => flags.record(&CatalogError::NotFound("x".into())),
                        1 => flags.record(&CatalogError::Transient("y".into())),
                        _ => {}
                    }
                    flags.record_finished();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(flags.is_not_found());
        assert!(!flags.is_all_resolved());
        assert_eq!(flags.finished(), 64);
    }

    #[tokio::test]
    async fn test_duplicate_file_names_downloaded_once() {
        let fx = Fixture::new(
            FakeCatalog::new()
                .with_file(1, 10, "same.jar")
                .with_file(2, 20, "same.jar"),
            MemoryFetcher::serving_everything(),
        );

        fx.complete(manifest(vec![entry(1, 10, "a"), entry(2, 20, "b")]), None)
            .await
            .unwrap();

        assert_eq!(fx.fetcher.total_fetches(), 1);
        assert!(fx.mod_path("same.jar").is_file());
    }

    #[tokio::test]
    async fn test_progress_stages_reported() {
        let fx = Fixture::new(
            FakeCatalog::new()
                .with_file(1, 10, "a.jar")
                .with_file(2, 20, "b.jar"),
            MemoryFetcher::serving_everything(),
        );
        let task = CompletionTask::new(
            &fx.env(),
            VERSION,
            Some(manifest(vec![entry(1, 10, "a"), entry(2, 20, "b")])),
            None,
        )
        .unwrap();

        let (sink, mut rx) = ChannelProgress::new();
        let ctx = TaskContext::new("progress", CancellationToken::new(), Arc::new(sink));
        TaskExecutor::new(ctx, 4).run(Box::new(task)).await.unwrap();

        let events: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        let last = |stage: &str| {
            events
                .iter()
                .filter(|e| e.stage == stage)
                .last()
                .map(|e| (e.current, e.total))
        };
        assert_eq!(last(STAGE_RESOLVE), Some((2, 2)));
        assert_eq!(last(STAGE_DOWNLOAD), Some((2, 2)));
    }

    #[tokio::test]
    async fn test_cache_shared_between_versions() {
        let fx = Fixture::new(
            FakeCatalog::new().with_file(1, 10, "a.jar"),
            MemoryFetcher::serving_everything(),
        );
        let env = fx.env();

        for version in ["one", "two"] {
            let task = CompletionTask::new(&env, version, Some(manifest(vec![entry(1, 10, "a")])), None)
                .unwrap();
            fx.run(task).await.unwrap();
            assert!(fx.paths.mods_dir(version).unwrap().join("a.jar").is_file());
        }

        assert_eq!(fx.fetcher.total_fetches(), 1);
    }
}
