//! Test doubles for the catalog and the network.

use crate::catalog::{CatalogError, ProjectRecord, RemoteCatalog, RemoteFileRecord};
use crate::download::Fetcher;
use crate::error::{LauncherError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// CurseForge class id of regular mods
pub const MOD_CLASS: u32 = 6;

/// URL the fake catalog hands out for a file
pub fn fake_url(file_id: u64, file_name: &str) -> String {
    format!("https://cdn.test/files/{}/{}", file_id, file_name)
}

/// Scripted catalog. Unknown files are `NotFound`; unknown projects are
/// regular mods.
#[derive(Default)]
pub struct FakeCatalog {
    files: Mutex<HashMap<(u64, u64), std::result::Result<RemoteFileRecord, CatalogError>>>,
    projects: Mutex<HashMap<u64, std::result::Result<ProjectRecord, CatalogError>>>,
    file_calls: Mutex<HashMap<(u64, u64), usize>>,
    project_calls: AtomicUsize,
    delays: Mutex<HashMap<(u64, u64), Duration>>,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, project_id: u64, file_id: u64, file_name: &str) -> Self {
        self.set_file(project_id, file_id, file_name);
        self
    }

    pub fn with_record(self, project_id: u64, file_id: u64, record: RemoteFileRecord) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert((project_id, file_id), Ok(record));
        self
    }

    pub fn with_missing_file(self, project_id: u64, file_id: u64) -> Self {
        self.set_outcome(
            project_id,
            file_id,
            Err(CatalogError::NotFound(format!("{}/{}", project_id, file_id))),
        );
        self
    }

    pub fn with_flaky_file(self, project_id: u64, file_id: u64) -> Self {
        self.set_outcome(
            project_id,
            file_id,
            Err(CatalogError::Transient("connection reset".into())),
        );
        self
    }

    /// Delay the answer for one file, to shuffle completion order
    pub fn with_delay(self, project_id: u64, file_id: u64, delay: Duration) -> Self {
        self.delays
            .lock()
            .unwrap()
            .insert((project_id, file_id), delay);
        self
    }

    pub fn with_project(self, project_id: u64, class_id: u32) -> Self {
        self.projects.lock().unwrap().insert(
            project_id,
            Ok(ProjectRecord {
                id: project_id,
                name: format!("project-{}", project_id),
                class_id: Some(class_id),
            }),
        );
        self
    }

    pub fn with_flaky_project(self, project_id: u64) -> Self {
        self.projects.lock().unwrap().insert(
            project_id,
            Err(CatalogError::Transient("timeout".into())),
        );
        self
    }

    /// Make a file resolvable (e.g. the catalog came back between runs)
    pub fn set_file(&self, project_id: u64, file_id: u64, file_name: &str) {
        self.set_outcome(
            project_id,
            file_id,
            Ok(RemoteFileRecord {
                file_name: file_name.to_string(),
                url: fake_url(file_id, file_name),
                parent_project_class: None,
                sha1: None,
                file_length: 0,
            }),
        );
    }

    fn set_outcome(
        &self,
        project_id: u64,
        file_id: u64,
        outcome: std::result::Result<RemoteFileRecord, CatalogError>,
    ) {
        self.files
            .lock()
            .unwrap()
            .insert((project_id, file_id), outcome);
    }

    pub fn file_lookups(&self) -> usize {
        self.file_calls.lock().unwrap().values().sum()
    }

    pub fn file_lookups_for(&self, project_id: u64, file_id: u64) -> usize {
        self.file_calls
            .lock()
            .unwrap()
            .get(&(project_id, file_id))
            .copied()
            .unwrap_or(0)
    }

    pub fn project_lookups(&self) -> usize {
        self.project_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteCatalog for FakeCatalog {
    async fn lookup_file(
        &self,
        project_id: u64,
        file_id: u64,
    ) -> std::result::Result<RemoteFileRecord, CatalogError> {
        *self
            .file_calls
            .lock()
            .unwrap()
            .entry((project_id, file_id))
            .or_default() += 1;

        let delay = self.delays.lock().unwrap().get(&(project_id, file_id)).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.files
            .lock()
            .unwrap()
            .get(&(project_id, file_id))
            .cloned()
            .unwrap_or_else(|| Err(CatalogError::NotFound(format!("{}/{}", project_id, file_id))))
    }

    async fn lookup_project(
        &self,
        project_id: u64,
    ) -> std::result::Result<ProjectRecord, CatalogError> {
        self.project_calls.fetch_add(1, Ordering::SeqCst);
        self.projects
            .lock()
            .unwrap()
            .get(&project_id)
            .cloned()
            .unwrap_or_else(|| {
                Ok(ProjectRecord {
                    id: project_id,
                    name: format!("project-{}", project_id),
                    class_id: Some(MOD_CLASS),
                })
            })
    }
}

/// In-memory network. URLs are served from a table, or, in
/// `serving_everything` mode, with the URL itself as the body.
#[derive(Default)]
pub struct MemoryFetcher {
    files: Mutex<HashMap<String, Vec<u8>>>,
    serve_everything: bool,
    unavailable: Mutex<HashSet<String>>,
    failures: Mutex<HashMap<String, u32>>,
    counts: Mutex<HashMap<String, usize>>,
    delay: Option<Duration>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serving_everything() -> Self {
        Self {
            serve_everything: true,
            ..Self::default()
        }
    }

    pub fn with_file(self, url: &str, data: &[u8]) -> Self {
        self.files.lock().unwrap().insert(url.to_string(), data.to_vec());
        self
    }

    /// Answer 404 for `url`
    pub fn without(self, url: &str) -> Self {
        self.unavailable.lock().unwrap().insert(url.to_string());
        self
    }

    /// First `times` requests for `url` fail with a connection reset
    pub fn fail_times(self, url: &str, times: u32) -> Self {
        self.failures.lock().unwrap().insert(url.to_string(), times);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn fetch_count(&self, url: &str) -> usize {
        self.counts.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_fetches(&self) -> usize {
        self.counts.lock().unwrap().values().sum()
    }

    fn body_for(&self, url: &str) -> Option<Vec<u8>> {
        if self.unavailable.lock().unwrap().contains(url) {
            return None;
        }
        match self.files.lock().unwrap().get(url) {
            Some(data) => Some(data.clone()),
            None if self.serve_everything => Some(url.as_bytes().to_vec()),
            None => None,
        }
    }
}

#[async_trait]
impl Fetcher for MemoryFetcher {
    async fn fetch(
        &self,
        url: &str,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        *self.counts.lock().unwrap().entry(url.to_string()).or_default() += 1;

        if let Some(delay) = self.delay {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(LauncherError::OperationCancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        {
            let mut failures = self.failures.lock().unwrap();
            if let Some(left) = failures.get_mut(url).filter(|left| **left > 0) {
                *left -= 1;
                return Err(LauncherError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "connection reset by peer",
                )));
            }
        }

        let body = self
            .body_for(url)
            .ok_or_else(|| LauncherError::DownloadFailed(format!("HTTP 404 Not Found: {}", url)))?;
        std::fs::write(destination, &body)?;
        Ok(body.len() as u64)
    }
}
