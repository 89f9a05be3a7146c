//! Search, download and install orchestration

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch, Semaphore, TryAcquireError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::archive::verify_digest;
use super::discovered::{DiscoveredContentStore, SearchState};
use super::installed::{discover_installed, stage_archive, uninstall, InstalledMapEntry, MapInfo};
use super::paths::{canonical_root, ensure_contained, sanitize_dir_name};
use super::remote::{DiscoveredContentEntry, DownloadProgress, Release, RemoteCatalog};
use crate::error::AcquisitionError;

/// Downloads allowed in flight at once
pub const MAX_CONCURRENT_DOWNLOADS: usize = 3;

const NOTICE_CAPACITY: usize = 32;

// Unreported finished downloads are dropped past this many entries
const MAX_TRACKED_DOWNLOADS: usize = 32;

/// Download lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadPhase {
    Downloading,
    Extracting,
    Installing,
    Installed(InstalledMapEntry),
    Failed(String),
}

impl DownloadPhase {
    pub fn is_finished(&self) -> bool {
        matches!(self, DownloadPhase::Installed(_) | DownloadPhase::Failed(_))
    }
}

/// Copy of one download's state for presentation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadState {
    pub remote_id: String,
    pub title: String,
    pub version: String,
    pub phase: DownloadPhase,
    pub progress: DownloadProgress,
}

/// Dismissible notifications for presentation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineNotice {
    SearchFailed { query: String, message: String },
    DownloadFailed { title: String, message: String },
    IntegrityViolation { title: String, message: String },
    Installed(InstalledMapEntry),
}

/// Where the pipeline keeps its files
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Managed root for installed maps
    pub maps_root: PathBuf,
    pub preview_cache: PathBuf,
    pub max_concurrent_downloads: usize,
}

impl PipelineConfig {
    pub fn new(maps_root: impl Into<PathBuf>, preview_cache: impl Into<PathBuf>) -> Self {
        Self {
            maps_root: maps_root.into(),
            preview_cache: preview_cache.into(),
            max_concurrent_downloads: MAX_CONCURRENT_DOWNLOADS,
        }
    }
}

/// A started search
pub struct SearchTicket {
    pub generation: u64,
    task: JoinHandle<bool>,
}

impl SearchTicket {
    /// Wait for the response; true if it was applied, false if superseded
    pub async fn finished(self) -> bool {
        self.task.await.unwrap_or(false)
    }
}

/// A started download
pub struct DownloadHandle {
    state: watch::Receiver<DownloadState>,
    task: JoinHandle<Result<InstalledMapEntry, AcquisitionError>>,
}

impl DownloadHandle {
    pub fn state(&self) -> DownloadState {
        self.state.borrow().clone()
    }

    /// Stream of state changes (phase and progress)
    pub fn subscribe(&self) -> watch::Receiver<DownloadState> {
        self.state.clone()
    }

    pub async fn wait(self) -> Result<InstalledMapEntry, AcquisitionError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(AcquisitionError::Io(std::io::Error::other(e.to_string()))),
        }
    }
}

/// Community map acquisition
pub struct AcquisitionPipeline {
    remote: Arc<dyn RemoteCatalog>,
    store: Arc<DiscoveredContentStore>,
    slots: Arc<Semaphore>,
    limit: usize,
    config: PipelineConfig,
    downloads: Arc<Mutex<BTreeMap<String, watch::Receiver<DownloadState>>>>,
    notices: broadcast::Sender<PipelineNotice>,
    runtime: Handle,
}

impl AcquisitionPipeline {
    pub fn new(remote: Arc<dyn RemoteCatalog>, config: PipelineConfig, runtime: Handle) -> Self {
        let limit = config.max_concurrent_downloads.max(1);
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            remote,
            store: Arc::new(DiscoveredContentStore::new()),
            slots: Arc::new(Semaphore::new(limit)),
            limit,
            config,
            downloads: Arc::new(Mutex::new(BTreeMap::new())),
            notices,
            runtime,
        }
    }

    pub fn store(&self) -> &DiscoveredContentStore {
        &self.store
    }

    pub fn search_state(&self) -> SearchState {
        self.store.snapshot()
    }

    pub fn maps_root(&self) -> &Path {
        &self.config.maps_root
    }

    /// Receive notices from here on
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineNotice> {
        self.notices.subscribe()
    }

    /// Start a search, superseding any earlier one
    ///
    /// Returns immediately. The in-flight request of an earlier search is
    /// not cancelled; its response is discarded on arrival.
    pub fn search(&self, query: &str, page: u32) -> SearchTicket {
        let page = page.max(1);
        let generation = self.store.begin_search(query, page);
        debug!(generation, query, page, "Starting search");

        let remote = self.remote.clone();
        let store = self.store.clone();
        let notices = self.notices.clone();
        let query = query.to_string();

        let task = self.runtime.spawn(async move {
            match remote.search(&query, page).await {
                Ok(results) => {
                    let count = results.entries.len();
                    let applied = store.apply_results(generation, results);
                    if applied {
                        debug!(generation, count, "Applied search results");
                    } else {
                        debug!(generation, "Discarded superseded search results");
                    }
                    applied
                }
                Err(e) => {
                    let applied = store.apply_failure(generation, e.to_string());
                    if applied {
                        warn!("Search for {:?} failed: {}", query, e);
                        let _ = notices.send(PipelineNotice::SearchFailed {
                            query,
                            message: e.to_string(),
                        });
                    }
                    applied
                }
            }
        });

        SearchTicket { generation, task }
    }

    /// Free download slots
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Start downloading and installing one release
    ///
    /// Fails immediately with [`AcquisitionError::QueueFull`] when every
    /// slot is taken. The entry and release are copied, so the download is
    /// unaffected by later searches.
    pub fn download(
        &self,
        entry: &DiscoveredContentEntry,
        release: &Release,
    ) -> Result<DownloadHandle, AcquisitionError> {
        let permit = match self.slots.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(TryAcquireError::NoPermits) | Err(TryAcquireError::Closed) => {
                debug!("Download queue full, refusing {}", entry.title);
                return Err(AcquisitionError::QueueFull { limit: self.limit });
            }
        };

        let initial = DownloadState {
            remote_id: entry.remote_id.clone(),
            title: entry.title.clone(),
            version: release.version.clone(),
            phase: DownloadPhase::Downloading,
            progress: DownloadProgress::default(),
        };
        let (tx, rx) = watch::channel(initial);
        let tx = Arc::new(tx);

        {
            let mut downloads = self.downloads.lock().unwrap_or_else(PoisonError::into_inner);
            if downloads.len() >= MAX_TRACKED_DOWNLOADS {
                downloads.retain(|_, rx| !rx.borrow().phase.is_finished());
            }
            downloads.insert(format!("{}@{}", entry.remote_id, release.version), rx.clone());
        }

        let remote = self.remote.clone();
        let notices = self.notices.clone();
        let maps_root = self.config.maps_root.clone();
        let entry = entry.clone();
        let release = release.clone();

        info!("Queued download of {} {}", entry.title, release.version);

        let task = self.runtime.spawn(async move {
            let _permit = permit;
            let result = run_download(remote.as_ref(), &entry, &release, maps_root, tx.clone()).await;

            match &result {
                Ok(installed) => {
                    info!("Installed {} at {}", installed.title, installed.file_path.display());
                    tx.send_modify(|s| s.phase = DownloadPhase::Installed(installed.clone()));
                    let _ = notices.send(PipelineNotice::Installed(installed.clone()));
                }
                Err(e) => {
                    e.log_if_security_critical();
                    warn!("Download of {} failed: {}", entry.title, e);
                    tx.send_modify(|s| s.phase = DownloadPhase::Failed(e.to_string()));
                    let notice = if e.is_integrity_violation() {
                        PipelineNotice::IntegrityViolation {
                            title: entry.title.clone(),
                            message: e.to_string(),
                        }
                    } else {
                        PipelineNotice::DownloadFailed {
                            title: entry.title.clone(),
                            message: e.to_string(),
                        }
                    };
                    let _ = notices.send(notice);
                }
            }
            result
        });

        Ok(DownloadHandle { state: rx, task })
    }

    /// Copies of every in-flight download plus those that finished since
    /// the last call
    ///
    /// Finished downloads are reported once and then forgotten.
    pub fn downloads(&self) -> Vec<DownloadState> {
        let mut downloads = self.downloads.lock().unwrap_or_else(PoisonError::into_inner);
        let states: Vec<DownloadState> = downloads.values().map(|rx| rx.borrow().clone()).collect();
        downloads.retain(|_, rx| !rx.borrow().phase.is_finished());
        states
    }

    /// Fetch an entry's preview image into the preview cache
    ///
    /// An already cached file is reused. The local path is recorded on the
    /// entry if it is still in the current results.
    pub async fn fetch_preview(&self, remote_id: &str) -> Result<PathBuf, AcquisitionError> {
        let entry = self
            .store
            .find(remote_id)
            .ok_or_else(|| AcquisitionError::NotFound(remote_id.to_string()))?;
        let url = entry
            .preview_url
            .ok_or_else(|| AcquisitionError::NotFound(format!("preview for {remote_id}")))?;

        let cache_root = canonical_root(&self.config.preview_cache)?;
        let path = cache_root.join(format!("{}.jpg", sanitize_dir_name(remote_id)));

        if !path.is_file() {
            let bytes = self.remote.fetch_preview(&url).await?;
            let partial = path.with_extension("jpg.part");
            tokio::fs::write(&partial, &bytes).await?;
            tokio::fs::rename(&partial, &path).await?;
            debug!("Cached preview for {} at {}", remote_id, path.display());
        }

        let path = ensure_contained(&cache_root, &path)?;
        self.store.set_preview(remote_id, path.clone());
        Ok(path)
    }

    /// Installed maps under the managed root
    pub fn installed(&self) -> Result<Vec<InstalledMapEntry>, AcquisitionError> {
        discover_installed(&self.config.maps_root)
    }

    /// Remove an installed map
    pub fn uninstall(&self, path: &Path) -> Result<PathBuf, AcquisitionError> {
        uninstall(&self.config.maps_root, path)
    }
}

async fn run_download(
    remote: &dyn RemoteCatalog,
    entry: &DiscoveredContentEntry,
    release: &Release,
    maps_root: PathBuf,
    tx: Arc<watch::Sender<DownloadState>>,
) -> Result<InstalledMapEntry, AcquisitionError> {
    let progress_tx = tx.clone();
    let report = move |progress: DownloadProgress| {
        progress_tx.send_modify(|s| s.progress = progress);
    };
    let bytes = remote.download(release, &report).await?;

    if let Some(expected) = &release.digest {
        verify_digest(&bytes, expected)?;
    }

    tx.send_modify(|s| s.phase = DownloadPhase::Extracting);

    let info = MapInfo {
        title: entry.title.clone(),
        author: entry.author.clone(),
        description: entry.description.clone(),
        remote_id: Some(entry.remote_id.clone()),
        version: Some(release.version.clone()),
    };

    let install = tokio::task::spawn_blocking(move || {
        let staged = stage_archive(&bytes, &maps_root)?;
        tx.send_modify(|s| s.phase = DownloadPhase::Installing);
        staged.install(&info)
    });

    match install.await {
        Ok(result) => result,
        Err(e) => Err(AcquisitionError::Io(std::io::Error::other(e.to_string()))),
    }
}
