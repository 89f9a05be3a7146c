//! Community map acquisition
//!
//! Searches a remote catalog, downloads releases and installs them under
//! a single managed root.
//!
//! # Architecture
//!
//! ```text
//! search(query) ──► RemoteCatalog::search ──► DiscoveredContentStore
//!                   (generation-tagged;        (stale responses dropped)
//!                    no cancellation)
//!
//! download(entry, release)
//!   │ try_acquire slot (fail fast when all are taken)
//!   ▼
//! Downloading ──► Extracting ──► Installing ──► Installed | Failed
//!  (progress)     maps/.staging-*   rename into maps/<title>/
//! ```
//!
//! Every path written under the managed root is canonicalized and checked
//! for containment first. A path that escapes aborts the install and the
//! staging directory is removed.

mod archive;
mod discovered;
mod installed;
mod paths;
mod pipeline;
mod remote;

pub use archive::{detect_kind, extract_archive, is_map_file, verify_digest, ArchiveKind, MAP_EXTENSIONS};
pub use discovered::{DiscoveredContentStore, SearchPhase, SearchState};
pub use installed::{
    discover_installed, stage_archive, uninstall, InstalledMapEntry, MapInfo, MetadataSource,
    StagedInstall, SIDECAR_FILE,
};
pub use paths::{canonical_root, ensure_contained, safe_relative_path, sanitize_dir_name};
pub use pipeline::{
    AcquisitionPipeline, DownloadHandle, DownloadPhase, DownloadState, PipelineConfig,
    PipelineNotice, SearchTicket, MAX_CONCURRENT_DOWNLOADS,
};
pub use remote::{
    DiscoveredContentEntry, DownloadProgress, HttpRemoteCatalog, ProgressCallback, Release,
    RemoteCatalog, SearchPage, DEFAULT_PAGE_SIZE, DEFAULT_REMOTE_URL,
};
