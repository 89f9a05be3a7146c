//! Installed community maps
//!
//! Layout under the managed root:
//!
//! ```text
//! maps/
//!   Obstacle Course/
//!     course.upk
//!     map_info.json     ← sidecar metadata (optional)
//!   .staging-XXXX/      ← in-progress install, skipped by discovery
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::archive::{extract_archive, is_map_file};
use super::paths::{canonical_root, ensure_contained, sanitize_dir_name};
use crate::error::AcquisitionError;

/// Sidecar metadata file written next to an installed map
pub const SIDECAR_FILE: &str = "map_info.json";

const STAGING_PREFIX: &str = ".staging-";
const BACKUP_PREFIX: &str = ".replacing-";

/// Contents of `map_info.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MapInfo {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl MapInfo {
    fn read(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str::<MapInfo>(&content) {
            Ok(info) if !info.title.trim().is_empty() => Some(info),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Ignoring unreadable sidecar {}: {}", path.display(), e);
                None
            }
        }
    }
}

/// Where an installed map's title and author came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetadataSource {
    SidecarFile,
    DirectoryName,
}

/// A locally installed community map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledMapEntry {
    pub title: String,
    pub author: String,
    /// Canonical path of the map file, always below the managed root
    pub file_path: PathBuf,
    pub metadata_source: MetadataSource,
    #[serde(default)]
    pub remote_id: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

fn is_staging_name(name: &str) -> bool {
    name.starts_with('.')
}

/// Scan the managed root for installed maps
///
/// Each candidate is canonicalized and must resolve inside `root`;
/// anything redirected elsewhere (e.g. by a symlink) is rejected and
/// logged. A missing root yields no entries. An install folder holding
/// several package files is listed once, by its lexicographically first
/// map file.
pub fn discover_installed(root: &Path) -> Result<Vec<InstalledMapEntry>, AcquisitionError> {
    if !root.exists() {
        return Ok(Vec::new());
    }
    let root = root.canonicalize()?;

    // install folder (or loose file) -> chosen map file
    let mut payloads: BTreeMap<PathBuf, PathBuf> = BTreeMap::new();
    let walker = WalkDir::new(&root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_staging_name(&e.file_name().to_string_lossy()));

    for dir_entry in walker {
        let dir_entry = match dir_entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping unreadable path during scan: {}", e);
                continue;
            }
        };

        if dir_entry.file_type().is_dir() || !is_map_file(dir_entry.path()) {
            continue;
        }

        let file_path = match ensure_contained(&root, dir_entry.path()) {
            Ok(path) => path,
            Err(e) => {
                e.log_if_security_critical();
                continue;
            }
        };

        if !file_path.is_file() {
            continue;
        }

        let key = install_dir(&root, &file_path).unwrap_or_else(|| file_path.clone());
        match payloads.get(&key) {
            Some(chosen) if *chosen <= file_path => {
                tracing::trace!("Extra package {} in {}", file_path.display(), key.display());
            }
            _ => {
                payloads.insert(key, file_path);
            }
        }
    }

    let mut entries: Vec<InstalledMapEntry> = payloads
        .values()
        .map(|file_path| describe(&root, file_path))
        .collect();
    entries.sort_by(|a, b| {
        a.title
            .to_lowercase()
            .cmp(&b.title.to_lowercase())
            .then_with(|| a.file_path.cmp(&b.file_path))
    });
    tracing::debug!("Discovered {} installed maps under {}", entries.len(), root.display());
    Ok(entries)
}

/// Top-level folder under `root` that holds `path`
///
/// `None` for a loose file sitting directly in the root.
fn install_dir(root: &Path, path: &Path) -> Option<PathBuf> {
    let relative = path.strip_prefix(root).ok()?;
    let mut components = relative.components();
    let first = components.next()?;
    if path.is_file() && components.next().is_none() {
        return None;
    }
    Some(root.join(first))
}

fn describe(root: &Path, file_path: &Path) -> InstalledMapEntry {
    let folder = install_dir(root, file_path);

    let sidecar = folder
        .as_deref()
        .and_then(|dir| MapInfo::read(&dir.join(SIDECAR_FILE)))
        .or_else(|| MapInfo::read(&file_path.with_extension("json")));

    match sidecar {
        Some(info) => InstalledMapEntry {
            title: info.title,
            author: info.author,
            file_path: file_path.to_path_buf(),
            metadata_source: MetadataSource::SidecarFile,
            remote_id: info.remote_id,
            version: info.version,
        },
        None => {
            let name_source = match &folder {
                Some(dir) => dir.file_name(),
                None => file_path.file_stem(),
            };
            InstalledMapEntry {
                title: name_source
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                author: String::new(),
                file_path: file_path.to_path_buf(),
                metadata_source: MetadataSource::DirectoryName,
                remote_id: None,
                version: None,
            }
        }
    }
}

/// An archive extracted into a staging directory inside the managed root
///
/// Dropping it removes the staging directory and everything in it.
pub struct StagedInstall {
    root: PathBuf,
    staging: tempfile::TempDir,
    content: PathBuf,
}

/// Extract an archive into a fresh staging directory under `root`
///
/// A single top-level directory in the archive is stripped. The archive
/// must contain at least one map payload file.
pub fn stage_archive(bytes: &[u8], root: &Path) -> Result<StagedInstall, AcquisitionError> {
    let root = canonical_root(root)?;
    let staging = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir_in(&root)?;
    let extract_dir = staging.path().join("content");

    let written = extract_archive(bytes, &extract_dir)?;
    if !written.iter().any(|p| is_map_file(p)) {
        return Err(AcquisitionError::MalformedArchive {
            message: format!("no map file ({}) in archive", super::archive::MAP_EXTENSIONS.join(", ")),
        });
    }

    let content = single_subdirectory(&extract_dir)?.unwrap_or(extract_dir);
    Ok(StagedInstall {
        root,
        staging,
        content,
    })
}

fn single_subdirectory(dir: &Path) -> Result<Option<PathBuf>, AcquisitionError> {
    let mut children = std::fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
    if children.len() != 1 {
        return Ok(None);
    }
    let child = children.remove(0);
    Ok(child.file_type()?.is_dir().then(|| child.path()))
}

impl StagedInstall {
    pub fn staging_dir(&self) -> &Path {
        self.staging.path()
    }

    /// Write the sidecar and move the content into place
    ///
    /// An existing install with the same directory name is replaced. It is
    /// set aside first and only deleted once the new content is in place.
    pub fn install(self, info: &MapInfo) -> Result<InstalledMapEntry, AcquisitionError> {
        let sidecar = serde_json::to_string_pretty(info)?;
        std::fs::write(self.content.join(SIDECAR_FILE), sidecar)?;

        let target = self.root.join(sanitize_dir_name(&info.title));
        let backup = if target.symlink_metadata().is_ok() {
            let existing = ensure_contained(&self.root, &target)?;
            let holder = tempfile::Builder::new()
                .prefix(BACKUP_PREFIX)
                .tempdir_in(&self.root)?;
            let set_aside = holder.path().join("previous");
            std::fs::rename(&target, &set_aside)?;
            tracing::info!("Replacing existing install at {}", existing.display());
            Some((holder, set_aside))
        } else {
            None
        };

        if let Err(e) = std::fs::rename(&self.content, &target) {
            if let Some((_, set_aside)) = &backup {
                if let Err(restore) = std::fs::rename(set_aside, &target) {
                    tracing::error!("Could not restore {}: {}", target.display(), restore);
                }
            }
            return Err(e.into());
        }
        // Dropping the holder deletes the previous install
        drop(backup);

        let result = (|| -> Result<InstalledMapEntry, AcquisitionError> {
            let installed_dir = ensure_contained(&self.root, &target)?;
            let map_file = WalkDir::new(&installed_dir)
                .follow_links(false)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file() && is_map_file(e.path()))
                .map(|e| e.into_path())
                .min()
                .ok_or_else(|| AcquisitionError::MalformedArchive {
                    message: "map file vanished during install".to_string(),
                })?;
            let file_path = ensure_contained(&self.root, &map_file)?;
            Ok(describe(&self.root, &file_path))
        })();

        if result.is_err() {
            let _ = std::fs::remove_dir_all(&target);
        }
        result
    }
}

/// Remove an installed map
///
/// `path` may be the map file or any path inside its install folder; the
/// whole top-level install folder goes. A loose map file directly in the
/// root is removed on its own. Returns the removed path.
pub fn uninstall(root: &Path, path: &Path) -> Result<PathBuf, AcquisitionError> {
    let root = root.canonicalize()?;
    let resolved = ensure_contained(&root, path)?;

    match install_dir(&root, &resolved) {
        Some(dir) => {
            std::fs::remove_dir_all(&dir)?;
            tracing::info!("Uninstalled {}", dir.display());
            Ok(dir)
        }
        None => {
            std::fs::remove_file(&resolved)?;
            tracing::info!("Uninstalled {}", resolved.display());
            Ok(resolved)
        }
    }
}
