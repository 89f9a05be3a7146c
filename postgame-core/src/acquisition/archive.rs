//! Archive extraction with containment checks
//!
//! Supports `.zip` and `.tar.gz`, detected by magic bytes. Every member
//! name is validated before anything is written, and every written file's
//! parent directory is re-checked after canonicalization. Symlink and
//! hard-link members are refused outright.

use flate2::read::GzDecoder;
use sha2::{Digest, Sha256};
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use super::paths::{canonical_root, ensure_contained, safe_relative_path};
use crate::error::AcquisitionError;

/// Map payload file extensions
pub const MAP_EXTENSIONS: &[&str] = &["upk", "udk"];

const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    TarGz,
}

/// Detect the archive format from its leading bytes
pub fn detect_kind(bytes: &[u8]) -> Result<ArchiveKind, AcquisitionError> {
    if bytes.starts_with(b"PK\x03\x04") || bytes.starts_with(b"PK\x05\x06") {
        Ok(ArchiveKind::Zip)
    } else if bytes.starts_with(&[0x1f, 0x8b]) {
        Ok(ArchiveKind::TarGz)
    } else {
        Err(AcquisitionError::MalformedArchive {
            message: "unrecognized archive format (expected zip or tar.gz)".to_string(),
        })
    }
}

/// True if the path has a map payload extension
pub fn is_map_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| MAP_EXTENSIONS.iter().any(|m| ext.eq_ignore_ascii_case(m)))
}

/// Verify a `sha256:<hex>` digest against the archive bytes
pub fn verify_digest(bytes: &[u8], expected: &str) -> Result<(), AcquisitionError> {
    let expected_hex = expected.strip_prefix("sha256:").ok_or_else(|| {
        AcquisitionError::MalformedArchive {
            message: format!("unsupported digest format: {expected}"),
        }
    })?;

    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let actual_hex = hex::encode(hasher.finalize());

    if !actual_hex.eq_ignore_ascii_case(expected_hex) {
        return Err(AcquisitionError::DigestMismatch {
            expected: expected.to_string(),
            actual: format!("sha256:{actual_hex}"),
        });
    }

    tracing::debug!("Verified digest: {}", expected);
    Ok(())
}

/// Extract an archive into `dest`, returning the files written
///
/// Any escaping member aborts the extraction. The caller owns cleanup of
/// `dest` on error.
pub fn extract_archive(bytes: &[u8], dest: &Path) -> Result<Vec<PathBuf>, AcquisitionError> {
    let dest = canonical_root(dest)?;
    match detect_kind(bytes)? {
        ArchiveKind::Zip => extract_zip(bytes, &dest),
        ArchiveKind::TarGz => extract_tar_gz(bytes, &dest),
    }
}

fn extract_zip(bytes: &[u8], dest: &Path) -> Result<Vec<PathBuf>, AcquisitionError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;

    // Validate every member before the first write
    let mut members = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let file = archive.by_index(i)?;
        if file.unix_mode().is_some_and(|mode| mode & S_IFMT == S_IFLNK) {
            return Err(AcquisitionError::MalformedArchive {
                message: format!("symbolic link member refused: {}", file.name()),
            });
        }
        let relative = safe_relative_path(file.name(), dest)?;
        members.push((i, relative, file.is_dir()));
    }

    let mut written = Vec::new();
    for (i, relative, is_dir) in members {
        if relative.as_os_str().is_empty() {
            continue;
        }
        let target = dest.join(&relative);
        if is_dir {
            create_contained_dir(dest, &target)?;
            continue;
        }
        let mut file = archive.by_index(i)?;
        written.push(write_member(dest, &target, &mut file)?);
    }

    Ok(written)
}

fn extract_tar_gz(bytes: &[u8], dest: &Path) -> Result<Vec<PathBuf>, AcquisitionError> {
    let mut archive = tar::Archive::new(GzDecoder::new(bytes));
    let mut written = Vec::new();

    let entries = archive.entries().map_err(malformed)?;
    for entry in entries {
        let mut entry = entry.map_err(malformed)?;
        let name = entry.path().map_err(malformed)?.to_string_lossy().into_owned();
        let relative = safe_relative_path(&name, dest)?;
        if relative.as_os_str().is_empty() {
            continue;
        }

        let kind = entry.header().entry_type();
        let target = dest.join(&relative);
        if kind.is_dir() {
            create_contained_dir(dest, &target)?;
        } else if kind.is_file() {
            written.push(write_member(dest, &target, &mut entry)?);
        } else if kind.is_symlink() || kind.is_hard_link() {
            return Err(AcquisitionError::MalformedArchive {
                message: format!("link member refused: {name}"),
            });
        } else {
            tracing::debug!("Skipping special archive member {}", name);
        }
    }

    Ok(written)
}

fn malformed(err: std::io::Error) -> AcquisitionError {
    AcquisitionError::MalformedArchive {
        message: err.to_string(),
    }
}

fn create_contained_dir(root: &Path, dir: &Path) -> Result<(), AcquisitionError> {
    std::fs::create_dir_all(dir)?;
    ensure_contained(root, dir)?;
    Ok(())
}

fn write_member(root: &Path, target: &Path, reader: &mut dyn Read) -> Result<PathBuf, AcquisitionError> {
    let parent = target.parent().unwrap_or(root);
    if parent != root {
        create_contained_dir(root, parent)?;
    }
    if target.symlink_metadata().is_ok_and(|m| m.file_type().is_symlink()) {
        return Err(AcquisitionError::PathEscape {
            path: target.to_path_buf(),
            root: root.to_path_buf(),
        });
    }

    let mut out = std::fs::File::create(target)?;
    std::io::copy(reader, &mut out)?;
    ensure_contained(root, target)
}
