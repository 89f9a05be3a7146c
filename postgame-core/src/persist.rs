//! Atomic JSON snapshot writes

use serde::Serialize;
use std::io::Write;
use std::path::Path;

use crate::error::AutomationError;

/// Serialize `value` and atomically replace `path` with it
///
/// The document is written to a temporary file in the same directory and
/// renamed over the target, so readers never observe a half-written file.
pub(crate) fn write_json_atomic<T: Serialize>(
    path: &Path,
    value: &T,
    what: &'static str,
) -> Result<(), AutomationError> {
    let content = serde_json::to_string_pretty(value)
        .map_err(|source| AutomationError::Serialize { what, source })?;

    let persistence = |source: std::io::Error| AutomationError::Persistence {
        what,
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(persistence)?;

    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(persistence)?;
    temp.write_all(content.as_bytes()).map_err(persistence)?;
    temp.persist(path).map_err(|e| persistence(e.error))?;

    tracing::debug!("Wrote {} to {}", what, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_replaces_existing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("data.json");
        std::fs::write(&path, "old").unwrap();

        write_json_atomic(&path, &vec![1, 2, 3], "numbers").unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: Vec<i32> = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed, vec![1, 2, 3]);
    }

    #[test]
    fn test_unwritable_target_is_persistence_error() {
        let temp = TempDir::new().unwrap();
        // A directory cannot be replaced by a file
        let target = temp.path().join("occupied");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("keep"), "x").unwrap();

        let err = write_json_atomic(&target, &1, "value").unwrap_err();
        assert!(matches!(err, AutomationError::Persistence { .. }));
    }
}
