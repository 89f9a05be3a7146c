use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Locations of every file the automation core persists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    pub root: PathBuf,
    pub catalog_file: PathBuf,
    pub usage_file: PathBuf,
    pub settings_file: PathBuf,
    /// Managed root for installed community maps
    pub maps_root: PathBuf,
    pub preview_cache: PathBuf,
}

impl DataPaths {
    /// Lay out the standard files beneath a data directory
    pub fn at(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            catalog_file: root.join("catalog.json"),
            usage_file: root.join("usage.json"),
            settings_file: root.join("settings.yaml"),
            maps_root: root.join("maps"),
            preview_cache: root.join("previews"),
            root,
        }
    }

    /// Resolve the platform data directory
    pub fn discover() -> Result<Self> {
        let root = directories::ProjectDirs::from("io", "postgame", "postgame")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .context("Could not determine data directory")?;
        Ok(Self::at(root))
    }

    /// Create the data, maps and preview directories
    pub fn ensure(&self) -> Result<()> {
        for dir in [&self.root, &self.maps_root, &self.preview_cache] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }
        Ok(())
    }
}
