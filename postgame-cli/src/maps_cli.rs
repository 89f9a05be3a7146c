//! Community map commands

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};
use tokio::runtime::Handle;

use postgame_core::acquisition::{
    AcquisitionPipeline, DiscoveredContentEntry, DownloadPhase, HttpRemoteCatalog,
    InstalledMapEntry, PipelineConfig, SearchPhase, DEFAULT_REMOTE_URL,
};
use postgame_core::settings::DataPaths;

/// Community map subcommand
#[derive(Parser, Debug)]
pub struct MapsCommand {
    #[clap(subcommand)]
    pub command: MapsSubcommand,

    /// Remote catalog base URL
    #[clap(long, global = true, default_value = DEFAULT_REMOTE_URL)]
    remote: String,
}

#[derive(Subcommand, Debug)]
pub enum MapsSubcommand {
    /// Search the remote catalog
    Search {
        query: String,

        /// Result page, starting at 1
        #[clap(long, default_value = "1")]
        page: u32,

        /// Also cache each result's preview image
        #[clap(long)]
        previews: bool,

        #[clap(long)]
        json: bool,
    },

    /// Download and install a search result
    Install {
        query: String,

        /// Which result to install, starting at 1
        #[clap(long, default_value = "1")]
        pick: usize,

        /// Release version; defaults to the newest
        #[clap(long)]
        version: Option<String>,
    },

    /// List installed maps
    Installed {
        #[clap(long)]
        json: bool,
    },

    /// Remove an installed map
    Uninstall { path: PathBuf },
}

impl MapsCommand {
    pub async fn execute(self, paths: &DataPaths) -> Result<()> {
        let remote = Arc::new(HttpRemoteCatalog::new(self.remote)?);
        let config = PipelineConfig::new(&paths.maps_root, &paths.preview_cache);
        let pipeline = AcquisitionPipeline::new(remote, config, Handle::current());

        match self.command {
            MapsSubcommand::Search {
                query,
                page,
                previews,
                json,
            } => {
                let entries = search(&pipeline, &query, page).await?;
                if previews {
                    for entry in entries.iter().filter(|e| e.preview_url.is_some()) {
                        if let Err(e) = pipeline.fetch_preview(&entry.remote_id).await {
                            tracing::warn!("No preview for {}: {}", entry.title, e);
                        }
                    }
                }
                // Re-read so cached preview paths show up
                let state = pipeline.search_state();
                if json {
                    println!("{}", serde_json::to_string_pretty(&state.entries)?);
                } else {
                    print_results(&state.entries);
                    println!("Page {} of {}", state.page, state.total_pages.max(1));
                }
                Ok(())
            }
            MapsSubcommand::Install {
                query,
                pick,
                version,
            } => {
                let entries = search(&pipeline, &query, 1).await?;
                let entry = entries
                    .get(pick.saturating_sub(1))
                    .ok_or_else(|| anyhow!("No result #{} for {:?}", pick, query))?;
                let release = match &version {
                    Some(wanted) => entry.releases.iter().find(|r| &r.version == wanted),
                    None => entry.releases.first(),
                }
                .ok_or_else(|| anyhow!("{} has no matching release", entry.title))?;

                println!("Installing {} {}", entry.title, release.version);
                let handle = pipeline.download(entry, release)?;

                let mut updates = handle.subscribe();
                let watcher = tokio::spawn(async move {
                    let mut last = None;
                    while updates.changed().await.is_ok() {
                        let state = updates.borrow_and_update().clone();
                        let label = phase_label(&state.phase);
                        if last.as_deref() != Some(label) {
                            eprintln!("  {label}");
                            last = Some(label.to_string());
                        }
                        if state.phase.is_finished() {
                            break;
                        }
                    }
                });

                let result = handle.wait().await;
                watcher.abort();

                let installed = result?;
                println!("Installed at {}", installed.file_path.display());
                Ok(())
            }
            MapsSubcommand::Installed { json } => {
                let installed = pipeline.installed()?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&installed)?);
                } else if installed.is_empty() {
                    println!("No maps installed in {}", pipeline.maps_root().display());
                } else {
                    print_installed(&installed);
                }
                Ok(())
            }
            MapsSubcommand::Uninstall { path } => {
                let removed = pipeline.uninstall(&path)?;
                println!("Removed {}", removed.display());
                Ok(())
            }
        }
    }
}

async fn search(
    pipeline: &AcquisitionPipeline,
    query: &str,
    page: u32,
) -> Result<Vec<DiscoveredContentEntry>> {
    pipeline.search(query, page).finished().await;

    let state = pipeline.search_state();
    match state.phase {
        SearchPhase::Results => Ok(state.entries),
        SearchPhase::Failed(message) => bail!("Search failed: {}", message),
        SearchPhase::Idle | SearchPhase::Searching => bail!("Search did not complete"),
    }
}

fn phase_label(phase: &DownloadPhase) -> &'static str {
    match phase {
        DownloadPhase::Downloading => "downloading",
        DownloadPhase::Extracting => "extracting",
        DownloadPhase::Installing => "installing",
        DownloadPhase::Installed(_) => "installed",
        DownloadPhase::Failed(_) => "failed",
    }
}

#[derive(Tabled)]
struct ResultRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Author")]
    author: String,
    #[tabled(rename = "Latest")]
    latest: String,
    #[tabled(rename = "Preview")]
    preview: String,
}

fn print_results(entries: &[DiscoveredContentEntry]) {
    if entries.is_empty() {
        println!("No maps found.");
        return;
    }

    let rows: Vec<ResultRow> = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| ResultRow {
            index: i + 1,
            title: entry.title.clone(),
            author: entry.author.clone(),
            latest: entry
                .releases
                .first()
                .map(|r| r.version.clone())
                .unwrap_or_else(|| "-".to_string()),
            preview: entry
                .preview_image
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()))
        .to_string();
    println!("{table}");
}

#[derive(Tabled)]
struct InstalledRow {
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Author")]
    author: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Path")]
    path: String,
}

fn print_installed(installed: &[InstalledMapEntry]) {
    let rows: Vec<InstalledRow> = installed
        .iter()
        .map(|entry| InstalledRow {
            title: entry.title.clone(),
            author: entry.author.clone(),
            version: entry.version.clone().unwrap_or_default(),
            path: entry.file_path.display().to_string(),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()))
        .to_string();
    println!("{table}");
}
