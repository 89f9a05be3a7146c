//! Practice scenario commands
//!
//! Browse, filter and edit the scenario catalog, list favorites and merge
//! a catalog refresh.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeSet;
use std::path::Path;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

use postgame_core::catalog::{
    fetch_snapshot, is_snapshot_stale, normalize_code, CatalogSnapshot, CatalogStore,
    DifficultyTier, ScenarioRecord, SNAPSHOT_MAX_AGE,
};
use postgame_core::resolution::{self, Filter, Sort, SortKey};
use postgame_core::settings::DataPaths;
use postgame_core::usage::UsageLedger;

/// Scenario subcommand
#[derive(Parser, Debug)]
pub struct PacksCommand {
    #[clap(subcommand)]
    pub command: PacksSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum PacksSubcommand {
    /// List scenarios matching every given filter
    List {
        /// Substring of name, code, creator or tag
        #[clap(long)]
        search: Option<String>,

        /// Accepted difficulty tiers (comma-separated)
        #[clap(long, value_delimiter = ',')]
        difficulty: Vec<String>,

        /// Exact tag
        #[clap(long)]
        tag: Option<String>,

        /// Minimum shot count
        #[clap(long)]
        min_shots: Option<u32>,

        /// Only scenarios with a video
        #[clap(long)]
        video: bool,

        /// Sort key (name, creator, difficulty, shots, likes, plays)
        #[clap(long, default_value = "name")]
        sort: SortKey,

        /// Sort descending
        #[clap(long)]
        desc: bool,

        /// Output as JSON
        #[clap(long)]
        json: bool,
    },

    /// Show one scenario
    Show {
        code: String,

        #[clap(long)]
        json: bool,
    },

    /// Most-loaded scenarios
    Favorites {
        #[clap(long, default_value = "10")]
        limit: usize,

        #[clap(long)]
        json: bool,
    },

    /// List every tag in use
    Tags,

    /// Add a scenario of your own
    Add {
        /// Code in XXXX-XXXX-XXXX-XXXX form
        code: String,

        name: String,

        #[clap(flatten)]
        fields: EditFields,
    },

    /// Edit a scenario; imported scenarios keep the edit across refreshes
    Edit {
        code: String,

        #[clap(long)]
        name: Option<String>,

        #[clap(flatten)]
        fields: EditFields,
    },

    /// Delete a scenario
    Remove { code: String },

    /// Merge a catalog snapshot from a URL or a local file
    Refresh {
        source: String,

        /// Skip the refresh unless the local catalog is older than a week
        #[clap(long)]
        if_stale: bool,
    },
}

/// Optional user-editable fields
#[derive(Parser, Debug)]
pub struct EditFields {
    #[clap(long)]
    creator: Option<String>,

    #[clap(long)]
    description: Option<String>,

    /// Difficulty tier label, e.g. "Grand Champion"
    #[clap(long)]
    difficulty: Option<String>,

    /// Tags (comma-separated); replaces existing tags
    #[clap(long, value_delimiter = ',')]
    tags: Option<Vec<String>>,

    #[clap(long)]
    shots: Option<u32>,

    #[clap(long)]
    video_url: Option<String>,
}

impl EditFields {
    fn apply(self, record: &mut ScenarioRecord) -> Result<()> {
        if let Some(creator) = self.creator {
            record.creator = creator;
        }
        if let Some(description) = self.description {
            record.description = description;
        }
        if let Some(label) = self.difficulty {
            record.difficulty = parse_tier(&label)?;
        }
        if let Some(tags) = self.tags {
            record.tags = tags
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
        }
        if let Some(shots) = self.shots {
            record.shot_count = shots;
        }
        if let Some(url) = self.video_url {
            record.video_url = Some(url).filter(|u| !u.trim().is_empty());
        }
        Ok(())
    }
}

impl PacksCommand {
    pub async fn execute(self, paths: &DataPaths) -> Result<()> {
        let catalog = CatalogStore::load_or_defaults(&paths.catalog_file)?;

        match self.command {
            PacksSubcommand::List {
                search,
                difficulty,
                tag,
                min_shots,
                video,
                sort,
                desc,
                json,
            } => {
                let difficulties = difficulty
                    .iter()
                    .map(|label| parse_tier(label))
                    .collect::<Result<BTreeSet<_>>>()?;
                let filter = Filter {
                    search,
                    difficulties,
                    tag,
                    min_shots,
                    video_only: video,
                };
                let sort = Sort {
                    key: sort,
                    descending: desc,
                };
                let records = resolution::filter(&catalog, &filter, sort).into_vec();
                print_records(&records, json)
            }
            PacksSubcommand::Show { code, json } => {
                let code = normalize_code(&code);
                let record = catalog
                    .get(&code)
                    .ok_or_else(|| anyhow!("Scenario {} not found", code))?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&record)?);
                } else {
                    print_details(&record);
                }
                Ok(())
            }
            PacksSubcommand::Favorites { limit, json } => {
                let ledger = UsageLedger::open(&paths.usage_file)?;
                let favorites = resolution::ranked_favorites(&catalog, &ledger, limit);
                if favorites.is_empty() && !json {
                    println!("No scenarios loaded yet.");
                    return Ok(());
                }
                print_favorites(&favorites, &ledger, json)
            }
            PacksSubcommand::Tags => {
                for tag in catalog.available_tags() {
                    println!("{tag}");
                }
                Ok(())
            }
            PacksSubcommand::Add { code, name, fields } => {
                let mut record = ScenarioRecord::new(code, name);
                fields.apply(&mut record)?;
                let code = record.code.clone();
                catalog.add_user_scenario(record)?;
                catalog.save(&paths.catalog_file)?;
                println!("Added {}", normalize_code(&code));
                Ok(())
            }
            PacksSubcommand::Edit { code, name, fields } => {
                let code = normalize_code(&code);
                let mut record = catalog
                    .get(&code)
                    .ok_or_else(|| anyhow!("Scenario {} not found", code))?;
                if let Some(name) = name {
                    record.name = name;
                }
                fields.apply(&mut record)?;
                catalog.update_scenario(&code, &record)?;
                catalog.save(&paths.catalog_file)?;
                println!("Updated {code}");
                Ok(())
            }
            PacksSubcommand::Remove { code } => {
                let code = normalize_code(&code);
                let removed = catalog.remove_scenario(&code)?;
                catalog.save(&paths.catalog_file)?;
                println!("Removed {} ({})", removed.name, removed.code);
                Ok(())
            }
            PacksSubcommand::Refresh { source, if_stale } => {
                if if_stale && !is_snapshot_stale(&paths.catalog_file, SNAPSHOT_MAX_AGE) {
                    println!("Catalog is up to date.");
                    return Ok(());
                }
                let snapshot = load_refresh(&source).await?;
                println!("Merging {} scenarios from {}", snapshot.scenarios.len(), source);
                let report = catalog.merge_catalog_refresh(snapshot.scenarios);
                catalog.save(&paths.catalog_file)?;
                println!(
                    "{} new, {} replaced, {} kept your edits, {} of your own untouched",
                    report.inserted, report.replaced, report.stats_refreshed, report.preserved
                );
                Ok(())
            }
        }
    }
}

fn parse_tier(label: &str) -> Result<DifficultyTier> {
    DifficultyTier::from_label(label).ok_or_else(|| anyhow!("Unknown difficulty: {}", label))
}

async fn load_refresh(source: &str) -> Result<CatalogSnapshot> {
    if source.starts_with("http://") || source.starts_with("https://") {
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to create HTTP client")?;
        fetch_snapshot(&client, source).await
    } else {
        CatalogSnapshot::from_file(Path::new(source))
    }
}

#[derive(Tabled)]
struct ScenarioRow {
    #[tabled(rename = "Code")]
    code: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Creator")]
    creator: String,
    #[tabled(rename = "Difficulty")]
    difficulty: String,
    #[tabled(rename = "Shots")]
    shots: u32,
    #[tabled(rename = "Tags")]
    tags: String,
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let kept: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{kept}...")
    } else {
        text.to_string()
    }
}

fn print_records(records: &[ScenarioRecord], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No scenarios match.");
        return Ok(());
    }

    let rows: Vec<ScenarioRow> = records
        .iter()
        .map(|record| ScenarioRow {
            code: record.code.clone(),
            name: truncate(&record.name, 40),
            creator: record.creator.clone(),
            difficulty: record.difficulty.to_string(),
            shots: record.shot_count,
            tags: truncate(&record.tags.iter().cloned().collect::<Vec<_>>().join(", "), 30),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()))
        .to_string();

    println!("{table}");
    println!("{} scenario(s)", records.len());
    Ok(())
}

#[derive(Tabled)]
struct FavoriteRow {
    #[tabled(rename = "#")]
    rank: usize,
    #[tabled(rename = "Code")]
    code: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Loads")]
    loads: u64,
    #[tabled(rename = "Last loaded")]
    last_loaded: String,
}

fn print_favorites(favorites: &[ScenarioRecord], ledger: &UsageLedger, json: bool) -> Result<()> {
    let rows: Vec<FavoriteRow> = favorites
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let usage = ledger.get(&record.code);
            FavoriteRow {
                rank: i + 1,
                code: record.code.clone(),
                name: truncate(&record.name, 40),
                loads: usage.map(|u| u.load_count).unwrap_or(0),
                last_loaded: usage
                    .map(|u| u.last_loaded_at.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default(),
            }
        })
        .collect();

    if json {
        let values: Vec<serde_json::Value> = rows
            .iter()
            .map(|row| {
                serde_json::json!({
                    "code": row.code,
                    "name": row.name,
                    "loadCount": row.loads,
                    "lastLoadedAt": row.last_loaded,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&values)?);
        return Ok(());
    }

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()))
        .to_string();
    println!("{table}");
    Ok(())
}

fn print_details(record: &ScenarioRecord) {
    println!("{} ({})", record.name, record.code);
    if !record.creator.is_empty() {
        println!("  Creator:    {}", record.creator);
    }
    println!("  Difficulty: {}", record.difficulty);
    println!("  Shots:      {}", record.shot_count);
    if !record.tags.is_empty() {
        let tags: Vec<&str> = record.tags.iter().map(String::as_str).collect();
        println!("  Tags:       {}", tags.join(", "));
    }
    if let Some(url) = record.video_url.as_deref().filter(|_| record.has_video()) {
        println!("  Video:      {url}");
    }
    println!(
        "  Likes:      {}  Plays: {}",
        record.popularity.likes, record.popularity.plays
    );
    let edited = if record.is_user_modified { " (edited)" } else { "" };
    println!("  Origin:     {:?}{}", record.origin, edited);
    if !record.description.is_empty() {
        println!();
        println!("{}", record.description);
    }
}
