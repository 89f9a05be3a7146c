//! Settings commands

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};

use postgame_core::effective_delay;
use postgame_core::settings::{
    AutomationSettings, DataPaths, MapMode, SettingsFile, SettingsProvider, ALL_KEYS,
};

/// Settings subcommand
#[derive(Parser, Debug)]
pub struct SettingsCommand {
    #[clap(subcommand)]
    pub command: SettingsSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum SettingsSubcommand {
    /// Show stored values and what the automation will use
    Show,

    /// Store a value
    Set { key: String, value: String },

    /// Remove a value so it takes its default
    Unset { key: String },
}

impl SettingsCommand {
    pub fn execute(self, paths: &DataPaths) -> Result<()> {
        let file = SettingsFile::new(&paths.settings_file);
        let settings = file.load()?;

        match self.command {
            SettingsSubcommand::Show => {
                println!("Stored ({}):", file.path().display());
                for key in ALL_KEYS {
                    match settings.get(key) {
                        Some(value) => println!("  {key} = {value}"),
                        None => println!("  {key} (unset)"),
                    }
                }

                let effective = AutomationSettings::read(&settings);
                println!();
                println!("Effective:");
                println!("  enabled:      {}", effective.enabled);
                println!("  mode:         {}", effective.mode);
                println!("  freeplay map: {}", effective.freeplay_map);
                println!(
                    "  quick pick:   {}",
                    effective.quick_pick.as_deref().unwrap_or("-")
                );
                println!(
                    "  workshop map: {}",
                    effective
                        .workshop_path
                        .as_ref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "-".to_string())
                );
                for mode in [MapMode::Freeplay, MapMode::Scenario, MapMode::Workshop] {
                    println!(
                        "  {} delay: {:?}",
                        mode,
                        effective_delay(effective.delay_for(mode))
                    );
                }
                println!(
                    "  requeue:      {} after {:?}",
                    effective.auto_requeue,
                    effective_delay(effective.requeue_delay_secs)
                );
                Ok(())
            }
            SettingsSubcommand::Set { key, value } => {
                check_key(&key)?;
                settings.set(&key, value);
                file.save(&settings)?;
                println!("Saved {key}");
                Ok(())
            }
            SettingsSubcommand::Unset { key } => {
                check_key(&key)?;
                settings.unset(&key);
                file.save(&settings)?;
                println!("Cleared {key}");
                Ok(())
            }
        }
    }
}

fn check_key(key: &str) -> Result<()> {
    if !ALL_KEYS.contains(&key) {
        bail!("Unknown setting {}. Known settings: {}", key, ALL_KEYS.join(", "));
    }
    Ok(())
}
