//! Config command - view and change settings.json

use std::path::Path;

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use tronpay_core::config::{Config, SETTINGS_FILE};
use tronpay_core::ClientEvent;

use super::{get_tronpay_dir, open_event_log, record};
use crate::output;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show effective settings
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set a key, e.g. `tp config set polling.maxAttempts 30` (empty value unsets)
    Set { key: String, value: String },
    /// Print the settings file path
    Path,
}

pub fn run(command: Option<ConfigCommands>) -> Result<()> {
    let events = open_event_log();
    record(&events, ClientEvent::command("config"));

    let tronpay_dir = get_tronpay_dir()?;
    std::fs::create_dir_all(&tronpay_dir)?;

    match command.unwrap_or(ConfigCommands::Show { json: false }) {
        ConfigCommands::Show { json } => show(&tronpay_dir, json),
        ConfigCommands::Set { key, value } => {
            let mut config = Config::load(&tronpay_dir)?;
            config.set(&key, &value)?;
            config.save(&tronpay_dir)?;
            output::success(&format!("Set {}", key));
            Ok(())
        }
        ConfigCommands::Path => {
            println!("{}", tronpay_dir.join(SETTINGS_FILE).display());
            Ok(())
        }
    }
}

fn show(tronpay_dir: &Path, json: bool) -> Result<()> {
    let config = Config::load(tronpay_dir)?;
    let entries = config.entries();

    if json {
        let map: serde_json::Map<String, serde_json::Value> = entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v)))
            .collect();
        println!("{}", serde_json::to_string_pretty(&map)?);
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["Key", "Value"]);
    for (key, value) in entries {
        table.add_row(vec![key.to_string(), value]);
    }
    println!("{}", table);
    if config.demo_mode {
        println!("{}", "Demo mode is ON".yellow());
    }
    Ok(())
}
