//! Logs command - inspect the client event log

use std::str::FromStr;

use anyhow::{anyhow, Result};
use chrono::{Duration, TimeZone, Utc};
use clap::Subcommand;
use colored::Colorize;

use tronpay_core::services::{EventRecord, EventSummary};
use tronpay_core::{EntryPoint, EventFilter, EventLog, TransactionKind};

use super::get_tronpay_dir;
use crate::output;

#[derive(Subcommand)]
pub enum LogsCommands {
    /// Show recent events, newest first
    List {
        /// Number of events to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
        /// Only events for this transaction kind (deposit, withdraw, payment)
        #[arg(long)]
        kind: Option<String>,
        /// Only this event, e.g. flow_failed or session_expired
        #[arg(long)]
        event: Option<String>,
        /// Only events that carry an error
        #[arg(long)]
        errors: bool,
        /// Only events from the last N days
        #[arg(long)]
        days: Option<i64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete old events
    Clear {
        /// Delete events older than N days
        #[arg(long, default_value = "30")]
        older_than_days: i64,
        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Flow outcomes per transaction kind
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn open() -> Result<EventLog> {
    let tronpay_dir = get_tronpay_dir()?;
    std::fs::create_dir_all(&tronpay_dir)?;
    EventLog::open(&tronpay_dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION"))
}

fn days_ago_ms(days: i64) -> i64 {
    (Utc::now() - Duration::days(days.max(0))).timestamp_millis()
}

fn format_timestamp(timestamp_ms: i64) -> String {
    Utc.timestamp_millis_opt(timestamp_ms)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| timestamp_ms.to_string())
}

fn colored_outcome(record: &EventRecord) -> String {
    match record.outcome.as_deref() {
        Some("completed") => "completed".green().to_string(),
        Some("failed") => "failed".red().to_string(),
        Some("cancelled") => "cancelled".yellow().to_string(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

/// Error class with the HTTP status when there is one
fn error_column(record: &EventRecord) -> String {
    match (&record.error_code, record.http_status) {
        (Some(code), Some(status)) => format!("{} {}", code, status),
        (Some(code), None) => code.clone(),
        _ => String::new(),
    }
}

pub fn run(command: LogsCommands) -> Result<()> {
    let log = open()?;

    match command {
        LogsCommands::List {
            limit,
            kind,
            event,
            errors,
            days,
            json,
        } => {
            let mut filter = EventFilter::latest(limit);
            if let Some(kind) = kind {
                let kind = TransactionKind::from_str(&kind).map_err(|e| anyhow!("{}", e))?;
                filter = filter.with_kind(kind);
            }
            if let Some(event) = event {
                filter = filter.with_event(event);
            }
            if errors {
                filter = filter.errors();
            }
            if let Some(days) = days {
                filter = filter.since(days_ago_ms(days));
            }
            list(&log, &filter, json)
        }
        LogsCommands::Clear {
            older_than_days,
            force,
            json,
        } => {
            if !force && !json {
                let confirmed = dialoguer::Confirm::new()
                    .with_prompt(format!("Delete events older than {} days?", older_than_days))
                    .default(false)
                    .interact()?;
                if !confirmed {
                    println!("Cancelled.");
                    return Ok(());
                }
            }

            let deleted = log.prune_before(days_ago_ms(older_than_days))?;
            if json {
                println!("{}", serde_json::json!({ "deleted": deleted }));
            } else {
                output::success(&format!("Deleted {} events", deleted));
            }
            Ok(())
        }
        LogsCommands::Stats { json } => {
            let summary = log.summary()?;
            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "summary": summary,
                        "database_path": log.db_path().to_string_lossy(),
                    })
                );
            } else {
                print_summary(&log, &summary);
            }
            Ok(())
        }
    }
}

fn list(log: &EventLog, filter: &EventFilter, json: bool) -> Result<()> {
    let records = log.query(filter)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }
    if records.is_empty() {
        println!("No events found.");
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["Time", "Event", "Kind", "Outcome", "Error", "Message"]);
    for record in &records {
        let event = match (&record.command, record.demo) {
            (Some(command), true) => format!("{} {} (demo)", record.event, command),
            (Some(command), false) => format!("{} {}", record.event, command),
            (None, true) => format!("{} (demo)", record.event),
            (None, false) => record.event.clone(),
        };
        table.add_row(vec![
            format_timestamp(record.timestamp),
            event,
            record.kind.clone().unwrap_or_default(),
            colored_outcome(record),
            error_column(record),
            record.error_message.clone().unwrap_or_default(),
        ]);
    }
    println!("{}", table);
    Ok(())
}

fn print_summary(log: &EventLog, summary: &EventSummary) {
    println!("{}", "Event Log".bold());
    println!("  Events: {}", summary.total);
    println!("  With errors: {}", summary.errors);
    println!("  Session expiries: {}", summary.session_expiries);
    println!("  Database: {}", log.db_path().display());

    if summary.by_kind.is_empty() {
        return;
    }
    println!();
    let mut table = output::create_table();
    table.set_header(vec!["Kind", "Completed", "Failed", "Cancelled"]);
    for row in &summary.by_kind {
        table.add_row(vec![
            row.kind.clone(),
            row.completed.to_string(),
            row.failed.to_string(),
            row.cancelled.to_string(),
        ]);
    }
    println!("{}", table);
}
