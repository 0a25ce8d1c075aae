//! Status command - look up a deposit or withdrawal

use std::str::FromStr;

use anyhow::Result;
use colored::Colorize;

use tronpay_core::{ClientEvent, OperationResult, TransactionId, TransactionKind, TransactionStatus};

use super::{get_context, open_event_log, record, runtime};
use crate::output;

fn colored_status(status: &TransactionStatus) -> String {
    match status {
        TransactionStatus::Completed => status.as_str().green().to_string(),
        TransactionStatus::Failed => status.as_str().red().to_string(),
        TransactionStatus::Pending | TransactionStatus::Processing => {
            status.as_str().yellow().to_string()
        }
        TransactionStatus::Unknown(raw) => format!("{} (unknown)", raw).magenta().to_string(),
    }
}

pub fn run(kind: &str, id: &str, json: bool) -> Result<()> {
    let events = open_event_log();
    record(&events, ClientEvent::command("status"));

    let kind = TransactionKind::from_str(kind)?;
    let id = TransactionId::parse(id)?;

    let ctx = get_context(&events)?;
    let report = runtime()?.block_on(ctx.payment_service.status_report(kind, &id));
    if let Err(e) = &report {
        record(
            &events,
            ClientEvent::new("status_failed")
                .with_kind(kind)
                .with_error(e)
                .in_demo(ctx.config.demo_mode),
        );
    }

    if json {
        let out: OperationResult<_> = report.into();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let report = report?;
    let mut table = output::create_table();
    table.add_row(vec!["Transaction", report.transaction_id.as_str()]);
    table.add_row(vec!["Kind", kind.as_str()]);
    if let Some(backend_type) = &report.kind {
        table.add_row(vec!["Type", backend_type.as_str()]);
    }
    table.add_row(vec!["Status".to_string(), colored_status(&report.status)]);
    println!("{}", table);

    if report.status.is_pending() {
        output::info("Still in progress. Run this command again to refresh.");
    }
    Ok(())
}
