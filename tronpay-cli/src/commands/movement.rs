//! Deposit, withdraw and pay commands
//!
//! Each command is one flow "screen": it submits the form, follows the
//! transaction until it settles, and tears the flow down on Ctrl-C.

use std::collections::HashMap;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use tronpay_core::services::{FlowState, Notice, NoticeLevel, TransactionFlow};
use tronpay_core::{
    Asset, ClientEvent, Error, MovementForm, OperationResult, TransactionId, TransactionKind,
};

use super::{get_context, open_event_log, record, runtime};
use crate::output;

#[derive(Serialize)]
struct FlowReport {
    kind: TransactionKind,
    transaction_id: Option<TransactionId>,
    state: FlowState,
    notices: Vec<Notice>,
}

fn parse_asset(asset: &str) -> Result<Asset> {
    Ok(Asset::from_str(asset)?)
}

pub fn deposit(amount: &str, asset: &str, memo: Option<String>, json: bool) -> Result<()> {
    let mut form = MovementForm::new(amount, parse_asset(asset)?);
    if let Some(memo) = memo {
        form = form.with_memo(memo);
    }
    run_flow(TransactionKind::Deposit, form, json)
}

pub fn withdraw(
    amount: &str,
    to: &str,
    asset: &str,
    balance: Option<&str>,
    memo: Option<String>,
    json: bool,
) -> Result<()> {
    let mut form = MovementForm::new(amount, parse_asset(asset)?).with_address(to);
    if let Some(balance) = balance {
        let balance = Decimal::from_str(balance.trim())
            .map_err(|_| anyhow!("Balance must be a number: {}", balance))?;
        form = form.with_balance(balance);
    }
    if let Some(memo) = memo {
        form = form.with_memo(memo);
    }
    run_flow(TransactionKind::Withdraw, form, json)
}

pub fn pay(amount: &str, to: &str, asset: &str, memo: Option<String>, json: bool) -> Result<()> {
    let mut form = MovementForm::new(amount, parse_asset(asset)?).with_recipient(to);
    if let Some(memo) = memo {
        form = form.with_memo(memo);
    }
    run_flow(TransactionKind::Payment, form, json)
}

fn progress_message(kind: TransactionKind, state: &FlowState) -> Option<String> {
    match state {
        FlowState::Submitting => Some(format!("Submitting {}...", kind)),
        FlowState::Polling { transaction_id } => {
            Some(format!("Waiting for {} {} to settle...", kind, transaction_id))
        }
        FlowState::Input | FlowState::Success { .. } => None,
    }
}

fn run_flow(kind: TransactionKind, form: MovementForm, json: bool) -> Result<()> {
    let events = open_event_log();
    let ctx = get_context(&events)?;
    let demo = ctx.config.demo_mode;
    record(
        &events,
        ClientEvent::command(kind.as_str()).with_kind(kind).in_demo(demo),
    );

    let rt = runtime()?;

    let screen = CancellationToken::new();
    let flow = TransactionFlow::new(ctx.payment_service.clone(), kind, screen.clone());

    let result = rt.block_on(async {
        let ctrl_c = {
            let screen = screen.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    screen.cancel();
                }
            })
        };

        let spinner = output::spinner(json);
        let mut states = flow.subscribe();
        let progress = {
            let spinner = spinner.clone();
            tokio::spawn(async move {
                while states.changed().await.is_ok() {
                    let state = states.borrow_and_update().clone();
                    if let Some(message) = progress_message(kind, &state) {
                        spinner.set_message(message);
                    }
                }
            })
        };

        let result = flow.submit(&form).await;

        progress.abort();
        ctrl_c.abort();
        spinner.finish_and_clear();
        result
    });

    let notices = flow.take_notices();
    let state = flow.state();
    flow.teardown();

    record(&events, ClientEvent::flow_finished(kind, &result).in_demo(demo));

    if json {
        let report = FlowReport {
            kind,
            transaction_id: result.as_ref().ok().cloned(),
            state,
            notices,
        };
        let mut out = match &result {
            Ok(_) => OperationResult::ok(report),
            Err(e) => OperationResult {
                data: Some(report),
                ..OperationResult::fail(e.user_message())
            },
        };
        if demo {
            let mut context = HashMap::new();
            context.insert("demo_mode".to_string(), serde_json::Value::Bool(true));
            out = out.with_context(context);
        }
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    for notice in notices.iter().filter(|n| n.level == NoticeLevel::Info) {
        output::notice(notice);
    }

    match result {
        Ok(id) => {
            let verb = match kind {
                TransactionKind::Deposit => "Deposit completed",
                TransactionKind::Withdraw => "Withdrawal completed",
                TransactionKind::Payment => "Transfer sent",
            };
            output::success(&format!("{}: {}", verb, id));
            Ok(())
        }
        Err(Error::Cancelled) => {
            if let FlowState::Polling { transaction_id } = state {
                output::warning(&format!(
                    "Stopped waiting. Check later with 'tp status {} {}'",
                    kind, transaction_id
                ));
            }
            Err(anyhow!("Cancelled"))
        }
        Err(e) => {
            // The flow already phrased the failure for the user
            let message = notices
                .iter()
                .rev()
                .find(|n| n.level != NoticeLevel::Info)
                .map(|n| n.message.clone())
                .unwrap_or_else(|| e.user_message());
            Err(anyhow!(message))
        }
    }
}
