//! CLI command implementations

pub mod auth;
pub mod config;
pub mod demo;
pub mod logs;
pub mod movement;
pub mod status;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tronpay_core::ports::SessionListener;
use tronpay_core::{ClientEvent, EntryPoint, EventLog, TronpayContext};

use crate::output;

/// Open the event log in the data directory
///
/// `None` when it cannot be opened; commands run without it
pub fn open_event_log() -> Option<Arc<EventLog>> {
    let tronpay_dir = get_tronpay_dir().ok()?;
    std::fs::create_dir_all(&tronpay_dir).ok()?;
    EventLog::open(&tronpay_dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION"))
        .ok()
        .map(Arc::new)
}

/// Record an event; failures to write are ignored
pub fn record(events: &Option<Arc<EventLog>>, event: ClientEvent) {
    if let Some(log) = events {
        let _ = log.record(&event);
    }
}

/// Data directory from TRONPAY_DIR or ~/.tronpay
pub fn get_tronpay_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("TRONPAY_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".tronpay"))
        .ok_or_else(|| anyhow!("Could not find home directory; set TRONPAY_DIR"))
}

/// Tells the user to log in again when a refresh fails
pub struct CliSessionListener {
    events: Option<Arc<EventLog>>,
}

impl SessionListener for CliSessionListener {
    fn on_session_expired(&self) {
        record(&self.events, ClientEvent::session_expired());
        output::warning("Your session has expired. Run 'tp login' to sign in again.");
    }
}

/// Build the context for the configured data directory
pub fn get_context(events: &Option<Arc<EventLog>>) -> Result<TronpayContext> {
    let tronpay_dir = get_tronpay_dir()?;
    let listener = Arc::new(CliSessionListener {
        events: events.clone(),
    });
    TronpayContext::new(&tronpay_dir, listener).context("Failed to initialize tronpay context")
}

/// Single-threaded runtime for one command
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")
}
