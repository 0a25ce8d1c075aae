//! TronPay Core - client logic for USDT/TRX deposits, withdrawals and transfers
//!
//! This crate follows hexagonal architecture:
//!
//! - **domain**: credential, transaction kinds and statuses, form validation
//! - **ports**: trait definitions for the HTTP transport and credential store
//! - **services**: API client with credential refresh, poller, payment flows, event log
//! - **adapters**: reqwest transport, file and in-memory stores, demo backend

pub mod adapters;
pub mod config;
pub mod domain;
pub mod log_migrations;
pub mod ports;
pub mod services;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use adapters::{DemoBackend, FileCookieJar, FileCredentialStore, ReqwestTransport};
use config::Config;
use ports::{HttpTransport, SessionListener};
use services::{ApiClient, PaymentService};

// Re-export commonly used types at crate root
pub use domain::result::{Error, OperationResult};
pub use domain::{
    Asset, Credential, MovementForm, MovementRequest, TransactionId, TransactionKind,
    TransactionStatus,
};
pub use services::{ClientEvent, EntryPoint, EventFilter, EventLog};

/// Subdirectory holding the demo-mode credential
pub const DEMO_DIR: &str = "demo";

/// Main context for client operations
///
/// Wires the configured transport, the persisted credential store and cookie
/// jar, and the services on top of them.
pub struct TronpayContext {
    pub config: Config,
    pub data_dir: PathBuf,
    pub client: Arc<ApiClient>,
    pub payment_service: PaymentService,
    /// Refresh session cookies; `None` in demo mode
    cookie_jar: Option<Arc<FileCookieJar>>,
}

impl TronpayContext {
    /// Build a context for `data_dir`, creating the directory if needed.
    ///
    /// Demo mode swaps the HTTP transport for [`DemoBackend`] and keeps its
    /// credential apart from the real one.
    pub fn new(data_dir: &Path, session: Arc<dyn SessionListener>) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create {}", data_dir.display()))?;
        let config = Config::load(data_dir)?;

        let (transport, credential_dir, cookie_jar): (Arc<dyn HttpTransport>, PathBuf, _) =
            if config.demo_mode {
                let dir = data_dir.join(DEMO_DIR);
                std::fs::create_dir_all(&dir)?;
                (Arc::new(DemoBackend::new()), dir, None)
            } else {
                let jar = Arc::new(FileCookieJar::open(data_dir)?);
                let transport = ReqwestTransport::new_with_cookie_jar(
                    &config.base_url,
                    config.request_timeout,
                    Arc::clone(&jar),
                )?;
                (Arc::new(transport), data_dir.to_path_buf(), Some(jar))
            };

        let store = Arc::new(FileCredentialStore::open(&credential_dir)?);
        let client = Arc::new(ApiClient::new(transport, store, session));
        let payment_service = PaymentService::new(Arc::clone(&client), config.poll.clone());

        Ok(Self {
            config,
            data_dir: data_dir.to_path_buf(),
            client,
            payment_service,
            cookie_jar,
        })
    }

    /// Drop the stored credential and the refresh session
    pub fn logout(&self) -> Result<()> {
        self.client.logout()?;
        if let Some(jar) = &self.cookie_jar {
            jar.clear()?;
        }
        Ok(())
    }
}
