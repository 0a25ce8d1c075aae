//! Result and error types for the core library

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core library error type
///
/// Every variant maps to one entry of the client's error taxonomy. Flows
/// recover from all of them locally; none is fatal to the process.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Submission failed: {0}")]
    Submission(String),

    #[error("Submission failed: server response did not include a transaction id")]
    MissingTransactionId,

    #[error("Login failed: server response did not include a credential")]
    MissingCredential,

    #[error("Session expired, please log in again")]
    SessionExpired,

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Transaction {0} failed")]
    TransactionFailed(String),

    #[error("Unknown transaction status: {0}")]
    UnknownStatus(String),

    #[error("Stopped polling after {attempts} attempts")]
    PollTimeout { attempts: u32 },

    #[error("Cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a submission error
    pub fn submission(msg: impl Into<String>) -> Self {
        Self::Submission(msg.into())
    }

    /// Create a network error
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Stable short name of the variant, used in the event log
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Submission(_) => "submission",
            Self::MissingTransactionId => "missing_transaction_id",
            Self::MissingCredential => "missing_credential",
            Self::SessionExpired => "session_expired",
            Self::Http { .. } => "http",
            Self::Network(_) => "network",
            Self::TransactionFailed(_) => "transaction_failed",
            Self::UnknownStatus(_) => "unknown_status",
            Self::PollTimeout { .. } => "poll_timeout",
            Self::Cancelled => "cancelled",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
        }
    }

    /// Text shown to the user when a flow reports this error
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            Self::Submission(_) | Self::MissingTransactionId => {
                "The request could not be submitted. Please try again.".to_string()
            }
            Self::SessionExpired => "Your session has expired. Please log in again.".to_string(),
            Self::Http { .. } | Self::Network(_) => {
                "Communication with the server failed. Please try again.".to_string()
            }
            Self::TransactionFailed(_) => "The transaction failed.".to_string(),
            Self::UnknownStatus(raw) => format!("Unknown transaction status: {}", raw),
            Self::PollTimeout { .. } => {
                "The transaction is taking longer than expected. Check its status later."
                    .to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;

/// Operation result with optional context (for JSON output)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub context: Option<HashMap<String, serde_json::Value>>,
}

impl<T> OperationResult<T> {
    /// Create a successful result
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            context: None,
        }
    }

    /// Create a failed result
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            context: None,
        }
    }

    /// Attach context to an existing result
    pub fn with_context(mut self, context: HashMap<String, serde_json::Value>) -> Self {
        self.context = Some(context);
        self
    }
}

impl<T> From<Result<T>> for OperationResult<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::fail(e.to_string()),
        }
    }
}
