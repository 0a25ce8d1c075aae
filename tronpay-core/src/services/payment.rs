//! Payment service - deposits, withdrawals and transfers
//!
//! [`PaymentService`] knows the create and status endpoints of each
//! transaction kind. [`TransactionFlow`] is the per-screen state machine
//! wrapped around them:
//!
//! ```text
//! INPUT -> SUBMITTING -> POLLING -> SUCCESS
//!   ^           |           |
//!   +-----------+-----------+   (errors, FAILED, unknown status)
//! ```
//!
//! A flow owns a cancellation token. Once torn down it applies no state
//! change and records no notice, and its poll chain stops.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::domain::result::{Error, Result};
use crate::domain::{MovementForm, MovementRequest, TransactionId, TransactionKind, TransactionStatus};
use crate::services::api_client::ApiClient;
use crate::services::poller::{PollConfig, PollOutcome, Poller};

// =============================================================================
// API Response Models
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateResponse {
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    transaction_id: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

/// Deserialize optional ID that can be number or string
fn deserialize_optional_id<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error as _;
    let value: Option<JsonValue> = Option::deserialize(deserializer)?;
    match value {
        Some(JsonValue::Number(n)) => Ok(Some(n.to_string())),
        Some(JsonValue::String(s)) => Ok(Some(s)),
        Some(JsonValue::Null) | None => Ok(None),
        _ => Err(D::Error::custom("expected number or string for transactionId")),
    }
}

/// Accepted money-movement request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Submission {
    pub transaction_id: TransactionId,
    /// Status echoed by the create endpoint, if any
    pub status: Option<TransactionStatus>,
}

/// Status lookup result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub transaction_id: TransactionId,
    pub status: TransactionStatus,
    /// Backend's `type` field (e.g. `DEPOSIT`)
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// Create and query money movements
#[derive(Clone)]
pub struct PaymentService {
    client: Arc<ApiClient>,
    poll: PollConfig,
}

impl PaymentService {
    pub fn new(client: Arc<ApiClient>, poll: PollConfig) -> Self {
        Self { client, poll }
    }

    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    pub fn poll_config(&self) -> &PollConfig {
        &self.poll
    }

    /// Create a transaction. A 2xx response without an id is a submission failure.
    pub async fn submit(&self, kind: TransactionKind, request: &MovementRequest) -> Result<Submission> {
        let body = serde_json::to_value(request)?;
        let response = self
            .client
            .post(kind.create_path(), body)
            .await
            .map_err(|e| match e {
                Error::Http { .. } | Error::Network(_) => Error::submission(e.to_string()),
                other => other,
            })?;

        let created: CreateResponse = serde_json::from_value(response.body).unwrap_or_default();
        let transaction_id = created
            .transaction_id
            .and_then(|id| TransactionId::parse(&id).ok())
            .ok_or(Error::MissingTransactionId)?;

        Ok(Submission {
            transaction_id,
            status: created.status.as_deref().map(TransactionStatus::parse),
        })
    }

    /// Look up the current status of a transaction
    pub async fn status_report(&self, kind: TransactionKind, id: &TransactionId) -> Result<StatusReport> {
        let path = kind.status_path(id).ok_or_else(|| {
            Error::validation(format!("{} transactions have no status endpoint", kind))
        })?;
        let response = self.client.get(&path).await?;
        let body: StatusResponse = serde_json::from_value(response.body).unwrap_or_default();

        Ok(StatusReport {
            transaction_id: id.clone(),
            status: match body.status {
                Some(raw) => TransactionStatus::parse(&raw),
                None => TransactionStatus::Unknown("<missing>".to_string()),
            },
            kind: body.kind,
        })
    }

    pub async fn status(&self, kind: TransactionKind, id: &TransactionId) -> Result<TransactionStatus> {
        Ok(self.status_report(kind, id).await?.status)
    }

    /// New screen-scoped flow for `kind`
    pub fn flow(&self, kind: TransactionKind) -> TransactionFlow {
        TransactionFlow::new(self.clone(), kind, CancellationToken::new())
    }
}

// =============================================================================
// Flow state machine
// =============================================================================

/// Screen state of a money-movement flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowState {
    Input,
    Submitting,
    Polling { transaction_id: TransactionId },
    Success { transaction_id: TransactionId },
}

impl FlowState {
    pub fn is_busy(&self) -> bool {
        matches!(self, FlowState::Submitting | FlowState::Polling { .. })
    }
}

/// How a notice is presented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    /// Next to the form field (validation)
    Inline,
    /// Modal alert the user must dismiss
    Blocking,
    /// Non-error information
    Info,
}

/// User-visible message emitted by a flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// One deposit/withdraw/payment screen
pub struct TransactionFlow {
    service: PaymentService,
    kind: TransactionKind,
    state: watch::Sender<FlowState>,
    notices: Mutex<Vec<Notice>>,
    cancel: CancellationToken,
}

impl TransactionFlow {
    /// Create a flow whose teardown token is a child of `parent`
    pub fn new(service: PaymentService, kind: TransactionKind, parent: CancellationToken) -> Self {
        let (state, _) = watch::channel(FlowState::Input);
        Self {
            service,
            kind,
            state,
            notices: Mutex::new(Vec::new()),
            cancel: parent.child_token(),
        }
    }

    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    pub fn state(&self) -> FlowState {
        self.state.borrow().clone()
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<FlowState> {
        self.state.subscribe()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().map(|n| n.clone()).unwrap_or_default()
    }

    /// Drain recorded notices
    pub fn take_notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .map(|mut n| std::mem::take(&mut *n))
            .unwrap_or_default()
    }

    /// Leave the screen: stop polling and freeze the state
    pub fn teardown(&self) {
        self.cancel.cancel();
    }

    pub fn is_torn_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn transition(&self, next: FlowState) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.state.send_replace(next);
    }

    fn notify(&self, level: NoticeLevel, message: impl Into<String>) {
        if self.cancel.is_cancelled() {
            return;
        }
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(Notice {
                level,
                message: message.into(),
            });
        }
    }

    /// Report `error`, return to INPUT, and hand the error back
    fn fail(&self, error: Error) -> Error {
        if !matches!(error, Error::Cancelled) {
            self.notify(NoticeLevel::Blocking, error.user_message());
            self.transition(FlowState::Input);
        }
        error
    }

    /// Validate, submit, and follow the transaction to a final state
    pub async fn submit(&self, form: &MovementForm) -> Result<TransactionId> {
        if self.is_torn_down() {
            return Err(Error::Cancelled);
        }
        if self.state().is_busy() {
            return Err(Error::validation("A request is already in progress"));
        }

        let request = match form.validate(self.kind) {
            Ok(request) => request,
            Err(e) => {
                self.notify(NoticeLevel::Inline, e.user_message());
                return Err(e);
            }
        };

        self.transition(FlowState::Submitting);
        let submitted = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(Error::Cancelled),
            result = self.service.submit(self.kind, &request) => result,
        };
        let submission = submitted.map_err(|e| self.fail(e))?;
        let id = submission.transaction_id;

        self.transition(FlowState::Polling {
            transaction_id: id.clone(),
        });

        let outcome = if self.kind.status_path(&id).is_some() {
            let poller = Poller::new(self.service.poll_config().clone(), self.cancel.clone());
            let service = &self.service;
            let kind = self.kind;
            let id_ref = &id;
            poller
                .run(move || service.status(kind, id_ref), TransactionStatus::is_pending)
                .await
        } else {
            // Transfers have no status route; the create response is final
            Ok(PollOutcome {
                value: submission.status.unwrap_or(TransactionStatus::Completed),
                attempts: 0,
            })
        };

        match outcome {
            Ok(PollOutcome { value, .. }) => match value {
                TransactionStatus::Completed => {
                    self.transition(FlowState::Success {
                        transaction_id: id.clone(),
                    });
                    Ok(id)
                }
                TransactionStatus::Pending | TransactionStatus::Processing => {
                    self.notify(
                        NoticeLevel::Info,
                        "Transfer accepted and still processing",
                    );
                    self.transition(FlowState::Success {
                        transaction_id: id.clone(),
                    });
                    Ok(id)
                }
                TransactionStatus::Failed => Err(self.fail(Error::TransactionFailed(id.to_string()))),
                TransactionStatus::Unknown(raw) => Err(self.fail(Error::UnknownStatus(raw))),
            },
            Err(e) => Err(self.fail(e)),
        }
    }
}

impl Drop for TransactionFlow {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
