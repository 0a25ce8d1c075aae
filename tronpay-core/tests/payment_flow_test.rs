//! Transaction flow tests
//!
//! Drive deposit, withdrawal and transfer flows against a scripted backend
//! with tokio's paused clock, so poll intervals elapse instantly and can be
//! asserted exactly.
//!
//! Run with: cargo test --test payment_flow_test -- --nocapture

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{json, Value as JsonValue};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use tronpay_core::adapters::InMemoryCredentialStore;
use tronpay_core::domain::result::Result;
use tronpay_core::ports::{ApiRequest, ApiResponse, CredentialStore, HttpTransport, SessionListener};
use tronpay_core::services::{
    ApiClient, FlowState, NoticeLevel, PaymentService, PollConfig, TransactionFlow,
};
use tronpay_core::{Asset, Credential, Error, MovementForm, TransactionId, TransactionKind};

const ADDRESS: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";

// ============================================================================
// Test Helpers
// ============================================================================

/// Backend answering each path from a queue of responses.
/// The last queued response for a path repeats; unknown paths get 404.
#[derive(Default)]
struct ScriptedBackend {
    responses: Mutex<HashMap<String, VecDeque<ApiResponse>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedBackend {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn respond(&self, path: &str, status: u16, body: JsonValue) {
        self.responses
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(ApiResponse::new(status, body));
    }

    fn statuses(&self, path: &str, statuses: &[&str]) {
        for status in statuses {
            self.respond(path, 200, json!({ "status": status }));
        }
    }

    fn count(&self, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.path == path)
            .count()
    }

    fn total_requests(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn body_of(&self, path: &str) -> Option<JsonValue> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.path == path)
            .and_then(|r| r.body.clone())
    }
}

#[async_trait]
impl HttpTransport for ScriptedBackend {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        self.requests.lock().unwrap().push(request.clone());
        tokio::task::yield_now().await;

        let mut responses = self.responses.lock().unwrap();
        let response = match responses.get_mut(&request.path) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) if !queue.is_empty() => queue.front().cloned().unwrap(),
            _ => ApiResponse::new(404, json!({ "message": "not found" })),
        };
        Ok(response)
    }
}

#[derive(Default)]
struct CountingListener(AtomicUsize);

impl SessionListener for CountingListener {
    fn on_session_expired(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

struct Harness {
    backend: Arc<ScriptedBackend>,
    store: Arc<InMemoryCredentialStore>,
    listener: Arc<CountingListener>,
    service: PaymentService,
}

fn harness_with(poll: PollConfig) -> Harness {
    let backend = ScriptedBackend::new();
    let store = Arc::new(InMemoryCredentialStore::with_credential(
        Credential::new("token-1").unwrap(),
    ));
    let listener = Arc::new(CountingListener::default());
    let client = Arc::new(ApiClient::new(
        backend.clone(),
        store.clone(),
        listener.clone(),
    ));
    Harness {
        backend,
        store,
        listener,
        service: PaymentService::new(client, poll),
    }
}

fn harness() -> Harness {
    harness_with(PollConfig::default())
}

fn deposit(amount: &str) -> MovementForm {
    MovementForm::new(amount, Asset::Usdt)
}

// ============================================================================
// Validation
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_withdraw_over_balance_sends_nothing() {
    let h = harness();
    let flow = h.service.flow(TransactionKind::Withdraw);

    let form = MovementForm::new("100", Asset::Usdt)
        .with_address(ADDRESS)
        .with_balance(Decimal::new(50, 0));
    let err = flow.submit(&form).await.unwrap_err();

    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(flow.state(), FlowState::Input);
    assert_eq!(h.backend.total_requests(), 0);

    let notices = flow.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Inline);
}

#[tokio::test(start_paused = true)]
async fn test_non_positive_amounts_send_nothing() {
    let h = harness();
    let flow = h.service.flow(TransactionKind::Deposit);

    for amount in ["0", "-5", "abc", ""] {
        assert!(flow.submit(&deposit(amount)).await.is_err(), "amount {:?}", amount);
    }
    assert_eq!(h.backend.total_requests(), 0);
    assert_eq!(flow.state(), FlowState::Input);
}

// ============================================================================
// Polling to a final state
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_processing_then_completed_reaches_success() {
    let h = harness();
    h.backend
        .respond("/transaction/deposit", 200, json!({ "transactionId": "tx1" }));
    h.backend
        .statuses("/transaction/deposit/tx1", &["PROCESSING", "COMPLETED"]);

    let flow = h.service.flow(TransactionKind::Deposit);
    let started = Instant::now();
    let id = flow.submit(&deposit("10")).await.unwrap();

    assert_eq!(id, TransactionId::new("tx1"));
    assert_eq!(
        flow.state(),
        FlowState::Success {
            transaction_id: TransactionId::new("tx1")
        }
    );
    assert_eq!(h.backend.count("/transaction/deposit/tx1"), 2);
    assert_eq!(started.elapsed(), Duration::from_millis(2000));

    // No timer left behind
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(h.backend.count("/transaction/deposit/tx1"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_status_returns_to_input_with_notice() {
    let h = harness();
    h.backend
        .respond("/transaction/deposit", 200, json!({ "transactionId": "tx2" }));
    h.backend.statuses("/transaction/deposit/tx2", &["FAILED"]);

    let flow = h.service.flow(TransactionKind::Deposit);
    let err = flow.submit(&deposit("10")).await.unwrap_err();

    assert!(matches!(err, Error::TransactionFailed(ref id) if id == "tx2"));
    assert_eq!(flow.state(), FlowState::Input);
    assert_eq!(h.backend.count("/transaction/deposit/tx2"), 1);

    let notices = flow.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Blocking);
}

#[tokio::test(start_paused = true)]
async fn test_pending_twice_then_completed_takes_three_queries() {
    let h = harness();
    h.backend
        .respond("/transaction/withdraw", 200, json!({ "transactionId": 77 }));
    h.backend.statuses(
        "/transaction/withdraw/77",
        &["PENDING", "PENDING", "COMPLETED"],
    );

    let flow = h.service.flow(TransactionKind::Withdraw);
    let started = Instant::now();
    let form = MovementForm::new("1.5", Asset::Trx).with_address(ADDRESS);
    flow.submit(&form).await.unwrap();

    assert_eq!(h.backend.count("/transaction/withdraw/77"), 3);
    assert_eq!(started.elapsed(), Duration::from_millis(4000));

    let body = h.backend.body_of("/transaction/withdraw").unwrap();
    assert_eq!(body["currency"], "TRX");
    assert_eq!(body["toAddress"], ADDRESS);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_status_names_raw_value() {
    let h = harness();
    h.backend
        .respond("/transaction/deposit", 200, json!({ "transactionId": "tx3" }));
    h.backend
        .statuses("/transaction/deposit/tx3", &["PENDING", "REVERSED"]);

    let flow = h.service.flow(TransactionKind::Deposit);
    let err = flow.submit(&deposit("3")).await.unwrap_err();

    assert!(matches!(err, Error::UnknownStatus(ref raw) if raw == "REVERSED"));
    assert_eq!(flow.state(), FlowState::Input);
    assert!(flow.notices()[0].message.contains("REVERSED"));
    assert_eq!(h.backend.count("/transaction/deposit/tx3"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_lower_case_status_is_unknown() {
    let h = harness();
    h.backend
        .respond("/transaction/deposit", 200, json!({ "transactionId": "tx4" }));
    h.backend.statuses("/transaction/deposit/tx4", &["completed"]);

    let flow = h.service.flow(TransactionKind::Deposit);
    let err = flow.submit(&deposit("3")).await.unwrap_err();
    assert!(matches!(err, Error::UnknownStatus(_)));
}

#[tokio::test(start_paused = true)]
async fn test_poll_cap_gives_up() {
    let h = harness_with(PollConfig::default().with_max_attempts(3));
    h.backend
        .respond("/transaction/deposit", 200, json!({ "transactionId": "slow" }));
    h.backend.statuses("/transaction/deposit/slow", &["PENDING"]);

    let flow = h.service.flow(TransactionKind::Deposit);
    let err = flow.submit(&deposit("3")).await.unwrap_err();

    assert!(matches!(err, Error::PollTimeout { attempts: 3 }));
    assert_eq!(flow.state(), FlowState::Input);
    assert_eq!(h.backend.count("/transaction/deposit/slow"), 3);
}

// ============================================================================
// Submission and communication failures
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_missing_transaction_id_is_submission_failure() {
    let h = harness();
    h.backend
        .respond("/transaction/deposit", 200, json!({ "status": "PENDING" }));

    let flow = h.service.flow(TransactionKind::Deposit);
    let err = flow.submit(&deposit("10")).await.unwrap_err();

    assert!(matches!(err, Error::MissingTransactionId));
    assert_eq!(flow.state(), FlowState::Input);
    assert_eq!(h.backend.total_requests(), 1);
    assert_eq!(flow.notices()[0].level, NoticeLevel::Blocking);
}

#[tokio::test(start_paused = true)]
async fn test_server_error_on_create_is_submission_failure() {
    let h = harness();
    h.backend
        .respond("/transaction/deposit", 500, json!({ "message": "boom" }));

    let flow = h.service.flow(TransactionKind::Deposit);
    let err = flow.submit(&deposit("10")).await.unwrap_err();

    assert!(matches!(err, Error::Submission(_)));
    assert_eq!(flow.state(), FlowState::Input);
    assert_eq!(h.backend.total_requests(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_status_error_aborts_polling() {
    let h = harness();
    h.backend
        .respond("/transaction/deposit", 200, json!({ "transactionId": "tx5" }));
    h.backend
        .respond("/transaction/deposit/tx5", 200, json!({ "status": "PENDING" }));
    h.backend
        .respond("/transaction/deposit/tx5", 502, json!({ "message": "bad gateway" }));

    let flow = h.service.flow(TransactionKind::Deposit);
    let err = flow.submit(&deposit("10")).await.unwrap_err();

    assert!(matches!(err, Error::Http { status: 502, .. }));
    assert_eq!(flow.state(), FlowState::Input);
    assert!(flow.notices()[0].message.contains("Communication"));

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(h.backend.count("/transaction/deposit/tx5"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_session_expiry_while_polling() {
    let h = harness();
    h.backend
        .respond("/transaction/deposit", 200, json!({ "transactionId": "tx6" }));
    h.backend
        .respond("/transaction/deposit/tx6", 401, json!({ "message": "expired" }));
    h.backend
        .respond("/auth/reissue", 401, json!({ "message": "no session" }));

    let flow = h.service.flow(TransactionKind::Deposit);
    let err = flow.submit(&deposit("10")).await.unwrap_err();

    assert!(matches!(err, Error::SessionExpired));
    assert_eq!(flow.state(), FlowState::Input);
    assert!(h.store.get().is_none());
    assert_eq!(h.listener.0.load(Ordering::SeqCst), 1);
    assert_eq!(h.backend.count("/auth/reissue"), 1);
}

// ============================================================================
// Transfers
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_transfer_without_status_completes() {
    let h = harness();
    h.backend
        .respond("/history/transfer", 200, json!({ "transactionId": "p1" }));

    let flow = h.service.flow(TransactionKind::Payment);
    let form = MovementForm::new("2", Asset::Usdt).with_recipient("merchant-7");
    let id = flow.submit(&form).await.unwrap();

    assert_eq!(id.as_str(), "p1");
    assert!(matches!(flow.state(), FlowState::Success { .. }));
    assert_eq!(h.backend.total_requests(), 1);
    assert_eq!(h.backend.body_of("/history/transfer").unwrap()["recipient"], "merchant-7");
}

#[tokio::test(start_paused = true)]
async fn test_transfer_still_processing_adds_info_notice() {
    let h = harness();
    h.backend.respond(
        "/history/transfer",
        200,
        json!({ "transactionId": "p2", "status": "PROCESSING" }),
    );

    let flow = h.service.flow(TransactionKind::Payment);
    let form = MovementForm::new("2", Asset::Usdt).with_recipient("merchant-7");
    flow.submit(&form).await.unwrap();

    assert!(matches!(flow.state(), FlowState::Success { .. }));
    assert_eq!(flow.notices()[0].level, NoticeLevel::Info);
}

#[tokio::test(start_paused = true)]
async fn test_transfer_failed_status() {
    let h = harness();
    h.backend.respond(
        "/history/transfer",
        200,
        json!({ "transactionId": "p3", "status": "FAILED" }),
    );

    let flow = h.service.flow(TransactionKind::Payment);
    let form = MovementForm::new("2", Asset::Usdt).with_recipient("merchant-7");
    let err = flow.submit(&form).await.unwrap_err();

    assert!(matches!(err, Error::TransactionFailed(_)));
    assert_eq!(flow.state(), FlowState::Input);
}

// ============================================================================
// Teardown
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_teardown_while_waiting_stops_everything() {
    let h = harness();
    h.backend
        .respond("/transaction/deposit", 200, json!({ "transactionId": "tx7" }));
    h.backend.statuses("/transaction/deposit/tx7", &["PENDING"]);

    let flow = Arc::new(h.service.flow(TransactionKind::Deposit));
    let running = {
        let flow = flow.clone();
        tokio::spawn(async move { flow.submit(&deposit("10")).await })
    };

    // Queries at 0s and 2s; the next timer is pending
    tokio::time::sleep(Duration::from_millis(3000)).await;
    assert_eq!(h.backend.count("/transaction/deposit/tx7"), 2);
    let state_before = flow.state();
    assert!(matches!(state_before, FlowState::Polling { .. }));

    flow.teardown();
    let result = running.await.unwrap();
    assert!(matches!(result, Err(Error::Cancelled)));

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.backend.count("/transaction/deposit/tx7"), 2);
    assert_eq!(flow.state(), state_before);
    assert!(flow.notices().is_empty());
    assert!(flow.is_torn_down());
}

#[tokio::test(start_paused = true)]
async fn test_parent_cancellation_tears_down_flow() {
    let h = harness();
    h.backend
        .respond("/transaction/deposit", 200, json!({ "transactionId": "tx8" }));
    h.backend.statuses("/transaction/deposit/tx8", &["PROCESSING"]);

    let screen = CancellationToken::new();
    let flow = Arc::new(TransactionFlow::new(
        h.service.clone(),
        TransactionKind::Deposit,
        screen.clone(),
    ));
    let running = {
        let flow = flow.clone();
        tokio::spawn(async move { flow.submit(&deposit("10")).await })
    };

    tokio::time::sleep(Duration::from_millis(500)).await;
    screen.cancel();

    assert!(matches!(running.await.unwrap(), Err(Error::Cancelled)));
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(h.backend.count("/transaction/deposit/tx8"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_submit_after_teardown_is_rejected() {
    let h = harness();
    let flow = h.service.flow(TransactionKind::Deposit);
    flow.teardown();

    let err = flow.submit(&deposit("10")).await.unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert_eq!(h.backend.total_requests(), 0);
    assert!(flow.notices().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_second_submit_while_polling_is_rejected() {
    let h = harness();
    h.backend
        .respond("/transaction/deposit", 200, json!({ "transactionId": "tx9" }));
    h.backend
        .statuses("/transaction/deposit/tx9", &["PENDING", "COMPLETED"]);

    let flow = Arc::new(h.service.flow(TransactionKind::Deposit));
    let running = {
        let flow = flow.clone();
        tokio::spawn(async move { flow.submit(&deposit("10")).await })
    };

    tokio::time::sleep(Duration::from_millis(500)).await;
    let err = flow.submit(&deposit("10")).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    assert!(running.await.unwrap().is_ok());
    assert_eq!(h.backend.count("/transaction/deposit"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_subscriber_sees_final_state() {
    let h = harness();
    h.backend
        .respond("/transaction/deposit", 200, json!({ "transactionId": "tx10" }));
    h.backend
        .statuses("/transaction/deposit/tx10", &["PENDING", "COMPLETED"]);

    let flow = h.service.flow(TransactionKind::Deposit);
    let mut states = flow.subscribe();
    assert_eq!(*states.borrow_and_update(), FlowState::Input);

    flow.submit(&deposit("10")).await.unwrap();

    assert!(states.has_changed().unwrap());
    assert!(matches!(*states.borrow(), FlowState::Success { .. }));
}
