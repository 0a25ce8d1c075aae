//! TronpayContext wiring tests
//!
//! Build the full context from a data directory in demo mode, so login,
//! credential persistence and the flows run end to end without a network.
//!
//! Run with: cargo test --test context_test -- --nocapture

use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use tronpay_core::adapters::CREDENTIALS_FILE;
use tronpay_core::config::SETTINGS_FILE;
use tronpay_core::ports::NoopSessionListener;
use tronpay_core::services::FlowState;
use tronpay_core::{Asset, Error, MovementForm, TransactionKind, TronpayContext, DEMO_DIR};

const ADDRESS: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";

fn write_demo_settings(dir: &Path) {
    std::fs::write(
        dir.join(SETTINGS_FILE),
        r#"{"app": {"demoMode": true}, "polling": {"intervalMs": 10, "timeoutSecs": 5}}"#,
    )
    .unwrap();
}

fn demo_context(dir: &Path) -> TronpayContext {
    TronpayContext::new(dir, Arc::new(NoopSessionListener)).unwrap()
}

#[tokio::test]
async fn test_demo_login_persists_credential_apart() {
    let temp_dir = TempDir::new().unwrap();
    write_demo_settings(temp_dir.path());

    let ctx = demo_context(temp_dir.path());
    assert!(ctx.config.demo_mode);
    assert!(!ctx.client.is_authenticated());

    ctx.client.login("demo@example.com", "demo").await.unwrap();
    assert!(ctx.client.is_authenticated());

    let demo_file = temp_dir.path().join(DEMO_DIR).join(CREDENTIALS_FILE);
    assert!(demo_file.exists());
    assert!(!temp_dir.path().join(CREDENTIALS_FILE).exists());

    // A fresh context picks the credential up again
    let reopened = demo_context(temp_dir.path());
    assert!(reopened.client.is_authenticated());
}

#[tokio::test]
async fn test_demo_deposit_completes() {
    let temp_dir = TempDir::new().unwrap();
    write_demo_settings(temp_dir.path());
    let ctx = demo_context(temp_dir.path());
    ctx.client.login("demo@example.com", "demo").await.unwrap();

    let flow = ctx.payment_service.flow(TransactionKind::Deposit);
    let id = flow.submit(&MovementForm::new("25", Asset::Usdt)).await.unwrap();

    assert_eq!(flow.state(), FlowState::Success { transaction_id: id });
}

#[tokio::test]
async fn test_demo_large_withdrawal_fails() {
    let temp_dir = TempDir::new().unwrap();
    write_demo_settings(temp_dir.path());
    let ctx = demo_context(temp_dir.path());
    ctx.client.login("demo@example.com", "demo").await.unwrap();

    let flow = ctx.payment_service.flow(TransactionKind::Withdraw);
    let form = MovementForm::new("50000", Asset::Usdt).with_address(ADDRESS);
    let err = flow.submit(&form).await.unwrap_err();

    assert!(matches!(err, Error::TransactionFailed(_)));
    assert_eq!(flow.state(), FlowState::Input);
}

#[tokio::test]
async fn test_demo_requests_without_login_are_rejected() {
    let temp_dir = TempDir::new().unwrap();
    write_demo_settings(temp_dir.path());
    let ctx = demo_context(temp_dir.path());

    let flow = ctx.payment_service.flow(TransactionKind::Deposit);
    let err = flow.submit(&MovementForm::new("1", Asset::Usdt)).await.unwrap_err();

    // 401, then a reissue with no open session
    assert!(matches!(err, Error::SessionExpired));
}

#[test]
fn test_invalid_base_url_fails_context() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(
        temp_dir.path().join(SETTINGS_FILE),
        r#"{"api": {"baseUrl": "not a url"}}"#,
    )
    .unwrap();

    if std::env::var("TRONPAY_BASE_URL").is_ok() {
        return;
    }
    assert!(TronpayContext::new(temp_dir.path(), Arc::new(NoopSessionListener)).is_err());
}
