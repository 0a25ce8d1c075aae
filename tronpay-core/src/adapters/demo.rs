//! In-process demo backend
//!
//! Answers the backend REST routes from memory so the client can be tried
//! without an account or network access:
//! - any email with a non-empty password logs in
//! - deposits and withdrawals start `PENDING`, turn `PROCESSING`, then settle
//! - amounts above the failure threshold settle as `FAILED`
//! - transfers settle immediately
//!
//! The same handler backs the HTTP mock server used in tests.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{json, Value as JsonValue};

use crate::domain::result::Result;
use crate::domain::{Credential, TransactionStatus, AUTH_HEADER};
use crate::ports::{ApiRequest, ApiResponse, HttpTransport, Method};

const TOKEN_PREFIX: &str = "demo-token-";
const SESSION_COOKIE: &str = "demo_session";

/// Behaviour switches for the demo backend
#[derive(Debug, Clone)]
pub struct DemoOptions {
    /// Status queries answered before a transaction settles
    pub settle_after: u32,
    /// Amounts above this settle as `FAILED`
    pub failure_threshold: Decimal,
    /// Only honour `/auth/reissue` when the session cookie is presented
    pub require_session_cookie: bool,
    /// Answer every `/auth/reissue` with 401
    pub fail_reissue: bool,
    /// Leave `transactionId` out of create responses
    pub omit_transaction_id: bool,
}

impl Default for DemoOptions {
    fn default() -> Self {
        Self {
            settle_after: 2,
            failure_threshold: Decimal::new(10_000, 0),
            require_session_cookie: false,
            fail_reissue: false,
            omit_transaction_id: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DemoKind {
    Deposit,
    Withdraw,
}

impl DemoKind {
    fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "deposit" => Some(DemoKind::Deposit),
            "withdraw" => Some(DemoKind::Withdraw),
            _ => None,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            DemoKind::Deposit => "DEPOSIT",
            DemoKind::Withdraw => "WITHDRAW",
        }
    }
}

#[derive(Debug)]
struct DemoTransaction {
    kind: DemoKind,
    fails: bool,
    polls: u32,
}

#[derive(Debug, Default)]
struct DemoState {
    issued_tokens: u64,
    /// Tokens numbered below this are rejected
    min_valid_token: u64,
    session_open: bool,
    next_transaction: u64,
    transactions: HashMap<String, DemoTransaction>,
    requests: Vec<(Method, String)>,
}

/// Backend simulation implementing [`HttpTransport`]
#[derive(Debug, Default)]
pub struct DemoBackend {
    options: DemoOptions,
    state: Mutex<DemoState>,
}

impl DemoBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: DemoOptions) -> Self {
        Self {
            options,
            state: Mutex::new(DemoState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DemoState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Invalidate every credential issued so far; the session stays open
    pub fn revoke_tokens(&self) {
        let mut state = self.lock();
        state.min_valid_token = state.issued_tokens + 1;
    }

    /// Every request seen so far, in arrival order
    pub fn requests(&self) -> Vec<(Method, String)> {
        self.lock().requests.clone()
    }

    /// Number of requests whose path equals `path`
    pub fn request_count(&self, path: &str) -> usize {
        self.lock().requests.iter().filter(|(_, p)| p == path).count()
    }

    /// Answer one request
    pub fn handle(&self, request: &ApiRequest) -> ApiResponse {
        let mut state = self.lock();
        state.requests.push((request.method, request.path.clone()));

        let path = request.path.split('?').next().unwrap_or_default();
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

        match (request.method, segments.as_slice()) {
            (Method::Post, ["auth", "login"]) => self.login(&mut state, request),
            (Method::Post, ["auth", "reissue"]) => self.reissue(&mut state, request),
            _ => {
                if !authorized(&state, request) {
                    return error(401, "Access token expired");
                }
                match (request.method, segments.as_slice()) {
                    (Method::Post, ["transaction", kind]) => match DemoKind::from_segment(kind) {
                        Some(kind) => self.create(&mut state, kind, request),
                        None => error(404, "Not found"),
                    },
                    (Method::Get, ["transaction", kind, id]) => {
                        match DemoKind::from_segment(kind) {
                            Some(kind) => self.status(&mut state, kind, id),
                            None => error(404, "Not found"),
                        }
                    }
                    (Method::Post, ["history", "transfer"]) => self.transfer(&mut state, request),
                    _ => error(404, "Not found"),
                }
            }
        }
    }

    fn issue_token(&self, state: &mut DemoState) -> ApiResponse {
        state.issued_tokens += 1;
        state.session_open = true;
        let n = state.issued_tokens;
        ApiResponse::new(200, json!({ "message": "ok" }))
            .with_header(AUTH_HEADER, format!("Bearer {}{}", TOKEN_PREFIX, n))
            .with_header(
                "Set-Cookie",
                format!("{}=s{}; Path=/; HttpOnly", SESSION_COOKIE, n),
            )
    }

    fn login(&self, state: &mut DemoState, request: &ApiRequest) -> ApiResponse {
        let password = request
            .body
            .as_ref()
            .and_then(|b| b.get("password"))
            .and_then(JsonValue::as_str)
            .unwrap_or_default();
        if password.is_empty() {
            return error(401, "Invalid email or password");
        }
        self.issue_token(state)
    }

    fn reissue(&self, state: &mut DemoState, request: &ApiRequest) -> ApiResponse {
        let has_cookie = request
            .header("cookie")
            .is_some_and(|c| c.contains(&format!("{}=", SESSION_COOKIE)));
        let session_ok = if self.options.require_session_cookie {
            has_cookie
        } else {
            state.session_open
        };
        if self.options.fail_reissue || !session_ok {
            state.session_open = false;
            return error(401, "Refresh session expired");
        }
        self.issue_token(state)
    }

    fn create(&self, state: &mut DemoState, kind: DemoKind, request: &ApiRequest) -> ApiResponse {
        let fails = self.exceeds_threshold(request);
        state.next_transaction += 1;
        let id = format!("demo-{}", state.next_transaction);
        state.transactions.insert(
            id.clone(),
            DemoTransaction {
                kind,
                fails,
                polls: 0,
            },
        );

        if self.options.omit_transaction_id {
            ApiResponse::new(200, json!({ "status": "PENDING" }))
        } else {
            ApiResponse::new(200, json!({ "transactionId": id, "status": "PENDING" }))
        }
    }

    fn status(&self, state: &mut DemoState, kind: DemoKind, id: &str) -> ApiResponse {
        let settle_after = self.options.settle_after;
        let Some(tx) = state.transactions.get_mut(id).filter(|tx| tx.kind == kind) else {
            return error(404, "Transaction not found");
        };

        let status = if tx.polls >= settle_after {
            if tx.fails {
                TransactionStatus::Failed
            } else {
                TransactionStatus::Completed
            }
        } else if tx.polls == 0 {
            TransactionStatus::Pending
        } else {
            TransactionStatus::Processing
        };
        tx.polls = tx.polls.saturating_add(1);

        ApiResponse::new(
            200,
            json!({
                "transactionId": id,
                "status": status.as_str(),
                "type": kind.type_name(),
            }),
        )
    }

    fn transfer(&self, state: &mut DemoState, request: &ApiRequest) -> ApiResponse {
        let status = if self.exceeds_threshold(request) {
            TransactionStatus::Failed
        } else {
            TransactionStatus::Completed
        };
        state.next_transaction += 1;
        let id = format!("demo-{}", state.next_transaction);
        if self.options.omit_transaction_id {
            ApiResponse::new(200, json!({ "status": status.as_str() }))
        } else {
            ApiResponse::new(200, json!({ "transactionId": id, "status": status.as_str() }))
        }
    }

    fn exceeds_threshold(&self, request: &ApiRequest) -> bool {
        request
            .body
            .as_ref()
            .and_then(|b| b.get("amount"))
            .and_then(|v| serde_json::from_value::<Decimal>(v.clone()).ok())
            .is_some_and(|amount| amount > self.options.failure_threshold)
    }
}

fn authorized(state: &DemoState, request: &ApiRequest) -> bool {
    request
        .header(AUTH_HEADER)
        .and_then(Credential::from_header)
        .and_then(|c| c.as_str().strip_prefix(TOKEN_PREFIX)?.parse::<u64>().ok())
        .is_some_and(|n| n >= state.min_valid_token)
}

fn error(status: u16, message: &str) -> ApiResponse {
    ApiResponse::new(status, json!({ "message": message }))
}

#[async_trait]
impl HttpTransport for DemoBackend {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        Ok(self.handle(request))
    }
}
