//! Authenticated API client
//!
//! Attaches the bearer credential to every request and recovers once from
//! an expired credential by calling `/auth/reissue`. The refresh session
//! itself lives in the transport's cookie jar, out of reach of this layer.
//!
//! # Single-flight refresh
//!
//! Each request remembers the refresh generation that was current when its
//! credential was attached. A request that gets a 401 takes the refresh lock;
//! if the generation moved on while it waited, another request already
//! refreshed and the outcome is reused. Concurrent 401s therefore cost one
//! `/auth/reissue` call, and only that call notifies the session listener.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value as JsonValue;
use tokio::sync::Mutex;

use crate::domain::result::{Error, Result};
use crate::domain::{Credential, AUTH_HEADER};
use crate::ports::{
    ApiRequest, ApiResponse, CredentialStore, HttpTransport, Method, SessionListener,
};

pub const LOGIN_PATH: &str = "/auth/login";
pub const REISSUE_PATH: &str = "/auth/reissue";

const UNAUTHORIZED: u16 = 401;

/// A pending request paired with its single-use retry flag
#[derive(Debug, Clone)]
pub struct RequestEnvelope {
    request: ApiRequest,
    retried: bool,
}

impl RequestEnvelope {
    pub fn new(request: ApiRequest) -> Self {
        Self {
            request,
            retried: false,
        }
    }

    pub fn request(&self) -> &ApiRequest {
        &self.request
    }

    pub fn is_retried(&self) -> bool {
        self.retried
    }

    /// Set the retry flag. Returns `false` if it was already set.
    pub fn mark_retried(&mut self) -> bool {
        if self.retried {
            false
        } else {
            self.retried = true;
            true
        }
    }

    /// Attach the credential header, or strip it when there is none
    pub fn attach(&mut self, credential: Option<&Credential>) {
        match credential {
            Some(credential) => self
                .request
                .set_header(AUTH_HEADER, credential.header_value()),
            None => self.request.remove_header(AUTH_HEADER),
        }
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Backend API client with credential injection and refresh
pub struct ApiClient {
    transport: Arc<dyn HttpTransport>,
    store: Arc<dyn CredentialStore>,
    session: Arc<dyn SessionListener>,
    refresh_generation: AtomicU64,
    /// Outcome of the latest refresh; `None` after a failed one
    last_refresh: Mutex<Option<Credential>>,
}

impl ApiClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        store: Arc<dyn CredentialStore>,
        session: Arc<dyn SessionListener>,
    ) -> Self {
        Self {
            transport,
            store,
            session,
            refresh_generation: AtomicU64::new(0),
            last_refresh: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.get().is_some()
    }

    /// Send a request with the current credential attached.
    ///
    /// A 401 on anything but the login endpoint triggers one refresh and one
    /// resend. Other non-2xx responses come back as [`Error::Http`].
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<JsonValue>,
        params: Option<Vec<(String, String)>>,
    ) -> Result<ApiResponse> {
        let mut request = ApiRequest::new(method, path);
        request.body = body;
        request.params = params.unwrap_or_default();
        let mut envelope = RequestEnvelope::new(request);

        // Generation first: a refresh landing in between only makes us reuse a fresh token
        let generation = self.refresh_generation.load(Ordering::Acquire);
        envelope.attach(self.store.get().as_ref());

        let response = self.transport.send(envelope.request()).await?;

        if response.status == UNAUTHORIZED && path != LOGIN_PATH && envelope.mark_retried() {
            let credential = self.refresh_after(generation).await?;
            envelope.attach(Some(&credential));
            let retried = self.transport.send(envelope.request()).await?;
            return check_status(retried);
        }

        check_status(response)
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse> {
        self.request(Method::Get, path, None, None).await
    }

    pub async fn post(&self, path: &str, body: JsonValue) -> Result<ApiResponse> {
        self.request(Method::Post, path, Some(body), None).await
    }

    /// Log in and store the issued credential
    pub async fn login(&self, email: &str, password: &str) -> Result<()> {
        let body = serde_json::to_value(LoginRequest { email, password })?;
        let response = self
            .request(Method::Post, LOGIN_PATH, Some(body), None)
            .await?;
        let credential = extract_credential(&response).ok_or(Error::MissingCredential)?;
        self.store.set(credential)
    }

    /// Forget the stored credential
    pub fn logout(&self) -> Result<()> {
        self.store.clear()
    }

    /// Refresh the credential now, sharing any refresh already in flight
    pub async fn refresh(&self) -> Result<Credential> {
        let generation = self.refresh_generation.load(Ordering::Acquire);
        self.refresh_after(generation).await
    }

    async fn refresh_after(&self, seen_generation: u64) -> Result<Credential> {
        let mut last = self.last_refresh.lock().await;
        if self.refresh_generation.load(Ordering::Acquire) != seen_generation {
            return last.clone().ok_or(Error::SessionExpired);
        }

        let (outcome, result) = match self.reissue().await {
            Ok(credential) => {
                // Waiters get the issued credential even when persisting it fails
                let saved = self.store.set(credential.clone());
                (Some(credential.clone()), saved.map(|()| credential))
            }
            Err(_) => {
                // The store drops its in-memory copy even if persisting the clear fails
                let _ = self.store.clear();
                self.session.on_session_expired();
                (None, Err(Error::SessionExpired))
            }
        };

        *last = outcome;
        self.refresh_generation.fetch_add(1, Ordering::Release);
        result
    }

    async fn reissue(&self) -> Result<Credential> {
        let request = ApiRequest::new(Method::Post, REISSUE_PATH);
        let response = check_status(self.transport.send(&request).await?)?;
        extract_credential(&response).ok_or(Error::MissingCredential)
    }
}

fn check_status(response: ApiResponse) -> Result<ApiResponse> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(Error::Http {
            status: response.status,
            message: response.error_message(),
        })
    }
}

/// Credential from the `Authorization` response header, falling back to an
/// `accessToken` body field
fn extract_credential(response: &ApiResponse) -> Option<Credential> {
    response
        .header(AUTH_HEADER)
        .and_then(Credential::from_header)
        .or_else(|| {
            response
                .body
                .get("accessToken")
                .and_then(|v| v.as_str())
                .and_then(Credential::new)
        })
}
