//! Credential store port
//!
//! Holds at most one bearer credential. The API client receives the store
//! at construction instead of reaching for global state, so tests can pass
//! an in-memory double.

use crate::domain::result::Result;
use crate::domain::Credential;

/// Storage for the current bearer credential
pub trait CredentialStore: Send + Sync {
    /// Current credential, if any
    fn get(&self) -> Option<Credential>;

    /// Replace the stored credential
    fn set(&self, credential: Credential) -> Result<()>;

    /// Remove the stored credential (logout, failed refresh)
    fn clear(&self) -> Result<()>;
}

/// Receives the session-expired signal
///
/// Called once per failed refresh. Hosts use it as the redirect to their
/// login entry point.
pub trait SessionListener: Send + Sync {
    fn on_session_expired(&self);
}

/// Listener that ignores the signal
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSessionListener;

impl SessionListener for NoopSessionListener {
    fn on_session_expired(&self) {}
}
