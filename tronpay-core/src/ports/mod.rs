//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. Services depend
//! only on these traits, not on concrete implementations.

mod credential_store;
mod http;

pub use credential_store::{CredentialStore, NoopSessionListener, SessionListener};
pub use http::{ApiRequest, ApiResponse, HttpTransport, Method};
