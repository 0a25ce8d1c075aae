//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - reqwest HTTP client for the HttpTransport port
//! - JSON file and in-memory stores for CredentialStore
//! - JSON file cookie jar holding the refresh session between runs
//! - In-process demo backend for trying the client offline

mod cookie_jar;
pub mod demo;
mod file_store;
mod http;
mod locked_file;
mod memory;

#[cfg(test)]
pub mod mock_backend;

pub use cookie_jar::{FileCookieJar, COOKIES_FILE};
pub use demo::{DemoBackend, DemoOptions};
pub use file_store::{FileCredentialStore, CREDENTIALS_FILE};
pub use http::{ReqwestTransport, DEFAULT_TIMEOUT};
pub use memory::InMemoryCredentialStore;
