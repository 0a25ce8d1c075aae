//! File-backed credential store
//!
//! Persists the credential in `credentials.json` under the fixed key
//! `accessToken`, so it survives restarts of the client:
//! ```json
//! { "accessToken": "eyJ...", "savedAt": "2026-01-01T00:00:00Z" }
//! ```
//! The token is stored in plaintext. On Unix the file is created with mode 0600.

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::locked_file::{read_shared, write_exclusive};
use crate::domain::result::Result;
use crate::domain::Credential;
use crate::ports::CredentialStore;

pub const CREDENTIALS_FILE: &str = "credentials.json";

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CredentialsFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<Credential>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    saved_at: Option<DateTime<Utc>>,
}

/// Credential store persisted to the data directory
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    cached: RwLock<Option<Credential>>,
}

impl FileCredentialStore {
    /// Open the store in `dir`, loading any persisted credential.
    ///
    /// A missing or unreadable file means no credential.
    pub fn open(dir: &Path) -> Result<Self> {
        let path = dir.join(CREDENTIALS_FILE);
        let cached = read_shared(&path)?.and_then(|content| {
            serde_json::from_str::<CredentialsFile>(&content)
                .unwrap_or_default()
                .access_token
                .and_then(|c| Credential::new(c.as_str()))
        });

        Ok(Self {
            path,
            cached: RwLock::new(cached),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_file(&self, contents: &CredentialsFile) -> Result<()> {
        write_exclusive(&self.path, &serde_json::to_string_pretty(contents)?)
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self) -> Option<Credential> {
        self.cached
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set(&self, credential: Credential) -> Result<()> {
        self.write_file(&CredentialsFile {
            access_token: Some(credential.clone()),
            saved_at: Some(Utc::now()),
        })?;
        *self.cached.write().unwrap_or_else(PoisonError::into_inner) = Some(credential);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        // Drop the in-memory copy first so nothing sends it even if the write fails
        *self.cached.write().unwrap_or_else(PoisonError::into_inner) = None;
        if self.path.exists() {
            self.write_file(&CredentialsFile::default())?;
        }
        Ok(())
    }
}
