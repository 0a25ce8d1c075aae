//! In-memory credential store

use std::sync::{PoisonError, RwLock};

use crate::domain::result::Result;
use crate::domain::Credential;
use crate::ports::CredentialStore;

/// Credential store that lives as long as the process
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    credential: RwLock<Option<Credential>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with a credential
    pub fn with_credential(credential: Credential) -> Self {
        Self {
            credential: RwLock::new(Some(credential)),
        }
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn get(&self) -> Option<Credential> {
        self.credential
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set(&self, credential: Credential) -> Result<()> {
        *self.credential.write().unwrap_or_else(PoisonError::into_inner) = Some(credential);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.credential.write().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_clear() {
        let store = InMemoryCredentialStore::new();
        assert!(store.get().is_none());

        store.set(Credential::new("a").unwrap()).unwrap();
        assert_eq!(store.get().unwrap().as_str(), "a");

        store.set(Credential::new("b").unwrap()).unwrap();
        assert_eq!(store.get().unwrap().as_str(), "b");

        store.clear().unwrap();
        assert!(store.get().is_none());
    }

    #[test]
    fn test_clear_after_poisoned_lock() {
        let store = std::sync::Arc::new(InMemoryCredentialStore::with_credential(
            Credential::new("stale").unwrap(),
        ));

        let poisoner = std::sync::Arc::clone(&store);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.credential.write().unwrap();
            panic!("poison the credential lock");
        })
        .join();

        store.clear().unwrap();
        assert!(store.get().is_none());
    }
}
