//! Shopper authentication state.
//!
//! [`SessionStore`] is the only writer of the [`Credential`]. Caches and the
//! checkout orchestrator hold a reference and re-resolve the credential on
//! every call, so a sign-in or sign-out between two operations is always
//! observed.

use std::sync::{Arc, RwLock};

use souq_core::Credential;
use tracing::{debug, info, warn};

use crate::storage::{KeyValueStore, StorageError};

/// Durable storage key for the bearer token.
pub const CREDENTIAL_KEY: &str = "credential";

/// In-memory credential mirrored to durable storage.
pub struct SessionStore {
    current: RwLock<Option<Credential>>,
    durable: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("authenticated", &self.is_authenticated())
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Create a session with no in-memory credential.
    #[must_use]
    pub fn new(durable: Arc<dyn KeyValueStore>) -> Self {
        Self {
            current: RwLock::new(None),
            durable,
        }
    }

    /// The live credential.
    ///
    /// Falls back to durable storage when memory is empty (e.g. a fresh
    /// process after a previous sign-in). The fallback is read-only: it does
    /// not populate memory, so a later durable deletion is honoured.
    #[must_use]
    pub fn current_credential(&self) -> Option<Credential> {
        if let Some(credential) = self.read_memory() {
            return Some(credential);
        }

        match self.durable.get(CREDENTIAL_KEY) {
            Ok(stored) => stored.and_then(Credential::new),
            Err(e) => {
                warn!(error = %e, "Failed to read stored credential");
                None
            }
        }
    }

    /// Whether a credential is resolvable.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.current_credential().is_some()
    }

    /// Replace the in-memory credential without touching durable storage.
    pub fn set_credential(&self, credential: Option<Credential>) {
        match self.current.write() {
            Ok(mut current) => *current = credential,
            Err(poisoned) => *poisoned.into_inner() = credential,
        }
    }

    /// Record a successful authentication in memory and durable storage.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the credential cannot be persisted. The
    /// in-memory credential is set regardless.
    pub fn sign_in(&self, credential: Credential) -> Result<(), StorageError> {
        let token = credential.expose().to_string();
        self.set_credential(Some(credential));
        self.durable.put(CREDENTIAL_KEY, &token)?;
        info!("Shopper signed in");
        Ok(())
    }

    /// Destroy the credential in memory and durable storage.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the durable copy cannot be deleted. The
    /// in-memory credential is cleared regardless.
    pub fn sign_out(&self) -> Result<(), StorageError> {
        self.set_credential(None);
        self.durable.delete(CREDENTIAL_KEY)?;
        info!("Shopper signed out");
        Ok(())
    }

    fn read_memory(&self) -> Option<Credential> {
        let guard = match self.current.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                debug!("Session lock poisoned, recovering");
                poisoned.into_inner()
            }
        };
        guard.clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn credential(token: &str) -> Credential {
        Credential::new(token).unwrap()
    }

    #[test]
    fn test_starts_anonymous() {
        let session = SessionStore::new(Arc::new(MemoryStore::new()));
        assert!(session.current_credential().is_none());
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_durable_fallback_is_read_only() {
        let durable = Arc::new(MemoryStore::new());
        durable.put(CREDENTIAL_KEY, "tok_reload").unwrap();

        let session = SessionStore::new(durable.clone());
        assert_eq!(session.current_credential(), Some(credential("tok_reload")));

        // Memory was not populated by the fallback
        durable.delete(CREDENTIAL_KEY).unwrap();
        assert!(session.current_credential().is_none());
    }

    #[test]
    fn test_memory_takes_precedence() {
        let durable = Arc::new(MemoryStore::new());
        durable.put(CREDENTIAL_KEY, "tok_old").unwrap();

        let session = SessionStore::new(durable);
        session.set_credential(Some(credential("tok_new")));
        assert_eq!(session.current_credential(), Some(credential("tok_new")));
    }

    #[test]
    fn test_sign_in_then_sign_out() {
        let durable = Arc::new(MemoryStore::new());
        let session = SessionStore::new(durable.clone());

        session.sign_in(credential("tok_1")).unwrap();
        assert_eq!(durable.get(CREDENTIAL_KEY).unwrap().as_deref(), Some("tok_1"));
        assert!(session.is_authenticated());

        session.sign_out().unwrap();
        assert_eq!(durable.get(CREDENTIAL_KEY).unwrap(), None);
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_blank_stored_token_is_absent() {
        let durable = Arc::new(MemoryStore::new());
        durable.put(CREDENTIAL_KEY, "  ").unwrap();
        let session = SessionStore::new(durable);
        assert!(session.current_credential().is_none());
    }
}
