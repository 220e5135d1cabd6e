//! The single pending-sign-in slot.
//!
//! Holds the PKCE verifier and CSRF state between leaving for the provider
//! and coming back. There is exactly one slot: starting a second sign-in
//! overwrites the first, whose callback then fails with a state mismatch.

use crate::error::Result;
use crate::storage::SharedStore;

/// Storage key for the pending PKCE verifier.
pub const VERIFIER_KEY: &str = "oauth_code_verifier";

/// Storage key for the pending CSRF state.
pub const STATE_KEY: &str = "oauth_state";

/// Pending flow data, read back at callback time.
#[derive(Clone, PartialEq, Eq)]
pub struct PendingFlow {
    pub verifier: Option<String>,
    pub state: Option<String>,
}

impl std::fmt::Debug for PendingFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingFlow")
            .field("verifier", &self.verifier.as_ref().map(|_| "<redacted>"))
            .field("state", &self.state.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl PendingFlow {
    pub fn is_empty(&self) -> bool {
        self.verifier.is_none() && self.state.is_none()
    }
}

/// Accessor for the pending-flow slot.
#[derive(Debug, Clone)]
pub struct FlowSessionStore {
    store: SharedStore,
}

impl FlowSessionStore {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Record a new pending flow, replacing any previous one.
    pub fn begin(&self, verifier: &str, state: &str) -> Result<()> {
        if let Ok(Some(_)) = self.store.get(STATE_KEY) {
            tracing::warn!("Replacing an unfinished sign-in; its callback will be rejected");
        }
        self.store
            .set_many(&[(VERIFIER_KEY, verifier), (STATE_KEY, state)])
    }

    pub fn load(&self) -> Result<PendingFlow> {
        Ok(PendingFlow {
            verifier: self.store.get(VERIFIER_KEY)?.filter(|v| !v.is_empty()),
            state: self.store.get(STATE_KEY)?.filter(|s| !s.is_empty()),
        })
    }

    pub fn is_pending(&self) -> Result<bool> {
        Ok(self.store.get(STATE_KEY)?.is_some())
    }

    /// Delete the pending flow.
    pub fn clear(&self) -> Result<()> {
        self.store.remove_many(&[VERIFIER_KEY, STATE_KEY])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::create_memory_store;

    #[test]
    fn test_begin_load_clear() {
        let session = FlowSessionStore::new(create_memory_store());
        assert!(session.load().unwrap().is_empty());
        assert!(!session.is_pending().unwrap());

        session.begin("verifier-1", "state-1").unwrap();
        let pending = session.load().unwrap();
        assert_eq!(pending.verifier.as_deref(), Some("verifier-1"));
        assert_eq!(pending.state.as_deref(), Some("state-1"));
        assert!(session.is_pending().unwrap());

        session.clear().unwrap();
        assert!(session.load().unwrap().is_empty());
    }

    #[test]
    fn test_second_begin_overwrites_first() {
        let session = FlowSessionStore::new(create_memory_store());
        session.begin("verifier-1", "state-1").unwrap();
        session.begin("verifier-2", "state-2").unwrap();

        let pending = session.load().unwrap();
        assert_eq!(pending.verifier.as_deref(), Some("verifier-2"));
        assert_eq!(pending.state.as_deref(), Some("state-2"));
    }

    #[test]
    fn test_logout_and_login_survive_truncated_session_file() {
        use crate::storage::{FileStore, SESSION_FILE};
        use crate::token_store::{TokenKind, TokenStore};
        use std::sync::Arc;

        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join(SESSION_FILE), r#"{"access_token": "A""#).unwrap();
        let store: SharedStore = Arc::new(FileStore::new(temp.path()));

        let tokens = TokenStore::new(store.clone());
        tokens.clear().unwrap();
        assert_eq!(tokens.get(TokenKind::Access).unwrap(), None);

        let session = FlowSessionStore::new(store);
        session.begin("v", "s").unwrap();
        assert_eq!(session.load().unwrap().state.as_deref(), Some("s"));
    }
}
