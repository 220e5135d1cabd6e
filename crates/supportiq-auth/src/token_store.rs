//! Persistence for issued tokens.
//!
//! The store never evaluates expiry; callers inspect the embedded `exp`
//! claim when they read a token (see [`crate::claims`]).

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::storage::SharedStore;

/// Storage key for the ID token.
pub const ID_TOKEN_KEY: &str = "id_token";

/// Storage key for the access token.
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Storage key for the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// The kinds of token the provider issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Id,
    Access,
    Refresh,
}

impl TokenKind {
    pub const ALL: [TokenKind; 3] = [TokenKind::Id, TokenKind::Access, TokenKind::Refresh];

    pub fn storage_key(self) -> &'static str {
        match self {
            TokenKind::Id => ID_TOKEN_KEY,
            TokenKind::Access => ACCESS_TOKEN_KEY,
            TokenKind::Refresh => REFRESH_TOKEN_KEY,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TokenKind::Id => "ID token",
            TokenKind::Access => "Access token",
            TokenKind::Refresh => "Refresh token",
        }
    }
}

impl std::str::FromStr for TokenKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "id" | "id_token" => Ok(TokenKind::Id),
            "access" | "access_token" => Ok(TokenKind::Access),
            "refresh" | "refresh_token" => Ok(TokenKind::Refresh),
            other => Err(format!("unknown token kind '{}'", other)),
        }
    }
}

/// Tokens returned by the provider's token endpoint.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |t: &Option<String>| t.as_ref().map(|_| "<redacted>");
        f.debug_struct("TokenSet")
            .field("id_token", &mask(&self.id_token))
            .field("access_token", &mask(&self.access_token))
            .field("refresh_token", &mask(&self.refresh_token))
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .finish()
    }
}

impl TokenSet {
    pub fn get(&self, kind: TokenKind) -> Option<&str> {
        match kind {
            TokenKind::Id => self.id_token.as_deref(),
            TokenKind::Access => self.access_token.as_deref(),
            TokenKind::Refresh => self.refresh_token.as_deref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        TokenKind::ALL.iter().all(|k| self.get(*k).is_none())
    }
}

/// Token persistence over a [`SharedStore`].
#[derive(Debug, Clone)]
pub struct TokenStore {
    store: SharedStore,
}

impl TokenStore {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Write every token present in `tokens`.
    ///
    /// Kinds absent from `tokens` keep their stored value, so a refresh
    /// response without a new refresh token leaves the old one in place.
    pub fn save(&self, tokens: &TokenSet) -> Result<()> {
        let entries: Vec<(&str, &str)> = TokenKind::ALL
            .iter()
            .filter_map(|kind| tokens.get(*kind).map(|t| (kind.storage_key(), t)))
            .collect();
        if entries.is_empty() {
            return Ok(());
        }
        self.store.set_many(&entries)?;
        tracing::debug!(kinds = entries.len(), "Tokens saved");
        Ok(())
    }

    pub fn get(&self, kind: TokenKind) -> Result<Option<String>> {
        Ok(self
            .store
            .get(kind.storage_key())?
            .filter(|t| !t.is_empty()))
    }

    /// Load all stored tokens.
    pub fn load(&self) -> Result<TokenSet> {
        Ok(TokenSet {
            id_token: self.get(TokenKind::Id)?,
            access_token: self.get(TokenKind::Access)?,
            refresh_token: self.get(TokenKind::Refresh)?,
            ..TokenSet::default()
        })
    }

    pub fn has_tokens(&self) -> Result<bool> {
        Ok(self.get(TokenKind::Id)?.is_some() || self.get(TokenKind::Access)?.is_some())
    }

    /// Remove every token kind in a single store operation.
    pub fn clear(&self) -> Result<()> {
        let keys = TokenKind::ALL.map(TokenKind::storage_key);
        self.store.remove_many(&keys)?;
        tracing::debug!("Tokens cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::create_memory_store;

    fn full_set() -> TokenSet {
        TokenSet {
            id_token: Some("id".to_string()),
            access_token: Some("access".to_string()),
            refresh_token: Some("refresh".to_string()),
            ..TokenSet::default()
        }
    }

    #[test]
    fn test_save_and_get() {
        let tokens = TokenStore::new(create_memory_store());
        tokens.save(&full_set()).unwrap();

        assert_eq!(tokens.get(TokenKind::Id).unwrap().as_deref(), Some("id"));
        assert_eq!(tokens.get(TokenKind::Access).unwrap().as_deref(), Some("access"));
        assert_eq!(tokens.get(TokenKind::Refresh).unwrap().as_deref(), Some("refresh"));
        assert!(tokens.has_tokens().unwrap());
    }

    #[test]
    fn test_clear_removes_all_kinds() {
        let tokens = TokenStore::new(create_memory_store());
        tokens.save(&full_set()).unwrap();

        tokens.clear().unwrap();
        for kind in TokenKind::ALL {
            assert_eq!(tokens.get(kind).unwrap(), None);
        }

        // Clearing again is harmless.
        tokens.clear().unwrap();
        assert!(tokens.load().unwrap().is_empty());
    }

    #[test]
    fn test_partial_save_keeps_existing_refresh_token() {
        let tokens = TokenStore::new(create_memory_store());
        tokens.save(&full_set()).unwrap();

        tokens
            .save(&TokenSet {
                access_token: Some("access-2".to_string()),
                ..TokenSet::default()
            })
            .unwrap();

        let loaded = tokens.load().unwrap();
        assert_eq!(loaded.access_token.as_deref(), Some("access-2"));
        assert_eq!(loaded.refresh_token.as_deref(), Some("refresh"));
        assert_eq!(loaded.id_token.as_deref(), Some("id"));
    }

    #[test]
    fn test_token_set_parses_provider_response() {
        let json = r#"{
            "id_token": "eyJ.id",
            "access_token": "eyJ.access",
            "refresh_token": "eyJ.refresh",
            "expires_in": 3600,
            "token_type": "Bearer"
        }"#;
        let set: TokenSet = serde_json::from_str(json).unwrap();
        assert_eq!(set.access_token.as_deref(), Some("eyJ.access"));
        assert_eq!(set.expires_in, Some(3600));

        let minimal: TokenSet = serde_json::from_str(r#"{"access_token":"AT1"}"#).unwrap();
        assert_eq!(minimal.get(TokenKind::Access), Some("AT1"));
        assert_eq!(minimal.get(TokenKind::Refresh), None);
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let debug = format!("{:?}", full_set());
        assert!(!debug.contains("\"access\""));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_token_kind_from_str() {
        assert_eq!("access".parse::<TokenKind>().unwrap(), TokenKind::Access);
        assert_eq!("ID_TOKEN".parse::<TokenKind>().unwrap(), TokenKind::Id);
        assert!("bearer".parse::<TokenKind>().is_err());
    }
}
