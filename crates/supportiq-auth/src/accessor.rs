//! Bearer credentials for the API client, sourced from the token store.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use supportiq_client::TokenAccessor;
use tokio::sync::Mutex;

use crate::claims::decode_claims;
use crate::error::Result;
use crate::exchange::TokenRefresher;
use crate::token_store::{TokenKind, TokenStore};

/// Tokens this close to expiry are treated as expired (seconds).
const EXPIRY_SKEW_SECS: i64 = 60;

/// Reads the bearer token from a [`TokenStore`] at send time.
///
/// When the stored token's `exp` claim has passed and a refresher is
/// configured, one refresh grant is performed and its result saved before
/// the token is handed out. Without a refresher the stale token is returned
/// and the backend gets to reject it.
#[derive(Debug)]
pub struct StoredTokenAccessor {
    tokens: TokenStore,
    kind: TokenKind,
    refresher: Option<TokenRefresher>,
    skew: Duration,
    refresh_lock: Mutex<()>,
}

impl StoredTokenAccessor {
    /// Serve `kind`, falling back to the other bearer kind (ID/access) when
    /// `kind` is not stored.
    pub fn new(tokens: TokenStore, kind: TokenKind) -> Self {
        Self {
            tokens,
            kind,
            refresher: None,
            skew: Duration::seconds(EXPIRY_SKEW_SECS),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn with_refresher(mut self, refresher: TokenRefresher) -> Self {
        self.refresher = Some(refresher);
        self
    }

    pub fn with_skew(mut self, skew: Duration) -> Self {
        self.skew = skew;
        self
    }

    fn fallback_kind(&self) -> Option<TokenKind> {
        match self.kind {
            TokenKind::Id => Some(TokenKind::Access),
            TokenKind::Access => Some(TokenKind::Id),
            TokenKind::Refresh => None,
        }
    }

    fn read(&self) -> Result<Option<(TokenKind, String)>> {
        if let Some(token) = self.tokens.get(self.kind)? {
            return Ok(Some((self.kind, token)));
        }
        match self.fallback_kind() {
            Some(kind) => Ok(self.tokens.get(kind)?.map(|t| (kind, t))),
            None => Ok(None),
        }
    }

    fn is_expired(&self, token: &str) -> bool {
        // Opaque tokens carry no claims; only the backend can judge them.
        decode_claims(token)
            .map(|claims| claims.is_expired_at(Utc::now(), self.skew))
            .unwrap_or(false)
    }

    /// The raw token to present, refreshed first if it has expired.
    pub async fn current_token(&self) -> Result<Option<String>> {
        let Some((kind, token)) = self.read()? else {
            tracing::debug!("No stored token; sending request unauthenticated");
            return Ok(None);
        };

        if !self.is_expired(&token) {
            return Ok(Some(token));
        }

        let Some(refresher) = &self.refresher else {
            tracing::debug!(kind = ?kind, "Stored token expired and no refresher configured");
            return Ok(Some(token));
        };

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited.
        if let Some(current) = self.tokens.get(kind)?
            && !self.is_expired(&current)
        {
            return Ok(Some(current));
        }

        let Some(refresh_token) = self.tokens.get(TokenKind::Refresh)? else {
            tracing::debug!(kind = ?kind, "Stored token expired and no refresh token available");
            return Ok(Some(token));
        };

        tracing::info!("Token expired, refreshing...");
        let refreshed = refresher.refresh(&refresh_token).await?;
        self.tokens.save(&refreshed)?;
        tracing::info!("Token refreshed successfully");

        Ok(self.tokens.get(kind)?.or(Some(token)))
    }
}

#[async_trait]
impl TokenAccessor for StoredTokenAccessor {
    async fn authorization(&self) -> supportiq_client::Result<Option<String>> {
        self.current_token()
            .await
            .map(|token| token.map(|t| format!("Bearer {}", t)))
            .map_err(|e| supportiq_client::Error::Credentials(e.to_string()))
    }
}
