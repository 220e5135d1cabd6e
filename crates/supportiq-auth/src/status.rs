//! Human-facing summary of the stored tokens.

use chrono::{DateTime, Duration, Utc};

use crate::claims::{Claims, decode_claims, format_remaining};
use crate::error::Result;
use crate::token_store::{TokenKind, TokenStore};

/// What is known about one stored token.
#[derive(Debug, Clone)]
pub struct TokenStatus {
    pub kind: TokenKind,
    pub present: bool,
    /// `None` for absent or opaque tokens.
    pub claims: Option<Claims>,
    pub is_expired: bool,
    pub remaining: Option<Duration>,
}

impl TokenStatus {
    pub fn expires_in_display(&self) -> String {
        match (self.present, self.remaining) {
            (false, _) => "not stored".to_string(),
            (true, None) => "no expiry claim".to_string(),
            (true, Some(_)) if self.is_expired => "Expired".to_string(),
            (true, Some(remaining)) => format_remaining(remaining),
        }
    }
}

impl TokenStore {
    /// Inspect every stored token at `now`.
    pub fn status_at(&self, now: DateTime<Utc>) -> Result<Vec<TokenStatus>> {
        let mut statuses = Vec::with_capacity(TokenKind::ALL.len());
        for kind in TokenKind::ALL {
            let token = self.get(kind)?;
            // Refresh tokens are encrypted blobs for some providers.
            let claims = token.as_deref().and_then(|t| decode_claims(t).ok());
            let is_expired = claims
                .as_ref()
                .is_some_and(|c| c.is_expired_at(now, Duration::zero()));
            let remaining = claims.as_ref().and_then(|c| c.remaining_at(now));
            statuses.push(TokenStatus {
                kind,
                present: token.is_some(),
                claims,
                is_expired,
                remaining,
            });
        }
        Ok(statuses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::test_support::jwt;
    use crate::storage::create_memory_store;
    use crate::token_store::TokenSet;

    #[test]
    fn test_status_reports_each_kind() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let tokens = TokenStore::new(create_memory_store());
        tokens
            .save(&TokenSet {
                id_token: Some(jwt(serde_json::json!({
                    "exp": (now - Duration::minutes(1)).timestamp(),
                    "token_use": "id",
                }))),
                access_token: Some(jwt(serde_json::json!({
                    "exp": (now + Duration::hours(2)).timestamp(),
                    "token_use": "access",
                    "scope": "openid email",
                }))),
                refresh_token: Some("opaque".to_string()),
                ..TokenSet::default()
            })
            .unwrap();

        let statuses = tokens.status_at(now).unwrap();
        assert_eq!(statuses.len(), 3);

        let id = &statuses[0];
        assert!(id.present && id.is_expired);
        assert_eq!(id.expires_in_display(), "Expired");

        let access = &statuses[1];
        assert!(!access.is_expired);
        assert_eq!(access.expires_in_display(), "2h 0m");
        assert_eq!(
            access.claims.as_ref().unwrap().scope.as_deref(),
            Some("openid email")
        );

        let refresh = &statuses[2];
        assert!(refresh.present && refresh.claims.is_none());
        assert_eq!(refresh.expires_in_display(), "no expiry claim");
    }

    #[test]
    fn test_status_when_signed_out() {
        let tokens = TokenStore::new(create_memory_store());
        let statuses = tokens.status_at(Utc::now()).unwrap();
        assert!(statuses.iter().all(|s| !s.present));
        assert_eq!(statuses[0].expires_in_display(), "not stored");
    }
}
