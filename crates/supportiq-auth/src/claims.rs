//! Unverified JWT claim inspection.
//!
//! Signatures are checked by the backend; this module only reads the
//! payload so the client can tell whether a stored token has expired.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::Deserialize;

use crate::error::{AuthError, Result};

/// The claims the client cares about.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub sub: Option<String>,
    /// String or array depending on the issuer.
    #[serde(default)]
    pub aud: Option<serde_json::Value>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub token_use: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl Claims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp
            .and_then(|exp| Utc.timestamp_opt(exp, 0).single())
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.iat
            .and_then(|iat| Utc.timestamp_opt(iat, 0).single())
    }

    /// Whether the token is expired at `now`, treating anything within
    /// `skew` of its expiry as already expired. Tokens without `exp` never
    /// expire from the client's point of view.
    pub fn is_expired_at(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        match self.expires_at() {
            Some(expires_at) => now + skew >= expires_at,
            None => false,
        }
    }

    /// Remaining lifetime at `now`, zero once expired.
    pub fn remaining_at(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.expires_at()
            .map(|expires_at| (expires_at - now).max(Duration::zero()))
    }

    /// Audience as a display string.
    pub fn audience(&self) -> Option<String> {
        match self.aud.as_ref()? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Array(values) => Some(
                values
                    .iter()
                    .filter_map(|v| v.as_str())
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            _ => None,
        }
    }
}

/// Decode the payload segment of a compact JWT.
pub fn decode_claims(token: &str) -> Result<Claims> {
    let token = token.strip_prefix("Bearer ").unwrap_or(token);
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_)) if !payload.is_empty() => payload,
        _ => {
            return Err(AuthError::InvalidToken(
                "expected three dot-separated segments".to_string(),
            ));
        }
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| AuthError::InvalidToken(format!("payload is not base64url: {}", e)))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::InvalidToken(format!("payload is not a JSON object: {}", e)))
}

/// Format a remaining lifetime the way `auth status` shows it.
pub fn format_remaining(remaining: Duration) -> String {
    if remaining <= Duration::zero() {
        return "expired".to_string();
    }
    let hours = remaining.num_hours();
    let minutes = remaining.num_minutes() % 60;
    format!("{}h {}m", hours, minutes)
}

#[cfg(test)]
pub(crate) mod test_support {
    use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};

    /// Build an unsigned JWT with the given payload.
    pub fn jwt(payload: serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{}.{}.signature", header, body)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::jwt;
    use super::*;

    #[test]
    fn test_decode_claims() {
        let token = jwt(serde_json::json!({
            "exp": 1_700_003_600,
            "iat": 1_700_000_000,
            "iss": "https://cognito-idp.us-east-1.amazonaws.com/pool",
            "client_id": "client",
            "token_use": "access",
            "scope": "openid email profile",
        }));

        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.exp, Some(1_700_003_600));
        assert_eq!(claims.token_use.as_deref(), Some("access"));
        assert_eq!(claims.scope.as_deref(), Some("openid email profile"));
        assert_eq!(
            claims.expires_at().unwrap().to_rfc3339(),
            "2023-11-14T23:13:20+00:00"
        );
    }

    #[test]
    fn test_decode_accepts_bearer_prefix() {
        let token = format!("Bearer {}", jwt(serde_json::json!({"exp": 1})));
        assert_eq!(decode_claims(&token).unwrap().exp, Some(1));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_claims("opaque-token"),
            Err(AuthError::InvalidToken(_))
        ));
        assert!(decode_claims("a.!!!.c").is_err());
        assert!(decode_claims("a..c").is_err());
    }

    #[test]
    fn test_expiry_with_skew() {
        let now = Utc::now();
        let claims = Claims {
            exp: Some((now + Duration::seconds(30)).timestamp()),
            ..Claims::default()
        };

        assert!(!claims.is_expired_at(now, Duration::zero()));
        assert!(claims.is_expired_at(now, Duration::seconds(60)));
        assert!(claims.is_expired_at(now + Duration::minutes(5), Duration::zero()));
    }

    #[test]
    fn test_missing_exp_never_expires() {
        let claims = Claims::default();
        assert!(!claims.is_expired_at(Utc::now(), Duration::seconds(60)));
        assert!(claims.remaining_at(Utc::now()).is_none());
    }

    #[test]
    fn test_audience_forms() {
        let single: Claims = serde_json::from_str(r#"{"aud":"client"}"#).unwrap();
        assert_eq!(single.audience().as_deref(), Some("client"));

        let many: Claims = serde_json::from_str(r#"{"aud":["a","b"]}"#).unwrap();
        assert_eq!(many.audience().as_deref(), Some("a,b"));
    }

    #[test]
    fn test_format_remaining() {
        assert_eq!(format_remaining(Duration::seconds(7200)), "2h 0m");
        assert_eq!(format_remaining(Duration::seconds(3660)), "1h 1m");
        assert_eq!(format_remaining(Duration::zero()), "expired");
    }
}
