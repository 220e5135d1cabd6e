//! Identity provider settings for the authorization code flow.

use crate::error::{AuthError, Result};

/// Authorization endpoint path on the hosted provider.
const AUTHORIZE_PATH: &str = "/oauth2/authorize";

/// Token endpoint path on the hosted provider.
const TOKEN_PATH: &str = "/oauth2/token";

/// OAuth configuration for the hosted identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthConfig {
    pub client_id: String,
    pub authorize_url: String,
    pub token_url: String,
    pub redirect_uri: String,
    scopes: Vec<String>,
}

impl OAuthConfig {
    /// Build a config for a provider domain.
    ///
    /// `provider` may be a bare host (`tenant.auth.us-east-1.amazoncognito.com`)
    /// or a full origin (`http://127.0.0.1:9000`). Bare hosts get `https://`.
    pub fn for_provider(
        provider: &str,
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
        scopes: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self> {
        let provider = provider.trim().trim_end_matches('/');
        if provider.is_empty() {
            return Err(AuthError::Config("provider domain is empty".to_string()));
        }
        let origin = if provider.starts_with("http://") || provider.starts_with("https://") {
            provider.to_string()
        } else {
            format!("https://{}", provider)
        };
        url::Url::parse(&origin)
            .map_err(|e| AuthError::Config(format!("invalid provider '{}': {}", provider, e)))?;

        let client_id: String = client_id.into();
        if client_id.is_empty() {
            return Err(AuthError::Config("client_id is empty".to_string()));
        }
        let redirect_uri: String = redirect_uri.into();
        url::Url::parse(&redirect_uri).map_err(|e| {
            AuthError::Config(format!("invalid redirect_uri '{}': {}", redirect_uri, e))
        })?;

        Ok(Self {
            client_id,
            authorize_url: format!("{}{}", origin, AUTHORIZE_PATH),
            token_url: format!("{}{}", origin, TOKEN_PATH),
            redirect_uri,
            scopes: Vec::new(),
        }
        .with_scopes(scopes))
    }

    /// Replace the requested scopes.
    ///
    /// Scopes are an ordered set: blanks and repeats are dropped, the first
    /// occurrence keeps its position.
    pub fn with_scopes(mut self, scopes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.scopes.clear();
        for scope in scopes {
            let scope: String = scope.into();
            let scope = scope.trim();
            if !scope.is_empty() && !self.scopes.iter().any(|s| s == scope) {
                self.scopes.push(scope.to_string());
            }
        }
        self
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Scopes as sent on the wire.
    pub fn scope_param(&self) -> String {
        self.scopes.join(" ")
    }
}
