//! Configuration types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Redirect URI served by the CLI's loopback listener unless configured.
pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:5173/oauth/callback";

/// Scopes requested unless configured.
pub const DEFAULT_SCOPES: [&str; 3] = ["openid", "email", "profile"];

/// How long `auth login` waits for the browser to come back.
pub const DEFAULT_CALLBACK_TIMEOUT_SECS: u64 = 300;

/// Backend request timeout.
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 15;

/// Token kind presented to the backend unless configured.
pub const DEFAULT_TOKEN_KIND: &str = "id";

/// Root configuration structure.
///
/// All sections and fields are optional so that partial configs
/// (e.g., project-local overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupportIqConfig {
    /// Identity provider settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthSection>,

    /// Analytics backend settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api: Option<ApiSection>,
}

impl SupportIqConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Fields merge individually, so a project file may override just the
    /// client ID while keeping the user's provider domain.
    pub fn merge(&mut self, other: SupportIqConfig) {
        if let Some(auth) = other.auth {
            self.auth.get_or_insert_with(AuthSection::default).merge(auth);
        }
        if let Some(api) = other.api {
            self.api.get_or_insert_with(ApiSection::default).merge(api);
        }
    }

    /// The `[auth]` section, or an empty one.
    pub fn auth(&self) -> AuthSection {
        self.auth.clone().unwrap_or_default()
    }

    /// The `[api]` section, or an empty one.
    pub fn api(&self) -> ApiSection {
        self.api.clone().unwrap_or_default()
    }
}

/// `[auth]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSection {
    /// Identity provider domain or base URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_timeout_secs: Option<u64>,
}

impl AuthSection {
    fn merge(&mut self, other: AuthSection) {
        if other.provider_domain.is_some() {
            self.provider_domain = other.provider_domain;
        }
        if other.client_id.is_some() {
            self.client_id = other.client_id;
        }
        if other.redirect_uri.is_some() {
            self.redirect_uri = other.redirect_uri;
        }
        if other.scopes.is_some() {
            self.scopes = other.scopes;
        }
        if other.callback_timeout_secs.is_some() {
            self.callback_timeout_secs = other.callback_timeout_secs;
        }
    }

    pub fn provider_domain(&self) -> Result<&str> {
        non_empty(self.provider_domain.as_deref()).ok_or_else(|| {
            ConfigError::missing("provider_domain", "[auth] (or SUPPORTIQ_PROVIDER_DOMAIN)")
        })
    }

    pub fn client_id(&self) -> Result<&str> {
        non_empty(self.client_id.as_deref())
            .ok_or_else(|| ConfigError::missing("client_id", "[auth] (or SUPPORTIQ_CLIENT_ID)"))
    }

    pub fn redirect_uri(&self) -> Result<url::Url> {
        let raw = non_empty(self.redirect_uri.as_deref()).unwrap_or(DEFAULT_REDIRECT_URI);
        url::Url::parse(raw).map_err(|e| ConfigError::InvalidValue {
            field: "auth.redirect_uri".to_string(),
            reason: e.to_string(),
        })
    }

    pub fn scopes(&self) -> Vec<String> {
        match &self.scopes {
            Some(scopes) if !scopes.is_empty() => scopes.clone(),
            _ => DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn callback_timeout(&self) -> Duration {
        Duration::from_secs(
            self.callback_timeout_secs
                .unwrap_or(DEFAULT_CALLBACK_TIMEOUT_SECS),
        )
    }
}

/// `[api]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Static key sent as `x-api-key`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Which stored token to present: `id` or `access`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl ApiSection {
    fn merge(&mut self, other: ApiSection) {
        if other.base_url.is_some() {
            self.base_url = other.base_url;
        }
        if other.api_key.is_some() {
            self.api_key = other.api_key;
        }
        if other.token_kind.is_some() {
            self.token_kind = other.token_kind;
        }
        if other.timeout_secs.is_some() {
            self.timeout_secs = other.timeout_secs;
        }
    }

    pub fn base_url(&self) -> Result<&str> {
        non_empty(self.base_url.as_deref())
            .ok_or_else(|| ConfigError::missing("base_url", "[api] (or SUPPORTIQ_API_URL)"))
    }

    pub fn api_key(&self) -> Option<&str> {
        non_empty(self.api_key.as_deref())
    }

    pub fn token_kind(&self) -> &str {
        non_empty(self.token_kind.as_deref()).unwrap_or(DEFAULT_TOKEN_KIND)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_API_TIMEOUT_SECS))
    }

    pub fn has_plaintext_api_key(&self) -> bool {
        self.api_key().is_some()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
