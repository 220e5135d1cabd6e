//! Sign-in orchestration: redirect out, callback in.
//!
//! ```text
//! Idle ──start_flow──► AwaitingRedirect ──navigate──► AwaitingCallback
//!                                                        │
//!                                      handle_callback ──┴──► Authenticated | Failed
//! ```
//!
//! `Failed` and `Authenticated` both allow a fresh `start_flow`.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Deserialize;

use crate::config::OAuthConfig;
use crate::error::{AuthError, Result};
use crate::exchange::{TokenRefresher, exchange_code};
use crate::pkce::{CHALLENGE_METHOD, PkceParams};
use crate::session::FlowSessionStore;
use crate::storage::SharedStore;
use crate::token_store::{TokenSet, TokenStore};

/// Where the sign-in currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowPhase {
    Idle,
    AwaitingRedirect,
    AwaitingCallback,
    Authenticated,
    Failed,
}

impl std::fmt::Display for FlowPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            FlowPhase::Idle => "idle",
            FlowPhase::AwaitingRedirect => "awaiting redirect",
            FlowPhase::AwaitingCallback => "awaiting callback",
            FlowPhase::Authenticated => "authenticated",
            FlowPhase::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Sends the user agent to the authorization URL.
///
/// The redirect itself is the authorization request; implementations must
/// not fetch the URL themselves.
pub trait Navigator: Send + Sync {
    fn navigate(&self, url: &str) -> Result<()>;
}

/// Query parameters the provider appends to the redirect URI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl CallbackQuery {
    /// Parse a raw query string (with or without the leading `?`).
    pub fn from_query(query: &str) -> Self {
        let mut parsed = Self::default();
        let query = query.trim().trim_start_matches('?');
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let slot = match key.as_ref() {
                "code" => &mut parsed.code,
                "state" => &mut parsed.state,
                "error" => &mut parsed.error,
                "error_description" => &mut parsed.error_description,
                _ => continue,
            };
            if slot.is_none() && !value.is_empty() {
                *slot = Some(value.into_owned());
            }
        }
        parsed
    }

    /// Parse the full URL the provider redirected to.
    pub fn from_url(redirect: &str) -> Result<Self> {
        let url = url::Url::parse(redirect.trim())
            .map_err(|e| AuthError::InvalidCallback(format!("not a URL: {}", e)))?;
        Ok(Self::from_query(url.query().unwrap_or_default()))
    }

    /// Whether this looks like a provider callback at all.
    pub fn is_callback(&self) -> bool {
        self.error.is_some() || (self.code.is_some() && self.state.is_some())
    }
}

/// Build the authorization URL the user agent is sent to.
pub fn build_authorization_url(config: &OAuthConfig, challenge: &str, state: &str) -> String {
    let scope = config.scope_param();
    let params = [
        ("response_type", "code"),
        ("client_id", config.client_id.as_str()),
        ("redirect_uri", config.redirect_uri.as_str()),
        ("scope", scope.as_str()),
        ("state", state),
        ("code_challenge", challenge),
        ("code_challenge_method", CHALLENGE_METHOD),
    ];

    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    let separator = if config.authorize_url.contains('?') {
        '&'
    } else {
        '?'
    };
    format!("{}{}{}", config.authorize_url, separator, query)
}

/// Drives one sign-in at a time against the configured provider.
pub struct AuthFlow {
    config: OAuthConfig,
    http: reqwest::Client,
    session: FlowSessionStore,
    tokens: TokenStore,
    navigator: Arc<dyn Navigator>,
    phase: Mutex<FlowPhase>,
}

impl std::fmt::Debug for AuthFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthFlow")
            .field("config", &self.config)
            .field("phase", &*self.phase.lock())
            .finish()
    }
}

impl AuthFlow {
    pub fn new(config: OAuthConfig, store: SharedStore, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            session: FlowSessionStore::new(store.clone()),
            tokens: TokenStore::new(store),
            navigator,
            phase: Mutex::new(FlowPhase::Idle),
        }
    }

    /// Use a preconfigured HTTP client for token endpoint calls.
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// A refresher sharing this flow's HTTP client and provider config.
    pub fn refresher(&self) -> TokenRefresher {
        TokenRefresher::new(self.http.clone(), self.config.clone())
    }

    /// Current phase.
    ///
    /// A fresh process that finds a pending flow in storage reports
    /// `AwaitingCallback`.
    pub fn phase(&self) -> FlowPhase {
        let phase = *self.phase.lock();
        if phase == FlowPhase::Idle && self.session.is_pending().unwrap_or(false) {
            return FlowPhase::AwaitingCallback;
        }
        phase
    }

    fn set_phase(&self, phase: FlowPhase) {
        *self.phase.lock() = phase;
    }

    /// Begin a sign-in: persist fresh PKCE state and send the user agent to
    /// the provider.
    ///
    /// Any unfinished sign-in is replaced.
    pub fn start_flow(&self) -> Result<()> {
        let result = self.redirect_to_provider();
        if result.is_err() {
            self.set_phase(FlowPhase::Failed);
        }
        result
    }

    fn redirect_to_provider(&self) -> Result<()> {
        let pkce = PkceParams::generate()?;
        self.session.begin(&pkce.verifier, &pkce.state)?;

        let url = build_authorization_url(&self.config, &pkce.challenge, &pkce.state);
        self.set_phase(FlowPhase::AwaitingRedirect);
        tracing::info!(authorize_url = %self.config.authorize_url, "Redirecting to identity provider");

        self.navigator.navigate(&url)?;
        self.set_phase(FlowPhase::AwaitingCallback);
        Ok(())
    }

    /// Complete a sign-in from the provider's redirect.
    ///
    /// Returns `Ok(None)` when the query carries neither an error nor both
    /// `code` and `state`. A state mismatch leaves the pending flow in place;
    /// every other outcome consumes it.
    pub async fn handle_callback(&self, query: &CallbackQuery) -> Result<Option<TokenSet>> {
        if let Some(error) = &query.error {
            tracing::warn!(error = %error, "Provider denied authorization");
            self.session.clear()?;
            self.set_phase(FlowPhase::Failed);
            return Err(AuthError::ProviderDenied {
                error: error.clone(),
                description: query.error_description.clone(),
            });
        }

        let (Some(code), Some(state)) = (&query.code, &query.state) else {
            return Ok(None);
        };

        let result = self.complete(code, state).await;
        match &result {
            Ok(_) => {
                self.set_phase(FlowPhase::Authenticated);
                tracing::info!("Sign-in complete");
            }
            Err(e) => {
                self.set_phase(FlowPhase::Failed);
                tracing::warn!(error = %e, "Sign-in failed");
            }
        }
        result.map(Some)
    }

    async fn complete(&self, code: &str, state: &str) -> Result<TokenSet> {
        let pending = self.session.load()?;

        let state_matches = pending
            .state
            .as_deref()
            .is_some_and(|expected| constant_time_eq(expected.as_bytes(), state.as_bytes()));
        if !state_matches {
            return Err(AuthError::StateMismatch);
        }

        // The pending flow is single-use from here on, whatever happens next.
        self.session.clear()?;

        let verifier = pending.verifier.ok_or(AuthError::MissingVerifier)?;
        let tokens = exchange_code(&self.http, &self.config, code, &verifier).await?;
        self.tokens.save(&tokens)?;
        Ok(tokens)
    }

    /// Forget all tokens and any pending sign-in.
    pub fn logout(&self) -> Result<()> {
        self.tokens.clear()?;
        self.session.clear()?;
        self.set_phase(FlowPhase::Idle);
        tracing::info!("Signed out");
        Ok(())
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
