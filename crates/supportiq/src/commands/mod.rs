//! CLI command handlers.

pub mod api;
pub mod auth;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use supportiq_auth::storage::create_file_store;
use supportiq_auth::{
    AuthFlow, Navigator, OAuthConfig, SharedStore, StoredTokenAccessor, TokenKind, TokenRefresher,
    TokenStore,
};
use supportiq_client::ApiClient;
use supportiq_config::SupportIqConfig;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Merged configuration (files + environment).
    pub config: SupportIqConfig,
    /// Where the session file and logs live.
    pub config_dir: PathBuf,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// The persistent key/value store (session file in the config dir).
    pub fn store(&self) -> SharedStore {
        create_file_store(&self.config_dir)
    }

    pub fn tokens(&self) -> TokenStore {
        TokenStore::new(self.store())
    }

    /// Identity provider settings from `[auth]`.
    pub fn oauth_config(&self) -> Result<OAuthConfig> {
        let auth = self.config.auth();
        let config = OAuthConfig::for_provider(
            auth.provider_domain()?,
            auth.client_id()?,
            auth.redirect_uri()?.as_str(),
            auth.scopes(),
        )?;
        Ok(config)
    }

    pub fn auth_flow(&self, navigator: Arc<dyn Navigator>) -> Result<AuthFlow> {
        Ok(AuthFlow::new(self.oauth_config()?, self.store(), navigator))
    }

    /// API client presenting the stored token.
    ///
    /// Expired tokens are refreshed when `[auth]` is complete enough to
    /// reach the token endpoint; otherwise they are sent as-is.
    pub fn api_client(&self) -> Result<ApiClient> {
        let api = self.config.api();
        let kind: TokenKind = api
            .token_kind()
            .parse()
            .map_err(|e: String| anyhow::anyhow!("invalid [api] token_kind: {}", e))?;

        let mut accessor = StoredTokenAccessor::new(self.tokens(), kind);
        match self.oauth_config() {
            Ok(oauth) => {
                accessor = accessor.with_refresher(TokenRefresher::new(Default::default(), oauth));
            }
            Err(e) => tracing::debug!(error = %e, "Token refresh disabled"),
        }

        let mut builder = ApiClient::builder()
            .base_url(api.base_url()?)
            .timeout(api.timeout())
            .token_accessor(accessor);
        if let Some(key) = api.api_key() {
            builder = builder.api_key(key);
        }
        Ok(builder.build()?)
    }
}
