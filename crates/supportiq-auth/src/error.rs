//! Error types for the authentication flow.

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors that can occur while authenticating or managing tokens.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The provider (or the user) refused the authorization request.
    #[error("Authorization denied by provider: {error}")]
    ProviderDenied {
        error: String,
        description: Option<String>,
    },

    /// Callback state did not match the pending flow.
    #[error("State mismatch: callback does not belong to the pending sign-in")]
    StateMismatch,

    /// No PKCE verifier was stored for the pending flow.
    #[error("Missing code verifier for the pending sign-in")]
    MissingVerifier,

    /// Token endpoint rejected the authorization code.
    #[error("Token exchange failed ({status}): {body}")]
    TokenExchangeFailed { status: u16, body: String },

    /// Token endpoint rejected the refresh token.
    #[error("Token refresh failed ({status}): {body}")]
    RefreshFailed { status: u16, body: String },

    /// The operating system random source could not be read.
    #[error("Secure randomness unavailable: {0}")]
    RandomnessUnavailable(String),

    /// Network/HTTP error.
    #[error("Network error: {0}")]
    Network(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Persistent storage error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// Handing the authorization URL to the user agent failed.
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// Callback URL could not be parsed.
    #[error("Invalid callback: {0}")]
    InvalidCallback(String),

    /// Token is not a decodable JWT.
    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

impl AuthError {
    /// Whether the user can recover by starting a new sign-in.
    pub fn is_retryable_by_restart(&self) -> bool {
        !matches!(self, AuthError::RandomnessUnavailable(_))
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        AuthError::Network(e.to_string())
    }
}
