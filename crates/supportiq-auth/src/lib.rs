//! OAuth 2.0 authorization code + PKCE sign-in for SupportIQ.
//!
//! Obtains tokens from the hosted identity provider and keeps them around
//! for the API client.
//!
//! # Components
//!
//! - [`pkce`]: verifier/challenge/state generation
//! - [`flow`]: redirect builder, callback handler, flow phases
//! - [`exchange`]: token endpoint calls (code exchange, refresh)
//! - [`session`]: the single pending-sign-in slot
//! - [`token_store`]: issued token persistence
//! - [`storage`]: key/value backends (file, memory)
//! - [`claims`]: unverified JWT claim inspection
//! - [`accessor`]: bearer credentials for `supportiq-client`

pub mod accessor;
pub mod claims;
pub mod config;
pub mod error;
pub mod exchange;
pub mod flow;
pub mod pkce;
pub mod session;
pub mod status;
pub mod storage;
pub mod token_store;

pub use accessor::StoredTokenAccessor;
pub use config::OAuthConfig;
pub use error::{AuthError, Result};
pub use exchange::TokenRefresher;
pub use flow::{AuthFlow, CallbackQuery, FlowPhase, Navigator, build_authorization_url};
pub use pkce::PkceParams;
pub use status::TokenStatus;
pub use storage::{FileStore, KeyValueStore, MemoryStore, SharedStore};
pub use token_store::{TokenKind, TokenSet, TokenStore};
