//! Configuration system for the SupportIQ dashboard client.
//!
//! Provides TOML-based configuration with:
//! - `[auth]`: identity provider, client ID, redirect URI, scopes
//! - `[api]`: analytics backend URL, API key, bearer token kind
//! - Config file layering (user config dir + project-local override)
//! - Environment variable overrides applied last

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    ConfigSource, LoadedConfig, load_config, load_config_file, load_config_with_options,
    save_config, user_config_dir, user_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
