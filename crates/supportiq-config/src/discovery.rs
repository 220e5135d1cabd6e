//! Config file discovery and layered merging.
//!
//! Resolution order (later overrides earlier):
//! 1. `<config dir>/supportiq/config.toml` (user config)
//! 2. `./supportiq.toml` (project-local)
//! 3. `SUPPORTIQ_*` environment variables
//! 4. CLI arguments (handled externally)

use std::path::{Path, PathBuf};

use crate::{ApiSection, AuthSection, ConfigError, Result, SupportIqConfig};

/// Default config filename for project-local config.
const PROJECT_CONFIG_FILE: &str = "supportiq.toml";

/// Default config filename within the user config directory.
const USER_CONFIG_FILE: &str = "config.toml";

/// Application name for config directory resolution.
const APP_NAME: &str = "supportiq";

/// Environment variable to override the config directory.
const CONFIG_DIR_ENV: &str = "SUPPORTIQ_CONFIG_DIR";

const CLIENT_ID_ENV: &str = "SUPPORTIQ_CLIENT_ID";
const PROVIDER_DOMAIN_ENV: &str = "SUPPORTIQ_PROVIDER_DOMAIN";
const API_URL_ENV: &str = "SUPPORTIQ_API_URL";
const API_KEY_ENV: &str = "SUPPORTIQ_API_KEY";

/// Tracks where each config layer was loaded from.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    /// Path to the config file.
    pub path: PathBuf,
    /// Whether the file was found and loaded.
    pub loaded: bool,
}

/// Result of config discovery and loading.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The merged configuration.
    pub config: SupportIqConfig,
    /// Sources that were checked, in order of precedence (lowest first).
    pub sources: Vec<ConfigSource>,
    /// Environment variables that overrode file values.
    pub env_overrides: Vec<&'static str>,
    /// Warnings generated during loading (e.g., plaintext API keys).
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Get paths of sources that were actually loaded.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter(|s| s.loaded)
            .map(|s| s.path.as_path())
            .collect()
    }
}

/// Load configuration by discovering and merging all config layers.
pub fn load_config(project_dir: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with_options(project_dir, None, |key| std::env::var(key).ok())
}

/// Load configuration with explicit control over the user config directory
/// and the environment lookup.
///
/// `config_dir` overrides both `SUPPORTIQ_CONFIG_DIR` and the platform default.
pub fn load_config_with_options<F>(
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
    env: F,
) -> Result<LoadedConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = SupportIqConfig::new();
    let mut sources = Vec::new();
    let mut warnings = Vec::new();

    // 1. User config: explicit override, then env var, then platform default
    let user_config_path = match config_dir {
        Some(dir) => Some(dir.join(USER_CONFIG_FILE)),
        None => user_config_path(),
    };
    if let Some(path) = user_config_path {
        sources.push(load_layer(&mut config, &path, &mut warnings));
    }

    // 2. Project-local config
    let project_path = project_dir
        .map(|d| d.join(PROJECT_CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));
    sources.push(load_layer(&mut config, &project_path, &mut warnings));

    // Plaintext keys are only worth flagging when they came from a file
    check_plaintext_keys(&config, &mut warnings);

    // 3. Environment
    let env_overrides = apply_env_overrides(&mut config, env);

    Ok(LoadedConfig {
        config,
        sources,
        env_overrides,
        warnings,
    })
}

/// Load config from a specific file path (no discovery).
pub fn load_config_file(path: &Path) -> Result<SupportIqConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    SupportIqConfig::from_toml(&contents)
}

/// Save configuration to a file.
///
/// Creates parent directories if they don't exist.
pub fn save_config(config: &SupportIqConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteFile {
            path: parent.display().to_string(),
            source: e,
        })?;
    }

    let contents = config.to_toml()?;
    std::fs::write(path, contents).map_err(|e| ConfigError::WriteFile {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(())
}

/// Get the user config file path.
pub fn user_config_path() -> Option<PathBuf> {
    user_config_dir().map(|d| d.join(USER_CONFIG_FILE))
}

/// Get the user config directory for supportiq.
///
/// Checks `SUPPORTIQ_CONFIG_DIR` first, then falls back to the platform default
/// (`~/.config/supportiq` on Linux, `~/Library/Application Support/supportiq` on macOS).
pub fn user_config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Try to load a config file and merge it into the existing config.
///
/// A broken layer is skipped with a warning rather than failing the load.
fn load_layer(config: &mut SupportIqConfig, path: &Path, warnings: &mut Vec<String>) -> ConfigSource {
    if !path.is_file() {
        return ConfigSource {
            path: path.to_path_buf(),
            loaded: false,
        };
    }

    match load_config_file(path) {
        Ok(layer) => {
            config.merge(layer);
            ConfigSource {
                path: path.to_path_buf(),
                loaded: true,
            }
        }
        Err(e) => {
            warnings.push(format!("Failed to load {}: {}", path.display(), e));
            ConfigSource {
                path: path.to_path_buf(),
                loaded: false,
            }
        }
    }
}

fn apply_env_overrides<F>(config: &mut SupportIqConfig, env: F) -> Vec<&'static str>
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |key: &'static str, applied: &mut Vec<&'static str>| {
        let value = env(key).filter(|v| !v.trim().is_empty());
        if value.is_some() {
            applied.push(key);
        }
        value
    };

    let mut applied = Vec::new();
    let auth = AuthSection {
        provider_domain: lookup(PROVIDER_DOMAIN_ENV, &mut applied),
        client_id: lookup(CLIENT_ID_ENV, &mut applied),
        ..AuthSection::default()
    };
    let api = ApiSection {
        base_url: lookup(API_URL_ENV, &mut applied),
        api_key: lookup(API_KEY_ENV, &mut applied),
        ..ApiSection::default()
    };

    config.merge(SupportIqConfig {
        auth: Some(auth),
        api: Some(api),
    });
    applied
}

/// Check for plaintext API keys in the config and emit warnings.
fn check_plaintext_keys(config: &SupportIqConfig, warnings: &mut Vec<String>) {
    if config.api().has_plaintext_api_key() {
        warnings.push(format!(
            "[api] contains a plaintext API key. \
             Consider setting {} in the environment instead.",
            API_KEY_ENV
        ));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_user_config_path_shape() {
        if let Some(p) = user_config_path() {
            assert!(p.ends_with(USER_CONFIG_FILE));
        }
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config_file(Path::new("/nonexistent/supportiq.toml"));
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }

    #[test]
    fn test_project_overrides_user() {
        let user_dir = TempDir::new().unwrap();
        let project_dir = TempDir::new().unwrap();
        fs::write(
            user_dir.path().join(USER_CONFIG_FILE),
            r#"
[auth]
provider_domain = "user.auth.example.com"
client_id = "user-client"
"#,
        )
        .unwrap();
        fs::write(
            project_dir.path().join(PROJECT_CONFIG_FILE),
            r#"
[auth]
client_id = "project-client"
"#,
        )
        .unwrap();

        let loaded =
            load_config_with_options(Some(project_dir.path()), Some(user_dir.path()), no_env)
                .unwrap();

        let auth = loaded.config.auth();
        assert_eq!(auth.provider_domain().unwrap(), "user.auth.example.com");
        assert_eq!(auth.client_id().unwrap(), "project-client");
        assert_eq!(loaded.loaded_from().len(), 2);
        assert!(loaded.warnings.is_empty());
    }

    #[test]
    fn test_env_overrides_files() {
        let user_dir = TempDir::new().unwrap();
        let project_dir = TempDir::new().unwrap();
        fs::write(
            user_dir.path().join(USER_CONFIG_FILE),
            "[api]\nbase_url = \"https://file.example.com\"\n",
        )
        .unwrap();

        let env: HashMap<&str, &str> = [
            ("SUPPORTIQ_API_URL", "https://env.example.com"),
            ("SUPPORTIQ_CLIENT_ID", "env-client"),
            ("SUPPORTIQ_API_KEY", ""),
        ]
        .into_iter()
        .collect();

        let loaded = load_config_with_options(
            Some(project_dir.path()),
            Some(user_dir.path()),
            |key| env.get(key).map(|v| v.to_string()),
        )
        .unwrap();

        assert_eq!(
            loaded.config.api().base_url().unwrap(),
            "https://env.example.com"
        );
        assert_eq!(loaded.config.auth().client_id().unwrap(), "env-client");
        assert_eq!(
            loaded.env_overrides,
            vec!["SUPPORTIQ_CLIENT_ID", "SUPPORTIQ_API_URL"]
        );
        assert!(loaded.config.api().api_key().is_none());
    }

    #[test]
    fn test_broken_layer_becomes_warning() {
        let user_dir = TempDir::new().unwrap();
        let project_dir = TempDir::new().unwrap();
        fs::write(user_dir.path().join(USER_CONFIG_FILE), "[auth\nbroken").unwrap();

        let loaded =
            load_config_with_options(Some(project_dir.path()), Some(user_dir.path()), no_env)
                .unwrap();

        assert!(loaded.loaded_from().is_empty());
        assert_eq!(loaded.warnings.len(), 1);
        assert!(loaded.warnings[0].contains("Failed to load"));
    }

    #[test]
    fn test_plaintext_api_key_warning() {
        let user_dir = TempDir::new().unwrap();
        let project_dir = TempDir::new().unwrap();
        fs::write(
            project_dir.path().join(PROJECT_CONFIG_FILE),
            "[api]\napi_key = \"abc\"\n",
        )
        .unwrap();

        let loaded =
            load_config_with_options(Some(project_dir.path()), Some(user_dir.path()), no_env)
                .unwrap();

        assert!(loaded.warnings.iter().any(|w| w.contains("plaintext API key")));
        assert_eq!(loaded.config.api().api_key(), Some("abc"));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(USER_CONFIG_FILE);
        let mut config = SupportIqConfig::new();
        config.auth = Some(AuthSection {
            client_id: Some("saved".to_string()),
            ..AuthSection::default()
        });

        save_config(&config, &path).unwrap();
        let reloaded = load_config_file(&path).unwrap();
        assert_eq!(reloaded, config);
    }
}
