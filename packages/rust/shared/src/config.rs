//! Application configuration for brewsync.
//!
//! User config lives at `~/.brewsync/brewsync.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BrewSyncError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "brewsync.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".brewsync";

// ---------------------------------------------------------------------------
// Config structs (matching brewsync.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Remote recipe service settings.
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Local recipe stores.
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Synchronization behavior.
    #[serde(default)]
    pub sync: SyncConfig,
}

/// `[remote]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the recipe creator.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Base URL of the account/login service.
    #[serde(default = "default_auth_url")]
    pub auth_url: String,

    /// Account username.
    #[serde(default)]
    pub username: Option<String>,

    /// File holding the account password on its first line.
    #[serde(default = "default_password_file")]
    pub password_file: String,

    /// Where the session context is persisted between runs.
    #[serde(default = "default_state_file")]
    pub state_file: String,

    /// HTTP timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            auth_url: default_auth_url(),
            username: None,
            password_file: default_password_file(),
            state_file: default_state_file(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "https://brew.grainfather.com".into()
}
fn default_auth_url() -> String {
    "https://oauth.grainfather.com".into()
}
fn default_password_file() -> String {
    "~/.brewsync/password".into()
}
fn default_state_file() -> String {
    "~/.brewsync/session.json".into()
}
fn default_timeout_secs() -> u64 {
    30
}

/// `[sources]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Brewing log database (Kleiner Brauhelfer SQLite file).
    #[serde(default = "default_kbh_file")]
    pub kbh_file: String,

    /// Brewing software XML export.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_file: Option<String>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            kbh_file: default_kbh_file(),
            export_file: None,
        }
    }
}

fn default_kbh_file() -> String {
    "~/.kleiner-brauhelfer/kb_daten.sqlite".into()
}

/// `[sync]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Reconcile brew sessions along with recipes.
    #[serde(default = "default_true")]
    pub brews: bool,

    /// Seconds between modification-time checks in daemon mode.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Seconds to wait after a detected change before reading the log.
    #[serde(default = "default_settle")]
    pub settle_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            brews: true,
            poll_interval_secs: default_poll_interval(),
            settle_secs: default_settle(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_poll_interval() -> u64 {
    1
}
fn default_settle() -> u64 {
    1
}

// ---------------------------------------------------------------------------
// Sync options (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime sync options, merged from config file and CLI flags.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Overwrite remote records even when they are newer.
    pub force: bool,
    /// Log writes instead of performing them.
    pub dry_run: bool,
    /// Reconcile brew sessions too.
    pub brews: bool,
}

impl From<&AppConfig> for SyncOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            force: false,
            dry_run: false,
            brews: config.sync.brews,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.brewsync/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| BrewSyncError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.brewsync/brewsync.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| BrewSyncError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        BrewSyncError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| BrewSyncError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| BrewSyncError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| BrewSyncError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Read the password from the first line of a password file.
pub fn read_password_file(path: &Path) -> Result<String> {
    let content = std::fs::read_to_string(path).map_err(|e| BrewSyncError::io(path, e))?;
    let first = content.lines().next().unwrap_or("");
    Ok(first.trim_end_matches(['\r', '\n']).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("base_url"));
        assert!(toml_str.contains("kb_daten.sqlite"));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[remote]
username = "brewer"

[sync]
brews = false
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.remote.username.as_deref(), Some("brewer"));
        assert_eq!(config.remote.timeout_secs, 30);
        assert!(!config.sync.brews);
        assert_eq!(config.sync.poll_interval_secs, 1);
        assert!(config.sources.export_file.is_none());
    }

    #[test]
    fn sync_options_from_app_config() {
        let app = AppConfig::default();
        let opts = SyncOptions::from(&app);
        assert!(opts.brews);
        assert!(!opts.force);
        assert!(!opts.dry_run);
    }

    #[test]
    fn tilde_expansion() {
        let expanded = expand_tilde("~/x/y.sqlite");
        assert!(expanded.ends_with("x/y.sqlite"));
        assert_eq!(expand_tilde("/abs/path"), PathBuf::from("/abs/path"));
    }

    #[test]
    fn password_file_first_line_only() {
        let path = std::env::temp_dir().join(format!("brewsync_pw_{}", std::process::id()));
        std::fs::write(&path, "s3cret\r\nignored\n").unwrap();
        assert_eq!(read_password_file(&path).unwrap(), "s3cret");
        std::fs::remove_file(&path).ok();
    }
}
