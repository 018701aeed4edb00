//! Configuration file parser for ~/.config/apunto/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are accepted but logged as warnings. The backend location and
//! key may also come from `APUNTO_URL` / `APUNTO_ANON_KEY`, which take
//! precedence over the file.
use crate::util::{validate_backend_url, validate_redirect_url, UrlValidationError};
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use url::Url;

pub const ENV_URL: &str = "APUNTO_URL";
pub const ENV_ANON_KEY: &str = "APUNTO_ANON_KEY";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("No backend configured: set backend_url and anon_key in config.toml or export APUNTO_URL and APUNTO_ANON_KEY")]
    MissingBackend,

    #[error("Invalid {key}: {source}")]
    InvalidUrl {
        key: &'static str,
        source: UrlValidationError,
    },

    #[error("HOME environment variable not set")]
    NoHome,
}

pub const CONFIG_FILE: &str = "config.toml";

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// Every key is optional. The custom `Debug` impl masks `anon_key`.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the hosted backend, e.g. `https://abc.supabase.co`.
    pub backend_url: Option<String>,

    /// Public (anon) API key of the backend project.
    pub anon_key: Option<String>,

    /// Theme variant name ("dark" or "light").
    pub theme: String,

    /// Ask before deleting entries and categories.
    pub confirm_delete: bool,

    /// Page the password-reset mail links back to.
    pub reset_redirect_url: Option<String>,

    /// Editor command for entry text. Falls back to `$VISUAL`, `$EDITOR`, `vi`.
    pub editor: Option<String>,

    /// Keybinding overrides. Keys are action names, values are key strings.
    pub keybindings: HashMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: None,
            anon_key: None,
            theme: "dark".to_string(),
            confirm_delete: true,
            reset_redirect_url: None,
            editor: None,
            keybindings: HashMap::new(),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("backend_url", &self.backend_url)
            .field("anon_key", &self.anon_key.as_ref().map(|_| "[REDACTED]"))
            .field("theme", &self.theme)
            .field("confirm_delete", &self.confirm_delete)
            .field("reset_redirect_url", &self.reset_redirect_url)
            .field("editor", &self.editor)
            .field("keybindings", &self.keybindings)
            .finish()
    }
}

/// Validated backend coordinates.
#[derive(Clone)]
pub struct Connection {
    pub url: Url,
    pub anon_key: Arc<SecretString>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("url", &self.url.as_str())
            .field("anon_key", &"[REDACTED]")
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 7] = [
        "backend_url",
        "anon_key",
        "theme",
        "confirm_delete",
        "reset_redirect_url",
        "editor",
        "keybindings",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing or empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)`
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), theme = %config.theme, "Loaded configuration");
        Ok(config)
    }

    /// Apply `APUNTO_URL` / `APUNTO_ANON_KEY` from the process environment.
    pub fn with_env(self) -> Self {
        self.with_overrides(std::env::var(ENV_URL).ok(), std::env::var(ENV_ANON_KEY).ok())
    }

    /// Replace backend settings with explicitly supplied values. Blank values
    /// are ignored.
    pub fn with_overrides(mut self, url: Option<String>, anon_key: Option<String>) -> Self {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            tracing::debug!("Backend URL taken from environment");
            self.backend_url = Some(url);
        }
        if let Some(key) = anon_key.filter(|k| !k.trim().is_empty()) {
            self.anon_key = Some(key);
        }
        self
    }

    /// Validated backend URL and key.
    pub fn connection(&self) -> Result<Connection, ConfigError> {
        let (Some(url), Some(key)) = (self.backend_url.as_deref(), self.anon_key.as_deref()) else {
            return Err(ConfigError::MissingBackend);
        };
        let url = validate_backend_url(url).map_err(|source| ConfigError::InvalidUrl {
            key: "backend_url",
            source,
        })?;
        if url.scheme() == "http" {
            tracing::warn!(url = %url, "Using non-HTTPS backend URL (localhost only)");
        }
        Ok(Connection {
            url,
            anon_key: Arc::new(SecretString::from(key.trim().to_string())),
        })
    }

    /// Validated password-reset redirect target, if configured.
    pub fn reset_redirect(&self) -> Result<Option<Url>, ConfigError> {
        self.reset_redirect_url
            .as_deref()
            .map(validate_redirect_url)
            .transpose()
            .map_err(|source| ConfigError::InvalidUrl {
                key: "reset_redirect_url",
                source,
            })
    }

    /// Editor command line for entry text.
    pub fn editor_command(&self) -> String {
        self.editor
            .clone()
            .or_else(|| std::env::var("VISUAL").ok())
            .or_else(|| std::env::var("EDITOR").ok())
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| "vi".to_string())
    }
}

/// `~/.config/apunto/`
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    let home = std::env::var("HOME").map_err(|_| ConfigError::NoHome)?;
    Ok(PathBuf::from(home).join(".config").join("apunto"))
}

/// Create the config directory if needed and restrict it to the user.
pub fn ensure_config_dir(dir: &Path) -> Result<(), ConfigError> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
        tracing::info!(path = %dir.display(), "Created config directory");
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match std::fs::metadata(dir) {
            Ok(metadata) => {
                let mut perms = metadata.permissions();
                perms.set_mode(0o700);
                if let Err(e) = std::fs::set_permissions(dir, perms) {
                    tracing::warn!(
                        path = %dir.display(),
                        error = %e,
                        "Failed to set config directory permissions to 0700"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(path = %dir.display(), error = %e, "Failed to read config directory metadata");
            }
        }
    }

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn write_config(name: &str, content: &str) -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir().join(name);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(CONFIG_FILE);
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.theme, "dark");
        assert!(config.confirm_delete);
        assert!(config.backend_url.is_none());
        assert!(config.anon_key.is_none());
        assert!(config.keybindings.is_empty());
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/apunto_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.theme, "dark");
    }

    #[test]
    fn test_empty_file_returns_default() {
        let (dir, path) = write_config("apunto_config_test_empty", "  \n ");
        let config = Config::load(&path).unwrap();
        assert!(config.confirm_delete);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_full_config() {
        let (dir, path) = write_config(
            "apunto_config_test_full",
            r#"
backend_url = "https://abc.supabase.co"
anon_key = "anon-123"
theme = "light"
confirm_delete = false
reset_redirect_url = "https://notes.example.com/login/update"
editor = "nano"

[keybindings]
quit = "Ctrl+q"
"#,
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(config.theme, "light");
        assert!(!config.confirm_delete);
        assert_eq!(config.editor_command(), "nano");
        assert_eq!(
            config.keybindings.get("quit").map(String::as_str),
            Some("Ctrl+q")
        );

        let conn = config.connection().unwrap();
        assert_eq!(conn.url.host_str(), Some("abc.supabase.co"));
        assert_eq!(conn.anon_key.expose_secret(), "anon-123");
        assert!(config.reset_redirect().unwrap().is_some());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let (dir, path) = write_config("apunto_config_test_invalid", "this is not [valid toml");
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let (dir, path) = write_config(
            "apunto_config_test_unknown",
            "theme = \"dark\"\nnot_a_key = 1\n",
        );
        assert!(Config::load(&path).is_ok());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_too_large_file_rejected() {
        let (dir, path) = write_config("apunto_config_test_too_large", &"a".repeat(1_048_577));
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_overrides_take_precedence() {
        let config = Config {
            backend_url: Some("https://file.example.com".to_string()),
            anon_key: Some("file-key".to_string()),
            ..Config::default()
        }
        .with_overrides(Some("http://localhost:54321".to_string()), Some(" ".to_string()));

        assert_eq!(config.backend_url.as_deref(), Some("http://localhost:54321"));
        assert_eq!(config.anon_key.as_deref(), Some("file-key"));
        assert!(config.connection().is_ok());
    }

    #[test]
    fn test_missing_backend() {
        let err = Config::default().connection().unwrap_err();
        assert!(matches!(err, ConfigError::MissingBackend));
        assert!(err.to_string().contains(ENV_URL));
    }

    #[test]
    fn test_insecure_backend_rejected() {
        let config = Config::default().with_overrides(
            Some("http://abc.supabase.co".to_string()),
            Some("k".to_string()),
        );
        assert!(matches!(
            config.connection(),
            Err(ConfigError::InvalidUrl { key: "backend_url", .. })
        ));
    }

    #[test]
    fn test_debug_masks_anon_key() {
        let config = Config {
            anon_key: Some("super-secret-key".to_string()),
            ..Config::default()
        };
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret-key"));
        assert!(debug.contains("[REDACTED]"));

        let conn = Config {
            backend_url: Some("https://abc.supabase.co".to_string()),
            ..config
        }
        .connection()
        .unwrap();
        assert!(!format!("{:?}", conn).contains("super-secret-key"));
    }
}
