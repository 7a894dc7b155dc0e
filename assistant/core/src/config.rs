//! TOML Configuration File Support
//!
//! Centralized configuration for the assistant, read from
//! `~/.config/retail-insights/assistant.toml`.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments (applied by the caller through [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [backend]
//! ws_url = "wss://insights.example.com/ws/chat"
//! connect_timeout_secs = 10
//!
//! [auth]
//! refresh_url = "https://insights.example.com/auth/refresh"
//! refresh_token = "..."
//!
//! [stream]
//! idle_timeout_secs = 120
//! channel_capacity = 100
//! default_progress_label = "Working on it..."
//!
//! [session]
//! greeting = "Hi! What would you like to know?"
//! session_file = "/home/me/.local/share/retail-insights/session_id"
//!
//! [progress_labels]
//! gerar_grafico_universal = "Drawing your chart"
//! ```
//!
//! # Environment Variables
//!
//! `INSIGHTS_WS_URL`, `INSIGHTS_TOKEN`, `INSIGHTS_REFRESH_URL`,
//! `INSIGHTS_REFRESH_TOKEN`, `INSIGHTS_IDLE_TIMEOUT_SECS`,
//! `INSIGHTS_SESSION_FILE`.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::{AuthError, AuthProvider, HttpTokenRefresher, StaticCredential};
use crate::controller::{ControllerConfig, DEFAULT_IDLE_TIMEOUT};
use crate::decoder::ProgressLabels;
use crate::persistence::{FileSessionIdStore, PersistenceError, APP_DIR};
use crate::session::DEFAULT_GREETING;

/// Default backend chat endpoint
pub const DEFAULT_WS_URL: &str = "ws://localhost:8000/ws/chat";

/// Config file name under the application config directory
pub const CONFIG_FILE_NAME: &str = "assistant.toml";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Backend section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendToml {
    /// WebSocket chat endpoint
    pub ws_url: Option<String>,

    /// Handshake timeout in seconds
    pub connect_timeout_secs: Option<u64>,
}

/// Auth section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthToml {
    /// Fixed access token
    pub token: Option<String>,

    /// Token refresh endpoint
    pub refresh_url: Option<String>,

    /// Refresh token exchanged at `refresh_url`
    pub refresh_token: Option<String>,
}

/// Stream section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamToml {
    /// Seconds to wait for the next frame (0 = no timeout)
    pub idle_timeout_secs: Option<u64>,

    /// Frames buffered per connection
    pub channel_capacity: Option<usize>,

    /// Label for unknown progress stages
    pub default_progress_label: Option<String>,
}

/// Session section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionToml {
    /// Greeting for new sessions (empty = none)
    pub greeting: Option<String>,

    /// Where the session id is persisted
    pub session_file: Option<PathBuf>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantToml {
    /// Backend configuration section
    pub backend: BackendToml,

    /// Auth configuration section
    pub auth: AuthToml,

    /// Stream configuration section
    pub stream: StreamToml,

    /// Session configuration section
    pub session: SessionToml,

    /// Stage id to label overrides
    pub progress_labels: HashMap<String, String>,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Centralized configuration for the assistant
///
/// Use [`load_config`] to load configuration with proper priority handling.
#[derive(Clone)]
pub struct AssistantConfig {
    /// WebSocket chat endpoint
    pub ws_url: String,

    /// Handshake timeout
    pub connect_timeout: Duration,

    /// Fixed access token
    pub token: Option<String>,

    /// Token refresh endpoint
    pub refresh_url: Option<String>,

    /// Refresh token
    pub refresh_token: Option<String>,

    /// Time to wait for the next frame (zero = no timeout)
    pub idle_timeout: Duration,

    /// Frames buffered per connection
    pub channel_capacity: usize,

    /// Label for unknown progress stages
    pub default_progress_label: Option<String>,

    /// Stage id to label overrides
    pub progress_labels: HashMap<String, String>,

    /// Greeting for new sessions
    pub greeting: Option<String>,

    /// Where the session id is persisted (`None` = XDG data dir)
    pub session_file: Option<PathBuf>,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            token: None,
            refresh_url: None,
            refresh_token: None,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            channel_capacity: 100,
            default_progress_label: None,
            progress_labels: HashMap::new(),
            greeting: Some(DEFAULT_GREETING.to_string()),
            session_file: None,
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

// Credentials stay out of logs
impl fmt::Debug for AssistantConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssistantConfig")
            .field("ws_url", &self.ws_url)
            .field("connect_timeout", &self.connect_timeout)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("refresh_url", &self.refresh_url)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("idle_timeout", &self.idle_timeout)
            .field("channel_capacity", &self.channel_capacity)
            .field("progress_labels", &self.progress_labels.len())
            .field("greeting", &self.greeting)
            .field("session_file", &self.session_file)
            .field("config_file_path", &self.config_file_path)
            .field("source", &self.source)
            .finish()
    }
}

impl AssistantConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Check values that cannot be expressed in the types
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` for a non-WebSocket endpoint or
    /// a zero channel capacity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = reqwest::Url::parse(&self.ws_url).map_err(|e| {
            ConfigError::ValidationError(format!("ws_url `{}`: {e}", self.ws_url))
        })?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(ConfigError::ValidationError(format!(
                "ws_url must use ws:// or wss://, got `{}`",
                url.scheme()
            )));
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "channel_capacity must be at least 1".to_string(),
            ));
        }
        if self.refresh_url.is_some() != self.refresh_token.is_some() {
            return Err(ConfigError::ValidationError(
                "refresh_url and refresh_token must be set together".to_string(),
            ));
        }
        Ok(())
    }

    /// Progress label table with the configured overrides
    #[must_use]
    pub fn progress_labels(&self) -> ProgressLabels {
        let labels = ProgressLabels::builtin().with_overrides(self.progress_labels.clone());
        match &self.default_progress_label {
            Some(label) => labels.with_default_label(label.clone()),
            None => labels,
        }
    }

    /// Settings for the stream controller
    #[must_use]
    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            endpoint: self.ws_url.clone(),
            idle_timeout: self.idle_timeout,
            progress_labels: self.progress_labels(),
            greeting: self.greeting.clone(),
        }
    }

    /// Settings for the WebSocket connector
    #[cfg(feature = "websocket")]
    #[must_use]
    pub fn connector_config(&self) -> crate::transport::WebSocketConnectorConfig {
        crate::transport::WebSocketConnectorConfig {
            connect_timeout: self.connect_timeout,
            channel_capacity: self.channel_capacity,
        }
    }

    /// Credential provider for the configured auth mode
    ///
    /// A refresh endpoint wins over a fixed token. With neither, every turn
    /// ends with an auth error.
    ///
    /// # Errors
    ///
    /// Returns `AuthError` if the refresher's HTTP client cannot be built.
    pub fn auth_provider(&self) -> Result<Box<dyn AuthProvider>, AuthError> {
        match (&self.refresh_url, &self.refresh_token, &self.token) {
            (Some(url), Some(refresh_token), _) => {
                Ok(Box::new(HttpTokenRefresher::new(url.clone(), refresh_token.clone())?))
            }
            (_, _, Some(token)) => Ok(Box::new(StaticCredential::new(token.clone()))),
            _ => {
                tracing::warn!("No credential configured; turns will fail to authenticate");
                Ok(Box::new(StaticCredential::none()))
            }
        }
    }

    /// Session id persistence for the configured location
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError::NoDataDir` when no file is configured and
    /// the platform has no data directory.
    pub fn session_id_store(&self) -> Result<FileSessionIdStore, PersistenceError> {
        match &self.session_file {
            Some(path) => Ok(FileSessionIdStore::new(path.clone())),
            None => FileSessionIdStore::default_location(),
        }
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/retail-insights/assistant.toml` or
/// `~/.config/retail-insights/assistant.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(APP_DIR).join(CONFIG_FILE_NAME))
}

/// Load configuration from all sources with proper priority
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if the
/// merged configuration is invalid. A missing config file is not an error.
pub fn load_config() -> Result<AssistantConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<AssistantConfig, ConfigError> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// Load configuration, reading environment variables through `env`
fn load_config_with_env<F>(path: Option<PathBuf>, env: F) -> Result<AssistantConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = AssistantConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: AssistantToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config, env);
    config.validate()?;

    Ok(config)
}

fn apply_toml_config(config: &mut AssistantConfig, toml: AssistantToml) {
    if let Some(url) = toml.backend.ws_url {
        config.ws_url = url;
    }
    if let Some(secs) = toml.backend.connect_timeout_secs {
        config.connect_timeout = Duration::from_secs(secs);
    }

    if toml.auth.token.is_some() {
        config.token = toml.auth.token;
    }
    if toml.auth.refresh_url.is_some() {
        config.refresh_url = toml.auth.refresh_url;
    }
    if toml.auth.refresh_token.is_some() {
        config.refresh_token = toml.auth.refresh_token;
    }

    if let Some(secs) = toml.stream.idle_timeout_secs {
        config.idle_timeout = Duration::from_secs(secs);
    }
    if let Some(capacity) = toml.stream.channel_capacity {
        config.channel_capacity = capacity;
    }
    if toml.stream.default_progress_label.is_some() {
        config.default_progress_label = toml.stream.default_progress_label;
    }

    if let Some(greeting) = toml.session.greeting {
        config.greeting = (!greeting.is_empty()).then_some(greeting);
    }
    if toml.session.session_file.is_some() {
        config.session_file = toml.session.session_file;
    }

    config.progress_labels.extend(toml.progress_labels);
}

fn apply_env_config<F>(config: &mut AssistantConfig, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = env("INSIGHTS_WS_URL") {
        config.ws_url = url;
        config.source = ConfigSource::Env;
    }
    if let Some(token) = env("INSIGHTS_TOKEN") {
        config.token = Some(token);
        config.source = ConfigSource::Env;
    }
    if let Some(url) = env("INSIGHTS_REFRESH_URL") {
        config.refresh_url = Some(url);
        config.source = ConfigSource::Env;
    }
    if let Some(token) = env("INSIGHTS_REFRESH_TOKEN") {
        config.refresh_token = Some(token);
        config.source = ConfigSource::Env;
    }
    if let Some(timeout) = env("INSIGHTS_IDLE_TIMEOUT_SECS") {
        match timeout.parse::<u64>() {
            Ok(secs) => {
                config.idle_timeout = Duration::from_secs(secs);
                config.source = ConfigSource::Env;
            }
            Err(_) => tracing::warn!(value = %timeout, "Ignoring invalid INSIGHTS_IDLE_TIMEOUT_SECS"),
        }
    }
    if let Some(path) = env("INSIGHTS_SESSION_FILE") {
        config.session_file = Some(PathBuf::from(path));
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Endpoint override
    pub ws_url: Option<String>,

    /// Token override
    pub token: Option<String>,

    /// Idle timeout override (seconds)
    pub idle_timeout_secs: Option<u64>,

    /// Session file override
    pub session_file: Option<PathBuf>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set endpoint override
    #[must_use]
    pub fn with_ws_url(mut self, url: String) -> Self {
        self.ws_url = Some(url);
        self
    }

    /// Set token override
    #[must_use]
    pub fn with_token(mut self, token: String) -> Self {
        self.token = Some(token);
        self
    }

    /// Set idle timeout override
    #[must_use]
    pub fn with_idle_timeout_secs(mut self, secs: u64) -> Self {
        self.idle_timeout_secs = Some(secs);
        self
    }

    /// Set session file override
    #[must_use]
    pub fn with_session_file(mut self, path: PathBuf) -> Self {
        self.session_file = Some(path);
        self
    }

    /// Apply overrides to a configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if the result is invalid.
    pub fn apply(&self, config: &mut AssistantConfig) -> Result<(), ConfigError> {
        let mut changed = false;

        if let Some(url) = &self.ws_url {
            config.ws_url.clone_from(url);
            changed = true;
        }
        if let Some(token) = &self.token {
            config.token = Some(token.clone());
            changed = true;
        }
        if let Some(secs) = self.idle_timeout_secs {
            config.idle_timeout = Duration::from_secs(secs);
            changed = true;
        }
        if let Some(path) = &self.session_file {
            config.session_file = Some(path.clone());
            changed = true;
        }

        if changed {
            config.source = ConfigSource::Cli;
        }
        config.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn load(content: &str) -> Result<AssistantConfig, ConfigError> {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        load_config_with_env(Some(file.path().to_path_buf()), no_env)
    }

    // =========================================================================
    // Default Configuration Tests
    // =========================================================================

    #[test]
    fn test_default_config() {
        let config = AssistantConfig::default();

        assert_eq!(config.ws_url, DEFAULT_WS_URL);
        assert_eq!(config.idle_timeout, Duration::from_secs(120));
        assert_eq!(config.channel_capacity, 100);
        assert_eq!(config.greeting.as_deref(), Some(DEFAULT_GREETING));
        assert_eq!(config.source(), ConfigSource::Default);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_config_path() {
        if let Some(p) = default_config_path() {
            assert!(p.to_string_lossy().contains("retail-insights"));
            assert!(p.to_string_lossy().ends_with("assistant.toml"));
        }
    }

    // =========================================================================
    // TOML Parsing Tests
    // =========================================================================

    #[test]
    fn test_parse_valid_toml() {
        let config = load(
            r#"
[backend]
ws_url = "wss://insights.example.com/ws/chat"
connect_timeout_secs = 5

[auth]
token = "abc"

[stream]
idle_timeout_secs = 0
channel_capacity = 16
default_progress_label = "Processando..."

[session]
greeting = ""
session_file = "/tmp/insights-session"

[progress_labels]
gerar_grafico_universal = "Gerando gráfico"
novo_estagio = "Novo estágio"
"#,
        )
        .unwrap();

        assert_eq!(config.ws_url, "wss://insights.example.com/ws/chat");
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.token.as_deref(), Some("abc"));
        assert!(config.idle_timeout.is_zero());
        assert_eq!(config.channel_capacity, 16);
        assert_eq!(config.greeting, None);
        assert_eq!(
            config.session_file,
            Some(PathBuf::from("/tmp/insights-session"))
        );
        assert_eq!(config.source(), ConfigSource::File);

        let labels = config.progress_labels();
        assert_eq!(labels.label_for("gerar_grafico_universal"), "Gerando gráfico");
        assert_eq!(labels.label_for("novo_estagio"), "Novo estágio");
        assert_eq!(labels.label_for("executar_sql"), "Running SQL query");
        assert_eq!(labels.label_for("unknown"), "Processando...");
    }

    #[test]
    fn test_parse_empty_toml() {
        let config = load("").unwrap();
        assert_eq!(config.ws_url, DEFAULT_WS_URL);
        assert_eq!(config.source(), ConfigSource::File);
    }

    #[test]
    fn test_missing_file_graceful() {
        let config = load_config_with_env(
            Some(PathBuf::from("/nonexistent/retail-insights/assistant.toml")),
            no_env,
        )
        .unwrap();
        assert_eq!(config.source(), ConfigSource::Default);
        assert_eq!(config.config_file_path, None);
    }

    #[test]
    fn test_malformed_toml_error() {
        assert!(matches!(
            load("[backend\nws_url = "),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_validation_errors() {
        for content in [
            "[backend]\nws_url = \"http://example.com\"",
            "[backend]\nws_url = \"not a url\"",
            "[stream]\nchannel_capacity = 0",
            "[auth]\nrefresh_url = \"https://example.com/refresh\"",
        ] {
            assert!(
                matches!(load(content), Err(ConfigError::ValidationError(_))),
                "{content}"
            );
        }
    }

    // =========================================================================
    // Priority Tests
    // =========================================================================

    #[test]
    fn test_env_overrides_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"[backend]\nws_url = \"ws://file/ws\"\n[stream]\nidle_timeout_secs = 30\n")
            .unwrap();

        let env: HashMap<&str, &str> = [
            ("INSIGHTS_WS_URL", "ws://env/ws"),
            ("INSIGHTS_TOKEN", "env-token"),
            ("INSIGHTS_IDLE_TIMEOUT_SECS", "not-a-number"),
            ("INSIGHTS_SESSION_FILE", "/tmp/env-session"),
        ]
        .into_iter()
        .collect();

        let config = load_config_with_env(Some(file.path().to_path_buf()), |key| {
            env.get(key).map(ToString::to_string)
        })
        .unwrap();

        assert_eq!(config.ws_url, "ws://env/ws");
        assert_eq!(config.token.as_deref(), Some("env-token"));
        // Invalid value ignored, file value kept
        assert_eq!(config.idle_timeout, Duration::from_secs(30));
        assert_eq!(config.session_file, Some(PathBuf::from("/tmp/env-session")));
        assert_eq!(config.source(), ConfigSource::Env);
    }

    #[test]
    fn test_cli_overrides_env() {
        let mut config = load_config_with_env(None, |key| {
            (key == "INSIGHTS_WS_URL").then(|| "ws://env/ws".to_string())
        })
        .unwrap();

        ConfigOverrides::new()
            .with_ws_url("ws://cli/ws".to_string())
            .with_idle_timeout_secs(5)
            .apply(&mut config)
            .unwrap();

        assert_eq!(config.ws_url, "ws://cli/ws");
        assert_eq!(config.idle_timeout, Duration::from_secs(5));
        assert_eq!(config.source(), ConfigSource::Cli);
    }

    #[test]
    fn test_config_overrides_empty_no_change() {
        let mut config = AssistantConfig::default();
        ConfigOverrides::new().apply(&mut config).unwrap();
        assert_eq!(config.source(), ConfigSource::Default);
    }

    #[test]
    fn test_invalid_cli_override_rejected() {
        let mut config = AssistantConfig::default();
        let result = ConfigOverrides::new()
            .with_ws_url("ftp://nope".to_string())
            .apply(&mut config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    // =========================================================================
    // Derived Settings Tests
    // =========================================================================

    #[test]
    fn test_controller_config() {
        let mut config = AssistantConfig::default();
        config.idle_timeout = Duration::from_secs(7);
        let controller = config.controller_config();

        assert_eq!(controller.endpoint, DEFAULT_WS_URL);
        assert_eq!(controller.idle_timeout, Duration::from_secs(7));
    }

    #[tokio::test]
    async fn test_auth_provider_selection() {
        let mut config = AssistantConfig::default();
        assert!(matches!(
            config.auth_provider().unwrap().refresh_if_needed().await,
            Err(AuthError::Missing)
        ));

        config.token = Some("fixed".to_string());
        let credential = config
            .auth_provider()
            .unwrap()
            .refresh_if_needed()
            .await
            .unwrap();
        assert_eq!(credential.token(), "fixed");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut config = AssistantConfig::default();
        config.token = Some("very-secret".to_string());
        config.refresh_token = Some("also-secret".to_string());
        let printed = format!("{config:?}");
        assert!(!printed.contains("very-secret"));
        assert!(!printed.contains("also-secret"));
    }

    #[test]
    fn test_config_error_display() {
        let read_err = ConfigError::ReadError {
            path: PathBuf::from("/test/path"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        let msg = read_err.to_string();
        assert!(msg.contains("/test/path"));
        assert!(msg.contains("Failed to read"));
    }
}
