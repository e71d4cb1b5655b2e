//! Server configuration loading from file and environment variables.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use thiserror::Error;
use voxgate_db::StoreSettings;
use voxgate_voice::SynthesizerConfig;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Staging, output and synthesis tool settings.
    #[serde(default)]
    pub synthesis: SynthesizerConfig,

    /// Generation history settings.
    #[serde(default)]
    pub history: HistoryConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory holding a built web client. Served only if it contains
    /// `index.html`.
    #[serde(default = "default_client_dir")]
    pub client_dir: PathBuf,
}

/// Generation history configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    /// Record successful generations and expose `GET /api/history`.
    #[serde(default)]
    pub enabled: bool,

    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    /// Busy timeout for SQLite connections, in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Maximum number of pooled SQLite connections.
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "voxgate_voice=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3000
}

fn default_client_dir() -> PathBuf {
    PathBuf::from("client/dist")
}

fn default_db_path() -> String {
    "voxgate.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_max_size() -> u32 {
    4
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            client_dir: default_client_dir(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl HistoryConfig {
    pub fn store_settings(&self) -> StoreSettings {
        StoreSettings {
            busy_timeout_ms: self.busy_timeout_ms,
            pool_max_size: self.pool_max_size,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but cannot be used.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Where the loaded values came from. Reported by the caller once logging
/// is up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOrigin {
    /// Read from the given file.
    File,
    /// A path was given but nothing exists there.
    NotFound,
    /// No path was given.
    Unset,
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `VOXGATE_HOST` overrides `server.host`
/// - `VOXGATE_PORT` overrides `server.port`
/// - `VOXGATE_CLIENT_DIR` overrides `server.client_dir`
/// - `VOXGATE_STAGING_DIR` overrides `synthesis.staging_dir`
/// - `VOXGATE_OUTPUT_DIR` overrides `synthesis.output_dir`
/// - `VOXGATE_SYNTH_TIMEOUT_SECS` overrides `synthesis.timeout_secs`
/// - `VOXGATE_SIMPLE_PROGRAM` overrides `synthesis.simple.program`
/// - `VOXGATE_CLONE_PROGRAM` overrides `synthesis.clone.program`
/// - `VOXGATE_HISTORY_ENABLED` overrides `history.enabled` (set to "true" to enable)
/// - `VOXGATE_DB_PATH` overrides `history.path`
/// - `VOXGATE_LOG_LEVEL` overrides `logging.level`
/// - `VOXGATE_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed, or
/// if the merged values fail [`validate`].
pub fn load_config(path: Option<&str>) -> Result<(Config, ConfigOrigin), ConfigError> {
    let (mut config, origin) = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => (toml::from_str(&contents)?, ConfigOrigin::File),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                (Config::default(), ConfigOrigin::NotFound)
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => (Config::default(), ConfigOrigin::Unset),
    };

    apply_overrides(&mut config, |key| std::env::var(key).ok());
    validate(&config)?;
    Ok((config, origin))
}

/// Rejects values that would make the server unusable.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.synthesis.timeout_secs == 0 {
        return Err(ConfigError::Invalid(
            "synthesis.timeout_secs must be at least 1".to_string(),
        ));
    }
    Ok(())
}

fn apply_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(host) = var("VOXGATE_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = var("VOXGATE_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(dir) = var("VOXGATE_CLIENT_DIR") {
        config.server.client_dir = PathBuf::from(dir);
    }
    if let Some(dir) = var("VOXGATE_STAGING_DIR") {
        config.synthesis.staging_dir = PathBuf::from(dir);
    }
    if let Some(dir) = var("VOXGATE_OUTPUT_DIR") {
        config.synthesis.output_dir = PathBuf::from(dir);
    }
    if let Some(secs) = var("VOXGATE_SYNTH_TIMEOUT_SECS") {
        if let Ok(parsed) = secs.parse() {
            config.synthesis.timeout_secs = parsed;
        }
    }
    if let Some(program) = var("VOXGATE_SIMPLE_PROGRAM") {
        config.synthesis.simple.program = program;
    }
    if let Some(program) = var("VOXGATE_CLONE_PROGRAM") {
        config.synthesis.clone.program = program;
    }
    if let Some(enabled) = var("VOXGATE_HISTORY_ENABLED") {
        config.history.enabled = enabled == "true" || enabled == "1";
    }
    if let Some(db_path) = var("VOXGATE_DB_PATH") {
        config.history.path = db_path;
    }
    if let Some(level) = var("VOXGATE_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("VOXGATE_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn file_values_fill_in_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            [server]
            port = 8080

            [synthesis]
            timeout_secs = 120

            [synthesis.simple]
            program = "/usr/bin/python3"
            args = ["/opt/tts/generate_tts.py"]

            [history]
            enabled = true
            "#,
        )
        .unwrap();

        let (config, origin) = load_config(path.to_str()).unwrap();
        assert_eq!(origin, ConfigOrigin::File);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, default_host());
        assert_eq!(config.synthesis.timeout_secs, 120);
        assert_eq!(config.synthesis.simple.args, ["/opt/tts/generate_tts.py"]);
        assert_eq!(config.synthesis.clone.program, "f5-tts_infer-cli");
        assert!(config.history.enabled);
        assert_eq!(config.history.path, "voxgate.db");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let (config, origin) = load_config(path.to_str()).unwrap();
        assert_eq!(origin, ConfigOrigin::NotFound);
        assert_eq!(config.synthesis.staging_dir, PathBuf::from("uploads"));
    }

    #[test]
    fn zero_timeout_in_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[synthesis]\ntimeout_secs = 0\n").unwrap();

        match load_config(path.to_str()) {
            Err(ConfigError::Invalid(message)) => {
                assert!(message.contains("synthesis.timeout_secs"), "{message}")
            }
            other => panic!("expected invalid config, got {:?}", other),
        }
    }

    #[test]
    fn zero_timeout_from_environment_is_rejected() {
        let mut config = Config::default();
        apply_overrides(&mut config, |key| {
            (key == "VOXGATE_SYNTH_TIMEOUT_SECS").then(|| "0".to_string())
        });

        assert_eq!(config.synthesis.timeout_secs, 0);
        assert!(matches!(validate(&config), Err(ConfigError::Invalid(_))));
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn history_settings_feed_the_store() {
        let history = HistoryConfig {
            busy_timeout_ms: 750,
            pool_max_size: 9,
            ..HistoryConfig::default()
        };
        assert_eq!(
            history.store_settings(),
            StoreSettings {
                busy_timeout_ms: 750,
                pool_max_size: 9,
            }
        );
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server\nport = ").unwrap();
        assert!(matches!(
            load_config(path.to_str()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn environment_overrides_win() {
        let vars: HashMap<&str, &str> = [
            ("VOXGATE_PORT", "9000"),
            ("VOXGATE_HOST", "not-an-ip"),
            ("VOXGATE_OUTPUT_DIR", "/tmp/voxgate-out"),
            ("VOXGATE_SYNTH_TIMEOUT_SECS", "45"),
            ("VOXGATE_CLONE_PROGRAM", "/opt/f5/infer"),
            ("VOXGATE_HISTORY_ENABLED", "1"),
            ("VOXGATE_LOG_JSON", "true"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        apply_overrides(&mut config, |key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, default_host(), "unparsable host is ignored");
        assert_eq!(config.synthesis.output_dir, PathBuf::from("/tmp/voxgate-out"));
        assert_eq!(config.synthesis.timeout_secs, 45);
        assert_eq!(config.synthesis.clone.program, "/opt/f5/infer");
        assert!(config.history.enabled);
        assert!(config.logging.json);
    }
}
