//! Configuration module for the mirrorline server.
//!
//! Supports both command-line arguments and a configuration file.
//! CLI arguments take precedence over config file values.
//!
//! The file format follows the extension: `.json` files are read as JSON
//! with `Host`/`Port`/`ReadTimeout` style keys, anything else as TOML
//! (where the snake_case spelling of each key is also accepted). When
//! the file does not exist a default one is written and the caller is
//! expected to stop so the operator can review it.

pub mod duration;

use crate::handler::{DEFAULT_READ_TIMEOUT, DEFAULT_RESPONSE_DELAY, DEFAULT_TRAILER};
use clap::Parser;
use duration::{option_duration_str, parse_duration};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use duration::{duration_str, format_duration};

/// Config file used when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Log file used when neither the CLI nor the config file names one
pub const DEFAULT_LOG_FILE: &str = "log.txt";

/// Command-line arguments for the server
#[derive(Parser, Debug, Default)]
#[command(name = "mirrorline")]
#[command(author = "mirrorline authors")]
#[command(version)]
#[command(about = "Answers every TCP connection with its input reversed and title-cased", long_about = None)]
pub struct CliArgs {
    /// Path to the configuration file (.json or .toml)
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Host or address to bind to (e.g., 0.0.0.0)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// How long to wait for client data (e.g., 3s, 500ms)
    #[arg(long, value_parser = parse_duration)]
    pub read_timeout: Option<Duration>,

    /// Pause before each response is written (e.g., 4s)
    #[arg(long, value_parser = parse_duration)]
    pub response_delay: Option<Duration>,

    /// Number of worker threads (defaults to number of CPU cores)
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// File that receives a copy of every log line
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

/// Configuration file structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct FileConfig {
    #[serde(alias = "host")]
    pub host: String,
    #[serde(alias = "port")]
    pub port: u16,
    #[serde(alias = "read_timeout", with = "duration_str")]
    pub read_timeout: Duration,
    #[serde(
        alias = "response_delay",
        default,
        with = "option_duration_str",
        skip_serializing_if = "Option::is_none"
    )]
    pub response_delay: Option<Duration>,
    #[serde(alias = "trailer", default, skip_serializing_if = "Option::is_none")]
    pub trailer: Option<String>,
    #[serde(alias = "workers", default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    #[serde(alias = "log_level", default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    #[serde(alias = "log_file", default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 7890,
            read_timeout: DEFAULT_READ_TIMEOUT,
            response_delay: None,
            trailer: None,
            workers: None,
            log_level: None,
            log_file: None,
        }
    }
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub read_timeout: Duration,
    pub response_delay: Duration,
    pub trailer: String,
    pub workers: Option<usize>,
    pub log_level: String,
    pub log_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self::merge(CliArgs::default(), FileConfig::default())
    }
}

/// Outcome of loading a configuration file that may not exist yet
#[derive(Debug)]
pub enum Bootstrap<T> {
    /// The file existed and was loaded
    Loaded(T),
    /// The file was missing; defaults were written to this path
    DefaultsWritten(PathBuf),
}

impl Config {
    /// Load configuration from CLI args and the config file.
    pub fn load() -> Result<Bootstrap<Self>, ConfigError> {
        Self::from_args(CliArgs::parse())
    }

    /// Resolve configuration from already-parsed CLI args.
    ///
    /// A missing config file is created with defaults and reported as
    /// [`Bootstrap::DefaultsWritten`].
    pub fn from_args(cli: CliArgs) -> Result<Bootstrap<Self>, ConfigError> {
        let file = match load_or_create(&cli.config, FileConfig::default)? {
            Bootstrap::Loaded(file) => file,
            Bootstrap::DefaultsWritten(path) => return Ok(Bootstrap::DefaultsWritten(path)),
        };

        let config = Self::merge(cli, file);
        config.validate()?;
        Ok(Bootstrap::Loaded(config))
    }

    /// Merge CLI args over file values (CLI takes precedence)
    fn merge(cli: CliArgs, file: FileConfig) -> Self {
        Config {
            host: cli.host.unwrap_or(file.host),
            port: cli.port.unwrap_or(file.port),
            read_timeout: cli.read_timeout.unwrap_or(file.read_timeout),
            response_delay: cli
                .response_delay
                .or(file.response_delay)
                .unwrap_or(DEFAULT_RESPONSE_DELAY),
            trailer: file.trailer.unwrap_or_else(|| DEFAULT_TRAILER.to_string()),
            workers: cli.workers.or(file.workers),
            log_level: cli
                .log_level
                .or(file.log_level)
                .unwrap_or_else(|| "info".to_string()),
            log_file: cli
                .log_file
                .or(file.log_file)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE)),
        }
    }

    /// Reject values the server cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid("host must not be empty"));
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid("port must be between 1 and 65535"));
        }
        if self.read_timeout.is_zero() {
            return Err(ConfigError::Invalid("read timeout must be greater than zero"));
        }
        if self.trailer.is_empty() {
            return Err(ConfigError::Invalid("trailer must not be empty"));
        }
        if self.workers == Some(0) {
            return Err(ConfigError::Invalid("workers must be at least 1"));
        }
        Ok(())
    }

    /// Address string handed to the resolver.
    pub fn bind_address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Read `path`, or write `defaults()` there if it does not exist.
pub fn load_or_create<T, F>(path: &Path, defaults: F) -> Result<Bootstrap<T>, ConfigError>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> T,
{
    if !path.exists() {
        write_file(path, &defaults())?;
        return Ok(Bootstrap::DefaultsWritten(path.to_path_buf()));
    }
    read_file(path).map(Bootstrap::Loaded)
}

/// Parse a config file, choosing the format from its extension.
pub fn read_file<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::FileRead(path.to_path_buf(), e))?;

    if is_json(path) {
        serde_json::from_str(&contents).map_err(|e| ConfigError::JsonParse(path.to_path_buf(), e))
    } else {
        toml::from_str(&contents).map_err(|e| ConfigError::TomlParse(path.to_path_buf(), e))
    }
}

/// Write a pretty-printed config file, choosing the format from its extension.
pub fn write_file<T: Serialize>(path: &Path, value: &T) -> Result<(), ConfigError> {
    let mut contents = if is_json(path) {
        serde_json::to_string_pretty(value)
            .map_err(|e| ConfigError::JsonWrite(path.to_path_buf(), e))?
    } else {
        toml::to_string_pretty(value).map_err(|e| ConfigError::TomlWrite(path.to_path_buf(), e))?
    };
    if !contents.ends_with('\n') {
        contents.push('\n');
    }

    std::fs::write(path, contents).map_err(|e| ConfigError::FileWrite(path.to_path_buf(), e))
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    FileWrite(PathBuf, std::io::Error),
    JsonParse(PathBuf, serde_json::Error),
    JsonWrite(PathBuf, serde_json::Error),
    TomlParse(PathBuf, toml::de::Error),
    TomlWrite(PathBuf, toml::ser::Error),
    Invalid(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::FileWrite(path, e) => {
                write!(f, "Failed to write config file '{}': {}", path.display(), e)
            }
            ConfigError::JsonParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::JsonWrite(path, e) => {
                write!(f, "Failed to encode config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlWrite(path, e) => {
                write!(f, "Failed to encode config file '{}': {}", path.display(), e)
            }
            ConfigError::Invalid(reason) => write!(f, "Invalid configuration: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn args(config: &Path, extra: &[&str]) -> CliArgs {
        let mut argv = vec!["mirrorline", "--config", config.to_str().unwrap()];
        argv.extend_from_slice(extra);
        CliArgs::parse_from(argv)
    }

    fn loaded(bootstrap: Bootstrap<Config>) -> Config {
        match bootstrap {
            Bootstrap::Loaded(config) => config,
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 7890);
        assert_eq!(config.read_timeout, Duration::from_secs(3));
        assert_eq!(config.response_delay, Duration::from_secs(4));
        assert_eq!(config.trailer, DEFAULT_TRAILER);
        assert_eq!(config.log_file, PathBuf::from("log.txt"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_parsing() {
        let json = r#"{
            "Host": "127.0.0.1",
            "Port": 9000,
            "ReadTimeout": "1500ms",
            "ResponseDelay": "1s",
            "Trailer": "\n-- end",
            "LogLevel": "debug"
        }"#;

        let config: FileConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9000);
        assert_eq!(config.read_timeout, Duration::from_millis(1500));
        assert_eq!(config.response_delay, Some(Duration::from_secs(1)));
        assert_eq!(config.trailer.as_deref(), Some("\n-- end"));
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.workers, None);
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
            host = "::1"
            port = 7000
            read_timeout = 5
            workers = 2
        "#;

        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.host, "::1");
        assert_eq!(config.port, 7000);
        assert_eq!(config.read_timeout, Duration::from_secs(5));
        assert_eq!(config.workers, Some(2));
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let json = r#"{"Host": "0.0.0.0", "Port": 1, "ReadTimeout": "3s", "Bogus": 1}"#;
        assert!(serde_json::from_str::<FileConfig>(json).is_err());
    }

    #[test]
    fn test_port_out_of_range_rejected() {
        let json = r#"{"Host": "0.0.0.0", "Port": 70000, "ReadTimeout": "3s"}"#;
        assert!(serde_json::from_str::<FileConfig>(json).is_err());
    }

    #[test]
    fn test_missing_file_writes_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        match Config::from_args(args(&path, &[])).unwrap() {
            Bootstrap::DefaultsWritten(written) => assert_eq!(written, path),
            other => panic!("unexpected: {:?}", other),
        }

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["Host"], "0.0.0.0");
        assert_eq!(written["Port"], 7890);
        assert_eq!(written["ReadTimeout"], "3s");

        // Second run picks the generated file up
        let config = loaded(Config::from_args(args(&path, &[])).unwrap());
        assert_eq!(config.port, 7890);
        assert_eq!(config.read_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_missing_toml_file_writes_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("server.toml");

        let bootstrap = Config::from_args(args(&path, &[])).unwrap();
        assert!(matches!(bootstrap, Bootstrap::DefaultsWritten(_)));

        let file: FileConfig = read_file(&path).unwrap();
        assert_eq!(file, FileConfig::default());
    }

    #[test]
    fn test_cli_overrides_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"Host": "0.0.0.0", "Port": 7890, "ReadTimeout": "3s", "Workers": 8}"#,
        )
        .unwrap();

        let config = loaded(
            Config::from_args(args(
                &path,
                &["--port", "9999", "--read-timeout", "250ms", "--log-level", "trace"],
            ))
            .unwrap(),
        );
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9999);
        assert_eq!(config.read_timeout, Duration::from_millis(250));
        assert_eq!(config.workers, Some(8));
        assert_eq!(config.log_level, "trace");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"Host": "0.0.0.0", "Port": 0, "ReadTimeout": "3s"}"#).unwrap();

        let err = Config::from_args(args(&path, &[])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        std::fs::write(&path, r#"{"Host": "0.0.0.0", "Port": 1, "ReadTimeout": "0s"}"#).unwrap();
        let err = Config::from_args(args(&path, &[])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_malformed_file_reports_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = Config::from_args(args(&path, &[])).unwrap_err();
        assert!(matches!(err, ConfigError::JsonParse(..)));
        assert!(err.to_string().contains("config.json"));
    }

    #[test]
    fn test_bind_address() {
        let mut config = Config::default();
        assert_eq!(config.bind_address(), "0.0.0.0:7890");
        config.host = "::1".to_string();
        assert_eq!(config.bind_address(), "[::1]:7890");
    }
}
