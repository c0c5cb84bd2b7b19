// ABOUTME: Configuration loading and validation for the partshelf server.
// ABOUTME: Reads PARTSHELF_* environment variables; invalid values are fatal at startup.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("PARTSHELF_BIND is not a valid socket address: {0}")]
    InvalidBind(String),

    #[error("{var} must be a positive whole number of seconds, got '{value}'")]
    InvalidSeconds { var: &'static str, value: String },

    #[error("PARTSHELF_LIB_PREFIX must be a non-empty folder name without path separators, got '{0}'")]
    InvalidPrefix(String),
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub output_base: PathBuf,
    pub bind: SocketAddr,
    pub lib_prefix: String,
    pub converter_program: String,
    pub converter_timeout: Option<Duration>,
    pub settings_path: PathBuf,
    pub log_file: PathBuf,
    pub sweep_interval: Duration,
}

impl ServerConfig {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// Environment variables:
    /// - PARTSHELF_OUTPUT_BASE: data directory (default: /share/easyeda_output)
    /// - PARTSHELF_BIND: socket address to bind (default: 0.0.0.0:7860)
    /// - PARTSHELF_LIB_PREFIX: library instance folder prefix (default: easyeda_lib)
    /// - PARTSHELF_CONVERTER: converter executable (default: easyeda2kicad)
    /// - PARTSHELF_CONVERTER_TIMEOUT_SECS: kill converters running longer (optional)
    /// - PARTSHELF_SETTINGS: hot-reloaded JSON settings file
    /// - PARTSHELF_LOG_FILE: durable process log (default: converter.log)
    /// - PARTSHELF_SWEEP_INTERVAL_SECS: pause between retention passes (default: 3600)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`ServerConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let output_base = var("PARTSHELF_OUTPUT_BASE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/share/easyeda_output"));

        let bind_str = var("PARTSHELF_BIND").unwrap_or_else(|| "0.0.0.0:7860".to_string());
        let bind: SocketAddr = bind_str
            .parse()
            .map_err(|_| ConfigError::InvalidBind(bind_str))?;

        let lib_prefix = var("PARTSHELF_LIB_PREFIX").unwrap_or_else(|| "easyeda_lib".to_string());
        if lib_prefix.contains(['/', '\\']) || lib_prefix.starts_with('.') {
            return Err(ConfigError::InvalidPrefix(lib_prefix));
        }

        let converter_program =
            var("PARTSHELF_CONVERTER").unwrap_or_else(|| "easyeda2kicad".to_string());

        let converter_timeout = var("PARTSHELF_CONVERTER_TIMEOUT_SECS")
            .map(|v| parse_seconds("PARTSHELF_CONVERTER_TIMEOUT_SECS", &v))
            .transpose()?;

        let settings_path = var("PARTSHELF_SETTINGS")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/config/addons/local/easyeda_to_kicad_web/config.json"));

        let log_file = var("PARTSHELF_LOG_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("converter.log"));

        let sweep_interval = match var("PARTSHELF_SWEEP_INTERVAL_SECS") {
            Some(v) => parse_seconds("PARTSHELF_SWEEP_INTERVAL_SECS", &v)?,
            None => Duration::from_secs(3600),
        };

        Ok(Self {
            output_base,
            bind,
            lib_prefix,
            converter_program,
            converter_timeout,
            settings_path,
            log_file,
            sweep_interval,
        })
    }

    /// Parent of every library instance.
    pub fn library_root(&self) -> PathBuf {
        self.output_base.join("library")
    }

    /// Scratch space for converter output prefixes.
    pub fn temp_root(&self) -> PathBuf {
        self.output_base.join("temp")
    }

    /// Instance created when none exists yet.
    pub fn default_library_name(&self) -> String {
        format!("{}_default", self.lib_prefix)
    }

    /// A configuration rooted at `output_base` with every other value at its
    /// default. Settings are looked up inside `output_base`.
    pub fn for_output_base(output_base: impl Into<PathBuf>) -> Self {
        let output_base = output_base.into();
        Self {
            settings_path: output_base.join("config.json"),
            log_file: output_base.join("converter.log"),
            output_base,
            bind: SocketAddr::from(([127, 0, 0, 1], 0)),
            lib_prefix: "easyeda_lib".to_string(),
            converter_program: "easyeda2kicad".to_string(),
            converter_timeout: None,
            sweep_interval: Duration::from_secs(3600),
        }
    }
}

fn parse_seconds(var: &'static str, value: &str) -> Result<Duration, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidSeconds {
            var,
            value: value.to_string(),
        }),
    }
}
