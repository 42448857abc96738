// src/config.rs
// Configuration system for spaserve: CLI options, JSON config file, and the
// immutable serving configuration handed to the dispatcher

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_PORT: u16 = 8080;

/// Options as they arrive from the command line or a config file.
///
/// Every field is optional so the two sources can be layered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    #[serde(default, alias = "p")]
    pub port: Option<u16>,

    #[serde(default)]
    pub path: Option<String>,

    #[serde(default)]
    pub base_href: Option<String>,

    #[serde(default)]
    pub cors: bool,

    #[serde(default)]
    pub cache: bool,

    #[serde(default)]
    pub ssl: bool,

    #[serde(default)]
    pub https: bool,

    #[serde(default)]
    pub key: Option<String>,

    #[serde(default)]
    pub cert: Option<String>,

    #[serde(default)]
    pub open: bool,

    #[serde(default)]
    pub silent: bool,
}

impl Configuration {
    /// Layer `self` (higher precedence) over `fallback`.
    ///
    /// Values from `self` win; flags are OR-ed, so a source can switch a
    /// feature on but never off.
    pub fn merge(self, fallback: Configuration) -> Configuration {
        Configuration {
            port: self.port.or(fallback.port),
            path: self.path.or(fallback.path),
            base_href: self.base_href.or(fallback.base_href),
            cors: self.cors || fallback.cors,
            cache: self.cache || fallback.cache,
            ssl: self.ssl || fallback.ssl,
            https: self.https || fallback.https,
            key: self.key.or(fallback.key),
            cert: self.cert.or(fallback.cert),
            open: self.open || fallback.open,
            silent: self.silent || fallback.silent,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    FileNotFound(String),
    ParseError(String),
    ValidationError(String),
    IoError(std::io::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Configuration file not found: {}", path),
            ConfigError::ParseError(msg) => write!(f, "Failed to parse configuration: {}", msg),
            ConfigError::ValidationError(msg) => {
                write!(f, "Configuration validation failed: {}", msg)
            }
            ConfigError::IoError(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

pub struct ConfigLoader {
    current_dir: PathBuf,
}

impl ConfigLoader {
    pub fn new(current_dir: PathBuf) -> Self {
        Self { current_dir }
    }

    /// Load the JSON config file named on the command line, if any.
    ///
    /// Without a path the defaults are returned. A relative path is taken
    /// from the current directory.
    pub fn load_configuration(
        &self,
        custom_config_path: Option<&str>,
    ) -> Result<Configuration, ConfigError> {
        let Some(custom_path) = custom_config_path else {
            return Ok(Configuration::default());
        };

        let config_path = if Path::new(custom_path).is_absolute() {
            PathBuf::from(custom_path)
        } else {
            self.current_dir.join(custom_path)
        };

        if !config_path.exists() {
            return Err(ConfigError::FileNotFound(
                config_path.to_string_lossy().to_string(),
            ));
        }

        let contents = fs::read_to_string(&config_path)?;
        log::info!("Loading configuration from: {}", config_path.display());

        let config: Configuration = serde_json::from_str(&contents).map_err(|e| {
            ConfigError::ParseError(format!("{}: {}", config_path.display(), e))
        })?;

        self.validate_config(&config)?;
        Ok(config)
    }

    fn validate_config(&self, config: &Configuration) -> Result<(), ConfigError> {
        if config.port == Some(0) {
            return Err(ConfigError::ValidationError(
                "Port must be between 1 and 65535".to_string(),
            ));
        }

        if let Some(ref base_href) = config.base_href {
            if base_href.contains(|c: char| c == '?' || c == '#') {
                return Err(ConfigError::ValidationError(format!(
                    "Base href cannot contain a query or fragment: {}",
                    base_href
                )));
            }
        }

        Ok(())
    }
}

/// Fully merged runtime options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub port: u16,
    pub path: PathBuf,
    pub base_href: String,
    pub cors: bool,
    pub cache: bool,
    pub ssl: bool,
    pub key: Option<PathBuf>,
    pub cert: Option<PathBuf>,
    pub open: bool,
    pub silent: bool,
}

impl Settings {
    pub fn resolve(config: Configuration, current_dir: &Path) -> Result<Settings, ConfigError> {
        let port = config.port.unwrap_or(DEFAULT_PORT);
        if port == 0 {
            return Err(ConfigError::ValidationError(
                "Port must be between 1 and 65535".to_string(),
            ));
        }

        let path = match config.path {
            Some(ref dir) if Path::new(dir).is_absolute() => PathBuf::from(dir),
            Some(ref dir) => current_dir.join(dir),
            None => current_dir.to_path_buf(),
        };

        let resolve_file = |file: Option<String>| {
            file.map(|f| {
                if Path::new(&f).is_absolute() {
                    PathBuf::from(f)
                } else {
                    current_dir.join(f)
                }
            })
        };

        Ok(Settings {
            port,
            path,
            base_href: config.base_href.unwrap_or_default(),
            cors: config.cors,
            cache: config.cache,
            ssl: config.ssl || config.https,
            key: resolve_file(config.key),
            cert: resolve_file(config.cert),
            open: config.open,
            silent: config.silent,
        })
    }

    /// Build the immutable serving configuration.
    ///
    /// The served directory is canonicalized so containment checks compare
    /// like with like; a missing directory is an error.
    pub fn serve_config(&self) -> Result<ServeConfig, ConfigError> {
        let base_directory = self.path.canonicalize().map_err(|e| {
            ConfigError::ValidationError(format!("Unknown path {}: {}", self.path.display(), e))
        })?;

        if !base_directory.is_dir() {
            return Err(ConfigError::ValidationError(format!(
                "Serve path is not a directory: {}",
                base_directory.display()
            )));
        }

        Ok(ServeConfig {
            base_directory,
            base_href: self.base_href.clone(),
            cors_enabled: self.cors,
            cache_headers_enabled: self.cache,
        })
    }
}

/// What the dispatcher needs to answer requests. Fixed for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServeConfig {
    pub base_directory: PathBuf,
    pub base_href: String,
    pub cors_enabled: bool,
    pub cache_headers_enabled: bool,
}
