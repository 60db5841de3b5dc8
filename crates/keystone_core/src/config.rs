//! Runtime configuration and process bootstrap.
//!
//! # Responsibility
//! - Collect logging and document locations from env, TOML or code.
//! - Bring up logging and load declarative documents in one call.
//!
//! # Invariants
//! - Empty env values are treated as unset.
//! - `bootstrap` never initializes logging without a configured directory.

use crate::logging::{default_log_level, init_logging};
use crate::schema::{SchemaError, SchemaRegistry};
use crate::validation::{RuleCompileError, RuleDocument};
use log::info;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const ENV_LOG_LEVEL: &str = "KEYSTONE_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "KEYSTONE_LOG_DIR";
pub const ENV_SCHEMA: &str = "KEYSTONE_SCHEMA";
pub const ENV_RULES: &str = "KEYSTONE_RULES";

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Toml(toml::de::Error),
    Logging(String),
    Schema(SchemaError),
    Rules(RuleCompileError),
    UnsupportedFormat(PathBuf),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read config: {err}"),
            Self::Toml(err) => write!(f, "invalid TOML config: {err}"),
            Self::Logging(message) => write!(f, "logging bootstrap failed: {message}"),
            Self::Schema(err) => write!(f, "{err}"),
            Self::Rules(err) => write!(f, "invalid rules document: {err}"),
            Self::UnsupportedFormat(path) => write!(
                f,
                "unsupported document format `{}`; expected .json or .toml",
                path.display()
            ),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Toml(err) => Some(err),
            Self::Schema(err) => Some(err),
            Self::Rules(err) => Some(err),
            Self::Logging(_) | Self::UnsupportedFormat(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::Toml(value)
    }
}

impl From<SchemaError> for ConfigError {
    fn from(value: SchemaError) -> Self {
        Self::Schema(value)
    }
}

impl From<RuleCompileError> for ConfigError {
    fn from(value: RuleCompileError) -> Self {
        Self::Rules(value)
    }
}

/// Process-level settings for the entity layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
    pub schema_path: Option<PathBuf>,
    pub rules_path: Option<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level().to_string(),
            log_dir: None,
            schema_path: None,
            rules_path: None,
        }
    }
}

/// Services produced by `CoreConfig::bootstrap`.
#[derive(Debug, Default)]
pub struct Bootstrapped {
    pub schema: Option<Arc<SchemaRegistry>>,
    pub rules: Option<RuleDocument>,
}

impl CoreConfig {
    /// Reads `KEYSTONE_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };
        let defaults = Self::default();
        Self {
            log_level: read(ENV_LOG_LEVEL).unwrap_or(defaults.log_level),
            log_dir: read(ENV_LOG_DIR).map(PathBuf::from),
            schema_path: read(ENV_SCHEMA).map(PathBuf::from),
            rules_path: read(ENV_RULES).map(PathBuf::from),
        }
    }

    pub fn from_toml_str(raw: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Initializes logging and loads configured documents.
    ///
    /// Each step runs only when its location is configured.
    pub fn bootstrap(&self) -> ConfigResult<Bootstrapped> {
        if let Some(dir) = &self.log_dir {
            init_logging(&self.log_level, &dir.to_string_lossy()).map_err(ConfigError::Logging)?;
        }

        let schema = match &self.schema_path {
            Some(path) => Some(Arc::new(SchemaRegistry::load(path)?)),
            None => None,
        };
        let rules = match &self.rules_path {
            Some(path) => Some(load_rules(path)?),
            None => None,
        };

        info!(
            "event=core_bootstrap module=config status=ok schema={} rules={}",
            schema.is_some(),
            rules.is_some()
        );
        Ok(Bootstrapped { schema, rules })
    }
}

/// Loads a kind-keyed rules document, choosing the parser by extension.
pub fn load_rules(path: impl AsRef<Path>) -> ConfigResult<RuleDocument> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let raw = std::fs::read_to_string(path)?;
    match extension.as_str() {
        "json" => Ok(RuleDocument::from_json_str(&raw)?),
        "toml" => Ok(RuleDocument::from_toml_str(&raw)?),
        _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
    }
}
