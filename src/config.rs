use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use validator::{Validate, ValidationError};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Translation settings with validation
#[derive(Clone, Debug, Validate, Serialize, Deserialize, PartialEq)]
#[validate(schema(function = "validate_limits"))]
pub struct TranslatorConfig {
    /// Deepest allowed nesting of relationship, connection and computed
    /// selections below the root operation
    #[validate(range(
        min = 1,
        max = 64,
        message = "Max nesting depth must be between 1 and 64"
    ))]
    pub max_nesting_depth: usize,

    /// Page size applied to list reads that request none, unless the entity
    /// defines its own default
    #[serde(default)]
    pub default_limit: Option<u64>,

    /// Upper bound for requested page sizes, unless the entity defines its own
    #[serde(default)]
    #[validate(range(min = 1, message = "Max limit must be at least 1"))]
    pub max_limit: Option<u64>,

    /// Prefix rendered queries with `CYPHER 5`
    #[serde(default)]
    pub cypher_version_prefix: bool,
}

fn validate_limits(config: &TranslatorConfig) -> Result<(), ValidationError> {
    if let (Some(default), Some(max)) = (config.default_limit, config.max_limit) {
        if default > max {
            let mut err = ValidationError::new("default_limit_exceeds_max");
            err.message = Some("Default limit cannot exceed max limit".into());
            return Err(err);
        }
    }
    Ok(())
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            max_nesting_depth: 16,
            default_limit: None,
            max_limit: None,
            cypher_version_prefix: false,
        }
    }
}

impl TranslatorConfig {
    /// Create configuration from environment variables with validation
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            max_nesting_depth: parse_env_var("GQLGRAPH_MAX_NESTING_DEPTH", "16")?,
            default_limit: parse_optional_env_var("GQLGRAPH_DEFAULT_LIMIT")?,
            max_limit: parse_optional_env_var("GQLGRAPH_MAX_LIMIT")?,
            cypher_version_prefix: parse_env_var("GQLGRAPH_CYPHER_VERSION_PREFIX", "false")?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from YAML file
    pub fn from_yaml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            field: "yaml_file".to_string(),
            value: "file read failed".to_string(),
            source: Box::new(e),
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            field: "yaml_content".to_string(),
            value: content,
            source: Box::new(e),
        })?;

        config.validate()?;
        Ok(config)
    }
}

/// Parse an environment variable with a default value
fn parse_env_var<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    value.parse().map_err(|e| ConfigError::Parse {
        field: key.to_string(),
        value,
        source: Box::new(e),
    })
}

/// Parse an environment variable that may be unset
fn parse_optional_env_var<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value.parse().map(Some).map_err(|e| ConfigError::Parse {
            field: key.to_string(),
            value,
            source: Box::new(e),
        }),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
