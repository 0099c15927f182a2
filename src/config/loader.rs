//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};
use crate::routing::template::TemplateError;

/// Error type for configuration loading and route table compilation.
///
/// Any of these fails the whole load; a running gateway keeps its current table.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("route '{route}': invalid template '{template}': {source}")]
    InvalidTemplate {
        route: String,
        template: String,
        #[source]
        source: TemplateError,
    },

    #[error("route '{route}': invalid method '{method}'")]
    InvalidMethod { route: String, method: String },

    #[error("routes '{first}' and '{second}' both declare {method} {template}")]
    DuplicateRoute {
        method: String,
        template: String,
        first: String,
        second: String,
    },

    #[error("route '{route}': downstream path uses '{{{param}}}' which the upstream template does not capture")]
    UnknownParameter { route: String, param: String },

    #[error("route '{route}': unknown middleware stage '{stage}'")]
    UnknownStage { route: String, stage: String },

    #[error("route '{route}': invalid header rule '{header}'")]
    InvalidHeader { route: String, header: String },

    #[error("aggregate '{aggregate}': {reason}")]
    InvalidAggregate { aggregate: String, reason: String },

    #[error("route '{route}': endpoint {endpoint} probed at '{probe_path}' but '{existing}' is already configured for it")]
    ConflictingProbePath {
        route: String,
        endpoint: String,
        probe_path: String,
        existing: String,
    },
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    let config: GatewayConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}
