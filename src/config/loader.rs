//! Configuration loading from disk.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::PrismaConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<PrismaConfig, ConfigError> {
    let config: PrismaConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<PrismaConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = parse_config(
            r#"
            [apm]
            max_transactions = 50

            [health]
            cache_ttl_secs = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.apm.max_transactions, 50);
        assert!(config.apm.enabled);
        assert_eq!(config.health.cache_ttl_secs, 10);
        assert_eq!(config.health.probe_timeout_secs, 5);
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
    }

    #[test]
    fn test_external_apis_override() {
        let config = parse_config(
            r#"
            [probes]
            external_apis = [{ name = "status", url = "https://status.example.com" }]
            "#,
        )
        .unwrap();

        assert_eq!(config.probes.external_apis.len(), 1);
        assert_eq!(config.probes.external_apis[0].name, "status");
    }

    #[test]
    fn test_invalid_config_reports_validation() {
        let err = parse_config("[apm]\nmax_metrics = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert_eq!(
            err.to_string(),
            "Validation failed: apm.max_metrics: must be greater than 0"
        );
    }

    #[test]
    fn test_syntax_error_is_parse_error() {
        let err = parse_config("[apm\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("does/not/exist.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
