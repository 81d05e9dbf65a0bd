//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (capacities > 0, timeouts > 0)
//! - Validate addresses and URLs before any subsystem uses them
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: PrismaConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::PrismaConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration, collecting every error.
pub fn validate_config(config: &PrismaConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("invalid socket address '{}'", config.listener.bind_address),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    if config.apm.max_transactions == 0 {
        errors.push(ValidationError::new("apm.max_transactions", "must be greater than 0"));
    }
    if config.apm.max_metrics == 0 {
        errors.push(ValidationError::new("apm.max_metrics", "must be greater than 0"));
    }

    if config.health.probe_timeout_secs == 0 {
        errors.push(ValidationError::new("health.probe_timeout_secs", "must be greater than 0"));
    }
    if config.health.critical_checks.iter().any(|name| name.trim().is_empty()) {
        errors.push(ValidationError::new("health.critical_checks", "check names must not be empty"));
    }

    if let Some(url) = &config.probes.database_url {
        check_url(&mut errors, "probes.database_url", url);
    }
    if let Some(addr) = &config.probes.cache_address {
        if addr.trim().is_empty() {
            errors.push(ValidationError::new("probes.cache_address", "must not be empty"));
        }
    }
    for (i, api) in config.probes.external_apis.iter().enumerate() {
        if api.name.trim().is_empty() {
            errors.push(ValidationError::new(
                format!("probes.external_apis[{}].name", i),
                "must not be empty",
            ));
        }
        check_url(&mut errors, &format!("probes.external_apis[{}].url", i), &api.url);
    }
    if config.probes.external_timeout_ms == 0 {
        errors.push(ValidationError::new("probes.external_timeout_ms", "must be greater than 0"));
    }

    if config.analytics.enabled {
        check_url(&mut errors, "analytics.host", &config.analytics.host);
        if config.analytics.api_key.is_empty() {
            errors.push(ValidationError::new(
                "analytics.api_key",
                "required when analytics is enabled",
            ));
        }
    }

    if !matches!(config.observability.log_format.as_str(), "pretty" | "json") {
        errors.push(ValidationError::new(
            "observability.log_format",
            format!("expected 'pretty' or 'json', got '{}'", config.observability.log_format),
        ));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address '{}'", config.observability.metrics_address),
        ));
    }

    if config.portfolio.base_domain.trim().is_empty() {
        errors.push(ValidationError::new("portfolio.base_domain", "must not be empty"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_url(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => errors.push(ValidationError::new(
            field,
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new(field, format!("invalid URL: {}", e))),
    }
}
