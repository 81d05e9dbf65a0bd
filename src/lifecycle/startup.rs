//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize observability (metrics exporter, tracer provider)
//! - Build subsystems in dependency order: APM, analytics, health, portfolios
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listeners start last (traffic only when ready)

use opentelemetry_sdk::trace::TracerProvider;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{ConfigError, PrismaConfig};
use crate::correlation::build_analytics;
use crate::health::{probes, HealthAggregator, ProbeError};
use crate::http::AppState;
use crate::observability::{self, metrics, otel};
use crate::portfolio::PortfolioStore;

/// Fatal errors during startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("logging already initialized: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),

    #[error("invalid {field} address '{value}'")]
    Address { field: &'static str, value: String },

    #[error("metrics exporter failed: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("HTTP client setup failed: {0}")]
    Client(#[from] reqwest::Error),

    #[error("health probe setup failed: {0}")]
    Probes(#[from] ProbeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config watcher failed: {0}")]
    Watcher(#[from] notify::Error),
}

/// Start the exporters enabled by configuration.
///
/// Returns the tracer provider, if one was installed, so it can be flushed on exit.
pub fn init_exporters(config: &PrismaConfig) -> Result<Option<TracerProvider>, StartupError> {
    let observability = &config.observability;
    if observability.metrics_enabled {
        let addr: SocketAddr = observability
            .metrics_address
            .parse()
            .map_err(|_| StartupError::Address {
                field: "metrics",
                value: observability.metrics_address.clone(),
            })?;
        metrics::init_metrics(addr)?;
    }

    Ok(observability
        .tracing_enabled
        .then(otel::install_tracer_provider))
}

/// Build every subsystem the HTTP layer depends on.
pub fn build_state(config: PrismaConfig) -> Result<AppState, StartupError> {
    let apm = Arc::new(observability::build_apm(&config));
    let analytics = build_analytics(&config.analytics)?;

    let health = HealthAggregator::new(&config.health);
    probes::register_defaults(&health, &config)?;

    let portfolios = PortfolioStore::with_samples();
    tracing::info!(
        apm_enabled = apm.is_enabled(),
        checks = health.check_names().len(),
        portfolios = portfolios.len(),
        "Subsystems initialized"
    );

    Ok(AppState::new(config, apm, Arc::new(health), analytics, portfolios))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_state_from_defaults() {
        let state = build_state(PrismaConfig::default()).unwrap();
        assert!(state.apm.is_enabled());
        assert!(state.health.check_names().contains(&"generation".to_string()));
        assert_eq!(state.portfolios.len(), 6);
    }

    #[test]
    fn test_bad_metrics_address() {
        let mut config = PrismaConfig::default();
        config.observability.metrics_address = "not-an-address".into();
        assert!(matches!(
            init_exporters(&config),
            Err(StartupError::Address { field: "metrics", .. })
        ));
    }
}
