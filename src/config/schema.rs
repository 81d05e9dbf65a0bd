//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the PRISMA telemetry service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PrismaConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Transaction/span ledger settings.
    pub apm: ApmConfig,

    /// Health aggregator settings.
    pub health: HealthConfig,

    /// Targets probed by the default health checks.
    pub probes: ProbeConfig,

    /// Analytics event capture.
    pub analytics: AnalyticsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Portfolio publishing settings.
    pub portfolio: PortfolioConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration for request handling.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// APM ledger configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApmConfig {
    /// Global tracking switch. When false every ledger call is a no-op.
    pub enabled: bool,

    /// Maximum retained transactions (oldest evicted first).
    pub max_transactions: usize,

    /// Maximum retained metrics (oldest evicted first).
    pub max_metrics: usize,

    /// Transactions slower than this are flagged as slow.
    pub slow_transaction_ms: u64,
}

impl Default for ApmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_transactions: 1000,
            max_metrics: 10_000,
            slow_transaction_ms: 1000,
        }
    }
}

/// Health aggregator configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// How long a probe result is reused before the probe runs again.
    pub cache_ttl_secs: u64,

    /// Per-probe deadline; a probe exceeding it is reported unhealthy.
    pub probe_timeout_secs: u64,

    /// Probes consulted by the readiness endpoint.
    pub critical_checks: Vec<String>,

    /// Resident memory above this marks the `system` probe degraded.
    pub memory_threshold_mb: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 30,
            probe_timeout_secs: 5,
            critical_checks: vec!["database".to_string(), "system".to_string()],
            memory_threshold_mb: 512,
        }
    }
}

/// Targets for the default probes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Base URL of the hosted Postgres REST endpoint (e.g., "https://xyz.supabase.co").
    pub database_url: Option<String>,

    /// API key sent as the `apikey` header to the database endpoint.
    pub database_api_key: Option<String>,

    /// Cache server address (e.g., "127.0.0.1:6379").
    pub cache_address: Option<String>,

    /// External APIs checked for reachability.
    pub external_apis: Vec<ExternalApiConfig>,

    /// Timeout for a single external API request, in milliseconds.
    pub external_timeout_ms: u64,

    /// Responses slower than this mark a reachable dependency degraded.
    pub slow_response_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            database_api_key: None,
            cache_address: None,
            external_apis: vec![
                ExternalApiConfig {
                    name: "openai".to_string(),
                    url: "https://api.openai.com/v1/models".to_string(),
                },
                ExternalApiConfig {
                    name: "github".to_string(),
                    url: "https://api.github.com".to_string(),
                },
            ],
            external_timeout_ms: 3000,
            slow_response_ms: 1000,
        }
    }
}

/// One external API reachability target.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExternalApiConfig {
    /// Probe is registered as `api_<name>`.
    pub name: String,

    /// URL receiving the HEAD request.
    pub url: String,
}

/// Analytics capture configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Send events to the capture endpoint. When false events are logged only.
    pub enabled: bool,

    /// Capture host (events are POSTed to `<host>/capture/`).
    pub host: String,

    /// Project API key.
    pub api_key: String,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "https://app.posthog.com".to_string(),
            api_key: String::new(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format ("pretty" or "json").
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,

    /// Mirror transactions and spans into OpenTelemetry.
    pub tracing_enabled: bool,

    /// Name reported by the tracer.
    pub service_name: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
            tracing_enabled: false,
            service_name: "prisma".to_string(),
        }
    }
}

/// Portfolio publishing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PortfolioConfig {
    /// Domain under which portfolios receive their subdomain.
    pub base_domain: String,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            base_domain: "prisma.site".to_string(),
        }
    }
}
