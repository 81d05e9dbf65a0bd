//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → apm ledger lifecycle events
//!         → metrics.rs (MetricsSink: counters, gauges, histograms)
//!         → otel.rs (OtelSink: OpenTelemetry spans)
//!
//! Consumers:
//!     → Log aggregation (stdout, JSON)
//!     → Metrics endpoint (Prometheus scrape)
//!     → Span exporter (stdout when tracing is enabled)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through all subsystems
//! - Metrics are cheap (atomic increments)
//! - OpenTelemetry mirroring is optional; the ledger works without it

pub mod logging;
pub mod metrics;
pub mod otel;

use std::sync::Arc;

use crate::apm::{Apm, ApmBuilder};
use crate::config::PrismaConfig;

/// Build the APM context with the sinks enabled by configuration.
pub fn build_apm(config: &PrismaConfig) -> Apm {
    apm_builder(config).build()
}

pub fn apm_builder(config: &PrismaConfig) -> ApmBuilder {
    let mut builder = Apm::builder(&config.apm);
    if config.observability.metrics_enabled {
        builder = builder.sink(Arc::new(metrics::MetricsSink));
    }
    if config.observability.tracing_enabled {
        builder = builder.sink(Arc::new(otel::OtelSink::new(&config.observability.service_name)));
    }
    builder
}
