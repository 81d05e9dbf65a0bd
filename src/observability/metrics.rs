//! Metrics collection and exposition.
//!
//! # Metrics
//! - `prisma_http_requests_total` (counter): requests by method, route, status
//! - `prisma_http_request_duration_seconds` (histogram): request latency
//! - `prisma_operation_duration_ms` (histogram): ledger performance metrics
//! - `prisma_business_user_events_total` (counter): user-kind business metrics
//! - `prisma_business_revenue_total` (counter) / `prisma_business_revenue` (histogram)
//! - `prisma_errors_total` (counter): technical error metrics
//! - `prisma_user_metrics_total` (counter): user-category metrics
//! - `prisma_health_check_duration_seconds` (histogram) and
//!   `prisma_health_check_status` (gauge, 2=healthy 1=degraded 0=unhealthy)
//!
//! # Design Decisions
//! - Export classification uses the metric's category and `BusinessKind`,
//!   never its name
//! - Business metrics without a kind stay in the ledger but are not exported

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::apm::sink::TelemetrySink;
use crate::apm::{BusinessKind, Metric, MetricCategory, TelemetryError};
use crate::health::HealthStatus;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    describe();
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

fn describe() {
    describe_counter!("prisma_http_requests_total", "Total HTTP requests handled");
    describe_histogram!(
        "prisma_http_request_duration_seconds",
        metrics::Unit::Seconds,
        "HTTP request latency"
    );
    describe_histogram!(
        "prisma_operation_duration_ms",
        metrics::Unit::Milliseconds,
        "Transaction and span durations"
    );
    describe_counter!("prisma_business_user_events_total", "User business events");
    describe_counter!("prisma_business_revenue_total", "Revenue events");
    describe_counter!("prisma_errors_total", "Technical errors recorded by operations");
    describe_gauge!("prisma_health_check_status", "Latest probe status");
}

/// Record one handled HTTP request.
pub fn record_request(method: &str, route: &str, status: u16, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("route", route.to_string()),
        ("status", status.to_string()),
    ];
    counter!("prisma_http_requests_total", &labels).increment(1);
    histogram!("prisma_http_request_duration_seconds", &labels).record(start.elapsed().as_secs_f64());
}

/// Record one executed health probe.
pub fn record_probe(name: &str, status: HealthStatus, elapsed: Duration) {
    histogram!("prisma_health_check_duration_seconds", "check" => name.to_string())
        .record(elapsed.as_secs_f64());
    gauge!("prisma_health_check_status", "check" => name.to_string()).set(status_value(status));
}

/// Record the rolled-up system status.
pub fn record_overall_health(status: HealthStatus) {
    gauge!("prisma_health_check_status", "check" => "overall").set(status_value(status));
}

fn status_value(status: HealthStatus) -> f64 {
    match status {
        HealthStatus::Healthy => 2.0,
        HealthStatus::Degraded => 1.0,
        HealthStatus::Unhealthy => 0.0,
    }
}

/// Where a ledger metric is exported, if anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportTarget {
    OperationDuration,
    UserEvents,
    Revenue,
    Errors,
    UserMetrics,
}

/// Classify a metric by its explicit category and business kind.
pub fn export_target(metric: &Metric) -> Option<ExportTarget> {
    match (metric.category, metric.business_kind) {
        (MetricCategory::Performance, _) => Some(ExportTarget::OperationDuration),
        (MetricCategory::Business, Some(BusinessKind::User)) => Some(ExportTarget::UserEvents),
        (MetricCategory::Business, Some(BusinessKind::Revenue)) => Some(ExportTarget::Revenue),
        (MetricCategory::Business, None) => None,
        (MetricCategory::Technical, _) => Some(ExportTarget::Errors),
        (MetricCategory::User, _) => Some(ExportTarget::UserMetrics),
    }
}

/// Sink forwarding ledger metrics to the `metrics` facade.
#[derive(Debug, Default)]
pub struct MetricsSink;

impl TelemetrySink for MetricsSink {
    fn name(&self) -> &'static str {
        "prometheus"
    }

    fn on_metric(&self, metric: &Metric) -> Result<(), TelemetryError> {
        let name = metric.name.clone();
        match export_target(metric) {
            Some(ExportTarget::OperationDuration) => {
                let operation = metric
                    .tags
                    .get("transaction")
                    .or_else(|| metric.tags.get("operation"))
                    .cloned()
                    .unwrap_or_default();
                histogram!("prisma_operation_duration_ms", "metric" => name, "operation" => operation)
                    .record(metric.value);
            }
            Some(ExportTarget::UserEvents) => {
                counter!("prisma_business_user_events_total", "metric" => name).increment(1);
            }
            Some(ExportTarget::Revenue) => {
                let currency = metric.tags.get("currency").cloned().unwrap_or_default();
                counter!("prisma_business_revenue_total", "currency" => currency.clone()).increment(1);
                histogram!("prisma_business_revenue", "currency" => currency).record(metric.value);
            }
            Some(ExportTarget::Errors) => {
                counter!("prisma_errors_total", "metric" => name).increment(1);
            }
            Some(ExportTarget::UserMetrics) => {
                counter!("prisma_user_metrics_total", "metric" => name).increment(1);
            }
            None => {
                tracing::trace!(metric = %metric.name, "Business metric without kind not exported");
            }
        }
        Ok(())
    }
}
