//! OpenTelemetry span mirroring.
//!
//! # Responsibilities
//! - Open one OTel span per ledger transaction and per ledger span
//! - Close it with status, duration and exception data on the matching end event
//! - Install and shut down the SDK tracer provider
//!
//! # Design Decisions
//! - Open spans are keyed by a typed key, not a concatenated string
//! - Root spans reuse the ledger trace id so analytics events join both systems
//! - End events for spans this sink never saw are ignored
//! - Evicted transactions end every span still open under them, so the side
//!   table never outgrows the ledger

use dashmap::DashMap;
use opentelemetry::global::{self, BoxedSpan, BoxedTracer};
use opentelemetry::trace::{
    Span as _, SpanContext, SpanKind, Status, TraceContextExt, TraceId as OtelTraceId, Tracer as _,
};
use opentelemetry::{Context, KeyValue};
use opentelemetry_sdk::trace::TracerProvider;

use crate::apm::sink::TelemetrySink;
use crate::apm::{OperationStatus, Span, SpanId, TelemetryError, Transaction, TransactionId};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum SpanKey {
    Transaction(TransactionId),
    Child(TransactionId, SpanId),
}

/// Sink mirroring ledger lifecycles into OpenTelemetry spans.
pub struct OtelSink {
    tracer: BoxedTracer,
    open: DashMap<SpanKey, BoxedSpan>,
}

impl OtelSink {
    /// Use the globally installed tracer provider.
    pub fn new(service_name: &str) -> Self {
        Self {
            tracer: global::tracer(service_name.to_string()),
            open: DashMap::new(),
        }
    }

    /// Number of spans opened and not yet ended.
    pub fn open_spans(&self) -> usize {
        self.open.len()
    }

    fn parent_context(&self, key: &SpanKey) -> Option<SpanContext> {
        self.open.get(key).map(|span| span.span_context().clone())
    }

    fn finish(&self, key: &SpanKey, status: OperationStatus, duration: Option<u64>, error: Option<&str>) {
        let Some((_, mut span)) = self.open.remove(key) else {
            return;
        };
        if let Some(duration) = duration {
            span.set_attribute(KeyValue::new("duration_ms", duration as i64));
        }
        match status {
            OperationStatus::Failed => {
                let message = error.unwrap_or("operation failed").to_string();
                span.add_event(
                    "exception",
                    vec![KeyValue::new("exception.message", message.clone())],
                );
                span.set_status(Status::error(message));
            }
            _ => span.set_status(Status::Ok),
        }
        span.end();
    }

    fn discard(&self, key: &SpanKey) {
        if let Some((_, mut span)) = self.open.remove(key) {
            span.set_attribute(KeyValue::new("apm.evicted", true));
            span.end();
        }
    }
}

impl TelemetrySink for OtelSink {
    fn name(&self) -> &'static str {
        "opentelemetry"
    }

    fn on_transaction_start(&self, tx: &Transaction) -> Result<(), TelemetryError> {
        let mut attributes = vec![
            KeyValue::new("apm.transaction_id", tx.id.to_string()),
            KeyValue::new("apm.trace_id", tx.trace_id.to_string()),
        ];
        attributes.extend(
            tx.metadata
                .iter()
                .map(|(k, v)| KeyValue::new(k.clone(), v.clone())),
        );

        let span = self
            .tracer
            .span_builder(tx.name.clone())
            .with_kind(SpanKind::Server)
            .with_trace_id(OtelTraceId::from_bytes(tx.trace_id.to_bytes()))
            .with_attributes(attributes)
            .start(&self.tracer);
        self.open.insert(SpanKey::Transaction(tx.id.clone()), span);
        Ok(())
    }

    fn on_transaction_end(&self, tx: &Transaction) -> Result<(), TelemetryError> {
        self.finish(
            &SpanKey::Transaction(tx.id.clone()),
            tx.status,
            tx.duration,
            tx.error.as_deref(),
        );
        Ok(())
    }

    fn on_span_start(&self, tx: &Transaction, span: &Span) -> Result<(), TelemetryError> {
        let parent = span
            .parent_id
            .as_ref()
            .and_then(|parent| self.parent_context(&SpanKey::Child(tx.id.clone(), parent.clone())))
            .or_else(|| self.parent_context(&SpanKey::Transaction(tx.id.clone())));
        let cx = match parent {
            Some(parent) => Context::new().with_remote_span_context(parent),
            None => Context::new(),
        };

        let attributes: Vec<KeyValue> = span
            .tags
            .iter()
            .map(|(k, v)| KeyValue::new(k.clone(), v.clone()))
            .collect();
        let child = self
            .tracer
            .span_builder(span.operation.clone())
            .with_kind(SpanKind::Internal)
            .with_attributes(attributes)
            .start_with_context(&self.tracer, &cx);
        self.open
            .insert(SpanKey::Child(tx.id.clone(), span.id.clone()), child);
        Ok(())
    }

    fn on_span_end(&self, tx: &Transaction, span: &Span) -> Result<(), TelemetryError> {
        self.finish(
            &SpanKey::Child(tx.id.clone(), span.id.clone()),
            span.status,
            span.duration,
            span.error.as_deref(),
        );
        Ok(())
    }

    fn on_transaction_evicted(&self, tx: &Transaction) -> Result<(), TelemetryError> {
        for span in &tx.spans {
            self.discard(&SpanKey::Child(tx.id.clone(), span.id.clone()));
        }
        self.discard(&SpanKey::Transaction(tx.id.clone()));
        Ok(())
    }
}

/// Install an SDK tracer provider exporting spans to stdout.
pub fn install_tracer_provider() -> TracerProvider {
    let provider = TracerProvider::builder()
        .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
        .build();
    global::set_tracer_provider(provider.clone());
    tracing::info!("OpenTelemetry tracer provider installed");
    provider
}

/// Flush and shut down a provider installed by [`install_tracer_provider`].
pub fn shutdown_tracer_provider(provider: TracerProvider) {
    if let Err(e) = provider.shutdown() {
        tracing::warn!(error = %e, "Failed to shut down tracer provider");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apm::{Apm, Outcome, Tags};
    use crate::config::ApmConfig;
    use std::sync::Arc;

    fn apm_with_otel() -> (Apm, Arc<OtelSink>) {
        let sink = Arc::new(OtelSink::new("prisma-test"));
        let apm = Apm::builder(&ApmConfig::default()).sink(sink.clone()).build();
        (apm, sink)
    }

    #[test]
    fn test_side_table_tracks_open_spans() {
        let (apm, sink) = apm_with_otel();
        let tx = apm.start_transaction("GET /api/portfolios", Tags::new());
        let parent = apm.start_span(&tx, "db.query", None, Tags::new());
        let child = apm.start_span(&tx, "db.decode", Some(&parent), Tags::new());
        assert_eq!(sink.open_spans(), 3);

        apm.end_span(&tx, &child, Outcome::Completed);
        apm.fail_span(&tx, &parent, &"connection reset");
        assert_eq!(sink.open_spans(), 1);

        apm.end_transaction(&tx, Outcome::Failed);
        assert_eq!(sink.open_spans(), 0);
    }

    #[test]
    fn test_transaction_end_leaves_child_spans_tracked() {
        let (apm, sink) = apm_with_otel();
        let tx = apm.start_transaction("publish", Tags::new());
        let span = apm.start_span(&tx, "upload", None, Tags::new());
        apm.end_transaction(&tx, Outcome::Completed);
        assert_eq!(sink.open_spans(), 1);

        apm.end_span(&tx, &span, Outcome::Completed);
        assert_eq!(sink.open_spans(), 0);
    }

    #[test]
    fn test_side_table_bounded_by_ledger_capacity() {
        let sink = Arc::new(OtelSink::new("prisma-test"));
        let config = ApmConfig {
            max_transactions: 4,
            ..ApmConfig::default()
        };
        let apm = Apm::builder(&config).sink(sink.clone()).build();

        for i in 0..=config.max_transactions {
            let tx = apm.start_transaction(&format!("tx-{}", i), Tags::new());
            apm.start_span(&tx, "upload", None, Tags::new());
        }
        assert_eq!(apm.transactions().len(), config.max_transactions);
        assert_eq!(sink.open_spans(), config.max_transactions * 2);

        apm.clear();
        assert_eq!(sink.open_spans(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_tracked_future_ends_its_span() {
        let (apm, sink) = apm_with_otel();
        let tracked = apm.track(
            "GET /api/portfolios/{slug}",
            Tags::new(),
            std::future::pending::<Result<(), String>>(),
        );
        assert!(tokio::time::timeout(std::time::Duration::from_secs(30), tracked)
            .await
            .is_err());

        assert_eq!(apm.transactions()[0].status, OperationStatus::Failed);
        assert_eq!(sink.open_spans(), 0);
    }

    #[test]
    fn test_unknown_end_is_ignored() {
        let sink = OtelSink::new("prisma-test");
        sink.finish(
            &SpanKey::Transaction(TransactionId::from("missing")),
            OperationStatus::Completed,
            Some(1),
            None,
        );
        assert_eq!(sink.open_spans(), 0);
    }
}
