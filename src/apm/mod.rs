//! Application performance monitoring.
//!
//! # Data Flow
//! ```text
//! Caller (handler, correlation helper, Apm::track)
//!     → Apm context (enabled switch, id allocation)
//!     → ledger.rs (single source of truth, bounded retention)
//!     → snapshot broadcast to every sink.rs implementation
//!         → OpenTelemetry spans (observability::otel)
//!         → Prometheus metrics (observability::metrics)
//! ```
//!
//! # Design Decisions
//! - One `Apm` per process, constructed by the host and shared via `Arc`
//! - Telemetry never fails the caller: lookup misses are ignored, sink
//!   errors and panics are isolated (isolation.rs)
//! - When disabled every operation is a no-op returning empty identifiers
//! - Dropped tracked work is closed as failed (`CANCELLED`), never left pending

pub mod clock;
pub mod isolation;
pub mod ledger;
pub mod scope;
pub mod sink;
pub mod types;

use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::Instrument;

use crate::config::ApmConfig;
use self::clock::{Clock, SystemClock};
use self::isolation::best_effort;
use self::ledger::{Ledger, LedgerLimits};
use self::scope::TraceScope;
use self::sink::TelemetrySink;

pub use self::types::{
    BusinessKind, Metric, MetricCategory, MetricUnit, OperationStatus, Outcome,
    PerformanceSummary, Span, SpanId, Tags, TelemetryError, TraceId, Transaction, TransactionId,
};

/// Process-wide tracing context: ledger plus registered sinks.
pub struct Apm {
    ledger: Ledger,
    sinks: Vec<Arc<dyn TelemetrySink>>,
    enabled: AtomicBool,
}

/// Builder for [`Apm`].
pub struct ApmBuilder {
    config: ApmConfig,
    clock: Arc<dyn Clock>,
    sinks: Vec<Arc<dyn TelemetrySink>>,
}

impl ApmBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn build(self) -> Apm {
        let limits = LedgerLimits {
            max_transactions: self.config.max_transactions,
            max_metrics: self.config.max_metrics,
            slow_transaction_ms: self.config.slow_transaction_ms,
        };
        Apm {
            ledger: Ledger::new(limits, self.clock),
            sinks: self.sinks,
            enabled: AtomicBool::new(self.config.enabled),
        }
    }
}

impl Apm {
    /// Context with the system clock and no sinks.
    pub fn new(config: &ApmConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn builder(config: &ApmConfig) -> ApmBuilder {
        ApmBuilder {
            config: config.clone(),
            clock: Arc::new(SystemClock),
            sinks: Vec::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        let previous = self.enabled.swap(enabled, Ordering::Relaxed);
        if previous != enabled {
            tracing::info!(enabled, "APM tracking toggled");
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn start_transaction(&self, name: &str, metadata: Tags) -> TransactionId {
        if !self.is_enabled() {
            return TransactionId::none();
        }
        let (tx, evicted) = self.ledger.open_transaction(name, metadata);
        for old in &evicted {
            self.broadcast("transaction_evicted", |sink| sink.on_transaction_evicted(old));
        }
        self.broadcast("transaction_start", |sink| sink.on_transaction_start(&tx));
        tx.id
    }

    pub fn end_transaction(&self, id: &TransactionId, outcome: Outcome) {
        self.close_transaction(id, outcome, None);
    }

    /// Close a transaction as failed, keeping the error message.
    pub fn fail_transaction(&self, id: &TransactionId, error: &dyn Display) {
        self.close_transaction(id, Outcome::Failed, Some(error.to_string()));
    }

    pub fn start_span(
        &self,
        transaction_id: &TransactionId,
        operation: &str,
        parent_span_id: Option<&SpanId>,
        tags: Tags,
    ) -> SpanId {
        if !self.is_enabled() || transaction_id.is_none() {
            return SpanId::none();
        }
        let mut span_id = SpanId::none();
        best_effort("start_span", || {
            let (tx, span) = self
                .ledger
                .start_span(transaction_id, operation, parent_span_id, tags)?;
            self.broadcast("span_start", |sink| sink.on_span_start(&tx, &span));
            span_id = span.id;
            Ok(())
        });
        span_id
    }

    pub fn end_span(&self, transaction_id: &TransactionId, span_id: &SpanId, outcome: Outcome) {
        self.close_span(transaction_id, span_id, outcome, None);
    }

    /// Close a span as failed, keeping the error message.
    pub fn fail_span(&self, transaction_id: &TransactionId, span_id: &SpanId, error: &dyn Display) {
        self.close_span(transaction_id, span_id, Outcome::Failed, Some(error.to_string()));
    }

    pub fn record_metric(&self, metric: Metric) {
        if !self.is_enabled() {
            return;
        }
        let metric = self.ledger.record_metric(metric);
        self.broadcast("metric", |sink| sink.on_metric(&metric));
    }

    pub fn performance_summary(&self) -> PerformanceSummary {
        self.ledger.performance_summary()
    }

    pub fn transaction(&self, id: &TransactionId) -> Option<Transaction> {
        self.ledger.transaction(id)
    }

    pub fn transactions(&self) -> Vec<Transaction> {
        self.ledger.transactions()
    }

    pub fn metrics(&self) -> Vec<Metric> {
        self.ledger.metrics()
    }

    pub fn trace_id(&self, id: &TransactionId) -> Option<TraceId> {
        self.ledger.transaction(id).map(|t| t.trace_id)
    }

    /// Drop all retained transactions and metrics.
    pub fn clear(&self) {
        for old in self.ledger.clear() {
            self.broadcast("transaction_evicted", |sink| sink.on_transaction_evicted(&old));
        }
    }

    /// Track `fut` as one transaction.
    ///
    /// The future runs with the new transaction as its ambient [`scope`], so
    /// correlation helpers called inside it attach child spans. An `Err` marks
    /// the transaction failed and is returned unchanged. If the returned future
    /// is dropped before `fut` finishes, the transaction fails as cancelled.
    pub async fn track<F, T, E>(&self, name: &str, metadata: Tags, fut: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: Display,
    {
        let id = self.start_transaction(name, metadata);
        let Some(trace_id) = self.trace_id(&id) else {
            return fut.await;
        };

        let span = tracing::info_span!("apm", transaction = %name, trace_id = %trace_id);
        let trace_scope = TraceScope {
            transaction_id: id.clone(),
            trace_id,
            span_id: None,
        };
        let guard = CancelGuard::transaction(self, id.clone());
        let result = scope::within(trace_scope, fut).instrument(span).await;
        guard.disarm();

        match &result {
            Ok(_) => self.end_transaction(&id, Outcome::Completed),
            Err(e) => self.fail_transaction(&id, e),
        }
        result
    }

    fn close_transaction(&self, id: &TransactionId, outcome: Outcome, error: Option<String>) {
        if !self.is_enabled() || id.is_none() {
            return;
        }
        best_effort("end_transaction", || {
            let tx = self.ledger.end_transaction(id, outcome, error)?;
            let duration = tx.duration.unwrap_or(0);
            if self.ledger.is_slow(duration) {
                tracing::warn!(
                    transaction = %tx.name,
                    id = %tx.id,
                    duration_ms = duration,
                    "Slow transaction detected"
                );
            }
            if tx.open_spans() > 0 {
                tracing::debug!(transaction = %tx.name, open_spans = tx.open_spans(), "Transaction closed with open spans");
            }
            self.broadcast("transaction_end", |sink| sink.on_transaction_end(&tx));
            self.record_metric(
                Metric::performance("transaction_duration", duration)
                    .with_tag("transaction", tx.name.clone())
                    .with_tag("status", tx.status.as_str()),
            );
            Ok(())
        });
    }

    fn close_span(
        &self,
        transaction_id: &TransactionId,
        span_id: &SpanId,
        outcome: Outcome,
        error: Option<String>,
    ) {
        if !self.is_enabled() || transaction_id.is_none() || span_id.is_none() {
            return;
        }
        best_effort("end_span", || {
            let (tx, span) = self.ledger.end_span(transaction_id, span_id, outcome, error)?;
            self.broadcast("span_end", |sink| sink.on_span_end(&tx, &span));
            self.record_metric(
                Metric::performance("span_duration", span.duration.unwrap_or(0))
                    .with_tag("operation", span.operation.clone())
                    .with_tag("status", span.status.as_str()),
            );
            Ok(())
        });
    }

    fn broadcast<F>(&self, event: &str, f: F)
    where
        F: Fn(&dyn TelemetrySink) -> Result<(), TelemetryError>,
    {
        for sink in &self.sinks {
            best_effort(event, || f(&**sink));
        }
    }
}

/// Error recorded on work dropped before it finished.
pub const CANCELLED: &str = "cancelled";

/// Fails a transaction or span as [`CANCELLED`] when dropped while armed.
pub(crate) struct CancelGuard<'a> {
    apm: &'a Apm,
    transaction_id: TransactionId,
    span_id: Option<SpanId>,
    armed: bool,
}

impl<'a> CancelGuard<'a> {
    pub(crate) fn transaction(apm: &'a Apm, transaction_id: TransactionId) -> Self {
        Self {
            apm,
            transaction_id,
            span_id: None,
            armed: true,
        }
    }

    pub(crate) fn span(apm: &'a Apm, transaction_id: TransactionId, span_id: SpanId) -> Self {
        Self {
            apm,
            transaction_id,
            span_id: Some(span_id),
            armed: true,
        }
    }

    /// The work finished; the caller closes the record itself.
    pub(crate) fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CancelGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match &self.span_id {
            Some(span_id) => self.apm.fail_span(&self.transaction_id, span_id, &CANCELLED),
            None => self.apm.fail_transaction(&self.transaction_id, &CANCELLED),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apm::clock::ManualClock;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<String>>,
    }

    impl RecordingSink {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl TelemetrySink for RecordingSink {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn on_transaction_start(&self, tx: &Transaction) -> Result<(), TelemetryError> {
            self.events.lock().unwrap().push(format!("tx_start:{}", tx.name));
            Ok(())
        }

        fn on_transaction_end(&self, tx: &Transaction) -> Result<(), TelemetryError> {
            self.events
                .lock()
                .unwrap()
                .push(format!("tx_end:{}:{}", tx.name, tx.status.as_str()));
            Ok(())
        }

        fn on_span_start(&self, _tx: &Transaction, span: &Span) -> Result<(), TelemetryError> {
            self.events.lock().unwrap().push(format!("span_start:{}", span.operation));
            Ok(())
        }

        fn on_span_end(&self, _tx: &Transaction, span: &Span) -> Result<(), TelemetryError> {
            self.events.lock().unwrap().push(format!("span_end:{}", span.operation));
            Ok(())
        }

        fn on_transaction_evicted(&self, tx: &Transaction) -> Result<(), TelemetryError> {
            self.events.lock().unwrap().push(format!("tx_evicted:{}", tx.name));
            Ok(())
        }

        fn on_metric(&self, metric: &Metric) -> Result<(), TelemetryError> {
            self.events.lock().unwrap().push(format!("metric:{}", metric.name));
            Ok(())
        }
    }

    struct PanickingSink;

    impl TelemetrySink for PanickingSink {
        fn name(&self) -> &'static str {
            "panicking"
        }

        fn on_transaction_start(&self, _tx: &Transaction) -> Result<(), TelemetryError> {
            panic!("exporter crashed");
        }

        fn on_metric(&self, _metric: &Metric) -> Result<(), TelemetryError> {
            Err(TelemetryError::Sink {
                sink: "panicking",
                message: "unavailable".into(),
            })
        }
    }

    fn apm_with_sink() -> (Apm, Arc<RecordingSink>, Arc<ManualClock>) {
        let sink = Arc::new(RecordingSink::default());
        let clock = Arc::new(ManualClock::new(0));
        let apm = Apm::builder(&ApmConfig::default())
            .clock(clock.clone())
            .sink(Arc::new(PanickingSink))
            .sink(sink.clone())
            .build();
        (apm, sink, clock)
    }

    #[test]
    fn test_lifecycle_is_broadcast_in_order() {
        let (apm, sink, clock) = apm_with_sink();
        let tx = apm.start_transaction("publish", Tags::new());
        let span = apm.start_span(&tx, "render", None, Tags::new());
        clock.advance(Duration::from_millis(5));
        apm.end_span(&tx, &span, Outcome::Completed);
        apm.end_transaction(&tx, Outcome::Completed);

        assert_eq!(
            sink.events(),
            vec![
                "tx_start:publish",
                "span_start:render",
                "span_end:render",
                "metric:span_duration",
                "tx_end:publish:completed",
                "metric:transaction_duration",
            ]
        );
    }

    #[test]
    fn test_transaction_duration_metric_is_tagged() {
        let (apm, _, clock) = apm_with_sink();
        let tx = apm.start_transaction("publish", Tags::new());
        clock.advance(Duration::from_millis(30));
        apm.fail_transaction(&tx, &"boom");

        let metric = apm.metrics().pop().unwrap();
        assert_eq!(metric.name, "transaction_duration");
        assert_eq!(metric.value, 30.0);
        assert_eq!(metric.tags["transaction"], "publish");
        assert_eq!(metric.tags["status"], "failed");
        assert_eq!(apm.transaction(&tx).unwrap().error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_unknown_ids_are_noops() {
        let (apm, sink, _) = apm_with_sink();
        apm.end_transaction(&TransactionId::from("missing"), Outcome::Completed);
        apm.end_span(&TransactionId::from("missing"), &SpanId::from("s"), Outcome::Failed);
        let span = apm.start_span(&TransactionId::from("missing"), "op", None, Tags::new());
        assert!(span.is_none());
        assert!(sink.events().is_empty());
        assert!(apm.metrics().is_empty());
    }

    #[test]
    fn test_disabled_apm_is_noop() {
        let config = ApmConfig {
            enabled: false,
            ..ApmConfig::default()
        };
        let apm = Apm::new(&config);
        let tx = apm.start_transaction("op", Tags::new());
        assert!(tx.is_none());
        assert!(apm.start_span(&tx, "child", None, Tags::new()).is_none());
        apm.record_metric(Metric::technical("ignored"));
        assert!(apm.transactions().is_empty());
        assert!(apm.metrics().is_empty());

        apm.set_enabled(true);
        assert!(!apm.start_transaction("op", Tags::new()).is_none());
    }

    #[tokio::test]
    async fn test_track_returns_error_unchanged() {
        let (apm, _, _) = apm_with_sink();
        let result: Result<(), String> = apm
            .track("POST /api/portfolios", Tags::new(), async {
                Err("database unavailable".to_string())
            })
            .await;

        assert_eq!(result, Err("database unavailable".to_string()));
        let tx = apm.transactions().pop().unwrap();
        assert_eq!(tx.status, OperationStatus::Failed);
        assert_eq!(tx.error.as_deref(), Some("database unavailable"));
    }

    #[tokio::test]
    async fn test_track_exposes_scope_to_inner_future() {
        let (apm, _, _) = apm_with_sink();
        let seen: Result<Option<TraceScope>, String> = apm
            .track("GET /api/portfolios", Tags::new(), async { Ok(scope::current()) })
            .await;

        let scope = seen.unwrap().expect("scope inside tracked future");
        let tx = apm.transaction(&scope.transaction_id).unwrap();
        assert_eq!(tx.trace_id, scope.trace_id);
        assert_eq!(tx.status, OperationStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_track_fails_transaction() {
        let (apm, sink, _) = apm_with_sink();
        let tracked = apm.track(
            "GET /api/portfolios/{slug}",
            Tags::new(),
            std::future::pending::<Result<(), String>>(),
        );
        let timed_out = tokio::time::timeout(Duration::from_secs(30), tracked).await;
        assert!(timed_out.is_err());

        let tx = apm.transactions().pop().unwrap();
        assert_eq!(tx.status, OperationStatus::Failed);
        assert_eq!(tx.error.as_deref(), Some(CANCELLED));
        assert_eq!(apm.performance_summary().pending_transactions, 0);
        assert!(sink
            .events()
            .contains(&"tx_end:GET /api/portfolios/{slug}:failed".to_string()));
    }

    #[test]
    fn test_disarmed_guard_leaves_transaction_open() {
        let (apm, _, _) = apm_with_sink();
        let tx = apm.start_transaction("op", Tags::new());
        CancelGuard::transaction(&apm, tx.clone()).disarm();
        assert_eq!(apm.transaction(&tx).unwrap().status, OperationStatus::Pending);

        let span = apm.start_span(&tx, "render", None, Tags::new());
        drop(CancelGuard::span(&apm, tx.clone(), span.clone()));
        let snapshot = apm.transaction(&tx).unwrap();
        assert_eq!(snapshot.span(&span).unwrap().status, OperationStatus::Failed);
        assert_eq!(snapshot.status, OperationStatus::Pending);
    }

    #[test]
    fn test_eviction_and_clear_are_broadcast() {
        let sink = Arc::new(RecordingSink::default());
        let config = ApmConfig {
            max_transactions: 1,
            ..ApmConfig::default()
        };
        let apm = Apm::builder(&config).sink(sink.clone()).build();
        apm.start_transaction("first", Tags::new());
        apm.start_transaction("second", Tags::new());
        apm.clear();

        assert_eq!(
            sink.events(),
            vec!["tx_start:first", "tx_evicted:first", "tx_start:second", "tx_evicted:second"]
        );
    }

    #[tokio::test]
    async fn test_track_when_disabled_still_runs() {
        let config = ApmConfig {
            enabled: false,
            ..ApmConfig::default()
        };
        let apm = Apm::new(&config);
        let result: Result<u32, String> = apm.track("op", Tags::new(), async { Ok(7) }).await;
        assert_eq!(result, Ok(7));
        assert!(apm.transactions().is_empty());
    }
}
