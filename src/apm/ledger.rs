//! In-memory transaction and metric store.
//!
//! # Responsibilities
//! - Own every transaction and its spans
//! - Bound retention (oldest-by-start-time eviction)
//! - Compute the performance summary
//!
//! # Design Decisions
//! - Mutations return snapshots so sinks run without holding map locks
//! - An age index keyed by `(start_time, seq)` makes each eviction O(log n)
//! - Lookups that miss return `TelemetryError`; the `Apm` layer decides to ignore them

use dashmap::DashMap;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::apm::clock::Clock;
use crate::apm::types::{
    Metric, OperationStatus, Outcome, PerformanceSummary, Span, SpanId, Tags, TelemetryError,
    TraceId, Transaction, TransactionId,
};

/// Retention and classification limits.
#[derive(Debug, Clone, Copy)]
pub struct LedgerLimits {
    pub max_transactions: usize,
    pub max_metrics: usize,
    pub slow_transaction_ms: u64,
}

impl Default for LedgerLimits {
    fn default() -> Self {
        Self {
            max_transactions: 1000,
            max_metrics: 10_000,
            slow_transaction_ms: 1000,
        }
    }
}

/// Transaction and metric store.
pub struct Ledger {
    transactions: DashMap<TransactionId, Transaction>,
    /// Retained transaction ids ordered by `(start_time, seq)`.
    by_age: Mutex<BTreeMap<(u64, u64), TransactionId>>,
    metrics: Mutex<VecDeque<Metric>>,
    limits: LedgerLimits,
    clock: Arc<dyn Clock>,
    seq: AtomicU64,
}

impl Ledger {
    pub fn new(limits: LedgerLimits, clock: Arc<dyn Clock>) -> Self {
        Self {
            transactions: DashMap::new(),
            by_age: Mutex::new(BTreeMap::new()),
            metrics: Mutex::new(VecDeque::new()),
            limits,
            clock,
            seq: AtomicU64::new(0),
        }
    }

    pub fn limits(&self) -> LedgerLimits {
        self.limits
    }

    pub fn now_millis(&self) -> u64 {
        self.clock.now_millis()
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    /// Store a new pending transaction and evict over capacity.
    pub fn start_transaction(&self, name: &str, metadata: Tags) -> Transaction {
        self.open_transaction(name, metadata).0
    }

    /// Like [`Ledger::start_transaction`], also returning the transactions
    /// evicted to make room.
    pub fn open_transaction(&self, name: &str, metadata: Tags) -> (Transaction, Vec<Transaction>) {
        let transaction = Transaction {
            id: TransactionId::generate(),
            trace_id: TraceId::generate(),
            name: name.to_string(),
            start_time: self.clock.now_millis(),
            end_time: None,
            duration: None,
            status: OperationStatus::Pending,
            spans: Vec::new(),
            metadata,
            error: None,
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
        };
        let evicted = self.admit(&transaction);
        (transaction, evicted)
    }

    /// Close a transaction. Open spans are left as they are.
    pub fn end_transaction(
        &self,
        id: &TransactionId,
        outcome: Outcome,
        error: Option<String>,
    ) -> Result<Transaction, TelemetryError> {
        let mut entry = self
            .transactions
            .get_mut(id)
            .ok_or_else(|| TelemetryError::UnknownTransaction(id.clone()))?;
        if !entry.is_open() {
            return Err(TelemetryError::TransactionClosed(id.clone()));
        }

        let end = self.clock.now_millis();
        entry.end_time = Some(end);
        entry.duration = Some(end.saturating_sub(entry.start_time));
        entry.status = outcome.into();
        entry.error = error;
        Ok(entry.clone())
    }

    /// Append a pending span to an open transaction.
    pub fn start_span(
        &self,
        transaction_id: &TransactionId,
        operation: &str,
        parent_id: Option<&SpanId>,
        tags: Tags,
    ) -> Result<(Transaction, Span), TelemetryError> {
        let mut entry = self
            .transactions
            .get_mut(transaction_id)
            .ok_or_else(|| TelemetryError::UnknownTransaction(transaction_id.clone()))?;
        if !entry.is_open() {
            return Err(TelemetryError::TransactionClosed(transaction_id.clone()));
        }

        let parent_id = match parent_id {
            Some(parent) if entry.span(parent).is_some() => Some(parent.clone()),
            Some(parent) => {
                tracing::debug!(
                    transaction = %transaction_id,
                    parent = %parent,
                    "Parent span not found, attaching span to transaction"
                );
                None
            }
            None => None,
        };

        let span = Span {
            id: SpanId::generate(),
            parent_id,
            operation: operation.to_string(),
            start_time: self.clock.now_millis(),
            end_time: None,
            duration: None,
            tags,
            status: OperationStatus::Pending,
            error: None,
        };
        entry.spans.push(span.clone());
        Ok((entry.clone(), span))
    }

    /// Close a span inside its transaction.
    pub fn end_span(
        &self,
        transaction_id: &TransactionId,
        span_id: &SpanId,
        outcome: Outcome,
        error: Option<String>,
    ) -> Result<(Transaction, Span), TelemetryError> {
        let mut entry = self
            .transactions
            .get_mut(transaction_id)
            .ok_or_else(|| TelemetryError::UnknownTransaction(transaction_id.clone()))?;

        let end = self.clock.now_millis();
        let span = entry
            .spans
            .iter_mut()
            .find(|s| &s.id == span_id)
            .ok_or_else(|| TelemetryError::UnknownSpan {
                transaction: transaction_id.clone(),
                span: span_id.clone(),
            })?;
        span.end_time = Some(end);
        span.duration = Some(end.saturating_sub(span.start_time));
        span.status = outcome.into();
        span.error = error;
        let span = span.clone();
        Ok((entry.clone(), span))
    }

    /// Stamp and append a metric, evicting the oldest over capacity.
    pub fn record_metric(&self, mut metric: Metric) -> Metric {
        metric.timestamp = self.clock.now_millis();
        let mut metrics = self.metrics.lock().unwrap_or_else(PoisonError::into_inner);
        metrics.push_back(metric.clone());
        while metrics.len() > self.limits.max_metrics {
            metrics.pop_front();
        }
        metric
    }

    pub fn transaction(&self, id: &TransactionId) -> Option<Transaction> {
        self.transactions.get(id).map(|t| t.value().clone())
    }

    /// All retained transactions, oldest first.
    pub fn transactions(&self) -> Vec<Transaction> {
        let mut all: Vec<Transaction> = self.transactions.iter().map(|t| t.value().clone()).collect();
        all.sort_by_key(|t| (t.start_time, t.seq));
        all
    }

    pub fn metrics(&self) -> Vec<Metric> {
        self.metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_slow(&self, duration_ms: u64) -> bool {
        duration_ms > self.limits.slow_transaction_ms
    }

    pub fn performance_summary(&self) -> PerformanceSummary {
        let mut closed = 0usize;
        let mut failed = 0usize;
        let mut slow = 0usize;
        let mut pending = 0usize;
        let mut total_duration = 0u64;

        for entry in self.transactions.iter() {
            let tx = entry.value();
            match tx.status {
                OperationStatus::Pending => {
                    pending += 1;
                    continue;
                }
                OperationStatus::Failed => failed += 1,
                OperationStatus::Completed => {}
            }
            closed += 1;
            let duration = tx.duration.unwrap_or(0);
            total_duration += duration;
            if self.is_slow(duration) {
                slow += 1;
            }
        }

        let (average_duration, error_rate) = if closed == 0 {
            (0.0, 0.0)
        } else {
            (
                total_duration as f64 / closed as f64,
                failed as f64 / closed as f64 * 100.0,
            )
        };

        PerformanceSummary {
            total_transactions: closed,
            average_duration,
            slow_transactions: slow,
            error_rate,
            pending_transactions: pending,
        }
    }

    /// Drop everything, returning the transactions that were retained.
    pub fn clear(&self) -> Vec<Transaction> {
        let mut by_age = self.by_age.lock().unwrap_or_else(PoisonError::into_inner);
        let drained: Vec<Transaction> = self.transactions.iter().map(|t| t.value().clone()).collect();
        self.transactions.clear();
        by_age.clear();
        self.metrics.lock().unwrap_or_else(PoisonError::into_inner).clear();
        drained
    }

    fn admit(&self, transaction: &Transaction) -> Vec<Transaction> {
        let mut by_age = self.by_age.lock().unwrap_or_else(PoisonError::into_inner);
        by_age.insert((transaction.start_time, transaction.seq), transaction.id.clone());
        self.transactions.insert(transaction.id.clone(), transaction.clone());

        let mut evicted = Vec::new();
        while by_age.len() > self.limits.max_transactions {
            let Some((_, id)) = by_age.pop_first() else {
                break;
            };
            if let Some((_, tx)) = self.transactions.remove(&id) {
                evicted.push(tx);
            }
        }
        if !evicted.is_empty() {
            tracing::debug!(evicted = evicted.len(), "Evicted oldest transactions");
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apm::clock::ManualClock;
    use crate::apm::types::{MetricCategory, MetricUnit};
    use std::time::Duration;

    fn ledger_with(limits: LedgerLimits) -> (Ledger, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000_000));
        (Ledger::new(limits, clock.clone()), clock)
    }

    #[test]
    fn test_transaction_lifecycle() {
        let (ledger, clock) = ledger_with(LedgerLimits::default());
        let tx = ledger.start_transaction("checkout", Tags::new());
        assert!(tx.is_open());

        clock.advance(Duration::from_millis(120));
        let closed = ledger.end_transaction(&tx.id, Outcome::Completed, None).unwrap();
        assert_eq!(closed.status, OperationStatus::Completed);
        assert_eq!(closed.end_time, Some(1_000_120));
        assert_eq!(closed.duration, Some(120));
    }

    #[test]
    fn test_duration_never_negative() {
        let (ledger, clock) = ledger_with(LedgerLimits::default());
        let tx = ledger.start_transaction("skewed", Tags::new());
        clock.set(500);
        let closed = ledger.end_transaction(&tx.id, Outcome::Failed, None).unwrap();
        assert_eq!(closed.duration, Some(0));
        assert_eq!(closed.status, OperationStatus::Failed);
    }

    #[test]
    fn test_unknown_ids_are_errors_not_panics() {
        let (ledger, _) = ledger_with(LedgerLimits::default());
        let missing = TransactionId::from("missing");
        assert!(matches!(
            ledger.end_transaction(&missing, Outcome::Completed, None),
            Err(TelemetryError::UnknownTransaction(_))
        ));

        let tx = ledger.start_transaction("op", Tags::new());
        assert!(matches!(
            ledger.end_span(&tx.id, &SpanId::from("nope"), Outcome::Completed, None),
            Err(TelemetryError::UnknownSpan { .. })
        ));
    }

    #[test]
    fn test_closed_transaction_cannot_be_reclosed_or_extended() {
        let (ledger, _) = ledger_with(LedgerLimits::default());
        let tx = ledger.start_transaction("op", Tags::new());
        ledger.end_transaction(&tx.id, Outcome::Completed, None).unwrap();

        assert!(matches!(
            ledger.end_transaction(&tx.id, Outcome::Failed, None),
            Err(TelemetryError::TransactionClosed(_))
        ));
        assert!(matches!(
            ledger.start_span(&tx.id, "late", None, Tags::new()),
            Err(TelemetryError::TransactionClosed(_))
        ));
        assert_eq!(ledger.transaction(&tx.id).unwrap().status, OperationStatus::Completed);
    }

    #[test]
    fn test_span_lifecycle_and_parent_validation() {
        let (ledger, clock) = ledger_with(LedgerLimits::default());
        let tx = ledger.start_transaction("publish", Tags::new());

        let (_, outer) = ledger.start_span(&tx.id, "db.query", None, Tags::new()).unwrap();
        let (_, inner) = ledger
            .start_span(&tx.id, "db.decode", Some(&outer.id), Tags::new())
            .unwrap();
        assert_eq!(inner.parent_id.as_ref(), Some(&outer.id));

        let (_, orphan) = ledger
            .start_span(&tx.id, "cache.get", Some(&SpanId::from("ghost")), Tags::new())
            .unwrap();
        assert!(orphan.parent_id.is_none());

        clock.advance(Duration::from_millis(40));
        let (snapshot, closed) = ledger
            .end_span(&tx.id, &outer.id, Outcome::Failed, Some("timeout".into()))
            .unwrap();
        assert_eq!(closed.duration, Some(40));
        assert_eq!(closed.status, OperationStatus::Failed);
        assert_eq!(closed.error.as_deref(), Some("timeout"));
        assert_eq!(snapshot.spans.len(), 3);
        assert_eq!(snapshot.open_spans(), 2);
    }

    #[test]
    fn test_evicts_oldest_by_start_time() {
        let limits = LedgerLimits {
            max_transactions: 1000,
            ..LedgerLimits::default()
        };
        let (ledger, clock) = ledger_with(limits);

        let first = ledger.start_transaction("tx-0", Tags::new());
        let mut last = first.clone();
        for i in 1..=1000 {
            clock.advance(Duration::from_millis(1));
            last = ledger.start_transaction(&format!("tx-{}", i), Tags::new());
        }

        assert_eq!(ledger.transaction_count(), 1000);
        assert!(ledger.transaction(&first.id).is_none());
        assert!(ledger.transaction(&last.id).is_some());
        assert_eq!(ledger.transactions()[0].name, "tx-1");
    }

    #[test]
    fn test_eviction_ties_broken_by_insertion_order() {
        let limits = LedgerLimits {
            max_transactions: 2,
            ..LedgerLimits::default()
        };
        let (ledger, _) = ledger_with(limits);
        let a = ledger.start_transaction("a", Tags::new());
        let b = ledger.start_transaction("b", Tags::new());
        let c = ledger.start_transaction("c", Tags::new());

        assert!(ledger.transaction(&a.id).is_none());
        assert!(ledger.transaction(&b.id).is_some());
        assert!(ledger.transaction(&c.id).is_some());
    }

    #[test]
    fn test_open_transaction_reports_evicted() {
        let limits = LedgerLimits {
            max_transactions: 2,
            ..LedgerLimits::default()
        };
        let (ledger, clock) = ledger_with(limits);
        let (a, none) = ledger.open_transaction("a", Tags::new());
        assert!(none.is_empty());
        clock.advance(Duration::from_millis(1));
        ledger.open_transaction("b", Tags::new());
        // Older start time than `a`, so it is the first to go.
        clock.set(0);
        let (_, evicted) = ledger.open_transaction("early", Tags::new());
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].name, "early");
        assert!(ledger.transaction(&a.id).is_some());

        clock.set(2_000_000);
        let (_, evicted) = ledger.open_transaction("c", Tags::new());
        assert_eq!(evicted[0].id, a.id);
        assert_eq!(ledger.transaction_count(), 2);
    }

    #[test]
    fn test_metrics_are_bounded_and_stamped() {
        let limits = LedgerLimits {
            max_metrics: 3,
            ..LedgerLimits::default()
        };
        let (ledger, clock) = ledger_with(limits);
        for i in 0..5 {
            clock.advance(Duration::from_millis(1));
            ledger.record_metric(Metric::new(
                format!("m{}", i),
                i as f64,
                MetricUnit::Count,
                MetricCategory::User,
            ));
        }

        let names: Vec<_> = ledger.metrics().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["m2", "m3", "m4"]);
        assert_eq!(ledger.metrics()[2].timestamp, 1_000_005);
    }

    #[test]
    fn test_performance_summary() {
        let (ledger, clock) = ledger_with(LedgerLimits::default());

        let empty = ledger.performance_summary();
        assert_eq!(empty.total_transactions, 0);
        assert_eq!(empty.error_rate, 0.0);
        assert_eq!(empty.average_duration, 0.0);

        for (duration, outcome) in [
            (100, Outcome::Completed),
            (1500, Outcome::Completed),
            (200, Outcome::Failed),
            (400, Outcome::Completed),
        ] {
            let tx = ledger.start_transaction("op", Tags::new());
            clock.advance(Duration::from_millis(duration));
            ledger.end_transaction(&tx.id, outcome, None).unwrap();
        }
        ledger.start_transaction("still-running", Tags::new());

        let summary = ledger.performance_summary();
        assert_eq!(summary.total_transactions, 4);
        assert_eq!(summary.pending_transactions, 1);
        assert_eq!(summary.slow_transactions, 1);
        assert_eq!(summary.average_duration, 550.0);
        assert_eq!(summary.error_rate, 25.0);
    }

    #[test]
    fn test_clear() {
        let (ledger, _) = ledger_with(LedgerLimits::default());
        ledger.start_transaction("op", Tags::new());
        ledger.record_metric(Metric::technical("x"));
        let drained = ledger.clear();
        assert_eq!(drained.len(), 1);
        assert_eq!(ledger.transaction_count(), 0);
        assert!(ledger.metrics().is_empty());
    }
}
