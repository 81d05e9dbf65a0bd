//! Ledger records and identifiers.

use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Free-form string tags attached to transactions, spans and metrics.
pub type Tags = BTreeMap<String, String>;

macro_rules! ledger_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Allocate a fresh random identifier.
            pub fn generate() -> Self {
                Self(Uuid::new_v4().simple().to_string())
            }

            /// The empty identifier returned by no-op calls.
            pub fn none() -> Self {
                Self(String::new())
            }

            pub fn is_none(&self) -> bool {
                self.0.is_empty()
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

ledger_id!(
    /// Identifier of a [`Transaction`].
    TransactionId
);

ledger_id!(
    /// Identifier of a [`Span`], unique within its transaction.
    SpanId
);

/// 128-bit trace identifier shared by a transaction, its spans and correlated events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceId(u128);

impl TraceId {
    pub fn generate() -> Self {
        loop {
            let raw: u128 = rand::random();
            if raw != 0 {
                return Self(raw);
            }
        }
    }

    pub fn from_u128(raw: u128) -> Self {
        Self(raw)
    }

    pub fn to_bytes(self) -> [u8; 16] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl Serialize for TraceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Lifecycle state of a transaction or span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Pending,
    Completed,
    Failed,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Pending => "pending",
            OperationStatus::Completed => "completed",
            OperationStatus::Failed => "failed",
        }
    }
}

/// Terminal state requested when closing a transaction or span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Failed,
}

impl From<Outcome> for OperationStatus {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Completed => OperationStatus::Completed,
            Outcome::Failed => OperationStatus::Failed,
        }
    }
}

/// A sub-operation nested within a [`Transaction`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Span {
    pub id: SpanId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<SpanId>,
    pub operation: String,
    pub start_time: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    pub tags: Tags,
    pub status: OperationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Span {
    pub fn is_open(&self) -> bool {
        self.status == OperationStatus::Pending
    }
}

/// One logical traced operation with its child spans.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,
    pub trace_id: TraceId,
    pub name: String,
    pub start_time: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    pub status: OperationStatus,
    pub spans: Vec<Span>,
    pub metadata: Tags,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Insertion order, breaks start-time ties during eviction.
    #[serde(skip)]
    pub(crate) seq: u64,
}

impl Transaction {
    pub fn is_open(&self) -> bool {
        self.status == OperationStatus::Pending
    }

    pub fn span(&self, id: &SpanId) -> Option<&Span> {
        self.spans.iter().find(|s| &s.id == id)
    }

    /// Number of spans not yet closed.
    pub fn open_spans(&self) -> usize {
        self.spans.iter().filter(|s| s.is_open()).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricCategory {
    Performance,
    Business,
    Technical,
    User,
}

impl MetricCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricCategory::Performance => "performance",
            MetricCategory::Business => "business",
            MetricCategory::Technical => "technical",
            MetricCategory::User => "user",
        }
    }
}

/// Explicit classification of business metrics for export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BusinessKind {
    User,
    Revenue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricUnit {
    Milliseconds,
    Bytes,
    Count,
    Percent,
    Currency,
}

/// A single measurement retained by the ledger.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metric {
    pub name: String,
    pub value: f64,
    pub unit: MetricUnit,
    /// Epoch milliseconds, stamped by the ledger when recorded.
    pub timestamp: u64,
    pub tags: Tags,
    pub category: MetricCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_kind: Option<BusinessKind>,
}

impl Metric {
    pub fn new(
        name: impl Into<String>,
        value: f64,
        unit: MetricUnit,
        category: MetricCategory,
    ) -> Self {
        Self {
            name: name.into(),
            value,
            unit,
            timestamp: 0,
            tags: Tags::new(),
            category,
            business_kind: None,
        }
    }

    /// A duration measurement in milliseconds.
    pub fn performance(name: impl Into<String>, duration_ms: u64) -> Self {
        Self::new(name, duration_ms as f64, MetricUnit::Milliseconds, MetricCategory::Performance)
    }

    /// A business measurement with an explicit export classification.
    pub fn business(kind: BusinessKind, name: impl Into<String>, value: f64, unit: MetricUnit) -> Self {
        let mut metric = Self::new(name, value, unit, MetricCategory::Business);
        metric.business_kind = Some(kind);
        metric
    }

    /// A single occurrence of a technical problem.
    pub fn technical(name: impl Into<String>) -> Self {
        Self::new(name, 1.0, MetricUnit::Count, MetricCategory::Technical)
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// Aggregate view over all closed transactions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSummary {
    pub total_transactions: usize,
    pub average_duration: f64,
    pub slow_transactions: usize,
    pub error_rate: f64,
    pub pending_transactions: usize,
}

/// Errors raised inside the telemetry pipeline. Never surfaced to callers.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("unknown transaction {0}")]
    UnknownTransaction(TransactionId),

    #[error("unknown span {span} in transaction {transaction}")]
    UnknownSpan {
        transaction: TransactionId,
        span: SpanId,
    },

    #[error("transaction {0} is already closed")]
    TransactionClosed(TransactionId),

    #[error("sink {sink} failed: {message}")]
    Sink { sink: &'static str, message: String },
}

impl TelemetryError {
    /// Lookup misses are expected under best-effort telemetry.
    pub fn is_lookup_miss(&self) -> bool {
        matches!(
            self,
            TelemetryError::UnknownTransaction(_)
                | TelemetryError::UnknownSpan { .. }
                | TelemetryError::TransactionClosed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_and_none_is_empty() {
        let a = TransactionId::generate();
        let b = TransactionId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
        assert!(TransactionId::none().is_none());
        assert!(!SpanId::generate().is_none());
    }

    #[test]
    fn test_trace_id_renders_as_hex() {
        let id = TraceId::from_u128(0xabc);
        assert_eq!(id.to_string(), "00000000000000000000000000000abc");
        assert_eq!(serde_json::to_value(id).unwrap(), "00000000000000000000000000000abc");
        assert_eq!(id.to_bytes()[15], 0xbc);
    }

    #[test]
    fn test_metric_builders() {
        let m = Metric::business(BusinessKind::Revenue, "subscription", 19.0, MetricUnit::Currency)
            .with_tag("currency", "usd");
        assert_eq!(m.category, MetricCategory::Business);
        assert_eq!(m.business_kind, Some(BusinessKind::Revenue));
        assert_eq!(m.tags["currency"], "usd");

        let t = Metric::technical("portfolio_error");
        assert_eq!(t.value, 1.0);
        assert_eq!(t.unit, MetricUnit::Count);
    }

    #[test]
    fn test_transaction_serializes_camel_case() {
        let tx = Transaction {
            id: TransactionId::from("t1"),
            trace_id: TraceId::from_u128(1),
            name: "GET /api".into(),
            start_time: 10,
            end_time: Some(25),
            duration: Some(15),
            status: OperationStatus::Completed,
            spans: Vec::new(),
            metadata: Tags::new(),
            error: None,
            seq: 0,
        };
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["startTime"], 10);
        assert_eq!(json["status"], "completed");
        assert!(json.get("seq").is_none());
        assert!(json.get("error").is_none());
    }
}
