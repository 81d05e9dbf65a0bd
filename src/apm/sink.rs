//! Lifecycle sinks.
//!
//! The ledger is the single source of truth. After each mutation the [`Apm`]
//! context broadcasts a snapshot of the affected records to every registered
//! sink (OpenTelemetry, Prometheus, ...). Sinks keep only what they need to
//! export and never feed back into the ledger.
//!
//! [`Apm`]: crate::apm::Apm

use crate::apm::types::{Metric, Span, TelemetryError, Transaction};

/// Receiver of ledger lifecycle events. All methods default to no-ops.
pub trait TelemetrySink: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn on_transaction_start(&self, _transaction: &Transaction) -> Result<(), TelemetryError> {
        Ok(())
    }

    fn on_transaction_end(&self, _transaction: &Transaction) -> Result<(), TelemetryError> {
        Ok(())
    }

    fn on_span_start(&self, _transaction: &Transaction, _span: &Span) -> Result<(), TelemetryError> {
        Ok(())
    }

    fn on_span_end(&self, _transaction: &Transaction, _span: &Span) -> Result<(), TelemetryError> {
        Ok(())
    }

    /// The ledger dropped `transaction` to stay within capacity, or was cleared.
    /// No further events arrive for it or its spans.
    fn on_transaction_evicted(&self, _transaction: &Transaction) -> Result<(), TelemetryError> {
        Ok(())
    }

    fn on_metric(&self, _metric: &Metric) -> Result<(), TelemetryError> {
        Ok(())
    }
}
