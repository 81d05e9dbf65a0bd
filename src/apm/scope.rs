//! Ambient trace scope for the currently tracked task.

use std::future::Future;

use crate::apm::types::{SpanId, TraceId, TransactionId};

tokio::task_local! {
    static CURRENT: TraceScope;
}

/// The transaction (and innermost span, if any) a task is currently running under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceScope {
    pub transaction_id: TransactionId,
    pub trace_id: TraceId,
    pub span_id: Option<SpanId>,
}

impl TraceScope {
    /// The same transaction, narrowed to `span_id`.
    pub fn child(&self, span_id: SpanId) -> Self {
        Self {
            span_id: Some(span_id),
            ..self.clone()
        }
    }
}

/// Scope of the calling task, if it runs inside a tracked operation.
pub fn current() -> Option<TraceScope> {
    CURRENT.try_with(Clone::clone).ok()
}

/// Trace id of the calling task, if any.
pub fn current_trace_id() -> Option<TraceId> {
    CURRENT.try_with(|scope| scope.trace_id).ok()
}

/// Run `fut` with `scope` as its ambient trace scope.
pub async fn within<F: Future>(scope: TraceScope, fut: F) -> F::Output {
    CURRENT.scope(scope, fut).await
}
