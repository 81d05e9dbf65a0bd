//! Trace and analytics correlation.
//!
//! # Data Flow
//! ```text
//! Correlator::{user_action, portfolio, ai, revenue, event}(work)
//!     → child span of the ambient transaction (or a new transaction)
//!     → run work, timed on a monotonic clock
//!     → close span OK / ERROR
//!     → failure: `<kind>_error` technical metric
//!     → success: business metric (user actions, revenue)
//!     → analytics.rs event { trace_id, duration_ms, success, error? }
//!
//! CorrelatedSession (session.rs):
//!     track_event → event stamped with session id, elapsed, trace id
//!     end         → session_ended
//! ```
//!
//! # Design Decisions
//! - The work's result is returned unchanged; nothing is retried here
//! - Nested helpers become children of the innermost open span
//! - Dropping the returned future fails its span or transaction as cancelled
//! - Timing is measured independently of the span so analytics still get a
//!   duration when tracking is disabled

pub mod analytics;
pub mod session;

use serde_json::{Map, Value};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;

use crate::apm::scope::{self, TraceScope};
use crate::apm::{Apm, BusinessKind, CancelGuard, Metric, MetricUnit, Outcome, SpanId, Tags};
use crate::config::AnalyticsConfig;

pub use analytics::{AnalyticsClient, AnalyticsEvent, HttpAnalytics, LogAnalytics, MemoryAnalytics};
pub use session::CorrelatedSession;

/// Build the analytics client selected by configuration.
pub fn build_analytics(config: &AnalyticsConfig) -> Result<Arc<dyn AnalyticsClient>, reqwest::Error> {
    if config.enabled {
        tracing::info!(host = %config.host, "Analytics capture enabled");
        Ok(Arc::new(HttpAnalytics::new(config)?))
    } else {
        Ok(Arc::new(LogAnalytics))
    }
}

struct Operation {
    kind: &'static str,
    span_name: String,
    event: String,
    distinct_id: Option<String>,
    attributes: Tags,
    properties: Map<String, Value>,
}

impl Operation {
    fn new(kind: &'static str, name: &str, event: String) -> Self {
        Self {
            kind,
            span_name: format!("{}.{}", kind, name),
            event,
            distinct_id: None,
            attributes: Tags::new(),
            properties: Map::new(),
        }
    }

    fn attribute(mut self, key: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }
}

/// Wraps units of work in a span and an analytics event sharing one trace id.
#[derive(Clone)]
pub struct Correlator {
    apm: Arc<Apm>,
    analytics: Arc<dyn AnalyticsClient>,
}

impl Correlator {
    pub fn new(apm: Arc<Apm>, analytics: Arc<dyn AnalyticsClient>) -> Self {
        Self { apm, analytics }
    }

    pub fn apm(&self) -> &Arc<Apm> {
        &self.apm
    }

    /// A user-initiated action. Success counts as a user business metric.
    pub async fn user_action<F, T, E>(&self, action: &str, user_id: Option<&str>, work: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut op = Operation::new("user_action", action, action.to_string()).attribute("action", action);
        if let Some(user_id) = user_id {
            op = op.attribute("user.id", user_id);
            op.distinct_id = Some(user_id.to_string());
        }

        let result = self.run(op, work).await;
        if result.is_ok() {
            self.apm.record_metric(
                Metric::business(BusinessKind::User, action, 1.0, MetricUnit::Count)
                    .with_tag("action", action),
            );
        }
        result
    }

    /// A create/read/update/publish operation on one portfolio.
    pub async fn portfolio<F, T, E>(&self, operation: &str, portfolio_id: &str, work: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: Display,
    {
        let op = Operation::new("portfolio", operation, format!("portfolio_{}", operation))
            .attribute("portfolio.id", portfolio_id)
            .attribute("portfolio.operation", operation);
        self.run(op, work).await
    }

    /// A call to an AI model.
    pub async fn ai<F, T, E>(&self, operation: &str, model: &str, work: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: Display,
    {
        let op = Operation::new("ai", operation, format!("ai_{}", operation))
            .attribute("ai.operation", operation)
            .attribute("ai.model", model);
        self.run(op, work).await
    }

    /// A revenue event. Success records the amount as a revenue metric.
    pub async fn revenue<F, T, E>(
        &self,
        event: &str,
        amount: f64,
        currency: &str,
        user_id: Option<&str>,
        work: F,
    ) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut op = Operation::new("revenue", event, event.to_string())
            .attribute("revenue.currency", currency)
            .attribute("revenue.amount", amount.to_string());
        op.distinct_id = user_id.map(str::to_string);
        op.properties.insert("amount".to_string(), amount.into());

        let result = self.run(op, work).await;
        if result.is_ok() {
            self.apm.record_metric(
                Metric::business(BusinessKind::Revenue, event, amount, MetricUnit::Currency)
                    .with_tag("currency", currency),
            );
        }
        result
    }

    /// Any other named unit of work.
    pub async fn event<F, T, E>(&self, name: &str, properties: Map<String, Value>, work: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut op = Operation::new("event", name, name.to_string());
        op.properties = properties;
        self.run(op, work).await
    }

    /// Start a session for one user's journey.
    pub fn session(&self, user_id: Option<String>) -> CorrelatedSession {
        CorrelatedSession::new(user_id, self.apm.ledger().clock(), self.analytics.clone())
    }

    async fn run<F, T, E>(&self, op: Operation, work: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: Display,
    {
        let ambient = scope::current();
        let owns_transaction = ambient.is_none();
        let (transaction_id, span_id, inner_scope) = match &ambient {
            Some(ambient) => {
                let span = self.apm.start_span(
                    &ambient.transaction_id,
                    &op.span_name,
                    ambient.span_id.as_ref(),
                    op.attributes.clone(),
                );
                let inner = (!span.is_none()).then(|| ambient.child(span.clone()));
                (ambient.transaction_id.clone(), span, inner)
            }
            None => {
                let tx = self.apm.start_transaction(&op.span_name, op.attributes.clone());
                let inner = self.apm.trace_id(&tx).map(|trace_id| TraceScope {
                    transaction_id: tx.clone(),
                    trace_id,
                    span_id: None,
                });
                (tx, SpanId::none(), inner)
            }
        };
        let trace_id = ambient
            .as_ref()
            .map(|a| a.trace_id)
            .or_else(|| inner_scope.as_ref().map(|s| s.trace_id));

        let guard = if owns_transaction {
            CancelGuard::transaction(&self.apm, transaction_id.clone())
        } else {
            CancelGuard::span(&self.apm, transaction_id.clone(), span_id.clone())
        };
        let started = Instant::now();
        let result = match inner_scope {
            Some(inner) => scope::within(inner, work).await,
            None => work.await,
        };
        guard.disarm();
        let duration_ms = started.elapsed().as_millis() as u64;

        let error = result.as_ref().err().map(|e| e.to_string());
        match (&error, owns_transaction) {
            (None, true) => self.apm.end_transaction(&transaction_id, Outcome::Completed),
            (None, false) => self.apm.end_span(&transaction_id, &span_id, Outcome::Completed),
            (Some(e), true) => self.apm.fail_transaction(&transaction_id, e),
            (Some(e), false) => self.apm.fail_span(&transaction_id, &span_id, e),
        }
        if error.is_some() {
            self.apm.record_metric(
                Metric::technical(format!("{}_error", op.kind)).with_tag("operation", op.span_name.clone()),
            );
        }

        let mut event = AnalyticsEvent::new(op.event, self.apm.ledger().now_millis())
            .with_distinct_id(op.distinct_id)
            .with_property("kind", op.kind)
            .with_property("duration_ms", duration_ms)
            .with_property("success", error.is_none());
        if let Some(trace_id) = trace_id {
            event = event.with_property("trace_id", trace_id.to_string());
        }
        if let Some(error) = error {
            event = event.with_property("error", error);
        }
        for (key, value) in op.attributes {
            event.properties.entry(key).or_insert(Value::String(value));
        }
        for (key, value) in op.properties {
            event.properties.entry(key).or_insert(value);
        }
        self.analytics.capture(event);

        result
    }
}
