//! One user's journey as a stream of analytics events.

use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::Instant;
use uuid::Uuid;

use crate::apm::clock::Clock;
use crate::apm::scope;
use crate::correlation::analytics::{AnalyticsClient, AnalyticsEvent};

/// Stamps events with the session id, elapsed time and ambient trace id.
pub struct CorrelatedSession {
    id: String,
    user_id: Option<String>,
    started: Instant,
    started_at: u64,
    events: AtomicU64,
    clock: Arc<dyn Clock>,
    analytics: Arc<dyn AnalyticsClient>,
}

impl CorrelatedSession {
    pub(crate) fn new(
        user_id: Option<String>,
        clock: Arc<dyn Clock>,
        analytics: Arc<dyn AnalyticsClient>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            started: Instant::now(),
            started_at: clock.now_millis(),
            events: AtomicU64::new(0),
            clock,
            analytics,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Epoch milliseconds at which the session started.
    pub fn started_at(&self) -> u64 {
        self.started_at
    }

    pub fn track_event(&self, name: &str, properties: Map<String, Value>) {
        self.events.fetch_add(1, Ordering::Relaxed);
        self.emit(name, properties);
    }

    /// Emit the terminal `session_ended` event.
    pub fn end(self) {
        let mut properties = Map::new();
        properties.insert(
            "event_count".to_string(),
            self.events.load(Ordering::Relaxed).into(),
        );
        self.emit("session_ended", properties);
    }

    fn emit(&self, name: &str, properties: Map<String, Value>) {
        let mut event = AnalyticsEvent::new(name, self.clock.now_millis())
            .with_distinct_id(self.user_id.clone())
            .with_property("session_id", self.id.clone())
            .with_property(
                "session_duration_ms",
                self.started.elapsed().as_millis() as u64,
            );
        if let Some(trace_id) = scope::current_trace_id() {
            event = event.with_property("trace_id", trace_id.to_string());
        }
        for (key, value) in properties {
            event.properties.entry(key).or_insert(value);
        }
        self.analytics.capture(event);
    }
}
