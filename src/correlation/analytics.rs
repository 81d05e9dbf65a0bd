//! Analytics event capture.
//!
//! Capture is fire-and-forget: clients never report errors to the caller.

use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::{Mutex, PoisonError};
use tokio::runtime::Handle;

use crate::config::AnalyticsConfig;

/// One product analytics event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsEvent {
    pub event: String,
    /// User the event is attributed to, if known.
    pub distinct_id: Option<String>,
    pub properties: Map<String, Value>,
    /// Epoch milliseconds.
    pub timestamp: u64,
}

impl AnalyticsEvent {
    pub fn new(event: impl Into<String>, timestamp: u64) -> Self {
        Self {
            event: event.into(),
            distinct_id: None,
            properties: Map::new(),
            timestamp,
        }
    }

    pub fn with_distinct_id(mut self, id: Option<String>) -> Self {
        self.distinct_id = id;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

/// Destination for analytics events.
pub trait AnalyticsClient: Send + Sync {
    fn capture(&self, event: AnalyticsEvent);
}

/// Writes every event as a structured log line.
#[derive(Debug, Default)]
pub struct LogAnalytics;

impl AnalyticsClient for LogAnalytics {
    fn capture(&self, event: AnalyticsEvent) {
        tracing::info!(
            target: "analytics",
            event = %event.event,
            distinct_id = event.distinct_id.as_deref().unwrap_or("anonymous"),
            properties = %serde_json::Value::Object(event.properties),
            "Analytics event"
        );
    }
}

/// Posts events to a PostHog-compatible `/capture/` endpoint.
pub struct HttpAnalytics {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpAnalytics {
    pub fn new(config: &AnalyticsConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/capture/", config.host.trim_end_matches('/')),
            api_key: config.api_key.clone(),
        })
    }

    fn payload(&self, event: AnalyticsEvent) -> Value {
        json!({
            "api_key": self.api_key,
            "event": event.event,
            "distinct_id": event.distinct_id.unwrap_or_else(|| "anonymous".to_string()),
            "properties": event.properties,
            "timestamp": event.timestamp,
        })
    }
}

impl AnalyticsClient for HttpAnalytics {
    fn capture(&self, event: AnalyticsEvent) {
        let name = event.event.clone();
        let Ok(handle) = Handle::try_current() else {
            tracing::warn!(event = %name, "No runtime available, analytics event dropped");
            return;
        };

        let request = self.client.post(&self.endpoint).json(&self.payload(event));
        handle.spawn(async move {
            match request.send().await {
                Ok(response) if !response.status().is_success() => {
                    tracing::warn!(event = %name, status = %response.status(), "Analytics capture rejected");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(event = %name, error = %e, "Analytics capture failed");
                }
            }
        });
    }
}

/// Keeps events in memory.
#[derive(Debug, Default)]
pub struct MemoryAnalytics {
    events: Mutex<Vec<AnalyticsEvent>>,
}

impl MemoryAnalytics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AnalyticsEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Events with the given name, oldest first.
    pub fn named(&self, event: &str) -> Vec<AnalyticsEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.event == event)
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl AnalyticsClient for MemoryAnalytics {
    fn capture(&self, event: AnalyticsEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
