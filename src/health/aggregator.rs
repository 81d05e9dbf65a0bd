//! Health probe registry and aggregation.
//!
//! # Responsibilities
//! - Keep the set of named probes (registration order preserved)
//! - Run probes concurrently with a per-probe deadline
//! - Cache each result for a fixed TTL
//! - Roll individual statuses up into one overall status
//!
//! # Design Decisions
//! - Each probe runs in its own task; a timed-out task is aborted, a
//!   panicking task is reported unhealthy
//! - Probe failures never escape as errors, they become health results
//! - Cache freshness uses tokio's clock so tests can pause time

use arc_swap::ArcSwap;
use dashmap::DashMap;
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant};

use crate::apm::clock::{Clock, SystemClock};
use crate::apm::isolation::panic_message;
use crate::config::HealthConfig;
use crate::health::types::{
    HealthCheck, HealthProbe, HealthStatus, Liveness, ProbeReport, Readiness, SystemHealth,
};
use crate::observability::metrics;

/// Message reported for probes that miss their deadline.
pub const TIMEOUT_MESSAGE: &str = "Health check timeout";

#[derive(Clone)]
struct RegisteredProbe {
    name: String,
    probe: Arc<dyn HealthProbe>,
}

struct CachedCheck {
    check: HealthCheck,
    at: Instant,
}

/// Registry of named probes with cached, time-bounded execution.
pub struct HealthAggregator {
    probes: ArcSwap<Vec<RegisteredProbe>>,
    cache: DashMap<String, CachedCheck>,
    cache_ttl: Duration,
    probe_timeout: Duration,
    critical: Vec<String>,
    clock: Arc<dyn Clock>,
    started: Instant,
    version: String,
}

impl HealthAggregator {
    /// Empty registry. Startup time is taken now.
    pub fn new(config: &HealthConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &HealthConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            probes: ArcSwap::from_pointee(Vec::new()),
            cache: DashMap::new(),
            cache_ttl: Duration::from_secs(config.cache_ttl_secs),
            probe_timeout: Duration::from_secs(config.probe_timeout_secs),
            critical: config.critical_checks.clone(),
            clock,
            started: Instant::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Add or replace a probe. Any cached result under this name is dropped.
    pub fn register_check<P: HealthProbe>(&self, name: &str, probe: P) {
        let entry = RegisteredProbe {
            name: name.to_string(),
            probe: Arc::new(probe),
        };
        self.probes.rcu(|current| {
            let mut next: Vec<RegisteredProbe> = (**current).clone();
            match next.iter_mut().find(|p| p.name == name) {
                Some(existing) => *existing = entry.clone(),
                None => next.push(entry.clone()),
            }
            next
        });
        self.cache.remove(name);
        tracing::debug!(check = name, "Health check registered");
    }

    /// Remove a probe. Returns false if it was not registered.
    pub fn remove_check(&self, name: &str) -> bool {
        let mut removed = false;
        self.probes.rcu(|current| {
            removed = current.iter().any(|p| p.name == name);
            current
                .iter()
                .filter(|p| p.name != name)
                .cloned()
                .collect::<Vec<_>>()
        });
        self.cache.remove(name);
        removed
    }

    pub fn check_names(&self) -> Vec<String> {
        self.probes.load().iter().map(|p| p.name.clone()).collect()
    }

    /// Forget every cached result.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Run every probe (or reuse fresh cached results) and roll up the status.
    pub async fn run_all_checks(&self) -> SystemHealth {
        let probes = self.probes.load_full();
        let checks = join_all(probes.iter().map(|p| self.cached_or_run(p))).await;
        let overall = HealthStatus::rollup(checks.iter().map(|c| c.status));
        metrics::record_overall_health(overall);

        SystemHealth {
            overall,
            checks,
            timestamp: self.clock.now_millis(),
            uptime: self.uptime_secs(),
            version: self.version.clone(),
        }
    }

    /// Run one named probe without aggregation. `None` if not registered.
    pub async fn run_check(&self, name: &str) -> Option<HealthCheck> {
        let probe = self.find(name)?;
        Some(self.cached_or_run(&probe).await)
    }

    /// Readiness over the critical probes only.
    pub async fn readiness(&self) -> Readiness {
        let probes = self.probes.load_full();
        let critical = probes
            .iter()
            .filter(|p| self.critical.iter().any(|c| c == &p.name));
        let checks = join_all(critical.map(|p| self.cached_or_run(p))).await;
        let ready = HealthStatus::rollup(checks.iter().map(|c| c.status)).is_ready();

        Readiness {
            ready,
            checks,
            timestamp: self.clock.now_millis(),
        }
    }

    /// Liveness does no probe work.
    pub fn liveness(&self) -> Liveness {
        Liveness {
            alive: true,
            timestamp: self.clock.now_millis(),
            uptime: self.uptime_secs(),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    fn find(&self, name: &str) -> Option<RegisteredProbe> {
        self.probes.load().iter().find(|p| p.name == name).cloned()
    }

    async fn cached_or_run(&self, registered: &RegisteredProbe) -> HealthCheck {
        if let Some(cached) = self.cache.get(&registered.name) {
            if cached.at.elapsed() < self.cache_ttl {
                return cached.check.clone();
            }
        }

        let check = self.execute(registered).await;
        self.cache.insert(
            registered.name.clone(),
            CachedCheck {
                check: check.clone(),
                at: Instant::now(),
            },
        );
        check
    }

    async fn execute(&self, registered: &RegisteredProbe) -> HealthCheck {
        let started = Instant::now();
        let mut task = tokio::spawn(registered.probe.check());

        let report = match time::timeout(self.probe_timeout, &mut task).await {
            Ok(Ok(Ok(report))) => report,
            Ok(Ok(Err(e))) => ProbeReport::unhealthy(e.to_string()),
            Ok(Err(join_err)) if join_err.is_panic() => {
                ProbeReport::unhealthy(panic_message(join_err.into_panic().as_ref()))
            }
            Ok(Err(_)) => ProbeReport::unhealthy("Health check cancelled"),
            Err(_) => {
                task.abort();
                ProbeReport::unhealthy(TIMEOUT_MESSAGE)
            }
        };
        let elapsed = started.elapsed();

        if report.status != HealthStatus::Healthy {
            tracing::warn!(
                check = %registered.name,
                status = report.status.as_str(),
                message = report.message.as_deref().unwrap_or(""),
                elapsed_ms = elapsed.as_millis() as u64,
                "Health check not healthy"
            );
        }
        metrics::record_probe(&registered.name, report.status, elapsed);

        HealthCheck {
            name: registered.name.clone(),
            status: report.status,
            message: report.message,
            last_check: self.clock.now_millis(),
            response_time: Some(elapsed.as_millis() as u64),
            metadata: report.metadata,
        }
    }
}
