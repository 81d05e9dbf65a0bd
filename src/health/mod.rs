//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! /health, /ready, /live handlers
//!     → aggregator.rs
//!         → cache hit (younger than TTL)? reuse
//!         → otherwise spawn probe, race against timeout
//!     → worst status wins (types.rs)
//!
//! Probes (probes.rs):
//!     database, cache, api_<name>, system, generation
//! ```
//!
//! # Design Decisions
//! - A probe never raises: errors, panics and timeouts become `unhealthy`
//! - Readiness only consults the critical probes; liveness consults none
//! - Probes are replaceable at runtime by name

pub mod aggregator;
pub mod probes;
pub mod types;

pub use aggregator::HealthAggregator;
pub use types::{
    HealthCheck, HealthProbe, HealthStatus, Liveness, ProbeError, ProbeReport, Readiness,
    SystemHealth,
};
