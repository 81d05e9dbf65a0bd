//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, timeout, trace layer)
//!     → middleware/apm.rs (API routes: one ledger transaction per request)
//!     → handlers.rs
//!         → health aggregator (/health, /ready, /live)
//!         → correlator + portfolio store (/api/portfolios)
//!     → response.rs (no-cache health responses, API errors)
//!     → Send to client
//! ```

pub mod handlers;
pub mod middleware;
pub mod response;
pub mod server;

pub use response::ApiError;
pub use server::{build_router, AppState, HttpServer};
