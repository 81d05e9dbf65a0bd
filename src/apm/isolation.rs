//! Error isolation for best-effort telemetry.
//!
//! Every call into a sink goes through [`best_effort`]: errors and panics are
//! logged and dropped so that telemetry never changes the caller's control flow.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::apm::types::TelemetryError;

/// Run `f`, log any error or panic, and continue.
pub fn best_effort<F>(operation: &str, f: F)
where
    F: FnOnce() -> Result<(), TelemetryError>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => {}
        Ok(Err(e)) if e.is_lookup_miss() => {
            tracing::debug!(operation, error = %e, "Telemetry lookup miss ignored");
        }
        Ok(Err(e)) => {
            tracing::warn!(operation, error = %e, "Telemetry operation failed");
        }
        Err(payload) => {
            tracing::warn!(
                operation,
                panic = %panic_message(payload.as_ref()),
                "Telemetry operation panicked"
            );
        }
    }
}

/// Extract a readable message from a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
