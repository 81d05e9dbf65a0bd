//! APM Tracking Middleware.
//! Runs each request as one ledger transaction.

use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use std::fmt;
use std::time::Instant;

use crate::apm::Tags;
use crate::http::server::AppState;
use crate::observability::metrics;

/// A response the handler produced but the ledger treats as a failure.
struct ServerError(Response);

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}", self.0.status())
    }
}

/// Track the request as a transaction named `<METHOD> <route>`.
///
/// 5xx responses close the transaction as failed. The response itself is
/// returned untouched.
pub async fn apm_tracking(State(state): State<AppState>, req: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let mut metadata = Tags::new();
    metadata.insert("http.method".to_string(), method.clone());
    metadata.insert("http.route".to_string(), route.clone());
    metadata.insert("http.target".to_string(), req.uri().path().to_string());
    if let Some(request_id) = req.headers().get("x-request-id").and_then(|v| v.to_str().ok()) {
        metadata.insert("request_id".to_string(), request_id.to_string());
    }

    let name = format!("{} {}", method, route);
    let outcome = state
        .apm
        .track(&name, metadata, async move {
            let response = next.run(req).await;
            if response.status().is_server_error() {
                Err(ServerError(response))
            } else {
                Ok(response)
            }
        })
        .await;

    let response = match outcome {
        Ok(response) => response,
        Err(ServerError(response)) => response,
    };
    metrics::record_request(&method, &route, response.status().as_u16(), start);
    response
}
