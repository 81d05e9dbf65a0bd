//! Response helpers and API errors.
//!
//! # Design Decisions
//! - Health responses are never cacheable
//! - Errors render as `{"error": "..."}` with a status derived from the variant

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::portfolio::GenerationError;

pub const NO_CACHE: &str = "no-cache, no-store, must-revalidate";

/// JSON response with caching disabled.
pub fn no_cache<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static(NO_CACHE));
    response
}

/// Errors returned by API handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("portfolio '{0}' not found")]
    PortfolioNotFound(String),

    #[error("health check '{0}' not found")]
    CheckNotFound(String),

    #[error("portfolio cannot be published: {0}")]
    Generation(#[from] GenerationError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::PortfolioNotFound(_) | ApiError::CheckNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Generation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
