//! HTTP boundary
//!
//! The SPARQL 1.1 protocol endpoint plus the store management routes
//! (branching, merging, pulling, blame, commit log). Every error kind
//! maps to exactly one status code.

mod handler;
mod server;

pub use server::HttpServer;

use crate::error::QuitError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

impl IntoResponse for QuitError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = match &self {
            QuitError::MergeConflict(report) => json!({
                "error": self.to_string(),
                "conflicts": report,
            }),
            other => json!({ "error": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
