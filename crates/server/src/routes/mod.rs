//! API route handlers
//!
//! Routes are organized by functionality:
//!
//! - `health`: liveness
//! - `collection`: collection management
//! - `faces`: index, search, compare and delete faces
//! - `upload`: multipart form reading shared by the upload routes

pub mod collection;
pub mod faces;
pub mod health;
pub mod upload;

use crate::error::{ServerError, ServerResult};
use axum::extract::FromRequest;
use facegate::DEFAULT_THRESHOLD;
use serde::Deserialize;

/// JSON body extractor whose rejections go through [`ServerError`]
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ServerError))]
pub struct ApiJson<T>(pub T);

/// A threshold as clients send it: a JSON number or a numeric string
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ThresholdInput {
    Number(f64),
    Text(String),
}

/// Resolve an optional threshold, defaulting to 80 when absent or blank
pub fn resolve_threshold(input: Option<&ThresholdInput>) -> ServerResult<f32> {
    let value = match input {
        None => return Ok(DEFAULT_THRESHOLD),
        Some(ThresholdInput::Number(n)) => *n,
        Some(ThresholdInput::Text(text)) => {
            let text = text.trim();
            if text.is_empty() {
                return Ok(DEFAULT_THRESHOLD);
            }
            text.parse::<f64>().map_err(|_| {
                ServerError::BadRequest(format!("threshold must be a number, got {text:?}"))
            })?
        }
    };

    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(ServerError::BadRequest(
            "threshold must be between 0 and 100".to_string(),
        ));
    }
    Ok(value as f32)
}

/// A required, non-blank string field, passed on exactly as sent
pub fn required_field<'a>(value: Option<&'a str>, name: &str) -> ServerResult<&'a str> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ServerError::BadRequest(format!("{name} is required"))),
    }
}

/// 404 Not Found handler
///
/// Returns a standardized error response for undefined routes.
pub async fn not_found() -> ServerError {
    ServerError::NotFound
}
