use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::{BytesRejection, JsonRejection};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use facegate::{ImageError, ProviderError};
use serde::{Deserialize, Serialize};
use std::error::Error as _;

pub type ServerResult<T> = Result<T, ServerError>;

pub const CREDENTIALS_MESSAGE: &str = "Provider credentials not configured or invalid on server";
const INTERNAL_MESSAGE: &str = "Internal server error";

/// Server error types
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("Missing or invalid API key")]
    Unauthorized,

    #[error("Too many requests, please try again later.")]
    RateLimited { limit: u32, reset_secs: u64 },

    #[error("Route not found")]
    NotFound,

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// API error response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub message: String,
}

/// Everything known about a failed request, attached to the response so the
/// normalization middleware can log it and, outside production, expose it.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub status: StatusCode,
    pub name: String,
    pub message: String,
    pub details: String,
    pub chain: Vec<String>,
    pub provider_status: Option<u16>,
}

impl ServerError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::Unauthorized => StatusCode::UNAUTHORIZED,
            ServerError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ServerError::NotFound => StatusCode::NOT_FOUND,
            ServerError::Image(ImageError::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::Image(_) => StatusCode::BAD_REQUEST,
            ServerError::Provider(ProviderError::Credentials { .. }) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ServerError::Provider(err) => err
                .upstream_status()
                .filter(|status| (400..600).contains(status))
                .and_then(|status| StatusCode::from_u16(status).ok())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }

    /// Get error code string
    pub fn error_code(&self) -> String {
        match self {
            ServerError::BadRequest(_) => "bad_request".into(),
            ServerError::PayloadTooLarge(_) => "payload_too_large".into(),
            ServerError::Unauthorized => "unauthorized".into(),
            ServerError::RateLimited { .. } => "rate_limited".into(),
            ServerError::NotFound => "not_found".into(),
            ServerError::Image(err) => err.kind().into(),
            ServerError::Provider(err) => err.kind().into(),
        }
    }

    /// Message safe to show to any client
    pub fn client_message(&self) -> String {
        let status = self.status_code();
        match self {
            ServerError::Provider(ProviderError::Credentials { .. }) => {
                CREDENTIALS_MESSAGE.to_string()
            }
            _ if status == StatusCode::INTERNAL_SERVER_ERROR => INTERNAL_MESSAGE.to_string(),
            ServerError::Provider(ProviderError::Service { message, .. }) => message.clone(),
            other => other.to_string(),
        }
    }

    pub fn report(&self) -> ErrorReport {
        let mut chain = vec![self.to_string()];
        let mut source = self.source();
        while let Some(err) = source {
            chain.push(err.to_string());
            source = err.source();
        }
        ErrorReport {
            status: self.status_code(),
            name: self.error_code(),
            message: self.client_message(),
            details: self.to_string(),
            chain,
            provider_status: match self {
                ServerError::Provider(err) => err.upstream_status(),
                _ => None,
            },
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let report = self.report();
        let body = Json(ErrorResponse {
            success: false,
            error: report.name.clone(),
            message: report.message.clone(),
        });

        let mut response = (report.status, body).into_response();
        if let ServerError::RateLimited { limit, reset_secs } = self {
            let headers = response.headers_mut();
            headers.insert("retry-after", HeaderValue::from(reset_secs));
            if let Ok(value) = HeaderValue::from_str(&format!("{limit};w=60")) {
                headers.insert("ratelimit-policy", value);
            }
            if let Ok(value) =
                HeaderValue::from_str(&format!("limit={limit}, remaining=0, reset={reset_secs}"))
            {
                headers.insert("ratelimit", value);
            }
        }
        response.extensions_mut().insert(report);
        response
    }
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ServerError::PayloadTooLarge(rejection.body_text())
        } else {
            ServerError::BadRequest(rejection.body_text())
        }
    }
}

impl From<BytesRejection> for ServerError {
    fn from(rejection: BytesRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ServerError::PayloadTooLarge(rejection.body_text())
        } else {
            ServerError::BadRequest(rejection.body_text())
        }
    }
}

impl From<MultipartRejection> for ServerError {
    fn from(rejection: MultipartRejection) -> Self {
        ServerError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartError> for ServerError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ServerError::PayloadTooLarge(err.body_text())
        } else {
            ServerError::BadRequest(err.body_text())
        }
    }
}

impl From<serde_json::Error> for ServerError {
    fn from(err: serde_json::Error) -> Self {
        ServerError::BadRequest(format!("JSON parse error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(status: Option<u16>) -> ServerError {
        ServerError::Provider(ProviderError::Service {
            operation: "IndexFaces",
            code: Some("InvalidParameterException".into()),
            message: "Request has invalid parameters".into(),
            status,
        })
    }

    #[test]
    fn validation_errors_map_to_client_statuses() {
        assert_eq!(
            ServerError::Image(ImageError::Empty).status_code(),
            StatusCode::BAD_REQUEST
        );
        let too_large = ServerError::Image(ImageError::TooLarge { size: 9, max: 8 });
        assert_eq!(too_large.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(too_large.error_code(), "payload_too_large");
        assert_eq!(ServerError::NotFound.error_code(), "not_found");
        assert_eq!(ServerError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn provider_status_passes_through() {
        let err = service(Some(400));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error_code(), "InvalidParameterException");
        assert_eq!(err.client_message(), "Request has invalid parameters");
        assert_eq!(err.report().provider_status, Some(400));
    }

    #[test]
    fn provider_without_usable_status_is_internal() {
        for status in [None, Some(200), Some(302)] {
            let err = service(status);
            assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(err.client_message(), "Internal server error");
        }
    }

    #[test]
    fn credentials_are_masked() {
        let err = ServerError::Provider(ProviderError::Credentials {
            detail: "no providers in chain: env, profile, imds".into(),
        });
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.client_message(), CREDENTIALS_MESSAGE);
        let report = err.report();
        assert!(report.details.contains("no providers in chain"));
        assert!(!report.message.contains("imds"));
    }

    #[test]
    fn transport_errors_hide_detail_from_clients() {
        let err = ServerError::Provider(ProviderError::Transport {
            operation: "SearchFacesByImage",
            message: "dns error: failed to lookup rekognition.internal.example".into(),
        });
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.error_code(), "provider_unreachable");
        assert_eq!(err.client_message(), "Internal server error");
        assert!(err.report().details.contains("dns error"));
        assert_eq!(err.report().provider_status, None);
    }

    #[test]
    fn rate_limited_response_carries_retry_headers() {
        let response = ServerError::RateLimited {
            limit: 120,
            reset_secs: 42,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["retry-after"], "42");
        assert_eq!(response.headers()["ratelimit-policy"], "120;w=60");
        assert!(response.extensions().get::<ErrorReport>().is_some());
    }
}
