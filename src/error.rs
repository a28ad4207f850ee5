//! Error types produced by the facegate crate.
//!
//! Two closed enums cover everything that can go wrong before and during a
//! provider call:
//!
//! | Error | Category | Description |
//! |-------|----------|-------------|
//! | [`ImageError`] | Validation | Image missing, empty, undecodable or over the ceiling |
//! | [`ProviderError`] | Upstream | The face-recognition provider rejected or failed a call |
//!
//! Both expose a stable `kind()` string so HTTP layers can map them without
//! string matching on messages.

use thiserror::Error;

/// Validation failures for an incoming image buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    /// No image was supplied at all.
    #[error("image is required")]
    Missing,
    /// An image was supplied but decoded to zero bytes.
    #[error("image is empty")]
    Empty,
    /// The base64 payload could not be decoded.
    #[error("image is not valid base64: {0}")]
    InvalidEncoding(String),
    /// The decoded image exceeds the configured ceiling.
    #[error("image too large ({size} bytes, max {max} bytes)")]
    TooLarge { size: usize, max: usize },
}

impl ImageError {
    pub fn kind(&self) -> &'static str {
        match self {
            ImageError::TooLarge { .. } => "payload_too_large",
            ImageError::Missing | ImageError::Empty | ImageError::InvalidEncoding(_) => {
                "bad_request"
            }
        }
    }
}

/// Failures surfaced by a [`FaceProvider`](crate::FaceProvider).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    /// The collection being created already exists.
    #[error("collection already exists: {0}")]
    AlreadyExists(String),

    /// Credentials are missing, expired or rejected. `detail` is for server
    /// logs only.
    #[error("provider credentials not configured or invalid: {detail}")]
    Credentials { detail: String },

    /// The provider answered with an error.
    #[error("{operation} failed: {message}")]
    Service {
        operation: &'static str,
        code: Option<String>,
        message: String,
        status: Option<u16>,
    },

    /// The request never produced a provider answer (network, timeout,
    /// request construction).
    #[error("{operation} transport failure: {message}")]
    Transport {
        operation: &'static str,
        message: String,
    },
}

impl ProviderError {
    /// Short machine-readable name for this failure.
    ///
    /// Service errors report the provider's own error code when it sent one.
    pub fn kind(&self) -> &str {
        match self {
            ProviderError::AlreadyExists(_) => "already_exists",
            ProviderError::Credentials { .. } => "credentials_unavailable",
            ProviderError::Service { code, .. } => code.as_deref().unwrap_or("provider_error"),
            ProviderError::Transport { .. } => "provider_unreachable",
        }
    }

    /// HTTP status the provider attached to its answer, if any.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            ProviderError::Service { status, .. } => *status,
            _ => None,
        }
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, ProviderError::AlreadyExists(_))
    }
}
