//! facegate server - HTTP REST API over a cloud face-recognition provider
//!
//! This crate exposes the `facegate` face operations over HTTP:
//!
//! - **Collections**: idempotent collection creation
//! - **Enrolment**: index a face from a multipart upload or a base64 image
//! - **Search**: best match for a face at a similarity threshold
//! - **Compare / Delete**: direct comparison and face removal
//!
//! # Features
//!
//! - **Authentication**: optional shared API key, compared in constant time
//! - **Rate limiting**: fixed per-client window with draft-7 `RateLimit` headers
//! - **Middleware**: compression, CORS, security headers, request ID tracking
//! - **Configuration**: environment variables with an optional config file
//! - **Error handling**: one normalized JSON error shape for every failure
//! - **Graceful shutdown**: Ctrl+C and SIGTERM
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use server::ServerConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::load()?;
//!     server::start_server(config).await?;
//!     Ok(())
//! }
//! ```
//!
//! # API Endpoints
//!
//! - `GET /health` - Liveness probe
//! - `POST /rekognition/ensure-collection` - Create collection if missing
//! - `POST /rekognition/index-face` - Enrol a face (multipart)
//! - `POST /rekognition/index-face-base64` - Enrol a face (base64)
//! - `POST /rekognition/search-face` - Search a face (multipart)
//! - `POST /rekognition/search-face-base64` - Search a face (base64)
//! - `POST /rekognition/compare-faces` - Compare two faces
//! - `POST /rekognition/delete-face` - Delete an enrolled face

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use config::{ProviderKind, ServerConfig};
pub use error::{ServerError, ServerResult};
pub use server::{build_router, start_server};
pub use state::ServerState;
