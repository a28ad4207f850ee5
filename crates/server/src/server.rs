//! Server initialization and routing
//!
//! This module handles the Axum server setup including:
//! - Router configuration with all API endpoints
//! - Middleware stack (auth, rate limiting, error normalization, logging)
//! - Graceful shutdown handling

use crate::config::ServerConfig;
use crate::middleware::{
    api_key_auth, log_requests, normalize_errors, rate_limit, request_id, security_headers,
};
use crate::routes::not_found;
use crate::routes::{collection, faces, health};
use crate::state::ServerState;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

/// CORS policy from configuration
///
/// Outside production, or with `*` listed, the request origin is mirrored.
/// Otherwise only listed origins get CORS headers.
fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let origin = if config.cors_allows_any() {
        AllowOrigin::mirror_request()
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::PUT,
            Method::PATCH,
            Method::POST,
            Method::DELETE,
        ])
        .allow_headers(AllowHeaders::mirror_request())
}

/// Build the Axum router with all routes and middleware
///
/// Every route, `/health` and the fallback included, sits behind the API key
/// check when a key is configured.
///
/// Middleware stack (outermost first):
/// 1. Tracing span
/// 2. Request ID tracking
/// 3. Request logging
/// 4. Security headers
/// 5. Compression
/// 6. CORS
/// 7. Error normalization
/// 8. Rate limiting
/// 9. API key authentication
/// 10. Body size limit
pub fn build_router(state: Arc<ServerState>) -> Router {
    let cors = cors_layer(&state.config);

    let face_routes = Router::new()
        .route(
            "/rekognition/ensure-collection",
            post(collection::ensure_collection),
        )
        .route("/rekognition/index-face", post(faces::index_face))
        .route(
            "/rekognition/index-face-base64",
            post(faces::index_face_base64),
        )
        .route("/rekognition/search-face", post(faces::search_face))
        .route(
            "/rekognition/search-face-base64",
            post(faces::search_face_base64),
        )
        .route("/rekognition/compare-faces", post(faces::compare_faces))
        .route("/rekognition/delete-face", post(faces::delete_face));

    Router::new()
        .route("/health", get(health::health_check))
        .merge(face_routes)
        .fallback(not_found)
        .method_not_allowed_fallback(not_found)
        .layer(DefaultBodyLimit::max(state.config.max_body_bytes))
        .layer(from_fn_with_state(state.clone(), api_key_auth))
        .layer(from_fn_with_state(state.clone(), rate_limit))
        .layer(from_fn_with_state(state.clone(), normalize_errors))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(from_fn(security_headers))
        .layer(from_fn(log_requests))
        .layer(from_fn(request_id))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn init_tracing(config: &ServerConfig) {
    let filter =
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    // A second init (tests, embedding) keeps the existing subscriber.
    let result = if config.is_production() {
        builder
            .with_thread_ids(true)
            .with_thread_names(true)
            .json()
            .try_init()
    } else {
        builder.try_init()
    };
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// Start the facegate HTTP server
///
/// Initializes the server with the provided configuration and starts listening
/// for incoming HTTP requests. This function will block until the server is
/// shut down via SIGTERM or Ctrl+C.
///
/// # Example
///
/// ```rust,no_run
/// use server::ServerConfig;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = ServerConfig::load()?;
///     server::start_server(config).await?;
///     Ok(())
/// }
/// ```
///
/// # Initialization
///
/// 1. Sets up logging: JSON in production, human-readable otherwise
/// 2. Builds the face provider once and wraps it in shared state
/// 3. Builds the Axum router with all routes and middleware
/// 4. Binds to the configured TCP address
/// 5. Serves with graceful shutdown support
pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    init_tracing(&config);

    let addr: SocketAddr = config.socket_addr()?;
    let state = Arc::new(ServerState::new(config.clone()).await);
    let app = build_router(state.clone());

    tracing::info!(
        %addr,
        env = %config.node_env,
        provider = state.provider.name(),
        region = %config.aws_region,
        collection_id = %config.collection_id,
        "starting facegate server"
    );
    tracing::info!(
        api_key = config.api_key_required(),
        cors_any = config.cors_allows_any(),
        rate_limit_per_minute = config.rate_limit_per_minute,
        max_image_bytes = config.max_image_bytes,
        max_body_bytes = config.max_body_bytes,
        "request limits"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Shutdown signal handler
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
