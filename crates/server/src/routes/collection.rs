use crate::error::ServerResult;
use crate::state::ServerState;
use axum::extract::rejection::BytesRejection;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use bytes::Bytes;
use facegate::ops;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Optional body of `POST /rekognition/ensure-collection`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnsureCollectionRequest {
    #[serde(default)]
    pub collection_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnsureCollectionResponse {
    pub success: bool,
    pub created: bool,
    pub collection_id: String,
}

/// Create the collection if it does not exist yet
///
/// The body may be absent entirely, in which case the default collection is
/// used.
pub async fn ensure_collection(
    State(state): State<Arc<ServerState>>,
    body: Result<Bytes, BytesRejection>,
) -> ServerResult<impl IntoResponse> {
    let body = body?;
    let request: EnsureCollectionRequest = if body.iter().all(u8::is_ascii_whitespace) {
        EnsureCollectionRequest::default()
    } else {
        serde_json::from_slice(&body)?
    };

    let collection_id = state.collection_id(request.collection_id.as_deref());
    let outcome = ops::ensure_collection(state.provider.as_ref(), collection_id).await?;

    Ok(Json(EnsureCollectionResponse {
        success: true,
        created: outcome.created,
        collection_id: outcome.collection_id,
    }))
}
