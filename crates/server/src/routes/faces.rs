//! Face enrolment, search, comparison and deletion.
//!
//! Every handler validates its input before the provider is called. The
//! multipart and base64 variants of a route differ only in how the image
//! arrives; both funnel into the same enrol/search flow.

use super::upload::FaceUpload;
use super::{required_field, resolve_threshold, ApiJson, ThresholdInput};
use crate::error::ServerResult;
use crate::state::ServerState;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use facegate::{
    ops, CompareFacesOutcome, DeleteFaceOutcome, ImageInput, IndexFaceOutcome, SearchFaceOutcome,
};
use serde::Deserialize;
use std::sync::Arc;

/// Request to enrol a face from a base64 image
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexFaceBase64Request {
    #[serde(default)]
    pub image_base64: Option<String>,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub collection_id: Option<String>,
}

/// Request to search a collection with a base64 image
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFaceBase64Request {
    #[serde(default)]
    pub image_base64: Option<String>,
    #[serde(default)]
    pub threshold: Option<ThresholdInput>,
    #[serde(default)]
    pub collection_id: Option<String>,
}

/// Request to compare two base64 images
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareFacesRequest {
    #[serde(default)]
    pub source_image_base64: Option<String>,
    #[serde(default)]
    pub target_image_base64: Option<String>,
    #[serde(default)]
    pub threshold: Option<ThresholdInput>,
}

/// Request to delete an enrolled face
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFaceRequest {
    #[serde(default)]
    pub face_id: Option<String>,
    #[serde(default)]
    pub collection_id: Option<String>,
}

async fn enrol(
    state: &ServerState,
    collection_id: &str,
    image: &ImageInput,
    external_id: &str,
) -> ServerResult<Json<IndexFaceOutcome>> {
    let provider = state.provider.as_ref();
    ops::ensure_collection(provider, collection_id).await?;
    let outcome = ops::index_face(provider, collection_id, image, external_id).await?;

    if let IndexFaceOutcome::Indexed { face_id, .. } = &outcome {
        tracing::info!(collection_id, external_id, face_id = ?face_id, "face indexed");
    }
    Ok(Json(outcome))
}

async fn search(
    state: &ServerState,
    collection_id: &str,
    image: &ImageInput,
    threshold: f32,
) -> ServerResult<Json<SearchFaceOutcome>> {
    let provider = state.provider.as_ref();
    ops::ensure_collection(provider, collection_id).await?;
    let outcome = ops::search_face(provider, collection_id, image, threshold).await?;
    tracing::debug!(
        collection_id,
        threshold,
        face_found = outcome.face_found(),
        "face search"
    );
    Ok(Json(outcome))
}

/// Enrol a face from a multipart upload
pub async fn index_face(
    State(state): State<Arc<ServerState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ServerResult<Json<IndexFaceOutcome>> {
    let mut upload = FaceUpload::read(multipart?).await?;

    let external_id = required_field(upload.field("externalId"), "externalId")?.to_string();
    let collection_id = state.collection_id(upload.field("collectionId")).to_string();
    let image = ImageInput::from_bytes(upload.image.take(), state.config.max_image_bytes)?;

    enrol(&state, &collection_id, &image, &external_id).await
}

/// Enrol a face from a base64 string or data URL
pub async fn index_face_base64(
    State(state): State<Arc<ServerState>>,
    ApiJson(request): ApiJson<IndexFaceBase64Request>,
) -> ServerResult<Json<IndexFaceOutcome>> {
    let external_id = required_field(request.external_id.as_deref(), "externalId")?;
    let collection_id = state.collection_id(request.collection_id.as_deref());
    let image = ImageInput::from_base64(
        request.image_base64.as_deref(),
        state.config.max_image_bytes,
    )?;

    enrol(&state, collection_id, &image, external_id).await
}

/// Find the best match for an uploaded face
pub async fn search_face(
    State(state): State<Arc<ServerState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ServerResult<Json<SearchFaceOutcome>> {
    let mut upload = FaceUpload::read(multipart?).await?;

    let threshold = upload
        .field("threshold")
        .map(|text| ThresholdInput::Text(text.to_string()));
    let threshold = resolve_threshold(threshold.as_ref())?;
    let collection_id = state.collection_id(upload.field("collectionId")).to_string();
    let image = ImageInput::from_bytes(upload.image.take(), state.config.max_image_bytes)?;

    search(&state, &collection_id, &image, threshold).await
}

/// Find the best match for a base64 face
pub async fn search_face_base64(
    State(state): State<Arc<ServerState>>,
    ApiJson(request): ApiJson<SearchFaceBase64Request>,
) -> ServerResult<Json<SearchFaceOutcome>> {
    let threshold = resolve_threshold(request.threshold.as_ref())?;
    let collection_id = state.collection_id(request.collection_id.as_deref());
    let image = ImageInput::from_base64(
        request.image_base64.as_deref(),
        state.config.max_image_bytes,
    )?;

    search(&state, collection_id, &image, threshold).await
}

/// Compare two faces directly, without a collection
pub async fn compare_faces(
    State(state): State<Arc<ServerState>>,
    ApiJson(request): ApiJson<CompareFacesRequest>,
) -> ServerResult<Json<CompareFacesOutcome>> {
    let threshold = resolve_threshold(request.threshold.as_ref())?;
    let max = state.config.max_image_bytes;
    let source = ImageInput::from_base64(request.source_image_base64.as_deref(), max)?;
    let target = ImageInput::from_base64(request.target_image_base64.as_deref(), max)?;

    let outcome = ops::compare_faces(state.provider.as_ref(), &source, &target, threshold).await?;
    Ok(Json(outcome))
}

/// Remove an enrolled face
pub async fn delete_face(
    State(state): State<Arc<ServerState>>,
    ApiJson(request): ApiJson<DeleteFaceRequest>,
) -> ServerResult<Json<DeleteFaceOutcome>> {
    let face_id = required_field(request.face_id.as_deref(), "faceId")?;
    let collection_id = state.collection_id(request.collection_id.as_deref());

    let outcome = ops::delete_face(state.provider.as_ref(), collection_id, face_id).await?;
    tracing::info!(collection_id, face_id, "face deleted");
    Ok(Json(outcome))
}
