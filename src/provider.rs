//! The seam between facegate and a face-recognition backend.

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::types::{FaceMatch, FaceRecord, IndexFacesRequest, SearchFacesRequest};

/// Primitive calls of a face-recognition provider.
///
/// Implementations must be safe to share across concurrent requests: one
/// instance is built at startup and used by every handler.
#[async_trait]
pub trait FaceProvider: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Ids of every collection visible to the caller.
    async fn list_collections(&self) -> Result<Vec<String>, ProviderError>;

    /// Create a collection. Must fail with [`ProviderError::AlreadyExists`]
    /// when the id is taken.
    async fn create_collection(&self, collection_id: &str) -> Result<(), ProviderError>;

    /// Detect faces in an image and store them under `external_id`.
    /// Returns one record per stored face; an empty vector means no face was
    /// detected.
    async fn index_faces(
        &self,
        request: IndexFacesRequest<'_>,
    ) -> Result<Vec<FaceRecord>, ProviderError>;

    /// Faces in a collection similar to the largest face in the image, best
    /// first, all at or above the threshold.
    async fn search_faces_by_image(
        &self,
        request: SearchFacesRequest<'_>,
    ) -> Result<Vec<FaceMatch>, ProviderError>;

    /// Similarity scores of target-image faces matching the source face, best
    /// first, all at or above the threshold.
    async fn compare_faces(
        &self,
        source: &[u8],
        target: &[u8],
        threshold: f32,
    ) -> Result<Vec<f32>, ProviderError>;

    /// Delete faces by id. Returns the ids that were actually removed.
    async fn delete_faces(
        &self,
        collection_id: &str,
        face_ids: &[String],
    ) -> Result<Vec<String>, ProviderError>;
}
