//! Deterministic in-memory provider.
//!
//! Used by the test suites and by `PROVIDER=memory` for local development
//! without cloud credentials. It does no face detection: an image whose bytes
//! are all identical (a blank frame) has no face, anything else has exactly
//! one. Similarity is the percentage of byte positions two images share, so
//! an image always matches itself at 100.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use crate::error::ProviderError;
use crate::provider::FaceProvider;
use crate::types::{FaceMatch, FaceRecord, IndexFacesRequest, SearchFacesRequest};

const STUB_CONFIDENCE: f32 = 99.9;

#[derive(Debug, Clone)]
struct StoredFace {
    face_id: String,
    external_image_id: String,
    image: Bytes,
}

impl StoredFace {
    fn record(&self) -> FaceRecord {
        FaceRecord {
            face_id: Some(self.face_id.clone()),
            external_image_id: Some(self.external_image_id.clone()),
            confidence: Some(STUB_CONFIDENCE),
        }
    }
}

/// A [`FaceProvider`] backed by a process-local map.
#[derive(Debug)]
pub struct InMemoryProvider {
    collections: DashMap<String, Vec<StoredFace>>,
    list_allowed: bool,
}

impl Default for InMemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self {
            collections: DashMap::new(),
            list_allowed: true,
        }
    }

    /// Make `list_collections` fail the way a caller without list permission
    /// sees it.
    pub fn without_list_permission(mut self) -> Self {
        self.list_allowed = false;
        self
    }

    /// Number of faces stored in a collection, `None` if it does not exist.
    pub fn face_count(&self, collection_id: &str) -> Option<usize> {
        self.collections.get(collection_id).map(|faces| faces.len())
    }
}

/// Blank frames (every byte identical) carry no face.
pub fn has_face(image: &[u8]) -> bool {
    match image.split_first() {
        Some((first, rest)) => rest.iter().any(|b| b != first),
        None => false,
    }
}

/// Percentage of byte positions shared by two images, over the longer one.
pub fn similarity(a: &[u8], b: &[u8]) -> f32 {
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 0.0;
    }
    let shared = a.iter().zip(b).filter(|(x, y)| x == y).count();
    shared as f32 * 100.0 / longest as f32
}

fn missing_collection(operation: &'static str, collection_id: &str) -> ProviderError {
    ProviderError::Service {
        operation,
        code: Some("ResourceNotFoundException".into()),
        message: format!("The collection id: {collection_id} does not exist"),
        status: Some(400),
    }
}

fn no_face_in_image(operation: &'static str) -> ProviderError {
    ProviderError::Service {
        operation,
        code: Some("InvalidParameterException".into()),
        message: "There are no faces in the image. Should be at least 1.".into(),
        status: Some(400),
    }
}

#[async_trait]
impl FaceProvider for InMemoryProvider {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn list_collections(&self) -> Result<Vec<String>, ProviderError> {
        if !self.list_allowed {
            return Err(ProviderError::Service {
                operation: "ListCollections",
                code: Some("AccessDeniedException".into()),
                message: "not authorized to perform ListCollections".into(),
                status: Some(400),
            });
        }
        let mut ids: Vec<String> = self
            .collections
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn create_collection(&self, collection_id: &str) -> Result<(), ProviderError> {
        match self.collections.entry(collection_id.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(ProviderError::AlreadyExists(collection_id.to_string()))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Vec::new());
                Ok(())
            }
        }
    }

    async fn index_faces(
        &self,
        request: IndexFacesRequest<'_>,
    ) -> Result<Vec<FaceRecord>, ProviderError> {
        let mut faces = self
            .collections
            .get_mut(request.collection_id)
            .ok_or_else(|| missing_collection("IndexFaces", request.collection_id))?;

        if !has_face(request.image) || request.max_faces < 1 {
            return Ok(Vec::new());
        }

        let stored = StoredFace {
            face_id: uuid::Uuid::new_v4().to_string(),
            external_image_id: request.external_id.to_string(),
            image: Bytes::copy_from_slice(request.image),
        };
        let record = stored.record();
        faces.push(stored);
        Ok(vec![record])
    }

    async fn search_faces_by_image(
        &self,
        request: SearchFacesRequest<'_>,
    ) -> Result<Vec<FaceMatch>, ProviderError> {
        let faces = self
            .collections
            .get(request.collection_id)
            .ok_or_else(|| missing_collection("SearchFacesByImage", request.collection_id))?;

        if !has_face(request.image) {
            return Err(no_face_in_image("SearchFacesByImage"));
        }

        let mut scored: Vec<(f32, &StoredFace)> = faces
            .iter()
            .map(|face| (similarity(request.image, &face.image), face))
            .filter(|(score, _)| *score >= request.threshold)
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        let limit = usize::try_from(request.max_faces).unwrap_or(0);
        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(score, face)| FaceMatch {
                similarity: Some(score),
                face: Some(face.record()),
            })
            .collect())
    }

    async fn compare_faces(
        &self,
        source: &[u8],
        target: &[u8],
        threshold: f32,
    ) -> Result<Vec<f32>, ProviderError> {
        if !has_face(source) {
            return Err(no_face_in_image("CompareFaces"));
        }
        if !has_face(target) {
            return Ok(Vec::new());
        }
        let score = similarity(source, target);
        if score >= threshold {
            Ok(vec![score])
        } else {
            Ok(Vec::new())
        }
    }

    async fn delete_faces(
        &self,
        collection_id: &str,
        face_ids: &[String],
    ) -> Result<Vec<String>, ProviderError> {
        let mut faces = self
            .collections
            .get_mut(collection_id)
            .ok_or_else(|| missing_collection("DeleteFaces", collection_id))?;

        let mut deleted = Vec::new();
        faces.retain(|face| {
            if face_ids.contains(&face.face_id) {
                deleted.push(face.face_id.clone());
                false
            } else {
                true
            }
        });
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::QualityFilter;

    fn index_request<'a>(image: &'a [u8], external_id: &'a str) -> IndexFacesRequest<'a> {
        IndexFacesRequest {
            collection_id: "crew",
            image,
            external_id,
            max_faces: 1,
            quality_filter: QualityFilter::Auto,
        }
    }

    #[test]
    fn blank_frames_have_no_face() {
        assert!(!has_face(&[]));
        assert!(!has_face(&[7]));
        assert!(!has_face(&[0; 32]));
        assert!(has_face(b"ab"));
    }

    #[test]
    fn similarity_is_symmetric_and_bounded() {
        assert_eq!(similarity(b"abcd", b"abcd"), 100.0);
        assert_eq!(similarity(b"abcd", b"abxx"), 50.0);
        assert_eq!(similarity(b"abcd", b"ab"), 50.0);
        assert_eq!(similarity(b"ab", b"abcd"), 50.0);
        assert_eq!(similarity(b"", b""), 0.0);
    }

    #[tokio::test]
    async fn create_twice_reports_already_exists() {
        let provider = InMemoryProvider::new();
        provider.create_collection("crew").await.unwrap();
        let err = provider.create_collection("crew").await.unwrap_err();
        assert!(err.is_already_exists());
        assert_eq!(provider.list_collections().await.unwrap(), vec!["crew"]);
    }

    #[tokio::test]
    async fn delete_returns_only_removed_ids() {
        let provider = InMemoryProvider::new();
        provider.create_collection("crew").await.unwrap();
        let records = provider
            .index_faces(index_request(b"face-one", "w1"))
            .await
            .unwrap();
        let face_id = records[0].face_id.clone().unwrap();

        let deleted = provider
            .delete_faces("crew", &[face_id.clone(), "ghost".into()])
            .await
            .unwrap();
        assert_eq!(deleted, vec![face_id]);
        assert_eq!(provider.face_count("crew"), Some(0));
    }

    #[tokio::test]
    async fn search_honours_threshold_and_limit() {
        let provider = InMemoryProvider::new();
        provider.create_collection("crew").await.unwrap();
        provider.index_faces(index_request(b"abcdefgh", "w1")).await.unwrap();
        provider.index_faces(index_request(b"abcdefxx", "w2")).await.unwrap();

        let matches = provider
            .search_faces_by_image(SearchFacesRequest {
                collection_id: "crew",
                image: b"abcdefgh",
                threshold: 70.0,
                max_faces: 5,
            })
            .await
            .unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].similarity, Some(100.0));
        assert_eq!(matches[1].similarity, Some(75.0));

        let strict = provider
            .search_faces_by_image(SearchFacesRequest {
                collection_id: "crew",
                image: b"abcdefgh",
                threshold: 80.0,
                max_faces: 5,
            })
            .await
            .unwrap();
        assert_eq!(strict.len(), 1);
    }

    #[tokio::test]
    async fn search_with_blank_frame_is_rejected() {
        let provider = InMemoryProvider::new();
        provider.create_collection("crew").await.unwrap();
        let err = provider
            .search_faces_by_image(SearchFacesRequest {
                collection_id: "crew",
                image: &[0; 16],
                threshold: 80.0,
                max_faces: 1,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "InvalidParameterException");
    }
}
