//! The five face operations exposed over HTTP.
//!
//! Each one calls a [`FaceProvider`] primitive and reshapes the answer.
//! Negative answers the client must branch on ("no face", "no match",
//! "collection already exists") come back as outcomes, not errors.

use crate::error::ProviderError;
use crate::image::ImageInput;
use crate::provider::FaceProvider;
use crate::types::{
    CompareFacesOutcome, DeleteFaceOutcome, EnsureCollectionOutcome, IndexFaceOutcome,
    IndexFacesRequest, QualityFilter, SearchFaceOutcome, SearchFacesRequest,
};

/// Make sure `collection_id` exists, creating it when needed.
///
/// A failed listing (commonly a missing list permission) is logged and
/// skipped, and creation is attempted directly. This can hide an
/// authorization misconfiguration until the create call fails too.
pub async fn ensure_collection(
    provider: &dyn FaceProvider,
    collection_id: &str,
) -> Result<EnsureCollectionOutcome, ProviderError> {
    match provider.list_collections().await {
        Ok(existing) => {
            if existing.iter().any(|id| id == collection_id) {
                return Ok(EnsureCollectionOutcome {
                    created: false,
                    collection_id: collection_id.to_string(),
                });
            }
        }
        Err(err) => {
            tracing::warn!(
                provider = provider.name(),
                collection_id,
                error = %err,
                "listing collections failed, attempting create directly"
            );
        }
    }

    match provider.create_collection(collection_id).await {
        Ok(()) => {
            tracing::info!(provider = provider.name(), collection_id, "collection created");
            Ok(EnsureCollectionOutcome {
                created: true,
                collection_id: collection_id.to_string(),
            })
        }
        Err(err) if err.is_already_exists() => Ok(EnsureCollectionOutcome {
            created: false,
            collection_id: collection_id.to_string(),
        }),
        Err(err) => Err(err),
    }
}

/// Enrol at most one face from `image` under `external_id`.
pub async fn index_face(
    provider: &dyn FaceProvider,
    collection_id: &str,
    image: &ImageInput,
    external_id: &str,
) -> Result<IndexFaceOutcome, ProviderError> {
    let records = provider
        .index_faces(IndexFacesRequest {
            collection_id,
            image: image.bytes(),
            external_id,
            max_faces: 1,
            quality_filter: QualityFilter::Auto,
        })
        .await?;

    let Some(record) = records.into_iter().next() else {
        tracing::debug!(collection_id, external_id, "no face detected");
        return Ok(IndexFaceOutcome::NoFaceDetected);
    };

    Ok(IndexFaceOutcome::Indexed {
        face_id: record.face_id,
        external_image_id: record
            .external_image_id
            .unwrap_or_else(|| external_id.to_string()),
        confidence: record.confidence,
    })
}

/// Best match for the face in `image` at or above `threshold` percent.
pub async fn search_face(
    provider: &dyn FaceProvider,
    collection_id: &str,
    image: &ImageInput,
    threshold: f32,
) -> Result<SearchFaceOutcome, ProviderError> {
    let matches = provider
        .search_faces_by_image(SearchFacesRequest {
            collection_id,
            image: image.bytes(),
            threshold,
            max_faces: 1,
        })
        .await?;

    let Some(best) = matches.into_iter().next() else {
        return Ok(SearchFaceOutcome::NoMatch);
    };

    let face = best.face.unwrap_or_default();
    Ok(SearchFaceOutcome::Matched {
        matched_user_id: face.external_image_id,
        similarity: best.similarity,
        face_id: face.face_id,
    })
}

/// Compare two images without touching any collection.
pub async fn compare_faces(
    provider: &dyn FaceProvider,
    source: &ImageInput,
    target: &ImageInput,
    threshold: f32,
) -> Result<CompareFacesOutcome, ProviderError> {
    let similarities = provider
        .compare_faces(source.bytes(), target.bytes(), threshold)
        .await?;

    let similarity = similarities.first().copied().unwrap_or(0.0);
    Ok(CompareFacesOutcome {
        success: true,
        is_match: !similarities.is_empty() && similarity >= threshold,
        similarity,
    })
}

/// Remove a face record. Unknown ids are not an error.
pub async fn delete_face(
    provider: &dyn FaceProvider,
    collection_id: &str,
    face_id: &str,
) -> Result<DeleteFaceOutcome, ProviderError> {
    let deleted = provider
        .delete_faces(collection_id, &[face_id.to_string()])
        .await?;
    tracing::debug!(collection_id, face_id, removed = deleted.len(), "delete face");
    Ok(DeleteFaceOutcome { success: true })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::DEFAULT_MAX_IMAGE_BYTES;
    use crate::stub::InMemoryProvider;
    use crate::types::DEFAULT_THRESHOLD;
    use bytes::Bytes;

    fn image(data: &[u8]) -> ImageInput {
        ImageInput::from_bytes(Some(Bytes::copy_from_slice(data)), DEFAULT_MAX_IMAGE_BYTES).unwrap()
    }

    #[tokio::test]
    async fn ensure_collection_is_idempotent() {
        let provider = InMemoryProvider::new();
        let first = ensure_collection(&provider, "crew").await.unwrap();
        let second = ensure_collection(&provider, "crew").await.unwrap();
        assert!(first.created);
        assert!(!second.created);
        assert_eq!(second.collection_id, "crew");
    }

    #[tokio::test]
    async fn ensure_collection_falls_back_when_listing_is_denied() {
        let provider = InMemoryProvider::new().without_list_permission();
        assert!(provider.list_collections().await.is_err());

        let first = ensure_collection(&provider, "crew").await.unwrap();
        assert!(first.created);
        // Listing still fails; the already-exists create error is absorbed.
        let second = ensure_collection(&provider, "crew").await.unwrap();
        assert!(!second.created);
    }

    #[tokio::test]
    async fn index_without_face_is_an_outcome() {
        let provider = InMemoryProvider::new();
        ensure_collection(&provider, "crew").await.unwrap();
        let blank = image(&[0u8; 64]);
        let outcome = index_face(&provider, "crew", &blank, "worker-1").await.unwrap();
        assert_eq!(outcome, IndexFaceOutcome::NoFaceDetected);
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn index_then_search_finds_external_id() {
        let provider = InMemoryProvider::new();
        ensure_collection(&provider, "crew").await.unwrap();
        let face = image(b"face-of-worker-1");

        let indexed = index_face(&provider, "crew", &face, "worker-1").await.unwrap();
        let IndexFaceOutcome::Indexed {
            face_id,
            external_image_id,
            ..
        } = indexed
        else {
            panic!("expected an indexed face");
        };
        assert_eq!(external_image_id, "worker-1");

        let found = search_face(&provider, "crew", &face, DEFAULT_THRESHOLD)
            .await
            .unwrap();
        match found {
            SearchFaceOutcome::Matched {
                matched_user_id,
                similarity,
                face_id: matched_face,
            } => {
                assert_eq!(matched_user_id.as_deref(), Some("worker-1"));
                assert_eq!(matched_face, face_id);
                assert_eq!(similarity, Some(100.0));
            }
            SearchFaceOutcome::NoMatch => panic!("expected a match"),
        }
    }

    #[tokio::test]
    async fn search_without_enrolment_reports_no_match() {
        let provider = InMemoryProvider::new();
        ensure_collection(&provider, "crew").await.unwrap();
        let outcome = search_face(&provider, "crew", &image(b"stranger"), 80.0)
            .await
            .unwrap();
        assert_eq!(outcome, SearchFaceOutcome::NoMatch);
        assert!(!outcome.face_found());
    }

    #[tokio::test]
    async fn compare_identical_images_matches() {
        let provider = InMemoryProvider::new();
        let face = image(b"same-face");
        let outcome = compare_faces(&provider, &face, &face, DEFAULT_THRESHOLD)
            .await
            .unwrap();
        assert!(outcome.is_match);
        assert_eq!(outcome.similarity, 100.0);
    }

    #[tokio::test]
    async fn compare_unrelated_images_reports_zero() {
        let provider = InMemoryProvider::new();
        let outcome = compare_faces(
            &provider,
            &image(b"aaaaaaaa"),
            &image(b"bbbbbbbb"),
            DEFAULT_THRESHOLD,
        )
        .await
        .unwrap();
        assert!(!outcome.is_match);
        assert_eq!(outcome.similarity, 0.0);
    }

    #[tokio::test]
    async fn delete_unknown_face_succeeds() {
        let provider = InMemoryProvider::new();
        ensure_collection(&provider, "crew").await.unwrap();
        let outcome = delete_face(&provider, "crew", "does-not-exist").await.unwrap();
        assert!(outcome.success);
    }

    #[tokio::test]
    async fn index_into_missing_collection_is_a_provider_error() {
        let provider = InMemoryProvider::new();
        let err = index_face(&provider, "nope", &image(b"face"), "worker-1")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "ResourceNotFoundException");
        assert_eq!(err.upstream_status(), Some(400));
    }
}
