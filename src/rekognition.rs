//! AWS Rekognition implementation of [`FaceProvider`].
//!
//! Credentials come from the default AWS provider chain (environment, shared
//! profile, instance role). The SDK client is cheap to share and issues an
//! independent request per call.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_rekognition::config::http::HttpResponse;
use aws_sdk_rekognition::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_rekognition::primitives::Blob;
use aws_sdk_rekognition::types::{Attribute, Face, Image, QualityFilter as AwsQualityFilter};
use aws_sdk_rekognition::Client;

use crate::error::ProviderError;
use crate::provider::FaceProvider;
use crate::types::{FaceMatch, FaceRecord, IndexFacesRequest, QualityFilter, SearchFacesRequest};

/// Service error codes that mean the caller's identity was not accepted.
const CREDENTIAL_ERROR_CODES: &[&str] = &[
    "UnrecognizedClientException",
    "InvalidSignatureException",
    "InvalidClientTokenId",
    "ExpiredTokenException",
    "MissingAuthenticationToken",
];

#[derive(Debug, Clone)]
pub struct RekognitionProvider {
    client: Client,
}

impl RekognitionProvider {
    /// Build a client for `region` from the default credential chain.
    pub async fn from_region(region: impl Into<String>) -> Self {
        let region = region.into();
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.clone()))
            .load()
            .await;
        tracing::info!(region = %region, "rekognition client configured");
        Self::with_client(Client::new(&sdk_config))
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

fn image(bytes: &[u8]) -> Image {
    Image::builder().bytes(Blob::new(bytes.to_vec())).build()
}

fn quality_filter(filter: QualityFilter) -> AwsQualityFilter {
    match filter {
        QualityFilter::None => AwsQualityFilter::None,
        QualityFilter::Auto => AwsQualityFilter::Auto,
        QualityFilter::Low => AwsQualityFilter::Low,
        QualityFilter::Medium => AwsQualityFilter::Medium,
        QualityFilter::High => AwsQualityFilter::High,
    }
}

fn face_record(face: &Face) -> FaceRecord {
    FaceRecord {
        face_id: face.face_id().map(str::to_string),
        external_image_id: face.external_image_id().map(str::to_string),
        confidence: face.confidence(),
    }
}

fn mentions_credentials(detail: &str) -> bool {
    let lower = detail.to_ascii_lowercase();
    lower.contains("credential") || lower.contains("no identity")
}

/// Collapse an SDK error into the crate's closed error set.
fn provider_error<E>(operation: &'static str, err: SdkError<E, HttpResponse>) -> ProviderError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let detail = DisplayErrorContext(&err).to_string();

    if let SdkError::ServiceError(_) = &err {
        let code = err.code().map(str::to_string);
        if code
            .as_deref()
            .is_some_and(|c| CREDENTIAL_ERROR_CODES.contains(&c))
        {
            return ProviderError::Credentials { detail };
        }
        let status = err.raw_response().map(|resp| resp.status().as_u16());
        let message = err.message().map(str::to_string).unwrap_or(detail);
        return ProviderError::Service {
            operation,
            code,
            message,
            status,
        };
    }

    if mentions_credentials(&detail) {
        ProviderError::Credentials { detail }
    } else {
        ProviderError::Transport {
            operation,
            message: detail,
        }
    }
}

#[async_trait]
impl FaceProvider for RekognitionProvider {
    fn name(&self) -> &'static str {
        "rekognition"
    }

    async fn list_collections(&self) -> Result<Vec<String>, ProviderError> {
        let mut ids = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let output = self
                .client
                .list_collections()
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|err| provider_error("ListCollections", err))?;
            ids.extend(output.collection_ids().iter().cloned());
            match output.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }
        tracing::debug!(count = ids.len(), "listed collections");
        Ok(ids)
    }

    async fn create_collection(&self, collection_id: &str) -> Result<(), ProviderError> {
        let result = self
            .client
            .create_collection()
            .collection_id(collection_id)
            .send()
            .await;

        match result {
            Ok(output) => {
                tracing::debug!(
                    collection_id,
                    status = ?output.status_code(),
                    "created collection"
                );
                Ok(())
            }
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_resource_already_exists_exception()) =>
            {
                Err(ProviderError::AlreadyExists(collection_id.to_string()))
            }
            Err(err) => Err(provider_error("CreateCollection", err)),
        }
    }

    async fn index_faces(
        &self,
        request: IndexFacesRequest<'_>,
    ) -> Result<Vec<FaceRecord>, ProviderError> {
        let output = self
            .client
            .index_faces()
            .collection_id(request.collection_id)
            .image(image(request.image))
            .external_image_id(request.external_id)
            .detection_attributes(Attribute::All)
            .max_faces(request.max_faces)
            .quality_filter(quality_filter(request.quality_filter))
            .send()
            .await
            .map_err(|err| provider_error("IndexFaces", err))?;

        let records: Vec<FaceRecord> = output
            .face_records()
            .iter()
            .filter_map(|record| record.face())
            .map(face_record)
            .collect();
        tracing::debug!(
            collection_id = request.collection_id,
            indexed = records.len(),
            unindexed = output.unindexed_faces().len(),
            "index faces"
        );
        Ok(records)
    }

    async fn search_faces_by_image(
        &self,
        request: SearchFacesRequest<'_>,
    ) -> Result<Vec<FaceMatch>, ProviderError> {
        let output = self
            .client
            .search_faces_by_image()
            .collection_id(request.collection_id)
            .image(image(request.image))
            .face_match_threshold(request.threshold)
            .max_faces(request.max_faces)
            .send()
            .await
            .map_err(|err| provider_error("SearchFacesByImage", err))?;

        Ok(output
            .face_matches()
            .iter()
            .map(|m| FaceMatch {
                similarity: m.similarity(),
                face: m.face().map(face_record),
            })
            .collect())
    }

    async fn compare_faces(
        &self,
        source: &[u8],
        target: &[u8],
        threshold: f32,
    ) -> Result<Vec<f32>, ProviderError> {
        let output = self
            .client
            .compare_faces()
            .source_image(image(source))
            .target_image(image(target))
            .similarity_threshold(threshold)
            .send()
            .await
            .map_err(|err| provider_error("CompareFaces", err))?;

        Ok(output
            .face_matches()
            .iter()
            .map(|m| m.similarity().unwrap_or(0.0))
            .collect())
    }

    async fn delete_faces(
        &self,
        collection_id: &str,
        face_ids: &[String],
    ) -> Result<Vec<String>, ProviderError> {
        let output = self
            .client
            .delete_faces()
            .collection_id(collection_id)
            .set_face_ids(Some(face_ids.to_vec()))
            .send()
            .await
            .map_err(|err| provider_error("DeleteFaces", err))?;

        Ok(output.deleted_faces().to_vec())
    }
}
