//! Provider-facing records and the outcome types returned by the face
//! operations.
//!
//! Outcomes serialize to the flat camelCase JSON the mobile client consumes.
//! `IndexFaceOutcome` and `SearchFaceOutcome` are enums so a negative outcome
//! can never carry face-identifying fields.

use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// Default similarity threshold, in percent.
pub const DEFAULT_THRESHOLD: f32 = 80.0;

pub const NO_FACE_MESSAGE: &str = "No face detected in the image";
pub const NO_MATCH_MESSAGE: &str = "No matching face found";

/// A face as stored by the provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceRecord {
    pub face_id: Option<String>,
    pub external_image_id: Option<String>,
    pub confidence: Option<f32>,
}

/// One collection match returned by a search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FaceMatch {
    pub similarity: Option<f32>,
    pub face: Option<FaceRecord>,
}

/// Quality filter applied by the provider before indexing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QualityFilter {
    None,
    #[default]
    Auto,
    Low,
    Medium,
    High,
}

/// Parameters for the provider's index call.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexFacesRequest<'a> {
    pub collection_id: &'a str,
    pub image: &'a [u8],
    pub external_id: &'a str,
    pub max_faces: i32,
    pub quality_filter: QualityFilter,
}

/// Parameters for the provider's search-by-image call.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchFacesRequest<'a> {
    pub collection_id: &'a str,
    pub image: &'a [u8],
    pub threshold: f32,
    pub max_faces: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnsureCollectionOutcome {
    pub created: bool,
    pub collection_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IndexFaceOutcome {
    Indexed {
        face_id: Option<String>,
        external_image_id: String,
        confidence: Option<f32>,
    },
    NoFaceDetected,
}

impl IndexFaceOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, IndexFaceOutcome::Indexed { .. })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IndexFaceBody<'a> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    face_id: Option<Option<&'a str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    external_image_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    confidence: Option<Option<f32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<&'a str>,
}

impl Serialize for IndexFaceOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let body = match self {
            IndexFaceOutcome::Indexed {
                face_id,
                external_image_id,
                confidence,
            } => IndexFaceBody {
                success: true,
                face_id: Some(face_id.as_deref()),
                external_image_id: Some(external_image_id),
                confidence: Some(*confidence),
                error_message: None,
            },
            IndexFaceOutcome::NoFaceDetected => IndexFaceBody {
                success: false,
                face_id: None,
                external_image_id: None,
                confidence: None,
                error_message: Some(NO_FACE_MESSAGE),
            },
        };
        body.serialize(serializer)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchFaceOutcome {
    Matched {
        matched_user_id: Option<String>,
        similarity: Option<f32>,
        face_id: Option<String>,
    },
    NoMatch,
}

impl SearchFaceOutcome {
    pub fn face_found(&self) -> bool {
        matches!(self, SearchFaceOutcome::Matched { .. })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchFaceBody<'a> {
    success: bool,
    face_found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    matched_user_id: Option<Option<&'a str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    similarity: Option<Option<f32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    face_id: Option<Option<&'a str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<&'a str>,
}

impl Serialize for SearchFaceOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let body = match self {
            SearchFaceOutcome::Matched {
                matched_user_id,
                similarity,
                face_id,
            } => SearchFaceBody {
                success: true,
                face_found: true,
                matched_user_id: Some(matched_user_id.as_deref()),
                similarity: Some(*similarity),
                face_id: Some(face_id.as_deref()),
                error_message: None,
            },
            SearchFaceOutcome::NoMatch => SearchFaceBody {
                success: true,
                face_found: false,
                matched_user_id: None,
                similarity: None,
                face_id: None,
                error_message: Some(NO_MATCH_MESSAGE),
            },
        };
        body.serialize(serializer)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompareFacesOutcome {
    pub success: bool,
    #[serde(rename = "match")]
    pub is_match: bool,
    pub similarity: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteFaceOutcome {
    pub success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn indexed_outcome_shape() {
        let outcome = IndexFaceOutcome::Indexed {
            face_id: Some("f-1".into()),
            external_image_id: "worker-7".into(),
            confidence: Some(99.5),
        };
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({
                "success": true,
                "faceId": "f-1",
                "externalImageId": "worker-7",
                "confidence": 99.5,
            })
        );
    }

    #[test]
    fn indexed_outcome_keeps_null_face_id() {
        let outcome = IndexFaceOutcome::Indexed {
            face_id: None,
            external_image_id: "worker-7".into(),
            confidence: None,
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert!(value["faceId"].is_null());
        assert!(value.as_object().unwrap().contains_key("faceId"));
    }

    #[test]
    fn no_face_outcome_has_no_identity_fields() {
        let value = serde_json::to_value(IndexFaceOutcome::NoFaceDetected).unwrap();
        assert_eq!(
            value,
            json!({ "success": false, "errorMessage": NO_FACE_MESSAGE })
        );
    }

    #[test]
    fn search_outcome_shapes() {
        let matched = SearchFaceOutcome::Matched {
            matched_user_id: Some("worker-7".into()),
            similarity: Some(97.25),
            face_id: Some("f-1".into()),
        };
        let value = serde_json::to_value(&matched).unwrap();
        assert_eq!(value["success"], json!(true));
        assert_eq!(value["faceFound"], json!(true));
        assert_eq!(value["matchedUserId"], json!("worker-7"));
        assert!(value.get("errorMessage").is_none());

        let none = serde_json::to_value(SearchFaceOutcome::NoMatch).unwrap();
        assert_eq!(
            none,
            json!({ "success": true, "faceFound": false, "errorMessage": NO_MATCH_MESSAGE })
        );
    }

    #[test]
    fn compare_outcome_uses_match_key() {
        let outcome = CompareFacesOutcome {
            success: true,
            is_match: true,
            similarity: 99.0,
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["match"], json!(true));
        assert!(value.get("is_match").is_none());
    }

    #[test]
    fn quality_filter_defaults_to_auto() {
        assert_eq!(QualityFilter::default(), QualityFilter::Auto);
        assert_eq!(serde_json::to_value(QualityFilter::Auto).unwrap(), json!("AUTO"));
    }
}
