//! End-to-end checks of the face operations against the in-memory provider.

use bytes::Bytes;
use facegate::{
    compare_faces, delete_face, ensure_collection, index_face, search_face, FaceProvider,
    ImageError, ImageInput, InMemoryProvider, IndexFaceOutcome, SearchFaceOutcome,
    DEFAULT_MAX_IMAGE_BYTES, DEFAULT_THRESHOLD,
};
use serde_json::json;

fn b64(data: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(data)
}

fn image_from_base64(encoded: &str) -> ImageInput {
    ImageInput::from_base64(Some(encoded), DEFAULT_MAX_IMAGE_BYTES).expect("valid image")
}

#[tokio::test]
async fn enrol_search_delete_lifecycle() {
    let provider = InMemoryProvider::new();
    let created = ensure_collection(&provider, "site-a").await.unwrap();
    assert!(created.created);

    let face = image_from_base64(&b64(b"worker-42-portrait"));
    let indexed = index_face(&provider, "site-a", &face, "worker-42")
        .await
        .unwrap();
    let face_id = match indexed {
        IndexFaceOutcome::Indexed { face_id, .. } => face_id.expect("stub assigns ids"),
        IndexFaceOutcome::NoFaceDetected => panic!("portrait should contain a face"),
    };

    let found = search_face(&provider, "site-a", &face, DEFAULT_THRESHOLD)
        .await
        .unwrap();
    assert!(found.face_found());

    delete_face(&provider, "site-a", &face_id).await.unwrap();
    let after = search_face(&provider, "site-a", &face, DEFAULT_THRESHOLD)
        .await
        .unwrap();
    assert_eq!(after, SearchFaceOutcome::NoMatch);
}

#[tokio::test]
async fn data_url_and_raw_base64_are_the_same_image() {
    let provider = InMemoryProvider::new();
    ensure_collection(&provider, "site-a").await.unwrap();

    let raw = image_from_base64(&b64(b"same-person"));
    let url = image_from_base64(&format!("data:image/jpeg;base64,{}", b64(b"same-person")));
    assert_eq!(raw.bytes(), url.bytes());

    index_face(&provider, "site-a", &raw, "worker-1").await.unwrap();
    let found = search_face(&provider, "site-a", &url, DEFAULT_THRESHOLD)
        .await
        .unwrap();
    let value = serde_json::to_value(&found).unwrap();
    assert_eq!(value["matchedUserId"], json!("worker-1"));
    assert_eq!(value["similarity"], json!(100.0));
}

#[tokio::test]
async fn separate_collections_do_not_share_faces() {
    let provider = InMemoryProvider::new();
    ensure_collection(&provider, "site-a").await.unwrap();
    ensure_collection(&provider, "site-b").await.unwrap();

    let face = image_from_base64(&b64(b"only-on-site-a"));
    index_face(&provider, "site-a", &face, "worker-9").await.unwrap();

    let on_b = search_face(&provider, "site-b", &face, DEFAULT_THRESHOLD)
        .await
        .unwrap();
    assert!(!on_b.face_found());
    assert_eq!(
        provider.list_collections().await.unwrap(),
        vec!["site-a".to_string(), "site-b".to_string()]
    );
}

#[tokio::test]
async fn compare_threshold_decides_the_match_flag() {
    let provider = InMemoryProvider::new();
    let source = image_from_base64(&b64(b"abcdefghij"));
    let target = image_from_base64(&b64(b"abcdefghzz"));

    let lenient = compare_faces(&provider, &source, &target, 70.0).await.unwrap();
    assert!(lenient.is_match);
    assert_eq!(lenient.similarity, 80.0);

    let strict = compare_faces(&provider, &source, &target, 90.0).await.unwrap();
    assert!(!strict.is_match);
    assert_eq!(strict.similarity, 0.0);
}

#[test]
fn oversized_image_is_rejected_before_any_provider_call() {
    let big = Bytes::from(vec![1u8; 11]);
    let err = ImageInput::from_bytes(Some(big), 10).unwrap_err();
    assert_eq!(err, ImageError::TooLarge { size: 11, max: 10 });
    assert_eq!(err.kind(), "payload_too_large");
}
