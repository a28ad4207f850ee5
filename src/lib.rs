//! Face collection, indexing, search and comparison on top of a cloud
//! face-recognition provider.
//!
//! The crate is deliberately thin: a [`FaceProvider`] trait over the
//! provider's primitive calls, an AWS Rekognition implementation, an
//! in-memory implementation for tests and local runs, image decoding helpers,
//! and five operations that reshape provider answers into client-facing
//! outcomes.
//!
//! ```rust,no_run
//! use facegate::{ensure_collection, index_face, ImageInput, InMemoryProvider};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = InMemoryProvider::new();
//! ensure_collection(&provider, "crew").await?;
//!
//! let image = ImageInput::from_base64(Some("data:image/jpeg;base64,/9j/4AAQ"), 5 << 20)?;
//! let outcome = index_face(&provider, "crew", &image, "worker-7").await?;
//! println!("{}", serde_json::to_string(&outcome)?);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod image;
pub mod ops;
pub mod provider;
#[cfg(feature = "rekognition")]
pub mod rekognition;
pub mod stub;
pub mod types;

pub use error::{ImageError, ProviderError};
pub use image::{
    decode_base64_image, split_data_url, validate_image_bytes, ImageInput,
    DEFAULT_MAX_IMAGE_BYTES,
};
pub use ops::{compare_faces, delete_face, ensure_collection, index_face, search_face};
pub use provider::FaceProvider;
#[cfg(feature = "rekognition")]
pub use rekognition::RekognitionProvider;
pub use stub::InMemoryProvider;
pub use types::{
    CompareFacesOutcome, DeleteFaceOutcome, EnsureCollectionOutcome, FaceMatch, FaceRecord,
    IndexFaceOutcome, IndexFacesRequest, QualityFilter, SearchFaceOutcome, SearchFacesRequest,
    DEFAULT_THRESHOLD,
};
