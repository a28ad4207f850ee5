//! Image decoding and validation.
//!
//! Clients send images either as multipart file fields or as base64 strings,
//! optionally wrapped in a data URL (`data:image/jpeg;base64,...`). Whatever
//! the transport, the bytes handed to a provider have passed the same checks:
//! present, non-empty and no larger than the configured ceiling.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use bytes::Bytes;

use crate::error::ImageError;

/// Default ceiling for a decoded image (5 MiB).
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

const LENIENT_CONFIG: GeneralPurposeConfig = GeneralPurposeConfig::new()
    .with_decode_padding_mode(DecodePaddingMode::Indifferent)
    .with_decode_allow_trailing_bits(true);

const LENIENT_STANDARD: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT_CONFIG);
const LENIENT_URL_SAFE: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT_CONFIG);

/// A validated image buffer, ready to be sent to a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInput {
    bytes: Bytes,
    media_type: Option<String>,
}

impl ImageInput {
    /// Validate raw bytes, typically a multipart file field.
    pub fn from_bytes(bytes: Option<Bytes>, max_bytes: usize) -> Result<Self, ImageError> {
        let bytes = validate_image_bytes(bytes, max_bytes)?;
        Ok(Self {
            bytes,
            media_type: None,
        })
    }

    /// Decode and validate a raw base64 string or a base64 data URL.
    ///
    /// `None` and the empty string are both treated as a missing image.
    pub fn from_base64(input: Option<&str>, max_bytes: usize) -> Result<Self, ImageError> {
        let input = match input {
            Some(s) if !s.is_empty() => s,
            _ => return Err(ImageError::Missing),
        };
        let (media_type, _) = split_data_url(input);
        let decoded = decode_base64_image(input)?;
        let bytes = validate_image_bytes(Some(decoded), max_bytes)?;
        Ok(Self {
            bytes,
            media_type: media_type.map(str::to_string),
        })
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false for a constructed value; present for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Media type declared by a data URL, if the image arrived as one.
    pub fn media_type(&self) -> Option<&str> {
        self.media_type.as_deref()
    }
}

/// Split `data:<media>;base64,<payload>` into its media type and payload.
///
/// Anything that is not a base64 data URL is returned unchanged as payload.
pub fn split_data_url(input: &str) -> (Option<&str>, &str) {
    if let Some(rest) = input.strip_prefix("data:") {
        if let Some(idx) = rest.find(";base64,") {
            let media = &rest[..idx];
            let payload = &rest[idx + ";base64,".len()..];
            let media = if media.is_empty() { None } else { Some(media) };
            return (media, payload);
        }
    }
    (None, input)
}

/// Decode a base64 image, accepting data URLs, embedded whitespace, missing
/// padding and the URL-safe alphabet.
pub fn decode_base64_image(input: &str) -> Result<Bytes, ImageError> {
    let (_, payload) = split_data_url(input);
    let compact: String = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    match LENIENT_STANDARD.decode(compact.as_bytes()) {
        Ok(bytes) => Ok(Bytes::from(bytes)),
        Err(standard_err) => LENIENT_URL_SAFE
            .decode(compact.as_bytes())
            .map(Bytes::from)
            .map_err(|_| ImageError::InvalidEncoding(standard_err.to_string())),
    }
}

/// Check presence, non-emptiness and size of an image buffer.
pub fn validate_image_bytes(bytes: Option<Bytes>, max_bytes: usize) -> Result<Bytes, ImageError> {
    let bytes = bytes.ok_or(ImageError::Missing)?;
    if bytes.is_empty() {
        return Err(ImageError::Empty);
    }
    if bytes.len() > max_bytes {
        return Err(ImageError::TooLarge {
            size: bytes.len(),
            max: max_bytes,
        });
    }
    Ok(bytes)
}
