//! Multipart form reading for the upload routes.

use crate::error::{ServerError, ServerResult};
use axum::extract::Multipart;
use bytes::Bytes;
use std::collections::HashMap;

/// Name of the file field carrying the image.
pub const IMAGE_FIELD: &str = "image";

/// A multipart form split into the image file and its text fields
#[derive(Debug, Default)]
pub struct FaceUpload {
    pub image: Option<Bytes>,
    pub fields: HashMap<String, String>,
}

impl FaceUpload {
    /// Drain the form. Only one `image` part is accepted.
    pub async fn read(mut multipart: Multipart) -> ServerResult<Self> {
        let mut upload = FaceUpload::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            if name == IMAGE_FIELD {
                if upload.image.is_some() {
                    return Err(ServerError::BadRequest(format!(
                        "Unexpected field: only one '{IMAGE_FIELD}' file is accepted"
                    )));
                }
                upload.image = Some(field.bytes().await?);
            } else if !name.is_empty() {
                let value = field.text().await?;
                upload.fields.insert(name, value);
            }
        }

        tracing::debug!(
            image_bytes = upload.image.as_ref().map(Bytes::len).unwrap_or(0),
            fields = upload.fields.len(),
            "multipart form read"
        );
        Ok(upload)
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}
