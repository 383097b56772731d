/// Image uploads
///
/// # Endpoint
///
/// ```text
/// POST /v1/uploads
/// Authorization: Bearer eyJ...
/// Content-Type: multipart/form-data; boundary=...
///
/// file=<image bytes>
/// ```
///
/// # Response
///
/// ```json
/// { "filename": "7f1c...e2.png", "url": "/uploads/7f1c...e2.png" }
/// ```
///
/// Files land in `UPLOAD_DIR` under a fresh UUID name, so client-supplied
/// names never reach the filesystem. They are served back by the static
/// `/uploads` route.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    Json,
};
use rentloop_shared::auth::middleware::AuthContext;
use serde::Serialize;
use uuid::Uuid;

const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub filename: String,
    pub url: String,
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge("Upload exceeds the size limit".to_string())
    } else {
        ApiError::BadRequest(format!("Invalid multipart body: {}", err.body_text()))
    }
}

/// Extension for the stored file
///
/// Taken from the client filename when it looks sane, otherwise derived from
/// the content type.
fn file_extension(original_name: Option<&str>, content_type: &str) -> String {
    let from_name = original_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()));

    if let Some(ext) = from_name {
        return format!(".{}", ext);
    }

    match content_type {
        "image/png" => ".png",
        "image/jpeg" => ".jpg",
        "image/gif" => ".gif",
        "image/webp" => ".webp",
        _ => "",
    }
    .to_string()
}

/// Store an uploaded image
///
/// # Errors
///
/// - `400 Bad Request`: No `file` field, or it is not an image
/// - `401 Unauthorized`: Not authenticated
/// - `413 Payload Too Large`: Over `UPLOAD_MAX_BYTES`
pub async fn upload_image(
    State(state): State<AppState>,
    auth: AuthContext,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        if !content_type.starts_with("image/") {
            return Err(ApiError::BadRequest("Only image uploads are allowed".to_string()));
        }

        let filename = format!(
            "{}{}",
            Uuid::new_v4().simple(),
            file_extension(field.file_name(), &content_type)
        );
        let data = field.bytes().await.map_err(multipart_error)?;

        let dir = &state.config.uploads.dir;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| ApiError::InternalError(format!("Cannot create upload dir: {}", e)))?;
        tokio::fs::write(dir.join(&filename), &data)
            .await
            .map_err(|e| ApiError::InternalError(format!("Cannot store upload: {}", e)))?;

        tracing::info!(%filename, bytes = data.len(), uploader = %auth.username, "Image uploaded");

        return Ok((
            StatusCode::CREATED,
            Json(UploadResponse {
                url: format!("/uploads/{}", filename),
                filename,
            }),
        ));
    }

    Err(ApiError::BadRequest(format!("Missing '{}' field", FILE_FIELD)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_from_name() {
        assert_eq!(file_extension(Some("Tent.JPEG"), "image/jpeg"), ".jpeg");
        assert_eq!(file_extension(Some("photo.png"), "image/png"), ".png");
    }

    #[test]
    fn test_extension_from_content_type() {
        assert_eq!(file_extension(None, "image/webp"), ".webp");
        assert_eq!(file_extension(Some("../../etc/passwd"), "image/png"), ".png");
        assert_eq!(file_extension(Some("noext"), "image/x-unknown"), "");
    }
}
