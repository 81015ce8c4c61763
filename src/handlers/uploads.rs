//! Pre-signed upload URLs for product images.

use std::time::Duration;

use lambda_http::tracing::info;
use lambda_http::{Body, Request, RequestExt, Response};
use serde_json::json;
use uuid::Uuid;

use crate::error::ApiError;
use crate::http::json_response;
use crate::state::AppState;

const UPLOAD_URL_TTL: Duration = Duration::from_secs(300);
const MAX_EXTENSION_LEN: usize = 5;

/// Issues a short-lived PUT URL for `products/{uuid}.{ext}` and the public
/// URL the image will have once uploaded.
pub async fn handle_upload_url(event: &Request, state: &AppState) -> Result<Response<Body>, ApiError> {
    let ext = event
        .query_string_parameters()
        .first("ext")
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .unwrap_or("jpg")
        .to_string();
    if ext.len() > MAX_EXTENSION_LEN || !ext.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()) {
        return Err(ApiError::bad_request("Invalid file extension"));
    }

    let filename = format!("products/{}.{}", Uuid::new_v4(), ext);
    let upload_url = state
        .objects
        .presign_put(&filename, &format!("image/{}", ext), UPLOAD_URL_TTL)
        .await
        .map_err(|e| ApiError::upstream("Failed to generate upload URL", e))?;
    let image_url = state.objects.public_url(&filename);
    info!("Generated upload URL for {}", filename);

    Ok(json_response(
        200,
        &json!({
            "uploadUrl": upload_url,
            "imageUrl": image_url,
            "filename": filename,
        }),
    ))
}
