//! Suggests a category and description for an uploaded product image.

use lambda_http::tracing::warn;
use lambda_http::{Body, Request, Response};
use serde_json::{json, Value};

use crate::analysis::{classify, describe};
use crate::error::ApiError;
use crate::http::{json_response, optional_str, parse_json_body};
use crate::models::Category;
use crate::recognition::Detection;
use crate::state::AppState;
use crate::storage::parse_object_url;

const MAX_LABELS: usize = 10;
const MAX_TEXT: usize = 5;
const HIGH_CONFIDENCE: f32 = 85.0;

pub async fn handle_analyze_image(event: &Request, state: &AppState) -> Result<Response<Body>, ApiError> {
    let body = parse_json_body(event.body())?;
    let image_url = optional_str(&body, "imageUrl").ok_or_else(|| ApiError::bad_request("Image URL is required"))?;
    let (bucket, key) =
        parse_object_url(&image_url).ok_or_else(|| ApiError::bad_request("Invalid S3 image URL format"))?;

    let payload = match state.analyzer.analyze(&bucket, &key).await {
        Ok(detection) => analysis_payload(&detection),
        Err(e) => {
            warn!("Image analysis failed for s3://{}/{}: {}", bucket, key, e);
            json!({
                "category": Category::General,
                "description": "Product available for purchase",
                "labels": [],
                "detectedText": [],
                "confidence": "low",
                "error": "Image analysis unavailable",
            })
        }
    };

    Ok(json_response(200, &payload))
}

fn analysis_payload(detection: &Detection) -> Value {
    let labels: Vec<&str> = detection.labels.iter().take(MAX_LABELS).map(|l| l.name.as_str()).collect();
    let text: Vec<&str> = detection.text.iter().take(MAX_TEXT).map(String::as_str).collect();

    let confidence = match detection.labels.iter().map(|l| l.confidence).reduce(f32::max) {
        None => "low",
        Some(max) if max > HIGH_CONFIDENCE => "high",
        Some(_) => "medium",
    };

    json!({
        "category": classify(&detection.labels),
        "description": describe(&detection.labels, &detection.text),
        "labels": labels,
        "detectedText": text,
        "confidence": confidence,
    })
}
