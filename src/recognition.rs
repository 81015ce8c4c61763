//! Image label and text detection (Rekognition)

use async_trait::async_trait;
use aws_sdk_rekognition::Client as RekognitionClient;
use aws_sdk_rekognition::error::DisplayErrorContext;
use aws_sdk_rekognition::types::{Image, S3Object, TextTypes};

use crate::analysis::Label;
use crate::error::ApiError;

const MAX_LABELS: i32 = 20;
const MIN_LABEL_CONFIDENCE: f32 = 70.0;
const MIN_TEXT_CONFIDENCE: f32 = 80.0;

/// What was found in an image. Labels are sorted by confidence, highest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Detection {
    pub labels: Vec<Label>,
    pub text: Vec<String>,
}

#[async_trait]
pub trait ImageAnalyzer: Send + Sync {
    async fn analyze(&self, bucket: &str, key: &str) -> Result<Detection, ApiError>;
}

pub struct RekognitionAnalyzer {
    client: RekognitionClient,
}

impl RekognitionAnalyzer {
    pub fn new(client: RekognitionClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ImageAnalyzer for RekognitionAnalyzer {
    async fn analyze(&self, bucket: &str, key: &str) -> Result<Detection, ApiError> {
        let image = Image::builder()
            .s3_object(S3Object::builder().bucket(bucket).name(key).build())
            .build();

        let labels_output = self
            .client
            .detect_labels()
            .image(image.clone())
            .max_labels(MAX_LABELS)
            .min_confidence(MIN_LABEL_CONFIDENCE)
            .send()
            .await
            .map_err(|e| ApiError::upstream("Label detection failed", DisplayErrorContext(&e)))?;

        let text_output = self
            .client
            .detect_text()
            .image(image)
            .send()
            .await
            .map_err(|e| ApiError::upstream("Text detection failed", DisplayErrorContext(&e)))?;

        let mut labels: Vec<Label> = labels_output
            .labels()
            .iter()
            .filter_map(|l| Some(Label::new(l.name()?, l.confidence().unwrap_or_default())))
            .collect();
        labels.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        let text = text_output
            .text_detections()
            .iter()
            .filter(|d| d.r#type() == Some(&TextTypes::Line))
            .filter(|d| d.confidence().unwrap_or_default() > MIN_TEXT_CONFIDENCE)
            .filter_map(|d| d.detected_text().map(str::to_string))
            .collect();

        Ok(Detection { labels, text })
    }
}
