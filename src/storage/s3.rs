//! S3-backed object store

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;

use crate::error::ApiError;
use crate::storage::ObjectStore;

pub struct S3ObjectStore {
    client: S3Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: S3Client, bucket: impl Into<String>) -> Self {
        Self { client, bucket: bucket.into() }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ApiError> {
        let output = match self.client.get_object().bucket(&self.bucket).key(key).send().await {
            Ok(output) => output,
            Err(e) => {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    return Ok(None);
                }
                return Err(ApiError::upstream(
                    format!("Failed to read s3://{}/{}", self.bucket, key),
                    DisplayErrorContext(&e),
                ));
            }
        };

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| ApiError::upstream(format!("Failed to read s3://{}/{}", self.bucket, key), e))?;
        Ok(Some(data.into_bytes().to_vec()))
    }

    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), ApiError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| {
                ApiError::upstream(format!("Failed to write s3://{}/{}", self.bucket, key), DisplayErrorContext(&e))
            })?;
        Ok(())
    }

    async fn presign_put(&self, key: &str, content_type: &str, expires_in: Duration) -> Result<String, ApiError> {
        let presigning = PresigningConfig::expires_in(expires_in)
            .map_err(|e| ApiError::upstream("Failed to generate upload URL", e))?;

        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .presigned(presigning)
            .await
            .map_err(|e| ApiError::upstream("Failed to generate upload URL", DisplayErrorContext(&e)))?;

        Ok(request.uri().to_string())
    }
}
