//! Collection storage behind the `Repository` and `ObjectStore` traits.
//!
//! Both backends keep a collection as one whole document (a JSON file in the
//! bucket, or a sheet range). Every mutation is read-modify-write of that
//! document with no concurrency token, so concurrent writers can lose updates.

pub mod document;
pub mod s3;
pub mod sheets;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ApiError;

pub use document::JsonDocumentRepository;
pub use s3::S3ObjectStore;
pub use sheets::{SheetsClient, SheetsRepository};

pub type Predicate<'a, T> = &'a (dyn Fn(&T) -> bool + Send + Sync);
pub type Mutation<'a, T> = &'a (dyn Fn(&mut T) + Send + Sync);

/// A whole-collection store of records.
#[async_trait]
pub trait Repository<T>: Send + Sync
where
    T: Send + Sync + 'static,
{
    async fn list(&self) -> Result<Vec<T>, ApiError>;

    async fn append(&self, item: T) -> Result<(), ApiError>;

    /// Applies `update` to every record matching `matches`; returns how many matched.
    async fn update_where(&self, matches: Predicate<'_, T>, update: Mutation<'_, T>) -> Result<usize, ApiError>;

    /// Removes every record matching `matches`; returns how many were removed.
    async fn remove_where(&self, matches: Predicate<'_, T>) -> Result<usize, ApiError>;
}

/// Blob storage holding collection documents and product images.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    fn bucket(&self) -> &str;

    /// `None` when the object does not exist.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ApiError>;

    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), ApiError>;

    /// Time-limited URL allowing a direct PUT of `key`.
    async fn presign_put(&self, key: &str, content_type: &str, expires_in: Duration) -> Result<String, ApiError>;

    fn public_url(&self, key: &str) -> String {
        public_object_url(self.bucket(), key)
    }
}

pub fn public_object_url(bucket: &str, key: &str) -> String {
    format!("https://{}.s3.amazonaws.com/{}", bucket, key)
}

/// Splits a public object URL back into `(bucket, key)`.
///
/// Accepts `bucket.s3.amazonaws.com` and the regional
/// `bucket.s3.<region>.amazonaws.com` / `bucket.s3-<region>.amazonaws.com`
/// hosts. Query strings from presigned URLs are ignored.
pub fn parse_object_url(raw: &str) -> Option<(String, String)> {
    let url = url::Url::parse(raw).ok()?;
    let host = url.host_str()?;
    let endpoint = host.strip_suffix(".amazonaws.com")?;
    let (bucket, region) = endpoint.rsplit_once(".s3")?;
    if bucket.is_empty() || !(region.is_empty() || region.starts_with('.') || region.starts_with('-')) {
        return None;
    }

    let key = url.path().trim_start_matches('/');
    if key.is_empty() {
        return None;
    }
    let key = urlencoding::decode(key).ok()?.into_owned();
    Some((bucket.to_string(), key))
}
