//! Abstract object store trait.
//!
//! The portal never moves object bytes itself: it lists a bucket, signs
//! upload URLs, and (only when emulating the CDN locally) fetches an
//! object as the origin would.  Every backend implements [`ObjectStore`].

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// One entry of a bucket listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    /// Object key, unique within its bucket.
    pub key: String,
    /// Size in bytes.
    pub size: i64,
    pub last_modified: DateTime<Utc>,
}

/// An object's bytes as served by the origin.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Bytes,
    pub content_type: Option<String>,
}

/// Async object storage contract.
///
/// Implementations are shared across concurrent invocations behind an
/// `Arc`, so they must be `Send + Sync`.
pub trait ObjectStore: Send + Sync + 'static {
    /// List `bucket` in a single call, in the order the store returns keys.
    fn list_objects(
        &self,
        bucket: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<ObjectSummary>>> + Send + '_>>;

    /// Produce a URL that allows a `PUT` of `key` with `content_type`
    /// into `bucket` for `expires_in`.
    fn presign_put(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + '_>>;

    /// Fetch `key` from `bucket`; `None` if it does not exist.
    fn get_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<StoredObject>>> + Send + '_>>;
}
