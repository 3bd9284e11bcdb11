//! In-memory object store.
//!
//! Buckets hold their objects in insertion order inside a
//! `tokio::sync::RwLock`, and listings come back in that order.  Upload
//! URLs are signed locally with SigV4 against a configurable path-style
//! endpoint, so the store works without any AWS account.

use bytes::Bytes;
use chrono::Utc;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use super::backend::{ObjectStore, ObjectSummary, StoredObject};
use crate::config::MemoryStorageConfig;
use crate::sigv4::{self, PresignRequest, SigningCredentials, MAX_PRESIGNED_EXPIRES};

/// Maximum keys returned by one listing, matching S3's default page.
pub const LIST_PAGE_SIZE: usize = 1000;

struct MemoryObject {
    summary: ObjectSummary,
    data: Bytes,
    content_type: String,
}

/// In-memory object store with local SigV4 presigning.
pub struct MemoryObjectStore {
    /// bucket -> objects in insertion order.
    buckets: tokio::sync::RwLock<HashMap<String, Vec<MemoryObject>>>,
    /// Scheme and authority presigned URLs point at.
    endpoint: String,
    region: String,
    credentials: SigningCredentials,
}

impl MemoryObjectStore {
    pub fn new(config: &MemoryStorageConfig) -> Self {
        let buckets = config
            .buckets
            .iter()
            .map(|bucket| (bucket.clone(), Vec::new()))
            .collect();
        Self {
            buckets: tokio::sync::RwLock::new(buckets),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            region: config.region.clone(),
            credentials: SigningCredentials {
                access_key: config.access_key.clone(),
                secret_key: config.secret_key.clone(),
            },
        }
    }

    /// Create `bucket` if it does not exist yet.
    pub async fn create_bucket(&self, bucket: &str) {
        self.buckets
            .write()
            .await
            .entry(bucket.to_string())
            .or_default();
    }

    /// Store an object.  Overwriting a key keeps its listing position.
    pub async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> anyhow::Result<()> {
        if key.is_empty() {
            anyhow::bail!("object key must not be empty");
        }
        let mut buckets = self.buckets.write().await;
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| anyhow::anyhow!("NoSuchBucket: the bucket {bucket} does not exist"))?;

        let object = MemoryObject {
            summary: ObjectSummary {
                key: key.to_string(),
                size: data.len() as i64,
                last_modified: Utc::now(),
            },
            data,
            content_type: content_type.to_string(),
        };

        match objects.iter_mut().find(|o| o.summary.key == key) {
            Some(existing) => *existing = object,
            None => objects.push(object),
        }
        Ok(())
    }

    /// Host (authority) part of the endpoint.
    fn endpoint_host(&self) -> anyhow::Result<String> {
        let uri: http::Uri = self
            .endpoint
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid endpoint {:?}: {e}", self.endpoint))?;
        uri.authority()
            .map(|authority| authority.to_string())
            .ok_or_else(|| anyhow::anyhow!("endpoint {:?} has no host", self.endpoint))
    }
}

impl ObjectStore for MemoryObjectStore {
    fn list_objects(
        &self,
        bucket: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<ObjectSummary>>> + Send + '_>> {
        let bucket = bucket.to_string();
        Box::pin(async move {
            let buckets = self.buckets.read().await;
            let objects = buckets.get(&bucket).ok_or_else(|| {
                anyhow::anyhow!("NoSuchBucket: the bucket {bucket} does not exist")
            })?;
            Ok(objects
                .iter()
                .take(LIST_PAGE_SIZE)
                .map(|o| o.summary.clone())
                .collect())
        })
    }

    fn presign_put(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + '_>> {
        let bucket = bucket.to_string();
        let key = key.to_string();
        let content_type = content_type.to_string();
        Box::pin(async move {
            if bucket.is_empty() || key.is_empty() {
                anyhow::bail!("bucket and key are required to presign a PUT");
            }
            let expires_secs = expires_in.as_secs();
            if expires_secs == 0 || expires_secs > MAX_PRESIGNED_EXPIRES {
                anyhow::bail!("presigned URL expiry must be between 1 and {MAX_PRESIGNED_EXPIRES} seconds");
            }

            let host = self.endpoint_host()?;
            let path = format!(
                "/{}/{}",
                sigv4::s3_uri_encode(&bucket, true),
                sigv4::s3_uri_encode(&key, false)
            );
            let request = PresignRequest {
                method: "PUT",
                host: &host,
                path: &path,
                region: &self.region,
                headers: vec![("content-type".to_string(), content_type)],
                expires_secs,
                timestamp: Utc::now(),
            };
            let query = sigv4::presign_query(&self.credentials, &request);
            Ok(format!("{}{path}?{query}", self.endpoint))
        })
    }

    fn get_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<StoredObject>>> + Send + '_>> {
        let bucket = bucket.to_string();
        let key = key.to_string();
        Box::pin(async move {
            let buckets = self.buckets.read().await;
            let objects = buckets.get(&bucket).ok_or_else(|| {
                anyhow::anyhow!("NoSuchBucket: the bucket {bucket} does not exist")
            })?;
            Ok(objects
                .iter()
                .find(|o| o.summary.key == key)
                .map(|o| StoredObject {
                    data: o.data.clone(),
                    content_type: Some(o.content_type.clone()),
                }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemoryObjectStore {
        MemoryObjectStore::new(&MemoryStorageConfig::default())
    }

    #[tokio::test]
    async fn test_list_preserves_insertion_order() {
        let store = store();
        store.create_bucket("files").await;
        for key in ["b.txt", "a.txt", "c/d.txt"] {
            store
                .put_object("files", key, Bytes::from_static(b"x"), "text/plain")
                .await
                .unwrap();
        }
        let keys: Vec<String> = store
            .list_objects("files")
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.key)
            .collect();
        assert_eq!(keys, vec!["b.txt", "a.txt", "c/d.txt"]);
    }

    #[tokio::test]
    async fn test_overwrite_keeps_position_and_updates_size() {
        let store = store();
        store.create_bucket("files").await;
        store
            .put_object("files", "a.txt", Bytes::from_static(b"1"), "text/plain")
            .await
            .unwrap();
        store
            .put_object("files", "b.txt", Bytes::from_static(b"2"), "text/plain")
            .await
            .unwrap();
        store
            .put_object("files", "a.txt", Bytes::from_static(b"longer"), "text/plain")
            .await
            .unwrap();

        let listing = store.list_objects("files").await.unwrap();
        assert_eq!(listing.len(), 2);
        assert_eq!(listing[0].key, "a.txt");
        assert_eq!(listing[0].size, 6);
    }

    #[tokio::test]
    async fn test_configured_buckets_exist_empty() {
        let config = MemoryStorageConfig {
            buckets: vec!["portal-files".to_string()],
            ..MemoryStorageConfig::default()
        };
        let store = MemoryObjectStore::new(&config);
        assert!(store.list_objects("portal-files").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_unknown_bucket_fails() {
        let err = store().list_objects("missing").await.unwrap_err();
        assert!(err.to_string().contains("NoSuchBucket"));
    }

    #[tokio::test]
    async fn test_list_is_capped_at_one_page() {
        let store = store();
        store.create_bucket("files").await;
        for i in 0..(LIST_PAGE_SIZE + 5) {
            store
                .put_object("files", &format!("k{i}"), Bytes::new(), "text/plain")
                .await
                .unwrap();
        }
        assert_eq!(store.list_objects("files").await.unwrap().len(), LIST_PAGE_SIZE);
    }

    #[tokio::test]
    async fn test_get_object() {
        let store = store();
        store.create_bucket("files").await;
        store
            .put_object("files", "a.txt", Bytes::from_static(b"hello"), "text/plain")
            .await
            .unwrap();

        let object = store.get_object("files", "a.txt").await.unwrap().unwrap();
        assert_eq!(object.data, Bytes::from_static(b"hello"));
        assert_eq!(object.content_type.as_deref(), Some("text/plain"));
        assert!(store.get_object("files", "nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_presign_put_url_shape() {
        let url = store()
            .presign_put(
                "files",
                "docs/a b.txt",
                "text/plain",
                Duration::from_secs(300),
            )
            .await
            .unwrap();
        assert!(url.starts_with("http://localhost:9000/files/docs/a%20b.txt?X-Amz-Algorithm=AWS4-HMAC-SHA256"));
        assert!(url.contains("X-Amz-Expires=300"));
        assert!(url.contains("X-Amz-SignedHeaders=content-type%3Bhost"));
        assert!(url.contains("&X-Amz-Signature="));
    }

    #[tokio::test]
    async fn test_presign_rejects_empty_key() {
        assert!(store()
            .presign_put("files", "", "text/plain", Duration::from_secs(300))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_presign_rejects_invalid_endpoint() {
        let config = MemoryStorageConfig {
            endpoint: "not a url".to_string(),
            ..MemoryStorageConfig::default()
        };
        let store = MemoryObjectStore::new(&config);
        assert!(store
            .presign_put("files", "a.txt", "text/plain", Duration::from_secs(300))
            .await
            .is_err());
    }
}
