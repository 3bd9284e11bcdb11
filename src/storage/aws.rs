//! AWS S3 object store.
//!
//! Lists buckets with a single `ListObjectsV2` call (no continuation
//! handling, so at most one page of keys), signs upload URLs locally with
//! the SDK presigner, and fetches objects with `GetObject`.
//!
//! Credentials are resolved via the standard AWS credential chain
//! (env vars, `~/.aws/credentials`, IAM role, etc.) unless explicit keys
//! are configured.

use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, info};

use super::backend::{ObjectStore, ObjectSummary, StoredObject};
use crate::config::AwsStorageConfig;

/// Object store backed by AWS S3 (or an S3-compatible endpoint).
pub struct AwsObjectStore {
    client: Client,
}

impl AwsObjectStore {
    /// Build the SDK client from configuration.
    ///
    /// Empty `endpoint_url` / credential fields fall back to the SDK
    /// defaults.
    pub async fn new(config: &AwsStorageConfig) -> anyhow::Result<Self> {
        let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()));

        if !config.endpoint_url.is_empty() {
            config_loader = config_loader.endpoint_url(&config.endpoint_url);
        }

        if !config.access_key_id.is_empty() && !config.secret_access_key.is_empty() {
            let creds = aws_sdk_s3::config::Credentials::new(
                &config.access_key_id,
                &config.secret_access_key,
                None, // session_token
                None, // expiry
                "fileportal-config",
            );
            config_loader = config_loader.credentials_provider(creds);
        }

        let sdk_config = config_loader.load().await;

        let s3_config_builder = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.use_path_style);

        let client = Client::from_conf(s3_config_builder.build());

        info!(
            "AWS object store initialized: region={} endpoint='{}'",
            config.region, config.endpoint_url
        );

        Ok(Self { client })
    }

    /// Map an AWS SDK error to an anyhow error with context.
    fn map_sdk_error(context: &str, err: impl std::error::Error) -> anyhow::Error {
        anyhow::anyhow!("AWS S3 {context}: {}", DisplayErrorContext(&err))
    }
}

/// Convert an SDK timestamp into a chrono UTC timestamp.
fn to_utc(ts: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts.secs(), ts.subsec_nanos())
}

impl ObjectStore for AwsObjectStore {
    fn list_objects(
        &self,
        bucket: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<ObjectSummary>>> + Send + '_>> {
        let bucket = bucket.to_string();
        Box::pin(async move {
            debug!("AWS list_objects_v2: bucket={}", bucket);

            let resp = self
                .client
                .list_objects_v2()
                .bucket(&bucket)
                .send()
                .await
                .map_err(|e| Self::map_sdk_error("list_objects_v2", e))?;

            let objects = resp
                .contents()
                .iter()
                .map(|obj| ObjectSummary {
                    key: obj.key().unwrap_or_default().to_string(),
                    size: obj.size().unwrap_or(0),
                    last_modified: obj
                        .last_modified()
                        .and_then(to_utc)
                        .unwrap_or(DateTime::UNIX_EPOCH),
                })
                .collect();

            Ok(objects)
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
            debug!(
                "AWS presign put_object: bucket={} key={} content_type={}",
                bucket, key, content_type
            );

            let presigning_config = PresigningConfig::expires_in(expires_in)
                .map_err(|e| Self::map_sdk_error("presigning config", e))?;

            let presigned = self
                .client
                .put_object()
                .bucket(&bucket)
                .key(&key)
                .content_type(&content_type)
                .presigned(presigning_config)
                .await
                .map_err(|e| Self::map_sdk_error("presign put_object", e))?;

            Ok(presigned.uri().to_string())
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
            debug!("AWS get_object: bucket={} key={}", bucket, key);

            let resp = match self
                .client
                .get_object()
                .bucket(&bucket)
                .key(&key)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    let service_err = e.into_service_error();
                    if service_err.is_no_such_key() {
                        return Ok(None);
                    }
                    return Err(Self::map_sdk_error("get_object", service_err));
                }
            };

            let content_type = resp.content_type().map(str::to_string);
            let data = resp
                .body
                .collect()
                .await
                .map_err(|e| Self::map_sdk_error("get_object body", e))?
                .into_bytes();

            Ok(Some(StoredObject { data, content_type }))
        })
    }
}
