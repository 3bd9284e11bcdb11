//! Upload URL endpoint.
//!
//! `GET /upload-url?filename=<key>[&contentType=<mime>]` answers with a
//! presigned `PUT` URL valid for five minutes.  The browser then uploads
//! the file straight to storage; nothing passes through this service.

use axum::http::StatusCode;
use metrics::counter;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::errors::PortalError;
use crate::handlers::api::ApiResponse;
use crate::metrics::UPLOAD_GRANTS_TOTAL;
use crate::storage::backend::ObjectStore;

/// Lifetime of an issued upload URL.
pub const UPLOAD_URL_EXPIRY_SECS: u64 = 300;

/// Content type signed when the client does not name one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// A presigned upload URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadGrant {
    pub url: String,
    #[serde(skip)]
    pub expires_in_seconds: u64,
}

pub struct UploadUrlIssuer {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl UploadUrlIssuer {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    /// Read the upload bucket from the environment variable `var`.
    pub fn from_env(store: Arc<dyn ObjectStore>, var: &str) -> anyhow::Result<Self> {
        let bucket = std::env::var(var)
            .map_err(|_| anyhow::anyhow!("environment variable {var} must name the upload bucket"))?;
        if bucket.is_empty() {
            anyhow::bail!("environment variable {var} is empty");
        }
        Ok(Self::new(store, bucket))
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Presign a `PUT` of `filename` with `content_type` (default
    /// `application/octet-stream`).  An empty filename counts as missing.
    pub async fn issue_upload_url(
        &self,
        filename: &str,
        content_type: Option<&str>,
    ) -> Result<UploadGrant, PortalError> {
        if filename.is_empty() {
            return Err(PortalError::MissingParameter { name: "filename" });
        }
        let content_type = content_type
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE);

        let url = self
            .store
            .presign_put(
                &self.bucket,
                filename,
                content_type,
                Duration::from_secs(UPLOAD_URL_EXPIRY_SECS),
            )
            .await
            .map_err(PortalError::Presign)?;

        info!("Issued upload URL for {}/{} ({})", self.bucket, filename, content_type);
        Ok(UploadGrant {
            url,
            expires_in_seconds: UPLOAD_URL_EXPIRY_SECS,
        })
    }

    /// Answer an upload URL request given its query parameters.
    pub async fn handle(&self, query: &HashMap<String, String>) -> ApiResponse {
        let filename = query.get("filename").map(String::as_str).unwrap_or_default();
        let content_type = query.get("contentType").map(String::as_str);

        let response = match self.issue_upload_url(filename, content_type).await {
            Ok(grant) => ApiResponse::json(StatusCode::OK, &grant),
            Err(err) => {
                if let PortalError::Presign(source) = &err {
                    error!("Presigning upload of {:?} failed: {:#}", filename, source);
                }
                ApiResponse::error(err.status_code(), &err.to_string())
            }
        };

        counter!(UPLOAD_GRANTS_TOTAL, "status" => response.status_code.to_string()).increment(1);
        response
    }
}
