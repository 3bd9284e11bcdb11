//! Origin-request phase: listing, download redirects, passthrough.
//!
//! Every request first resolves its bucket from the S3 origin domain; a
//! request without a usable origin means the distribution is wired wrong,
//! so that error is returned to the host instead of being turned into a
//! response.  After that:
//!
//! - `/download?file=<key>` answers `302 Location: /<key>`,
//! - `/` answers with the rendered bucket listing,
//! - anything else continues to the origin unchanged.

use axum::http::StatusCode;
use metrics::counter;
use percent_encoding::percent_decode_str;
use std::sync::Arc;
use tracing::{debug, error};

use crate::edge::{EdgeRequest, EdgeResponse, RouteOutcome};
use crate::errors::PortalError;
use crate::listing::ListingTemplate;
use crate::metrics::ROUTE_DECISIONS_TOTAL;
use crate::storage::backend::ObjectStore;

pub const LISTING_PATH: &str = "/";
pub const DOWNLOAD_PATH: &str = "/download";

/// Body of the 400 answer to a download request without a file.
pub const MISSING_FILE_MESSAGE: &str = "file parameter is required.";

/// Listing pages reflect live bucket contents and must never be cached.
pub const NO_CACHE: &str = "max-age=0, no-cache, no-store, must-revalidate";

/// Decides, per viewer request, whether the edge answers directly or the
/// request goes on to the origin.
pub struct RequestRouter {
    store: Arc<dyn ObjectStore>,
    template: ListingTemplate,
}

impl RequestRouter {
    pub fn new(store: Arc<dyn ObjectStore>, template: ListingTemplate) -> Self {
        Self { store, template }
    }

    /// Route one request.  Only origin misconfiguration is an `Err`.
    pub async fn route(&self, request: EdgeRequest) -> Result<RouteOutcome, PortalError> {
        let bucket = request.bucket_name()?;

        let outcome = match request.uri.as_str() {
            DOWNLOAD_PATH => RouteOutcome::Respond(download_response(request.querystring())),
            LISTING_PATH => RouteOutcome::Respond(self.listing_response(&bucket).await),
            _ => {
                debug!("Passing {} through to origin", request.uri);
                RouteOutcome::Forward(request)
            }
        };

        counter!(ROUTE_DECISIONS_TOTAL, "outcome" => outcome_label(&outcome)).increment(1);
        Ok(outcome)
    }

    async fn listing_response(&self, bucket: &str) -> EdgeResponse {
        match self.render_listing(bucket).await {
            Ok(html) => EdgeResponse::new(StatusCode::OK)
                .with_header("Cache-Control", NO_CACHE)
                .with_header("Content-Type", "text/html; charset=utf-8")
                .with_body(html),
            Err(e) => {
                error!("Listing bucket {} failed: {:#}", bucket, e);
                EdgeResponse::new(StatusCode::INTERNAL_SERVER_ERROR)
                    .with_header("Content-Type", "text/plain")
                    .with_body(format!("An error occurred while listing files. {e}"))
            }
        }
    }

    async fn render_listing(&self, bucket: &str) -> anyhow::Result<String> {
        let objects = self.store.list_objects(bucket).await?;
        debug!("Listing {} objects from bucket {}", objects.len(), bucket);
        Ok(self.template.render(&objects)?)
    }
}

/// The value of the first `file=` parameter, percent-decoded.  `+` is
/// left as is; invalid UTF-8 is replaced.
pub fn file_key(querystring: &str) -> Option<String> {
    querystring
        .split('&')
        .find_map(|param| param.strip_prefix("file="))
        .map(|value| percent_decode_str(value).decode_utf8_lossy().into_owned())
}

fn download_response(querystring: &str) -> EdgeResponse {
    match file_key(querystring) {
        Some(key) if !key.is_empty() => {
            debug!("Redirecting download of {:?}", key);
            EdgeResponse::new(StatusCode::FOUND).with_header("Location", format!("/{key}"))
        }
        _ => EdgeResponse::new(StatusCode::BAD_REQUEST)
            .with_header("Content-Type", "text/plain")
            .with_body(MISSING_FILE_MESSAGE),
    }
}

fn outcome_label(outcome: &RouteOutcome) -> &'static str {
    match outcome {
        RouteOutcome::Forward(_) => "passthrough",
        RouteOutcome::Respond(response) => match response.status {
            200 => "listing",
            302 => "download",
            400 => "missing_file",
            _ => "error",
        },
    }
}
