//! Origin-response phase: force downloads.
//!
//! A response whose paired request is a download request gets
//! `content-disposition: attachment`; everything else about the response
//! is left alone.  The match is intentionally loose: `file=` anywhere in
//! the query string counts, so `/download?profile=1` is decorated too.

use axum::http::header::CONTENT_DISPOSITION;
use axum::http::{HeaderMap, HeaderValue};
use metrics::counter;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::edge::event::EdgeEvent;
use crate::edge::{EdgeRequest, EdgeResponse};
use crate::errors::PortalError;
use crate::handlers::router::DOWNLOAD_PATH;
use crate::metrics::DISPOSITIONS_TOTAL;

pub const ATTACHMENT: &str = "attachment";

#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseDecorator;

impl ResponseDecorator {
    /// Whether the response to `request` must be downloaded.
    pub fn applies_to(&self, request: &EdgeRequest) -> bool {
        request.uri == DOWNLOAD_PATH && request.querystring().contains("file=")
    }

    /// Add `Content-Disposition: attachment` when `request` is a download
    /// request, overwriting any earlier value.  Idempotent.
    pub fn decorate(&self, request: &EdgeRequest, mut response: EdgeResponse) -> EdgeResponse {
        if self.applies_to(request) {
            response.set_header("Content-Disposition", ATTACHMENT);
            counter!(DISPOSITIONS_TOTAL).increment(1);
            debug!("Marked response to {}?{} as attachment", request.uri, request.querystring());
        }
        response
    }

    /// Same contract, applied to an HTTP response's headers.
    pub fn decorate_headers(&self, request: &EdgeRequest, headers: &mut HeaderMap) {
        if self.applies_to(request) {
            headers.insert(CONTENT_DISPOSITION, HeaderValue::from_static(ATTACHMENT));
            counter!(DISPOSITIONS_TOTAL).increment(1);
        }
    }

    /// Decorate the response carried by an origin-response event.
    ///
    /// Only the `content-disposition` entry of the raw response is touched;
    /// every other field keeps its exact JSON form.  A request or response
    /// that cannot be interpreted is returned exactly as it arrived.  Only
    /// an event without a response is an error.
    pub fn decorate_event(&self, event: &EdgeEvent) -> Result<Value, PortalError> {
        let raw = event.raw_response()?;

        let request = match event.request() {
            Ok(request) => request,
            Err(e) => {
                warn!("Leaving origin response undecorated: {}", e);
                return Ok(raw.clone());
            }
        };
        if !self.applies_to(&request) {
            return Ok(raw.clone());
        }

        let mut decorated = raw.clone();
        let Some(fields) = decorated.as_object_mut() else {
            warn!("Leaving origin response undecorated: response is not an object");
            return Ok(raw.clone());
        };
        let headers = fields
            .entry("headers")
            .or_insert_with(|| Value::Object(Map::new()));
        if headers.is_null() {
            *headers = Value::Object(Map::new());
        }
        let Some(headers) = headers.as_object_mut() else {
            warn!("Leaving origin response undecorated: headers is not an object");
            return Ok(raw.clone());
        };

        headers.insert(
            CONTENT_DISPOSITION.as_str().to_string(),
            json!([{"key": "Content-Disposition", "value": ATTACHMENT}]),
        );
        counter!(DISPOSITIONS_TOTAL).increment(1);
        debug!("Marked response to {}?{} as attachment", request.uri, request.querystring());
        Ok(decorated)
    }
}
