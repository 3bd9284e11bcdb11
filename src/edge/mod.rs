//! Edge request/response model.
//!
//! These types mirror the shape CloudFront hands to Lambda@Edge functions:
//! a request carrying `uri`, `querystring` and the S3 origin it is bound
//! for, and a response whose headers map a lowercase name to an ordered
//! list of `{key, value}` pairs (the original casing is kept in `key` for
//! transmission).  Fields this crate does not interpret are carried in
//! `extra` so a request or response survives a round trip unchanged.

pub mod event;

use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use percent_encoding::{utf8_percent_encode, CONTROLS};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{error, warn};

use crate::errors::PortalError;

/// Response headers: lowercase name -> ordered `{key, value}` entries.
pub type EdgeHeaders = BTreeMap<String, Vec<HeaderEntry>>;

/// A single header as CloudFront transmits it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderEntry {
    /// Header name with its transmission casing, e.g. `Content-Type`.
    pub key: String,
    pub value: String,
}

impl HeaderEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

// -- Request -----------------------------------------------------------------

/// The S3 origin a request is bound for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageOrigin {
    /// e.g. `my-bucket.s3.us-east-1.amazonaws.com`
    #[serde(default)]
    pub domain_name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Origin block of an edge request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestOrigin {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3: Option<StorageOrigin>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A viewer request as seen in the origin-request phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRequest {
    /// Raw request path, e.g. `/download`.
    pub uri: String,
    /// Raw query string without the leading `?`.  `None` when the field
    /// was absent, so a forwarded request keeps its original shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub querystring: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<RequestOrigin>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EdgeRequest {
    /// Build a request the way CloudFront would present it for an S3
    /// origin at `storage_domain`.  An empty domain leaves the origin out.
    pub fn for_origin(
        uri: impl Into<String>,
        querystring: impl Into<String>,
        storage_domain: &str,
    ) -> Self {
        let origin = (!storage_domain.is_empty()).then(|| RequestOrigin {
            s3: Some(StorageOrigin {
                domain_name: storage_domain.to_string(),
                extra: Map::new(),
            }),
            extra: Map::new(),
        });
        Self {
            uri: uri.into(),
            querystring: Some(querystring.into()),
            origin,
            extra: Map::new(),
        }
    }

    /// The query string, empty when absent.
    pub fn querystring(&self) -> &str {
        self.querystring.as_deref().unwrap_or_default()
    }

    /// The storage domain of the S3 origin, if any.
    pub fn storage_domain(&self) -> Option<&str> {
        self.origin
            .as_ref()?
            .s3
            .as_ref()
            .map(|s3| s3.domain_name.as_str())
    }

    /// Bucket name: the first label of the origin's storage domain.
    pub fn bucket_name(&self) -> Result<String, PortalError> {
        let domain = self.storage_domain().ok_or(PortalError::MissingOrigin)?;
        match domain.split('.').next() {
            Some(label) if !label.is_empty() => Ok(label.to_string()),
            _ => Err(PortalError::MalformedOrigin {
                domain: domain.to_string(),
            }),
        }
    }
}

// -- Response ----------------------------------------------------------------

/// A response generated at the edge or returned by the origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeResponse {
    /// HTTP status.  CloudFront encodes it as a string.
    #[serde(with = "status_code")]
    pub status: u16,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status_description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<EdgeHeaders>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EdgeResponse {
    /// A bare response with the canonical reason phrase and no headers.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status: status.as_u16(),
            status_description: status.canonical_reason().unwrap_or_default().to_string(),
            headers: None,
            body: None,
            extra: Map::new(),
        }
    }

    /// Set header `key` to a single value, replacing earlier entries.
    pub fn with_header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set_header(key, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Replace every entry under `key` (case-insensitive) with one entry.
    pub fn set_header(&mut self, key: &str, value: impl Into<String>) {
        self.headers
            .get_or_insert_with(EdgeHeaders::new)
            .insert(key.to_ascii_lowercase(), vec![HeaderEntry::new(key, value)]);
    }

    /// First value stored under `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .as_ref()?
            .get(&name.to_ascii_lowercase())?
            .first()
            .map(|entry| entry.value.as_str())
    }
}

impl IntoResponse for EdgeResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or_else(|_| {
            warn!("Edge response carries invalid status {}", self.status);
            StatusCode::INTERNAL_SERVER_ERROR
        });

        let mut headers = HeaderMap::new();
        for (name, entries) in self.headers.unwrap_or_default() {
            let Ok(header) = HeaderName::from_bytes(name.as_bytes()) else {
                error!("Edge response carries invalid header name {:?}", name);
                return invalid_edge_response();
            };
            for entry in entries {
                let Some(value) = edge_header_value(&header, &entry.value) else {
                    error!("Edge response carries invalid value for header {}", header);
                    return invalid_edge_response();
                };
                headers.append(header.clone(), value);
            }
        }

        // Generated responses without a content type are plain text, so
        // the body's default content type is not added.
        let mut response = (status, self.body.unwrap_or_default()).into_response();
        *response.headers_mut() = headers;
        response
    }
}

/// A header value as HTTP can carry it.  Control characters, which a
/// decoded object key may contain, are percent-encoded.
fn edge_header_value(name: &HeaderName, value: &str) -> Option<HeaderValue> {
    if let Ok(value) = HeaderValue::from_str(value) {
        return Some(value);
    }
    warn!("Percent-encoding control characters in edge header {}", name);
    HeaderValue::from_str(&utf8_percent_encode(value, CONTROLS).to_string()).ok()
}

fn invalid_edge_response() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "edge response could not be encoded as HTTP",
    )
        .into_response()
}

/// Outcome of the origin-request phase.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    /// Answer the viewer directly without contacting the origin.
    Respond(EdgeResponse),
    /// Continue to the origin with this (unmodified) request.
    Forward(EdgeRequest),
}

/// Serde adapter: status codes are written as strings and accepted as
/// either strings or numbers.
mod status_code {
    use serde::{de, Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(status: &u16, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&status.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u16, D::Error> {
        deserializer.deserialize_any(StatusVisitor)
    }

    struct StatusVisitor;

    impl<'de> de::Visitor<'de> for StatusVisitor {
        type Value = u16;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an HTTP status code as a number or string")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<u16, E> {
            u16::try_from(v).map_err(|_| E::custom(format!("status code out of range: {v}")))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<u16, E> {
            u16::try_from(v).map_err(|_| E::custom(format!("status code out of range: {v}")))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<u16, E> {
            v.trim()
                .parse()
                .map_err(|_| E::custom(format!("invalid status code: {v:?}")))
        }
    }
}
