//! Portal error types.
//!
//! Backend failures travel as `anyhow::Error` and are turned into
//! responses at each handler boundary.  [`PortalError`] covers the cases a
//! handler reports to its caller: misconfiguration (fatal), client input
//! errors, presign failures, and events the edge binary cannot parse.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use metrics::counter;
use thiserror::Error;

use crate::handlers::api::ApiResponse;
use crate::metrics::ERRORS_TOTAL;

/// Generate a 16-character hex request ID.
pub fn generate_request_id() -> String {
    let bytes: [u8; 8] = rand::random();
    hex::encode(bytes).to_uppercase()
}

#[derive(Debug, Error)]
pub enum PortalError {
    /// The edge request does not name an S3 origin.
    #[error("edge request has no S3 origin domain")]
    MissingOrigin,

    /// The origin domain does not start with a bucket label.
    #[error("cannot derive a bucket name from origin domain {domain:?}")]
    MalformedOrigin { domain: String },

    /// A required query parameter is absent.
    #[error("{name} query parameter is required")]
    MissingParameter { name: &'static str },

    /// The storage backend could not sign an upload URL.  The source is
    /// logged, never shown to clients.
    #[error("Failed to generate pre-signed URL")]
    Presign(#[source] anyhow::Error),

    /// The edge binary received JSON it cannot interpret.
    #[error("malformed edge event: {0}")]
    MalformedEvent(String),
}

impl PortalError {
    /// Short machine-readable code, used as a metric label.
    pub fn code(&self) -> &'static str {
        match self {
            PortalError::MissingOrigin => "MissingOrigin",
            PortalError::MalformedOrigin { .. } => "MalformedOrigin",
            PortalError::MissingParameter { .. } => "MissingParameter",
            PortalError::Presign(_) => "PresignFailed",
            PortalError::MalformedEvent(_) => "MalformedEvent",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            PortalError::MissingOrigin => StatusCode::BAD_GATEWAY,
            PortalError::MalformedOrigin { .. } => StatusCode::BAD_GATEWAY,
            PortalError::MissingParameter { .. } => StatusCode::BAD_REQUEST,
            PortalError::Presign(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PortalError::MalformedEvent(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Whether the error means the deployment itself is broken.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PortalError::MissingOrigin | PortalError::MalformedOrigin { .. }
        )
    }
}

impl IntoResponse for PortalError {
    fn into_response(self) -> Response {
        let code = self.code();
        counter!(ERRORS_TOTAL, "code" => code).increment(1);
        if self.is_fatal() {
            tracing::error!(code, "Edge pipeline misconfigured: {}", self);
        } else {
            tracing::debug!(code, "Answering {}: {}", self.status_code(), self);
        }
        ApiResponse::error(self.status_code(), &self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_request_id_shape() {
        let id = generate_request_id();
        assert_eq!(id.len(), 16);
        assert!(id
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn test_missing_parameter_message() {
        let err = PortalError::MissingParameter { name: "filename" };
        assert_eq!(err.to_string(), "filename query parameter is required");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_presign_message_hides_source() {
        let err = PortalError::Presign(anyhow::anyhow!("SignatureDoesNotMatch: secret=abc"));
        assert_eq!(err.to_string(), "Failed to generate pre-signed URL");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_origin_errors_are_fatal() {
        assert!(PortalError::MissingOrigin.is_fatal());
        assert!(PortalError::MalformedOrigin {
            domain: ".s3".to_string()
        }
        .is_fatal());
        assert_eq!(
            PortalError::MissingOrigin.status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_error_codes() {
        let cases = [
            (PortalError::MissingOrigin, "MissingOrigin"),
            (
                PortalError::MalformedOrigin {
                    domain: ".s3".to_string(),
                },
                "MalformedOrigin",
            ),
            (
                PortalError::MissingParameter { name: "filename" },
                "MissingParameter",
            ),
            (PortalError::Presign(anyhow::anyhow!("boom")), "PresignFailed"),
            (
                PortalError::MalformedEvent("bad".to_string()),
                "MalformedEvent",
            ),
        ];
        for (err, code) in cases {
            assert_eq!(err.code(), code);
        }
    }

    #[test]
    fn test_into_response_uses_status() {
        let response = PortalError::MissingParameter { name: "filename" }.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
    }
}
