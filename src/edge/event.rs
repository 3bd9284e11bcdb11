//! Lambda-style event envelopes.
//!
//! CloudFront delivers edge events as
//! `{"Records":[{"cf":{"config":…,"request":…,"response":…}}]}`; the
//! upload API receives an API-Gateway proxy event whose
//! `queryStringParameters` is an object or `null`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use super::{EdgeRequest, RouteOutcome};
use crate::errors::PortalError;

/// A CloudFront Lambda@Edge event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeEvent {
    #[serde(rename = "Records")]
    pub records: Vec<EdgeRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub cf: CloudFrontPayload,
}

/// The `cf` block.  Request and response stay raw JSON until a handler
/// decides how to interpret them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudFrontPayload {
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub config: Value,
    pub request: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
}

impl EdgeEvent {
    /// Parse an event from its JSON text.
    pub fn from_json(input: &str) -> Result<Self, PortalError> {
        serde_json::from_str(input).map_err(|e| PortalError::MalformedEvent(e.to_string()))
    }

    fn payload(&self) -> Result<&CloudFrontPayload, PortalError> {
        self.records
            .first()
            .map(|record| &record.cf)
            .ok_or_else(|| PortalError::MalformedEvent("event has no records".to_string()))
    }

    /// The typed viewer request of the first record.
    pub fn request(&self) -> Result<EdgeRequest, PortalError> {
        serde_json::from_value(self.payload()?.request.clone())
            .map_err(|e| PortalError::MalformedEvent(format!("invalid request: {e}")))
    }

    /// The origin response of the first record, untouched.
    pub fn raw_response(&self) -> Result<&Value, PortalError> {
        self.payload()?
            .response
            .as_ref()
            .ok_or_else(|| PortalError::MalformedEvent("event has no response".to_string()))
    }
}

/// Serialize a routing outcome into what the edge expects back: either the
/// generated response or the request to forward.
pub fn outcome_to_json(outcome: &RouteOutcome) -> serde_json::Result<Value> {
    match outcome {
        RouteOutcome::Respond(response) => serde_json::to_value(response),
        RouteOutcome::Forward(request) => serde_json::to_value(request),
    }
}

/// An API-Gateway proxy event for the upload URL endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiEvent {
    #[serde(rename = "queryStringParameters", default)]
    pub query_string_parameters: Option<HashMap<String, String>>,
}

impl ApiEvent {
    pub fn from_json(input: &str) -> Result<Self, PortalError> {
        serde_json::from_str(input).map_err(|e| PortalError::MalformedEvent(e.to_string()))
    }

    /// Query parameters, empty when the gateway sent `null`.
    pub fn query(&self) -> HashMap<String, String> {
        self.query_string_parameters.clone().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::EdgeResponse;
    use axum::http::StatusCode;
    use serde_json::json;

    fn origin_request_event() -> String {
        json!({
            "Records": [{
                "cf": {
                    "config": {"distributionId": "EDFDVBD6EXAMPLE", "eventType": "origin-request"},
                    "request": {
                        "method": "GET",
                        "uri": "/download",
                        "querystring": "file=report%202024.pdf",
                        "origin": {"s3": {"domainName": "portal-files.s3.amazonaws.com"}}
                    }
                }
            }]
        })
        .to_string()
    }

    #[test]
    fn test_parse_origin_request_event() {
        let event = EdgeEvent::from_json(&origin_request_event()).unwrap();
        let request = event.request().unwrap();
        assert_eq!(request.uri, "/download");
        assert_eq!(request.querystring(), "file=report%202024.pdf");
        assert_eq!(request.bucket_name().unwrap(), "portal-files");
        assert!(event.raw_response().is_err());
    }

    #[test]
    fn test_event_without_records_is_malformed() {
        let event = EdgeEvent::from_json(r#"{"Records": []}"#).unwrap();
        assert!(matches!(
            event.request(),
            Err(PortalError::MalformedEvent(_))
        ));
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        assert!(matches!(
            EdgeEvent::from_json("not json"),
            Err(PortalError::MalformedEvent(_))
        ));
    }

    #[test]
    fn test_outcome_to_json() {
        let forward = RouteOutcome::Forward(EdgeRequest::for_origin("/a.txt", "", "b.s3"));
        assert_eq!(outcome_to_json(&forward).unwrap()["uri"], "/a.txt");

        let respond = RouteOutcome::Respond(EdgeResponse::new(StatusCode::BAD_REQUEST));
        assert_eq!(outcome_to_json(&respond).unwrap()["status"], "400");
    }

    #[test]
    fn test_api_event_null_parameters() {
        let event = ApiEvent::from_json(r#"{"queryStringParameters": null}"#).unwrap();
        assert!(event.query().is_empty());

        let event = ApiEvent::from_json(r#"{"queryStringParameters": {"filename": "a.txt"}}"#)
            .unwrap();
        assert_eq!(event.query().get("filename").map(String::as_str), Some("a.txt"));
    }
}
