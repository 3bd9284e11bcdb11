//! Axum router construction for the local edge emulator.
//!
//! The [`app`] function plays the part of the CDN: every viewer request
//! that is not one of the service endpoints goes through the
//! origin-request handler, is either answered there or fetched from
//! storage, and the result passes through the origin-response handler
//! before it is sent.

use axum::{
    extract::{RawQuery, State},
    http::{header, HeaderValue, Method, Request, StatusCode, Uri},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use percent_encoding::percent_decode_str;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

use crate::edge::{EdgeRequest, RouteOutcome};
use crate::errors::generate_request_id;
use crate::handlers::api::ApiResponse;
use crate::metrics::{metrics_handler, metrics_middleware};
use crate::AppState;

/// Build the axum [`Router`] for the emulator.
///
/// The returned router is ready to be passed to `axum::serve`.
pub fn app(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        // Health check endpoint (not part of the portal).
        .route("/health", get(health_check))
        .route(
            "/upload-url",
            get(handle_upload_url).options(handle_upload_preflight),
        );

    if state.config.observability.metrics {
        router = router.route("/metrics", get(metrics_handler));
    }

    router
        // Everything else is a viewer request for the edge pipeline.
        .fallback(handle_edge)
        .with_state(state)
        // Layer ordering: inner layers run first, outer layers wrap them.
        .layer(middleware::from_fn(common_headers_middleware))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
}

// -- Common headers middleware -----------------------------------------------

/// Adds `x-request-id`, `Date` and `Server` to every response.
async fn common_headers_middleware(req: Request<axum::body::Body>, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    if !headers.contains_key("x-request-id") {
        if let Ok(value) = HeaderValue::from_str(&generate_request_id()) {
            headers.insert("x-request-id", value);
        }
    }

    let date = httpdate::fmt_http_date(std::time::SystemTime::now());
    if let Ok(value) = HeaderValue::from_str(&date) {
        headers.insert(header::DATE, value);
    }
    headers.insert(header::SERVER, HeaderValue::from_static("fileportal"));

    response
}

// -- Health check ------------------------------------------------------------

async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "application/json")],
        r#"{"status":"ok"}"#,
    )
}

// -- Upload URL API ----------------------------------------------------------

/// Parse a raw query string into a map of decoded names to decoded values.
/// The last occurrence of a repeated name wins.
fn parse_query(raw: Option<String>) -> HashMap<String, String> {
    let decode = |s: &str| {
        let spaced = s.replace('+', " ");
        percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
    };

    let mut map = HashMap::new();
    for part in raw.as_deref().unwrap_or_default().split('&') {
        if let Some((k, v)) = part.split_once('=') {
            map.insert(decode(k), decode(v));
        } else if !part.is_empty() {
            map.insert(decode(part), String::new());
        }
    }
    map
}

/// `GET /upload-url?filename=...&contentType=...`
async fn handle_upload_url(
    State(state): State<Arc<AppState>>,
    RawQuery(raw_query): RawQuery,
) -> ApiResponse {
    state.uploads.handle(&parse_query(raw_query)).await
}

/// `OPTIONS /upload-url` -- CORS preflight.
async fn handle_upload_preflight() -> ApiResponse {
    ApiResponse::preflight()
}

// -- Edge pipeline -----------------------------------------------------------

/// Origin request, then origin fetch if the request was forwarded, then
/// origin response.
async fn handle_edge(State(state): State<Arc<AppState>>, method: Method, uri: Uri) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            [(header::ALLOW, "GET, HEAD")],
            "Method Not Allowed",
        )
            .into_response();
    }

    let request = EdgeRequest::for_origin(
        uri.path(),
        uri.query().unwrap_or_default(),
        &state.config.edge.origin_domain,
    );

    let mut response = match state.router.route(request.clone()).await {
        Ok(RouteOutcome::Respond(generated)) => generated.into_response(),
        Ok(RouteOutcome::Forward(forwarded)) => fetch_from_origin(&state, &forwarded).await,
        Err(err) => return err.into_response(),
    };

    state
        .decorator
        .decorate_headers(&request, response.headers_mut());
    response
}

/// Serve the object named by the request path, as the S3 origin would.
async fn fetch_from_origin(state: &AppState, request: &EdgeRequest) -> Response {
    let bucket = match request.bucket_name() {
        Ok(bucket) => bucket,
        Err(err) => return err.into_response(),
    };
    let key = percent_decode_str(request.uri.trim_start_matches('/'))
        .decode_utf8_lossy()
        .into_owned();
    debug!("Fetching {}/{} from origin", bucket, key);

    match state.store.get_object(&bucket, &key).await {
        Ok(Some(object)) => {
            let content_type = object
                .content_type
                .unwrap_or_else(|| "application/octet-stream".to_string());
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, content_type)],
                object.data,
            )
                .into_response()
        }
        Ok(None) => (StatusCode::NOT_FOUND, "Not Found").into_response(),
        Err(e) => {
            error!("Origin fetch of {}/{} failed: {:#}", bucket, key, e);
            (StatusCode::BAD_GATEWAY, "Bad Gateway").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, MemoryStorageConfig};
    use crate::handlers::upload::UploadUrlIssuer;
    use crate::storage::memory::MemoryObjectStore;
    use axum::body::{to_bytes, Body};
    use bytes::Bytes;
    use tower::ServiceExt;

    const ORIGIN: &str = "portal-files.s3.us-east-1.amazonaws.com";

    async fn test_app_with_origin(origin: &str) -> Router {
        let store = MemoryObjectStore::new(&MemoryStorageConfig::default());
        store.create_bucket("portal-files").await;
        store
            .put_object(
                "portal-files",
                "a b.txt",
                Bytes::from_static(b"hello portal"),
                "text/plain",
            )
            .await
            .unwrap();
        store
            .put_object("portal-files", "日本.txt", Bytes::from_static(b"x"), "text/plain")
            .await
            .unwrap();

        let mut config = Config::default();
        config.edge.origin_domain = origin.to_string();
        let store: Arc<dyn crate::storage::backend::ObjectStore> = Arc::new(store);
        let uploads = UploadUrlIssuer::new(store.clone(), "portal-files");
        app(Arc::new(AppState::new(config, store, uploads)))
    }

    async fn test_app() -> Router {
        test_app_with_origin(ORIGIN).await
    }

    async fn send(app: Router, method: Method, uri: &str) -> Response {
        app.oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let response = send(test_app().await, Method::GET, "/health").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, r#"{"status":"ok"}"#);
    }

    #[tokio::test]
    async fn test_common_headers() {
        let response = send(test_app().await, Method::GET, "/health").await;
        assert_eq!(response.headers()["server"], "fileportal");
        assert!(response.headers().contains_key("date"));
        assert_eq!(response.headers()["x-request-id"].len(), 16);
    }

    #[tokio::test]
    async fn test_listing_page() {
        let response = send(test_app().await, Method::GET, "/").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["cache-control"],
            "max-age=0, no-cache, no-store, must-revalidate"
        );
        assert_eq!(
            response.headers()["content-type"],
            "text/html; charset=utf-8"
        );
        assert!(response.headers().get("content-disposition").is_none());

        let body = body_string(response).await;
        assert!(body.contains(r#"href="/download?file=a%20b.txt""#));
        assert!(body.contains(r#"href="/download?file=%E6%97%A5%E6%9C%AC.txt""#));
    }

    #[tokio::test]
    async fn test_download_redirect_is_attachment() {
        let response = send(test_app().await, Method::GET, "/download?file=a%20b.txt").await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()["location"], "/a b.txt");
        assert_eq!(response.headers()["content-disposition"], "attachment");
    }

    #[tokio::test]
    async fn test_download_redirect_keeps_utf8_location() {
        let response = send(
            test_app().await,
            Method::GET,
            "/download?file=%E6%97%A5%E6%9C%AC.txt",
        )
        .await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers()["location"].as_bytes(),
            "/日本.txt".as_bytes()
        );
    }

    #[tokio::test]
    async fn test_download_redirect_with_control_characters() {
        let response = send(test_app().await, Method::GET, "/download?file=a%0Ab").await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()["location"], "/a%0Ab");
        assert_eq!(response.headers()["content-disposition"], "attachment");
    }

    #[tokio::test]
    async fn test_download_without_file() {
        let response = send(test_app().await, Method::GET, "/download").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().get("content-disposition").is_none());
        assert_eq!(body_string(response).await, "file parameter is required.");
    }

    #[tokio::test]
    async fn test_loose_download_match_still_decorates() {
        // No `file` parameter, but `profile=` contains `file=`.
        let response = send(test_app().await, Method::GET, "/download?profile=1").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()["content-disposition"], "attachment");
    }

    #[tokio::test]
    async fn test_origin_fetch() {
        let response = send(test_app().await, Method::GET, "/a%20b.txt").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/plain");
        assert!(response.headers().get("content-disposition").is_none());
        assert_eq!(body_string(response).await, "hello portal");
    }

    #[tokio::test]
    async fn test_origin_fetch_missing_object() {
        let response = send(test_app().await, Method::GET, "/nope.txt").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_non_get_is_rejected() {
        let response = send(test_app().await, Method::POST, "/").await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()["allow"], "GET, HEAD");
    }

    #[tokio::test]
    async fn test_missing_origin_is_bad_gateway() {
        for uri in ["/", "/download?file=a", "/a%20b.txt"] {
            let response = send(test_app_with_origin("").await, Method::GET, uri).await;
            assert_eq!(response.status(), StatusCode::BAD_GATEWAY, "{uri}");
            let body = body_string(response).await;
            assert!(body.starts_with(r#"{"error": "#), "{body}");
        }
    }

    #[tokio::test]
    async fn test_upload_url() {
        let response = send(
            test_app().await,
            Method::GET,
            "/upload-url?filename=new%20file.txt&contentType=text%2Fplain",
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        assert_eq!(response.headers()["content-type"], "application/json");

        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        let url = body["url"].as_str().unwrap();
        assert!(url.starts_with("http://localhost:9000/portal-files/new%20file.txt?"));
    }

    #[tokio::test]
    async fn test_upload_url_missing_filename() {
        let response = send(test_app().await, Method::GET, "/upload-url").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers()["access-control-allow-methods"],
            "GET,PUT,OPTIONS"
        );
        assert_eq!(
            body_string(response).await,
            r#"{"error": "filename query parameter is required"}"#
        );
    }

    #[tokio::test]
    async fn test_upload_preflight() {
        let response = send(test_app().await, Method::OPTIONS, "/upload-url").await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            response.headers()["access-control-allow-headers"],
            "Content-Type,X-Amz-Date,Authorization,X-Api-Key,X-Amz-Security-Token"
        );
        assert!(response.headers().get("content-type").is_none());
    }

    #[test]
    fn test_parse_query() {
        let query = parse_query(Some("filename=a%20b.txt&contentType=image%2Fpng&flag".into()));
        assert_eq!(query["filename"], "a b.txt");
        assert_eq!(query["contentType"], "image/png");
        assert_eq!(query["flag"], "");
        assert_eq!(parse_query(Some("filename=a+b.txt".into()))["filename"], "a b.txt");
        assert!(parse_query(None).is_empty());
    }
}
