//! File portal: a browsable S3 bucket served from the edge.
//!
//! Three handlers make up the portal.  [`handlers::router::RequestRouter`]
//! answers `/` with a listing page and `/download` with a redirect,
//! [`handlers::decorator::ResponseDecorator`] forces downloads to save
//! instead of render, and [`handlers::upload::UploadUrlIssuer`] hands out
//! presigned upload URLs.  The `fileportal` server runs all three behind
//! one axum router; `fileportal-edge` runs one of them per event.

use std::sync::Arc;

pub mod config;
pub mod edge;
pub mod errors;
pub mod handlers;
pub mod listing;
pub mod logging;
pub mod metrics;
pub mod server;
pub mod sigv4;
pub mod storage;

use crate::config::Config;
use crate::handlers::decorator::ResponseDecorator;
use crate::handlers::router::RequestRouter;
use crate::handlers::upload::UploadUrlIssuer;
use crate::listing::ListingTemplate;
use crate::storage::backend::ObjectStore;

/// Shared application state passed to all handlers via `axum::extract::State`.
pub struct AppState {
    pub config: Config,
    /// Backend for listings, origin fetches and presigning.
    pub store: Arc<dyn ObjectStore>,
    pub router: RequestRouter,
    pub decorator: ResponseDecorator,
    pub uploads: UploadUrlIssuer,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn ObjectStore>, uploads: UploadUrlIssuer) -> Self {
        let template = ListingTemplate::new(config.edge.listing_title.clone());
        Self {
            router: RequestRouter::new(store.clone(), template),
            decorator: ResponseDecorator,
            uploads,
            store,
            config,
        }
    }
}
