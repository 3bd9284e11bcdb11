//! Edge handlers and the JSON API response type they share.

pub mod api;
pub mod decorator;
pub mod router;
pub mod upload;
