//! HTTP surface
//!
//! JSON view-models for the dashboard and ticker pages, the v1 quote
//! API and manual refresh triggers, all served by axum.

mod handlers;
mod server;
mod session_layer;
mod types;

pub use server::{router, WebServer};
pub use session_layer::SessionHandle;
pub use types::{ApiEnvelope, UpdateResponse, API_VERSION};
