//! # Dripflow Gateway
//!
//! Axum HTTP surface. Lead capture persists its queue entries and returns
//! success immediately — delivery failures are an operational concern
//! visible only through the log listing, never to the submitting lead.

pub mod routes;
pub mod server;

pub use server::{AppState, build_router, serve};
