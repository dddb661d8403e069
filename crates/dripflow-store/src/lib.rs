//! # Dripflow Store
//!
//! SQLite-backed persistence — the single shared mutable resource of the
//! delivery engine. Queue entries survive restarts; every status
//! transition goes through the conditional updates here, shared by the
//! poller and the immediate-dispatch path.

pub mod store;

pub use store::{SettingsPatch, Store};
