//! # Dripflow Scheduler
//!
//! The nurture-sequence scheduling and delivery engine.
//!
//! ## Architecture
//! ```text
//! Lead created (gateway)
//!   ├── enroll: resolve sequence → one queued entry per step
//!   │     magnet-scoped sequence wins over campaign-wide default
//!   │     scheduled_at = enrollment + offset_days (+5min Day-0 buffer)
//!   └── immediate path: earliest near-term entry → fire-and-forget dispatch
//!
//! Dispatcher (tokio interval, 30s, single-flight)
//!   ├── scan: status='queued' AND scheduled_at <= now, oldest first
//!   └── per entry: claim → render → provider send → sent | failed
//! ```
//!
//! The claim (`queued → sending` conditional update) is what lets the
//! poller and the immediate path race on the same row without ever
//! double-sending it.

pub mod dispatch;
pub mod engine;
pub mod enroll;
pub mod render;

pub use dispatch::{DispatchOutcome, dispatch_entry, process_due};
pub use engine::spawn_dispatcher;
pub use enroll::{enqueue_sequence_for_lead, pick_immediate, resolve_sequence};
pub use render::render_body;
