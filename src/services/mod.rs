//! Services
//!
//! Implementations of the engine seams and the run loop:
//!
//! - `backend` - HTTP `BackendProbe` (health, config snapshots, models, metrics)
//! - `browser` - Chromium `UiAccessor` and `ChatDriver` (feature `browser`)
//! - `orchestrator` - The sweep state machine

pub mod backend;
pub mod browser;
pub mod orchestrator;

pub use backend::HttpBackend;
pub use orchestrator::{Orchestrator, RunState};
