//! Orchestrator Module
//!
//! The sweep state machine and its process-lifetime run state.

mod service;
pub mod state;

pub use service::Orchestrator;
pub use state::RunState;
