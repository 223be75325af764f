//! Data Models
//!
//! Run configuration for the harness. Engine data types live in
//! `control-sweep-core`.

pub mod settings;

pub use settings::{ConfigUpdate, HarnessConfig, RunMode, Timeouts};
