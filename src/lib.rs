//! Control Sweep
//!
//! Exhaustive control discovery and mutation verification for a RAG admin
//! dashboard. Every interactive control on every declared surface is
//! discovered, classified, mutated, proven durable across a hard reload,
//! checked for consistent mirrors on other surfaces and, when it affects
//! retrieval, probed through the product's own chat.
//!
//! - `models` - Run configuration (`HarnessConfig`)
//! - `storage` - Outcome ledger, policy and surface catalog loading
//! - `services` - HTTP backend probe, browser accessor, orchestrator
//! - `utils` - Error types and logging bootstrap
//!
//! The engine types live in `control-sweep-core` and the verification
//! stages in `control-sweep-verification`.

pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

pub use models::settings::{ConfigUpdate, HarnessConfig, RunMode, Timeouts};
pub use services::{HttpBackend, Orchestrator, RunState};
pub use storage::ledger::OutcomeLedger;
pub use utils::error::{AppError, AppResult};
