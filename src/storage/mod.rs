//! Storage Layer
//!
//! The append-only outcome ledger and policy/catalog file loading.

pub mod config;
pub mod ledger;

pub use config::{load_catalog, load_policy};
pub use ledger::{resume_keys, summary_path, OutcomeLedger};
