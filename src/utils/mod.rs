//! Utilities
//!
//! Common utilities used throughout the harness.

pub mod error;
pub mod logging;

pub use error::*;
