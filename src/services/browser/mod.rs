//! Browser Accessor
//!
//! Drives the real dashboard through Chromium. The in-page scripts are
//! defined unconditionally; the session itself is gated behind
//! `#[cfg(feature = "browser")]` to avoid pulling in chromiumoxide by
//! default.

pub mod scripts;

#[cfg(feature = "browser")]
mod session;

#[cfg(feature = "browser")]
pub use session::BrowserSession;

use crate::utils::error::AppError;

/// Error reported by `run` when the binary was built without the browser.
pub fn browser_unavailable() -> AppError {
    AppError::browser(
        "running a sweep requires the 'browser' feature to be enabled. \
         Recompile with `--features browser` to drive the dashboard.",
    )
}
