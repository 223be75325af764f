//! Control Sweep Core
//!
//! Foundational data model, error types, classification policy and accessor
//! traits for the Control Sweep workspace. This crate has no dependency on the
//! browser driver, the HTTP client or the runtime.
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `surface` - Surface catalog (`UiSurface`, `SurfaceCatalog`)
//! - `control` - Discovery model (`RawElement`, `ControlDescriptor`, `ControlKind`)
//! - `policy` - Versioned lexicons and classification (`Policy`, `Classification`)
//! - `outcome` - Ledger records and summaries (`OutcomeRecord`, `RunSummary`)
//! - `accessor` - Seam traits (`UiAccessor`, `ChatDriver`, `BackendProbe`)

pub mod accessor;
pub mod control;
pub mod error;
pub mod outcome;
pub mod policy;
pub mod surface;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Surfaces ───────────────────────────────────────────────────────────
pub use surface::{control_key, SurfaceCatalog, UiSurface, CHAT_ROUTE};

// ── Controls ───────────────────────────────────────────────────────────
pub use control::{
    discover_controls, fingerprint, fingerprint_token, ControlDescriptor, ControlKind,
    RawElement, FINGERPRINT_ATTR, TEST_ID_ATTR,
};

// ── Policy ─────────────────────────────────────────────────────────────
pub use policy::{Classification, Lexicon, Policy};

// ── Outcomes ───────────────────────────────────────────────────────────
pub use outcome::{OutcomeRecord, OutcomeStatus, RunSummary, StatusCounts};

// ── Accessor Traits ────────────────────────────────────────────────────
pub use accessor::{
    BackendProbe, ChatDriver, ChatModel, ElementState, Feedback, MutationPlan, UiAccessor,
};
