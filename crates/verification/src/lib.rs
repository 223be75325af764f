//! Control Sweep Verification
//!
//! The per-control verification stages. Each stage works only against the
//! accessor traits from `control-sweep-core`, so the whole pipeline can be
//! exercised against an in-memory application:
//!
//! - `executor` - Deterministic mutation planning per control kind (ActionExecutor)
//! - `persistence` - Three-snapshot durability proof (PersistenceVerifier)
//! - `propagation` - Cross-surface mirror consistency (PropagationScanner)
//! - `oracle` - Chat-based retrieval regression probes (RetrievalOracle)
//! - `coverage` - Local/cloud model precondition and provider probes (ProviderCoverageChecker)
//! - `sampler` - Budget-aware metrics presence checks (MetricsSampler)
//!
//! The browser driver, the HTTP backend client and the run orchestrator live
//! in the main crate's `services` module.

pub mod coverage;
pub mod executor;
pub mod oracle;
pub mod persistence;
pub mod propagation;
pub mod sampler;

// Re-export executor types
pub use executor::{ActionExecutor, ExecutorOptions};

// Re-export verification stages
pub use persistence::{values_match, PersistenceVerifier, VerificationReport};
pub use propagation::{MirrorCheck, PropagationReport, PropagationScanner};

// Re-export oracle and coverage
pub use coverage::{CoverageReport, ProviderCoverageChecker, ProviderCoverageEntry};
pub use oracle::{ProbeResult, RetrievalOracle, SmokeResult};

// Re-export sampler
pub use sampler::{BudgetTier, MetricsCheck, MetricsSampler};
