//! Policy and Catalog Loading
//!
//! Resolves the classification policy and the surface catalog for a run:
//! the embedded defaults unless the configuration names override files.

use control_sweep_core::{Policy, SurfaceCatalog};
use tracing::info;

use crate::models::settings::HarnessConfig;
use crate::utils::error::AppResult;

/// Load the policy named by `SWEEP_POLICY_FILE`, or the embedded default.
pub fn load_policy(config: &HarnessConfig) -> AppResult<Policy> {
    let policy = match &config.policy_file {
        Some(path) => Policy::load(path)?,
        None => Policy::builtin()?,
    };
    info!(version = %policy.version, "classification policy loaded");
    Ok(policy)
}

/// Load the catalog named by `SWEEP_SURFACES_FILE`, or the built-in one.
pub fn load_catalog(config: &HarnessConfig) -> AppResult<SurfaceCatalog> {
    let catalog = match &config.surfaces_file {
        Some(path) => SurfaceCatalog::load(path)?,
        None => SurfaceCatalog::default(),
    };
    info!(surfaces = catalog.len(), "surface catalog loaded");
    Ok(catalog)
}
