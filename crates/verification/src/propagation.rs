//! Propagation Scanner
//!
//! After a verified mutation, revisits every other surface and checks that
//! controls sharing the same `id` or `name` (mirrors) render the same value.
//! A mismatch is a defect of the originating control.

use control_sweep_core::{
    ControlDescriptor, CoreError, CoreResult, SurfaceCatalog, UiAccessor, UiSurface,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::persistence::values_match;

/// One mirror observed on another surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorCheck {
    pub surface: String,
    pub selector: String,
    pub value: String,
    pub matches: bool,
}

/// Result of a propagation scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropagationReport {
    /// False when the control has neither `id` nor `name`
    pub scanned: bool,
    pub surfaces_visited: usize,
    pub mirrors: Vec<MirrorCheck>,
}

impl PropagationReport {
    pub fn mismatches(&self) -> impl Iterator<Item = &MirrorCheck> {
        self.mirrors.iter().filter(|m| !m.matches)
    }

    pub fn detail(&self) -> String {
        if !self.scanned {
            return "propagation: unscannable (no id or name)".to_string();
        }
        format!(
            "propagation: {} mirror(s) on {} surface(s)",
            self.mirrors.len(),
            self.surfaces_visited
        )
    }
}

/// Cross-surface mirror consistency check.
#[derive(Debug, Clone, Default)]
pub struct PropagationScanner;

impl PropagationScanner {
    pub fn new() -> Self {
        Self
    }

    /// Scan all surfaces except `origin` for mirrors of `control` and compare
    /// them with `expected`. Leaves the page on the last visited surface.
    pub async fn scan(
        &self,
        ui: &dyn UiAccessor,
        catalog: &SurfaceCatalog,
        origin: &UiSurface,
        control: &ControlDescriptor,
        expected: &str,
    ) -> CoreResult<PropagationReport> {
        if !control.has_logical_identity() {
            return Ok(PropagationReport::default());
        }

        let mut report = PropagationReport {
            scanned: true,
            ..Default::default()
        };

        for surface in catalog.others(origin) {
            if let Err(e) = ui.navigate(surface).await {
                warn!(surface = %surface.label, error = %e, "propagation scan could not open surface");
                continue;
            }
            report.surfaces_visited += 1;

            let controls = match ui.discover().await {
                Ok(controls) => controls,
                Err(e) => {
                    warn!(surface = %surface.label, error = %e, "propagation scan discovery failed");
                    continue;
                }
            };

            for mirror in controls.iter().filter(|c| control.mirrors(c)) {
                let value = mirror.current_value();
                let matches = values_match(&value, expected);
                debug!(
                    surface = %surface.label,
                    selector = %mirror.selector,
                    value = %value,
                    matches,
                    "mirror found"
                );
                report.mirrors.push(MirrorCheck {
                    surface: surface.label.clone(),
                    selector: mirror.selector.clone(),
                    value,
                    matches,
                });
            }
        }

        let mismatches: Vec<String> = report
            .mismatches()
            .map(|m| format!("{} {} renders '{}'", m.surface, m.selector, m.value))
            .collect();
        if !mismatches.is_empty() {
            return Err(CoreError::propagation(format!(
                "{} expected '{}' but {}",
                control.selector,
                expected,
                mismatches.join("; ")
            )));
        }

        Ok(report)
    }
}
