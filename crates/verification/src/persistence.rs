//! Persistence Verifier
//!
//! Drives the double-check cycle for one mutation:
//!
//! 1. snapshot the backend configuration (`before`)
//! 2. apply the mutation, invoke the apply/save affordance when present,
//!    snapshot again (`after_apply`)
//! 3. hard-reload the page and snapshot a third time (`after_refresh`)
//! 4. re-locate the control and read its rendered value
//!
//! A divergence between `after_apply` and `after_refresh`, or a rendered value
//! that differs from the expected one, fails the control.

use std::time::Duration;

use control_sweep_core::{
    BackendProbe, ControlDescriptor, CoreError, CoreResult, MutationPlan, UiAccessor,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::executor::ActionExecutor;

/// Outcome of one verified mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub action: String,
    pub expected: Option<String>,
    /// Whether an apply/save affordance was invoked
    pub applied: bool,
    /// `before != after_apply`
    pub config_changed: bool,
    /// `after_apply == after_refresh`
    pub persisted_after_refresh: bool,
    /// Rendered value after reload equals `expected`
    pub ui_matches: bool,
    pub rendered_value: Option<String>,
}

impl VerificationReport {
    fn click(action: String) -> Self {
        Self {
            action,
            expected: None,
            applied: false,
            config_changed: false,
            persisted_after_refresh: true,
            ui_matches: true,
            rendered_value: None,
        }
    }

    /// Compact one-line description for the ledger.
    pub fn detail(&self) -> String {
        match &self.expected {
            None => "clicked".to_string(),
            Some(expected) => format!(
                "expected={} rendered={} applied={} config_changed={} persisted_after_refresh={} ui_matches={}",
                expected,
                self.rendered_value.as_deref().unwrap_or("<missing>"),
                self.applied,
                self.config_changed,
                self.persisted_after_refresh,
                self.ui_matches
            ),
        }
    }
}

/// Compare a rendered value against the expected one. Numeric values compare
/// numerically so `60` and `60.0` agree.
pub fn values_match(rendered: &str, expected: &str) -> bool {
    let (rendered, expected) = (rendered.trim(), expected.trim());
    if rendered == expected {
        return true;
    }
    match (rendered.parse::<f64>(), expected.parse::<f64>()) {
        (Ok(a), Ok(b)) => (a - b).abs() < 1e-9,
        _ => false,
    }
}

/// Three-snapshot durability proof.
#[derive(Debug, Clone)]
pub struct PersistenceVerifier {
    apply_timeout: Duration,
    corpus: Option<String>,
}

impl PersistenceVerifier {
    pub fn new(apply_timeout: Duration, corpus: Option<String>) -> Self {
        Self {
            apply_timeout,
            corpus,
        }
    }

    /// Apply `plan` to `control` and prove it was durably persisted.
    pub async fn verify(
        &self,
        ui: &dyn UiAccessor,
        backend: &dyn BackendProbe,
        executor: &ActionExecutor,
        control: &ControlDescriptor,
        plan: &MutationPlan,
    ) -> CoreResult<VerificationReport> {
        let action = plan.action_name();
        let corpus = self.corpus.as_deref();

        if plan.expected_value().is_none() {
            executor.execute(ui, control, plan).await?;
            return Ok(VerificationReport::click(action));
        }

        let before = backend.config_snapshot(corpus).await?;
        let expected = executor
            .execute(ui, control, plan)
            .await?
            .unwrap_or_default();

        let applied = ui.apply_changes(self.apply_timeout).await?;
        let after_apply = backend.config_snapshot(corpus).await?;

        ui.reload().await?;
        let after_refresh = backend.config_snapshot(corpus).await?;

        // Discovery re-stamps fallback identity attributes lost on reload.
        let rediscovered = ui.discover().await?;
        let selector = rediscovered
            .iter()
            .find(|c| c.fingerprint == control.fingerprint)
            .map(|c| c.selector.clone())
            .unwrap_or_else(|| control.selector.clone());
        let rendered = ui.read(&selector).await?;

        let report = VerificationReport {
            action,
            expected: Some(expected.clone()),
            applied,
            config_changed: before != after_apply,
            persisted_after_refresh: after_apply == after_refresh,
            ui_matches: rendered
                .as_deref()
                .map(|r| values_match(r, &expected))
                .unwrap_or(false),
            rendered_value: rendered,
        };

        if !report.config_changed {
            warn!(
                selector = %control.selector,
                action = %report.action,
                applied,
                "mutation did not change the backend configuration"
            );
        }

        if !report.persisted_after_refresh {
            return Err(CoreError::verification(format!(
                "backend configuration diverged after reload for {} ({})",
                control.selector, report.action
            )));
        }

        match &report.rendered_value {
            None => {
                return Err(CoreError::verification(format!(
                    "control {} not found after reload",
                    control.selector
                )))
            }
            Some(rendered) if !report.ui_matches => {
                return Err(CoreError::verification(format!(
                    "control {} renders '{}' after reload, expected '{}'",
                    control.selector, rendered, expected
                )))
            }
            Some(_) => {}
        }

        debug!(selector = %control.selector, detail = %report.detail(), "mutation verified");
        Ok(report)
    }
}
