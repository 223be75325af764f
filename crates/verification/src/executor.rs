//! Action Executor
//!
//! Chooses and applies one deterministic, type-appropriate mutation per
//! control. The policy is an exhaustive match over `ControlKind`:
//!
//! - Checkbox: toggle; expected value is the resulting checked state
//! - Range: one step forward, or one step back from the ceiling when the
//!   forward step would leave the bounds
//! - Text: a uniquely timestamped sentinel
//! - Select: first differing option, or every differing option in
//!   select-all mode
//! - Clickable: a single click with no expected persisted value
//!
//! Disabled or hidden controls yield no actions.

use control_sweep_core::{
    control::parse_number, ControlDescriptor, ControlKind, CoreResult, ElementState,
    MutationPlan, UiAccessor,
};
use tracing::debug;

const EPSILON: f64 = 1e-9;

/// Executor options.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutorOptions {
    /// Yield one action per distinct option of a `<select>`
    pub select_all_options: bool,
}

/// Plans and applies control mutations.
#[derive(Debug, Clone, Default)]
pub struct ActionExecutor {
    options: ExecutorOptions,
}

impl ActionExecutor {
    pub fn new(options: ExecutorOptions) -> Self {
        Self { options }
    }

    /// Inspect the control's live state and plan its mutations. Returns an
    /// empty list when the control is absent, disabled or hidden, or when no
    /// deterministic change exists.
    pub async fn plan_control_actions(
        &self,
        ui: &dyn UiAccessor,
        control: &ControlDescriptor,
    ) -> CoreResult<Vec<MutationPlan>> {
        let state = match ui.inspect(&control.selector).await? {
            Some(state) => state,
            None => {
                debug!(selector = %control.selector, "control vanished before execution");
                return Ok(Vec::new());
            }
        };
        Ok(self.plan(control, &state))
    }

    /// Pure planning over the descriptor and its live state.
    pub fn plan(&self, control: &ControlDescriptor, state: &ElementState) -> Vec<MutationPlan> {
        if !state.is_actionable() {
            return Vec::new();
        }

        match &control.kind {
            ControlKind::Checkbox => {
                let current = state.checked.or(control.checked).unwrap_or(false);
                vec![MutationPlan::Toggle { checked: !current }]
            }
            ControlKind::Range { min, max, step } => {
                let current = parse_number(state.value.as_deref())
                    .or_else(|| parse_number(control.value.as_deref()));
                next_range_value(current, *min, *max, *step)
                    .map(|next| {
                        vec![MutationPlan::SetValue {
                            value: format_number(next),
                        }]
                    })
                    .unwrap_or_default()
            }
            ControlKind::Text { .. } => vec![MutationPlan::Fill {
                value: text_sentinel(),
            }],
            ControlKind::Select => {
                let current = state
                    .value
                    .clone()
                    .or_else(|| control.value.clone())
                    .unwrap_or_default();
                let mut candidates = control
                    .option_values
                    .iter()
                    .filter(|option| **option != current)
                    .map(|option| MutationPlan::SelectOption {
                        value: option.clone(),
                    });
                if self.options.select_all_options {
                    candidates.collect()
                } else {
                    candidates.next().into_iter().collect()
                }
            }
            ControlKind::Clickable => vec![MutationPlan::Click],
        }
    }

    /// Apply one planned mutation and return the expected persisted value.
    pub async fn execute(
        &self,
        ui: &dyn UiAccessor,
        control: &ControlDescriptor,
        plan: &MutationPlan,
    ) -> CoreResult<Option<String>> {
        debug!(
            selector = %control.selector,
            kind = control.kind.name(),
            action = %plan.action_name(),
            "executing control action"
        );
        ui.mutate(&control.selector, plan).await?;
        Ok(plan.expected_value())
    }
}

/// Next value for a range control. Steps forward when that stays within
/// `max`, otherwise steps back from the ceiling (clamped to `min`). Returns
/// `None` when no distinct value exists.
pub fn next_range_value(
    current: Option<f64>,
    min: Option<f64>,
    max: Option<f64>,
    step: f64,
) -> Option<f64> {
    let step = if step > 0.0 { step } else { 1.0 };
    let current = current.or(min).unwrap_or(0.0);
    let forward = current + step;

    let candidate = match max {
        Some(max) if forward > max + EPSILON => {
            let back = max - step;
            match min {
                Some(min) if back < min - EPSILON => min,
                _ => back,
            }
        }
        _ => forward,
    };

    if (candidate - current).abs() < EPSILON {
        None
    } else {
        Some(candidate)
    }
}

/// Render a number the way an HTML input reports it (`60`, not `60.0`).
pub fn format_number(value: f64) -> String {
    if value.fract().abs() < EPSILON && value.abs() < 1e15 {
        return format!("{}", value.round() as i64);
    }
    let rendered = format!("{:.6}", value);
    rendered
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

/// Unique text value distinguishable from any prior value.
pub fn text_sentinel() -> String {
    let nonce = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "sweep-{}-{}",
        chrono::Utc::now().format("%Y%m%dT%H%M%S%3f"),
        &nonce[..8]
    )
}
