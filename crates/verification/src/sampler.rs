//! Metrics Sampler
//!
//! Budget-aware check that the backend still exports its required telemetry
//! series. A series counts as exported when its name appears verbatim in the
//! scraped text. Only every `interval`-th retrieval mutation is sampled:
//!
//! | tier   | interval |
//! |--------|----------|
//! | low    | 10       |
//! | medium | 3        |
//! | high   | 1        |

use std::fmt;
use std::str::FromStr;

use control_sweep_core::{BackendProbe, CoreError, CoreResult, Policy};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Sampling budget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetTier {
    #[default]
    Low,
    Medium,
    High,
}

impl BudgetTier {
    /// Sample every `interval()`-th mutation.
    pub fn interval(&self) -> usize {
        match self {
            BudgetTier::Low => 10,
            BudgetTier::Medium => 3,
            BudgetTier::High => 1,
        }
    }
}

impl FromStr for BudgetTier {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(BudgetTier::Low),
            "medium" => Ok(BudgetTier::Medium),
            "high" => Ok(BudgetTier::High),
            other => Err(CoreError::parse(format!(
                "invalid metrics budget '{}': expected low, medium or high",
                other
            ))),
        }
    }
}

impl fmt::Display for BudgetTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BudgetTier::Low => write!(f, "low"),
            BudgetTier::Medium => write!(f, "medium"),
            BudgetTier::High => write!(f, "high"),
        }
    }
}

/// Result of one metrics sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsCheck {
    pub index: usize,
    /// False when `index` is not a sample point
    pub checked: bool,
    pub missing: Vec<String>,
}

/// Samples the metrics endpoint for required series.
#[derive(Debug, Clone)]
pub struct MetricsSampler {
    tier: BudgetTier,
    required: Vec<String>,
}

impl MetricsSampler {
    pub fn new(tier: BudgetTier, required: Vec<String>) -> Self {
        Self { tier, required }
    }

    pub fn from_policy(policy: &Policy, tier: BudgetTier) -> Self {
        Self::new(tier, policy.metrics.required.clone())
    }

    pub fn tier(&self) -> BudgetTier {
        self.tier
    }

    /// Whether the zero-based mutation `index` is sampled.
    pub fn should_sample(&self, index: usize) -> bool {
        index % self.tier.interval() == 0
    }

    /// Check the metrics endpoint when `index` is a sample point; otherwise
    /// return an unchecked result without touching the backend.
    pub async fn check(&self, backend: &dyn BackendProbe, index: usize) -> CoreResult<MetricsCheck> {
        if !self.should_sample(index) {
            return Ok(MetricsCheck {
                index,
                checked: false,
                missing: Vec::new(),
            });
        }

        let text = backend.metrics_text().await?;
        let missing: Vec<String> = self
            .required
            .iter()
            .filter(|name| !text.contains(name.as_str()))
            .cloned()
            .collect();

        if !missing.is_empty() {
            warn!(index, missing = ?missing, "required metrics missing");
            return Err(CoreError::metrics(format!(
                "missing required metrics: {}",
                missing.join(", ")
            )));
        }

        debug!(index, checked = self.required.len(), "metrics sample passed");
        Ok(MetricsCheck {
            index,
            checked: true,
            missing,
        })
    }
}
