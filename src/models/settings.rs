//! Harness Settings
//!
//! Run configuration assembled from `SWEEP_*` environment knobs, refined by
//! command-line overrides and validated before a run starts.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use control_sweep_verification::BudgetTier;
use serde::{Deserialize, Serialize};

use crate::utils::error::{AppError, AppResult};

pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8012";
pub const DEFAULT_OUTPUT: &str = "output/control-sweep.jsonl";

/// Run mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Health, provider coverage and a read-only inventory
    Preflight,
    /// The complete mutation loop
    #[default]
    Full,
}

impl FromStr for RunMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "preflight" => Ok(RunMode::Preflight),
            "full" => Ok(RunMode::Full),
            other => Err(AppError::config(format!(
                "Invalid run mode: {}. Must be 'preflight' or 'full'",
                other
            ))),
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Preflight => write!(f, "preflight"),
            RunMode::Full => write!(f, "full"),
        }
    }
}

/// Bounded waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Control visibility/enablement
    pub control: Duration,
    /// Application readiness after navigation
    pub ready: Duration,
    /// Apply/save completion
    pub apply: Duration,
    /// Assistant response arrival
    pub chat_response: Duration,
    /// Settle delay after navigation
    pub settle: Duration,
}

impl Timeouts {
    pub fn with_settle(settle: Duration) -> Self {
        Self {
            control: Duration::from_secs(30),
            ready: Duration::from_secs(90),
            apply: Duration::from_secs(180),
            chat_response: Duration::from_secs(600),
            settle,
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::with_settle(Duration::from_millis(750))
    }
}

/// Complete run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Backend API base URL
    pub api_base: String,
    /// Dashboard base URL; defaults to the API base
    pub ui_base: String,
    pub allow_destructive: bool,
    pub select_all_options: bool,
    pub propagation_scan: bool,
    /// Post-navigation settle delay in milliseconds
    pub settle_ms: u64,
    pub metrics_budget: BudgetTier,
    pub resume: bool,
    pub mode: RunMode,
    /// Ledger path
    pub output: PathBuf,
    /// Corpus scope for configuration snapshots
    pub corpus: Option<String>,
    pub probes_per_mutation: usize,
    /// Discovery passes per surface
    pub max_passes: usize,
    pub policy_file: Option<PathBuf>,
    pub surfaces_file: Option<PathBuf>,
    pub headless: bool,
    /// Attach to a running browser instead of launching one
    pub browser_ws: Option<String>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            ui_base: DEFAULT_API_BASE.to_string(),
            allow_destructive: false,
            select_all_options: false,
            propagation_scan: true,
            settle_ms: 750,
            metrics_budget: BudgetTier::Low,
            resume: false,
            mode: RunMode::Full,
            output: PathBuf::from(DEFAULT_OUTPUT),
            corpus: None,
            probes_per_mutation: 3,
            max_passes: 4,
            policy_file: None,
            surfaces_file: None,
            headless: true,
            browser_ws: None,
        }
    }
}

/// Partial override (command line)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigUpdate {
    pub api_base: Option<String>,
    pub ui_base: Option<String>,
    pub allow_destructive: Option<bool>,
    pub select_all_options: Option<bool>,
    pub propagation_scan: Option<bool>,
    pub settle_ms: Option<u64>,
    pub metrics_budget: Option<BudgetTier>,
    pub resume: Option<bool>,
    pub mode: Option<RunMode>,
    pub output: Option<PathBuf>,
    pub corpus: Option<String>,
    pub probes_per_mutation: Option<usize>,
    pub max_passes: Option<usize>,
    pub policy_file: Option<PathBuf>,
    pub surfaces_file: Option<PathBuf>,
    pub headless: Option<bool>,
    pub browser_ws: Option<String>,
}

/// Parse a boolean knob.
pub fn parse_bool(key: &str, value: &str) -> AppResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(AppError::config(format!(
            "{} must be a boolean (1/0, true/false, yes/no, on/off), got '{}'",
            key, other
        ))),
    }
}

fn parse_num<T: FromStr>(key: &str, value: &str) -> AppResult<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| AppError::config(format!("{} must be a number, got '{}'", key, value)))
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl HarnessConfig {
    /// Build from the process environment.
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset or empty knobs keep their
    /// defaults.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).and_then(non_empty);
        let mut config = Self::default();

        if let Some(v) = get("SWEEP_API_BASE") {
            config.api_base = v.trim_end_matches('/').to_string();
        }
        config.ui_base = match get("SWEEP_UI_BASE") {
            Some(v) => v.trim_end_matches('/').to_string(),
            None => config.api_base.clone(),
        };
        if let Some(v) = get("SWEEP_ALLOW_DESTRUCTIVE") {
            config.allow_destructive = parse_bool("SWEEP_ALLOW_DESTRUCTIVE", &v)?;
        }
        if let Some(v) = get("SWEEP_SELECT_ALL_OPTIONS") {
            config.select_all_options = parse_bool("SWEEP_SELECT_ALL_OPTIONS", &v)?;
        }
        if let Some(v) = get("SWEEP_PROPAGATION_SCAN") {
            config.propagation_scan = parse_bool("SWEEP_PROPAGATION_SCAN", &v)?;
        }
        if let Some(v) = get("SWEEP_SETTLE_MS") {
            config.settle_ms = parse_num("SWEEP_SETTLE_MS", &v)?;
        }
        if let Some(v) = get("SWEEP_METRICS_BUDGET") {
            config.metrics_budget = v
                .parse()
                .map_err(|e: control_sweep_core::CoreError| AppError::config(e.to_string()))?;
        }
        if let Some(v) = get("SWEEP_RESUME") {
            config.resume = parse_bool("SWEEP_RESUME", &v)?;
        }
        if let Some(v) = get("SWEEP_MODE") {
            config.mode = v.parse()?;
        }
        if let Some(v) = get("SWEEP_OUTPUT") {
            config.output = PathBuf::from(v);
        }
        config.corpus = get("SWEEP_CORPUS");
        if let Some(v) = get("SWEEP_PROBES_PER_MUTATION") {
            config.probes_per_mutation = parse_num("SWEEP_PROBES_PER_MUTATION", &v)?;
        }
        if let Some(v) = get("SWEEP_MAX_PASSES") {
            config.max_passes = parse_num("SWEEP_MAX_PASSES", &v)?;
        }
        config.policy_file = get("SWEEP_POLICY_FILE").map(PathBuf::from);
        config.surfaces_file = get("SWEEP_SURFACES_FILE").map(PathBuf::from);
        if let Some(v) = get("SWEEP_HEADLESS") {
            config.headless = parse_bool("SWEEP_HEADLESS", &v)?;
        }
        config.browser_ws = get("SWEEP_BROWSER_WS");

        Ok(config)
    }

    /// Apply a partial update to the configuration
    pub fn apply_update(&mut self, update: ConfigUpdate) {
        if let Some(api_base) = update.api_base {
            let follows_api = self.ui_base == self.api_base;
            self.api_base = api_base.trim_end_matches('/').to_string();
            if follows_api {
                self.ui_base = self.api_base.clone();
            }
        }
        if let Some(ui_base) = update.ui_base {
            self.ui_base = ui_base.trim_end_matches('/').to_string();
        }
        if let Some(v) = update.allow_destructive {
            self.allow_destructive = v;
        }
        if let Some(v) = update.select_all_options {
            self.select_all_options = v;
        }
        if let Some(v) = update.propagation_scan {
            self.propagation_scan = v;
        }
        if let Some(v) = update.settle_ms {
            self.settle_ms = v;
        }
        if let Some(v) = update.metrics_budget {
            self.metrics_budget = v;
        }
        if let Some(v) = update.resume {
            self.resume = v;
        }
        if let Some(v) = update.mode {
            self.mode = v;
        }
        if let Some(v) = update.output {
            self.output = v;
        }
        if let Some(v) = update.corpus {
            self.corpus = Some(v);
        }
        if let Some(v) = update.probes_per_mutation {
            self.probes_per_mutation = v;
        }
        if let Some(v) = update.max_passes {
            self.max_passes = v;
        }
        if let Some(v) = update.policy_file {
            self.policy_file = Some(v);
        }
        if let Some(v) = update.surfaces_file {
            self.surfaces_file = Some(v);
        }
        if let Some(v) = update.headless {
            self.headless = v;
        }
        if let Some(v) = update.browser_ws {
            self.browser_ws = Some(v);
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> AppResult<()> {
        for (key, value) in [("api_base", &self.api_base), ("ui_base", &self.ui_base)] {
            let parsed = url::Url::parse(value)
                .map_err(|e| AppError::config(format!("Invalid {}: {} ({})", key, value, e)))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(AppError::config(format!(
                    "Invalid {}: {}. Must be an http(s) URL",
                    key, value
                )));
            }
        }

        if !(1..=20).contains(&self.probes_per_mutation) {
            return Err(AppError::config(format!(
                "probes_per_mutation must be between 1 and 20, got {}",
                self.probes_per_mutation
            )));
        }

        if !(1..=16).contains(&self.max_passes) {
            return Err(AppError::config(format!(
                "max_passes must be between 1 and 16, got {}",
                self.max_passes
            )));
        }

        if self.settle_ms > 30_000 {
            return Err(AppError::config("settle_ms cannot exceed 30000"));
        }

        if self.output.as_os_str().is_empty() {
            return Err(AppError::config("output path must not be empty"));
        }

        Ok(())
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts::with_settle(Duration::from_millis(self.settle_ms))
    }

    /// `<api_base><path>`
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    /// `<ui_base><surface path>`
    pub fn ui_url(&self, path: &str) -> String {
        format!("{}{}", self.ui_base, path)
    }
}
