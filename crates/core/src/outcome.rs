//! Outcome Records
//!
//! One immutable fact per action attempt, plus the aggregate run summary.
//! The ordered record stream is sufficient to reconstruct a run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::control::ControlDescriptor;
use crate::surface::UiSurface;

/// Action names whose records never contribute to the resume set.
const AUXILIARY_PREFIXES: &[&str] = &[
    "retrieval_probe_",
    "smoke:",
    "provider_probe:",
    "inventory",
    "preflight",
];

/// Terminal status of one action attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Ok,
    Failed,
    Skipped,
}

impl OutcomeStatus {
    /// `ok` and `skipped` mark a control as done; `failed` is retried on resume.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OutcomeStatus::Ok | OutcomeStatus::Skipped)
    }
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutcomeStatus::Ok => write!(f, "ok"),
            OutcomeStatus::Failed => write!(f, "failed"),
            OutcomeStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// One append-only ledger line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    /// RFC 3339 timestamp
    pub ts: String,
    /// Surface label
    pub surface: String,
    pub surface_key: String,
    pub action: String,
    pub control_fingerprint: String,
    pub control_selector: String,
    pub status: OutcomeStatus,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieval_probe_question: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieval_probe_feedback: Option<String>,
}

impl OutcomeRecord {
    /// Create a record for a control action. The timestamp is supplied by the
    /// caller so this crate stays clock-free.
    pub fn for_control(
        ts: impl Into<String>,
        surface: &UiSurface,
        control: &ControlDescriptor,
        action: impl Into<String>,
        status: OutcomeStatus,
        duration_ms: u64,
    ) -> Self {
        Self {
            ts: ts.into(),
            surface: surface.label.clone(),
            surface_key: surface.surface_key(),
            action: action.into(),
            control_fingerprint: control.fingerprint.clone(),
            control_selector: control.selector.clone(),
            status,
            duration_ms,
            detail: None,
            error: None,
            retrieval_probe_question: None,
            retrieval_probe_feedback: None,
        }
    }

    /// Create a record that is not tied to a discovered control.
    pub fn for_surface(
        ts: impl Into<String>,
        surface: &UiSurface,
        action: impl Into<String>,
        status: OutcomeStatus,
        duration_ms: u64,
    ) -> Self {
        Self {
            ts: ts.into(),
            surface: surface.label.clone(),
            surface_key: surface.surface_key(),
            action: action.into(),
            control_fingerprint: String::new(),
            control_selector: String::new(),
            status,
            duration_ms,
            detail: None,
            error: None,
            retrieval_probe_question: None,
            retrieval_probe_feedback: None,
        }
    }

    /// Attach a detail message.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Attach an error message.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Attach the probe question and the feedback given.
    pub fn with_probe(mut self, question: impl Into<String>, feedback: impl Into<String>) -> Self {
        self.retrieval_probe_question = Some(question.into());
        self.retrieval_probe_feedback = Some(feedback.into());
        self
    }

    /// `surface_key|fingerprint`
    pub fn control_key(&self) -> String {
        format!("{}|{}", self.surface_key, self.control_fingerprint)
    }

    /// Probe, smoke, provider, inventory and preflight records.
    pub fn is_auxiliary(&self) -> bool {
        AUXILIARY_PREFIXES
            .iter()
            .any(|prefix| self.action.starts_with(prefix))
    }
}

/// Counts by status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub total: usize,
    pub ok: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl StatusCounts {
    fn add(&mut self, status: OutcomeStatus) {
        self.total += 1;
        match status {
            OutcomeStatus::Ok => self.ok += 1,
            OutcomeStatus::Failed => self.failed += 1,
            OutcomeStatus::Skipped => self.skipped += 1,
        }
    }
}

/// Aggregate summary of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
    pub total: usize,
    pub ok: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Same breakdown grouped by surface label
    pub by_surface: BTreeMap<String, StatusCounts>,
    /// Message of the fatal error that stopped the run, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fatal: Option<String>,
}

impl RunSummary {
    /// Compute counts from an ordered record list.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a OutcomeRecord>) -> Self {
        let mut overall = StatusCounts::default();
        let mut by_surface: BTreeMap<String, StatusCounts> = BTreeMap::new();
        for record in records {
            overall.add(record.status);
            by_surface
                .entry(record.surface.clone())
                .or_default()
                .add(record.status);
        }
        Self {
            total: overall.total,
            ok: overall.ok,
            failed: overall.failed,
            skipped: overall.skipped,
            by_surface,
            ..Default::default()
        }
    }
}
