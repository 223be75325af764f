//! Accessor Traits
//!
//! Narrow seams between the verification engine and its external
//! collaborators:
//!
//! - `UiAccessor` - navigate, discover, read, mutate, reload, apply
//! - `ChatDriver` - the chat surface used by the retrieval oracle
//! - `BackendProbe` - configuration snapshots, model listing, metrics, health
//!
//! The engine only ever depends on these traits, so it can be exercised
//! against an in-memory fake dashboard in tests.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::control::ControlDescriptor;
use crate::error::CoreResult;
use crate::surface::UiSurface;

// ============================================================================
// Mutation plans
// ============================================================================

/// One deterministic mutation to apply to a control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MutationPlan {
    /// Click a checkable control so it ends up `checked`
    Toggle { checked: bool },
    /// Set a range/number input
    SetValue { value: String },
    /// Replace text content
    Fill { value: String },
    /// Choose a `<select>` option
    SelectOption { value: String },
    /// Single click with no persisted value
    Click,
}

impl MutationPlan {
    /// Value expected to be persisted and rendered after the mutation.
    pub fn expected_value(&self) -> Option<String> {
        match self {
            MutationPlan::Toggle { checked } => Some(checked.to_string()),
            MutationPlan::SetValue { value }
            | MutationPlan::Fill { value }
            | MutationPlan::SelectOption { value } => Some(value.clone()),
            MutationPlan::Click => None,
        }
    }

    /// Action name recorded in the ledger.
    pub fn action_name(&self) -> String {
        match self {
            MutationPlan::Toggle { checked } => format!("toggle:{}", checked),
            MutationPlan::SetValue { value } => format!("set_value:{}", value),
            MutationPlan::Fill { .. } => "fill".to_string(),
            MutationPlan::SelectOption { value } => format!("select:{}", value),
            MutationPlan::Click => "click".to_string(),
        }
    }
}

/// Live state of an element at the moment of execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementState {
    pub value: Option<String>,
    pub checked: Option<bool>,
    pub disabled: bool,
    pub visible: bool,
}

impl ElementState {
    /// Rendered value as a string; checkable controls report `checked`.
    pub fn rendered_value(&self) -> String {
        match self.checked {
            Some(checked) => checked.to_string(),
            None => self.value.clone().unwrap_or_default(),
        }
    }

    /// Whether a mutation may be attempted.
    pub fn is_actionable(&self) -> bool {
        self.visible && !self.disabled
    }
}

// ============================================================================
// UI accessor
// ============================================================================

/// Page-level operations the engine needs from the rendered dashboard.
#[async_trait]
pub trait UiAccessor: Send + Sync {
    /// Navigate to a surface and wait for the application to be ready.
    async fn navigate(&self, surface: &UiSurface) -> CoreResult<()>;

    /// Hard-reload the current page and wait for readiness.
    async fn reload(&self) -> CoreResult<()>;

    /// Scan the current page for visible interactive controls, stamping the
    /// fallback identity attribute where needed.
    async fn discover(&self) -> CoreResult<Vec<ControlDescriptor>>;

    /// Inspect the element matched by `selector`; `None` when absent.
    async fn inspect(&self, selector: &str) -> CoreResult<Option<ElementState>>;

    /// Apply one mutation to the element matched by `selector`.
    async fn mutate(&self, selector: &str, plan: &MutationPlan) -> CoreResult<()>;

    /// Invoke the apply/save affordance when it is present, visible and
    /// enabled, waiting up to `timeout` for completion. Returns whether the
    /// affordance was invoked.
    async fn apply_changes(&self, timeout: Duration) -> CoreResult<bool>;

    /// Whether the current page rendered meaningful content.
    async fn is_rendered(&self) -> CoreResult<bool>;

    /// Read the rendered value of the element matched by `selector`.
    async fn read(&self, selector: &str) -> CoreResult<Option<String>> {
        Ok(self.inspect(selector).await?.map(|s| s.rendered_value()))
    }
}

// ============================================================================
// Chat driver
// ============================================================================

/// Feedback given to an assistant response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feedback {
    Thumbsup,
    Thumbsdown,
}

impl std::fmt::Display for Feedback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Feedback::Thumbsup => write!(f, "thumbsup"),
            Feedback::Thumbsdown => write!(f, "thumbsdown"),
        }
    }
}

/// Chat surface operations. Callers navigate to the chat surface first.
#[async_trait]
pub trait ChatDriver: Send + Sync {
    /// Number of assistant responses currently rendered.
    async fn assistant_response_count(&self) -> CoreResult<usize>;

    /// Type and submit a question.
    async fn submit_question(&self, question: &str) -> CoreResult<()>;

    /// Wait until exactly one response beyond `previous_count` appears and
    /// return its text.
    async fn wait_for_response(&self, previous_count: usize, timeout: Duration) -> CoreResult<String>;

    /// Click the feedback control of the latest response.
    async fn send_feedback(&self, feedback: Feedback) -> CoreResult<()>;

    /// Switch the active chat model.
    async fn select_model(&self, model_id: &str) -> CoreResult<()>;
}

// ============================================================================
// Backend probe
// ============================================================================

/// A chat model advertised by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatModel {
    pub id: String,
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub source: String,
}

const LOCAL_SOURCES: &[&str] = &["local", "ollama", "lmstudio", "llamacpp", "llama.cpp", "vllm"];

impl ChatModel {
    pub fn new(id: impl Into<String>, provider: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            provider: provider.into(),
            source: source.into(),
        }
    }

    /// Served from the operator's own hardware.
    pub fn is_local(&self) -> bool {
        let source = self.source.to_ascii_lowercase();
        LOCAL_SOURCES.iter().any(|s| source == *s)
    }

    /// Served by a remote API (direct or through an aggregator).
    pub fn is_cloud(&self) -> bool {
        !self.source.trim().is_empty() && !self.is_local()
    }
}

/// Read-only backend endpoints. The harness never writes configuration.
#[async_trait]
pub trait BackendProbe: Send + Sync {
    /// Cheap reachability check.
    async fn health(&self) -> CoreResult<()>;

    /// Current configuration snapshot, optionally scoped to a corpus.
    async fn config_snapshot(&self, corpus: Option<&str>) -> CoreResult<serde_json::Value>;

    /// Available chat models.
    async fn list_models(&self) -> CoreResult<Vec<ChatModel>>;

    /// Raw metrics exposition text.
    async fn metrics_text(&self) -> CoreResult<String>;
}
