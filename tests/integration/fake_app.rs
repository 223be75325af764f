//! In-memory dashboard
//!
//! A scripted stand-in for the rendered dashboard, the chat surface and the
//! backend, implementing all three seams over one shared configuration
//! store. Controls bound to the same setting key render the same value, so
//! a control with the same `id` on two surfaces behaves as a mirror.
//!
//! With staging enabled, writes are held until the apply affordance is
//! clicked and a reload discards whatever was not applied.
//!
//! Fallback identity attributes are modelled: a stamped selector only
//! resolves after `discover` on the current page, and navigation or reload
//! clears the stamps.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use control_sweep::models::settings::HarnessConfig;
use control_sweep::services::orchestrator::Orchestrator;
use control_sweep::storage::OutcomeLedger;
use control_sweep_core::{
    discover_controls, fingerprint_token, BackendProbe, ChatDriver, ChatModel, ControlDescriptor,
    CoreError, CoreResult, ElementState, Feedback, MutationPlan, OutcomeRecord, Policy,
    RawElement, SurfaceCatalog, UiAccessor, UiSurface,
};

pub const GOOD_ANSWER: &str =
    "Fusion weights live under Retrieval settings and balance keyword and vector scores.";

pub const ALL_METRICS: &str = "\
# TYPE rag_requests_total counter
rag_requests_total{route=\"/api/chat\"} 42
rag_request_duration_seconds_bucket{le=\"0.5\"} 40
rag_retrieval_latency_seconds_sum 3.2
rag_rerank_latency_seconds_sum 1.1
rag_embedding_requests_total 17
rag_errors_total 0
";

// ============================================================================
// Surfaces
// ============================================================================

pub fn retrieval() -> UiSurface {
    UiSurface::new("/rag", "Retrieval").with_subtab("retrieval")
}

pub fn settings() -> UiSurface {
    UiSurface::new("/admin", "General").with_subtab("general")
}

pub fn eval() -> UiSurface {
    UiSurface::new("/eval", "Eval analysis")
}

/// Retrieval, General, Chat and Eval analysis (the only smoke surface).
pub fn catalog() -> SurfaceCatalog {
    SurfaceCatalog::new(vec![
        retrieval(),
        settings(),
        UiSurface::new("/chat", "Chat"),
        eval(),
    ]).unwrap()
}

pub fn default_models() -> Vec<ChatModel> {
    vec![
        ChatModel::new("llama3.1:8b", "ollama", "ollama"),
        ChatModel::new("gpt-4o-mini", "openai", "cloud_direct"),
        ChatModel::new("anthropic/claude-3.5-sonnet", "anthropic", "openrouter"),
    ]
}

// ============================================================================
// Controls
// ============================================================================

/// One control rendered on a surface.
#[derive(Debug, Clone)]
pub struct FakeControl {
    raw: RawElement,
    setting: Option<String>,
    initial: Option<String>,
    stale: Option<String>,
}

impl FakeControl {
    fn base(tag: &str) -> RawElement {
        RawElement {
            tag: tag.to_string(),
            display: "block".to_string(),
            visibility: "visible".to_string(),
            opacity: 1.0,
            width: 160.0,
            height: 24.0,
            ..Default::default()
        }
    }

    fn bound(raw: RawElement, id: &str, initial: &str) -> Self {
        Self {
            raw,
            setting: Some(id.to_string()),
            initial: Some(initial.to_string()),
            stale: None,
        }
    }

    pub fn checkbox(id: &str, label: &str, checked: bool) -> Self {
        let raw = RawElement {
            input_type: Some("checkbox".to_string()),
            id: Some(id.to_string()),
            label: Some(label.to_string()),
            ..Self::base("input")
        };
        Self::bound(raw, id, if checked { "true" } else { "false" })
    }

    pub fn range(id: &str, label: &str, value: f64, min: f64, max: f64, step: f64) -> Self {
        let raw = RawElement {
            input_type: Some("range".to_string()),
            id: Some(id.to_string()),
            label: Some(label.to_string()),
            min: Some(min.to_string()),
            max: Some(max.to_string()),
            step: Some(step.to_string()),
            ..Self::base("input")
        };
        Self::bound(raw, id, &value.to_string())
    }

    pub fn text(id: &str, label: &str, value: &str) -> Self {
        let raw = RawElement {
            input_type: Some("text".to_string()),
            id: Some(id.to_string()),
            label: Some(label.to_string()),
            ..Self::base("input")
        };
        Self::bound(raw, id, value)
    }

    pub fn select(id: &str, label: &str, options: &[&str], value: &str) -> Self {
        let raw = RawElement {
            id: Some(id.to_string()),
            label: Some(label.to_string()),
            options: options.iter().map(|o| o.to_string()).collect(),
            ..Self::base("select")
        };
        Self::bound(raw, id, value)
    }

    /// A button with neither id nor test id; addressed by a stamped token.
    pub fn button(label: &str) -> Self {
        Self {
            raw: RawElement {
                label: Some(label.to_string()),
                ..Self::base("button")
            },
            setting: None,
            initial: None,
            stale: None,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.raw.disabled = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.raw.display = "none".to_string();
        self
    }

    /// Always renders `value`, whatever the backend holds.
    pub fn stale(mut self, value: &str) -> Self {
        self.stale = Some(value.to_string());
        self
    }

    fn is_checkbox(&self) -> bool {
        self.raw.input_type.as_deref() == Some("checkbox")
    }

    fn render(&self, index: usize, config: &BTreeMap<String, String>) -> RawElement {
        let value = self.stale.clone().or_else(|| {
            self.setting
                .as_ref()
                .and_then(|key| config.get(key).cloned())
        });
        let mut raw = self.raw.clone();
        raw.index = index;
        if self.is_checkbox() {
            raw.checked = Some(value.as_deref() == Some("true"));
        } else {
            raw.value = value;
        }
        raw
    }
}

// ============================================================================
// Dashboard state
// ============================================================================

/// One applied mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    pub surface_key: String,
    pub selector: String,
    pub plan: MutationPlan,
}

#[derive(Default)]
struct Inner {
    surfaces: HashMap<String, Vec<FakeControl>>,
    config: BTreeMap<String, String>,
    seed: BTreeMap<String, String>,
    volatile: HashSet<String>,
    dropped: HashSet<(String, String)>,
    staging: bool,
    staged: BTreeMap<String, String>,
    applies: usize,
    unrendered: HashSet<String>,
    current: Option<String>,
    stamped: HashSet<String>,
    mutations: Vec<Mutation>,
    navigations: Vec<String>,
    reloads: usize,

    default_response: String,
    messages: Vec<String>,
    questions: Vec<String>,
    feedback: Vec<Feedback>,
    selected_models: Vec<String>,

    healthy: bool,
    models: Vec<ChatModel>,
    metrics: String,
    metrics_calls: usize,
}

/// Scripted dashboard, chat surface and backend.
pub struct FakeDashboard {
    inner: Mutex<Inner>,
}

impl FakeDashboard {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                default_response: GOOD_ANSWER.to_string(),
                healthy: true,
                models: default_models(),
                metrics: ALL_METRICS.to_string(),
                ..Default::default()
            }),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    /// Place a control on a surface and seed its setting.
    pub fn add(&self, surface: &UiSurface, control: FakeControl) {
        let mut inner = self.lock();
        if let (Some(key), Some(initial)) = (&control.setting, &control.initial) {
            inner.config.entry(key.clone()).or_insert_with(|| initial.clone());
            inner.seed.entry(key.clone()).or_insert_with(|| initial.clone());
        }
        inner
            .surfaces
            .entry(surface.surface_key())
            .or_default()
            .push(control);
    }

    /// Writes to `setting` are lost on reload.
    pub fn make_volatile(&self, setting: &str) {
        self.lock().volatile.insert(setting.to_string());
    }

    pub fn make_durable(&self, setting: &str) {
        self.lock().volatile.remove(setting);
    }

    /// Writes of `value` to `setting` are silently ignored.
    pub fn drop_writes(&self, setting: &str, value: &str) {
        self.lock().dropped.insert((setting.to_string(), value.to_string()));
    }

    pub fn accept_writes(&self) {
        self.lock().dropped.clear();
    }

    /// Hold writes until `apply_changes`.
    pub fn stage_until_apply(&self) {
        self.lock().staging = true;
    }

    pub fn applies(&self) -> usize {
        self.lock().applies
    }

    pub fn make_unrendered(&self, surface: &UiSurface) {
        self.lock().unrendered.insert(surface.surface_key());
    }

    pub fn set_default_response(&self, response: &str) {
        self.lock().default_response = response.to_string();
    }

    pub fn set_models(&self, models: Vec<ChatModel>) {
        self.lock().models = models;
    }

    pub fn set_metrics(&self, metrics: &str) {
        self.lock().metrics = metrics.to_string();
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.lock().healthy = healthy;
    }

    pub fn setting(&self, key: &str) -> Option<String> {
        self.lock().config.get(key).cloned()
    }

    pub fn mutations(&self) -> Vec<Mutation> {
        self.lock().mutations.clone()
    }

    pub fn mutations_of(&self, selector: &str) -> Vec<MutationPlan> {
        self.lock()
            .mutations
            .iter()
            .filter(|m| m.selector == selector)
            .map(|m| m.plan.clone())
            .collect()
    }

    pub fn metrics_calls(&self) -> usize {
        self.lock().metrics_calls
    }

    pub fn questions(&self) -> Vec<String> {
        self.lock().questions.clone()
    }

    pub fn feedback(&self) -> Vec<Feedback> {
        self.lock().feedback.clone()
    }

    pub fn selected_models(&self) -> Vec<String> {
        self.lock().selected_models.clone()
    }

    pub fn reloads(&self) -> usize {
        self.lock().reloads
    }

    pub fn navigations(&self) -> Vec<String> {
        self.lock().navigations.clone()
    }

    /// Controls on the current page with their live descriptors.
    fn rendered(inner: &Inner) -> Vec<(FakeControl, ControlDescriptor)> {
        let Some(current) = &inner.current else {
            return Vec::new();
        };
        let controls = inner.surfaces.get(current).cloned().unwrap_or_default();
        controls
            .into_iter()
            .enumerate()
            .filter_map(|(index, control)| {
                let raw = control.render(index, &inner.config);
                ControlDescriptor::from_raw(&raw).map(|d| (control, d))
            })
            .collect()
    }

    fn resolve(inner: &Inner, selector: &str) -> Option<(FakeControl, ControlDescriptor)> {
        Self::rendered(inner).into_iter().find(|(_, d)| {
            d.selector == selector
                && (!d.uses_stamp() || inner.stamped.contains(&fingerprint_token(&d.fingerprint)))
        })
    }
}

// ============================================================================
// Seams
// ============================================================================

#[async_trait]
impl UiAccessor for FakeDashboard {
    async fn navigate(&self, surface: &UiSurface) -> CoreResult<()> {
        let mut inner = self.lock();
        inner.current = Some(surface.surface_key());
        inner.navigations.push(surface.surface_key());
        inner.stamped.clear();
        Ok(())
    }

    async fn reload(&self) -> CoreResult<()> {
        let mut inner = self.lock();
        inner.reloads += 1;
        inner.stamped.clear();
        inner.staged.clear();
        let volatile: Vec<String> = inner.volatile.iter().cloned().collect();
        for key in volatile {
            if let Some(seed) = inner.seed.get(&key).cloned() {
                inner.config.insert(key, seed);
            }
        }
        Ok(())
    }

    async fn discover(&self) -> CoreResult<Vec<ControlDescriptor>> {
        let mut inner = self.lock();
        let Some(current) = inner.current.clone() else {
            return Err(CoreError::browser("no page loaded"));
        };
        let raw: Vec<RawElement> = inner
            .surfaces
            .get(&current)
            .map(|controls| {
                controls
                    .iter()
                    .enumerate()
                    .map(|(index, c)| c.render(index, &inner.config))
                    .collect()
            })
            .unwrap_or_default();

        let found = discover_controls(&raw);
        for (_, control) in found.iter().filter(|(_, c)| c.uses_stamp()) {
            inner.stamped.insert(fingerprint_token(&control.fingerprint));
        }
        Ok(found.into_iter().map(|(_, c)| c).collect())
    }

    async fn inspect(&self, selector: &str) -> CoreResult<Option<ElementState>> {
        let inner = self.lock();
        Ok(Self::resolve(&inner, selector).map(|(control, descriptor)| ElementState {
            value: if control.is_checkbox() {
                None
            } else {
                descriptor.value.clone()
            },
            checked: descriptor.checked,
            disabled: descriptor.disabled,
            visible: true,
        }))
    }

    async fn mutate(&self, selector: &str, plan: &MutationPlan) -> CoreResult<()> {
        let mut inner = self.lock();
        let (control, descriptor) = Self::resolve(&inner, selector)
            .ok_or_else(|| CoreError::browser(format!("no element matches {}", selector)))?;
        if descriptor.disabled {
            return Err(CoreError::browser(format!("{} is disabled", selector)));
        }

        let written = match plan {
            MutationPlan::Toggle { checked } => Some(checked.to_string()),
            MutationPlan::SetValue { value }
            | MutationPlan::Fill { value }
            | MutationPlan::SelectOption { value } => Some(value.clone()),
            MutationPlan::Click => None,
        };
        if let (Some(key), Some(value)) = (control.setting, written) {
            if !inner.dropped.contains(&(key.clone(), value.clone())) {
                if inner.staging {
                    inner.staged.insert(key, value);
                } else {
                    inner.config.insert(key, value);
                }
            }
        }

        let surface_key = inner.current.clone().unwrap_or_default();
        inner.mutations.push(Mutation {
            surface_key,
            selector: selector.to_string(),
            plan: plan.clone(),
        });
        Ok(())
    }

    async fn apply_changes(&self, _timeout: Duration) -> CoreResult<bool> {
        let mut inner = self.lock();
        if !inner.staging {
            return Ok(false);
        }
        let staged = std::mem::take(&mut inner.staged);
        inner.config.extend(staged);
        inner.applies += 1;
        Ok(true)
    }

    async fn is_rendered(&self) -> CoreResult<bool> {
        let inner = self.lock();
        Ok(inner
            .current
            .as_ref()
            .map(|current| !inner.unrendered.contains(current))
            .unwrap_or(false))
    }
}

#[async_trait]
impl ChatDriver for FakeDashboard {
    async fn assistant_response_count(&self) -> CoreResult<usize> {
        Ok(self.lock().messages.len())
    }

    async fn submit_question(&self, question: &str) -> CoreResult<()> {
        let mut inner = self.lock();
        inner.questions.push(question.to_string());
        let answer = inner.default_response.clone();
        inner.messages.push(answer);
        Ok(())
    }

    async fn wait_for_response(&self, previous_count: usize, _timeout: Duration) -> CoreResult<String> {
        self.lock()
            .messages
            .get(previous_count)
            .cloned()
            .ok_or_else(|| CoreError::timeout("no assistant response"))
    }

    async fn send_feedback(&self, feedback: Feedback) -> CoreResult<()> {
        self.lock().feedback.push(feedback);
        Ok(())
    }

    async fn select_model(&self, model_id: &str) -> CoreResult<()> {
        self.lock().selected_models.push(model_id.to_string());
        Ok(())
    }
}

#[async_trait]
impl BackendProbe for FakeDashboard {
    async fn health(&self) -> CoreResult<()> {
        if self.lock().healthy {
            Ok(())
        } else {
            Err(CoreError::backend("GET /health returned 503 Service Unavailable: down"))
        }
    }

    async fn config_snapshot(&self, _corpus: Option<&str>) -> CoreResult<serde_json::Value> {
        Ok(serde_json::to_value(&self.lock().config)?)
    }

    async fn list_models(&self) -> CoreResult<Vec<ChatModel>> {
        Ok(self.lock().models.clone())
    }

    async fn metrics_text(&self) -> CoreResult<String> {
        let mut inner = self.lock();
        inner.metrics_calls += 1;
        Ok(inner.metrics.clone())
    }
}

// ============================================================================
// Run helpers
// ============================================================================

/// Fast defaults with the ledger inside `dir`.
pub fn config_in(dir: &TempDir) -> HarnessConfig {
    HarnessConfig {
        output: dir.path().join("sweep.jsonl"),
        settle_ms: 0,
        probes_per_mutation: 1,
        ..HarnessConfig::default()
    }
}

pub fn orchestrator(app: &Arc<FakeDashboard>, config: HarnessConfig) -> Orchestrator {
    Orchestrator::new(
        config,
        Policy::builtin().unwrap(),
        catalog(),
        app.clone(),
        app.clone(),
        app.clone(),
    )
}

/// Every record written to the ledger in `dir`.
pub fn ledger(dir: &TempDir) -> Vec<OutcomeRecord> {
    OutcomeLedger::replay(&dir.path().join("sweep.jsonl")).unwrap()
}

/// The record for `action` on the control whose fingerprint mentions `id`.
pub fn record_for<'a>(records: &'a [OutcomeRecord], id: &str, action: &str) -> &'a OutcomeRecord {
    records
        .iter()
        .find(|r| r.action == action && r.control_fingerprint.contains(id))
        .unwrap_or_else(|| panic!("no '{}' record for {}", action, id))
}

/// Actions in ledger order, provider probes left out.
pub fn sweep_actions(records: &[OutcomeRecord]) -> Vec<String> {
    records
        .iter()
        .filter(|r| !r.action.starts_with("provider_probe:"))
        .map(|r| r.action.clone())
        .collect()
}
