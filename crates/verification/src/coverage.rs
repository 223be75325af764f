//! Provider Coverage
//!
//! One-time precondition before the crawl:
//!
//! - the backend must advertise at least one local and one cloud model,
//!   otherwise the run aborts
//! - every required provider gets a candidate model, is selected in the chat
//!   surface and answers one provider-specific probe
//!
//! A provider without a candidate is reported as unavailable; that is not
//! fatal.

use control_sweep_core::{
    policy::ProviderPolicy, BackendProbe, ChatDriver, ChatModel, CoreError, CoreResult,
    Feedback, UiAccessor, UiSurface,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::oracle::RetrievalOracle;

/// Message of the fatal coverage failure.
pub const LOCAL_CLOUD_PRECONDITION: &str = "need at least one local model and one cloud model";

/// Coverage of one required provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderCoverageEntry {
    pub provider: String,
    pub available: bool,
    pub tested: bool,
    pub model_id: Option<String>,
    pub question: Option<String>,
    pub feedback: Option<Feedback>,
    pub duration_ms: u64,
    pub error: Option<String>,
}

impl ProviderCoverageEntry {
    fn unavailable(provider: &str) -> Self {
        Self {
            provider: provider.to_string(),
            available: false,
            tested: false,
            model_id: None,
            question: None,
            feedback: None,
            duration_ms: 0,
            error: None,
        }
    }

    /// Tested and answered acceptably.
    pub fn passed(&self) -> bool {
        self.tested && self.error.is_none() && self.feedback == Some(Feedback::Thumbsup)
    }
}

/// Overall coverage result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageReport {
    pub local_models: usize,
    pub cloud_models: usize,
    pub entries: Vec<ProviderCoverageEntry>,
}

/// Checks model availability and exercises each required provider.
#[derive(Debug, Clone)]
pub struct ProviderCoverageChecker {
    policy: ProviderPolicy,
}

impl ProviderCoverageChecker {
    pub fn new(policy: ProviderPolicy) -> Self {
        Self { policy }
    }

    /// Count local and cloud models; fails unless both are present.
    pub fn check_precondition(models: &[ChatModel]) -> CoreResult<(usize, usize)> {
        let local = models.iter().filter(|m| m.is_local()).count();
        let cloud = models.iter().filter(|m| m.is_cloud()).count();
        if local == 0 || cloud == 0 {
            return Err(CoreError::preflight(format!(
                "{} (found {} local, {} cloud)",
                LOCAL_CLOUD_PRECONDITION, local, cloud
            )));
        }
        Ok((local, cloud))
    }

    fn is_aggregator(&self, source: &str) -> bool {
        let source = source.to_ascii_lowercase();
        self.policy.aggregators.iter().any(|a| *a == source)
    }

    /// Candidate model for `provider`. Direct provider matches win; then
    /// models routed through an aggregator named `provider`; then aggregator
    /// models whose id is namespaced `provider/...`.
    pub fn find_candidate<'a>(&self, models: &'a [ChatModel], provider: &str) -> Option<&'a ChatModel> {
        let provider = provider.to_ascii_lowercase();

        if let Some(direct) = models
            .iter()
            .find(|m| m.provider.eq_ignore_ascii_case(&provider) && !self.is_aggregator(&m.source))
        {
            return Some(direct);
        }

        if self.is_aggregator(&provider) {
            if let Some(routed) = models
                .iter()
                .find(|m| m.source.eq_ignore_ascii_case(&provider))
            {
                return Some(routed);
            }
        }

        let prefix = format!("{}/", provider);
        models.iter().find(|m| {
            self.is_aggregator(&m.source)
                && (m.provider.eq_ignore_ascii_case(&provider)
                    || m.id.to_ascii_lowercase().starts_with(&prefix))
        })
    }

    /// Run the precondition and one probe per required provider.
    pub async fn run(
        &self,
        backend: &dyn BackendProbe,
        ui: &dyn UiAccessor,
        chat: &dyn ChatDriver,
        oracle: &RetrievalOracle,
        chat_surface: &UiSurface,
    ) -> CoreResult<CoverageReport> {
        let models = backend.list_models().await?;
        let (local_models, cloud_models) = Self::check_precondition(&models)?;
        info!(local_models, cloud_models, "model coverage precondition satisfied");

        let mut entries = Vec::with_capacity(self.policy.required.len());
        for provider in &self.policy.required {
            let Some(model) = self.find_candidate(&models, provider) else {
                warn!(provider = %provider, "no candidate model for required provider");
                entries.push(ProviderCoverageEntry::unavailable(provider));
                continue;
            };

            let question = self.policy.question_for(provider);
            let mut entry = ProviderCoverageEntry {
                provider: provider.clone(),
                available: true,
                tested: true,
                model_id: Some(model.id.clone()),
                question: Some(question.clone()),
                feedback: None,
                duration_ms: 0,
                error: None,
            };

            let result = async {
                ui.navigate(chat_surface).await?;
                chat.select_model(&model.id).await?;
                oracle.probe(ui, chat, chat_surface, &question).await
            }
            .await;

            match result {
                Ok(probe) => {
                    entry.feedback = Some(probe.feedback);
                    entry.duration_ms = probe.duration_ms;
                }
                Err(e) => {
                    warn!(provider = %provider, model = %model.id, error = %e, "provider probe failed");
                    entry.error = Some(e.to_string());
                }
            }
            entries.push(entry);
        }

        Ok(CoverageReport {
            local_models,
            cloud_models,
            entries,
        })
    }
}
