//! Retrieval Oracle
//!
//! Asks fixed real-world questions through the chat surface after a
//! retrieval-impacting mutation and classifies each answer with a
//! negative-signal lexicon. The chosen feedback is clicked in the product's
//! own feedback control.
//!
//! Classification is default-optimistic: an answer without a negative signal
//! is `thumbsup`. This under-reports subtle quality regressions (favours
//! recall of hard failures over precision on answer quality).

use std::time::{Duration, Instant};

use control_sweep_core::{
    control::normalize, ChatDriver, CoreResult, Feedback, Policy, UiAccessor, UiSurface,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// One question/answer exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub question: String,
    pub response: String,
    pub feedback: Feedback,
    pub duration_ms: u64,
}

/// Reachability of one smoke surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmokeResult {
    pub surface: UiSurface,
    pub rendered: bool,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Chat-based functional regression oracle.
#[derive(Debug, Clone)]
pub struct RetrievalOracle {
    negative_signals: Vec<String>,
    questions: Vec<String>,
    probes_per_mutation: usize,
    response_timeout: Duration,
}

impl RetrievalOracle {
    pub fn new(
        negative_signals: Vec<String>,
        questions: Vec<String>,
        probes_per_mutation: usize,
        response_timeout: Duration,
    ) -> Self {
        Self {
            negative_signals: negative_signals.iter().map(|s| normalize(s)).collect(),
            questions: questions
                .into_iter()
                .filter(|q| !q.trim().is_empty())
                .collect(),
            probes_per_mutation: probes_per_mutation.max(1),
            response_timeout,
        }
    }

    /// Build from the policy's oracle section.
    pub fn from_policy(policy: &Policy, probes_per_mutation: usize, response_timeout: Duration) -> Self {
        Self::new(
            policy.oracle.negative_signals.clone(),
            policy.oracle.questions.clone(),
            probes_per_mutation,
            response_timeout,
        )
    }

    pub fn probes_per_mutation(&self) -> usize {
        self.probes_per_mutation
    }

    /// Round-robin question for a monotonically advancing rotation index.
    pub fn question_at(&self, index: usize) -> &str {
        if self.questions.is_empty() {
            return "";
        }
        &self.questions[index % self.questions.len()]
    }

    /// `thumbsdown` if the normalized text contains any negative signal.
    pub fn classify(&self, response: &str) -> Feedback {
        let text = normalize(response);
        if self
            .negative_signals
            .iter()
            .any(|signal| text.contains(signal.as_str()))
        {
            Feedback::Thumbsdown
        } else {
            Feedback::Thumbsup
        }
    }

    /// Ask one question on the chat surface and send feedback on the answer.
    pub async fn probe(
        &self,
        ui: &dyn UiAccessor,
        chat: &dyn ChatDriver,
        chat_surface: &UiSurface,
        question: &str,
    ) -> CoreResult<ProbeResult> {
        let started = Instant::now();
        ui.navigate(chat_surface).await?;

        let previous = chat.assistant_response_count().await?;
        chat.submit_question(question).await?;
        let response = chat
            .wait_for_response(previous, self.response_timeout)
            .await?;

        let feedback = self.classify(&response);
        chat.send_feedback(feedback).await?;

        if feedback == Feedback::Thumbsdown {
            warn!(question, "retrieval probe answer carries a negative signal");
        } else {
            debug!(question, "retrieval probe answer accepted");
        }

        Ok(ProbeResult {
            question: question.to_string(),
            response,
            feedback,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Visit each surface and confirm it still renders.
    pub async fn smoke(&self, ui: &dyn UiAccessor, surfaces: &[UiSurface]) -> Vec<SmokeResult> {
        let mut results = Vec::with_capacity(surfaces.len());
        for surface in surfaces {
            let started = Instant::now();
            let outcome = match ui.navigate(surface).await {
                Ok(()) => ui.is_rendered().await,
                Err(e) => Err(e),
            };
            let (rendered, error) = match outcome {
                Ok(rendered) => (rendered, None),
                Err(e) => (false, Some(e.to_string())),
            };
            info!(surface = %surface.label, rendered, "smoke check");
            results.push(SmokeResult {
                surface: surface.clone(),
                rendered,
                duration_ms: started.elapsed().as_millis() as u64,
                error,
            });
        }
        results
    }
}
