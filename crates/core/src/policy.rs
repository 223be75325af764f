//! Classification & Probing Policy
//!
//! Versioned word lists that drive control classification, the retrieval
//! oracle's negative-signal lexicon, the required metric names and the
//! required chat providers. The default policy is embedded; a TOML file with
//! the same shape can replace it without touching the engine.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::control::{normalize, ControlDescriptor};
use crate::error::{CoreError, CoreResult};

const DEFAULT_POLICY: &str = include_str!("../policy/default.toml");

/// Substring lexicons used by the control classifier.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Lexicon {
    /// Credentials, secrets, webhooks
    #[serde(default)]
    pub never_touch: Vec<String>,
    /// Irreversible operations
    #[serde(default)]
    pub destructive: Vec<String>,
    /// Retrieval / indexing / embedding / reranking / fusion terms
    #[serde(default)]
    pub retrieval: Vec<String>,
}

/// Retrieval oracle inputs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OraclePolicy {
    #[serde(default)]
    pub negative_signals: Vec<String>,
    #[serde(default)]
    pub questions: Vec<String>,
}

/// Metrics budget sampler inputs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsPolicy {
    #[serde(default)]
    pub required: Vec<String>,
}

/// Provider coverage inputs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderPolicy {
    #[serde(default)]
    pub required: Vec<String>,
    /// Sources that route to many upstream providers
    #[serde(default)]
    pub aggregators: Vec<String>,
    /// Probe question template; `{provider}` is substituted
    #[serde(default)]
    pub probe_question: String,
}

impl ProviderPolicy {
    /// Render the provider-specific probe question.
    pub fn question_for(&self, provider: &str) -> String {
        self.probe_question.replace("{provider}", provider)
    }
}

/// The complete policy file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub version: String,
    #[serde(default)]
    pub classifier: Lexicon,
    #[serde(default)]
    pub oracle: OraclePolicy,
    #[serde(default)]
    pub metrics: MetricsPolicy,
    #[serde(default)]
    pub providers: ProviderPolicy,
}

impl Policy {
    /// Parse and validate a policy from TOML text. Lexicon entries are
    /// normalized so matching is case- and whitespace-insensitive.
    pub fn from_toml_str(content: &str) -> CoreResult<Self> {
        let mut policy: Policy = toml::from_str(content)
            .map_err(|e| CoreError::parse(format!("invalid policy file: {}", e)))?;
        policy.normalize_lists();
        policy.validate()?;
        Ok(policy)
    }

    /// Load a policy file from disk.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    fn normalize_lists(&mut self) {
        for list in [
            &mut self.classifier.never_touch,
            &mut self.classifier.destructive,
            &mut self.classifier.retrieval,
            &mut self.oracle.negative_signals,
        ] {
            *list = list
                .iter()
                .map(|term| normalize(term))
                .filter(|term| !term.is_empty())
                .collect();
        }
        self.providers.required = self
            .providers
            .required
            .iter()
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        self.providers.aggregators = self
            .providers
            .aggregators
            .iter()
            .map(|p| p.trim().to_lowercase())
            .collect();
    }

    /// Validate the policy.
    pub fn validate(&self) -> CoreResult<()> {
        if self.version.trim().is_empty() {
            return Err(CoreError::validation("policy version must not be empty"));
        }
        if self.classifier.never_touch.is_empty() {
            return Err(CoreError::validation(
                "policy must list at least one never_touch term",
            ));
        }
        if self.oracle.questions.iter().all(|q| q.trim().is_empty()) {
            return Err(CoreError::validation(
                "policy must list at least one oracle question",
            ));
        }
        Ok(())
    }

    /// Classify a control against the lexicons.
    pub fn classify(&self, control: &ControlDescriptor) -> Classification {
        let text = control.classification_text();
        let matches = |terms: &[String]| terms.iter().any(|t| text.contains(t.as_str()));
        Classification {
            never_touch: matches(&self.classifier.never_touch),
            blacklisted: matches(&self.classifier.destructive),
            retrieval_impacting: matches(&self.classifier.retrieval),
        }
    }
}

impl Policy {
    /// The embedded default policy. A broken embedded document is an error,
    /// never an empty lexicon.
    pub fn builtin() -> CoreResult<Self> {
        Self::from_toml_str(DEFAULT_POLICY)
    }
}

/// Independent classification flags for one control.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// Secret/credential: always skipped
    pub never_touch: bool,
    /// Destructive: skipped unless destructive actions are allowed
    pub blacklisted: bool,
    /// Affects retrieval: triggers the oracle and metrics sampler
    pub retrieval_impacting: bool,
}

impl Classification {
    /// Reason to skip the control before any mutation, if any.
    pub fn skip_reason(&self, allow_destructive: bool) -> Option<&'static str> {
        if self.never_touch {
            Some("sensitive control (credential/secret lexicon)")
        } else if self.blacklisted && !allow_destructive {
            Some("destructive action blacklisted")
        } else {
            None
        }
    }
}
