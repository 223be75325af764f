//! Sweep Orchestrator
//!
//! Top-level run loop. Global preamble, then per surface a bounded pass loop:
//!
//! ```text
//! health (fatal) -> provider coverage (fatal only for local/cloud) ->
//!   for each surface, up to max_passes:
//!     discover -> for each pending control:
//!       classify -> [skip | plan -> verify -> scan -> probe -> smoke -> metrics] -> record
//! finalize (always)
//! ```
//!
//! A control failure is recorded and the page is re-navigated to a known
//! state; only preflight failures escape the surface loop.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use control_sweep_core::{
    control_key, BackendProbe, ChatDriver, Classification, ControlDescriptor, CoreError,
    Feedback, MutationPlan, OutcomeRecord, OutcomeStatus, Policy, RunSummary, SurfaceCatalog,
    UiAccessor, UiSurface,
};
use control_sweep_verification::{
    ActionExecutor, CoverageReport, ExecutorOptions, MetricsSampler, PersistenceVerifier,
    PropagationScanner, ProviderCoverageChecker, RetrievalOracle,
};
use tracing::{debug, info, warn};

use super::state::RunState;
use crate::models::settings::{HarnessConfig, RunMode};
use crate::storage::ledger::OutcomeLedger;
use crate::utils::error::{AppError, AppResult};

const RESPONSE_EXCERPT_CHARS: usize = 240;

fn now() -> String {
    Utc::now().to_rfc3339()
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

fn excerpt(text: &str) -> String {
    let collapsed = control_sweep_core::control::collapse_whitespace(text);
    if collapsed.chars().count() <= RESPONSE_EXCERPT_CHARS {
        return collapsed;
    }
    let mut cut: String = collapsed.chars().take(RESPONSE_EXCERPT_CHARS).collect();
    cut.push('…');
    cut
}

/// Drives one complete sweep against the three seams.
pub struct Orchestrator {
    config: HarnessConfig,
    policy: Policy,
    catalog: SurfaceCatalog,
    ui: Arc<dyn UiAccessor>,
    chat: Arc<dyn ChatDriver>,
    backend: Arc<dyn BackendProbe>,
    executor: ActionExecutor,
    verifier: PersistenceVerifier,
    scanner: PropagationScanner,
    oracle: RetrievalOracle,
    coverage: ProviderCoverageChecker,
    sampler: MetricsSampler,
}

impl Orchestrator {
    pub fn new(
        config: HarnessConfig,
        policy: Policy,
        catalog: SurfaceCatalog,
        ui: Arc<dyn UiAccessor>,
        chat: Arc<dyn ChatDriver>,
        backend: Arc<dyn BackendProbe>,
    ) -> Self {
        let timeouts = config.timeouts();
        let executor = ActionExecutor::new(ExecutorOptions {
            select_all_options: config.select_all_options,
        });
        let verifier = PersistenceVerifier::new(timeouts.apply, config.corpus.clone());
        let oracle = RetrievalOracle::from_policy(
            &policy,
            config.probes_per_mutation,
            timeouts.chat_response,
        );
        let coverage = ProviderCoverageChecker::new(policy.providers.clone());
        let sampler = MetricsSampler::from_policy(&policy, config.metrics_budget);

        Self {
            config,
            policy,
            catalog,
            ui,
            chat,
            backend,
            executor,
            verifier,
            scanner: PropagationScanner::new(),
            oracle,
            coverage,
            sampler,
        }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    // ========================================================================
    // Run lifecycle
    // ========================================================================

    /// Execute a run and always write the summary. A fatal error is returned
    /// after the summary has been persisted.
    pub async fn run(&self) -> AppResult<RunSummary> {
        let mut ledger = OutcomeLedger::open(&self.config.output, self.config.resume)?;
        let seen = if self.config.resume {
            let keys = ledger.load_resume_keys()?;
            info!(resumed = keys.len(), "resume set loaded");
            keys
        } else {
            HashSet::new()
        };
        let mut state = RunState::new(seen);

        info!(
            run_id = %ledger.run_id(),
            mode = %self.config.mode,
            surfaces = self.catalog.len(),
            policy = %self.policy.version,
            "sweep started"
        );

        let result = self.execute(&mut ledger, &mut state).await;

        let fatal = result.as_ref().err().map(|e| e.to_string());
        let summary = ledger.finalize(fatal);

        match result {
            Ok(()) => summary,
            Err(e) => {
                if let Err(summary_err) = summary {
                    warn!(error = %summary_err, "failed to write summary after fatal error");
                }
                Err(e)
            }
        }
    }

    async fn execute(&self, ledger: &mut OutcomeLedger, state: &mut RunState) -> AppResult<()> {
        self.preamble(ledger).await?;

        match self.config.mode {
            RunMode::Preflight => self.inventory(ledger).await,
            RunMode::Full => {
                for surface in self.catalog.surfaces() {
                    self.sweep_surface(surface, ledger, state).await?;
                }
                info!(
                    seen = state.seen_count(),
                    retrieval_mutations = state.retrieval_mutations(),
                    "all surfaces swept"
                );
                Ok(())
            }
        }
    }

    // ========================================================================
    // Preamble
    // ========================================================================

    async fn preamble(&self, ledger: &mut OutcomeLedger) -> AppResult<()> {
        let chat_surface = self.catalog.chat();

        let started = Instant::now();
        if let Err(e) = self.backend.health().await {
            let error = AppError::preflight(format!("backend health check failed: {}", e));
            self.record_preflight_failure(ledger, &chat_surface, started, &error)?;
            return Err(error);
        }
        debug!("backend health check passed");

        let started = Instant::now();
        let report = match self
            .coverage
            .run(
                self.backend.as_ref(),
                self.ui.as_ref(),
                self.chat.as_ref(),
                &self.oracle,
                &chat_surface,
            )
            .await
        {
            Ok(report) => report,
            Err(e) => {
                let error = match e {
                    CoreError::Preflight(msg) => AppError::preflight(msg),
                    other => AppError::preflight(format!("model coverage check failed: {}", other)),
                };
                self.record_preflight_failure(ledger, &chat_surface, started, &error)?;
                return Err(error);
            }
        };

        self.record_coverage(ledger, &chat_surface, &report)?;
        Ok(())
    }

    fn record_preflight_failure(
        &self,
        ledger: &mut OutcomeLedger,
        surface: &UiSurface,
        started: Instant,
        error: &AppError,
    ) -> AppResult<()> {
        warn!(error = %error, "preflight failed");
        ledger.add(
            OutcomeRecord::for_surface(now(), surface, "preflight", OutcomeStatus::Failed, elapsed_ms(started))
                .with_error(error.to_string()),
        )
    }

    fn record_coverage(
        &self,
        ledger: &mut OutcomeLedger,
        surface: &UiSurface,
        report: &CoverageReport,
    ) -> AppResult<()> {
        info!(
            local_models = report.local_models,
            cloud_models = report.cloud_models,
            providers = report.entries.len(),
            "provider coverage complete"
        );
        for entry in &report.entries {
            let status = if !entry.available {
                OutcomeStatus::Skipped
            } else if entry.passed() {
                OutcomeStatus::Ok
            } else {
                OutcomeStatus::Failed
            };
            let mut record = OutcomeRecord::for_surface(
                now(),
                surface,
                format!("provider_probe:{}", entry.provider),
                status,
                entry.duration_ms,
            );
            record = match &entry.model_id {
                Some(model) => record.with_detail(format!("model={}", model)),
                None => record.with_detail("available=false tested=false"),
            };
            record.retrieval_probe_question = entry.question.clone();
            record.retrieval_probe_feedback = entry.feedback.map(|f| f.to_string());
            if let Some(error) = &entry.error {
                record = record.with_error(error.clone());
            } else if entry.feedback == Some(Feedback::Thumbsdown) {
                record = record.with_error("negative signal in provider response");
            }
            ledger.add(record)?;
        }
        Ok(())
    }

    // ========================================================================
    // Preflight inventory
    // ========================================================================

    /// Discover and classify every surface without mutating anything.
    async fn inventory(&self, ledger: &mut OutcomeLedger) -> AppResult<()> {
        for surface in self.catalog.surfaces() {
            let started = Instant::now();
            let controls = match self.open_surface(surface).await {
                Ok(controls) => controls,
                Err(e) => {
                    warn!(surface = %surface.label, error = %e, "inventory could not open surface");
                    ledger.add(
                        OutcomeRecord::for_surface(now(), surface, "inventory", OutcomeStatus::Failed, elapsed_ms(started))
                            .with_error(e.to_string()),
                    )?;
                    continue;
                }
            };

            info!(surface = %surface.label, controls = controls.len(), "inventory");
            for control in &controls {
                let class = self.policy.classify(control);
                let detail = format!(
                    "kind={} never_touch={} blacklisted={} retrieval_impacting={}",
                    control.kind.name(),
                    class.never_touch,
                    class.blacklisted,
                    class.retrieval_impacting
                );
                ledger.add(
                    OutcomeRecord::for_control(now(), surface, control, "inventory", OutcomeStatus::Ok, 0)
                        .with_detail(detail),
                )?;
            }
        }
        Ok(())
    }

    // ========================================================================
    // Surface loop
    // ========================================================================

    async fn open_surface(&self, surface: &UiSurface) -> Result<Vec<ControlDescriptor>, CoreError> {
        self.ui.navigate(surface).await?;
        self.ui.discover().await
    }

    /// Return to a known state on `surface`; discovery re-stamps fallback
    /// identity attributes.
    async fn recover(&self, surface: &UiSurface) {
        if let Err(e) = self.open_surface(surface).await {
            warn!(surface = %surface.label, error = %e, "recovery navigation failed");
        }
    }

    async fn sweep_surface(
        &self,
        surface: &UiSurface,
        ledger: &mut OutcomeLedger,
        state: &mut RunState,
    ) -> AppResult<()> {
        // Failed controls are retried on resume, not within the same run.
        let mut attempted: HashSet<String> = HashSet::new();

        for pass in 1..=self.config.max_passes {
            let started = Instant::now();
            let controls = match self.open_surface(surface).await {
                Ok(controls) => controls,
                Err(e) => {
                    warn!(surface = %surface.label, pass, error = %e, "surface unavailable");
                    ledger.add(
                        OutcomeRecord::for_surface(now(), surface, "discover", OutcomeStatus::Failed, elapsed_ms(started))
                            .with_error(e.to_string()),
                    )?;
                    return Ok(());
                }
            };

            let pending: Vec<ControlDescriptor> = controls
                .into_iter()
                .filter(|c| {
                    let key = control_key(surface, &c.fingerprint);
                    !state.is_seen(&key) && !attempted.contains(&key)
                })
                .collect();

            if pending.is_empty() {
                debug!(surface = %surface.label, pass, "no new controls");
                return Ok(());
            }
            info!(surface = %surface.label, pass, pending = pending.len(), "processing controls");

            for control in &pending {
                attempted.insert(control_key(surface, &control.fingerprint));
                let touched = self.process_control(surface, control, ledger, state).await?;
                if touched {
                    self.recover(surface).await;
                }
            }
        }

        debug!(surface = %surface.label, passes = self.config.max_passes, "pass budget exhausted");
        Ok(())
    }

    // ========================================================================
    // Per-control processing
    // ========================================================================

    /// Process one control. Returns whether the page may have left its
    /// known state.
    async fn process_control(
        &self,
        surface: &UiSurface,
        control: &ControlDescriptor,
        ledger: &mut OutcomeLedger,
        state: &mut RunState,
    ) -> AppResult<bool> {
        let started = Instant::now();
        let key = control_key(surface, &control.fingerprint);
        let class = self.policy.classify(control);

        if let Some(reason) = class.skip_reason(self.config.allow_destructive) {
            debug!(selector = %control.selector, reason, "control skipped");
            ledger.add(
                OutcomeRecord::for_control(now(), surface, control, "classify", OutcomeStatus::Skipped, elapsed_ms(started))
                    .with_detail(reason),
            )?;
            state.mark_seen(key);
            return Ok(false);
        }

        let plans = match self
            .executor
            .plan_control_actions(self.ui.as_ref(), control)
            .await
        {
            Ok(plans) => plans,
            Err(e) => {
                ledger.add(
                    OutcomeRecord::for_control(now(), surface, control, "plan", OutcomeStatus::Failed, elapsed_ms(started))
                        .with_error(e.to_string()),
                )?;
                return Ok(true);
            }
        };

        if plans.is_empty() {
            ledger.add(
                OutcomeRecord::for_control(now(), surface, control, "plan", OutcomeStatus::Skipped, elapsed_ms(started))
                    .with_detail("no deterministic action (disabled, hidden or no distinct value)"),
            )?;
            state.mark_seen(key);
            return Ok(false);
        }

        let mut failed_actions = Vec::new();
        for (i, plan) in plans.iter().enumerate() {
            if i > 0 {
                self.recover(surface).await;
            }
            if !self
                .run_plan(surface, control, plan, class, ledger, state)
                .await?
            {
                failed_actions.push(plan.action_name());
            }
        }

        if failed_actions.is_empty() {
            state.mark_seen(key);
        } else if plans.len() > 1 {
            // The control's latest record must be failed so resume retries it.
            ledger.add(
                OutcomeRecord::for_control(now(), surface, control, "select_all", OutcomeStatus::Failed, elapsed_ms(started))
                    .with_error(format!(
                        "{} of {} option(s) failed: {}",
                        failed_actions.len(),
                        plans.len(),
                        failed_actions.join(", ")
                    )),
            )?;
        }
        Ok(true)
    }

    /// Execute and verify one mutation, run its follow-ups and record it.
    /// Probe and smoke records precede the mutation's own record.
    async fn run_plan(
        &self,
        surface: &UiSurface,
        control: &ControlDescriptor,
        plan: &MutationPlan,
        class: Classification,
        ledger: &mut OutcomeLedger,
        state: &mut RunState,
    ) -> AppResult<bool> {
        let started = Instant::now();
        let action = plan.action_name();

        let result = self
            .verify_and_follow_up(surface, control, plan, class, ledger, state)
            .await;

        let record = OutcomeRecord::for_control(now(), surface, control, action.clone(), OutcomeStatus::Ok, 0);
        let (record, ok) = match result {
            Ok(notes) => (record.with_detail(notes.join("; ")), true),
            Err(e) => {
                warn!(
                    surface = %surface.label,
                    selector = %control.selector,
                    action = %action,
                    error = %e,
                    "control failed"
                );
                let mut failed = record.with_error(e.to_string());
                failed.status = OutcomeStatus::Failed;
                (failed, false)
            }
        };

        ledger.add(OutcomeRecord {
            duration_ms: elapsed_ms(started),
            ..record
        })?;
        Ok(ok)
    }

    async fn verify_and_follow_up(
        &self,
        surface: &UiSurface,
        control: &ControlDescriptor,
        plan: &MutationPlan,
        class: Classification,
        ledger: &mut OutcomeLedger,
        state: &mut RunState,
    ) -> AppResult<Vec<String>> {
        let mut notes = Vec::new();

        let report = self
            .verifier
            .verify(
                self.ui.as_ref(),
                self.backend.as_ref(),
                &self.executor,
                control,
                plan,
            )
            .await?;
        notes.push(report.detail());

        if let Some(expected) = &report.expected {
            if self.config.propagation_scan {
                let scan = self
                    .scanner
                    .scan(self.ui.as_ref(), &self.catalog, surface, control, expected)
                    .await?;
                notes.push(scan.detail());
            }
        }

        if class.retrieval_impacting {
            self.retrieval_follow_up(surface, control, ledger, state, &mut notes)
                .await?;
        }

        Ok(notes)
    }

    /// Chat probes, smoke pass and metrics sample after a verified
    /// retrieval-impacting mutation.
    async fn retrieval_follow_up(
        &self,
        surface: &UiSurface,
        control: &ControlDescriptor,
        ledger: &mut OutcomeLedger,
        state: &mut RunState,
        notes: &mut Vec<String>,
    ) -> AppResult<()> {
        let chat_surface = self.catalog.chat();
        let probes = self.oracle.probes_per_mutation();
        let mut failures: Vec<CoreError> = Vec::new();
        let mut regressions = 0usize;

        for n in 1..=probes {
            let started = Instant::now();
            let question = self
                .oracle
                .question_at(state.next_question_index())
                .to_string();
            let action = format!("retrieval_probe_{}", n);

            let mut record = OutcomeRecord::for_control(now(), surface, control, action, OutcomeStatus::Ok, 0);
            match self
                .oracle
                .probe(self.ui.as_ref(), self.chat.as_ref(), &chat_surface, &question)
                .await
            {
                Ok(probe) => {
                    record = record
                        .with_probe(question.clone(), probe.feedback.to_string())
                        .with_detail(excerpt(&probe.response));
                    if probe.feedback == Feedback::Thumbsdown {
                        regressions += 1;
                        record.status = OutcomeStatus::Failed;
                        record = record.with_error("negative signal in response");
                    }
                }
                Err(e) => {
                    regressions += 1;
                    record.status = OutcomeStatus::Failed;
                    record.retrieval_probe_question = Some(question.clone());
                    record = record.with_error(e.to_string());
                }
            }
            record.duration_ms = elapsed_ms(started);
            ledger.add(record)?;
        }
        if regressions > 0 {
            failures.push(CoreError::regression(format!(
                "{} of {} probe(s) failed",
                regressions, probes
            )));
        }
        notes.push(format!("probes: {} of {} acceptable", probes - regressions, probes));

        for smoke in self
            .oracle
            .smoke(self.ui.as_ref(), &self.catalog.smoke_surfaces())
            .await
        {
            let status = if smoke.rendered {
                OutcomeStatus::Ok
            } else {
                OutcomeStatus::Failed
            };
            let mut record = OutcomeRecord::for_surface(
                now(),
                &smoke.surface,
                format!("smoke:{}", smoke.surface.surface_key()),
                status,
                smoke.duration_ms,
            );
            if !smoke.rendered {
                let error = smoke
                    .error
                    .clone()
                    .unwrap_or_else(|| "surface did not render".to_string());
                failures.push(CoreError::regression(format!(
                    "smoke check on {} failed: {}",
                    smoke.surface.label, error
                )));
                record = record.with_error(error);
            }
            ledger.add(record)?;
        }

        let index = state.next_retrieval_index();
        match self.sampler.check(self.backend.as_ref(), index).await {
            Ok(check) if check.checked => notes.push(format!("metrics: checked at index {}", index)),
            Ok(_) => notes.push(format!("metrics: not sampled at index {}", index)),
            Err(e) => failures.push(e),
        }

        match failures.len() {
            0 => Ok(()),
            1 => Err(failures.remove(0).into()),
            _ => Err(CoreError::internal(
                failures
                    .iter()
                    .map(|f| f.to_string())
                    .collect::<Vec<_>>()
                    .join("; "),
            )
            .into()),
        }
    }
}
