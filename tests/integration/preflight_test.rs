//! Preflight Integration Tests
//!
//! Global preconditions (backend health, local plus cloud model coverage)
//! abort the run before any control is touched, with the summary still
//! written. Missing individual providers are recorded and the run goes on.
//! Preflight mode inventories controls without mutating anything.

use tempfile::TempDir;

use control_sweep::storage::summary_path;
use control_sweep::{HarnessConfig, RunMode};
use control_sweep_core::{ChatModel, OutcomeStatus, RunSummary};

use crate::fake_app::{
    config_in, ledger, orchestrator, record_for, settings, FakeControl, FakeDashboard,
};

fn read_summary(dir: &TempDir) -> RunSummary {
    let path = summary_path(&dir.path().join("sweep.jsonl"));
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[tokio::test]
async fn test_cloud_only_models_abort_before_any_mutation() {
    let dir = TempDir::new().unwrap();
    let app = FakeDashboard::new();
    app.add(&settings(), FakeControl::checkbox("show-citations", "Show citations", false));
    app.set_models(vec![
        ChatModel::new("gpt-4o-mini", "openai", "cloud_direct"),
        ChatModel::new("anthropic/claude-3.5-sonnet", "anthropic", "openrouter"),
    ]);

    let err = orchestrator(&app, config_in(&dir)).run().await.unwrap_err();

    assert!(err
        .to_string()
        .starts_with("Preflight failed: need at least one local model and one cloud model"));
    assert!(err.to_string().contains("found 0 local, 2 cloud"));
    assert!(err.is_fatal());
    assert!(app.mutations().is_empty());
    assert!(app.selected_models().is_empty());

    let records = ledger(&dir);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].action, "preflight");
    assert_eq!(records[0].status, OutcomeStatus::Failed);

    let summary = read_summary(&dir);
    assert_eq!(summary.failed, 1);
    assert!(summary
        .fatal
        .as_deref()
        .unwrap()
        .contains("need at least one local model and one cloud model"));
    assert!(summary.finished_at.is_some());
}

#[tokio::test]
async fn test_unhealthy_backend_is_fatal() {
    let dir = TempDir::new().unwrap();
    let app = FakeDashboard::new();
    app.add(&settings(), FakeControl::checkbox("show-citations", "Show citations", false));
    app.set_healthy(false);

    let err = orchestrator(&app, config_in(&dir)).run().await.unwrap_err();

    assert!(err
        .to_string()
        .starts_with("Preflight failed: backend health check failed"));
    assert!(app.mutations().is_empty());
    assert!(app.navigations().is_empty());
    assert!(read_summary(&dir).fatal.is_some());
}

#[tokio::test]
async fn test_missing_provider_is_recorded_not_fatal() {
    let dir = TempDir::new().unwrap();
    let app = FakeDashboard::new();
    app.add(&settings(), FakeControl::checkbox("show-citations", "Show citations", false));
    app.set_models(vec![
        ChatModel::new("llama3.1:8b", "ollama", "ollama"),
        ChatModel::new("gpt-4o-mini", "openai", "cloud_direct"),
    ]);

    let summary = orchestrator(&app, config_in(&dir)).run().await.unwrap();
    assert!(summary.fatal.is_none());
    assert_eq!(app.selected_models(), vec!["gpt-4o-mini", "llama3.1:8b"]);

    let records = ledger(&dir);
    let status_of = |action: &str| {
        records
            .iter()
            .find(|r| r.action == action)
            .map(|r| r.status)
            .unwrap()
    };
    assert_eq!(status_of("provider_probe:openai"), OutcomeStatus::Ok);
    assert_eq!(status_of("provider_probe:ollama"), OutcomeStatus::Ok);
    assert_eq!(status_of("provider_probe:anthropic"), OutcomeStatus::Skipped);
    assert_eq!(status_of("provider_probe:openrouter"), OutcomeStatus::Skipped);

    let skipped = records
        .iter()
        .find(|r| r.action == "provider_probe:anthropic")
        .unwrap();
    assert_eq!(skipped.detail.as_deref(), Some("available=false tested=false"));

    assert_eq!(record_for(&records, "show-citations", "toggle:true").status, OutcomeStatus::Ok);
}

#[tokio::test]
async fn test_aggregated_providers_are_probed_through_their_route() {
    let dir = TempDir::new().unwrap();
    let app = FakeDashboard::new();

    orchestrator(&app, config_in(&dir)).run().await.unwrap();

    assert_eq!(
        app.selected_models(),
        vec![
            "gpt-4o-mini",
            "anthropic/claude-3.5-sonnet",
            "anthropic/claude-3.5-sonnet",
            "llama3.1:8b",
        ]
    );
    let records = ledger(&dir);
    let anthropic = records
        .iter()
        .find(|r| r.action == "provider_probe:anthropic")
        .unwrap();
    assert_eq!(anthropic.status, OutcomeStatus::Ok);
    assert_eq!(anthropic.retrieval_probe_feedback.as_deref(), Some("thumbsup"));
    assert!(anthropic
        .retrieval_probe_question
        .as_deref()
        .unwrap()
        .contains("provider check: anthropic"));
}

#[tokio::test]
async fn test_preflight_mode_inventories_without_mutating() {
    let dir = TempDir::new().unwrap();
    let app = FakeDashboard::new();
    app.add(&settings(), FakeControl::checkbox("show-citations", "Show citations", false));
    app.add(&settings(), FakeControl::text("openai-api-key", "OpenAI API Key", "sk-live-123"));
    app.add(&settings(), FakeControl::button("Delete corpus"));

    let config = HarnessConfig {
        mode: RunMode::Preflight,
        ..config_in(&dir)
    };
    let summary = orchestrator(&app, config).run().await.unwrap();

    assert!(app.mutations().is_empty());
    assert_eq!(app.reloads(), 0);

    let records = ledger(&dir);
    let inventory: Vec<_> = records.iter().filter(|r| r.action == "inventory").collect();
    assert_eq!(inventory.len(), 3);
    assert!(inventory.iter().all(|r| r.status == OutcomeStatus::Ok));

    assert_eq!(
        record_for(&records, "show-citations", "inventory").detail.as_deref(),
        Some("kind=checkbox never_touch=false blacklisted=false retrieval_impacting=false")
    );
    assert_eq!(
        record_for(&records, "openai-api-key", "inventory").detail.as_deref(),
        Some("kind=text never_touch=true blacklisted=false retrieval_impacting=false")
    );
    assert_eq!(
        record_for(&records, "delete corpus", "inventory").detail.as_deref(),
        Some("kind=clickable never_touch=false blacklisted=true retrieval_impacting=true")
    );
    assert_eq!(summary.by_surface["General"].total, 3);
}
