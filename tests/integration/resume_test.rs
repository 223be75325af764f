//! Resume Integration Tests
//!
//! A resumed run re-emits nothing for controls whose latest record is
//! terminal, retries failed ones, and tolerates a ledger cut mid-line.

use std::fs::OpenOptions;
use std::io::Write;

use tempfile::TempDir;

use control_sweep::storage::resume_keys;
use control_sweep::HarnessConfig;
use control_sweep_core::{MutationPlan, OutcomeStatus};

use crate::fake_app::{
    config_in, ledger, orchestrator, record_for, settings, FakeControl, FakeDashboard,
};

fn resuming(dir: &TempDir) -> HarnessConfig {
    HarnessConfig {
        resume: true,
        ..config_in(dir)
    }
}

fn populate(app: &FakeDashboard) {
    app.add(&settings(), FakeControl::checkbox("show-citations", "Show citations", false));
    app.add(&settings(), FakeControl::text("display-name", "Display name", "Ops"));
    app.add(&settings(), FakeControl::text("openai-api-key", "OpenAI API Key", "sk-live-123"));
}

#[tokio::test]
async fn test_resume_is_idempotent_for_terminal_controls() {
    let dir = TempDir::new().unwrap();
    let app = FakeDashboard::new();
    populate(&app);

    orchestrator(&app, config_in(&dir)).run().await.unwrap();
    let first = ledger(&dir);
    let mutations = app.mutations().len();
    assert_eq!(mutations, 2);
    assert_eq!(resume_keys(&first).len(), 3);

    let summary = orchestrator(&app, resuming(&dir)).run().await.unwrap();
    let all = ledger(&dir);

    assert_eq!(app.mutations().len(), mutations);
    assert_eq!(&all[..first.len()], &first[..]);
    let appended = &all[first.len()..];
    assert!(!appended.is_empty());
    assert!(appended.iter().all(|r| r.action.starts_with("provider_probe:")));
    assert_eq!(summary.by_surface.get("General"), None);
}

#[tokio::test]
async fn test_resume_retries_failed_controls_once() {
    let dir = TempDir::new().unwrap();
    let app = FakeDashboard::new();
    app.add(&settings(), FakeControl::checkbox("response-cache", "Response cache", false));
    app.make_volatile("response-cache");

    orchestrator(&app, config_in(&dir)).run().await.unwrap();
    assert!(resume_keys(&ledger(&dir)).is_empty());

    app.make_durable("response-cache");
    orchestrator(&app, resuming(&dir)).run().await.unwrap();
    assert_eq!(
        app.mutations_of("#response-cache"),
        vec![
            MutationPlan::Toggle { checked: true },
            MutationPlan::Toggle { checked: true },
        ]
    );
    let records = ledger(&dir);
    let last = records
        .iter()
        .rev()
        .find(|r| r.action == "toggle:true")
        .unwrap();
    assert_eq!(last.status, OutcomeStatus::Ok);

    orchestrator(&app, resuming(&dir)).run().await.unwrap();
    assert_eq!(app.mutations_of("#response-cache").len(), 2);
}

#[tokio::test]
async fn test_resume_retries_a_control_with_one_failed_option() {
    let dir = TempDir::new().unwrap();
    let app = FakeDashboard::new();
    app.add(
        &settings(),
        FakeControl::select("answer-style", "Answer style", &["concise", "detailed", "bullet"], "concise"),
    );
    app.drop_writes("answer-style", "detailed");
    let select_all = |dir: &TempDir| HarnessConfig {
        select_all_options: true,
        ..resuming(dir)
    };

    orchestrator(&app, HarnessConfig { resume: false, ..select_all(&dir) })
        .run()
        .await
        .unwrap();
    let first = ledger(&dir);
    assert_eq!(record_for(&first, "answer-style", "select:detailed").status, OutcomeStatus::Failed);
    assert_eq!(record_for(&first, "answer-style", "select:bullet").status, OutcomeStatus::Ok);
    let aggregate = record_for(&first, "answer-style", "select_all");
    assert_eq!(aggregate.status, OutcomeStatus::Failed);
    assert_eq!(
        aggregate.error.as_deref(),
        Some("1 of 2 option(s) failed: select:detailed")
    );
    assert!(resume_keys(&first).is_empty());
    assert_eq!(app.mutations_of("#answer-style").len(), 2);

    app.accept_writes();
    orchestrator(&app, select_all(&dir)).run().await.unwrap();
    assert_eq!(app.mutations_of("#answer-style").len(), 4);
    assert_eq!(resume_keys(&ledger(&dir)).len(), 1);

    orchestrator(&app, select_all(&dir)).run().await.unwrap();
    assert_eq!(app.mutations_of("#answer-style").len(), 4);
}

#[tokio::test]
async fn test_resume_after_interrupted_write() {
    let dir = TempDir::new().unwrap();
    let app = FakeDashboard::new();
    populate(&app);

    orchestrator(&app, config_in(&dir)).run().await.unwrap();
    let intact = ledger(&dir).len();
    {
        let mut file = OpenOptions::new()
            .append(true)
            .open(dir.path().join("sweep.jsonl"))
            .unwrap();
        write!(file, "{{\"ts\":\"2026-10-19T08:00:00Z\",\"surface\":\"Gen").unwrap();
    }

    orchestrator(&app, resuming(&dir)).run().await.unwrap();
    let records = ledger(&dir);
    assert_eq!(app.mutations().len(), 2);
    assert!(records.len() > intact);
    assert!(records[intact..]
        .iter()
        .all(|r| r.action.starts_with("provider_probe:")));
}

#[tokio::test]
async fn test_fresh_run_truncates_the_ledger() {
    let dir = TempDir::new().unwrap();
    let app = FakeDashboard::new();
    populate(&app);

    orchestrator(&app, config_in(&dir)).run().await.unwrap();
    orchestrator(&app, config_in(&dir)).run().await.unwrap();

    let records = ledger(&dir);
    assert_eq!(app.mutations().len(), 4);
    assert_eq!(
        records.iter().filter(|r| r.control_fingerprint.contains("show-citations")).count(),
        1
    );
    assert_eq!(
        record_for(&records, "show-citations", "toggle:false").status,
        OutcomeStatus::Ok
    );
}
