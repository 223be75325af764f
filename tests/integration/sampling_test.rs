//! Metrics Sampling Integration Tests
//!
//! The metrics endpoint is fetched only at sample points of the retrieval
//! mutation sequence, and a sampled scrape missing a required metric fails
//! the mutation that triggered it.

use tempfile::TempDir;

use control_sweep::HarnessConfig;
use control_sweep_core::OutcomeStatus;
use control_sweep_verification::BudgetTier;

use crate::fake_app::{
    config_in, ledger, orchestrator, record_for, retrieval, FakeControl, FakeDashboard, ALL_METRICS,
};

fn retrieval_controls(app: &FakeDashboard) {
    let surface = retrieval();
    app.add(&surface, FakeControl::checkbox("rerank-enabled", "Enable reranker", false));
    app.add(&surface, FakeControl::checkbox("hybrid-enabled", "Hybrid search", false));
    app.add(&surface, FakeControl::checkbox("bm25-enabled", "BM25 scoring", false));
    app.add(&surface, FakeControl::checkbox("expansion-enabled", "Query expansion", false));
}

async fn metrics_calls_for(tier: BudgetTier) -> usize {
    let dir = TempDir::new().unwrap();
    let app = FakeDashboard::new();
    retrieval_controls(&app);
    let config = HarnessConfig {
        metrics_budget: tier,
        ..config_in(&dir)
    };
    orchestrator(&app, config).run().await.unwrap();
    app.metrics_calls()
}

#[tokio::test]
async fn test_medium_budget_samples_every_third_mutation() {
    // Four retrieval mutations: indices 0 and 3.
    assert_eq!(metrics_calls_for(BudgetTier::Medium).await, 2);
}

#[tokio::test]
async fn test_budget_tiers() {
    assert_eq!(metrics_calls_for(BudgetTier::Low).await, 1);
    assert_eq!(metrics_calls_for(BudgetTier::High).await, 4);
}

#[tokio::test]
async fn test_missing_metric_fails_the_sampled_mutation() {
    let dir = TempDir::new().unwrap();
    let app = FakeDashboard::new();
    app.add(&retrieval(), FakeControl::checkbox("rerank-enabled", "Enable reranker", false));
    let partial: String = ALL_METRICS
        .lines()
        .filter(|line| !line.contains("rag_errors_total"))
        .map(|line| format!("{}\n", line))
        .collect();
    app.set_metrics(&partial);

    let config = HarnessConfig {
        metrics_budget: BudgetTier::High,
        ..config_in(&dir)
    };
    orchestrator(&app, config).run().await.unwrap();

    let records = ledger(&dir);
    let probe = record_for(&records, "rerank-enabled", "retrieval_probe_1");
    assert_eq!(probe.status, OutcomeStatus::Ok);

    let mutation = record_for(&records, "rerank-enabled", "toggle:true");
    assert_eq!(mutation.status, OutcomeStatus::Failed);
    assert_eq!(
        mutation.error.as_deref(),
        Some("Metrics check failed: missing required metrics: rag_errors_total")
    );
}
