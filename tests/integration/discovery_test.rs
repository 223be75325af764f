//! Discovery Identity Integration Tests
//!
//! Fingerprints and selectors must identify the same logical control across
//! discovery passes and hard reloads, independent of the current value.

use control_sweep_core::{ControlKind, MutationPlan, UiAccessor, FINGERPRINT_ATTR};

use crate::fake_app::{retrieval, FakeControl, FakeDashboard};

fn populate(app: &FakeDashboard) {
    let surface = retrieval();
    app.add(&surface, FakeControl::checkbox("rerank-enabled", "Enable reranker", false));
    app.add(&surface, FakeControl::range("top-k", "Top K", 10.0, 1.0, 50.0, 1.0));
    app.add(&surface, FakeControl::button("Rebuild preview"));
}

#[tokio::test]
async fn test_fingerprints_survive_mutation_and_reload() {
    let app = FakeDashboard::new();
    populate(&app);

    app.navigate(&retrieval()).await.unwrap();
    let before = app.discover().await.unwrap();
    assert_eq!(before.len(), 3);

    app.mutate("#rerank-enabled", &MutationPlan::Toggle { checked: true })
        .await
        .unwrap();
    app.mutate("#top-k", &MutationPlan::SetValue { value: "11".into() })
        .await
        .unwrap();
    app.reload().await.unwrap();
    let after = app.discover().await.unwrap();

    let fingerprints = |controls: &[control_sweep_core::ControlDescriptor]| {
        controls.iter().map(|c| c.fingerprint.clone()).collect::<Vec<_>>()
    };
    assert_eq!(fingerprints(&before), fingerprints(&after));

    let selectors = |controls: &[control_sweep_core::ControlDescriptor]| {
        controls.iter().map(|c| c.selector.clone()).collect::<Vec<_>>()
    };
    assert_eq!(selectors(&before), selectors(&after));

    assert_eq!(before[0].current_value(), "false");
    assert_eq!(after[0].current_value(), "true");
    assert_eq!(after[1].value.as_deref(), Some("11"));
}

#[tokio::test]
async fn test_control_kinds_are_derived_at_discovery() {
    let app = FakeDashboard::new();
    populate(&app);
    app.navigate(&retrieval()).await.unwrap();
    let controls = app.discover().await.unwrap();

    assert_eq!(controls[0].kind, ControlKind::Checkbox);
    assert_eq!(
        controls[1].kind,
        ControlKind::Range {
            min: Some(1.0),
            max: Some(50.0),
            step: 1.0
        }
    );
    assert_eq!(controls[2].kind, ControlKind::Clickable);
}

#[tokio::test]
async fn test_stamped_selector_needs_rediscovery_after_reload() {
    let app = FakeDashboard::new();
    populate(&app);
    app.navigate(&retrieval()).await.unwrap();

    let button = app
        .discover()
        .await
        .unwrap()
        .into_iter()
        .find(|c| c.tag == "button")
        .unwrap();
    assert!(button.uses_stamp());
    assert!(button.selector.starts_with(&format!("[{}=", FINGERPRINT_ATTR)));
    assert!(app.inspect(&button.selector).await.unwrap().is_some());

    app.reload().await.unwrap();
    assert!(app.inspect(&button.selector).await.unwrap().is_none());

    let again = app.discover().await.unwrap();
    let rediscovered = again.iter().find(|c| c.tag == "button").unwrap();
    assert_eq!(rediscovered.selector, button.selector);
    assert!(app.inspect(&button.selector).await.unwrap().is_some());
}

#[tokio::test]
async fn test_hidden_and_duplicate_controls_are_excluded() {
    let app = FakeDashboard::new();
    let surface = retrieval();
    app.add(&surface, FakeControl::checkbox("rerank-enabled", "Enable reranker", false));
    app.add(&surface, FakeControl::checkbox("rerank-enabled", "Enable reranker", false));
    app.add(&surface, FakeControl::checkbox("debug-panel", "Debug panel", false).hidden());

    app.navigate(&surface).await.unwrap();
    let controls = app.discover().await.unwrap();
    assert_eq!(controls.len(), 1);
    assert_eq!(controls[0].id, "rerank-enabled");
    assert!(app.inspect("#debug-panel").await.unwrap().is_none());
}
