//! Integration Tests Module
//!
//! End-to-end sweeps against an in-memory dashboard. No browser or network
//! is involved: `fake_app` implements the UI, chat and backend seams over a
//! shared configuration store.

// In-memory dashboard implementing all three seams
mod fake_app;

// Discovery identity across passes and reloads
mod discovery_test;


// Metrics budget sampling
mod sampling_test;

// Resume and ledger durability
mod resume_test;

// Global preconditions and preflight inventory
mod preflight_test;
