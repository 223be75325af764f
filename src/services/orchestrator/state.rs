//! Run State
//!
//! Process-lifetime crawl state owned by one orchestrator run: the resume
//! set, the question rotation index and the retrieval mutation counter.

use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct RunState {
    seen: HashSet<String>,
    question_index: usize,
    retrieval_mutations: usize,
}

impl RunState {
    /// Start from a resume set (empty for a fresh run).
    pub fn new(seen: HashSet<String>) -> Self {
        Self {
            seen,
            question_index: 0,
            retrieval_mutations: 0,
        }
    }

    pub fn is_seen(&self, control_key: &str) -> bool {
        self.seen.contains(control_key)
    }

    /// Mark a control key terminal (`ok` or `skipped`).
    pub fn mark_seen(&mut self, control_key: impl Into<String>) {
        self.seen.insert(control_key.into());
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    /// Current rotation index, then advance.
    pub fn next_question_index(&mut self) -> usize {
        let index = self.question_index;
        self.question_index += 1;
        index
    }

    /// Zero-based index of this retrieval mutation, then advance.
    pub fn next_retrieval_index(&mut self) -> usize {
        let index = self.retrieval_mutations;
        self.retrieval_mutations += 1;
        index
    }

    pub fn retrieval_mutations(&self) -> usize {
        self.retrieval_mutations
    }
}
