//! Optimizer metrics sink.
//!
//! The optimizer reports run counts, errors and latency through an injected
//! sink instead of process-wide counters, so tests can observe exactly what
//! one optimization recorded.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::envelope::ErrorCode;
use crate::leaderboard::Objective;

pub trait MetricsSink: Send + Sync {
    /// One successful optimization over `combinations` grid rows.
    fn record_run(&self, objective: Objective, combinations: usize);
    /// One failed optimization.
    fn record_error(&self, code: ErrorCode);
    /// Wall-clock time of one successful optimization.
    fn record_latency(&self, combinations: usize, total_ms: u64);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl MetricsSink for NoopSink {
    fn record_run(&self, _objective: Objective, _combinations: usize) {}
    fn record_error(&self, _code: ErrorCode) {}
    fn record_latency(&self, _combinations: usize, _total_ms: u64) {}
}

/// Emits one `tracing` event per record.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl MetricsSink for TracingSink {
    fn record_run(&self, objective: Objective, combinations: usize) {
        tracing::info!(target: "gridlab::metrics", %objective, combinations, "optimizer run");
    }

    fn record_error(&self, code: ErrorCode) {
        tracing::warn!(target: "gridlab::metrics", code = code.as_str(), "optimizer error");
    }

    fn record_latency(&self, combinations: usize, total_ms: u64) {
        tracing::info!(target: "gridlab::metrics", combinations, total_ms, "optimizer latency");
    }
}

/// In-memory counters.
#[derive(Debug, Default)]
pub struct CountingSink {
    runs: AtomicUsize,
    combinations: AtomicUsize,
    errors: Mutex<Vec<ErrorCode>>,
    total_ms: AtomicU64,
}

impl CountingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::Relaxed)
    }

    pub fn combinations(&self) -> usize {
        self.combinations.load(Ordering::Relaxed)
    }

    pub fn total_ms(&self) -> u64 {
        self.total_ms.load(Ordering::Relaxed)
    }

    /// Error codes in the order they were recorded.
    pub fn errors(&self) -> Vec<ErrorCode> {
        match self.errors.lock() {
            Ok(errors) => errors.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl MetricsSink for CountingSink {
    fn record_run(&self, _objective: Objective, combinations: usize) {
        self.runs.fetch_add(1, Ordering::Relaxed);
        self.combinations.fetch_add(combinations, Ordering::Relaxed);
    }

    fn record_error(&self, code: ErrorCode) {
        match self.errors.lock() {
            Ok(mut errors) => errors.push(code),
            Err(poisoned) => poisoned.into_inner().push(code),
        }
    }

    fn record_latency(&self, _combinations: usize, total_ms: u64) {
        self.total_ms.fetch_add(total_ms, Ordering::Relaxed);
    }
}
