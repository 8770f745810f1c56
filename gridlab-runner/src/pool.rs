//! Bounded-concurrency task runner.
//!
//! A `BoundedPool` owns a dedicated rayon thread pool with exactly
//! `concurrency` workers, so at most that many tasks are in flight. A worker
//! that finishes a task immediately picks up the next queued one. Results are
//! re-assembled in submission order regardless of completion order.
//!
//! Cancellation is cooperative: once the shared flag is set no new task starts,
//! tasks already running finish, and the batch reports `Cancelled`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What happens to the batch when one task fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunPolicy {
    /// The first task error fails the whole batch; unstarted tasks never start.
    #[default]
    FailFast,
    /// Every task runs; each slot carries its own `Result`.
    CollectPartial,
}

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Pool-level failures. Task errors are reported through the caller's own type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("concurrency must be at least 1")]
    ZeroConcurrency,
    #[error("failed to build worker pool: {0}")]
    Build(String),
    #[error("run cancelled")]
    Cancelled,
}

/// Per-task outcome before the batch is folded into a result.
enum Slot<R, E> {
    Done(R),
    Failed(E),
    NotStarted,
}

/// Fixed-size worker pool.
pub struct BoundedPool {
    pool: rayon::ThreadPool,
    concurrency: usize,
}

impl std::fmt::Debug for BoundedPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedPool")
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

impl BoundedPool {
    pub fn new(concurrency: usize) -> Result<Self, PoolError> {
        if concurrency == 0 {
            return Err(PoolError::ZeroConcurrency);
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(concurrency)
            .thread_name(|i| format!("gridlab-worker-{i}"))
            .build()
            .map_err(|e| PoolError::Build(e.to_string()))?;
        Ok(Self { pool, concurrency })
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run every item under `FailFast`.
    ///
    /// Returns results in submission order, the lowest-index task error, or
    /// `PoolError::Cancelled` converted into `E`.
    pub fn try_run<T, R, E, F>(&self, items: &[T], cancel: &CancelToken, task: F) -> Result<Vec<R>, E>
    where
        T: Sync,
        R: Send,
        E: Send + From<PoolError>,
        F: Fn(usize, &T) -> Result<R, E> + Sync,
    {
        let slots = self.execute(items, cancel, true, &task);

        let mut out = Vec::with_capacity(slots.len());
        let mut cancelled = false;
        for slot in slots {
            match slot {
                Slot::Done(r) => out.push(r),
                Slot::Failed(e) => return Err(e),
                Slot::NotStarted => cancelled = true,
            }
        }
        if cancelled {
            return Err(PoolError::Cancelled.into());
        }
        Ok(out)
    }

    /// Run every item under `CollectPartial`: one `Result` per item, in order.
    pub fn run_partial<T, R, E, F>(
        &self,
        items: &[T],
        cancel: &CancelToken,
        task: F,
    ) -> Result<Vec<Result<R, E>>, PoolError>
    where
        T: Sync,
        R: Send,
        E: Send,
        F: Fn(usize, &T) -> Result<R, E> + Sync,
    {
        let slots = self.execute(items, cancel, false, &task);

        let mut out = Vec::with_capacity(slots.len());
        for slot in slots {
            match slot {
                Slot::Done(r) => out.push(Ok(r)),
                Slot::Failed(e) => out.push(Err(e)),
                Slot::NotStarted => return Err(PoolError::Cancelled),
            }
        }
        Ok(out)
    }

    fn execute<T, R, E, F>(&self, items: &[T], cancel: &CancelToken, stop_on_error: bool, task: &F) -> Vec<Slot<R, E>>
    where
        T: Sync,
        R: Send,
        E: Send,
        F: Fn(usize, &T) -> Result<R, E> + Sync,
    {
        let failed = AtomicBool::new(false);
        self.pool.install(|| {
            items
                .par_iter()
                .enumerate()
                .map(|(index, item)| {
                    if cancel.is_cancelled() || failed.load(Ordering::Relaxed) {
                        return Slot::NotStarted;
                    }
                    match task(index, item) {
                        Ok(r) => Slot::Done(r),
                        Err(e) => {
                            if stop_on_error {
                                failed.store(true, Ordering::Relaxed);
                            }
                            Slot::Failed(e)
                        }
                    }
                })
                .collect()
        })
    }
}
