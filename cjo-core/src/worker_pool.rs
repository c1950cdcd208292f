//! Bounded worker pool for concurrent dimension scoring.
//!
//! Sizing and semaphore-gated dispatch follow the same shape as a batched
//! LLM query executor: fixed concurrency, order-preserving results, failures
//! isolated to their own slot.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::{Error, Result};

/// `max(1, ceil(available_parallelism * phi_inv))`.
pub fn default_pool_size() -> usize {
    let cpus = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    sized_for(cpus)
}

pub fn sized_for(cpus: usize) -> usize {
    let scaled = (cpus as f64 * crate::constants::PHI_INV).ceil() as usize;
    scaled.max(1)
}

/// Retries a failed or timed-out job up to this many additional times, each
/// re-dispatched onto a freshly acquired semaphore slot.
const MAX_ATTEMPTS: u32 = 3;

/// A bounded pool of concurrent task slots with a hard per-task deadline.
///
/// Each submitted job runs to completion or is reported as [`Error::Timeout`];
/// one job timing out or panicking never blocks the others' slots.
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Run `jobs` concurrently, each bounded by `deadline`, returning results
    /// in the same order the jobs were submitted. A job that times out or
    /// fails is retried up to [`MAX_ATTEMPTS`] times, each attempt acquiring
    /// a fresh slot from the semaphore; only the final attempt's error is
    /// surfaced. One job exhausting its retries never blocks the others'
    /// slots.
    pub async fn run_all<F, Fut, T>(&self, jobs: Vec<F>, deadline: Duration) -> Vec<Result<T>>
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let mut set = JoinSet::new();
        for (index, job) in jobs.into_iter().enumerate() {
            let semaphore = Arc::clone(&self.semaphore);
            set.spawn(async move {
                let mut last_err = Error::Internal("worker slot never completed".into());
                for attempt in 1..=MAX_ATTEMPTS {
                    let permit = semaphore.acquire_owned().await.expect("pool semaphore closed");
                    let outcome = tokio::time::timeout(deadline, job()).await;
                    drop(permit);
                    match outcome {
                        Ok(Ok(value)) => return (index, Ok(value)),
                        Ok(Err(e)) => last_err = e,
                        Err(_) => last_err = Error::timeout(deadline.as_millis() as u64),
                    }
                    if attempt < MAX_ATTEMPTS {
                        tracing::warn!(index, attempt, error = %last_err, "dimension scorer failed, retrying on a different worker slot");
                    }
                }
                (index, Err(last_err))
            });
        }

        let mut slots: Vec<Option<Result<T>>> = (0..set.len()).map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(join_err) => {
                    tracing::warn!(error = %join_err, "worker task panicked");
                }
            }
        }

        slots
            .into_iter()
            .map(|s| s.unwrap_or_else(|| Err(Error::Internal("worker slot never completed".into()))))
            .collect()
    }
}
