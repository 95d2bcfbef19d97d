//! Fire-and-forget background jobs
//!
//! Cache writes and distillation run after the answer is returned. Their
//! outcomes are only observable through logs and the counters in
//! [`JobStats`].

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use crate::error::Result;

/// Snapshot of job counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStats {
    pub submitted: u64,
    pub succeeded: u64,
    pub failed: u64,
}

impl JobStats {
    /// Jobs submitted but not finished yet
    pub fn in_flight(&self) -> u64 {
        self.submitted
            .saturating_sub(self.succeeded)
            .saturating_sub(self.failed)
    }
}

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

/// Tracker for spawned jobs
///
/// Cloning shares the same tracker and counters.
#[derive(Debug, Clone, Default)]
pub struct BackgroundJobs {
    tracker: TaskTracker,
    counters: Arc<Counters>,
}

impl BackgroundJobs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `job`; an `Err` outcome or a panic is logged and counted as failed
    pub fn submit<F>(&self, name: &'static str, job: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        let counters = Arc::clone(&self.counters);

        self.tracker.spawn(async move {
            match AssertUnwindSafe(job).catch_unwind().await {
                Ok(Ok(())) => {
                    counters.succeeded.fetch_add(1, Ordering::Relaxed);
                    debug!(job = name, "Background job finished");
                }
                Ok(Err(e)) => {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    warn!(job = name, error = %e, code = e.code(), "Background job failed");
                }
                Err(_) => {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    warn!(job = name, "Background job panicked");
                }
            }
        });
    }

    /// Close the tracker and wait for in-flight jobs
    ///
    /// Jobs submitted after this call still run but are not awaited by it.
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }

    pub fn stats(&self) -> JobStats {
        JobStats {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            succeeded: self.counters.succeeded.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }
}
