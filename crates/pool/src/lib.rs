// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Bounded worker pools for the Send and Cancel document queues.
//!
//! A pool tracks each in-flight job by ID, fires its [`CancelToken`] on
//! `cancel` or on shutdown, and lets the caller block for a bounded drain
//! via `shutdown_and_wait`. Concurrency is enforced by a `tokio::Semaphore`
//! rather than a fixed number of OS threads: acquiring a permit is the
//! async equivalent of waiting for a free thread in the pool.

use dproc_core::CancelToken;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Default concurrency for the Send pool (spec range is 10-20).
pub const DEFAULT_SEND_POOL_CONCURRENCY: usize = 10;
/// Fixed concurrency for the Cancel pool: cancel must never queue behind send.
pub const CANCEL_POOL_CONCURRENCY: usize = 3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("job {0} is already submitted")]
    DuplicateJob(String),
    #[error("pool is shutting down, new submissions are refused")]
    ShuttingDown,
}

struct Inflight {
    cancel: CancelToken,
    handle: JoinHandle<()>,
}

/// Report from [`WorkerPool::shutdown_and_wait`]: which jobs, if any, were
/// still running when the grace period elapsed.
#[derive(Debug, Default, Clone)]
pub struct ShutdownReport {
    pub timed_out: Vec<String>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.timed_out.is_empty()
    }
}

/// A named, bounded-concurrency job pool keyed by job ID.
pub struct WorkerPool {
    name: &'static str,
    semaphore: Arc<Semaphore>,
    inflight: Arc<Mutex<HashMap<String, Inflight>>>,
    shutting_down: Arc<AtomicBool>,
}

impl WorkerPool {
    pub fn new(name: &'static str, concurrency: usize) -> Self {
        Self {
            name,
            semaphore: Arc::new(Semaphore::new(concurrency)),
            inflight: Arc::new(Mutex::new(HashMap::new())),
            shutting_down: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The Send pool: long-running steps, bounded by config.
    pub fn send_pool(concurrency: usize) -> Self {
        Self::new("send", concurrency)
    }

    /// The Cancel pool: short tasks, fixed small bound so cancel is never
    /// starved behind send.
    pub fn cancel_pool() -> Self {
        Self::new("cancel", CANCEL_POOL_CONCURRENCY)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Currently tracked job count (running or waiting for a permit).
    pub fn inflight_count(&self) -> usize {
        self.inflight.lock().len()
    }

    /// Enqueue `f`, keyed by `job_id`. Rejects a duplicate `job_id` and any
    /// submission once shutdown has started. `f` receives the job's
    /// [`CancelToken`] and is expected to honor it cooperatively.
    pub fn submit<F, Fut>(&self, job_id: impl Into<String>, f: F) -> Result<(), PoolError>
    where
        F: FnOnce(CancelToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let job_id = job_id.into();
        let mut map = self.inflight.lock();
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(PoolError::ShuttingDown);
        }
        if map.contains_key(&job_id) {
            return Err(PoolError::DuplicateJob(job_id));
        }

        let cancel = CancelToken::new();
        let cancel_for_task = cancel.clone();
        let semaphore = self.semaphore.clone();
        let inflight = self.inflight.clone();
        let job_id_for_task = job_id.clone();
        let pool_name = self.name;

        let handle = tokio::spawn(async move {
            let permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return, // pool closed during shutdown before this job started
            };
            let start = Instant::now();
            f(cancel_for_task).await;
            tracing::debug!(pool = pool_name, job_id = %job_id_for_task, elapsed_ms = start.elapsed().as_millis() as u64, "job finished");
            drop(permit);
            inflight.lock().remove(&job_id_for_task);
        });

        map.insert(job_id, Inflight { cancel, handle });
        Ok(())
    }

    /// Signal the named job's [`CancelToken`]. Returns whether a job with
    /// that ID was found in-flight.
    pub fn cancel(&self, job_id: &str) -> bool {
        match self.inflight.lock().get(job_id) {
            Some(entry) => {
                entry.cancel.cancel(dproc_core::CancelReason::Canceled);
                true
            }
            None => false,
        }
    }

    /// Refuse further submissions, signal every in-flight job with
    /// [`dproc_core::CancelReason::ShutDown`], and block until each exits or
    /// `timeout` elapses.
    pub async fn shutdown_and_wait(&self, timeout: Duration) -> ShutdownReport {
        self.shutting_down.store(true, Ordering::SeqCst);
        self.semaphore.close();

        let drained: Vec<(String, Inflight)> = self.inflight.lock().drain().collect();
        for (_, entry) in &drained {
            entry.cancel.cancel(dproc_core::CancelReason::ShutDown);
        }

        let deadline = Instant::now() + timeout;
        let mut timed_out = Vec::new();
        for (job_id, entry) in drained {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, entry.handle).await {
                Ok(_) => {}
                Err(_) => {
                    tracing::warn!(pool = self.name, job_id = %job_id, "job did not exit before shutdown grace period elapsed");
                    timed_out.push(job_id);
                }
            }
        }

        ShutdownReport { timed_out }
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
