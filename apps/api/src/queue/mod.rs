//! Minimal at-least-once job queue on Redis.
//!
//! Jobs move `waiting -> active -> completed | delayed | failed`. Failed
//! attempts are retried with the job's backoff until its attempt budget is
//! spent; finished jobs are pruned according to their retention policy.
//! A claimed job is locked for a limited time. If its worker neither
//! finishes nor renews the lock, the job counts as stalled and the next
//! claim moves it back into line, so execution may be repeated after a
//! crash or retry and workers must treat jobs as idempotent.

pub mod job;
#[cfg(test)]
pub mod memory;
pub mod options;
pub mod redis_queue;
pub mod retention;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

pub use job::{FailOutcome, JobRecord, JobState, STALLED_REASON};
pub use options::{Backoff, JobOptions, Retention};
pub use redis_queue::RedisQueue;

/// How long a worker may hold a job before it is considered stalled.
pub const DEFAULT_LOCK_DURATION: Duration = Duration::from_secs(30);

/// Queue-assigned ids are decimal counters. Anything else cannot name a job
/// and must never be turned into a key.
pub fn is_job_id(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit())
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Job serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Job {0} not found")]
    JobNotFound(String),

    #[error("Job {id} is {state}, expected active")]
    InvalidState { id: String, state: JobState },
}

/// Storage and state transitions of one named queue.
///
/// Producers only need `enqueue`. `claim_next`, `extend_lock`, `complete`
/// and `fail` form the worker side, while `get`, `failed` and `remove` let
/// operators inspect and clean up retained failures.
#[async_trait]
pub trait QueueBackend: Send + Sync {
    fn queue_name(&self) -> &str;

    async fn enqueue(
        &self,
        name: &str,
        owner: Option<&str>,
        data: Value,
        opts: JobOptions,
        now: DateTime<Utc>,
    ) -> Result<JobRecord, QueueError>;

    /// Recovers stalled jobs, promotes delayed jobs whose backoff has
    /// elapsed, then hands out the oldest waiting job under a fresh lock.
    async fn claim_next(&self, now: DateTime<Utc>) -> Result<Option<JobRecord>, QueueError>;

    /// Renews the lock of an active job.
    async fn extend_lock(&self, id: &str, now: DateTime<Utc>) -> Result<JobRecord, QueueError>;

    /// Takes every active job whose lock expired before `now` off the
    /// active set. Each one is retried or failed like a failed attempt.
    /// Returns the recovered ids.
    async fn recover_stalled(&self, now: DateTime<Utc>) -> Result<Vec<String>, QueueError>;

    async fn complete(&self, id: &str, now: DateTime<Utc>) -> Result<JobRecord, QueueError>;

    async fn fail(
        &self,
        id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<FailOutcome, QueueError>;

    async fn get(&self, id: &str) -> Result<Option<JobRecord>, QueueError>;

    /// Jobs retained in the failed set, oldest failure first.
    async fn failed(&self) -> Result<Vec<JobRecord>, QueueError>;

    async fn remove(&self, id: &str) -> Result<(), QueueError>;
}
