//! In-process queue with the same transitions as `RedisQueue`, for tests.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::Mutex;

use super::job::{FailOutcome, JobRecord, JobState};
use super::options::{JobOptions, Retention};
use super::{retention, DEFAULT_LOCK_DURATION};
use super::{QueueBackend, QueueError};

#[derive(Default)]
struct Inner {
    next_id: u64,
    jobs: HashMap<String, JobRecord>,
    wait: VecDeque<String>,
    /// Claimed ids with their lock deadlines.
    active: Vec<(String, i64)>,
    delayed: Vec<(String, i64)>,
    completed: Vec<(String, i64)>,
    failed: Vec<(String, i64)>,
    /// Set to simulate an unreachable transport.
    offline: bool,
}

impl Inner {
    fn check_online(&self) -> Result<(), QueueError> {
        if self.offline {
            let err: redis::RedisError =
                (redis::ErrorKind::IoError, "connection refused").into();
            return Err(err.into());
        }
        Ok(())
    }

    fn prune_completed(&mut self, policy: &Retention, now_ms: i64) {
        for id in retention::expired(policy, &self.completed, now_ms) {
            self.completed.retain(|(member, _)| *member != id);
            self.jobs.remove(&id);
        }
    }

    fn prune_failed(&mut self, policy: &Retention, now_ms: i64) {
        for id in retention::expired(policy, &self.failed, now_ms) {
            self.failed.retain(|(member, _)| *member != id);
            self.jobs.remove(&id);
        }
    }

    fn settle_failure(&mut self, id: &str, outcome: &FailOutcome, policy: &Retention, now_ms: i64) {
        self.active.retain(|(member, _)| member != id);
        match outcome {
            FailOutcome::Retry { run_at, .. } => self.delayed.push((id.to_string(), *run_at)),
            FailOutcome::Exhausted => {
                self.failed.push((id.to_string(), now_ms));
                self.prune_failed(policy, now_ms);
            }
        }
    }

    fn recover_stalled(&mut self, now: DateTime<Utc>) -> Result<Vec<String>, QueueError> {
        let now_ms = now.timestamp_millis();
        let (expired, held): (Vec<_>, Vec<_>) = self
            .active
            .drain(..)
            .partition(|(_, lock_until)| *lock_until <= now_ms);
        self.active = held;

        let mut recovered = Vec::new();
        for (id, _) in expired {
            let Some(job) = self.jobs.get_mut(&id) else {
                continue;
            };
            match job.register_stall(now) {
                Ok(None) => self.wait.push_front(id.clone()),
                Ok(Some(outcome)) => {
                    let policy = job.opts.remove_on_fail;
                    self.settle_failure(&id, &outcome, &policy, now_ms);
                }
                Err(QueueError::InvalidState { .. }) => continue,
                Err(e) => return Err(e),
            }
            recovered.push(id);
        }
        Ok(recovered)
    }

    fn job_mut(&mut self, id: &str) -> Result<&mut JobRecord, QueueError> {
        self.jobs
            .get_mut(id)
            .ok_or_else(|| QueueError::JobNotFound(id.to_string()))
    }
}

pub struct MemoryQueue {
    name: String,
    lock_duration: Duration,
    inner: Mutex<Inner>,
}

impl MemoryQueue {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            lock_duration: DEFAULT_LOCK_DURATION,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn with_lock_duration(mut self, lock_duration: Duration) -> Self {
        self.lock_duration = lock_duration;
        self
    }

    pub async fn set_offline(&self, offline: bool) {
        self.inner.lock().await.offline = offline;
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.jobs.len()
    }

    pub async fn completed_ids(&self) -> Vec<String> {
        let inner = self.inner.lock().await;
        inner.completed.iter().map(|(id, _)| id.clone()).collect()
    }
}

#[async_trait]
impl QueueBackend for MemoryQueue {
    fn queue_name(&self) -> &str {
        &self.name
    }

    async fn enqueue(
        &self,
        name: &str,
        owner: Option<&str>,
        data: Value,
        opts: JobOptions,
        now: DateTime<Utc>,
    ) -> Result<JobRecord, QueueError> {
        let mut inner = self.inner.lock().await;
        inner.check_online()?;
        inner.next_id += 1;
        let job = JobRecord::new(inner.next_id.to_string(), name, data, opts, now).owned_by(owner);
        inner.wait.push_back(job.id.clone());
        inner.jobs.insert(job.id.clone(), job.clone());
        Ok(job)
    }

    async fn claim_next(&self, now: DateTime<Utc>) -> Result<Option<JobRecord>, QueueError> {
        let mut inner = self.inner.lock().await;
        inner.check_online()?;
        inner.recover_stalled(now)?;
        let now_ms = now.timestamp_millis();

        let (due, pending): (Vec<_>, Vec<_>) = inner
            .delayed
            .drain(..)
            .partition(|(_, run_at)| *run_at <= now_ms);
        inner.delayed = pending;
        for (id, _) in due {
            inner.job_mut(&id)?.requeue();
            inner.wait.push_back(id);
        }

        let Some(id) = inner.wait.pop_front() else {
            return Ok(None);
        };
        let lock = self.lock_duration;
        let job = inner.job_mut(&id)?;
        job.start(now, lock);
        let job = job.clone();
        if let Some(lock_until) = job.lock_until {
            inner.active.push((id, lock_until));
        }
        Ok(Some(job))
    }

    async fn extend_lock(&self, id: &str, now: DateTime<Utc>) -> Result<JobRecord, QueueError> {
        let mut inner = self.inner.lock().await;
        inner.check_online()?;
        let lock = self.lock_duration;
        let job = inner.job_mut(id)?;
        let deadline = job.extend_lock(now, lock)?;
        let job = job.clone();
        for (member, lock_until) in inner.active.iter_mut() {
            if *member == id {
                *lock_until = deadline;
            }
        }
        Ok(job)
    }

    async fn recover_stalled(&self, now: DateTime<Utc>) -> Result<Vec<String>, QueueError> {
        let mut inner = self.inner.lock().await;
        inner.check_online()?;
        inner.recover_stalled(now)
    }

    async fn complete(&self, id: &str, now: DateTime<Utc>) -> Result<JobRecord, QueueError> {
        let mut inner = self.inner.lock().await;
        inner.check_online()?;
        let job = inner.job_mut(id)?;
        job.complete(now)?;
        let job = job.clone();

        let now_ms = now.timestamp_millis();
        inner.active.retain(|(member, _)| member != id);
        inner.completed.push((id.to_string(), now_ms));
        inner.prune_completed(&job.opts.remove_on_complete, now_ms);
        Ok(job)
    }

    async fn fail(
        &self,
        id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<FailOutcome, QueueError> {
        let mut inner = self.inner.lock().await;
        inner.check_online()?;
        let job = inner.job_mut(id)?;
        let outcome = job.register_failure(reason, now)?;
        let policy = job.opts.remove_on_fail;

        inner.settle_failure(id, &outcome, &policy, now.timestamp_millis());
        Ok(outcome)
    }

    async fn get(&self, id: &str) -> Result<Option<JobRecord>, QueueError> {
        let inner = self.inner.lock().await;
        inner.check_online()?;
        Ok(inner.jobs.get(id).cloned())
    }

    async fn failed(&self) -> Result<Vec<JobRecord>, QueueError> {
        let inner = self.inner.lock().await;
        inner.check_online()?;
        Ok(inner
            .failed
            .iter()
            .filter_map(|(id, _)| inner.jobs.get(id))
            .filter(|job| job.state == JobState::Failed)
            .cloned()
            .collect())
    }

    async fn remove(&self, id: &str) -> Result<(), QueueError> {
        let mut inner = self.inner.lock().await;
        inner.check_online()?;
        if inner.jobs.remove(id).is_none() {
            return Err(QueueError::JobNotFound(id.to_string()));
        }
        inner.wait.retain(|member| member != id);
        inner.active.retain(|(member, _)| member != id);
        inner.delayed.retain(|(member, _)| member != id);
        inner.completed.retain(|(member, _)| member != id);
        inner.failed.retain(|(member, _)| member != id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{Backoff, STALLED_REASON};
    use chrono::Duration as ChronoDuration;
    use serde_json::json;

    fn two_attempts() -> JobOptions {
        JobOptions {
            attempts: 2,
            backoff: Backoff::Fixed { delay: 500 },
            remove_on_complete: Retention::KeepAll,
            remove_on_fail: Retention::KeepAll,
        }
    }

    #[tokio::test]
    async fn test_abandoned_claim_is_retried_then_failed() {
        let queue = MemoryQueue::new("jd-scrapper").with_lock_duration(Duration::from_secs(5));
        let now = Utc::now();
        let job = queue
            .enqueue("jd-scrap", None, json!({}), two_attempts(), now)
            .await
            .unwrap();

        queue.claim_next(now).await.unwrap().unwrap();
        let before_expiry = now + ChronoDuration::seconds(4);
        assert!(queue.claim_next(before_expiry).await.unwrap().is_none());

        // The lock runs out at +5s; the stall is then backed off like a failure.
        let expired = now + ChronoDuration::seconds(5);
        assert!(queue.claim_next(expired).await.unwrap().is_none());
        let retry_at = expired + ChronoDuration::milliseconds(500);
        let again = queue.claim_next(retry_at).await.unwrap().unwrap();
        assert_eq!(again.id, job.id);
        assert_eq!(again.attempts_made, 1);
        assert_eq!(again.failed_reason.as_deref(), Some(STALLED_REASON));

        let recovered = queue
            .recover_stalled(retry_at + ChronoDuration::seconds(5))
            .await
            .unwrap();
        assert_eq!(recovered, vec![job.id.clone()]);
        let failed = queue.failed().await.unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].attempts_made, 2);
    }

    #[tokio::test]
    async fn test_extended_lock_survives_recovery() {
        let queue = MemoryQueue::new("jd-scrapper").with_lock_duration(Duration::from_secs(5));
        let now = Utc::now();
        let job = queue
            .enqueue("jd-scrap", None, json!({}), two_attempts(), now)
            .await
            .unwrap();

        queue.claim_next(now).await.unwrap();
        queue
            .extend_lock(&job.id, now + ChronoDuration::seconds(4))
            .await
            .unwrap();
        assert!(queue
            .recover_stalled(now + ChronoDuration::seconds(6))
            .await
            .unwrap()
            .is_empty());
        let done = queue
            .complete(&job.id, now + ChronoDuration::seconds(7))
            .await
            .unwrap();
        assert_eq!(done.state, JobState::Completed);
    }

    #[tokio::test]
    async fn test_completed_job_is_no_longer_watched() {
        let queue = MemoryQueue::new("jd-scrapper").with_lock_duration(Duration::from_secs(1));
        let now = Utc::now();
        let job = queue
            .enqueue("jd-scrap", None, json!({}), two_attempts(), now)
            .await
            .unwrap();
        queue.claim_next(now).await.unwrap();
        queue.complete(&job.id, now).await.unwrap();

        assert!(queue
            .recover_stalled(now + ChronoDuration::hours(1))
            .await
            .unwrap()
            .is_empty());
    }
}
