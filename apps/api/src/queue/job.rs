use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::options::JobOptions;
use super::QueueError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Waiting,
    Delayed,
    Active,
    Completed,
    Failed,
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobState::Waiting => "waiting",
            JobState::Delayed => "delayed",
            JobState::Active => "active",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Failure reason recorded when a worker stopped renewing its lock.
pub const STALLED_REASON: &str = "job stalled more than allowable limit";

/// What happened to a job after a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailOutcome {
    /// Another attempt is scheduled at `run_at` (epoch millis).
    Retry { delay: Duration, run_at: i64 },
    /// Attempts are used up; the job sits in the failed set.
    Exhausted,
}

/// A job as stored by the queue. Timestamps are epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: String,
    pub name: String,
    pub data: Value,
    pub opts: JobOptions,
    pub attempts_made: u32,
    pub state: JobState,
    pub timestamp: i64,
    pub processed_on: Option<i64>,
    pub finished_on: Option<i64>,
    pub delay_until: Option<i64>,
    pub failed_reason: Option<String>,
    /// Submitting user, when the producer tracks one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// While active, the worker must finish or renew before this instant.
    #[serde(default)]
    pub lock_until: Option<i64>,
}

impl JobRecord {
    pub fn new(id: String, name: &str, data: Value, opts: JobOptions, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: name.to_string(),
            data,
            opts,
            attempts_made: 0,
            state: JobState::Waiting,
            timestamp: now.timestamp_millis(),
            processed_on: None,
            finished_on: None,
            delay_until: None,
            failed_reason: None,
            owner: None,
            lock_until: None,
        }
    }

    pub fn owned_by(mut self, owner: Option<&str>) -> Self {
        self.owner = owner.map(str::to_string);
        self
    }

    pub fn is_owned_by(&self, owner: &str) -> bool {
        self.owner.as_deref() == Some(owner)
    }

    /// Waiting or due-delayed job handed to a worker, locked for `lock`.
    pub fn start(&mut self, now: DateTime<Utc>, lock: Duration) {
        self.state = JobState::Active;
        self.processed_on = Some(now.timestamp_millis());
        self.delay_until = None;
        self.lock_until = Some(after(now, lock));
    }

    /// Pushes the lock deadline of a job still being worked on.
    pub fn extend_lock(&mut self, now: DateTime<Utc>, lock: Duration) -> Result<i64, QueueError> {
        self.ensure_active()?;
        let deadline = after(now, lock);
        self.lock_until = Some(deadline);
        Ok(deadline)
    }

    /// Delayed job whose backoff elapsed, back in line.
    pub fn requeue(&mut self) {
        self.state = JobState::Waiting;
        self.delay_until = None;
    }

    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), QueueError> {
        self.ensure_active()?;
        self.attempts_made += 1;
        self.lock_until = None;
        self.state = JobState::Completed;
        self.finished_on = Some(now.timestamp_millis());
        Ok(())
    }

    pub fn register_failure(
        &mut self,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<FailOutcome, QueueError> {
        self.ensure_active()?;
        self.attempts_made += 1;
        self.lock_until = None;
        self.failed_reason = Some(reason.to_string());

        if self.attempts_made < self.opts.attempts {
            let delay = self.opts.backoff.delay_after(self.attempts_made);
            let run_at = after(now, delay);
            self.state = JobState::Delayed;
            self.delay_until = Some(run_at);
            Ok(FailOutcome::Retry { delay, run_at })
        } else {
            self.state = JobState::Failed;
            self.finished_on = Some(now.timestamp_millis());
            Ok(FailOutcome::Exhausted)
        }
    }

    /// Job found on the active set after its lock expired.
    ///
    /// A job that never got past the claim (still `waiting`) goes back in
    /// line untouched and `None` is returned. A started job loses the
    /// attempt, exactly as if its worker had reported a failure.
    pub fn register_stall(&mut self, now: DateTime<Utc>) -> Result<Option<FailOutcome>, QueueError> {
        if self.state == JobState::Waiting {
            return Ok(None);
        }
        self.register_failure(STALLED_REASON, now).map(Some)
    }

    fn ensure_active(&self) -> Result<(), QueueError> {
        if self.state == JobState::Active {
            Ok(())
        } else {
            Err(QueueError::InvalidState {
                id: self.id.clone(),
                state: self.state,
            })
        }
    }
}

fn after(now: DateTime<Utc>, span: Duration) -> i64 {
    now.timestamp_millis()
        .saturating_add(i64::try_from(span.as_millis()).unwrap_or(i64::MAX))
}
