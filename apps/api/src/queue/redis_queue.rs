use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Script};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::job::{FailOutcome, JobRecord};
use super::options::{JobOptions, Retention};
use super::{is_job_id, retention, DEFAULT_LOCK_DURATION};
use super::{QueueBackend, QueueError};

/// Pops the oldest waiting id and locks it in one step, so a crash between
/// the two can never leave a job in neither place.
const CLAIM_SCRIPT: &str = r"
local id = redis.call('RPOP', KEYS[1])
if id then
  redis.call('ZADD', KEYS[2], ARGV[1], id)
end
return id
";

/// Removes an active id only if its lock is still expired at `ARGV[2]`.
const RELEASE_STALLED_SCRIPT: &str = r"
local lock = redis.call('ZSCORE', KEYS[1], ARGV[1])
if lock and tonumber(lock) <= tonumber(ARGV[2]) then
  return redis.call('ZREM', KEYS[1], ARGV[1])
end
return 0
";

/// Redis layout, all under `<prefix>:<queue>:`
///
/// - `id`        counter for job ids
/// - `<id>`      job record as JSON (ids are always decimal)
/// - `wait`      list, LPUSH in / RPOP out
/// - `active`    zset of claimed ids scored by lock deadline millis
/// - `delayed`   zset scored by run-at millis
/// - `completed` zset scored by finished-on millis
/// - `failed`    zset scored by finished-on millis
#[derive(Clone)]
pub struct RedisQueue {
    conn: MultiplexedConnection,
    prefix: String,
    name: String,
    lock_duration: Duration,
    claim: Script,
    release_stalled: Script,
}

impl RedisQueue {
    pub fn new(conn: MultiplexedConnection, prefix: &str, name: &str) -> Self {
        Self {
            conn,
            prefix: prefix.to_string(),
            name: name.to_string(),
            lock_duration: DEFAULT_LOCK_DURATION,
            claim: Script::new(CLAIM_SCRIPT),
            release_stalled: Script::new(RELEASE_STALLED_SCRIPT),
        }
    }

    pub fn with_lock_duration(mut self, lock_duration: Duration) -> Self {
        self.lock_duration = lock_duration;
        self
    }

    fn key(&self, suffix: &str) -> String {
        format!("{}:{}:{}", self.prefix, self.name, suffix)
    }

    /// Key of a job record. Non-numeric ids would alias the queue's own
    /// keys (`wait`, `id`, ...) and are reported as missing instead.
    fn job_key(&self, id: &str) -> Result<String, QueueError> {
        if is_job_id(id) {
            Ok(self.key(id))
        } else {
            Err(QueueError::JobNotFound(id.to_string()))
        }
    }

    async fn load(&self, id: &str) -> Result<JobRecord, QueueError> {
        let key = self.job_key(id)?;
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(key).await?;
        let raw = raw.ok_or_else(|| QueueError::JobNotFound(id.to_string()))?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Applies a retention policy to one of the finished sets.
    async fn prune(&self, set: &str, policy: &Retention, now_ms: i64) -> Result<(), QueueError> {
        if *policy == Retention::KeepAll {
            return Ok(());
        }

        let mut conn = self.conn.clone();
        let set_key = self.key(set);
        let members: Vec<(String, f64)> = conn.zrange_withscores(&set_key, 0, -1).await?;
        let finished: Vec<(String, i64)> = members
            .into_iter()
            .map(|(id, score)| (id, score as i64))
            .collect();

        let victims = retention::expired(policy, &finished, now_ms);
        if victims.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for id in &victims {
            pipe.zrem(&set_key, id).ignore();
            pipe.del(self.job_key(id)?).ignore();
        }
        pipe.query_async::<_, ()>(&mut conn).await?;

        debug!("Pruned {} job(s) from {set_key}", victims.len());
        Ok(())
    }

    /// Persists a failed attempt: off the active set, then into `delayed`
    /// for a retry or into `failed` once attempts are used up.
    async fn settle_failure(
        &self,
        job: &JobRecord,
        outcome: &FailOutcome,
        now: DateTime<Utc>,
    ) -> Result<(), QueueError> {
        let id = job.id.as_str();
        let now_ms = now.timestamp_millis();
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.atomic()
            .zrem(self.key("active"), id)
            .ignore()
            .set(self.job_key(id)?, serde_json::to_string(job)?)
            .ignore();

        match outcome {
            FailOutcome::Retry { run_at, .. } => pipe.zadd(self.key("delayed"), id, *run_at).ignore(),
            FailOutcome::Exhausted => pipe.zadd(self.key("failed"), id, now_ms).ignore(),
        };
        pipe.query_async::<_, ()>(&mut conn).await?;

        if *outcome == FailOutcome::Exhausted {
            self.prune("failed", &job.opts.remove_on_fail, now_ms).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl QueueBackend for RedisQueue {
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
        let mut conn = self.conn.clone();
        let id: u64 = conn.incr(self.key("id"), 1u64).await?;
        let job = JobRecord::new(id.to_string(), name, data, opts, now).owned_by(owner);
        let json = serde_json::to_string(&job)?;

        redis::pipe()
            .atomic()
            .set(self.job_key(&job.id)?, json)
            .ignore()
            .lpush(self.key("wait"), &job.id)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;

        info!("Enqueued job {} ({name}) on queue {}", job.id, self.name);
        Ok(job)
    }

    async fn claim_next(&self, now: DateTime<Utc>) -> Result<Option<JobRecord>, QueueError> {
        self.recover_stalled(now).await?;

        let mut conn = self.conn.clone();
        let now_ms = now.timestamp_millis();
        let delayed_key = self.key("delayed");

        let due: Vec<String> = conn.zrangebyscore(&delayed_key, "-inf", now_ms).await?;
        for id in due {
            // Only the caller whose ZREM succeeds moves the job.
            let removed: u32 = conn.zrem(&delayed_key, &id).await?;
            if removed == 0 {
                continue;
            }
            let mut job = self.load(&id).await?;
            job.requeue();
            redis::pipe()
                .atomic()
                .set(self.job_key(&id)?, serde_json::to_string(&job)?)
                .ignore()
                .lpush(self.key("wait"), &id)
                .ignore()
                .query_async::<_, ()>(&mut conn)
                .await?;
        }

        let deadline = now_ms.saturating_add(self.lock_duration.as_millis() as i64);
        let next: Option<String> = self
            .claim
            .key(self.key("wait"))
            .key(self.key("active"))
            .arg(deadline)
            .invoke_async(&mut conn)
            .await?;
        let Some(id) = next else {
            return Ok(None);
        };

        let mut job = self.load(&id).await?;
        job.start(now, self.lock_duration);
        conn.set::<_, _, ()>(self.job_key(&id)?, serde_json::to_string(&job)?)
            .await?;
        Ok(Some(job))
    }

    async fn extend_lock(&self, id: &str, now: DateTime<Utc>) -> Result<JobRecord, QueueError> {
        let mut job = self.load(id).await?;
        let deadline = job.extend_lock(now, self.lock_duration)?;

        let mut conn = self.conn.clone();
        redis::pipe()
            .atomic()
            .set(self.job_key(id)?, serde_json::to_string(&job)?)
            .ignore()
            .zadd(self.key("active"), id, deadline)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(job)
    }

    async fn recover_stalled(&self, now: DateTime<Utc>) -> Result<Vec<String>, QueueError> {
        let mut conn = self.conn.clone();
        let active_key = self.key("active");
        let now_ms = now.timestamp_millis();

        let expired: Vec<String> = conn.zrangebyscore(&active_key, "-inf", now_ms).await?;
        let mut recovered = Vec::new();
        for id in expired {
            // A lock renewed since the scan keeps its job.
            let released: u32 = self
                .release_stalled
                .key(&active_key)
                .arg(&id)
                .arg(now_ms)
                .invoke_async(&mut conn)
                .await?;
            if released == 0 {
                continue;
            }

            let mut job = match self.load(&id).await {
                Ok(job) => job,
                Err(QueueError::JobNotFound(_)) => continue,
                Err(e) => return Err(e),
            };
            match job.register_stall(now) {
                Ok(None) => {
                    conn.rpush::<_, _, ()>(self.key("wait"), &id).await?;
                    debug!("Job {id} was never started, back in line");
                }
                Ok(Some(outcome)) => {
                    self.settle_failure(&job, &outcome, now).await?;
                    warn!(
                        "Job {id} stalled on queue {} (attempt {}/{})",
                        self.name, job.attempts_made, job.opts.attempts
                    );
                }
                Err(QueueError::InvalidState { state, .. }) => {
                    warn!("Dropped stale active entry for job {id} ({state})");
                    continue;
                }
                Err(e) => return Err(e),
            }
            recovered.push(id);
        }
        Ok(recovered)
    }

    async fn complete(&self, id: &str, now: DateTime<Utc>) -> Result<JobRecord, QueueError> {
        let mut job = self.load(id).await?;
        job.complete(now)?;
        let finished_on = now.timestamp_millis();

        let mut conn = self.conn.clone();
        redis::pipe()
            .atomic()
            .zrem(self.key("active"), id)
            .ignore()
            .set(self.job_key(id)?, serde_json::to_string(&job)?)
            .ignore()
            .zadd(self.key("completed"), id, finished_on)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;

        info!("Job {id} completed on queue {}", self.name);
        self.prune("completed", &job.opts.remove_on_complete, finished_on)
            .await?;
        Ok(job)
    }

    async fn fail(
        &self,
        id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<FailOutcome, QueueError> {
        let mut job = self.load(id).await?;
        let outcome = job.register_failure(reason, now)?;
        self.settle_failure(&job, &outcome, now).await?;

        match &outcome {
            FailOutcome::Retry { delay, .. } => warn!(
                "Job {id} failed attempt {}/{} ({reason}), retrying in {}ms",
                job.attempts_made,
                job.opts.attempts,
                delay.as_millis()
            ),
            FailOutcome::Exhausted => warn!(
                "Job {id} failed permanently after {} attempt(s): {reason}",
                job.attempts_made
            ),
        }
        Ok(outcome)
    }

    async fn get(&self, id: &str) -> Result<Option<JobRecord>, QueueError> {
        match self.load(id).await {
            Ok(job) => Ok(Some(job)),
            Err(QueueError::JobNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn failed(&self) -> Result<Vec<JobRecord>, QueueError> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = conn.zrange(self.key("failed"), 0, -1).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys = ids
            .iter()
            .map(|id| self.job_key(id))
            .collect::<Result<Vec<_>, _>>()?;
        let raw: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await?;

        raw.into_iter()
            .flatten()
            .map(|json| serde_json::from_str(&json).map_err(QueueError::from))
            .collect()
    }

    async fn remove(&self, id: &str) -> Result<(), QueueError> {
        let job_key = self.job_key(id)?;
        let mut conn = self.conn.clone();
        let (deleted,): (u32,) = redis::pipe()
            .atomic()
            .del(job_key)
            .zrem(self.key("failed"), id)
            .ignore()
            .zrem(self.key("completed"), id)
            .ignore()
            .zrem(self.key("delayed"), id)
            .ignore()
            .zrem(self.key("active"), id)
            .ignore()
            .lrem(self.key("wait"), 0, id)
            .ignore()
            .query_async(&mut conn)
            .await?;

        if deleted == 0 {
            return Err(QueueError::JobNotFound(id.to_string()));
        }
        info!("Removed job {id} from queue {}", self.name);
        Ok(())
    }
}

/// These run against a real Redis and are skipped when `REDIS_URL` is not
/// set. Each test works in its own uniquely named queue and deletes its keys
/// afterwards.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheClient;
    use crate::queue::{Backoff, JobState, STALLED_REASON};
    use chrono::Duration as ChronoDuration;
    use serde_json::json;
    use uuid::Uuid;

    const PREFIX: &str = "resumex-test";

    async fn test_queue() -> Option<RedisQueue> {
        let Ok(url) = std::env::var("REDIS_URL") else {
            eprintln!("REDIS_URL not set, skipping");
            return None;
        };
        let cache = CacheClient::connect(&url).await.expect("redis reachable");
        let name = format!("q-{}", Uuid::new_v4());
        Some(RedisQueue::new(cache.handle(), PREFIX, &name))
    }

    async fn purge(queue: &RedisQueue) {
        let mut conn = queue.conn.clone();
        let keys: Vec<String> = conn.keys(queue.key("*")).await.unwrap();
        if !keys.is_empty() {
            conn.del::<_, ()>(keys).await.unwrap();
        }
    }

    fn options(attempts: u32, remove_on_complete: Retention) -> JobOptions {
        JobOptions {
            attempts,
            backoff: Backoff::Exponential { delay: 1000 },
            remove_on_complete,
            remove_on_fail: Retention::KeepAll,
        }
    }

    #[tokio::test]
    async fn test_enqueue_claim_complete_and_prune_by_count() {
        let Some(queue) = test_queue().await else { return };
        let keep_two = Retention::Bounded { age: None, count: Some(2) };
        let now = Utc::now();

        let mut ids = Vec::new();
        for i in 0..3 {
            let job = queue
                .enqueue("jd-scrap", Some("alice"), json!({"n": i}), options(3, keep_two), now)
                .await
                .unwrap();
            ids.push(job.id);
        }

        for (i, id) in ids.iter().enumerate() {
            let claimed = queue.claim_next(now).await.unwrap().unwrap();
            assert_eq!(&claimed.id, id, "claims follow enqueue order");
            assert_eq!(claimed.state, JobState::Active);
            let done = queue
                .complete(id, now + ChronoDuration::milliseconds(i as i64))
                .await
                .unwrap();
            assert_eq!(done.state, JobState::Completed);
        }

        assert!(queue.get(&ids[0]).await.unwrap().is_none());
        let kept = queue.get(&ids[2]).await.unwrap().unwrap();
        assert!(kept.is_owned_by("alice"));
        assert!(queue.claim_next(now).await.unwrap().is_none());
        purge(&queue).await;
    }

    #[tokio::test]
    async fn test_backoff_exhaustion_listing_and_removal() {
        let Some(queue) = test_queue().await else { return };
        let now = Utc::now();
        let job = queue
            .enqueue("jd-scrap", None, json!({}), options(2, Retention::KeepAll), now)
            .await
            .unwrap();

        queue.claim_next(now).await.unwrap().unwrap();
        let first = queue.fail(&job.id, "503", now).await.unwrap();
        assert!(matches!(first, FailOutcome::Retry { run_at, .. } if run_at == now.timestamp_millis() + 1000));

        assert!(queue
            .claim_next(now + ChronoDuration::milliseconds(999))
            .await
            .unwrap()
            .is_none());
        let due = now + ChronoDuration::seconds(1);
        assert_eq!(queue.claim_next(due).await.unwrap().unwrap().id, job.id);
        assert_eq!(queue.fail(&job.id, "captcha", due).await.unwrap(), FailOutcome::Exhausted);

        let failed = queue.failed().await.unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].failed_reason.as_deref(), Some("captcha"));

        queue.remove(&job.id).await.unwrap();
        assert!(queue.failed().await.unwrap().is_empty());
        assert!(matches!(
            queue.remove(&job.id).await,
            Err(QueueError::JobNotFound(_))
        ));
        purge(&queue).await;
    }

    #[tokio::test]
    async fn test_crashed_worker_job_is_delivered_again() {
        let Some(queue) = test_queue().await else { return };
        let queue = queue.with_lock_duration(Duration::from_secs(5));
        let now = Utc::now();
        let job = queue
            .enqueue("jd-scrap", None, json!({}), options(2, Retention::KeepAll), now)
            .await
            .unwrap();

        // The worker claims and then disappears without completing.
        queue.claim_next(now).await.unwrap().unwrap();
        assert!(queue
            .recover_stalled(now + ChronoDuration::seconds(4))
            .await
            .unwrap()
            .is_empty());

        let expired = now + ChronoDuration::seconds(6);
        assert_eq!(queue.recover_stalled(expired).await.unwrap(), vec![job.id.clone()]);
        let stalled = queue.get(&job.id).await.unwrap().unwrap();
        assert_eq!(stalled.state, JobState::Delayed);
        assert_eq!(stalled.failed_reason.as_deref(), Some(STALLED_REASON));

        let retry_at = expired + ChronoDuration::seconds(1);
        let again = queue.claim_next(retry_at).await.unwrap().unwrap();
        assert_eq!(again.id, job.id);
        assert_eq!(again.attempts_made, 1);

        // Second stall spends the last attempt.
        queue
            .recover_stalled(retry_at + ChronoDuration::seconds(6))
            .await
            .unwrap();
        let failed = queue.failed().await.unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].state, JobState::Failed);
        purge(&queue).await;
    }

    #[tokio::test]
    async fn test_renewed_lock_is_not_stalled() {
        let Some(queue) = test_queue().await else { return };
        let queue = queue.with_lock_duration(Duration::from_secs(5));
        let now = Utc::now();
        let job = queue
            .enqueue("jd-scrap", None, json!({}), options(3, Retention::KeepAll), now)
            .await
            .unwrap();

        queue.claim_next(now).await.unwrap().unwrap();
        queue
            .extend_lock(&job.id, now + ChronoDuration::seconds(4))
            .await
            .unwrap();
        assert!(queue
            .recover_stalled(now + ChronoDuration::seconds(6))
            .await
            .unwrap()
            .is_empty());
        queue
            .complete(&job.id, now + ChronoDuration::seconds(7))
            .await
            .unwrap();
        purge(&queue).await;
    }

    #[tokio::test]
    async fn test_queue_keys_are_not_job_ids() {
        let Some(queue) = test_queue().await else { return };
        queue
            .enqueue("jd-scrap", None, json!({}), options(1, Retention::KeepAll), Utc::now())
            .await
            .unwrap();

        for key in ["wait", "id", "active"] {
            assert!(queue.get(key).await.unwrap().is_none());
            assert!(matches!(queue.remove(key).await, Err(QueueError::JobNotFound(_))));
        }
        purge(&queue).await;
    }
}
