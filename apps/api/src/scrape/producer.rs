use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};
use uuid::Uuid;

use crate::queue::{Backoff, JobOptions, JobRecord, QueueBackend, QueueError, Retention};

/// Logical queue the scraper workers listen on.
pub const QUEUE_NAME: &str = "jd-scrapper";
/// Task name for scrape jobs within the queue.
pub const TASK_NAME: &str = "jd-scrap";

/// Payload handed to the scraper worker. Immutable once enqueued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeJobRequest {
    pub job_id: String,
    pub context: Value,
    pub user_data: Value,
    pub requested_at: DateTime<Utc>,
}

/// Three attempts with exponential backoff from one second. Completed jobs
/// are kept for an hour or until a hundred newer ones finish; failed jobs
/// are kept until someone removes them.
pub fn scrape_job_options() -> JobOptions {
    JobOptions {
        attempts: 3,
        backoff: Backoff::Exponential { delay: 1000 },
        remove_on_complete: Retention::Bounded {
            age: Some(3600),
            count: Some(100),
        },
        remove_on_fail: Retention::KeepAll,
    }
}

#[derive(Clone)]
pub struct ScrapeProducer {
    queue: Arc<dyn QueueBackend>,
}

impl ScrapeProducer {
    pub fn new(queue: Arc<dyn QueueBackend>) -> Self {
        Self { queue }
    }

    pub fn queue(&self) -> &dyn QueueBackend {
        self.queue.as_ref()
    }

    /// Enqueues one scrape job on behalf of `owner`. Delivery is
    /// at-least-once: the worker may see the same request more than once.
    pub async fn submit(
        &self,
        owner: Uuid,
        job_id: &str,
        context: Value,
        user_data: Value,
    ) -> Result<JobRecord, QueueError> {
        let now = Utc::now();
        let request = ScrapeJobRequest {
            job_id: job_id.to_string(),
            context,
            user_data,
            requested_at: now,
        };
        let data = serde_json::to_value(&request)?;
        let owner = owner.to_string();

        let record = self
            .queue
            .enqueue(TASK_NAME, Some(&owner), data, scrape_job_options(), now)
            .await
            .inspect_err(|e| {
                error!(
                    "Failed to enqueue {TASK_NAME} for {job_id} on {}: {e}",
                    self.queue.queue_name()
                )
            })?;

        info!(
            "Queued {TASK_NAME} job {} for {job_id} on {}",
            record.id,
            self.queue.queue_name()
        );
        Ok(record)
    }

    /// A job as seen by `owner`. Other users' jobs do not exist for them.
    pub async fn job_for(&self, owner: Uuid, id: &str) -> Result<Option<JobRecord>, QueueError> {
        let owner = owner.to_string();
        Ok(self
            .queue
            .get(id)
            .await?
            .filter(|job| job.is_owned_by(&owner)))
    }

    /// Retained failures submitted by `owner`, oldest first.
    pub async fn failed_for(&self, owner: Uuid) -> Result<Vec<JobRecord>, QueueError> {
        let owner = owner.to_string();
        let mut failed = self.queue.failed().await?;
        failed.retain(|job| job.is_owned_by(&owner));
        Ok(failed)
    }
}
