//! Axum route handlers for the scrape queue.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::extract::AppJson;
use crate::models::Envelope;
use crate::queue::{JobRecord, JobState, QueueError};
use crate::scrape::ScrapeJobRequest;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitScrapeRequest {
    pub job_id: String,
    #[serde(default)]
    pub context: Value,
    #[serde(default)]
    pub user_data: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitScrapeResponse {
    pub queue_job_id: String,
    pub job_id: String,
    pub requested_at: DateTime<Utc>,
}

/// POST /api/v1/jd-scrapper
pub async fn handle_submit(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppJson(request): AppJson<SubmitScrapeRequest>,
) -> Result<Json<Envelope<SubmitScrapeResponse>>, AppError> {
    if request.job_id.trim().is_empty() {
        return Err(AppError::Validation("jobId cannot be empty".to_string()));
    }

    tracing::debug!("User {user_id} requested scrape of {}", request.job_id);
    let record = state
        .scrape
        .submit(user_id, &request.job_id, request.context, request.user_data)
        .await?;
    let payload: ScrapeJobRequest =
        serde_json::from_value(record.data).map_err(QueueError::from)?;

    Ok(Json(Envelope::ok(
        "Job description queued for scraping",
        SubmitScrapeResponse {
            queue_job_id: record.id,
            job_id: payload.job_id,
            requested_at: payload.requested_at,
        },
    )))
}

/// GET /api/v1/jd-scrapper/jobs/:id
pub async fn handle_get_job(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Envelope<JobRecord>>, AppError> {
    let record = state
        .scrape
        .job_for(user_id, &id)
        .await?
        .ok_or(QueueError::JobNotFound(id))?;
    Ok(Json(Envelope::ok("Job fetched", record)))
}

/// GET /api/v1/jd-scrapper/failed
pub async fn handle_list_failed(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Envelope<Vec<JobRecord>>>, AppError> {
    let failed = state.scrape.failed_for(user_id).await?;
    Ok(Json(Envelope::ok(
        format!("{} failed job(s)", failed.len()),
        failed,
    )))
}

/// DELETE /api/v1/jd-scrapper/failed/:id
pub async fn handle_remove_failed(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Envelope<()>>, AppError> {
    let record = state
        .scrape
        .job_for(user_id, &id)
        .await?
        .ok_or_else(|| QueueError::JobNotFound(id.clone()))?;
    if record.state != JobState::Failed {
        return Err(AppError::Validation(format!(
            "Job {id} is {}, only failed jobs can be removed",
            record.state
        )));
    }

    state.scrape.queue().remove(&id).await?;
    Ok(Json(Envelope::ok(format!("Job {id} removed"), ())))
}
