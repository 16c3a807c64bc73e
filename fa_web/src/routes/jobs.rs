//! ABOUTME: Job lifecycle endpoints: create, list, poll, cancel
//! ABOUTME: Wire contract for the polling frontend with filtered log output

use std::str::FromStr;

use actix_web::{get, post, web, HttpResponse};
use fa_core::Id;
use fa_jobs::{CancelSignal, CancelState, Job, JobTarget};
use tracing::{info, warn};
use validator::Validate;

use crate::error::{ApiError, ApiResult};
use crate::models::{
    CancelEnvelope, CreateJobRequest, JobEnvelope, JobListEnvelope, JobView, ProblemDetails,
};
use crate::AppState;

fn parse_job_id(raw: &str) -> ApiResult<Id> {
    Id::from_str(raw).map_err(|_| ApiError::not_found("Job not found."))
}

fn job_or_not_found(state: &AppState, id: &Id) -> ApiResult<Job> {
    state
        .store
        .get(id)
        .ok_or_else(|| ApiError::not_found("Job not found."))
}

/// Create a download job
#[utoipa::path(
    post,
    path = "/api/jobs",
    tag = "jobs",
    request_body = CreateJobRequest,
    responses(
        (status = 202, description = "Job accepted and queued", body = JobEnvelope),
        (status = 400, description = "Invalid request", body = ProblemDetails),
        (status = 503, description = "Radarr is not configured", body = ProblemDetails),
    )
)]
#[post("/jobs")]
pub async fn create_job(
    state: web::Data<AppState>,
    body: web::Json<CreateJobRequest>,
) -> ApiResult<HttpResponse> {
    let body = body.into_inner();
    body.validate()?;
    let request = body.into_request()?;

    if matches!(request.target, JobTarget::Movie { .. }) && !state.radarr_configured {
        return Err(ApiError::service_unavailable(
            "Application has not been configured yet.",
        ));
    }

    let job = state.store.create(request);
    state.dispatcher.spawn(state.pipeline.clone(), job.id);
    info!(job_id = %job.id, label = %job.label, "Job created");

    Ok(HttpResponse::Accepted().json(JobEnvelope {
        job: JobView::from_job(&job, state.debug_mode),
        debug_mode: state.debug_mode,
    }))
}

/// List retained jobs, newest first
#[utoipa::path(
    get,
    path = "/api/jobs",
    tag = "jobs",
    responses(
        (status = 200, description = "Job list", body = JobListEnvelope),
    )
)]
#[get("/jobs")]
pub async fn list_jobs(state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let jobs: Vec<JobView> = state
        .store
        .list()
        .iter()
        .map(|job| JobView::from_job(job, state.debug_mode))
        .collect();
    Ok(HttpResponse::Ok().json(JobListEnvelope {
        jobs,
        debug_mode: state.debug_mode,
    }))
}

/// Poll one job, including its filtered log snapshot
#[utoipa::path(
    get,
    path = "/api/jobs/{id}",
    tag = "jobs",
    params(("id" = String, Path, description = "Job identifier")),
    responses(
        (status = 200, description = "Job snapshot", body = JobEnvelope),
        (status = 404, description = "Unknown job", body = ProblemDetails),
    )
)]
#[get("/jobs/{id}")]
pub async fn get_job(state: web::Data<AppState>, path: web::Path<String>) -> ApiResult<HttpResponse> {
    let id = parse_job_id(&path)?;
    let job = job_or_not_found(&state, &id)?;
    Ok(HttpResponse::Ok().json(JobEnvelope {
        job: JobView::from_job(&job, state.debug_mode),
        debug_mode: state.debug_mode,
    }))
}

/// Request cooperative cancellation of an active job
#[utoipa::path(
    post,
    path = "/api/jobs/{id}/cancel",
    tag = "jobs",
    params(("id" = String, Path, description = "Job identifier")),
    responses(
        (status = 202, description = "Cancellation requested", body = CancelEnvelope),
        (status = 404, description = "Unknown job", body = ProblemDetails),
        (status = 409, description = "Job cannot be cancelled", body = CancelEnvelope),
    )
)]
#[post("/jobs/{id}/cancel")]
pub async fn cancel_job(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = parse_job_id(&path)?;
    let job = job_or_not_found(&state, &id)?;

    match state.store.cancel_state(&id) {
        CancelState::NotFound => Err(ApiError::not_found("Job not found.")),
        CancelState::AlreadyTerminal => Ok(HttpResponse::Conflict().json(CancelEnvelope {
            job: JobView::from_job(&job, state.debug_mode),
            message: "Job is not active and cannot be cancelled.".to_string(),
        })),
        CancelState::Active => match state.dispatcher.cancel(&id) {
            CancelSignal::NotTracked => {
                warn!(job_id = %id, "Active job has no tracked worker");
                Ok(HttpResponse::Conflict().json(CancelEnvelope {
                    job: JobView::from_job(&job, state.debug_mode),
                    message: "Job worker is no longer active.".to_string(),
                }))
            }
            CancelSignal::AlreadyRequested => Ok(HttpResponse::Accepted().json(CancelEnvelope {
                job: JobView::from_job(&job, state.debug_mode),
                message: "Cancellation already requested.".to_string(),
            })),
            CancelSignal::Requested => {
                state.store.note_cancel_requested(&id);
                let job = job_or_not_found(&state, &id)?;
                Ok(HttpResponse::Accepted().json(CancelEnvelope {
                    job: JobView::from_job(&job, state.debug_mode),
                    message: "Cancellation requested.".to_string(),
                }))
            }
        },
    }
}
