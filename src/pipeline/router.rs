use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::domain::{CandidateId, CandidateStage, InterviewDetails, TemplateId, UserId, WorkflowId};
use super::engine::TestSendError;
use super::repository::{ActiveOfferLookup, EmailSender, PipelineRepository, StoreError};
use super::service::{
    NewCandidate, NewTemplate, NewWorkflow, PipelineService, PipelineServiceError,
};

/// Router builder exposing HTTP endpoints for candidate intake, stage
/// transitions, and workflow configuration.
pub fn pipeline_router<R, M, O>(service: Arc<PipelineService<R, M, O>>) -> Router
where
    R: PipelineRepository + 'static,
    M: EmailSender + 'static,
    O: ActiveOfferLookup + 'static,
{
    Router::new()
        .route("/api/v1/candidates", post(create_candidate::<R, M, O>))
        .route(
            "/api/v1/candidates/:candidate_id",
            get(candidate_view::<R, M, O>),
        )
        .route(
            "/api/v1/candidates/:candidate_id/stage",
            post(transition::<R, M, O>),
        )
        .route(
            "/api/v1/candidates/:candidate_id/cv",
            post(cv_upload::<R, M, O>),
        )
        .route(
            "/api/v1/candidates/:candidate_id/executions",
            get(executions::<R, M, O>),
        )
        .route("/api/v1/templates", post(create_template::<R, M, O>))
        .route("/api/v1/templates/:stage", get(stage_templates::<R, M, O>))
        .route("/api/v1/workflows", post(create_workflow::<R, M, O>))
        .route(
            "/api/v1/workflows/:workflow_id/test",
            post(test_send::<R, M, O>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserScope {
    user: String,
    #[serde(default)]
    selected: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TransitionRequest {
    user_id: UserId,
    to_stage: CandidateStage,
    #[serde(default)]
    interview: Option<InterviewDetails>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CvUploadRequest {
    user_id: UserId,
    #[serde(default)]
    match_score: Option<u8>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TestSendRequest {
    user_id: UserId,
    recipient: String,
}

fn error_response(error: PipelineServiceError) -> Response {
    let status = match &error {
        PipelineServiceError::CandidateNotFound => StatusCode::NOT_FOUND,
        PipelineServiceError::Transition(_) | PipelineServiceError::Workflow(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        PipelineServiceError::TestSend(
            TestSendError::WorkflowNotFound | TestSendError::TemplateNotFound,
        ) => StatusCode::NOT_FOUND,
        PipelineServiceError::TestSend(TestSendError::Delivery(_)) => StatusCode::BAD_GATEWAY,
        PipelineServiceError::Store(StoreError::Conflict) => StatusCode::CONFLICT,
        PipelineServiceError::TestSend(_) | PipelineServiceError::Store(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    let payload = json!({ "error": error.to_string() });
    (status, axum::Json(payload)).into_response()
}

pub(crate) async fn create_candidate<R, M, O>(
    State(service): State<Arc<PipelineService<R, M, O>>>,
    axum::Json(intake): axum::Json<NewCandidate>,
) -> Response
where
    R: PipelineRepository + 'static,
    M: EmailSender + 'static,
    O: ActiveOfferLookup + 'static,
{
    match service.create_candidate(intake) {
        Ok(candidate) => (StatusCode::CREATED, axum::Json(candidate)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn candidate_view<R, M, O>(
    State(service): State<Arc<PipelineService<R, M, O>>>,
    Path(candidate_id): Path<String>,
    Query(scope): Query<UserScope>,
) -> Response
where
    R: PipelineRepository + 'static,
    M: EmailSender + 'static,
    O: ActiveOfferLookup + 'static,
{
    match service.candidate(&CandidateId(candidate_id), &UserId(scope.user)) {
        Ok(candidate) => (StatusCode::OK, axum::Json(candidate)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn transition<R, M, O>(
    State(service): State<Arc<PipelineService<R, M, O>>>,
    Path(candidate_id): Path<String>,
    axum::Json(request): axum::Json<TransitionRequest>,
) -> Response
where
    R: PipelineRepository + 'static,
    M: EmailSender + 'static,
    O: ActiveOfferLookup + 'static,
{
    match service.transition(
        &CandidateId(candidate_id),
        request.to_stage,
        &request.user_id,
        request.interview,
        Utc::now(),
    ) {
        Ok(candidate) => (StatusCode::OK, axum::Json(candidate)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn cv_upload<R, M, O>(
    State(service): State<Arc<PipelineService<R, M, O>>>,
    Path(candidate_id): Path<String>,
    axum::Json(request): axum::Json<CvUploadRequest>,
) -> Response
where
    R: PipelineRepository + 'static,
    M: EmailSender + 'static,
    O: ActiveOfferLookup + 'static,
{
    match service.record_cv_upload(
        &CandidateId(candidate_id),
        &request.user_id,
        request.match_score,
        Utc::now(),
    ) {
        Ok(candidate) => (StatusCode::OK, axum::Json(candidate)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn executions<R, M, O>(
    State(service): State<Arc<PipelineService<R, M, O>>>,
    Path(candidate_id): Path<String>,
    Query(scope): Query<UserScope>,
) -> Response
where
    R: PipelineRepository + 'static,
    M: EmailSender + 'static,
    O: ActiveOfferLookup + 'static,
{
    match service.executions(&CandidateId(candidate_id), &UserId(scope.user)) {
        Ok(executions) => (StatusCode::OK, axum::Json(executions)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn create_template<R, M, O>(
    State(service): State<Arc<PipelineService<R, M, O>>>,
    axum::Json(template): axum::Json<NewTemplate>,
) -> Response
where
    R: PipelineRepository + 'static,
    M: EmailSender + 'static,
    O: ActiveOfferLookup + 'static,
{
    match service.create_template(template) {
        Ok(template) => (StatusCode::CREATED, axum::Json(template)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn stage_templates<R, M, O>(
    State(service): State<Arc<PipelineService<R, M, O>>>,
    Path(stage): Path<String>,
    Query(scope): Query<UserScope>,
) -> Response
where
    R: PipelineRepository + 'static,
    M: EmailSender + 'static,
    O: ActiveOfferLookup + 'static,
{
    let Some(stage) = CandidateStage::from_label(&stage) else {
        let payload = json!({ "error": format!("unknown stage '{stage}'") });
        return (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response();
    };

    let selected = scope.selected.map(TemplateId);
    match service.templates_for_stage(&UserId(scope.user), stage, selected.as_ref()) {
        Ok(selection) => (StatusCode::OK, axum::Json(selection)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn create_workflow<R, M, O>(
    State(service): State<Arc<PipelineService<R, M, O>>>,
    axum::Json(workflow): axum::Json<NewWorkflow>,
) -> Response
where
    R: PipelineRepository + 'static,
    M: EmailSender + 'static,
    O: ActiveOfferLookup + 'static,
{
    match service.create_workflow(workflow, Utc::now()) {
        Ok(workflow) => (StatusCode::CREATED, axum::Json(workflow)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn test_send<R, M, O>(
    State(service): State<Arc<PipelineService<R, M, O>>>,
    Path(workflow_id): Path<String>,
    axum::Json(request): axum::Json<TestSendRequest>,
) -> Response
where
    R: PipelineRepository + 'static,
    M: EmailSender + 'static,
    O: ActiveOfferLookup + 'static,
{
    match service.test_send(
        &WorkflowId(workflow_id),
        &request.user_id,
        &request.recipient,
        Utc::now(),
    ) {
        Ok(()) => (StatusCode::OK, axum::Json(json!({ "status": "sent" }))).into_response(),
        Err(error) => error_response(error),
    }
}
