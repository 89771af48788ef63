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

use crate::pipeline::domain::UserId;
use crate::pipeline::repository::{EmailSender, PipelineRepository};

use super::domain::{OfferId, OfferTerms};
use super::repository::{OfferRepository, TokenGenerator};
use super::service::{CounterProposal, NewOffer, OfferError, OfferService};

/// Router builder exposing the recruiter offer endpoints and the
/// token-gated candidate response endpoints.
pub fn offers_router<O, P, M, G>(service: Arc<OfferService<O, P, M, G>>) -> Router
where
    O: OfferRepository + 'static,
    P: PipelineRepository + 'static,
    M: EmailSender + 'static,
    G: TokenGenerator + 'static,
{
    Router::new()
        .route("/api/v1/offers", post(create_offer::<O, P, M, G>))
        .route("/api/v1/offers/:offer_id", get(offer_view::<O, P, M, G>))
        .route(
            "/api/v1/offers/:offer_id/send",
            post(send_offer::<O, P, M, G>),
        )
        .route(
            "/api/v1/offers/:offer_id/terms",
            post(update_terms::<O, P, M, G>),
        )
        .route(
            "/api/v1/offers/:offer_id/counter-response",
            post(counter_response::<O, P, M, G>),
        )
        .route(
            "/api/v1/offers/:offer_id/counter-accept",
            post(counter_accept::<O, P, M, G>),
        )
        .route(
            "/api/v1/offers/:offer_id/counter-decline",
            post(counter_decline::<O, P, M, G>),
        )
        .route(
            "/api/v1/offers/:offer_id/expire",
            post(expire_offer::<O, P, M, G>),
        )
        .route(
            "/api/v1/offers/respond/:token",
            get(view_by_token::<O, P, M, G>),
        )
        .route(
            "/api/v1/offers/respond/:token/accept",
            post(accept_by_token::<O, P, M, G>),
        )
        .route(
            "/api/v1/offers/respond/:token/decline",
            post(decline_by_token::<O, P, M, G>),
        )
        .route(
            "/api/v1/offers/respond/:token/counter",
            post(counter_by_token::<O, P, M, G>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserScope {
    user: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OwnedRequest {
    user_id: UserId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TermsRequest {
    user_id: UserId,
    terms: OfferTerms,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CounterResponseRequest {
    user_id: UserId,
    #[serde(default)]
    updated_terms: Option<OfferTerms>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CounterDeclineRequest {
    user_id: UserId,
    #[serde(default)]
    message: Option<String>,
}

fn error_response(error: OfferError) -> Response {
    let status = match &error {
        OfferError::NotFound | OfferError::CandidateMissing | OfferError::UnknownToken => {
            StatusCode::NOT_FOUND
        }
        OfferError::TokenExpired => StatusCode::GONE,
        OfferError::AlreadyResponded { .. } => StatusCode::CONFLICT,
        OfferError::Unlinked
        | OfferError::NoOfferWorkflow
        | OfferError::TemplateMissing
        | OfferError::InvalidState { .. }
        | OfferError::TermsLocked(_)
        | OfferError::NoCounterOffer => StatusCode::UNPROCESSABLE_ENTITY,
        OfferError::Delivery(_) => StatusCode::BAD_GATEWAY,
        OfferError::Store(_) | OfferError::Pipeline(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = json!({ "error": error.to_string() });
    (status, axum::Json(payload)).into_response()
}

pub(crate) async fn create_offer<O, P, M, G>(
    State(service): State<Arc<OfferService<O, P, M, G>>>,
    axum::Json(draft): axum::Json<NewOffer>,
) -> Response
where
    O: OfferRepository + 'static,
    P: PipelineRepository + 'static,
    M: EmailSender + 'static,
    G: TokenGenerator + 'static,
{
    match service.create_offer(draft, Utc::now()) {
        Ok(offer) => (StatusCode::CREATED, axum::Json(offer)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn offer_view<O, P, M, G>(
    State(service): State<Arc<OfferService<O, P, M, G>>>,
    Path(offer_id): Path<String>,
    Query(scope): Query<UserScope>,
) -> Response
where
    O: OfferRepository + 'static,
    P: PipelineRepository + 'static,
    M: EmailSender + 'static,
    G: TokenGenerator + 'static,
{
    match service.offer(&OfferId(offer_id), &UserId(scope.user)) {
        Ok(offer) => (StatusCode::OK, axum::Json(offer)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn send_offer<O, P, M, G>(
    State(service): State<Arc<OfferService<O, P, M, G>>>,
    Path(offer_id): Path<String>,
    axum::Json(request): axum::Json<OwnedRequest>,
) -> Response
where
    O: OfferRepository + 'static,
    P: PipelineRepository + 'static,
    M: EmailSender + 'static,
    G: TokenGenerator + 'static,
{
    match service.send_offer(&OfferId(offer_id), &request.user_id, Utc::now()) {
        Ok(offer) => (StatusCode::OK, axum::Json(offer)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn update_terms<O, P, M, G>(
    State(service): State<Arc<OfferService<O, P, M, G>>>,
    Path(offer_id): Path<String>,
    axum::Json(request): axum::Json<TermsRequest>,
) -> Response
where
    O: OfferRepository + 'static,
    P: PipelineRepository + 'static,
    M: EmailSender + 'static,
    G: TokenGenerator + 'static,
{
    match service.update_terms(&OfferId(offer_id), &request.user_id, request.terms) {
        Ok(offer) => (StatusCode::OK, axum::Json(offer)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn counter_response<O, P, M, G>(
    State(service): State<Arc<OfferService<O, P, M, G>>>,
    Path(offer_id): Path<String>,
    axum::Json(request): axum::Json<CounterResponseRequest>,
) -> Response
where
    O: OfferRepository + 'static,
    P: PipelineRepository + 'static,
    M: EmailSender + 'static,
    G: TokenGenerator + 'static,
{
    match service.respond_to_counter_offer(
        &OfferId(offer_id),
        &request.user_id,
        request.updated_terms,
        request.message,
        Utc::now(),
    ) {
        Ok(offer) => (StatusCode::OK, axum::Json(offer)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn counter_accept<O, P, M, G>(
    State(service): State<Arc<OfferService<O, P, M, G>>>,
    Path(offer_id): Path<String>,
    axum::Json(request): axum::Json<OwnedRequest>,
) -> Response
where
    O: OfferRepository + 'static,
    P: PipelineRepository + 'static,
    M: EmailSender + 'static,
    G: TokenGenerator + 'static,
{
    match service.accept_counter_offer(&OfferId(offer_id), &request.user_id, Utc::now()) {
        Ok(offer) => (StatusCode::OK, axum::Json(offer)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn counter_decline<O, P, M, G>(
    State(service): State<Arc<OfferService<O, P, M, G>>>,
    Path(offer_id): Path<String>,
    axum::Json(request): axum::Json<CounterDeclineRequest>,
) -> Response
where
    O: OfferRepository + 'static,
    P: PipelineRepository + 'static,
    M: EmailSender + 'static,
    G: TokenGenerator + 'static,
{
    match service.decline_counter_offer(
        &OfferId(offer_id),
        &request.user_id,
        request.message,
        Utc::now(),
    ) {
        Ok(offer) => (StatusCode::OK, axum::Json(offer)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn expire_offer<O, P, M, G>(
    State(service): State<Arc<OfferService<O, P, M, G>>>,
    Path(offer_id): Path<String>,
    axum::Json(request): axum::Json<OwnedRequest>,
) -> Response
where
    O: OfferRepository + 'static,
    P: PipelineRepository + 'static,
    M: EmailSender + 'static,
    G: TokenGenerator + 'static,
{
    match service.expire_offer(&OfferId(offer_id), &request.user_id, Utc::now()) {
        Ok(offer) => (StatusCode::OK, axum::Json(offer)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn view_by_token<O, P, M, G>(
    State(service): State<Arc<OfferService<O, P, M, G>>>,
    Path(token): Path<String>,
) -> Response
where
    O: OfferRepository + 'static,
    P: PipelineRepository + 'static,
    M: EmailSender + 'static,
    G: TokenGenerator + 'static,
{
    match service.view_by_token(&token, Utc::now()) {
        Ok(offer) => (StatusCode::OK, axum::Json(offer)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn accept_by_token<O, P, M, G>(
    State(service): State<Arc<OfferService<O, P, M, G>>>,
    Path(token): Path<String>,
) -> Response
where
    O: OfferRepository + 'static,
    P: PipelineRepository + 'static,
    M: EmailSender + 'static,
    G: TokenGenerator + 'static,
{
    match service.accept_by_token(&token, Utc::now()) {
        Ok(offer) => (StatusCode::OK, axum::Json(offer)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn decline_by_token<O, P, M, G>(
    State(service): State<Arc<OfferService<O, P, M, G>>>,
    Path(token): Path<String>,
) -> Response
where
    O: OfferRepository + 'static,
    P: PipelineRepository + 'static,
    M: EmailSender + 'static,
    G: TokenGenerator + 'static,
{
    match service.decline_by_token(&token, Utc::now()) {
        Ok(offer) => (StatusCode::OK, axum::Json(offer)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn counter_by_token<O, P, M, G>(
    State(service): State<Arc<OfferService<O, P, M, G>>>,
    Path(token): Path<String>,
    axum::Json(proposal): axum::Json<CounterProposal>,
) -> Response
where
    O: OfferRepository + 'static,
    P: PipelineRepository + 'static,
    M: EmailSender + 'static,
    G: TokenGenerator + 'static,
{
    match service.counter_offer_by_token(&token, proposal, Utc::now()) {
        Ok(offer) => (StatusCode::OK, axum::Json(offer)).into_response(),
        Err(error) => error_response(error),
    }
}
