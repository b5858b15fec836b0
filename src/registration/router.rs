use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use super::domain::{RegistrationId, RegistrationSubmission};
use super::grants::{GrantError, GrantId, GrantPurpose};
use super::repository::{
    DirectoryError, NotificationDispatcher, RegistrationRepository, RepositoryError,
};
use super::service::{GrantRequest, RegistrationService, RegistrationServiceError};

/// Router builder exposing HTTP endpoints for registration intake, status,
/// and grant management.
pub fn registration_router<R, N>(service: Arc<RegistrationService<R, N>>) -> Router
where
    R: RegistrationRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    Router::new()
        .route(
            "/api/v1/registrations",
            post(submit_handler::<R, N>).get(review_queue_handler::<R, N>),
        )
        .route(
            "/api/v1/registrations/:registration_id",
            get(status_handler::<R, N>),
        )
        .route(
            "/api/v1/documents/:document_id/grants",
            post(create_grant_handler::<R, N>),
        )
        .route(
            "/api/v1/grants/:grant_id/revoke",
            post(revoke_grant_handler::<R, N>),
        )
        .with_state(service)
}

pub(crate) async fn submit_handler<R, N>(
    State(service): State<Arc<RegistrationService<R, N>>>,
    axum::Json(mut submission): axum::Json<RegistrationSubmission>,
) -> Response
where
    R: RegistrationRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    // The capture is handed straight to the in-flight assessment run and
    // never stored with the registration.
    let facial_capture = submission.facial_capture.take();

    match service.submit(submission) {
        Ok(registration) => {
            let registration_id = registration.registration_id.clone();
            let assess_service = service.clone();
            tokio::task::spawn_blocking(move || {
                if let Err(err) = assess_service.assess(&registration_id, facial_capture) {
                    warn!(registration = registration_id.0, %err, "assessment run failed");
                }
            });

            let view = super::repository::RegistrationStatusView::from_registration(&registration);
            (StatusCode::ACCEPTED, axum::Json(view)).into_response()
        }
        Err(err) => error_response(err),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReviewQueueParams {
    #[serde(default = "default_queue_limit")]
    pub limit: usize,
}

fn default_queue_limit() -> usize {
    50
}

pub(crate) async fn review_queue_handler<R, N>(
    State(service): State<Arc<RegistrationService<R, N>>>,
    Query(params): Query<ReviewQueueParams>,
) -> Response
where
    R: RegistrationRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    match service.review_queue(params.limit) {
        Ok(queue) => (StatusCode::OK, axum::Json(queue)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn status_handler<R, N>(
    State(service): State<Arc<RegistrationService<R, N>>>,
    Path(registration_id): Path<String>,
) -> Response
where
    R: RegistrationRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    match service.get(&RegistrationId(registration_id)) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(err) => error_response(err),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateGrantBody {
    pub caller_id: String,
    pub grantee_id: String,
    pub purpose: GrantPurpose,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub max_views: Option<u32>,
}

pub(crate) async fn create_grant_handler<R, N>(
    State(service): State<Arc<RegistrationService<R, N>>>,
    Path(document_id): Path<String>,
    axum::Json(body): axum::Json<CreateGrantBody>,
) -> Response
where
    R: RegistrationRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    let request = GrantRequest {
        document_id,
        grantee_id: body.grantee_id,
        purpose: body.purpose,
        expires_at: body.expires_at,
        max_views: body.max_views,
    };
    match service.create_grant(&body.caller_id, request) {
        Ok(grant) => (StatusCode::CREATED, axum::Json(grant)).into_response(),
        Err(err) => error_response(err),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RevokeGrantBody {
    pub caller_id: String,
}

pub(crate) async fn revoke_grant_handler<R, N>(
    State(service): State<Arc<RegistrationService<R, N>>>,
    Path(grant_id): Path<String>,
    axum::Json(body): axum::Json<RevokeGrantBody>,
) -> Response
where
    R: RegistrationRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    match service.revoke_grant(&body.caller_id, &GrantId(grant_id)) {
        Ok(()) => (StatusCode::NO_CONTENT, ()).into_response(),
        Err(err) => error_response(err),
    }
}

fn error_response(err: RegistrationServiceError) -> Response {
    let status = match &err {
        RegistrationServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        RegistrationServiceError::Repository(RepositoryError::NotFound)
        | RegistrationServiceError::UnknownDocument => StatusCode::NOT_FOUND,
        RegistrationServiceError::Repository(
            RepositoryError::AlreadyAssessed | RepositoryError::AssessmentInFlight,
        ) => StatusCode::CONFLICT,
        RegistrationServiceError::Directory(
            DirectoryError::UnknownLeg | DirectoryError::UnknownCrew,
        ) => StatusCode::UNPROCESSABLE_ENTITY,
        RegistrationServiceError::Grant(GrantError::NotOwner) => StatusCode::FORBIDDEN,
        RegistrationServiceError::Grant(
            GrantError::ExpiryTooFar | GrantError::ExpiryInPast,
        ) => StatusCode::UNPROCESSABLE_ENTITY,
        RegistrationServiceError::Grant(GrantError::NotFound) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let body = axum::Json(json!({ "error": err.to_string() }));
    (status, body).into_response()
}
