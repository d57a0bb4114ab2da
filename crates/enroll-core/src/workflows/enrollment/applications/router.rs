use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::admin::{AdminListFilter, AdminReview, AdminReviewError};
use super::domain::{ApplicantFields, ApplicationId, ApplicationRecord, ApplicationStatus};
use super::drafts::{DraftWorkflow, DraftWorkflowError};
use super::repository::{ApplicationRepository, RepositoryError};
use crate::workflows::enrollment::catalog::{CatalogStore, OfferingId, OfferingKind};
use crate::workflows::enrollment::identity::{
    caller_from_headers, AuthError, Caller, IdentityProvider,
};

/// Shared state for the applicant-facing draft endpoints.
pub struct DraftRouterState<R, C> {
    pub workflow: Arc<DraftWorkflow<R, C>>,
    pub identity: Arc<dyn IdentityProvider>,
}

impl<R, C> Clone for DraftRouterState<R, C> {
    fn clone(&self) -> Self {
        Self {
            workflow: self.workflow.clone(),
            identity: self.identity.clone(),
        }
    }
}

/// Shared state for the privileged review endpoints.
pub struct AdminRouterState<R> {
    pub review: Arc<AdminReview<R>>,
    pub identity: Arc<dyn IdentityProvider>,
}

impl<R> Clone for AdminRouterState<R> {
    fn clone(&self) -> Self {
        Self {
            review: self.review.clone(),
            identity: self.identity.clone(),
        }
    }
}

/// Router builder for draft save/submit/delete and the per-user listing.
pub fn application_router<R, C>(state: DraftRouterState<R, C>) -> Router
where
    R: ApplicationRepository + 'static,
    C: CatalogStore + 'static,
{
    Router::new()
        .route("/api/v1/applications/draft", post(save_draft_handler::<R, C>))
        .route(
            "/api/v1/applications/:application_id/submit",
            post(submit_handler::<R, C>),
        )
        .route(
            "/api/v1/applications/:application_id",
            axum::routing::delete(delete_handler::<R, C>),
        )
        .route("/api/v1/applications", get(list_handler::<R, C>))
        .with_state(state)
}

/// Router builder for admin status updates and the merged listing.
pub fn admin_router<R>(state: AdminRouterState<R>) -> Router
where
    R: ApplicationRepository + 'static,
{
    Router::new()
        .route(
            "/api/v1/admin/applications/:application_id",
            put(admin_update_handler::<R>),
        )
        .route("/api/v1/admin/applications", get(admin_list_handler::<R>))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub(crate) struct DraftRequest {
    pub(crate) offering_id: OfferingId,
    pub(crate) offering_kind: OfferingKind,
    #[serde(default)]
    pub(crate) fields: ApplicantFields,
    #[serde(default)]
    pub(crate) submit: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AdminUpdateRequest {
    #[serde(default)]
    pub(crate) status: Option<ApplicationStatus>,
    #[serde(default)]
    pub(crate) admin_notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AdminListQuery {
    #[serde(default)]
    pub(crate) status: Option<ApplicationStatus>,
}

pub(crate) async fn save_draft_handler<R, C>(
    State(state): State<DraftRouterState<R, C>>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<DraftRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
    C: CatalogStore + 'static,
{
    let caller = match authenticated(&headers, state.identity.as_ref()) {
        Ok(caller) => caller,
        Err(response) => return response,
    };

    let result = state.workflow.save_draft(
        &caller.user,
        &request.offering_id,
        request.offering_kind,
        request.fields,
        request.submit,
    );

    match result {
        Ok(record) => {
            let status = if record.status == ApplicationStatus::Draft {
                StatusCode::OK
            } else {
                StatusCode::ACCEPTED
            };
            (status, axum::Json(record.status_view())).into_response()
        }
        Err(error) => draft_error_response(error),
    }
}

pub(crate) async fn submit_handler<R, C>(
    State(state): State<DraftRouterState<R, C>>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
    C: CatalogStore + 'static,
{
    let caller = match authenticated(&headers, state.identity.as_ref()) {
        Ok(caller) => caller,
        Err(response) => return response,
    };

    let id = ApplicationId(application_id);
    match state.workflow.submit_draft(&caller.user, &id) {
        Ok(record) => (
            StatusCode::OK,
            axum::Json(json!({
                "application_id": record.id.0,
                "status": record.status.label(),
            })),
        )
            .into_response(),
        Err(error) => draft_error_response(error),
    }
}

pub(crate) async fn delete_handler<R, C>(
    State(state): State<DraftRouterState<R, C>>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
    C: CatalogStore + 'static,
{
    let caller = match authenticated(&headers, state.identity.as_ref()) {
        Ok(caller) => caller,
        Err(response) => return response,
    };

    let id = ApplicationId(application_id);
    match state.workflow.delete_draft(&caller.user, &id) {
        Ok(()) => (StatusCode::OK, axum::Json(json!({}))).into_response(),
        Err(error) => draft_error_response(error),
    }
}

pub(crate) async fn list_handler<R, C>(
    State(state): State<DraftRouterState<R, C>>,
    headers: HeaderMap,
) -> Response
where
    R: ApplicationRepository + 'static,
    C: CatalogStore + 'static,
{
    let caller = match authenticated(&headers, state.identity.as_ref()) {
        Ok(caller) => caller,
        Err(response) => return response,
    };

    match state.workflow.list_applications(&caller.user) {
        Ok(partition) => {
            let views = |records: Vec<ApplicationRecord>| {
                records
                    .iter()
                    .map(ApplicationRecord::status_view)
                    .collect::<Vec<_>>()
            };
            (
                StatusCode::OK,
                axum::Json(json!({
                    "submitted": views(partition.submitted),
                    "drafts": views(partition.drafts),
                })),
            )
                .into_response()
        }
        Err(error) => draft_error_response(error),
    }
}

pub(crate) async fn admin_update_handler<R>(
    State(state): State<AdminRouterState<R>>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
    axum::Json(request): axum::Json<AdminUpdateRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    let _caller = match admin_authenticated(&headers, state.identity.as_ref()) {
        Ok(caller) => caller,
        Err(response) => return response,
    };

    let id = ApplicationId(application_id);
    match state
        .review
        .update_status(&id, request.status, request.admin_notes)
    {
        Ok(record) => (StatusCode::OK, axum::Json(record.status_view())).into_response(),
        Err(error) => admin_error_response(error),
    }
}

pub(crate) async fn admin_list_handler<R>(
    State(state): State<AdminRouterState<R>>,
    headers: HeaderMap,
    axum::extract::Query(query): axum::extract::Query<AdminListQuery>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    let _caller = match admin_authenticated(&headers, state.identity.as_ref()) {
        Ok(caller) => caller,
        Err(response) => return response,
    };

    let filter = AdminListFilter {
        status: query.status,
    };
    match state.review.list_applications(filter) {
        Ok(summaries) => (StatusCode::OK, axum::Json(summaries)).into_response(),
        Err(error) => admin_error_response(error),
    }
}

pub(crate) fn authenticated(
    headers: &HeaderMap,
    identity: &dyn IdentityProvider,
) -> Result<Caller, Response> {
    caller_from_headers(headers, identity).map_err(auth_error_response)
}

pub(crate) fn admin_authenticated(
    headers: &HeaderMap,
    identity: &dyn IdentityProvider,
) -> Result<Caller, Response> {
    let caller = authenticated(headers, identity)?;
    if caller.is_admin() {
        Ok(caller)
    } else {
        Err(auth_error_response(AuthError::Forbidden))
    }
}

pub(crate) fn auth_error_response(error: AuthError) -> Response {
    let (status, kind) = match error {
        AuthError::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthenticated"),
        AuthError::Forbidden => (StatusCode::FORBIDDEN, "forbidden"),
    };
    error_response(status, kind, &error.to_string())
}

fn draft_error_response(error: DraftWorkflowError) -> Response {
    let (status, kind) = match &error {
        DraftWorkflowError::OfferingNotFound | DraftWorkflowError::NotFound => {
            (StatusCode::NOT_FOUND, "not_found")
        }
        DraftWorkflowError::AlreadyApplied | DraftWorkflowError::MissingSubmissionFields => {
            (StatusCode::CONFLICT, "conflict")
        }
        DraftWorkflowError::NotADraft { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_state"),
        DraftWorkflowError::Repository(RepositoryError::Conflict) => {
            (StatusCode::CONFLICT, "conflict")
        }
        DraftWorkflowError::Repository(RepositoryError::NotFound) => {
            (StatusCode::NOT_FOUND, "not_found")
        }
        DraftWorkflowError::Repository(RepositoryError::Unavailable(_))
        | DraftWorkflowError::Catalog(_) => {
            (StatusCode::SERVICE_UNAVAILABLE, "upstream_unavailable")
        }
    };
    error_response(status, kind, &error.to_string())
}

fn admin_error_response(error: AdminReviewError) -> Response {
    let (status, kind) = match &error {
        AdminReviewError::NotFound | AdminReviewError::Repository(RepositoryError::NotFound) => {
            (StatusCode::NOT_FOUND, "not_found")
        }
        AdminReviewError::InvalidTransition { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, "invalid_transition")
        }
        AdminReviewError::Repository(RepositoryError::Conflict) => {
            (StatusCode::CONFLICT, "conflict")
        }
        AdminReviewError::Repository(RepositoryError::Unavailable(_)) => {
            (StatusCode::SERVICE_UNAVAILABLE, "upstream_unavailable")
        }
    };
    error_response(status, kind, &error.to_string())
}

pub(crate) fn error_response(status: StatusCode, kind: &str, message: &str) -> Response {
    let payload = json!({
        "kind": kind,
        "error": message,
    });
    (status, axum::Json(payload)).into_response()
}
