use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};

use super::domain::IntentRef;
use super::gateway::PaymentGateway;
use super::reconcile::{ReconciliationEngine, ReconciliationError};
use super::repository::ReconciliationStore;
use crate::workflows::enrollment::applications::domain::ApplicantFields;
use crate::workflows::enrollment::applications::repository::RepositoryError;
use crate::workflows::enrollment::applications::router::{authenticated, error_response};
use crate::workflows::enrollment::catalog::{CatalogStore, OfferingId, OfferingKind};
use crate::workflows::enrollment::identity::IdentityProvider;
use serde::Deserialize;

/// Shared state for the payment endpoints.
pub struct PaymentRouterState<S, G, C> {
    pub engine: Arc<ReconciliationEngine<S, G, C>>,
    pub identity: Arc<dyn IdentityProvider>,
}

impl<S, G, C> Clone for PaymentRouterState<S, G, C> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            identity: self.identity.clone(),
        }
    }
}

/// Router builder for charge initiation and confirmation.
pub fn payment_router<S, G, C>(state: PaymentRouterState<S, G, C>) -> Router
where
    S: ReconciliationStore + 'static,
    G: PaymentGateway + 'static,
    C: CatalogStore + 'static,
{
    Router::new()
        .route("/api/v1/payments/intent", post(intent_handler::<S, G, C>))
        .route("/api/v1/payments/confirm", post(confirm_handler::<S, G, C>))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub(crate) struct IntentRequest {
    pub(crate) offering_id: OfferingId,
    pub(crate) offering_kind: OfferingKind,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConfirmRequest {
    pub(crate) gateway_intent: IntentRef,
    #[serde(default)]
    pub(crate) fields: ApplicantFields,
}

pub(crate) async fn intent_handler<S, G, C>(
    State(state): State<PaymentRouterState<S, G, C>>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<IntentRequest>,
) -> Response
where
    S: ReconciliationStore + 'static,
    G: PaymentGateway + 'static,
    C: CatalogStore + 'static,
{
    let caller = match authenticated(&headers, state.identity.as_ref()) {
        Ok(caller) => caller,
        Err(response) => return response,
    };

    match state
        .engine
        .initiate_charge(&caller.user, &request.offering_id, request.offering_kind)
    {
        Ok(intent) => (StatusCode::CREATED, axum::Json(intent)).into_response(),
        Err(error) => reconciliation_error_response(error),
    }
}

pub(crate) async fn confirm_handler<S, G, C>(
    State(state): State<PaymentRouterState<S, G, C>>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<ConfirmRequest>,
) -> Response
where
    S: ReconciliationStore + 'static,
    G: PaymentGateway + 'static,
    C: CatalogStore + 'static,
{
    let caller = match authenticated(&headers, state.identity.as_ref()) {
        Ok(caller) => caller,
        Err(response) => return response,
    };

    match state
        .engine
        .confirm_payment(&caller.user, &request.gateway_intent, request.fields)
    {
        Ok(receipt) => (StatusCode::OK, axum::Json(receipt)).into_response(),
        Err(error) => reconciliation_error_response(error),
    }
}

fn reconciliation_error_response(error: ReconciliationError) -> Response {
    let (status, kind) = match &error {
        ReconciliationError::OfferingNotFound => (StatusCode::NOT_FOUND, "not_found"),
        ReconciliationError::InvalidFee => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_fee"),
        ReconciliationError::PaymentNotReady => (StatusCode::CONFLICT, "payment_not_ready"),
        ReconciliationError::CorruptIntent(_) => {
            (StatusCode::UNPROCESSABLE_ENTITY, "corrupt_intent")
        }
        ReconciliationError::AlreadyApplied => (StatusCode::CONFLICT, "conflict"),
        ReconciliationError::Upstream(_) => {
            (StatusCode::SERVICE_UNAVAILABLE, "upstream_unavailable")
        }
        ReconciliationError::Repository(RepositoryError::Conflict) => {
            (StatusCode::CONFLICT, "conflict")
        }
        ReconciliationError::Repository(RepositoryError::NotFound) => {
            (StatusCode::NOT_FOUND, "not_found")
        }
        ReconciliationError::Repository(RepositoryError::Unavailable(_))
        | ReconciliationError::Catalog(_) => {
            (StatusCode::SERVICE_UNAVAILABLE, "upstream_unavailable")
        }
    };
    error_response(status, kind, &error.to_string())
}
