use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use serde_json::json;

use enroll_core::workflows::enrollment::applications::router::{
    admin_router, application_router, AdminRouterState, DraftRouterState,
};
use enroll_core::workflows::enrollment::applications::ApplicationRepository;
use enroll_core::workflows::enrollment::catalog::CatalogStore;
use enroll_core::workflows::enrollment::payments::router::{payment_router, PaymentRouterState};
use enroll_core::workflows::enrollment::payments::{PaymentGateway, ReconciliationStore};

/// Mount every enrollment router plus the operational endpoints.
pub(crate) fn with_enrollment_routes<S, G, C>(
    drafts: DraftRouterState<S, C>,
    payments: PaymentRouterState<S, G, C>,
    admin: AdminRouterState<S>,
) -> axum::Router
where
    S: ReconciliationStore + ApplicationRepository + 'static,
    G: PaymentGateway + 'static,
    C: CatalogStore + 'static,
{
    application_router(drafts)
        .merge(payment_router(payments))
        .merge(admin_router(admin))
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
