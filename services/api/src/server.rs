use crate::cli::ServeArgs;
use crate::infra::{
    AppState, InMemoryEnrollmentStore, InMemoryGateway, StaticCatalog, TokenIdentity,
};
use crate::routes::with_enrollment_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

use enroll_core::config::AppConfig;
use enroll_core::error::AppError;
use enroll_core::telemetry;
use enroll_core::workflows::enrollment::applications::router::{
    AdminRouterState, DraftRouterState,
};
use enroll_core::workflows::enrollment::applications::{AdminReview, DraftWorkflow};
use enroll_core::workflows::enrollment::identity::IdentityProvider;
use enroll_core::workflows::enrollment::payments::router::PaymentRouterState;
use enroll_core::workflows::enrollment::payments::ReconciliationEngine;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    if config.admin.api_token.is_none() {
        warn!("APP_ADMIN_TOKEN not set; admin endpoints will reject every caller");
    }

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(InMemoryEnrollmentStore::default());
    let gateway = Arc::new(InMemoryGateway::default());
    let catalog = Arc::new(StaticCatalog::default());
    let identity =
        Arc::new(TokenIdentity::new(config.admin.api_token.clone())) as Arc<dyn IdentityProvider>;

    let app = with_enrollment_routes(
        DraftRouterState {
            workflow: Arc::new(DraftWorkflow::new(store.clone(), catalog.clone())),
            identity: identity.clone(),
        },
        PaymentRouterState {
            engine: Arc::new(ReconciliationEngine::new(
                store.clone(),
                gateway,
                catalog.clone(),
            )),
            identity: identity.clone(),
        },
        AdminRouterState {
            review: Arc::new(AdminReview::new(store)),
            identity,
        },
    )
    .layer(Extension(app_state))
    .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "enrollment service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
