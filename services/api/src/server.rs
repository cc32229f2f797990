use crate::cli::ServeArgs;
use crate::infra::{build_configurator, configured_catalog, AppState};
use crate::routes::with_service_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use configurator::config::AppConfig;
use configurator::error::AppError;
use configurator::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let catalog = configured_catalog(&config.catalog)?;
    let configurator = Arc::new(build_configurator(&catalog, config.catalog.fetch_timeout));
    let snapshot = configurator.engine.snapshot()?;
    if !snapshot.issues().is_empty() {
        warn!(
            issues = snapshot.issues().len(),
            "serving rule catalog with quarantined rules"
        );
    }

    let app = with_service_routes(configurator)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        product_types = snapshot.product_types().count(),
        "product configurator ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
