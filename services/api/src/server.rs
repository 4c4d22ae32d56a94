use crate::cli::ServeArgs;
use crate::infra::{insights_service, load_activity, AppState};
use crate::routes::with_insights_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tenant_insights::config::AppConfig;
use tenant_insights::error::AppError;
use tenant_insights::telemetry;
use tracing::info;

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

    let source = load_activity(&config.insights)?;
    let report_service = Arc::new(insights_service(source, &config.insights));

    let app = with_insights_routes(report_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        nps_method = %config.insights.nps_method,
        list_limit = config.insights.list_limit,
        "tenant insights service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
