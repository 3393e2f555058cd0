use crate::cli::ServeArgs;
use crate::infra::{AppState, Console};
use crate::routes::with_console_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;
use vantage_risk::backend::HttpBackend;
use vantage_risk::config::AppConfig;
use vantage_risk::error::AppError;

pub(crate) async fn run(mut config: AppConfig, mut args: ServeArgs) -> Result<(), AppError> {
    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let backend = Arc::new(HttpBackend::new(&config.backend)?);
    let console = Console::start(backend, config.backend.request_timeout, &config.monitor)?;

    let ledger = Arc::clone(&console.ledger);
    tokio::spawn(async move {
        ledger.initial_load().await;
    });

    let app = with_console_routes(console)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        backend = %config.backend.base_url,
        "underwriting console ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
