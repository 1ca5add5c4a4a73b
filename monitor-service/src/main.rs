use anyhow::Result;
use monitor_service::{
    assistant,
    config::AppConfig,
    http::{self, AppState},
    metrics_server, observability,
    service::MonitorService,
    store::PgStorage,
};
use sqlx::postgres::PgPoolOptions;
use std::{net::SocketAddr, sync::Arc};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    // Load configuration
    let cfg = AppConfig::load()?;

    // Start metrics server if configured
    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let pool = PgPoolOptions::new()
        .max_connections(cfg.database.max_connections)
        .connect(&cfg.database.uri)
        .await?;

    let tariff = cfg.tariff.to_tariff();
    tracing::info!(tariff = tariff.name(), "active tariff selected");

    let service = Arc::new(MonitorService::new(
        Arc::new(PgStorage::new(pool)),
        tariff,
        cfg.forecast.window(),
    ));
    let assistant = assistant::from_config(cfg.assistant.as_ref());

    let app = http::router(AppState { service, assistant });

    let addr: SocketAddr = cfg
        .http
        .bind_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid http.bind_addr: {e}"))?;

    tracing::info!(%addr, "monitor service listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
