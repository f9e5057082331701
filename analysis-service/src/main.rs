use anyhow::Result;
use analysis_service::{
    api::{self, AppState},
    config::AppConfig,
    metrics_server, observability,
    sources::PgReadingLoader,
};
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    // Load configuration
    let cfg = AppConfig::load()?;
    let params = cfg.analysis.params()?;

    // Start metrics server if configured
    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let pool = PgPoolOptions::new()
        .max_connections(cfg.database.max_connections)
        .connect(&cfg.database.uri)
        .await?;

    let app = api::router(AppState {
        loader: PgReadingLoader::new(pool),
        params,
        csv_flush_rows: cfg.server.csv_flush_rows,
    });

    let listener = tokio::net::TcpListener::bind(&cfg.server.bind_addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {}: {e}", cfg.server.bind_addr))?;

    tracing::info!(
        addr = %cfg.server.bind_addr,
        gps_threshold_meters = params.gps_threshold_meters,
        stuck_zero_months = params.stuck_zero_months,
        "usage report API listening"
    );

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("shutdown signal received");
}
