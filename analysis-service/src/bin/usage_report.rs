use anyhow::{bail, Result};
use analysis_service::{
    config::AppConfig,
    observability,
    report::{run_report, ReportKind},
    sinks::CsvReportSink,
    sources::PgReadingLoader,
};
use sicater_client::{db::ReadingFilter, domain::Period};
use sqlx::postgres::PgPoolOptions;
use std::{env, fs::File, io::Write};

/// Write a usage report for one period as CSV.
///
/// Usage:
///   usage_report <month> <year> [usage|zero-usage|anomalies] [output.csv]
///
/// Without an output path the report goes to stdout.
#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        bail!("usage: usage_report <month> <year> [usage|zero-usage|anomalies] [output.csv]");
    }
    let month: i32 = args[1].parse().map_err(|e| anyhow::anyhow!("invalid month '{}': {e}", args[1]))?;
    let year: i32 = args[2].parse().map_err(|e| anyhow::anyhow!("invalid year '{}': {e}", args[2]))?;
    let period = Period::new(month, year)?;
    let kind: ReportKind = match args.get(3) {
        Some(k) => k.parse().map_err(anyhow::Error::msg)?,
        None => ReportKind::default(),
    };

    // Load configuration (SICATER_CONFIG can point to a report-specific file).
    let cfg = AppConfig::load()?;
    let params = cfg.analysis.params()?;

    let pool = PgPoolOptions::new()
        .max_connections(cfg.database.max_connections)
        .connect(&cfg.database.uri)
        .await?;
    let loader = PgReadingLoader::new(pool);

    let bands = loader.bands().await?;
    let set = loader
        .load_period(period, &ReadingFilter::default(), params.lookback_periods())
        .await?;

    let out: Box<dyn Write + Send> = match args.get(4) {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(std::io::stdout()),
    };
    let sink = CsvReportSink::new(out, cfg.server.csv_flush_rows);

    run_report(set, bands, params, kind, sink).await?.into_inner()?.flush()?;

    tracing::info!(period = %period, kind = %kind, "usage report written");

    Ok(())
}
