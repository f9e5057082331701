use anyhow::{bail, Result};
use analysis_service::{
    config::{self, AnalysisOnlyConfig},
    observability,
    report::{run_report, ReportKind},
    sinks::CsvReportSink,
    sources::ReadingCsvFile,
};
use sicater_client::domain::{ConsumptionBand, Period};
use std::{env, io::Write};

/// Analyse a reading export offline and print the report as CSV.
///
/// Usage:
///   analyze_readings_csv <readings.csv|readings.dat> <bands.csv> <month> <year> [kind]
///
/// `.dat` files are read as pipe-delimited. The band file has the columns
/// `min_usage,max_usage,label`. Analysis settings come from the `[analysis]`
/// section of `SICATER_CONFIG`; only a missing file falls back to the defaults.
#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 5 {
        bail!("usage: analyze_readings_csv <readings.csv|readings.dat> <bands.csv> <month> <year> [kind]");
    }
    let readings_path = &args[1];
    let bands_path = &args[2];
    let month: i32 = args[3].parse().map_err(|e| anyhow::anyhow!("invalid month '{}': {e}", args[3]))?;
    let year: i32 = args[4].parse().map_err(|e| anyhow::anyhow!("invalid year '{}': {e}", args[4]))?;
    let period = Period::new(month, year)?;
    let kind: ReportKind = match args.get(5) {
        Some(k) => k.parse().map_err(anyhow::Error::msg)?,
        None => ReportKind::default(),
    };

    let params = AnalysisOnlyConfig::load_params(&config::config_path())?;

    let mut file = ReadingCsvFile::new(readings_path);
    if readings_path.ends_with(".dat") {
        file = file.with_delimiter(b'|');
    }
    let set = file.load(period)?;
    let bands = load_bands(bands_path)?;

    let sink = CsvReportSink::new(std::io::stdout(), 500);
    run_report(set, bands, params, kind, sink).await?.into_inner()?.flush()?;

    Ok(())
}

#[derive(serde::Deserialize)]
struct BandLine {
    min_usage: i64,
    max_usage: i64,
    label: String,
}

fn load_bands(path: &str) -> Result<Vec<ConsumptionBand>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
    let mut bands = Vec::new();
    for line in rdr.deserialize::<BandLine>() {
        let line = line?;
        if line.min_usage > line.max_usage {
            bail!("band '{}' has min {} above max {}", line.label, line.min_usage, line.max_usage);
        }
        bands.push(ConsumptionBand::new(line.min_usage, line.max_usage, line.label));
    }
    Ok(bands)
}
