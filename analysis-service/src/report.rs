use std::{fmt, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};
use sicater_client::domain::{ConsumptionBand, OcrStatus, Period, ReadingWithCustomer};
use time::format_description::well_known::Rfc3339;

use crate::{
    analysis::{AnalysisParams, UsageAnalysis},
    pipeline::{Envelope, Filter, Pipeline, PipelineError, Sink},
    sources::ReadingSet,
    transform::{ReadingValidation, UsageAnalyzer},
};

/// One output line: the analysis joined with the customer's display fields.
///
/// Flat so it serializes to a single CSV record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageReportRow {
    pub customer_id: i64,
    pub customer_number: String,
    pub name: String,
    pub address: Option<String>,
    pub tariff_code: Option<String>,
    pub zone: Option<String>,
    pub month: i32,
    pub year: i32,
    pub final_stand: i64,
    pub prior_stand: i64,
    pub consumption: i64,
    pub consumption_status: String,
    pub photo_ocr_status: OcrStatus,
    /// Rounded to whole meters; empty when a coordinate is missing.
    pub distance_meters: Option<f64>,
    pub is_gps_anomaly: bool,
    pub is_stuck: bool,
    pub is_ocr_anomaly: bool,
    pub needs_review: bool,
    pub verified_at: Option<String>,
}

impl UsageReportRow {
    pub fn new(record: &ReadingWithCustomer, analysis: UsageAnalysis) -> Self {
        let reading = &record.reading;
        let customer = &record.customer;

        Self {
            customer_id: reading.customer_id,
            customer_number: customer.customer_number.clone(),
            name: customer.name.clone(),
            address: customer.address.clone(),
            tariff_code: customer.tariff_code.clone(),
            zone: customer.zone.clone(),
            month: reading.month,
            year: reading.year,
            final_stand: reading.final_stand,
            prior_stand: analysis.prior_stand,
            consumption: analysis.consumption,
            consumption_status: analysis.consumption_status,
            photo_ocr_status: reading.photo_ocr_status,
            distance_meters: analysis.distance_meters.map(f64::round),
            is_gps_anomaly: analysis.is_gps_anomaly,
            is_stuck: analysis.is_stuck,
            is_ocr_anomaly: analysis.is_ocr_anomaly,
            needs_review: analysis.needs_review,
            verified_at: reading.verified_at.and_then(|ts| ts.format(&Rfc3339).ok()),
        }
    }

    pub fn is_zero_usage(&self) -> bool {
        self.consumption == 0
    }

    pub fn is_meter_regression(&self) -> bool {
        self.consumption < 0
    }

    pub fn has_anomaly(&self) -> bool {
        self.is_gps_anomaly || self.is_ocr_anomaly || self.is_meter_regression() || self.is_stuck
    }
}

/// Which rows a report keeps. Every kind runs the same analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportKind {
    /// Every reading of the period.
    #[default]
    Usage,
    /// Readings with zero consumption.
    #[serde(alias = "zero_usage")]
    ZeroUsage,
    /// GPS, OCR, regression or stuck-meter findings.
    Anomalies,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Usage => "usage",
            Self::ZeroUsage => "zero-usage",
            Self::Anomalies => "anomalies",
        }
    }

    pub fn includes(&self, row: &UsageReportRow) -> bool {
        match self {
            Self::Usage => true,
            Self::ZeroUsage => row.is_zero_usage(),
            Self::Anomalies => row.has_anomaly(),
        }
    }

    /// File name used for downloads, e.g. `zero-usage-2024-03.csv`.
    pub fn file_name(&self, period: Period, extension: &str) -> String {
        format!("{}-{period}.{extension}", self.as_str())
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "usage" => Ok(Self::Usage),
            "zero-usage" | "zero_usage" => Ok(Self::ZeroUsage),
            "anomalies" => Ok(Self::Anomalies),
            other => Err(format!("unknown report kind '{other}'")),
        }
    }
}

impl Filter<UsageReportRow> for ReportKind {
    fn keep(&self, item: &Envelope<UsageReportRow>) -> bool {
        self.includes(&item.payload)
    }
}

/// Totals shown above a report.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportSummary {
    pub total_rows: usize,
    pub total_consumption: i64,
    pub zero_usage: usize,
    pub meter_regressions: usize,
    pub gps_anomalies: usize,
    pub ocr_anomalies: usize,
    pub stuck_meters: usize,
    pub needs_review: usize,
    /// Share of rows with any anomaly, in percent. `None` for an empty report.
    pub anomaly_pct: Option<f64>,
}

impl ReportSummary {
    pub fn from_rows(rows: &[UsageReportRow]) -> Self {
        let mut summary = Self {
            total_rows: rows.len(),
            ..Self::default()
        };
        let mut anomalous = 0usize;

        for row in rows {
            // Regressions would otherwise cancel out real usage.
            if row.consumption > 0 {
                summary.total_consumption += row.consumption;
            }
            summary.zero_usage += usize::from(row.is_zero_usage());
            summary.meter_regressions += usize::from(row.is_meter_regression());
            summary.gps_anomalies += usize::from(row.is_gps_anomaly);
            summary.ocr_anomalies += usize::from(row.is_ocr_anomaly);
            summary.stuck_meters += usize::from(row.is_stuck);
            summary.needs_review += usize::from(row.needs_review);
            anomalous += usize::from(row.has_anomaly());
        }

        if !rows.is_empty() {
            summary.anomaly_pct = Some(anomalous as f64 * 100.0 / rows.len() as f64);
        }
        summary
    }
}

/// Validate, analyse and filter a loaded reading set into `sink`.
///
/// The sink is handed back once the stream is drained.
pub async fn run_report<K>(
    set: ReadingSet,
    bands: Vec<ConsumptionBand>,
    params: AnalysisParams,
    kind: ReportKind,
    sink: K,
) -> Result<K, PipelineError>
where
    K: Sink<UsageReportRow> + Send + Sync + 'static,
{
    let period = set.period;
    let (source, stands) = set.into_parts();
    let analyzer = UsageAnalyzer::new(stands, bands.into(), params);

    tracing::debug!(period = %period, kind = %kind, "running usage report");

    let pipeline: Pipeline<_, ReadingWithCustomer, UsageReportRow, _> = Pipeline {
        source,
        validators: vec![Arc::new(ReadingValidation)],
        analyzer: Arc::new(analyzer),
        filters: vec![Arc::new(kind)],
        sink,
    };

    pipeline.run().await
}
