use std::sync::Arc;

use sicater_client::domain::{ConsumptionBand, ReadingWithCustomer};

use crate::{
    analysis::{analyze, AnalysisParams, StandIndex},
    pipeline::{Envelope, PipelineError, Transform},
    report::UsageReportRow,
};

/// Runs the usage analysis for each record and joins the display fields.
///
/// Every report kind and output format goes through this one transform.
#[derive(Clone)]
pub struct UsageAnalyzer {
    stands: Arc<StandIndex>,
    bands: Arc<[ConsumptionBand]>,
    params: AnalysisParams,
}

impl UsageAnalyzer {
    pub fn new(stands: Arc<StandIndex>, bands: Arc<[ConsumptionBand]>, params: AnalysisParams) -> Self {
        Self {
            stands,
            bands,
            params,
        }
    }

    pub fn analyze_record(&self, record: &ReadingWithCustomer) -> Result<UsageReportRow, PipelineError> {
        let period = record
            .reading
            .period()
            .map_err(|e| PipelineError::Validation(e.to_string()))?;

        let analysis = analyze(
            &record.reading,
            period,
            &record.customer.location(),
            &self.bands,
            self.stands.as_ref(),
            &self.params,
        );

        metrics::counter!("usage_readings_analyzed_total").increment(1);
        if analysis.is_gps_anomaly {
            metrics::counter!("usage_gps_anomalies_total").increment(1);
        }

        Ok(UsageReportRow::new(record, analysis))
    }
}

#[async_trait::async_trait]
impl Transform<ReadingWithCustomer, UsageReportRow> for UsageAnalyzer {
    async fn apply(
        &self,
        input: Envelope<ReadingWithCustomer>,
    ) -> Result<Envelope<UsageReportRow>, PipelineError> {
        let row = self.analyze_record(&input.payload)?;
        Ok(input.map(|_| row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::record;
    use sicater_client::domain::Period;

    #[test]
    fn analyzer_uses_prefetched_stands() {
        let mut stands = StandIndex::default();
        stands.insert(1, Period::new(2, 2024).unwrap(), 100);
        let bands: Arc<[ConsumptionBand]> = vec![ConsumptionBand::new(0, 20, "Normal")].into();

        let analyzer = UsageAnalyzer::new(Arc::new(stands), bands, AnalysisParams::default());
        let row = analyzer.analyze_record(&record(1, 3, 2024, 120)).unwrap();

        assert_eq!(row.prior_stand, 100);
        assert_eq!(row.consumption, 20);
        assert_eq!(row.consumption_status, "Normal");
    }

    #[test]
    fn analyzer_rejects_unvalidated_month() {
        let analyzer = UsageAnalyzer::new(
            Arc::new(StandIndex::default()),
            Vec::<ConsumptionBand>::new().into(),
            AnalysisParams::default(),
        );
        let res = analyzer.analyze_record(&record(1, 0, 2024, 120));
        assert!(matches!(res, Err(PipelineError::Validation(_))));
    }
}
