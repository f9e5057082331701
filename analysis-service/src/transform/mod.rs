mod analyzer;

pub use analyzer::UsageAnalyzer;

use crate::pipeline::{Envelope, PipelineError, Transform};
use sicater_client::domain::ReadingWithCustomer;

/// Pure validation of a reading before it reaches the analysis.
///
/// Rules:
/// - month must be within 1..=12.
/// - final stand must be non-negative.
/// - coordinates, when present, must be finite and inside the valid
///   latitude/longitude ranges.
pub fn validate_reading(
    env: Envelope<ReadingWithCustomer>,
) -> Result<Envelope<ReadingWithCustomer>, PipelineError> {
    let r = &env.payload.reading;
    let c = &env.payload.customer;

    r.period()
        .map_err(|e| PipelineError::Validation(format!("customer {}: {e}", r.customer_id)))?;

    if r.final_stand < 0 {
        return Err(PipelineError::Validation(format!(
            "customer {}: final stand must be non-negative, got {}",
            r.customer_id, r.final_stand
        )));
    }

    check_coordinate(r.customer_id, "capture_latitude", r.capture_latitude, 90.0)?;
    check_coordinate(r.customer_id, "capture_longitude", r.capture_longitude, 180.0)?;
    check_coordinate(r.customer_id, "master_latitude", c.master_latitude, 90.0)?;
    check_coordinate(r.customer_id, "master_longitude", c.master_longitude, 180.0)?;

    Ok(env)
}

fn check_coordinate(
    customer_id: i64,
    field: &str,
    value: Option<f64>,
    limit: f64,
) -> Result<(), PipelineError> {
    match value {
        Some(v) if !v.is_finite() || v.abs() > limit => Err(PipelineError::Validation(format!(
            "customer {customer_id}: {field} out of range: {v}"
        ))),
        _ => Ok(()),
    }
}

#[derive(Clone, Default)]
pub struct ReadingValidation;

#[async_trait::async_trait]
impl Transform<ReadingWithCustomer, ReadingWithCustomer> for ReadingValidation {
    async fn apply(
        &self,
        input: Envelope<ReadingWithCustomer>,
    ) -> Result<Envelope<ReadingWithCustomer>, PipelineError> {
        match validate_reading(input) {
            Ok(env) => Ok(env),
            Err(e) => {
                metrics::counter!("usage_readings_rejected_total").increment(1);
                Err(e)
            }
        }
    }
}
