use sicater_client::{
    db::{self, ReadingFilter},
    domain::{ConsumptionBand, Period, ReadingWithCustomer},
};
use sqlx::PgPool;

use super::ReadingSet;
use crate::{analysis::StandIndex, pipeline::PipelineError};

/// Loads readings and their earlier stands from Postgres.
///
/// Stands are prefetched in one query per report instead of one lookup per
/// reading.
#[derive(Clone)]
pub struct PgReadingLoader {
    pool: PgPool,
}

impl PgReadingLoader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Every reading of `period` that passes `filter`, with `lookback` earlier
    /// periods of stands.
    pub async fn load_period(
        &self,
        period: Period,
        filter: &ReadingFilter,
        lookback: usize,
    ) -> Result<ReadingSet, PipelineError> {
        let records = db::list_by_period(&self.pool, period, filter)
            .await
            .map_err(|e| PipelineError::Source(format!("failed to list readings for {period}: {e}")))?;

        let mut customer_ids: Vec<i64> = records.iter().map(|r| r.reading.customer_id).collect();
        customer_ids.sort_unstable();
        customer_ids.dedup();

        let stands = self.prefetch(&customer_ids, period, lookback).await?;

        tracing::info!(
            period = %period,
            readings = records.len(),
            stands = stands.len(),
            "loaded readings for analysis"
        );

        Ok(ReadingSet {
            period,
            records,
            stands,
        })
    }

    /// A single customer's reading for `period`, or `None` when either the
    /// reading or the (non-deleted) customer does not exist.
    pub async fn load_customer(
        &self,
        customer_id: i64,
        period: Period,
        lookback: usize,
    ) -> Result<Option<ReadingSet>, PipelineError> {
        let reading = db::find_reading(&self.pool, customer_id, period)
            .await
            .map_err(|e| PipelineError::Source(format!("failed to fetch reading: {e}")))?;
        let Some(reading) = reading else {
            return Ok(None);
        };

        let customer = db::find_customer(&self.pool, customer_id)
            .await
            .map_err(|e| PipelineError::Source(format!("failed to fetch customer: {e}")))?;
        let Some(customer) = customer else {
            return Ok(None);
        };

        let stands = self.prefetch(&[customer_id], period, lookback).await?;

        Ok(Some(ReadingSet {
            period,
            records: vec![ReadingWithCustomer { reading, customer }],
            stands,
        }))
    }

    pub async fn bands(&self) -> Result<Vec<ConsumptionBand>, PipelineError> {
        db::list_bands(&self.pool)
            .await
            .map_err(|e| PipelineError::Source(format!("failed to load consumption bands: {e}")))
    }

    async fn prefetch(
        &self,
        customer_ids: &[i64],
        period: Period,
        lookback: usize,
    ) -> Result<StandIndex, PipelineError> {
        let periods = period.lookback(lookback);
        let rows = db::prefetch_stands(&self.pool, customer_ids, &periods)
            .await
            .map_err(|e| PipelineError::Source(format!("failed to prefetch stands: {e}")))?;
        Ok(StandIndex::from_rows(rows))
    }
}
