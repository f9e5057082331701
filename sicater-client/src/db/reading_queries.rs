use anyhow::Result;
use sqlx::PgPool;

use crate::domain::{MeterReading, Period, ReadingWithCustomer};

/// Optional narrowing of a period listing. `None` fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadingFilter {
    pub branch_id: Option<i64>,
    pub officer_id: Option<i64>,
    pub zone: Option<String>,
}

/// The final stand of one customer in one period.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct StandRow {
    pub customer_id: i64,
    pub month: i32,
    pub year: i32,
    pub final_stand: i64,
}

/// Fetch the reading for a single customer and period, if one was submitted.
pub async fn find_reading(
    pool: &PgPool,
    customer_id: i64,
    period: Period,
) -> Result<Option<MeterReading>> {
    let row = sqlx::query_as::<_, MeterReading>(
        r#"
        SELECT
            customer_id,
            month,
            year,
            final_stand,
            COALESCE(photo_ocr_status, 'none') AS photo_ocr_status,
            capture_latitude,
            capture_longitude,
            verified_at
        FROM meter_readings
        WHERE customer_id = $1
          AND month = $2
          AND year = $3
        "#,
    )
    .bind(customer_id)
    .bind(period.month())
    .bind(period.year())
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// List every reading of a period joined with its customer.
///
/// Soft-deleted customers are excluded. Rows are ordered by customer number so
/// report pages are stable between runs.
pub async fn list_by_period(
    pool: &PgPool,
    period: Period,
    filter: &ReadingFilter,
) -> Result<Vec<ReadingWithCustomer>> {
    let rows = sqlx::query_as::<_, ReadingWithCustomer>(
        r#"
        SELECT
            r.customer_id,
            r.month,
            r.year,
            r.final_stand,
            COALESCE(r.photo_ocr_status, 'none') AS photo_ocr_status,
            r.capture_latitude,
            r.capture_longitude,
            r.verified_at,
            c.customer_number,
            c.name,
            c.address,
            c.tariff_code,
            c.branch_id,
            c.officer_id,
            c.zone,
            c.master_latitude,
            c.master_longitude
        FROM meter_readings r
        JOIN customers c ON c.customer_id = r.customer_id
        WHERE r.month = $1
          AND r.year = $2
          AND c.is_deleted = FALSE
          AND ($3::BIGINT IS NULL OR c.branch_id = $3)
          AND ($4::BIGINT IS NULL OR c.officer_id = $4)
          AND ($5::TEXT IS NULL OR c.zone = $5)
        ORDER BY c.customer_number
        "#,
    )
    .bind(period.month())
    .bind(period.year())
    .bind(filter.branch_id)
    .bind(filter.officer_id)
    .bind(filter.zone.as_deref())
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Batch-fetch final stands for a set of customers across several periods.
///
/// Replaces one lookup per reading with a single round trip; periods are
/// matched on their `yyyymm` key.
pub async fn prefetch_stands(
    pool: &PgPool,
    customer_ids: &[i64],
    periods: &[Period],
) -> Result<Vec<StandRow>> {
    if customer_ids.is_empty() || periods.is_empty() {
        return Ok(Vec::new());
    }

    let keys: Vec<i32> = periods.iter().map(Period::key).collect();

    let rows = sqlx::query_as::<_, StandRow>(
        r#"
        SELECT
            customer_id,
            month,
            year,
            final_stand
        FROM meter_readings
        WHERE customer_id = ANY($1)
          AND (year * 100 + month) = ANY($2)
        "#,
    )
    .bind(customer_ids)
    .bind(&keys)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
