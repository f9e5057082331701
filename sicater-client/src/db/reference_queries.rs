use anyhow::Result;
use sqlx::PgPool;

use crate::domain::{ConsumptionBand, CustomerProfile};

pub async fn find_customer(pool: &PgPool, customer_id: i64) -> Result<Option<CustomerProfile>> {
    let row = sqlx::query_as::<_, CustomerProfile>(
        r#"
        SELECT
            customer_id,
            customer_number,
            name,
            address,
            tariff_code,
            branch_id,
            officer_id,
            zone,
            master_latitude,
            master_longitude
        FROM customers
        WHERE customer_id = $1
          AND is_deleted = FALSE
        "#,
    )
    .bind(customer_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Load the classification table in ascending `min` order.
///
/// Ties on `min` fall back to the row id so the scan order never depends on
/// the planner.
pub async fn list_bands(pool: &PgPool) -> Result<Vec<ConsumptionBand>> {
    let rows = sqlx::query_as::<_, ConsumptionBand>(
        r#"
        SELECT
            min_usage,
            max_usage,
            label
        FROM consumption_bands
        ORDER BY min_usage, band_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
