/// One row of the consumption classification table.
///
/// Bounds are inclusive on both ends.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConsumptionBand {
    #[sqlx(rename = "min_usage")]
    pub min: i64,
    #[sqlx(rename = "max_usage")]
    pub max: i64,
    pub label: String,
}

impl ConsumptionBand {
    pub fn new(min: i64, max: i64, label: impl Into<String>) -> Self {
        Self {
            min,
            max,
            label: label.into(),
        }
    }

    pub fn contains(&self, consumption: i64) -> bool {
        self.min <= consumption && consumption <= self.max
    }
}
