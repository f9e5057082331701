use std::collections::HashMap;

use sicater_client::{db::StandRow, domain::Period};

use super::StandLookup;

/// Final stands keyed by customer and period, prefetched for a report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StandIndex {
    stands: HashMap<(i64, Period), i64>,
}

impl StandIndex {
    /// Build from query rows. Rows with an invalid month are skipped.
    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = StandRow>,
    {
        let mut index = Self::default();
        for row in rows {
            match Period::new(row.month, row.year) {
                Ok(period) => index.insert(row.customer_id, period, row.final_stand),
                Err(e) => {
                    tracing::warn!(customer_id = row.customer_id, error = %e, "skipping stand row");
                }
            }
        }
        index
    }

    pub fn insert(&mut self, customer_id: i64, period: Period, final_stand: i64) {
        self.stands.insert((customer_id, period), final_stand);
    }

    pub fn len(&self) -> usize {
        self.stands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stands.is_empty()
    }
}

impl StandLookup for StandIndex {
    fn final_stand(&self, customer_id: i64, period: Period) -> Option<i64> {
        self.stands.get(&(customer_id, period)).copied()
    }
}
