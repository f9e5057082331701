pub mod memory;
pub mod postgres;
pub mod reading_csv_file;

pub use memory::MemorySource;
pub use postgres::PgReadingLoader;
pub use reading_csv_file::ReadingCsvFile;

use std::sync::Arc;

use sicater_client::domain::{Period, ReadingWithCustomer};

use crate::analysis::StandIndex;

/// The readings of one period plus the earlier stands needed to analyse them.
#[derive(Debug, Clone)]
pub struct ReadingSet {
    pub period: Period,
    pub records: Vec<ReadingWithCustomer>,
    pub stands: StandIndex,
}

impl ReadingSet {
    pub fn into_parts(self) -> (MemorySource<ReadingWithCustomer>, Arc<StandIndex>) {
        (MemorySource::new(self.records), Arc::new(self.stands))
    }
}
