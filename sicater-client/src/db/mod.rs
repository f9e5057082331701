pub mod reading_queries;
pub mod reference_queries;

pub use reading_queries::{find_reading, list_by_period, prefetch_stands, ReadingFilter, StandRow};
pub use reference_queries::{find_customer, list_bands};
