mod consumption_band;
mod customer;
mod meter_reading;
mod period;

pub use consumption_band::ConsumptionBand;
pub use customer::{CustomerLocation, CustomerProfile};
pub use meter_reading::{MeterReading, OcrStatus, ReadingWithCustomer};
pub use period::Period;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("month must be within 1..=12, got {0}")]
    InvalidMonth(i32),
    #[error("year must be within 1..=9999, got {0}")]
    InvalidYear(i32),
    #[error("unknown OCR status '{0}'")]
    UnknownOcrStatus(String),
}
