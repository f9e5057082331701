use std::{fmt, str::FromStr};

use time::OffsetDateTime;

use super::{CustomerProfile, DomainError, Period};

/// Outcome of comparing the meter photo against the submitted stand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum OcrStatus {
    #[default]
    None,
    /// Auto-confirmed match.
    Green,
    /// Needs manual review.
    Yellow,
    /// Mismatch.
    Red,
}

impl OcrStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Red => "red",
        }
    }
}

impl fmt::Display for OcrStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OcrStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Self::None),
            "green" => Ok(Self::Green),
            "yellow" => Ok(Self::Yellow),
            "red" => Ok(Self::Red),
            other => Err(DomainError::UnknownOcrStatus(other.to_string())),
        }
    }
}

impl TryFrom<String> for OcrStatus {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// One reading of one customer's meter in one month.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MeterReading {
    pub customer_id: i64,
    pub month: i32,
    pub year: i32,
    pub final_stand: i64,
    #[sqlx(try_from = "String")]
    pub photo_ocr_status: OcrStatus,
    pub capture_latitude: Option<f64>,
    pub capture_longitude: Option<f64>,
    pub verified_at: Option<OffsetDateTime>,
}

impl MeterReading {
    pub fn period(&self) -> Result<Period, DomainError> {
        Period::new(self.month, self.year)
    }
}

/// A reading joined with the customer it belongs to.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReadingWithCustomer {
    #[sqlx(flatten)]
    pub reading: MeterReading,
    #[sqlx(flatten)]
    pub customer: CustomerProfile,
}
