use std::fmt;

use super::DomainError;

/// A billing period: one calendar month of one year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Period {
    year: i32,
    month: u8,
}

impl Period {
    pub fn new(month: i32, year: i32) -> Result<Self, DomainError> {
        if !(1..=12).contains(&month) {
            return Err(DomainError::InvalidMonth(month));
        }
        // Keeps `previous` and `key` free of overflow.
        if !(1..=9999).contains(&year) {
            return Err(DomainError::InvalidYear(year));
        }
        Ok(Self {
            year,
            month: month as u8,
        })
    }

    pub fn month(&self) -> i32 {
        i32::from(self.month)
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    /// The calendar-previous period. January steps back to December of the prior year.
    pub fn previous(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// The `n` periods immediately before this one, most recent first.
    pub fn lookback(&self, n: usize) -> Vec<Period> {
        let mut out = Vec::with_capacity(n);
        let mut cur = *self;
        for _ in 0..n {
            cur = cur.previous();
            out.push(cur);
        }
        out
    }

    /// Sortable integer key (`yyyymm`) used for batched lookups.
    pub fn key(&self) -> i32 {
        self.year * 100 + i32::from(self.month)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}
