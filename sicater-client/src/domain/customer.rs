/// Registered coordinates of a customer's meter.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CustomerLocation {
    pub master_latitude: Option<f64>,
    pub master_longitude: Option<f64>,
}

/// Customer master record, restricted to what reports display.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CustomerProfile {
    pub customer_id: i64,
    pub customer_number: String,
    pub name: String,
    pub address: Option<String>,
    pub tariff_code: Option<String>,
    pub branch_id: Option<i64>,
    pub officer_id: Option<i64>,
    pub zone: Option<String>,
    pub master_latitude: Option<f64>,
    pub master_longitude: Option<f64>,
}

impl CustomerProfile {
    pub fn location(&self) -> CustomerLocation {
        CustomerLocation {
            master_latitude: self.master_latitude,
            master_longitude: self.master_longitude,
        }
    }
}
