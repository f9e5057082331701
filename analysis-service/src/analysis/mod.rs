//! Monthly usage and anomaly analysis.
//!
//! Everything here is synchronous and side-effect free. Prior stands come in
//! through [`StandLookup`], normally a [`StandIndex`] prefetched for the whole
//! report, so the kernel itself never touches the database.
//!
//! Missing data is never an error: no prior reading resolves to a stand of 0,
//! missing coordinates to no distance, and an unmatched consumption to `"-"`.

mod stand_index;

pub use stand_index::StandIndex;

use serde::Serialize;
use sicater_client::domain::{ConsumptionBand, CustomerLocation, MeterReading, OcrStatus, Period};

pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;
pub const DEFAULT_GPS_THRESHOLD_METERS: f64 = 100.0;
pub const DEFAULT_STUCK_ZERO_MONTHS: u32 = 1;

/// Status given to a negative consumption, regardless of the band table.
pub const METER_REGRESSION_LABEL: &str = "Meter Mundur";
/// Status given when no band covers the consumption.
pub const UNCLASSIFIED_LABEL: &str = "-";

/// Read access to final stands by customer and period.
pub trait StandLookup {
    fn final_stand(&self, customer_id: i64, period: Period) -> Option<i64>;
}

/// Tunables for [`analyze`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisParams {
    pub gps_threshold_meters: f64,
    /// Number of consecutive earlier zero-usage months required to flag a
    /// zero-usage reading as stuck. Values below 1 are treated as 1.
    pub stuck_zero_months: u32,
    /// Treat a `0.0` latitude or longitude as "not captured".
    pub treat_zero_coordinates_as_missing: bool,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            gps_threshold_meters: DEFAULT_GPS_THRESHOLD_METERS,
            stuck_zero_months: DEFAULT_STUCK_ZERO_MONTHS,
            treat_zero_coordinates_as_missing: true,
        }
    }
}

impl AnalysisParams {
    /// How many periods before the analysed one must be available in the
    /// stand index for a complete analysis.
    pub fn lookback_periods(&self) -> usize {
        self.stuck_zero_months.max(1) as usize + 1
    }

    fn coordinate(&self, value: Option<f64>) -> Option<f64> {
        match value {
            Some(v) if self.treat_zero_coordinates_as_missing && v == 0.0 => None,
            other => other,
        }
    }
}

/// Derived figures for one reading. Not persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageAnalysis {
    pub prior_stand: i64,
    pub consumption: i64,
    pub consumption_status: String,
    pub distance_meters: Option<f64>,
    pub is_gps_anomaly: bool,
    pub is_stuck: bool,
    pub is_ocr_anomaly: bool,
    pub needs_review: bool,
}

impl UsageAnalysis {
    pub fn is_meter_regression(&self) -> bool {
        self.consumption < 0
    }

    /// Any condition a reviewer should look at.
    pub fn has_anomaly(&self) -> bool {
        self.is_gps_anomaly || self.is_ocr_anomaly || self.is_meter_regression() || self.is_stuck
    }
}

/// Final stand of the calendar-previous period, or 0 when there is none.
pub fn resolve_prior_stand<L>(stands: &L, customer_id: i64, period: Period) -> i64
where
    L: StandLookup + ?Sized,
{
    stands
        .final_stand(customer_id, period.previous())
        .unwrap_or(0)
}

/// Usage between two stands.
///
/// A final stand of 0 marks a meter that has not been read yet, so the
/// consumption is 0 rather than a large negative number. Otherwise the raw
/// difference is returned, negative when the register went backwards.
pub fn compute_consumption(final_stand: i64, prior_stand: i64) -> i64 {
    if final_stand == 0 {
        0
    } else {
        final_stand - prior_stand
    }
}

/// Label a consumption using the band table.
///
/// Bands are considered in ascending `min` order and the first one containing
/// the value wins, so the result does not depend on the order the table was
/// loaded in. Equal `min` values keep their table order.
pub fn classify_consumption(consumption: i64, bands: &[ConsumptionBand]) -> &str {
    if consumption < 0 {
        return METER_REGRESSION_LABEL;
    }

    bands
        .iter()
        .filter(|band| band.contains(consumption))
        .min_by_key(|band| band.min)
        .map(|band| band.label.as_str())
        .unwrap_or(UNCLASSIFIED_LABEL)
}

/// Great-circle distance in meters between two points given in degrees.
///
/// Returns `None` when any coordinate is missing.
///
/// `a` is capped at 1 before `√(1−a)`. Near-antipodal points can round it
/// just above 1, where the plain formula yields NaN; here they get half the
/// Earth's circumference instead. Every other input follows the formula exactly.
pub fn haversine_distance(
    lat1: Option<f64>,
    lon1: Option<f64>,
    lat2: Option<f64>,
    lon2: Option<f64>,
) -> Option<f64> {
    let (lat1, lon1, lat2, lon2) = (lat1?, lon1?, lat2?, lon2?);

    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let sin_lat = (d_lat / 2.0).sin();
    let sin_lon = (d_lon / 2.0).sin();
    let a = (sin_lat * sin_lat
        + lat1.to_radians().cos() * lat2.to_radians().cos() * sin_lon * sin_lon)
        .min(1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    Some(EARTH_RADIUS_METERS * c)
}

/// Strictly farther than `threshold_meters`. Unknown distance is never an anomaly.
pub fn detect_gps_anomaly(distance: Option<f64>, threshold_meters: f64) -> bool {
    matches!(distance, Some(d) if d > threshold_meters)
}

/// Whether the previous period also had zero usage.
///
/// Both earlier stands must be known. Only meaningful for a reading whose own
/// consumption is already zero.
pub fn detect_stuck_meter(two_months_prior_stand: Option<i64>, one_month_prior_stand: Option<i64>) -> bool {
    match (two_months_prior_stand, one_month_prior_stand) {
        (Some(two), Some(one)) => one - two == 0,
        _ => false,
    }
}

/// [`detect_stuck_meter`] applied to each of the `months` periods before `period`.
fn detect_stuck_streak<L>(stands: &L, customer_id: i64, period: Period, months: u32) -> bool
where
    L: StandLookup + ?Sized,
{
    let mut later = period.previous();
    for _ in 0..months.max(1) {
        let earlier = later.previous();
        if !detect_stuck_meter(
            stands.final_stand(customer_id, earlier),
            stands.final_stand(customer_id, later),
        ) {
            return false;
        }
        later = earlier;
    }
    true
}

/// Run the full analysis for one reading.
///
/// `period` is the reading's validated period.
pub fn analyze<L>(
    reading: &MeterReading,
    period: Period,
    location: &CustomerLocation,
    bands: &[ConsumptionBand],
    stands: &L,
    params: &AnalysisParams,
) -> UsageAnalysis
where
    L: StandLookup + ?Sized,
{
    let prior_stand = resolve_prior_stand(stands, reading.customer_id, period);
    let consumption = compute_consumption(reading.final_stand, prior_stand);
    let consumption_status = classify_consumption(consumption, bands).to_string();

    let distance_meters = haversine_distance(
        params.coordinate(reading.capture_latitude),
        params.coordinate(reading.capture_longitude),
        params.coordinate(location.master_latitude),
        params.coordinate(location.master_longitude),
    );
    let is_gps_anomaly = detect_gps_anomaly(distance_meters, params.gps_threshold_meters);

    let is_stuck = consumption == 0
        && detect_stuck_streak(stands, reading.customer_id, period, params.stuck_zero_months);

    let is_ocr_anomaly = reading.photo_ocr_status == OcrStatus::Red;
    let needs_review = matches!(reading.photo_ocr_status, OcrStatus::Yellow | OcrStatus::Red)
        && reading.verified_at.is_none();

    UsageAnalysis {
        prior_stand,
        consumption,
        consumption_status,
        distance_meters,
        is_gps_anomaly,
        is_stuck,
        is_ocr_anomaly,
        needs_review,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn period(month: i32, year: i32) -> Period {
        Period::new(month, year).unwrap()
    }

    fn reading(customer_id: i64, month: i32, year: i32, final_stand: i64) -> MeterReading {
        MeterReading {
            customer_id,
            month,
            year,
            final_stand,
            photo_ocr_status: OcrStatus::None,
            capture_latitude: None,
            capture_longitude: None,
            verified_at: None,
        }
    }

    fn bands() -> Vec<ConsumptionBand> {
        vec![
            ConsumptionBand::new(0, 0, "Nol"),
            ConsumptionBand::new(1, 20, "Normal"),
            ConsumptionBand::new(21, 50, "Tinggi"),
        ]
    }

    #[test]
    fn prior_stand_comes_from_previous_month() {
        let mut stands = StandIndex::default();
        stands.insert(7, period(2, 2024), 100);

        assert_eq!(resolve_prior_stand(&stands, 7, period(3, 2024)), 100);
    }

    #[test]
    fn prior_stand_wraps_to_december_of_previous_year() {
        let mut stands = StandIndex::default();
        stands.insert(7, period(12, 2023), 880);

        assert_eq!(resolve_prior_stand(&stands, 7, period(1, 2024)), 880);
    }

    #[test]
    fn prior_stand_defaults_to_zero() {
        let stands = StandIndex::default();
        assert_eq!(resolve_prior_stand(&stands, 7, period(3, 2024)), 0);
    }

    #[test]
    fn zero_final_stand_means_zero_consumption() {
        assert_eq!(compute_consumption(0, 500), 0);
        assert_eq!(compute_consumption(120, 100), 20);
        assert_eq!(compute_consumption(90, 100), -10);
    }

    #[test]
    fn negative_consumption_is_meter_regression() {
        assert_eq!(classify_consumption(-1, &bands()), METER_REGRESSION_LABEL);
        assert_eq!(classify_consumption(-1, &[]), METER_REGRESSION_LABEL);
    }

    #[test]
    fn classification_uses_inclusive_bounds() {
        let bands = bands();
        assert_eq!(classify_consumption(0, &bands), "Nol");
        assert_eq!(classify_consumption(20, &bands), "Normal");
        assert_eq!(classify_consumption(21, &bands), "Tinggi");
    }

    #[test]
    fn classification_gap_yields_dash() {
        assert_eq!(classify_consumption(51, &bands()), UNCLASSIFIED_LABEL);
    }

    #[test]
    fn overlapping_bands_resolve_to_lowest_min() {
        let bands = vec![
            ConsumptionBand::new(10, 100, "Wide"),
            ConsumptionBand::new(0, 30, "Narrow"),
        ];
        assert_eq!(classify_consumption(15, &bands), "Narrow");
        assert_eq!(classify_consumption(40, &bands), "Wide");
    }

    #[test]
    fn haversine_missing_coordinate_is_none() {
        assert_eq!(haversine_distance(None, Some(108.3), Some(-6.3), Some(108.3)), None);
        assert_eq!(haversine_distance(Some(-6.3), Some(108.3), Some(-6.3), None), None);
    }

    #[test]
    fn haversine_identical_points_is_zero() {
        let d = haversine_distance(Some(-6.34), Some(108.315), Some(-6.34), Some(108.315)).unwrap();
        assert!(d.abs() < 1e-9);
    }

    #[test]
    fn haversine_matches_reference_value() {
        let d = haversine_distance(Some(-6.35), Some(108.325), Some(-6.34), Some(108.315)).unwrap();
        assert!((d - 1567.72).abs() < 0.01, "distance was {d}");
    }

    #[test]
    fn haversine_antipodal_points_are_half_circumference() {
        let half = std::f64::consts::PI * EARTH_RADIUS_METERS;
        for (lat, lon) in [(0.0, 0.0), (-6.34, 108.315), (45.0, -120.0), (89.9, 10.0)] {
            let d = haversine_distance(Some(lat), Some(lon), Some(-lat), Some(lon - 180.0)).unwrap();
            assert!(d.is_finite());
            assert!((d - half).abs() < 1.0, "distance was {d}");
        }
    }

    #[test]
    fn gps_threshold_is_strict() {
        assert!(detect_gps_anomaly(Some(150.0), 100.0));
        assert!(!detect_gps_anomaly(Some(100.0), 100.0));
        assert!(!detect_gps_anomaly(None, 100.0));
    }

    #[test]
    fn stuck_meter_needs_both_prior_stands() {
        assert!(detect_stuck_meter(Some(40), Some(40)));
        assert!(!detect_stuck_meter(Some(40), Some(45)));
        assert!(!detect_stuck_meter(None, Some(40)));
        assert!(!detect_stuck_meter(Some(40), None));
    }

    #[test]
    fn analyze_march_against_february() {
        let mut stands = StandIndex::default();
        stands.insert(1, period(2, 2024), 100);
        let bands = vec![ConsumptionBand::new(0, 20, "Normal")];

        let out = analyze(
            &reading(1, 3, 2024, 120),
            period(3, 2024),
            &CustomerLocation::default(),
            &bands,
            &stands,
            &AnalysisParams::default(),
        );

        assert_eq!(out.prior_stand, 100);
        assert_eq!(out.consumption, 20);
        assert_eq!(out.consumption_status, "Normal");
        assert_eq!(out.distance_meters, None);
        assert!(!out.is_gps_anomaly);
        assert!(!out.is_stuck);
    }

    #[test]
    fn analyze_without_prior_reading() {
        let out = analyze(
            &reading(1, 3, 2024, 50),
            period(3, 2024),
            &CustomerLocation::default(),
            &bands(),
            &StandIndex::default(),
            &AnalysisParams::default(),
        );

        assert_eq!(out.prior_stand, 0);
        assert_eq!(out.consumption, 50);
        assert_eq!(out.consumption_status, "Tinggi");
    }

    #[test]
    fn analyze_flags_far_capture_location() {
        let mut r = reading(1, 3, 2024, 10);
        r.capture_latitude = Some(-6.3500);
        r.capture_longitude = Some(108.3250);
        let location = CustomerLocation {
            master_latitude: Some(-6.3400),
            master_longitude: Some(108.3150),
        };

        let out = analyze(
            &r,
            period(3, 2024),
            &location,
            &bands(),
            &StandIndex::default(),
            &AnalysisParams::default(),
        );

        let distance = out.distance_meters.unwrap();
        assert!(distance > 1500.0 && distance < 1600.0);
        assert!(out.is_gps_anomaly);
    }

    #[test]
    fn analyze_treats_zero_coordinates_as_missing_by_default() {
        let mut r = reading(1, 3, 2024, 10);
        r.capture_latitude = Some(0.0);
        r.capture_longitude = Some(108.3250);
        let location = CustomerLocation {
            master_latitude: Some(-6.34),
            master_longitude: Some(108.315),
        };

        let legacy = analyze(
            &r,
            period(3, 2024),
            &location,
            &bands(),
            &StandIndex::default(),
            &AnalysisParams::default(),
        );
        assert_eq!(legacy.distance_meters, None);
        assert!(!legacy.is_gps_anomaly);

        let strict = AnalysisParams {
            treat_zero_coordinates_as_missing: false,
            ..AnalysisParams::default()
        };
        let out = analyze(&r, period(3, 2024), &location, &bands(), &StandIndex::default(), &strict);
        assert!(out.distance_meters.is_some());
        assert!(out.is_gps_anomaly);
    }

    #[test]
    fn analyze_flags_stuck_meter_after_two_zero_months() {
        let mut stands = StandIndex::default();
        stands.insert(1, period(1, 2024), 300);
        stands.insert(1, period(2, 2024), 300);

        let out = analyze(
            &reading(1, 3, 2024, 300),
            period(3, 2024),
            &CustomerLocation::default(),
            &bands(),
            &stands,
            &AnalysisParams::default(),
        );

        assert_eq!(out.consumption, 0);
        assert!(out.is_stuck);
    }

    #[test]
    fn analyze_is_not_stuck_without_earlier_data() {
        let mut stands = StandIndex::default();
        stands.insert(1, period(2, 2024), 300);

        let out = analyze(
            &reading(1, 3, 2024, 300),
            period(3, 2024),
            &CustomerLocation::default(),
            &bands(),
            &stands,
            &AnalysisParams::default(),
        );

        assert_eq!(out.consumption, 0);
        assert!(!out.is_stuck);
    }

    #[test]
    fn longer_stuck_streak_requires_every_month_flat() {
        let mut stands = StandIndex::default();
        stands.insert(1, period(12, 2023), 290);
        stands.insert(1, period(1, 2024), 300);
        stands.insert(1, period(2, 2024), 300);

        let params = AnalysisParams {
            stuck_zero_months: 2,
            ..AnalysisParams::default()
        };
        let out = analyze(
            &reading(1, 3, 2024, 300),
            period(3, 2024),
            &CustomerLocation::default(),
            &bands(),
            &stands,
            &params,
        );
        assert!(!out.is_stuck);

        stands.insert(1, period(12, 2023), 300);
        let out = analyze(
            &reading(1, 3, 2024, 300),
            period(3, 2024),
            &CustomerLocation::default(),
            &bands(),
            &stands,
            &params,
        );
        assert!(out.is_stuck);
        assert_eq!(params.lookback_periods(), 3);
    }

    #[test]
    fn ocr_flags_follow_status_and_verification() {
        let mut r = reading(1, 3, 2024, 10);
        r.photo_ocr_status = OcrStatus::Yellow;
        let out = analyze(
            &r,
            period(3, 2024),
            &CustomerLocation::default(),
            &bands(),
            &StandIndex::default(),
            &AnalysisParams::default(),
        );
        assert!(!out.is_ocr_anomaly);
        assert!(out.needs_review);

        r.photo_ocr_status = OcrStatus::Red;
        r.verified_at = Some(datetime!(2024-03-20 09:00:00 UTC));
        let out = analyze(
            &r,
            period(3, 2024),
            &CustomerLocation::default(),
            &bands(),
            &StandIndex::default(),
            &AnalysisParams::default(),
        );
        assert!(out.is_ocr_anomaly);
        assert!(!out.needs_review);
        assert!(out.has_anomaly());
    }
}
