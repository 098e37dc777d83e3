// Almanac sunrise/sunset algorithm
//
// Classic "Almanac for Computers" method: day of year -> mean anomaly ->
// true longitude -> right ascension/declination -> local hour angle.
// Accurate to about a minute between the polar circles.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};

use super::SolarEventKind;

fn to_rad(deg: f64) -> f64 {
    deg * std::f64::consts::PI / 180.0
}

fn to_deg(rad: f64) -> f64 {
    rad * 180.0 / std::f64::consts::PI
}

/// Wrap `value` into [0, max).
fn force_range(value: f64, max: f64) -> f64 {
    value.rem_euclid(max)
}

fn day_of_year(date: NaiveDate) -> f64 {
    let (y, m, d) = (date.year() as f64, date.month() as f64, date.day() as f64);
    let n1 = (275.0 * m / 9.0).floor();
    let n2 = ((m + 9.0) / 12.0).floor();
    let n3 = 1.0 + ((y - 4.0 * (y / 4.0).floor() + 2.0) / 3.0).floor();
    n1 - (n2 * n3) + d - 30.0
}

/// UTC hour (0..24, fractional) of the event on `date`, or None when the
/// sun stays above (or below) the horizon all day.
pub fn event_utc_hours(
    date: NaiveDate,
    latitude: f64,
    longitude: f64,
    kind: SolarEventKind,
    zenith: f64,
) -> Option<f64> {
    let n = day_of_year(date);
    let lng_hour = longitude / 15.0;
    let rising = kind == SolarEventKind::Sunrise;

    let t = if rising {
        n + ((6.0 - lng_hour) / 24.0)
    } else {
        n + ((18.0 - lng_hour) / 24.0)
    };

    // Sun's mean anomaly and true longitude
    let m = (0.9856 * t) - 3.289;
    let l = force_range(
        m + (1.916 * to_rad(m).sin()) + (0.020 * to_rad(2.0 * m).sin()) + 282.634,
        360.0,
    );

    // Right ascension, moved into the same quadrant as L, in hours
    let mut ra = force_range(to_deg((0.91764 * to_rad(l).tan()).atan()), 360.0);
    let l_quadrant = (l / 90.0).floor() * 90.0;
    let ra_quadrant = (ra / 90.0).floor() * 90.0;
    ra = (ra + (l_quadrant - ra_quadrant)) / 15.0;

    let sin_dec = 0.39782 * to_rad(l).sin();
    let cos_dec = sin_dec.asin().cos();

    let cos_h = (to_rad(zenith).cos() - (sin_dec * to_rad(latitude).sin()))
        / (cos_dec * to_rad(latitude).cos());
    if !(-1.0..=1.0).contains(&cos_h) {
        return None;
    }

    let h_deg = if rising {
        360.0 - to_deg(cos_h.acos())
    } else {
        to_deg(cos_h.acos())
    };
    let h = h_deg / 15.0;

    // Local mean time, then back to UTC
    let local_mean = h + ra - (0.06571 * t) - 6.622;
    Some(force_range(local_mean - lng_hour, 24.0))
}

/// Event instant on the UTC calendar day `date`.
///
/// The result always falls on `date` in UTC, which is why callers working in
/// another timezone must check the local calendar date.
pub fn event_time_utc(
    date: NaiveDate,
    latitude: f64,
    longitude: f64,
    kind: SolarEventKind,
    zenith: f64,
) -> Option<DateTime<Utc>> {
    let hours = event_utc_hours(date, latitude, longitude, kind, zenith)?;
    let midnight = date.and_hms_opt(0, 0, 0)?.and_utc();
    Some(midnight + Duration::seconds((hours * 3600.0).round() as i64))
}
