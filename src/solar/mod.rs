// Solar window calculator
//
// Resolves today's sunrise/sunset in the configured timezone and turns it into
// a recording window using signed minute offsets. Pure: `now` is passed in.

pub mod almanac;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::config::Location;
use crate::constants::{SOLAR_DATE_SEARCH_CAP, SUN_ZENITH_OFFICIAL};
use crate::error::{Result, SunlapseError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolarEventKind {
    Sunrise,
    Sunset,
}

impl SolarEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SolarEventKind::Sunrise => "sunrise",
            SolarEventKind::Sunset => "sunset",
        }
    }
}

impl fmt::Display for SolarEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SolarEventKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sunrise" => Ok(SolarEventKind::Sunrise),
            "sunset" => Ok(SolarEventKind::Sunset),
            other => Err(format!("unknown solar event '{}', expected sunrise or sunset", other)),
        }
    }
}

/// A resolved solar event on a local calendar date.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolarEvent {
    pub kind: SolarEventKind,
    pub date: NaiveDate,
    pub time: DateTime<Tz>,
}

/// The [start, end) interval to record around a solar event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordingWindow {
    pub event: SolarEvent,
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
    pub duration_secs: u64,
}

impl RecordingWindow {
    /// Seconds from `now` until the window opens. Negative once it has opened.
    pub fn wait_seconds(&self, now: DateTime<Tz>) -> i64 {
        (self.start - now).num_seconds()
    }
}

/// Find the event whose local calendar date equals `date`.
///
/// The almanac answers in UTC days, so for zones far from UTC the instant it
/// returns can land on the neighbouring local day. Re-query the adjacent UTC
/// day until the local dates agree, giving up after a few attempts.
pub fn resolve_event(location: &Location, kind: SolarEventKind, date: NaiveDate) -> Result<SolarEvent> {
    let tz = location.timezone;
    let mut query = date;

    for _ in 0..SOLAR_DATE_SEARCH_CAP {
        let utc = almanac::event_time_utc(
            query,
            location.latitude,
            location.longitude,
            kind,
            SUN_ZENITH_OFFICIAL,
        )
        .ok_or_else(|| {
            SunlapseError::SolarCalculation(format!(
                "no {} at latitude {:.4} on {} (polar day or night)",
                kind, location.latitude, query
            ))
        })?;

        let local = utc.with_timezone(&tz);
        let local_date = local.date_naive();
        if local_date == date {
            return Ok(SolarEvent { kind, date, time: local });
        }

        log::debug!(
            "{} for {} lands on {} in {}, re-querying",
            kind, query, local_date, tz
        );
        query = if local_date < date {
            query + Duration::days(1)
        } else {
            query - Duration::days(1)
        };
    }

    Err(SunlapseError::SolarCalculation(format!(
        "could not place {} on {} in {} after {} attempts",
        kind, date, tz, SOLAR_DATE_SEARCH_CAP
    )))
}

/// Compute the recording window for today's event.
pub fn compute_window(
    location: &Location,
    kind: SolarEventKind,
    start_offset_min: i64,
    end_offset_min: i64,
    now: DateTime<Tz>,
) -> Result<RecordingWindow> {
    let today = now.with_timezone(&location.timezone).date_naive();
    let event = resolve_event(location, kind, today)?;
    window_around(event, start_offset_min, end_offset_min)
}

/// Apply offsets to an already-resolved event.
pub fn window_around(event: SolarEvent, start_offset_min: i64, end_offset_min: i64) -> Result<RecordingWindow> {
    let start = offset_from(&event, start_offset_min)?;
    let end = offset_from(&event, end_offset_min)?;
    let duration = (end - start).num_seconds();

    if duration <= 0 {
        return Err(SunlapseError::InvalidWindow(format!(
            "end offset {}min is not after start offset {}min",
            end_offset_min, start_offset_min
        )));
    }

    Ok(RecordingWindow {
        event,
        start,
        end,
        duration_secs: duration as u64,
    })
}

fn offset_from(event: &SolarEvent, offset_min: i64) -> Result<DateTime<Tz>> {
    Duration::try_minutes(offset_min)
        .and_then(|offset| event.time.checked_add_signed(offset))
        .ok_or_else(|| {
            SunlapseError::InvalidWindow(format!(
                "offset {}min from {} is out of range",
                offset_min, event.kind
            ))
        })
}
