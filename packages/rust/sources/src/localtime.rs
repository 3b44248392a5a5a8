//! Local wall-clock timestamps as written by desktop brewing software.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};

const FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"];

/// Interpret `s` as local time of this machine and convert it to UTC.
///
/// Accepts `T`- or space-separated date-times and bare dates (midnight).
/// Returns `None` for empty or unparsable input.
pub fn local_to_utc(s: &str) -> Option<DateTime<Utc>> {
    let naive = parse_naive(s.trim())?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|t| t.with_timezone(&Utc))
}

fn parse_naive(s: &str) -> Option<NaiveDateTime> {
    if s.is_empty() {
        return None;
    }
    FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
