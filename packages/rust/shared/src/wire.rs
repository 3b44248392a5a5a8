//! Serde helpers for the remote service's JSON conventions.
//!
//! The service sends UTC timestamps with microsecond precision and is loose
//! about numbers: the same field may arrive as `4.5`, `"4.500"` or `null`.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};

/// Wire format for timestamps (`2024-01-10T00:00:00.000000Z`).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Format a UTC timestamp the way the remote service does.
pub fn format_timestamp(t: &DateTime<Utc>) -> String {
    t.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse an RFC 3339 timestamp, or a naive `YYYY-MM-DD HH:MM:SS` taken as UTC.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .map(|n| n.and_utc())
        .map_err(|e| format!("invalid timestamp '{s}': {e}"))
}

/// `#[serde(with = "wire::timestamp")]` for `Option<DateTime<Utc>>` fields.
pub mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(t) => serializer.serialize_str(&super::format_timestamp(t)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(s) if s.trim().is_empty() => Ok(None),
            Some(s) => super::parse_timestamp(s.trim())
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Flag(bool),
    Number(f64),
    Text(String),
}

/// Deserialize a number that may arrive as a numeric string.
pub fn number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(opt_number(deserializer)?.unwrap_or(0.0))
}

/// Deserialize an optional number that may arrive as a numeric string or `null`.
pub fn opt_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    match Option::<Loose>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Loose::Number(n)) => Ok(Some(n)),
        Some(Loose::Flag(b)) => Ok(Some(if b { 1.0 } else { 0.0 })),
        Some(Loose::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(Loose::Text(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("not a number: '{s}'"))),
    }
}

/// Deserialize an optional record id that may arrive as a number or a string.
pub fn opt_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    match opt_number(deserializer)? {
        Some(n) if n >= 0.0 && n.fract() == 0.0 => Ok(Some(n as u64)),
        Some(n) => Err(serde::de::Error::custom(format!("not a record id: {n}"))),
        None => Ok(None),
    }
}

/// Deserialize an enumeration id that may arrive as a number or a numeric string.
pub fn enum_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u16, D::Error> {
    match opt_number(deserializer)? {
        Some(n) if n >= 0.0 && n.fract() == 0.0 && n <= f64::from(u16::MAX) => Ok(n as u16),
        Some(n) => Err(serde::de::Error::custom(format!("not an enumeration id: {n}"))),
        None => Err(serde::de::Error::custom("missing enumeration id")),
    }
}

/// Deserialize an optional flag that may arrive as `true`, `1` or `"1"`.
pub fn opt_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
    match Option::<Loose>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Loose::Flag(b)) => Ok(Some(b)),
        Some(Loose::Number(n)) => Ok(Some(n != 0.0)),
        Some(Loose::Text(s)) => Ok(Some(matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamp_format_has_microseconds() {
        let t = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        assert_eq!(format_timestamp(&t), "2024-01-10T00:00:00.000000Z");
    }

    #[test]
    fn timestamp_parsing_variants() {
        let a = parse_timestamp("2024-01-10T00:00:00.000000Z").unwrap();
        let b = parse_timestamp("2024-01-10 00:00:00").unwrap();
        let c = parse_timestamp("2024-01-10T01:00:00+01:00").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[derive(Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "opt_number")]
        value: Option<f64>,
        #[serde(default, deserialize_with = "opt_flag")]
        flag: Option<bool>,
    }

    #[test]
    fn loose_numbers_and_flags() {
        let p: Probe = serde_json::from_str(r#"{"value": "4.500", "flag": 1}"#).unwrap();
        assert_eq!(p.value, Some(4.5));
        assert_eq!(p.flag, Some(true));

        let p: Probe = serde_json::from_str(r#"{"value": null}"#).unwrap();
        assert_eq!(p.value, None);
        assert_eq!(p.flag, None);

        assert!(serde_json::from_str::<Probe>(r#"{"value": "abc"}"#).is_err());
    }
}
