//! UTC time discipline for persisted records.
//!
//! Everything on disk is UTC with millisecond precision, serialized as
//! `YYYY-MM-DDTHH:MM:SS.sssZ`. Externally supplied timestamps are parsed
//! against a small set of ISO-8601 variants; anything unparseable falls back
//! to the current instant.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

/// Truncates a timestamp to whole milliseconds.
pub fn to_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ts.timestamp_millis()).unwrap_or(ts)
}

/// Current UTC instant at millisecond precision.
pub fn now_millis() -> DateTime<Utc> {
    to_millis(Utc::now())
}

/// Formats a timestamp in the persisted wire format.
pub fn format_millis(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses an externally supplied timestamp, trying RFC 3339 first, then the
/// tolerated naive variants (assumed UTC). Returns `None` when nothing fits.
pub fn parse_flexible(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(to_millis(ts.with_timezone(&Utc)));
    }

    const NAIVE_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ];
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(to_millis(naive.and_utc()));
        }
    }

    None
}

/// Parses an optional payload timestamp, falling back to the current UTC
/// instant when the field is absent or unparseable.
pub fn parse_or_now(value: Option<&str>) -> DateTime<Utc> {
    value
        .filter(|v| !v.is_empty())
        .and_then(parse_flexible)
        .unwrap_or_else(now_millis)
}

/// Serde adapter persisting `DateTime<Utc>` in the wire format.
pub mod serde_millis {
    use chrono::{DateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_millis(*ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let value = String::deserialize(deserializer)?;
        super::parse_flexible(&value)
            .ok_or_else(|| de::Error::custom(format!("unrecognized timestamp: {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_has_fixed_millisecond_precision() {
        let ts = Utc.with_ymd_and_hms(2025, 9, 3, 12, 0, 1).unwrap();
        assert_eq!(format_millis(ts), "2025-09-03T12:00:01.000Z");
    }

    #[test]
    fn test_parse_rfc3339_with_millis() {
        let ts = parse_flexible("2025-09-03T12:00:01.500Z").unwrap();
        assert_eq!(format_millis(ts), "2025-09-03T12:00:01.500Z");
    }

    #[test]
    fn test_parse_rfc3339_with_offset_normalizes_to_utc() {
        let ts = parse_flexible("2025-09-03T14:00:00+02:00").unwrap();
        assert_eq!(format_millis(ts), "2025-09-03T12:00:00.000Z");
    }

    #[test]
    fn test_parse_naive_variants_assume_utc() {
        for value in ["2025-09-03T12:00:01", "2025-09-03 12:00:01"] {
            let ts = parse_flexible(value).unwrap();
            assert_eq!(format_millis(ts), "2025-09-03T12:00:01.000Z");
        }
    }

    #[test]
    fn test_parse_truncates_sub_millisecond_digits() {
        let ts = parse_flexible("2025-09-03T12:00:01.123456Z").unwrap();
        assert_eq!(format_millis(ts), "2025-09-03T12:00:01.123Z");
    }

    #[test]
    fn test_garbage_falls_back_to_now() {
        let before = now_millis();
        let ts = parse_or_now(Some("not a timestamp"));
        assert!(ts >= before);
    }

    #[test]
    fn test_round_trip_through_serde_adapter() {
        #[derive(serde::Serialize, serde::Deserialize)]
        struct Stamp {
            #[serde(with = "super::serde_millis")]
            at: chrono::DateTime<Utc>,
        }

        let original = Stamp { at: now_millis() };
        let json = serde_json::to_string(&original).unwrap();
        let decoded: Stamp = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.at, original.at);
    }
}
