//! Timestamp parsing for the store file.
//!
//! New records are written as RFC 3339 UTC strings. Files produced by the
//! older scripts carry naive ISO timestamps (no offset) in local time, so
//! reading accepts both.

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};

const NAIVE_ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Parse an RFC 3339 timestamp, falling back to a naive local one.
pub fn parse_lenient(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(value, NAIVE_ISO_FORMAT).ok()?;
    naive
        .and_local_timezone(Local)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

/// `deserialize_with` helper for required timestamps.
pub mod lenient {
    use super::*;
    use serde::de::Error as _;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_lenient(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp: {raw}")))
    }
}

/// `deserialize_with` helper for nullable timestamps.
pub mod lenient_option {
    use super::*;
    use serde::de::Error as _;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) => parse_lenient(&raw)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid timestamp: {raw}"))),
            None => Ok(None),
        }
    }
}
