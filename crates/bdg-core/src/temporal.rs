//! # Temporal Types: UTC-Only Timestamps
//!
//! Defines `Timestamp`, a UTC timestamp truncated to seconds precision and
//! rendered as `YYYY-MM-DDTHH:MM:SSZ`.
//!
//! ## Security Invariant
//!
//! Proof `created` values and status timestamps are part of signed
//! documents. A local offset or sub-second component would give the same
//! instant several textual forms, so two canonicalizations of "the same"
//! document could differ. `Timestamp` has exactly one rendering per instant.
//!
//! [`Timestamp::parse()`] rejects non-`Z` inputs. Dates read from third-party
//! credentials (`expirationDate`, `validFrom`, ...) go through
//! [`Timestamp::parse_lenient()`], which accepts any RFC 3339 offset.

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BadgeError;

/// A UTC-only timestamp, truncated to seconds precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Current UTC time, truncated to seconds.
    pub fn now() -> Self {
        Self(truncate_to_seconds(Utc::now()))
    }

    /// From a `chrono::DateTime<Utc>`, truncating sub-seconds.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(truncate_to_seconds(dt))
    }

    /// Parse a strict `Z`-suffixed RFC 3339 timestamp.
    ///
    /// Explicit offsets, including `+00:00`, are rejected.
    ///
    /// # Errors
    ///
    /// `BadgeError::Validation` if the string is not RFC 3339 or does not
    /// end in `Z`.
    pub fn parse(s: &str) -> Result<Self, BadgeError> {
        if !s.ends_with('Z') {
            return Err(BadgeError::Validation(format!(
                "timestamp must use Z suffix (UTC only), got: {s:?}"
            )));
        }
        Self::parse_lenient(s)
    }

    /// Parse any RFC 3339 timestamp and convert it to UTC.
    pub fn parse_lenient(s: &str) -> Result<Self, BadgeError> {
        let dt = DateTime::parse_from_rfc3339(s).map_err(|e| {
            BadgeError::Validation(format!("invalid RFC 3339 timestamp {s:?}: {e}"))
        })?;
        Ok(Self(truncate_to_seconds(dt.with_timezone(&Utc))))
    }

    /// From a Unix epoch timestamp in seconds.
    pub fn from_epoch_secs(secs: i64) -> Result<Self, BadgeError> {
        let dt = DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| BadgeError::Validation(format!("invalid Unix timestamp: {secs}")))?;
        Ok(Self(dt))
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Unix epoch seconds.
    pub fn epoch_secs(&self) -> i64 {
        self.0.timestamp()
    }

    /// This timestamp shifted by `secs` seconds (negative moves backwards).
    pub fn plus_secs(&self, secs: i64) -> Self {
        Self(self.0 + Duration::seconds(secs))
    }

    /// Render as ISO 8601 with `Z` suffix, e.g. `2026-01-15T12:00:00Z`.
    pub fn to_iso8601(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::from_utc(dt)
    }
}

fn truncate_to_seconds(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_nanosecond(0).unwrap_or(dt)
}
