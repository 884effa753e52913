//! Snapshot dates and the numeric `YYYYMMDD` date form.
//!
//! Every date the pipeline emits is an integer like `20210305`. Calendar
//! decomposition of epoch timestamps happens in one fixed reference offset
//! (UTC-6) so the output does not depend on the host's time zone.

use std::fmt;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveTime, Offset, Utc};

/// Reference offset west of UTC, seconds
const REFERENCE_OFFSET_WEST: i32 = 6 * 3600;

/// Value emitted for dates that are missing or unparseable
pub const UNSET_DATE: i64 = -1;

fn reference_offset() -> FixedOffset {
    FixedOffset::west_opt(REFERENCE_OFFSET_WEST).unwrap_or_else(|| Utc.fix())
}

fn numeric_date(date: impl Datelike) -> i64 {
    i64::from(date.year()) * 10_000 + i64::from(date.month()) * 100 + i64::from(date.day())
}

#[derive(Debug)]
pub struct SnapshotError(String);

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid snapshot date '{}': expected YYYY-MM-DD", self.0)
    }
}

impl std::error::Error for SnapshotError {}

/// The calendar day a run describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    date: NaiveDate,
}

impl Snapshot {
    /// Parse a `YYYY-MM-DD` run date.
    pub fn parse(s: &str) -> Result<Self, SnapshotError> {
        let s = s.trim();
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(|date| Self { date })
            .map_err(|_| SnapshotError(s.to_string()))
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Epoch seconds of midnight at the reference offset
    pub fn unixtime(&self) -> i64 {
        let local_midnight = self.date.and_time(NaiveTime::MIN).and_utc().timestamp();
        local_midnight - i64::from(reference_offset().local_minus_utc())
    }

    /// `YYYYMMDD` snapshot id
    pub fn id(&self) -> i64 {
        numeric_date(self.date)
    }

    /// Partition directory name, `snapshot=YYYYMMDD`
    pub fn dir_name(&self) -> String {
        format!("snapshot={}", self.id())
    }
}

/// Canonicalize a strict `DDDD-DD-DD` string to `YYYYMMDD`.
///
/// Only the shape is checked, so partial dates like `1962-00-00` pass through.
/// Non-matching input gives `-1`.
pub fn canonical_date(raw: &str) -> i64 {
    let bytes = raw.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return UNSET_DATE;
    }
    let mut value = 0i64;
    for (i, &b) in bytes.iter().enumerate() {
        if i == 4 || i == 7 {
            continue;
        }
        if !b.is_ascii_digit() {
            return UNSET_DATE;
        }
        value = value * 10 + i64::from(b - b'0');
    }
    value
}

/// Calendar date of an epoch timestamp at the reference offset.
///
/// Zero and negative timestamps mean "never set" in the source and yield `None`.
pub fn epoch_date(secs: i64) -> Option<i64> {
    if secs <= 0 {
        return None;
    }
    let utc = DateTime::from_timestamp(secs, 0)?;
    Some(numeric_date(utc.with_timezone(&reference_offset())))
}
