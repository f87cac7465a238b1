use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Duration, OffsetDateTime, UtcOffset};

use crate::photobinner_core::anomaly::AnomalyKind;

/// Years produced by zeroed clocks and epoch artifacts rather than real captures.
pub const INVALID_YEARS: &[i32] = &[1970, 1980];

/// Log-friendly timestamp format.
pub const LOG_DATE_FORMAT: &[FormatItem] = format_description!(
    "[year]-[month]-[day] [hour]:[minute]:[second] [offset_hour sign:mandatory][offset_minute]"
);

/// Minute-precision wall clock used for double-timezone comparison.
pub const MINUTE_FORMAT: &[FormatItem] =
    format_description!("[year]-[month]-[day] [hour]:[minute]");

/// Folder name for a day (YYYY-MM-DD).
pub const DAY_FORMAT: &[FormatItem] = format_description!("[year]-[month]-[day]");

/// Stamp used when regenerating filenames (YYYYMMDD_HHMMSS).
pub const FILENAME_STAMP_FORMAT: &[FormatItem] =
    format_description!("[year][month][day]_[hour][minute][second]");

/// Where a candidate date was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DateSource {
    Stat,
    Filename,
    Path,
    #[serde(rename = "exif")]
    Metadata,
}

impl DateSource {
    /// Order in which sources are considered; later entries can displace earlier winners.
    pub const PRIORITY: [DateSource; 4] = [
        DateSource::Stat,
        DateSource::Path,
        DateSource::Filename,
        DateSource::Metadata,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DateSource::Stat => "stat",
            DateSource::Filename => "filename",
            DateSource::Path => "path",
            DateSource::Metadata => "exif",
        }
    }
}

impl std::fmt::Display for DateSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One independent guess at a file's capture time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateDate {
    pub source: DateSource,
    pub value: OffsetDateTime,
}

impl CandidateDate {
    pub fn new(source: DateSource, value: OffsetDateTime) -> Self {
        Self { source, value }
    }

    /// True when the time of day is exactly midnight, i.e. only the date is known.
    pub fn is_day_only(&self) -> bool {
        self.value.hour() == 0 && self.value.minute() == 0 && self.value.second() == 0
    }

    pub fn same_day(&self, other: &CandidateDate) -> bool {
        self.value.date() == other.value.date()
    }
}

/// Everything the resolver needs to know about one file.
#[derive(Debug, Clone)]
pub struct CandidateSet {
    /// Original path of the file, used for anomaly reporting.
    pub path: PathBuf,
    /// Original file name, used when a replacement name has to be generated.
    pub filename: String,
    /// Raw mtime in the reference offset, before any year filtering.
    pub file_mtime: OffsetDateTime,
    pub candidates: Vec<CandidateDate>,
}

impl CandidateSet {
    pub fn get(&self, source: DateSource) -> Option<&CandidateDate> {
        self.candidates.iter().find(|c| c.source == source)
    }
}

/// The single date chosen for a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDate {
    pub value: OffsetDateTime,
    pub source: DateSource,
    pub anomalies: BTreeSet<AnomalyKind>,
    /// How far the file mtime must move to match `value`, if at all.
    pub mtime_adjustment: Option<Duration>,
    /// Replacement filename when the embedded filename date is wrong.
    pub renamed_filename: Option<String>,
}

impl ResolvedDate {
    pub fn has(&self, kind: AnomalyKind) -> bool {
        self.anomalies.contains(&kind)
    }
}

pub fn is_invalid_year(value: &OffsetDateTime) -> bool {
    INVALID_YEARS.contains(&value.year())
}

pub fn format_for_log(value: &OffsetDateTime) -> String {
    value
        .format(LOG_DATE_FORMAT)
        .unwrap_or_else(|_| value.to_string())
}

/// Local offset of this machine, falling back to UTC if it cannot be determined.
pub fn get_local_offset() -> UtcOffset {
    OffsetDateTime::now_local()
        .map(|dt| dt.offset())
        .unwrap_or(UtcOffset::UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_day_only() {
        let midnight = CandidateDate::new(DateSource::Path, datetime!(2020-05-01 0:00 +2));
        let afternoon = CandidateDate::new(DateSource::Metadata, datetime!(2020-05-01 14:22:10 +2));
        assert!(midnight.is_day_only());
        assert!(!afternoon.is_day_only());
        assert!(midnight.same_day(&afternoon));
    }

    #[test]
    fn test_invalid_years() {
        assert!(is_invalid_year(&datetime!(1970-01-01 0:00 UTC)));
        assert!(is_invalid_year(&datetime!(1980-01-01 12:00 UTC)));
        assert!(!is_invalid_year(&datetime!(2019-07-14 12:00 UTC)));
    }

    #[test]
    fn test_format_for_log() {
        let value = datetime!(2021-06-01 12:00:05 -4);
        assert_eq!(format_for_log(&value), "2021-06-01 12:00:05 -0400");
    }
}
