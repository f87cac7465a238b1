use regex::{Captures, Regex};
use std::fs;
use std::io;
use std::path::Path;
use std::sync::LazyLock;
use std::time::SystemTime;
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

use crate::photobinner_core::dates::{
    CandidateDate, CandidateSet, DateSource, format_for_log, is_invalid_year,
};
use crate::photobinner_core::destination::FileDescriptor;
use crate::photobinner_core::exif::MediaMetadata;

static FILENAME_STAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{4})(\d{2})(\d{2})([_-])(\d{2})(\d{2})(\d{2})").unwrap()
});
static PATH_DATE_UNDERSCORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})_(\d{2})_(\d{2})").unwrap());
static PATH_DATE_HYPHEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})-(\d{2})-(\d{2})").unwrap());

/// The subset of a stat call the resolver cares about.
#[derive(Debug, Clone, Copy)]
pub struct FileStat {
    pub modified: SystemTime,
    pub accessed: Option<SystemTime>,
    pub size_bytes: u64,
}

impl FileStat {
    pub fn read(path: &Path) -> io::Result<Self> {
        let metadata = fs::metadata(path)?;
        Ok(FileStat {
            modified: metadata.modified()?,
            accessed: metadata.accessed().ok(),
            size_bytes: metadata.len(),
        })
    }
}

/// Derives the stat, filename, path and metadata candidates for a file.
#[derive(Debug, Clone, Copy)]
pub struct CandidateExtractor {
    reference_offset: UtcOffset,
    assume_local: bool,
}

impl CandidateExtractor {
    /// `assume_local` controls how naive metadata timestamps are read: as wall
    /// clock in `reference_offset` (true) or as UTC converted into it (false).
    pub fn new(reference_offset: UtcOffset, assume_local: bool) -> Self {
        Self {
            reference_offset,
            assume_local,
        }
    }

    pub fn extract(
        &self,
        descriptor: &FileDescriptor,
        stat: &FileStat,
        metadata: &MediaMetadata,
    ) -> CandidateSet {
        let original = descriptor.original_path.as_path();
        let filename = original
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        let file_mtime = self.localize_system_time(stat.modified);

        let mut found = vec![CandidateDate::new(DateSource::Stat, file_mtime)];
        if let Some(value) = self.date_from_filename(&filename) {
            found.push(CandidateDate::new(DateSource::Filename, value));
        }
        if let Some(value) = original.parent().and_then(|p| self.date_from_path(p)) {
            found.push(CandidateDate::new(DateSource::Path, value));
        }
        if let Some(value) = metadata.capture_date.map(|d| self.localize_metadata(d)) {
            found.push(CandidateDate::new(DateSource::Metadata, value));
        }

        let candidates = found
            .into_iter()
            .filter(|c| {
                let keep = !is_invalid_year(&c.value);
                if !keep {
                    log::debug!(
                        " - dropping {} candidate {} (placeholder year)",
                        c.source,
                        format_for_log(&c.value)
                    );
                }
                keep
            })
            .collect();

        CandidateSet {
            path: descriptor.original_path.clone(),
            filename,
            file_mtime,
            candidates,
        }
    }

    /// mtime is an instant; it is shown in the reference offset, never read as a UTC wall clock.
    pub fn localize_system_time(&self, time: SystemTime) -> OffsetDateTime {
        OffsetDateTime::from(time).to_offset(self.reference_offset)
    }

    fn localize_metadata(&self, value: PrimitiveDateTime) -> OffsetDateTime {
        if self.assume_local {
            value.assume_offset(self.reference_offset)
        } else {
            value.assume_utc().to_offset(self.reference_offset)
        }
    }

    /// Parses a `YYYYMMDD_HHMMSS` or `YYYYMMDD-HHMMSS` stamp from a file name.
    pub fn date_from_filename(&self, filename: &str) -> Option<OffsetDateTime> {
        let Some(caps) = FILENAME_STAMP.captures(filename) else {
            log::debug!(" - no filename match for timestamp");
            return None;
        };
        log::debug!(" - filename timestamp: {}", &caps[0]);

        let date = calendar_date(&caps, 1)?;
        let time = Time::from_hms(number(&caps, 5)?, number(&caps, 6)?, number(&caps, 7)?).ok();
        match time {
            Some(time) => Some(PrimitiveDateTime::new(date, time).assume_offset(self.reference_offset)),
            None => {
                log::warn!(
                    " - timestamp {} extracted from filename but time is not valid",
                    &caps[0]
                );
                None
            }
        }
    }

    /// Earliest `YYYY_MM_DD` or `YYYY-MM-DD` date found in a directory path.
    pub fn date_from_path(&self, dir: &Path) -> Option<OffsetDateTime> {
        let dir = dir.to_string_lossy();
        let mut dates: Vec<Date> = PATH_DATE_UNDERSCORE
            .captures_iter(&dir)
            .chain(PATH_DATE_HYPHEN.captures_iter(&dir))
            .filter_map(|caps| calendar_date(&caps, 1))
            .collect();
        dates.sort();
        log::debug!(" - dates from path: {:?}", dates);

        dates
            .first()
            .map(|d| d.midnight().assume_offset(self.reference_offset))
    }
}

fn number<T: std::str::FromStr>(caps: &Captures, group: usize) -> Option<T> {
    caps.get(group)?.as_str().parse().ok()
}

/// Builds a date from three consecutive capture groups starting at `first`.
fn calendar_date(caps: &Captures, first: usize) -> Option<Date> {
    let year: i32 = number(caps, first)?;
    let month = Month::try_from(number::<u8>(caps, first + 1)?).ok()?;
    let day: u8 = number(caps, first + 2)?;
    Date::from_calendar_date(year, month, day).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use time::macros::{datetime, offset};

    fn extractor() -> CandidateExtractor {
        CandidateExtractor::new(offset!(-5), true)
    }

    fn descriptor(path: &str) -> FileDescriptor {
        FileDescriptor::new(PathBuf::from(path), 0)
    }

    fn stat_at(value: OffsetDateTime) -> FileStat {
        FileStat {
            modified: value.into(),
            accessed: None,
            size_bytes: 0,
        }
    }

    #[test]
    fn test_filename_underscore_and_hyphen() {
        let ex = extractor();
        assert_eq!(
            ex.date_from_filename("IMG_20190509_154733.jpg"),
            Some(datetime!(2019-05-09 15:47:33 -5))
        );
        assert_eq!(
            ex.date_from_filename("Screenshot_20190919-053857.png"),
            Some(datetime!(2019-09-19 5:38:57 -5))
        );
    }

    #[test]
    fn test_filename_without_stamp_or_invalid() {
        let ex = extractor();
        assert_eq!(ex.date_from_filename("DSC_0042.JPG"), None);
        assert_eq!(ex.date_from_filename("IMG_20191309_154733.jpg"), None);
        assert_eq!(ex.date_from_filename("IMG_20190509_256061.jpg"), None);
        assert_eq!(ex.date_from_filename("IMG_20190509.154733.jpg"), None);
    }

    #[test]
    fn test_path_takes_earliest_date() {
        let ex = extractor();
        let dir = Path::new("/pics/2019-06-01 beach/2018_12_24/xmas");
        assert_eq!(ex.date_from_path(dir), Some(datetime!(2018-12-24 0:00 -5)));
        assert_eq!(ex.date_from_path(Path::new("/pics/misc")), None);
        assert_eq!(ex.date_from_path(Path::new("/pics/2019-13-45")), None);
    }

    #[test]
    fn test_stat_is_localized_not_read_as_utc() {
        let ex = extractor();
        let utc = datetime!(2021-06-01 12:00 UTC);
        let local = ex.localize_system_time(utc.into());
        assert_eq!(local, utc);
        assert_eq!(local.hour(), 7);
        assert_eq!(local.offset(), offset!(-5));
    }

    #[test]
    fn test_extract_all_four() {
        let ex = extractor();
        let desc = descriptor("/pics/2020_05_01/IMG_20200501_101010.jpg");
        let metadata = MediaMetadata {
            capture_date: Some(datetime!(2020-05-01 10:10:09)),
            camera: None,
        };
        let set = ex.extract(&desc, &stat_at(datetime!(2020-05-02 08:00 -5)), &metadata);
        assert_eq!(set.filename, "IMG_20200501_101010.jpg");
        assert_eq!(set.candidates.len(), 4);
        assert_eq!(
            set.get(DateSource::Metadata).map(|c| c.value),
            Some(datetime!(2020-05-01 10:10:09 -5))
        );
        assert_eq!(
            set.get(DateSource::Path).map(|c| c.value),
            Some(datetime!(2020-05-01 0:00 -5))
        );
    }

    #[test]
    fn test_metadata_read_as_utc_when_not_local() {
        let ex = CandidateExtractor::new(offset!(-5), false);
        let metadata = MediaMetadata {
            capture_date: Some(datetime!(2020-05-01 10:00)),
            camera: None,
        };
        let set = ex.extract(
            &descriptor("/pics/a.jpg"),
            &stat_at(datetime!(2020-05-02 08:00 -5)),
            &metadata,
        );
        assert_eq!(
            set.get(DateSource::Metadata).map(|c| c.value),
            Some(datetime!(2020-05-01 5:00 -5))
        );
    }

    #[test]
    fn test_placeholder_years_are_dropped() {
        let ex = extractor();
        let metadata = MediaMetadata {
            capture_date: Some(datetime!(1980-01-01 0:00)),
            camera: None,
        };
        let set = ex.extract(
            &descriptor("/pics/a.jpg"),
            &stat_at(datetime!(1970-01-02 0:00 UTC)),
            &metadata,
        );
        assert!(set.candidates.is_empty());
        assert_eq!(set.file_mtime.year(), 1970);
    }
}
