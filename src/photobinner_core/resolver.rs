//! Reduces a file's candidate dates to one resolved date.
//!
//! Every source has been seen to be wrong in the wild: metadata newer than the
//! file on restored iPhone backups, filenames stamped by the wrong clock, mtimes
//! shifted by the local offset twice. The resolver corrects what it can
//! recognize, then applies a fixed priority order.

use std::collections::BTreeSet;
use std::path::Path;
use time::{Duration, OffsetDateTime, UtcOffset};

use crate::photobinner_core::anomaly::{AnomalyKind, AnomalySink};
use crate::photobinner_core::dates::{
    CandidateDate, CandidateSet, DAY_FORMAT, DateSource, FILENAME_STAMP_FORMAT, MINUTE_FORMAT,
    ResolvedDate, format_for_log, is_invalid_year,
};
use crate::photobinner_core::error::{PhotobinnerError, Result};

/// Slack allowed between metadata and inode timestamps.
const CLOCK_SLACK: Duration = Duration::SECOND;

#[derive(Debug, Default, Clone, Copy)]
pub struct DateResolver;

impl DateResolver {
    pub fn new() -> Self {
        DateResolver
    }

    pub fn resolve(&self, set: &CandidateSet, sink: &mut dyn AnomalySink) -> Result<ResolvedDate> {
        let path = set.path.as_path();
        let mut anomalies = BTreeSet::new();

        let mut candidates = set.candidates.clone();
        let metadata = set.get(DateSource::Metadata).copied();

        if let (Some(meta), Some(stat)) = (metadata, stat_mut(&mut candidates)) {
            if is_double_timezoned(&stat.value, &meta.value) {
                raise(&mut anomalies, sink, AnomalyKind::FileDateDoubleTimezoned, path);
                log::warn!(" - file date is double timezoned");
                let offset = stat.value.offset().whole_seconds();
                stat.value -= Duration::seconds(i64::from(offset));
            }
        }

        let stat = candidates
            .iter()
            .find(|c| c.source == DateSource::Stat)
            .copied();

        let candidates = suppress_day_only(candidates);
        log::debug!(" - {}", describe(&candidates));

        if let (Some(meta), Some(stat)) = (metadata, stat) {
            if meta.value - stat.value > CLOCK_SLACK {
                raise(&mut anomalies, sink, AnomalyKind::RecentMetadataDate, path);
                log::warn!(
                    " - exif ({}) is newer than stat ({}) - iPhone?",
                    format_for_log(&meta.value),
                    format_for_log(&stat.value)
                );
            }
        }

        let winner = select_winner(&candidates).ok_or_else(|| {
            log::debug!(" - no target date could be calculated");
            PhotobinnerError::NoValidDate(set.path.clone())
        })?;
        log::debug!(
            " - target date assigned using {}: {}",
            winner.source,
            format_for_log(&winner.value)
        );
        sink.record_date_source(winner.source, path);

        if is_invalid_year(&winner.value) {
            raise(&mut anomalies, sink, AnomalyKind::NoValidDate, path);
            log::warn!(
                " - target date almost surely invalid ({})",
                day_string(&winner.value)
            );
        }

        let mtime_adjustment = (winner.value != set.file_mtime).then(|| {
            log::debug!(
                " - file time incorrect: {} -> {}",
                format_for_log(&set.file_mtime),
                format_for_log(&winner.value)
            );
            winner.value - set.file_mtime
        });

        let mut renamed_filename = None;
        if let Some(from_name) = set.get(DateSource::Filename) {
            if (from_name.value - winner.value).abs() > CLOCK_SLACK {
                let replacement = regenerate_filename(&set.filename, &winner.value);
                raise(&mut anomalies, sink, AnomalyKind::FilenameDateIncorrect, path);
                log::warn!(
                    " - timestamp extracted from filename does not match calculated timestamp, {} -> {}",
                    set.filename,
                    replacement
                );
                renamed_filename = Some(replacement);
            }
        }

        if let Some(from_path) = set.get(DateSource::Path) {
            if from_path.value.date() != winner.value.date() {
                raise(&mut anomalies, sink, AnomalyKind::PathDateIncorrect, path);
                log::warn!(
                    " - date extracted from path {} does not match calculated date {}",
                    day_string(&from_path.value),
                    day_string(&winner.value)
                );
            }
        }

        Ok(ResolvedDate {
            value: winner.value,
            source: winner.source,
            anomalies,
            mtime_adjustment,
            renamed_filename,
        })
    }
}

/// Records an anomaly once per file and forwards it to the sink.
fn raise(
    anomalies: &mut BTreeSet<AnomalyKind>,
    sink: &mut dyn AnomalySink,
    kind: AnomalyKind,
    path: &Path,
) {
    if anomalies.insert(kind) {
        sink.emit(kind, path);
    }
}

fn stat_mut(candidates: &mut [CandidateDate]) -> Option<&mut CandidateDate> {
    candidates.iter_mut().find(|c| c.source == DateSource::Stat)
}

/// The mtime, read back as UTC, shows the same wall clock as the metadata.
fn is_double_timezoned(stat: &OffsetDateTime, metadata: &OffsetDateTime) -> bool {
    let stat_as_utc = stat.to_offset(UtcOffset::UTC);
    match (stat_as_utc.format(MINUTE_FORMAT), metadata.format(MINUTE_FORMAT)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Drops midnight-only candidates when another candidate on the same day carries a time.
fn suppress_day_only(candidates: Vec<CandidateDate>) -> Vec<CandidateDate> {
    let dropped: Vec<DateSource> = candidates
        .iter()
        .filter(|c| c.is_day_only())
        .filter_map(|c| {
            candidates
                .iter()
                .find(|o| o.source != c.source && c.same_day(o) && !o.is_day_only())
                .map(|o| {
                    log::debug!(
                        " - excluding {} source as it has no time information and {} matches the date",
                        c.source,
                        o.source
                    );
                    c.source
                })
        })
        .collect();

    candidates
        .into_iter()
        .filter(|c| !dropped.contains(&c.source))
        .collect()
}

/// Walks the fixed priority order. A later source wins when it is earlier in
/// time, except `Filename`, which always displaces what came before it.
fn select_winner(candidates: &[CandidateDate]) -> Option<CandidateDate> {
    let mut winner: Option<CandidateDate> = None;
    for source in DateSource::PRIORITY {
        let Some(candidate) = candidates.iter().find(|c| c.source == source) else {
            continue;
        };
        let replace = match winner {
            None => true,
            Some(current) => source == DateSource::Filename || candidate.value < current.value,
        };
        if replace {
            winner = Some(*candidate);
        }
    }
    winner
}

/// `PREFIX_YYYYMMDD_HHMMSS.EXT`, where PREFIX is the original name up to its first underscore.
pub fn regenerate_filename(original: &str, value: &OffsetDateTime) -> String {
    let stamp = value
        .format(FILENAME_STAMP_FORMAT)
        .unwrap_or_else(|_| value.unix_timestamp().to_string());

    let (stem, ext) = match original.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (original, None),
    };
    let prefix = stem.split_once('_').map(|(p, _)| p).filter(|p| !p.is_empty());

    let mut name = match prefix {
        Some(prefix) => format!("{prefix}_{stamp}"),
        None => stamp,
    };
    if let Some(ext) = ext {
        name.push('.');
        name.push_str(ext);
    }
    name
}

fn day_string(value: &OffsetDateTime) -> String {
    value
        .format(DAY_FORMAT)
        .unwrap_or_else(|_| value.date().to_string())
}

fn describe(candidates: &[CandidateDate]) -> String {
    let mut sorted: Vec<&CandidateDate> = candidates.iter().collect();
    sorted.sort_by_key(|c| c.value);
    sorted
        .iter()
        .map(|c| format!("{}: {}", c.source, format_for_log(&c.value)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Convenience for callers that only hold a path and a list of candidates.
pub fn candidate_set(
    path: &Path,
    file_mtime: OffsetDateTime,
    candidates: Vec<CandidateDate>,
) -> CandidateSet {
    CandidateSet {
        path: path.to_path_buf(),
        filename: path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string(),
        file_mtime,
        candidates,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::photobinner_core::anomaly::VecSink;
    use time::macros::datetime;

    fn c(source: DateSource, value: OffsetDateTime) -> CandidateDate {
        CandidateDate::new(source, value)
    }

    fn set(name: &str, candidates: Vec<CandidateDate>) -> CandidateSet {
        let mtime = candidates
            .iter()
            .find(|c| c.source == DateSource::Stat)
            .map(|c| c.value)
            .unwrap_or(datetime!(1970-01-01 0:00 UTC));
        candidate_set(Path::new(name), mtime, candidates)
    }

    #[test]
    fn test_metadata_earlier_than_filename_displaces_it() {
        let set = set(
            "/pics/2019_06_01/IMG_20210303_120000.jpg",
            vec![
                c(DateSource::Stat, datetime!(2020-01-01 12:00 UTC)),
                c(DateSource::Path, datetime!(2019-06-01 0:00 UTC)),
                c(DateSource::Filename, datetime!(2021-03-03 12:00 UTC)),
                c(DateSource::Metadata, datetime!(2020-12-25 12:00 UTC)),
            ],
        );
        let resolved = DateResolver::new().resolve(&set, &mut VecSink::default()).unwrap();
        // Metadata (2020-12-25) is earlier than the filename winner and so displaces it.
        assert_eq!(resolved.source, DateSource::Metadata);
        assert_eq!(resolved.value, datetime!(2020-12-25 12:00 UTC));
    }

    #[test]
    fn test_filename_wins_when_metadata_is_later() {
        let set = set(
            "/pics/IMG_20210303_120000.jpg",
            vec![
                c(DateSource::Stat, datetime!(2020-01-01 12:00 UTC)),
                c(DateSource::Path, datetime!(2019-06-01 0:00 UTC)),
                c(DateSource::Filename, datetime!(2021-03-03 12:00 UTC)),
                c(DateSource::Metadata, datetime!(2021-12-25 12:00 UTC)),
            ],
        );
        let resolved = DateResolver::new().resolve(&set, &mut VecSink::default()).unwrap();
        assert_eq!(resolved.source, DateSource::Filename);
        assert_eq!(resolved.value, datetime!(2021-03-03 12:00 UTC));
        assert!(resolved.has(AnomalyKind::PathDateIncorrect));
        assert!(resolved.has(AnomalyKind::RecentMetadataDate));
        assert!(!resolved.has(AnomalyKind::FilenameDateIncorrect));
    }

    #[test]
    fn test_earliest_wins_without_filename() {
        let set = set(
            "/pics/a.jpg",
            vec![
                c(DateSource::Stat, datetime!(2020-01-01 12:00 UTC)),
                c(DateSource::Metadata, datetime!(2019-01-01 12:00 UTC)),
            ],
        );
        let resolved = DateResolver::new().resolve(&set, &mut VecSink::default()).unwrap();
        assert_eq!(resolved.source, DateSource::Metadata);
        assert_eq!(
            resolved.mtime_adjustment,
            Some(datetime!(2019-01-01 12:00 UTC) - datetime!(2020-01-01 12:00 UTC))
        );
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let set = set(
            "/pics/2020-02-02/IMG_20200202_101010.jpg",
            vec![
                c(DateSource::Stat, datetime!(2020-03-01 9:00 +1)),
                c(DateSource::Path, datetime!(2020-02-02 0:00 +1)),
                c(DateSource::Filename, datetime!(2020-02-02 10:10:10 +1)),
                c(DateSource::Metadata, datetime!(2020-02-02 10:10:09 +1)),
            ],
        );
        let resolver = DateResolver::new();
        let first = resolver.resolve(&set, &mut VecSink::default()).unwrap();
        for _ in 0..5 {
            assert_eq!(resolver.resolve(&set, &mut VecSink::default()).unwrap(), first);
        }
    }

    #[test]
    fn test_double_timezone_correction() {
        // mtime shown as 16:00 local (+04:00) is 12:00 UTC, equal to the metadata wall clock.
        let stat = datetime!(2021-06-01 16:00 +4);
        let set = set(
            "/pics/a.jpg",
            vec![
                c(DateSource::Stat, stat),
                c(DateSource::Metadata, datetime!(2021-06-01 12:00 +4)),
            ],
        );
        let mut sink = VecSink::default();
        let resolved = DateResolver::new().resolve(&set, &mut sink).unwrap();
        assert!(resolved.has(AnomalyKind::FileDateDoubleTimezoned));
        assert_eq!(sink.count(AnomalyKind::FileDateDoubleTimezoned), 1);
        // Corrected stat (12:00 +4) ties with metadata; stat stays winner as it is not later.
        assert_eq!(resolved.value, datetime!(2021-06-01 12:00 +4));
        assert_ne!(resolved.value, stat);
        assert_eq!(resolved.mtime_adjustment, Some(Duration::hours(-4)));
        assert!(!resolved.has(AnomalyKind::RecentMetadataDate));
    }

    #[test]
    fn test_day_only_path_is_suppressed() {
        let set = set(
            "/pics/2020-05-01/a.jpg",
            vec![
                c(DateSource::Path, datetime!(2020-05-01 0:00 UTC)),
                c(DateSource::Metadata, datetime!(2020-05-01 14:22:10 UTC)),
            ],
        );
        let candidates = suppress_day_only(set.candidates.clone());
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].source, DateSource::Metadata);

        let resolved = DateResolver::new().resolve(&set, &mut VecSink::default()).unwrap();
        assert_eq!(resolved.source, DateSource::Metadata);
        assert!(!resolved.has(AnomalyKind::PathDateIncorrect));
    }

    #[test]
    fn test_day_only_kept_without_timed_partner() {
        let candidates = suppress_day_only(vec![
            c(DateSource::Path, datetime!(2020-05-01 0:00 UTC)),
            c(DateSource::Metadata, datetime!(2020-05-02 14:22:10 UTC)),
        ]);
        assert_eq!(candidates.len(), 2);
    }

    #[test]
    fn test_no_valid_date() {
        let set = set("/pics/a.jpg", vec![]);
        let err = DateResolver::new().resolve(&set, &mut VecSink::default()).unwrap_err();
        assert!(matches!(err, PhotobinnerError::NoValidDate(p) if p == Path::new("/pics/a.jpg")));
    }

    #[test]
    fn test_placeholder_winner_is_flagged_but_returned() {
        let set = set(
            "/pics/a.jpg",
            vec![c(DateSource::Stat, datetime!(1980-01-01 0:00 UTC))],
        );
        let mut sink = VecSink::default();
        let resolved = DateResolver::new().resolve(&set, &mut sink).unwrap();
        assert_eq!(resolved.value.year(), 1980);
        assert_eq!(sink.count(AnomalyKind::NoValidDate), 1);
    }

    #[test]
    fn test_incorrect_filename_date_is_renamed() {
        let set = set(
            "/pics/IMG_20200101_000001.jpg",
            vec![
                c(DateSource::Stat, datetime!(2019-08-07 06:05:04 UTC)),
                c(DateSource::Filename, datetime!(2020-01-01 0:00:01 UTC)),
                c(DateSource::Metadata, datetime!(2019-08-07 06:05:04 UTC)),
            ],
        );
        let mut sink = VecSink::default();
        let resolved = DateResolver::new().resolve(&set, &mut sink).unwrap();
        assert_eq!(resolved.source, DateSource::Metadata);
        assert_eq!(
            resolved.renamed_filename.as_deref(),
            Some("IMG_20190807_060504.jpg")
        );
        assert_eq!(sink.count(AnomalyKind::FilenameDateIncorrect), 1);
        assert_eq!(resolved.mtime_adjustment, None);
    }

    #[test]
    fn test_regenerate_filename_shapes() {
        let value = datetime!(2018-02-03 04:05:06 UTC);
        assert_eq!(regenerate_filename("VID_20170101_101010.mp4", &value), "VID_20180203_040506.mp4");
        assert_eq!(regenerate_filename("20170101-101010.jpg", &value), "20180203_040506.jpg");
        assert_eq!(regenerate_filename("PANO_x_y.JPG", &value), "PANO_20180203_040506.JPG");
        assert_eq!(regenerate_filename("noext_20170101_101010", &value), "noext_20180203_040506");
    }
}
