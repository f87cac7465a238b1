use serde::Serialize;
use std::path::Path;

use crate::photobinner_core::dates::DateSource;

/// Irregularities noticed while resolving a file's date or destination.
///
/// None of these stop processing; they annotate the decision taken for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnomalyKind {
    /// The file mtime had the local offset applied twice.
    FileDateDoubleTimezoned,
    /// Metadata is newer than the file mtime, usually a restored backup.
    #[serde(rename = "recent-exif")]
    RecentMetadataDate,
    /// The winning date falls in a known placeholder year.
    NoValidDate,
    FilenameDateIncorrect,
    PathDateIncorrect,
    ContentMatchAtTarget,
    FilenameMatchAtTarget,
}

impl AnomalyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyKind::FileDateDoubleTimezoned => "file-date-double-timezoned",
            AnomalyKind::RecentMetadataDate => "recent-exif",
            AnomalyKind::NoValidDate => "no-valid-date",
            AnomalyKind::FilenameDateIncorrect => "filename-date-incorrect",
            AnomalyKind::PathDateIncorrect => "path-date-incorrect",
            AnomalyKind::ContentMatchAtTarget => "content-match-at-target",
            AnomalyKind::FilenameMatchAtTarget => "filename-match-at-target",
        }
    }
}

impl std::fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Append-only receiver for anomaly events. The core never reads back what it pushed.
pub trait AnomalySink {
    fn emit(&mut self, kind: AnomalyKind, path: &Path);

    /// Records which source supplied the resolved date for `path`.
    fn record_date_source(&mut self, _source: DateSource, _path: &Path) {}
}

/// Sink that keeps every event in order. Handy for inspection and tests.
#[derive(Debug, Default)]
pub struct VecSink {
    pub events: Vec<(AnomalyKind, std::path::PathBuf)>,
}

impl VecSink {
    pub fn count(&self, kind: AnomalyKind) -> usize {
        self.events.iter().filter(|(k, _)| *k == kind).count()
    }
}

impl AnomalySink for VecSink {
    fn emit(&mut self, kind: AnomalyKind, path: &Path) {
        self.events.push((kind, path.to_path_buf()));
    }
}
