use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

use crate::photobinner_core::anomaly::{AnomalyKind, AnomalySink};
use crate::photobinner_core::dates::DateSource;
use crate::photobinner_core::error::Result;

/// One pass over a single source.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub source: String,
    #[serde(with = "time::serde::rfc3339")]
    pub start: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub stop: Option<OffsetDateTime>,
    pub file_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Statistics gathered over one run, passed explicitly to whoever records into it.
#[derive(Debug, Default, Serialize)]
pub struct RunStats {
    pub dry_run: bool,
    pub runs: Vec<RunRecord>,
    pub anomalies: BTreeMap<AnomalyKind, Vec<PathBuf>>,
    pub date_sources: BTreeMap<DateSource, Vec<PathBuf>>,
    /// Source folder -> target folder -> number of files moved.
    pub moves: BTreeMap<PathBuf, BTreeMap<PathBuf, usize>>,
    /// Source folder -> number of files already in place.
    pub correct: BTreeMap<PathBuf, usize>,
    pub failures: Vec<(PathBuf, String)>,
}

impl RunStats {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Default::default()
        }
    }

    pub fn begin_run(&mut self, source: &str) {
        self.runs.push(RunRecord {
            source: source.to_string(),
            start: now(),
            stop: None,
            file_count: 0,
            error: None,
        });
    }

    pub fn count_file(&mut self) {
        if let Some(run) = self.runs.last_mut() {
            run.file_count += 1;
        }
    }

    pub fn end_run(&mut self, error: Option<String>) {
        if let Some(run) = self.runs.last_mut() {
            run.stop = Some(now());
            run.error = error;
        }
    }

    pub fn record_move(&mut self, current_folder: &Path, target_folder: &Path) {
        *self
            .moves
            .entry(current_folder.to_path_buf())
            .or_default()
            .entry(target_folder.to_path_buf())
            .or_default() += 1;
    }

    pub fn record_correct(&mut self, current_folder: &Path) {
        *self.correct.entry(current_folder.to_path_buf()).or_default() += 1;
    }

    pub fn record_failure(&mut self, path: &Path, reason: String) {
        self.failures.push((path.to_path_buf(), reason));
    }

    pub fn anomaly_count(&self, kind: AnomalyKind) -> usize {
        self.anomalies.get(&kind).map_or(0, Vec::len)
    }

    pub fn moved_count(&self) -> usize {
        self.moves.values().flat_map(|targets| targets.values()).sum()
    }

    pub fn correct_count(&self) -> usize {
        self.correct.values().sum()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_out(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json()?)?;
        log::info!("Run statistics written to {}", path.display());
        Ok(())
    }
}

impl AnomalySink for RunStats {
    fn emit(&mut self, kind: AnomalyKind, path: &Path) {
        self.anomalies
            .entry(kind)
            .or_default()
            .push(path.to_path_buf());
    }

    fn record_date_source(&mut self, source: DateSource, path: &Path) {
        self.date_sources
            .entry(source)
            .or_default()
            .push(path.to_path_buf());
    }
}

impl std::fmt::Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} moved, {} already correct, {} failed",
            self.moved_count(),
            self.correct_count(),
            self.failures.len()
        )?;
        for (kind, paths) in &self.anomalies {
            write!(f, "\n  {}: {}", kind, paths.len())?;
        }
        Ok(())
    }
}

fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}
