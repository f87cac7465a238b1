use clap::ValueEnum;
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use time::OffsetDateTime;

use crate::photobinner_core::dates::DAY_FORMAT;
use crate::photobinner_core::error::Result;
use crate::photobinner_core::exif::CameraInfo;

/// Camera makers whose make/model is a better label than the folder names.
pub const DEFAULT_IMAGE_MAKERS: &[&str] = &["Apple"];

static DUPE_MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/?dupe/[0-9]+").unwrap());
static EMBEDDED_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]{4}_[0-9]{2}_[0-9]{2}|[0-9]{4}-[0-9]{2}-[0-9]{2}").unwrap());
static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{2,}").unwrap());

/// Segments that only carry date information.
const DATE_ONLY_SEGMENTS: &[&str] = &[
    r"^[0-9]{8}$",
    r"^[0-9]{4}$",
    r"^[0-9]{4}[-_][0-9]{2}[-_][0-9]{2}$",
];

/// How the label is combined with the date in the target tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilingPreference {
    /// year/date_label
    #[default]
    Date,
    /// year/label/date
    Label,
}

/// Derives a folder-naming token from camera metadata or the source path.
#[derive(Debug, Clone)]
pub struct LabelExtractor {
    makers: Vec<String>,
    removals: Vec<Regex>,
}

impl LabelExtractor {
    /// `exclude_patterns` are regexes matched at the start of each folder name.
    pub fn new(makers: Vec<String>, exclude_patterns: &[String]) -> Result<Self> {
        let mut removals = DATE_ONLY_SEGMENTS
            .iter()
            .map(|p| Regex::new(p))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        for pattern in exclude_patterns.iter().filter(|p| !p.is_empty()) {
            removals.push(Regex::new(&format!("^(?:{pattern})"))?);
        }
        Ok(Self { makers, removals })
    }

    /// Returns a copy that also drops folders named exactly `name`.
    pub fn excluding_literal(&self, name: &str) -> Self {
        let mut extended = self.clone();
        if let Ok(re) = Regex::new(&format!("^{}$", regex::escape(name))) {
            extended.removals.push(re);
        }
        extended
    }

    pub fn extract(
        &self,
        original_path: &Path,
        camera: Option<&CameraInfo>,
        mountpoint: Option<&Path>,
        preserve_folders: usize,
    ) -> Option<String> {
        if let Some(camera) = camera.filter(|c| self.makers.iter().any(|m| *m == c.make)) {
            return Some(format!("{}_{}", camera.make, camera.model));
        }
        let mountpoint = mountpoint?;

        let mut chuck = mountpoint.to_path_buf();
        for _ in 0..preserve_folders {
            if !chuck.pop() {
                break;
            }
        }

        let relative = original_path
            .strip_prefix(&chuck)
            .unwrap_or(original_path)
            .parent()
            .unwrap_or(Path::new(""));
        let relative = relative.to_string_lossy();
        let descriptive_path = DUPE_MARKER.replace_all(&relative, "");
        log::debug!(" - descriptive path: {}", descriptive_path);

        let folders: Vec<&str> = descriptive_path
            .split('/')
            .filter(|f| !f.is_empty())
            .filter(|f| !self.removals.iter().any(|r| r.is_match(f)))
            .collect();
        log::debug!(" - descriptive folders: {:?}", folders);

        let mut tokens: Vec<String> = Vec::new();
        for folder in folders {
            let spaced = EMBEDDED_DATE.replace_all(folder, " ").replace('-', " ");
            let spaced = WHITESPACE_RUN.replace_all(&spaced, " ");
            for token in spaced.split_whitespace() {
                let token = token.trim_matches('_');
                if !token.is_empty() && !tokens.iter().any(|t| t == token) {
                    tokens.push(token.to_string());
                }
            }
        }
        log::debug!(" - tokens: {:?}", tokens);

        if tokens.is_empty() {
            None
        } else {
            Some(tokens.join("_"))
        }
    }
}

/// Computes `target/YYYY/YYYY-MM-DD[_label]` or `target/YYYY/label/YYYY-MM-DD`.
pub fn target_folder(
    target: &Path,
    date: &OffsetDateTime,
    label: Option<&str>,
    preference: FilingPreference,
) -> PathBuf {
    let year = date.year().to_string();
    let day = date
        .format(DAY_FORMAT)
        .unwrap_or_else(|_| date.date().to_string());

    match (preference, label) {
        (FilingPreference::Label, Some(label)) => target.join(year).join(label).join(day),
        (_, Some(label)) => target.join(year).join(format!("{day}_{label}")),
        (_, None) => target.join(year).join(day),
    }
}
