use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use time::UtcOffset;
use time::format_description::FormatItem;

use crate::photobinner_core::cli::RunArgs;
use crate::photobinner_core::dates::get_local_offset;
use crate::photobinner_core::error::{PhotobinnerError, Result};
use crate::photobinner_core::label::{DEFAULT_IMAGE_MAKERS, FilingPreference};
use crate::photobinner_core::relocate::TransferMethod;

const CONFIG_FILE_NAME: &str = ".photobinner.json";
const EXACT_MATCHES_FOLDER: &str = "exact_matches";

const OFFSET_FORMAT: &[FormatItem] =
    time::macros::format_description!("[offset_hour]:[offset_minute]");

/// Settings read from the JSON config file. Everything is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub target: Option<PathBuf>,
    pub exact_matches_folder: Option<PathBuf>,
    pub copy_exact_matches: Option<bool>,
    pub utc_offset: Option<String>,
    /// Read metadata timestamps as local wall clock (true) or UTC (false).
    pub assume_local: Option<bool>,
    pub image_makers: Option<Vec<String>>,
    pub exclude_descriptive: Option<Vec<String>>,
    pub filing_preference: Option<FilingPreference>,
    pub transfer_method: Option<TransferMethod>,
}

impl FileConfig {
    /// Loads `path`, or the default file in the home directory. A missing default file is not an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match dirs::home_dir() {
                Some(home) => (home.join(CONFIG_FILE_NAME), false),
                None => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            if explicit {
                return Err(PhotobinnerError::Config(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
            log::debug!("No config, using baked-in defaults..");
            return Ok(Self::default());
        }

        log::debug!("Reading {}", path.display());
        let contents = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

/// Fully resolved settings for a run.
#[derive(Debug, Clone)]
pub struct Config {
    pub source: PathBuf,
    pub target: PathBuf,
    pub exact_matches_folder: PathBuf,
    pub copy_exact_matches: bool,
    pub reference_offset: UtcOffset,
    pub assume_local: bool,
    pub image_makers: Vec<String>,
    pub exclude_descriptive: Vec<String>,
    pub filing_preference: FilingPreference,
    pub transfer_method: TransferMethod,
    pub preserve_folders: usize,
    pub mask: Option<String>,
    pub dry_run: bool,
    pub smoke_test: Option<usize>,
    pub rename_files: bool,
    pub stats_file: Option<PathBuf>,
}

impl Config {
    /// Command line values win over the config file, which wins over defaults.
    /// Paths are made absolute so they compare equal to walked source paths.
    pub fn resolve(args: RunArgs, file: FileConfig) -> Result<Self> {
        let target = args
            .target
            .or(file.target)
            .ok_or_else(|| PhotobinnerError::Config("no target folder given".to_string()))?;
        let target = std::path::absolute(target)?;

        let exact_matches_folder = match args.exact_matches_folder.or(file.exact_matches_folder) {
            Some(folder) => std::path::absolute(folder)?,
            None => target.join(EXACT_MATCHES_FOLDER),
        };

        let reference_offset = match args.utc_offset.or(file.utc_offset) {
            Some(s) => parse_offset(&s)?,
            None => get_local_offset(),
        };

        let mut exclude_descriptive = file.exclude_descriptive.unwrap_or_default();
        exclude_descriptive.extend(args.exclude_descriptive.into_iter().filter(|e| !e.is_empty()));

        Ok(Config {
            source: std::path::absolute(args.source)?,
            target,
            exact_matches_folder,
            copy_exact_matches: args.copy_exact_matches || file.copy_exact_matches.unwrap_or(false),
            reference_offset,
            assume_local: file.assume_local.unwrap_or(true),
            image_makers: file
                .image_makers
                .unwrap_or_else(|| DEFAULT_IMAGE_MAKERS.iter().map(|m| m.to_string()).collect()),
            exclude_descriptive,
            filing_preference: args
                .filing_preference
                .or(file.filing_preference)
                .unwrap_or_default(),
            transfer_method: args.transfer_method.or(file.transfer_method).unwrap_or_default(),
            preserve_folders: args.preserve_folders,
            mask: args.mask,
            dry_run: args.dry_run,
            smoke_test: args.smoke_test.filter(|_| args.dry_run),
            rename_files: args.rename_files,
            stats_file: args.stats_file,
        })
    }
}

/// Parses "+HH:MM", "-HH:MM", "Z" or "UTC".
pub fn parse_offset(value: &str) -> Result<UtcOffset> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("z") || value.eq_ignore_ascii_case("utc") {
        return Ok(UtcOffset::UTC);
    }
    UtcOffset::parse(value, OFFSET_FORMAT)
        .map_err(|e| PhotobinnerError::Config(format!("invalid UTC offset '{value}': {e}")))
}
