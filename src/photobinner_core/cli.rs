use clap::{Args, Parser, Subcommand};
use simplelog::LevelFilter;
use std::path::PathBuf;

use crate::photobinner_core::label::FilingPreference;
use crate::photobinner_core::relocate::TransferMethod;

#[derive(Parser, Debug)]
#[command(author, version, about = "Files photos and videos into a year/date tree by their true capture date")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable file logging to photobinner.log
    #[arg(long = "log", global = true)]
    pub log: bool,

    /// Log level (debug, info, warn, error)
    #[arg(long, short = 'l', default_value_t = LevelFilter::Info, global = true)]
    pub log_level: LevelFilter,

    /// JSON configuration file (default: ~/.photobinner.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sort files from a source into the target tree
    Run(RunArgs),

    /// Show how a single file's date would be resolved, without touching it
    Resolve {
        /// File to inspect
        #[arg(required = true)]
        file: PathBuf,

        /// UTC offset candidates are localized into (e.g. "-05:00"); defaults to the local offset
        #[arg(long, allow_hyphen_values = true)]
        utc_offset: Option<String>,
    },
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Source folder or file
    #[arg(long, short = 's', required = true)]
    pub source: PathBuf,

    /// Target folder (root of the year/date tree)
    #[arg(long, short = 't')]
    pub target: Option<PathBuf>,

    /// Regex applied to file names instead of the built-in media filter
    #[arg(long, short = 'm')]
    pub mask: Option<String>,

    /// Number of parent folders of the source to keep when deriving labels
    #[arg(long, short = 'p', default_value_t = 0)]
    pub preserve_folders: usize,

    /// Comma-separated patterns of folder names to leave out of labels
    #[arg(long, short = 'e', value_delimiter = ',')]
    pub exclude_descriptive: Vec<String>,

    /// date: year/date_label, label: year/label/date
    #[arg(long, short = 'i', value_enum)]
    pub filing_preference: Option<FilingPreference>,

    /// Only print what would happen. Make no filesystem changes.
    #[arg(long, short = 'd')]
    pub dry_run: bool,

    /// Process only this many files from each source. Only active with --dry-run
    #[arg(long, short = 'k')]
    pub smoke_test: Option<usize>,

    /// Whether to copy or move files
    #[arg(long, short = 'b', value_enum)]
    pub transfer_method: Option<TransferMethod>,

    /// File exact duplicates into the exact matches folder instead of skipping them
    #[arg(long)]
    pub copy_exact_matches: bool,

    /// Folder receiving exact duplicates when --copy-exact-matches is set
    #[arg(long)]
    pub exact_matches_folder: Option<PathBuf>,

    /// UTC offset candidates are localized into (e.g. "-05:00"); defaults to the local offset
    #[arg(long, allow_hyphen_values = true)]
    pub utc_offset: Option<String>,

    /// Rename files whose embedded timestamp disagrees with the resolved date
    #[arg(long)]
    pub rename_files: bool,

    /// Write run statistics as JSON to this file
    #[arg(long)]
    pub stats_file: Option<PathBuf>,

    /// Do not ask for confirmation before processing
    #[arg(long, short = 'y')]
    pub yes: bool,
}
