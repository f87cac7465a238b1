pub mod anomaly;
pub mod binner;
pub mod candidates;
pub mod cli;
pub mod config;
pub mod dates;
pub mod destination;
pub mod error;
pub mod exif;
pub mod label;
pub mod log_escrow;
pub mod media;
pub mod relocate;
pub mod resolver;
pub mod sidecar;
pub mod source;
pub mod stats;

pub use anomaly::{AnomalyKind, AnomalySink, VecSink};
pub use binner::{Binner, FileOutcome, FileResolution, resolve_file};
pub use candidates::{CandidateExtractor, FileStat};
pub use cli::{Cli, Commands, RunArgs};
pub use config::{Config, FileConfig};
pub use dates::{CandidateDate, CandidateSet, DateSource, ResolvedDate, get_local_offset};
pub use destination::{
    DestinationDecision, DestinationPolicy, DestinationResolver, FileDescriptor, LocalFs, TargetFs,
};
pub use error::{PhotobinnerError, Result};
pub use exif::{ExifToolReader, MediaMetadata, MetadataReader, NoMetadata, exiftool_available};
pub use resolver::DateResolver;
pub use stats::RunStats;
