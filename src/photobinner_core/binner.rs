use indicatif::{ProgressBar, ProgressStyle};
use log::Level;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use crate::photobinner_core::anomaly::{AnomalyKind, AnomalySink};
use crate::photobinner_core::candidates::{CandidateExtractor, FileStat};
use crate::photobinner_core::config::Config;
use crate::photobinner_core::dates::{CandidateSet, DateSource, ResolvedDate};
use crate::photobinner_core::destination::{
    DestinationPolicy, DestinationResolver, FileDescriptor, LocalFs,
};
use crate::photobinner_core::error::{PhotobinnerError, Result};
use crate::photobinner_core::exif::{MediaMetadata, MetadataReader};
use crate::photobinner_core::label::{LabelExtractor, target_folder};
use crate::photobinner_core::log_escrow::LogEscrow;
use crate::photobinner_core::relocate::{FileRelocator, FileTimes};
use crate::photobinner_core::resolver::DateResolver;
use crate::photobinner_core::sidecar::find_companions;
use crate::photobinner_core::source::{Source, first_stitch_file, source_for_path};
use crate::photobinner_core::stats::RunStats;

const SOURCE_EVENT: &str = "source";
const FILE_EVENT: &str = "file";

/// Forwards anomalies to the run stats, first releasing the held headings so
/// the warning that follows has its context.
struct EscrowSink<'a> {
    stats: &'a mut RunStats,
    escrow: &'a mut LogEscrow,
}

impl AnomalySink for EscrowSink<'_> {
    fn emit(&mut self, kind: AnomalyKind, path: &Path) {
        self.escrow.release(SOURCE_EVENT);
        self.escrow.release(FILE_EVENT);
        self.stats.emit(kind, path);
    }

    fn record_date_source(&mut self, source: DateSource, path: &Path) {
        self.stats.record_date_source(source, path);
    }
}

/// Everything learned about one file before deciding where it goes.
#[derive(Debug)]
pub struct FileResolution {
    pub descriptor: FileDescriptor,
    pub stat: FileStat,
    pub metadata: MediaMetadata,
    pub candidates: CandidateSet,
    pub resolved: ResolvedDate,
}

/// Stats, reads metadata for and resolves the date of a single file.
pub fn resolve_file(
    path: &Path,
    extractor: &CandidateExtractor,
    reader: &mut dyn MetadataReader,
    sink: &mut dyn AnomalySink,
) -> Result<FileResolution> {
    let stat = FileStat::read(path)?;
    let descriptor = FileDescriptor::new(path.to_path_buf(), stat.size_bytes);
    let metadata = reader.read(&descriptor.working_path);
    let candidates = extractor.extract(&descriptor, &stat, &metadata);
    let resolved = DateResolver::new().resolve(&candidates, sink)?;
    Ok(FileResolution {
        descriptor,
        stat,
        metadata,
        candidates,
        resolved,
    })
}

/// What happened to a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Filed (or would be, on a dry run) at this path.
    Moved(PathBuf),
    /// Already where it belongs, or an exact copy is.
    Unchanged,
}

/// Walks sources and files each media file into the target tree.
pub struct Binner {
    config: Config,
    extractor: CandidateExtractor,
    labels: LabelExtractor,
    policy: DestinationPolicy,
    relocator: FileRelocator,
    reader: Box<dyn MetadataReader>,
    stats: RunStats,
    escrow: LogEscrow,
}

impl Binner {
    pub fn new(config: Config, reader: Box<dyn MetadataReader>) -> Result<Self> {
        let labels = LabelExtractor::new(config.image_makers.clone(), &config.exclude_descriptive)?;
        Ok(Binner {
            extractor: CandidateExtractor::new(config.reference_offset, config.assume_local),
            labels,
            policy: DestinationPolicy {
                copy_exact_matches: config.copy_exact_matches,
                exact_matches_folder: config.exact_matches_folder.clone(),
            },
            relocator: FileRelocator::new(config.transfer_method),
            reader,
            stats: RunStats::new(config.dry_run),
            escrow: LogEscrow::new(),
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn into_stats(self) -> RunStats {
        self.stats
    }

    /// Builds the source for the configured path. The exact matches folder, and
    /// the target when it sits inside the source, are never walked.
    pub fn sources(&self) -> Result<Vec<Box<dyn Source>>> {
        let source = std::path::absolute(&self.config.source)?;
        let target = std::path::absolute(&self.config.target)?;
        let mask = self.config.mask.as_deref().map(Regex::new).transpose()?;

        let mut excluded = vec![std::path::absolute(&self.config.exact_matches_folder)?];
        if target != source && target.starts_with(&source) {
            excluded.push(target);
        }
        Ok(vec![source_for_path(&source, mask, excluded)])
    }

    /// Processes every verified source in turn. Stops between files once `cancel` is set.
    pub fn run(&mut self, sources: &[Box<dyn Source>], cancel: &AtomicBool) -> Result<()> {
        let mut verified = 0;
        for source in sources {
            log::info!("Verifying source: {}", source.name());
            if !source.verify() {
                log::warn!(" - not verified, skipping {}", source.name());
                continue;
            }
            verified += 1;

            self.stats.begin_run(source.name());
            let result = self.run_source(source.as_ref(), cancel);
            self.stats
                .end_run(result.as_ref().err().map(|e| e.to_string()));
            self.escrow.clear();
            result?;
        }

        if verified == 0 {
            return Err(PhotobinnerError::SourceUnavailable(self.config.source.clone()));
        }
        Ok(())
    }

    fn run_source(&mut self, source: &dyn Source, cancel: &AtomicBool) -> Result<()> {
        self.escrow.hold(
            SOURCE_EVENT,
            Level::Info,
            format!("Processing source {}..", source.name()),
        );

        let spinner = ProgressBar::new_spinner().with_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {pos} files {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message(source.name().to_string());

        let limit = self.config.smoke_test.unwrap_or(usize::MAX);
        for path in source.paths().take(limit) {
            if cancel.load(Ordering::SeqCst) {
                source.cancel();
                spinner.abandon_with_message("cancelled");
                return Err(PhotobinnerError::Cancelled);
            }

            self.stats.count_file();
            spinner.inc(1);
            let result = self.process_file(&path, source);
            self.record_result(&path, result);
        }

        for folder in source.stitch_folders() {
            if cancel.load(Ordering::SeqCst) {
                spinner.abandon_with_message("cancelled");
                return Err(PhotobinnerError::Cancelled);
            }
            let result = self.process_stitch_folder(&folder, source);
            self.record_result(&folder, result);
        }

        spinner.finish_and_clear();
        Ok(())
    }

    fn record_result(&mut self, path: &Path, result: Result<FileOutcome>) {
        match result {
            Ok(_) => {}
            Err(e @ PhotobinnerError::NoValidDate(_)) => {
                self.escrow.log(Level::Warn, &e.to_string());
                self.stats.record_failure(path, e.to_string());
            }
            Err(e) => {
                self.escrow
                    .log(Level::Error, &format!("Failed to process {}: {}", path.display(), e));
                self.stats.record_failure(path, e.to_string());
            }
        }
        self.escrow.discard(FILE_EVENT);
    }

    /// Logs `heading` at debug level right away, or holds it until the item
    /// turns out to need attention.
    fn hold_heading(&mut self, heading: String) {
        if log::log_enabled!(Level::Debug) {
            log::debug!("{}", heading);
        } else {
            self.escrow.hold(FILE_EVENT, Level::Info, heading);
        }
    }

    /// Resolves, places and (unless dry running) relocates one file. The
    /// file's heading is only written out if it moves or raises an anomaly.
    pub fn process_file(&mut self, path: &Path, source: &dyn Source) -> Result<FileOutcome> {
        self.hold_heading(format!("Processing {}..", path.display()));
        let outcome = self.place_file(path, source)?;
        self.escrow.discard(FILE_EVENT);
        Ok(outcome)
    }

    fn place_file(&mut self, path: &Path, source: &dyn Source) -> Result<FileOutcome> {
        let FileResolution {
            descriptor,
            stat,
            metadata,
            resolved,
            ..
        } = resolve_file(
            path,
            &self.extractor,
            self.reader.as_mut(),
            &mut EscrowSink {
                stats: &mut self.stats,
                escrow: &mut self.escrow,
            },
        )?;

        let filename = match &resolved.renamed_filename {
            Some(renamed) if self.config.rename_files => renamed.clone(),
            _ => descriptor.filename(),
        };

        let label = self.labels.extract(
            &descriptor.original_path,
            metadata.camera.as_ref(),
            source.mountpoint(),
            self.config.preserve_folders,
        );
        let folder = target_folder(
            &self.config.target,
            &resolved.value,
            label.as_deref(),
            self.config.filing_preference,
        );

        let decision = DestinationResolver::new(&LocalFs, self.policy.clone()).resolve(
            &descriptor,
            &folder,
            &filename,
            &mut EscrowSink {
                stats: &mut self.stats,
                escrow: &mut self.escrow,
            },
        )?;

        let current_folder = descriptor
            .original_path
            .parent()
            .unwrap_or(Path::new(""))
            .to_path_buf();

        if !decision.required {
            self.stats.record_correct(&current_folder);
            return Ok(FileOutcome::Unchanged);
        }

        let destination = decision.destination();
        self.stats.record_move(&current_folder, &decision.target_folder);
        self.escrow.log(
            Level::Info,
            &format!("{} -> {}", path.display(), destination.display()),
        );

        if self.config.dry_run {
            log::info!(" - dry run, no action");
            return Ok(FileOutcome::Moved(destination));
        }

        log::info!(" - {} MB", descriptor.size_bytes / (1024 * 1024));
        let times = resolved.mtime_adjustment.map(|_| {
            let corrected = SystemTime::from(resolved.value);
            FileTimes {
                accessed: stat.accessed.unwrap_or(corrected),
                modified: corrected,
            }
        });
        self.relocator
            .relocate(&descriptor.working_path, &destination, times)?;

        for companion in find_companions(
            &current_folder,
            &descriptor.filename(),
            &decision.target_folder,
            &decision.final_filename,
        ) {
            log::info!(
                "   - {} -> {}",
                companion.source.display(),
                companion.destination.display()
            );
            self.relocator
                .relocate(&companion.source, &companion.destination, None)?;
        }

        Ok(FileOutcome::Moved(destination))
    }

    /// Relocates a `STITCH_<n>` panorama folder whole. It is dated by its first
    /// frame and labelled from the folders above it.
    pub fn process_stitch_folder(&mut self, folder: &Path, source: &dyn Source) -> Result<FileOutcome> {
        self.hold_heading(format!("Processing stitch folder {}..", folder.display()));
        let outcome = self.place_stitch_folder(folder, source)?;
        self.escrow.discard(FILE_EVENT);
        Ok(outcome)
    }

    fn place_stitch_folder(&mut self, folder: &Path, source: &dyn Source) -> Result<FileOutcome> {
        let name = folder
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let Some(frame) = first_stitch_file(folder)? else {
            self.escrow
                .log(Level::Warn, &format!(" - no stitch frames in {}, skipping", folder.display()));
            return Ok(FileOutcome::Unchanged);
        };

        let FileResolution {
            metadata, resolved, ..
        } = resolve_file(
            &frame,
            &self.extractor,
            self.reader.as_mut(),
            &mut EscrowSink {
                stats: &mut self.stats,
                escrow: &mut self.escrow,
            },
        )?;

        let label = self.labels.excluding_literal(&name).extract(
            &frame,
            metadata.camera.as_ref(),
            source.mountpoint(),
            self.config.preserve_folders,
        );
        let target = target_folder(
            &self.config.target,
            &resolved.value,
            label.as_deref(),
            self.config.filing_preference,
        );

        let decision = DestinationResolver::new(&LocalFs, self.policy.clone()).resolve_folder(
            folder,
            &target,
            &name,
            &mut EscrowSink {
                stats: &mut self.stats,
                escrow: &mut self.escrow,
            },
        )?;

        let current_folder = folder.parent().unwrap_or(Path::new("")).to_path_buf();
        if !decision.required {
            self.stats.record_correct(&current_folder);
            return Ok(FileOutcome::Unchanged);
        }

        let destination = decision.destination();
        self.stats.record_move(&current_folder, &decision.target_folder);
        self.escrow.log(
            Level::Info,
            &format!("{} -> {}", folder.display(), destination.display()),
        );

        if self.config.dry_run {
            log::info!(" - dry run, no action");
        } else {
            self.relocator.relocate_dir(folder, &destination)?;
        }
        Ok(FileOutcome::Moved(destination))
    }
}
