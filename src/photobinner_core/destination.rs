//! Decides whether a file has to move and where it finally lands.
//!
//! Name collisions are settled by content hash only. Names and sizes are the
//! very things already known to collide, so they prove nothing.

use base64::{Engine, engine::general_purpose};
use sha2::{Digest, Sha256};
use std::cell::OnceCell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::photobinner_core::anomaly::{AnomalyKind, AnomalySink};
use crate::photobinner_core::error::Result;

/// Name of the folder holding same-name, different-content files.
pub const DUPE_FOLDER: &str = "dupe";

/// Calculate the SHA256 hash of a file at the given path and return it as base64.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(general_purpose::STANDARD.encode(hasher.finalize()))
}

/// A file being processed.
#[derive(Debug, Clone)]
pub struct FileDescriptor {
    /// Where the file lives on its source.
    pub original_path: PathBuf,
    /// Where the bytes can be read; differs from `original_path` only for staged copies.
    pub working_path: PathBuf,
    pub size_bytes: u64,
    content_hash: OnceCell<String>,
}

impl FileDescriptor {
    pub fn new(original_path: PathBuf, size_bytes: u64) -> Self {
        Self::staged(original_path.clone(), original_path, size_bytes)
    }

    pub fn staged(original_path: PathBuf, working_path: PathBuf, size_bytes: u64) -> Self {
        Self {
            original_path,
            working_path,
            size_bytes,
            content_hash: OnceCell::new(),
        }
    }

    /// Hash of the working copy, computed on first use and then cached.
    pub fn content_hash(&self, fs: &dyn TargetFs) -> io::Result<&str> {
        if let Some(hash) = self.content_hash.get() {
            return Ok(hash);
        }
        let hash = fs.content_hash(&self.working_path)?;
        Ok(self.content_hash.get_or_init(|| hash))
    }

    pub fn filename(&self) -> String {
        self.original_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string()
    }
}

/// Filesystem queries the resolver relies on.
pub trait TargetFs {
    fn exists(&self, path: &Path) -> io::Result<bool>;
    fn content_hash(&self, path: &Path) -> io::Result<String>;
}

/// `TargetFs` over the local disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl TargetFs for LocalFs {
    fn exists(&self, path: &Path) -> io::Result<bool> {
        path.try_exists()
    }

    fn content_hash(&self, path: &Path) -> io::Result<String> {
        hash_file(path)
    }
}

/// What to do with files whose exact copy already sits at the target.
#[derive(Debug, Clone)]
pub struct DestinationPolicy {
    pub copy_exact_matches: bool,
    pub exact_matches_folder: PathBuf,
}

/// Outcome of destination resolution for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationDecision {
    /// False when nothing has to be done on disk.
    pub required: bool,
    pub target_folder: PathBuf,
    pub final_filename: String,
    pub reason: String,
}

impl DestinationDecision {
    pub fn destination(&self) -> PathBuf {
        self.target_folder.join(&self.final_filename)
    }
}

pub struct DestinationResolver<'a> {
    fs: &'a dyn TargetFs,
    policy: DestinationPolicy,
}

impl<'a> DestinationResolver<'a> {
    pub fn new(fs: &'a dyn TargetFs, policy: DestinationPolicy) -> Self {
        Self { fs, policy }
    }

    pub fn resolve(
        &self,
        source: &FileDescriptor,
        target_folder: &Path,
        filename: &str,
        sink: &mut dyn AnomalySink,
    ) -> Result<DestinationDecision> {
        let new_path = target_folder.join(filename);

        let decision = if source.original_path == new_path {
            self.decision(false, target_folder, filename, "already correct".to_string())
        } else if self.fs.exists(&new_path)? {
            log::debug!(" - another file exists at destination path, comparing files..");
            if self.same_content(source, &new_path)? {
                sink.emit(AnomalyKind::ContentMatchAtTarget, &source.original_path);
                self.exact_match(target_folder, filename)
            } else {
                sink.emit(AnomalyKind::FilenameMatchAtTarget, &source.original_path);
                log::warn!(" - file at destination path is different, we have a duplicate-in-name-only");
                self.dedup_slot(source, target_folder, filename)?
            }
        } else {
            self.decision(
                true,
                target_folder,
                filename,
                format!(
                    "normal move {} -> {}",
                    source.original_path.display(),
                    new_path.display()
                ),
            )
        };

        log::debug!(" - {}", decision.reason);
        Ok(decision)
    }

    /// Decides where a directory moved as a unit should land. Directories carry
    /// no content hash, so an occupied name always goes to the next free dupe slot.
    pub fn resolve_folder(
        &self,
        folder: &Path,
        target_folder: &Path,
        name: &str,
        sink: &mut dyn AnomalySink,
    ) -> Result<DestinationDecision> {
        let new_path = target_folder.join(name);

        let decision = if folder == new_path {
            self.decision(false, target_folder, name, "already correct".to_string())
        } else if self.fs.exists(&new_path)? {
            sink.emit(AnomalyKind::FilenameMatchAtTarget, folder);
            log::warn!(" - a folder named {} already exists at destination", name);
            let mut slot: u64 = 0;
            loop {
                let slot_folder = target_folder.join(DUPE_FOLDER).join(slot.to_string());
                let candidate = slot_folder.join(name);
                if !self.fs.exists(&candidate)? {
                    break self.decision(
                        true,
                        &slot_folder,
                        name,
                        format!("folder name match, modifying new path -> {}", candidate.display()),
                    );
                }
                slot += 1;
            }
        } else {
            self.decision(
                true,
                target_folder,
                name,
                format!("normal move {} -> {}", folder.display(), new_path.display()),
            )
        };

        log::debug!(" - {}", decision.reason);
        Ok(decision)
    }

    fn exact_match(&self, target_folder: &Path, filename: &str) -> DestinationDecision {
        if self.policy.copy_exact_matches {
            let folder = self.policy.exact_matches_folder.as_path();
            log::warn!(" - file at destination path is exact, moving to {}", folder.display());
            self.decision(
                true,
                folder,
                filename,
                format!("exact match at target, moving to {}", folder.display()),
            )
        } else {
            log::warn!(" - file at destination path is exact, not moving");
            self.decision(
                false,
                target_folder,
                filename,
                "exact match already at target".to_string(),
            )
        }
    }

    /// Tries `target/dupe/0`, `target/dupe/1`, ... for a free slot. Stops early
    /// if a slot already holds this file's content. Each occupied slot bumps the
    /// index, and a directory holds finitely many entries, so the loop ends.
    fn dedup_slot(
        &self,
        source: &FileDescriptor,
        target_folder: &Path,
        filename: &str,
    ) -> Result<DestinationDecision> {
        let mut slot: u64 = 0;
        loop {
            let slot_folder = target_folder.join(DUPE_FOLDER).join(slot.to_string());
            let candidate = slot_folder.join(filename);

            if !self.fs.exists(&candidate)? {
                return Ok(self.decision(
                    true,
                    &slot_folder,
                    filename,
                    format!("filename match, modifying new path -> {}", candidate.display()),
                ));
            }
            if self.same_content(source, &candidate)? {
                return Ok(self.decision(
                    false,
                    &slot_folder,
                    filename,
                    format!("this file already exists as a duplicate at {}", candidate.display()),
                ));
            }
            log::debug!(" - dupe slot {} taken", slot);
            slot += 1;
        }
    }

    fn same_content(&self, source: &FileDescriptor, other: &Path) -> Result<bool> {
        let ours = source.content_hash(self.fs)?;
        let theirs = self.fs.content_hash(other)?;
        Ok(ours == theirs)
    }

    fn decision(
        &self,
        required: bool,
        target_folder: &Path,
        filename: &str,
        reason: String,
    ) -> DestinationDecision {
        DestinationDecision {
            required,
            target_folder: target_folder.to_path_buf(),
            final_filename: filename.to_string(),
            reason,
        }
    }
}
