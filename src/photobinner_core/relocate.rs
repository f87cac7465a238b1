use clap::ValueEnum;
use filetime::FileTime;
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;
use walkdir::WalkDir;

use crate::photobinner_core::error::{PhotobinnerError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferMethod {
    /// Leave the original in place.
    #[default]
    Copy,
    /// Remove the original after a successful transfer.
    Move,
}

/// Access and modification times to stamp on a relocated file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileTimes {
    pub accessed: SystemTime,
    pub modified: SystemTime,
}

/// Performs the physical transfer once a destination has been decided.
#[derive(Debug, Clone, Copy)]
pub struct FileRelocator {
    method: TransferMethod,
}

impl FileRelocator {
    pub fn new(method: TransferMethod) -> Self {
        Self { method }
    }

    pub fn relocate(&self, source: &Path, destination: &Path, times: Option<FileTimes>) -> Result<()> {
        self.transfer(source, destination, times)
            .map_err(|error| PhotobinnerError::RelocateFailed {
                source_path: source.to_path_buf(),
                destination: destination.to_path_buf(),
                error,
            })
    }

    /// Relocates a whole directory, keeping each file's timestamps.
    pub fn relocate_dir(&self, source: &Path, destination: &Path) -> Result<()> {
        self.transfer_dir(source, destination)
            .map_err(|error| PhotobinnerError::RelocateFailed {
                source_path: source.to_path_buf(),
                destination: destination.to_path_buf(),
                error,
            })
    }

    fn transfer_dir(&self, source: &Path, destination: &Path) -> io::Result<()> {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }

        if self.method == TransferMethod::Move {
            match fs::rename(source, destination) {
                Ok(()) => return Ok(()),
                Err(e) => log::debug!(" - rename failed ({}), falling back to copy and remove", e),
            }
        }

        for entry in WalkDir::new(source).sort_by_file_name() {
            let entry = entry.map_err(io::Error::from)?;
            let relative = entry
                .path()
                .strip_prefix(source)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
            let target = destination.join(relative);
            if entry.file_type().is_dir() {
                fs::create_dir_all(&target)?;
            } else {
                fs::copy(entry.path(), &target)?;
                let meta = entry.metadata().map_err(io::Error::from)?;
                filetime::set_file_times(
                    &target,
                    FileTime::from_last_access_time(&meta),
                    FileTime::from_last_modification_time(&meta),
                )?;
            }
        }

        if self.method == TransferMethod::Move {
            fs::remove_dir_all(source)?;
        }
        Ok(())
    }

    fn transfer(&self, source: &Path, destination: &Path, times: Option<FileTimes>) -> io::Result<()> {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }

        match self.method {
            TransferMethod::Copy => {
                fs::copy(source, destination)?;
                // fs::copy does not carry timestamps over
                if times.is_none() {
                    let meta = fs::metadata(source)?;
                    filetime::set_file_times(
                        destination,
                        FileTime::from_last_access_time(&meta),
                        FileTime::from_last_modification_time(&meta),
                    )?;
                }
            }
            TransferMethod::Move => {
                if let Err(e) = fs::rename(source, destination) {
                    log::debug!(" - rename failed ({}), falling back to copy and remove", e);
                    fs::copy(source, destination)?;
                    fs::remove_file(source)?;
                }
            }
        }

        if let Some(times) = times {
            filetime::set_file_times(
                destination,
                FileTime::from_system_time(times.accessed),
                FileTime::from_system_time(times.modified),
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn test_copy_keeps_original_and_sets_times() {
        let temp = assert_fs::TempDir::new().unwrap();
        let src = temp.child("in/a.jpg");
        src.write_str("pixels").unwrap();
        let dest = temp.child("out/2020/2020-01-01/a.jpg");

        let modified = UNIX_EPOCH + Duration::from_secs(1_577_880_000);
        FileRelocator::new(TransferMethod::Copy)
            .relocate(
                src.path(),
                dest.path(),
                Some(FileTimes {
                    accessed: modified,
                    modified,
                }),
            )
            .unwrap();

        src.assert("pixels");
        dest.assert("pixels");
        let meta = fs::metadata(dest.path()).unwrap();
        assert_eq!(meta.modified().unwrap(), modified);
    }

    #[test]
    fn test_move_removes_original() {
        let temp = assert_fs::TempDir::new().unwrap();
        let src = temp.child("a.jpg");
        src.write_str("pixels").unwrap();
        let dest = temp.child("2020/2020-01-01/a.jpg");

        FileRelocator::new(TransferMethod::Move)
            .relocate(src.path(), dest.path(), None)
            .unwrap();

        assert!(!src.path().exists());
        dest.assert("pixels");
    }

    #[test]
    fn test_copy_dir_keeps_tree_and_times() {
        let temp = assert_fs::TempDir::new().unwrap();
        let shot = temp.child("in/STITCH_01/STA_0001.JPG");
        shot.write_str("left").unwrap();
        temp.child("in/STITCH_01/STB_0002.JPG").write_str("right").unwrap();
        let modified = UNIX_EPOCH + Duration::from_secs(1_577_880_000);
        filetime::set_file_mtime(shot.path(), FileTime::from_system_time(modified)).unwrap();

        let dest = temp.child("out/2020/2020-01-01/STITCH_01");
        FileRelocator::new(TransferMethod::Copy)
            .relocate_dir(temp.child("in/STITCH_01").path(), dest.path())
            .unwrap();

        shot.assert("left");
        dest.child("STA_0001.JPG").assert("left");
        dest.child("STB_0002.JPG").assert("right");
        let meta = fs::metadata(dest.child("STA_0001.JPG").path()).unwrap();
        assert_eq!(meta.modified().unwrap(), modified);
    }

    #[test]
    fn test_move_dir_removes_original() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("in/STITCH_01/STA_0001.JPG").write_str("left").unwrap();
        let dest = temp.child("out/STITCH_01");

        FileRelocator::new(TransferMethod::Move)
            .relocate_dir(temp.child("in/STITCH_01").path(), dest.path())
            .unwrap();

        temp.child("in/STITCH_01").assert(predicates::path::missing());
        dest.child("STA_0001.JPG").assert("left");
    }

    #[test]
    fn test_missing_source_reports_paths() {
        let temp = assert_fs::TempDir::new().unwrap();
        let err = FileRelocator::new(TransferMethod::Copy)
            .relocate(&temp.path().join("nope.jpg"), &temp.path().join("x/nope.jpg"), None)
            .unwrap_err();
        assert!(matches!(err, PhotobinnerError::RelocateFailed { .. }));
    }
}
