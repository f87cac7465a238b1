use regex::Regex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};
use walkdir::WalkDir;

use crate::photobinner_core::media::is_media_file;

/// Panorama folders, relocated as a unit instead of file by file.
static STITCH_FOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^STITCH_[0-9]+$").unwrap());
/// Frames of a panorama inside a stitch folder.
static STITCH_FILE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^ST[A-Z]_[0-9]+\.JPG$").unwrap());

pub fn is_stitch_folder(name: &str) -> bool {
    STITCH_FOLDER.is_match(name)
}

/// First panorama frame in `folder` by name, used to date the whole folder.
pub fn first_stitch_file(folder: &Path) -> io::Result<Option<PathBuf>> {
    let mut frames = Vec::new();
    for entry in fs::read_dir(folder)? {
        let entry = entry?;
        let name = entry.file_name();
        if entry.file_type()?.is_file() && STITCH_FILE.is_match(&name.to_string_lossy()) {
            frames.push(entry.path());
        }
    }
    frames.sort();
    Ok(frames.into_iter().next())
}

/// Somewhere files come from.
pub trait Source {
    fn name(&self) -> &str;

    /// Root the source's paths are relative to, used for labels.
    fn mountpoint(&self) -> Option<&Path>;

    /// Whether the source is reachable and has anything to offer.
    fn verify(&self) -> bool;

    /// Files to process, in walk order. Stops yielding once cancelled.
    fn paths(&self) -> Box<dyn Iterator<Item = PathBuf> + '_>;

    /// Panorama folders to relocate whole. They are never part of `paths`.
    fn stitch_folders(&self) -> Vec<PathBuf> {
        Vec::new()
    }

    fn cancel(&self);
}

/// A directory tree on a mounted filesystem.
pub struct FolderSource {
    name: String,
    mountpoint: PathBuf,
    mask: Option<Regex>,
    excluded: Vec<PathBuf>,
    cancelled: Arc<AtomicBool>,
}

impl FolderSource {
    pub fn new(mountpoint: PathBuf, mask: Option<Regex>, excluded: Vec<PathBuf>) -> Self {
        Self {
            name: mountpoint.display().to_string(),
            mountpoint,
            mask,
            excluded,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    fn wanted(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        match &self.mask {
            Some(mask) => !name.starts_with("._") && mask.is_match(name),
            None => is_media_file(path),
        }
    }

    fn descend(&self, entry: &walkdir::DirEntry) -> bool {
        if !entry.file_type().is_dir() || entry.depth() == 0 {
            return true;
        }
        if is_stitch_folder(&entry.file_name().to_string_lossy()) {
            return false;
        }
        !self.excluded.iter().any(|e| entry.path() == e.as_path())
    }
}

impl Source for FolderSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn mountpoint(&self) -> Option<&Path> {
        Some(&self.mountpoint)
    }

    fn verify(&self) -> bool {
        if !self.mountpoint.is_dir() {
            log::warn!("Supplied path '{}' is not a directory", self.mountpoint.display());
            return false;
        }
        self.paths().next().is_some() || !self.stitch_folders().is_empty()
    }

    fn paths(&self) -> Box<dyn Iterator<Item = PathBuf> + '_> {
        log::debug!("Walking {}..", self.mountpoint.display());
        let cancelled = Arc::clone(&self.cancelled);
        let walker = WalkDir::new(&self.mountpoint)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| self.descend(e))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    log::warn!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| self.wanted(p))
            .take_while(move |_| !cancelled.load(Ordering::SeqCst));
        Box::new(walker)
    }

    fn stitch_folders(&self) -> Vec<PathBuf> {
        let mut folders = Vec::new();
        let walker = WalkDir::new(&self.mountpoint)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                let name = e.file_name().to_string_lossy();
                if e.depth() > 0 && e.file_type().is_dir() && is_stitch_folder(&name) {
                    folders.push(e.path().to_path_buf());
                    return false;
                }
                self.descend(e)
            });
        for entry in walker {
            if let Err(e) = entry {
                log::warn!("Skipping unreadable entry: {}", e);
            }
        }
        if !folders.is_empty() {
            log::info!(" - {} stitch folders found", folders.len());
        }
        folders
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

/// A single file given on the command line.
pub struct SingleFileSource {
    name: String,
    path: PathBuf,
    mountpoint: Option<PathBuf>,
}

impl SingleFileSource {
    pub fn new(path: PathBuf) -> Self {
        Self {
            name: path.display().to_string(),
            mountpoint: path.parent().map(Path::to_path_buf),
            path,
        }
    }
}

impl Source for SingleFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn mountpoint(&self) -> Option<&Path> {
        self.mountpoint.as_deref()
    }

    fn verify(&self) -> bool {
        self.path.is_file()
    }

    fn paths(&self) -> Box<dyn Iterator<Item = PathBuf> + '_> {
        Box::new(std::iter::once(self.path.clone()))
    }

    fn cancel(&self) {}
}

/// Picks the source type for a user-supplied path.
pub fn source_for_path(
    path: &Path,
    mask: Option<Regex>,
    excluded: Vec<PathBuf>,
) -> Box<dyn Source> {
    if path.is_file() {
        Box::new(SingleFileSource::new(path.to_path_buf()))
    } else {
        Box::new(FolderSource::new(path.to_path_buf(), mask, excluded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    #[test]
    fn test_folder_source_filters_and_skips() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("a.jpg").touch().unwrap();
        temp.child("._a.jpg").touch().unwrap();
        temp.child("notes.txt").touch().unwrap();
        temp.child("trip/b.MOV").touch().unwrap();
        temp.child("STITCH_01/c.jpg").touch().unwrap();
        temp.child("exact_matches/d.jpg").touch().unwrap();

        let source = FolderSource::new(
            temp.path().to_path_buf(),
            None,
            vec![temp.path().join("exact_matches")],
        );
        assert!(source.verify());
        let paths: Vec<PathBuf> = source.paths().collect();
        assert_eq!(
            paths,
            vec![temp.path().join("a.jpg"), temp.path().join("trip/b.MOV")]
        );
    }

    #[test]
    fn test_stitch_folders_and_frames() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("a.jpg").touch().unwrap();
        temp.child("trip/STITCH_01/STB_0002.JPG").touch().unwrap();
        temp.child("trip/STITCH_01/STA_0001.JPG").touch().unwrap();
        temp.child("trip/STITCH_01/notes.txt").touch().unwrap();
        temp.child("STITCH_7/readme.txt").touch().unwrap();
        temp.child("exact_matches/STITCH_02/STA_0001.JPG").touch().unwrap();

        let source = FolderSource::new(
            temp.path().to_path_buf(),
            None,
            vec![temp.path().join("exact_matches")],
        );
        assert_eq!(
            source.stitch_folders(),
            vec![temp.path().join("STITCH_7"), temp.path().join("trip/STITCH_01")]
        );
        assert_eq!(
            first_stitch_file(&temp.path().join("trip/STITCH_01")).unwrap(),
            Some(temp.path().join("trip/STITCH_01/STA_0001.JPG"))
        );
        assert_eq!(first_stitch_file(&temp.path().join("STITCH_7")).unwrap(), None);
    }

    #[test]
    fn test_stitch_folder_alone_verifies() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("Alps/STITCH_01/STA_0001.JPG").touch().unwrap();

        let source = FolderSource::new(temp.path().to_path_buf(), None, vec![]);
        assert_eq!(source.paths().count(), 0);
        assert!(source.verify());
    }

    #[test]
    fn test_mask_replaces_media_filter() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("a.jpg").touch().unwrap();
        temp.child("VID_1.mp4").touch().unwrap();

        let source = FolderSource::new(
            temp.path().to_path_buf(),
            Some(Regex::new(r"^VID_").unwrap()),
            vec![],
        );
        let paths: Vec<PathBuf> = source.paths().collect();
        assert_eq!(paths, vec![temp.path().join("VID_1.mp4")]);
    }

    #[test]
    fn test_cancel_stops_paths() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("a.jpg").touch().unwrap();
        temp.child("b.jpg").touch().unwrap();

        let source = FolderSource::new(temp.path().to_path_buf(), None, vec![]);
        let mut paths = source.paths();
        assert!(paths.next().is_some());
        source.cancel();
        assert!(paths.next().is_none());
    }

    #[test]
    fn test_single_file_source() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("a.jpg");
        file.touch().unwrap();
        let source = source_for_path(file.path(), None, vec![]);
        assert!(source.verify());
        assert_eq!(source.mountpoint(), Some(temp.path()));
        assert_eq!(source.paths().count(), 1);
    }
}
