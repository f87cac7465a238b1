use assert_cmd::Command;
use assert_fs::TempDir;
use assert_fs::fixture::ChildPath;
use assert_fs::prelude::*;
use filetime::FileTime;

// 2021-01-01 00:00:00 UTC
pub const LATER_MTIME: i64 = 1_609_459_200;

/// A `photobinner` command pinned to UTC and to an empty config file, so the
/// user's own ~/.photobinner.json never leaks into a test.
pub fn photobinner(temp_dir: &TempDir) -> Command {
    let config = temp_dir.child("config.json");
    if !config.path().exists() {
        config.write_str("{}").unwrap();
    }
    let mut cmd = Command::cargo_bin("photobinner").unwrap();
    cmd.arg("--config").arg(config.path());
    cmd
}

/// Writes a fake media file and backdates its mtime.
pub fn media_file(temp_dir: &TempDir, relative: &str, content: &str, mtime: i64) -> ChildPath {
    let file = temp_dir.child(relative);
    file.write_str(content).unwrap();
    filetime::set_file_mtime(file.path(), FileTime::from_unix_time(mtime, 0)).unwrap();
    file
}
