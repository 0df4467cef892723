//! File lookup in a DVD copied to a directory
//!
//! Copies made on case-insensitive filesystems end up with any mix of
//! upper and lower case names, so every lookup compares names ignoring
//! ASCII case.

use std::path::{Path, PathBuf};
use tracing::debug;

/// Find `name` in `root`, `root/VIDEO_TS` or `root/video_ts`
///
/// A leading `/VIDEO_TS/` on `name` is ignored.
pub fn find_dvd_file(root: &Path, name: &str) -> Option<PathBuf> {
    let name = strip_video_ts(name);
    [
        root.to_path_buf(),
        root.join("VIDEO_TS"),
        root.join("video_ts"),
    ]
    .iter()
    .find_map(|dir| find_in_directory(dir, name))
}

fn strip_video_ts(name: &str) -> &str {
    const PREFIX: &str = "/VIDEO_TS/";
    match name.get(..PREFIX.len()) {
        Some(head) if head.eq_ignore_ascii_case(PREFIX) => &name[PREFIX.len()..],
        _ => name,
    }
}

/// Case-insensitive match of a regular file in one directory
fn find_in_directory(dir: &Path, name: &str) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    let found = entries
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.path().is_file())
        .find(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|entry| entry.eq_ignore_ascii_case(name))
        })
        .map(|entry| entry.path());
    if let Some(path) = &found {
        debug!("found {name} at {}", path.display());
    }
    found
}
