//! Finding the device behind a mounted DVD directory
//!
//! When a directory is opened, reading through the underlying device is
//! preferred: it is the only way to switch CSS title keys. Each platform
//! keeps its mount table somewhere else, and BSD-like systems and Solaris
//! want the raw character device rather than the block device.

use std::path::{Path, PathBuf};
use tracing::debug;

/// Device mounted on `mount_point`, as the platform's mount table records it
///
/// `path` is normalized with [`mount_point`] first. Returns `None`
/// when nothing is mounted there or the platform has no supported table.
pub fn resolve_underlying_device(path: &Path) -> Option<PathBuf> {
    let mount_point = mount_point(path);
    let target = mount_point.to_str()?;

    for table in MOUNT_TABLES {
        let Ok(contents) = std::fs::read_to_string(table) else {
            debug!("cannot read mount table {table}");
            continue;
        };
        if let Some(device) = find_mount(&contents, target) {
            return Some(raw_device(Path::new(&device)));
        }
    }
    None
}

#[cfg(target_os = "linux")]
const MOUNT_TABLES: &[&str] = &["/proc/mounts", "/etc/mtab"];

#[cfg(any(
    target_os = "macos",
    target_os = "freebsd",
    target_os = "dragonfly",
    target_os = "openbsd",
    target_os = "netbsd"
))]
const MOUNT_TABLES: &[&str] = &["/etc/fstab"];

#[cfg(any(target_os = "solaris", target_os = "illumos"))]
const MOUNT_TABLES: &[&str] = &["/etc/mnttab"];

#[cfg(not(any(
    target_os = "linux",
    target_os = "macos",
    target_os = "freebsd",
    target_os = "dragonfly",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "solaris",
    target_os = "illumos"
)))]
const MOUNT_TABLES: &[&str] = &[];

/// Directory a disc would be mounted on, given a path into it
///
/// Drops a trailing `VIDEO_TS` component, in any case. A bare `/VIDEO_TS`
/// becomes `/`.
pub fn mount_point(path: &Path) -> PathBuf {
    let is_video_ts = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.eq_ignore_ascii_case("video_ts"));
    match path.parent() {
        Some(parent) if is_video_ts => parent.to_path_buf(),
        _ => path.to_path_buf(),
    }
}

/// Device field of the mount table line whose mount point is `target`
///
/// Understands the whitespace separated `device mount-point ...` layout
/// shared by `/proc/mounts`, `/etc/mtab`, `/etc/fstab` and `/etc/mnttab`,
/// including the `\040` style escapes Linux uses for spaces.
pub fn find_mount(table: &str, target: &str) -> Option<String> {
    table
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .find_map(|line| {
            let mut fields = line.split_whitespace();
            let device = fields.next()?;
            let dir = unescape(fields.next()?);
            let dir = dir.trim_end_matches('/');
            let dir = if dir.is_empty() { "/" } else { dir };
            (dir == target).then(|| unescape(device))
        })
}

/// Decode octal escapes such as `\040`
fn unescape(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\'
            && let Some(digits) = bytes.get(i + 1..i + 4)
            && digits.iter().all(|b| (b'0'..=b'7').contains(b))
        {
            let value = digits
                .iter()
                .fold(0u32, |acc, b| acc * 8 + u32::from(b - b'0'));
            if let Ok(byte) = u8::try_from(value) {
                out.push(byte);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Rewrite a block device path to the raw device this platform reads DVDs
/// through
pub fn raw_device(device: &Path) -> PathBuf {
    let Some(name) = device.to_str() else {
        return device.to_path_buf();
    };
    let raw = if cfg!(any(
        target_os = "macos",
        target_os = "openbsd",
        target_os = "netbsd"
    )) {
        bsd_raw_device(name)
    } else if cfg!(any(target_os = "solaris", target_os = "illumos")) {
        solaris_raw_device(name)
    } else {
        name.to_string()
    };
    PathBuf::from(raw)
}

/// `/dev/cd0c` becomes `/dev/rcd0c`; anything outside `/dev/` or already
/// raw is returned unchanged
pub fn bsd_raw_device(device: &str) -> String {
    match device.strip_prefix("/dev/") {
        Some(rest) if !rest.starts_with('r') => format!("/dev/r{rest}"),
        _ => device.to_string(),
    }
}

/// `/dev/dsk/c0t6d0s0` becomes `/dev/rdsk/c0t6d0s0`
pub fn solaris_raw_device(device: &str) -> String {
    device.replacen("/dsk/", "/rdsk/", 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROC_MOUNTS: &str = "\
sysfs /sys sysfs rw,nosuid,nodev,noexec,relatime 0 0
/dev/sda1 / ext4 rw,relatime 0 0
/dev/sr0 /media/cdrom udf ro,nosuid,nodev 0 0
/dev/sr1 /media/My\\040Movie udf ro 0 0
";

    #[test]
    fn test_mount_point_strips_video_ts() {
        assert_eq!(mount_point(Path::new("/media/cdrom")), Path::new("/media/cdrom"));
        assert_eq!(
            mount_point(Path::new("/media/cdrom/VIDEO_TS")),
            Path::new("/media/cdrom")
        );
        assert_eq!(
            mount_point(Path::new("/media/cdrom/video_ts/")),
            Path::new("/media/cdrom")
        );
        assert_eq!(mount_point(Path::new("/VIDEO_TS")), Path::new("/"));
        assert_eq!(mount_point(Path::new("/")), Path::new("/"));
    }

    #[test]
    fn test_find_mount() {
        assert_eq!(
            find_mount(PROC_MOUNTS, "/media/cdrom").as_deref(),
            Some("/dev/sr0")
        );
        assert_eq!(find_mount(PROC_MOUNTS, "/").as_deref(), Some("/dev/sda1"));
        assert_eq!(
            find_mount(PROC_MOUNTS, "/media/My Movie").as_deref(),
            Some("/dev/sr1")
        );
        assert_eq!(find_mount(PROC_MOUNTS, "/media"), None);
    }

    #[test]
    fn test_fstab_comments_ignored() {
        let fstab = "# /dev/cd0c /cdrom cd9660 ro 0 0\n/dev/cd1c /cdrom/ cd9660 ro,noauto 0 0\n";
        assert_eq!(find_mount(fstab, "/cdrom").as_deref(), Some("/dev/cd1c"));
    }

    #[test]
    fn test_raw_device_rewrites() {
        assert_eq!(bsd_raw_device("/dev/cd0c"), "/dev/rcd0c");
        assert_eq!(bsd_raw_device("/dev/rcd0c"), "/dev/rcd0c");
        assert_eq!(bsd_raw_device("/vol/cd0c"), "/vol/cd0c");
        assert_eq!(solaris_raw_device("/dev/dsk/c0t6d0s0"), "/dev/rdsk/c0t6d0s0");
        assert_eq!(solaris_raw_device("/vol/rdsk/movie"), "/vol/rdsk/movie");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_linux_keeps_block_device() {
        assert_eq!(raw_device(Path::new("/dev/sr0")), Path::new("/dev/sr0"));
    }

    #[test]
    fn test_unmounted_directory() {
        let dir = std::env::temp_dir().join("dvdread-surely-not-a-mount-point");
        assert_eq!(resolve_underlying_device(&dir), None);
    }
}
