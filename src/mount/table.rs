//! Live mount table inspection
//!
//! The table is re-read on every query; mounts can appear or vanish between
//! two calls.

use crate::error::{Error, Result};
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::os::unix::ffi::OsStringExt;
use std::path::{Path, PathBuf};

/// Kernel view of currently mounted filesystems
pub const PROC_MOUNTS: &str = "/proc/mounts";

/// One row of the mount table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountTableEntry {
    /// Mounted device or pseudo source
    pub source: PathBuf,
    /// Where it is mounted
    pub mount_point: PathBuf,
    /// Filesystem type
    pub fstype: String,
}

impl MountTableEntry {
    /// Parse a fstab formatted line, returns None for blank or short lines
    fn parse(line: &[u8]) -> Option<Self> {
        let mut fields = line
            .split(|b| *b == b' ' || *b == b'\t')
            .filter(|f| !f.is_empty());

        let source = fields.next()?;
        let mount_point = fields.next()?;
        let fstype = fields.next()?;

        Some(Self {
            source: PathBuf::from(OsString::from_vec(unescape(source))),
            mount_point: PathBuf::from(OsString::from_vec(unescape(mount_point))),
            fstype: String::from_utf8_lossy(&unescape(fstype)).into_owned(),
        })
    }
}

/// Decode the octal escapes (`\040`, `\011`, `\012`, `\134`) the kernel
/// uses for whitespace and backslashes in mount table fields
fn unescape(field: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(field.len());
    let mut i = 0;
    while i < field.len() {
        if field[i] == b'\\' && i + 3 < field.len() && is_octal_escape(&field[i + 1..i + 4]) {
            let value = field[i + 1..i + 4]
                .iter()
                .fold(0u32, |acc, d| acc * 8 + u32::from(d - b'0'));
            if let Ok(byte) = u8::try_from(value) {
                out.push(byte);
                i += 4;
                continue;
            }
        }
        out.push(field[i]);
        i += 1;
    }
    out
}

fn is_octal_escape(digits: &[u8]) -> bool {
    digits.len() == 3 && digits.iter().all(|d| (b'0'..=b'7').contains(d))
}

/// Handle on a mount table file, `/proc/mounts` unless told otherwise
#[derive(Debug, Clone)]
pub struct MountTable {
    path: PathBuf,
}

impl MountTable {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn open(&self) -> Result<BufReader<File>> {
        let file = File::open(&self.path).map_err(|e| self.unavailable(e))?;
        Ok(BufReader::new(file))
    }

    fn unavailable(&self, source: std::io::Error) -> Error {
        Error::MountTable {
            path: self.path.clone(),
            source,
        }
    }

    /// All current entries
    pub fn entries(&self) -> Result<Vec<MountTableEntry>> {
        let mut entries = Vec::new();
        for line in self.open()?.split(b'\n') {
            let line = line.map_err(|e| self.unavailable(e))?;
            if let Some(entry) = MountTableEntry::parse(&line) {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    /// Whether something is mounted exactly at `path`.
    ///
    /// The comparison is byte for byte: `/a/b/` does not match a mount at
    /// `/a/b`, and neither does `/a`.
    pub fn is_mounted(&self, path: &Path) -> Result<bool> {
        // The reader is dropped, and the table closed, on every return
        let reader = self.open()?;
        for line in reader.split(b'\n') {
            let line = line.map_err(|e| self.unavailable(e))?;
            if let Some(entry) = MountTableEntry::parse(&line) {
                if entry.mount_point.as_os_str() == path.as_os_str() {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

impl Default for MountTable {
    fn default() -> Self {
        Self::new(PROC_MOUNTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
proc /proc proc rw,nosuid,nodev,noexec,relatime 0 0
/dev/sda1 / ext4 rw,relatime 0 0
/dev/sda2 /home ext4 rw,relatime 0 0
/home/bob /home/jail/bob/home/bob ext4 rw,relatime 0 0
/dev/sdb1 /mnt/my\\040disk vfat rw 0 0
";

    fn sample_table() -> (tempfile::TempDir, MountTable) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mounts");
        std::fs::write(&path, SAMPLE).unwrap();
        (dir, MountTable::new(path))
    }

    #[test]
    fn test_exact_match_only() {
        let (_dir, table) = sample_table();
        assert!(table.is_mounted(Path::new("/home")).unwrap());
        assert!(table.is_mounted(Path::new("/home/jail/bob/home/bob")).unwrap());
        // Prefixes, extensions and trailing slashes do not match
        assert!(!table.is_mounted(Path::new("/home/jail")).unwrap());
        assert!(!table.is_mounted(Path::new("/home/jail/bob/home/bobby")).unwrap());
        assert!(!table.is_mounted(Path::new("/home/")).unwrap());
    }

    #[test]
    fn test_escaped_mount_point() {
        let (_dir, table) = sample_table();
        assert!(table.is_mounted(Path::new("/mnt/my disk")).unwrap());
        assert!(!table.is_mounted(Path::new("/mnt/my\\040disk")).unwrap());
    }

    #[test]
    fn test_entries() {
        let (_dir, table) = sample_table();
        let entries = table.entries().unwrap();
        assert_eq!(entries.len(), 5);
        assert_eq!(entries[0].source, PathBuf::from("proc"));
        assert_eq!(entries[0].mount_point, PathBuf::from("/proc"));
        assert_eq!(entries[0].fstype, "proc");
    }

    #[test]
    fn test_unopenable_table() {
        let dir = tempfile::tempdir().unwrap();
        let table = MountTable::new(dir.path().join("missing"));
        let err = table.is_mounted(Path::new("/")).unwrap_err();
        assert!(matches!(err, Error::MountTable { .. }));
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape(b"a\\040b"), b"a b".to_vec());
        assert_eq!(unescape(b"tab\\011"), b"tab\t".to_vec());
        assert_eq!(unescape(b"back\\134slash"), b"back\\slash".to_vec());
        // Not an escape: left alone
        assert_eq!(unescape(b"a\\09"), b"a\\09".to_vec());
        assert_eq!(unescape(b"end\\"), b"end\\".to_vec());
    }
}
