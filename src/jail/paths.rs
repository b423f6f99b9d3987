//! Jail and home path derivation
//!
//! A jailed account's home directory in the password database carries a
//! `/./` marker separating the jail root from the home directory as seen
//! inside the jail, e.g. `/home/jail/bob/./home/bob`.

use crate::error::{Error, Result};
use std::fmt;
use std::path::{Path, PathBuf};

/// Separator between jail root and in-jail home
pub const JAIL_MARKER: &str = "/./";

/// Markers starting before this index are ignored, a jail root of three
/// characters or less is never meaningful.
const MIN_MARKER_START: usize = 4;

/// Default directory under which per-user jails live
pub const DEFAULT_JAIL_PREFIX: &str = "/home/jail/";

/// Absolute directory under which every per-user jail root lives, as
/// `<prefix><username>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JailPrefix(String);

impl JailPrefix {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self(prefix.into())
    }

    /// Jail root path for `user`
    pub fn jail_for(&self, user: &str) -> String {
        format!("{}{}", self.0, user)
    }

    /// Extract the username from a jail path of the form `<prefix><user>/`.
    ///
    /// The final character (normally the trailing slash) is dropped. A path
    /// outside the prefix, or one leaving no username behind, is a
    /// precondition violation.
    pub fn extract_user(&self, jail_path: &str) -> Result<String> {
        let invalid = || Error::InvalidJailPath {
            path: jail_path.to_string(),
            prefix: self.0.clone(),
        };

        let rest = jail_path.strip_prefix(self.0.as_str()).ok_or_else(invalid)?;
        let last = rest.char_indices().last().map(|(i, _)| i).ok_or_else(invalid)?;
        if last == 0 {
            return Err(invalid());
        }
        Ok(rest[..last].to_string())
    }

    /// Whether `jail_path` is the jail of `user`, ignoring a trailing slash
    pub fn owns(&self, jail_path: &str, user: &str) -> bool {
        let expected = format!("{}{}/", self.0, user);
        paths_logically_equal(jail_path, &expected)
    }

    /// Whether a jail directory exists for `user`
    pub fn jail_exists_for(&self, user: &str) -> bool {
        Path::new(&self.jail_for(user)).is_dir()
    }

    /// Marker-form home directory for a jailed account.
    ///
    /// `session_home("bob", "/home/bob")` under `/home/jail/` gives
    /// `/home/jail/bob/./home/bob`.
    pub fn session_home(&self, user: &str, home: &str) -> String {
        format!("{}{}/.{}", self.0, user, home)
    }
}

impl Default for JailPrefix {
    fn default() -> Self {
        Self::new(DEFAULT_JAIL_PREFIX)
    }
}

impl fmt::Display for JailPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Root directory of a confined session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JailRoot(String);

impl JailRoot {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }

    /// Absolute host path of `inner`, a path as seen inside the jail.
    ///
    /// Always returns a freshly built path; a trailing slash on the root is
    /// not doubled.
    pub fn join(&self, inner: &str) -> PathBuf {
        let root = self.0.strip_suffix('/').unwrap_or(&self.0);
        if inner.starts_with('/') {
            PathBuf::from(format!("{}{}", root, inner))
        } else {
            PathBuf::from(format!("{}/{}", root, inner))
        }
    }
}

impl fmt::Display for JailRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user's real home directory, which is also where it appears inside the jail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomeDirectory(String);

impl HomeDirectory {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Real home path on the host
    pub fn real(&self) -> &Path {
        Path::new(&self.0)
    }

    /// Where the home directory must be bind mounted for `root`
    pub fn target_in(&self, root: &JailRoot) -> PathBuf {
        root.join(&self.0)
    }
}

impl fmt::Display for HomeDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Split a marker home directory into jail root and in-jail home.
///
/// The rightmost marker wins, so with several markers the user ends up in
/// the most deeply nested jail.
pub fn split_jail_and_home(raw: &str) -> Result<(JailRoot, HomeDirectory)> {
    let bytes = raw.as_bytes();
    let marker = JAIL_MARKER.as_bytes();

    let mut start = bytes.len().saturating_sub(marker.len());
    while start >= MIN_MARKER_START {
        if &bytes[start..start + marker.len()] == marker {
            // Home keeps the marker's trailing slash
            return Ok((
                JailRoot::new(&raw[..start]),
                HomeDirectory::new(&raw[start + 2..]),
            ));
        }
        start -= 1;
    }

    Err(Error::NoJailMarker(raw.to_string()))
}

/// Compare two directory paths, tolerating one trailing slash of difference
pub fn paths_logically_equal(a: &str, b: &str) -> bool {
    if a.len() == b.len() {
        return a == b;
    }
    let (short, long) = if a.len() < b.len() { (a, b) } else { (b, a) };
    long.len() == short.len() + 1
        && long.ends_with('/')
        && !short.ends_with('/')
        && long.starts_with(short)
}

/// `path` with exactly one trailing slash added when missing
pub fn with_trailing_slash(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{}/", path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_rightmost_marker_wins() {
        let (jail, home) = split_jail_and_home("/home/./jail/./x").unwrap();
        assert_eq!(jail.as_str(), "/home/./jail");
        assert_eq!(home.to_string(), "/x");
    }

    #[test]
    fn test_split_typical_home() {
        let (jail, home) = split_jail_and_home("/home/jail/bob/./home/bob").unwrap();
        assert_eq!(jail.as_str(), "/home/jail/bob");
        assert_eq!(home.to_string(), "/home/bob");
    }

    #[test]
    fn test_split_rejects_marker_near_start() {
        assert!(matches!(
            split_jail_and_home("/ab/./c"),
            Err(Error::NoJailMarker(_))
        ));
        assert!(split_jail_and_home("/./home").is_err());
        assert!(split_jail_and_home("/abc/./x").is_ok());
    }

    #[test]
    fn test_split_without_marker() {
        assert!(matches!(
            split_jail_and_home("/home/bob"),
            Err(Error::NoJailMarker(_))
        ));
        assert!(split_jail_and_home("").is_err());
        assert!(split_jail_and_home("/./").is_err());
    }

    #[test]
    fn test_paths_logically_equal() {
        assert!(paths_logically_equal("/a/b", "/a/b/"));
        assert!(paths_logically_equal("/a/b/", "/a/b"));
        assert!(paths_logically_equal("/a/b", "/a/b"));
        assert!(!paths_logically_equal("/a/b", "/a/bc"));
        assert!(!paths_logically_equal("/a/b", "/a/b//"));
        assert!(!paths_logically_equal("/a/b/", "/a/c/"));
    }

    #[test]
    fn test_extract_user() {
        let prefix = JailPrefix::new("/jails/");
        assert_eq!(prefix.extract_user("/jails/alice/").unwrap(), "alice");
    }

    #[test]
    fn test_extract_user_precondition() {
        let prefix = JailPrefix::new("/jails/");
        assert!(matches!(
            prefix.extract_user("/jails/"),
            Err(Error::InvalidJailPath { .. })
        ));
        assert!(prefix.extract_user("/jails/a").is_err());
        assert!(prefix.extract_user("/elsewhere/alice/").is_err());
    }

    #[test]
    fn test_owns() {
        let prefix = JailPrefix::new("/jails/");
        assert!(prefix.owns("/jails/alice", "alice"));
        assert!(prefix.owns("/jails/alice/", "alice"));
        assert!(!prefix.owns("/jails/alice2", "alice"));
        assert!(!prefix.owns("/jails/bob/", "alice"));
    }

    #[test]
    fn test_jail_exists_for() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = JailPrefix::new(format!("{}/", dir.path().display()));
        std::fs::create_dir(dir.path().join("carol")).unwrap();
        std::fs::write(dir.path().join("dave"), b"").unwrap();

        assert!(prefix.jail_exists_for("carol"));
        assert!(!prefix.jail_exists_for("dave"));
        assert!(!prefix.jail_exists_for("erin"));
    }

    #[test]
    fn test_session_home_splits_back() {
        let prefix = JailPrefix::new("/home/jail/");
        let raw = prefix.session_home("bob", "/home/bob");
        assert_eq!(raw, "/home/jail/bob/./home/bob");

        let (jail, home) = split_jail_and_home(&raw).unwrap();
        assert_eq!(jail.as_str(), "/home/jail/bob");
        assert_eq!(home.to_string(), "/home/bob");
    }

    #[test]
    fn test_join_does_not_double_slash() {
        assert_eq!(
            JailRoot::new("/jails/bob/").join("/proc"),
            PathBuf::from("/jails/bob/proc")
        );
        assert_eq!(
            JailRoot::new("/jails/bob").join("dev/pts"),
            PathBuf::from("/jails/bob/dev/pts")
        );
        assert_eq!(
            HomeDirectory::new("/home/bob").target_in(&JailRoot::new("/jails/bob")),
            PathBuf::from("/jails/bob/home/bob")
        );
    }

    #[test]
    fn test_with_trailing_slash() {
        assert_eq!(with_trailing_slash("/jails/bob"), "/jails/bob/");
        assert_eq!(with_trailing_slash("/jails/bob/"), "/jails/bob/");
    }
}
