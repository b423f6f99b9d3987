//! Unified error types for jailmount

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Exit status used when a privileged setup step fails part way.
///
/// A half-jailed session must never be handed to the user, so every
/// orchestration fault terminates the process with this status.
pub const FATAL_EXIT_STATUS: i32 = 17;

/// Main error type for jailmount operations
#[derive(Error, Debug)]
pub enum Error {
    // Config errors
    #[error("Failed to read mount policy '{path}': {source}")]
    ConfigRead { path: PathBuf, source: io::Error },

    #[error("Failed to parse mount policy: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Mount policy validation failed: {0}")]
    ConfigValidation(String),

    // Path derivation errors
    #[error("No jail marker '/./' in home directory '{0}'")]
    NoJailMarker(String),

    #[error("Cannot extract a username from '{path}' with jail prefix '{prefix}'")]
    InvalidJailPath { path: String, prefix: String },

    #[error("Jail '{jail}' does not belong to user '{user}'")]
    JailOwnership { jail: String, user: String },

    // Validation errors
    #[error("Jail root '{0}' is not reachable")]
    JailRootUnreachable(PathBuf),

    #[error("Jail '{0}' failed the safety check")]
    UnsafeJail(PathBuf),

    // Mount errors
    #[error("Unable to open mount table '{path}': {source}")]
    MountTable { path: PathBuf, source: io::Error },

    #[error("Unable to create {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: nix::errno::Errno,
    },

    #[error("Unable to mount {what} to {target}: {source}")]
    Mount {
        what: String,
        target: PathBuf,
        source: nix::errno::Errno,
    },

    #[error("Mount sequence cannot enter stage '{0}'")]
    StageOrder(&'static str),
}

impl Error {
    /// Process exit status for this error.
    ///
    /// Faults raised while mounting or while deriving the user for a jail
    /// are fatal; everything else is an ordinary command failure.
    pub fn exit_status(&self) -> i32 {
        match self {
            Error::MountTable { .. }
            | Error::CreateDir { .. }
            | Error::Mount { .. }
            | Error::InvalidJailPath { .. }
            | Error::StageOrder(_) => FATAL_EXIT_STATUS,
            _ => 1,
        }
    }
}

/// Result type alias for jailmount operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mount_faults_are_fatal() {
        let err = Error::Mount {
            what: "/home/bob".to_string(),
            target: PathBuf::from("/home/jail/bob/home/bob"),
            source: nix::errno::Errno::EPERM,
        };
        assert_eq!(err.exit_status(), FATAL_EXIT_STATUS);

        let err = Error::InvalidJailPath {
            path: "/x".to_string(),
            prefix: "/home/jail/".to_string(),
        };
        assert_eq!(err.exit_status(), FATAL_EXIT_STATUS);
    }

    #[test]
    fn test_advisory_errors_exit_one() {
        assert_eq!(Error::NoJailMarker("/home/bob".into()).exit_status(), 1);
        assert_eq!(Error::UnsafeJail(PathBuf::from("/home/jail/bob")).exit_status(), 1);
    }

    #[test]
    fn test_display() {
        let err = Error::NoJailMarker("/home/bob".into());
        assert_eq!(
            err.to_string(),
            "No jail marker '/./' in home directory '/home/bob'"
        );
    }
}
