//! Path safety checks
//!
//! A path is fit to sit inside a jail when it is owned by the expected
//! owner and group (or by root), is not a symlink, carries no setuid or
//! setgid bit, and is writable by neither group nor others.
//!
//! [`check_path`] only evaluates. Reporting is done separately through
//! [`report`] so the caller picks the audit sink.

use crate::audit::{AuditSink, Severity};
use std::collections::BTreeSet;
use std::fmt;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

/// Expected owner and group of a checked path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ownership {
    pub uid: u32,
    pub gid: u32,
}

impl Ownership {
    /// root:root, what every system directory of a jail must carry
    pub const ROOT: Ownership = Ownership { uid: 0, gid: 0 };

    pub fn new(uid: u32, gid: u32) -> Self {
        Self { uid, gid }
    }
}

/// A single risk condition found on a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Finding {
    /// The path itself is a symbolic link
    Symlink,
    /// Setuid bit is set
    Setuid,
    /// Setgid bit is set
    Setgid,
    /// Writable by the owning group
    GroupWritable,
    /// Writable by anybody
    OtherWritable,
    /// Owned by neither the expected user nor root
    OwnerMismatch,
    /// Owned by neither the expected group nor root's group
    GroupMismatch,
    /// The path does not exist or cannot be examined
    NotRegularPath,
}

impl Finding {
    /// Severity of this finding given what the path was expected to be owned by.
    ///
    /// Write bits only escalate when the expected owner or group is
    /// privileged.
    pub fn severity(self, expected: Ownership) -> Severity {
        match self {
            Finding::Symlink | Finding::Setuid | Finding::Setgid => Severity::Error,
            Finding::GroupWritable if expected.gid == 0 => Severity::Warning,
            Finding::OtherWritable if expected.uid == 0 => Severity::Error,
            Finding::GroupWritable
            | Finding::OtherWritable
            | Finding::OwnerMismatch
            | Finding::GroupMismatch
            | Finding::NotRegularPath => Severity::Notice,
        }
    }

    /// Human readable condition, as written to the audit trail
    pub fn condition(self, expected: Ownership) -> String {
        match self {
            Finding::Symlink => "is a symlink".to_string(),
            Finding::Setuid => "is setuid".to_string(),
            Finding::Setgid => "is setgid".to_string(),
            Finding::GroupWritable => "is group writable".to_string(),
            Finding::OtherWritable => "is writable for others".to_string(),
            Finding::OwnerMismatch => format!("is not owned by user {}", expected.uid),
            Finding::GroupMismatch => format!("is not owned by group {}", expected.gid),
            Finding::NotRegularPath => "does not exist or is not accessible".to_string(),
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Finding::Symlink => "symlink",
            Finding::Setuid => "setuid",
            Finding::Setgid => "setgid",
            Finding::GroupWritable => "group-writable",
            Finding::OtherWritable => "other-writable",
            Finding::OwnerMismatch => "owner-mismatch",
            Finding::GroupMismatch => "group-mismatch",
            Finding::NotRegularPath => "not-a-regular-path",
        };
        write!(f, "{}", name)
    }
}

/// Every finding raised on one path
///
/// Deliberately not a boolean: a finding that is fatal in one context
/// (a writable `/etc`) may be acceptable in another (the jail root itself).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SafetyVerdict {
    findings: BTreeSet<Finding>,
}

impl SafetyVerdict {
    fn absent() -> Self {
        Self {
            findings: BTreeSet::from([Finding::NotRegularPath]),
        }
    }

    /// No finding at all
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn contains(&self, finding: Finding) -> bool {
        self.findings.contains(&finding)
    }

    /// Findings in a stable order
    pub fn findings(&self) -> impl Iterator<Item = Finding> + '_ {
        self.findings.iter().copied()
    }

    /// Path could not be examined at all
    pub fn is_absent(&self) -> bool {
        self.contains(Finding::NotRegularPath)
    }

    /// Findings that are not covered by `allowed`
    pub fn blocking(&self, allowed: &[Finding]) -> Vec<Finding> {
        self.findings
            .iter()
            .copied()
            .filter(|f| !allowed.contains(f))
            .collect()
    }

    /// True when every finding is in `allowed`
    pub fn passes(&self, allowed: &[Finding]) -> bool {
        self.blocking(allowed).is_empty()
    }
}

impl fmt::Display for SafetyVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.findings.is_empty() {
            return write!(f, "clean");
        }
        let names: Vec<String> = self.findings.iter().map(|f| f.to_string()).collect();
        write!(f, "{}", names.join(", "))
    }
}

/// Evaluate `path` against the expected ownership.
///
/// The path is examined without following symlinks. A path that cannot be
/// examined yields [`Finding::NotRegularPath`] and nothing else.
pub fn check_path(path: &Path, expected: Ownership) -> SafetyVerdict {
    let meta = match std::fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(_) => return SafetyVerdict::absent(),
    };

    let mode = meta.mode();
    let mut findings = BTreeSet::new();

    if meta.file_type().is_symlink() {
        findings.insert(Finding::Symlink);
    }
    if mode & libc::S_ISUID != 0 {
        findings.insert(Finding::Setuid);
    }
    if mode & libc::S_ISGID != 0 {
        findings.insert(Finding::Setgid);
    }
    if mode & libc::S_IWGRP != 0 {
        findings.insert(Finding::GroupWritable);
    }
    if mode & libc::S_IWOTH != 0 {
        findings.insert(Finding::OtherWritable);
    }
    // Root may own anything
    if meta.uid() != expected.uid && meta.uid() != 0 {
        findings.insert(Finding::OwnerMismatch);
    }
    if meta.gid() != expected.gid && meta.gid() != 0 {
        findings.insert(Finding::GroupMismatch);
    }

    SafetyVerdict { findings }
}

/// Write one audit entry per finding in `verdict`
pub fn report(sink: &dyn AuditSink, path: &Path, verdict: &SafetyVerdict, expected: Ownership) {
    for finding in verdict.findings() {
        sink.record(finding.severity(expected), path, &finding.condition(expected));
    }
}
