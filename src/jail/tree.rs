//! Jail tree validation
//!
//! Before anything is mounted into a jail, its system directories must be
//! root owned and locked down. Otherwise a user able to write into, say,
//! the jail's `etc` or `lib` could plant files that a privileged helper
//! later trusts.

use crate::audit::AuditSink;
use crate::safety::{check_path, report, Finding, Ownership, SafetyVerdict};
use std::path::{Path, PathBuf};

/// System directories checked inside every jail, in evaluation order
pub const SYSTEM_DIRS: [&str; 6] = ["dev", "etc", "lib", "usr", "bin", "sbin"];

/// A system directory may simply not exist
const SUBDIR_ALLOWED: &[Finding] = &[Finding::NotRegularPath];

/// Outcome of checking a jail tree
#[derive(Debug, Clone)]
pub struct TreeReport {
    /// Findings on the jail root itself
    pub root: SafetyVerdict,
    /// Findings per system directory, in [`SYSTEM_DIRS`] order
    pub dirs: Vec<(PathBuf, SafetyVerdict)>,
}

impl TreeReport {
    /// Root reachable and no system directory with a blocking finding.
    ///
    /// Findings on the root other than absence do not block.
    pub fn is_safe(&self) -> bool {
        !self.root.is_absent() && self.dirs.iter().all(|(_, v)| v.passes(SUBDIR_ALLOWED))
    }

    /// System directories that made the tree unsafe
    pub fn offenders(&self) -> Vec<&Path> {
        self.dirs
            .iter()
            .filter(|(_, v)| !v.passes(SUBDIR_ALLOWED))
            .map(|(p, _)| p.as_path())
            .collect()
    }
}

/// Check the jail root and every system directory below it.
///
/// All directories are always checked so that every offending path ends up
/// in the audit trail in a single pass.
pub fn inspect_tree(root: &Path, expected: Ownership, audit: &dyn AuditSink) -> TreeReport {
    let root_verdict = check_path(root, expected);
    report(audit, root, &root_verdict, expected);

    if root_verdict.is_absent() {
        return TreeReport {
            root: root_verdict,
            dirs: Vec::new(),
        };
    }

    let dirs = SYSTEM_DIRS
        .iter()
        .map(|name| {
            let path = root.join(name);
            let verdict = check_path(&path, expected);
            report(audit, &path, &verdict, expected);
            (path, verdict)
        })
        .collect();

    TreeReport {
        root: root_verdict,
        dirs,
    }
}

/// Whether the jail at `root` is safe to mount into, every system
/// directory being expected to belong to root:root
pub fn basic_jail_is_safe(root: &Path, audit: &dyn AuditSink) -> bool {
    let report = inspect_tree(root, Ownership::ROOT, audit);
    if !report.is_safe() {
        log::debug!("jail {} is unsafe: {:?}", root.display(), report.offenders());
    }
    report.is_safe()
}
