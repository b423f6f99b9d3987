//! Audit trail for safety findings
//!
//! Path checks never log by themselves. They return findings, and whoever
//! drives the check hands them to an [`AuditSink`] together with the path
//! and a severity.

use std::fmt;
use std::path::Path;

/// Severity of an audit entry, mirroring the syslog levels used by PAM-style
/// session helpers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Condition that makes a path unusable as a mount target
    Error,
    /// Suspicious condition on a privileged path
    Warning,
    /// Informational condition
    Notice,
}

impl Severity {
    /// Map onto the `log` facade level
    pub fn level(self) -> log::Level {
        match self {
            Severity::Error => log::Level::Error,
            Severity::Warning => log::Level::Warn,
            Severity::Notice => log::Level::Info,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Notice => write!(f, "notice"),
        }
    }
}

/// Write-only destination for audit entries
pub trait AuditSink {
    fn record(&self, severity: Severity, path: &Path, condition: &str);
}

/// Forwards audit entries to the `log` facade under the `jailmount::audit` target
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAudit;

impl AuditSink for LogAudit {
    fn record(&self, severity: Severity, path: &Path, condition: &str) {
        log::log!(
            target: "jailmount::audit",
            severity.level(),
            "path {} {}",
            path.display(),
            condition
        );
    }
}

/// In-memory sink used by tests to observe what was reported
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryAudit {
    pub entries: std::cell::RefCell<Vec<(Severity, std::path::PathBuf, String)>>,
}

#[cfg(test)]
impl MemoryAudit {
    pub fn paths(&self) -> Vec<std::path::PathBuf> {
        self.entries.borrow().iter().map(|(_, p, _)| p.clone()).collect()
    }
}

#[cfg(test)]
impl AuditSink for MemoryAudit {
    fn record(&self, severity: Severity, path: &Path, condition: &str) {
        self.entries
            .borrow_mut()
            .push((severity, path.to_path_buf(), condition.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_mapping() {
        assert_eq!(Severity::Error.level(), log::Level::Error);
        assert_eq!(Severity::Warning.level(), log::Level::Warn);
        assert_eq!(Severity::Notice.level(), log::Level::Info);
    }

    #[test]
    fn test_memory_audit_records() {
        let audit = MemoryAudit::default();
        audit.record(Severity::Error, Path::new("/jail/etc"), "is a symlink");
        let entries = audit.entries.borrow();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, Severity::Error);
        assert_eq!(entries[0].2, "is a symlink");
    }
}
