//! Mounting into jails
//!
//! This module provides:
//! - Inspection of the live mount table
//! - The mount operations seam, with host and dry-run implementations
//! - State machine and driver for the per-session mount sequence

pub mod ops;
pub mod orchestrator;
pub mod state;
pub mod table;

// Re-exports
pub use ops::{DryRun, HostMounts, MountOps};
pub use orchestrator::{MountOrchestrator, MountReport, StageOutcome};
pub use table::MountTable;
