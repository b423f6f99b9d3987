//! Jail layout
//!
//! This module provides:
//! - Derivation of the jail root and in-jail home from a marker home directory
//! - Username extraction and ownership checks against the jail prefix
//! - Safety validation of a jail's system directories

pub mod paths;
pub mod tree;

// Re-exports
pub use paths::{split_jail_and_home, with_trailing_slash, HomeDirectory, JailPrefix, JailRoot};
pub use tree::{basic_jail_is_safe, inspect_tree};
