//! Command-line interface for jailmount
//!
//! Uses clap with derive for type-safe CLI parsing

use crate::jail::paths::DEFAULT_JAIL_PREFIX;
use crate::mount::table::PROC_MOUNTS;
use crate::policy::DEFAULT_POLICY_PATH;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// jailmount - validate chroot jails and mount homes into them
#[derive(Parser)]
#[command(name = "jailmount")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Mount policy file
    #[arg(short, long, default_value = DEFAULT_POLICY_PATH)]
    pub config: PathBuf,

    /// Directory under which per-user jails live
    #[arg(short, long, default_value = DEFAULT_JAIL_PREFIX)]
    pub prefix: String,

    /// Mount table to consult
    #[arg(long, default_value = PROC_MOUNTS)]
    pub mount_table: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Check that a jail's system directories are safe
    Check {
        /// Jail root directory
        jail: PathBuf,
    },

    /// Show the safety findings for a single path
    Inspect {
        /// Path to inspect (symlinks are not followed)
        path: PathBuf,

        /// Expected owner uid
        #[arg(long, default_value = "0")]
        owner: u32,

        /// Expected group gid
        #[arg(long, default_value = "0")]
        group: u32,
    },

    /// Split a marker home directory into jail root and in-jail home
    Split {
        /// Home directory, e.g. /home/jail/bob/./home/bob
        homedir: String,
    },

    /// Print the marker home directory for a jailed account
    SessionHome {
        /// Account name
        user: String,

        /// Home directory as seen inside the jail
        home: String,
    },

    /// Verify that a jail belongs to a user
    Owner {
        /// Jail root directory
        jail: String,

        /// Account name
        user: String,
    },

    /// Report whether a jail exists for a user
    Exists {
        /// Account name
        user: String,
    },

    /// Report whether something is mounted at a path
    IsMounted {
        /// Exact mount point
        path: PathBuf,
    },

    /// List the mounts at or below a jail root
    Mounts {
        /// Jail root directory
        jail: PathBuf,
    },

    /// Validate a jail and mount the home directory and virtual filesystems into it
    Mount {
        /// Marker home directory, e.g. /home/jail/bob/./home/bob
        homedir: String,

        /// Refuse unless the jail belongs to this user
        #[arg(short, long)]
        user: Option<String>,

        /// Show what would be done without making changes
        #[arg(long)]
        dry_run: bool,
    },

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Generate shell completion scripts
    pub fn generate_completion(shell: Shell) {
        let mut cmd = Self::command();
        clap_complete::generate(shell, &mut cmd, "jailmount", &mut std::io::stdout());
    }
}
