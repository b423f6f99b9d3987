//! jailmount - chroot jail validation and session mounts
//!
//! Checks that a jail's system directories cannot be tampered with by the
//! jailed user, then bind mounts the user's home directory into the jail and
//! mounts proc, sysfs and devpts as the per-user mount policy asks.

mod audit;
mod cli;
mod error;
mod jail;
mod mount;
mod policy;
mod safety;

use audit::LogAudit;
use cli::{Cli, Commands};
use error::{Error, Result};
use jail::{inspect_tree, split_jail_and_home, JailPrefix};
use mount::{DryRun, HostMounts, MountOps, MountOrchestrator, MountReport, MountTable, StageOutcome};
use policy::PolicyFile;
use safety::{check_path, Ownership, SafetyVerdict};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse_args();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            log::error!("{}", e);
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_status());
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "jailmount=debug" } else { "jailmount=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Run the selected command; `Ok(false)` is a negative answer, not an error
fn run(cli: Cli) -> Result<bool> {
    let prefix = JailPrefix::new(cli.prefix);

    match cli.command {
        Commands::Completion { shell } => {
            Cli::generate_completion(shell);
        }

        Commands::Check { jail } => {
            let report = inspect_tree(&jail, Ownership::ROOT, &LogAudit);
            if report.root.is_absent() {
                return Err(Error::JailRootUnreachable(jail));
            }
            if !report.is_safe() {
                for path in report.offenders() {
                    println!("  unsafe: {}", path.display());
                }
                return Err(Error::UnsafeJail(jail));
            }
            println!("Jail {} is safe", jail.display());
        }

        Commands::Inspect { path, owner, group } => {
            let verdict = check_path(&path, Ownership::new(owner, group));
            print_verdict(&path, &verdict);
            return Ok(verdict.is_clean());
        }

        Commands::Split { homedir } => {
            let (jail, home) = split_jail_and_home(&homedir)?;
            println!("jail: {}", jail);
            println!("home: {}", home);
        }

        Commands::SessionHome { user, home } => {
            println!("{}", prefix.session_home(&user, &home));
        }

        Commands::Owner { jail, user } => {
            if !prefix.owns(&jail, &user) {
                return Err(Error::JailOwnership { jail, user });
            }
            println!("Jail {} belongs to {}", jail, user);
        }

        Commands::Exists { user } => {
            let exists = prefix.jail_exists_for(&user);
            println!("{}", if exists { "yes" } else { "no" });
            return Ok(exists);
        }

        Commands::IsMounted { path } => {
            let mounted = MountTable::new(cli.mount_table).is_mounted(&path)?;
            println!("{}", if mounted { "yes" } else { "no" });
            return Ok(mounted);
        }

        Commands::Mounts { jail } => {
            for entry in MountTable::new(cli.mount_table).entries()? {
                if entry.mount_point.starts_with(&jail) {
                    println!(
                        "{} {} {}",
                        entry.source.display(),
                        entry.mount_point.display(),
                        entry.fstype
                    );
                }
            }
        }

        Commands::Mount {
            homedir,
            user,
            dry_run,
        } => {
            let (jail, home) = split_jail_and_home(&homedir)?;
            if let Some(user) = user {
                if !prefix.owns(jail.as_str(), &user) {
                    return Err(Error::JailOwnership {
                        jail: jail.to_string(),
                        user,
                    });
                }
            }

            let host = HostMounts::new(MountTable::new(cli.mount_table));
            let dry = DryRun::new(&host);
            let ops: &dyn MountOps = if dry_run { &dry } else { &host };
            let policy = PolicyFile::new(cli.config);

            let report = MountOrchestrator::new(ops, &policy, &prefix, &LogAudit).run(&jail, &home)?;
            print_report(&report);
        }
    }

    Ok(true)
}

fn print_verdict(path: &std::path::Path, verdict: &SafetyVerdict) {
    println!("{}: {}", path.display(), verdict);
}

fn print_report(report: &MountReport) {
    println!("Jail for {} ready", report.user);
    println!("  home {} ({})", report.home_target.display(), outcome_label(report.home));
    if report.config.is_empty() {
        println!("  no optional filesystems in policy");
    }
    for (fs, target, outcome) in &report.specials {
        if *outcome != StageOutcome::Disabled {
            println!("  {} {} ({})", fs, target.display(), outcome_label(*outcome));
        }
    }
}

fn outcome_label(outcome: StageOutcome) -> &'static str {
    match outcome {
        StageOutcome::Mounted => "mounted",
        StageOutcome::AlreadyMounted => "already mounted",
        StageOutcome::Disabled => "disabled",
    }
}
