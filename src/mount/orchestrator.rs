//! Mount sequence for one session
//!
//! Handles:
//! - Checking the jail tree and loading the mount policy before anything is mounted
//! - Bind mounting the user's home directory into the jail
//! - Resolving the user's mount policy
//! - Mounting proc, sysfs and devpts where the policy asks for them
//!
//! Every stage is skipped when its target is already mounted, so running
//! the sequence again for a live session changes nothing. The first failure
//! aborts the whole sequence.

use crate::audit::AuditSink;
use crate::error::{Error, Result};
use crate::jail::{basic_jail_is_safe, with_trailing_slash, HomeDirectory, JailPrefix, JailRoot};
use crate::mount::ops::{MountOps, SpecialFs};
use crate::mount::state::{DynamicMountMachine, MountMachine, MountMachineEvent, MountStage};
use crate::policy::{JailMountConfig, PolicySource};
use std::path::PathBuf;

/// What a single stage ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// Mounted by this run
    Mounted,
    /// Target was already a mount point
    AlreadyMounted,
    /// Not requested by the user's policy
    Disabled,
}

/// Summary of a completed mount sequence
#[derive(Debug, Clone)]
pub struct MountReport {
    /// User the jail belongs to
    pub user: String,
    /// Where the home directory lives inside the jail, on the host
    pub home_target: PathBuf,
    pub home: StageOutcome,
    /// Policy that was applied
    pub config: JailMountConfig,
    /// One entry per special filesystem, in mount order
    pub specials: Vec<(SpecialFs, PathBuf, StageOutcome)>,
}

/// Drives the mount sequence for one session. Single use: once complete
/// or aborted, a new orchestrator is needed.
pub struct MountOrchestrator<'a> {
    ops: &'a dyn MountOps,
    policy: &'a dyn PolicySource,
    prefix: &'a JailPrefix,
    audit: &'a dyn AuditSink,
    machine: DynamicMountMachine<()>,
}

impl<'a> MountOrchestrator<'a> {
    pub fn new(
        ops: &'a dyn MountOps,
        policy: &'a dyn PolicySource,
        prefix: &'a JailPrefix,
        audit: &'a dyn AuditSink,
    ) -> Self {
        Self {
            ops,
            policy,
            prefix,
            audit,
            machine: MountMachine::new(()).into_dynamic(),
        }
    }

    /// Current stage of the sequence
    pub fn stage(&self) -> MountStage {
        MountStage::from_name(self.machine.current_state())
    }

    /// Run every stage for `home` inside `jail`.
    ///
    /// Nothing is mounted unless the jail tree is safe and the mount policy
    /// could be read.
    pub fn run(&mut self, jail: &JailRoot, home: &HomeDirectory) -> Result<MountReport> {
        match self.drive(jail, home) {
            Ok(report) => Ok(report),
            Err(e) => {
                let stage = self.stage();
                // Idle means we never started; there is nothing to abort
                if stage != MountStage::Idle {
                    self.machine.handle(MountMachineEvent::Abort).ok();
                }
                log::error!("mounting into {} aborted while {}: {}", jail, stage.name(), e);
                Err(e)
            }
        }
    }

    fn drive(&mut self, jail: &JailRoot, home: &HomeDirectory) -> Result<MountReport> {
        self.advance(MountMachineEvent::Validate, "validating")?;
        if !basic_jail_is_safe(jail.as_path(), self.audit) {
            return Err(Error::UnsafeJail(jail.as_path().to_path_buf()));
        }
        // The policy source is read once and released before any mount
        let policy = self.policy.load()?;

        self.advance(MountMachineEvent::Bind, "binding")?;
        let home_target = home.target_in(jail);
        let home_outcome = if self.ops.is_mounted(&home_target)? {
            log::debug!("{} already mounted", home_target.display());
            StageOutcome::AlreadyMounted
        } else {
            self.ops.bind(home.real(), &home_target)?;
            StageOutcome::Mounted
        };

        self.advance(MountMachineEvent::Resolve, "resolving")?;
        let user = self.prefix.extract_user(&with_trailing_slash(jail.as_str()))?;
        let config = policy.resolve(&user);
        log::debug!("mount policy for {}: {:?}", user, config);

        self.advance(MountMachineEvent::Mount, "mounting")?;
        let mut specials = Vec::with_capacity(SpecialFs::ALL.len());
        for fs in SpecialFs::ALL {
            let target = jail.join(fs.jail_path());
            let outcome = if fs.enabled_in(&config) {
                self.mount_special(fs, &target)?
            } else {
                StageOutcome::Disabled
            };
            specials.push((fs, target, outcome));
        }

        self.advance(MountMachineEvent::Finish, "complete")?;
        Ok(MountReport {
            user,
            home_target,
            home: home_outcome,
            config,
            specials,
        })
    }

    fn mount_special(&self, fs: SpecialFs, target: &std::path::Path) -> Result<StageOutcome> {
        if !self.ops.dir_exists(target) {
            self.ops.create_dir(target)?;
        }
        if self.ops.is_mounted(target)? {
            log::debug!("{} already mounted at {}", fs, target.display());
            return Ok(StageOutcome::AlreadyMounted);
        }
        self.ops.mount_special(fs, target)?;
        Ok(StageOutcome::Mounted)
    }

    fn advance(&mut self, event: MountMachineEvent, stage: &'static str) -> Result<()> {
        self.machine
            .handle(event)
            .map_err(|_| Error::StageOrder(stage))
    }
}
