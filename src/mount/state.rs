//! Mount sequence state machine
//!
//! Type-safe state machine for the per-session mount sequence using the
//! state-machines crate, in dynamic dispatch mode so the driver can feed
//! events as stages complete.

use state_machines::state_machine;

state_machine! {
    name: MountMachine,
    dynamic: true,
    initial: Idle,
    states: [Idle, Validating, Binding, Resolving, Mounting, Complete, Aborted],
    events {
        validate {
            transition: { from: Idle, to: Validating }
        }
        bind {
            transition: { from: Validating, to: Binding }
        }
        resolve {
            transition: { from: Binding, to: Resolving }
        }
        mount {
            transition: { from: Resolving, to: Mounting }
        }
        finish {
            transition: { from: Mounting, to: Complete }
        }
        abort {
            transition: { from: [Validating, Binding, Resolving, Mounting], to: Aborted }
        }
    }
}

/// Where a mount sequence currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountStage {
    /// Nothing done yet
    Idle,
    /// Checking the jail tree and loading the mount policy
    Validating,
    /// Bind mounting the home directory
    Binding,
    /// Looking up the user's mount policy
    Resolving,
    /// Mounting proc, sysfs and devpts as configured
    Mounting,
    /// Every stage succeeded
    Complete,
    /// A stage failed; the jail must not be handed to a session
    Aborted,
}

impl MountStage {
    /// Parse stage from the machine's state name
    pub fn from_name(s: &str) -> Self {
        match s {
            "Validating" => MountStage::Validating,
            "Binding" => MountStage::Binding,
            "Resolving" => MountStage::Resolving,
            "Mounting" => MountStage::Mounting,
            "Complete" => MountStage::Complete,
            "Aborted" => MountStage::Aborted,
            _ => MountStage::Idle, // Fallback
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MountStage::Idle => "idle",
            MountStage::Validating => "validating",
            MountStage::Binding => "binding",
            MountStage::Resolving => "resolving",
            MountStage::Mounting => "mounting",
            MountStage::Complete => "complete",
            MountStage::Aborted => "aborted",
        }
    }
}
