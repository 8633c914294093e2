//! Roles and instance identity.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use crate::error::NetworkError;
use crate::error::UnknownRoleSnafu;

/// Group sequence number of the validator that builds genesis.
///
/// Membership is fixed by configuration, so the orchestrator is chosen by
/// rank instead of by election.
pub const ORCHESTRATOR_GROUP_SEQ: u32 = 1;

/// What an instance does in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Validator,
    Seed,
    Bridge,
    Full,
    Light,
    /// A validator holding the orchestrator rank.
    Orchestrator,
}

impl Role {
    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Validator => "validator",
            Role::Seed => "seed",
            Role::Bridge => "bridge",
            Role::Full => "full",
            Role::Light => "light",
            Role::Orchestrator => "orchestrator",
        }
    }

    /// True for roles that take part in genesis.
    pub fn is_validator(&self) -> bool {
        matches!(self, Role::Validator | Role::Orchestrator)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "validator" => Ok(Role::Validator),
            "seed" => Ok(Role::Seed),
            "bridge" => Ok(Role::Bridge),
            "full" => Ok(Role::Full),
            "light" => Ok(Role::Light),
            "orchestrator" => Ok(Role::Orchestrator),
            other => UnknownRoleSnafu { role: other }.fail(),
        }
    }
}

/// One process of a run.
///
/// `global_seq` is unique across the whole run and `group_seq` is unique
/// within the role group. Both are 1-based and assigned by the harness.
/// An instance never changes for the lifetime of its process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instance {
    pub global_seq: u32,
    pub group_seq: u32,
    pub role: Role,
}

impl Instance {
    pub fn new(global_seq: u32, group_seq: u32, role: Role) -> Self {
        Self {
            global_seq,
            group_seq,
            role,
        }
    }

    /// True if this instance builds genesis.
    pub fn is_orchestrator(&self) -> bool {
        match self.role {
            Role::Orchestrator => true,
            Role::Validator => self.group_seq == ORCHESTRATOR_GROUP_SEQ,
            _ => false,
        }
    }

    /// Role with the orchestrator rank applied.
    pub fn effective_role(&self) -> Role {
        if self.is_orchestrator() { Role::Orchestrator } else { self.role }
    }

    /// Stable participant label used in failure records and logs.
    pub fn label(&self) -> String {
        format!("{}-{}", self.role, self.group_seq)
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (global {}, group {})", self.effective_role(), self.global_seq, self.group_seq)
    }
}
