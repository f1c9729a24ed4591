use serde::{Deserialize, Serialize};
use std::fmt;

/// On-disk marker for "stacked directly on trunk". The colon makes it an
/// invalid git ref name, so no tracked branch can collide with it.
pub const TRUNK_SENTINEL: &str = ":trunk";

// ---------------------------------------------------------------------------
// BranchStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchStatus {
    Active,
    Submitted,
    Merged,
}

impl BranchStatus {
    pub fn all() -> &'static [BranchStatus] {
        &[
            BranchStatus::Active,
            BranchStatus::Submitted,
            BranchStatus::Merged,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BranchStatus::Active => "active",
            BranchStatus::Submitted => "submitted",
            BranchStatus::Merged => "merged",
        }
    }
}

impl fmt::Display for BranchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BranchStatus {
    type Err = crate::error::StackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(BranchStatus::Active),
            "submitted" => Ok(BranchStatus::Submitted),
            "merged" => Ok(BranchStatus::Merged),
            _ => Err(crate::error::StackError::InvalidStatus(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// BaseRef
// ---------------------------------------------------------------------------

/// What a branch is stacked on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BaseRef {
    Trunk,
    Branch(String),
}

impl BaseRef {
    /// Interpret user input: the configured trunk name and the sentinel both
    /// mean trunk, anything else names a branch.
    pub fn parse(input: &str, trunk: &str) -> Self {
        if input == trunk || input == TRUNK_SENTINEL {
            BaseRef::Trunk
        } else {
            BaseRef::Branch(input.to_string())
        }
    }

    pub fn branch_name(&self) -> Option<&str> {
        match self {
            BaseRef::Trunk => None,
            BaseRef::Branch(name) => Some(name),
        }
    }

    pub fn is_trunk(&self) -> bool {
        matches!(self, BaseRef::Trunk)
    }

    /// Name for display and for git-facing payloads.
    pub fn display_name<'a>(&'a self, trunk: &'a str) -> &'a str {
        match self {
            BaseRef::Trunk => trunk,
            BaseRef::Branch(name) => name,
        }
    }
}

impl From<String> for BaseRef {
    fn from(s: String) -> Self {
        if s == TRUNK_SENTINEL {
            BaseRef::Trunk
        } else {
            BaseRef::Branch(s)
        }
    }
}

impl From<BaseRef> for String {
    fn from(b: BaseRef) -> Self {
        match b {
            BaseRef::Trunk => TRUNK_SENTINEL.to_string(),
            BaseRef::Branch(name) => name,
        }
    }
}

impl fmt::Display for BaseRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BaseRef::Trunk => f.write_str("trunk"),
            BaseRef::Branch(name) => f.write_str(name),
        }
    }
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Health {
    Active,
    Submitted,
    Merged,
    NeedsRebase,
    Orphaned,
    Unknown,
}

impl Health {
    pub fn as_str(self) -> &'static str {
        match self {
            Health::Active => "active",
            Health::Submitted => "submitted",
            Health::Merged => "merged",
            Health::NeedsRebase => "needs-rebase",
            Health::Orphaned => "orphaned",
            Health::Unknown => "unknown",
        }
    }
}

impl From<BranchStatus> for Health {
    fn from(s: BranchStatus) -> Self {
        match s {
            BranchStatus::Active => Health::Active,
            BranchStatus::Submitted => Health::Submitted,
            BranchStatus::Merged => Health::Merged,
        }
    }
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
