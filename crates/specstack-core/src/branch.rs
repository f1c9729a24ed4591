use crate::error::{Result, StackError};
use crate::types::{BaseRef, BranchStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Branch
// ---------------------------------------------------------------------------

/// One tracked branch. The name is the registry map key on disk and is
/// filled back in when the document is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    #[serde(skip)]
    pub name: String,
    pub base_name: BaseRef,
    #[serde(default)]
    pub spec_id: Option<String>,
    #[serde(default)]
    pub pr_number: Option<u64>,
    pub status: BranchStatus,
    #[serde(default)]
    pub last_known_base_tip: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Branch {
    pub fn new(name: impl Into<String>, base: BaseRef) -> Self {
        Self {
            name: name.into(),
            base_name: base,
            spec_id: None,
            pr_number: None,
            status: BranchStatus::Active,
            last_known_base_tip: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_spec(mut self, spec_id: Option<String>) -> Self {
        self.spec_id = spec_id;
        self
    }

    pub fn with_base_tip(mut self, tip: Option<String>) -> Self {
        self.last_known_base_tip = tip;
        self
    }

    // -----------------------------------------------------------------------
    // Status lifecycle
    // -----------------------------------------------------------------------

    /// Move status forward. Same-status is a no-op; any backwards move is
    /// rejected and must go through [`Branch::reopen`].
    pub fn advance_status(&mut self, target: BranchStatus) -> Result<()> {
        if target == self.status {
            return Ok(());
        }
        if target < self.status {
            return Err(StackError::InvalidTransition {
                from: self.status.to_string(),
                to: target.to_string(),
                reason: if self.status == BranchStatus::Merged {
                    "status only moves forward; use --reopen to return a merged branch to active"
                        .to_string()
                } else {
                    "status only moves forward (active -> submitted -> merged)".to_string()
                },
            });
        }
        self.status = target;
        Ok(())
    }

    /// The only path from `merged` back to `active`.
    pub fn reopen(&mut self) -> Result<()> {
        if self.status != BranchStatus::Merged {
            return Err(StackError::InvalidTransition {
                from: self.status.to_string(),
                to: BranchStatus::Active.to_string(),
                reason: "only merged branches can be reopened".to_string(),
            });
        }
        self.status = BranchStatus::Active;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
