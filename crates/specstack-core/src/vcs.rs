//! Read-only version-control facts.
//!
//! This crate never runs git. The privileged host collects facts (tips,
//! merge state, upstream tracking refs) and hands them over as a JSON
//! snapshot; everything here only reads that snapshot.

use crate::error::{Result, StackError};
use crate::io;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Facts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchFacts {
    #[serde(default)]
    pub tip: Option<String>,
    #[serde(default)]
    pub merged_into_trunk: bool,
    #[serde(default)]
    pub upstream: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VcFacts {
    #[serde(default)]
    pub trunk_tip: Option<String>,
    #[serde(default)]
    pub branches: BTreeMap<String, BranchFacts>,
}

/// A local branch and its configured upstream, as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedBranch {
    pub name: String,
    pub upstream: Option<String>,
}

impl VcFacts {
    pub fn branch(&self, name: &str) -> Option<&BranchFacts> {
        self.branches.get(name)
    }

    /// Current tip of a branch, or of trunk when `name` is `None`.
    pub fn tip_of(&self, name: Option<&str>) -> Option<&str> {
        match name {
            None => self.trunk_tip.as_deref(),
            Some(n) => self.branches.get(n).and_then(|b| b.tip.as_deref()),
        }
    }

    pub fn tracked_branches(&self) -> Vec<TrackedBranch> {
        self.branches
            .iter()
            .map(|(name, f)| TrackedBranch {
                name: name.clone(),
                upstream: f.upstream.clone(),
            })
            .collect()
    }

    pub fn with_branch(mut self, name: &str, facts: BranchFacts) -> Self {
        self.branches.insert(name.to_string(), facts);
        self
    }
}

// ---------------------------------------------------------------------------
// Port
// ---------------------------------------------------------------------------

pub trait VersionControl {
    fn snapshot(&self) -> Result<VcFacts>;
}

impl VersionControl for VcFacts {
    fn snapshot(&self) -> Result<VcFacts> {
        Ok(self.clone())
    }
}

/// Facts snapshot written to disk by the host.
#[derive(Debug, Clone)]
pub struct FactsFile {
    path: PathBuf,
}

impl FactsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl VersionControl for FactsFile {
    fn snapshot(&self) -> Result<VcFacts> {
        let data = io::read_optional(&self.path)
            .map_err(|e| StackError::VersionControlQuery(format!("{}: {e}", self.path.display())))?
            .ok_or_else(|| {
                StackError::VersionControlQuery(format!(
                    "no facts snapshot at {}; the host must write it before querying",
                    self.path.display()
                ))
            })?;
        serde_json::from_str(&data).map_err(|e| {
            StackError::VersionControlQuery(format!("{}: {e}", self.path.display()))
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
