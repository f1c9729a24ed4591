//! Validated mutations over a registry snapshot.
//!
//! These functions take a `&mut RegistryDocument` and either apply the whole
//! change or return an error leaving the document untouched. They are meant
//! to run inside [`crate::registry::RegistryStore::transact`].

use crate::branch::Branch;
use crate::error::{Result, StackError};
use crate::graph::DependencyGraph;
use crate::paths;
use crate::registry::RegistryDocument;
use crate::types::{BaseRef, BranchStatus};

// ---------------------------------------------------------------------------
// create
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBranch {
    pub name: String,
    pub base: BaseRef,
    pub spec_id: Option<String>,
    pub base_tip: Option<String>,
}

pub fn create(doc: &mut RegistryDocument, new: NewBranch, trunk: &str) -> Result<Branch> {
    paths::validate_branch_name(&new.name, trunk)?;
    if doc.contains(&new.name) {
        return Err(StackError::BranchExists(new.name));
    }
    DependencyGraph::build(doc).check_base(&new.name, &new.base, trunk)?;

    let branch = Branch::new(new.name, new.base)
        .with_spec(new.spec_id)
        .with_base_tip(new.base_tip);
    doc.insert(branch.clone());
    Ok(branch)
}

// ---------------------------------------------------------------------------
// update
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TipChange {
    Set(String),
    Clear,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchUpdate {
    pub base: Option<BaseRef>,
    pub status: Option<BranchStatus>,
    pub pr_number: Option<u64>,
    pub spec_id: Option<String>,
    /// Explicit tip change. When the base changes and this is `None` the
    /// recorded tip is cleared, since it described the old base.
    pub base_tip: Option<TipChange>,
    pub reopen: bool,
}

impl BranchUpdate {
    pub fn is_empty(&self) -> bool {
        *self == BranchUpdate::default()
    }
}

/// Apply `update` to the record `name`. Returns `(before, after)`.
pub fn update(
    doc: &mut RegistryDocument,
    name: &str,
    update: BranchUpdate,
    trunk: &str,
) -> Result<(Branch, Branch)> {
    let before = doc
        .get(name)
        .cloned()
        .ok_or_else(|| StackError::BranchNotFound(name.to_string()))?;
    let mut after = before.clone();

    if let Some(base) = &update.base {
        if *base != before.base_name {
            DependencyGraph::build(doc).check_base(name, base, trunk)?;
            after.base_name = base.clone();
            if update.base_tip.is_none() {
                after.last_known_base_tip = None;
            }
        }
    }

    if update.reopen {
        after.reopen()?;
    }
    if let Some(status) = update.status {
        after.advance_status(status)?;
    }
    if let Some(pr) = update.pr_number {
        after.pr_number = Some(pr);
    }
    if let Some(spec) = update.spec_id {
        after.spec_id = Some(spec);
    }
    match update.base_tip {
        Some(TipChange::Set(tip)) => after.last_known_base_tip = Some(tip),
        Some(TipChange::Clear) => after.last_known_base_tip = None,
        None => {}
    }

    doc.insert(after.clone());
    Ok((before, after))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
