//! Infer registry records for branches created outside this tool.
//!
//! Each local branch's upstream tracking ref is matched against the other
//! known branch names, exactly or through an [`UpstreamPattern`]. A match
//! becomes the base; no match means trunk. Existing records are never
//! touched, so re-running an import against unchanged facts is a no-op.

use crate::branch::Branch;
use crate::error::{Result, StackError};
use crate::graph::DependencyGraph;
use crate::paths;
use crate::registry::RegistryDocument;
use crate::stack::{self, NewBranch};
use crate::types::BaseRef;
use crate::vcs::{TrackedBranch, VcFacts};
use glob::{MatchOptions, Pattern};
use serde::Serialize;
use std::collections::BTreeSet;

const PLACEHOLDER: &str = "{branch}";

// ---------------------------------------------------------------------------
// UpstreamPattern
// ---------------------------------------------------------------------------

/// Glob template with a `{branch}` placeholder, e.g. `origin/{branch}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamPattern {
    raw: String,
}

impl UpstreamPattern {
    pub fn parse(raw: &str) -> Result<Self> {
        if !raw.contains(PLACEHOLDER) {
            return Err(StackError::InvalidPattern {
                pattern: raw.to_string(),
                reason: format!("must contain the {PLACEHOLDER} placeholder"),
            });
        }
        Pattern::new(&raw.replace(PLACEHOLDER, "x")).map_err(|e| StackError::InvalidPattern {
            pattern: raw.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            raw: raw.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Does `upstream` refer to `candidate` under this template?
    pub fn matches(&self, upstream: &str, candidate: &str) -> bool {
        let expanded = self.raw.replace(PLACEHOLDER, &Pattern::escape(candidate));
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };
        Pattern::new(&expanded)
            .map(|p| p.matches_with(upstream, options))
            .unwrap_or(false)
    }
}

// ---------------------------------------------------------------------------
// ImportPlan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedImport {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportPlan {
    /// New records, bases before dependents.
    pub branches: Vec<Branch>,
    pub already_tracked: Vec<String>,
    pub rejected: Vec<RejectedImport>,
}

impl ImportPlan {
    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }
}

// ---------------------------------------------------------------------------
// infer
// ---------------------------------------------------------------------------

pub struct InferInput<'a> {
    pub tracked: &'a [TrackedBranch],
    pub patterns: &'a [UpstreamPattern],
    pub trunk: &'a str,
    pub facts: Option<&'a VcFacts>,
    pub spec_id: Option<&'a str>,
}

pub fn infer(doc: &RegistryDocument, input: &InferInput<'_>) -> Result<ImportPlan> {
    let mut plan = ImportPlan::default();

    let known: BTreeSet<&str> = doc
        .names()
        .chain(input.tracked.iter().map(|t| t.name.as_str()))
        .filter(|n| *n != input.trunk)
        .collect();

    let mut tracked: Vec<&TrackedBranch> = input.tracked.iter().collect();
    tracked.sort_by(|a, b| a.name.cmp(&b.name));
    tracked.dedup_by(|a, b| a.name == b.name);

    let mut tentative = doc.clone();
    let mut candidates: Vec<String> = Vec::new();
    for t in tracked {
        if t.name == input.trunk {
            continue;
        }
        if doc.contains(&t.name) {
            plan.already_tracked.push(t.name.clone());
            continue;
        }
        if let Err(e) = paths::validate_branch_name(&t.name, input.trunk) {
            plan.rejected.push(RejectedImport {
                name: t.name.clone(),
                reason: e.to_string(),
            });
            continue;
        }
        let base = resolve_base(t, &known, input.patterns, input.trunk);
        tentative.insert(Branch::new(t.name.clone(), base));
        candidates.push(t.name.clone());
    }

    exclude_inconsistent(&mut tentative, &mut candidates, &mut plan.rejected);

    let order = DependencyGraph::build(&tentative).topological_order()?;
    let keep: BTreeSet<&str> = candidates.iter().map(|s| s.as_str()).collect();
    for name in order.iter().filter(|n| keep.contains(n.as_str())) {
        let Some(b) = tentative.get(name) else { continue };
        let tip = input
            .facts
            .and_then(|f| f.tip_of(b.base_name.branch_name()))
            .map(str::to_string);
        plan.branches.push(
            b.clone()
                .with_spec(input.spec_id.map(str::to_string))
                .with_base_tip(tip),
        );
    }
    Ok(plan)
}

fn resolve_base(
    t: &TrackedBranch,
    known: &BTreeSet<&str>,
    patterns: &[UpstreamPattern],
    trunk: &str,
) -> BaseRef {
    let Some(upstream) = t.upstream.as_deref() else {
        return BaseRef::Trunk;
    };
    let short = upstream.strip_prefix("refs/heads/").unwrap_or(upstream);

    if short == trunk || patterns.iter().any(|p| p.matches(upstream, trunk)) {
        return BaseRef::Trunk;
    }
    if short != t.name && known.contains(short) {
        return BaseRef::Branch(short.to_string());
    }
    let mut matched = known
        .iter()
        .filter(|c| **c != t.name)
        .filter(|c| patterns.iter().any(|p| p.matches(upstream, c)));
    match matched.next() {
        Some(first) => {
            if let Some(other) = matched.next() {
                tracing::warn!(
                    branch = %t.name, upstream, chosen = %first, also = %other,
                    "ambiguous upstream match"
                );
            }
            BaseRef::Branch(first.to_string())
        }
        None => BaseRef::Trunk,
    }
}

/// Drop candidates that would close a cycle or whose base was itself
/// dropped, until nothing changes.
fn exclude_inconsistent(
    tentative: &mut RegistryDocument,
    candidates: &mut Vec<String>,
    rejected: &mut Vec<RejectedImport>,
) {
    loop {
        let graph = DependencyGraph::build(tentative);
        let mut offender = None;
        for name in candidates.iter() {
            let Some(base) = graph.base_of(name) else { continue };
            if let Some(chain) = graph.cycle_chain(name, base) {
                offender = Some((
                    name.clone(),
                    StackError::CycleDetected { chain }.to_string(),
                ));
                break;
            }
            if !graph.validate_base_exists(base) {
                offender = Some((
                    name.clone(),
                    format!("base '{base}' was excluded from this import"),
                ));
                break;
            }
        }
        let Some((name, reason)) = offender else {
            return;
        };
        tracing::warn!(branch = %name, %reason, "import candidate rejected");
        tentative.branches.remove(&name);
        candidates.retain(|c| *c != name);
        rejected.push(RejectedImport { name, reason });
    }
}

/// Insert every planned record. Returns the names actually created.
pub fn apply(doc: &mut RegistryDocument, plan: &ImportPlan, trunk: &str) -> Result<Vec<String>> {
    let mut created = Vec::new();
    for b in &plan.branches {
        if doc.contains(&b.name) {
            continue;
        }
        stack::create(
            doc,
            NewBranch {
                name: b.name.clone(),
                base: b.base_name.clone(),
                spec_id: b.spec_id.clone(),
                base_tip: b.last_known_base_tip.clone(),
            },
            trunk,
        )?;
        created.push(b.name.clone());
    }
    Ok(created)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
