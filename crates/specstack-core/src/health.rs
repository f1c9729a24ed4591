use crate::error::Result;
use crate::graph::DependencyGraph;
use crate::registry::RegistryDocument;
use crate::types::{BaseRef, BranchStatus, Health};
use crate::vcs::VcFacts;
use serde::Serialize;

// ---------------------------------------------------------------------------
// HealthReport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub name: String,
    pub base_name: BaseRef,
    pub status: BranchStatus,
    pub health: Health,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// A status the facts suggest but that is never applied automatically.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposed_status: Option<BranchStatus>,
}

// ---------------------------------------------------------------------------
// compute_health
// ---------------------------------------------------------------------------

/// Derive per-branch health in topological order.
///
/// `facts` is `None` when the version-control query failed; branches whose
/// health depends on a fact then report [`Health::Unknown`] instead of a
/// guess. A cycle in `doc` is a fatal consistency error.
pub fn compute_health(doc: &RegistryDocument, facts: Option<&VcFacts>) -> Result<Vec<HealthReport>> {
    let graph = DependencyGraph::build(doc);
    let order = graph.topological_order()?;

    let mut reports = Vec::with_capacity(order.len());
    for name in order {
        let Some(branch) = doc.get(&name) else {
            continue;
        };
        let (health, detail) = assess(doc, &graph, &name, facts);

        let proposed_status = facts
            .and_then(|f| f.branch(&name))
            .filter(|f| f.merged_into_trunk && branch.status != BranchStatus::Merged)
            .map(|_| BranchStatus::Merged);

        reports.push(HealthReport {
            name: name.clone(),
            base_name: branch.base_name.clone(),
            status: branch.status,
            health,
            detail,
            proposed_status,
        });
    }
    Ok(reports)
}

fn assess(
    doc: &RegistryDocument,
    graph: &DependencyGraph,
    name: &str,
    facts: Option<&VcFacts>,
) -> (Health, Option<String>) {
    let Some(branch) = doc.get(name) else {
        return (Health::Unknown, None);
    };
    let derived = Health::from(branch.status);

    if graph.is_orphaned(name) {
        tracing::warn!(branch = %name, base = %branch.base_name, "orphaned branch");
        return (
            Health::Orphaned,
            Some(format!(
                "base '{}' is no longer tracked; run 'update {name} --base <branch>'",
                branch.base_name
            )),
        );
    }

    // A merged branch never needs a rebase, whatever its base did.
    if branch.status == BranchStatus::Merged {
        return (derived, None);
    }

    let BaseRef::Branch(base_name) = &branch.base_name else {
        return (derived, None);
    };
    let Some(base) = doc.get(base_name) else {
        return (derived, None);
    };
    if base.status != BranchStatus::Merged {
        return (derived, None);
    }

    let Some(facts) = facts else {
        return (
            Health::Unknown,
            Some(format!(
                "base '{base_name}' is merged but version-control facts are unavailable"
            )),
        );
    };
    let Some(current) = facts.tip_of(Some(base_name)) else {
        return (
            Health::Unknown,
            Some(format!("no current tip reported for base '{base_name}'")),
        );
    };

    if branch.last_known_base_tip.as_deref() == Some(current) {
        return (derived, None);
    }
    (
        Health::NeedsRebase,
        Some(format!(
            "base '{base_name}' is merged; recorded base tip {} differs from current {current}",
            branch.last_known_base_tip.as_deref().unwrap_or("<none>")
        )),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
