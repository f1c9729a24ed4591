//! Command surface: one entry point for every operation.
//!
//! Front ends (the CLI, an assistant host) translate their input into an
//! [`Operation`] and render the [`Outcome`]. Operations that need a
//! privileged side effect never perform it; they return
//! [`Outcome::Envelope`] and the front end exits with the envelope's
//! reserved code.

use crate::branch::Branch;
use crate::context::InvocationContext;
use crate::contract::{
    ContractEnvelope, ImportCandidate, ImportPrompt, PrSuggestion, EXIT_OK,
};
use crate::error::{Result, StackError};
use crate::graph::DependencyGraph;
use crate::health::{self, HealthReport};
use crate::import::{self, ImportPlan, InferInput, UpstreamPattern};
use crate::registry::RegistryDocument;
use crate::stack::{self, BranchUpdate, NewBranch, TipChange};
use crate::types::{BaseRef, BranchStatus};
use crate::vcs::{VcFacts, VersionControl};

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Create {
        name: String,
        base: Option<String>,
        spec_id: Option<String>,
        base_tip: Option<String>,
    },
    Update {
        name: String,
        request: UpdateRequest,
    },
    List,
    Status,
    Import {
        patterns: Vec<String>,
        apply: bool,
        spec_id: Option<String>,
    },
    Submit {
        name: String,
        title: Option<String>,
        description: Option<String>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateRequest {
    pub base: Option<String>,
    pub status: Option<BranchStatus>,
    pub pr_number: Option<u64>,
    pub spec_id: Option<String>,
    pub base_tip: Option<String>,
    pub refresh_base_tip: bool,
    pub reopen: bool,
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Created(Branch),
    Updated {
        before: Branch,
        after: Branch,
        written: bool,
    },
    Listed(Vec<Branch>),
    Health(Vec<HealthReport>),
    Imported {
        plan: ImportPlan,
        created: Vec<String>,
    },
    NothingToImport(ImportPlan),
    Envelope(ContractEnvelope),
}

impl Outcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Envelope(env) => env.exit_code(),
            _ => EXIT_OK,
        }
    }
}

// ---------------------------------------------------------------------------
// execute
// ---------------------------------------------------------------------------

pub fn execute(ctx: &InvocationContext, vcs: &dyn VersionControl, op: Operation) -> Result<Outcome> {
    match op {
        Operation::Create {
            name,
            base,
            spec_id,
            base_tip,
        } => create(ctx, vcs, name, base, spec_id, base_tip),
        Operation::Update { name, request } => update(ctx, vcs, &name, request),
        Operation::List => list(ctx),
        Operation::Status => status(ctx, vcs),
        Operation::Import {
            patterns,
            apply,
            spec_id,
        } => import_branches(ctx, vcs, &patterns, apply, spec_id),
        Operation::Submit {
            name,
            title,
            description,
        } => submit(ctx, &name, title, description),
    }
}

/// Query facts, degrading to `None` on failure.
fn facts_or_none(vcs: &dyn VersionControl) -> Option<VcFacts> {
    match vcs.snapshot() {
        Ok(f) => Some(f),
        Err(e) => {
            tracing::warn!(error = %e, "version-control facts unavailable");
            None
        }
    }
}

fn create(
    ctx: &InvocationContext,
    vcs: &dyn VersionControl,
    name: String,
    base: Option<String>,
    spec_id: Option<String>,
    base_tip: Option<String>,
) -> Result<Outcome> {
    let trunk = ctx.trunk();
    let base = base
        .map(|b| BaseRef::parse(&b, trunk))
        .unwrap_or(BaseRef::Trunk);
    let spec_id = spec_id.or_else(|| ctx.default_spec());
    let base_tip = match base_tip {
        Some(tip) => Some(tip),
        None => facts_or_none(vcs)
            .and_then(|f| f.tip_of(base.branch_name()).map(str::to_string)),
    };
    if base_tip.is_none() {
        tracing::warn!(branch = %name, base = %base, "no base tip recorded; stale detection needs one");
    }

    let new = NewBranch {
        name,
        base,
        spec_id,
        base_tip,
    };
    let committed = ctx
        .store()
        .transact(ctx.config.max_write_attempts, |doc| {
            stack::create(doc, new.clone(), trunk)
        })?;
    tracing::info!(branch = %committed.value.name, version = committed.version, "branch created");
    Ok(Outcome::Created(committed.value))
}

fn update(
    ctx: &InvocationContext,
    vcs: &dyn VersionControl,
    name: &str,
    request: UpdateRequest,
) -> Result<Outcome> {
    let trunk = ctx.trunk();
    let target_base = request.base.as_deref().map(|b| BaseRef::parse(b, trunk));
    let facts = if request.base_tip.is_none() && (request.refresh_base_tip || target_base.is_some()) {
        facts_or_none(vcs)
    } else {
        None
    };

    let committed = ctx
        .store()
        .transact(ctx.config.max_write_attempts, |doc| {
            let current = doc
                .get(name)
                .ok_or_else(|| StackError::BranchNotFound(name.to_string()))?;
            let base = target_base.clone().unwrap_or_else(|| current.base_name.clone());
            let base_changes = base != current.base_name;
            let fact_tip = facts
                .as_ref()
                .and_then(|f| f.tip_of(base.branch_name()))
                .map(str::to_string);

            let base_tip = if let Some(tip) = &request.base_tip {
                Some(TipChange::Set(tip.clone()))
            } else if request.refresh_base_tip {
                match fact_tip {
                    Some(tip) => Some(TipChange::Set(tip)),
                    None => {
                        return Err(StackError::VersionControlQuery(format!(
                            "no current tip known for base '{}'; pass --base-tip explicitly",
                            base.display_name(trunk)
                        )))
                    }
                }
            } else if base_changes {
                fact_tip.map(TipChange::Set)
            } else {
                None
            };

            stack::update(
                doc,
                name,
                BranchUpdate {
                    base: target_base.clone(),
                    status: request.status,
                    pr_number: request.pr_number,
                    spec_id: request.spec_id.clone(),
                    base_tip,
                    reopen: request.reopen,
                },
                trunk,
            )
        })?;

    let (before, after) = committed.value;
    if committed.written {
        tracing::info!(branch = %name, version = committed.version, "branch updated");
    }
    Ok(Outcome::Updated {
        before,
        after,
        written: committed.written,
    })
}

fn ordered(doc: &RegistryDocument) -> Result<Vec<Branch>> {
    let order = DependencyGraph::build(doc).topological_order()?;
    Ok(order
        .iter()
        .filter_map(|n| doc.get(n).cloned())
        .collect())
}

fn list(ctx: &InvocationContext) -> Result<Outcome> {
    let doc = ctx.store().load()?;
    Ok(Outcome::Listed(ordered(&doc)?))
}

fn status(ctx: &InvocationContext, vcs: &dyn VersionControl) -> Result<Outcome> {
    let doc = ctx.store().load()?;
    let facts = facts_or_none(vcs);
    Ok(Outcome::Health(health::compute_health(&doc, facts.as_ref())?))
}

fn import_branches(
    ctx: &InvocationContext,
    vcs: &dyn VersionControl,
    extra_patterns: &[String],
    apply: bool,
    spec_id: Option<String>,
) -> Result<Outcome> {
    let trunk = ctx.trunk();
    let patterns = ctx
        .config
        .import
        .upstream_patterns
        .iter()
        .chain(extra_patterns)
        .map(|p| UpstreamPattern::parse(p))
        .collect::<Result<Vec<_>>>()?;
    let facts = vcs.snapshot()?;
    let tracked = facts.tracked_branches();
    let spec_id = spec_id.or_else(|| ctx.default_spec());
    let input = InferInput {
        tracked: &tracked,
        patterns: &patterns,
        trunk,
        facts: Some(&facts),
        spec_id: spec_id.as_deref(),
    };

    if !apply {
        let doc = ctx.store().load()?;
        let plan = import::infer(&doc, &input)?;
        if plan.is_empty() {
            return Ok(Outcome::NothingToImport(plan));
        }
        let branches = plan
            .branches
            .iter()
            .map(|b| ImportCandidate {
                branch_name: b.name.clone(),
                base_branch: b.base_name.display_name(trunk).to_string(),
            })
            .collect();
        return Ok(Outcome::Envelope(ContractEnvelope::ImportPrompt(ImportPrompt {
            branches,
            available_specs: available_specs(ctx, &doc)?,
        })));
    }

    let committed = ctx
        .store()
        .transact(ctx.config.max_write_attempts, |doc| {
            let plan = import::infer(doc, &input)?;
            let created = import::apply(doc, &plan, trunk)?;
            Ok((plan, created))
        })?;
    let (plan, created) = committed.value;
    if created.is_empty() {
        return Ok(Outcome::NothingToImport(plan));
    }
    tracing::info!(count = created.len(), version = committed.version, "branches imported");
    Ok(Outcome::Imported { plan, created })
}

/// Spec directories under the configured specs dir plus spec ids already
/// referenced in the registry.
fn available_specs(ctx: &InvocationContext, doc: &RegistryDocument) -> Result<Vec<String>> {
    let mut specs = doc.spec_ids();
    let dir = ctx.layout.specs_dir(&ctx.config.specs_dir);
    if dir.is_dir() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                specs.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
    }
    specs.sort();
    specs.dedup();
    Ok(specs)
}

fn submit(
    ctx: &InvocationContext,
    name: &str,
    title: Option<String>,
    description: Option<String>,
) -> Result<Outcome> {
    let trunk = ctx.trunk();
    let doc = ctx.store().load()?;
    let branch = doc
        .get(name)
        .ok_or_else(|| StackError::BranchNotFound(name.to_string()))?;

    match branch.status {
        BranchStatus::Active => {}
        BranchStatus::Submitted => {
            return Err(StackError::NotSubmittable {
                branch: name.to_string(),
                reason: match branch.pr_number {
                    Some(pr) => format!("already submitted as PR #{pr}"),
                    None => "already submitted".to_string(),
                },
            })
        }
        BranchStatus::Merged => {
            return Err(StackError::NotSubmittable {
                branch: name.to_string(),
                reason: format!("branch is merged; run 'update {name} --reopen' first"),
            })
        }
    }

    let Some(spec_id) = branch.spec_id.clone() else {
        return Err(StackError::NotSubmittable {
            branch: name.to_string(),
            reason: format!("no specId recorded; run 'update {name} --spec <id>' first"),
        });
    };

    let graph = DependencyGraph::build(&doc);
    if !graph.validate_base_exists(&branch.base_name) {
        return Err(StackError::BaseNotFound {
            base: branch.base_name.to_string(),
            available: graph.available_bases(name, trunk),
        });
    }
    let base = branch.base_name.display_name(trunk).to_string();

    let title = title.unwrap_or_else(|| format!("{spec_id}: {name}"));
    let description = description
        .unwrap_or_else(|| format!("Implements spec {spec_id}. Stacked on {base}."));

    Ok(Outcome::Envelope(ContractEnvelope::PrSuggestion(PrSuggestion {
        title,
        description,
        base,
        spec_id,
    })))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ENV_SPEC;
    use crate::types::Health;
    use crate::vcs::BranchFacts;
    use tempfile::TempDir;

    fn ctx(dir: &TempDir) -> InvocationContext {
        InvocationContext::new(dir.path(), Vec::<(String, String)>::new()).unwrap()
    }

    fn tip(t: &str) -> BranchFacts {
        BranchFacts {
            tip: Some(t.into()),
            ..Default::default()
        }
    }

    fn create_op(name: &str, base: Option<&str>) -> Operation {
        Operation::Create {
            name: name.into(),
            base: base.map(str::to_string),
            spec_id: Some("001-stack".into()),
            base_tip: None,
        }
    }

    fn names(outcome: Outcome) -> Vec<(String, String)> {
        match outcome {
            Outcome::Listed(branches) => branches
                .into_iter()
                .map(|b| (b.name, b.base_name.to_string()))
                .collect(),
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn create_list_and_retroactive_cycle() {
        let dir = TempDir::new().unwrap();
        let c = ctx(&dir);
        let vcs = VcFacts::default();

        execute(&c, &vcs, create_op("x", None)).unwrap();
        execute(&c, &vcs, create_op("y", Some("x"))).unwrap();
        execute(&c, &vcs, create_op("z", Some("y"))).unwrap();

        assert_eq!(
            names(execute(&c, &vcs, Operation::List).unwrap()),
            vec![
                ("x".to_string(), "trunk".to_string()),
                ("y".to_string(), "x".to_string()),
                ("z".to_string(), "y".to_string()),
            ]
        );

        execute(&c, &vcs, create_op("w", Some("z"))).unwrap();
        let err = execute(
            &c,
            &vcs,
            Operation::Update {
                name: "x".into(),
                request: UpdateRequest {
                    base: Some("w".into()),
                    ..Default::default()
                },
            },
        )
        .unwrap_err();
        assert!(matches!(err, StackError::CycleDetected { .. }));
        assert_eq!(c.store().load().unwrap().version, 4);
    }

    #[test]
    fn create_captures_base_tip_from_facts() {
        let dir = TempDir::new().unwrap();
        let c = ctx(&dir);
        let vcs = VcFacts {
            trunk_tip: Some("t1".into()),
            ..Default::default()
        };
        match execute(&c, &vcs, create_op("x", Some("main"))).unwrap() {
            Outcome::Created(b) => {
                assert_eq!(b.base_name, BaseRef::Trunk);
                assert_eq!(b.last_known_base_tip.as_deref(), Some("t1"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn create_uses_default_spec_from_context() {
        let dir = TempDir::new().unwrap();
        let c = InvocationContext::new(dir.path(), [(ENV_SPEC, "009-env")]).unwrap();
        let op = Operation::Create {
            name: "x".into(),
            base: None,
            spec_id: None,
            base_tip: None,
        };
        match execute(&c, &VcFacts::default(), op).unwrap() {
            Outcome::Created(b) => assert_eq!(b.spec_id.as_deref(), Some("009-env")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn merge_makes_dependent_stale_until_tip_refreshed() {
        let dir = TempDir::new().unwrap();
        let c = ctx(&dir);
        let before = VcFacts::default()
            .with_branch("x", tip("x1"))
            .with_branch("y", tip("y1"));
        execute(&c, &before, create_op("x", None)).unwrap();
        execute(&c, &before, create_op("y", Some("x"))).unwrap();
        execute(&c, &before, create_op("z", Some("y"))).unwrap();

        let merge = Operation::Update {
            name: "x".into(),
            request: UpdateRequest {
                status: Some(BranchStatus::Merged),
                ..Default::default()
            },
        };
        execute(&c, &before, merge).unwrap();

        let after = VcFacts::default()
            .with_branch("x", tip("x2"))
            .with_branch("y", tip("y1"));
        let health_of = |outcome: Outcome, name: &str| match outcome {
            Outcome::Health(r) => r.into_iter().find(|h| h.name == name).unwrap().health,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(
            health_of(execute(&c, &after, Operation::Status).unwrap(), "y"),
            Health::NeedsRebase
        );
        assert_eq!(
            health_of(execute(&c, &after, Operation::Status).unwrap(), "z"),
            Health::Active
        );

        let refresh = Operation::Update {
            name: "y".into(),
            request: UpdateRequest {
                refresh_base_tip: true,
                ..Default::default()
            },
        };
        execute(&c, &after, refresh).unwrap();
        assert_eq!(
            health_of(execute(&c, &after, Operation::Status).unwrap(), "y"),
            Health::Active
        );

        let merge_y = Operation::Update {
            name: "y".into(),
            request: UpdateRequest {
                status: Some(BranchStatus::Merged),
                ..Default::default()
            },
        };
        execute(&c, &after, merge_y).unwrap();
        let later = VcFacts::default()
            .with_branch("x", tip("x2"))
            .with_branch("y", tip("y2"));
        assert_eq!(
            health_of(execute(&c, &later, Operation::Status).unwrap(), "y"),
            Health::Merged
        );
        assert_eq!(
            health_of(execute(&c, &later, Operation::Status).unwrap(), "z"),
            Health::NeedsRebase
        );
    }

    #[test]
    fn refresh_without_facts_is_an_error() {
        let dir = TempDir::new().unwrap();
        let c = ctx(&dir);
        execute(&c, &VcFacts::default(), create_op("x", None)).unwrap();
        let missing = crate::vcs::FactsFile::new(dir.path().join("absent.json"));
        let err = execute(
            &c,
            &missing,
            Operation::Update {
                name: "x".into(),
                request: UpdateRequest {
                    refresh_base_tip: true,
                    ..Default::default()
                },
            },
        )
        .unwrap_err();
        assert!(matches!(err, StackError::VersionControlQuery(_)));
    }

    #[test]
    fn noop_update_does_not_write() {
        let dir = TempDir::new().unwrap();
        let c = ctx(&dir);
        execute(&c, &VcFacts::default(), create_op("x", None)).unwrap();
        let outcome = execute(
            &c,
            &VcFacts::default(),
            Operation::Update {
                name: "x".into(),
                request: UpdateRequest {
                    status: Some(BranchStatus::Active),
                    ..Default::default()
                },
            },
        )
        .unwrap();
        assert!(matches!(outcome, Outcome::Updated { written: false, .. }));
        assert_eq!(c.store().load().unwrap().version, 1);
    }

    #[test]
    fn submit_emits_pr_suggestion_without_mutation() {
        let dir = TempDir::new().unwrap();
        let c = ctx(&dir);
        let vcs = VcFacts::default();
        execute(&c, &vcs, create_op("x", None)).unwrap();
        execute(&c, &vcs, create_op("y", Some("x"))).unwrap();
        let version = c.store().load().unwrap().version;

        let outcome = execute(
            &c,
            &vcs,
            Operation::Submit {
                name: "y".into(),
                title: None,
                description: None,
            },
        )
        .unwrap();
        assert_eq!(outcome.exit_code(), 2);
        match outcome {
            Outcome::Envelope(ContractEnvelope::PrSuggestion(p)) => {
                assert_eq!(p.base, "x");
                assert_eq!(p.spec_id, "001-stack");
                assert_eq!(p.title, "001-stack: y");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(c.store().load().unwrap().version, version);

        match execute(
            &c,
            &vcs,
            Operation::Submit {
                name: "x".into(),
                title: Some("T".into()),
                description: Some("D".into()),
            },
        )
        .unwrap()
        {
            Outcome::Envelope(ContractEnvelope::PrSuggestion(p)) => {
                assert_eq!(p.base, "main");
                assert_eq!(p.title, "T");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn submit_requires_spec_and_active_status() {
        let dir = TempDir::new().unwrap();
        let c = ctx(&dir);
        let vcs = VcFacts::default();
        execute(
            &c,
            &vcs,
            Operation::Create {
                name: "nospec".into(),
                base: None,
                spec_id: None,
                base_tip: None,
            },
        )
        .unwrap();
        let submit = |name: &str| Operation::Submit {
            name: name.into(),
            title: None,
            description: None,
        };
        let err = execute(&c, &vcs, submit("nospec")).unwrap_err();
        assert!(err.to_string().contains("--spec"));

        execute(&c, &vcs, create_op("done", None)).unwrap();
        execute(
            &c,
            &vcs,
            Operation::Update {
                name: "done".into(),
                request: UpdateRequest {
                    status: Some(BranchStatus::Submitted),
                    pr_number: Some(12),
                    ..Default::default()
                },
            },
        )
        .unwrap();
        let err = execute(&c, &vcs, submit("done")).unwrap_err();
        assert!(err.to_string().contains("PR #12"));
    }

    #[test]
    fn import_prompts_then_applies_idempotently() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("specs/001-login")).unwrap();
        let c = ctx(&dir);
        let vcs = VcFacts::default()
            .with_branch(
                "feat-a",
                BranchFacts {
                    tip: Some("a1".into()),
                    merged_into_trunk: false,
                    upstream: Some("origin/main".into()),
                },
            )
            .with_branch(
                "feat-b",
                BranchFacts {
                    tip: Some("b1".into()),
                    merged_into_trunk: false,
                    upstream: Some("feat-a".into()),
                },
            );
        let import = |apply: bool| Operation::Import {
            patterns: vec!["origin/{branch}".into()],
            apply,
            spec_id: None,
        };

        let outcome = execute(&c, &vcs, import(false)).unwrap();
        assert_eq!(outcome.exit_code(), 3);
        match &outcome {
            Outcome::Envelope(ContractEnvelope::ImportPrompt(p)) => {
                assert_eq!(p.branches.len(), 2);
                assert_eq!(p.branches[0].branch_name, "feat-a");
                assert_eq!(p.branches[0].base_branch, "main");
                assert_eq!(p.branches[1].base_branch, "feat-a");
                assert_eq!(p.available_specs, vec!["001-login"]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(!c.layout.registry.exists());

        match execute(&c, &vcs, import(true)).unwrap() {
            Outcome::Imported { created, .. } => assert_eq!(created, vec!["feat-a", "feat-b"]),
            other => panic!("unexpected {other:?}"),
        }
        let doc = c.store().load().unwrap();
        assert_eq!(doc.version, 1);
        assert_eq!(
            doc.get("feat-b").unwrap().last_known_base_tip.as_deref(),
            Some("a1")
        );

        assert!(matches!(
            execute(&c, &vcs, import(true)).unwrap(),
            Outcome::NothingToImport(_)
        ));
        assert!(matches!(
            execute(&c, &vcs, import(false)).unwrap(),
            Outcome::NothingToImport(_)
        ));
        assert_eq!(c.store().load().unwrap().version, 1);
    }

    #[test]
    fn import_rejects_bad_pattern() {
        let dir = TempDir::new().unwrap();
        let c = ctx(&dir);
        let err = execute(
            &c,
            &VcFacts::default(),
            Operation::Import {
                patterns: vec!["origin/*".into()],
                apply: false,
                spec_id: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, StackError::InvalidPattern { .. }));
    }
}
