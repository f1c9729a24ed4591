use crate::output::{emit_envelope, print_json};
use anyhow::Context;
use specstack_core::context::InvocationContext;
use specstack_core::contract::EXIT_OK;
use specstack_core::import::ImportPlan;
use specstack_core::surface::{self, Operation, Outcome};
use specstack_core::vcs::VersionControl;

pub fn run(
    ctx: &InvocationContext,
    vcs: &dyn VersionControl,
    patterns: Vec<String>,
    apply: bool,
    spec_id: Option<String>,
    json: bool,
) -> anyhow::Result<i32> {
    let op = Operation::Import {
        patterns,
        apply,
        spec_id,
    };
    let outcome = surface::execute(ctx, vcs, op).context("failed to import branches")?;

    match outcome {
        Outcome::Envelope(envelope) => emit_envelope(&envelope),
        Outcome::NothingToImport(plan) => {
            if json {
                print_json(&plan)?;
            } else {
                println!("Nothing to import.");
                print_skipped(&plan);
            }
            Ok(EXIT_OK)
        }
        Outcome::Imported { plan, created } => {
            if json {
                print_json(&serde_json::json!({
                    "created": created,
                    "plan": plan,
                }))?;
            } else {
                println!("Imported {} branch(es):", created.len());
                for b in &plan.branches {
                    println!("  {} <- {}", b.base_name.display_name(ctx.trunk()), b.name);
                }
                print_skipped(&plan);
            }
            Ok(EXIT_OK)
        }
        other => anyhow::bail!("unexpected outcome for import: {other:?}"),
    }
}

fn print_skipped(plan: &ImportPlan) {
    for r in &plan.rejected {
        println!("  skipped {}: {}", r.name, r.reason);
    }
}
