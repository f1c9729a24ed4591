use crate::output::{branch_json, print_json};
use anyhow::Context;
use specstack_core::branch::Branch;
use specstack_core::context::InvocationContext;
use specstack_core::contract::EXIT_OK;
use specstack_core::surface::{self, Operation, Outcome, UpdateRequest};
use specstack_core::vcs::VersionControl;

pub fn run(
    ctx: &InvocationContext,
    vcs: &dyn VersionControl,
    name: String,
    request: UpdateRequest,
    json: bool,
) -> anyhow::Result<i32> {
    let op = Operation::Update {
        name: name.clone(),
        request,
    };
    let (before, after, written) = match surface::execute(ctx, vcs, op)
        .with_context(|| format!("failed to update branch '{name}'"))?
    {
        Outcome::Updated {
            before,
            after,
            written,
        } => (before, after, written),
        other => anyhow::bail!("unexpected outcome for update: {other:?}"),
    };

    if json {
        print_json(&serde_json::json!({
            "before": branch_json(&before)?,
            "after": branch_json(&after)?,
            "changed": written,
        }))?;
        return Ok(EXIT_OK);
    }

    if !written {
        println!("No changes to '{name}'");
        return Ok(EXIT_OK);
    }
    println!("Updated '{name}'");
    for line in changes(&before, &after, ctx.trunk()) {
        println!("  {line}");
    }
    Ok(EXIT_OK)
}

fn changes(before: &Branch, after: &Branch, trunk: &str) -> Vec<String> {
    let mut out = Vec::new();
    if before.base_name != after.base_name {
        out.push(format!(
            "base: {} -> {}",
            before.base_name.display_name(trunk),
            after.base_name.display_name(trunk)
        ));
    }
    if before.status != after.status {
        out.push(format!("status: {} -> {}", before.status, after.status));
    }
    if before.pr_number != after.pr_number {
        if let Some(pr) = after.pr_number {
            out.push(format!("pr: #{pr}"));
        }
    }
    if before.spec_id != after.spec_id {
        if let Some(spec) = &after.spec_id {
            out.push(format!("spec: {spec}"));
        }
    }
    if before.last_known_base_tip != after.last_known_base_tip {
        match &after.last_known_base_tip {
            Some(tip) => out.push(format!("base tip: {tip}")),
            None => out.push("base tip: cleared".to_string()),
        }
    }
    out
}
