use crate::output::{branch_json, print_json};
use anyhow::Context;
use specstack_core::context::InvocationContext;
use specstack_core::contract::EXIT_OK;
use specstack_core::surface::{self, Operation, Outcome};
use specstack_core::vcs::VersionControl;

pub fn run(
    ctx: &InvocationContext,
    vcs: &dyn VersionControl,
    name: String,
    base: Option<String>,
    spec_id: Option<String>,
    base_tip: Option<String>,
    json: bool,
) -> anyhow::Result<i32> {
    let op = Operation::Create {
        name: name.clone(),
        base,
        spec_id,
        base_tip,
    };
    let branch = match surface::execute(ctx, vcs, op)
        .with_context(|| format!("failed to create branch '{name}'"))?
    {
        Outcome::Created(branch) => branch,
        other => anyhow::bail!("unexpected outcome for create: {other:?}"),
    };

    if json {
        print_json(&branch_json(&branch)?)?;
    } else {
        println!(
            "Created '{}' on '{}'",
            branch.name,
            branch.base_name.display_name(ctx.trunk())
        );
    }
    Ok(EXIT_OK)
}
