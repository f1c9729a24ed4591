use crate::output::{branch_json, or_dash, print_json, print_table};
use anyhow::Context;
use specstack_core::context::InvocationContext;
use specstack_core::contract::EXIT_OK;
use specstack_core::surface::{self, Operation, Outcome};
use specstack_core::vcs::VersionControl;

pub fn run(ctx: &InvocationContext, vcs: &dyn VersionControl, json: bool) -> anyhow::Result<i32> {
    let branches = match surface::execute(ctx, vcs, Operation::List)
        .context("failed to list branches")?
    {
        Outcome::Listed(branches) => branches,
        other => anyhow::bail!("unexpected outcome for list: {other:?}"),
    };

    if json {
        let items = branches
            .iter()
            .map(branch_json)
            .collect::<anyhow::Result<Vec<_>>>()?;
        print_json(&items)?;
        return Ok(EXIT_OK);
    }

    if branches.is_empty() {
        println!("No tracked branches.");
        return Ok(EXIT_OK);
    }

    let rows = branches
        .iter()
        .map(|b| {
            vec![
                b.name.clone(),
                b.base_name.display_name(ctx.trunk()).to_string(),
                b.status.to_string(),
                or_dash(b.spec_id.as_deref()),
                or_dash(b.pr_number.map(|pr| format!("#{pr}"))),
            ]
        })
        .collect();
    print_table(&["BRANCH", "BASE", "STATUS", "SPEC", "PR"], rows);
    Ok(EXIT_OK)
}
