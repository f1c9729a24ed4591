use crate::output::{or_dash, print_json, print_table};
use anyhow::Context;
use specstack_core::context::InvocationContext;
use specstack_core::contract::EXIT_OK;
use specstack_core::surface::{self, Operation, Outcome};
use specstack_core::vcs::VersionControl;

pub fn run(ctx: &InvocationContext, vcs: &dyn VersionControl, json: bool) -> anyhow::Result<i32> {
    let reports = match surface::execute(ctx, vcs, Operation::Status)
        .context("failed to compute branch health")?
    {
        Outcome::Health(reports) => reports,
        other => anyhow::bail!("unexpected outcome for status: {other:?}"),
    };

    if json {
        print_json(&reports)?;
        return Ok(EXIT_OK);
    }

    if reports.is_empty() {
        println!("No tracked branches.");
        return Ok(EXIT_OK);
    }

    let trunk = ctx.trunk();
    let rows = reports
        .iter()
        .map(|r| {
            vec![
                r.name.clone(),
                r.base_name.display_name(trunk).to_string(),
                r.status.to_string(),
                r.health.to_string(),
                or_dash(r.detail.as_deref()),
            ]
        })
        .collect();
    print_table(&["BRANCH", "BASE", "STATUS", "HEALTH", "DETAIL"], rows);

    for r in &reports {
        if let Some(proposed) = r.proposed_status {
            println!(
                "\n'{}' is merged into {trunk}; record it with: specstack update {} --status {proposed}",
                r.name, r.name
            );
        }
    }
    Ok(EXIT_OK)
}
