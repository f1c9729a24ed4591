use crate::output::emit_envelope;
use anyhow::Context;
use specstack_core::context::InvocationContext;
use specstack_core::surface::{self, Operation, Outcome};
use specstack_core::vcs::VersionControl;

/// Emits a pr-suggestion envelope; the host opens the PR and calls back
/// `update <name> --pr N --status submitted`.
pub fn run(
    ctx: &InvocationContext,
    vcs: &dyn VersionControl,
    name: String,
    title: Option<String>,
    description: Option<String>,
) -> anyhow::Result<i32> {
    let op = Operation::Submit {
        name: name.clone(),
        title,
        description,
    };
    match surface::execute(ctx, vcs, op).with_context(|| format!("failed to submit '{name}'"))? {
        Outcome::Envelope(envelope) => emit_envelope(&envelope),
        other => anyhow::bail!("unexpected outcome for submit: {other:?}"),
    }
}
