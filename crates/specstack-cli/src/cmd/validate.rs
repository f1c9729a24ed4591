use anyhow::Context;
use specstack_core::context::InvocationContext;
use specstack_core::contract::EXIT_OK;
use specstack_core::events::EventLog;
use specstack_core::validator::{ContractValidator, Verdict};
use std::io::Read;
use std::path::Path;

/// Exit code that tells the host to block the action.
pub const EXIT_BLOCKED: i32 = 2;

pub fn run(ctx: &InvocationContext, exit_code: i32, input: Option<&Path>) -> anyhow::Result<i32> {
    // Raw bytes: a channel that is not UTF-8 is a violation, not a read error.
    let channel = match input {
        Some(path) => {
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?
        }
        None => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .context("failed to read error channel from stdin")?;
            buf
        }
    };

    let validator = ContractValidator::new(EventLog::new(&ctx.layout.events), ctx.host);
    match validator.validate_bytes(exit_code, &channel) {
        Verdict::Allow(Some(envelope)) => {
            println!("{}", envelope.to_line()?);
            Ok(EXIT_OK)
        }
        Verdict::Allow(None) => Ok(EXIT_OK),
        Verdict::Block(report) => {
            eprintln!("{report}");
            Ok(EXIT_BLOCKED)
        }
    }
}
