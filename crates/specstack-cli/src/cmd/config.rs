use crate::output::print_json;
use clap::Subcommand;
use specstack_core::config::{Config, WarnLevel};
use specstack_core::context::InvocationContext;
use specstack_core::contract::EXIT_OK;

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show the effective configuration
    Show,

    /// Validate the config for common mistakes
    Validate,
}

pub fn run(ctx: &InvocationContext, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<i32> {
    match subcmd {
        ConfigSubcommand::Show => show(ctx, json),
        ConfigSubcommand::Validate => validate(ctx, json),
    }
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(ctx: &InvocationContext, json: bool) -> anyhow::Result<i32> {
    let config = &ctx.config;
    if json {
        print_json(config)?;
        return Ok(EXIT_OK);
    }

    let source = if ctx.layout.config.exists() {
        ctx.layout.config.display().to_string()
    } else {
        "(defaults)".to_string()
    };
    println!("Source:             {source}");
    println!("Trunk:              {}", config.trunk);
    println!("Max write attempts: {}", config.max_write_attempts);
    println!("Specs dir:          {}", config.specs_dir);
    if config.import.upstream_patterns.is_empty() {
        println!("Upstream patterns:  (none)");
    } else {
        println!("Upstream patterns:");
        for p in &config.import.upstream_patterns {
            println!("  {p}");
        }
    }
    Ok(EXIT_OK)
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(ctx: &InvocationContext, json: bool) -> anyhow::Result<i32> {
    let warnings = ctx.config.validate();

    if json {
        print_json(&serde_json::json!({ "warnings": warnings }))?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if Config::has_errors(&warnings) {
        anyhow::bail!("config validation found errors");
    }
    Ok(EXIT_OK)
}
