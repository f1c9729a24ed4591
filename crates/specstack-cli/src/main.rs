mod cmd;
mod output;
mod root;

use anyhow::Context;
use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use specstack_core::context::InvocationContext;
use specstack_core::contract::{EXIT_FAILURE, EXIT_OK};
use specstack_core::surface::UpdateRequest;
use specstack_core::types::BranchStatus;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "specstack",
    about = "Track stacked branches against their bases and hand privileged git actions to the host",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .specstack/ or .git/)
    #[arg(long, global = true, env = "SPECSTACK_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start tracking a branch on top of a base (trunk when omitted)
    Create {
        name: String,
        /// Base branch; the trunk name means "no tracked base"
        #[arg(long)]
        base: Option<String>,
        /// Spec this branch implements
        #[arg(long = "spec")]
        spec_id: Option<String>,
        /// Base tip to record instead of the one from version-control facts
        #[arg(long)]
        base_tip: Option<String>,
    },

    /// Change a tracked branch's base, status, PR or spec
    Update {
        name: String,
        #[arg(long)]
        base: Option<String>,
        /// active, submitted or merged (forward only)
        #[arg(long)]
        status: Option<BranchStatus>,
        #[arg(long = "pr")]
        pr_number: Option<u64>,
        #[arg(long = "spec")]
        spec_id: Option<String>,
        #[arg(long, conflicts_with = "refresh_base_tip")]
        base_tip: Option<String>,
        /// Record the base's current tip from version-control facts
        #[arg(long)]
        refresh_base_tip: bool,
        /// Move a merged branch back to active
        #[arg(long)]
        reopen: bool,
    },

    /// List tracked branches, bases before dependents
    List,

    /// Show the health of every tracked branch
    Status,

    /// Infer untracked local branches and their bases
    Import {
        /// Upstream glob template containing {branch}, e.g. origin/{branch}
        #[arg(long = "pattern")]
        patterns: Vec<String>,
        /// Record the inferred branches instead of asking the host
        #[arg(long)]
        apply: bool,
        #[arg(long = "spec")]
        spec_id: Option<String>,
    },

    /// Ask the host to open a pull request for a branch
    Submit {
        name: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },

    /// Check a command's error output against the envelope contract
    Validate {
        /// Exit code the checked command returned
        #[arg(long, allow_hyphen_values = true)]
        exit_code: i32,
        /// File holding the captured error channel (default: stdin)
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Show or validate the project configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    // clap exits 2 on usage errors, which the envelope contract reserves.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = match e.kind() {
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                    EXIT_OK
                }
                _ => EXIT_FAILURE,
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    match run(cli, &root) {
        Ok(EXIT_OK) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            // Print the full error chain (anyhow's alternate Display)
            eprintln!("error: {e:#}");
            std::process::exit(EXIT_FAILURE);
        }
    }
}

fn run(cli: Cli, root: &Path) -> anyhow::Result<i32> {
    let ctx = InvocationContext::new(root, std::env::vars())
        .with_context(|| format!("failed to load project at {}", root.display()))?;
    let vcs = ctx.facts_file();
    let json = cli.json;

    match cli.command {
        Commands::Create {
            name,
            base,
            spec_id,
            base_tip,
        } => cmd::create::run(&ctx, &vcs, name, base, spec_id, base_tip, json),
        Commands::Update {
            name,
            base,
            status,
            pr_number,
            spec_id,
            base_tip,
            refresh_base_tip,
            reopen,
        } => cmd::update::run(
            &ctx,
            &vcs,
            name,
            UpdateRequest {
                base,
                status,
                pr_number,
                spec_id,
                base_tip,
                refresh_base_tip,
                reopen,
            },
            json,
        ),
        Commands::List => cmd::list::run(&ctx, &vcs, json),
        Commands::Status => cmd::status::run(&ctx, &vcs, json),
        Commands::Import {
            patterns,
            apply,
            spec_id,
        } => cmd::import::run(&ctx, &vcs, patterns, apply, spec_id, json),
        Commands::Submit {
            name,
            title,
            description,
        } => cmd::submit::run(&ctx, &vcs, name, title, description),
        Commands::Validate { exit_code, input } => {
            cmd::validate::run(&ctx, exit_code, input.as_deref())
        }
        Commands::Config { subcommand } => cmd::config::run(&ctx, subcommand, json),
    }
}
