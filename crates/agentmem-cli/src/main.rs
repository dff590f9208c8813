mod cmd;
mod output;
mod root;

use agentmem_core::{ActionStatus, MemoryError};
use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "agentmem",
    about = "Shared action records for coordinating independent agents",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .agentmem/)
    #[arg(long, global = true, env = "AGENTMEM_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .agentmem/config.yaml with defaults
    Init,

    /// Publish (create or update) an action as pending or in-progress
    Publish {
        /// Owning agent id
        agent: String,
        /// Action id (generated when omitted)
        action: Option<String>,
        /// Action category, e.g. code_generation
        #[arg(long = "type", value_name = "TYPE")]
        action_type: String,
        /// pending or in-progress
        #[arg(long, default_value = "pending")]
        status: String,
        /// Payload as a JSON object
        #[arg(long)]
        payload: Option<String>,
        /// Dependencies as agent:action, comma separated
        #[arg(long, value_delimiter = ',')]
        depends: Vec<String>,
    },

    /// Read one action record
    Read { agent: String, action: String },

    /// Mark an action completed
    Complete {
        agent: String,
        action: String,
        /// Result as a JSON object
        #[arg(long)]
        result: Option<String>,
    },

    /// Mark an action failed
    Fail {
        agent: String,
        action: String,
        /// Result as a JSON object, e.g. {"error": "..."}
        #[arg(long)]
        result: Option<String>,
    },

    /// Block until an action completes or fails
    Wait {
        agent: String,
        action: String,
        /// Give up after this many milliseconds (default: config wait_timeout_ms)
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// List pending and in-progress actions
    Active,

    /// List every action of one agent
    Agent { agent: String },

    /// Per-agent status summary
    Status,

    /// List active actions that have not been updated recently
    Stale {
        #[arg(long, default_value = "600")]
        max_age_secs: u64,
    },

    /// Delete every action not updated within the given age
    Cleanup {
        #[arg(long, default_value = "24")]
        max_age_hours: u64,
    },

    /// Delete one action record
    Delete { agent: String, action: String },

    /// Serve the read-only HTTP snapshot API
    Serve {
        /// Port to listen on (0 = OS-assigned)
        #[arg(long, default_value = "3142")]
        port: u16,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());
    let json = cli.json;

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::Publish {
            agent,
            action,
            action_type,
            status,
            payload,
            depends,
        } => cmd::action::publish(
            &root,
            cmd::action::PublishArgs {
                agent,
                action,
                action_type,
                status,
                payload,
                depends,
            },
            json,
        ),
        Commands::Read { agent, action } => cmd::action::read(&root, &agent, &action, json),
        Commands::Complete {
            agent,
            action,
            result,
        } => cmd::action::finish(
            &root,
            &agent,
            &action,
            ActionStatus::Completed,
            result.as_deref(),
            json,
        ),
        Commands::Fail {
            agent,
            action,
            result,
        } => cmd::action::finish(
            &root,
            &agent,
            &action,
            ActionStatus::Failed,
            result.as_deref(),
            json,
        ),
        Commands::Wait {
            agent,
            action,
            timeout_ms,
        } => cmd::action::wait(&root, &agent, &action, timeout_ms, json),
        Commands::Active => cmd::query::active(&root, json),
        Commands::Agent { agent } => cmd::query::agent(&root, &agent, json),
        Commands::Status => cmd::query::status(&root, json),
        Commands::Stale { max_age_secs } => cmd::query::stale(&root, max_age_secs, json),
        Commands::Cleanup { max_age_hours } => cmd::cleanup::run(&root, max_age_hours, json),
        Commands::Delete { agent, action } => cmd::action::delete(&root, &agent, &action, json),
        Commands::Serve { port } => cmd::serve::run(&root, port),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(exit_code(&e));
    }
}

/// 2 when a wait ran out of time, 3 when the store could not be reached,
/// 1 for everything else.
fn exit_code(err: &anyhow::Error) -> i32 {
    match err.chain().find_map(|c| c.downcast_ref::<MemoryError>()) {
        Some(e) if e.is_timeout() => 2,
        Some(e) if e.is_store_unavailable() => 3,
        _ => 1,
    }
}
