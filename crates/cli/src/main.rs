//! ferrocode CLI: the main entry point.
//!
//! Commands:
//! - `run`         Run one prompt to completion (blocking command-runner)
//! - `chat`        Interactive session (event-loop terminal UI)
//! - `config`      Create or show the configuration file
//! - `checkpoint`  Inspect or clear the saved checkpoint

use clap::{Parser, Subcommand};

mod commands;
mod prompt;
mod session;

#[derive(Parser)]
#[command(
    name = "ferrocode",
    about = "ferrocode: an autonomous coding agent for the terminal",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single prompt until the agent is done
    Run {
        /// The task for the agent
        prompt: String,

        /// Approve every confirmation without asking
        #[arg(short, long)]
        yes: bool,

        /// Deny tools flagged unsafe (e.g. run_shell)
        #[arg(long)]
        safe_mode: bool,
    },

    /// Start an interactive session
    Chat {
        /// Deny tools flagged unsafe (e.g. run_shell)
        #[arg(long)]
        safe_mode: bool,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Inspect or remove the saved checkpoint
    Checkpoint {
        #[command(subcommand)]
        action: CheckpointAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
}

#[derive(Subcommand)]
enum CheckpointAction {
    /// Print the saved checkpoint
    Show,
    /// Delete the saved checkpoint
    Clear,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so they never interleave with assistant output.
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run {
            prompt,
            yes,
            safe_mode,
        } => commands::run::execute(&prompt, yes, safe_mode),
        Commands::Chat { safe_mode } => commands::chat::execute(safe_mode),
        Commands::Config { action } => match action {
            ConfigAction::Init { force } => commands::config_cmd::init(force),
            ConfigAction::Show => commands::config_cmd::show(),
        },
        Commands::Checkpoint { action } => {
            let runtime = tokio::runtime::Runtime::new()?;
            match action {
                CheckpointAction::Show => runtime.block_on(commands::checkpoint::show()),
                CheckpointAction::Clear => runtime.block_on(commands::checkpoint::clear()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from(["ferrocode", "run", "fix the build", "--yes"]).unwrap();
        match cli.command {
            Commands::Run { prompt, yes, .. } => {
                assert_eq!(prompt, "fix the build");
                assert!(yes);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn nested_subcommands_parse() {
        let cli = Cli::try_parse_from(["ferrocode", "-v", "checkpoint", "clear"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::Checkpoint {
                action: CheckpointAction::Clear
            }
        ));
    }
}
