mod cmd;
mod output;
mod settings;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use settings::{SettingsArgs, SourceArgs};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "job-executor",
    about = "Run the containerized tasks of lifecycle events as Kubernetes jobs",
    version,
    propagate_version = true
)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(flatten)]
    settings: SettingsArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Handle one CloudEvent from a file and print the action report
    Run {
        /// CloudEvent JSON file
        #[arg(long)]
        event: PathBuf,

        #[command(flatten)]
        sources: SourceArgs,
    },

    /// Receive CloudEvents over HTTP
    Serve {
        /// Port to listen on
        #[arg(long, env = "PORT", default_value = "8080")]
        port: u16,

        #[command(flatten)]
        sources: SourceArgs,
    },

    /// Inspect job configs
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

    let result = match cli.command {
        Commands::Run { event, sources } => cmd::run::run(&event, &cli.settings, &sources, cli.json),
        Commands::Serve { port, sources } => cmd::serve::run(port, &cli.settings, &sources),
        Commands::Config { subcommand } => cmd::config::run(subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
