//! Exemplar CLI - few-shot open-set image classification experiments.
//!
//! Exemplar classifies the query images of a category against small support
//! sets, sweeping shot-counts and rejection thresholds, and writes one
//! prediction table per cell plus a summary.
//!
//! # Usage
//!
//! ```bash
//! # Run the default grid over a category
//! exemplar run ./data/birds
//!
//! # Custom axes
//! exemplar run ./data/birds --shots 1,5 --thresholds 0.5,0.7,0.9 --seed 7
//!
//! # View configuration
//! exemplar config show
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// Exemplar - few-shot open-set image classification experiments.
#[derive(Parser, Debug)]
#[command(name = "exemplar")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the shot × threshold grid over a category
    Run(cli::run::RunArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config warnings go through eprintln.
    let config = match exemplar_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `exemplar config path`."
            );
            exemplar_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Exemplar v{}", exemplar_core::VERSION);

    match cli.command {
        Commands::Run(args) => cli::run::execute(args).await,
        Commands::Config(args) => cli::config::execute(args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_axes() {
        let parsed = Cli::try_parse_from([
            "exemplar",
            "-v",
            "run",
            "./birds",
            "--shots",
            "1,5",
            "--thresholds",
            "0.3,0.9",
        ])
        .unwrap();
        assert!(parsed.verbose);
        let Commands::Run(args) = parsed.command else {
            panic!("expected run command");
        };
        assert_eq!(args.shots, Some(vec![1, 5]));
        assert_eq!(args.thresholds, Some(vec![0.3, 0.9]));
    }

    #[test]
    fn test_parse_config_init_force() {
        let parsed = Cli::try_parse_from(["exemplar", "config", "init", "--force"]).unwrap();
        assert!(matches!(
            parsed.command,
            Commands::Config(cli::config::ConfigArgs {
                command: cli::config::ConfigCommand::Init { force: true }
            })
        ));
    }
}
