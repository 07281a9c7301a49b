//! CLI entry point for the index rebalancer.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};

use indexbook_rebalancer::config::Config;
use indexbook_rebalancer::error::Error;
use indexbook_rebalancer::simulation::{self, RunOptions};
use indexbook_rebalancer::target::TargetSpec;

#[derive(Parser)]
#[command(name = "rebalancer")]
#[command(about = "Phased index rebalancer over Uniswap, Sushiswap and Balancer")]
#[command(version)]
struct Cli {
    /// Path to config.toml
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load targets, confirm, and trade until they are met
    Run {
        /// Path to target.json
        target: PathBuf,

        /// Show plan without trading
        #[arg(long)]
        dry_run: bool,

        /// Skip confirmation prompt (for automation/cron)
        #[arg(long)]
        force: bool,
    },

    /// Show normalized targets and the next trade per component
    Plan {
        /// Path to target.json
        target: PathBuf,
    },

    /// Show current portfolio holdings
    Status,
}

fn load_target(path: &Path) -> TargetSpec {
    match TargetSpec::load(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading target: {e}");
            process::exit(1);
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {e}");
            process::exit(1);
        }
    };

    let result = match cli.command {
        Command::Run {
            target,
            dry_run,
            force,
        } => {
            let spec = load_target(&target);
            let opts = RunOptions {
                dry_run,
                force,
                target_file: target.display().to_string(),
            };
            simulation::run(&config, &spec, &opts)
        }
        Command::Plan { target } => simulation::plan(&config, &load_target(&target)),
        Command::Status => simulation::status(&config),
    };

    if let Err(e) = result {
        match &e {
            Error::Engine(inner) => {
                eprintln!("\nAborted: {inner} ({:?})", inner.kind());
                process::exit(2);
            }
            Error::Aborted(msg) => {
                eprintln!("{msg}");
                process::exit(0);
            }
            _ => {
                eprintln!("Error: {e}");
                process::exit(1);
            }
        }
    }
}
