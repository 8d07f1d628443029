//! Customer Scoring CLI
//!
//! Runs one pipeline stage or the whole pipeline against an artifact root

use anyhow::Context;
use clap::{Parser, Subcommand};
use customer_scoring::cli::{print_saved, CommonArgs};
use customer_scoring::Stage;

#[derive(Parser, Debug)]
#[command(name = "customer-scoring", version, about = "Batch customer scoring pipeline", long_about = None)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a single stage by name (build_features, survival, ...) or number (1-6)
    Run {
        stage: Stage,
    },
    /// Run every stage in order
    All,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let runner = cli.common.runner()?;

    match cli.command {
        Command::Run { stage } => {
            let report = runner
                .run(stage)
                .with_context(|| format!("stage {} ({}) failed", stage.number(), stage))?;
            print_saved(&report);
        }
        Command::All => {
            for stage in Stage::all() {
                let report = runner
                    .run(stage)
                    .with_context(|| format!("stage {} ({}) failed", stage.number(), stage))?;
                print_saved(&report);
            }
        }
    }
    Ok(())
}
