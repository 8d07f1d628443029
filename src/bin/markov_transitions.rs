//! Estimate the monthly transition matrix between behavioural states
//!
//! Usage: cargo run --bin markov_transitions -- [--root DIR] [--config FILE]

use customer_scoring::cli::run_stage_binary;
use customer_scoring::Stage;

fn main() -> anyhow::Result<()> {
    run_stage_binary(Stage::Transitions)
}
