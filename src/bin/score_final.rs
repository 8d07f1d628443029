//! Fuse all signals into the final prioritised score table
//!
//! Usage: cargo run --bin score_final -- [--root DIR] [--config FILE]

use customer_scoring::cli::run_stage_binary;
use customer_scoring::Stage;

fn main() -> anyhow::Result<()> {
    run_stage_binary(Stage::Score)
}
