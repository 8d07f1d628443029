//! Aggregate the raw monthly panel into one feature row per customer
//!
//! Usage: cargo run --bin build_features -- [--root DIR] [--config FILE]

use customer_scoring::cli::run_stage_binary;
use customer_scoring::Stage;

fn main() -> anyhow::Result<()> {
    run_stage_binary(Stage::Features)
}
