//! Fit the adoption-timing model and write horizon probabilities
//!
//! Usage: cargo run --bin survival_model -- [--root DIR] [--config FILE]

use customer_scoring::cli::run_stage_binary;
use customer_scoring::Stage;

fn main() -> anyhow::Result<()> {
    run_stage_binary(Stage::Survival)
}
