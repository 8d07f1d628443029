//! Train the adoption propensity classifier and score every customer
//!
//! Usage: cargo run --bin propensity_model -- [--root DIR] [--config FILE]

use customer_scoring::cli::run_stage_binary;
use customer_scoring::Stage;

fn main() -> anyhow::Result<()> {
    run_stage_binary(Stage::Propensity)
}
