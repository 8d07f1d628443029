//! Cluster customers and write labelled profile cards
//!
//! Usage: cargo run --bin cluster_profiles -- [--root DIR] [--config FILE]

use customer_scoring::cli::run_stage_binary;
use customer_scoring::Stage;

fn main() -> anyhow::Result<()> {
    run_stage_binary(Stage::Clusters)
}
