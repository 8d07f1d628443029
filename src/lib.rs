//! Customer Scoring - batch pipeline that turns a monthly transaction panel
//! into one prioritised action score per customer
//!
//! This library provides:
//! - Per-customer feature aggregation from the raw monthly panel
//! - Behavioural clustering with rule-based profile labels
//! - Monthly Markov transitions between behavioural states
//! - Cox proportional-hazards adoption timing
//! - Gradient-boosted adoption propensity
//! - Score fusion into Low / Medium / High priority tiers

pub mod cli;
pub mod config;
pub mod error;
pub mod matrix;
pub mod pipeline;
pub mod rng;
pub mod store;

pub mod clustering;
pub mod features;
pub mod propensity;
pub mod scoring;
pub mod survival;
pub mod transitions;

// Re-export commonly used types
pub use config::{BoosterKind, CachedModelPolicy, PipelineConfig};
pub use error::{PipelineError, PipelineResult};
pub use pipeline::{PipelineRunner, Stage, StageReport};
pub use scoring::{FinalScoreRow, PriorityTier};
pub use store::{ArtifactPaths, Table, TableStore};
