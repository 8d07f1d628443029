//! Error taxonomy shared by every pipeline stage
//!
//! Structural problems (missing artifacts, missing columns, broken invariants)
//! abort the stage. Data-quality edge cases such as unresolved transition
//! lookups or constant columns never reach this type: they are logged and
//! replaced with a neutral value where they occur.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("missing upstream artifact {path}: run `{producer}` first")]
    MissingUpstreamArtifact { path: PathBuf, producer: String },

    #[error("table '{table}' is missing required columns: {}", missing.join(", "))]
    SchemaViolation { table: String, missing: Vec<String> },

    #[error("table '{table}', column '{column}', row {row}: cannot parse '{value}'")]
    InvalidValue {
        table: String,
        column: String,
        row: usize,
        value: String,
    },

    #[error("customer {customer_id}: '{field}' is not constant across monthly rows")]
    InconsistentCustomer { customer_id: i64, field: String },

    #[error("customer {customer_id}: invalid survival target ({detail})")]
    InvalidTarget { customer_id: i64, detail: String },

    #[error("cached model was trained on [{found}] but this run expects [{expected}]")]
    IncompatibleModel { expected: String, found: String },

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("matrix shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("k-means error: {0}")]
    KMeans(#[from] linfa_clustering::KMeansError),

    #[error("clustering metric error: {0}")]
    Metric(#[from] linfa::Error),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

impl PipelineError {
    pub fn missing_artifact(path: impl Into<PathBuf>, producer: &str) -> Self {
        Self::MissingUpstreamArtifact {
            path: path.into(),
            producer: producer.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_violation_lists_all_columns() {
        let err = PipelineError::SchemaViolation {
            table: "raw panel".into(),
            missing: vec!["balance".into(), "pix_count".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("balance, pix_count"), "got: {}", msg);
    }

    #[test]
    fn test_missing_artifact_names_producer() {
        let err = PipelineError::missing_artifact("data/processed/customer_features.csv", "build_features");
        assert!(err.to_string().contains("run `build_features` first"));
    }
}
