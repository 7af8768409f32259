use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("score vector has length {actual}, expected {expected} (one per taxonomy label)")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("support operator {index} is {rows}×{cols}, expected {expected}×{expected}")]
    SupportShape {
        index: usize,
        rows: usize,
        cols: usize,
        expected: usize,
    },

    #[error("projection weight {index} is {rows}×{cols}, expected {expected}×{expected}")]
    WeightShape {
        index: usize,
        rows: usize,
        cols: usize,
        expected: usize,
    },

    #[error("{supports} supports need {supports} weights and gates, got {weights} weights and {gates} gates")]
    ParameterCount {
        supports: usize,
        weights: usize,
        gates: usize,
    },

    #[error("gate {index} is {value} but gates are frozen at 1")]
    FrozenGate { index: usize, value: f32 },

    #[error("unknown feature identifier '{0}'")]
    UnknownFeature(String),

    #[error("unknown label '{0}' in score input")]
    UnknownLabel(String),

    #[error("artifact file not found: {0}")]
    MissingFile(PathBuf),

    #[error("artifact format version {found}, this build reads version {expected}")]
    ArtifactVersion { found: u32, expected: u32 },

    #[error("artifact declares {manifest} nodes but its DAG has {dag}")]
    ArtifactNodeCount { manifest: usize, dag: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
