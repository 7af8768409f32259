//! Per-layer partitioning of harmonized score vectors.
//!
//! The prediction surface consumes one harmonized vector of length N and
//! buckets it back into one probability table per taxonomy layer, in layer
//! order, using the DAG's canonical node index.

use canopy_core::LayeredDAG;
use serde::Serialize;

use crate::error::ModelError;

/// Scores for one taxonomy layer, in the layer's label order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerScores {
    pub layer: String,
    pub entries: Vec<(String, f32)>,
}

impl LayerScores {
    /// The `k` highest-scoring labels, descending.
    pub fn top_k(&self, k: usize) -> Vec<(String, f32)> {
        let mut ranked = self.entries.clone();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(k);
        ranked
    }
}

/// Partition a harmonized score vector into one table per taxonomy layer.
///
/// The tables exactly cover the input: every score lands in precisely one
/// layer, order preserved. A vector of the wrong length is a contract
/// violation, never truncated or padded.
pub fn partition_scores(dag: &LayeredDAG, scores: &[f32]) -> Result<Vec<LayerScores>, ModelError> {
    if scores.len() != dag.number_of_nodes() {
        return Err(ModelError::ShapeMismatch {
            expected: dag.number_of_nodes(),
            actual: scores.len(),
        });
    }

    let mut tables = Vec::new();
    let mut offset = 0;
    for (layer, labels) in dag.layers() {
        let entries = labels
            .iter()
            .zip(&scores[offset..offset + labels.len()])
            .map(|(label, &score)| (label.clone(), score))
            .collect();
        offset += labels.len();
        tables.push(LayerScores {
            layer: layer.to_string(),
            entries,
        });
    }
    Ok(tables)
}
