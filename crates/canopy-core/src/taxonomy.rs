//! Taxonomy description: ordered layers of labels with parent declarations.
//!
//! A taxonomy is the raw input to [`crate::LayeredDAG`]: an ordered list of
//! layers (top layer first), each an ordered list of labels, each label
//! naming its parents in the immediately preceding layer. Order fixes the
//! global node index of the built DAG, so the serde representation uses
//! vectors, never maps.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::TaxonomyError;

/// One label in a taxonomy layer, with its parent labels in the previous layer.
///
/// `parents` is empty for top-layer labels. Multiple parents are legitimate:
/// a label may belong to more than one category of the layer above.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyLabel {
    pub name: String,
    #[serde(default)]
    pub parents: Vec<String>,
}

/// One layer of the taxonomy: a named, ordered list of labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyLayer {
    pub name: String,
    pub labels: Vec<TaxonomyLabel>,
}

/// An ordered taxonomy, top layer first.
///
/// Parsing performs no structural validation beyond shape; dangling parents,
/// duplicates, and empty layers are caught once, at DAG construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taxonomy {
    pub layers: Vec<TaxonomyLayer>,
}

impl TaxonomyLabel {
    pub fn new(name: impl Into<String>, parents: &[&str]) -> Self {
        Self {
            name: name.into(),
            parents: parents.iter().map(|p| (*p).to_string()).collect(),
        }
    }
}

impl TaxonomyLayer {
    pub fn new(name: impl Into<String>, labels: Vec<TaxonomyLabel>) -> Self {
        Self {
            name: name.into(),
            labels,
        }
    }
}

impl Taxonomy {
    pub fn new(layers: Vec<TaxonomyLayer>) -> Self {
        Self { layers }
    }

    /// Total number of labels across all layers.
    pub fn label_count(&self) -> usize {
        self.layers.iter().map(|l| l.labels.len()).sum()
    }

    /// Total number of declared parent/child edges.
    pub fn edge_count(&self) -> usize {
        self.layers
            .iter()
            .flat_map(|l| l.labels.iter())
            .map(|lab| lab.parents.len())
            .sum()
    }

    /// Parse a taxonomy from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, TaxonomyError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a taxonomy from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, TaxonomyError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(TaxonomyError::FileNotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Serialise to pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String, TaxonomyError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
