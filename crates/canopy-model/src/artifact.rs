//! Directory artifact for a trained model's hierarchy state.
//!
//! Layout:
//!
//! ```text
//! <dir>/manifest.json    format version + cross-check counts
//! <dir>/dag.json         LayeredDAG with its operator matrices, verbatim
//! <dir>/harmonizer.json  supports, learned weights, gates
//! <dir>/features.json    feature-extractor inclusion flags
//! ```
//!
//! Loading reads the DAG and its matrices exactly as serialised; it never
//! rebuilds them from the taxonomy. Rebuild only happens when the caller
//! constructs a fresh artifact from a changed taxonomy.

use std::fs;
use std::path::Path;

use canopy_core::LayeredDAG;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ModelError;
use crate::features::FeatureConfig;
use crate::harmonize::Harmonizer;

const FORMAT_VERSION: u32 = 1;

const MANIFEST_FILE: &str = "manifest.json";
const DAG_FILE: &str = "dag.json";
const HARMONIZER_FILE: &str = "harmonizer.json";
const FEATURES_FILE: &str = "features.json";

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    format_version: u32,
    nodes: usize,
    layers: usize,
}

/// Everything hierarchy-related that persists with a trained model.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub dag: LayeredDAG,
    pub harmonizer: Harmonizer,
    pub features: FeatureConfig,
}

impl Artifact {
    pub fn new(dag: LayeredDAG, harmonizer: Harmonizer, features: FeatureConfig) -> Self {
        Self {
            dag,
            harmonizer,
            features,
        }
    }

    /// Write the artifact into `dir`, creating it if needed.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<(), ModelError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let manifest = Manifest {
            format_version: FORMAT_VERSION,
            nodes: self.dag.number_of_nodes(),
            layers: self.dag.layer_names().count(),
        };
        fs::write(
            dir.join(MANIFEST_FILE),
            serde_json::to_string_pretty(&manifest)?,
        )?;
        fs::write(dir.join(DAG_FILE), serde_json::to_string(&self.dag)?)?;
        fs::write(
            dir.join(HARMONIZER_FILE),
            serde_json::to_string(&self.harmonizer)?,
        )?;
        fs::write(
            dir.join(FEATURES_FILE),
            serde_json::to_string_pretty(&self.features)?,
        )?;

        info!(dir = %dir.display(), nodes = manifest.nodes, "saved model artifact");
        Ok(())
    }

    /// Load an artifact saved by [`save`](Self::save), verbatim.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, ModelError> {
        let dir = dir.as_ref();

        let manifest: Manifest = read_json(dir, MANIFEST_FILE)?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(ModelError::ArtifactVersion {
                found: manifest.format_version,
                expected: FORMAT_VERSION,
            });
        }

        let dag: LayeredDAG = read_json(dir, DAG_FILE)?;
        if dag.number_of_nodes() != manifest.nodes {
            return Err(ModelError::ArtifactNodeCount {
                manifest: manifest.nodes,
                dag: dag.number_of_nodes(),
            });
        }

        let harmonizer: Harmonizer = read_json(dir, HARMONIZER_FILE)?;
        if harmonizer.dim() != dag.number_of_nodes() {
            return Err(ModelError::ShapeMismatch {
                expected: dag.number_of_nodes(),
                actual: harmonizer.dim(),
            });
        }

        let features: FeatureConfig = read_json(dir, FEATURES_FILE)?;

        info!(dir = %dir.display(), nodes = manifest.nodes, "loaded model artifact");
        Ok(Self {
            dag,
            harmonizer,
            features,
        })
    }
}

fn read_json<T: serde::de::DeserializeOwned>(dir: &Path, file: &str) -> Result<T, ModelError> {
    let path = dir.join(file);
    if !path.exists() {
        return Err(ModelError::MissingFile(path));
    }
    Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
}
