//! Model layer: harmonization of raw per-label scores against a layered
//! taxonomy DAG, feature configuration, and artifact persistence.

pub mod artifact;
pub mod error;
pub mod features;
pub mod harmonize;
pub mod predict;

pub use artifact::Artifact;
pub use error::ModelError;
pub use features::{FeatureConfig, FeatureKind};
pub use harmonize::{Activation, HarmonizeConfig, HarmonizeGradients, Harmonizer};
pub use predict::{LayerScores, partition_scores};
