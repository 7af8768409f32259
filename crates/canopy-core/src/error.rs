use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaxonomyError {
    #[error("taxonomy file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("taxonomy has no layers")]
    EmptyTaxonomy,

    #[error("layer '{layer}' has no labels")]
    EmptyLayer { layer: String },

    #[error("duplicate layer name '{layer}'")]
    DuplicateLayer { layer: String },

    #[error("duplicate label '{label}' in layer '{layer}'")]
    DuplicateLabel { layer: String, label: String },

    #[error("label '{label}' in layer '{layer}' declares parent '{parent}' not found in the previous layer")]
    UnknownParent {
        layer: String,
        label: String,
        parent: String,
    },

    #[error("label '{label}' in top layer '{layer}' declares parent '{parent}' but no layer precedes it")]
    TopLayerParent {
        layer: String,
        label: String,
        parent: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}
