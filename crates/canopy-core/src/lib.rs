pub mod dag;
pub mod error;
pub mod taxonomy;

pub use dag::LayeredDAG;
pub use error::TaxonomyError;
pub use taxonomy::{Taxonomy, TaxonomyLabel, TaxonomyLayer};
