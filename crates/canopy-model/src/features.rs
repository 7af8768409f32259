//! Feature-extractor configuration.
//!
//! The extractors themselves (molecular fingerprints computed upstream of the
//! network) are external collaborators; the model only needs to know which
//! ones a trained artifact was built with. Each known extractor has a stable
//! identifier, and the configuration is an explicit kind → flag table
//! validated eagerly: an unknown identifier is rejected at construction,
//! never resolved dynamically at lookup time.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Every feature extractor the surrounding pipeline knows how to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    AtomPair,
    Autocorrelation,
    Avalon,
    ExtendedConnectivity,
    FunctionalGroups,
    GhoseCrippen,
    Laggner,
    Layered,
    Lingo,
    Maccs,
    #[serde(rename = "minhashed")]
    MinHashed,
    #[serde(rename = "minhashed_atom_pair")]
    MinHashedAtomPair,
    MolecularQuantumNumbers,
    Pattern,
    #[serde(rename = "pubchem")]
    PubChem,
    #[serde(rename = "rdkit")]
    RdKit,
    SmilesExtendedConnectivity,
    TopologicalTorsion,
    VanDerWaalsSurfaceArea,
}

impl FeatureKind {
    pub const ALL: &[FeatureKind] = &[
        Self::AtomPair,
        Self::Autocorrelation,
        Self::Avalon,
        Self::ExtendedConnectivity,
        Self::FunctionalGroups,
        Self::GhoseCrippen,
        Self::Laggner,
        Self::Layered,
        Self::Lingo,
        Self::Maccs,
        Self::MinHashed,
        Self::MinHashedAtomPair,
        Self::MolecularQuantumNumbers,
        Self::Pattern,
        Self::PubChem,
        Self::RdKit,
        Self::SmilesExtendedConnectivity,
        Self::TopologicalTorsion,
        Self::VanDerWaalsSurfaceArea,
    ];

    /// Stable identifier, as used in config files. Mostly snake_case, with
    /// a few concatenated names kept for compatibility with existing configs.
    pub fn identifier(self) -> &'static str {
        match self {
            Self::AtomPair => "atom_pair",
            Self::Autocorrelation => "autocorrelation",
            Self::Avalon => "avalon",
            Self::ExtendedConnectivity => "extended_connectivity",
            Self::FunctionalGroups => "functional_groups",
            Self::GhoseCrippen => "ghose_crippen",
            Self::Laggner => "laggner",
            Self::Layered => "layered",
            Self::Lingo => "lingo",
            Self::Maccs => "maccs",
            Self::MinHashed => "minhashed",
            Self::MinHashedAtomPair => "minhashed_atom_pair",
            Self::MolecularQuantumNumbers => "molecular_quantum_numbers",
            Self::Pattern => "pattern",
            Self::PubChem => "pubchem",
            Self::RdKit => "rdkit",
            Self::SmilesExtendedConnectivity => "smiles_extended_connectivity",
            Self::TopologicalTorsion => "topological_torsion",
            Self::VanDerWaalsSurfaceArea => "van_der_waals_surface_area",
        }
    }

    pub fn from_identifier(identifier: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.identifier() == identifier)
    }
}

/// Inclusion flags for every known feature extractor.
///
/// Always total: each [`FeatureKind`] has an entry, so a lookup can never
/// miss. Deserialisation goes through [`FeatureConfig::from_pairs`] and
/// rejects unknown identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, bool>", into = "BTreeMap<String, bool>")]
pub struct FeatureConfig {
    flags: BTreeMap<FeatureKind, bool>,
}

impl FeatureConfig {
    /// All extractors excluded.
    pub fn none() -> Self {
        Self {
            flags: FeatureKind::ALL.iter().map(|&k| (k, false)).collect(),
        }
    }

    /// All extractors included.
    pub fn all() -> Self {
        Self {
            flags: FeatureKind::ALL.iter().map(|&k| (k, true)).collect(),
        }
    }

    /// Build from (identifier, flag) pairs, validating each identifier.
    /// Unlisted extractors default to excluded.
    pub fn from_pairs<'a>(
        pairs: impl IntoIterator<Item = (&'a str, bool)>,
    ) -> Result<Self, ModelError> {
        let mut config = Self::none();
        for (identifier, included) in pairs {
            let kind = FeatureKind::from_identifier(identifier)
                .ok_or_else(|| ModelError::UnknownFeature(identifier.to_string()))?;
            config.flags.insert(kind, included);
        }
        Ok(config)
    }

    pub fn include(&mut self, kind: FeatureKind) -> &mut Self {
        self.flags.insert(kind, true);
        self
    }

    pub fn is_included(&self, kind: FeatureKind) -> bool {
        self.flags.get(&kind).copied().unwrap_or(false)
    }

    /// Included kinds, in stable enum order.
    pub fn included(&self) -> impl Iterator<Item = FeatureKind> + '_ {
        self.flags
            .iter()
            .filter(|&(_, &included)| included)
            .map(|(&kind, _)| kind)
    }

    pub fn included_count(&self) -> usize {
        self.flags.values().filter(|&&v| v).count()
    }
}

impl TryFrom<BTreeMap<String, bool>> for FeatureConfig {
    type Error = ModelError;

    fn try_from(map: BTreeMap<String, bool>) -> Result<Self, Self::Error> {
        Self::from_pairs(map.iter().map(|(k, &v)| (k.as_str(), v)))
    }
}

impl From<FeatureConfig> for BTreeMap<String, bool> {
    fn from(config: FeatureConfig) -> Self {
        config
            .flags
            .into_iter()
            .map(|(kind, included)| (kind.identifier().to_string(), included))
            .collect()
    }
}
