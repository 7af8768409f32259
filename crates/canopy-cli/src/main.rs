//! Canopy CLI: build, inspect, and query hierarchy-harmonization artifacts.

mod display;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use canopy_core::{LayeredDAG, Taxonomy};
use canopy_model::{Activation, Artifact, FeatureConfig, HarmonizeConfig, Harmonizer};
use clap::{Parser, Subcommand};
use ndarray::Array1;
use serde::Deserialize;

#[derive(Parser)]
#[command(
    name = "canopy",
    version,
    about = "Hierarchy-consistent multi-label score harmonization"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a taxonomy file and print its structure.
    Inspect {
        /// Taxonomy JSON (ordered layers of labels with parents).
        taxonomy: PathBuf,
    },
    /// Build a DAG and freshly initialised harmonizer, save as an artifact.
    Build {
        taxonomy: PathBuf,
        /// Output artifact directory.
        #[arg(long)]
        out: PathBuf,
        /// Keep the per-support gates fixed at 1 instead of trainable.
        #[arg(long)]
        frozen_gates: bool,
        /// Feature extractors to mark as included, by identifier.
        #[arg(long = "feature")]
        features: Vec<String>,
    },
    /// Harmonize a raw score vector and print per-layer tables.
    Harmonize {
        /// Artifact directory written by `canopy build`.
        artifact: PathBuf,
        /// Raw scores: a JSON array in node order, or an object keyed by label.
        #[arg(long)]
        scores: PathBuf,
        /// Rows to show per layer.
        #[arg(long, default_value_t = 5)]
        top: usize,
    },
}

/// Raw score input, either positional or keyed by label name.
#[derive(Deserialize)]
#[serde(untagged)]
enum ScoresFile {
    Vector(Vec<f32>),
    ByLabel(BTreeMap<String, f32>),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    tracing::debug!("canopy v{}", env!("CARGO_PKG_VERSION"));
    let cli = Cli::parse();

    match cli.command {
        Command::Inspect { taxonomy } => inspect(&taxonomy),
        Command::Build {
            taxonomy,
            out,
            frozen_gates,
            features,
        } => build(&taxonomy, &out, frozen_gates, &features),
        Command::Harmonize {
            artifact,
            scores,
            top,
        } => harmonize(&artifact, &scores, top),
    }
}

fn inspect(taxonomy_path: &Path) -> anyhow::Result<()> {
    let taxonomy = Taxonomy::from_path(taxonomy_path)
        .with_context(|| format!("reading {}", taxonomy_path.display()))?;
    let dag = LayeredDAG::from_taxonomy(&taxonomy).context("taxonomy failed validation")?;
    display::taxonomy_summary(&taxonomy, &dag);
    Ok(())
}

fn build(
    taxonomy_path: &Path,
    out: &Path,
    frozen_gates: bool,
    features: &[String],
) -> anyhow::Result<()> {
    let taxonomy = Taxonomy::from_path(taxonomy_path)
        .with_context(|| format!("reading {}", taxonomy_path.display()))?;
    let dag = LayeredDAG::from_taxonomy(&taxonomy).context("taxonomy failed validation")?;

    let config = HarmonizeConfig {
        learn_gates: !frozen_gates,
        activation: Activation::Identity,
    };
    let harmonizer = Harmonizer::new(&dag, &config, &mut rand::thread_rng());
    let feature_config = FeatureConfig::from_pairs(
        features.iter().map(|identifier| (identifier.as_str(), true)),
    )?;

    let artifact = Artifact::new(dag, harmonizer, feature_config);
    artifact
        .save(out)
        .with_context(|| format!("writing artifact to {}", out.display()))?;
    println!(
        "built artifact: {} nodes, saved to {}",
        artifact.dag.number_of_nodes(),
        out.display()
    );
    Ok(())
}

fn harmonize(artifact_dir: &Path, scores_path: &Path, top: usize) -> anyhow::Result<()> {
    let artifact = Artifact::load(artifact_dir)
        .with_context(|| format!("loading artifact from {}", artifact_dir.display()))?;

    let text = std::fs::read_to_string(scores_path)
        .with_context(|| format!("reading {}", scores_path.display()))?;
    let raw = into_score_vector(serde_json::from_str(&text)?, &artifact.dag)?;

    let harmonized = artifact.harmonizer.forward(raw.view())?;
    let harmonized = harmonized.to_vec();
    let tables = canopy_model::partition_scores(&artifact.dag, &harmonized)?;
    display::layer_tables(&tables, top);
    Ok(())
}

/// Resolve a scores file into a dense vector in the DAG's node order.
fn into_score_vector(file: ScoresFile, dag: &LayeredDAG) -> anyhow::Result<Array1<f32>> {
    match file {
        ScoresFile::Vector(values) => Ok(Array1::from_vec(values)),
        ScoresFile::ByLabel(by_label) => {
            let mut values = Array1::zeros(dag.number_of_nodes());
            for (label, score) in by_label {
                let Some(index) = dag.node_index(&label) else {
                    bail!("unknown label '{label}' in score input");
                };
                values[index] = score;
            }
            Ok(values)
        }
    }
}
