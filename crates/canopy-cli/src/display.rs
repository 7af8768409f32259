//! Human-readable rendering of taxonomy summaries and per-layer score tables.

use canopy_core::{LayeredDAG, Taxonomy};
use canopy_model::LayerScores;

const RULE: &str = "────────────────────────────────────────";

/// Print a structural summary of a validated taxonomy.
pub fn taxonomy_summary(taxonomy: &Taxonomy, dag: &LayeredDAG) {
    println!("{RULE}");
    println!(
        "taxonomy: {} layers, {} labels, {} edges",
        taxonomy.layers.len(),
        dag.number_of_nodes(),
        taxonomy.edge_count()
    );
    println!("{RULE}");

    let width = dag
        .layer_names()
        .map(str::len)
        .max()
        .unwrap_or(0);
    for (layer, labels) in dag.layers() {
        let preview: Vec<&str> = labels.iter().take(6).map(String::as_str).collect();
        let suffix = if labels.len() > 6 { ", …" } else { "" };
        println!(
            "  {layer:<width$}  {count:>5} labels  [{preview}{suffix}]",
            count = labels.len(),
            preview = preview.join(", "),
        );
    }
    println!("{RULE}");
}

/// Print one score table per taxonomy layer, best scores first.
pub fn layer_tables(tables: &[LayerScores], top: usize) {
    for table in tables {
        println!("{RULE}");
        println!("{} ({} labels)", table.layer, table.entries.len());
        println!("{RULE}");

        let ranked = table.top_k(top);
        let width = ranked
            .iter()
            .map(|(label, _)| label.len())
            .max()
            .unwrap_or(0);
        for (label, score) in &ranked {
            println!("  {label:<width$}  {score:>8.4}");
        }
    }
    println!("{RULE}");
}
