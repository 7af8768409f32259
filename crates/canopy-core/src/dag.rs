//! Layered DAG construction and support-operator derivation.
//!
//! Builds the canonical node ordering and edge set from a [`Taxonomy`], then
//! derives three normalised operators over the same global node index:
//!
//! - forward: `D_out⁻¹ · A`, a child's evidence spread across its parents
//! - backward: `D_in⁻¹ · Aᵗ`, a parent's evidence spread across its children
//! - symmetric: `I − D^−1/2 (A + Aᵗ) D^−1/2`, the normalised graph Laplacian
//!
//! where `A[child, parent] = 1` for each declared taxonomy edge. Edges only
//! exist between adjacent layers, so the graph is acyclic by construction.
//!
//! All three operators are computed eagerly at construction and the value is
//! immutable afterwards: every query is read-only, and serialisation carries
//! the matrices verbatim so a reload never recomputes them.

use std::collections::{HashMap, HashSet};

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::TaxonomyError;
use crate::taxonomy::Taxonomy;

/// One layer of the built DAG: its name and the ordered label names it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct LayerNodes {
    name: String,
    labels: Vec<String>,
}

/// An immutable layered DAG with its three derived support operators.
///
/// The global node index is the concatenation of labels across layers in
/// layer order, so index `i` bijects with (layer, position-within-layer).
/// All matrices are N×N over that shared index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayeredDAG {
    layers: Vec<LayerNodes>,
    nodes: Vec<String>,
    forward: Array2<f32>,
    backward: Array2<f32>,
    symmetric: Array2<f32>,
}

impl LayeredDAG {
    /// Build a DAG from a taxonomy, validating structure and deriving all
    /// three support operators.
    ///
    /// Fails when the taxonomy is empty, a layer is empty or duplicated, a
    /// label name is duplicated, or a declared parent is absent from the
    /// previous layer. Each error names the offending layer and label. No
    /// partially-built DAG is ever returned.
    pub fn from_taxonomy(taxonomy: &Taxonomy) -> Result<Self, TaxonomyError> {
        if taxonomy.layers.is_empty() {
            return Err(TaxonomyError::EmptyTaxonomy);
        }

        // First pass: assign the global node index and validate uniqueness.
        let mut layers: Vec<LayerNodes> = Vec::with_capacity(taxonomy.layers.len());
        let mut nodes: Vec<String> = Vec::with_capacity(taxonomy.label_count());
        let mut index: HashMap<&str, usize> = HashMap::with_capacity(taxonomy.label_count());
        let mut layer_names: HashSet<&str> = HashSet::with_capacity(taxonomy.layers.len());

        for layer in &taxonomy.layers {
            if !layer_names.insert(layer.name.as_str()) {
                return Err(TaxonomyError::DuplicateLayer {
                    layer: layer.name.clone(),
                });
            }
            if layer.labels.is_empty() {
                return Err(TaxonomyError::EmptyLayer {
                    layer: layer.name.clone(),
                });
            }

            let mut names = Vec::with_capacity(layer.labels.len());
            for label in &layer.labels {
                if index.insert(label.name.as_str(), nodes.len()).is_some() {
                    return Err(TaxonomyError::DuplicateLabel {
                        layer: layer.name.clone(),
                        label: label.name.clone(),
                    });
                }
                nodes.push(label.name.clone());
                names.push(label.name.clone());
            }
            layers.push(LayerNodes {
                name: layer.name.clone(),
                labels: names,
            });
        }

        // Second pass: resolve edges. Parents must live in the layer
        // immediately above the child's layer; nothing else is an edge.
        let n = nodes.len();
        let mut incidence = Array2::<f32>::zeros((n, n));

        for (layer_pos, layer) in taxonomy.layers.iter().enumerate() {
            let previous: Option<HashSet<&str>> = layer_pos
                .checked_sub(1)
                .map(|p| layers[p].labels.iter().map(|s| s.as_str()).collect());

            for label in &layer.labels {
                for parent in &label.parents {
                    let Some(previous) = previous.as_ref() else {
                        return Err(TaxonomyError::TopLayerParent {
                            layer: layer.name.clone(),
                            label: label.name.clone(),
                            parent: parent.clone(),
                        });
                    };
                    if !previous.contains(parent.as_str()) {
                        return Err(TaxonomyError::UnknownParent {
                            layer: layer.name.clone(),
                            label: label.name.clone(),
                            parent: parent.clone(),
                        });
                    }
                    let child = index[label.name.as_str()];
                    let parent = index[parent.as_str()];
                    incidence[[child, parent]] = 1.0;
                }
            }
        }

        let forward = row_normalized(&incidence);
        let backward = row_normalized(&incidence.t().to_owned());
        let symmetric = symmetric_laplacian_of(&incidence);

        let dag = Self {
            layers,
            nodes,
            forward,
            backward,
            symmetric,
        };
        dag.warn_on_interior_isolates();
        debug!(
            nodes = dag.number_of_nodes(),
            layers = dag.layers.len(),
            "built layered DAG"
        );
        Ok(dag)
    }

    /// Total label count across all layers.
    pub fn number_of_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// The canonical global-order sequence of label names.
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    /// Ordered layer names, top layer first.
    pub fn layer_names(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(|l| l.name.as_str())
    }

    /// Ordered `(layer name, labels)` pairs, top layer first. The label
    /// slices exactly partition [`nodes`] in global order.
    ///
    /// [`nodes`]: Self::nodes
    pub fn layers(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.layers
            .iter()
            .map(|l| (l.name.as_str(), l.labels.as_slice()))
    }

    /// The ordered labels belonging to one layer, or `None` for an unknown
    /// layer name. The union over all layers exactly partitions [`nodes`].
    ///
    /// [`nodes`]: Self::nodes
    pub fn nodes_in_layer(&self, layer_name: &str) -> Option<&[String]> {
        self.layers
            .iter()
            .find(|l| l.name == layer_name)
            .map(|l| l.labels.as_slice())
    }

    /// Global index of a label name, or `None` if unknown.
    pub fn node_index(&self, label: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n == label)
    }

    /// Forward operator `D_out⁻¹ · A`: row `i` distributes child `i`'s
    /// evidence across its parents. All-zero row for zero-parent nodes.
    pub fn forward_operator(&self) -> &Array2<f32> {
        &self.forward
    }

    /// Backward operator `D_in⁻¹ · Aᵗ`: row `i` distributes parent `i`'s
    /// evidence across its children. All-zero row for zero-child nodes.
    pub fn backward_operator(&self) -> &Array2<f32> {
        &self.backward
    }

    /// Symmetric normalised Laplacian `I − D^−1/2 (A + Aᵗ) D^−1/2`.
    ///
    /// Exactly symmetric and positive semi-definite for any valid taxonomy.
    pub fn symmetric_laplacian(&self) -> &Array2<f32> {
        &self.symmetric
    }

    /// A zero-degree node outside the top/bottom layers usually means the
    /// taxonomy data is incomplete. It is handled (zero contribution), not
    /// rejected: multi-root and multi-leaf taxonomies are legitimate.
    fn warn_on_interior_isolates(&self) {
        let last = self.layers.len() - 1;
        let mut offset = 0;
        for (pos, layer) in self.layers.iter().enumerate() {
            for (i, label) in layer.labels.iter().enumerate() {
                let node = offset + i;
                let parent_degree: f32 = self.forward.row(node).sum();
                let child_degree: f32 = self.backward.row(node).sum();
                if pos != 0 && parent_degree == 0.0 {
                    warn!(layer = %layer.name, label = %label, "label below the top layer has no parents");
                }
                if pos != last && child_degree == 0.0 {
                    warn!(layer = %layer.name, label = %label, "label above the bottom layer has no children");
                }
            }
            offset += layer.labels.len();
        }
    }
}

/// Normalise each row of `m` to sum to 1, leaving all-zero rows untouched.
fn row_normalized(m: &Array2<f32>) -> Array2<f32> {
    let mut out = m.clone();
    for mut row in out.rows_mut() {
        let degree: f32 = row.sum();
        if degree > 0.0 {
            row.mapv_inplace(|v| v / degree);
        }
    }
    out
}

/// Classical normalised graph Laplacian of the symmetrised incidence matrix.
///
/// Zero-degree entries take 0 as their inverse square root rather than
/// dividing by zero, leaving an untouched identity row for isolated nodes.
fn symmetric_laplacian_of(incidence: &Array2<f32>) -> Array2<f32> {
    let n = incidence.nrows();
    let s = incidence + &incidence.t();

    let inv_sqrt_degree: Vec<f32> = (0..n)
        .map(|i| {
            let d: f32 = s.row(i).sum();
            if d > 0.0 { 1.0 / d.sqrt() } else { 0.0 }
        })
        .collect();

    let mut laplacian = Array2::<f32>::eye(n);
    for i in 0..n {
        for j in 0..n {
            let v = s[[i, j]];
            if v != 0.0 {
                laplacian[[i, j]] -= inv_sqrt_degree[i] * v * inv_sqrt_degree[j];
            }
        }
    }
    laplacian
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::{TaxonomyLabel, TaxonomyLayer};
    use ndarray::Array1;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// The six-node taxonomy used throughout:
    /// top = [A, B]; mid = [C(A), D(A,B)]; bottom = [E(C), F(D)].
    fn six_node_taxonomy() -> Taxonomy {
        Taxonomy::new(vec![
            TaxonomyLayer::new(
                "top",
                vec![TaxonomyLabel::new("A", &[]), TaxonomyLabel::new("B", &[])],
            ),
            TaxonomyLayer::new(
                "mid",
                vec![
                    TaxonomyLabel::new("C", &["A"]),
                    TaxonomyLabel::new("D", &["A", "B"]),
                ],
            ),
            TaxonomyLayer::new(
                "bottom",
                vec![
                    TaxonomyLabel::new("E", &["C"]),
                    TaxonomyLabel::new("F", &["D"]),
                ],
            ),
        ])
    }

    #[test]
    fn node_count_and_ordering() {
        let dag = LayeredDAG::from_taxonomy(&six_node_taxonomy()).unwrap();
        assert_eq!(dag.number_of_nodes(), 6);
        assert_eq!(dag.nodes(), &["A", "B", "C", "D", "E", "F"]);
        assert_eq!(dag.nodes_in_layer("mid").unwrap(), &["C", "D"]);
        assert_eq!(
            dag.layer_names().collect::<Vec<_>>(),
            vec!["top", "mid", "bottom"]
        );
    }

    #[test]
    fn layers_partition_nodes() {
        let dag = LayeredDAG::from_taxonomy(&six_node_taxonomy()).unwrap();
        let mut concatenated: Vec<&str> = Vec::new();
        for (name, labels) in dag.layers() {
            assert_eq!(dag.nodes_in_layer(name).unwrap(), labels);
            for label in labels {
                concatenated.push(label.as_str());
            }
        }
        assert_eq!(
            concatenated,
            dag.nodes().iter().map(String::as_str).collect::<Vec<_>>()
        );
    }

    #[test]
    fn node_index_bijects_with_position() {
        let dag = LayeredDAG::from_taxonomy(&six_node_taxonomy()).unwrap();
        for (i, name) in dag.nodes().iter().enumerate() {
            assert_eq!(dag.node_index(name), Some(i));
        }
        assert_eq!(dag.node_index("missing"), None);
    }

    #[test]
    fn forward_rows_distribute_over_parents() {
        let dag = LayeredDAG::from_taxonomy(&six_node_taxonomy()).unwrap();
        let fwd = dag.forward_operator();

        // C has exactly one parent: weight 1.0 at column A, 0 elsewhere.
        let c = dag.node_index("C").unwrap();
        let a = dag.node_index("A").unwrap();
        for j in 0..dag.number_of_nodes() {
            let expected = if j == a { 1.0 } else { 0.0 };
            assert_eq!(fwd[[c, j]], expected);
        }

        // D has two parents: 0.5 each.
        let d = dag.node_index("D").unwrap();
        let b = dag.node_index("B").unwrap();
        assert_eq!(fwd[[d, a]], 0.5);
        assert_eq!(fwd[[d, b]], 0.5);

        // Rows sum to 1 for nodes with parents, 0 for top-layer nodes.
        for (i, name) in dag.nodes().iter().enumerate() {
            let sum: f32 = fwd.row(i).sum();
            if name == "A" || name == "B" {
                assert_eq!(sum, 0.0, "top-layer row for {name} must be zero");
            } else {
                assert!((sum - 1.0).abs() < 1e-6, "row for {name} sums to {sum}");
            }
        }
    }

    #[test]
    fn backward_rows_distribute_over_children() {
        let dag = LayeredDAG::from_taxonomy(&six_node_taxonomy()).unwrap();
        let bwd = dag.backward_operator();

        // A has two children (C and D): 0.5 each.
        let a = dag.node_index("A").unwrap();
        let c = dag.node_index("C").unwrap();
        let d = dag.node_index("D").unwrap();
        assert_eq!(bwd[[a, c]], 0.5);
        assert_eq!(bwd[[a, d]], 0.5);

        for (i, name) in dag.nodes().iter().enumerate() {
            let sum: f32 = bwd.row(i).sum();
            if name == "E" || name == "F" {
                assert_eq!(sum, 0.0, "bottom-layer row for {name} must be zero");
            } else {
                assert!((sum - 1.0).abs() < 1e-6, "row for {name} sums to {sum}");
            }
        }
    }

    #[test]
    fn symmetric_laplacian_is_exactly_symmetric() {
        let dag = LayeredDAG::from_taxonomy(&six_node_taxonomy()).unwrap();
        let lap = dag.symmetric_laplacian();
        assert_eq!(lap, &lap.t().to_owned());
    }

    #[test]
    fn symmetric_laplacian_is_positive_semi_definite() {
        let dag = LayeredDAG::from_taxonomy(&six_node_taxonomy()).unwrap();
        let lap = dag.symmetric_laplacian();
        let n = dag.number_of_nodes();

        // Quadratic form xᵗLx must be ≥ −ε for arbitrary x.
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..64 {
            let x = Array1::from_iter((0..n).map(|_| rng.gen_range(-1.0f32..1.0)));
            let quad = x.dot(&lap.dot(&x));
            assert!(quad >= -1e-5, "xᵗLx = {quad} < 0");
        }
    }

    #[test]
    fn single_layer_taxonomy_has_zero_operators() {
        let tax = Taxonomy::new(vec![TaxonomyLayer::new(
            "only",
            vec![TaxonomyLabel::new("A", &[]), TaxonomyLabel::new("B", &[])],
        )]);
        let dag = LayeredDAG::from_taxonomy(&tax).unwrap();
        assert!(dag.forward_operator().iter().all(|&v| v == 0.0));
        assert!(dag.backward_operator().iter().all(|&v| v == 0.0));
        // No edges: every node has zero degree, so the Laplacian is the
        // bare identity (the normalised term vanishes entirely).
        let lap = dag.symmetric_laplacian();
        assert_eq!(lap, &Array2::<f32>::eye(2));
    }

    #[test]
    fn dangling_parent_names_layer_and_parent() {
        let tax = Taxonomy::new(vec![
            TaxonomyLayer::new("top", vec![TaxonomyLabel::new("A", &[])]),
            TaxonomyLayer::new("mid", vec![TaxonomyLabel::new("C", &["Z"])]),
        ]);
        let err = LayeredDAG::from_taxonomy(&tax).unwrap_err();
        match &err {
            TaxonomyError::UnknownParent {
                layer,
                label,
                parent,
            } => {
                assert_eq!(layer, "mid");
                assert_eq!(label, "C");
                assert_eq!(parent, "Z");
            }
            other => panic!("expected UnknownParent, got {other:?}"),
        }
        let message = err.to_string();
        assert!(message.contains("Z") && message.contains("mid"));
    }

    #[test]
    fn skip_layer_parent_is_rejected() {
        // E declares a parent in "top", two layers up. Not an adjacent edge.
        let tax = Taxonomy::new(vec![
            TaxonomyLayer::new("top", vec![TaxonomyLabel::new("A", &[])]),
            TaxonomyLayer::new("mid", vec![TaxonomyLabel::new("C", &["A"])]),
            TaxonomyLayer::new("bottom", vec![TaxonomyLabel::new("E", &["A"])]),
        ]);
        let err = LayeredDAG::from_taxonomy(&tax).unwrap_err();
        assert!(matches!(err, TaxonomyError::UnknownParent { .. }));
    }

    #[test]
    fn empty_layer_is_rejected() {
        let tax = Taxonomy::new(vec![
            TaxonomyLayer::new("top", vec![TaxonomyLabel::new("A", &[])]),
            TaxonomyLayer::new("mid", vec![]),
        ]);
        let err = LayeredDAG::from_taxonomy(&tax).unwrap_err();
        match err {
            TaxonomyError::EmptyLayer { layer } => assert_eq!(layer, "mid"),
            other => panic!("expected EmptyLayer, got {other:?}"),
        }
    }

    #[test]
    fn empty_taxonomy_is_rejected() {
        let err = LayeredDAG::from_taxonomy(&Taxonomy::new(vec![])).unwrap_err();
        assert!(matches!(err, TaxonomyError::EmptyTaxonomy));
    }

    #[test]
    fn duplicate_label_is_rejected() {
        let tax = Taxonomy::new(vec![TaxonomyLayer::new(
            "top",
            vec![TaxonomyLabel::new("A", &[]), TaxonomyLabel::new("A", &[])],
        )]);
        let err = LayeredDAG::from_taxonomy(&tax).unwrap_err();
        match err {
            TaxonomyError::DuplicateLabel { layer, label } => {
                assert_eq!(layer, "top");
                assert_eq!(label, "A");
            }
            other => panic!("expected DuplicateLabel, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_layer_is_rejected() {
        let tax = Taxonomy::new(vec![
            TaxonomyLayer::new("top", vec![TaxonomyLabel::new("A", &[])]),
            TaxonomyLayer::new("top", vec![TaxonomyLabel::new("B", &["A"])]),
        ]);
        let err = LayeredDAG::from_taxonomy(&tax).unwrap_err();
        assert!(matches!(err, TaxonomyError::DuplicateLayer { .. }));
    }

    #[test]
    fn top_layer_parent_is_rejected() {
        let tax = Taxonomy::new(vec![TaxonomyLayer::new(
            "top",
            vec![TaxonomyLabel::new("A", &["X"])],
        )]);
        let err = LayeredDAG::from_taxonomy(&tax).unwrap_err();
        assert!(matches!(err, TaxonomyError::TopLayerParent { .. }));
    }

    #[test]
    fn interior_orphan_is_allowed() {
        // "D" in mid has no parents: suspicious but legitimate (multi-root).
        let tax = Taxonomy::new(vec![
            TaxonomyLayer::new("top", vec![TaxonomyLabel::new("A", &[])]),
            TaxonomyLayer::new(
                "mid",
                vec![
                    TaxonomyLabel::new("C", &["A"]),
                    TaxonomyLabel::new("D", &[]),
                ],
            ),
        ]);
        let dag = LayeredDAG::from_taxonomy(&tax).unwrap();
        let d = dag.node_index("D").unwrap();
        assert!(dag.forward_operator().row(d).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn serde_round_trip_is_bit_identical() {
        let dag = LayeredDAG::from_taxonomy(&six_node_taxonomy()).unwrap();
        let json = serde_json::to_string(&dag).unwrap();
        let back: LayeredDAG = serde_json::from_str(&json).unwrap();

        assert_eq!(back.nodes(), dag.nodes());
        assert_eq!(back.forward_operator(), dag.forward_operator());
        assert_eq!(back.backward_operator(), dag.backward_operator());
        assert_eq!(back.symmetric_laplacian(), dag.symmetric_laplacian());
        assert_eq!(back, dag);
    }

    #[test]
    fn rebuild_is_deterministic() {
        let tax = six_node_taxonomy();
        let first = LayeredDAG::from_taxonomy(&tax).unwrap();
        let second = LayeredDAG::from_taxonomy(&tax).unwrap();
        assert_eq!(first, second);
    }
}
