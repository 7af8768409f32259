//! Learned harmonization of raw per-label scores.
//!
//! Raw scores come out of the surrounding network one scalar per label, with
//! no knowledge of the taxonomy: a fine-grained label can score high while
//! its ancestors score low. The [`Harmonizer`] mixes corrective signal from
//! the three cached support operators into the raw vector,
//!
//! ```text
//! out = raw + Σ_k gate_k · W_k (S_k · raw)
//! ```
//!
//! where each `S_k` is a read-only support from the DAG and each `W_k` is a
//! learned N×N projection. Gradient training decides how much to borrow from
//! parent, child, and symmetric neighbourhoods instead of hand-coded
//! consistency rules. There is no division anywhere in the mixing step, so
//! fully-zero and fully-saturated inputs stay finite by construction.

use canopy_core::LayeredDAG;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ModelError;

/// Output activation applied after mixing. Identity by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    #[default]
    Identity,
    Sigmoid,
    Relu,
}

impl Activation {
    fn apply(self, z: f32) -> f32 {
        match self {
            Self::Identity => z,
            Self::Sigmoid => 1.0 / (1.0 + (-z).exp()),
            Self::Relu => z.max(0.0),
        }
    }

    /// Derivative with respect to the pre-activation value.
    fn derivative(self, z: f32) -> f32 {
        match self {
            Self::Identity => 1.0,
            Self::Sigmoid => {
                let s = self.apply(z);
                s * (1.0 - s)
            }
            Self::Relu => {
                if z > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// Configuration for a [`Harmonizer`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HarmonizeConfig {
    /// Whether the per-support gates are trainable. When false they stay
    /// fixed at 1 and [`Harmonizer::backward`] reports zero gate gradients.
    pub learn_gates: bool,
    pub activation: Activation,
}

impl Default for HarmonizeConfig {
    fn default() -> Self {
        Self {
            learn_gates: true,
            activation: Activation::Identity,
        }
    }
}

/// Gradients of one example with respect to the learned parameters.
#[derive(Debug, Clone)]
pub struct HarmonizeGradients {
    pub weights: Vec<Array2<f32>>,
    pub gates: Vec<f32>,
}

/// Batched linear operator mixing cached supports with raw per-label scores.
///
/// The supports are cloned from the DAG at construction and never mutated;
/// only the projection weights and (optionally) the gates learn. Forward
/// passes are stateless per example, so batches parallelise trivially.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Harmonizer {
    supports: Vec<Array2<f32>>,
    weights: Vec<Array2<f32>>,
    gates: Vec<f32>,
    learn_gates: bool,
    activation: Activation,
}

impl Harmonizer {
    /// Build a harmonizer over a DAG's three supports with Glorot-normal
    /// projection weights and gates starting at 1.
    pub fn new(dag: &LayeredDAG, config: &HarmonizeConfig, rng: &mut impl Rng) -> Self {
        let supports = vec![
            dag.symmetric_laplacian().clone(),
            dag.forward_operator().clone(),
            dag.backward_operator().clone(),
        ];
        let n = dag.number_of_nodes();
        // Glorot normal with fan_in = fan_out = n.
        let std_dev = (1.0 / n as f32).sqrt();
        let dist = Normal::new(0.0, std_dev).expect("finite standard deviation");
        let weights = (0..supports.len())
            .map(|_| Array2::from_shape_fn((n, n), |_| dist.sample(&mut *rng)))
            .collect();

        debug!(nodes = n, supports = supports.len(), "initialised harmonizer");
        let gates = vec![1.0; supports.len()];
        Self {
            supports,
            weights,
            gates,
            learn_gates: config.learn_gates,
            activation: config.activation,
        }
    }

    /// Assemble a harmonizer from explicit parts, validating every shape.
    ///
    /// Every support and weight must be square N×N over the same N, and
    /// there must be exactly one weight and one gate per support. Frozen
    /// gates must all be 1: a frozen harmonizer never reports gate
    /// gradients, so any other value could not have been learned.
    pub fn from_parts(
        supports: Vec<Array2<f32>>,
        weights: Vec<Array2<f32>>,
        gates: Vec<f32>,
        config: &HarmonizeConfig,
    ) -> Result<Self, ModelError> {
        let n = supports.first().map(|s| s.nrows()).unwrap_or(0);
        for (index, support) in supports.iter().enumerate() {
            if support.nrows() != n || support.ncols() != n {
                return Err(ModelError::SupportShape {
                    index,
                    rows: support.nrows(),
                    cols: support.ncols(),
                    expected: n,
                });
            }
        }
        if weights.len() != supports.len() || gates.len() != supports.len() {
            return Err(ModelError::ParameterCount {
                supports: supports.len(),
                weights: weights.len(),
                gates: gates.len(),
            });
        }
        for (index, weight) in weights.iter().enumerate() {
            if weight.nrows() != n || weight.ncols() != n {
                return Err(ModelError::WeightShape {
                    index,
                    rows: weight.nrows(),
                    cols: weight.ncols(),
                    expected: n,
                });
            }
        }
        if !config.learn_gates {
            for (index, &value) in gates.iter().enumerate() {
                if value != 1.0 {
                    return Err(ModelError::FrozenGate { index, value });
                }
            }
        }

        Ok(Self {
            supports,
            weights,
            gates,
            learn_gates: config.learn_gates,
            activation: config.activation,
        })
    }

    /// Length of the score vectors this harmonizer accepts and produces.
    pub fn dim(&self) -> usize {
        self.supports.first().map(|s| s.nrows()).unwrap_or(0)
    }

    /// Current per-support gate values.
    pub fn gates(&self) -> &[f32] {
        &self.gates
    }

    /// Harmonize one raw score vector.
    pub fn forward(&self, raw: ArrayView1<f32>) -> Result<Array1<f32>, ModelError> {
        let mut out = self.pre_activation(raw)?;
        out.mapv_inplace(|z| self.activation.apply(z));
        Ok(out)
    }

    /// Harmonize a batch of raw score vectors, one per row.
    ///
    /// Rows are independent: no state is shared between examples.
    pub fn forward_batch(&self, raw: ArrayView2<f32>) -> Result<Array2<f32>, ModelError> {
        self.check_len(raw.ncols())?;
        let mut out = Array2::zeros(raw.raw_dim());
        for (i, row) in raw.rows().into_iter().enumerate() {
            out.row_mut(i).assign(&self.forward(row)?);
        }
        Ok(out)
    }

    /// Gradients of the learned parameters for one example.
    ///
    /// `upstream` is the loss gradient with respect to this operator's
    /// output. Gate gradients are zero when gates are not trainable.
    pub fn backward(
        &self,
        raw: ArrayView1<f32>,
        upstream: ArrayView1<f32>,
    ) -> Result<HarmonizeGradients, ModelError> {
        self.check_len(upstream.len())?;
        let z = self.pre_activation(raw)?;
        let delta = Array1::from_iter(
            z.iter()
                .zip(upstream.iter())
                .map(|(&z, &g)| g * self.activation.derivative(z)),
        );

        let mut weight_grads = Vec::with_capacity(self.supports.len());
        let mut gate_grads = Vec::with_capacity(self.supports.len());
        for ((support, weight), &gate) in
            self.supports.iter().zip(&self.weights).zip(&self.gates)
        {
            let mixed = support.dot(&raw);
            // d out / d W_k = gate_k · delta ⊗ (S_k raw)
            let grad = Array2::from_shape_fn(weight.raw_dim(), |(i, j)| {
                gate * delta[i] * mixed[j]
            });
            weight_grads.push(grad);
            gate_grads.push(if self.learn_gates {
                delta.dot(&weight.dot(&mixed))
            } else {
                0.0
            });
        }

        Ok(HarmonizeGradients {
            weights: weight_grads,
            gates: gate_grads,
        })
    }

    /// One SGD step over the learned parameters.
    pub fn apply_gradients(&mut self, grads: &HarmonizeGradients, learning_rate: f32) {
        for (weight, grad) in self.weights.iter_mut().zip(&grads.weights) {
            weight.scaled_add(-learning_rate, grad);
        }
        if self.learn_gates {
            for (gate, grad) in self.gates.iter_mut().zip(&grads.gates) {
                *gate -= learning_rate * grad;
            }
        }
    }

    fn pre_activation(&self, raw: ArrayView1<f32>) -> Result<Array1<f32>, ModelError> {
        self.check_len(raw.len())?;
        let mut out = raw.to_owned();
        for ((support, weight), &gate) in
            self.supports.iter().zip(&self.weights).zip(&self.gates)
        {
            let mixed = support.dot(&raw);
            let projected = weight.dot(&mixed);
            out.scaled_add(gate, &projected);
        }
        Ok(out)
    }

    fn check_len(&self, actual: usize) -> Result<(), ModelError> {
        let expected = self.dim();
        if actual != expected {
            return Err(ModelError::ShapeMismatch { expected, actual });
        }
        Ok(())
    }
}
