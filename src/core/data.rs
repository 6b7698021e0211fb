// src/core/data.rs
use ndarray::{Array1, Array2, Array5, ArrayView1, Axis};
use std::collections::BTreeMap;
use std::fmt;

/// A single observation (a row of features).
pub type Instance = Array1<f64>;

/// Multiple instances stacked row-wise, e.g. a batch of perturbations.
pub type Dataset = Array2<f64>;

/// Per-action scores of a batch: shape (N, A).
pub type PredictionBatch = Array2<f64>;

/// Attribution in canonical layout (batch, features, height, width, actions).
/// Tabular data uses height = width = 1.
pub type AttributionTensor = Array5<f64>;

/// How a [`PerturbationSet`] was produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PerturbationKind {
    /// Gaussian noise added to the instance.
    Additive,
    /// Binary mask multiplied into the instance.
    Multiplicative,
}

/// Synthetic neighbours of one instance.
#[derive(Debug, Clone)]
pub struct PerturbationSet {
    pub kind: PerturbationKind,
    /// Perturbed instances, shape (N, d).
    pub samples: Dataset,
    /// Binary masks used for multiplicative sampling, shape (N, d).
    pub masks: Option<Dataset>,
}

impl PerturbationSet {
    pub fn len(&self) -> usize {
        self.samples.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.nrows() == 0
    }

    pub fn num_features(&self) -> usize {
        self.samples.ncols()
    }
}

/// Local explanation of one instance: for every explained label (action
/// index) the surrogate coefficients as `(feature_index, weight)` pairs,
/// sorted by descending absolute weight.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Explanation {
    pub local_exp: BTreeMap<usize, Vec<(usize, f64)>>,
    /// Surrogate intercept per label.
    pub intercepts: BTreeMap<usize, f64>,
    /// The instance that was explained.
    pub instance: Option<Instance>,
}

impl Explanation {
    pub fn new(instance: Option<Instance>) -> Self {
        Explanation {
            local_exp: BTreeMap::new(),
            intercepts: BTreeMap::new(),
            instance,
        }
    }

    /// Records the surrogate of `label`, keeping the `top_k` coefficients
    /// with the largest magnitude.
    pub fn insert_label(
        &mut self,
        label: usize,
        coefficients: ArrayView1<f64>,
        intercept: f64,
        top_k: usize,
    ) {
        self.local_exp
            .insert(label, rank_features(coefficients, top_k));
        self.intercepts.insert(label, intercept);
    }

    pub fn num_labels(&self) -> usize {
        self.local_exp.len()
    }

    pub fn labels(&self) -> impl Iterator<Item = usize> + '_ {
        self.local_exp.keys().copied()
    }

    /// Ranked pairs for `label`, empty when the label was not explained.
    pub fn for_label(&self, label: usize) -> &[(usize, f64)] {
        self.local_exp
            .get(&label)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Scatters the ranked pairs of `label` back into a dense vector.
    /// Features that were truncated away are zero.
    pub fn dense_weights(&self, label: usize, num_features: usize) -> Array1<f64> {
        let mut weights = Array1::zeros(num_features);
        for &(feature, weight) in self.for_label(label) {
            if feature < num_features {
                weights[feature] = weight;
            }
        }
        weights
    }
}

impl fmt::Display for Explanation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Explanation:")?;
        for (label, pairs) in &self.local_exp {
            let intercept = self.intercepts.get(label).copied().unwrap_or(0.0);
            writeln!(f, "  Label {} (intercept {:.4}):", label, intercept)?;
            for (feature, weight) in pairs {
                writeln!(f, "    Feature {}: {:.4}", feature, weight)?;
            }
        }
        if let Some(inst) = &self.instance {
            let shown: Vec<String> = inst.iter().take(8).map(|v| format!("{:.3}", v)).collect();
            let more = inst.len().saturating_sub(shown.len());
            if more > 0 {
                writeln!(f, "  Around [{}, +{} more]", shown.join(", "), more)?;
            } else {
                writeln!(f, "  Around [{}]", shown.join(", "))?;
            }
        }
        Ok(())
    }
}

/// Pairs every coefficient with its index, orders by descending absolute
/// value (stable on ties) and keeps the first `top_k`.
pub fn rank_features(coefficients: ArrayView1<f64>, top_k: usize) -> Vec<(usize, f64)> {
    let mut ranked: Vec<(usize, f64)> = coefficients.iter().copied().enumerate().collect();
    ranked.sort_by(|a, b| {
        b.1.abs()
            .partial_cmp(&a.1.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked.truncate(top_k);
    ranked
}

/// Approximate Shapley attributions from the mask-regression explainer.
///
/// These are surrogate coefficients under a zero baseline; the sum of a
/// column is not guaranteed to equal `f(x) - f(baseline)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapValues {
    /// Shape (features, actions).
    pub values: Array2<f64>,
    /// Surrogate intercept per action.
    pub intercepts: Array1<f64>,
}

impl ShapValues {
    pub fn num_features(&self) -> usize {
        self.values.nrows()
    }

    pub fn num_actions(&self) -> usize {
        self.values.ncols()
    }

    pub fn for_action(&self, action: usize) -> ArrayView1<'_, f64> {
        self.values.index_axis(Axis(1), action)
    }

    /// One importance vector per action.
    pub fn per_action(&self) -> Vec<Array1<f64>> {
        self.values
            .axis_iter(Axis(1))
            .map(|column| column.to_owned())
            .collect()
    }

    pub fn to_explanation(&self, instance: Option<Instance>) -> Explanation {
        let mut explanation = Explanation::new(instance);
        for action in 0..self.num_actions() {
            explanation.insert_label(
                action,
                self.for_action(action),
                self.intercepts[action],
                self.num_features(),
            );
        }
        explanation
    }
}
