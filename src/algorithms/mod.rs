// src/algorithms/mod.rs

pub mod lime;
pub mod mask_shap;
pub mod sampler;
pub mod surrogate;

pub use lime::PerturbationLimeExplainer;
pub use mask_shap::MaskShapExplainer;
pub use sampler::{PerturbationMode, PerturbationSampler};
pub use surrogate::{kernel_width, proximity_weights, LocalSurrogateFitter, Penalty, SurrogateFit};

use crate::core::{Explanation, Instance, Result};
use crate::traits::ScoringModel;

/// An attribution strategy: explains every action of `model` around
/// `instance`. Implementations own their sampler state, so repeated calls
/// advance the random stream.
pub trait Explainer {
    fn explain(&mut self, instance: &Instance, model: &dyn ScoringModel) -> Result<Explanation>;
}
