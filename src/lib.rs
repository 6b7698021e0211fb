// src/lib.rs

//! `rl_trust` explains which observation features drive a black-box
//! reinforcement-learning policy and folds that attribution into a
//! per-agent, per-step comparative trust score.
//!
//! Two background-free explainers are provided: a Gaussian-perturbation
//! LIME variant and a mask-regression SHAP variant. A [`mask::DomainMask`]
//! weighs their output with feature/action priors and the live
//! observation, and [`evaluation::TrustEvaluator`] uses the resulting
//! scores to decide which agent acts. Tabular methods explain flat
//! feature vectors; segmented methods explain image frames in terms of an
//! external segmentation and render heat maps.

pub mod algorithms;
pub mod config;
pub mod core;
pub mod evaluation;
pub mod mask;
pub mod method;
pub mod traits;
pub mod utils;

// Re-export key components for easier use by library consumers
pub use crate::algorithms::{Explainer, MaskShapExplainer, PerturbationLimeExplainer};
pub use crate::config::TrustConfig;
pub use crate::core::{
    AttributionTensor, Dataset, Explanation, Instance, PredictionBatch, Result, ShapValues,
    TrustError,
};
pub use crate::evaluation::{EvaluationReport, MaskCalibrator, TrustEvaluator};
pub use crate::mask::{DomainMask, Mask, WeightingPolicy};
pub use crate::method::{
    ExplainabilityMethod, MethodState, SegmentedLimeExplainability, SegmentedShapExplainability,
    SharedAgent, TabularLimeExplainability, TabularShapExplainability, Visualization,
    VisualizationMethod, VisualizationParams,
};
pub use crate::traits::{Agent, Environment, ScoringModel, Step, StepInfo};
