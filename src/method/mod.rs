// src/method/mod.rs

//! Explainability methods bind an explainer and a mask to one or more
//! agents and turn observations into trust scores.

pub mod heat_map;
pub mod segmented;
pub mod tabular;

pub use heat_map::{heat_map_visualization, segment_heat_map, DEFAULT_HEAT_MAP_SIZE};
pub use segmented::{
    SegmentedExplainability, SegmentedLimeExplainability, SegmentedShapExplainability,
};
pub use tabular::{
    parse_feature_names, TabularExplainability, TabularLimeExplainability,
    TabularShapExplainability, TabularStrategy,
};

use crate::core::{Explanation, Instance, Result, TrustError};
use crate::traits::{Agent, Environment};
use ndarray::Array2;
use std::rc::Rc;

pub type SharedAgent = Rc<dyn Agent>;

/// Lifecycle of a method. `set` moves `Unset` to `Configured`, `prepare`
/// moves to `Prepared`, after which `explain` and `value` alternate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodState {
    Unset,
    Configured,
    Prepared,
    Explained,
    Valued,
}

impl MethodState {
    pub fn is_prepared(self) -> bool {
        matches!(
            self,
            MethodState::Prepared | MethodState::Explained | MethodState::Valued
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VisualizationMethod {
    HeatMap,
    BarChart,
    /// Raw per-feature attribution map.
    Features,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VisualizationParams {
    /// Requested action; negative values clamp to 0, larger ones wrap.
    pub action: i64,
    /// Index of the bound agent whose explanation is shown.
    pub agent: usize,
}

impl VisualizationParams {
    pub fn resolve_action(&self, action_space: usize) -> usize {
        if action_space == 0 {
            return 0;
        }
        (self.action.max(0) as usize) % action_space
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Visualization {
    HeatMap(Array2<f64>),
    /// Feature name and weight, most important first.
    FeatureWeights(Vec<(String, f64)>),
}

/// Capability interface shared by every explainability method.
///
/// Calls on one instance are strictly sequential: `explain` runs sampling,
/// batch evaluation and surrogate fitting to completion before `value`
/// reads its result.
pub trait ExplainabilityMethod {
    fn state(&self) -> MethodState;

    /// Records the environment's observation shape.
    fn set(&mut self, env: &dyn Environment) -> Result<()>;

    /// Binds the agents to score. Requires `set`.
    fn prepare(&mut self, agents: Vec<SharedAgent>) -> Result<()>;

    fn on_step(&mut self, _action: usize) {}

    fn on_step_after(&mut self, _action: usize, _reward: f64, _done: bool) {}

    /// One explanation per bound agent, cached for visualization.
    fn explain(&mut self, obs: &Instance) -> Result<Vec<Explanation>>;

    /// One trust score per bound agent, in binding order.
    fn value(&mut self, obs: &Instance) -> Result<Vec<f64>>;

    fn supports(&self, kind: VisualizationMethod) -> bool;

    /// Default parameters for `kind`, or `None` when unsupported.
    fn visualization_params(&self, kind: VisualizationMethod) -> Option<VisualizationParams> {
        self.supports(kind).then(VisualizationParams::default)
    }

    /// Pure read of the last cached explanation.
    fn visualization(
        &self,
        kind: VisualizationMethod,
        params: Option<&VisualizationParams>,
    ) -> Option<Visualization>;
}

/// Chosen action's score over the best score; 1 when the best score is 0.
pub fn confidence_ratio(action_q: f64, max_q: f64) -> f64 {
    if max_q == 0.0 {
        1.0
    } else {
        action_q / max_q
    }
}

/// An agent together with the explainer dedicated to it.
pub(crate) struct Binding<E> {
    pub(crate) agent: SharedAgent,
    pub(crate) explainer: E,
}

/// The agent's own action on `obs` and its confidence ratio.
pub(crate) fn greedy_confidence(
    agent: &dyn Agent,
    obs: &Instance,
    num_actions: usize,
) -> Result<(usize, f64)> {
    let q_values = agent.q_net().predict_one(obs)?;
    if q_values.len() != num_actions {
        return Err(TrustError::IncompatibleDimensions(format!(
            "agent scores {} actions, mask expects {}",
            q_values.len(),
            num_actions
        )));
    }
    let action = agent.predict(obs)?;
    if action >= num_actions {
        return Err(TrustError::ModelPrediction(format!(
            "agent chose action {} outside an action space of {}",
            action, num_actions
        )));
    }
    let max_q = q_values.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
    Ok((action, confidence_ratio(q_values[action], max_q)))
}
