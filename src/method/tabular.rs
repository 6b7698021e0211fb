// src/method/tabular.rs

use super::{
    greedy_confidence, Binding, ExplainabilityMethod, MethodState, SharedAgent, Visualization,
    VisualizationMethod, VisualizationParams,
};
use crate::algorithms::{Explainer, MaskShapExplainer, PerturbationLimeExplainer};
use crate::config::TrustConfig;
use crate::core::{Explanation, Instance, Result, TrustError};
use crate::mask::{attribution_from_explanation, normalize_over_features, Mask};
use crate::traits::Environment;

/// An explainer that can drive a [`TabularExplainability`].
pub trait TabularStrategy: Explainer + Clone {
    /// The one visualization kind the method offers.
    const VISUALIZATION: VisualizationMethod;

    /// Receives the environment-sized baseline recorded by `set`.
    fn attach_baseline(&mut self, _baseline: &Instance) {}
}

impl TabularStrategy for PerturbationLimeExplainer {
    const VISUALIZATION: VisualizationMethod = VisualizationMethod::BarChart;
}

impl TabularStrategy for MaskShapExplainer {
    const VISUALIZATION: VisualizationMethod = VisualizationMethod::Features;

    fn attach_baseline(&mut self, baseline: &Instance) {
        self.set_baseline(Some(baseline.clone()));
    }
}

pub type TabularLimeExplainability = TabularExplainability<PerturbationLimeExplainer>;
pub type TabularShapExplainability = TabularExplainability<MaskShapExplainer>;

/// Explainability over flat feature vectors.
///
/// Every bound agent gets its own clone of the template explainer, so
/// agents with identical scoring functions see identical perturbations.
pub struct TabularExplainability<E: TabularStrategy> {
    feature_names: Vec<String>,
    template: E,
    mask: Box<dyn Mask>,
    confidence_scaling: bool,
    state: MethodState,
    baseline: Option<Instance>,
    bindings: Vec<Binding<E>>,
    last_explain: Option<Vec<Explanation>>,
    last_action: Option<usize>,
}

/// Splits a comma-separated list of feature names.
pub fn parse_feature_names(names: &str) -> Vec<String> {
    names
        .split(',')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(String::from)
        .collect()
}

impl<E: TabularStrategy> TabularExplainability<E> {
    pub fn new(explainer: E, mask: Box<dyn Mask>, feature_names: Vec<String>) -> Result<Self> {
        if feature_names.is_empty() {
            return Err(TrustError::InvalidArgument(
                "At least one feature name is required.".to_string(),
            ));
        }
        Ok(TabularExplainability {
            feature_names,
            template: explainer,
            mask,
            confidence_scaling: true,
            state: MethodState::Unset,
            baseline: None,
            bindings: Vec::new(),
            last_explain: None,
            last_action: None,
        })
    }

    pub fn with_confidence_scaling(mut self, enabled: bool) -> Self {
        self.confidence_scaling = enabled;
        self
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn num_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn last_action(&self) -> Option<usize> {
        self.last_action
    }

    pub fn last_explanations(&self) -> Option<&[Explanation]> {
        self.last_explain.as_deref()
    }

    fn check_observation(&self, obs: &Instance) -> Result<()> {
        if obs.len() != self.num_features() {
            return Err(TrustError::IncompatibleDimensions(format!(
                "observation has {} features, method expects {}",
                obs.len(),
                self.num_features()
            )));
        }
        Ok(())
    }

    fn trust_score(&mut self, index: usize, obs: &Instance, explanation: &Explanation) -> Result<f64> {
        let agent = self.bindings[index].agent.clone();
        let num_actions = self.mask.action_space();
        self.mask.update(obs)?;
        let (action, confidence) = greedy_confidence(agent.as_ref(), obs, num_actions)?;

        let mut attribution = attribution_from_explanation(explanation, self.num_features(), num_actions);
        normalize_over_features(&mut attribution);
        let score = self.mask.compute(&attribution)?[action];

        if !self.confidence_scaling {
            return Ok(score);
        }
        log::debug!(
            "agent {}: action {} relevance {:.4} confidence {:.4}",
            index,
            action,
            score,
            confidence
        );
        Ok(score * confidence)
    }

    fn zero_feature_map(&self) -> Visualization {
        Visualization::FeatureWeights(
            self.feature_names
                .iter()
                .map(|name| (name.clone(), 0.0))
                .collect(),
        )
    }
}

impl TabularExplainability<PerturbationLimeExplainer> {
    pub fn lime(config: &TrustConfig, mask: Box<dyn Mask>, feature_names: Vec<String>) -> Result<Self> {
        Ok(TabularExplainability::new(
            PerturbationLimeExplainer::new(config.lime.clone()),
            mask,
            feature_names,
        )?
        .with_confidence_scaling(config.evaluation.confidence_scaling))
    }
}

impl TabularExplainability<MaskShapExplainer> {
    pub fn shap(config: &TrustConfig, mask: Box<dyn Mask>, feature_names: Vec<String>) -> Result<Self> {
        Ok(TabularExplainability::new(
            MaskShapExplainer::new(config.shap.clone()),
            mask,
            feature_names,
        )?
        .with_confidence_scaling(config.evaluation.confidence_scaling))
    }
}

impl<E: TabularStrategy> ExplainabilityMethod for TabularExplainability<E> {
    fn state(&self) -> MethodState {
        self.state
    }

    /// Re-running `set` drops any bound agents and cached explanations.
    fn set(&mut self, env: &dyn Environment) -> Result<()> {
        let shape = env.observation_shape();
        let size: usize = shape.iter().product();
        if size != self.num_features() {
            return Err(TrustError::IncompatibleDimensions(format!(
                "observation shape {:?} holds {} values, method has {} feature names",
                shape,
                size,
                self.num_features()
            )));
        }
        self.baseline = Some(Instance::zeros(size));
        self.bindings.clear();
        self.last_explain = None;
        self.state = MethodState::Configured;
        Ok(())
    }

    fn prepare(&mut self, agents: Vec<SharedAgent>) -> Result<()> {
        let Some(baseline) = &self.baseline else {
            return Err(TrustError::IllegalState(
                "Call set() before prepare().".to_string(),
            ));
        };
        if agents.is_empty() {
            return Err(TrustError::InvalidArgument(
                "prepare() needs at least one agent.".to_string(),
            ));
        }
        self.bindings = agents
            .into_iter()
            .map(|agent| {
                let mut explainer = self.template.clone();
                explainer.attach_baseline(baseline);
                Binding { agent, explainer }
            })
            .collect();
        self.last_explain = None;
        self.state = MethodState::Prepared;
        log::debug!("prepared {} agent binding(s)", self.bindings.len());
        Ok(())
    }

    fn on_step(&mut self, action: usize) {
        self.last_action = Some(action);
    }

    fn explain(&mut self, obs: &Instance) -> Result<Vec<Explanation>> {
        if !self.state.is_prepared() {
            return Err(TrustError::IllegalState(
                "Call prepare() before explain().".to_string(),
            ));
        }
        self.check_observation(obs)?;
        let explanations = self
            .bindings
            .iter_mut()
            .map(|binding| binding.explainer.explain(obs, binding.agent.q_net()))
            .collect::<Result<Vec<_>>>()?;
        self.last_explain = Some(explanations.clone());
        self.state = MethodState::Explained;
        Ok(explanations)
    }

    fn value(&mut self, obs: &Instance) -> Result<Vec<f64>> {
        let explanations = self.explain(obs)?;
        let scores = explanations
            .iter()
            .enumerate()
            .map(|(index, explanation)| self.trust_score(index, obs, explanation))
            .collect::<Result<Vec<_>>>()?;
        self.state = MethodState::Valued;
        Ok(scores)
    }

    fn supports(&self, kind: VisualizationMethod) -> bool {
        kind == E::VISUALIZATION
    }

    fn visualization(
        &self,
        kind: VisualizationMethod,
        params: Option<&VisualizationParams>,
    ) -> Option<Visualization> {
        if !self.supports(kind) {
            return None;
        }
        let params = params.copied().unwrap_or_default();
        let Some(explanation) = self
            .last_explain
            .as_ref()
            .and_then(|cached| cached.get(params.agent))
        else {
            return Some(self.zero_feature_map());
        };
        let action = params.resolve_action(self.mask.action_space());
        Some(Visualization::FeatureWeights(
            explanation
                .for_label(action)
                .iter()
                .filter_map(|&(feature, weight)| {
                    self.feature_names
                        .get(feature)
                        .map(|name| (name.clone(), weight))
                })
                .collect(),
        ))
    }
}
