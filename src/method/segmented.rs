// src/method/segmented.rs

//! Explainability over image observations. Explanations live in the space
//! of an externally computed segmentation: feature `s` scales every pixel
//! of segment `s`, so a zero hides the segment.

use super::heat_map::{heat_map_visualization, segment_heat_map, DEFAULT_HEAT_MAP_SIZE};
use super::{
    greedy_confidence, Binding, ExplainabilityMethod, MethodState, SharedAgent, Visualization,
    VisualizationMethod, VisualizationParams,
};
use crate::algorithms::{Explainer, MaskShapExplainer, PerturbationLimeExplainer};
use crate::config::TrustConfig;
use crate::core::{Dataset, Explanation, Instance, PredictionBatch, Result, TrustError};
use crate::mask::{normalize_over_features, spatial_attribution, Mask};
use crate::traits::{Environment, ScoringModel};
use ndarray::{Array2, Array3, Axis};

pub type SegmentedLimeExplainability = SegmentedExplainability<PerturbationLimeExplainer>;
pub type SegmentedShapExplainability = SegmentedExplainability<MaskShapExplainer>;

/// Renders segment coefficients as images of the frozen observation and
/// scores them with the wrapped model.
struct SegmentScores<'a> {
    model: &'a dyn ScoringModel,
    obs: &'a Instance,
    pixel_segments: &'a [usize],
}

impl ScoringModel for SegmentScores<'_> {
    fn predict(&self, coefficients: &Dataset) -> Result<PredictionBatch> {
        let plane = self.pixel_segments.len();
        let mut images = Dataset::zeros((coefficients.nrows(), self.obs.len()));
        for (mut image, row) in images.rows_mut().into_iter().zip(coefficients.rows()) {
            for (pixel, value) in image.iter_mut().enumerate() {
                *value = self.obs[pixel] * row[self.pixel_segments[pixel % plane]];
            }
        }
        self.model.predict(&images)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FrameShape {
    channels: usize,
    height: usize,
    width: usize,
}

/// Observations are flattened (C, H, W) frames. The mask sees one value
/// per channel: the mean absolute intensity of that channel.
pub struct SegmentedExplainability<E: Explainer + Clone> {
    segments: Array2<usize>,
    pixel_segments: Vec<usize>,
    num_segments: usize,
    template: E,
    mask: Box<dyn Mask>,
    confidence_scaling: bool,
    heat_map_size: (usize, usize),
    state: MethodState,
    frame: Option<FrameShape>,
    bindings: Vec<Binding<E>>,
    last_explain: Option<Vec<Explanation>>,
    last_action: Option<usize>,
}

impl<E: Explainer + Clone> SegmentedExplainability<E> {
    /// `segments` labels every pixel of an (H, W) frame with a segment id.
    pub fn new(explainer: E, mask: Box<dyn Mask>, segments: Array2<usize>) -> Result<Self> {
        let num_segments = segments.iter().max().map(|&id| id + 1).ok_or_else(|| {
            TrustError::InvalidArgument("The segmentation must not be empty.".to_string())
        })?;
        Ok(SegmentedExplainability {
            pixel_segments: segments.iter().copied().collect(),
            segments,
            num_segments,
            template: explainer,
            mask,
            confidence_scaling: true,
            heat_map_size: DEFAULT_HEAT_MAP_SIZE,
            state: MethodState::Unset,
            frame: None,
            bindings: Vec::new(),
            last_explain: None,
            last_action: None,
        })
    }

    pub fn with_confidence_scaling(mut self, enabled: bool) -> Self {
        self.confidence_scaling = enabled;
        self
    }

    pub fn with_heat_map_size(mut self, size: (usize, usize)) -> Self {
        self.heat_map_size = size;
        self
    }

    pub fn num_segments(&self) -> usize {
        self.num_segments
    }

    pub fn last_action(&self) -> Option<usize> {
        self.last_action
    }

    fn frame(&self) -> Result<FrameShape> {
        self.frame
            .ok_or_else(|| TrustError::IllegalState("Call set() before explain().".to_string()))
    }

    fn check_observation(&self, obs: &Instance) -> Result<FrameShape> {
        let frame = self.frame()?;
        let expected = frame.channels * frame.height * frame.width;
        if obs.len() != expected {
            return Err(TrustError::IncompatibleDimensions(format!(
                "observation has {} values, frame holds {}",
                obs.len(),
                expected
            )));
        }
        Ok(frame)
    }

    fn channel_intensity(obs: &Instance, frame: FrameShape) -> Result<Instance> {
        let plane = (frame.height * frame.width) as f64;
        let channels = obs
            .view()
            .into_shape((frame.channels, frame.height * frame.width))?;
        Ok(channels.map_axis(Axis(1), |pixels| pixels.mapv(f64::abs).sum() / plane))
    }

    fn trust_score(&mut self, index: usize, obs: &Instance, explanation: &Explanation) -> Result<f64> {
        let frame = self.check_observation(obs)?;
        let agent = self.bindings[index].agent.clone();
        let num_actions = self.mask.action_space();
        self.mask.update(&Self::channel_intensity(obs, frame)?)?;
        let (action, confidence) = greedy_confidence(agent.as_ref(), obs, num_actions)?;

        let size = (frame.height, frame.width);
        let mut maps = Array3::zeros((num_actions, frame.height, frame.width));
        for (label, mut map) in maps.axis_iter_mut(Axis(0)).enumerate() {
            map.assign(&segment_heat_map(self.segments.view(), explanation, label, size));
        }
        let mut attribution = spatial_attribution(maps.view(), frame.channels);
        normalize_over_features(&mut attribution);
        let score = self.mask.compute(&attribution)?[action];

        log::debug!(
            "agent {}: action {} segment relevance {:.4} confidence {:.4}",
            index,
            action,
            score,
            confidence
        );
        Ok(if self.confidence_scaling {
            score * confidence
        } else {
            score
        })
    }
}

impl SegmentedExplainability<PerturbationLimeExplainer> {
    pub fn lime(config: &TrustConfig, mask: Box<dyn Mask>, segments: Array2<usize>) -> Result<Self> {
        Ok(SegmentedExplainability::new(
            PerturbationLimeExplainer::new(config.lime.clone()),
            mask,
            segments,
        )?
        .with_confidence_scaling(config.evaluation.confidence_scaling))
    }
}

impl SegmentedExplainability<MaskShapExplainer> {
    pub fn shap(config: &TrustConfig, mask: Box<dyn Mask>, segments: Array2<usize>) -> Result<Self> {
        Ok(SegmentedExplainability::new(
            MaskShapExplainer::new(config.shap.clone()),
            mask,
            segments,
        )?
        .with_confidence_scaling(config.evaluation.confidence_scaling))
    }
}

impl<E: Explainer + Clone> ExplainabilityMethod for SegmentedExplainability<E> {
    fn state(&self) -> MethodState {
        self.state
    }

    /// Accepts (H, W) or (…, C, H, W) observation shapes whose leading
    /// axes are all 1, with (H, W) equal to the segmentation.
    fn set(&mut self, env: &dyn Environment) -> Result<()> {
        let shape = env.observation_shape();
        let frame = match shape.as_slice() {
            &[height, width] => FrameShape { channels: 1, height, width },
            [leading @ .., channels, height, width] if leading.iter().all(|&n| n == 1) => {
                FrameShape {
                    channels: *channels,
                    height: *height,
                    width: *width,
                }
            }
            _ => {
                return Err(TrustError::IncompatibleDimensions(format!(
                    "observation shape {:?} is not an image frame",
                    shape
                )))
            }
        };
        if (frame.height, frame.width) != self.segments.dim() {
            return Err(TrustError::IncompatibleDimensions(format!(
                "frame is {}x{}, segmentation is {:?}",
                frame.height,
                frame.width,
                self.segments.dim()
            )));
        }
        self.frame = Some(frame);
        self.bindings.clear();
        self.last_explain = None;
        self.state = MethodState::Configured;
        Ok(())
    }

    fn prepare(&mut self, agents: Vec<SharedAgent>) -> Result<()> {
        if self.frame.is_none() {
            return Err(TrustError::IllegalState(
                "Call set() before prepare().".to_string(),
            ));
        }
        if agents.is_empty() {
            return Err(TrustError::InvalidArgument(
                "prepare() needs at least one agent.".to_string(),
            ));
        }
        self.bindings = agents
            .into_iter()
            .map(|agent| Binding {
                agent,
                explainer: self.template.clone(),
            })
            .collect();
        self.last_explain = None;
        self.state = MethodState::Prepared;
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
        let all_on = Instance::ones(self.num_segments);
        let pixel_segments = &self.pixel_segments;
        let explanations = self
            .bindings
            .iter_mut()
            .map(|binding| {
                let scores = SegmentScores {
                    model: binding.agent.q_net(),
                    obs,
                    pixel_segments,
                };
                binding.explainer.explain(&all_on, &scores)
            })
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
        kind == VisualizationMethod::HeatMap
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
        let explanation = self
            .last_explain
            .as_ref()
            .and_then(|cached| cached.get(params.agent));
        Some(heat_map_visualization(
            self.segments.view(),
            explanation,
            &params,
            self.mask.action_space(),
            self.heat_map_size,
        ))
    }
}
