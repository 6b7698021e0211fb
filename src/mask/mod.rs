// src/mask/mod.rs

//! Domain masks turn a raw attribution tensor into one relevance score per
//! action, combining static feature/action priors with the latest
//! observation.

pub mod attribution;
pub mod lunar_lander;

pub use attribution::{attribution_from_explanation, normalize_over_features, spatial_attribution};
pub use lunar_lander::{LUNAR_LANDER_FEATURES, LUNAR_LANDER_FEATURE_SCALES};

use crate::config::MaskConfig;
use crate::core::{AttributionTensor, Instance, Result, TrustError};
use ndarray::{Array1, Array2, Axis};
use serde::Deserialize;

/// How the current observation modulates the static weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightingPolicy {
    /// `weight · s`, where `s` is the clipped, scaled feature magnitude.
    Plain,
    /// `weight · (1 + s)`.
    #[default]
    AmplifyByState,
}

pub trait Mask {
    fn action_space(&self) -> usize;

    /// Replaces the stored observation.
    fn update(&mut self, obs: &Instance) -> Result<()>;

    /// One score per action for an attribution tensor of shape
    /// (batch, features, height, width, actions).
    fn compute(&self, attribution: &AttributionTensor) -> Result<Array1<f64>>;
}

/// Mask backed by a static (features × actions) weight matrix.
///
/// Lifecycle of the observation snapshot: `None` after construction,
/// replaced wholesale by every `update`, no history kept. A mask instance
/// therefore must not be shared between concurrently evaluated agents.
#[derive(Debug, Clone)]
pub struct DomainMask {
    weights: Array2<f64>,
    feature_scales: Array1<f64>,
    policy: WeightingPolicy,
    normalize_scores: bool,
    last_obs: Option<Instance>,
}

impl DomainMask {
    pub fn new(weights: Array2<f64>, feature_scales: Array1<f64>) -> Result<Self> {
        if weights.nrows() != feature_scales.len() {
            return Err(TrustError::IncompatibleDimensions(format!(
                "{} weight rows but {} feature scales",
                weights.nrows(),
                feature_scales.len()
            )));
        }
        if weights.iter().any(|&w| !(w.is_finite() && w >= 0.0)) {
            return Err(TrustError::InvalidArgument(
                "Mask weights must be finite and non-negative.".to_string(),
            ));
        }
        if feature_scales.iter().any(|&s| !(s.is_finite() && s > 0.0)) {
            return Err(TrustError::InvalidArgument(
                "Feature scales must be finite and positive.".to_string(),
            ));
        }
        Ok(DomainMask {
            weights,
            feature_scales,
            policy: WeightingPolicy::default(),
            normalize_scores: false,
            last_obs: None,
        })
    }

    pub fn with_policy(mut self, policy: WeightingPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_config(mut self, config: &MaskConfig) -> Self {
        self.policy = config.policy;
        self.normalize_scores = config.normalize_scores;
        self
    }

    pub fn weights(&self) -> &Array2<f64> {
        &self.weights
    }

    pub fn feature_scales(&self) -> &Array1<f64> {
        &self.feature_scales
    }

    pub fn policy(&self) -> WeightingPolicy {
        self.policy
    }

    pub fn num_features(&self) -> usize {
        self.weights.nrows()
    }

    pub fn last_obs(&self) -> Option<&Instance> {
        self.last_obs.as_ref()
    }

    fn state_factors(&self, obs: &Instance) -> Array1<f64> {
        let scaled = (obs.mapv(f64::abs) / &self.feature_scales).mapv(|v| v.clamp(0.0, 1.0));
        match self.policy {
            WeightingPolicy::Plain => scaled,
            WeightingPolicy::AmplifyByState => scaled.mapv(|v| 1.0 + v),
        }
    }
}

impl Mask for DomainMask {
    fn action_space(&self) -> usize {
        self.weights.ncols()
    }

    fn update(&mut self, obs: &Instance) -> Result<()> {
        if obs.len() != self.num_features() {
            return Err(TrustError::IncompatibleDimensions(format!(
                "observation has {} features, mask expects {}",
                obs.len(),
                self.num_features()
            )));
        }
        self.last_obs = Some(obs.clone());
        Ok(())
    }

    fn compute(&self, attribution: &AttributionTensor) -> Result<Array1<f64>> {
        let shape = attribution.shape();
        if shape[1] != self.num_features() || shape[4] != self.action_space() {
            return Err(TrustError::IncompatibleDimensions(format!(
                "attribution of shape {:?} does not match a mask of {} features x {} actions",
                shape,
                self.num_features(),
                self.action_space()
            )));
        }

        // (features, actions), summed over batch and spatial axes.
        let per_feature = attribution
            .sum_axis(Axis(3))
            .sum_axis(Axis(2))
            .sum_axis(Axis(0));

        let effective = match &self.last_obs {
            None => self.weights.clone(),
            Some(obs) => {
                let factors = self.state_factors(obs).insert_axis(Axis(1));
                &self.weights * &factors
            }
        };

        let mut scores = (&effective * &per_feature).sum_axis(Axis(0));
        if self.normalize_scores {
            scores.mapv_inplace(|v| v.max(0.0));
            let total = scores.sum();
            if total > 0.0 {
                scores.mapv_inplace(|v| v / total);
            }
        }
        Ok(scores)
    }
}
