// src/config.rs

//! Configuration for explainers, masks and the evaluation loop.
//!
//! Every section is optional in TOML; missing keys take the defaults below.
//!
//! ```toml
//! [lime]
//! noise_scale = 0.1
//! num_samples = 1000
//!
//! [shap]
//! regression = "lasso"
//! mask_k = 4
//!
//! [mask]
//! policy = "plain"
//! ```

use crate::core::{Result, TrustError};
use crate::mask::WeightingPolicy;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimeConfig {
    /// Standard deviation of the Gaussian perturbation noise.
    pub noise_scale: f64,
    pub num_samples: usize,
    pub ridge_alpha: f64,
    /// Softmax the agent's scores before fitting.
    pub probabilities: bool,
    pub seed: Option<u64>,
}

impl Default for LimeConfig {
    fn default() -> Self {
        LimeConfig {
            noise_scale: 0.1,
            num_samples: 1000,
            ridge_alpha: 1.0,
            probabilities: true,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurrogateKind {
    #[default]
    Ridge,
    Lasso,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShapConfig {
    pub num_samples: usize,
    pub regression: SurrogateKind,
    pub ridge_alpha: f64,
    pub lasso_alpha: f64,
    /// Exact number of features kept on per mask; unconstrained when absent.
    pub mask_k: Option<usize>,
    pub seed: Option<u64>,
}

impl Default for ShapConfig {
    fn default() -> Self {
        ShapConfig {
            num_samples: 100,
            regression: SurrogateKind::Ridge,
            ridge_alpha: 1.0,
            lasso_alpha: 0.01,
            mask_k: None,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MaskConfig {
    pub policy: WeightingPolicy,
    /// Clip scores at zero and rescale them to sum to one.
    pub normalize_scores: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvaluationConfig {
    pub max_steps: usize,
    /// Scale trust scores by the chosen action's share of the best score.
    pub confidence_scaling: bool,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        EvaluationConfig {
            max_steps: 2000,
            confidence_scaling: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrustConfig {
    pub lime: LimeConfig,
    pub shap: ShapConfig,
    pub mask: MaskConfig,
    pub evaluation: EvaluationConfig,
}

impl TrustConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: TrustConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        log::info!("loading trust configuration from {}", path.display());
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<()> {
        if self.lime.num_samples == 0 || self.shap.num_samples == 0 {
            return Err(TrustError::InvalidArgument(
                "num_samples must be positive".to_string(),
            ));
        }
        if !(self.lime.noise_scale >= 0.0) {
            return Err(TrustError::InvalidArgument(format!(
                "noise_scale must be non-negative, got {}",
                self.lime.noise_scale
            )));
        }
        for (name, alpha) in [
            ("lime.ridge_alpha", self.lime.ridge_alpha),
            ("shap.ridge_alpha", self.shap.ridge_alpha),
            ("shap.lasso_alpha", self.shap.lasso_alpha),
        ] {
            if !(alpha >= 0.0) {
                return Err(TrustError::InvalidArgument(format!(
                    "{} must be non-negative, got {}",
                    name, alpha
                )));
            }
        }
        Ok(())
    }
}
