// src/algorithms/mask_shap.rs

use super::sampler::{PerturbationMode, PerturbationSampler};
use super::surrogate::{LocalSurrogateFitter, Penalty};
use super::Explainer;
use crate::config::{ShapConfig, SurrogateKind};
use crate::core::{Explanation, Instance, Result, ShapValues, TrustError};
use crate::traits::ScoringModel;
use ndarray::{Array1, Array2, Axis};

/// Shapley-style attribution by regressing each action's score on random
/// feature masks.
///
/// Masked-out features take the baseline value (zero unless a baseline
/// is set), and every mask sample gets the same weight. The coefficients
/// approximate marginal contributions under a linear surrogate; they are
/// not additive-exact Shapley values.
#[derive(Debug, Clone)]
pub struct MaskShapExplainer {
    config: ShapConfig,
    sampler: PerturbationSampler,
    fitter: LocalSurrogateFitter,
    baseline: Option<Instance>,
}

impl MaskShapExplainer {
    pub fn new(config: ShapConfig) -> Self {
        let penalty = match config.regression {
            SurrogateKind::Ridge => Penalty::ridge(config.ridge_alpha),
            SurrogateKind::Lasso => Penalty::lasso(config.lasso_alpha),
        };
        MaskShapExplainer {
            sampler: PerturbationSampler::new(config.seed),
            fitter: LocalSurrogateFitter::new(penalty),
            baseline: None,
            config,
        }
    }

    pub fn with_baseline(mut self, baseline: Instance) -> Self {
        self.baseline = Some(baseline);
        self
    }

    pub fn set_baseline(&mut self, baseline: Option<Instance>) {
        self.baseline = baseline;
    }

    pub fn config(&self) -> &ShapConfig {
        &self.config
    }

    /// One importance vector of length d per action of `model`.
    pub fn shap_values(&mut self, instance: &Instance, model: &dyn ScoringModel) -> Result<ShapValues> {
        let d = instance.len();
        let perturbed = self.sampler.sample(
            instance,
            self.config.num_samples,
            PerturbationMode::Mask {
                cardinality: self.config.mask_k,
            },
        )?;
        let masks = perturbed.masks.ok_or_else(|| {
            TrustError::IllegalState("mask sampling produced no masks".to_string())
        })?;

        let masked_inputs = match &self.baseline {
            Some(baseline) => {
                if baseline.len() != d {
                    return Err(TrustError::IncompatibleDimensions(format!(
                        "baseline has {} features, instance has {}",
                        baseline.len(),
                        d
                    )));
                }
                let hidden = masks.mapv(|m| 1.0 - m);
                perturbed.samples + &hidden * baseline
            }
            None => perturbed.samples,
        };

        let scores = model.predict(&masked_inputs)?;
        if scores.nrows() != masks.nrows() {
            return Err(TrustError::ModelPrediction(format!(
                "scoring function returned {} rows for {} masked inputs",
                scores.nrows(),
                masks.nrows()
            )));
        }

        let num_actions = scores.ncols();
        let mut values = Array2::zeros((d, num_actions));
        let mut intercepts = Array1::zeros(num_actions);
        for action in 0..num_actions {
            let fit = self
                .fitter
                .fit(masks.view(), scores.index_axis(Axis(1), action), None)?;
            values.index_axis_mut(Axis(1), action).assign(&fit.coefficients);
            intercepts[action] = fit.intercept;
        }
        log::debug!(
            "mask regression over {} samples for {} actions",
            masks.nrows(),
            num_actions
        );
        Ok(ShapValues { values, intercepts })
    }
}

impl Explainer for MaskShapExplainer {
    fn explain(&mut self, instance: &Instance, model: &dyn ScoringModel) -> Result<Explanation> {
        let shap = self.shap_values(instance, model)?;
        Ok(shap.to_explanation(Some(instance.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrustConfig;
    use crate::core::{Dataset, PredictionBatch};
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    // Action a scores W[a] · x.
    fn linear_q(x: &Dataset) -> Result<PredictionBatch> {
        let w = array![[1.0, 0.0, 2.0], [0.0, -3.0, 1.0]];
        Ok(x.dot(&w.t()))
    }

    fn config(regression: SurrogateKind, mask_k: Option<usize>) -> ShapConfig {
        ShapConfig {
            num_samples: 300,
            regression,
            ridge_alpha: 1e-6,
            lasso_alpha: 0.01,
            mask_k,
            seed: Some(17),
        }
    }

    #[test]
    fn linear_model_attributions_match_contributions() {
        let instance = array![2.0, 1.0, -1.0];
        let mut explainer = MaskShapExplainer::new(config(SurrogateKind::Ridge, None));
        let shap = explainer.shap_values(&instance, &linear_q).unwrap();
        assert_eq!(shap.num_features(), 3);
        assert_eq!(shap.num_actions(), 2);
        // Zero baseline: contribution of feature j to action a is W[a][j] * x[j].
        let expected = array![[2.0, 0.0], [0.0, -3.0], [-2.0, -1.0]];
        for ((j, a), &v) in expected.indexed_iter() {
            assert_abs_diff_eq!(shap.values[[j, a]], v, epsilon = 1e-4);
        }
    }

    #[test]
    fn baseline_changes_reference_point() {
        let instance = array![2.0, 1.0, -1.0];
        let baseline = array![1.0, 1.0, 1.0];
        let mut explainer =
            MaskShapExplainer::new(config(SurrogateKind::Ridge, None)).with_baseline(baseline);
        let shap = explainer.shap_values(&instance, &linear_q).unwrap();
        // Contribution becomes W[a][j] * (x[j] - b[j]).
        assert_abs_diff_eq!(shap.values[[0, 0]], 1.0, epsilon = 1e-4);
        assert_abs_diff_eq!(shap.values[[1, 1]], 0.0, epsilon = 1e-4);
        assert_abs_diff_eq!(shap.values[[2, 0]], -4.0, epsilon = 1e-4);
    }

    #[test]
    fn lasso_zeroes_features_with_no_effect() {
        let instance = array![2.0, 0.0, -1.0];
        let mut explainer = MaskShapExplainer::new(config(SurrogateKind::Lasso, None));
        let shap = explainer.shap_values(&instance, &linear_q).unwrap();
        assert_abs_diff_eq!(shap.values[[1, 0]], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(shap.values[[1, 1]], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn explanation_ranks_every_feature_per_action() {
        let instance = array![2.0, 1.0, -1.0];
        let mut cfg = config(SurrogateKind::Ridge, Some(2));
        cfg.ridge_alpha = 1.0;
        let mut explainer = MaskShapExplainer::new(cfg);
        let explanation = explainer.explain(&instance, &linear_q).unwrap();
        assert_eq!(explanation.num_labels(), 2);
        assert_eq!(explanation.for_label(1).len(), 3);
        assert_eq!(explanation.for_label(1)[0].0, 1);
    }

    #[test]
    fn unpenalised_fit_on_fixed_cardinality_masks_succeeds() {
        let mut cfg = TrustConfig::from_toml_str("[shap]\nridge_alpha = 0.0\nmask_k = 2\nseed = 3")
            .unwrap()
            .shap;
        cfg.num_samples = 50;
        let mut explainer = MaskShapExplainer::new(cfg);
        let shap = explainer
            .shap_values(&array![2.0, 1.0, -1.0], &linear_q)
            .unwrap();
        assert!(shap.values.iter().all(|v| v.is_finite()));
        // Only differences between coefficients are identified; they are exact.
        assert_abs_diff_eq!(shap.values[[0, 0]] - shap.values[[2, 0]], 4.0, epsilon = 1e-6);
        assert_abs_diff_eq!(shap.values[[0, 1]] - shap.values[[1, 1]], 3.0, epsilon = 1e-6);
    }

    #[test]
    fn single_full_mask_without_penalty_attributes_nothing() {
        let cfg = ShapConfig {
            num_samples: 1,
            ridge_alpha: 0.0,
            mask_k: Some(3),
            ..config(SurrogateKind::Ridge, None)
        };
        let instance = array![2.0, 1.0, -1.0];
        let shap = MaskShapExplainer::new(cfg)
            .shap_values(&instance, &linear_q)
            .unwrap();
        assert!(shap.values.iter().all(|v| v.abs() < 1e-12));
        assert_abs_diff_eq!(shap.intercepts[0], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(shap.intercepts[1], -4.0, epsilon = 1e-12);
    }

    #[test]
    fn mismatched_baseline_is_rejected() {
        let mut explainer = MaskShapExplainer::new(config(SurrogateKind::Ridge, None))
            .with_baseline(array![0.0, 0.0]);
        let err = explainer
            .shap_values(&array![1.0, 2.0, 3.0], &linear_q)
            .unwrap_err();
        assert!(matches!(err, TrustError::IncompatibleDimensions(_)));
    }
}
