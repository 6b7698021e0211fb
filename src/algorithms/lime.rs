// src/algorithms/lime.rs

use super::sampler::{PerturbationMode, PerturbationSampler};
use super::surrogate::{proximity_weights, LocalSurrogateFitter, Penalty};
use super::Explainer;
use crate::config::LimeConfig;
use crate::core::{Explanation, Instance, Result, TrustError};
use crate::traits::{ScoringModel, SoftmaxScores};
use ndarray::Axis;

/// LIME-style explainer that needs no background dataset: neighbours are
/// Gaussian perturbations of the instance itself, weighted by an
/// exponential proximity kernel, and one ridge surrogate is fit per label.
///
/// Results are random unless a seed is configured.
#[derive(Debug, Clone)]
pub struct PerturbationLimeExplainer {
    config: LimeConfig,
    sampler: PerturbationSampler,
    fitter: LocalSurrogateFitter,
}

impl PerturbationLimeExplainer {
    pub fn new(config: LimeConfig) -> Self {
        PerturbationLimeExplainer {
            sampler: PerturbationSampler::new(config.seed),
            fitter: LocalSurrogateFitter::new(Penalty::ridge(config.ridge_alpha)),
            config,
        }
    }

    pub fn config(&self) -> &LimeConfig {
        &self.config
    }

    /// Explains labels `0..min(top_labels, A)` of `predict_fn` around
    /// `instance`, keeping `num_features` coefficients per label.
    pub fn explain_instance(
        &mut self,
        instance: &Instance,
        predict_fn: &dyn ScoringModel,
        num_features: usize,
        top_labels: usize,
        num_samples: usize,
    ) -> Result<Explanation> {
        let perturbed = self.sampler.sample(
            instance,
            num_samples,
            PerturbationMode::Additive {
                noise_scale: self.config.noise_scale,
            },
        )?;
        let samples = perturbed.samples;

        let predictions = predict_fn.predict(&samples)?;
        if predictions.nrows() != num_samples {
            return Err(TrustError::ModelPrediction(format!(
                "prediction function returned {} rows for {} samples",
                predictions.nrows(),
                num_samples
            )));
        }
        let weights = proximity_weights(instance, samples.view());

        let num_labels = top_labels.min(predictions.ncols());
        let mut explanation = Explanation::new(Some(instance.clone()));
        for label in 0..num_labels {
            let targets = predictions.index_axis(Axis(1), label);
            let fit = self
                .fitter
                .fit(samples.view(), targets, Some(weights.view()))?;
            explanation.insert_label(label, fit.coefficients.view(), fit.intercept, num_features);
        }
        log::debug!(
            "LIME explained {} labels from {} perturbations",
            num_labels,
            num_samples
        );
        Ok(explanation)
    }
}

impl Explainer for PerturbationLimeExplainer {
    fn explain(&mut self, instance: &Instance, model: &dyn ScoringModel) -> Result<Explanation> {
        let num_actions = model.predict_one(instance)?.len();
        let num_samples = self.config.num_samples;
        if self.config.probabilities {
            let probs = SoftmaxScores::new(model);
            self.explain_instance(instance, &probs, instance.len(), num_actions, num_samples)
        } else {
            self.explain_instance(instance, model, instance.len(), num_actions, num_samples)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Dataset, PredictionBatch};
    use ndarray::{array, Array2};

    // Three action scores that are linear in two features.
    fn linear_scores(x: &Dataset) -> Result<PredictionBatch> {
        let mut out = Array2::zeros((x.nrows(), 3));
        for (i, row) in x.rows().into_iter().enumerate() {
            out[[i, 0]] = 4.0 * row[0];
            out[[i, 1]] = -2.0 * row[1];
            out[[i, 2]] = row[0] + row[1];
        }
        Ok(out)
    }

    fn raw_config(num_samples: usize, seed: u64) -> LimeConfig {
        LimeConfig {
            noise_scale: 0.5,
            num_samples,
            ridge_alpha: 1e-6,
            probabilities: false,
            seed: Some(seed),
        }
    }

    #[test]
    fn explanation_has_requested_labels_and_features() {
        let mut explainer = PerturbationLimeExplainer::new(raw_config(200, 1));
        let instance = array![0.3, -0.7];
        let explanation = explainer
            .explain_instance(&instance, &linear_scores, 1, 2, 200)
            .unwrap();
        assert_eq!(explanation.num_labels(), 2);
        for label in explanation.labels() {
            assert_eq!(explanation.for_label(label).len(), 1);
        }
    }

    #[test]
    fn top_labels_is_capped_by_action_count() {
        let mut explainer = PerturbationLimeExplainer::new(raw_config(50, 2));
        let explanation = explainer
            .explain_instance(&array![1.0, 1.0], &linear_scores, 2, 10, 50)
            .unwrap();
        assert_eq!(explanation.num_labels(), 3);
    }

    #[test]
    fn recovers_dominant_feature_of_linear_scores() {
        let mut explainer = PerturbationLimeExplainer::new(raw_config(500, 3));
        let explanation = explainer.explain(&array![0.1, 0.2], &linear_scores).unwrap();
        let (feature, weight) = explanation.for_label(0)[0];
        assert_eq!(feature, 0);
        assert!((weight - 4.0).abs() < 1e-3);
        let (feature, weight) = explanation.for_label(1)[0];
        assert_eq!(feature, 1);
        assert!((weight + 2.0).abs() < 1e-3);
    }

    #[test]
    fn pairs_are_sorted_by_magnitude() {
        let mut config = raw_config(300, 4);
        config.probabilities = true;
        let mut explainer = PerturbationLimeExplainer::new(config);
        let explanation = explainer.explain(&array![0.5, 0.5], &linear_scores).unwrap();
        for label in explanation.labels() {
            let pairs = explanation.for_label(label);
            for window in pairs.windows(2) {
                assert!(window[0].1.abs() >= window[1].1.abs());
            }
        }
    }

    #[test]
    fn same_seed_gives_same_explanation() {
        let instance = array![0.4, -0.1];
        let a = PerturbationLimeExplainer::new(raw_config(100, 9))
            .explain(&instance, &linear_scores)
            .unwrap();
        let b = PerturbationLimeExplainer::new(raw_config(100, 9))
            .explain(&instance, &linear_scores)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn zero_samples_is_rejected() {
        let mut explainer = PerturbationLimeExplainer::new(raw_config(0, 5));
        let err = explainer.explain(&array![1.0, 0.0], &linear_scores).unwrap_err();
        assert!(matches!(err, TrustError::InvalidArgument(_)));
    }
}
