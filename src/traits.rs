// src/traits.rs

use crate::core::{Dataset, Instance, PredictionBatch, Result, TrustError};
use crate::utils::{argmax, softmax_rows};
use ndarray::{Array1, Axis};
use std::collections::BTreeMap;

/// A black-box scoring function: maps a batch of instances (N, d) to
/// per-action scores (N, A). This is the seam to the agent's Q-network.
pub trait ScoringModel {
    fn predict(&self, instances: &Dataset) -> Result<PredictionBatch>;

    /// Scores of a single instance.
    fn predict_one(&self, instance: &Instance) -> Result<Array1<f64>> {
        let batch = instance.view().insert_axis(Axis(0)).to_owned();
        let scores = self.predict(&batch)?;
        if scores.nrows() != 1 {
            return Err(TrustError::ModelPrediction(format!(
                "expected 1 row of scores for a single instance, got {}",
                scores.nrows()
            )));
        }
        Ok(scores.row(0).to_owned())
    }
}

impl<F> ScoringModel for F
where
    F: Fn(&Dataset) -> Result<PredictionBatch>,
{
    fn predict(&self, instances: &Dataset) -> Result<PredictionBatch> {
        self(instances)
    }
}

/// Adapter turning raw scores into a probability-like distribution per row.
pub struct SoftmaxScores<'a> {
    inner: &'a dyn ScoringModel,
}

impl<'a> SoftmaxScores<'a> {
    pub fn new(inner: &'a dyn ScoringModel) -> Self {
        SoftmaxScores { inner }
    }
}

impl ScoringModel for SoftmaxScores<'_> {
    fn predict(&self, instances: &Dataset) -> Result<PredictionBatch> {
        let raw = self.inner.predict(instances)?;
        Ok(softmax_rows(raw.view()))
    }
}

/// A trained policy. Loading weights and running inference are the
/// implementor's concern.
pub trait Agent {
    /// The scoring function behind the policy.
    fn q_net(&self) -> &dyn ScoringModel;

    /// Action the agent takes for `observation`. Greedy over the
    /// Q-network unless overridden.
    fn predict(&self, observation: &Instance) -> Result<usize> {
        let scores = self.q_net().predict_one(observation)?;
        argmax(scores.view()).ok_or_else(|| {
            TrustError::ModelPrediction("Q-network returned no action scores".to_string())
        })
    }
}

/// Auxiliary per-step diagnostics reported by an environment.
pub type StepInfo = BTreeMap<String, f64>;

#[derive(Debug, Clone)]
pub struct Step {
    pub observation: Instance,
    pub reward: f64,
    pub terminated: bool,
    pub truncated: bool,
    pub info: StepInfo,
}

/// The RL environment wrapper the evaluation loop drives.
pub trait Environment {
    /// Shape of one observation, used to size baseline buffers.
    fn observation_shape(&self) -> Vec<usize>;

    /// The current observation, already preprocessed.
    fn get_observations(&self) -> Result<Instance>;

    fn reset(&mut self) -> Result<(Instance, StepInfo)>;

    fn step(&mut self, action: usize) -> Result<Step>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2};

    struct Greedy<F>(F);

    impl<F> Agent for Greedy<F>
    where
        F: Fn(&Dataset) -> Result<PredictionBatch>,
    {
        fn q_net(&self) -> &dyn ScoringModel {
            &self.0
        }
    }

    fn doubling(x: &Dataset) -> Result<PredictionBatch> {
        Ok(x.mapv(|v| 2.0 * v))
    }

    #[test]
    fn closures_act_as_scoring_models() {
        let scores = ScoringModel::predict_one(&doubling, &array![1.0, -1.0, 4.0]).unwrap();
        assert_eq!(scores, array![2.0, -2.0, 8.0]);
    }

    #[test]
    fn default_predict_is_greedy() {
        let agent = Greedy(doubling);
        assert_eq!(agent.predict(&array![0.5, 3.0, 1.0]).unwrap(), 1);
    }

    #[test]
    fn softmax_adapter_normalizes_rows() {
        let adapter = SoftmaxScores::new(&doubling);
        let probs = adapter.predict(&Array2::from_elem((2, 3), 1.0)).unwrap();
        assert_abs_diff_eq!(probs.row(0).sum(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(probs[[1, 2]], 1.0 / 3.0, epsilon = 1e-12);
    }
}
