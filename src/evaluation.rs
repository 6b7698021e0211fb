// src/evaluation.rs

//! Online comparative trust: several agents are scored at every step and
//! the agent with the highest accumulated score picks the action.

use crate::algorithms::Explainer;
use crate::config::EvaluationConfig;
use crate::core::{Explanation, Result, TrustError};
use crate::mask::DomainMask;
use crate::method::{ExplainabilityMethod, SharedAgent};
use crate::traits::{Agent, Environment};
use crate::utils::argmax;
use ndarray::{Array1, Array2, ArrayView1};

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationReport {
    /// Accumulated trust score per agent.
    pub scores: Vec<f64>,
    /// How many steps each agent was in control.
    pub selections: Vec<usize>,
    pub steps: usize,
    pub total_reward: f64,
    /// Whether the episode ended by termination rather than truncation or
    /// the step limit.
    pub terminated: bool,
}

impl EvaluationReport {
    pub fn best_agent(&self) -> Option<usize> {
        argmax(ArrayView1::from(self.scores.as_slice()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct TrustEvaluator {
    config: EvaluationConfig,
}

impl TrustEvaluator {
    pub fn new(config: EvaluationConfig) -> Self {
        TrustEvaluator { config }
    }

    /// Runs one episode. Each step every agent is valued on the frozen
    /// observation, and the current leader's action is executed.
    pub fn run(
        &self,
        env: &mut dyn Environment,
        method: &mut dyn ExplainabilityMethod,
        agents: &[SharedAgent],
    ) -> Result<EvaluationReport> {
        if agents.is_empty() {
            return Err(TrustError::InvalidArgument(
                "The evaluation needs at least one agent.".to_string(),
            ));
        }
        env.reset()?;
        method.set(&*env)?;
        method.prepare(agents.to_vec())?;

        let mut report = EvaluationReport {
            scores: vec![0.0; agents.len()],
            selections: vec![0; agents.len()],
            steps: 0,
            total_reward: 0.0,
            terminated: false,
        };

        for step in 0..self.config.max_steps {
            let obs = env.get_observations()?;
            let step_scores = method.value(&obs)?;
            if step_scores.len() != agents.len() {
                return Err(TrustError::IllegalState(format!(
                    "method returned {} scores for {} agents",
                    step_scores.len(),
                    agents.len()
                )));
            }
            for (total, score) in report.scores.iter_mut().zip(&step_scores) {
                *total += score;
            }

            let leader = report.best_agent().unwrap_or(0);
            report.selections[leader] += 1;
            let action = agents[leader].predict(&obs)?;
            method.on_step(action);

            let outcome = env.step(action)?;
            report.total_reward += outcome.reward;
            report.steps += 1;
            let done = outcome.terminated || outcome.truncated;
            method.on_step_after(action, outcome.reward, done);
            log::debug!(
                "step {}: agent {} took action {} (scores {:?})",
                step,
                leader,
                action,
                step_scores
            );
            if done {
                report.terminated = outcome.terminated;
                break;
            }
        }

        log::info!(
            "evaluation finished after {} steps, accumulated scores {:?}, reward {:.3}",
            report.steps,
            report.scores,
            report.total_reward
        );
        Ok(report)
    }
}

/// Derives static mask weights by averaging, per action, the absolute and
/// sum-normalized explanation vectors seen over many steps.
#[derive(Debug, Clone)]
pub struct MaskCalibrator {
    accumulated: Array2<f64>,
    counts: Array1<usize>,
}

impl MaskCalibrator {
    pub fn new(num_features: usize, num_actions: usize) -> Self {
        MaskCalibrator {
            accumulated: Array2::zeros((num_features, num_actions)),
            counts: Array1::zeros(num_actions),
        }
    }

    pub fn counts(&self) -> &Array1<usize> {
        &self.counts
    }

    /// Adds one explanation. Labels whose weights are all zero are skipped.
    pub fn observe(&mut self, explanation: &Explanation) {
        let (num_features, num_actions) = self.accumulated.dim();
        for action in 0..num_actions {
            let weights = explanation
                .dense_weights(action, num_features)
                .mapv(f64::abs);
            let total = weights.sum();
            if total > 0.0 {
                let mut column = self.accumulated.column_mut(action);
                column.scaled_add(1.0 / total, &weights);
                self.counts[action] += 1;
            }
        }
    }

    /// Average per action, shape (features, actions). Actions never
    /// observed stay zero.
    pub fn averaged(&self) -> Array2<f64> {
        let mut averaged = self.accumulated.clone();
        for (action, mut column) in averaged.columns_mut().into_iter().enumerate() {
            let count = self.counts[action];
            if count > 0 {
                column.mapv_inplace(|v| v / count as f64);
            }
        }
        averaged
    }

    pub fn into_mask(self, feature_scales: Array1<f64>) -> Result<DomainMask> {
        DomainMask::new(self.averaged(), feature_scales)
    }

    /// Explains `agent` along its own greedy trajectory for up to
    /// `episodes` episodes of at most `max_steps` steps each.
    pub fn run_episodes<E: Explainer>(
        &mut self,
        env: &mut dyn Environment,
        agent: &dyn Agent,
        explainer: &mut E,
        episodes: usize,
        max_steps: usize,
    ) -> Result<()> {
        for episode in 0..episodes {
            let (mut obs, _) = env.reset()?;
            for _ in 0..max_steps {
                let explanation = explainer.explain(&obs, agent.q_net())?;
                self.observe(&explanation);
                let action = agent.predict(&obs)?;
                let outcome = env.step(action)?;
                obs = outcome.observation;
                if outcome.terminated || outcome.truncated {
                    break;
                }
            }
            log::debug!("calibration episode {} done, counts {:?}", episode, self.counts);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn calibrator_averages_normalized_vectors() {
        let mut calibrator = MaskCalibrator::new(2, 2);
        let mut first = Explanation::new(None);
        first.insert_label(0, array![1.0, -3.0].view(), 0.0, 2);
        first.insert_label(1, array![0.0, 0.0].view(), 0.0, 2);
        let mut second = Explanation::new(None);
        second.insert_label(0, array![1.0, 1.0].view(), 0.0, 2);
        calibrator.observe(&first);
        calibrator.observe(&second);

        assert_eq!(calibrator.counts(), &array![2usize, 0]);
        let averaged = calibrator.averaged();
        assert_abs_diff_eq!(averaged[[0, 0]], (0.25 + 0.5) / 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(averaged[[1, 0]], (0.75 + 0.5) / 2.0, epsilon = 1e-12);
        assert_eq!(averaged[[0, 1]], 0.0);

        let mask = calibrator.into_mask(array![1.0, 1.0]).unwrap();
        assert_eq!(mask.weights().dim(), (2, 2));
    }

    #[test]
    fn report_picks_highest_accumulated_score() {
        let report = EvaluationReport {
            scores: vec![0.5, 1.5, 1.5],
            selections: vec![0; 3],
            steps: 0,
            total_reward: 0.0,
            terminated: false,
        };
        assert_eq!(report.best_agent(), Some(1));
    }
}
