// src/mask/lunar_lander.rs

//! Preset mask for the 8-dimensional LunarLander state and its 4 discrete
//! actions (do nothing, fire left, fire main, fire right).

use super::{DomainMask, WeightingPolicy};
use ndarray::{Array1, Array2};

pub const LUNAR_LANDER_FEATURES: [&str; 8] = [
    "x_pos",
    "y_pos",
    "x_vel",
    "y_vel",
    "angle",
    "angular_vel",
    "leg1_contact",
    "leg2_contact",
];

/// Bounds of the observation box, used to scale magnitudes into [0, 1].
pub const LUNAR_LANDER_FEATURE_SCALES: [f64; 8] =
    [2.5, 2.5, 10.0, 10.0, 6.2831855, 10.0, 1.0, 1.0];

// Averaged per-action LIME importance, one row per action.
const ACTION_WEIGHTS: [[f64; 8]; 4] = [
    [0.03501646, 0.02868263, 0.67910854, 0.19795921, 0.00638668, 0.05284648, 0.0, 0.0],
    [0.00426566, 0.00824412, 0.84698007, 0.02906354, 0.02114819, 0.09029842, 0.0, 0.0],
    [0.00634047, 0.00430323, 0.31383184, 0.53397896, 0.06132264, 0.08022287, 0.0, 0.0],
    [0.00606135, 0.00799748, 0.77693051, 0.07101095, 0.03231421, 0.10568552, 0.0, 0.0],
];

impl DomainMask {
    pub fn lunar_lander() -> Self {
        let weights = Array2::from_shape_fn((8, 4), |(feature, action)| {
            ACTION_WEIGHTS[action][feature]
        });
        DomainMask {
            weights,
            feature_scales: Array1::from(LUNAR_LANDER_FEATURE_SCALES.to_vec()),
            policy: WeightingPolicy::AmplifyByState,
            normalize_scores: false,
            last_obs: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::Mask;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array5, Axis};

    #[test]
    fn preset_has_lunar_lander_shape() {
        let mask = DomainMask::lunar_lander();
        assert_eq!(mask.num_features(), LUNAR_LANDER_FEATURES.len());
        assert_eq!(mask.action_space(), 4);
        assert_abs_diff_eq!(mask.weights()[[2, 1]], 0.84698007, epsilon = 1e-12);
        // Each action column is an averaged, normalized importance vector.
        for column in mask.weights().axis_iter(Axis(1)) {
            assert_abs_diff_eq!(column.sum(), 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn descending_lander_favours_main_engine_on_vertical_velocity() {
        let mut mask = DomainMask::lunar_lander();
        mask.update(&array![0.0, 1.0, 0.0, -5.0, 0.0, 0.0, 0.0, 0.0]).unwrap();
        // All attribution on y_vel for every action.
        let mut attribution = Array5::zeros((1, 8, 1, 1, 4));
        for a in 0..4 {
            attribution[[0, 3, 0, 0, a]] = 1.0;
        }
        let scores = mask.compute(&attribution).unwrap();
        assert_abs_diff_eq!(scores[2], 0.53397896 * 1.5, epsilon = 1e-9);
        assert!(scores[2] > scores[0] && scores[2] > scores[1] && scores[2] > scores[3]);
    }
}
