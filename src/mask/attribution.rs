// src/mask/attribution.rs

use crate::core::{AttributionTensor, Explanation};
use ndarray::{s, ArrayView3, Axis};

/// Absolute per-feature weights of every explained label laid out as a
/// tabular attribution tensor of shape (1, d, 1, 1, A). Labels without an
/// entry in `explanation` stay zero.
pub fn attribution_from_explanation(
    explanation: &Explanation,
    num_features: usize,
    num_actions: usize,
) -> AttributionTensor {
    let mut tensor = AttributionTensor::zeros((1, num_features, 1, 1, num_actions));
    for action in 0..num_actions {
        let weights = explanation.dense_weights(action, num_features);
        tensor
            .slice_mut(s![0, .., 0, 0, action])
            .assign(&weights.mapv(f64::abs));
    }
    tensor
}

/// Absolute spatial maps of shape (A, H, W), repeated over `channels`
/// into a (1, C, H, W, A) tensor.
pub fn spatial_attribution(maps: ArrayView3<f64>, channels: usize) -> AttributionTensor {
    let (num_actions, height, width) = maps.dim();
    let mut tensor = AttributionTensor::zeros((1, channels, height, width, num_actions));
    for action in 0..num_actions {
        let map = maps.index_axis(Axis(0), action).mapv(f64::abs);
        for channel in 0..channels {
            tensor
                .slice_mut(s![0, channel, .., .., action])
                .assign(&map);
        }
    }
    tensor
}

/// Rescales every (batch, action) slice to sum to one over the feature
/// and spatial axes. Slices that sum to zero are left untouched.
pub fn normalize_over_features(tensor: &mut AttributionTensor) {
    for mut batch in tensor.axis_iter_mut(Axis(0)) {
        for mut per_action in batch.axis_iter_mut(Axis(3)) {
            let total = per_action.sum();
            if total != 0.0 {
                per_action.mapv_inplace(|v| v / total);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn explanation_is_scattered_per_action() {
        let mut explanation = Explanation::new(None);
        explanation.insert_label(0, array![1.0, -2.0, 0.0].view(), 0.0, 3);
        explanation.insert_label(2, array![0.0, 0.0, -4.0].view(), 0.0, 3);
        let tensor = attribution_from_explanation(&explanation, 3, 3);
        assert_eq!(tensor.shape(), &[1, 3, 1, 1, 3]);
        assert_eq!(tensor[[0, 1, 0, 0, 0]], 2.0);
        assert_eq!(tensor[[0, 2, 0, 0, 2]], 4.0);
        assert_eq!(tensor.slice(s![0, .., 0, 0, 1]).sum(), 0.0);
    }

    #[test]
    fn spatial_maps_repeat_over_channels() {
        let maps = array![[[1.0, -2.0], [0.0, 3.0]], [[0.5, 0.5], [0.5, 0.5]]];
        let tensor = spatial_attribution(maps.view(), 3);
        assert_eq!(tensor.shape(), &[1, 3, 2, 2, 2]);
        for channel in 0..3 {
            assert_eq!(tensor[[0, channel, 0, 1, 0]], 2.0);
            assert_eq!(tensor[[0, channel, 1, 1, 0]], 3.0);
            assert_eq!(tensor[[0, channel, 1, 0, 1]], 0.5);
        }
    }

    #[test]
    fn normalized_slices_sum_to_one() {
        let maps = array![[[3.0, -1.0], [0.0, 4.0]], [[1.0, 1.0], [1.0, 1.0]]];
        let mut tensor = spatial_attribution(maps.view(), 2);
        normalize_over_features(&mut tensor);
        for action in 0..2 {
            assert_abs_diff_eq!(tensor.slice(s![0, .., .., .., action]).sum(), 1.0, epsilon = 1e-12);
        }
        assert_abs_diff_eq!(tensor[[0, 1, 1, 1, 0]], 4.0 / 16.0, epsilon = 1e-12);
    }

    #[test]
    fn normalization_is_idempotent_and_keeps_zero_slices() {
        let mut explanation = Explanation::new(None);
        explanation.insert_label(1, array![0.2, 0.6, 0.2].view(), 0.0, 3);
        let mut tensor = attribution_from_explanation(&explanation, 3, 2);
        normalize_over_features(&mut tensor);
        let once = tensor.clone();
        normalize_over_features(&mut tensor);
        for (a, b) in once.iter().zip(tensor.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
        }
        assert!(tensor.slice(s![0, .., 0, 0, 0]).iter().all(|&v| v == 0.0));
    }
}
