// src/method/heat_map.rs

//! Heat maps for image observations whose explanation labels refer to
//! segments of an externally computed segmentation.

use super::{Visualization, VisualizationParams};
use crate::core::Explanation;
use crate::utils::resize_bilinear;
use ndarray::{Array2, ArrayView2};

pub const DEFAULT_HEAT_MAP_SIZE: (usize, usize) = (336, 336);

/// Paints every segment with its weight for `label` and resizes the map to
/// `size`. Segments absent from the explanation stay zero.
pub fn segment_heat_map(
    segments: ArrayView2<usize>,
    explanation: &Explanation,
    label: usize,
    size: (usize, usize),
) -> Array2<f64> {
    let weights = explanation.for_label(label);
    let painted = segments.mapv(|segment| {
        weights
            .iter()
            .find(|&&(id, _)| id == segment)
            .map(|&(_, weight)| weight)
            .unwrap_or(0.0)
    });
    resize_bilinear(painted.view(), size.0, size.1)
}

/// Heat-map visualization, or an all-zero map of `size` when nothing has
/// been explained yet.
pub fn heat_map_visualization(
    segments: ArrayView2<usize>,
    explanation: Option<&Explanation>,
    params: &VisualizationParams,
    action_space: usize,
    size: (usize, usize),
) -> Visualization {
    match explanation {
        Some(explanation) => {
            let label = params.resolve_action(action_space);
            Visualization::HeatMap(segment_heat_map(segments, explanation, label, size))
        }
        None => Visualization::HeatMap(Array2::zeros(size)),
    }
}
