// src/algorithms/surrogate.rs

use crate::core::{Instance, Result, TrustError};
use crate::utils::solve_normal_equations;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

/// Regularisation of the local linear surrogate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Penalty {
    /// L2 penalty, solved in closed form.
    Ridge { alpha: f64 },
    /// L1 penalty, solved by cyclic coordinate descent.
    Lasso { alpha: f64, max_iter: usize, tol: f64 },
}

impl Penalty {
    pub fn ridge(alpha: f64) -> Self {
        Penalty::Ridge { alpha }
    }

    pub fn lasso(alpha: f64) -> Self {
        Penalty::Lasso {
            alpha,
            max_iter: 1000,
            tol: 1e-4,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SurrogateFit {
    pub coefficients: Array1<f64>,
    pub intercept: f64,
}

/// Weighted, penalised least squares with an unpenalised intercept.
///
/// Ridge minimises `Σ wᵢ (yᵢ - b - xᵢ·β)² + α‖β‖²`.
/// Lasso minimises `(1 / 2Σw) Σ wᵢ (yᵢ - b - xᵢ·β)² + α‖β‖₁`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalSurrogateFitter {
    penalty: Penalty,
}

impl LocalSurrogateFitter {
    pub fn new(penalty: Penalty) -> Self {
        LocalSurrogateFitter { penalty }
    }

    pub fn penalty(&self) -> Penalty {
        self.penalty
    }

    /// Regresses `targets` on `perturbations`. `sample_weights = None`
    /// means uniform weights; weights that sum to zero (or are not
    /// finite) are replaced by uniform weights as well.
    pub fn fit(
        &self,
        perturbations: ArrayView2<f64>,
        targets: ArrayView1<f64>,
        sample_weights: Option<ArrayView1<f64>>,
    ) -> Result<SurrogateFit> {
        let (n_samples, n_features) = perturbations.dim();
        if n_samples == 0 {
            return Err(TrustError::InvalidArgument(
                "Cannot fit a surrogate with zero samples.".to_string(),
            ));
        }
        if targets.len() != n_samples {
            return Err(TrustError::IncompatibleDimensions(format!(
                "{} perturbations but {} targets",
                n_samples,
                targets.len()
            )));
        }

        let weights = resolve_weights(sample_weights, n_samples)?;
        let total_weight = weights.sum();

        let x_mean = perturbations
            .t()
            .dot(&weights)
            .mapv(|v| v / total_weight);
        let y_mean = targets.dot(&weights) / total_weight;

        if n_features == 0 {
            return Ok(SurrogateFit {
                coefficients: Array1::zeros(0),
                intercept: y_mean,
            });
        }

        let x_centered = &perturbations - &x_mean;
        let y_centered = targets.mapv(|v| v - y_mean);

        let coefficients = match self.penalty {
            Penalty::Ridge { alpha } => {
                ridge_coefficients(x_centered.view(), y_centered.view(), weights.view(), alpha)?
            }
            Penalty::Lasso { alpha, max_iter, tol } => lasso_coefficients(
                x_centered.view(),
                y_centered.view(),
                weights.view(),
                alpha,
                max_iter,
                tol,
            ),
        };

        let intercept = y_mean - x_mean.dot(&coefficients);
        Ok(SurrogateFit {
            coefficients,
            intercept,
        })
    }
}

fn resolve_weights(sample_weights: Option<ArrayView1<f64>>, n_samples: usize) -> Result<Array1<f64>> {
    let Some(weights) = sample_weights else {
        return Ok(Array1::ones(n_samples));
    };
    if weights.len() != n_samples {
        return Err(TrustError::IncompatibleDimensions(format!(
            "{} sample weights for {} samples",
            weights.len(),
            n_samples
        )));
    }
    if weights.iter().any(|&w| w < 0.0) {
        return Err(TrustError::InvalidArgument(
            "Sample weights must be non-negative.".to_string(),
        ));
    }
    let total = weights.sum();
    if !(total.is_finite() && total > 0.0) {
        log::warn!(
            "sample weights sum to {}; falling back to an unweighted fit",
            total
        );
        return Ok(Array1::ones(n_samples));
    }
    Ok(weights.to_owned())
}

fn ridge_coefficients(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    weights: ArrayView1<f64>,
    alpha: f64,
) -> Result<Array1<f64>> {
    let x_weighted = &x * &weights.insert_axis(Axis(1));
    let mut gram: Array2<f64> = x_weighted.t().dot(&x);
    for i in 0..gram.nrows() {
        gram[[i, i]] += alpha;
    }
    let rhs = x_weighted.t().dot(&y);
    solve_normal_equations(gram, rhs)
}

fn soft_threshold(value: f64, threshold: f64) -> f64 {
    if value > threshold {
        value - threshold
    } else if value < -threshold {
        value + threshold
    } else {
        0.0
    }
}

fn lasso_coefficients(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    weights: ArrayView1<f64>,
    alpha: f64,
    max_iter: usize,
    tol: f64,
) -> Array1<f64> {
    let (n_samples, n_features) = x.dim();
    let total_weight = weights.sum();
    let mut beta = Array1::<f64>::zeros(n_features);
    let mut residual = y.to_owned();

    // Weighted column norms, scaled like the objective.
    let col_norms: Vec<f64> = (0..n_features)
        .map(|j| {
            let col = x.column(j);
            (0..n_samples)
                .map(|i| weights[i] * col[i] * col[i])
                .sum::<f64>()
                / total_weight
        })
        .collect();

    for iteration in 0..max_iter {
        let mut max_change = 0.0_f64;
        for j in 0..n_features {
            if col_norms[j] == 0.0 {
                beta[j] = 0.0;
                continue;
            }
            let col = x.column(j);
            let old = beta[j];
            let rho = (0..n_samples)
                .map(|i| weights[i] * col[i] * residual[i])
                .sum::<f64>()
                / total_weight
                + col_norms[j] * old;
            let new = soft_threshold(rho, alpha) / col_norms[j];
            let delta = new - old;
            if delta != 0.0 {
                residual.scaled_add(-delta, &col);
                beta[j] = new;
            }
            max_change = max_change.max(delta.abs());
        }
        if max_change < tol {
            log::debug!("lasso converged after {} sweeps", iteration + 1);
            break;
        }
    }
    beta
}

/// Width of the exponential proximity kernel for `num_features` features.
pub fn kernel_width(num_features: usize) -> f64 {
    (num_features as f64).sqrt() * 0.75
}

/// `exp(-‖s - x‖² / width²)` for every perturbed sample `s`.
pub fn proximity_weights(instance: &Instance, samples: ArrayView2<f64>) -> Array1<f64> {
    let width = kernel_width(samples.ncols());
    let width_sq = width * width;
    samples
        .rows()
        .into_iter()
        .map(|row| {
            let dist_sq: f64 = row
                .iter()
                .zip(instance.iter())
                .map(|(s, x)| (s - x) * (s - x))
                .sum();
            if width_sq > 0.0 {
                (-dist_sq / width_sq).exp()
            } else {
                1.0
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use ndarray::array;

    fn linear_design() -> (Array2<f64>, Array1<f64>) {
        // y = 2 x0 - x1 + 0.5
        let x = array![
            [0.0, 0.0],
            [1.0, 0.0],
            [0.0, 1.0],
            [1.0, 1.0],
            [2.0, 1.0],
            [-1.0, 3.0],
            [0.5, -2.0],
        ];
        let y = x.map_axis(Axis(1), |r| 2.0 * r[0] - r[1] + 0.5);
        (x, y)
    }

    #[test]
    fn ridge_with_tiny_penalty_recovers_linear_model() {
        let (x, y) = linear_design();
        let fit = LocalSurrogateFitter::new(Penalty::ridge(1e-9))
            .fit(x.view(), y.view(), None)
            .unwrap();
        assert_abs_diff_eq!(fit.coefficients[0], 2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(fit.coefficients[1], -1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(fit.intercept, 0.5, epsilon = 1e-6);
    }

    #[test]
    fn unpenalised_ridge_on_collinear_masks_takes_shortest_solution() {
        // Each row switches exactly one feature on, so the centered columns
        // are negatives of each other and only b0 - b1 is identified.
        let x = array![[1.0, 0.0], [0.0, 1.0], [1.0, 0.0], [0.0, 1.0]];
        let y = array![3.0, 1.0, 3.0, 1.0];
        let fit = LocalSurrogateFitter::new(Penalty::ridge(0.0))
            .fit(x.view(), y.view(), None)
            .unwrap();
        assert_abs_diff_eq!(fit.coefficients[0], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(fit.coefficients[1], -1.0, epsilon = 1e-6);
        let fitted = x.dot(&fit.coefficients) + fit.intercept;
        for (f, t) in fitted.iter().zip(y.iter()) {
            assert_abs_diff_eq!(*f, *t, epsilon = 1e-6);
        }
    }

    #[test]
    fn ridge_penalty_shrinks_coefficients() {
        let (x, y) = linear_design();
        let loose = LocalSurrogateFitter::new(Penalty::ridge(1e-9))
            .fit(x.view(), y.view(), None)
            .unwrap();
        let tight = LocalSurrogateFitter::new(Penalty::ridge(100.0))
            .fit(x.view(), y.view(), None)
            .unwrap();
        assert!(tight.coefficients[0].abs() < loose.coefficients[0].abs());
        assert!(tight.coefficients[1].abs() < loose.coefficients[1].abs());
    }

    #[test]
    fn lasso_drops_irrelevant_feature() {
        // y depends on x0 only; x1 is uncorrelated noise-free filler.
        let x = array![
            [0.0, 1.0],
            [1.0, -1.0],
            [2.0, 1.0],
            [3.0, -1.0],
            [4.0, 1.0],
            [5.0, -1.0],
        ];
        let y = x.column(0).mapv(|v| 3.0 * v);
        let fit = LocalSurrogateFitter::new(Penalty::lasso(0.05))
            .fit(x.view(), y.view(), None)
            .unwrap();
        assert_abs_diff_eq!(fit.coefficients[1], 0.0, epsilon = 1e-9);
        assert_relative_eq!(fit.coefficients[0], 3.0, max_relative = 0.05);
    }

    #[test]
    fn all_zero_weights_fall_back_to_unweighted() {
        let (x, y) = linear_design();
        let fitter = LocalSurrogateFitter::new(Penalty::ridge(1.0));
        let zeros = Array1::zeros(x.nrows());
        let weighted = fitter.fit(x.view(), y.view(), Some(zeros.view())).unwrap();
        let unweighted = fitter.fit(x.view(), y.view(), None).unwrap();
        assert_eq!(weighted, unweighted);
    }

    #[test]
    fn fit_validates_shapes() {
        let (x, y) = linear_design();
        let fitter = LocalSurrogateFitter::new(Penalty::ridge(1.0));
        let short = y.slice(ndarray::s![..3]);
        assert!(matches!(
            fitter.fit(x.view(), short, None),
            Err(TrustError::IncompatibleDimensions(_))
        ));
        let empty = Array2::<f64>::zeros((0, 2));
        assert!(matches!(
            fitter.fit(empty.view(), Array1::zeros(0).view(), None),
            Err(TrustError::InvalidArgument(_))
        ));
    }

    #[test]
    fn proximity_kernel_decays_with_distance() {
        let instance = array![0.0, 0.0, 0.0, 0.0];
        let samples = array![[0.0, 0.0, 0.0, 0.0], [1.5, 0.0, 0.0, 0.0], [3.0, 0.0, 0.0, 0.0]];
        let weights = proximity_weights(&instance, samples.view());
        assert_abs_diff_eq!(kernel_width(4), 1.5, epsilon = 1e-12);
        assert_abs_diff_eq!(weights[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(weights[1], (-1.0f64).exp(), epsilon = 1e-12);
        assert!(weights[2] < weights[1]);
    }

    #[test]
    fn far_samples_underflow_but_still_fit() {
        let instance = array![0.0, 0.0];
        let (x, y) = linear_design();
        let far = x.mapv(|v| v + 1e6);
        let weights = proximity_weights(&instance, far.view());
        assert!(weights.iter().all(|&w| w == 0.0));
        let fit = LocalSurrogateFitter::new(Penalty::ridge(1e-9))
            .fit(far.view(), y.view(), Some(weights.view()))
            .unwrap();
        assert!(fit.coefficients.iter().all(|c| c.is_finite()));
    }
}
