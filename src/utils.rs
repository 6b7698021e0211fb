// src/utils.rs

use crate::core::{Result, TrustError};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

/// Index of the largest value; the first one wins on ties.
/// NaN entries are skipped. Empty input yields `None`.
pub fn argmax(values: ArrayView1<f64>) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Row-wise softmax, shifted by the row maximum for stability.
pub fn softmax_rows(scores: ArrayView2<f64>) -> Array2<f64> {
    let mut out = scores.to_owned();
    for mut row in out.axis_iter_mut(Axis(0)) {
        let max = row.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        if sum > 0.0 {
            row.mapv_inplace(|v| v / sum);
        }
    }
    out
}

/// Solves the normal equations `gram · x = rhs` of a least-squares fit.
///
/// `gram` must be symmetric positive semi-definite. When it is singular
/// the minimum-norm solution is returned: through an SVD least-squares
/// solve with the `linalg` feature, otherwise by re-solving with a
/// vanishing diagonal shift, whose limit is the same solution.
pub fn solve_normal_equations(gram: Array2<f64>, rhs: Array1<f64>) -> Result<Array1<f64>> {
    if gram.nrows() != gram.ncols() || gram.nrows() != rhs.len() {
        return Err(TrustError::IncompatibleDimensions(format!(
            "cannot solve a {}x{} system against a right-hand side of length {}",
            gram.nrows(),
            gram.ncols(),
            rhs.len()
        )));
    }

    #[cfg(feature = "linalg")]
    {
        use ndarray_linalg::LeastSquaresSvd;
        let n = rhs.len();
        let result = gram
            .least_squares(&rhs)
            .map_err(|e| TrustError::Numerical(format!("SVD least squares failed: {}", e)))?;
        if result.rank < n as i32 {
            log::debug!("normal equations have rank {} of {}", result.rank, n);
        }
        Ok(result.solution)
    }
    #[cfg(not(feature = "linalg"))]
    {
        match gaussian_elimination(gram.clone(), rhs.clone()) {
            Err(TrustError::Numerical(reason)) => {
                let scale = gram.diag().fold(1.0_f64, |m, &v| m.max(v.abs()));
                let shift = MIN_NORM_SHIFT * scale;
                log::debug!("{}; re-solving with diagonal shift {:e}", reason, shift);
                let mut shifted = gram;
                shifted.diag_mut().mapv_inplace(|v| v + shift);
                gaussian_elimination(shifted, rhs)
            }
            solved => solved,
        }
    }
}

#[cfg(not(feature = "linalg"))]
const MIN_NORM_SHIFT: f64 = 1e-8;

// Gaussian elimination with partial pivoting.
#[cfg(not(feature = "linalg"))]
fn gaussian_elimination(mut a: Array2<f64>, mut b: Array1<f64>) -> Result<Array1<f64>> {
    let n = b.len();
    for col in 0..n {
        let mut pivot = col;
        for row in (col + 1)..n {
            if a[[row, col]].abs() > a[[pivot, col]].abs() {
                pivot = row;
            }
        }
        if a[[pivot, col]].abs() < 1e-12 {
            return Err(TrustError::Numerical(format!(
                "singular system: no usable pivot in column {}",
                col
            )));
        }
        if pivot != col {
            for k in 0..n {
                a.swap([col, k], [pivot, k]);
            }
            b.swap(col, pivot);
        }
        for row in (col + 1)..n {
            let factor = a[[row, col]] / a[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = Array1::zeros(n);
    for row in (0..n).rev() {
        let mut acc = b[row];
        for k in (row + 1)..n {
            acc -= a[[row, k]] * x[k];
        }
        x[row] = acc / a[[row, row]];
    }
    Ok(x)
}

/// Bilinear resize of a 2-D map to `(height, width)`, sampling at pixel
/// centres so the value range of the input is preserved.
pub fn resize_bilinear(map: ArrayView2<f64>, height: usize, width: usize) -> Array2<f64> {
    let (src_h, src_w) = map.dim();
    if src_h == 0 || src_w == 0 || height == 0 || width == 0 {
        return Array2::zeros((height, width));
    }
    let scale_y = src_h as f64 / height as f64;
    let scale_x = src_w as f64 / width as f64;

    Array2::from_shape_fn((height, width), |(y, x)| {
        let sy = ((y as f64 + 0.5) * scale_y - 0.5).clamp(0.0, (src_h - 1) as f64);
        let sx = ((x as f64 + 0.5) * scale_x - 0.5).clamp(0.0, (src_w - 1) as f64);
        let y0 = sy.floor() as usize;
        let x0 = sx.floor() as usize;
        let y1 = (y0 + 1).min(src_h - 1);
        let x1 = (x0 + 1).min(src_w - 1);
        let fy = sy - y0 as f64;
        let fx = sx - x0 as f64;
        let top = map[[y0, x0]] * (1.0 - fx) + map[[y0, x1]] * fx;
        let bottom = map[[y1, x0]] * (1.0 - fx) + map[[y1, x1]] * fx;
        top * (1.0 - fy) + bottom * fy
    })
}
