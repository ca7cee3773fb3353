//! Levenberg-Marquardt least squares for small parametric models.
//!
//! Fits `y ≈ f(x; p)` for a fixed number of parameters `N` and reports the
//! parameter covariance `s² (JᵀJ)⁻¹` with `s² = χ² / (n - N)`, as unweighted
//! least squares fitters usually do. A singular `JᵀJ` at the solution yields
//! no covariance.

/// Configuration for Levenberg-Marquardt optimization.
#[derive(Debug, Clone)]
pub struct LmConfig {
    /// Maximum iterations.
    pub max_iterations: usize,
    /// Convergence threshold on the relative parameter step.
    pub convergence_threshold: f64,
    /// Convergence threshold on the relative χ² improvement.
    pub chi2_threshold: f64,
    /// Initial damping parameter.
    pub initial_lambda: f64,
    /// Factor to increase lambda on a rejected step.
    pub lambda_up: f64,
    /// Factor to decrease lambda on an accepted step.
    pub lambda_down: f64,
    /// Damping above which the optimizer gives up.
    pub max_lambda: f64,
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            convergence_threshold: 1e-8,
            chi2_threshold: 1e-12,
            initial_lambda: 1e-3,
            lambda_up: 10.0,
            lambda_down: 0.1,
            max_lambda: 1e10,
        }
    }
}

/// Result of an optimization.
#[derive(Debug, Clone, Copy)]
pub struct LmResult<const N: usize> {
    /// Final parameters.
    pub params: [f64; N],
    /// Sum of squared residuals at `params`.
    pub chi2: f64,
    /// Whether a convergence criterion was met.
    pub converged: bool,
    /// Iterations run.
    pub iterations: usize,
    /// Parameter covariance, `None` if it could not be estimated.
    pub covariance: Option<[[f64; N]; N]>,
}

/// A model that can be fitted with [`optimize`].
pub trait LmModel<const N: usize> {
    /// Evaluates the model at `x`.
    fn evaluate(&self, x: f64, params: &[f64; N]) -> f64;

    /// Partial derivatives with respect to each parameter at `x`.
    fn jacobian_row(&self, x: f64, params: &[f64; N]) -> [f64; N];

    /// Applies parameter constraints after an update.
    fn constrain(&self, _params: &mut [f64; N]) {}
}

/// Runs Levenberg-Marquardt on the points `(data_x, data_y)`.
pub fn optimize<const N: usize, M: LmModel<N>>(
    model: &M,
    data_x: &[f64],
    data_y: &[f64],
    initial_params: [f64; N],
    config: &LmConfig,
) -> LmResult<N> {
    let mut params = initial_params;
    model.constrain(&mut params);
    let mut lambda = config.initial_lambda;
    let mut prev_chi2 = compute_chi2(model, data_x, data_y, &params);
    let mut converged = false;
    let mut iterations = 0;

    let mut jacobian = Vec::with_capacity(data_x.len());
    let mut residuals = Vec::with_capacity(data_x.len());

    for iter in 0..config.max_iterations {
        iterations = iter + 1;
        if prev_chi2 == 0.0 {
            converged = true;
            break;
        }

        fill_jacobian_residuals(model, data_x, data_y, &params, &mut jacobian, &mut residuals);
        let (hessian, gradient) = compute_hessian_gradient(&jacobian, &residuals);

        let mut damped = hessian;
        for (i, row) in damped.iter_mut().enumerate() {
            row[i] *= 1.0 + lambda;
        }

        let Some(delta) = solve(&damped, &gradient) else {
            break;
        };

        let mut new_params = params;
        for (p, d) in new_params.iter_mut().zip(delta.iter()) {
            *p += d;
        }
        model.constrain(&mut new_params);

        let new_chi2 = compute_chi2(model, data_x, data_y, &new_params);

        if new_chi2.is_finite() && new_chi2 < prev_chi2 {
            let step = max_relative_step(&params, &new_params);
            let improvement = (prev_chi2 - new_chi2) / prev_chi2;
            params = new_params;
            prev_chi2 = new_chi2;
            lambda *= config.lambda_down;

            if step < config.convergence_threshold || improvement < config.chi2_threshold {
                converged = true;
                break;
            }
        } else {
            lambda *= config.lambda_up;
            if lambda > config.max_lambda {
                break;
            }
        }
    }

    let covariance = estimate_covariance(model, data_x, data_y, &params, prev_chi2);

    LmResult {
        params,
        chi2: prev_chi2,
        converged,
        iterations,
        covariance,
    }
}

fn max_relative_step<const N: usize>(old: &[f64; N], new: &[f64; N]) -> f64 {
    old.iter()
        .zip(new.iter())
        .map(|(&a, &b)| (b - a).abs() / (a.abs() + f64::EPSILON))
        .fold(0.0, f64::max)
}

fn compute_chi2<const N: usize, M: LmModel<N>>(
    model: &M,
    data_x: &[f64],
    data_y: &[f64],
    params: &[f64; N],
) -> f64 {
    data_x
        .iter()
        .zip(data_y.iter())
        .map(|(&x, &y)| {
            let residual = y - model.evaluate(x, params);
            residual * residual
        })
        .sum()
}

/// Fill jacobian and residuals buffers, reusing existing allocations.
fn fill_jacobian_residuals<const N: usize, M: LmModel<N>>(
    model: &M,
    data_x: &[f64],
    data_y: &[f64],
    params: &[f64; N],
    jacobian: &mut Vec<[f64; N]>,
    residuals: &mut Vec<f64>,
) {
    jacobian.clear();
    residuals.clear();

    for (&x, &y) in data_x.iter().zip(data_y.iter()) {
        jacobian.push(model.jacobian_row(x, params));
        residuals.push(y - model.evaluate(x, params));
    }
}

/// Computes `JᵀJ` and `Jᵀr`, filling the upper triangle and mirroring it.
#[allow(clippy::needless_range_loop)]
pub fn compute_hessian_gradient<const N: usize>(
    jacobian: &[[f64; N]],
    residuals: &[f64],
) -> ([[f64; N]; N], [f64; N]) {
    let mut hessian = [[0.0f64; N]; N];
    let mut gradient = [0.0f64; N];

    for (row, &r) in jacobian.iter().zip(residuals.iter()) {
        for i in 0..N {
            gradient[i] += row[i] * r;
            for j in i..N {
                hessian[i][j] += row[i] * row[j];
            }
        }
    }

    for i in 1..N {
        for j in 0..i {
            hessian[i][j] = hessian[j][i];
        }
    }

    (hessian, gradient)
}

#[allow(clippy::cast_precision_loss)]
fn estimate_covariance<const N: usize, M: LmModel<N>>(
    model: &M,
    data_x: &[f64],
    data_y: &[f64],
    params: &[f64; N],
    chi2: f64,
) -> Option<[[f64; N]; N]> {
    let n = data_x.len().min(data_y.len());
    if n <= N || !params.iter().all(|p| p.is_finite()) {
        return None;
    }

    let jacobian: Vec<[f64; N]> = data_x.iter().map(|&x| model.jacobian_row(x, params)).collect();
    let zeros = vec![0.0; jacobian.len()];
    let (hessian, _) = compute_hessian_gradient(&jacobian, &zeros);
    let inverse = invert(&hessian)?;

    let scale = chi2 / (n - N) as f64;
    let mut covariance = inverse;
    for row in &mut covariance {
        for value in row.iter_mut() {
            *value *= scale;
        }
    }

    covariance
        .iter()
        .flatten()
        .all(|v| v.is_finite())
        .then_some(covariance)
}

fn singular_tolerance<const N: usize>(a: &[[f64; N]; N]) -> f64 {
    let max_abs = a.iter().flatten().fold(0.0f64, |m, v| m.max(v.abs()));
    #[allow(clippy::cast_precision_loss)]
    let size = N as f64;
    max_abs * size * f64::EPSILON
}

/// Solves `Ax = b` by Gaussian elimination with partial pivoting.
///
/// Returns `None` if the matrix is singular.
#[allow(clippy::needless_range_loop)]
pub fn solve<const N: usize>(a: &[[f64; N]; N], b: &[f64; N]) -> Option<[f64; N]> {
    let tolerance = singular_tolerance(a);
    let mut matrix = *a;
    let mut rhs = *b;

    for col in 0..N {
        let mut max_row = col;
        let mut max_val = matrix[col][col].abs();
        for row in (col + 1)..N {
            if matrix[row][col].abs() > max_val {
                max_val = matrix[row][col].abs();
                max_row = row;
            }
        }

        if !(max_val > tolerance) {
            return None;
        }

        if max_row != col {
            matrix.swap(col, max_row);
            rhs.swap(col, max_row);
        }

        for row in (col + 1)..N {
            let factor = matrix[row][col] / matrix[col][col];
            let pivot_row = matrix[col];
            for (j, m) in matrix[row].iter_mut().enumerate().skip(col) {
                *m -= factor * pivot_row[j];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut x = [0.0f64; N];
    for i in (0..N).rev() {
        let mut sum = rhs[i];
        for (j, &xj) in x.iter().enumerate().skip(i + 1) {
            sum -= matrix[i][j] * xj;
        }
        x[i] = sum / matrix[i][i];
    }

    Some(x)
}

/// Inverts `A` column by column. Returns `None` if the matrix is singular.
pub fn invert<const N: usize>(a: &[[f64; N]; N]) -> Option<[[f64; N]; N]> {
    let mut inverse = [[0.0f64; N]; N];
    for col in 0..N {
        let mut unit = [0.0f64; N];
        unit[col] = 1.0;
        let column = solve(a, &unit)?;
        for (row, value) in column.iter().enumerate() {
            inverse[row][col] = *value;
        }
    }
    Some(inverse)
}
