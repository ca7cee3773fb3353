//! 1D Gaussian peak fitting.
//!
//! Fits `f(x) = A·exp(-(x-μ)²/(2σ²))` to histogram points. The fitter is
//! reached through the [`PeakFitter`] trait so the pixel loop does not depend
//! on a particular optimizer.

use crate::lm::{optimize, LmConfig, LmModel};

/// `2·√(2·ln 2)`, the FWHM of a unit-width Gaussian.
pub const FWHM_PER_SIGMA: f64 = 2.354_820_045_030_949_3;

/// Gaussian parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianParams {
    /// Peak height.
    pub amplitude: f64,
    /// Peak position.
    pub mean: f64,
    /// Width.
    pub stddev: f64,
}

impl GaussianParams {
    /// Creates a parameter set.
    #[must_use]
    pub fn new(amplitude: f64, mean: f64, stddev: f64) -> Self {
        Self {
            amplitude,
            mean,
            stddev,
        }
    }

    /// Evaluates the Gaussian at `x`.
    #[must_use]
    pub fn evaluate(&self, x: f64) -> f64 {
        let dx = x - self.mean;
        self.amplitude * (-0.5 * dx * dx / (self.stddev * self.stddev)).exp()
    }

    /// Full width at half maximum.
    #[must_use]
    pub fn fwhm(&self) -> f64 {
        FWHM_PER_SIGMA * self.stddev.abs()
    }

    fn to_array(self) -> [f64; 3] {
        [self.amplitude, self.mean, self.stddev]
    }

    fn from_array(params: [f64; 3]) -> Self {
        Self::new(params[0], params[1], params[2])
    }
}

/// Parameters plus covariance returned by a [`PeakFitter`].
///
/// Covariance is ordered `[amplitude, mean, stddev]`. `None` means the fit
/// failed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOutcome {
    /// Fitted parameters.
    pub params: GaussianParams,
    /// Parameter covariance.
    pub covariance: Option<[[f64; 3]; 3]>,
}

/// A routine that fits a Gaussian to `(x, y)` points.
pub trait PeakFitter: Send + Sync {
    /// Fits starting from `initial`.
    fn fit(&self, initial: GaussianParams, x: &[f64], y: &[f64]) -> FitOutcome;

    /// Name of the fitter.
    fn name(&self) -> &'static str;
}

/// Gaussian model for L-M fitting. Parameters: `[amplitude, mean, stddev]`.
struct Gaussian1D {
    min_stddev: f64,
}

impl LmModel<3> for Gaussian1D {
    #[inline]
    fn evaluate(&self, x: f64, params: &[f64; 3]) -> f64 {
        GaussianParams::from_array(*params).evaluate(x)
    }

    #[inline]
    fn jacobian_row(&self, x: f64, params: &[f64; 3]) -> [f64; 3] {
        let [amp, mean, sigma] = *params;
        let sigma2 = sigma * sigma;
        let dx = x - mean;
        let exp_val = (-0.5 * dx * dx / sigma2).exp();
        let amp_exp = amp * exp_val;

        [
            exp_val,                           // df/damp
            amp_exp * dx / sigma2,             // df/dmean
            amp_exp * dx * dx / (sigma2 * sigma), // df/dsigma
        ]
    }

    #[inline]
    fn constrain(&self, params: &mut [f64; 3]) {
        params[2] = params[2].abs().max(self.min_stddev);
    }
}

/// Levenberg-Marquardt backed [`PeakFitter`].
#[derive(Debug, Clone)]
pub struct LevMarFitter {
    config: LmConfig,
    min_stddev: f64,
}

impl Default for LevMarFitter {
    fn default() -> Self {
        Self {
            config: LmConfig::default(),
            min_stddev: 0.5,
        }
    }
}

impl LevMarFitter {
    /// Creates a fitter with custom optimizer settings.
    #[must_use]
    pub fn new(config: LmConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Sets the narrowest width the fit may reach, in channels.
    ///
    /// Peaks narrower than a bin are not resolvable; the floor keeps the
    /// Jacobian from vanishing on single-bin spikes.
    #[must_use]
    pub fn with_min_stddev(mut self, min_stddev: f64) -> Self {
        self.min_stddev = min_stddev;
        self
    }

    /// Optimizer settings.
    #[must_use]
    pub fn config(&self) -> &LmConfig {
        &self.config
    }
}

impl PeakFitter for LevMarFitter {
    fn fit(&self, initial: GaussianParams, x: &[f64], y: &[f64]) -> FitOutcome {
        let model = Gaussian1D {
            min_stddev: self.min_stddev,
        };
        let result = optimize(&model, x, y, initial.to_array(), &self.config);
        FitOutcome {
            params: GaussianParams::from_array(result.params),
            covariance: result.covariance,
        }
    }

    fn name(&self) -> &'static str {
        "LevenbergMarquardt"
    }
}

/// FWHM and its 1-sigma uncertainty, converted to energy.
///
/// With `Var(σ) = cov[2][2]` and `Var(μ) = cov[1][1]`:
/// `fwhm_err = 2√(2 ln 2)·√Var(σ)` and
/// `frac_err = √(fwhm_err² + (fwhm·√Var(μ)/μ)²) / μ`. Returns
/// `(energy·fwhm/μ, frac_err·energy)` in the unit of `energy`.
#[must_use]
pub fn fwhm_with_error(
    params: &GaussianParams,
    covariance: &[[f64; 3]; 3],
    energy: f64,
) -> (f64, f64) {
    let fwhm = params.fwhm();
    let var_sigma = covariance[2][2].max(0.0);
    let var_mean = covariance[1][1].max(0.0);
    let fwhm_err = FWHM_PER_SIGMA * var_sigma.sqrt();
    let mean = params.mean;
    let frac_err = (fwhm_err.powi(2) + (fwhm * var_mean.sqrt() / mean).powi(2)).sqrt() / mean;
    (energy * fwhm / mean, frac_err * energy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample(params: GaussianParams, low: i32, high: i32) -> (Vec<f64>, Vec<f64>) {
        let x: Vec<f64> = (low..high).map(f64::from).collect();
        let y = x.iter().map(|&v| params.evaluate(v).round()).collect();
        (x, y)
    }

    #[test]
    fn test_fwhm_constant() {
        assert_relative_eq!(FWHM_PER_SIGMA, 2.0 * (2.0 * 2f64.ln()).sqrt(), epsilon = 1e-15);
        assert_relative_eq!(GaussianParams::new(1.0, 0.0, 2.0).fwhm(), 2.0 * FWHM_PER_SIGMA);
    }

    #[test]
    fn test_fit_recovers_peak() {
        let truth = GaussianParams::new(400.0, 4500.0, 30.0);
        let (x, y) = sample(truth, 4400, 4700);
        let outcome = LevMarFitter::default().fit(GaussianParams::new(390.0, 4490.0, 75.0), &x, &y);

        assert!(outcome.covariance.is_some());
        assert_relative_eq!(outcome.params.mean, 4500.0, epsilon = 0.1);
        assert_relative_eq!(outcome.params.stddev, 30.0, epsilon = 0.2);
        assert_relative_eq!(outcome.params.amplitude, 400.0, epsilon = 2.0);
    }

    #[test]
    fn test_fit_single_bin_spike() {
        let x: Vec<f64> = (4100..4400).map(f64::from).collect();
        let y: Vec<f64> = x.iter().map(|&v| if v == 4200.0 { 50.0 } else { 0.0 }).collect();
        let outcome = LevMarFitter::default().fit(GaussianParams::new(50.0, 4200.0, 75.0), &x, &y);

        assert!(outcome.covariance.is_some());
        assert_relative_eq!(outcome.params.mean, 4200.0, epsilon = 1.0);
    }

    #[test]
    fn test_fit_flat_data_has_no_covariance() {
        let x: Vec<f64> = (0..50).map(f64::from).collect();
        let y = vec![0.0; 50];
        let outcome = LevMarFitter::default().fit(GaussianParams::new(0.0, 25.0, 75.0), &x, &y);
        assert!(outcome.covariance.is_none());
    }

    #[test]
    fn test_fwhm_with_error() {
        let params = GaussianParams::new(100.0, 4000.0, 20.0);
        let mut cov = [[0.0; 3]; 3];
        cov[1][1] = 4.0;
        cov[2][2] = 0.25;
        let (fwhm_kev, err_kev) = fwhm_with_error(&params, &cov, 59.54);

        let fwhm = FWHM_PER_SIGMA * 20.0;
        let fwhm_err = FWHM_PER_SIGMA * 0.5;
        let frac = (fwhm_err.powi(2) + (fwhm * 2.0 / 4000.0).powi(2)).sqrt() / 4000.0;
        assert_relative_eq!(fwhm_kev, 59.54 * fwhm / 4000.0);
        assert_relative_eq!(err_kev, frac * 59.54);
    }
}
