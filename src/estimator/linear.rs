//! Linear least squares and L1-penalised (lasso) regression
//!
//! Both are solved by cyclic coordinate descent over the Gram matrix of the
//! standardised inputs:
//! 1. Standardise columns: Z = (X - mean) / std
//! 2. Compute G = Zᵀ Z and c = Zᵀ (y - ȳ) once
//! 3. Sweep w_j ← S(c_j - Σ_{k≠j} G_jk w_k, n·α) / (G_jj + n·λ) until the
//!    largest update falls below the tolerance
//!
//! Coefficients stay in standardised units, so their magnitudes are
//! comparable across features.

use faer::Mat;
use serde::{Deserialize, Serialize};

use super::{check_predict_input, class_count, standardization, Estimator, ParamValue};
use crate::data::{FeatureMatrix, ProblemType};
use crate::error::{Result, SieveError};

/// Fitted linear map on standardised inputs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct LinearFit {
    means: Vec<f64>,
    scales: Vec<f64>,
    coef: Vec<f64>,
    intercept: f64,
}

impl LinearFit {
    fn predict_row(&self, x: &FeatureMatrix, row: usize) -> f64 {
        let mut value = self.intercept;
        for j in 0..self.coef.len() {
            value += self.coef[j] * (x.get(row, j) - self.means[j]) / self.scales[j];
        }
        value
    }
}

/// Solve `min (1/2n)||y - Zw||² + α||w||₁ + (λ/2)||w||²` by coordinate descent.
pub(crate) fn coordinate_descent(
    x: &FeatureMatrix,
    y: &[f64],
    l1: f64,
    l2: f64,
    max_iter: usize,
    tol: f64,
) -> LinearFit {
    let n_rows = x.n_rows();
    let n_cols = x.n_cols();
    let (means, scales) = standardization(x);
    let y_mean = y.iter().sum::<f64>() / n_rows as f64;

    // Build standardized data matrix Z (n_rows x n_cols) and centered target
    let mut z = Mat::<f64>::zeros(n_rows, n_cols);
    for j in 0..n_cols {
        let col = x.column(j);
        for i in 0..n_rows {
            z[(i, j)] = (col[i] - means[j]) / scales[j];
        }
    }
    let mut yc = Mat::<f64>::zeros(n_rows, 1);
    for i in 0..n_rows {
        yc[(i, 0)] = y[i] - y_mean;
    }

    let gram = z.transpose() * &z;
    let zty = z.transpose() * &yc;

    let n = n_rows as f64;
    let mut w = vec![0.0; n_cols];
    for _ in 0..max_iter {
        let mut max_delta = 0.0f64;
        let mut max_w = 0.0f64;
        for j in 0..n_cols {
            let gjj = gram[(j, j)];
            if gjj <= 1e-12 {
                w[j] = 0.0;
                continue;
            }
            let mut rho = zty[(j, 0)];
            for k in 0..n_cols {
                if k != j {
                    rho -= gram[(j, k)] * w[k];
                }
            }
            let updated = soft_threshold(rho, n * l1) / (gjj + n * l2);
            max_delta = max_delta.max((updated - w[j]).abs());
            w[j] = updated;
            max_w = max_w.max(updated.abs());
        }
        if max_delta <= tol * max_w.max(1.0) {
            break;
        }
    }

    LinearFit {
        means,
        scales,
        coef: w,
        intercept: y_mean,
    }
}

#[inline]
fn soft_threshold(value: f64, threshold: f64) -> f64 {
    if value > threshold {
        value - threshold
    } else if value < -threshold {
        value + threshold
    } else {
        0.0
    }
}

/// Ordinary least squares, with an optional ridge term.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegression {
    /// Ridge penalty λ (0 = plain least squares)
    pub l2: f64,
    pub max_iter: usize,
    pub tol: f64,
    #[serde(default)]
    fit: Option<LinearFit>,
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self {
            l2: 0.0,
            max_iter: 1000,
            tol: 1e-6,
            fit: None,
        }
    }
}

impl Estimator for LinearRegression {
    fn name(&self) -> &'static str {
        "Linear Regression"
    }

    fn supports(&self, problem: ProblemType) -> bool {
        problem == ProblemType::Regression
    }

    fn fit(&mut self, x: &FeatureMatrix, y: &[f64], _problem: ProblemType) -> Result<()> {
        self.fit = Some(coordinate_descent(x, y, 0.0, self.l2, self.max_iter, self.tol));
        Ok(())
    }

    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>> {
        check_predict_input(self.name(), self.fit.as_ref().map(|f| f.coef.len()), x)?;
        let fit = self.fit.as_ref().ok_or_else(|| SieveError::fit("not fitted"))?;
        Ok((0..x.n_rows()).map(|i| fit.predict_row(x, i)).collect())
    }

    fn set_param(&mut self, key: &str, value: &ParamValue) -> Result<()> {
        match key {
            "l2" => self.l2 = value.as_f64(key)?,
            "max_iter" => self.max_iter = value.as_usize(key)?,
            _ => return Err(unknown_param(self.name(), key, self.supported_params())),
        }
        Ok(())
    }

    fn supported_params(&self) -> &'static [&'static str] {
        &["l2", "max_iter"]
    }

    fn coefficient_magnitudes(&self) -> Option<Vec<f64>> {
        self.fit
            .as_ref()
            .map(|f| f.coef.iter().map(|c| c.abs()).collect())
    }
}

/// L1-penalised linear model.
///
/// For classification, one model is fitted per class against a 0/1 indicator
/// target and the class with the highest linear score is predicted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lasso {
    pub alpha: f64,
    pub max_iter: usize,
    pub tol: f64,
    #[serde(default)]
    fits: Vec<LinearFit>,
    #[serde(default)]
    problem: Option<ProblemType>,
}

impl Default for Lasso {
    fn default() -> Self {
        Self {
            alpha: 0.01,
            max_iter: 1000,
            tol: 1e-6,
            fits: Vec::new(),
            problem: None,
        }
    }
}

impl Lasso {
    pub fn with_alpha(alpha: f64) -> Self {
        Self {
            alpha,
            ..Self::default()
        }
    }
}

impl Estimator for Lasso {
    fn name(&self) -> &'static str {
        "Lasso"
    }

    fn supports(&self, _problem: ProblemType) -> bool {
        true
    }

    fn fit(&mut self, x: &FeatureMatrix, y: &[f64], problem: ProblemType) -> Result<()> {
        self.fits = match problem {
            ProblemType::Regression => {
                vec![coordinate_descent(x, y, self.alpha, 0.0, self.max_iter, self.tol)]
            }
            ProblemType::Classification => {
                let k = class_count(y).max(2);
                (0..k)
                    .map(|class| {
                        let indicator: Vec<f64> = y
                            .iter()
                            .map(|v| if v.round() as usize == class { 1.0 } else { 0.0 })
                            .collect();
                        coordinate_descent(x, &indicator, self.alpha, 0.0, self.max_iter, self.tol)
                    })
                    .collect()
            }
        };
        self.problem = Some(problem);
        Ok(())
    }

    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>> {
        check_predict_input(
            self.name(),
            self.fits.first().map(|f| f.coef.len()),
            x,
        )?;
        let out = (0..x.n_rows())
            .map(|i| match self.problem {
                Some(ProblemType::Classification) => {
                    let scores: Vec<f64> = self.fits.iter().map(|f| f.predict_row(x, i)).collect();
                    super::argmax(&scores) as f64
                }
                _ => self.fits[0].predict_row(x, i),
            })
            .collect();
        Ok(out)
    }

    fn set_param(&mut self, key: &str, value: &ParamValue) -> Result<()> {
        match key {
            "alpha" => {
                let alpha = value.as_f64(key)?;
                if alpha < 0.0 {
                    return Err(SieveError::config("Lasso alpha must be non-negative"));
                }
                self.alpha = alpha;
            }
            "max_iter" => self.max_iter = value.as_usize(key)?,
            _ => return Err(unknown_param(self.name(), key, self.supported_params())),
        }
        Ok(())
    }

    fn supported_params(&self) -> &'static [&'static str] {
        &["alpha", "max_iter"]
    }

    /// Summed |coefficient| across per-class models; exactly zero for features
    /// the penalty removed everywhere.
    fn coefficient_magnitudes(&self) -> Option<Vec<f64>> {
        let first = self.fits.first()?;
        let mut out = vec![0.0; first.coef.len()];
        for fit in &self.fits {
            for (o, c) in out.iter_mut().zip(fit.coef.iter()) {
                *o += c.abs();
            }
        }
        Some(out)
    }
}

pub(crate) fn unknown_param(model: &str, key: &str, supported: &[&str]) -> SieveError {
    SieveError::config(format!(
        "Param not found for {}: {}. Supported: {}",
        model,
        key,
        supported.join(", ")
    ))
}
