//! L2-regularized logistic regression with optional balanced class weights

use crate::error::{MlopsError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Solve symmetric positive-definite system Ax = b using Cholesky decomposition.
/// Adds a small ridge and retries once if the matrix is not positive definite.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }

    cholesky_factor(a).or_else(|| {
        let mut a_reg = a.clone();
        let ridge = 1e-8 * a.diag().iter().map(|v| v.abs()).sum::<f64>() / n as f64;
        for k in 0..n {
            a_reg[[k, k]] += ridge.max(1e-12);
        }
        cholesky_factor(&a_reg)
    })
    .map(|l| {
        // L y = b
        let mut y = Array1::zeros(n);
        for i in 0..n {
            let sum: f64 = (0..i).map(|j| l[[i, j]] * y[j]).sum();
            y[i] = (b[i] - sum) / l[[i, i]];
        }
        // L^T x = y
        let mut x = Array1::zeros(n);
        for i in (0..n).rev() {
            let sum: f64 = ((i + 1)..n).map(|j| l[[j, i]] * x[j]).sum();
            x[i] = (y[i] - sum) / l[[i, i]];
        }
        x
    })
}

fn cholesky_factor(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    let mut l = Array2::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[[i, k]] * l[[j, k]]).sum();
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    Some(l)
}

/// Optimizer for the penalized log-loss
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Solver {
    /// Newton iterations with the intercept penalized like the weights
    Liblinear,
    /// Newton iterations with an unpenalized intercept
    Lbfgs,
}

impl std::str::FromStr for Solver {
    type Err = MlopsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "liblinear" => Ok(Solver::Liblinear),
            "lbfgs" => Ok(Solver::Lbfgs),
            other => Err(MlopsError::InvalidParameter {
                name: "solver".to_string(),
                value: other.to_string(),
                reason: "expected 'liblinear' or 'lbfgs'".to_string(),
            }),
        }
    }
}

/// Logistic regression for binary classification.
///
/// Minimizes `0.5 * ||w||^2 + C * sum_i s_i * logloss_i` where `s_i` is the
/// class weight of sample `i` (1.0 unless balanced weights are enabled).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub coefficients: Option<Array1<f64>>,
    pub intercept: Option<f64>,
    /// Inverse regularization strength
    pub c: f64,
    pub solver: Solver,
    pub max_iter: usize,
    pub tol: f64,
    /// Weight classes inversely to their frequency
    pub balanced: bool,
    /// Iterations used by the last fit
    pub n_iter: usize,
    pub is_fitted: bool,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: None,
            c: 1.0,
            solver: Solver::Lbfgs,
            max_iter: 100,
            tol: 1e-6,
            balanced: false,
            n_iter: 0,
            is_fitted: false,
        }
    }

    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    pub fn with_solver(mut self, solver: Solver) -> Self {
        self.solver = solver;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_balanced_weights(mut self, balanced: bool) -> Self {
        self.balanced = balanced;
        self
    }

    fn sigmoid(z: f64) -> f64 {
        1.0 / (1.0 + (-z).exp())
    }

    /// `n / (2 * n_class)` per sample, or all ones
    fn sample_weights(&self, y: &Array1<f64>) -> Array1<f64> {
        if !self.balanced {
            return Array1::ones(y.len());
        }
        let n = y.len() as f64;
        let n_pos = y.iter().filter(|&&v| v >= 0.5).count() as f64;
        let n_neg = n - n_pos;
        let w_pos = if n_pos > 0.0 { n / (2.0 * n_pos) } else { 1.0 };
        let w_neg = if n_neg > 0.0 { n / (2.0 * n_neg) } else { 1.0 };
        y.mapv(|v| if v >= 0.5 { w_pos } else { w_neg })
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(MlopsError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(MlopsError::training("LogisticRegression", "no training samples"));
        }

        // Design matrix with a trailing intercept column
        let mut xb = Array2::ones((n_samples, n_features + 1));
        xb.slice_mut(ndarray::s![.., ..n_features]).assign(x);

        let weights = self.sample_weights(y);
        let dim = n_features + 1;
        let penalize_intercept = self.solver == Solver::Liblinear;
        let mut reg = Array1::<f64>::ones(dim);
        if !penalize_intercept {
            // tiny ridge keeps the Hessian invertible on separable data
            reg[n_features] = 1e-8;
        }

        let mut beta = Array1::<f64>::zeros(dim);
        self.n_iter = 0;

        for iter in 0..self.max_iter {
            self.n_iter = iter + 1;
            let z = xb.dot(&beta);
            let p = z.mapv(Self::sigmoid);

            let residual = (&p - y) * &weights * self.c;
            let grad = xb.t().dot(&residual) + &reg * &beta;

            let curvature = (&p * &(1.0 - &p)) * &weights * self.c;
            let weighted_x = &xb * &curvature.clone().insert_axis(Axis(1));
            let mut hessian = xb.t().dot(&weighted_x);
            for k in 0..dim {
                hessian[[k, k]] += reg[k];
            }

            let step = cholesky_solve(&hessian, &grad).ok_or_else(|| {
                MlopsError::training("LogisticRegression", "singular Hessian")
            })?;
            beta = beta - &step;

            if step.iter().all(|s| s.is_finite()) && step.iter().map(|s| s.abs()).fold(0.0, f64::max) < self.tol {
                break;
            }
        }

        if beta.iter().any(|b| !b.is_finite()) {
            return Err(MlopsError::training("LogisticRegression", "solver diverged"));
        }

        self.intercept = Some(beta[n_features]);
        self.coefficients = Some(beta.slice(ndarray::s![..n_features]).to_owned());
        self.is_fitted = true;
        Ok(self)
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = match (&self.coefficients, self.is_fitted) {
            (Some(c), true) => c,
            _ => return Err(MlopsError::ModelNotFitted),
        };
        if x.ncols() != coefficients.len() {
            return Err(MlopsError::ShapeError {
                expected: format!("{} features", coefficients.len()),
                actual: format!("{} features", x.ncols()),
            });
        }

        let intercept = self.intercept.unwrap_or(0.0);
        Ok((x.dot(coefficients) + intercept).mapv(Self::sigmoid))
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 }))
    }
}
