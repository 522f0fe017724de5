//! Newton's method for small square systems of nonlinear equations.
//!
//! The Jacobian is approximated by forward differences and each Newton
//! step is shortened by halving until the residual norm decreases.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Failure {
    #[error("no convergence after {iterations} iterations (residual {residual:e})")]
    NoConvergence { iterations: usize, residual: f64 },

    #[error("singular jacobian at iteration {iteration}")]
    SingularJacobian { iteration: usize },

    #[error("non-finite residual at iteration {iteration}")]
    NonFinite { iteration: usize },
}

#[derive(Debug, Clone, Copy)]
pub struct Newton {
    /// Max-norm of the residual accepted as a root.
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for Newton {
    fn default() -> Self {
        Newton {
            tolerance: 1e-10,
            max_iterations: 200,
        }
    }
}

const MIN_STEP: f64 = 1e-12;
const PIVOT_EPS: f64 = 1e-14;

impl Newton {
    pub fn solve<F>(&self, f: F, x0: &[f64]) -> Result<Vec<f64>, Failure>
    where
        F: Fn(&[f64]) -> Vec<f64>,
    {
        let mut x = x0.to_vec();
        let mut fx = f(&x);
        if !all_finite(&fx) {
            return Err(Failure::NonFinite { iteration: 0 });
        }

        for iteration in 0..self.max_iterations {
            if max_norm(&fx) < self.tolerance {
                return Ok(x);
            }
            let jac = jacobian(&f, &x, &fx);
            let rhs: Vec<f64> = fx.iter().map(|v| -v).collect();
            let dx = solve_linear(jac, rhs).ok_or(Failure::SingularJacobian { iteration })?;

            let norm = l2_norm(&fx);
            let mut lambda = 1.0;
            loop {
                let trial: Vec<f64> = x.iter().zip(&dx).map(|(xi, di)| xi + lambda * di).collect();
                let ft = f(&trial);
                if all_finite(&ft) && l2_norm(&ft) < norm {
                    x = trial;
                    fx = ft;
                    break;
                }
                lambda *= 0.5;
                if lambda < MIN_STEP {
                    // Stalled: accept only if already within tolerance.
                    return if max_norm(&fx) < self.tolerance {
                        Ok(x)
                    } else {
                        Err(Failure::NoConvergence {
                            iterations: iteration + 1,
                            residual: max_norm(&fx),
                        })
                    };
                }
            }
        }

        if max_norm(&fx) < self.tolerance {
            Ok(x)
        } else {
            Err(Failure::NoConvergence {
                iterations: self.max_iterations,
                residual: max_norm(&fx),
            })
        }
    }
}

fn all_finite(v: &[f64]) -> bool {
    v.iter().all(|x| x.is_finite())
}

fn max_norm(v: &[f64]) -> f64 {
    v.iter().fold(0.0, |m, x| m.max(x.abs()))
}

fn l2_norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Forward-difference Jacobian, row-major: `jac[i][j] = d f_i / d x_j`.
fn jacobian<F>(f: &F, x: &[f64], fx: &[f64]) -> Vec<Vec<f64>>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    let n = x.len();
    let mut jac = vec![vec![0.0; n]; fx.len()];
    let mut shifted = x.to_vec();
    for j in 0..n {
        let h = f64::EPSILON.sqrt() * x[j].abs().max(1.0);
        shifted[j] = x[j] + h;
        let fh = f(&shifted);
        for (i, row) in jac.iter_mut().enumerate() {
            row[j] = (fh[i] - fx[i]) / h;
        }
        shifted[j] = x[j];
    }
    jac
}

/// Gaussian elimination with partial pivoting. None if the matrix is singular.
fn solve_linear(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < PIVOT_EPS {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Some(x)
}
