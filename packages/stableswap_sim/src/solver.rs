//! Scalar root finding and a small bounded least-squares solver, the float
//! machinery behind the arbitrage estimators. Objectives are fallible and
//! their errors pass straight through.

use std::cmp::Ordering;

use crate::error::SimError;

/// Absolute tolerance for the bracketing root search.
pub(crate) const BRENT_XTOL: f64 = 2e-12;
/// Relative tolerance, four machine epsilons.
pub(crate) const BRENT_RTOL: f64 = 4.0 * f64::EPSILON;
pub(crate) const BRENT_MAX_ITER: usize = 100;

/// Outcome of a bracketing root search.
#[derive(Debug, Clone)]
pub struct RootResult {
    pub root: f64,
    pub iterations: usize,
    pub function_calls: usize,
    pub converged: bool,
}

/// Brent's method on `[xa, xb]`. The bracket must straddle a sign change.
/// Falls back from inverse quadratic interpolation to secant to bisection
/// per step, so progress is never worse than bisection.
pub(crate) fn brentq<F>(
    mut f: F,
    xa: f64,
    xb: f64,
    xtol: f64,
    rtol: f64,
    max_iter: usize,
) -> Result<RootResult, SimError>
where
    F: FnMut(f64) -> Result<f64, SimError>,
{
    let mut xpre = xa;
    let mut xcur = xb;
    let mut fpre = f(xpre)?;
    let mut fcur = f(xcur)?;
    let mut function_calls = 2;

    if fpre * fcur > 0.0 {
        return Err(SimError::OptimizationFailed {
            reason: "root is not bracketed".to_string(),
        });
    }
    if fpre == 0.0 {
        return Ok(RootResult {
            root: xpre,
            iterations: 0,
            function_calls,
            converged: true,
        });
    }
    if fcur == 0.0 {
        return Ok(RootResult {
            root: xcur,
            iterations: 0,
            function_calls,
            converged: true,
        });
    }

    let mut xblk = 0.0;
    let mut fblk = 0.0;
    let mut spre = 0.0;
    let mut scur = 0.0;

    for iteration in 0..max_iter {
        if fpre * fcur < 0.0 {
            xblk = xpre;
            fblk = fpre;
            spre = xcur - xpre;
            scur = xcur - xpre;
        }
        if fblk.abs() < fcur.abs() {
            xpre = xcur;
            xcur = xblk;
            xblk = xpre;
            fpre = fcur;
            fcur = fblk;
            fblk = fpre;
        }

        let delta = (xtol + rtol * xcur.abs()) / 2.0;
        let sbis = (xblk - xcur) / 2.0;
        if fcur == 0.0 || sbis.abs() < delta {
            return Ok(RootResult {
                root: xcur,
                iterations: iteration,
                function_calls,
                converged: true,
            });
        }

        if spre.abs() > delta && fcur.abs() < fpre.abs() {
            let stry = if xpre == xblk {
                // secant step
                -fcur * (xcur - xpre) / (fcur - fpre)
            } else {
                // inverse quadratic extrapolation
                let dpre = (fpre - fcur) / (xpre - xcur);
                let dblk = (fblk - fcur) / (xblk - xcur);
                -fcur * (fblk * dblk - fpre * dpre) / (dblk * dpre * (fblk - fpre))
            };
            if 2.0 * stry.abs() < spre.abs().min(3.0 * sbis.abs() - delta) {
                spre = scur;
                scur = stry;
            } else {
                spre = sbis;
                scur = sbis;
            }
        } else {
            spre = sbis;
            scur = sbis;
        }

        xpre = xcur;
        fpre = fcur;
        if scur.abs() > delta {
            xcur += scur;
        } else {
            xcur += if sbis > 0.0 { delta } else { -delta };
        }

        fcur = f(xcur)?;
        function_calls += 1;
    }

    Ok(RootResult {
        root: xcur,
        iterations: max_iter,
        function_calls,
        converged: false,
    })
}

/// Outcome of the bounded least-squares solve.
#[derive(Debug, Clone)]
pub struct LeastSquaresResult {
    pub x: Vec<f64>,
    pub residuals: Vec<f64>,
    pub cost: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Levenberg-Marquardt with box constraints: forward-difference Jacobian,
/// every candidate clamped into `[lo, hi]`, damping retried on failed
/// steps. Terminates on the projected gradient (`gtol`), on step size
/// (`xtol`), or when no damped step improves the cost.
pub(crate) fn least_squares_bounded<F>(
    mut objective: F,
    x0: &[f64],
    lo: &[f64],
    hi: &[f64],
    xtol: f64,
    gtol: f64,
    max_iter: usize,
) -> Result<LeastSquaresResult, SimError>
where
    F: FnMut(&[f64]) -> Result<Vec<f64>, SimError>,
{
    let n = x0.len();
    let mut x: Vec<f64> = x0
        .iter()
        .enumerate()
        .map(|(k, &v)| v.clamp(lo[k], hi[k]))
        .collect();
    let mut residuals = objective(&x)?;
    let m = residuals.len();
    let mut cost = 0.5 * residuals.iter().map(|r| r * r).sum::<f64>();
    let mut lambda = 1e-3;
    let mut converged = false;
    let mut iterations = 0;

    for iteration in 0..max_iter {
        iterations = iteration + 1;

        // forward differences, flipped to backward at the upper bound
        let mut jacobian = vec![vec![0.0; n]; m];
        for k in 0..n {
            let step = f64::EPSILON.sqrt() * x[k].abs().max(1.0);
            let (probe_k, sign) = if x[k] + step <= hi[k] {
                (x[k] + step, 1.0)
            } else {
                (x[k] - step, -1.0)
            };
            let mut probe = x.clone();
            probe[k] = probe_k;
            let shifted = objective(&probe)?;
            for r in 0..m {
                jacobian[r][k] = sign * (shifted[r] - residuals[r]) / step;
            }
        }

        let gradient: Vec<f64> = (0..n)
            .map(|k| (0..m).map(|r| jacobian[r][k] * residuals[r]).sum())
            .collect();

        // components pressing into an active bound cannot move
        let g_free = (0..n)
            .filter(|&k| {
                !((x[k] <= lo[k] && gradient[k] > 0.0) || (x[k] >= hi[k] && gradient[k] < 0.0))
            })
            .fold(0.0f64, |acc, k| acc.max(gradient[k].abs()));
        if g_free < gtol {
            converged = true;
            break;
        }

        let mut improved = false;
        for _ in 0..12 {
            let mut normal = vec![vec![0.0; n]; n];
            for r in 0..n {
                for c in 0..n {
                    normal[r][c] = (0..m).map(|t| jacobian[t][r] * jacobian[t][c]).sum();
                }
            }
            for k in 0..n {
                normal[k][k] += lambda * normal[k][k].max(1e-12);
            }
            let rhs: Vec<f64> = gradient.iter().map(|g| -g).collect();
            let step = match solve_dense(normal, rhs) {
                Some(step) => step,
                None => {
                    lambda *= 10.0;
                    continue;
                }
            };

            let x_try: Vec<f64> = x
                .iter()
                .enumerate()
                .map(|(k, &v)| (v + step[k]).clamp(lo[k], hi[k]))
                .collect();
            let r_try = objective(&x_try)?;
            let cost_try = 0.5 * r_try.iter().map(|r| r * r).sum::<f64>();

            if cost_try < cost {
                let shift = x_try
                    .iter()
                    .zip(&x)
                    .map(|(a, b)| (a - b).abs())
                    .fold(0.0f64, f64::max);
                let scale = x.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
                x = x_try;
                residuals = r_try;
                cost = cost_try;
                lambda = (lambda / 3.0).max(1e-12);
                improved = true;
                if shift <= xtol * (xtol + scale) {
                    converged = true;
                }
                break;
            }
            lambda *= 10.0;
        }

        if converged {
            break;
        }
        if !improved {
            // no damped step improves the cost; treat the point as a
            // constrained minimum
            converged = true;
            break;
        }
    }

    Ok(LeastSquaresResult {
        x,
        residuals,
        cost,
        iterations,
        converged,
    })
}

/// Gaussian elimination with partial pivoting. The systems here carry one
/// row per traded pair, so they stay tiny.
fn solve_dense(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&r1, &r2| {
            a[r1][col]
                .abs()
                .partial_cmp(&a[r2][col].abs())
                .unwrap_or(Ordering::Equal)
        })?;
        if a[pivot][col].abs() < f64::MIN_POSITIVE {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for c in col..n {
                let pivot_value = a[col][c];
                a[row][c] -= factor * pivot_value;
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let mut acc = b[row];
        for c in row + 1..n {
            acc -= a[row][c] * x[c];
        }
        x[row] = acc / a[row][row];
    }
    Some(x)
}
