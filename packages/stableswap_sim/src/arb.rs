//! Arbitrage estimation: sizing trades so the post-trade marginal pool
//! price lands on an external target. Probing trades run against the live
//! pool and are rolled back from a by-value snapshot on every path.

use std::cmp::Ordering;

use itertools::Itertools;
use num_bigint::BigInt;
use num_traits::{FromPrimitive, Signed, Zero};

use crate::error::SimError;
use crate::math::{self, compute_y, PRICE_PROBE};
use crate::pool::Pool;
use crate::solver::{
    brentq, least_squares_bounded, LeastSquaresResult, RootResult, BRENT_MAX_ITER, BRENT_RTOL,
    BRENT_XTOL,
};

/// Tolerances for the multi-pair least-squares solve.
const LSQ_TOL: f64 = 1e-15;
const LSQ_MAX_ITER: usize = 60;

/// A directed trade candidate: `dx` of coin `i` sold for coin `j`.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub i: usize,
    pub j: usize,
    pub dx: BigInt,
}

/// An executed trade with its realized output.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedTrade {
    pub i: usize,
    pub j: usize,
    pub dx: BigInt,
    pub dy: BigInt,
}

fn trunc_to_big(value: f64) -> BigInt {
    if value.is_nan() {
        return BigInt::zero();
    }
    BigInt::from_f64(value.trunc()).unwrap_or_else(BigInt::zero)
}

/// Price error `dydxfee(i, j) - price` after a speculative trade of `dx`.
/// The pool is restored before returning on every path.
fn arb_error(pool: &mut Pool, i: usize, j: usize, dx: f64, price: f64) -> Result<f64, SimError> {
    let dx = trunc_to_big(dx);
    let snapshot = pool.snapshot();
    let result = pool
        .exchange(i, j, &dx)
        .and_then(|_| pool.dydxfee(i, j));
    pool.restore(&snapshot);
    Ok(result? - price)
}

/// Residual vector over the oriented pairs after applying `dxs` in order.
/// NaN entries are zero-size trades.
fn arb_errors(
    pool: &mut Pool,
    dxs: &[f64],
    price_targets: &[f64],
    coins: &[(usize, usize)],
) -> Result<Vec<f64>, SimError> {
    let snapshot = pool.snapshot();
    let result = (|| {
        for (k, &(i, j)) in coins.iter().enumerate() {
            let dx = trunc_to_big(dxs[k]);
            if dx.is_positive() {
                pool.exchange(i, j, &dx)?;
            }
        }
        coins
            .iter()
            .zip(price_targets)
            .map(|(&(i, j), &price)| Ok(pool.dydxfee(i, j)? - price))
            .collect::<Result<Vec<_>, SimError>>()
    })();
    pool.restore(&snapshot);
    result
}

impl Pool {
    /// Sizes the trade `i -> j` so the post-trade marginal price (fees
    /// included) equals `price`, which must sit below the current
    /// `dydxfee(i, j)`. Returns the trade, the residual price error at the
    /// root, and the root finder's diagnostics.
    pub fn optarb(&mut self, i: usize, j: usize, price: f64) -> Result<(Trade, f64, RootResult), SimError> {
        let lo = PRICE_PROBE as f64;
        let hi = self.arb_bracket_hi(i, j)?;
        if !(hi > lo) {
            return Err(SimError::OptimizationFailed {
                reason: format!("degenerate trade bracket [{lo}, {hi}]"),
            });
        }

        let result = brentq(
            |dx| arb_error(self, i, j, dx, price),
            lo,
            hi,
            BRENT_XTOL,
            BRENT_RTOL,
            BRENT_MAX_ITER,
        )?;
        let error = arb_error(self, i, j, result.root, price)?;
        let trade = Trade {
            i,
            j,
            dx: trunc_to_big(result.root),
        };
        Ok((trade, error, result))
    }

    /// Upper bracket for [`Pool::optarb`]: the input that would drain the
    /// output leg down to roughly one percent of its current balance.
    fn arb_bracket_hi(&self, i: usize, j: usize) -> Result<f64, SimError> {
        match self {
            Pool::Plain(pool) => {
                pool.check_pair(i, j)?;
                let xp = pool.xp();
                let target = &xp[j] / 100;
                let y = compute_y(pool.amp(), j, i, &target, &xp)?;
                Ok(math::big_to_f64(&(y - &xp[i])))
            }
            Pool::Meta(pool) => {
                let (meta_i, base_i) = pool.route(i)?;
                let (meta_j, base_j) = pool.route(j)?;
                if let (Some(base_i), Some(base_j)) = (base_i, base_j) {
                    let base = pool.base();
                    let xp = base.xp();
                    let target = &xp[base_j] / 100;
                    let y = compute_y(base.amp(), base_j, base_i, &target, &xp)?;
                    Ok(math::big_to_f64(&(y - &xp[base_i])))
                } else {
                    let rates = pool.rates()?;
                    let xp = pool.xp_rates(&rates);
                    let target = &xp[meta_j] / 100;
                    let y = compute_y(pool.head().amp(), meta_j, meta_i, &target, &xp)?;
                    Ok(math::big_to_f64(&(y - &pool.xp()[meta_i])))
                }
            }
        }
    }

    /// Estimates trades that optimally arbitrage every coin pair at once,
    /// given external `prices` per pair and per-pair volume `limits` in
    /// 10^18 units. Pairs run in lexicographic order; each is oriented
    /// toward the profitable direction at the minimum trade size, seeded
    /// from the pairwise root, then polished jointly. A failed joint solve
    /// degrades to no trades plus the un-traded residual vector.
    pub fn optarbs(
        &mut self,
        prices: &[f64],
        limits: &[f64],
    ) -> Result<(Vec<Trade>, Vec<f64>, Option<LeastSquaresResult>), SimError> {
        let combos: Vec<(usize, usize)> = (0..self.n_total()).tuple_combinations().collect();
        if prices.len() != combos.len() {
            return Err(SimError::WrongAssetLength {
                expected: combos.len(),
                actual: prices.len(),
            });
        }
        if limits.len() != combos.len() {
            return Err(SimError::WrongAssetLength {
                expected: combos.len(),
                actual: limits.len(),
            });
        }

        let min_trade = PRICE_PROBE as f64;
        let mut x0 = Vec::with_capacity(combos.len());
        let mut lo = Vec::with_capacity(combos.len());
        let mut hi = Vec::with_capacity(combos.len());
        let mut coins = Vec::with_capacity(combos.len());
        let mut price_targets = Vec::with_capacity(combos.len());

        for (k, &(i, j)) in combos.iter().enumerate() {
            let cap = (limits[k] * 1e18).trunc();
            let (pair, target, seeded) = if arb_error(self, i, j, min_trade, prices[k])? > 0.0 {
                ((i, j), prices[k], true)
            } else if arb_error(self, j, i, min_trade, 1.0 / prices[k])? > 0.0 {
                ((j, i), 1.0 / prices[k], true)
            } else {
                ((i, j), prices[k], false)
            };

            let guess = if seeded {
                // the pairwise root overshoots once other pairs trade too,
                // but it lands in range
                match self.optarb(pair.0, pair.1, target) {
                    Ok((trade, _, _)) => math::big_to_f64(&trade.dx).min(cap),
                    Err(_) => 0.0,
                }
            } else {
                0.0
            };

            x0.push(guess);
            lo.push(0.0);
            hi.push(cap + 1.0);
            coins.push(pair);
            price_targets.push(target);
        }

        // largest expected trades first, so the residuals always see the
        // most realistic cumulative state
        let mut order: Vec<usize> = (0..x0.len()).collect();
        order.sort_by(|&a, &b| x0[b].partial_cmp(&x0[a]).unwrap_or(Ordering::Equal));
        let x0: Vec<f64> = order.iter().map(|&k| x0[k]).collect();
        let lo: Vec<f64> = order.iter().map(|&k| lo[k]).collect();
        let hi: Vec<f64> = order.iter().map(|&k| hi[k]).collect();
        let coins: Vec<(usize, usize)> = order.iter().map(|&k| coins[k]).collect();
        let price_targets: Vec<f64> = order.iter().map(|&k| price_targets[k]).collect();

        let solve = least_squares_bounded(
            |dxs| arb_errors(self, dxs, &price_targets, &coins),
            &x0,
            &lo,
            &hi,
            LSQ_TOL,
            LSQ_TOL,
            LSQ_MAX_ITER,
        );

        match solve {
            Ok(result) => {
                let mut trades = Vec::new();
                for (k, &(i, j)) in coins.iter().enumerate() {
                    let dx = trunc_to_big(result.x[k]);
                    if dx.is_positive() {
                        trades.push(Trade { i, j, dx });
                    }
                }
                let errors = result.residuals.clone();
                Ok((trades, errors, Some(result)))
            }
            Err(_) => {
                let zeros = vec![0.0; coins.len()];
                let errors = arb_errors(self, &zeros, &price_targets, &coins)?;
                Ok((Vec::new(), errors, None))
            }
        }
    }

    /// Estimates the proportion of pool holdings needed to move each
    /// pair's price by `size` (for instance 0.001 for ten basis points),
    /// both directions per pair. A metapool is viewed as a plain pool
    /// trading its own coins against the base LP token at the base virtual
    /// price.
    pub fn pricedepth(&self, size: f64) -> Result<Vec<f64>, SimError> {
        let mut view = match self {
            Pool::Plain(pool) => Pool::Plain(pool.clone()),
            Pool::Meta(pool) => Pool::Plain(pool.lp_view()?),
        };

        let sum_xp: BigInt = view.xp().iter().sum();
        let sum_xp = math::big_to_f64(&sum_xp);
        let n = view.n_total();

        let mut depth = Vec::with_capacity(n * (n - 1));
        for (i, j) in (0..n).tuple_combinations() {
            for (from, to) in [(i, j), (j, i)] {
                let target = view.dydxfee(from, to)? * (1.0 - size);
                let (trade, _, _) = view.optarb(from, to, target)?;
                depth.push(math::big_to_f64(&trade.dx) / sum_xp);
            }
        }
        Ok(depth)
    }

    /// Executes `trades` in order. Returns the executed trades and the
    /// total traded volume on the 10^18 axis; for a metapool only trades
    /// touching a meta slot count toward volume.
    pub fn dotrades(&mut self, trades: &[Trade]) -> Result<(Vec<ExecutedTrade>, BigInt), SimError> {
        let (prices, meta_cutoff) = match self {
            Pool::Plain(pool) => (pool.precisions().to_vec(), None),
            Pool::Meta(pool) => {
                let mut prices = pool.head().precisions()[..pool.max_coin()].to_vec();
                prices.extend_from_slice(pool.base().precisions());
                (prices, Some(pool.max_coin()))
            }
        };

        let mut done = Vec::with_capacity(trades.len());
        let mut volume = BigInt::zero();
        for trade in trades {
            let (dy, _) = self.exchange(trade.i, trade.j, &trade.dx)?;
            let counted = match meta_cutoff {
                None => true,
                Some(max_coin) => trade.i < max_coin || trade.j < max_coin,
            };
            if counted {
                volume += &trade.dx * &prices[trade.i] / math::precision();
            }
            done.push(ExecutedTrade {
                i: trade.i,
                j: trade.j,
                dx: trade.dx.clone(),
                dy,
            });
        }
        Ok((done, volume))
    }
}
