use num_bigint::BigInt;
use num_traits::{FromPrimitive, Signed, Zero};

use crate::error::SimError;
use crate::math::{
    self, compute_d, compute_y, compute_y_d, FEE_DENOM, MAX_AMP, PRICE_PROBE,
};

/// How a pool's initial balances are supplied.
#[derive(Debug, Clone)]
pub enum Deposit {
    /// Total deposit on the 10^18 axis, split evenly across the coins.
    Total(BigInt),
    /// Explicit per-coin balances in native units.
    Balances(Vec<BigInt>),
}

/// Everything needed to build a [`PlainPool`].
///
/// * **amp** amplification coefficient, pre-scaled by `n^(n-1)`.
///
/// * **precisions** per-coin multipliers bringing native balances to the
///   common 10^18 axis. Defaults to 10^18 each.
///
/// * **total_share** initial LP supply. Defaults to the invariant at
///   construction.
///
/// * **fee** swap fee, fixed-point over 10^10.
///
/// * **fee_mul** dynamic fee multiplier, fixed-point over 10^10.
#[derive(Debug, Clone)]
pub struct PlainPoolParams {
    pub amp: u64,
    pub deposit: Deposit,
    pub n_coins: usize,
    pub precisions: Option<Vec<BigInt>>,
    pub total_share: Option<BigInt>,
    pub fee: u64,
    pub fee_mul: Option<u64>,
}

/// A single-level stableswap pool.
///
/// Balances are kept in native units; every operation converts through the
/// precision multipliers before touching the invariant solvers. Only
/// `balances` and `total_share` change after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct PlainPool {
    pub(crate) amp: u64,
    pub(crate) n_coins: usize,
    pub(crate) balances: Vec<BigInt>,
    pub(crate) precisions: Vec<BigInt>,
    pub(crate) fee: u64,
    pub(crate) fee_mul: Option<u64>,
    pub(crate) total_share: BigInt,
}

struct Swap {
    x: BigInt,
    y: BigInt,
    dy: BigInt,
    fee: BigInt,
}

impl PlainPool {
    pub fn new(params: PlainPoolParams) -> Result<Self, SimError> {
        let PlainPoolParams {
            amp,
            deposit,
            n_coins,
            precisions,
            total_share,
            fee,
            fee_mul,
        } = params;

        if n_coins < 2 {
            return Err(SimError::InvalidNumberOfAssets(n_coins));
        }
        if amp == 0 || amp > MAX_AMP {
            return Err(SimError::IncorrectAmp {});
        }
        if fee > FEE_DENOM {
            return Err(SimError::IncorrectFee {});
        }
        if let Some(fee_mul) = fee_mul {
            if fee_mul < FEE_DENOM {
                return Err(SimError::IncorrectFeeMultiplier {});
            }
        }

        let precisions = match precisions {
            Some(precisions) => {
                check_shape(&precisions, n_coins)?;
                if precisions.iter().any(|p| !p.is_positive()) {
                    return Err(SimError::ZeroBalance {});
                }
                precisions
            }
            None => vec![math::precision(); n_coins],
        };

        let balances = split_deposit(&deposit, n_coins, &precisions)?;

        let mut pool = PlainPool {
            amp,
            n_coins,
            balances,
            precisions,
            fee,
            fee_mul,
            total_share: BigInt::zero(),
        };
        pool.total_share = match total_share {
            Some(share) => {
                if !share.is_positive() {
                    return Err(SimError::InvalidZeroAmount {});
                }
                share
            }
            None => pool.d()?,
        };

        Ok(pool)
    }

    pub fn amp(&self) -> u64 {
        self.amp
    }

    pub fn n_coins(&self) -> usize {
        self.n_coins
    }

    pub fn balances(&self) -> &[BigInt] {
        &self.balances
    }

    pub fn precisions(&self) -> &[BigInt] {
        &self.precisions
    }

    pub fn fee(&self) -> u64 {
        self.fee
    }

    pub fn fee_mul(&self) -> Option<u64> {
        self.fee_mul
    }

    pub fn total_share(&self) -> &BigInt {
        &self.total_share
    }

    /// Balances brought to the common 10^18 axis.
    pub fn xp(&self) -> Vec<BigInt> {
        self.xp_of(&self.balances)
    }

    pub(crate) fn xp_of(&self, balances: &[BigInt]) -> Vec<BigInt> {
        balances
            .iter()
            .zip(&self.precisions)
            .map(|(x, p)| x * p / math::precision())
            .collect()
    }

    /// The pool invariant at the current balances.
    pub fn d(&self) -> Result<BigInt, SimError> {
        compute_d(self.amp, &self.xp())
    }

    /// LP token value measure, `D * 10^18 / total_share`. Non-decreasing
    /// across any fee-bearing operation.
    pub fn get_virtual_price(&self) -> Result<BigInt, SimError> {
        if self.total_share.is_zero() {
            return Err(SimError::EmptyPool {});
        }
        Ok(self.d()? * math::precision() / &self.total_share)
    }

    pub(crate) fn check_pair(&self, i: usize, j: usize) -> Result<(), SimError> {
        for index in [i, j] {
            if index >= self.n_coins {
                return Err(SimError::CoinIndexOutOfRange {
                    index,
                    n_coins: self.n_coins,
                });
            }
        }
        if i == j {
            return Err(SimError::SameCoins {});
        }
        Ok(())
    }

    /// Imbalance-scaled fee rate over 10^10. Falls back to the flat fee
    /// when no multiplier is configured. The sum is squared before the
    /// product so the intermediate stays exact.
    pub fn dynamic_fee(&self, xpi: &BigInt, xpj: &BigInt) -> BigInt {
        let fee_mul = match self.fee_mul {
            Some(fee_mul) => BigInt::from(fee_mul),
            None => return BigInt::from(self.fee),
        };
        let denom = math::fee_denom();
        let mut xps2 = xpi + xpj;
        xps2 = &xps2 * &xps2;
        &fee_mul * self.fee / ((fee_mul - &denom) * 4 * xpi * xpj / xps2 + denom)
    }

    fn compute_swap(&self, i: usize, j: usize, dx: &BigInt) -> Result<Swap, SimError> {
        self.check_pair(i, j)?;
        if !dx.is_positive() {
            return Err(SimError::InvalidZeroAmount {});
        }

        let xp = self.xp();
        let x = &xp[i] + dx;
        let y = compute_y(self.amp, i, j, &x, &xp)?;
        let dy = &xp[j] - &y;
        if !dy.is_positive() {
            return Err(SimError::InsufficientOutput {});
        }

        let rate = match self.fee_mul {
            None => BigInt::from(self.fee),
            Some(_) => self.dynamic_fee(&((&xp[i] + &x) / 2), &((&xp[j] + &y) / 2)),
        };
        let fee = &dy * rate / math::fee_denom();

        Ok(Swap { x, y, dy, fee })
    }

    /// Swaps `dx` of coin `i` for coin `j`. Returns the net output and the
    /// fee charged, both on the 10^18 axis. The fee is left in the pool,
    /// which is what makes the virtual price grow.
    pub fn exchange(&mut self, i: usize, j: usize, dx: &BigInt) -> Result<(BigInt, BigInt), SimError> {
        let swap = self.compute_swap(i, j, dx)?;
        self.balances[i] = &swap.x * math::precision() / &self.precisions[i];
        self.balances[j] = (&swap.y + &swap.fee) * math::precision() / &self.precisions[j];
        Ok((&swap.dy - &swap.fee, swap.fee))
    }

    /// Quotes the net output of [`PlainPool::exchange`] without touching
    /// state.
    pub fn dy(&self, i: usize, j: usize, dx: &BigInt) -> Result<BigInt, SimError> {
        let swap = self.compute_swap(i, j, dx)?;
        Ok(&swap.dy - &swap.fee)
    }

    /// Mint amount and post-deposit balances for `amounts`. Fees on the
    /// per-coin deviation from the balanced deposit reduce the minted
    /// share, not the committed balances.
    fn simulate_mint(&self, amounts: &[BigInt]) -> Result<(BigInt, Vec<BigInt>), SimError> {
        check_shape(amounts, self.n_coins)?;
        if amounts.iter().any(|a| a.is_negative()) {
            return Err(SimError::InvalidZeroAmount {});
        }

        let imbalance_fee = self.imbalance_fee();
        let d0 = self.d()?;
        if d0.is_zero() {
            return Err(SimError::EmptyPool {});
        }

        let new_balances: Vec<BigInt> = self
            .balances
            .iter()
            .zip(amounts)
            .map(|(x, amount)| x + amount)
            .collect();
        let d1 = compute_d(self.amp, &self.xp_of(&new_balances))?;

        let mut mint_balances = new_balances.clone();
        for k in 0..self.n_coins {
            let ideal = &d1 * &self.balances[k] / &d0;
            let difference = (ideal - &new_balances[k]).abs();
            mint_balances[k] -= &imbalance_fee * difference / math::fee_denom();
        }
        let d2 = compute_d(self.amp, &self.xp_of(&mint_balances))?;

        let mint = &self.total_share * (&d2 - &d0) / &d0;
        Ok((mint, new_balances))
    }

    /// Fee rate applied to each coin's deviation in imbalanced deposits
    /// and withdrawals.
    fn imbalance_fee(&self) -> BigInt {
        BigInt::from(self.fee) * self.n_coins as u64 / (4 * (self.n_coins as u64 - 1))
    }

    /// Deposits `amounts` and mints LP shares. Returns the minted amount.
    pub fn add_liquidity(&mut self, amounts: &[BigInt]) -> Result<BigInt, SimError> {
        let (mint, new_balances) = self.simulate_mint(amounts)?;
        self.balances = new_balances;
        self.total_share += &mint;
        Ok(mint)
    }

    /// Pure preview of [`PlainPool::add_liquidity`].
    pub fn calc_token_amount(&self, amounts: &[BigInt]) -> Result<BigInt, SimError> {
        Ok(self.simulate_mint(amounts)?.0)
    }

    /// Withdraws an arbitrary basket. Returns the share amount the basket
    /// is worth; the caller burns it from `total_share`.
    pub fn remove_liquidity_imbalance(&mut self, amounts: &[BigInt]) -> Result<BigInt, SimError> {
        check_shape(amounts, self.n_coins)?;
        if amounts.iter().any(|a| a.is_negative()) {
            return Err(SimError::InvalidZeroAmount {});
        }

        let imbalance_fee = self.imbalance_fee();
        let d0 = self.d()?;
        if d0.is_zero() {
            return Err(SimError::EmptyPool {});
        }

        let new_balances: Vec<BigInt> = self
            .balances
            .iter()
            .zip(amounts)
            .map(|(x, amount)| x - amount)
            .collect();
        if new_balances.iter().any(|x| !x.is_positive()) {
            return Err(SimError::LiquidityAmountTooSmall {});
        }
        let d1 = compute_d(self.amp, &self.xp_of(&new_balances))?;

        let mut burn_balances = new_balances.clone();
        for k in 0..self.n_coins {
            let ideal = &d1 * &self.balances[k] / &d0;
            let difference = (ideal - &new_balances[k]).abs();
            burn_balances[k] -= &imbalance_fee * difference / math::fee_denom();
        }
        let d2 = compute_d(self.amp, &self.xp_of(&burn_balances))?;

        let burn = (&d0 - &d2) * &self.total_share / &d0;
        self.balances = new_balances;
        Ok(burn)
    }

    /// Value of `token_amount` LP shares redeemed into coin `i` alone, on
    /// the 10^18 axis. The single-coin fee grows with the coin's share of
    /// the pool.
    pub fn calc_withdraw_one_coin(
        &self,
        token_amount: &BigInt,
        i: usize,
        apply_fee: bool,
    ) -> Result<BigInt, SimError> {
        if i >= self.n_coins {
            return Err(SimError::CoinIndexOutOfRange {
                index: i,
                n_coins: self.n_coins,
            });
        }
        if !token_amount.is_positive() {
            return Err(SimError::InvalidZeroAmount {});
        }
        if token_amount > &self.total_share {
            return Err(SimError::LiquidityAmountTooSmall {});
        }

        let xp = self.xp();
        let rate = if self.fee > 0 && apply_fee {
            let sum: BigInt = xp.iter().sum();
            BigInt::from(self.fee) - BigInt::from(self.fee) * &xp[i] / sum + 500_000
        } else {
            BigInt::zero()
        };

        let d0 = compute_d(self.amp, &xp)?;
        let d1 = &d0 - token_amount * &d0 / &self.total_share;
        let dy = &xp[i] - compute_y_d(self.amp, i, &d1, &xp)?;

        Ok(&dy - &dy * rate / math::fee_denom())
    }

    /// Burns `token_amount` LP shares for coin `i` only.
    pub fn remove_liquidity_one_coin(
        &mut self,
        token_amount: &BigInt,
        i: usize,
    ) -> Result<BigInt, SimError> {
        let dy = self.calc_withdraw_one_coin(token_amount, i, true)?;
        self.balances[i] -= &dy;
        self.total_share -= token_amount;
        Ok(dy)
    }

    /// Marginal price `dy/dx` at the current state, from the closed-form
    /// derivative of the invariant.
    pub fn dydx(&self, i: usize, j: usize, use_fee: bool) -> Result<f64, SimError> {
        self.check_pair(i, j)?;
        self.dydx_with(i, j, &self.xp(), use_fee)
    }

    /// Marginal price including the swap fee.
    pub fn dydxfee(&self, i: usize, j: usize) -> Result<f64, SimError> {
        self.dydx(i, j, true)
    }

    /// Closed-form price on a caller-supplied virtual balance vector. The
    /// meta pool reuses this against its rate-adjusted balances.
    pub(crate) fn dydx_with(
        &self,
        i: usize,
        j: usize,
        xp: &[BigInt],
        use_fee: bool,
    ) -> Result<f64, SimError> {
        let n = self.n_coins as u32;
        let xi = &xp[i];
        let xj = &xp[j];
        let d = compute_d(self.amp, xp)?;
        let d_pow = d.pow(n + 1);
        let x_prod = xp
            .iter()
            .fold(BigInt::from(1u8), |acc, x| acc * x);
        let a_pow = BigInt::from(self.amp) * BigInt::from(self.n_coins).pow(n + 1);

        let num = xj * (xi * &a_pow * &x_prod + &d_pow);
        let den = xi * (xj * &a_pow * &x_prod + &d_pow);
        let mut dydx = math::ratio_to_f64(num, den)?;

        if use_fee {
            let fee_factor = match self.fee_mul {
                None => self.fee as f64 / FEE_DENOM as f64,
                Some(_) => {
                    let probe = BigInt::from(PRICE_PROBE);
                    let moved = BigInt::from_f64((dydx * PRICE_PROBE as f64).trunc())
                        .unwrap_or_else(BigInt::zero);
                    let rate = self.dynamic_fee(&(xi + probe / 2), &(xj - moved / 2));
                    math::big_to_f64(&rate) / FEE_DENOM as f64
                }
            };
            dydx *= 1.0 - fee_factor;
        }

        Ok(dydx)
    }
}

pub(crate) fn check_shape(values: &[BigInt], expected: usize) -> Result<(), SimError> {
    if values.len() != expected {
        return Err(SimError::WrongAssetLength {
            expected,
            actual: values.len(),
        });
    }
    Ok(())
}

/// Turns a deposit spec into native balances. An even split values each
/// coin slot at its rate, so a scalar deposit lands balanced on the
/// virtual axis.
pub(crate) fn split_deposit(
    deposit: &Deposit,
    n_coins: usize,
    rates: &[BigInt],
) -> Result<Vec<BigInt>, SimError> {
    match deposit {
        Deposit::Balances(balances) => {
            check_shape(balances, n_coins)?;
            if balances.iter().any(|x| x.is_negative()) {
                return Err(SimError::ZeroBalance {});
            }
            Ok(balances.clone())
        }
        Deposit::Total(total) => {
            if !total.is_positive() {
                return Err(SimError::InvalidZeroAmount {});
            }
            Ok(rates
                .iter()
                .map(|rate| total / BigInt::from(n_coins) * math::precision() / rate)
                .collect())
        }
    }
}
