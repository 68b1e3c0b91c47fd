use num_bigint::BigInt;
use num_traits::{Signed, Zero};

use crate::error::SimError;
use crate::math::{self, compute_y, FEE_DENOM, PRICE_PROBE};
use crate::pool::plain::{check_shape, split_deposit, Deposit, PlainPool, PlainPoolParams};

/// Everything needed to build a [`MetaPool`]. The base pool is built
/// first; its virtual price values the LP slot when a scalar deposit is
/// split.
///
/// * **base_total_share** seeds the base pool supply; the meta supply
///   always initializes to the meta invariant.
///
/// * **base_fee** defaults to `fee` when absent.
///
/// * **redemption_price** installs a dynamic redemption price as the
///   precision of coin 0.
#[derive(Debug, Clone)]
pub struct MetaPoolParams {
    pub amp: u64,
    pub base_amp: u64,
    pub deposit: Deposit,
    pub base_deposit: Deposit,
    pub n_coins: usize,
    pub base_n_coins: usize,
    pub precisions: Option<Vec<BigInt>>,
    pub base_precisions: Option<Vec<BigInt>>,
    pub base_total_share: Option<BigInt>,
    pub fee: u64,
    pub base_fee: Option<u64>,
    pub fee_mul: Option<u64>,
    pub redemption_price: Option<BigInt>,
}

/// A two-level pool whose last coin slot holds the LP token of an owned
/// base pool. Externally it trades `n + base_n - 1` coins; indices at or
/// past `max_coin` address base coins through the LP slot.
#[derive(Debug, Clone, PartialEq)]
pub struct MetaPool {
    pub(crate) head: PlainPool,
    pub(crate) base: PlainPool,
    pub(crate) redemption: bool,
    pub(crate) max_coin: usize,
    pub(crate) n_total: usize,
}

impl MetaPool {
    pub fn new(params: MetaPoolParams) -> Result<Self, SimError> {
        let base = PlainPool::new(PlainPoolParams {
            amp: params.base_amp,
            deposit: params.base_deposit,
            n_coins: params.base_n_coins,
            precisions: params.base_precisions,
            total_share: params.base_total_share,
            fee: params.base_fee.unwrap_or(params.fee),
            fee_mul: None,
        })?;

        let n_coins = params.n_coins;
        if n_coins < 2 {
            return Err(SimError::InvalidNumberOfAssets(n_coins));
        }
        let max_coin = n_coins - 1;

        let mut precisions = match params.precisions {
            Some(precisions) => {
                check_shape(&precisions, n_coins)?;
                precisions
            }
            None => vec![math::precision(); n_coins],
        };
        let redemption = params.redemption_price.is_some();
        if let Some(redemption_price) = params.redemption_price {
            if !redemption_price.is_positive() {
                return Err(SimError::ZeroBalance {});
            }
            precisions[0] = redemption_price;
        }

        // an even split values the LP slot at the base virtual price
        let mut rates = precisions.clone();
        rates[max_coin] = base.get_virtual_price()?;
        let balances = split_deposit(&params.deposit, n_coins, &rates)?;

        let head = PlainPool::new(PlainPoolParams {
            amp: params.amp,
            deposit: Deposit::Balances(balances),
            n_coins,
            precisions: Some(precisions),
            total_share: None,
            fee: params.fee,
            fee_mul: params.fee_mul,
        })?;

        Ok(MetaPool {
            head,
            base,
            redemption,
            max_coin,
            n_total: n_coins + params.base_n_coins - 1,
        })
    }

    pub fn head(&self) -> &PlainPool {
        &self.head
    }

    pub fn base(&self) -> &PlainPool {
        &self.base
    }

    pub fn max_coin(&self) -> usize {
        self.max_coin
    }

    pub fn n_total(&self) -> usize {
        self.n_total
    }

    pub fn redemption(&self) -> bool {
        self.redemption
    }

    /// Head balances on the 10^18 axis with the raw precisions; the LP
    /// slot stays in share units here.
    pub fn xp(&self) -> Vec<BigInt> {
        self.head.xp()
    }

    /// Head invariant over the raw precisions.
    pub fn d(&self) -> Result<BigInt, SimError> {
        self.head.d()
    }

    pub fn get_virtual_price(&self) -> Result<BigInt, SimError> {
        self.head.get_virtual_price()
    }

    /// Head precisions with the LP slot valued at the base virtual price.
    pub(crate) fn rates(&self) -> Result<Vec<BigInt>, SimError> {
        let mut rates = self.head.precisions.clone();
        rates[self.max_coin] = self.base.get_virtual_price()?;
        Ok(rates)
    }

    /// Head balances scaled by `rates`, the vector all exchange and
    /// pricing paths work on.
    pub(crate) fn xp_rates(&self, rates: &[BigInt]) -> Vec<BigInt> {
        self.head
            .balances
            .iter()
            .zip(rates)
            .map(|(x, rate)| x * rate / math::precision())
            .collect()
    }

    /// Maps an external coin index onto its meta slot and, when it lives
    /// in the base pool, its slot there. Exactly one of the two views
    /// applies to any base coin.
    pub(crate) fn route(&self, index: usize) -> Result<(usize, Option<usize>), SimError> {
        if index >= self.n_total {
            return Err(SimError::CoinIndexOutOfRange {
                index,
                n_coins: self.n_total,
            });
        }
        if index < self.max_coin {
            Ok((index, None))
        } else {
            Ok((self.max_coin, Some(index - self.max_coin)))
        }
    }

    fn check_trade(&self, i: usize, j: usize, dx: &BigInt) -> Result<(), SimError> {
        if i == j {
            return Err(SimError::SameCoins {});
        }
        if !dx.is_positive() {
            return Err(SimError::InvalidZeroAmount {});
        }
        Ok(())
    }

    /// Quotes the net output of [`MetaPool::exchange`], fees included.
    /// Base deposits are sized with the pure preview, so quotes can drift
    /// from execution by the preview's rounding.
    pub fn dy(&self, i: usize, j: usize, dx: &BigInt) -> Result<BigInt, SimError> {
        self.check_trade(i, j, dx)?;
        let (meta_i, base_i) = self.route(i)?;
        let (meta_j, base_j) = self.route(j)?;

        if let (Some(base_i), Some(base_j)) = (base_i, base_j) {
            // both legs live below; the quote takes the meta fee on top of
            // the base pool's own
            let dy = self.base.dy(base_i, base_j, dx)?;
            return Ok(&dy - &dy * self.head.fee / math::fee_denom());
        }

        let rates = self.rates()?;
        let xp = self.xp_rates(&rates);

        let x = match base_i {
            None => &xp[i] + dx * &rates[i] / math::precision(),
            Some(base_i) => {
                let mut base_inputs = vec![BigInt::zero(); self.base.n_coins];
                base_inputs[base_i] = dx.clone();
                let dx_lp = self.base.calc_token_amount(&base_inputs)?;
                &xp[self.max_coin] + dx_lp * &rates[self.max_coin] / math::precision()
            }
        };

        let y = compute_y(self.head.amp, meta_i, meta_j, &x, &xp)?;
        let dy: BigInt = &xp[meta_j] - &y - 1;
        if !dy.is_positive() {
            return Err(SimError::InsufficientOutput {});
        }
        let dy_fee = &dy * self.head.fee / math::fee_denom();
        let dy_out = (&dy - &dy_fee) * math::precision() / &rates[meta_j];

        match base_j {
            None => Ok(dy_out),
            Some(base_j) => self.base.calc_withdraw_one_coin(&dy_out, base_j, true),
        }
    }

    /// Swaps `dx` of external coin `i` for external coin `j`, routing
    /// through base pool deposits and withdrawals as needed. Returns the
    /// net output and fee in the output coin's units.
    pub fn exchange(&mut self, i: usize, j: usize, dx: &BigInt) -> Result<(BigInt, BigInt), SimError> {
        self.check_trade(i, j, dx)?;
        let (meta_i, base_i) = self.route(i)?;
        let (meta_j, base_j) = self.route(j)?;

        if let (Some(base_i), Some(base_j)) = (base_i, base_j) {
            // fees stay below, matching the on-chain underlying exchange
            return self.base.exchange(base_i, base_j, dx);
        }

        let rates = self.rates()?;
        let xp = self.xp_rates(&rates);

        let x = match base_i {
            None => {
                let x = &xp[i] + dx * &rates[i] / math::precision();
                self.head.balances[i] += dx;
                x
            }
            Some(base_i) => {
                let mut base_inputs = vec![BigInt::zero(); self.base.n_coins];
                base_inputs[base_i] = dx.clone();
                // deposit below and credit the LP slot with the actual mint
                let dx_lp = self.base.add_liquidity(&base_inputs)?;
                self.head.balances[self.max_coin] += &dx_lp;
                &xp[self.max_coin] + &dx_lp * &rates[self.max_coin] / math::precision()
            }
        };

        let y = compute_y(self.head.amp, meta_i, meta_j, &x, &xp)?;
        let dy: BigInt = &xp[meta_j] - &y - 1;
        if !dy.is_positive() {
            return Err(SimError::InsufficientOutput {});
        }
        let dy_fee = &dy * self.head.fee / math::fee_denom();
        let dy_nofee = &dy * math::precision() / &rates[meta_j];
        let dy_out = (&dy - &dy_fee) * math::precision() / &rates[meta_j];

        self.head.balances[meta_j] -= &dy_out;

        match base_j {
            None => {
                let fee_out = &dy_fee * math::precision() / &rates[meta_j];
                Ok((dy_out, fee_out))
            }
            Some(base_j) => {
                let dy_real = self.base.remove_liquidity_one_coin(&dy_out, base_j)?;
                // report the fee as the delta against a no-fee withdrawal
                // of the no-fee swap output, measured after the withdrawal
                let dy_real_nofee = self.base.calc_withdraw_one_coin(&dy_nofee, base_j, false)?;
                let fee_out = &dy_real_nofee - &dy_real;
                Ok((dy_real, fee_out))
            }
        }
    }

    pub fn add_liquidity(&mut self, amounts: &[BigInt]) -> Result<BigInt, SimError> {
        self.head.add_liquidity(amounts)
    }

    pub fn calc_token_amount(&self, amounts: &[BigInt]) -> Result<BigInt, SimError> {
        self.head.calc_token_amount(amounts)
    }

    pub fn remove_liquidity_imbalance(&mut self, amounts: &[BigInt]) -> Result<BigInt, SimError> {
        self.head.remove_liquidity_imbalance(amounts)
    }

    pub fn remove_liquidity_one_coin(&mut self, token_amount: &BigInt, i: usize) -> Result<BigInt, SimError> {
        self.head.remove_liquidity_one_coin(token_amount, i)
    }

    pub fn calc_withdraw_one_coin(
        &self,
        token_amount: &BigInt,
        i: usize,
        apply_fee: bool,
    ) -> Result<BigInt, SimError> {
        self.head.calc_withdraw_one_coin(token_amount, i, apply_fee)
    }

    /// Marginal price `dy/dx` across the external index space.
    pub fn dydx(&self, i: usize, j: usize, use_fee: bool) -> Result<f64, SimError> {
        if i == j {
            return Err(SimError::SameCoins {});
        }
        let (_, base_i) = self.route(i)?;
        let (_, base_j) = self.route(j)?;

        match (base_i, base_j) {
            // both below: the base pool's own closed form applies
            (Some(base_i), Some(base_j)) => self.base.dydx(base_i, base_j, use_fee),
            (None, None) => {
                let rates = self.rates()?;
                let xp = self.xp_rates(&rates);
                self.head.dydx_with(i, j, &xp, use_fee)
            }
            (None, Some(base_j)) => self.price_into_base(base_j, use_fee),
            (Some(base_i), None) => self.price_from_base(base_i, j, use_fee),
        }
    }

    /// Marginal price including fees on both levels where they apply.
    pub fn dydxfee(&self, i: usize, j: usize) -> Result<f64, SimError> {
        self.dydx(i, j, true)
    }

    /// Price of a base coin in units of the primary meta coin, through the
    /// derivative of the base invariant with respect to the output leg:
    ///
    /// `dz/dx_i = dz/dw * dD/dx_i`
    ///
    /// with `w` the LP slot and `D` the base invariant.
    fn price_into_base(&self, base_j: usize, use_fee: bool) -> Result<f64, SimError> {
        let rates = self.rates()?;
        let xp = self.xp_rates(&rates);

        let bp = &self.base;
        let base_xp = bp.xp();
        let n = bp.n_coins as u32;
        let x_prod = base_xp.iter().fold(BigInt::from(1u8), |acc, x| acc * x);
        let d = bp.d()?;
        let d_pow = d.pow(n + 1);
        let a_pow = BigInt::from(bp.amp) * BigInt::from(bp.n_coins).pow(n + 1);
        let xj = &base_xp[base_j];

        let num = -(math::big_to_f64(&(&a_pow * &x_prod))
            + math::ratio_to_f64(d_pow, xj.clone())?);
        let den = math::big_to_f64(
            &(BigInt::from(bp.n_coins).pow(n) * &x_prod
                - &a_pow * &x_prod
                - BigInt::from(bp.n_coins + 1) * d.pow(n)),
        );
        let d_prime = num / den;

        let dwdz = self.head.dydx_with(0, self.max_coin, &xp, use_fee)?;
        let mut dydx = dwdz / d_prime;

        if use_fee && bp.fee > 0 {
            let sum: BigInt = base_xp.iter().sum();
            let fee = BigInt::from(bp.fee) - BigInt::from(bp.fee) * xj / sum + 500_000;
            dydx *= 1.0 - math::big_to_f64(&fee) / FEE_DENOM as f64;
        }

        Ok(dydx)
    }

    /// Price of the meta coin `j` in units of base coin `base_i`, probed
    /// with a small hypothetical deposit of the base coin.
    fn price_from_base(&self, base_i: usize, j: usize, use_fee: bool) -> Result<f64, SimError> {
        let rates = self.rates()?;
        let xp = self.xp_rates(&rates);

        let dx = BigInt::from(PRICE_PROBE);
        let mut base_inputs = vec![BigInt::zero(); self.base.n_coins];
        base_inputs[base_i] = dx.clone();
        let dw = self.base.calc_token_amount(&base_inputs)?;
        let dw = dw * &rates[self.max_coin] / math::precision();
        let x = &xp[self.max_coin] + &dw;

        let y = compute_y(self.head.amp, self.max_coin, j, &x, &xp)?;
        let dy = &xp[j] - &y - 1;
        let dy_fee = if use_fee {
            &dy * self.head.fee / math::fee_denom()
        } else {
            BigInt::zero()
        };
        let dy = (&dy - &dy_fee) * math::precision() / &rates[j];

        math::ratio_to_f64(dy, dx)
    }

    /// Plain view of the head with the LP slot priced at the base virtual
    /// price. Depth estimation trades against the LP token through this
    /// view.
    pub(crate) fn lp_view(&self) -> Result<PlainPool, SimError> {
        let mut view = self.head.clone();
        view.precisions[self.max_coin] = self.base.get_virtual_price()?;
        Ok(view)
    }
}
