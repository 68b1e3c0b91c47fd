//! Pool state and the operation surface shared by both pool kinds.

mod meta;
mod plain;

pub use meta::{MetaPool, MetaPoolParams};
pub use plain::{Deposit, PlainPool, PlainPoolParams};

use num_bigint::BigInt;

use crate::error::SimError;

/// A pool under simulation. The arbitrage layer works against this type so
/// plain and meta pools are interchangeable there; everything dispatches
/// to the wrapped state.
#[derive(Debug, Clone, PartialEq)]
pub enum Pool {
    Plain(PlainPool),
    Meta(MetaPool),
}

impl From<PlainPool> for Pool {
    fn from(pool: PlainPool) -> Self {
        Pool::Plain(pool)
    }
}

impl From<MetaPool> for Pool {
    fn from(pool: MetaPool) -> Self {
        Pool::Meta(pool)
    }
}

/// By-value state capture for speculative trades. Swapping never touches
/// the meta share supply, so only balances and the base supply are kept.
#[derive(Debug, Clone)]
pub(crate) struct PoolSnapshot {
    balances: Vec<BigInt>,
    base: Option<(Vec<BigInt>, BigInt)>,
}

impl Pool {
    /// Number of externally tradable coins.
    pub fn n_total(&self) -> usize {
        match self {
            Pool::Plain(pool) => pool.n_coins(),
            Pool::Meta(pool) => pool.n_total(),
        }
    }

    /// Top-level balances on the 10^18 axis.
    pub fn xp(&self) -> Vec<BigInt> {
        match self {
            Pool::Plain(pool) => pool.xp(),
            Pool::Meta(pool) => pool.xp(),
        }
    }

    pub fn d(&self) -> Result<BigInt, SimError> {
        match self {
            Pool::Plain(pool) => pool.d(),
            Pool::Meta(pool) => pool.d(),
        }
    }

    pub fn get_virtual_price(&self) -> Result<BigInt, SimError> {
        match self {
            Pool::Plain(pool) => pool.get_virtual_price(),
            Pool::Meta(pool) => pool.get_virtual_price(),
        }
    }

    pub fn dy(&self, i: usize, j: usize, dx: &BigInt) -> Result<BigInt, SimError> {
        match self {
            Pool::Plain(pool) => pool.dy(i, j, dx),
            Pool::Meta(pool) => pool.dy(i, j, dx),
        }
    }

    pub fn exchange(&mut self, i: usize, j: usize, dx: &BigInt) -> Result<(BigInt, BigInt), SimError> {
        match self {
            Pool::Plain(pool) => pool.exchange(i, j, dx),
            Pool::Meta(pool) => pool.exchange(i, j, dx),
        }
    }

    pub fn add_liquidity(&mut self, amounts: &[BigInt]) -> Result<BigInt, SimError> {
        match self {
            Pool::Plain(pool) => pool.add_liquidity(amounts),
            Pool::Meta(pool) => pool.add_liquidity(amounts),
        }
    }

    pub fn calc_token_amount(&self, amounts: &[BigInt]) -> Result<BigInt, SimError> {
        match self {
            Pool::Plain(pool) => pool.calc_token_amount(amounts),
            Pool::Meta(pool) => pool.calc_token_amount(amounts),
        }
    }

    pub fn remove_liquidity_imbalance(&mut self, amounts: &[BigInt]) -> Result<BigInt, SimError> {
        match self {
            Pool::Plain(pool) => pool.remove_liquidity_imbalance(amounts),
            Pool::Meta(pool) => pool.remove_liquidity_imbalance(amounts),
        }
    }

    pub fn remove_liquidity_one_coin(&mut self, token_amount: &BigInt, i: usize) -> Result<BigInt, SimError> {
        match self {
            Pool::Plain(pool) => pool.remove_liquidity_one_coin(token_amount, i),
            Pool::Meta(pool) => pool.remove_liquidity_one_coin(token_amount, i),
        }
    }

    pub fn calc_withdraw_one_coin(
        &self,
        token_amount: &BigInt,
        i: usize,
        apply_fee: bool,
    ) -> Result<BigInt, SimError> {
        match self {
            Pool::Plain(pool) => pool.calc_withdraw_one_coin(token_amount, i, apply_fee),
            Pool::Meta(pool) => pool.calc_withdraw_one_coin(token_amount, i, apply_fee),
        }
    }

    pub fn dydx(&self, i: usize, j: usize, use_fee: bool) -> Result<f64, SimError> {
        match self {
            Pool::Plain(pool) => pool.dydx(i, j, use_fee),
            Pool::Meta(pool) => pool.dydx(i, j, use_fee),
        }
    }

    pub fn dydxfee(&self, i: usize, j: usize) -> Result<f64, SimError> {
        self.dydx(i, j, true)
    }

    pub(crate) fn snapshot(&self) -> PoolSnapshot {
        match self {
            Pool::Plain(pool) => PoolSnapshot {
                balances: pool.balances.clone(),
                base: None,
            },
            Pool::Meta(pool) => PoolSnapshot {
                balances: pool.head.balances.clone(),
                base: Some((pool.base.balances.clone(), pool.base.total_share.clone())),
            },
        }
    }

    pub(crate) fn restore(&mut self, snapshot: &PoolSnapshot) {
        match self {
            Pool::Plain(pool) => {
                pool.balances = snapshot.balances.clone();
            }
            Pool::Meta(pool) => {
                pool.head.balances = snapshot.balances.clone();
                if let Some((base_balances, base_share)) = &snapshot.base {
                    pool.base.balances = base_balances.clone();
                    pool.base.total_share = base_share.clone();
                }
            }
        }
    }
}
