use thiserror::Error;

use crate::math::{FEE_DENOM, MAX_AMP};

/// This enum describes stableswap simulator errors
#[derive(Error, Debug, PartialEq)]
pub enum SimError {
    #[error("Coin index {index} is out of range for a pool with {n_coins} coins")]
    CoinIndexOutOfRange { index: usize, n_coins: usize },

    #[error("Source and target coins are the same")]
    SameCoins {},

    #[error("Event of zero transfer")]
    InvalidZeroAmount {},

    #[error("Wrong asset length: expected {expected}, actual {actual}")]
    WrongAssetLength { expected: usize, actual: usize },

    #[error("Invalid number of assets: a pool needs at least 2 coins, got {0}")]
    InvalidNumberOfAssets(usize),

    #[error(
        "Amp coefficient must be greater than 0 and less than or equal to {}",
        MAX_AMP
    )]
    IncorrectAmp {},

    #[error("Fee must not exceed the {} denominator", FEE_DENOM)]
    IncorrectFee {},

    #[error("Fee multiplier must be greater than or equal to {}", FEE_DENOM)]
    IncorrectFeeMultiplier {},

    #[error("All pool balances must be positive")]
    ZeroBalance {},

    #[error("Pool has no liquidity")]
    EmptyPool {},

    #[error("Insufficient amount of liquidity")]
    LiquidityAmountTooSmall {},

    #[error("The invariant calculation is not converging")]
    NotConverging {},

    #[error("Swap resulted in zero or negative output")]
    InsufficientOutput {},

    #[error("Optimization failed: {reason}")]
    OptimizationFailed { reason: String },
}
