use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};

use crate::error::SimError;

/// The maximum number of iterations for the invariant fixed-point loops.
const ITERATIONS: usize = 255;

/// Maximum allowed amplification coefficient (already scaled by `n^(n-1)`).
pub const MAX_AMP: u64 = 1_000_000;

/// Fee denominator. All fee rates are fixed-point over this scale.
pub const FEE_DENOM: u64 = 10_000_000_000;

/// Exponent of the common scale balances are normalized to before entering
/// the solvers.
pub const PRECISION_EXP: u32 = 18;

/// Probe size used by marginal price estimation and as the minimum
/// arbitrage trade.
pub(crate) const PRICE_PROBE: u64 = 1_000_000_000_000;

pub fn pow10(exp: u32) -> BigInt {
    BigInt::from(10u8).pow(exp)
}

pub(crate) fn precision() -> BigInt {
    pow10(PRECISION_EXP)
}

pub(crate) fn fee_denom() -> BigInt {
    BigInt::from(FEE_DENOM)
}

/// Iteratively solves the invariant
///
/// `A * sum(x_i) * n**n + D = A * D * n**n + D**(n+1) / (n**n * prod(x_i))`
///
/// over the virtual balances `xp`. `amp` carries the `A * n**(n-1)`
/// convention, so `Ann = amp * n`. Every product stays in `BigInt`; the
/// `D_P * D` intermediates overflow any fixed-width integer for wide
/// precision spreads.
pub fn compute_d(amp: u64, xp: &[BigInt]) -> Result<BigInt, SimError> {
    let s: BigInt = xp.iter().sum();
    if s.is_zero() {
        return Ok(BigInt::zero());
    }
    if xp.iter().any(|x| !x.is_positive()) {
        return Err(SimError::ZeroBalance {});
    }

    let n_coins = BigInt::from(xp.len());
    let ann = BigInt::from(amp) * &n_coins;
    let mut d = s.clone();
    for _ in 0..ITERATIONS {
        let mut d_p = d.clone();
        for x in xp {
            d_p = d_p * &d / (x * &n_coins);
        }
        let d_prev = d.clone();
        d = (&ann * &s + &d_p * &n_coins) * &d
            / ((&ann - 1) * &d + (&n_coins + 1) * &d_p);
        if (&d - &d_prev).abs() <= BigInt::one() {
            return Ok(d);
        }
    }

    Err(SimError::NotConverging {})
}

/// Calculates the new balance of coin `j` when coin `i` moves to `new_x`,
/// solving the per-coin quadratic
///
/// `y**2 + y * (sum' + D/Ann - D) = D**(n+1) / (n**(2n) * prod' * A)`
///
/// iteratively. `D` is taken from the current `xp`; the invariant is held
/// constant across the substitution. `b` is negative in the normal regime,
/// which the signed representation absorbs directly.
pub fn compute_y(
    amp: u64,
    i: usize,
    j: usize,
    new_x: &BigInt,
    xp: &[BigInt],
) -> Result<BigInt, SimError> {
    let n_coins = BigInt::from(xp.len());
    let ann = BigInt::from(amp) * &n_coins;
    let d = compute_d(amp, xp)?;

    let mut s = BigInt::zero();
    let mut c = d.clone();
    for (k, x_k) in xp.iter().enumerate() {
        if k == j {
            continue;
        }
        let x_k = if k == i { new_x } else { x_k };
        if !x_k.is_positive() {
            return Err(SimError::ZeroBalance {});
        }
        s += x_k;
        c = c * &d / (x_k * &n_coins);
    }
    c = c * &d / (&n_coins * &ann);
    let b = s + &d / &ann - &d;

    let mut y = d;
    for _ in 0..ITERATIONS {
        let y_prev = y.clone();
        y = (y.pow(2) + &c) / (2 * &y + &b);
        if (&y - &y_prev).abs() <= BigInt::one() {
            return Ok(y);
        }
    }

    Err(SimError::NotConverging {})
}

/// Same shape as [`compute_y`] but against a supplied target invariant,
/// with coin `i` removed from the reduced sum and product. Used when
/// withdrawing down to a smaller `D`.
pub fn compute_y_d(
    amp: u64,
    i: usize,
    d: &BigInt,
    xp: &[BigInt],
) -> Result<BigInt, SimError> {
    let n_coins = BigInt::from(xp.len());
    let ann = BigInt::from(amp) * &n_coins;

    let mut s = BigInt::zero();
    let mut c = d.clone();
    for (k, x_k) in xp.iter().enumerate() {
        if k == i {
            continue;
        }
        if !x_k.is_positive() {
            return Err(SimError::ZeroBalance {});
        }
        s += x_k;
        c = c * d / (x_k * &n_coins);
    }
    c = c * d / (&n_coins * &ann);
    let b = s + d / &ann;

    let mut y = d.clone();
    for _ in 0..ITERATIONS {
        let y_prev = y.clone();
        y = (y.pow(2) + &c) / (2 * &y + &b - d);
        if (&y - &y_prev).abs() <= BigInt::one() {
            return Ok(y);
        }
    }

    Err(SimError::NotConverging {})
}

/// Converts `num / den` to `f64` through an exact big rational, so the
/// float rounding happens exactly once.
pub(crate) fn ratio_to_f64(num: BigInt, den: BigInt) -> Result<f64, SimError> {
    if den.is_zero() {
        return Err(SimError::ZeroBalance {});
    }
    BigRational::new(num, den)
        .to_f64()
        .ok_or(SimError::NotConverging {})
}

/// Lossy conversion that saturates to the signed infinity instead of
/// failing on magnitudes beyond `f64` range.
pub(crate) fn big_to_f64(value: &BigInt) -> f64 {
    value.to_f64().unwrap_or(if value.is_negative() {
        f64::NEG_INFINITY
    } else {
        f64::INFINITY
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coins(balance: u128, n: usize) -> Vec<BigInt> {
        vec![BigInt::from(balance); n]
    }

    #[test]
    fn d_of_balanced_pool_is_the_sum() {
        for n in 2..=4 {
            let xp = coins(1_000_000_000_000_000_000_000_000, n);
            let d = compute_d(2000, &xp).unwrap();
            assert_eq!(d, xp.iter().sum::<BigInt>());
        }
    }

    #[test]
    fn d_is_symmetric_in_the_balances() {
        let xp = vec![
            BigInt::from(295_949_605_740_077_243_186_725_223u128),
            BigInt::from(284_320_067_518_878u128) * pow10(12),
            BigInt::from(288_200_854_907_854u128) * pow10(12),
        ];
        let d = compute_d(2000, &xp).unwrap();
        let mut rotated = xp.clone();
        rotated.rotate_left(1);
        assert_eq!(d, compute_d(2000, &rotated).unwrap());
        let mut swapped = xp;
        swapped.swap(0, 2);
        assert_eq!(d, compute_d(2000, &swapped).unwrap());
    }

    #[test]
    fn d_of_empty_pool_is_zero() {
        assert_eq!(compute_d(2000, &coins(0, 3)).unwrap(), BigInt::zero());
    }

    #[test]
    fn y_recovers_the_current_balance() {
        let xp = coins(1_000_000_000_000_000_000_000_000, 3);
        let y = compute_y(2000, 0, 1, &xp[0], &xp).unwrap();
        // holding x[0] fixed must leave x[1] in place, modulo a unit of
        // iteration slack
        assert!((y - &xp[1]).abs() <= BigInt::one());
    }

    #[test]
    fn y_d_tracks_a_shrinking_invariant() {
        let xp = coins(1_000_000_000_000_000_000_000_000, 3);
        let d = compute_d(2000, &xp).unwrap();
        let smaller = &d - &d / 100;
        let y = compute_y_d(2000, 0, &smaller, &xp).unwrap();
        assert!(y < xp[0]);
        assert!(y.is_positive());
    }

    #[test]
    fn ratio_conversion_is_exact_at_the_boundary() {
        let num = pow10(30) * 3;
        let den = pow10(30) * 2;
        assert_eq!(ratio_to_f64(num, den).unwrap(), 1.5);
    }
}
