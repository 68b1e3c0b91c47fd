use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

use stableswap_sim::math::{compute_d, pow10};
use stableswap_sim::{Deposit, PlainPool, PlainPoolParams};

fn units(amount: u128) -> BigInt {
    BigInt::from(amount) * pow10(18)
}

fn tripool_snapshot() -> PlainPool {
    // mainnet 3pool snapshot: 18-decimal coin plus two 6-decimal coins
    PlainPool::new(PlainPoolParams {
        amp: 2000,
        deposit: Deposit::Balances(vec![
            BigInt::from(295_949_605_740_077_243_186_725_223u128),
            BigInt::from(284_320_067_518_878u128),
            BigInt::from(288_200_854_907_854u128),
        ]),
        n_coins: 3,
        precisions: Some(vec![pow10(18), pow10(30), pow10(30)]),
        total_share: Some(BigInt::from(849_743_149_250_065_202_008_212_976u128)),
        fee: 4_000_000,
        fee_mul: None,
    })
    .unwrap()
}

#[test]
fn virtual_price_matches_the_mainnet_snapshot() {
    let pool = tripool_snapshot();
    assert_eq!(
        pool.get_virtual_price().unwrap(),
        BigInt::from(1_022_038_799_187_029_697u128)
    );
}

#[test]
fn the_invariant_is_independent_of_the_precision_layout() {
    // the same virtual balances expressed natively and pre-scaled
    let native = tripool_snapshot();
    let prescaled = PlainPool::new(PlainPoolParams {
        amp: 2000,
        deposit: Deposit::Balances(vec![
            BigInt::from(295_949_605_740_077_243_186_725_223u128),
            BigInt::from(284_320_067_518_878u128) * pow10(12),
            BigInt::from(288_200_854_907_854u128) * pow10(12),
        ]),
        n_coins: 3,
        precisions: None,
        total_share: Some(BigInt::from(849_743_149_250_065_202_008_212_976u128)),
        fee: 4_000_000,
        fee_mul: None,
    })
    .unwrap();

    let d = native.d().unwrap();
    assert_eq!(d, prescaled.d().unwrap());
    assert_eq!(d, compute_d(2000, &native.xp()).unwrap());
    // permuting the balances leaves the invariant alone
    let mut xp = native.xp();
    xp.swap(0, 2);
    assert_eq!(d, compute_d(2000, &xp).unwrap());
}

#[test]
fn exchange_charges_the_configured_fee() {
    let mut pool = PlainPool::new(PlainPoolParams {
        amp: 100,
        deposit: Deposit::Balances(vec![units(1_000_000), units(1_000_000)]),
        n_coins: 2,
        precisions: None,
        total_share: None,
        fee: 4_000_000,
        fee_mul: None,
    })
    .unwrap();

    let dx = units(1_000);
    let (dy, fee) = pool.exchange(0, 1, &dx).unwrap();

    assert!(dy > BigInt::zero());
    assert!(dy < dx);
    let dy_raw = &dy + &fee;
    assert_eq!(fee, &dy_raw * 4_000_000u64 / pow10(10));
}

#[test]
fn a_feeless_round_trip_returns_the_balances() {
    let mut pool = PlainPool::new(PlainPoolParams {
        amp: 100,
        deposit: Deposit::Balances(vec![units(1_000_000), units(1_000_000)]),
        n_coins: 2,
        precisions: None,
        total_share: None,
        fee: 0,
        fee_mul: None,
    })
    .unwrap();
    let x0 = pool.balances().to_vec();
    let d0 = pool.d().unwrap();

    let dx = units(1_000);
    let (dy, fee) = pool.exchange(0, 1, &dx).unwrap();
    assert_eq!(fee, BigInt::zero());
    pool.exchange(1, 0, &dy).unwrap();

    // only iteration slack may remain
    for (before, after) in x0.iter().zip(pool.balances()) {
        assert!((before - after).abs() <= BigInt::from(10u8));
    }
    assert!((d0 - pool.d().unwrap()).abs() <= BigInt::from(10u8));
}

#[test]
fn the_closed_form_price_matches_the_finite_difference() {
    let pool = PlainPool::new(PlainPoolParams {
        amp: 2000,
        deposit: Deposit::Balances(vec![units(1_000_000), units(1_300_000), units(700_000)]),
        n_coins: 3,
        precisions: None,
        total_share: None,
        fee: 0,
        fee_mul: None,
    })
    .unwrap();

    for (i, j) in [(0usize, 1usize), (1, 2), (2, 0)] {
        let analytic = pool.dydx(i, j, false).unwrap();
        let dx = pow10(12);
        let dy = pool.dy(i, j, &dx).unwrap();
        let numeric = dy.to_f64().unwrap() / 1e12;
        assert!(
            (analytic - numeric).abs() / numeric < 1e-9,
            "pair ({i},{j}): {analytic} vs {numeric}"
        );
    }
}

#[test]
fn prices_respond_to_imbalance() {
    let pool = PlainPool::new(PlainPoolParams {
        amp: 2000,
        deposit: Deposit::Balances(vec![units(800_000), units(1_200_000)]),
        n_coins: 2,
        precisions: None,
        total_share: None,
        fee: 0,
        fee_mul: None,
    })
    .unwrap();
    // the scarce coin is the expensive one
    assert!(pool.dydx(1, 0, false).unwrap() < 1.0);
    assert!(pool.dydx(0, 1, false).unwrap() > 1.0);
}

#[test]
fn single_coin_withdrawal_quotes_and_executes_identically() {
    let mut pool = PlainPool::new(PlainPoolParams {
        amp: 2000,
        deposit: Deposit::Balances(vec![units(1_000_000); 3]),
        n_coins: 3,
        precisions: None,
        total_share: None,
        fee: 4_000_000,
        fee_mul: None,
    })
    .unwrap();

    let amount = units(25_000);
    let quoted = pool.calc_withdraw_one_coin(&amount, 2, true).unwrap();
    let share_before = pool.total_share().clone();
    let received = pool.remove_liquidity_one_coin(&amount, 2).unwrap();

    assert_eq!(quoted, received);
    assert_eq!(pool.total_share(), &(share_before - &amount));
    // the no-fee quote is strictly better
    assert!(pool.calc_withdraw_one_coin(&amount, 2, false).unwrap() > received);
}

#[test]
fn deposits_and_withdrawals_respect_the_share_math() {
    let mut pool = PlainPool::new(PlainPoolParams {
        amp: 2000,
        deposit: Deposit::Balances(vec![units(1_000_000); 3]),
        n_coins: 3,
        precisions: None,
        total_share: None,
        fee: 4_000_000,
        fee_mul: None,
    })
    .unwrap();
    let vp_before = pool.get_virtual_price().unwrap();

    // a balanced deposit mints pro rata and keeps the virtual price
    let minted = pool
        .add_liquidity(&[units(10_000), units(10_000), units(10_000)])
        .unwrap();
    assert_eq!(minted, units(30_000));
    assert_eq!(pool.get_virtual_price().unwrap(), vp_before);

    // a lopsided deposit pays the imbalance fee
    let lopsided = pool
        .add_liquidity(&[units(30_000), BigInt::zero(), BigInt::zero()])
        .unwrap();
    assert!(lopsided < units(30_000));
    assert!(pool.get_virtual_price().unwrap() >= vp_before);
}
