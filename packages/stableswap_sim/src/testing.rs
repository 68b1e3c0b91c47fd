use num_bigint::BigInt;
use num_traits::Zero;
use proptest::collection::vec;
use proptest::prelude::*;

use crate::math::pow10;
use crate::pool::{Deposit, PlainPool, PlainPoolParams};
use crate::SimError;

fn pool_with(balances: Vec<BigInt>, amp: u64, fee: u64, fee_mul: Option<u64>) -> PlainPool {
    let n_coins = balances.len();
    PlainPool::new(PlainPoolParams {
        amp,
        deposit: Deposit::Balances(balances),
        n_coins,
        precisions: None,
        total_share: None,
        fee,
        fee_mul,
    })
    .unwrap()
}

fn units(amount: u128) -> BigInt {
    BigInt::from(amount) * pow10(18)
}

#[test]
fn rejects_a_single_coin_pool() {
    let err = PlainPool::new(PlainPoolParams {
        amp: 100,
        deposit: Deposit::Balances(vec![units(1)]),
        n_coins: 1,
        precisions: None,
        total_share: None,
        fee: 0,
        fee_mul: None,
    })
    .unwrap_err();
    assert_eq!(err, SimError::InvalidNumberOfAssets(1));
}

#[test]
fn rejects_a_zero_amp() {
    let err = PlainPool::new(PlainPoolParams {
        amp: 0,
        deposit: Deposit::Balances(vec![units(1), units(1)]),
        n_coins: 2,
        precisions: None,
        total_share: None,
        fee: 0,
        fee_mul: None,
    })
    .unwrap_err();
    assert_eq!(err, SimError::IncorrectAmp {});
}

#[test]
fn rejects_a_mismatched_balance_vector() {
    let err = PlainPool::new(PlainPoolParams {
        amp: 100,
        deposit: Deposit::Balances(vec![units(1), units(1)]),
        n_coins: 3,
        precisions: None,
        total_share: None,
        fee: 0,
        fee_mul: None,
    })
    .unwrap_err();
    assert_eq!(
        err,
        SimError::WrongAssetLength {
            expected: 3,
            actual: 2
        }
    );
}

#[test]
fn rejects_a_weak_fee_multiplier() {
    let err = PlainPool::new(PlainPoolParams {
        amp: 100,
        deposit: Deposit::Balances(vec![units(1), units(1)]),
        n_coins: 2,
        precisions: None,
        total_share: None,
        fee: 4_000_000,
        fee_mul: Some(5),
    })
    .unwrap_err();
    assert_eq!(err, SimError::IncorrectFeeMultiplier {});
}

#[test]
fn scalar_deposit_splits_evenly() {
    let pool = PlainPool::new(PlainPoolParams {
        amp: 100,
        deposit: Deposit::Total(units(3_000_000)),
        n_coins: 3,
        precisions: None,
        total_share: None,
        fee: 0,
        fee_mul: None,
    })
    .unwrap();
    assert_eq!(pool.balances(), &vec![units(1_000_000); 3][..]);
    assert_eq!(pool.total_share(), &units(3_000_000));
}

#[test]
fn trade_guards_fire() {
    let mut pool = pool_with(vec![units(1_000_000); 2], 100, 4_000_000, None);
    assert_eq!(
        pool.exchange(0, 0, &units(1)).unwrap_err(),
        SimError::SameCoins {}
    );
    assert_eq!(
        pool.exchange(0, 2, &units(1)).unwrap_err(),
        SimError::CoinIndexOutOfRange {
            index: 2,
            n_coins: 2
        }
    );
    assert_eq!(
        pool.exchange(0, 1, &BigInt::zero()).unwrap_err(),
        SimError::InvalidZeroAmount {}
    );
}

#[test]
fn dynamic_fee_matches_the_flat_fee_at_parity() {
    let pool = pool_with(
        vec![units(1_000_000); 2],
        100,
        4_000_000,
        Some(20_000_000_000),
    );
    let xp = pool.xp();
    assert_eq!(pool.dynamic_fee(&xp[0], &xp[1]), BigInt::from(4_000_000u64));
}

#[test]
fn dynamic_fee_grows_with_imbalance() {
    let pool = pool_with(
        vec![units(1_900_000), units(100_000)],
        100,
        4_000_000,
        Some(20_000_000_000),
    );
    let xp = pool.xp();
    let skewed = pool.dynamic_fee(&xp[0], &xp[1]);
    assert!(skewed > BigInt::from(4_000_000u64));
}

#[test]
fn one_coin_withdrawal_raises_the_virtual_price() {
    let mut pool = pool_with(vec![units(1_000_000); 3], 2000, 4_000_000, None);
    let before = pool.get_virtual_price().unwrap();
    let dy = pool
        .remove_liquidity_one_coin(&units(10_000), 1)
        .unwrap();
    assert!(dy > BigInt::zero());
    assert!(pool.get_virtual_price().unwrap() >= before);
}

#[test]
fn imbalanced_withdrawal_burns_more_than_its_balanced_share() {
    let mut pool = pool_with(vec![units(1_000_000); 3], 2000, 4_000_000, None);
    let share_before = pool.total_share().clone();
    let burn = pool
        .remove_liquidity_imbalance(&[units(30_000), BigInt::zero(), BigInt::zero()])
        .unwrap();
    // a balanced withdrawal of the same value would burn ~10_000 per slot
    assert!(burn > units(30_000));
    assert!(burn < units(30_100));
    // supply is the caller's to burn
    assert_eq!(pool.total_share(), &share_before);
}

proptest! {
    #[test]
    fn exchange_never_lowers_the_virtual_price(
        (balances, amp, dx) in (2usize..=4)
            .prop_flat_map(|n| {
                (
                    vec(1_000u128..50_000_000u128, n),
                    10u64..100_000,
                    1u128..1_000,
                )
            })
    ) {
        let balances: Vec<BigInt> = balances.into_iter().map(units).collect();
        let mut pool = pool_with(balances, amp, 4_000_000, None);
        let before = pool.get_virtual_price().unwrap();
        pool.exchange(0, 1, &(BigInt::from(dx) * pow10(15))).unwrap();
        prop_assert!(pool.get_virtual_price().unwrap() >= before);
    }

    #[test]
    fn quotes_match_execution(
        (balances, amp, dx) in (2usize..=4)
            .prop_flat_map(|n| {
                (
                    vec(1_000u128..50_000_000u128, n),
                    10u64..100_000,
                    1u128..1_000,
                )
            })
    ) {
        let balances: Vec<BigInt> = balances.into_iter().map(units).collect();
        let mut pool = pool_with(balances, amp, 4_000_000, None);
        let dx = BigInt::from(dx) * pow10(15);
        let quote = pool.dy(0, 1, &dx).unwrap();
        prop_assert!(quote > BigInt::zero());
        let (dy, _) = pool.exchange(0, 1, &dx).unwrap();
        prop_assert_eq!(quote, dy);
    }

    #[test]
    fn deposit_previews_match_deposits(
        (balances, amounts, amp) in (2usize..=4)
            .prop_flat_map(|n| {
                (
                    vec(1_000u128..50_000_000u128, n),
                    vec(0u128..1_000_000u128, n),
                    10u64..100_000,
                )
            })
    ) {
        let balances: Vec<BigInt> = balances.into_iter().map(units).collect();
        let amounts: Vec<BigInt> = amounts.into_iter().map(units).collect();
        let mut pool = pool_with(balances, amp, 4_000_000, None);
        let preview = pool.calc_token_amount(&amounts).unwrap();
        let minted = pool.add_liquidity(&amounts).unwrap();
        prop_assert_eq!(preview, minted);
    }

    #[test]
    fn the_invariant_ignores_coin_order(
        (balances, amp) in (2usize..=4)
            .prop_flat_map(|n| (vec(1_000u128..50_000_000u128, n), 10u64..100_000))
    ) {
        let balances: Vec<BigInt> = balances.into_iter().map(units).collect();
        let pool = pool_with(balances.clone(), amp, 0, None);
        let mut reversed = balances;
        reversed.reverse();
        let mirrored = pool_with(reversed, amp, 0, None);
        prop_assert_eq!(pool.d().unwrap(), mirrored.d().unwrap());
    }

    #[test]
    fn the_invariant_grows_with_any_balance(
        (balances, amp, top_up) in (2usize..=4)
            .prop_flat_map(|n| {
                (
                    vec(1_000u128..50_000_000u128, n),
                    10u64..100_000,
                    1u128..1_000_000,
                )
            })
    ) {
        let balances: Vec<BigInt> = balances.into_iter().map(units).collect();
        let pool = pool_with(balances.clone(), amp, 0, None);
        let mut topped = balances;
        topped[0] += units(top_up);
        let richer = pool_with(topped, amp, 0, None);
        prop_assert!(richer.d().unwrap() > pool.d().unwrap());
    }
}
