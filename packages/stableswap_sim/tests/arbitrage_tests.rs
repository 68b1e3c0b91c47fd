use num_bigint::BigInt;
use num_traits::Zero;

use stableswap_sim::math::pow10;
use stableswap_sim::{
    Deposit, MetaPool, MetaPoolParams, PlainPool, PlainPoolParams, Pool, SimError, Trade,
};

fn units(amount: u128) -> BigInt {
    BigInt::from(amount) * pow10(18)
}

fn two_pool() -> Pool {
    Pool::from(
        PlainPool::new(PlainPoolParams {
            amp: 100,
            deposit: Deposit::Balances(vec![units(1_000_000), units(1_000_000)]),
            n_coins: 2,
            precisions: None,
            total_share: None,
            fee: 4_000_000,
            fee_mul: None,
        })
        .unwrap(),
    )
}

fn three_pool() -> Pool {
    Pool::from(
        PlainPool::new(PlainPoolParams {
            amp: 2000,
            deposit: Deposit::Balances(vec![units(1_000_000); 3]),
            n_coins: 3,
            precisions: None,
            total_share: None,
            fee: 4_000_000,
            fee_mul: None,
        })
        .unwrap(),
    )
}

fn meta_pool() -> Pool {
    Pool::from(
        MetaPool::new(MetaPoolParams {
            amp: 2000,
            base_amp: 2000,
            deposit: Deposit::Balances(vec![units(1_000_000), units(1_000_000)]),
            base_deposit: Deposit::Balances(vec![units(1_000_000); 3]),
            n_coins: 2,
            base_n_coins: 3,
            precisions: None,
            base_precisions: None,
            base_total_share: None,
            fee: 4_000_000,
            base_fee: None,
            fee_mul: None,
            redemption_price: None,
        })
        .unwrap(),
    )
}

#[test]
fn optarb_hits_the_target_price() {
    let mut pool = two_pool();
    let target = pool.dydxfee(0, 1).unwrap() * 0.999;

    let (trade, error, diagnostics) = pool.optarb(0, 1, target).unwrap();

    assert!(diagnostics.converged);
    assert!(trade.dx > BigInt::from(1_000_000_000_000u64));
    assert!(error.abs() < 1e-8);

    // replaying the trade lands the live price on the target
    pool.exchange(0, 1, &trade.dx).unwrap();
    assert!((pool.dydxfee(0, 1).unwrap() - target).abs() < 1e-8);
}

#[test]
fn optarb_leaves_the_pool_untouched() {
    let mut pool = three_pool();
    let pristine = pool.clone();
    let target = pool.dydxfee(1, 2).unwrap() * 0.9995;

    pool.optarb(1, 2, target).unwrap();

    assert_eq!(pool, pristine);
}

#[test]
fn optarb_rejects_an_unreachable_price() {
    let mut pool = two_pool();
    // above the current price there is nothing to arbitrage
    let target = pool.dydxfee(0, 1).unwrap() * 1.01;
    let err = pool.optarb(0, 1, target).unwrap_err();
    assert!(matches!(err, SimError::OptimizationFailed { .. }));
}

#[test]
fn optarb_works_across_the_meta_routing() {
    let mut pool = meta_pool();
    let target = pool.dydxfee(0, 1).unwrap() * 0.999;

    let (trade, error, _) = pool.optarb(0, 1, target).unwrap();

    assert!(trade.dx > BigInt::zero());
    assert!(error.abs() < 1e-6);
}

#[test]
fn optarbs_stands_down_at_market_prices() {
    let mut pool = three_pool();
    let prices = vec![
        pool.dydxfee(0, 1).unwrap(),
        pool.dydxfee(0, 2).unwrap(),
        pool.dydxfee(1, 2).unwrap(),
    ];
    let limits = vec![1_000_000.0; 3];

    let (trades, errors, _) = pool.optarbs(&prices, &limits).unwrap();

    assert!(trades.is_empty());
    for error in errors {
        assert!(error.abs() < 1e-3);
    }
}

#[test]
fn optarbs_chases_a_perturbed_price() {
    let mut pool = two_pool();
    let spot = pool.dydxfee(0, 1).unwrap();
    let target = spot * 0.999;

    let (trades, errors, diagnostics) = pool.optarbs(&[target], &[1_000_000.0]).unwrap();

    assert_eq!(trades.len(), 1);
    assert_eq!((trades[0].i, trades[0].j), (0, 1));
    assert!(trades[0].dx > BigInt::zero());
    assert!(errors[0].abs() < 1e-6);
    assert!(diagnostics.is_some());
}

#[test]
fn optarbs_validates_the_price_vector_shape() {
    let mut pool = three_pool();
    let err = pool.optarbs(&[1.0], &[1.0]).unwrap_err();
    assert_eq!(
        err,
        SimError::WrongAssetLength {
            expected: 3,
            actual: 1
        }
    );
}

#[test]
fn price_depth_is_symmetric_in_a_balanced_pool() {
    let pool = three_pool();
    let depth = pool.pricedepth(0.001).unwrap();

    assert_eq!(depth.len(), 6);
    let max = depth.iter().cloned().fold(f64::MIN, f64::max);
    let min = depth.iter().cloned().fold(f64::MAX, f64::min);
    assert!(min > 0.0);
    assert!((max - min) / min < 1e-2);
}

#[test]
fn price_depth_views_the_metapool_against_its_lp_token() {
    let pool = meta_pool();
    let depth = pool.pricedepth(0.001).unwrap();
    // one pair, both directions
    assert_eq!(depth.len(), 2);
    assert!(depth.iter().all(|share| *share > 0.0));
}

#[test]
fn dotrades_executes_in_order_and_totals_the_volume() {
    let mut pool = three_pool();
    let trades = vec![
        Trade {
            i: 0,
            j: 1,
            dx: units(1_000),
        },
        Trade {
            i: 1,
            j: 2,
            dx: units(500),
        },
    ];

    let (done, volume) = pool.dotrades(&trades).unwrap();

    assert_eq!(done.len(), 2);
    assert!(done.iter().all(|trade| trade.dy > BigInt::zero()));
    assert_eq!(volume, units(1_500));
}

#[test]
fn dotrades_only_counts_meta_volume() {
    let mut pool = meta_pool();
    let trades = vec![
        // base to base, invisible to the meta volume
        Trade {
            i: 1,
            j: 2,
            dx: units(1_000),
        },
        // touches the primary meta coin
        Trade {
            i: 0,
            j: 2,
            dx: units(700),
        },
    ];

    let (done, volume) = pool.dotrades(&trades).unwrap();

    assert_eq!(done.len(), 2);
    assert_eq!(volume, units(700));
}

#[test]
fn speculative_probes_do_not_leak_into_quotes() {
    // an optarbs sweep must not move the quoted prices it started from
    let mut pool = meta_pool();
    let before = pool.dydxfee(0, 2).unwrap();
    let prices = vec![
        pool.dydxfee(0, 1).unwrap(),
        pool.dydxfee(0, 2).unwrap(),
        pool.dydxfee(0, 3).unwrap(),
        pool.dydxfee(1, 2).unwrap(),
        pool.dydxfee(1, 3).unwrap(),
        pool.dydxfee(2, 3).unwrap(),
    ];
    let limits = vec![1_000_000.0; 6];

    pool.optarbs(&prices, &limits).unwrap();

    let after = pool.dydxfee(0, 2).unwrap();
    assert_eq!(before, after);
}
