//! Property-based tests for the pool math.
//!
//! These tests verify invariants hold under random inputs.

use margin_pool::*;
use proptest::prelude::*;
use rust_decimal_macros::dec;

const E18: u128 = 1_000_000_000_000_000_000;
const DEPTH: u128 = 1_000_000 * E18;

// Strategies for generating test data
fn amount_strategy() -> impl Strategy<Value = u128> {
    (1u64..1_000_000u64).prop_map(|x| x as u128 * E18 / 1_000) // 0.001 to 1000 tokens
}

fn raw_strategy() -> impl Strategy<Value = u128> {
    1u128..(1u128 << 100)
}

fn elapsed_strategy() -> impl Strategy<Value = u64> {
    1u64..(30 * SECONDS_PER_DAY) // up to a month per step
}

fn spot_pool() -> MarginPool<ConstantProductPool> {
    let mut config = PoolConfig::default();
    config.params.twap_window_secs = 0;
    let venue = ConstantProductPool::at_parity(DEPTH, config.start_time);
    MarginPool::new(config, EngineConfig::default(), venue).unwrap()
}

fn books_gap(pool: &MarginPool<ConstantProductPool>, asset: Asset) -> u128 {
    let coeffs = pool.coefficients();
    let totals = pool.totals();
    let debt = coeffs.real_debt(asset, totals.debt(asset)).unwrap();
    let collateral = coeffs.real_collateral(asset, totals.collateral(asset)).unwrap();
    (pool.holdings(asset) + debt).abs_diff(collateral + pool.insurance().get(asset).balance)
}

proptest! {
    /// A ratio scaled back up never exceeds the numerator and loses at most one unit
    #[test]
    fn ratio_round_trip(
        num in raw_strategy(),
        den in 1u128..(1u128 << 90),
    ) {
        let ratio = Fp96::from_ratio(num, den).unwrap();
        let back = ratio.mul_amount(den).unwrap();
        prop_assert!(back <= num);
        prop_assert!(num - back <= 1);
    }

    /// Rounding up never lands below rounding down, and by at most one unit
    #[test]
    fn rounding_direction(
        amount in raw_strategy(),
        num in 1u128..1_000_000u128,
        den in 1u128..1_000_000u128,
    ) {
        let coeff = Fp96::from_ratio(num, den).unwrap();
        let down = coeff.mul_amount(amount).unwrap();
        let up = coeff.mul_amount_up(amount).unwrap();
        prop_assert!(up >= down && up - down <= 1);

        let down = coeff.div_amount(amount).unwrap();
        let up = coeff.div_amount_up(amount).unwrap();
        prop_assert!(up >= down && up - down <= 1);
    }

    /// Lenders always get back exactly what they put in when nobody borrows
    #[test]
    fn deposit_withdraw_conservation(
        deposits in proptest::collection::vec((0usize..4, amount_strategy(), any::<bool>()), 1..20),
    ) {
        let mut pool = spot_pool();
        let accounts = [AccountId(1), AccountId(2), AccountId(3), AccountId(4)];
        let mut minted = [[0u128; 2]; 4];

        for (who, amount, base) in deposits {
            let asset = if base { Asset::Base } else { Asset::Quote };
            pool.mint(accounts[who], asset, amount).unwrap();
            pool.deposit(accounts[who], asset, amount).unwrap();
            minted[who][base as usize] += amount;
        }
        for (i, account) in accounts.into_iter().enumerate() {
            for (slot, asset) in [(0, Asset::Quote), (1, Asset::Base)] {
                if minted[i][slot] > 0 {
                    pool.withdraw(account, asset, u128::MAX, false).unwrap();
                }
                prop_assert_eq!(pool.balance_of(account, asset), minted[i][slot]);
            }
            prop_assert_eq!(pool.position(account).kind, PositionType::Uninitialized);
        }
        prop_assert_eq!(pool.holdings(Asset::Base), 0);
        prop_assert_eq!(pool.holdings(Asset::Quote), 0);
    }

    /// Coefficients only grow while a borrower pays interest
    #[test]
    fn coefficients_monotonic(
        steps in proptest::collection::vec(elapsed_strategy(), 1..12),
        size in 1u128..150u128,
    ) {
        let mut pool = spot_pool();
        pool.mint(AccountId(1), Asset::Quote, 1_000 * E18).unwrap();
        pool.deposit_quote(AccountId(1), 1_000 * E18).unwrap();
        pool.mint(AccountId(2), Asset::Base, 100 * E18).unwrap();
        pool.deposit_base(AccountId(2), 100 * E18).unwrap();
        pool.long(AccountId(2), size * E18, Fp96::from_integer(2)).unwrap();

        let mut last = pool.coefficients();
        for secs in steps {
            pool.advance_time(secs);
            pool.reinit().unwrap();
            let now = pool.coefficients();
            prop_assert!(now.quote_debt >= last.quote_debt);
            prop_assert!(now.quote_collateral >= last.quote_collateral);
            prop_assert!(now.quote_debt >= now.quote_collateral);
            prop_assert_eq!(now.base_debt, Fp96::one());
            last = now;
        }
        prop_assert!(books_gap(&pool, Asset::Quote) <= 1_000);
    }

    /// An accepted long never sits above the ceiling; a rejected one leaves no trace
    #[test]
    fn long_respects_ceiling(
        margin in 1u128..50u128,
        size in 1u128..1_500u128,
    ) {
        let mut pool = spot_pool();
        pool.mint(AccountId(1), Asset::Quote, 2_000 * E18).unwrap();
        pool.deposit_quote(AccountId(1), 2_000 * E18).unwrap();
        pool.mint(AccountId(2), Asset::Base, margin * E18).unwrap();
        pool.deposit_base(AccountId(2), margin * E18).unwrap();
        let before = pool.snapshot();

        match pool.long(AccountId(2), size * E18, Fp96::from_integer(2)) {
            Ok(outcome) => {
                let trade = outcome.into_executed().unwrap();
                prop_assert!(!trade.leverage.exceeds(Fp96::from_integer(20)));
                prop_assert!(books_gap(&pool, Asset::Quote) <= 1_000);
                prop_assert!(books_gap(&pool, Asset::Base) <= 1_000);
            }
            Err(_) => {
                prop_assert_eq!(pool.snapshot(), before);
            }
        }
    }

    /// A higher price never makes a long riskier or a short safer
    #[test]
    fn leverage_moves_with_price(
        collateral in 2u128..1_000u128,
        debt_ratio in 1u32..95u32,
        bump in 1u32..50u32,
    ) {
        let debt = collateral * debt_ratio as u128 / 100;
        let long = RealPosition {
            kind: PositionType::Long,
            base_collateral: collateral * E18,
            base_debt: 0,
            quote_collateral: 0,
            quote_debt: debt * E18,
        };
        let low = Fp96::one();
        let high = Fp96::from_decimal(dec!(1) + rust_decimal::Decimal::new(bump as i64, 2)).unwrap();
        let at_low = risk::position_leverage(&long, low).unwrap();
        let at_high = risk::position_leverage(&long, high).unwrap();
        if let (Leverage::Finite(a), Leverage::Finite(b)) = (at_low, at_high) {
            prop_assert!(b <= a);
        }

        let short = RealPosition {
            kind: PositionType::Short,
            base_collateral: 0,
            base_debt: debt * E18,
            quote_collateral: collateral * E18,
            quote_debt: 0,
        };
        let at_low = risk::position_leverage(&short, low).unwrap();
        let at_high = risk::position_leverage(&short, high).unwrap();
        if let Leverage::Finite(a) = at_low {
            prop_assert!(at_high.exceeds(a) || at_high == Leverage::Finite(a));
        }
    }
}
