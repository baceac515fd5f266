//! Emergency shutdown tests.
//!
//! A pool may only shut down when reinit cannot settle a side. The side that
//! failed decides the mode, and from then on only pro rata withdrawals of the
//! surviving token are possible.

use margin_pool::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const E18: u128 = 1_000_000_000_000_000_000;
const DEPTH: u128 = 1_000_000 * E18;

const LENDER: AccountId = AccountId(1);
const FIRST: AccountId = AccountId(2);
const SECOND: AccountId = AccountId(3);
const LATE_LENDER: AccountId = AccountId(4);
const HEDGER: AccountId = AccountId(5);
const BACKER: AccountId = AccountId(6);

fn spot_pool() -> MarginPool<ConstantProductPool> {
    let mut config = PoolConfig::default();
    config.params.twap_window_secs = 0;
    let venue = ConstantProductPool::at_parity(DEPTH, config.start_time);
    MarginPool::new(config, EngineConfig::default(), venue).unwrap()
}

fn fund(pool: &mut MarginPool<ConstantProductPool>, account: AccountId, asset: Asset, amount: u128) {
    pool.mint(account, asset, amount).unwrap();
    pool.deposit(account, asset, amount).unwrap();
}

fn set_price(pool: &mut MarginPool<ConstantProductPool>, price: Decimal) {
    let now = pool.time();
    pool.venue_mut().set_price(now, Fp96::from_decimal(price).unwrap()).unwrap();
}

// 100 base lent, two shorts of 50 and 45 base, then base triples
fn underwater_shorts() -> MarginPool<ConstantProductPool> {
    let mut pool = spot_pool();
    fund(&mut pool, LENDER, Asset::Base, 100 * E18);
    fund(&mut pool, FIRST, Asset::Quote, 60 * E18);
    pool.short(FIRST, 50 * E18, Fp96::zero()).unwrap();
    fund(&mut pool, SECOND, Asset::Quote, 39 * E18);
    pool.short(SECOND, 45 * E18, Fp96::zero()).unwrap();

    set_price(&mut pool, dec!(3));
    pool.advance_time(SECONDS_PER_DAY);
    pool
}

// 100 quote lent, two longs of 50 and 45 base, then base falls to 0.3
fn underwater_longs() -> MarginPool<ConstantProductPool> {
    let mut pool = spot_pool();
    fund(&mut pool, LENDER, Asset::Quote, 100 * E18);
    fund(&mut pool, FIRST, Asset::Base, 60 * E18);
    pool.long(FIRST, 50 * E18, Fp96::from_integer(2)).unwrap();
    fund(&mut pool, SECOND, Asset::Base, 36 * E18);
    pool.long(SECOND, 45 * E18, Fp96::from_integer(2)).unwrap();

    set_price(&mut pool, dec!(0.3));
    pool.advance_time(20 * SECONDS_PER_DAY);
    pool
}

#[test]
fn healthy_pool_cannot_shut_down() {
    let mut pool = spot_pool();
    fund(&mut pool, LENDER, Asset::Base, 100 * E18);
    fund(&mut pool, FIRST, Asset::Quote, 60 * E18);
    pool.short(FIRST, 50 * E18, Fp96::zero()).unwrap();
    let before = pool.snapshot();

    let err = pool.shut_down().unwrap_err();

    assert_eq!(err, PoolError::NotEligibleForShutdown);
    assert_eq!(err.code(), "NE");
    assert_eq!(pool.mode(), PoolMode::Regular);
    assert_eq!(pool.snapshot(), before);
}

#[test]
fn emergency_withdraw_needs_emergency() {
    let mut pool = spot_pool();
    fund(&mut pool, LENDER, Asset::Base, E18);
    let err = pool.emergency_withdraw(LENDER, false).unwrap_err();
    assert_eq!(err, PoolError::NotInEmergency);
    assert_eq!(err.code(), "NEM");
}

#[test]
fn underwater_shorts_fail_reinit_on_base() {
    let mut pool = underwater_shorts();
    let before = pool.snapshot();

    let err = pool.reinit().unwrap_err();

    assert_eq!(err, PoolError::InsufficientLiquidity { asset: Asset::Base });
    assert_eq!(err.code(), "NL");
    assert!(err.is_insolvency());
    // nothing sticks, not even the accrual
    assert_eq!(pool.snapshot(), before);
    assert_eq!(pool.position(FIRST).kind, PositionType::Short);
}

#[test]
fn short_emergency_pays_base_lenders_pro_rata() {
    let mut pool = underwater_shorts();

    let mode = pool.shut_down().unwrap();

    assert_eq!(mode, PoolMode::ShortEmergency);
    assert_eq!(pool.mode(), PoolMode::ShortEmergency);
    // every quote unit was sold for base and the insurance funds were pooled in
    assert_eq!(pool.holdings(Asset::Quote), 0);
    assert_eq!(pool.insurance().base.balance, 0);
    assert_eq!(pool.insurance().quote.balance, 0);

    let coeff = pool.emergency_withdraw_coeff();
    let value = coeff.to_decimal();
    assert!(value > dec!(0.65) && value < dec!(0.75), "coefficient {value}");
    assert_eq!(coeff, Fp96::from_ratio(pool.holdings(Asset::Base), pool.totals().base_collateral).unwrap());

    let expected = coeff.mul_amount(pool.position(LENDER).discounted_base).unwrap();
    let paid = pool.emergency_withdraw(LENDER, false).unwrap();
    assert_eq!(paid, expected);
    assert_eq!(pool.balance_of(LENDER, Asset::Base), paid);
    assert_eq!(pool.position(LENDER).kind, PositionType::Uninitialized);
    // a second request finds nothing left to pay
    assert_eq!(pool.emergency_withdraw(LENDER, false).unwrap(), 0);
    assert_eq!(pool.balance_of(LENDER, Asset::Base), paid);

    let err = pool.emergency_withdraw(FIRST, false).unwrap_err();
    assert_eq!(err, PoolError::ShortEmergency);
    assert_eq!(err.code(), "SE");
    assert_eq!(pool.position(FIRST).kind, PositionType::Short);
}

#[test]
fn short_emergency_splits_between_lenders() {
    let mut pool = spot_pool();
    fund(&mut pool, LENDER, Asset::Base, 60 * E18);
    fund(&mut pool, LATE_LENDER, Asset::Base, 40 * E18);
    fund(&mut pool, FIRST, Asset::Quote, 60 * E18);
    pool.short(FIRST, 50 * E18, Fp96::zero()).unwrap();
    fund(&mut pool, SECOND, Asset::Quote, 39 * E18);
    pool.short(SECOND, 45 * E18, Fp96::zero()).unwrap();
    set_price(&mut pool, dec!(3));
    pool.advance_time(SECONDS_PER_DAY);

    pool.shut_down().unwrap();
    let holdings = pool.holdings(Asset::Base);
    let first = pool.emergency_withdraw(LENDER, false).unwrap();
    let second = pool.emergency_withdraw(LATE_LENDER, false).unwrap();

    assert!(first + second <= holdings);
    assert!(holdings - (first + second) <= 2);
    assert!((first * 2).abs_diff(second * 3) <= 5);
}

#[test]
fn short_emergency_unwraps_native_base() {
    let mut pool = underwater_shorts();
    pool.shut_down().unwrap();

    let paid = pool.emergency_withdraw(LENDER, true).unwrap();

    assert!(paid > 0);
    assert_eq!(pool.balance_of(LENDER, Asset::Native), paid);
    assert_eq!(pool.balance_of(LENDER, Asset::Base), 0);
}

#[test]
fn long_emergency_pays_quote_lenders() {
    let mut pool = underwater_longs();
    let err = pool.reinit().unwrap_err();
    assert_eq!(err, PoolError::InsufficientLiquidity { asset: Asset::Quote });

    assert_eq!(pool.shut_down().unwrap(), PoolMode::LongEmergency);
    assert_eq!(pool.holdings(Asset::Base), 0);

    let coeff = pool.emergency_withdraw_coeff();
    let value = coeff.to_decimal();
    assert!(value > dec!(0.55) && value < dec!(0.7), "coefficient {value}");

    let paid = pool.emergency_withdraw(LENDER, false).unwrap();
    assert_eq!(paid, coeff.mul_amount(100 * E18).unwrap());
    // quote is not the wrapped native token, unwrapping changes nothing
    assert_eq!(pool.balance_of(LENDER, Asset::Quote), paid);

    for long in [FIRST, SECOND] {
        let err = pool.emergency_withdraw(long, false).unwrap_err();
        assert_eq!(err, PoolError::LongEmergency);
        assert_eq!(err.code(), "LE");
    }
}

#[test]
fn short_emergency_pays_longs_and_clears_quote_lenders() {
    let mut pool = spot_pool();
    fund(&mut pool, LENDER, Asset::Base, 100 * E18);
    fund(&mut pool, LATE_LENDER, Asset::Quote, 100 * E18);
    fund(&mut pool, HEDGER, Asset::Base, 20 * E18);
    pool.long(HEDGER, 20 * E18, Fp96::from_integer(2)).unwrap();
    fund(&mut pool, FIRST, Asset::Quote, 60 * E18);
    pool.short(FIRST, 50 * E18, Fp96::zero()).unwrap();
    fund(&mut pool, SECOND, Asset::Quote, 39 * E18);
    pool.short(SECOND, 45 * E18, Fp96::zero()).unwrap();
    set_price(&mut pool, dec!(3));
    pool.advance_time(SECONDS_PER_DAY);

    assert_eq!(pool.shut_down().unwrap(), PoolMode::ShortEmergency);
    let coeff = pool.emergency_withdraw_coeff();
    assert_eq!(coeff, Fp96::from_ratio(pool.holdings(Asset::Base), pool.totals().base_collateral).unwrap());

    // the long is paid on its base like any lender, its quote debt stays behind
    let long = pool.position(HEDGER);
    assert_eq!(long.kind, PositionType::Long);
    let paid = pool.emergency_withdraw(HEDGER, false).unwrap();
    assert_eq!(paid, coeff.mul_amount(long.discounted_base).unwrap());
    assert_eq!(pool.balance_of(HEDGER, Asset::Base), paid);
    assert_eq!(pool.position(HEDGER).kind, PositionType::Uninitialized);

    let lender = pool.position(LENDER).discounted_base;
    assert_eq!(pool.emergency_withdraw(LENDER, false).unwrap(), coeff.mul_amount(lender).unwrap());

    // quote was sold off, a quote only lender has no claim left
    assert_eq!(pool.emergency_withdraw(LATE_LENDER, false).unwrap(), 0);
    assert_eq!(pool.position(LATE_LENDER).kind, PositionType::Uninitialized);
    assert_eq!(pool.balance_of(LATE_LENDER, Asset::Quote), 0);
    assert_eq!(pool.balance_of(LATE_LENDER, Asset::Base), 0);
}

#[test]
fn long_emergency_pays_shorts_and_clears_base_lenders() {
    let mut pool = spot_pool();
    fund(&mut pool, LENDER, Asset::Quote, 100 * E18);
    fund(&mut pool, LATE_LENDER, Asset::Base, 20 * E18);
    fund(&mut pool, HEDGER, Asset::Quote, 20 * E18);
    pool.short(HEDGER, 10 * E18, Fp96::zero()).unwrap();
    fund(&mut pool, FIRST, Asset::Base, 60 * E18);
    pool.long(FIRST, 50 * E18, Fp96::from_integer(2)).unwrap();
    fund(&mut pool, SECOND, Asset::Base, 36 * E18);
    pool.long(SECOND, 45 * E18, Fp96::from_integer(2)).unwrap();
    set_price(&mut pool, dec!(0.3));
    pool.advance_time(20 * SECONDS_PER_DAY);

    assert_eq!(pool.shut_down().unwrap(), PoolMode::LongEmergency);
    let coeff = pool.emergency_withdraw_coeff();
    assert_eq!(pool.holdings(Asset::Base), 0);

    let short = pool.position(HEDGER);
    assert_eq!(short.kind, PositionType::Short);
    let paid = pool.emergency_withdraw(HEDGER, false).unwrap();
    assert!(paid > 0);
    assert_eq!(paid, coeff.mul_amount(short.discounted_quote).unwrap());
    assert_eq!(pool.balance_of(HEDGER, Asset::Quote), paid);

    assert_eq!(pool.emergency_withdraw(LATE_LENDER, false).unwrap(), 0);
    assert_eq!(pool.position(LATE_LENDER).kind, PositionType::Uninitialized);
    assert_eq!(pool.emergency_withdraw(FIRST, false).unwrap_err(), PoolError::LongEmergency);
}

#[test]
fn funded_insurance_absorbs_bad_debt() {
    let mut pool = underwater_longs();
    pool.mint(BACKER, Asset::Quote, 500 * E18).unwrap();
    pool.fund_insurance(BACKER, Asset::Quote, 500 * E18).unwrap();
    let funded = pool.insurance().quote.balance;
    assert!(funded >= 500 * E18);
    assert_eq!(pool.balance_of(BACKER, Asset::Quote), 0);

    let report = pool.reinit().unwrap();

    assert_eq!(report.margin_calls.len(), 2);
    assert!(report.margin_calls.iter().all(|call| call.bad_debt > 0 && call.surplus == 0));
    let bad_debt: u128 = report.margin_calls.iter().map(|call| call.bad_debt).sum();

    let mut quote_fee = 0;
    let mut covered = Vec::new();
    for event in pool.events() {
        match &event.payload {
            EventPayload::Reinit(reinit) => quote_fee = reinit.quote_fee,
            EventPayload::BadDebtCovered(cover) => covered.push(cover.clone()),
            _ => {}
        }
    }
    assert_eq!(covered.len(), 2);
    assert!(covered.iter().all(|cover| cover.asset == Asset::Quote));
    assert_eq!(covered.iter().map(|cover| cover.amount).sum::<u128>(), bad_debt);
    assert_eq!(covered[1].insurance_balance, pool.insurance().quote.balance);
    assert_eq!(pool.insurance().quote.balance, funded + quote_fee - bad_debt);

    for long in [FIRST, SECOND] {
        assert_eq!(pool.position(long).kind, PositionType::Uninitialized);
    }
    assert_eq!(pool.shut_down().unwrap_err(), PoolError::NotEligibleForShutdown);
    assert_eq!(pool.mode(), PoolMode::Regular);
}

#[test]
fn emergency_blocks_regular_operations() {
    let mut pool = underwater_shorts();
    pool.shut_down().unwrap();
    pool.mint(LATE_LENDER, Asset::Base, E18).unwrap();

    assert_eq!(pool.deposit_base(LATE_LENDER, E18).unwrap_err(), PoolError::EmergencyMode);
    assert_eq!(pool.withdraw_base(LENDER, E18, false).unwrap_err().code(), "EM");
    assert_eq!(pool.long(LENDER, E18, Fp96::from_integer(10)).unwrap_err().code(), "EM");
    assert_eq!(pool.short(LENDER, E18, Fp96::zero()).unwrap_err().code(), "EM");
    assert_eq!(pool.close_position(FIRST).unwrap_err().code(), "EM");
    assert_eq!(pool.receive_position(LATE_LENDER, FIRST, E18, 0).unwrap_err().code(), "EM");
    assert_eq!(pool.reinit().unwrap_err().code(), "EM");

    let err = pool.shut_down().unwrap_err();
    assert_eq!(err, PoolError::AlreadyInEmergency);
    assert_eq!(err.code(), "EM");
    assert_eq!(pool.balance_of(LATE_LENDER, Asset::Base), E18);
}

#[test]
fn shutdown_is_recorded() {
    let mut pool = underwater_longs();
    pool.shut_down().unwrap();
    pool.emergency_withdraw(LENDER, false).unwrap();

    let tail: Vec<_> = pool.recent_events(2).iter().map(|event| event.payload.clone()).collect();
    match (&tail[0], &tail[1]) {
        (EventPayload::EmergencyShutdown(shutdown), EventPayload::EmergencyWithdraw(withdraw)) => {
            assert_eq!(shutdown.mode, PoolMode::LongEmergency);
            assert_eq!(shutdown.surviving_asset, Asset::Quote);
            assert_eq!(withdraw.account, LENDER);
            assert_eq!(withdraw.paid_as, Asset::Quote);
        }
        other => panic!("unexpected events {other:?}"),
    }
}
