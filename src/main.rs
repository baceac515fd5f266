//! Margin Pool Simulation.
//!
//! Walks the pool through regular trading, a margin call cascade, a keeper
//! liquidation and both emergency shutdown modes.
//!
//! Usage: `margin-sim [config.toml]`. Without a path the development preset is used, starting now.

use anyhow::{bail, Context, Result};
use margin_pool::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const E18: u128 = 1_000_000_000_000_000_000;
const DEPTH: u128 = 1_000_000 * E18;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(1) {
        Some(path) => PoolConfig::load(&path).with_context(|| format!("loading {path}"))?,
        None => PoolConfig {
            start_time: Timestamp::now(),
            ..Environment::Development.config()
        },
    };

    println!("Margin Pool Simulation");
    println!(
        "max leverage {}x, margin call at {}x\n",
        config.params.max_leverage, config.params.margin_call_leverage
    );

    scenario_1_regular_trading(&config)?;
    scenario_2_margin_call_cascade(&config)?;
    scenario_3_keeper_liquidation(&config)?;
    scenario_4_short_emergency(&config)?;
    scenario_5_long_emergency(&config)?;

    println!("\nAll simulations completed successfully.");
    Ok(())
}

// scenarios move the venue price by hand and read it back straight away
fn fresh_pool(config: &PoolConfig) -> Result<MarginPool<ConstantProductPool>> {
    let mut config = config.clone();
    config.params.twap_window_secs = 0;
    let venue = ConstantProductPool::at_parity(DEPTH, config.start_time);
    Ok(MarginPool::new(config, EngineConfig::default(), venue)?)
}

fn fund(pool: &mut MarginPool<ConstantProductPool>, account: AccountId, asset: Asset, amount: u128) -> Result<()> {
    pool.mint(account, asset, amount)?;
    executed(pool.deposit(account, asset, amount)?, "deposit")?;
    Ok(())
}

fn executed<T>(outcome: Outcome<T>, what: &str) -> Result<T> {
    match outcome {
        Outcome::Executed(value) => Ok(value),
        Outcome::MarginCalled => bail!("{what} was preempted by a margin call"),
    }
}

fn move_price(pool: &mut MarginPool<ConstantProductPool>, price: Decimal) -> Result<Fp96> {
    let price = Fp96::from_decimal(price)?;
    let now = pool.time();
    pool.venue_mut().set_price(now, price)?;
    Ok(price)
}

// margin * (max_leverage - 1) * fraction: the size that lands at `fraction` of the ceiling
fn levered_size(params: &PoolParams, margin: u128, fraction: Decimal) -> Result<u128> {
    let scale = Fp96::from_decimal((params.max_leverage - Decimal::ONE) * fraction)?;
    Ok(scale.mul_amount(margin)?)
}

fn tokens(amount: u128) -> String {
    Fp96::from_ratio(amount, E18)
        .map(|value| value.to_decimal().round_dp(4).to_string())
        .unwrap_or_else(|_| amount.to_string())
}

/// Lending, a long and a short, interest and closing out.
fn scenario_1_regular_trading(config: &PoolConfig) -> Result<()> {
    println!("Scenario 1: Regular Trading\n");

    let mut pool = fresh_pool(config)?;
    let (base_lender, quote_lender) = (AccountId(1), AccountId(2));
    let (alice, bob) = (AccountId(3), AccountId(4));

    fund(&mut pool, base_lender, Asset::Base, 1_000 * E18)?;
    fund(&mut pool, quote_lender, Asset::Quote, 1_000 * E18)?;
    fund(&mut pool, alice, Asset::Base, 10 * E18)?;
    fund(&mut pool, bob, Asset::Quote, 10 * E18)?;
    println!("  Lenders supply 1000 base and 1000 quote, Alice and Bob bring 10 each");

    let size = levered_size(pool.params(), 10 * E18, dec!(0.5))?;
    let long = executed(pool.long(alice, size, Fp96::from_integer(2))?, "long")?;
    println!(
        "  Alice longs {} base for {} quote at {}, leverage {}",
        tokens(long.base_amount),
        tokens(long.quote_amount),
        long.execution_price.to_decimal().round_dp(6),
        long.leverage
    );
    let short = executed(pool.short(bob, size, Fp96::zero())?, "short")?;
    println!(
        "  Bob shorts {} base for {} quote at {}, leverage {}",
        tokens(short.base_amount),
        tokens(short.quote_amount),
        short.execution_price.to_decimal().round_dp(6),
        short.leverage
    );

    pool.advance_time(30 * SECONDS_PER_DAY);
    let report = pool.reinit()?;
    let coeffs = pool.coefficients();
    println!("\n  30 days later ({} margin calls)", report.margin_calls.len());
    println!(
        "  Quote debt coefficient {}, quote collateral coefficient {}",
        coeffs.quote_debt.to_decimal().round_dp(8),
        coeffs.quote_collateral.to_decimal().round_dp(8)
    );
    println!(
        "  Insurance: {} base, {} quote",
        tokens(pool.insurance().base.balance),
        tokens(pool.insurance().quote.balance)
    );

    move_price(&mut pool, dec!(1.01))?;
    let closed = executed(pool.close_position(alice)?, "close")?;
    println!("\n  Price moves to 1.01. Alice closes, selling {} base", tokens(closed.collateral_sold));
    let closed = executed(pool.close_position(bob)?, "close")?;
    println!("  Bob closes, spending {} quote", tokens(closed.collateral_sold));

    for (name, account, asset) in [("Alice", alice, Asset::Base), ("Bob", bob, Asset::Quote)] {
        let withdrawn = executed(pool.withdraw(account, asset, u128::MAX, false)?, "withdraw")?;
        println!("  {name} withdraws {} {asset}", tokens(withdrawn));
    }
    for (account, asset) in [(base_lender, Asset::Base), (quote_lender, Asset::Quote)] {
        let withdrawn = executed(pool.withdraw(account, asset, u128::MAX, false)?, "withdraw")?;
        println!("  Lender {account} withdraws {} {asset}", tokens(withdrawn));
    }
    println!("  Positions left: {}\n", pool.snapshot().positions);
    Ok(())
}

/// Several longs near the ceiling, a price drop, one reinit works the queue.
fn scenario_2_margin_call_cascade(config: &PoolConfig) -> Result<()> {
    println!("Scenario 2: Margin Call Cascade\n");

    let mut pool = fresh_pool(config)?;
    let lender = AccountId(1);
    fund(&mut pool, lender, Asset::Quote, 1_000 * E18)?;

    let traders = [AccountId(10), AccountId(11), AccountId(12)];
    for (trader, fraction) in traders.into_iter().zip([dec!(0.95), dec!(0.9), dec!(0.8)]) {
        fund(&mut pool, trader, Asset::Base, 10 * E18)?;
        let size = levered_size(pool.params(), 10 * E18, fraction)?;
        let trade = executed(pool.long(trader, size, Fp96::from_integer(2))?, "long")?;
        println!("  Trader {trader} long {} base at {}", tokens(size), trade.leverage);
    }

    let drop = Decimal::ONE - Decimal::ONE / (dec!(2) * pool.params().max_leverage);
    move_price(&mut pool, drop)?;
    println!("\n  Price drops to {}", drop.round_dp(4));
    for trader in traders {
        println!("  Trader {trader} now at {}", pool.leverage(trader)?);
    }

    let before = pool.coefficients().quote_collateral;
    let report = pool.reinit()?;
    for call in &report.margin_calls {
        println!(
            "  Margin call {}: sold {} base, repaid {} quote, surplus {}, bad debt {}",
            call.account,
            tokens(call.collateral_sold),
            tokens(call.debt_repaid),
            tokens(call.surplus),
            tokens(call.bad_debt)
        );
    }
    if report.pending {
        println!("  More callable positions wait for the next reinit");
    }
    println!(
        "  Quote collateral coefficient {} -> {}\n",
        before.to_decimal().round_dp(8),
        pool.coefficients().quote_collateral.to_decimal().round_dp(8)
    );
    Ok(())
}

/// A keeper takes over a callable long before the next reinit and sells it elsewhere.
fn scenario_3_keeper_liquidation(config: &PoolConfig) -> Result<()> {
    println!("Scenario 3: Keeper Liquidation\n");

    let mut pool = fresh_pool(config)?;
    let (lender, trader, keeper_account) = (AccountId(1), AccountId(2), AccountId(9));
    fund(&mut pool, lender, Asset::Quote, 1_000 * E18)?;
    fund(&mut pool, trader, Asset::Base, 10 * E18)?;
    let size = levered_size(pool.params(), 10 * E18, dec!(0.95))?;
    executed(pool.long(trader, size, Fp96::from_integer(2))?, "long")?;

    let drop = Decimal::ONE - Decimal::ONE / (dec!(2) * pool.params().max_leverage);
    let price = move_price(&mut pool, drop)?;
    let mut router = SwapRouter::new(vec![ConstantProductPool::with_price(DEPTH, price, pool.time())?]);
    println!("  Price drops to {}, trader {trader} at {}", drop.round_dp(4), pool.leverage(trader)?);

    pool.mint(keeper_account, Asset::Quote, 1_000 * E18)?;
    let keeper = LiquidationKeeper::new(keeper_account, E18 / 10, SwapCallData::venue(0));
    let report = keeper.liquidate(&mut pool, &mut router, trader)?;
    println!(
        "  Keeper repaid {} quote, sold {} base for {} quote, profit {}",
        tokens(report.repaid),
        tokens(report.collateral_received),
        tokens(report.proceeds),
        tokens(report.profit)
    );
    println!("  Trader position now {:?}\n", pool.position(trader).kind);
    Ok(())
}

/// Shorts go underwater after base triples; base insurance cannot cover the hole.
fn scenario_4_short_emergency(config: &PoolConfig) -> Result<()> {
    println!("Scenario 4: Short Emergency\n");

    let mut pool = fresh_pool(config)?;
    let lender = AccountId(1);
    let shorts = [(AccountId(2), 60 * E18, 50 * E18), (AccountId(3), 39 * E18, 45 * E18)];
    fund(&mut pool, lender, Asset::Base, 100 * E18)?;
    for (account, margin, size) in shorts {
        fund(&mut pool, account, Asset::Quote, margin)?;
        executed(pool.short(account, size, Fp96::zero())?, "short")?;
        println!("  {account} shorts {} base on {} quote", tokens(size), tokens(margin));
    }

    move_price(&mut pool, dec!(3))?;
    pool.advance_time(SECONDS_PER_DAY);
    match pool.reinit() {
        Err(err) => println!("\n  Base triples, reinit fails: {err} [{}]", err.code()),
        Ok(_) => bail!("reinit should not settle underwater shorts"),
    }

    let mode = pool.shut_down()?;
    println!(
        "  Pool enters {:?}, withdraw coefficient {}",
        mode,
        pool.emergency_withdraw_coeff().to_decimal().round_dp(6)
    );

    let paid = pool.emergency_withdraw(lender, true)?;
    println!("  Lender {lender} receives {} native (base unwrapped)", tokens(paid));
    let (short, _, _) = shorts[0];
    if let Err(err) = pool.emergency_withdraw(short, false) {
        println!("  Short {short} is refused: {err} [{}]\n", err.code());
    }
    Ok(())
}

/// Longs go underwater after base collapses; quote insurance cannot cover the hole.
fn scenario_5_long_emergency(config: &PoolConfig) -> Result<()> {
    println!("Scenario 5: Long Emergency\n");

    let mut pool = fresh_pool(config)?;
    let lender = AccountId(1);
    let longs = [(AccountId(2), 60 * E18, 50 * E18), (AccountId(3), 36 * E18, 45 * E18)];
    fund(&mut pool, lender, Asset::Quote, 100 * E18)?;
    for (account, margin, size) in longs {
        fund(&mut pool, account, Asset::Base, margin)?;
        executed(pool.long(account, size, Fp96::from_integer(2))?, "long")?;
        println!("  {account} longs {} base on {} base", tokens(size), tokens(margin));
    }

    move_price(&mut pool, dec!(0.3))?;
    pool.advance_time(SECONDS_PER_DAY);
    if let Err(err) = pool.reinit() {
        println!("\n  Base collapses to 0.3, reinit fails: {err} [{}]", err.code());
    }

    let mode = pool.shut_down()?;
    println!(
        "  Pool enters {:?}, withdraw coefficient {}",
        mode,
        pool.emergency_withdraw_coeff().to_decimal().round_dp(6)
    );
    let paid = pool.emergency_withdraw(lender, false)?;
    println!("  Lender {lender} receives {} quote", tokens(paid));
    let again = pool.emergency_withdraw(lender, false)?;
    println!("  A second withdrawal pays {}", tokens(again));
    for (account, _, _) in longs {
        if let Err(err) = pool.emergency_withdraw(account, false) {
            println!("  Long {account} is refused: {err} [{}]", err.code());
        }
    }
    Ok(())
}
