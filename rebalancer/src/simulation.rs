//! Simulation orchestrator: target → plan → confirm → trade → reconcile.
//!
//! Drives the engine against an in-memory portfolio built from the config,
//! so a target file can be rehearsed end to end before it goes live.

use alloy_primitives::{Address, U256};
use indexbook::math::{PRECISE_UNIT, format_precise};
use indexbook::mock::MockPortfolio;
use indexbook::{
    CallContext, EngineConfig, ErrorKind, IndexRebalancer, PortfolioLedger, Side, Timestamp,
    TradeSize, Venue,
};
use log::{info, warn};

use crate::audit::{self, AuditLog};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::reconcile::{self, ReconcileReport};
use crate::target::TargetSpec;

pub type Simulator = IndexRebalancer<MockPortfolio>;

/// Options for a rebalance run.
pub struct RunOptions {
    pub dry_run: bool,
    pub force: bool,
    pub target_file: String,
}

/// One component of a target, resolved against the config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub symbol: String,
    pub asset: Address,
    pub unit: U256,
    pub max_trade: U256,
    pub venue: Venue,
    pub cool_off_secs: u64,
}

/// What a simulated run did.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub rounds: usize,
    pub trades: usize,
    pub refused: usize,
    pub swept: bool,
    pub raised: bool,
    pub report: ReconcileReport,
}

/// Current state and next trade of one component.
#[derive(Debug, Clone)]
pub struct PlanRow {
    pub symbol: String,
    pub held: U256,
    pub target: U256,
    pub next: Option<TradeSize>,
}

/// Build the in-memory portfolio described by the config.
pub fn build_portfolio(config: &Config) -> Result<MockPortfolio> {
    let native = config.portfolio.native_address;
    let mut builder = MockPortfolio::builder()
        .address(config.portfolio.address)
        .manager(config.portfolio.manager)
        .total_shares(config.supply()?)
        .multiplier(config.multiplier()?)
        .venues(config.venues)
        .with_position(native, config.native_unit()?);

    for holding in &config.portfolio.holdings {
        let unit = crate::target::parse_units(&holding.unit)
            .ok_or_else(|| Error::Config(format!("bad unit for {}", holding.symbol)))?;
        builder = builder.with_position(holding.address, unit);
    }
    for price in &config.prices {
        let asset = resolve(config, &price.symbol)?;
        let rate = crate::target::parse_units(&price.native_per_unit)
            .ok_or_else(|| Error::Config(format!("bad price for {}", price.symbol)))?;
        builder = builder.with_rate(asset, native, PRECISE_UNIT, rate);
    }

    Ok(builder.build())
}

/// Build an engine bound to the simulated portfolio.
pub fn build_engine(config: &Config, now: Timestamp) -> Result<Simulator> {
    let portfolio = build_portfolio(config)?;
    let mut engine = IndexRebalancer::new(EngineConfig {
        native_asset: config.portfolio.native_address,
        venues: config.venues,
    });
    engine.initialize(&CallContext::direct(config.portfolio.manager, now), portfolio)?;
    Ok(engine)
}

/// Resolve symbols and fill per-asset defaults from the config.
///
/// Held components missing from the target are appended with a zero unit,
/// so dropping a component from the index sells it out.
pub fn resolve_targets(config: &Config, target: &TargetSpec) -> Result<Vec<ResolvedTarget>> {
    let default_max = config.max_trade_size()?;
    let mut resolved = Vec::with_capacity(target.targets.len());

    for t in &target.targets {
        let asset = resolve(config, &t.symbol)?;
        if asset == config.portfolio.native_address {
            return Err(Error::Target(format!(
                "{} is the native asset and cannot be targeted",
                t.symbol
            )));
        }
        resolved.push(ResolvedTarget {
            symbol: t.symbol.clone(),
            asset,
            unit: t.target_unit()?,
            max_trade: t.max_trade_size()?.unwrap_or(default_max),
            venue: t.venue.unwrap_or(config.execution.default_venue),
            cool_off_secs: t.cool_off_secs.unwrap_or(config.execution.cool_off_secs),
        });
    }

    for holding in &config.portfolio.holdings {
        let held = crate::target::parse_units(&holding.unit).unwrap_or_default();
        if held.is_zero() || resolved.iter().any(|r| r.asset == holding.address) {
            continue;
        }
        warn!("{} held but not targeted, selling out", holding.symbol);
        resolved.push(ResolvedTarget {
            symbol: holding.symbol.clone(),
            asset: holding.address,
            unit: U256::ZERO,
            max_trade: default_max,
            venue: config.execution.default_venue,
            cool_off_secs: config.execution.cool_off_secs,
        });
    }

    Ok(resolved)
}

/// Load `targets` into the engine and authorize the configured trader.
pub fn apply_targets(
    engine: &mut Simulator,
    config: &Config,
    targets: &[ResolvedTarget],
    now: Timestamp,
) -> Result<()> {
    let ctx = CallContext::direct(config.portfolio.manager, now);
    let assets: Vec<Address> = targets.iter().map(|t| t.asset).collect();
    let units: Vec<U256> = targets.iter().map(|t| t.unit).collect();
    let sizes: Vec<U256> = targets.iter().map(|t| t.max_trade).collect();
    let venues: Vec<u8> = targets.iter().map(|t| t.venue.id()).collect();
    let cool_offs: Vec<u64> = targets.iter().map(|t| t.cool_off_secs).collect();
    let multiplier = current_multiplier(engine)?;

    engine.start_rebalance(&ctx, &assets, &units, multiplier)?;
    engine.set_trade_maximums(&ctx, &assets, &sizes)?;
    engine.set_exchanges(&ctx, &assets, &venues)?;
    engine.set_cool_off_periods(&ctx, &assets, &cool_offs)?;
    if !engine.is_trader(config.portfolio.trader) {
        engine.update_trader_status(&ctx, &[config.portfolio.trader])?;
    }
    Ok(())
}

/// Trade until every target is met, nothing more can trade, or the round
/// limit is hit; then optionally sweep and raise targets.
pub fn execute(
    engine: &mut Simulator,
    config: &Config,
    mut audit: Option<&mut AuditLog>,
    start: Timestamp,
) -> Result<RunSummary> {
    let trader = config.portfolio.trader;
    let mut now = start;
    let mut rounds = 0;
    let mut trades = 0;
    let mut refused = 0;

    flush_events(engine, audit.as_deref_mut())?;

    while rounds < config.execution.max_rounds && !engine.targets_met()? {
        rounds += 1;
        let mut progressed = false;
        let mut cooling = false;

        // Sells first so buys have native balance to spend
        for side in [Side::Sell, Side::Buy] {
            for asset in engine.rebalance_assets().to_vec() {
                match engine.preview_trade(asset) {
                    Ok(size) if size.side == side => {}
                    Ok(_) | Err(indexbook::Error::TargetAlreadyMet(_)) => continue,
                    Err(e) => return Err(e.into()),
                }

                let symbol = config.symbol_of(asset);
                match engine.trade(&CallContext::direct(trader, now), asset) {
                    Ok(fill) => {
                        trades += 1;
                        progressed = true;
                        println!(
                            "[round {rounds}] {symbol}: sent {} {}, received {} {}",
                            format_precise(fill.sent),
                            config.symbol_of(fill.send),
                            format_precise(fill.received),
                            config.symbol_of(fill.receive),
                        );
                    }
                    Err(e) => {
                        cooling |= matches!(e, indexbook::Error::CoolOffActive { .. });
                        refused += 1;
                        refuse(audit.as_deref_mut(), "trade", &symbol, e)?;
                    }
                }
            }
        }
        flush_events(engine, audit.as_deref_mut())?;

        if !progressed && !cooling {
            info!("no tradeable components left after {rounds} rounds");
            break;
        }
        now += config.execution.secs_per_round;
    }

    let swept = if config.execution.sweep {
        sweep(engine, config, audit.as_deref_mut(), &mut now, &mut refused)?
    } else {
        false
    };
    if swept {
        trades += 1;
    }

    let raised = config.execution.raise_targets && raise(engine, config, audit.as_deref_mut(), now)?;
    flush_events(engine, audit.as_deref_mut())?;

    let report = reconcile_engine(engine, config)?;
    if let Some(log) = audit.as_deref_mut() {
        audit::log_reconciliation(log, &report)?;
        audit::log_run_completed(log, rounds, trades, refused)?;
    }

    Ok(RunSummary {
        rounds,
        trades,
        refused,
        swept,
        raised,
        report,
    })
}

/// Execute a full rebalance run.
pub fn run(config: &Config, target: &TargetSpec, opts: &RunOptions) -> Result<()> {
    let now = unix_now();

    // 1. Open audit log
    let mut audit = AuditLog::open(&config.audit_path())?;
    audit::log_run_started(&mut audit, &opts.target_file, &config.portfolio.address.to_string())?;

    // 2. Bind the engine and load targets
    let mut engine = build_engine(config, now)?;
    display_holdings(&engine, config)?;

    let targets = resolve_targets(config, target)?;
    apply_targets(&mut engine, config, &targets, now)?;
    flush_events(&mut engine, Some(&mut audit))?;

    // 3. Display the plan
    let rows = plan_rows(&engine, config)?;
    display_plan(&rows);
    if rows.iter().all(|r| r.next.is_none()) {
        println!("\nNo rebalancing needed, portfolio matches target.");
        audit.log_simple("no_rebalance_needed")?;
        return Ok(());
    }

    // 4. Dry run stops here
    if opts.dry_run {
        println!("\n[DRY RUN] No trades executed.");
        return Ok(());
    }

    // 5. Confirm execution
    if !opts.force {
        let confirmed = dialoguer::Confirm::new()
            .with_prompt("Execute?")
            .default(false)
            .interact()
            .map_err(|e| Error::Aborted(format!("confirmation prompt failed: {e}")))?;

        if !confirmed {
            println!("Aborted.");
            audit.log("user_confirmed", serde_json::json!({"approved": false}))?;
            return Ok(());
        }

        audit.log("user_confirmed", serde_json::json!({"approved": true}))?;
    }

    // 6. Trade
    let summary = execute(&mut engine, config, Some(&mut audit), now)?;
    println!(
        "\n{} trades, {} refused over {} rounds{}{}. Audit logged to {}",
        summary.trades,
        summary.refused,
        summary.rounds,
        if summary.swept { ", native swept" } else { "" },
        if summary.raised { ", targets raised" } else { "" },
        config.audit_path().display()
    );

    // 7. Reconcile
    print!("\n{}", summary.report);
    Ok(())
}

/// Show normalized targets and the next trade per component.
pub fn plan(config: &Config, target: &TargetSpec) -> Result<()> {
    let now = unix_now();
    let mut engine = build_engine(config, now)?;
    let targets = resolve_targets(config, target)?;
    apply_targets(&mut engine, config, &targets, now)?;
    display_plan(&plan_rows(&engine, config)?);
    Ok(())
}

/// Show the simulated portfolio's holdings.
pub fn status(config: &Config) -> Result<()> {
    let engine = build_engine(config, unix_now())?;
    println!("Portfolio {}", config.portfolio.address);
    display_holdings(&engine, config)
}

/// Current state and next trade for every component in the rebalance.
pub fn plan_rows(engine: &Simulator, config: &Config) -> Result<Vec<PlanRow>> {
    let ledger = bound_ledger(engine)?;
    let assets = engine.rebalance_assets();
    let targets = engine.get_normalized_targets(assets)?;

    let mut rows = Vec::with_capacity(assets.len());
    for (asset, target) in assets.iter().zip(targets) {
        let next = match engine.preview_trade(*asset) {
            Ok(size) => Some(size),
            Err(indexbook::Error::TargetAlreadyMet(_)) => None,
            Err(e) => return Err(e.into()),
        };
        rows.push(PlanRow {
            symbol: config.symbol_of(*asset),
            held: ledger.held_unit(*asset)?,
            target,
            next,
        });
    }
    Ok(rows)
}

/// Compare held units against normalized targets.
pub fn reconcile_engine(engine: &Simulator, config: &Config) -> Result<ReconcileReport> {
    let ledger = bound_ledger(engine)?;
    let assets = engine.rebalance_assets();
    let targets = engine.get_normalized_targets(assets)?;

    let mut rows = Vec::with_capacity(assets.len());
    for (asset, target) in assets.iter().zip(targets) {
        rows.push((config.symbol_of(*asset), target, ledger.held_unit(*asset)?));
    }
    let native_left = ledger.held_unit(config.portfolio.native_address)?;
    Ok(reconcile::reconcile(&rows, native_left))
}

// === Helpers ===

fn resolve(config: &Config, symbol: &str) -> Result<Address> {
    config
        .resolve(symbol)
        .ok_or_else(|| Error::Target(format!("unknown symbol: {symbol}")))
}

fn bound_ledger(engine: &Simulator) -> Result<&MockPortfolio> {
    engine
        .ledger()
        .ok_or(Error::Engine(indexbook::Error::NotInitialized))
}

fn current_multiplier(engine: &Simulator) -> Result<U256> {
    Ok(bound_ledger(engine)?.position_multiplier()?)
}

fn unix_now() -> Timestamp {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default()
}

/// Spend leftover native balance on the most underweight component.
fn sweep(
    engine: &mut Simulator,
    config: &Config,
    audit: Option<&mut AuditLog>,
    now: &mut Timestamp,
    refused: &mut usize,
) -> Result<bool> {
    let native = config.portfolio.native_address;
    if engine.has_assets_to_sell()? || bound_ledger(engine)?.balance_of(native)?.is_zero() {
        return Ok(false);
    }

    let mut best: Option<(Address, U256)> = None;
    for asset in engine.rebalance_assets() {
        if let Ok(size) = engine.preview_trade(*asset) {
            if size.side == Side::Buy && best.is_none_or(|(_, q)| size.quantity > q) {
                best = Some((*asset, size.quantity));
            }
        }
    }
    let Some((asset, _)) = best else {
        return Ok(false);
    };

    *now += engine.asset_info(asset).cool_off_remaining(*now);
    let symbol = config.symbol_of(asset);
    match engine.trade_remaining_weth(&CallContext::direct(config.portfolio.trader, *now), asset) {
        Ok(fill) => {
            println!(
                "[sweep] {symbol}: sent {} {}, received {}",
                format_precise(fill.sent),
                config.portfolio.native_symbol,
                format_precise(fill.received),
            );
            Ok(true)
        }
        Err(e) => {
            *refused += 1;
            refuse(audit, "trade_remaining_weth", &symbol, e)?;
            Ok(false)
        }
    }
}

fn raise(
    engine: &mut Simulator,
    config: &Config,
    audit: Option<&mut AuditLog>,
    now: Timestamp,
) -> Result<bool> {
    match engine.raise_asset_targets(&CallContext::direct(config.portfolio.trader, now)) {
        Ok(multiplier) => {
            println!("[raise] targets raised, multiplier {}", format_precise(multiplier));
            Ok(true)
        }
        Err(e) => {
            refuse(audit, "raise_asset_targets", "*", e)?;
            Ok(false)
        }
    }
}

/// Record a refusal the run can continue past; anything else aborts.
fn refuse(
    audit: Option<&mut AuditLog>,
    operation: &str,
    symbol: &str,
    err: indexbook::Error,
) -> Result<()> {
    if !matches!(err.kind(), ErrorKind::State | ErrorKind::Venue) {
        return Err(err.into());
    }
    warn!("{operation} {symbol} refused: {err}");
    if let Some(log) = audit {
        audit::log_refused(log, operation, symbol, &err)?;
    }
    Ok(())
}

fn flush_events(engine: &mut Simulator, audit: Option<&mut AuditLog>) -> Result<()> {
    if let Some(log) = audit {
        for event in engine.events() {
            audit::log_engine_event(log, event)?;
        }
    }
    engine.clear_events();
    Ok(())
}

fn display_holdings(engine: &Simulator, config: &Config) -> Result<()> {
    let ledger = bound_ledger(engine)?;
    let held = ledger.held_assets();
    if held.is_empty() {
        println!("No positions.");
        return Ok(());
    }

    println!("CURRENT PORTFOLIO:");
    for asset in held {
        println!(
            "  {:8} {:>22} per share  {:>24} total",
            config.symbol_of(asset),
            format_precise(ledger.held_unit(asset)?),
            format_precise(ledger.balance_of(asset)?),
        );
    }
    Ok(())
}

fn display_plan(rows: &[PlanRow]) {
    println!("\nREBALANCE PLAN:");
    println!(
        "  {:>3}  {:8} {:>22} {:>22} {:>5} {:>22}",
        "#", "Symbol", "Held", "Target", "Side", "Next trade"
    );

    for (i, row) in rows.iter().enumerate() {
        let (side, qty) = match &row.next {
            Some(size) => (size.side.to_string(), format_precise(size.quantity)),
            None => ("-".to_string(), "met".to_string()),
        };
        println!(
            "  {:>3}  {:8} {:>22} {:>22} {:>5} {:>22}",
            i + 1,
            row.symbol,
            format_precise(row.held),
            format_precise(row.target),
            side,
            qty,
        );
    }
}
