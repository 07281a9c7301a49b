//! Safety tests: access control, input validation, atomicity, reentrancy.

use alloy_primitives::{Address, U256};
use indexbook::math::{PRECISE_UNIT, units};
use indexbook::mock::MockPortfolio;
use indexbook::{
    CallContext, EngineConfig, Error, ErrorKind, IndexRebalancer, PortfolioLedger, Result,
    TargetTracker, Timestamp, TradeExecutor, Venue,
};

fn weth() -> Address {
    Address::repeat_byte(0xee)
}
fn dai() -> Address {
    Address::repeat_byte(0xd1)
}
fn alice() -> Address {
    Address::repeat_byte(0xa1)
}
fn mallory() -> Address {
    Address::repeat_byte(0x66)
}

fn portfolio() -> MockPortfolio {
    MockPortfolio::builder()
        .with_position(weth(), units(1))
        .with_position(dai(), units(1000))
        .with_rate(dai(), weth(), units(100), units(1))
        .build()
}

fn config(portfolio: &MockPortfolio) -> EngineConfig {
    EngineConfig {
        native_asset: weth(),
        venues: portfolio.venues(),
    }
}

fn bound<X: TradeExecutor + Clone>(
    executor: X,
) -> (IndexRebalancer<MockPortfolio, X>, CallContext) {
    let portfolio = portfolio();
    let manager = CallContext::direct(portfolio.manager(), 0);
    let mut engine = IndexRebalancer::with_executor(config(&portfolio), executor);
    engine.initialize(&manager, portfolio).unwrap();
    (engine, manager)
}

/// DAI 1000 -> 500 via Uniswap, max 300 per trade, alice allowed.
fn ready() -> (IndexRebalancer<MockPortfolio>, CallContext) {
    let (mut engine, manager) = bound(indexbook::DefaultExecutor);
    engine
        .start_rebalance(&manager, &[dai()], &[units(500)], PRECISE_UNIT)
        .unwrap();
    engine
        .set_trade_maximums(&manager, &[dai()], &[units(300)])
        .unwrap();
    engine.set_exchanges(&manager, &[dai()], &[0]).unwrap();
    engine.update_trader_status(&manager, &[alice()]).unwrap();
    (engine, manager)
}

// ============================================================================
// Binding
// ============================================================================

#[test]
fn operations_before_initialize_fail() {
    let portfolio = portfolio();
    let manager = CallContext::direct(portfolio.manager(), 0);
    let mut engine: IndexRebalancer<MockPortfolio> = IndexRebalancer::new(config(&portfolio));

    assert!(!engine.is_initialized());
    assert_eq!(
        engine
            .start_rebalance(&manager, &[dai()], &[units(1)], PRECISE_UNIT)
            .unwrap_err(),
        Error::NotInitialized
    );
    assert_eq!(engine.trade(&manager, dai()).unwrap_err(), Error::NotInitialized);
    assert_eq!(engine.targets_met().unwrap_err(), Error::NotInitialized);
    assert!(engine.ledger().is_none());
}

#[test]
fn only_manager_may_initialize() {
    let portfolio = portfolio();
    let mut engine: IndexRebalancer<MockPortfolio> = IndexRebalancer::new(config(&portfolio));
    assert_eq!(
        engine
            .initialize(&CallContext::direct(mallory(), 0), portfolio)
            .unwrap_err(),
        Error::NotManager(mallory())
    );
    assert!(!engine.is_initialized());
}

#[test]
fn initialize_twice_fails() {
    let (mut engine, manager) = ready();
    assert_eq!(
        engine.initialize(&manager, portfolio()).unwrap_err(),
        Error::AlreadyInitialized
    );
    assert_eq!(engine.rebalance_assets(), &[dai()]);
}

#[test]
fn remove_module_detaches() {
    let (mut engine, manager) = ready();
    let portfolio_address = engine.ledger().unwrap().address();

    assert_eq!(
        engine.remove_module(&manager).unwrap_err(),
        Error::NotPortfolio(manager.sender)
    );
    engine
        .remove_module(&CallContext::direct(portfolio_address, 0))
        .unwrap();

    assert!(!engine.is_initialized());
    assert!(engine.ledger().is_some());
    assert_eq!(
        engine.trade(&CallContext::direct(alice(), 10), dai()).unwrap_err(),
        Error::NotInitialized
    );
    assert_eq!(
        engine.initialize(&manager, portfolio()).unwrap_err(),
        Error::AlreadyInitialized
    );
}

// ============================================================================
// Access control
// ============================================================================

#[test]
fn manager_operations_reject_others() {
    let (mut engine, _) = ready();
    let ctx = CallContext::direct(mallory(), 0);

    let errors = [
        engine
            .start_rebalance(&ctx, &[dai()], &[units(1)], PRECISE_UNIT)
            .unwrap_err(),
        engine
            .set_trade_maximums(&ctx, &[dai()], &[units(1)])
            .unwrap_err(),
        engine.set_exchanges(&ctx, &[dai()], &[1]).unwrap_err(),
        engine.set_cool_off_periods(&ctx, &[dai()], &[1]).unwrap_err(),
        engine.update_trader_status(&ctx, &[mallory()]).unwrap_err(),
        engine.update_anyone_can_trade(&ctx).unwrap_err(),
    ];
    for err in errors {
        assert_eq!(err, Error::NotManager(mallory()));
        assert_eq!(err.kind(), ErrorKind::Permission);
    }
    assert!(!engine.is_trader(mallory()));
}

#[test]
fn unlisted_trader_rejected() {
    let (mut engine, _) = ready();
    assert_eq!(
        engine.trade(&CallContext::direct(mallory(), 10), dai()).unwrap_err(),
        Error::NotAllowedTrader(mallory())
    );
}

#[test]
fn relayed_call_rejected_even_for_allowed_trader() {
    let (mut engine, _) = ready();
    let relayed = CallContext::relayed(alice(), mallory(), 10);
    assert_eq!(
        engine.trade(&relayed, dai()).unwrap_err(),
        Error::RelayedCall {
            sender: alice(),
            origin: mallory(),
        }
    );
    assert_eq!(
        engine.raise_asset_targets(&relayed).unwrap_err(),
        Error::RelayedCall {
            sender: alice(),
            origin: mallory(),
        }
    );
}

#[test]
fn anyone_can_trade_opens_trading() {
    let (mut engine, manager) = ready();
    assert!(engine.update_anyone_can_trade(&manager).unwrap());
    assert!(engine.trade(&CallContext::direct(mallory(), 10), dai()).is_ok());
}

#[test]
fn toggles_flip_back() {
    let (mut engine, manager) = ready();
    assert!(engine.is_trader(alice()));
    engine.update_trader_status(&manager, &[alice()]).unwrap();
    assert!(!engine.is_trader(alice()));

    assert!(engine.update_anyone_can_trade(&manager).unwrap());
    assert!(!engine.update_anyone_can_trade(&manager).unwrap());
    assert!(!engine.anyone_can_trade());
}

// ============================================================================
// Input validation
// ============================================================================

#[test]
fn array_inputs_validated() {
    let (mut engine, manager) = ready();
    assert_eq!(
        engine
            .set_trade_maximums(&manager, &[dai()], &[units(1), units(2)])
            .unwrap_err(),
        Error::LengthMismatch { left: 1, right: 2 }
    );
    assert_eq!(
        engine.set_cool_off_periods(&manager, &[], &[]).unwrap_err(),
        Error::EmptyArray
    );
    assert_eq!(
        engine
            .set_exchanges(&manager, &[dai(), dai()], &[0, 1])
            .unwrap_err(),
        Error::DuplicateAsset(dai())
    );
}

#[test]
fn trader_list_validated() {
    let (mut engine, manager) = ready();
    assert_eq!(
        engine.update_trader_status(&manager, &[]).unwrap_err(),
        Error::EmptyArray
    );
    // A repeated address would toggle twice; the whole call is refused
    assert_eq!(
        engine
            .update_trader_status(&manager, &[mallory(), alice(), mallory()])
            .unwrap_err(),
        Error::DuplicateAsset(mallory())
    );
    assert!(engine.is_trader(alice()));
    assert!(!engine.is_trader(mallory()));
}

#[test]
fn invalid_venue_changes_nothing() {
    let (mut engine, manager) = ready();
    let link = Address::repeat_byte(0x11);
    assert_eq!(
        engine
            .set_exchanges(&manager, &[link, dai()], &[2, 3])
            .unwrap_err(),
        Error::InvalidVenue(3)
    );
    assert_eq!(engine.asset_info(link).venue, None);
    assert_eq!(engine.asset_info(dai()).venue, Some(Venue::Uniswap));
}

#[test]
fn native_asset_cannot_be_targeted() {
    let (mut engine, manager) = ready();
    assert_eq!(
        engine
            .start_rebalance(&manager, &[weth()], &[units(1)], PRECISE_UNIT)
            .unwrap_err(),
        Error::NativeAssetTarget(weth())
    );
}

#[test]
fn held_component_cannot_be_dropped_silently() {
    let (mut engine, manager) = ready();
    let link = Address::repeat_byte(0x11);
    assert_eq!(
        engine
            .start_rebalance(&manager, &[link], &[units(1)], PRECISE_UNIT)
            .unwrap_err(),
        Error::MissingComponent(dai())
    );
    // Zeroing it explicitly is fine
    engine
        .start_rebalance(&manager, &[link, dai()], &[units(1), U256::ZERO], PRECISE_UNIT)
        .unwrap();
}

// ============================================================================
// Atomicity
// ============================================================================

#[test]
fn venue_failure_leaves_no_trace() {
    let (mut engine, _) = ready();
    engine.ledger_mut().unwrap().fail_venue(Venue::Uniswap);
    let events_before = engine.events().len();

    let err = engine.trade(&CallContext::direct(alice(), 10), dai()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Venue);

    let ledger = engine.ledger().unwrap();
    assert_eq!(ledger.held_unit(dai()).unwrap(), units(1000));
    assert_eq!(ledger.balance_of(weth()).unwrap(), units(1));
    assert!(ledger.approvals().is_empty());
    assert!(ledger.swaps().is_empty());
    assert_eq!(engine.asset_info(dai()).last_trade_timestamp, 0);
    assert_eq!(engine.events().len(), events_before);

    engine.ledger_mut().unwrap().clear_failures();
    assert!(engine.trade(&CallContext::direct(alice(), 10), dai()).is_ok());
}

#[test]
fn event_log_survives_failed_operations() {
    let (mut engine, manager) = ready();
    let names = |engine: &IndexRebalancer<MockPortfolio>| {
        engine.events().iter().map(|e| e.name()).collect::<Vec<_>>()
    };
    assert_eq!(
        names(&engine),
        [
            "target_units_updated",
            "trade_maximum_updated",
            "asset_exchange_updated",
            "trader_status_updated",
        ]
    );

    engine.set_exchanges(&manager, &[dai()], &[7]).unwrap_err();
    engine.trade(&CallContext::direct(mallory(), 10), dai()).unwrap_err();
    assert_eq!(engine.events().len(), 4);

    engine.trade(&CallContext::direct(alice(), 10), dai()).unwrap();
    assert_eq!(engine.events().len(), 5);
    assert_eq!(names(&engine)[4], "trade_executed");
}

#[test]
fn failed_manager_update_keeps_previous_targets() {
    let (mut engine, manager) = ready();
    let link = Address::repeat_byte(0x11);
    let _ = engine.start_rebalance(&manager, &[link, weth()], &[units(1), units(1)], PRECISE_UNIT);
    assert_eq!(engine.rebalance_assets(), &[dai()]);
    assert_eq!(engine.asset_info(link).target_unit, U256::ZERO);
}

// ============================================================================
// Reentrancy
// ============================================================================

#[test]
fn venue_callback_cannot_reenter() {
    let (mut engine, _) = ready();
    let guard = engine.reentrancy_guard();
    engine.ledger_mut().unwrap().probe_reentrancy(guard.clone());

    engine.trade(&CallContext::direct(alice(), 10), dai()).unwrap();

    assert_eq!(engine.ledger().unwrap().reentry_attempts(), &[true]);
    assert!(!guard.is_entered());
}

#[test]
fn held_guard_blocks_trading() {
    let (mut engine, _) = ready();
    let token = engine.reentrancy_guard().enter().unwrap();
    assert_eq!(
        engine.trade(&CallContext::direct(alice(), 10), dai()).unwrap_err(),
        Error::Reentrant
    );
    assert_eq!(
        engine
            .trade_remaining_weth(&CallContext::direct(alice(), 10), dai())
            .unwrap_err(),
        Error::Reentrant
    );
    drop(token);
    assert!(engine.trade(&CallContext::direct(alice(), 10), dai()).is_ok());
}

#[test]
fn guard_released_after_failed_trade() {
    let (mut engine, _) = ready();
    let _ = engine.trade(&CallContext::direct(mallory(), 10), dai());
    assert!(!engine.reentrancy_guard().is_entered());
}

// ============================================================================
// Custom executors
// ============================================================================

/// Skips cool-off checks; everything else as stock.
#[derive(Clone, Copy)]
struct NoCoolOff;

impl TradeExecutor for NoCoolOff {
    fn validate_trade(&self, tracker: &TargetTracker, asset: Address, _now: Timestamp) -> Result<()> {
        if !tracker.in_rebalance(asset) {
            return Err(Error::NotInRebalance(asset));
        }
        Ok(())
    }
}

#[test]
fn executor_controls_validation() {
    let (mut engine, manager) = bound(NoCoolOff);
    engine
        .start_rebalance(&manager, &[dai()], &[units(500)], PRECISE_UNIT)
        .unwrap();
    engine
        .set_trade_maximums(&manager, &[dai()], &[units(100)])
        .unwrap();
    engine.set_exchanges(&manager, &[dai()], &[2]).unwrap();
    engine
        .set_cool_off_periods(&manager, &[dai()], &[3_600])
        .unwrap();
    engine.update_anyone_can_trade(&manager).unwrap();

    let ctx = CallContext::direct(alice(), 10);
    engine.trade(&ctx, dai()).unwrap();
    engine.trade(&ctx, dai()).unwrap();
    assert_eq!(
        engine.ledger().unwrap().held_unit(dai()).unwrap(),
        units(800)
    );
}

// ============================================================================
// Venue dispatch
// ============================================================================

#[test]
fn sell_approves_exact_amount() {
    let (mut engine, _) = ready();
    engine.trade(&CallContext::direct(alice(), 10), dai()).unwrap();

    let ledger = engine.ledger().unwrap();
    let uniswap = ledger.venues().uniswap_router;
    assert_eq!(ledger.approvals(), &[(dai(), uniswap, units(300))]);
    assert_eq!(ledger.swaps()[0].venue, Venue::Uniswap);
    assert_eq!(ledger.swaps()[0].amount_out, units(3));
}

#[test]
fn buy_approves_whole_weth_balance() {
    let (mut engine, manager) = ready();
    engine
        .start_rebalance(&manager, &[dai()], &[units(1050)], PRECISE_UNIT)
        .unwrap();
    engine.set_exchanges(&manager, &[dai()], &[1]).unwrap();
    engine.trade(&CallContext::direct(alice(), 10), dai()).unwrap();

    let ledger = engine.ledger().unwrap();
    let sushiswap = ledger.venues().sushiswap_router;
    assert_eq!(ledger.approvals(), &[(weth(), sushiswap, units(1))]);
    assert_eq!(ledger.swaps()[0].amount_in, from_half());
    assert_eq!(ledger.held_unit(dai()).unwrap(), units(1050));
}

fn from_half() -> U256 {
    indexbook::math::from_decimal(5, 1)
}
