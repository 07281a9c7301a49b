//! Rebalance controller.
//!
//! Owns the tracker, access gate, router and executor for exactly one
//! portfolio, and sequences every public operation. Mutating operations run
//! against a staged copy of the engine (ledger included) that replaces the
//! live state only on success, so an error anywhere, including after a venue
//! has already moved balances, leaves no trace.

use alloy_primitives::{Address, U256};
use log::{debug, info, warn};

use crate::access::AccessGate;
use crate::error::{Error, Result};
use crate::event::RebalanceEvent;
use crate::executor::{DefaultExecutor, TradeExecutor};
use crate::guard::ReentrancyGuard;
use crate::ledger::PortfolioLedger;
use crate::reconcile::TradeFill;
use crate::router::VenueRouter;
use crate::sizing::{self, TradeSize};
use crate::tracker::{AssetTradeConfig, TargetTracker, validate_addresses};
use crate::types::{CallContext, FixedSide, Side};
use crate::venue::{SwapOrder, Venue, VenueAddresses};

/// Static engine parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// The native-wrapped asset every trade is quoted against.
    pub native_asset: Address,
    pub venues: VenueAddresses,
}

#[derive(Clone, Debug)]
enum Binding<L> {
    Unbound,
    Bound(L),
    Removed(L),
}

fn bound<L>(binding: &Binding<L>) -> Result<&L> {
    match binding {
        Binding::Bound(ledger) => Ok(ledger),
        _ => Err(Error::NotInitialized),
    }
}

fn bound_mut<L>(binding: &mut Binding<L>) -> Result<&mut L> {
    match binding {
        Binding::Bound(ledger) => Ok(ledger),
        _ => Err(Error::NotInitialized),
    }
}

/// Phased rebalancing engine for one portfolio.
///
/// ```
/// use alloy_primitives::Address;
/// use indexbook::math::{units, PRECISE_UNIT};
/// use indexbook::mock::MockPortfolio;
/// use indexbook::{CallContext, EngineConfig, IndexRebalancer, PortfolioLedger};
///
/// let weth = Address::repeat_byte(0xee);
/// let dai = Address::repeat_byte(0xd1);
/// let portfolio = MockPortfolio::builder()
///     .with_position(weth, units(1))
///     .with_position(dai, units(100))
///     .with_rate(dai, weth, units(100), units(1))
///     .build();
/// let manager = portfolio.manager();
/// let venues = portfolio.venues();
///
/// let mut engine = IndexRebalancer::new(EngineConfig { native_asset: weth, venues });
/// let ctx = CallContext::direct(manager, 1_000);
/// engine.initialize(&ctx, portfolio).unwrap();
///
/// engine.start_rebalance(&ctx, &[dai], &[units(50)], PRECISE_UNIT).unwrap();
/// engine.set_trade_maximums(&ctx, &[dai], &[units(20)]).unwrap();
/// engine.set_exchanges(&ctx, &[dai], &[0]).unwrap();
/// engine.update_anyone_can_trade(&ctx).unwrap();
///
/// let fill = engine.trade(&ctx, dai).unwrap();
/// assert_eq!(fill.sent, units(20));
/// assert_eq!(engine.ledger().unwrap().held_unit(dai).unwrap(), units(80));
/// ```
#[derive(Clone, Debug)]
pub struct IndexRebalancer<L, X = DefaultExecutor> {
    binding: Binding<L>,
    tracker: TargetTracker,
    access: AccessGate,
    router: VenueRouter,
    executor: X,
    guard: ReentrancyGuard,
    #[cfg(feature = "event-log")]
    events: Vec<RebalanceEvent>,
}

impl<L> IndexRebalancer<L, DefaultExecutor>
where
    L: PortfolioLedger + Clone,
{
    pub fn new(config: EngineConfig) -> Self {
        Self::with_executor(config, DefaultExecutor)
    }
}

impl<L, X> IndexRebalancer<L, X>
where
    L: PortfolioLedger + Clone,
    X: TradeExecutor + Clone,
{
    /// Create an unbound engine that validates and executes trades through
    /// `executor`.
    pub fn with_executor(config: EngineConfig, executor: X) -> Self {
        Self {
            binding: Binding::Unbound,
            tracker: TargetTracker::new(config.native_asset),
            access: AccessGate::new(),
            router: VenueRouter::new(config.venues, config.native_asset),
            executor,
            guard: ReentrancyGuard::new(),
            #[cfg(feature = "event-log")]
            events: Vec::new(),
        }
    }

    // === Lifecycle ===

    /// Bind the engine to `ledger`. Only its manager may do this, and only
    /// once per engine: rebinding or binding after removal fails.
    ///
    /// Every currently held asset's target is seeded with its current unit.
    pub fn initialize(&mut self, ctx: &CallContext, ledger: L) -> Result<()> {
        if !matches!(self.binding, Binding::Unbound) {
            return Err(Error::AlreadyInitialized);
        }
        if ctx.sender != ledger.manager() {
            return Err(Error::NotManager(ctx.sender));
        }

        let positions = ledger
            .held_assets()
            .into_iter()
            .map(|asset| Ok::<_, Error>((asset, ledger.held_unit(asset)?)))
            .collect::<Result<Vec<_>>>()?;
        let multiplier = ledger.position_multiplier()?;

        self.tracker.seed(&positions, multiplier);
        info!(
            "bound to portfolio {} with {} positions",
            ledger.address(),
            positions.len()
        );
        self.binding = Binding::Bound(ledger);
        Ok(())
    }

    /// Detach from the portfolio. Only the portfolio itself may call this.
    pub fn remove_module(&mut self, ctx: &CallContext) -> Result<()> {
        let ledger = bound(&self.binding)?;
        if ctx.sender != ledger.address() {
            return Err(Error::NotPortfolio(ctx.sender));
        }
        if let Binding::Bound(ledger) = std::mem::replace(&mut self.binding, Binding::Unbound) {
            info!("removed from portfolio {}", ledger.address());
            self.binding = Binding::Removed(ledger);
        }
        Ok(())
    }

    // === Manager operations ===

    /// Replace the active rebalance with new target units.
    pub fn start_rebalance(
        &mut self,
        ctx: &CallContext,
        assets: &[Address],
        target_units: &[U256],
        position_multiplier: U256,
    ) -> Result<()> {
        self.transact(|engine| {
            engine.only_manager(ctx)?;
            let held = bound(&engine.binding)?.held_assets();
            engine
                .tracker
                .start_rebalance(assets, target_units, position_multiplier, &held)?;

            for (asset, unit) in assets.iter().zip(target_units) {
                engine.emit(RebalanceEvent::TargetUnitsUpdated {
                    asset: *asset,
                    new_unit: *unit,
                    position_multiplier,
                });
            }
            info!("rebalance started for {} assets", assets.len());
            Ok(())
        })
    }

    pub fn set_trade_maximums(
        &mut self,
        ctx: &CallContext,
        assets: &[Address],
        sizes: &[U256],
    ) -> Result<()> {
        self.transact(|engine| {
            engine.only_manager(ctx)?;
            engine.tracker.set_trade_maximums(assets, sizes)?;
            for (asset, size) in assets.iter().zip(sizes) {
                engine.emit(RebalanceEvent::TradeMaximumUpdated {
                    asset: *asset,
                    max_trade_size: *size,
                });
            }
            Ok(())
        })
    }

    /// Assign venues by id (`0` Uniswap, `1` Sushiswap, `2` Balancer).
    pub fn set_exchanges(
        &mut self,
        ctx: &CallContext,
        assets: &[Address],
        venue_ids: &[u8],
    ) -> Result<()> {
        self.transact(|engine| {
            engine.only_manager(ctx)?;
            engine.tracker.set_exchanges(assets, venue_ids)?;
            for asset in assets {
                if let Some(venue) = engine.tracker.config(*asset).venue {
                    engine.emit(RebalanceEvent::AssetExchangeUpdated {
                        asset: *asset,
                        venue,
                    });
                }
            }
            Ok(())
        })
    }

    pub fn set_cool_off_periods(
        &mut self,
        ctx: &CallContext,
        assets: &[Address],
        periods: &[u64],
    ) -> Result<()> {
        self.transact(|engine| {
            engine.only_manager(ctx)?;
            engine.tracker.set_cool_off_periods(assets, periods)?;
            for (asset, period) in assets.iter().zip(periods) {
                engine.emit(RebalanceEvent::CoolOffPeriodUpdated {
                    asset: *asset,
                    cool_off_period: *period,
                });
            }
            Ok(())
        })
    }

    /// Flip each trader's allow-list entry.
    pub fn update_trader_status(&mut self, ctx: &CallContext, traders: &[Address]) -> Result<()> {
        self.transact(|engine| {
            engine.only_manager(ctx)?;
            validate_addresses(traders)?;
            for trader in traders {
                let allowed = engine.access.toggle_trader(*trader);
                engine.emit(RebalanceEvent::TraderStatusUpdated {
                    trader: *trader,
                    allowed,
                });
            }
            Ok(())
        })
    }

    /// Flip the anyone-can-trade bypass. Returns the new value.
    pub fn update_anyone_can_trade(&mut self, ctx: &CallContext) -> Result<bool> {
        self.transact(|engine| {
            engine.only_manager(ctx)?;
            let allowed = engine.access.toggle_anyone_can_trade();
            engine.emit(RebalanceEvent::AnyoneTradeUpdated { allowed });
            Ok(allowed)
        })
    }

    // === Trading ===

    /// Trade `asset` one bounded step toward its normalized target.
    ///
    /// Buys spend the native-wrapped asset for an exact amount of `asset`;
    /// sells spend an exact amount of `asset` for the native-wrapped asset.
    pub fn trade(&mut self, ctx: &CallContext, asset: Address) -> Result<TradeFill> {
        let _entered = self.guard.enter()?;
        self.transact(|engine| {
            engine.only_allowed_trader(ctx)?;
            engine.reject_native(asset)?;
            engine
                .executor
                .validate_trade(&engine.tracker, asset, ctx.timestamp)?;

            let native = engine.tracker.native_asset();
            let ledger = bound_mut(&mut engine.binding)?;
            let size = sizing::size_and_direction(&engine.tracker, &*ledger, asset)?;
            let venue = assigned_venue(&engine.tracker, asset)?;
            debug!("sized {asset}: {} {}", size.side, size.quantity);

            let order = match size.side {
                Side::Buy => SwapOrder {
                    send: native,
                    receive: asset,
                    fixed: FixedSide::Buy,
                    quantity: size.quantity,
                },
                Side::Sell => SwapOrder {
                    send: asset,
                    receive: native,
                    fixed: FixedSide::Sell,
                    quantity: size.quantity,
                },
            };
            let fill = engine
                .executor
                .execute_trade(ledger, &engine.router, &order, venue, ctx.timestamp)?;

            engine.tracker.record_trade(asset, ctx.timestamp);
            engine.record_fill(ctx, venue, &fill);
            Ok(fill)
        })
    }

    /// Spend the entire native-wrapped balance on `asset`.
    ///
    /// Only allowed once nothing in the rebalance needs selling. The buy
    /// side floats, so the purchase is checked after execution and must not
    /// exceed the size an ordinary trade would have allowed.
    pub fn trade_remaining_weth(&mut self, ctx: &CallContext, asset: Address) -> Result<TradeFill> {
        let _entered = self.guard.enter()?;
        self.transact(|engine| {
            engine.only_allowed_trader(ctx)?;
            engine.reject_native(asset)?;

            let native = engine.tracker.native_asset();
            let ledger = bound_mut(&mut engine.binding)?;
            if !sizing::nothing_left_to_sell(&engine.tracker, &*ledger)? {
                return Err(Error::SellableAssetsRemain);
            }
            engine
                .executor
                .validate_trade(&engine.tracker, asset, ctx.timestamp)?;

            let limit = sizing::size_and_direction(&engine.tracker, &*ledger, asset)?.quantity;
            let venue = assigned_venue(&engine.tracker, asset)?;
            let order = SwapOrder {
                send: native,
                receive: asset,
                fixed: FixedSide::Sell,
                quantity: ledger.balance_of(native)?,
            };
            let fill = engine
                .executor
                .execute_trade(ledger, &engine.router, &order, venue, ctx.timestamp)?;

            if fill.received > limit {
                return Err(Error::SweepExceedsLimit {
                    bought: fill.received,
                    limit,
                });
            }

            engine.tracker.record_trade(asset, ctx.timestamp);
            engine.record_fill(ctx, venue, &fill);
            Ok(fill)
        })
    }

    /// Raise every normalized target by 25 bps. Requires all targets met and
    /// some native-wrapped balance left to deploy. Returns the new stored
    /// multiplier.
    pub fn raise_asset_targets(&mut self, ctx: &CallContext) -> Result<U256> {
        let _entered = self.guard.enter()?;
        self.transact(|engine| {
            engine.only_allowed_trader(ctx)?;
            let ledger = bound(&engine.binding)?;
            let native = engine.tracker.native_asset();
            let met = sizing::all_targets_met(&engine.tracker, ledger)?;
            if !met || ledger.held_unit(native)?.is_zero() {
                return Err(Error::CannotRaiseTargets);
            }

            let position_multiplier = engine.tracker.raise_targets()?;
            engine.emit(RebalanceEvent::AssetTargetsRaised {
                position_multiplier,
            });
            info!("asset targets raised, multiplier now {position_multiplier}");
            Ok(position_multiplier)
        })
    }

    // === Reads ===

    /// Each asset's target rescaled by the live position multiplier.
    pub fn get_normalized_targets(&self, assets: &[Address]) -> Result<Vec<U256>> {
        let ledger = bound(&self.binding)?;
        self.tracker
            .normalized_targets(assets, ledger.position_multiplier()?)
    }

    /// The trade [`trade`](Self::trade) would attempt for `asset` right now,
    /// ignoring access and cool-off checks.
    pub fn preview_trade(&self, asset: Address) -> Result<TradeSize> {
        sizing::size_and_direction(&self.tracker, bound(&self.binding)?, asset)
    }

    /// Whether every asset in the active rebalance sits on its target.
    pub fn targets_met(&self) -> Result<bool> {
        sizing::all_targets_met(&self.tracker, bound(&self.binding)?)
    }

    /// Whether any asset in the active rebalance still needs selling.
    pub fn has_assets_to_sell(&self) -> Result<bool> {
        Ok(!sizing::nothing_left_to_sell(&self.tracker, bound(&self.binding)?)?)
    }

    pub fn asset_info(&self, asset: Address) -> AssetTradeConfig {
        self.tracker.config(asset)
    }

    pub fn rebalance_assets(&self) -> &[Address] {
        self.tracker.rebalance_assets()
    }

    /// Multiplier stored when targets were last set or raised.
    pub fn position_multiplier(&self) -> U256 {
        self.tracker.position_multiplier()
    }

    pub fn native_asset(&self) -> Address {
        self.tracker.native_asset()
    }

    pub fn is_trader(&self, trader: Address) -> bool {
        self.access.is_trader(trader)
    }

    pub fn anyone_can_trade(&self) -> bool {
        self.access.anyone_can_trade()
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self.binding, Binding::Bound(_))
    }

    /// The bound portfolio (also available after removal).
    pub fn ledger(&self) -> Option<&L> {
        match &self.binding {
            Binding::Bound(ledger) | Binding::Removed(ledger) => Some(ledger),
            Binding::Unbound => None,
        }
    }

    /// Mutable access to the bound portfolio, for changes made outside the
    /// engine such as fee accrual.
    pub fn ledger_mut(&mut self) -> Option<&mut L> {
        match &mut self.binding {
            Binding::Bound(ledger) | Binding::Removed(ledger) => Some(ledger),
            Binding::Unbound => None,
        }
    }

    /// Handle on the reentrancy guard held during trading operations.
    pub fn reentrancy_guard(&self) -> ReentrancyGuard {
        self.guard.clone()
    }

    /// Committed events in order.
    #[cfg(feature = "event-log")]
    pub fn events(&self) -> &[RebalanceEvent] {
        &self.events
    }

    /// Clear the event log.
    #[cfg(feature = "event-log")]
    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    // === Internal ===

    /// Run `op` on a staged copy; commit it only if `op` succeeds.
    ///
    /// The event log stays out of the copy. The staged engine starts with an
    /// empty log and its events are appended on commit.
    fn transact<T>(&mut self, op: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        #[cfg(feature = "event-log")]
        let committed = std::mem::take(&mut self.events);
        let mut staged = self.clone();
        #[cfg(feature = "event-log")]
        {
            self.events = committed;
        }

        match op(&mut staged) {
            Ok(value) => {
                #[cfg(feature = "event-log")]
                {
                    let mut events = std::mem::take(&mut self.events);
                    events.append(&mut staged.events);
                    staged.events = events;
                }
                *self = staged;
                Ok(value)
            }
            Err(e) => {
                warn!("operation aborted: {e}");
                Err(e)
            }
        }
    }

    fn only_manager(&self, ctx: &CallContext) -> Result<()> {
        if bound(&self.binding)?.manager() != ctx.sender {
            return Err(Error::NotManager(ctx.sender));
        }
        Ok(())
    }

    fn only_allowed_trader(&self, ctx: &CallContext) -> Result<()> {
        bound(&self.binding)?;
        if !self.access.is_authorized(ctx.sender) {
            return Err(Error::NotAllowedTrader(ctx.sender));
        }
        if !ctx.is_direct() {
            return Err(Error::RelayedCall {
                sender: ctx.sender,
                origin: ctx.origin,
            });
        }
        Ok(())
    }

    fn reject_native(&self, asset: Address) -> Result<()> {
        if asset == self.tracker.native_asset() {
            return Err(Error::NativeAssetTarget(asset));
        }
        Ok(())
    }

    fn record_fill(&mut self, ctx: &CallContext, venue: Venue, fill: &TradeFill) {
        info!(
            "trade executed via {venue}: sent {} of {}, received {} of {}",
            fill.sent, fill.send, fill.received, fill.receive
        );
        self.emit(RebalanceEvent::TradeExecuted {
            send: fill.send,
            receive: fill.receive,
            trader: ctx.sender,
            venue,
            sent: fill.sent,
            received: fill.received,
        });
    }

    #[cfg(feature = "event-log")]
    fn emit(&mut self, event: RebalanceEvent) {
        self.events.push(event);
    }

    #[cfg(not(feature = "event-log"))]
    fn emit(&mut self, _event: RebalanceEvent) {}
}

fn assigned_venue(tracker: &TargetTracker, asset: Address) -> Result<Venue> {
    tracker.config(asset).venue.ok_or(Error::VenueUnset(asset))
}
