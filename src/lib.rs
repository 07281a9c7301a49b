//! # indexbook
//!
//! A phased rebalancing engine for tokenized index portfolios.
//!
//! A manager sets per-asset target units; allowed traders then walk the
//! portfolio toward those targets one bounded trade at a time, each trade
//! routed through Uniswap, Sushiswap or Balancer against the native-wrapped
//! asset. Positions are reconciled from observed balance changes, never from
//! quoted amounts.
//!
//! ## Features
//!
//! - **Bounded trades**: per-asset maximum trade size and cool-off period
//! - **Fee-aware targets**: targets rescale with the portfolio's position multiplier
//! - **Three venues**: ABI-encoded swap calls for V2-style routers and Balancer
//! - **All-or-nothing**: every operation commits fully or leaves no trace
//! - **Reentrancy guard**: trading operations cannot be re-entered from a venue
//!
//! ## Quick Start
//!
//! ```
//! use alloy_primitives::Address;
//! use indexbook::math::{units, PRECISE_UNIT};
//! use indexbook::mock::MockPortfolio;
//! use indexbook::{CallContext, EngineConfig, IndexRebalancer, PortfolioLedger, Side};
//!
//! let weth = Address::repeat_byte(0xee);
//! let link = Address::repeat_byte(0x11);
//!
//! let portfolio = MockPortfolio::builder()
//!     .with_position(weth, units(10))
//!     .with_rate(link, weth, units(100), units(1))
//!     .build();
//! let manager = portfolio.manager();
//! let venues = portfolio.venues();
//!
//! let mut engine = IndexRebalancer::new(EngineConfig { native_asset: weth, venues });
//! let ctx = CallContext::direct(manager, 1_700_000_000);
//! engine.initialize(&ctx, portfolio).unwrap();
//!
//! // Target 300 LINK per share, at most 100 LINK per trade
//! engine.start_rebalance(&ctx, &[link], &[units(300)], PRECISE_UNIT).unwrap();
//! engine.set_trade_maximums(&ctx, &[link], &[units(100)]).unwrap();
//! engine.set_exchanges(&ctx, &[link], &[1]).unwrap();
//! engine.update_trader_status(&ctx, &[manager]).unwrap();
//!
//! assert_eq!(engine.preview_trade(link).unwrap().side, Side::Buy);
//! let fill = engine.trade(&ctx, link).unwrap();
//! assert_eq!(fill.received, units(100));
//! assert_eq!(fill.sent, units(1));
//! ```
//!
//! ## Fixed Point
//!
//! Units, shares and multipliers are 18-decimal fixed point in [`U256`](alloy_primitives::U256):
//!
//! ```
//! use indexbook::math::{format_precise, from_decimal};
//!
//! let half = from_decimal(5, 1);
//! assert_eq!(format_precise(half), "0.5");
//! ```

mod access;
mod engine;
mod error;
mod event;
mod executor;
mod guard;
mod ledger;
pub mod math;
pub mod mock;
#[cfg(feature = "persistence")]
pub mod persistence;
mod reconcile;
mod router;
pub mod sizing;
mod tracker;
mod types;
mod venue;

// Re-export public API
pub use access::AccessGate;
pub use engine::{EngineConfig, IndexRebalancer};
pub use error::{Error, ErrorKind, Result};
pub use event::RebalanceEvent;
pub use executor::{DefaultExecutor, TradeExecutor};
pub use guard::{Entered, ReentrancyGuard};
pub use ledger::{PortfolioLedger, PositionEdit, edited_position_unit};
pub use reconcile::{PreTradeBalances, TradeFill, reconcile_trade};
pub use router::VenueRouter;
pub use sizing::TradeSize;
pub use tracker::{AssetTradeConfig, TargetTracker, validate_addresses, validate_arrays};
pub use types::{CallContext, FixedSide, Side, Timestamp};
pub use venue::{
    BALANCER_POOL_LIMIT, DEADLINE_GRACE_SECS, IBalancerExchangeProxy, IUniswapV2Router,
    SwapOrder, Venue, VenueAddresses, VenueCall,
};
