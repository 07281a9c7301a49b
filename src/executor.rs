//! Trade validation and execution strategy.
//!
//! The controller calls through [`TradeExecutor`] for the two steps that
//! deployments customise: deciding whether an asset may trade now, and
//! turning a sized order into a measured fill. Both methods have default
//! bodies; [`DefaultExecutor`] uses them unchanged.

use alloy_primitives::Address;

use crate::error::{Error, Result};
use crate::ledger::PortfolioLedger;
use crate::reconcile::{PreTradeBalances, TradeFill, reconcile_trade};
use crate::router::VenueRouter;
use crate::tracker::TargetTracker;
use crate::types::Timestamp;
use crate::venue::{SwapOrder, Venue};

pub trait TradeExecutor {
    /// Reject the trade unless `asset` is in the active rebalance, has a
    /// venue, and its cool-off period has elapsed at `now`.
    fn validate_trade(&self, tracker: &TargetTracker, asset: Address, now: Timestamp) -> Result<()> {
        if !tracker.in_rebalance(asset) {
            return Err(Error::NotInRebalance(asset));
        }
        let info = tracker.config(asset);
        if info.venue.is_none() {
            return Err(Error::VenueUnset(asset));
        }
        let remaining = info.cool_off_remaining(now);
        if remaining > 0 {
            return Err(Error::CoolOffActive { asset, remaining });
        }
        Ok(())
    }

    /// Dispatch `order` through `venue` and reconcile positions from the
    /// observed balance change.
    fn execute_trade<L: PortfolioLedger>(
        &self,
        ledger: &mut L,
        router: &VenueRouter,
        order: &SwapOrder,
        venue: Venue,
        now: Timestamp,
    ) -> Result<TradeFill> {
        let pre = PreTradeBalances::capture(ledger, order.send, order.receive)?;
        router.build_and_dispatch(ledger, order, venue, now)?;
        reconcile_trade(ledger, &pre)
    }
}

/// Stock validation and execution.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultExecutor;

impl TradeExecutor for DefaultExecutor {}
