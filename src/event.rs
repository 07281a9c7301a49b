//! Engine event records.
//!
//! Every committed state change appends one event (feature `event-log`).
//! Events from aborted operations are discarded with the rest of the
//! staged state, so the log only ever describes what actually happened.

use alloy_primitives::{Address, U256};

use crate::venue::Venue;

/// A committed engine state change.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "event", rename_all = "snake_case"))]
pub enum RebalanceEvent {
    TargetUnitsUpdated {
        asset: Address,
        new_unit: U256,
        position_multiplier: U256,
    },
    TradeMaximumUpdated {
        asset: Address,
        max_trade_size: U256,
    },
    AssetExchangeUpdated {
        asset: Address,
        venue: Venue,
    },
    CoolOffPeriodUpdated {
        asset: Address,
        cool_off_period: u64,
    },
    TraderStatusUpdated {
        trader: Address,
        allowed: bool,
    },
    AnyoneTradeUpdated {
        allowed: bool,
    },
    TradeExecuted {
        send: Address,
        receive: Address,
        trader: Address,
        venue: Venue,
        sent: U256,
        received: U256,
    },
    AssetTargetsRaised {
        position_multiplier: U256,
    },
}

impl RebalanceEvent {
    /// Short machine-readable name, as used in audit trails.
    pub fn name(&self) -> &'static str {
        match self {
            RebalanceEvent::TargetUnitsUpdated { .. } => "target_units_updated",
            RebalanceEvent::TradeMaximumUpdated { .. } => "trade_maximum_updated",
            RebalanceEvent::AssetExchangeUpdated { .. } => "asset_exchange_updated",
            RebalanceEvent::CoolOffPeriodUpdated { .. } => "cool_off_period_updated",
            RebalanceEvent::TraderStatusUpdated { .. } => "trader_status_updated",
            RebalanceEvent::AnyoneTradeUpdated { .. } => "anyone_trade_updated",
            RebalanceEvent::TradeExecuted { .. } => "trade_executed",
            RebalanceEvent::AssetTargetsRaised { .. } => "asset_targets_raised",
        }
    }
}
