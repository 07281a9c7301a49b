//! Trade sizing and direction.
//!
//! Pure reads of tracker and ledger state: nothing here mutates or calls a
//! venue, so the whole module can be exercised without venue behavior.

use alloy_primitives::{Address, U256};

use crate::error::{Error, Result};
use crate::ledger::PortfolioLedger;
use crate::math::{precise_mul, precise_mul_ceil};
use crate::tracker::TargetTracker;
use crate::types::Side;

/// Direction and bounded quantity of the next trade for one asset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TradeSize {
    pub side: Side,
    pub quantity: U256,
}

/// Compute the next trade for `asset`.
///
/// Compares held and normalized target notionals (`unit * total shares`)
/// and caps the gap at the asset's `max_trade_size`.
pub fn size_and_direction<L: PortfolioLedger>(
    tracker: &TargetTracker,
    ledger: &L,
    asset: Address,
) -> Result<TradeSize> {
    let total_shares = ledger.total_shares()?;
    let current_unit = ledger.held_unit(asset)?;
    let target_unit = tracker.normalized_target(asset, ledger.position_multiplier()?)?;

    let current_notional = precise_mul(current_unit, total_shares)?;
    let target_notional = precise_mul_ceil(target_unit, total_shares)?;

    size_from_notionals(
        asset,
        current_notional,
        target_notional,
        tracker.config(asset).max_trade_size,
    )
}

/// Direction and capped magnitude of the gap between two notionals.
pub fn size_from_notionals(
    asset: Address,
    current_notional: U256,
    target_notional: U256,
    max_trade_size: U256,
) -> Result<TradeSize> {
    if current_notional == target_notional {
        return Err(Error::TargetAlreadyMet(asset));
    }
    let (side, gap) = if target_notional > current_notional {
        (Side::Buy, target_notional - current_notional)
    } else {
        (Side::Sell, current_notional - target_notional)
    };
    Ok(TradeSize {
        side,
        quantity: gap.min(max_trade_size),
    })
}

/// Whether `asset` still holds more than its normalized target. A missing
/// venue does not matter here: the asset is overweight either way.
pub fn can_sell<L: PortfolioLedger>(
    tracker: &TargetTracker,
    ledger: &L,
    asset: Address,
) -> Result<bool> {
    let target = tracker.normalized_target(asset, ledger.position_multiplier()?)?;
    Ok(target < ledger.held_unit(asset)?)
}

/// True when no asset in the active rebalance still needs selling.
pub fn nothing_left_to_sell<L: PortfolioLedger>(tracker: &TargetTracker, ledger: &L) -> Result<bool> {
    for asset in tracker.rebalance_assets() {
        if can_sell(tracker, ledger, *asset)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// True when every asset in the active rebalance sits exactly on its
/// normalized target unit.
pub fn all_targets_met<L: PortfolioLedger>(tracker: &TargetTracker, ledger: &L) -> Result<bool> {
    let multiplier = ledger.position_multiplier()?;
    for asset in tracker.rebalance_assets() {
        if tracker.normalized_target(*asset, multiplier)? != ledger.held_unit(*asset)? {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{PRECISE_UNIT, from_decimal, units};
    use crate::mock::MockPortfolio;

    fn weth() -> Address {
        Address::repeat_byte(0xee)
    }
    fn dai() -> Address {
        Address::repeat_byte(0xd1)
    }

    fn setup(held: U256, target: U256, max: U256) -> (TargetTracker, MockPortfolio) {
        let portfolio = MockPortfolio::builder()
            .with_position(dai(), held)
            .with_position(weth(), units(1))
            .build();
        let mut tracker = TargetTracker::new(weth());
        tracker
            .start_rebalance(&[dai()], &[target], PRECISE_UNIT, &[])
            .unwrap();
        tracker.set_trade_maximums(&[dai()], &[max]).unwrap();
        (tracker, portfolio)
    }

    #[test]
    fn buy_capped_at_max_trade_size() {
        let (tracker, portfolio) = setup(units(100), units(150), units(30));
        let size = size_and_direction(&tracker, &portfolio, dai()).unwrap();
        assert_eq!(size, TradeSize { side: Side::Buy, quantity: units(30) });
    }

    #[test]
    fn sell_uses_gap_when_below_cap() {
        let (tracker, portfolio) = setup(units(100), units(90), units(30));
        let size = size_and_direction(&tracker, &portfolio, dai()).unwrap();
        assert_eq!(size, TradeSize { side: Side::Sell, quantity: units(10) });
    }

    #[test]
    fn equal_notionals_fail() {
        let (tracker, portfolio) = setup(units(100), units(100), units(30));
        assert_eq!(
            size_and_direction(&tracker, &portfolio, dai()),
            Err(Error::TargetAlreadyMet(dai()))
        );
    }

    #[test]
    fn notional_scales_with_total_shares() {
        let portfolio = MockPortfolio::builder()
            .total_shares(units(4))
            .with_position(dai(), units(10))
            .build();
        let mut tracker = TargetTracker::new(weth());
        tracker.start_rebalance(&[dai()], &[units(12)], PRECISE_UNIT, &[]).unwrap();
        tracker.set_trade_maximums(&[dai()], &[units(1_000)]).unwrap();

        // (12 - 10) * 4 shares
        let size = size_and_direction(&tracker, &portfolio, dai()).unwrap();
        assert_eq!(size.quantity, units(8));
    }

    #[test]
    fn normalized_target_drives_direction() {
        // Target 100 stored at 1.0; fees shrank the multiplier to 0.98 so the
        // held 98 units already match.
        let mut portfolio = MockPortfolio::builder()
            .with_position(dai(), units(100))
            .build();
        portfolio.accrue_fee(from_decimal(98, 2)).unwrap();
        let mut tracker = TargetTracker::new(weth());
        tracker.start_rebalance(&[dai()], &[units(100)], PRECISE_UNIT, &[]).unwrap();

        assert!(all_targets_met(&tracker, &portfolio).unwrap());
    }

    #[test]
    fn overweight_is_sellable_without_venue() {
        let (mut tracker, portfolio) = setup(units(100), units(50), units(30));
        assert!(can_sell(&tracker, &portfolio, dai()).unwrap());
        assert!(!nothing_left_to_sell(&tracker, &portfolio).unwrap());
        tracker.set_exchanges(&[dai()], &[1]).unwrap();
        assert!(can_sell(&tracker, &portfolio, dai()).unwrap());
    }

    #[test]
    fn underweight_asset_is_not_sellable() {
        let (mut tracker, portfolio) = setup(units(100), units(150), units(30));
        tracker.set_exchanges(&[dai()], &[0]).unwrap();
        assert!(nothing_left_to_sell(&tracker, &portfolio).unwrap());
        assert!(!all_targets_met(&tracker, &portfolio).unwrap());
    }
}
