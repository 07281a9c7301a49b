//! Target allocation tracker.
//!
//! Holds per-asset trade parameters, the set of assets under the active
//! rebalance, and the position multiplier snapshotted when targets were set.
//! Stored targets are rescaled by `current / stored` multiplier before any
//! comparison with live holdings, since fee accrual shrinks units over time.

use alloy_primitives::{Address, U256};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{Error, Result};
use crate::math::{PRECISE_UNIT, TARGET_RAISE_DIVISOR, checked_div, checked_mul, precise_div};
use crate::types::Timestamp;
use crate::venue::Venue;

/// Trade parameters of one asset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AssetTradeConfig {
    /// Target units per share at the stored multiplier. Zero means the asset
    /// is no longer targeted.
    pub target_unit: U256,
    /// Largest quantity a single trade may move.
    pub max_trade_size: U256,
    /// Minimum seconds between two trades of this asset.
    pub cool_off_period: u64,
    pub last_trade_timestamp: Timestamp,
    /// Venue trades are routed through. `None` until assigned.
    pub venue: Option<Venue>,
}

impl AssetTradeConfig {
    /// Seconds left before the asset may trade again at `now`.
    pub fn cool_off_remaining(&self, now: Timestamp) -> u64 {
        self.last_trade_timestamp
            .saturating_add(self.cool_off_period)
            .saturating_sub(now)
    }
}

#[derive(Clone, Debug)]
pub struct TargetTracker {
    native_asset: Address,
    assets: FxHashMap<Address, AssetTradeConfig>,
    rebalance_set: Vec<Address>,
    position_multiplier: U256,
}

impl TargetTracker {
    pub fn new(native_asset: Address) -> Self {
        Self {
            native_asset,
            assets: FxHashMap::default(),
            rebalance_set: Vec::new(),
            position_multiplier: PRECISE_UNIT,
        }
    }

    pub fn native_asset(&self) -> Address {
        self.native_asset
    }

    /// Seed targets from the portfolio's current positions so that every
    /// existing component has to be re-specified by the first rebalance.
    pub fn seed(&mut self, positions: &[(Address, U256)], multiplier: U256) {
        for &(asset, unit) in positions {
            let info = self.assets.entry(asset).or_default();
            info.target_unit = unit;
            info.last_trade_timestamp = 0;
        }
        self.position_multiplier = multiplier;
    }

    /// Load a new set of targets.
    ///
    /// Every asset in `held_assets` that still carries a non-zero target
    /// must appear in `assets`, even if only to be zeroed.
    pub fn start_rebalance(
        &mut self,
        assets: &[Address],
        target_units: &[U256],
        multiplier: U256,
        held_assets: &[Address],
    ) -> Result<()> {
        validate_arrays(assets, target_units)?;
        if let Some(&native) = assets.iter().find(|a| **a == self.native_asset) {
            return Err(Error::NativeAssetTarget(native));
        }
        if multiplier.is_zero() {
            return Err(Error::Arithmetic("position multiplier must be > 0"));
        }

        let listed: FxHashSet<Address> = assets.iter().copied().collect();
        for held in held_assets {
            if *held == self.native_asset || listed.contains(held) {
                continue;
            }
            if !self.config(*held).target_unit.is_zero() {
                return Err(Error::MissingComponent(*held));
            }
        }

        for (asset, unit) in assets.iter().zip(target_units) {
            self.assets.entry(*asset).or_default().target_unit = *unit;
        }
        self.rebalance_set = assets.to_vec();
        self.position_multiplier = multiplier;
        Ok(())
    }

    pub fn set_trade_maximums(&mut self, assets: &[Address], sizes: &[U256]) -> Result<()> {
        validate_arrays(assets, sizes)?;
        for (asset, size) in assets.iter().zip(sizes) {
            self.assets.entry(*asset).or_default().max_trade_size = *size;
        }
        Ok(())
    }

    /// Assign venues by numeric id. Fails without changing anything if any
    /// id is out of range.
    pub fn set_exchanges(&mut self, assets: &[Address], venue_ids: &[u8]) -> Result<()> {
        validate_arrays(assets, venue_ids)?;
        let venues = venue_ids
            .iter()
            .map(|id| Venue::try_from(*id))
            .collect::<Result<Vec<_>>>()?;
        for (asset, venue) in assets.iter().zip(venues) {
            self.assets.entry(*asset).or_default().venue = Some(venue);
        }
        Ok(())
    }

    pub fn set_cool_off_periods(&mut self, assets: &[Address], periods: &[u64]) -> Result<()> {
        validate_arrays(assets, periods)?;
        for (asset, period) in assets.iter().zip(periods) {
            self.assets.entry(*asset).or_default().cool_off_period = *period;
        }
        Ok(())
    }

    /// `target_unit * current_multiplier / stored_multiplier`.
    pub fn normalized_target(&self, asset: Address, current_multiplier: U256) -> Result<U256> {
        let target = self.config(asset).target_unit;
        checked_div(
            checked_mul(target, current_multiplier)?,
            self.position_multiplier,
        )
    }

    pub fn normalized_targets(
        &self,
        assets: &[Address],
        current_multiplier: U256,
    ) -> Result<Vec<U256>> {
        assets
            .iter()
            .map(|asset| self.normalized_target(*asset, current_multiplier))
            .collect()
    }

    /// Trade parameters of `asset`; all-zero if never configured.
    pub fn config(&self, asset: Address) -> AssetTradeConfig {
        self.assets.get(&asset).copied().unwrap_or_default()
    }

    pub fn rebalance_assets(&self) -> &[Address] {
        &self.rebalance_set
    }

    pub fn in_rebalance(&self, asset: Address) -> bool {
        self.rebalance_set.contains(&asset)
    }

    pub fn position_multiplier(&self) -> U256 {
        self.position_multiplier
    }

    /// Scale the stored multiplier down by 25 bps, raising every normalized
    /// target by the same factor. Returns the new multiplier.
    pub fn raise_targets(&mut self) -> Result<U256> {
        self.position_multiplier = precise_div(self.position_multiplier, TARGET_RAISE_DIVISOR)?;
        Ok(self.position_multiplier)
    }

    pub fn record_trade(&mut self, asset: Address, now: Timestamp) {
        self.assets.entry(asset).or_default().last_trade_timestamp = now;
    }
}

/// Parallel arrays must be non-empty, equal length, and name each asset once.
pub fn validate_arrays<T>(assets: &[Address], values: &[T]) -> Result<()> {
    if assets.len() != values.len() {
        return Err(Error::LengthMismatch {
            left: assets.len(),
            right: values.len(),
        });
    }
    validate_addresses(assets)
}

/// An address list must be non-empty and name each address once.
pub fn validate_addresses(addresses: &[Address]) -> Result<()> {
    if addresses.is_empty() {
        return Err(Error::EmptyArray);
    }
    let mut seen = FxHashSet::default();
    for address in addresses {
        if !seen.insert(*address) {
            return Err(Error::DuplicateAsset(*address));
        }
    }
    Ok(())
}
