//! Access gate for trading operations.

use alloy_primitives::Address;
use rustc_hash::FxHashSet;

/// Allow-list of traders plus a global bypass flag.
#[derive(Clone, Debug, Default)]
pub struct AccessGate {
    traders: FxHashSet<Address>,
    anyone_can_trade: bool,
}

impl AccessGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_authorized(&self, caller: Address) -> bool {
        self.anyone_can_trade || self.traders.contains(&caller)
    }

    pub fn is_trader(&self, caller: Address) -> bool {
        self.traders.contains(&caller)
    }

    pub fn anyone_can_trade(&self) -> bool {
        self.anyone_can_trade
    }

    /// Flip `trader`'s allow-list entry. Returns the new status.
    pub fn toggle_trader(&mut self, trader: Address) -> bool {
        if self.traders.remove(&trader) {
            false
        } else {
            self.traders.insert(trader);
            true
        }
    }

    /// Flip the global bypass. Returns the new value.
    pub fn toggle_anyone_can_trade(&mut self) -> bool {
        self.anyone_can_trade = !self.anyone_can_trade;
        self.anyone_can_trade
    }
}
