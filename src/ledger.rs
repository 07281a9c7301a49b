//! Portfolio ledger interface.
//!
//! The ledger owns per-asset holdings, total supply and the position
//! multiplier. The engine never touches that storage directly: it reads
//! through this trait and writes back only via
//! [`PortfolioLedger::edit_position_from_balance`].

use alloy_primitives::{Address, U256};

use crate::error::Result;
use crate::math::{checked_sub, precise_div, precise_mul};

/// Result of re-deriving a position unit from an observed balance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PositionEdit {
    /// Balance observed after the trade.
    pub balance: U256,
    pub previous_unit: U256,
    pub new_unit: U256,
}

/// The external portfolio the engine rebalances.
pub trait PortfolioLedger {
    /// Address of the portfolio itself.
    fn address(&self) -> Address;

    /// Manager allowed to configure the rebalance.
    fn manager(&self) -> Address;

    /// Units of `asset` held per share (18 decimals).
    fn held_unit(&self, asset: Address) -> Result<U256>;

    /// Total portfolio shares outstanding (18 decimals).
    fn total_shares(&self) -> Result<U256>;

    /// Current position multiplier (18 decimals).
    fn position_multiplier(&self) -> Result<U256>;

    /// Assets with a non-zero position.
    fn held_assets(&self) -> Vec<Address>;

    /// Raw token balance the portfolio holds of `asset`.
    fn balance_of(&self, asset: Address) -> Result<U256>;

    /// Recompute the unit of `asset` from its current balance, given the
    /// balance measured before the trade, and store it.
    fn edit_position_from_balance(
        &mut self,
        asset: Address,
        total_shares: U256,
        pre_trade_balance: U256,
    ) -> Result<PositionEdit>;

    /// Grant `spender` an allowance of `amount` over the portfolio's `asset`.
    fn approve(&mut self, asset: Address, spender: Address, amount: U256) -> Result<()>;

    /// Perform an arbitrary call from the portfolio. A revert inside the
    /// target comes back as an error.
    fn invoke(&mut self, target: Address, value: U256, payload: &[u8]) -> Result<()>;
}

/// Unit after a balance change.
///
/// Any part of `pre_total_notional` not explained by `pre_unit * supply` is
/// treated as airdropped and excluded from the new unit, so only the
/// traded delta moves the position.
pub fn edited_position_unit(
    total_shares: U256,
    pre_total_notional: U256,
    post_total_notional: U256,
    pre_unit: U256,
) -> Result<U256> {
    let airdropped = checked_sub(pre_total_notional, precise_mul(pre_unit, total_shares)?)?;
    precise_div(checked_sub(post_total_notional, airdropped)?, total_shares)
}
