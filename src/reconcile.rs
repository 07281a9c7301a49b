//! Post-trade position reconciliation.
//!
//! Quantities are measured from balances before and after dispatch, never
//! taken from the requested amount: the floating side of a swap is decided
//! by the venue, and rounding on the fixed side is venue-specific too.

use alloy_primitives::{Address, U256};

use crate::error::Result;
use crate::ledger::PortfolioLedger;
use crate::math::checked_sub;

/// Raw balances of both legs captured before dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PreTradeBalances {
    pub send: Address,
    pub receive: Address,
    pub send_balance: U256,
    pub receive_balance: U256,
}

impl PreTradeBalances {
    pub fn capture<L: PortfolioLedger>(ledger: &L, send: Address, receive: Address) -> Result<Self> {
        Ok(Self {
            send,
            receive,
            send_balance: ledger.balance_of(send)?,
            receive_balance: ledger.balance_of(receive)?,
        })
    }
}

/// Measured outcome of one executed trade.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TradeFill {
    pub send: Address,
    pub receive: Address,
    /// `pre - post` balance of the send asset.
    pub sent: U256,
    /// `post - pre` balance of the receive asset.
    pub received: U256,
    pub send_unit: U256,
    pub receive_unit: U256,
}

/// Rewrite both legs' units from observed balances and return the deltas.
pub fn reconcile_trade<L: PortfolioLedger>(ledger: &mut L, pre: &PreTradeBalances) -> Result<TradeFill> {
    let total_shares = ledger.total_shares()?;
    let send_edit = ledger.edit_position_from_balance(pre.send, total_shares, pre.send_balance)?;
    let receive_edit =
        ledger.edit_position_from_balance(pre.receive, total_shares, pre.receive_balance)?;

    Ok(TradeFill {
        send: pre.send,
        receive: pre.receive,
        sent: checked_sub(pre.send_balance, send_edit.balance)?,
        received: checked_sub(receive_edit.balance, pre.receive_balance)?,
        send_unit: send_edit.new_unit,
        receive_unit: receive_edit.new_unit,
    })
}
