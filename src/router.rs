//! Venue router: approve the venue, then dispatch the encoded swap through
//! the portfolio in a single call.

use alloy_primitives::{Address, U256};
use log::debug;

use crate::error::Result;
use crate::ledger::PortfolioLedger;
use crate::types::Timestamp;
use crate::venue::{SwapOrder, Venue, VenueAddresses, VenueCall};

/// Routes swap orders to their assigned venue.
#[derive(Clone, Copy, Debug)]
pub struct VenueRouter {
    addresses: VenueAddresses,
    native_asset: Address,
}

impl VenueRouter {
    pub fn new(addresses: VenueAddresses, native_asset: Address) -> Self {
        Self {
            addresses,
            native_asset,
        }
    }

    pub fn addresses(&self) -> &VenueAddresses {
        &self.addresses
    }

    /// Approve the venue for the send side and dispatch `order`.
    ///
    /// When spending the native-wrapped asset the whole balance is approved,
    /// since the exact spend of a fixed-buy or sweep trade is decided by the
    /// venue. Any other asset is approved for exactly `order.quantity`.
    pub fn build_and_dispatch<L: PortfolioLedger>(
        &self,
        ledger: &mut L,
        order: &SwapOrder,
        venue: Venue,
        now: Timestamp,
    ) -> Result<VenueCall> {
        let call = venue.build_call(&self.addresses, order, ledger.address(), now);

        let approve_amount = if order.send == self.native_asset {
            ledger.balance_of(self.native_asset)?
        } else {
            order.quantity
        };

        debug!(
            "dispatching {venue} swap {} -> {} ({:?} fixed, qty {})",
            order.send, order.receive, order.fixed, order.quantity
        );

        ledger.approve(order.send, call.target, approve_amount)?;
        ledger.invoke(call.target, U256::ZERO, &call.payload)?;
        Ok(call)
    }
}
