//! Core types: Side, FixedSide, CallContext, Timestamp

use std::fmt;

use alloy_primitives::Address;

/// Seconds since the unix epoch, as reported by the hosting platform.
pub type Timestamp = u64;

/// Direction of a rebalance trade for the traded asset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Side {
    /// Asset is underweight: spend native-wrapped balance to acquire it.
    Buy,
    /// Asset is overweight: sell it for the native-wrapped asset.
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Which leg of a swap is specified exactly. The other leg floats and is
/// determined by venue execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FixedSide {
    /// Exact input amount, any output of at least one unit.
    Sell,
    /// Exact output amount, input bounded only by the available balance.
    Buy,
}

impl FixedSide {
    #[inline]
    pub fn is_sell(self) -> bool {
        matches!(self, FixedSide::Sell)
    }
}

/// Who is calling and when.
///
/// `sender` is the immediate caller, `origin` the account that initiated the
/// transaction. They differ when a call was relayed through another contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallContext {
    pub sender: Address,
    pub origin: Address,
    pub timestamp: Timestamp,
}

impl CallContext {
    /// A call made directly by `caller`.
    pub fn direct(caller: Address, timestamp: Timestamp) -> Self {
        Self {
            sender: caller,
            origin: caller,
            timestamp,
        }
    }

    /// A call relayed by `relayer` on behalf of `origin`.
    pub fn relayed(relayer: Address, origin: Address, timestamp: Timestamp) -> Self {
        Self {
            sender: relayer,
            origin,
            timestamp,
        }
    }

    #[inline]
    pub fn is_direct(&self) -> bool {
        self.sender == self.origin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_display() {
        assert_eq!(format!("{}", Side::Buy), "BUY");
        assert_eq!(format!("{}", Side::Sell), "SELL");
    }

    #[test]
    fn direct_and_relayed() {
        let eoa = Address::repeat_byte(0x11);
        let relay = Address::repeat_byte(0x22);
        assert!(CallContext::direct(eoa, 10).is_direct());
        assert!(!CallContext::relayed(relay, eoa, 10).is_direct());
    }

    #[test]
    fn fixed_side() {
        assert!(FixedSide::Sell.is_sell());
        assert!(!FixedSide::Buy.is_sell());
    }
}
