//! Supported swap venues and their call payloads.
//!
//! Each venue is a closed enum variant with one payload builder. The engine
//! has no insight into venue internals: it encodes a call, hands it to the
//! portfolio for dispatch, and measures what happened to balances.

use std::fmt;
use std::str::FromStr;

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{SolCall, sol};

use crate::error::Error;
use crate::types::{FixedSide, Timestamp};

sol! {
    /// Uniswap V2 style router (also deployed by Sushiswap).
    interface IUniswapV2Router {
        function swapExactTokensForTokens(
            uint256 amountIn,
            uint256 amountOutMin,
            address[] path,
            address to,
            uint256 deadline
        ) external returns (uint256[] amounts);

        function swapTokensForExactTokens(
            uint256 amountOut,
            uint256 amountInMax,
            address[] path,
            address to,
            uint256 deadline
        ) external returns (uint256[] amounts);
    }

    /// Balancer exchange proxy with smart order routing across pools.
    interface IBalancerExchangeProxy {
        function smartSwapExactIn(
            address tokenIn,
            address tokenOut,
            uint256 totalAmountIn,
            uint256 minTotalAmountOut,
            uint256 nPools
        ) external payable returns (uint256 totalAmountOut);

        function smartSwapExactOut(
            address tokenIn,
            address tokenOut,
            uint256 totalAmountOut,
            uint256 maxTotalAmountIn,
            uint256 nPools
        ) external payable returns (uint256 totalAmountIn);
    }
}

/// Seconds added to the call timestamp for Uniswap-like deadlines.
pub const DEADLINE_GRACE_SECS: u64 = 180;

/// Number of Balancer pools the smart router may split a trade across.
pub const BALANCER_POOL_LIMIT: u64 = 3;

/// Number of supported venues; valid ids are `0..VENUE_COUNT`.
pub const VENUE_COUNT: u8 = 3;

/// A swap venue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Venue {
    Uniswap,
    Sushiswap,
    Balancer,
}

impl Venue {
    pub const ALL: [Venue; VENUE_COUNT as usize] = [Venue::Uniswap, Venue::Sushiswap, Venue::Balancer];

    /// Numeric id used by `set_exchanges`.
    pub fn id(self) -> u8 {
        match self {
            Venue::Uniswap => 0,
            Venue::Sushiswap => 1,
            Venue::Balancer => 2,
        }
    }

    /// Encode the venue call for `order`, paying proceeds to `recipient`.
    pub fn build_call(
        self,
        addresses: &VenueAddresses,
        order: &SwapOrder,
        recipient: Address,
        now: Timestamp,
    ) -> VenueCall {
        let payload = match self {
            Venue::Uniswap | Venue::Sushiswap => uniswap_like_payload(order, recipient, now),
            Venue::Balancer => balancer_payload(order),
        };
        VenueCall {
            target: addresses.get(self),
            payload: Bytes::from(payload),
        }
    }
}

impl TryFrom<u8> for Venue {
    type Error = Error;

    fn try_from(id: u8) -> Result<Self, Error> {
        Venue::ALL
            .get(id as usize)
            .copied()
            .ok_or(Error::InvalidVenue(id))
    }
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Venue::Uniswap => write!(f, "uniswap"),
            Venue::Sushiswap => write!(f, "sushiswap"),
            Venue::Balancer => write!(f, "balancer"),
        }
    }
}

impl FromStr for Venue {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "uniswap" => Ok(Venue::Uniswap),
            "sushiswap" => Ok(Venue::Sushiswap),
            "balancer" => Ok(Venue::Balancer),
            other => Err(format!("unknown venue '{other}'")),
        }
    }
}

/// Deployed contract address of each venue.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VenueAddresses {
    pub uniswap_router: Address,
    pub sushiswap_router: Address,
    pub balancer_proxy: Address,
}

impl VenueAddresses {
    pub fn get(&self, venue: Venue) -> Address {
        match venue {
            Venue::Uniswap => self.uniswap_router,
            Venue::Sushiswap => self.sushiswap_router,
            Venue::Balancer => self.balancer_proxy,
        }
    }
}

/// A two-asset swap with one exactly specified side.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwapOrder {
    pub send: Address,
    pub receive: Address,
    pub fixed: FixedSide,
    /// Exact quantity of the fixed side.
    pub quantity: U256,
}

/// An encoded call ready for dispatch through the portfolio.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VenueCall {
    pub target: Address,
    pub payload: Bytes,
}

// Exact-in accepts any non-zero output; exact-out accepts any input the
// approval allows. Trade size caps and cooldowns bound the exposure instead.
fn uniswap_like_payload(order: &SwapOrder, recipient: Address, now: Timestamp) -> Vec<u8> {
    let path = vec![order.send, order.receive];
    let deadline = U256::from(now.saturating_add(DEADLINE_GRACE_SECS));
    match order.fixed {
        FixedSide::Sell => IUniswapV2Router::swapExactTokensForTokensCall {
            amountIn: order.quantity,
            amountOutMin: U256::from(1),
            path,
            to: recipient,
            deadline,
        }
        .abi_encode(),
        FixedSide::Buy => IUniswapV2Router::swapTokensForExactTokensCall {
            amountOut: order.quantity,
            amountInMax: U256::MAX,
            path,
            to: recipient,
            deadline,
        }
        .abi_encode(),
    }
}

fn balancer_payload(order: &SwapOrder) -> Vec<u8> {
    let n_pools = U256::from(BALANCER_POOL_LIMIT);
    match order.fixed {
        FixedSide::Sell => IBalancerExchangeProxy::smartSwapExactInCall {
            tokenIn: order.send,
            tokenOut: order.receive,
            totalAmountIn: order.quantity,
            minTotalAmountOut: U256::from(1),
            nPools: n_pools,
        }
        .abi_encode(),
        FixedSide::Buy => IBalancerExchangeProxy::smartSwapExactOutCall {
            tokenIn: order.send,
            tokenOut: order.receive,
            totalAmountOut: order.quantity,
            maxTotalAmountIn: U256::MAX,
            nPools: n_pools,
        }
        .abi_encode(),
    }
}
