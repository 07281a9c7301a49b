//! In-memory portfolio with simulated swap venues.
//!
//! Implements [`PortfolioLedger`] with configurable behavior so the engine
//! can be driven end-to-end without a chain. Venue calls are decoded from
//! their real payloads and settled at fixed exchange rates.
//!
//! ```
//! use alloy_primitives::Address;
//! use indexbook::math::units;
//! use indexbook::mock::MockPortfolio;
//! use indexbook::PortfolioLedger;
//!
//! let weth = Address::repeat_byte(0xee);
//! let dai = Address::repeat_byte(0xd1);
//!
//! let portfolio = MockPortfolio::builder()
//!     .with_position(weth, units(2))
//!     .with_position(dai, units(500))
//!     .with_rate(dai, weth, units(250), units(1))
//!     .build();
//!
//! assert_eq!(portfolio.held_unit(dai).unwrap(), units(500));
//! ```

use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::guard::ReentrancyGuard;
use crate::ledger::{PortfolioLedger, PositionEdit, edited_position_unit};
use crate::math::{PRECISE_UNIT, checked_div, checked_mul, checked_sub, precise_mul};
use crate::venue::{IBalancerExchangeProxy, IUniswapV2Router, Venue, VenueAddresses};

const BPS: u64 = 10_000;

/// A dispatched venue call, recorded for assertions in tests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedSwap {
    pub venue: Venue,
    pub send: Address,
    pub receive: Address,
    pub amount_in: U256,
    pub amount_out: U256,
}

/// Builder for `MockPortfolio`.
pub struct MockPortfolioBuilder {
    address: Address,
    manager: Address,
    total_shares: U256,
    multiplier: U256,
    venues: VenueAddresses,
    positions: Vec<(Address, U256)>,
    rates: Vec<(Address, Address, U256, U256)>,
    haircut_bps: u64,
}

impl MockPortfolioBuilder {
    pub fn address(mut self, address: Address) -> Self {
        self.address = address;
        self
    }

    pub fn manager(mut self, manager: Address) -> Self {
        self.manager = manager;
        self
    }

    /// Total shares outstanding (18 decimals).
    pub fn total_shares(mut self, shares: U256) -> Self {
        self.total_shares = shares;
        self
    }

    pub fn multiplier(mut self, multiplier: U256) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn venues(mut self, venues: VenueAddresses) -> Self {
        self.venues = venues;
        self
    }

    /// Hold `unit` of `asset` per share. The balance is `unit * shares`.
    pub fn with_position(mut self, asset: Address, unit: U256) -> Self {
        self.positions.push((asset, unit));
        self
    }

    /// `amount_a` of `a` trades for `amount_b` of `b`, in both directions.
    pub fn with_rate(mut self, a: Address, b: Address, amount_a: U256, amount_b: U256) -> Self {
        self.rates.push((a, b, amount_a, amount_b));
        self
    }

    /// Worsen every floating leg by `bps`: exact-in trades receive less,
    /// exact-out trades spend more.
    pub fn haircut_bps(mut self, bps: u64) -> Self {
        self.haircut_bps = bps.min(BPS - 1);
        self
    }

    pub fn build(self) -> MockPortfolio {
        let mut units = FxHashMap::default();
        let mut balances = FxHashMap::default();
        for (asset, unit) in self.positions {
            let balance = precise_mul(unit, self.total_shares).unwrap_or(U256::MAX);
            units.insert(asset, unit);
            balances.insert(asset, balance);
        }

        let mut rates = FxHashMap::default();
        for (a, b, amount_a, amount_b) in self.rates {
            rates.insert((a, b), (amount_a, amount_b));
            rates.insert((b, a), (amount_b, amount_a));
        }

        MockPortfolio {
            address: self.address,
            manager: self.manager,
            total_shares: self.total_shares,
            multiplier: self.multiplier,
            venues: self.venues,
            units,
            balances,
            rates,
            haircut_bps: self.haircut_bps,
            allowances: FxHashMap::default(),
            approvals: Vec::new(),
            swaps: Vec::new(),
            failing: Vec::new(),
            reentry_probe: None,
            reentry_attempts: Vec::new(),
        }
    }
}

/// A portfolio ledger that settles venue payloads at fixed rates.
#[derive(Clone, Debug)]
pub struct MockPortfolio {
    address: Address,
    manager: Address,
    total_shares: U256,
    multiplier: U256,
    venues: VenueAddresses,
    units: FxHashMap<Address, U256>,
    balances: FxHashMap<Address, U256>,
    rates: FxHashMap<(Address, Address), (U256, U256)>,
    haircut_bps: u64,
    allowances: FxHashMap<(Address, Address), U256>,
    approvals: Vec<(Address, Address, U256)>,
    swaps: Vec<RecordedSwap>,
    failing: Vec<Venue>,
    reentry_probe: Option<ReentrancyGuard>,
    reentry_attempts: Vec<bool>,
}

impl MockPortfolio {
    pub fn builder() -> MockPortfolioBuilder {
        MockPortfolioBuilder {
            address: Address::repeat_byte(0x5e),
            manager: Address::repeat_byte(0x3a),
            total_shares: PRECISE_UNIT,
            multiplier: PRECISE_UNIT,
            venues: VenueAddresses {
                uniswap_router: Address::repeat_byte(0x01),
                sushiswap_router: Address::repeat_byte(0x02),
                balancer_proxy: Address::repeat_byte(0x03),
            },
            positions: Vec::new(),
            rates: Vec::new(),
            haircut_bps: 0,
        }
    }

    pub fn venues(&self) -> VenueAddresses {
        self.venues
    }

    /// Every `approve` call, in order: (asset, spender, amount).
    pub fn approvals(&self) -> &[(Address, Address, U256)] {
        &self.approvals
    }

    /// Every settled swap, in order.
    pub fn swaps(&self) -> &[RecordedSwap] {
        &self.swaps
    }

    /// Make every call to `venue` revert.
    pub fn fail_venue(&mut self, venue: Venue) {
        self.failing.push(venue);
    }

    pub fn clear_failures(&mut self) {
        self.failing.clear();
    }

    /// Try to enter `guard` from inside every venue call, as a malicious
    /// venue calling back into the engine would.
    pub fn probe_reentrancy(&mut self, guard: ReentrancyGuard) {
        self.reentry_probe = Some(guard);
    }

    /// One entry per probed venue call: `true` if the re-entry was rejected.
    pub fn reentry_attempts(&self) -> &[bool] {
        &self.reentry_attempts
    }

    /// Overwrite a raw balance without touching the recorded unit (airdrop).
    pub fn set_balance(&mut self, asset: Address, balance: U256) {
        self.balances.insert(asset, balance);
    }

    /// Simulate fee accrual: units shrink by `new / old` while the share
    /// count grows so that balances stay put.
    pub fn accrue_fee(&mut self, new_multiplier: U256) -> Result<()> {
        let old = self.multiplier;
        for unit in self.units.values_mut() {
            *unit = checked_div(checked_mul(*unit, new_multiplier)?, old)?;
        }
        self.total_shares = checked_div(checked_mul(self.total_shares, old)?, new_multiplier)?;
        self.multiplier = new_multiplier;
        Ok(())
    }

    fn venue_at(&self, target: Address) -> Option<Venue> {
        Venue::ALL
            .into_iter()
            .find(|venue| self.venues.get(*venue) == target)
    }

    fn rate(&self, send: Address, receive: Address) -> Result<(U256, U256)> {
        self.rates
            .get(&(send, receive))
            .copied()
            .ok_or_else(|| Error::Venue(format!("no liquidity for {send} -> {receive}")))
    }

    fn quote_out(&self, send: Address, receive: Address, amount_in: U256) -> Result<U256> {
        let (per_send, per_receive) = self.rate(send, receive)?;
        let out = checked_div(checked_mul(amount_in, per_receive)?, per_send)?;
        Ok(out * U256::from(BPS - self.haircut_bps) / U256::from(BPS))
    }

    fn quote_in(&self, send: Address, receive: Address, amount_out: U256) -> Result<U256> {
        let (per_send, per_receive) = self.rate(send, receive)?;
        let fair = ceil_div(checked_mul(amount_out, per_send)?, per_receive)?;
        ceil_div(checked_mul(fair, U256::from(BPS))?, U256::from(BPS - self.haircut_bps))
    }

    fn settle(
        &mut self,
        venue: Venue,
        spender: Address,
        send: Address,
        receive: Address,
        amount_in: U256,
        amount_out: U256,
    ) -> Result<()> {
        if amount_out.is_zero() {
            return Err(Error::Venue("insufficient output amount".into()));
        }
        let allowance = self.allowances.get(&(send, spender)).copied().unwrap_or_default();
        if allowance < amount_in {
            return Err(Error::Venue(format!(
                "insufficient allowance: {allowance} < {amount_in}"
            )));
        }
        let balance = self.balances.get(&send).copied().unwrap_or_default();
        let remaining = checked_sub(balance, amount_in)
            .map_err(|_| Error::Venue(format!("insufficient balance: {balance} < {amount_in}")))?;

        self.allowances.insert((send, spender), allowance - amount_in);
        self.balances.insert(send, remaining);
        *self.balances.entry(receive).or_default() += amount_out;
        self.swaps.push(RecordedSwap {
            venue,
            send,
            receive,
            amount_in,
            amount_out,
        });
        Ok(())
    }

    fn execute_payload(&mut self, venue: Venue, target: Address, payload: &[u8]) -> Result<()> {
        let selector = payload
            .get(..4)
            .ok_or_else(|| Error::Venue("payload shorter than selector".into()))?;
        let decode_err = |e: alloy_sol_types::Error| Error::Venue(format!("bad payload: {e}"));

        if selector == IUniswapV2Router::swapExactTokensForTokensCall::SELECTOR {
            let call = IUniswapV2Router::swapExactTokensForTokensCall::abi_decode(payload, true)
                .map_err(decode_err)?;
            let (send, receive) = two_hop(&call.path)?;
            let out = self.quote_out(send, receive, call.amountIn)?;
            if out < call.amountOutMin {
                return Err(Error::Venue("insufficient output amount".into()));
            }
            self.settle(venue, target, send, receive, call.amountIn, out)
        } else if selector == IUniswapV2Router::swapTokensForExactTokensCall::SELECTOR {
            let call = IUniswapV2Router::swapTokensForExactTokensCall::abi_decode(payload, true)
                .map_err(decode_err)?;
            let (send, receive) = two_hop(&call.path)?;
            let amount_in = self.quote_in(send, receive, call.amountOut)?;
            if amount_in > call.amountInMax {
                return Err(Error::Venue("excessive input amount".into()));
            }
            self.settle(venue, target, send, receive, amount_in, call.amountOut)
        } else if selector == IBalancerExchangeProxy::smartSwapExactInCall::SELECTOR {
            let call = IBalancerExchangeProxy::smartSwapExactInCall::abi_decode(payload, true)
                .map_err(decode_err)?;
            let out = self.quote_out(call.tokenIn, call.tokenOut, call.totalAmountIn)?;
            if out < call.minTotalAmountOut {
                return Err(Error::Venue("limit out".into()));
            }
            self.settle(venue, target, call.tokenIn, call.tokenOut, call.totalAmountIn, out)
        } else if selector == IBalancerExchangeProxy::smartSwapExactOutCall::SELECTOR {
            let call = IBalancerExchangeProxy::smartSwapExactOutCall::abi_decode(payload, true)
                .map_err(decode_err)?;
            let amount_in = self.quote_in(call.tokenIn, call.tokenOut, call.totalAmountOut)?;
            if amount_in > call.maxTotalAmountIn {
                return Err(Error::Venue("limit in".into()));
            }
            self.settle(venue, target, call.tokenIn, call.tokenOut, amount_in, call.totalAmountOut)
        } else {
            Err(Error::Venue("unknown selector".into()))
        }
    }
}

impl PortfolioLedger for MockPortfolio {
    fn address(&self) -> Address {
        self.address
    }

    fn manager(&self) -> Address {
        self.manager
    }

    fn held_unit(&self, asset: Address) -> Result<U256> {
        Ok(self.units.get(&asset).copied().unwrap_or_default())
    }

    fn total_shares(&self) -> Result<U256> {
        Ok(self.total_shares)
    }

    fn position_multiplier(&self) -> Result<U256> {
        Ok(self.multiplier)
    }

    fn held_assets(&self) -> Vec<Address> {
        let mut assets: Vec<Address> = self
            .units
            .iter()
            .filter(|(_, unit)| !unit.is_zero())
            .map(|(asset, _)| *asset)
            .collect();
        assets.sort();
        assets
    }

    fn balance_of(&self, asset: Address) -> Result<U256> {
        Ok(self.balances.get(&asset).copied().unwrap_or_default())
    }

    fn edit_position_from_balance(
        &mut self,
        asset: Address,
        total_shares: U256,
        pre_trade_balance: U256,
    ) -> Result<PositionEdit> {
        let balance = self.balance_of(asset)?;
        let previous_unit = self.held_unit(asset)?;
        let new_unit =
            edited_position_unit(total_shares, pre_trade_balance, balance, previous_unit)
                .map_err(|e| Error::Ledger(e.to_string()))?;
        self.units.insert(asset, new_unit);
        Ok(PositionEdit {
            balance,
            previous_unit,
            new_unit,
        })
    }

    fn approve(&mut self, asset: Address, spender: Address, amount: U256) -> Result<()> {
        self.allowances.insert((asset, spender), amount);
        self.approvals.push((asset, spender, amount));
        Ok(())
    }

    fn invoke(&mut self, target: Address, _value: U256, payload: &[u8]) -> Result<()> {
        if let Some(guard) = &self.reentry_probe {
            let rejected = guard.enter().is_err();
            self.reentry_attempts.push(rejected);
        }

        let venue = self
            .venue_at(target)
            .ok_or_else(|| Error::Venue(format!("no contract at {target}")))?;
        if self.failing.contains(&venue) {
            return Err(Error::Venue(format!("{venue} reverted")));
        }
        self.execute_payload(venue, target, payload)
    }
}

fn two_hop(path: &[Address]) -> Result<(Address, Address)> {
    match path {
        [send, receive] => Ok((*send, *receive)),
        _ => Err(Error::Venue(format!("unsupported path length {}", path.len()))),
    }
}

fn ceil_div(a: U256, b: U256) -> Result<U256> {
    let q = checked_div(a, b)?;
    Ok(if (a % b).is_zero() { q } else { q + U256::from(1) })
}
