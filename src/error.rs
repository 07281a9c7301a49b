//! Engine errors.
//!
//! Every failure aborts the whole operation; nothing is committed. Variants
//! are grouped into coarse [`ErrorKind`]s so callers can decide whether a
//! retry later could succeed.

use alloy_primitives::Address;

/// Coarse failure category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed input: bad arrays, unknown venue, forbidden asset.
    Validation,
    /// Caller is not allowed to perform the operation.
    Permission,
    /// Operation is not legal in the current engine state.
    State,
    /// The swap venue or portfolio ledger call failed.
    Venue,
    /// Fixed-point overflow, underflow or division by zero.
    Arithmetic,
}

/// Errors returned by engine operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("array length mismatch: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },

    #[error("array length must be > 0")]
    EmptyArray,

    #[error("duplicate asset {0}")]
    DuplicateAsset(Address),

    #[error("invalid venue id {0}")]
    InvalidVenue(u8),

    #[error("native-wrapped asset {0} cannot be an index component")]
    NativeAssetTarget(Address),

    #[error("caller {0} is not an allowed trader")]
    NotAllowedTrader(Address),

    #[error("caller {0} is not the portfolio manager")]
    NotManager(Address),

    #[error("caller {0} must be the portfolio")]
    NotPortfolio(Address),

    #[error("caller {sender} is not the transaction origin {origin}")]
    RelayedCall { sender: Address, origin: Address },

    #[error("engine already bound to a portfolio")]
    AlreadyInitialized,

    #[error("engine is not attached to a portfolio")]
    NotInitialized,

    #[error("reentrant call")]
    Reentrant,

    #[error("asset {0} not included in rebalance")]
    NotInRebalance(Address),

    #[error("no venue assigned to asset {0}")]
    VenueUnset(Address),

    #[error("cool off period has not elapsed for {asset}: {remaining}s remaining")]
    CoolOffActive { asset: Address, remaining: u64 },

    #[error("target already met for {0}")]
    TargetAlreadyMet(Address),

    #[error("asset {0} previously targeted but missing from new rebalance")]
    MissingComponent(Address),

    #[error("must sell all sellable assets before sweeping remaining native balance")]
    SellableAssetsRemain,

    #[error("sweep purchased {bought} which exceeds the trade limit {limit}")]
    SweepExceedsLimit {
        bought: alloy_primitives::U256,
        limit: alloy_primitives::U256,
    },

    #[error("targets must be met and native balance remaining in order to raise targets")]
    CannotRaiseTargets,

    #[error("venue call failed: {0}")]
    Venue(String),

    #[error("ledger call failed: {0}")]
    Ledger(String),

    #[error("arithmetic error: {0}")]
    Arithmetic(&'static str),
}

impl Error {
    /// The category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::LengthMismatch { .. }
            | Error::EmptyArray
            | Error::DuplicateAsset(_)
            | Error::InvalidVenue(_)
            | Error::NativeAssetTarget(_) => ErrorKind::Validation,
            Error::NotAllowedTrader(_)
            | Error::NotManager(_)
            | Error::NotPortfolio(_)
            | Error::RelayedCall { .. }
            | Error::AlreadyInitialized
            | Error::NotInitialized => ErrorKind::Permission,
            Error::Reentrant
            | Error::NotInRebalance(_)
            | Error::VenueUnset(_)
            | Error::CoolOffActive { .. }
            | Error::TargetAlreadyMet(_)
            | Error::MissingComponent(_)
            | Error::SellableAssetsRemain
            | Error::SweepExceedsLimit { .. }
            | Error::CannotRaiseTargets => ErrorKind::State,
            Error::Venue(_) | Error::Ledger(_) => ErrorKind::Venue,
            Error::Arithmetic(_) => ErrorKind::Arithmetic,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
