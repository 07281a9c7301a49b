//! indexbook-rebalancer: operator CLI for phased index rebalances.
//!
//! Reads target units from a JSON file, binds an [`indexbook`] engine to a
//! simulated portfolio described by the config, shows the plan, and walks
//! the trades round by round with an audit trail.

pub mod audit;
pub mod config;
pub mod error;
pub mod reconcile;
pub mod simulation;
pub mod target;
