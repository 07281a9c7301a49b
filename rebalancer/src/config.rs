//! TOML configuration loading and validation.

use std::path::{Path, PathBuf};

use alloy_primitives::{Address, U256};
use indexbook::{Venue, VenueAddresses};
use rustc_hash::FxHashSet;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::target::parse_units;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub portfolio: PortfolioConfig,
    pub venues: VenueAddresses,
    #[serde(default)]
    pub prices: Vec<PriceConfig>,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// The portfolio being rebalanced and the accounts acting on it.
#[derive(Debug, Clone, Deserialize)]
pub struct PortfolioConfig {
    pub address: Address,
    pub manager: Address,
    pub trader: Address,
    /// Total shares outstanding, decimal string.
    #[serde(default = "default_one")]
    pub supply: String,
    /// Current position multiplier, decimal string.
    #[serde(default = "default_one")]
    pub multiplier: String,
    #[serde(default = "default_native_symbol")]
    pub native_symbol: String,
    pub native_address: Address,
    /// Native-wrapped units per share currently held.
    #[serde(default = "default_zero")]
    pub native_unit: String,
    #[serde(default)]
    pub holdings: Vec<HoldingConfig>,
}

/// A known component and its current unit per share.
#[derive(Debug, Clone, Deserialize)]
pub struct HoldingConfig {
    pub symbol: String,
    pub address: Address,
    #[serde(default = "default_zero")]
    pub unit: String,
}

/// Simulated exchange rate: native-wrapped units paid for one unit of `symbol`.
#[derive(Debug, Clone, Deserialize)]
pub struct PriceConfig {
    pub symbol: String,
    pub native_per_unit: String,
}

fn default_one() -> String {
    "1".into()
}
fn default_zero() -> String {
    "0".into()
}
fn default_native_symbol() -> String {
    "WETH".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub cool_off_secs: u64,
    /// Default per-trade cap, decimal string.
    #[serde(default = "default_max_trade")]
    pub max_trade_size: String,
    #[serde(default = "default_venue")]
    pub default_venue: Venue,
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,
    #[serde(default = "default_secs_per_round")]
    pub secs_per_round: u64,
    /// Sweep leftover native balance once nothing is left to sell.
    #[serde(default = "default_true")]
    pub sweep: bool,
    /// Raise targets by 25 bps after every fully met rebalance.
    #[serde(default)]
    pub raise_targets: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            cool_off_secs: 0,
            max_trade_size: default_max_trade(),
            default_venue: default_venue(),
            max_rounds: default_max_rounds(),
            secs_per_round: default_secs_per_round(),
            sweep: true,
            raise_targets: false,
        }
    }
}

fn default_max_trade() -> String {
    "1000000".into()
}
fn default_venue() -> Venue {
    Venue::Uniswap
}
fn default_max_rounds() -> usize {
    50
}
fn default_secs_per_round() -> u64 {
    60
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub dir: String,
    #[serde(default = "default_audit_file")]
    pub audit_file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            audit_file: default_audit_file(),
        }
    }
}

fn default_log_dir() -> String {
    "./logs".into()
}
fn default_audit_file() -> String {
    "audit.jsonl".into()
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate config invariants.
    fn validate(&self) -> Result<()> {
        if self.supply()?.is_zero() {
            return Err(Error::Config("supply must be > 0".into()));
        }
        if self.multiplier()?.is_zero() {
            return Err(Error::Config("multiplier must be > 0".into()));
        }
        if self.max_trade_size()?.is_zero() {
            return Err(Error::Config("max_trade_size must be > 0".into()));
        }
        self.native_unit()?;
        if self.execution.max_rounds == 0 {
            return Err(Error::Config("max_rounds must be > 0".into()));
        }

        let mut symbols = FxHashSet::default();
        symbols.insert(self.portfolio.native_symbol.as_str());
        for h in &self.portfolio.holdings {
            if !symbols.insert(h.symbol.as_str()) {
                return Err(Error::Config(format!("duplicate holding: {}", h.symbol)));
            }
            if h.address == self.portfolio.native_address {
                return Err(Error::Config(format!(
                    "holding {} reuses the native asset address",
                    h.symbol
                )));
            }
            decimal("holding unit", &h.unit)?;
        }
        for p in &self.prices {
            if !symbols.contains(p.symbol.as_str()) || p.symbol == self.portfolio.native_symbol {
                return Err(Error::Config(format!("price for unknown asset: {}", p.symbol)));
            }
            if decimal("native_per_unit", &p.native_per_unit)?.is_zero() {
                return Err(Error::Config(format!("price for {} must be > 0", p.symbol)));
            }
        }
        Ok(())
    }

    pub fn supply(&self) -> Result<U256> {
        decimal("supply", &self.portfolio.supply)
    }

    pub fn multiplier(&self) -> Result<U256> {
        decimal("multiplier", &self.portfolio.multiplier)
    }

    pub fn native_unit(&self) -> Result<U256> {
        decimal("native_unit", &self.portfolio.native_unit)
    }

    pub fn max_trade_size(&self) -> Result<U256> {
        decimal("max_trade_size", &self.execution.max_trade_size)
    }

    /// Address of `symbol`, including the native asset.
    pub fn resolve(&self, symbol: &str) -> Option<Address> {
        if symbol == self.portfolio.native_symbol {
            return Some(self.portfolio.native_address);
        }
        self.portfolio
            .holdings
            .iter()
            .find(|h| h.symbol == symbol)
            .map(|h| h.address)
    }

    /// Symbol of `address`, or its hex form if unknown.
    pub fn symbol_of(&self, address: Address) -> String {
        if address == self.portfolio.native_address {
            return self.portfolio.native_symbol.clone();
        }
        self.portfolio
            .holdings
            .iter()
            .find(|h| h.address == address)
            .map(|h| h.symbol.clone())
            .unwrap_or_else(|| address.to_string())
    }

    /// Full path to the audit log file.
    pub fn audit_path(&self) -> PathBuf {
        Path::new(&self.logging.dir).join(&self.logging.audit_file)
    }
}

fn decimal(field: &str, raw: &str) -> Result<U256> {
    parse_units(raw).ok_or_else(|| Error::Config(format!("{field} is not a decimal: '{raw}'")))
}
