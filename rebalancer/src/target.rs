//! Target allocation (target.json) loading and validation.

use std::path::Path;

use alloy_primitives::U256;
use chrono::{DateTime, Utc};
use indexbook::Venue;
use indexbook::math::PRECISE_UNIT;
use rustc_hash::FxHashSet;
use serde::Deserialize;

use crate::error::{Error, Result};

const MAX_DECIMALS: usize = 18;

/// A target allocation produced by the index methodology.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetSpec {
    pub timestamp: DateTime<Utc>,
    pub targets: Vec<TargetPosition>,
}

/// One component's target unit plus optional per-asset trade settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetPosition {
    pub symbol: String,
    /// Units per share as a decimal string, e.g. `"0.0125"`.
    pub unit: String,
    #[serde(default)]
    pub max_trade: Option<String>,
    #[serde(default)]
    pub venue: Option<Venue>,
    #[serde(default)]
    pub cool_off_secs: Option<u64>,
}

impl TargetPosition {
    pub fn target_unit(&self) -> Result<U256> {
        parse_units(&self.unit).ok_or_else(|| {
            Error::Target(format!("unit for {} is not a decimal: '{}'", self.symbol, self.unit))
        })
    }

    pub fn max_trade_size(&self) -> Result<Option<U256>> {
        self.max_trade
            .as_deref()
            .map(|raw| {
                parse_units(raw).ok_or_else(|| {
                    Error::Target(format!("max_trade for {} is not a decimal: '{raw}'", self.symbol))
                })
            })
            .transpose()
    }
}

impl TargetSpec {
    /// Load and validate a target.json file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::TargetRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json(&contents)
    }

    /// Parse from a JSON string (useful for testing).
    pub fn from_json(json: &str) -> Result<Self> {
        let spec: TargetSpec = serde_json::from_str(json)?;
        spec.validate()?;
        Ok(spec)
    }

    fn validate(&self) -> Result<()> {
        if self.targets.is_empty() {
            return Err(Error::Target("targets list is empty".into()));
        }

        let mut seen = FxHashSet::default();
        for t in &self.targets {
            if t.symbol.is_empty() {
                return Err(Error::Target("empty symbol".into()));
            }
            if !seen.insert(t.symbol.as_str()) {
                return Err(Error::Target(format!("duplicate symbol: {}", t.symbol)));
            }
            t.target_unit()?;
            if let Some(max) = t.max_trade_size()? {
                if max.is_zero() {
                    return Err(Error::Target(format!("max_trade for {} is zero", t.symbol)));
                }
            }
        }

        Ok(())
    }

    pub fn symbols(&self) -> Vec<&str> {
        self.targets.iter().map(|t| t.symbol.as_str()).collect()
    }
}

/// Parse a non-negative decimal string into 18-decimal fixed point.
///
/// Returns `None` for signs, exponents, more than 18 fractional digits or
/// values that overflow.
pub fn parse_units(raw: &str) -> Option<U256> {
    let (whole, frac) = match raw.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (raw, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    if frac.len() > MAX_DECIMALS {
        return None;
    }
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(whole) || !all_digits(frac) {
        return None;
    }

    let whole = if whole.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(whole, 10).ok()?
    };
    let frac = if frac.is_empty() {
        U256::ZERO
    } else {
        let padded = format!("{frac:0<width$}", width = MAX_DECIMALS);
        U256::from_str_radix(&padded, 10).ok()?
    };

    whole.checked_mul(PRECISE_UNIT)?.checked_add(frac)
}
