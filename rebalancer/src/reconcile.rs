//! Post-execution reconciliation: compare held units vs normalized targets.

use std::fmt;

use alloy_primitives::U256;
use indexbook::math::format_precise;
use serde::Serialize;

/// Where a component sits relative to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Standing {
    Met,
    Under,
    Over,
}

impl fmt::Display for Standing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Standing::Met => write!(f, "MET"),
            Standing::Under => write!(f, "UNDER"),
            Standing::Over => write!(f, "OVER"),
        }
    }
}

/// Reconciliation report comparing held units against targets.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub entries: Vec<ReconcileEntry>,
    pub met: usize,
    /// Native-wrapped units per share left undeployed.
    pub native_left: String,
}

/// One component's reconciliation entry. Units are decimal strings.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileEntry {
    pub symbol: String,
    pub target_unit: String,
    pub actual_unit: String,
    pub gap: String,
    pub standing: Standing,
}

/// Compare `(symbol, normalized target, held unit)` rows.
pub fn reconcile(rows: &[(String, U256, U256)], native_left: U256) -> ReconcileReport {
    let mut entries = Vec::with_capacity(rows.len());
    let mut met = 0;

    for (symbol, target, actual) in rows {
        let (standing, gap) = if actual == target {
            met += 1;
            (Standing::Met, U256::ZERO)
        } else if actual < target {
            (Standing::Under, *target - *actual)
        } else {
            (Standing::Over, *actual - *target)
        };

        entries.push(ReconcileEntry {
            symbol: symbol.clone(),
            target_unit: format_precise(*target),
            actual_unit: format_precise(*actual),
            gap: format_precise(gap),
            standing,
        });
    }

    ReconcileReport {
        entries,
        met,
        native_left: format_precise(native_left),
    }
}

impl ReconcileReport {
    pub fn all_met(&self) -> bool {
        self.met == self.entries.len()
    }
}

impl fmt::Display for ReconcileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "RECONCILIATION:")?;
        writeln!(
            f,
            "  {:8} {:>22} {:>22} {:>22} {:>6}",
            "Symbol", "Target", "Actual", "Gap", "State"
        )?;
        for e in &self.entries {
            writeln!(
                f,
                "  {:8} {:>22} {:>22} {:>22} {:>6}",
                e.symbol, e.target_unit, e.actual_unit, e.gap, e.standing,
            )?;
        }
        writeln!(
            f,
            "\n  {}/{} targets met, {} native per share left",
            self.met,
            self.entries.len(),
            self.native_left
        )?;
        Ok(())
    }
}
