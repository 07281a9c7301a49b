//! Event log files in JSON Lines format.
//!
//! One serialized [`RebalanceEvent`] per line, so a log can be tailed,
//! appended to across runs, and diffed by hand.
//!
//! ```ignore
//! use indexbook::persistence;
//! use std::path::Path;
//!
//! engine.save_events(Path::new("rebalance.jsonl")).unwrap();
//! let events = persistence::load_events(Path::new("rebalance.jsonl")).unwrap();
//! ```

use std::io::{self, BufRead, Write};
use std::path::Path;

use crate::engine::IndexRebalancer;
use crate::event::RebalanceEvent;
use crate::executor::TradeExecutor;
use crate::ledger::PortfolioLedger;

/// Write `events` to `path`, replacing any existing file.
pub fn save_events(events: &[RebalanceEvent], path: &Path) -> io::Result<()> {
    let file = std::fs::File::create(path)?;
    write_events(events, file)
}

/// Append `events` to `path`, creating it if needed.
pub fn append_events(events: &[RebalanceEvent], path: &Path) -> io::Result<()> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    write_events(events, file)
}

fn write_events(events: &[RebalanceEvent], file: std::fs::File) -> io::Result<()> {
    let mut writer = io::BufWriter::new(file);
    for event in events {
        let json = serde_json::to_string(event).map_err(io::Error::other)?;
        writeln!(writer, "{json}")?;
    }
    writer.flush()
}

/// Read every event from `path`. Blank lines are skipped.
pub fn load_events(path: &Path) -> io::Result<Vec<RebalanceEvent>> {
    let reader = io::BufReader::new(std::fs::File::open(path)?);
    let mut events = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let event = serde_json::from_str(line).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("line {}: {}", line_num + 1, e),
            )
        })?;
        events.push(event);
    }

    Ok(events)
}

impl<L, X> IndexRebalancer<L, X>
where
    L: PortfolioLedger + Clone,
    X: TradeExecutor + Clone,
{
    /// Write the committed event log to `path`.
    pub fn save_events(&self, path: &Path) -> io::Result<()> {
        save_events(self.events(), path)
    }
}
