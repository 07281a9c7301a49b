//! Integration tests for the simulated rebalance loop.

use alloy_primitives::{Address, U256};
use indexbook::math::units;
use indexbook::{Side, Venue};
use indexbook_rebalancer::audit::AuditLog;
use indexbook_rebalancer::config::Config;
use indexbook_rebalancer::error::Error;
use indexbook_rebalancer::reconcile::Standing;
use indexbook_rebalancer::simulation::{
    apply_targets, build_engine, execute, plan_rows, resolve_targets,
};
use indexbook_rebalancer::target::TargetSpec;

const START: u64 = 1_700_000_000;

fn config_toml(execution: &str) -> String {
    format!(
        r#"
[portfolio]
address = "0x5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e"
manager = "0x3a3a3a3a3a3a3a3a3a3a3a3a3a3a3a3a3a3a3a3a"
trader = "0xa1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1"
native_address = "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee"

[[portfolio.holdings]]
symbol = "DAI"
address = "0xd1d1d1d1d1d1d1d1d1d1d1d1d1d1d1d1d1d1d1d1"
unit = "1000"

[[portfolio.holdings]]
symbol = "LINK"
address = "0x1111111111111111111111111111111111111111"

[venues]
uniswap_router = "0x0101010101010101010101010101010101010101"
sushiswap_router = "0x0202020202020202020202020202020202020202"
balancer_proxy = "0x0303030303030303030303030303030303030303"

[[prices]]
symbol = "DAI"
native_per_unit = "0.01"

[[prices]]
symbol = "LINK"
native_per_unit = "0.1"

[execution]
max_trade_size = "300"
{execution}
"#
    )
}

fn target(link_unit: &str) -> TargetSpec {
    TargetSpec::from_json(&format!(
        r#"{{
            "timestamp": "2026-02-08T15:30:00Z",
            "targets": [
                {{ "symbol": "DAI",  "unit": "500" }},
                {{ "symbol": "LINK", "unit": "{link_unit}" }}
            ]
        }}"#
    ))
    .unwrap()
}

fn dai() -> Address {
    Address::repeat_byte(0xd1)
}

fn link() -> Address {
    Address::repeat_byte(0x11)
}

// ============================================================================
// Target resolution
// ============================================================================

#[test]
fn resolve_fills_defaults_from_config() {
    let config = Config::from_toml(&config_toml("default_venue = \"balancer\"")).unwrap();
    let spec = TargetSpec::from_json(
        r#"{"timestamp":"2026-01-01T00:00:00Z","targets":[
            {"symbol":"DAI","unit":"500","venue":"sushiswap","cool_off_secs":30},
            {"symbol":"LINK","unit":"40"}
        ]}"#,
    )
    .unwrap();

    let resolved = resolve_targets(&config, &spec).unwrap();
    assert_eq!(resolved.len(), 2);
    assert_eq!(resolved[0].venue, Venue::Sushiswap);
    assert_eq!(resolved[0].cool_off_secs, 30);
    assert_eq!(resolved[1].venue, Venue::Balancer);
    assert_eq!(resolved[1].max_trade, units(300));
    assert_eq!(resolved[1].unit, units(40));
}

#[test]
fn held_component_left_out_is_zeroed() {
    let config = Config::from_toml(&config_toml("")).unwrap();
    let spec = TargetSpec::from_json(
        r#"{"timestamp":"2026-01-01T00:00:00Z","targets":[{"symbol":"LINK","unit":"40"}]}"#,
    )
    .unwrap();

    let resolved = resolve_targets(&config, &spec).unwrap();
    assert_eq!(resolved.len(), 2);
    assert_eq!(resolved[1].symbol, "DAI");
    assert!(resolved[1].unit.is_zero());

    let mut engine = build_engine(&config, START).unwrap();
    apply_targets(&mut engine, &config, &resolved, START).unwrap();
    assert_eq!(engine.rebalance_assets(), &[link(), dai()]);
}

#[test]
fn native_and_unknown_symbols_rejected() {
    let config = Config::from_toml(&config_toml("")).unwrap();
    let native = TargetSpec::from_json(
        r#"{"timestamp":"2026-01-01T00:00:00Z","targets":[{"symbol":"WETH","unit":"1"}]}"#,
    )
    .unwrap();
    assert!(matches!(resolve_targets(&config, &native), Err(Error::Target(_))));

    let unknown = TargetSpec::from_json(
        r#"{"timestamp":"2026-01-01T00:00:00Z","targets":[{"symbol":"UNI","unit":"1"}]}"#,
    )
    .unwrap();
    assert!(matches!(resolve_targets(&config, &unknown), Err(Error::Target(_))));
}

// ============================================================================
// Planning
// ============================================================================

#[test]
fn plan_rows_show_next_trade() {
    let config = Config::from_toml(&config_toml("")).unwrap();
    let mut engine = build_engine(&config, START).unwrap();
    let resolved = resolve_targets(&config, &target("40")).unwrap();
    apply_targets(&mut engine, &config, &resolved, START).unwrap();

    let rows = plan_rows(&engine, &config).unwrap();
    assert_eq!(rows.len(), 2);

    assert_eq!(rows[0].symbol, "DAI");
    assert_eq!(rows[0].held, units(1000));
    let sell = rows[0].next.unwrap();
    assert_eq!(sell.side, Side::Sell);
    assert_eq!(sell.quantity, units(300));

    assert_eq!(rows[1].symbol, "LINK");
    assert_eq!(rows[1].held, U256::ZERO);
    let buy = rows[1].next.unwrap();
    assert_eq!(buy.side, Side::Buy);
    assert_eq!(buy.quantity, units(40));
    assert!(engine.is_trader(config.portfolio.trader));
}

// ============================================================================
// Execution
// ============================================================================

#[test]
fn execute_reaches_targets() {
    let config = Config::from_toml(&config_toml("")).unwrap();
    let mut engine = build_engine(&config, START).unwrap();
    let resolved = resolve_targets(&config, &target("40")).unwrap();
    apply_targets(&mut engine, &config, &resolved, START).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.jsonl");
    let summary = {
        let mut audit = AuditLog::open(&path).unwrap();
        execute(&mut engine, &config, Some(&mut audit), START).unwrap()
    };

    // Round 1: sell 300 DAI, LINK buy lacks WETH. Round 2: sell 200, buy 40.
    assert_eq!(summary.rounds, 2);
    assert_eq!(summary.trades, 3);
    assert_eq!(summary.refused, 1);
    assert!(!summary.swept);
    assert!(!summary.raised);
    assert!(summary.report.all_met());
    assert_eq!(summary.report.native_left, "1");
    assert!(engine.targets_met().unwrap());
    assert!(engine.events().is_empty());

    let contents = std::fs::read_to_string(&path).unwrap();
    let events: Vec<serde_json::Value> = contents
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    let count = |name: &str| events.iter().filter(|e| e["event"] == name).count();
    assert_eq!(count("target_units_updated"), 2);
    assert_eq!(count("trade_executed"), 3);
    assert_eq!(count("operation_refused"), 1);
    assert_eq!(count("reconciled"), 1);
    assert_eq!(count("run_completed"), 1);
    assert_eq!(events.last().unwrap()["trades"], 3);
}

#[test]
fn execute_sweeps_leftover_native() {
    let config = Config::from_toml(&config_toml("")).unwrap();
    let mut engine = build_engine(&config, START).unwrap();
    let resolved = resolve_targets(&config, &target("60")).unwrap();
    apply_targets(&mut engine, &config, &resolved, START).unwrap();

    let summary = execute(&mut engine, &config, None, START).unwrap();

    // 5 WETH raised never covers 60 LINK; the sweep buys 50 instead.
    assert_eq!(summary.rounds, 3);
    assert_eq!(summary.refused, 3);
    assert!(summary.swept);
    assert_eq!(summary.trades, 3);

    let report = &summary.report;
    assert_eq!(report.met, 1);
    assert_eq!(report.entries[1].symbol, "LINK");
    assert_eq!(report.entries[1].actual_unit, "50");
    assert_eq!(report.entries[1].gap, "10");
    assert_eq!(report.entries[1].standing, Standing::Under);
    assert_eq!(report.native_left, "0");
}

#[test]
fn execute_without_sweep_leaves_native() {
    let config = Config::from_toml(&config_toml("sweep = false")).unwrap();
    let mut engine = build_engine(&config, START).unwrap();
    let resolved = resolve_targets(&config, &target("60")).unwrap();
    apply_targets(&mut engine, &config, &resolved, START).unwrap();

    let summary = execute(&mut engine, &config, None, START).unwrap();
    assert!(!summary.swept);
    assert_eq!(summary.trades, 2);
    assert_eq!(summary.report.native_left, "5");
}

#[test]
fn execute_raises_targets_when_met_with_native_left() {
    let config = Config::from_toml(&config_toml("raise_targets = true")).unwrap();
    let mut engine = build_engine(&config, START).unwrap();
    let resolved = resolve_targets(&config, &target("40")).unwrap();
    apply_targets(&mut engine, &config, &resolved, START).unwrap();

    let summary = execute(&mut engine, &config, None, START).unwrap();
    assert!(summary.raised);
    assert!(!summary.report.all_met());
    assert!(
        summary
            .report
            .entries
            .iter()
            .all(|e| e.standing == Standing::Under)
    );
}

#[test]
fn cool_off_spreads_trades_over_rounds() {
    let config = Config::from_toml(&config_toml("cool_off_secs = 90")).unwrap();
    let mut engine = build_engine(&config, START).unwrap();
    let resolved = resolve_targets(&config, &target("40")).unwrap();
    apply_targets(&mut engine, &config, &resolved, START).unwrap();

    let summary = execute(&mut engine, &config, None, START).unwrap();

    // DAI trades at t=0 and must wait 90s, so round 2 (t=60) is cooling.
    assert!(summary.report.all_met());
    assert_eq!(summary.rounds, 3);
    assert!(summary.refused >= 2);
}

#[test]
fn config_loads_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, config_toml("")).unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.resolve("LINK"), Some(link()));

    let missing = Config::load(&dir.path().join("nope.toml"));
    assert!(matches!(missing, Err(Error::ConfigRead { .. })));
}
