//! Risk gate scenarios: circuit breaker, drawdown halt, kill switch, and two
//! gates sharing one durable store.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use tradegate_core::domain::{Market, Order, OrderSide, OrderType};
use tradegate_core::risk::{
    JsonFileRiskStore, MemoryRiskStore, RiskGate, RiskLimits, RiskStateStore, RiskStatus,
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap()
}

fn valid_order() -> Order {
    Order {
        symbol: "BTC".into(),
        market: Market::Crypto,
        side: OrderSide::Buy,
        order_type: OrderType::Market,
        quantity: 5_000,
        price: 10_000,
        stop_loss: 9_500,
        strategy: "momentum".into(),
        reason: "scenario".into(),
    }
}

fn memory_gate() -> RiskGate<MemoryRiskStore> {
    RiskGate::new(MemoryRiskStore::new(), RiskLimits::default())
}

#[test]
fn circuit_breaker_pauses_then_recovers() {
    let gate = memory_gate();
    for _ in 0..3 {
        gate.record_trade_result(-100, t0()).unwrap();
    }

    let verdict = gate.evaluate(&valid_order(), t0()).unwrap();
    assert!(!verdict.approved);
    assert!(verdict.reason.contains("circuit breaker"), "{}", verdict.reason);
    assert!(verdict.reason.contains("resuming in 60m"), "{}", verdict.reason);

    let almost = t0() + Duration::minutes(59);
    let verdict = gate.evaluate(&valid_order(), almost).unwrap();
    assert!(!verdict.approved);
    assert!(verdict.reason.contains("resuming in 1m"), "{}", verdict.reason);

    let elapsed = t0() + Duration::minutes(60);
    let verdict = gate.evaluate(&valid_order(), elapsed).unwrap();
    assert!(verdict.approved, "{}", verdict.reason);
    assert_eq!(gate.state().unwrap().consecutive_losses, 0);
}

#[test]
fn rejection_leaves_state_untouched() {
    let gate = memory_gate();
    gate.record_trade_result(-100, t0()).unwrap();
    let before = gate.state().unwrap();
    let mut order = valid_order();
    order.stop_loss = 0;
    assert!(!gate.evaluate(&order, t0()).unwrap().approved);
    assert_eq!(gate.state().unwrap(), before);
}

#[test]
fn drawdown_breach_halts() {
    let gate = memory_gate();
    gate.record_trade_result(-50_000, t0()).unwrap();
    assert!(!gate.is_halted().unwrap());

    let verdict = gate.evaluate(&valid_order(), t0()).unwrap();
    assert!(!verdict.approved);
    assert_eq!(
        verdict.reason,
        "Daily drawdown limit hit: -50000 cents (max 50000 cents)"
    );
    assert!(gate.is_halted().unwrap());
}

#[test]
fn drawdown_just_under_limit_passes() {
    let gate = memory_gate();
    gate.record_trade_result(-49_999, t0()).unwrap();
    assert!(gate.evaluate(&valid_order(), t0()).unwrap().approved);
}

#[test]
fn halted_rejects_everything_until_reset() {
    let gate = memory_gate();
    gate.kill_switch().unwrap();

    for minutes in [0, 60, 24 * 60] {
        let verdict = gate.evaluate(&valid_order(), t0() + Duration::minutes(minutes)).unwrap();
        assert!(!verdict.approved);
        assert_eq!(verdict.reason, "Trading halted: Kill switch activated manually");
    }
    assert!(matches!(gate.status(t0()).unwrap(), RiskStatus::Halted { .. }));

    gate.reset_halt().unwrap();
    assert!(gate.evaluate(&valid_order(), t0()).unwrap().approved);
}

#[test]
fn halt_persists_after_daily_reset_until_manual_reset() {
    let gate = memory_gate();
    gate.record_trade_result(-60_000, t0()).unwrap();
    assert!(!gate.evaluate(&valid_order(), t0()).unwrap().approved);

    gate.reset_daily_pnl().unwrap();
    assert!(!gate.evaluate(&valid_order(), t0()).unwrap().approved);

    gate.reset_halt().unwrap();
    assert!(gate.evaluate(&valid_order(), t0()).unwrap().approved);
}

#[test]
fn two_gates_share_one_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("risk").join("state.json");

    let scheduler = RiskGate::new(JsonFileRiskStore::new(&path), RiskLimits::default());
    let operator = RiskGate::new(JsonFileRiskStore::new(&path), RiskLimits::default());

    assert!(scheduler.evaluate(&valid_order(), t0()).unwrap().approved);
    operator.kill_switch().unwrap();

    let verdict = scheduler.evaluate(&valid_order(), t0()).unwrap();
    assert!(!verdict.approved);
    assert!(verdict.reason.contains("Kill switch"));

    // Survives a "restart".
    let restarted = RiskGate::new(JsonFileRiskStore::new(&path), RiskLimits::default());
    assert!(restarted.is_halted().unwrap());
}

#[test]
fn shared_memory_store_is_seen_by_both_gates() {
    let store = Arc::new(MemoryRiskStore::new());
    let a = RiskGate::new(Arc::clone(&store), RiskLimits::default());
    let b = RiskGate::new(Arc::clone(&store), RiskLimits::default());

    for _ in 0..3 {
        a.record_trade_result(-100, t0()).unwrap();
    }
    assert!(!b.evaluate(&valid_order(), t0()).unwrap().approved);
    assert!(store.get_state().unwrap().paused_until.is_some());
}

#[test]
fn concurrent_results_are_not_lost() {
    let gate = Arc::new(memory_gate());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let gate = Arc::clone(&gate);
            std::thread::spawn(move || {
                for _ in 0..25 {
                    gate.record_trade_result(10, t0()).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(gate.state().unwrap().daily_pnl, 8 * 25 * 10);
}
