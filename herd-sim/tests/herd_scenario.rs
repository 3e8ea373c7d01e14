mod common;

use herd_sim::events::SimEvent;
use herd_sim::herd::{SignalKind, TriggerPolicy};
use herd_sim::scenarios::herd_demo::{build_engine, run_with_config, LatencyConfig, SimConfig};
use herd_sim::SimError;

use common::collect_events;

const NS_PER_SEC: u64 = 1_000_000_000;

fn small_config(seed: u64) -> SimConfig {
    let mut config = SimConfig {
        seed,
        open_ns: NS_PER_SEC,
        close_ns: 121 * NS_PER_SEC,
        latency: LatencyConfig::Fixed {
            network_ns: 1_000_000,
            compute_ns: 0,
        },
        ..SimConfig::default()
    };
    config.noise.count = 20;
    config.noise.mean_wake_ns = NS_PER_SEC / 2;
    config.master.future_window_ns = 2 * NS_PER_SEC;
    config.followers.count = 5;
    config.followers.max_delay_ns = 10_000_000;
    config
}

#[test]
fn small_day_runs_end_to_end() {
    let report = run_with_config(&small_config(42)).unwrap();
    let stats = &report.stats;

    assert!(report.summary.messages_delivered > 0);
    assert!(stats.trades > 0);
    assert!(stats.volume >= stats.trades);

    // The handshake finishes long before the open, so every signal reaches all followers.
    assert!(stats.signals_relayed > 0);
    assert_eq!(stats.signals_relayed % report.follower_ids.len() as u64, 0);
    assert!(stats.signals_mirrored <= stats.signals_relayed);

    let valued: Vec<_> = stats.valuations.iter().map(|v| v.agent).collect();
    let mut expected = vec![report.master_id];
    expected.extend(&report.follower_ids);
    assert_eq!(valued, expected);
    assert!(stats.valuations.iter().all(|v| v.surplus.is_finite()));
}

#[test]
fn same_seed_replays_the_same_day() {
    let a = run_with_config(&small_config(9)).unwrap();
    let b = run_with_config(&small_config(9)).unwrap();
    assert_eq!(a, b);
}

#[test]
fn execution_trigger_relays_only_after_fills() {
    let mut config = small_config(5);
    config.master.trigger = TriggerPolicy::Execution;
    let (mut engine, layout) = build_engine(&config, None).unwrap();
    let events = collect_events(&mut engine);
    engine.run(config.stop_ns());

    let events = events.borrow();
    let master_trades: Vec<u64> = events
        .iter()
        .filter_map(|e| match e {
            SimEvent::Trade { ts, buyer, seller, .. } if *buyer == layout.master || *seller == layout.master => {
                Some(*ts)
            }
            _ => None,
        })
        .collect();

    let mut fill_relays = 0;
    for event in events.iter() {
        if let SimEvent::SignalRelayed { ts, kind, .. } = event {
            if *kind == SignalKind::OrderCancelled {
                continue;
            }
            assert_eq!(*kind, SignalKind::OrderExecuted, "relay at {ts}");
            assert!(
                master_trades.iter().any(|&t| t <= *ts),
                "relay at {ts} before any fill of the leader"
            );
            fill_relays += 1;
        }
    }
    assert!(fill_relays > 0);
    assert_eq!(fill_relays % layout.followers.len(), 0);
}

#[test]
fn invalid_hours_are_rejected_before_running() {
    let mut config = small_config(1);
    config.close_ns = config.open_ns;
    assert!(matches!(
        run_with_config(&config),
        Err(SimError::InvalidMarketHours { .. })
    ));
}

#[test]
fn bundled_scenarios_parse_and_validate() {
    let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("scenarios");
    for name in ["herd_demo.json", "herd_execution_trigger.json"] {
        let config = SimConfig::from_file(dir.join(name)).unwrap();
        assert!(config.stop_ns() >= config.close_ns, "{name}");
    }
}
