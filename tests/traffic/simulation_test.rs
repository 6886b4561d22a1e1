/*!
 * Traffic Simulation Tests
 * Seeded multi-threaded runs checked against the safety invariant
 */

use pretty_assertions::assert_eq;
use std::time::Duration;
use synch_kernel::traffic::{run_simulation, SimulationConfig, WakeupStrategy};

fn config(strategy: WakeupStrategy) -> SimulationConfig {
    SimulationConfig {
        threads: 8,
        vehicles_per_thread: 40,
        max_crossing_time: Duration::from_millis(1),
        max_arrival_delay: Duration::from_millis(1),
        seed: 42,
        strategy,
    }
}

#[test]
fn test_shared_strategy_is_safe() {
    let config = config(WakeupStrategy::Shared);
    let report = run_simulation(&config).unwrap();

    assert!(report.is_safe(), "violations: {}", report.violations);
    assert_eq!(report.vehicles, config.total_vehicles());
    assert_eq!(report.intersection.admitted, config.total_vehicles() as u64);
    assert_eq!(report.per_origin.iter().sum::<usize>(), report.vehicles);
}

#[test]
fn test_per_origin_strategy_is_safe() {
    let config = config(WakeupStrategy::PerOrigin);
    let report = run_simulation(&config).unwrap();

    assert!(report.is_safe(), "violations: {}", report.violations);
    assert_eq!(report.vehicles, config.total_vehicles());
    assert_eq!(report.intersection.admitted, config.total_vehicles() as u64);
}

#[test]
fn test_instant_crossings_still_complete() {
    let config = SimulationConfig {
        max_crossing_time: Duration::ZERO,
        max_arrival_delay: Duration::ZERO,
        ..config(WakeupStrategy::Shared)
    };
    let report = run_simulation(&config).unwrap();
    assert_eq!(report.vehicles, config.total_vehicles());
    assert!(report.is_safe());
}

#[test]
fn test_single_thread_never_blocks() {
    let config = SimulationConfig {
        threads: 1,
        ..config(WakeupStrategy::Shared)
    };
    let report = run_simulation(&config).unwrap();
    assert_eq!(report.intersection.blocked, 0);
    assert_eq!(report.intersection.peak_occupancy, 1);
}

#[test]
fn test_invalid_thread_count_is_rejected() {
    let config = SimulationConfig {
        threads: 0,
        ..SimulationConfig::default()
    };
    assert!(run_simulation(&config).is_err());
}
