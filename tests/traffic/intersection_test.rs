/*!
 * Intersection Controller Tests
 * Admission, blocking and wakeup behavior with real vehicle threads
 */

use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use synch_kernel::traffic::{Direction, Intersection, IntersectionConfig, Vehicle, WakeupStrategy};
use Direction::*;

const PATIENCE: Duration = Duration::from_secs(5);

/// Spin until `n` vehicles are parked in `before_entry`
fn wait_for_waiters(intersection: &Intersection, n: usize) {
    let deadline = Instant::now() + PATIENCE;
    while intersection.waiting_count() < n {
        assert!(Instant::now() < deadline, "vehicles never started waiting");
        thread::sleep(Duration::from_millis(1));
    }
}

/// Enter on a separate thread, reporting admission over a channel
fn arrive(
    intersection: &Arc<Intersection>,
    origin: Direction,
    destination: Direction,
) -> (flume::Receiver<()>, thread::JoinHandle<()>) {
    let (admitted_tx, admitted_rx) = flume::bounded(1);
    let intersection = Arc::clone(intersection);
    let handle = thread::spawn(move || {
        intersection.before_entry(origin, destination);
        admitted_tx.send(()).unwrap();
    });
    (admitted_rx, handle)
}

#[test]
fn test_opposing_straight_paths_share_the_intersection() {
    let intersection = Intersection::init(IntersectionConfig::default());

    intersection.before_entry(North, South);
    intersection.before_entry(South, North);
    assert_eq!(intersection.occupants().len(), 2);
    assert_eq!(intersection.stats().blocked, 0);

    intersection.after_exit(North, South);
    intersection.after_exit(South, North);
    intersection.cleanup();
}

#[test]
fn test_two_right_turns_are_both_admitted() {
    let intersection = Intersection::init(IntersectionConfig::default());

    intersection.before_entry(West, South);
    intersection.before_entry(South, East);
    assert_eq!(
        intersection.occupants(),
        vec![Vehicle::new(West, South), Vehicle::new(South, East)]
    );

    intersection.after_exit(South, East);
    intersection.after_exit(West, South);
    assert_eq!(intersection.cleanup().blocked, 0);
}

fn same_destination_blocks_then_wakes(strategy: WakeupStrategy) {
    let intersection = Arc::new(Intersection::init(IntersectionConfig::with_strategy(
        strategy,
    )));
    intersection.before_entry(North, South);

    let (admitted, handle) = arrive(&intersection, East, South);
    wait_for_waiters(&intersection, 1);
    assert!(admitted.try_recv().is_err());
    assert_eq!(intersection.occupants(), vec![Vehicle::new(North, South)]);

    intersection.after_exit(North, South);
    admitted
        .recv_timeout(PATIENCE)
        .expect("waiting vehicle was never admitted");
    handle.join().unwrap();

    assert_eq!(intersection.occupants(), vec![Vehicle::new(East, South)]);
    intersection.after_exit(East, South);

    let intersection = Arc::try_unwrap(intersection).ok().unwrap();
    let stats = intersection.cleanup();
    assert_eq!(stats.admitted, 2);
    assert_eq!(stats.blocked, 1);
    assert!(stats.wakeups >= 1);
}

#[test]
fn test_same_destination_blocks_then_wakes_shared() {
    same_destination_blocks_then_wakes(WakeupStrategy::Shared);
}

#[test]
fn test_same_destination_blocks_then_wakes_per_origin() {
    same_destination_blocks_then_wakes(WakeupStrategy::PerOrigin);
}

#[test]
fn test_waiter_stays_blocked_while_any_conflict_remains() {
    let intersection = Arc::new(Intersection::init(IntersectionConfig::default()));
    intersection.before_entry(North, South);
    intersection.before_entry(South, North);

    // Crossing straight path conflicts with both occupants
    let (admitted, handle) = arrive(&intersection, West, East);
    wait_for_waiters(&intersection, 1);

    intersection.after_exit(North, South);
    assert!(admitted.recv_timeout(Duration::from_millis(50)).is_err());
    assert_eq!(intersection.waiting_count(), 1);

    intersection.after_exit(South, North);
    admitted.recv_timeout(PATIENCE).unwrap();
    handle.join().unwrap();

    intersection.after_exit(West, East);
    Arc::try_unwrap(intersection).ok().unwrap().cleanup();
}

#[test]
fn test_departure_wakes_every_eligible_origin() {
    let intersection = Arc::new(Intersection::init(IntersectionConfig::with_strategy(
        WakeupStrategy::PerOrigin,
    )));
    intersection.before_entry(North, South);

    // Both conflict with north->south but not with each other
    let (east_admitted, east) = arrive(&intersection, East, West);
    let (west_admitted, west) = arrive(&intersection, West, East);
    wait_for_waiters(&intersection, 2);

    intersection.after_exit(North, South);
    east_admitted.recv_timeout(PATIENCE).unwrap();
    west_admitted.recv_timeout(PATIENCE).unwrap();
    east.join().unwrap();
    west.join().unwrap();
    assert_eq!(intersection.occupants().len(), 2);

    intersection.after_exit(East, West);
    intersection.after_exit(West, East);
    let stats = Arc::try_unwrap(intersection).ok().unwrap().cleanup();
    assert_eq!(stats.peak_occupancy, 2);
}
