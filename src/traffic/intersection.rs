/*!
 * Intersection Admission Controller
 *
 * Arbitrates entry of vehicles into the shared intersection. One mutex guards
 * the active set, the waiting set and the statistics; blocked vehicles park on
 * a condition variable and re-check the collision rules whenever they wake.
 *
 * # Wakeups
 *
 * A departure scans every waiter against the updated active set and
 * broadcasts on the queue of each waiter that could now enter. A wakeup is
 * only a hint: the woken vehicle re-evaluates the rules itself and goes back
 * to sleep if someone else got in first.
 */

use super::config::{IntersectionConfig, WakeupStrategy};
use super::rules;
use super::types::{Direction, IntersectionStats, Vehicle};
use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, info, trace};

/// Vehicle that has asked to enter but has not been admitted yet
#[derive(Debug, Clone, Copy)]
struct Waiter {
    ticket: u64,
    vehicle: Vehicle,
}

#[derive(Debug, Default)]
struct IntersectionState {
    active: Vec<Vehicle>,
    waiting: Vec<Waiter>,
    next_ticket: u64,
    stats: IntersectionStats,
}

impl IntersectionState {
    fn enqueue(&mut self, vehicle: Vehicle) -> u64 {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.waiting.push(Waiter { ticket, vehicle });
        ticket
    }

    fn admit(&mut self, ticket: u64) -> Vehicle {
        let index = self
            .waiting
            .iter()
            .position(|w| w.ticket == ticket)
            .unwrap_or_else(|| panic!("waiting vehicle #{} vanished from the waiting set", ticket));
        let vehicle = self.waiting.remove(index).vehicle;

        self.active.push(vehicle);
        self.stats.admitted += 1;
        self.stats.peak_occupancy = self.stats.peak_occupancy.max(self.active.len());
        vehicle
    }

    fn depart(&mut self, vehicle: Vehicle) {
        let index = self
            .active
            .iter()
            .position(|v| *v == vehicle)
            .unwrap_or_else(|| {
                panic!(
                    "vehicle {} left the intersection without entering it",
                    vehicle
                )
            });
        self.active.swap_remove(index);
    }
}

/// Condition variables blocked vehicles park on
enum WakeupQueues {
    Shared(Condvar),
    PerOrigin([Condvar; 4]),
}

impl WakeupQueues {
    fn new(strategy: WakeupStrategy) -> Self {
        match strategy {
            WakeupStrategy::Shared => WakeupQueues::Shared(Condvar::new()),
            WakeupStrategy::PerOrigin => WakeupQueues::PerOrigin([
                Condvar::new(),
                Condvar::new(),
                Condvar::new(),
                Condvar::new(),
            ]),
        }
    }

    #[inline]
    fn queue(&self, origin: Direction) -> &Condvar {
        match self {
            WakeupQueues::Shared(cv) => cv,
            WakeupQueues::PerOrigin(cvs) => &cvs[origin.index()],
        }
    }

    #[inline]
    fn wait(&self, origin: Direction, guard: &mut MutexGuard<'_, IntersectionState>) {
        self.queue(origin).wait(guard);
    }

    /// Broadcast on the queues of the given eligible origins; returns the
    /// number of broadcasts issued
    fn wake(&self, eligible: [bool; 4]) -> u64 {
        match self {
            WakeupQueues::Shared(cv) => {
                if eligible.iter().any(|e| *e) {
                    cv.notify_all();
                    1
                } else {
                    0
                }
            }
            WakeupQueues::PerOrigin(cvs) => {
                let mut issued = 0;
                for (cv, _) in cvs.iter().zip(eligible).filter(|(_, e)| *e) {
                    cv.notify_all();
                    issued += 1;
                }
                issued
            }
        }
    }
}

/// Four-way intersection admission controller
///
/// Constructed once by [`Intersection::init`] before any vehicle activity and
/// torn down by [`Intersection::cleanup`] after it all stops. Share it between
/// vehicle threads by reference (`&Intersection` or `Arc<Intersection>`).
pub struct Intersection {
    state: Mutex<IntersectionState>,
    queues: WakeupQueues,
    config: IntersectionConfig,
}

impl Intersection {
    /// Create the lock, condition variables and empty vehicle sets
    pub fn init(config: IntersectionConfig) -> Self {
        info!(strategy = ?config.strategy, "Intersection initialized");
        Self {
            state: Mutex::new(IntersectionState::default()),
            queues: WakeupQueues::new(config.strategy),
            config,
        }
    }

    /// Tear the controller down
    ///
    /// # Panics
    /// If any vehicle is still inside or still waiting: some caller did not
    /// balance `before_entry` with `after_exit`.
    pub fn cleanup(self) -> IntersectionStats {
        let state = self.state.into_inner();
        assert!(
            state.active.is_empty(),
            "intersection torn down with {} vehicle(s) inside",
            state.active.len()
        );
        assert!(
            state.waiting.is_empty(),
            "intersection torn down with {} vehicle(s) waiting",
            state.waiting.len()
        );
        info!(
            admitted = state.stats.admitted,
            blocked = state.stats.blocked,
            peak = state.stats.peak_occupancy,
            "Intersection cleaned up"
        );
        state.stats
    }

    /// Block until the vehicle may safely enter, then admit it
    pub fn before_entry(&self, origin: Direction, destination: Direction) {
        let vehicle = Vehicle::new(origin, destination);
        let mut state = self.state.lock();
        let ticket = state.enqueue(vehicle);

        let mut blocked = false;
        while rules::conflicts_with_any(&vehicle, &state.active) {
            if !blocked {
                blocked = true;
                state.stats.blocked += 1;
                trace!(%vehicle, occupants = state.active.len(), "vehicle blocked");
            }
            self.queues.wait(origin, &mut state);
        }

        state.admit(ticket);
        debug_assert!(
            rules::is_safe(&state.active),
            "conflicting vehicles admitted: {:?}",
            state.active
        );
        debug!(%vehicle, occupants = state.active.len(), blocked, "vehicle entered");
    }

    /// Record a departure and wake every waiter that can now enter
    ///
    /// # Panics
    /// If no vehicle with this origin and destination is inside.
    pub fn after_exit(&self, origin: Direction, destination: Direction) {
        let vehicle = Vehicle::new(origin, destination);
        let mut state = self.state.lock();
        state.depart(vehicle);

        let mut eligible = [false; 4];
        for waiter in &state.waiting {
            if !rules::conflicts_with_any(&waiter.vehicle, &state.active) {
                eligible[waiter.vehicle.origin.index()] = true;
            }
        }

        let issued = self.queues.wake(eligible);
        state.stats.wakeups += issued;
        debug!(
            %vehicle,
            occupants = state.active.len(),
            waiting = state.waiting.len(),
            wakeups = issued,
            "vehicle exited"
        );
    }

    /// Vehicles currently inside
    pub fn occupants(&self) -> Vec<Vehicle> {
        self.state.lock().active.clone()
    }

    /// Vehicles blocked in `before_entry`
    pub fn waiting_count(&self) -> usize {
        self.state.lock().waiting.len()
    }

    pub fn stats(&self) -> IntersectionStats {
        self.state.lock().stats
    }

    #[inline]
    pub fn config(&self) -> &IntersectionConfig {
        &self.config
    }
}
