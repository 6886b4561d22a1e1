/*!
 * Traffic Simulation Driver
 *
 * Sends seeded random traffic through an [`Intersection`] from several
 * concurrent threads. Each thread repeatedly picks an origin and a different
 * destination, calls `before_entry`, spends a random time inside, and calls
 * `after_exit`.
 *
 * Safety is checked independently of the controller: every vehicle registers
 * itself in a shadow occupancy list right after admission and verifies that
 * nothing already in it conflicts.
 */

use super::config::{IntersectionConfig, SimulationConfig};
use super::intersection::Intersection;
use super::rules;
use super::types::{Direction, IntersectionStats, Vehicle};
use crate::core::errors::KernelError;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// One completed trip through the intersection
#[derive(Debug, Clone, Copy)]
struct Trip {
    vehicle: Vehicle,
    waited: Duration,
    violation: bool,
}

/// Outcome of a simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub vehicles: usize,
    /// Admissions that found a conflicting vehicle already inside
    pub violations: usize,
    pub max_wait_us: u64,
    pub mean_wait_us: u64,
    /// Trips per origin, indexed north/east/south/west
    pub per_origin: [usize; 4],
    pub elapsed_ms: u64,
    pub intersection: IntersectionStats,
}

impl SimulationReport {
    #[inline]
    #[must_use]
    pub fn is_safe(&self) -> bool {
        self.violations == 0
    }
}

/// Shadow record of who is inside, kept apart from the controller's own state
#[derive(Default)]
struct Occupancy {
    inside: Mutex<Vec<Vehicle>>,
}

impl Occupancy {
    /// Returns false when `vehicle` conflicts with somebody already inside
    fn enter(&self, vehicle: Vehicle) -> bool {
        let mut inside = self.inside.lock();
        let safe = !rules::conflicts_with_any(&vehicle, &inside);
        inside.push(vehicle);
        safe
    }

    fn leave(&self, vehicle: Vehicle) {
        let mut inside = self.inside.lock();
        if let Some(index) = inside.iter().position(|v| *v == vehicle) {
            inside.swap_remove(index);
        }
    }
}

/// Random vehicle with distinct origin and destination
pub fn random_vehicle<R: Rng>(rng: &mut R) -> Vehicle {
    let origin = rng.gen_range(0..4);
    let destination = (origin + rng.gen_range(1..4)) % 4;
    Vehicle::new(
        Direction::from_index(origin).unwrap_or(Direction::North),
        Direction::from_index(destination).unwrap_or(Direction::South),
    )
}

fn random_pause<R: Rng>(rng: &mut R, max: Duration) -> Duration {
    if max.is_zero() {
        Duration::ZERO
    } else {
        Duration::from_micros(rng.gen_range(0..=max.as_micros() as u64))
    }
}

/// Run the simulation to completion
pub fn run(config: &SimulationConfig) -> Result<SimulationReport, KernelError> {
    let config = config.clone().validate()?;
    info!(
        threads = config.threads,
        vehicles_per_thread = config.vehicles_per_thread,
        strategy = ?config.strategy,
        seed = config.seed,
        "Starting traffic simulation"
    );

    let intersection = Arc::new(Intersection::init(IntersectionConfig::with_strategy(
        config.strategy,
    )));
    let occupancy = Arc::new(Occupancy::default());
    let (trip_tx, trip_rx) = flume::unbounded::<Trip>();
    let started = Instant::now();

    let mut handles = Vec::with_capacity(config.threads);
    for index in 0..config.threads {
        let intersection = Arc::clone(&intersection);
        let occupancy = Arc::clone(&occupancy);
        let trip_tx = trip_tx.clone();
        let config = config.clone();

        let handle = thread::Builder::new()
            .name(format!("vehicle-{}", index))
            .spawn(move || {
                let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(index as u64));
                for _ in 0..config.vehicles_per_thread {
                    let vehicle = random_vehicle(&mut rng);
                    let arrived = Instant::now();

                    intersection.before_entry(vehicle.origin, vehicle.destination);
                    let waited = arrived.elapsed();
                    let safe = occupancy.enter(vehicle);
                    if !safe {
                        warn!(%vehicle, "conflicting vehicle admitted");
                    }

                    thread::sleep(random_pause(&mut rng, config.max_crossing_time));

                    occupancy.leave(vehicle);
                    intersection.after_exit(vehicle.origin, vehicle.destination);

                    // Receiver outlives every sender; a send error means the driver is gone
                    if trip_tx
                        .send(Trip {
                            vehicle,
                            waited,
                            violation: !safe,
                        })
                        .is_err()
                    {
                        break;
                    }

                    thread::sleep(random_pause(&mut rng, config.max_arrival_delay));
                }
            })
            .map_err(|e| KernelError::Internal(format!("failed to spawn vehicle thread: {}", e)))?;
        handles.push(handle);
    }
    drop(trip_tx);

    let mut report = SimulationReport {
        vehicles: 0,
        violations: 0,
        max_wait_us: 0,
        mean_wait_us: 0,
        per_origin: [0; 4],
        elapsed_ms: 0,
        intersection: IntersectionStats::default(),
    };
    let mut total_wait_us: u128 = 0;

    for trip in trip_rx.iter() {
        let waited_us = trip.waited.as_micros();
        report.vehicles += 1;
        report.per_origin[trip.vehicle.origin.index()] += 1;
        report.max_wait_us = report.max_wait_us.max(waited_us as u64);
        total_wait_us += waited_us;
        if trip.violation {
            report.violations += 1;
        }
    }

    for handle in handles {
        handle
            .join()
            .map_err(|_| KernelError::Internal("vehicle thread panicked".to_string()))?;
    }

    let intersection = Arc::try_unwrap(intersection)
        .map_err(|_| KernelError::Internal("intersection still shared after join".to_string()))?;
    report.intersection = intersection.cleanup();
    report.elapsed_ms = started.elapsed().as_millis() as u64;
    if report.vehicles > 0 {
        report.mean_wait_us = (total_wait_us / report.vehicles as u128) as u64;
    }

    debug!(?report, "Traffic simulation finished");
    Ok(report)
}
