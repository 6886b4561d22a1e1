/*!
 * Traffic Module
 * Intersection admission control and the simulation driver that exercises it
 */

pub mod config;
pub mod intersection;
pub mod rules;
pub mod simulation;
pub mod types;

// Re-export for convenience
pub use config::{IntersectionConfig, SimulationConfig, WakeupStrategy};
pub use intersection::Intersection;
pub use rules::{conflicts, conflicts_with_any, is_right_turn, is_safe};
pub use simulation::{run as run_simulation, SimulationReport};
pub use types::{Direction, IntersectionStats, Vehicle};
