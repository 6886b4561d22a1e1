/*!
 * Traffic Types
 * Directions, vehicles, and intersection statistics
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the four approaches to the intersection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    /// All approaches, in index order
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    /// Stable index (north = 0, east = 1, south = 2, west = 3)
    #[inline(always)]
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Direction::North => 0,
            Direction::East => 1,
            Direction::South => 2,
            Direction::West => 3,
        }
    }

    #[inline]
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Direction> {
        match index {
            0 => Some(Direction::North),
            1 => Some(Direction::East),
            2 => Some(Direction::South),
            3 => Some(Direction::West),
            _ => None,
        }
    }

    /// Exit reached by turning right from this approach
    #[inline]
    #[must_use]
    pub const fn right_turn_exit(self) -> Direction {
        match self {
            Direction::North => Direction::West,
            Direction::East => Direction::North,
            Direction::South => Direction::East,
            Direction::West => Direction::South,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::North => "north",
            Direction::East => "east",
            Direction::South => "south",
            Direction::West => "west",
        };
        f.write_str(name)
    }
}

/// A vehicle's path through the intersection
///
/// Vehicles carry no identity beyond their origin/destination pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Vehicle {
    pub origin: Direction,
    pub destination: Direction,
}

impl Vehicle {
    #[inline]
    #[must_use]
    pub const fn new(origin: Direction, destination: Direction) -> Self {
        Self {
            origin,
            destination,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_right_turn(&self) -> bool {
        self.origin.right_turn_exit() == self.destination
    }
}

impl fmt::Display for Vehicle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.origin, self.destination)
    }
}

/// Counters maintained by the intersection under its lock
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntersectionStats {
    /// Vehicles admitted into the intersection
    pub admitted: u64,
    /// Admissions that had to block at least once
    pub blocked: u64,
    /// Wakeup broadcasts issued by departures
    pub wakeups: u64,
    /// Largest number of simultaneous occupants observed
    pub peak_occupancy: usize,
}
