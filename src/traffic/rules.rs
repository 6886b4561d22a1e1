/*!
 * Collision Rules
 * Decides whether two vehicles may occupy the intersection together
 */

use super::types::Vehicle;

/// True exactly for west→south, south→east, east→north and north→west
#[inline]
#[must_use]
pub fn is_right_turn(vehicle: &Vehicle) -> bool {
    vehicle.is_right_turn()
}

/// Whether the paths of `a` and `b` cross
///
/// Two vehicles may coexist when any of these holds:
/// 1. they come from the same approach,
/// 2. they travel straight past each other in opposite directions,
/// 3. one of them turns right and they leave by different exits.
#[must_use]
pub fn conflicts(a: &Vehicle, b: &Vehicle) -> bool {
    if a.origin == b.origin {
        return false;
    }
    if a.origin == b.destination && a.destination == b.origin {
        return false;
    }
    if a.destination != b.destination && (is_right_turn(a) || is_right_turn(b)) {
        return false;
    }
    true
}

/// Whether `candidate` conflicts with any current occupant
#[inline]
#[must_use]
pub fn conflicts_with_any(candidate: &Vehicle, occupants: &[Vehicle]) -> bool {
    occupants.iter().any(|occupant| conflicts(candidate, occupant))
}

/// Pairwise check over a whole occupancy set
#[must_use]
pub fn is_safe(occupants: &[Vehicle]) -> bool {
    occupants.iter().enumerate().all(|(i, a)| {
        occupants[i + 1..]
            .iter()
            .all(|b| !conflicts(a, b))
    })
}
