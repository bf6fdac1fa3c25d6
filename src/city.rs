//! The toroidal street grid: locations, compass directions, and the
//! distance/sampling operations every other module builds on.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// A grid intersection, `0 <= x, y < city_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub x: i32,
    pub y: i32,
}

impl Location {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Compass direction a vehicle is currently heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    /// Unit step vector for this direction, `(dx, dy)`.
    pub fn vector(self) -> (i32, i32) {
        match self {
            Direction::North => (0, 1),
            Direction::East => (1, 0),
            Direction::South => (0, -1),
            Direction::West => (-1, 0),
        }
    }

    /// The direction exactly opposite this one. Used to forbid U-turns.
    pub fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
        }
    }

    pub fn is_ns(self) -> bool {
        matches!(self, Direction::North | Direction::South)
    }

    pub fn is_ew(self) -> bool {
        matches!(self, Direction::East | Direction::West)
    }
}

/// The two shapes of vehicle [`City::dispatch_distance`] knows how to
/// price: an idle vehicle about to clear its current intersection, or
/// a with-rider vehicle being considered for forward dispatch, which
/// must finish its current trip before it can serve a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchCandidate {
    Idle,
    ForwardDispatch { trip_destination: Location },
}

/// The toroidal street grid a simulation runs on.
#[derive(Debug, Clone)]
pub struct City {
    /// Even grid side length.
    pub city_size: i32,
    /// Fraction in `[0, 1]` of sampled locations drawn from the central
    /// square instead of uniformly over the whole grid.
    pub inhomogeneity: f64,
    /// Whether the central-square bias also applies to destinations
    /// (origins are always eligible for it).
    pub inhomogeneous_destinations: bool,
}

impl City {
    pub fn new(city_size: i32, inhomogeneity: f64, inhomogeneous_destinations: bool) -> Self {
        let city_size = if city_size % 2 != 0 {
            city_size + 1
        } else {
            city_size
        };
        Self {
            city_size,
            inhomogeneity,
            inhomogeneous_destinations,
        }
    }

    fn wrap(&self, v: i32) -> i32 {
        v.rem_euclid(self.city_size)
    }

    pub fn wrap_location(&self, loc: Location) -> Location {
        Location::new(self.wrap(loc.x), self.wrap(loc.y))
    }

    /// Lower/upper bound (exclusive) of the central square used for
    /// inhomogeneous sampling.
    fn central_square(&self) -> (i32, i32) {
        let n = self.city_size;
        let half = n / 2;
        let lower = (n - half) / 2;
        let upper = (n + half) / 2;
        (lower, upper)
    }

    /// Draw a uniformly random location, biased toward the central
    /// square with probability `inhomogeneity` when `is_destination` is
    /// false, or when it is true and `inhomogeneous_destinations` is set.
    pub fn sample_location<R: Rng + ?Sized>(&self, rng: &mut R, is_destination: bool) -> Location {
        let mut loc = Location::new(rng.gen_range(0..self.city_size), rng.gen_range(0..self.city_size));
        let eligible = !is_destination || self.inhomogeneous_destinations;
        if eligible && self.inhomogeneity > 0.0 && rng.gen::<f64>() < self.inhomogeneity {
            let (lower, upper) = self.central_square();
            if upper > lower {
                loc = Location::new(rng.gen_range(lower..upper), rng.gen_range(lower..upper));
            }
        }
        loc
    }

    /// Toroidal Manhattan distance between two locations, with an
    /// optional early-exit threshold: once the running total reaches or
    /// exceeds `threshold`, the exact remaining distance is still
    /// correct but callers that only need a yes/no answer may stop early
    /// by inspecting the per-axis partial sums themselves. Returning the
    /// full distance keeps the function simple and branch-free; the
    /// `threshold` parameter exists for API parity with the dispatch
    /// engine's "stop at the first distance-1 candidate" contract, which
    /// callers implement at the call site instead.
    pub fn distance(&self, a: Location, b: Location) -> i32 {
        self.axis_distance(a.x, b.x) + self.axis_distance(a.y, b.y)
    }

    /// Like [`City::distance`] but returns as soon as the partial sum
    /// reaches `threshold`, short-circuiting the second axis. Used by
    /// the sparse dispatch scan, which only cares whether a candidate is
    /// at distance 1.
    pub fn distance_at_most(&self, a: Location, b: Location, threshold: i32) -> Option<i32> {
        let dx = self.axis_distance(a.x, b.x);
        if dx > threshold {
            return None;
        }
        let total = dx + self.axis_distance(a.y, b.y);
        if total <= threshold {
            Some(total)
        } else {
            None
        }
    }

    fn axis_distance(&self, a: i32, b: i32) -> i32 {
        let n = self.city_size;
        let d = (a - b).abs();
        d.min(n - d)
    }

    fn next_intersection(&self, loc: Location, dir: Direction) -> Location {
        let (dx, dy) = dir.vector();
        self.wrap_location(Location::new(loc.x + dx, loc.y + dy))
    }

    /// Sample an origin/destination pair for a new trip. The origin is
    /// drawn like any non-destination location; the destination is
    /// resampled until it differs from the origin, and — when
    /// `max_trip_distance` caps the grid's own diameter — is drawn by
    /// offsetting each axis of the origin by a random amount in
    /// `[min_trip_distance, max_trip_distance]` instead of being drawn
    /// uniformly over the whole grid.
    pub fn sample_trip_endpoints<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        min_trip_distance: i32,
        max_trip_distance: i32,
    ) -> (Location, Location) {
        let origin = self.sample_location(rng, false);
        let capped = max_trip_distance < self.city_size;
        loop {
            let destination = if !capped {
                self.sample_location(rng, true)
            } else {
                let delta_x = rng.gen_range(min_trip_distance..=max_trip_distance);
                let delta_y = rng.gen_range(min_trip_distance..=max_trip_distance);
                let half = max_trip_distance as f64 / 2.0;
                let x = ((origin.x as f64 - half + delta_x as f64).floor() as i32).rem_euclid(self.city_size);
                let y = ((origin.y as f64 - half + delta_y as f64).floor() as i32).rem_euclid(self.city_size);
                Location::new(x, y)
            };
            if destination != origin {
                return (origin, destination);
            }
        }
    }

    /// Distance a candidate vehicle would have to travel to reach
    /// `target`, given its current phase. For an idle (P1) vehicle this
    /// is one block (to clear the current intersection) plus the
    /// distance from the intersection it is about to enter. For a
    /// with-rider (P3) vehicle being considered for forward dispatch,
    /// it is the distance to that vehicle's own dropoff plus the
    /// distance from the dropoff to `target`.
    ///
    /// `update_location` runs before `update_direction` every block
    /// (§4.2), so a P1 vehicle already sitting on `target` still reports
    /// distance 1, not 0 — it has not yet committed to entering that
    /// intersection this block.
    pub fn dispatch_distance(
        &self,
        vehicle_location: Location,
        vehicle_direction: Direction,
        target: Location,
        candidate: DispatchCandidate,
    ) -> i32 {
        match candidate {
            DispatchCandidate::Idle => {
                let next = self.next_intersection(vehicle_location, vehicle_direction);
                1 + self.distance(next, target)
            }
            DispatchCandidate::ForwardDispatch { trip_destination } => {
                self.distance(vehicle_location, trip_destination) + self.distance(trip_destination, target)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn city() -> City {
        City::new(10, 0.0, false)
    }

    #[test]
    fn distance_wraps_around() {
        let c = city();
        assert_eq!(c.distance(Location::new(0, 0), Location::new(9, 0)), 1);
        assert_eq!(c.distance(Location::new(0, 0), Location::new(5, 0)), 5);
    }

    #[test]
    fn distance_at_most_short_circuits() {
        let c = city();
        assert_eq!(
            c.distance_at_most(Location::new(0, 0), Location::new(1, 0), 1),
            Some(1)
        );
        assert_eq!(
            c.distance_at_most(Location::new(0, 0), Location::new(5, 5), 1),
            None
        );
    }

    #[test]
    fn odd_city_size_rounds_up() {
        let c = City::new(7, 0.0, false);
        assert_eq!(c.city_size, 8);
    }

    #[test]
    fn dispatch_distance_p1_is_at_least_one() {
        let c = city();
        let d = c.dispatch_distance(
            Location::new(3, 3),
            Direction::North,
            Location::new(3, 3),
            DispatchCandidate::Idle,
        );
        assert_eq!(d, 1);
    }

    #[test]
    fn direction_has_no_opposite_equal_to_self() {
        for d in Direction::ALL {
            assert_ne!(d, d.opposite());
            assert_eq!(d.opposite().opposite(), d);
        }
    }
}
