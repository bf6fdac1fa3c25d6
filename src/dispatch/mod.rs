//! The pluggable dispatch engine (§4.5): matches idle vehicles to
//! unassigned trips, at most one vehicle per trip per block.
//!
//! Policy selection mirrors the crate this project is adapted from,
//! which picks a concrete matching algorithm behind one trait
//! (`MatchingAlgorithm`) from a config enum rather than hard-wiring a
//! single strategy.

mod adaptive;
mod forward;
mod p1_legacy;
mod random;

pub use adaptive::AdaptiveDispatch;
pub use forward::ForwardDispatchAlgorithm;
pub use p1_legacy::P1LegacyDispatch;
pub use random::RandomDispatch;

use std::collections::{HashMap, HashSet};

use rand::RngCore;

use crate::city::{City, Location};
use crate::config::DispatchMethod;
use crate::entities::{Trip, TripPhase, Vehicle};

/// A pluggable nearest-vehicle matching policy. Implementations must
/// only mutate vehicles/trips they assign (no vehicle assigned to more
/// than one active trip) and must leave a trip `Unassigned` if no
/// candidate is found — that is a routine outcome, not an error.
pub trait DispatchAlgorithm: std::fmt::Debug {
    fn dispatch(&self, city: &City, vehicles: &mut [Vehicle], trips: &mut [Trip], rng: &mut dyn RngCore);
}

pub fn create_dispatch_algorithm(method: DispatchMethod, forward_dispatch_bias: f64) -> Box<dyn DispatchAlgorithm> {
    match method {
        DispatchMethod::Default => Box::new(AdaptiveDispatch),
        DispatchMethod::ForwardDispatch => Box::new(ForwardDispatchAlgorithm::new(forward_dispatch_bias)),
        DispatchMethod::P1Legacy => Box::new(P1LegacyDispatch),
        DispatchMethod::Random => Box::new(RandomDispatch),
    }
}

/// The density threshold (dispatchable vehicles per grid cell) above
/// which the adaptive policies switch from a sparse linear scan to a
/// bucketed dense search (§4.5).
pub(crate) const DENSE_DENSITY_THRESHOLD: f64 = 0.9;

pub(crate) fn unassigned_trip_indices(trips: &[Trip]) -> Vec<usize> {
    trips
        .iter()
        .filter(|t| t.phase == TripPhase::Unassigned)
        .map(|t| t.index)
        .collect()
}

pub(crate) fn shuffle<T>(items: &mut [T], rng: &mut dyn RngCore) {
    use rand::Rng;
    for i in (1..items.len()).rev() {
        let j = rng.gen_range(0..=i);
        items.swap(i, j);
    }
}

pub(crate) fn dispatch_density(dispatchable_count: usize, city: &City) -> f64 {
    dispatchable_count as f64 / (city.city_size as f64 * city.city_size as f64)
}

/// Bucket vehicle indices by grid location, for the dense diamond-ring
/// search. Reused across calls within one block by the caller.
pub(crate) fn bucket_by_location<'a>(
    vehicles: &[Vehicle],
    candidate_indices: impl Iterator<Item = &'a usize>,
) -> HashMap<Location, Vec<usize>> {
    let mut buckets: HashMap<Location, Vec<usize>> = HashMap::new();
    for &idx in candidate_indices {
        buckets.entry(vehicles[idx].location).or_default().push(idx);
    }
    buckets
}

/// All grid locations at toroidal L1 (diamond) distance exactly `d`
/// from `origin`, deduplicated (small grids can wrap a ring onto
/// itself).
pub(crate) fn ring_locations(city: &City, origin: Location, d: i32) -> Vec<Location> {
    if d == 0 {
        return vec![city.wrap_location(origin)];
    }
    let mut seen = HashSet::new();
    for dx in -d..=d {
        let dy = d - dx.abs();
        seen.insert(city.wrap_location(Location::new(origin.x + dx, origin.y + dy)));
        if dy != 0 {
            seen.insert(city.wrap_location(Location::new(origin.x + dx, origin.y - dy)));
        }
    }
    seen.into_iter().collect()
}

/// Diamond-ring expansion search shared by the adaptive and
/// forward-dispatch dense policies: walk rings `d = 0, 1, 2, ...`
/// around `origin`, scoring every candidate vehicle in each ring with
/// `score`, and stop once at least one candidate has been found and
/// the ring radius has caught up to the best score seen. Returns the
/// indices tied at the best score, for the caller to tie-break.
pub(crate) fn dense_search(
    city: &City,
    origin: Location,
    buckets: &HashMap<Location, Vec<usize>>,
    mut score: impl FnMut(usize) -> f64,
) -> Vec<usize> {
    let mut best = f64::MAX;
    let mut candidates: Vec<usize> = Vec::new();
    let max_ring = city.city_size; // grid diameter bounds any useful search
    let mut d = 0;
    loop {
        for loc in ring_locations(city, origin, d) {
            if let Some(vs) = buckets.get(&loc) {
                for &v in vs {
                    let dist = score(v);
                    if dist < best {
                        best = dist;
                        candidates.clear();
                        candidates.push(v);
                    } else if dist == best {
                        candidates.push(v);
                    }
                }
            }
        }
        if (!candidates.is_empty() && (d as f64) >= best) || d > max_ring {
            break;
        }
        d += 1;
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_zero_is_origin() {
        let c = City::new(10, 0.0, false);
        assert_eq!(ring_locations(&c, Location::new(3, 3), 0), vec![Location::new(3, 3)]);
    }

    #[test]
    fn ring_one_has_four_points() {
        let c = City::new(10, 0.0, false);
        let ring = ring_locations(&c, Location::new(5, 5), 1);
        assert_eq!(ring.len(), 4);
        for p in ring {
            assert_eq!(c.distance(Location::new(5, 5), p), 1);
        }
    }
}
