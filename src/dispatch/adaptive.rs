use rand::{Rng, RngCore};

use crate::city::{City, DispatchCandidate};
use crate::entities::{Trip, TripPhase, Vehicle, VehiclePhase};

use super::{bucket_by_location, dense_search, dispatch_density, shuffle, unassigned_trip_indices, DispatchAlgorithm, DENSE_DENSITY_THRESHOLD};

/// The default adaptive policy: a sparse linear scan when vehicles are
/// scarce relative to the grid, a bucketed dense search once they are
/// dense enough that bucketing pays for itself. Only idle (P1) vehicles
/// are considered.
#[derive(Debug, Default)]
pub struct AdaptiveDispatch;

impl DispatchAlgorithm for AdaptiveDispatch {
    fn dispatch(&self, city: &City, vehicles: &mut [Vehicle], trips: &mut [Trip], rng: &mut dyn RngCore) {
        let mut dispatchable: Vec<usize> = vehicles
            .iter()
            .filter(|v| v.phase == VehiclePhase::P1)
            .map(|v| v.index)
            .collect();
        if dispatchable.is_empty() {
            return;
        }

        let mut trip_order = unassigned_trip_indices(trips);
        shuffle(&mut trip_order, rng);

        let density = dispatch_density(dispatchable.len(), city);
        if density < DENSE_DENSITY_THRESHOLD {
            for trip_idx in trip_order {
                if dispatchable.is_empty() {
                    break;
                }
                let origin = trips[trip_idx].origin;
                if let Some(pos) = sparse_find(city, vehicles, &dispatchable, origin) {
                    let vehicle_idx = dispatchable.swap_remove(pos);
                    assign(vehicles, trips, vehicle_idx, trip_idx);
                }
            }
        } else {
            let mut buckets = bucket_by_location(vehicles, dispatchable.iter());
            for trip_idx in trip_order {
                if dispatchable.is_empty() {
                    break;
                }
                let origin = trips[trip_idx].origin;
                let candidates = dense_search(city, origin, &buckets, |v| {
                    city.dispatch_distance(vehicles[v].location, vehicles[v].direction, origin, DispatchCandidate::Idle) as f64
                });
                if candidates.is_empty() {
                    continue;
                }
                let winner = candidates[rng.gen_range(0..candidates.len())];
                remove_from_buckets(&mut buckets, vehicles[winner].location, winner);
                dispatchable.retain(|&v| v != winner);
                assign(vehicles, trips, winner, trip_idx);
            }
        }
    }
}

/// Linear scan over `candidates`, returning the index *within*
/// `candidates` of the nearest vehicle, stopping as soon as a
/// distance-1 candidate (the closest possible) is found. Ties are
/// broken by scan order over a pre-shuffled candidate list, so no
/// additional randomization is needed here.
fn sparse_find(city: &City, vehicles: &[Vehicle], candidates: &[usize], origin: crate::city::Location) -> Option<usize> {
    let mut best_pos = None;
    let mut best_dist = i32::MAX;
    for (pos, &v) in candidates.iter().enumerate() {
        let dist = city.dispatch_distance(vehicles[v].location, vehicles[v].direction, origin, DispatchCandidate::Idle);
        if dist < best_dist {
            best_dist = dist;
            best_pos = Some(pos);
            if dist <= 1 {
                break;
            }
        }
    }
    best_pos
}

fn remove_from_buckets(buckets: &mut std::collections::HashMap<crate::city::Location, Vec<usize>>, loc: crate::city::Location, vehicle_idx: usize) {
    if let Some(v) = buckets.get_mut(&loc) {
        v.retain(|&x| x != vehicle_idx);
    }
}

fn assign(vehicles: &mut [Vehicle], trips: &mut [Trip], vehicle_idx: usize, trip_idx: usize) {
    let origin = trips[trip_idx].origin;
    let destination = trips[trip_idx].destination;
    vehicles[vehicle_idx].assign(trip_idx, origin, destination);
    trips[trip_idx].transition(TripPhase::Waiting);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::city::Location;
    use rand::SeedableRng;

    #[test]
    fn assigns_nearest_idle_vehicle() {
        let city = City::new(10, 0.0, false);
        let mut vehicles = vec![
            Vehicle::new(0, Location::new(0, 0), crate::city::Direction::North),
            Vehicle::new(1, Location::new(5, 5), crate::city::Direction::North),
        ];
        let mut trips = vec![Trip::new(0, Location::new(0, 1), Location::new(3, 3), 5)];
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        AdaptiveDispatch.dispatch(&city, &mut vehicles, &mut trips, &mut rng);
        assert_eq!(trips[0].phase, TripPhase::Waiting);
        assert_eq!(vehicles[0].phase, VehiclePhase::P2);
        assert_eq!(vehicles[1].phase, VehiclePhase::P1);
    }

    #[test]
    fn no_candidate_leaves_trip_unassigned() {
        let city = City::new(10, 0.0, false);
        let mut vehicles: Vec<Vehicle> = Vec::new();
        let mut trips = vec![Trip::new(0, Location::new(0, 1), Location::new(3, 3), 5)];
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        AdaptiveDispatch.dispatch(&city, &mut vehicles, &mut trips, &mut rng);
        assert_eq!(trips[0].phase, TripPhase::Unassigned);
    }
}
