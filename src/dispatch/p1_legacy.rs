use rand::{Rng, RngCore};

use crate::city::{City, DispatchCandidate};
use crate::entities::{Trip, TripPhase, Vehicle, VehiclePhase};

use super::{shuffle, unassigned_trip_indices, DispatchAlgorithm};

/// Pure trip-loop baseline: iterate unassigned trips in random order,
/// and for each, linear-scan a shrinking pool of idle vehicles (also
/// shuffled once up front) for the nearest one, removing it from the
/// pool once claimed. Predates the adaptive sparse/dense split; kept
/// as a simple, easy-to-reason-about reference policy.
#[derive(Debug, Default)]
pub struct P1LegacyDispatch;

impl DispatchAlgorithm for P1LegacyDispatch {
    fn dispatch(&self, city: &City, vehicles: &mut [Vehicle], trips: &mut [Trip], rng: &mut dyn RngCore) {
        let mut dispatchable_vehicles: Vec<usize> = vehicles
            .iter()
            .filter(|v| v.phase == VehiclePhase::P1)
            .map(|v| v.index)
            .collect();
        if dispatchable_vehicles.is_empty() {
            return;
        }
        shuffle(&mut dispatchable_vehicles, rng);

        let mut trip_order = unassigned_trip_indices(trips);
        shuffle(&mut trip_order, rng);

        for trip_idx in trip_order {
            if dispatchable_vehicles.is_empty() {
                break;
            }
            let origin = trips[trip_idx].origin;
            let mut best_pos = None;
            let mut best_dist = i32::MAX;
            for (pos, &vehicle_idx) in dispatchable_vehicles.iter().enumerate() {
                let v = &vehicles[vehicle_idx];
                let dist = city.dispatch_distance(v.location, v.direction, origin, DispatchCandidate::Idle);
                if dist < best_dist {
                    best_dist = dist;
                    best_pos = Some(pos);
                }
                if dist <= 1 {
                    break;
                }
            }
            if let Some(pos) = best_pos {
                let vehicle_idx = dispatchable_vehicles.swap_remove(pos);
                let destination = trips[trip_idx].destination;
                vehicles[vehicle_idx].assign(trip_idx, origin, destination);
                trips[trip_idx].transition(TripPhase::Waiting);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::city::{Direction, Location};
    use rand::SeedableRng;

    #[test]
    fn assigns_each_trip_to_its_nearest_vehicle() {
        let city = City::new(10, 0.0, false);
        let mut vehicles = vec![
            Vehicle::new(0, Location::new(5, 5), Direction::North),
            Vehicle::new(1, Location::new(0, 1), Direction::North),
        ];
        let mut trips = vec![Trip::new(0, Location::new(0, 0), Location::new(1, 1), 10)];
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        P1LegacyDispatch.dispatch(&city, &mut vehicles, &mut trips, &mut rng);
        assert_eq!(vehicles[1].trip_index, Some(0));
        assert_eq!(vehicles[0].phase, VehiclePhase::P1);
        assert_eq!(trips[0].phase, TripPhase::Waiting);
    }

    #[test]
    fn leftover_trips_stay_unassigned_when_vehicles_run_out() {
        let city = City::new(10, 0.0, false);
        let mut vehicles = vec![Vehicle::new(0, Location::new(0, 0), Direction::North)];
        let mut trips = vec![
            Trip::new(0, Location::new(5, 5), Location::new(1, 1), 10),
            Trip::new(1, Location::new(0, 1), Location::new(1, 1), 2),
        ];
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        P1LegacyDispatch.dispatch(&city, &mut vehicles, &mut trips, &mut rng);
        let assigned_count = trips.iter().filter(|t| t.phase == TripPhase::Waiting).count();
        assert_eq!(assigned_count, 1);
        assert_eq!(vehicles[0].phase, VehiclePhase::P2);
    }
}
