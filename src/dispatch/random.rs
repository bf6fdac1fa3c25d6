use rand::{Rng, RngCore};

use crate::city::City;
use crate::entities::{Trip, TripPhase, Vehicle, VehiclePhase};

use super::{shuffle, unassigned_trip_indices, DispatchAlgorithm};

/// Uniformly random matching: every unassigned trip, in random order,
/// is given to a uniformly random still-available idle vehicle, with
/// no regard to distance. Useful as a baseline to compare against the
/// distance-aware policies.
#[derive(Debug, Default)]
pub struct RandomDispatch;

impl DispatchAlgorithm for RandomDispatch {
    fn dispatch(&self, _city: &City, vehicles: &mut [Vehicle], trips: &mut [Trip], rng: &mut dyn RngCore) {
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

        for trip_idx in trip_order {
            if dispatchable.is_empty() {
                break;
            }
            let pick = rng.gen_range(0..dispatchable.len());
            let vehicle_idx = dispatchable.swap_remove(pick);
            let origin = trips[trip_idx].origin;
            let destination = trips[trip_idx].destination;
            vehicles[vehicle_idx].assign(trip_idx, origin, destination);
            trips[trip_idx].transition(TripPhase::Waiting);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::city::{Direction, Location};
    use rand::SeedableRng;

    #[test]
    fn assigns_all_trips_when_enough_vehicles() {
        let city = City::new(10, 0.0, false);
        let mut vehicles = vec![
            Vehicle::new(0, Location::new(0, 0), Direction::North),
            Vehicle::new(1, Location::new(1, 1), Direction::North),
        ];
        let mut trips = vec![
            Trip::new(0, Location::new(5, 5), Location::new(1, 1), 10),
            Trip::new(1, Location::new(0, 1), Location::new(1, 1), 2),
        ];
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        RandomDispatch.dispatch(&city, &mut vehicles, &mut trips, &mut rng);
        assert!(trips.iter().all(|t| t.phase == TripPhase::Waiting));
    }
}
