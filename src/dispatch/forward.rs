use std::collections::HashMap;

use rand::{Rng, RngCore};

use crate::city::{City, DispatchCandidate, Location};
use crate::entities::{Trip, TripPhase, Vehicle, VehiclePhase};

use super::{bucket_by_location, dense_search, shuffle, unassigned_trip_indices, DispatchAlgorithm};

/// Dense search that also considers P3 vehicles with no queued next
/// trip, assigning to one of them *queues* the trip on that vehicle
/// instead of dispatching it immediately (it starts when the vehicle
/// reaches its current dropoff). Idle (P1) candidates are preferred
/// over P3 candidates on ties, by `bias`.
#[derive(Debug)]
pub struct ForwardDispatchAlgorithm {
    bias: f64,
}

impl ForwardDispatchAlgorithm {
    pub fn new(bias: f64) -> Self {
        Self { bias }
    }
}

impl DispatchAlgorithm for ForwardDispatchAlgorithm {
    fn dispatch(&self, city: &City, vehicles: &mut [Vehicle], trips: &mut [Trip], rng: &mut dyn RngCore) {
        let mut dispatchable: Vec<usize> = vehicles
            .iter()
            .filter(|v| v.is_dispatchable(true))
            .map(|v| v.index)
            .collect();
        if dispatchable.is_empty() {
            return;
        }

        let mut trip_order = unassigned_trip_indices(trips);
        shuffle(&mut trip_order, rng);

        let mut buckets: HashMap<Location, Vec<usize>> = bucket_by_location(vehicles, dispatchable.iter());

        for trip_idx in trip_order {
            if dispatchable.is_empty() {
                break;
            }
            let origin = trips[trip_idx].origin;
            // The bias is folded into the distance itself, not applied
            // after the fact: a P1 candidate several blocks farther than
            // the nearest P3 can still lose once biased, so it must be
            // part of the metric the ring search stops and ties on.
            let candidates = dense_search(city, origin, &buckets, |v| {
                let vehicle = &vehicles[v];
                let candidate = match vehicle.phase {
                    VehiclePhase::P1 => DispatchCandidate::Idle,
                    _ => DispatchCandidate::ForwardDispatch {
                        trip_destination: vehicle
                            .dropoff_location
                            .expect("forward-dispatch candidate must carry its current dropoff"),
                    },
                };
                let distance = city.dispatch_distance(vehicle.location, vehicle.direction, origin, candidate) as f64;
                if vehicle.phase == VehiclePhase::P1 {
                    distance + self.bias
                } else {
                    distance
                }
            });
            if candidates.is_empty() {
                continue;
            }
            let winner = candidates[rng.gen_range(0..candidates.len())];

            let origin = trips[trip_idx].origin;
            let destination = trips[trip_idx].destination;
            let was_p1 = vehicles[winner].phase == VehiclePhase::P1;
            vehicles[winner].assign(trip_idx, origin, destination);
            trips[trip_idx].transition(TripPhase::Waiting);
            trips[trip_idx].forward_dispatched = !was_p1;

            if was_p1 {
                // P1 vehicles leave the dispatchable pool once assigned.
                let loc = vehicles[winner].location;
                if let Some(v) = buckets.get_mut(&loc) {
                    v.retain(|&x| x != winner);
                }
                dispatchable.retain(|&v| v != winner);
            }
            // P3 vehicles stay dispatchable-by-location (they keep
            // moving toward their current dropoff) but are no longer
            // eligible once queued; remove them too.
            if !was_p1 {
                let loc = vehicles[winner].location;
                if let Some(v) = buckets.get_mut(&loc) {
                    v.retain(|&x| x != winner);
                }
                dispatchable.retain(|&v| v != winner);
            }
        }
    }
}
