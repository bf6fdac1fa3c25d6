//! Per-block history bookkeeping and the §4.7 derived measures.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::entities::{Trip, TripPhase, Vehicle, VehiclePhase};
use crate::history::{HistoryStore, Metric};

/// Tally one block's worth of per-phase counts into the history store
/// (§4.6 step 7). Trips that complete or cancel this block are counted
/// exactly once, then moved to `Inactive` so a later block never
/// recounts them — mirroring the push-then-retire bookkeeping the
/// block loop this crate is modeled on uses.
pub fn push_block_history(
    history: &mut HistoryStore,
    vehicles: &[Vehicle],
    trips: &mut [Trip],
    request_rate: f64,
    price: f64,
) {
    let vehicle_count = vehicles.len() as f64;
    let mut p1 = 0.0;
    let mut p2 = 0.0;
    let mut p3 = 0.0;
    for v in vehicles {
        match v.phase {
            VehiclePhase::P1 => p1 += 1.0,
            VehiclePhase::P2 => p2 += 1.0,
            VehiclePhase::P3 => p3 += 1.0,
        }
    }

    let mut wait_time = 0.0;
    let mut unassigned_time = 0.0;
    let mut awaiting_time = 0.0;
    let mut riding_time = 0.0;
    let mut distance = 0.0;
    let mut trip_count = 0.0;
    let mut completed_count = 0.0;
    let mut forward_dispatch_count = 0.0;

    for trip in trips.iter_mut() {
        trip.tick();
        match trip.phase {
            TripPhase::Unassigned => {
                unassigned_time += 1.0;
                wait_time += 1.0;
            }
            TripPhase::Waiting => {
                awaiting_time += 1.0;
                wait_time += 1.0;
            }
            TripPhase::Riding => {
                riding_time += 1.0;
                distance += 1.0;
            }
            TripPhase::Completed => {
                trip_count += 1.0;
                completed_count += 1.0;
                trip.transition(TripPhase::Inactive);
            }
            TripPhase::Cancelled => {
                trip_count += 1.0;
                trip.transition(TripPhase::Inactive);
            }
            TripPhase::Inactive => {}
        }
        if trip.forward_dispatched && matches!(trip.phase, TripPhase::Waiting | TripPhase::Riding) {
            forward_dispatch_count += 1.0;
        }
    }

    history.push(Metric::VehicleCount, vehicle_count);
    history.push(Metric::VehicleTime, vehicle_count);
    history.push(Metric::VehicleTimeP1, p1);
    history.push(Metric::VehicleTimeP2, p2);
    history.push(Metric::VehicleTimeP3, p3);
    history.push(Metric::TripCount, trip_count);
    history.push(Metric::TripCompletedCount, completed_count);
    history.push(Metric::TripRequestRate, request_rate);
    history.push(Metric::TripWaitTime, wait_time);
    history.push(Metric::TripUnassignedTime, unassigned_time);
    history.push(Metric::TripAwaitingTime, awaiting_time);
    history.push(Metric::TripRidingTime, riding_time);
    history.push(Metric::TripDistance, distance);
    history.push(Metric::TripPrice, price);
    history.push(Metric::TripForwardDispatchCount, forward_dispatch_count);
}

fn safe_div(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Derived measures computed over the results window (§4.7).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DerivedMeasures {
    pub fraction_p1: f64,
    pub fraction_p2: f64,
    pub fraction_p3: f64,
    pub mean_wait_time: f64,
    pub mean_ride_time: f64,
    pub mean_wait_fraction: f64,
    pub mean_wait_fraction_total: f64,
    pub platform_income: f64,
    pub vehicle_gross_income: f64,
    pub vehicle_surplus: f64,
    pub check_identity_p3: f64,
    pub check_identity_p2: f64,
    pub check_sum_p: f64,
}

impl DerivedMeasures {
    pub fn compute(history: &HistoryStore, price: f64, commission: f64, reservation_wage: f64) -> Self {
        let w = history.results_window() as f64;

        let vehicle_time = history.results(Metric::VehicleTime).sum();
        let p1_time = history.results(Metric::VehicleTimeP1).sum();
        let p2_time = history.results(Metric::VehicleTimeP2).sum();
        let p3_time = history.results(Metric::VehicleTimeP3).sum();

        let fraction_p1 = safe_div(p1_time, vehicle_time);
        let fraction_p2 = safe_div(p2_time, vehicle_time);
        let fraction_p3 = safe_div(p3_time, vehicle_time);

        let trip_count = history.results(Metric::TripCount).sum();
        let wait_time_sum = history.results(Metric::TripWaitTime).sum();
        let distance_sum = history.results(Metric::TripDistance).sum();

        let mean_wait_time = safe_div(wait_time_sum, trip_count);
        let mean_ride_time = safe_div(distance_sum, trip_count);
        let mean_wait_fraction = safe_div(mean_wait_time, mean_ride_time);
        let mean_wait_fraction_total = safe_div(mean_wait_time, mean_wait_time + mean_ride_time);

        let platform_income = price * commission * trip_count * mean_ride_time / w;
        let vehicle_gross_income = price * (1.0 - commission) * fraction_p3;
        let vehicle_surplus = vehicle_gross_income - reservation_wage;

        let mean_vehicle_count = history.results(Metric::VehicleCount).sum() / w;
        let mean_request_rate = history.results(Metric::TripRequestRate).sum() / w;

        let check_identity_p3 = safe_div(mean_vehicle_count * fraction_p3, mean_request_rate * mean_ride_time);
        let check_identity_p2 = safe_div(mean_vehicle_count * fraction_p2, mean_request_rate * mean_wait_time);
        let check_sum_p = fraction_p1 + fraction_p2 + fraction_p3;

        Self {
            fraction_p1,
            fraction_p2,
            fraction_p3,
            mean_wait_time,
            mean_ride_time,
            mean_wait_fraction,
            mean_wait_fraction_total,
            platform_income,
            vehicle_gross_income,
            vehicle_surplus,
            check_identity_p3,
            check_identity_p2,
            check_sum_p,
        }
    }
}

/// The flat per-block state map (spec.md §6): block number plus every
/// core config echo and derived measure, keyed by metric name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockState {
    pub block: u64,
    pub city_size: i32,
    pub vehicle_count: usize,
    pub base_demand: f64,
    pub measures: DerivedMeasures,
}

impl BlockState {
    /// Render as a flat `metric name -> scalar` map, the shape external
    /// collaborators (animation/export) actually consume.
    pub fn to_map(&self) -> HashMap<String, f64> {
        let mut map = HashMap::new();
        map.insert("block".to_string(), self.block as f64);
        map.insert("city_size".to_string(), self.city_size as f64);
        map.insert("vehicle_count".to_string(), self.vehicle_count as f64);
        map.insert("base_demand".to_string(), self.base_demand);
        map.insert("fraction_p1".to_string(), self.measures.fraction_p1);
        map.insert("fraction_p2".to_string(), self.measures.fraction_p2);
        map.insert("fraction_p3".to_string(), self.measures.fraction_p3);
        map.insert("mean_wait_time".to_string(), self.measures.mean_wait_time);
        map.insert("mean_ride_time".to_string(), self.measures.mean_ride_time);
        map.insert("mean_wait_fraction".to_string(), self.measures.mean_wait_fraction);
        map.insert("mean_wait_fraction_total".to_string(), self.measures.mean_wait_fraction_total);
        map.insert("platform_income".to_string(), self.measures.platform_income);
        map.insert("vehicle_gross_income".to_string(), self.measures.vehicle_gross_income);
        map.insert("vehicle_surplus".to_string(), self.measures.vehicle_surplus);
        map.insert("check_identity_p3".to_string(), self.measures.check_identity_p3);
        map.insert("check_identity_p2".to_string(), self.measures.check_identity_p2);
        map.insert("check_sum_p".to_string(), self.measures.check_sum_p);
        map
    }
}
