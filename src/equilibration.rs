//! Economic equilibration controller (§4.9).
//!
//! Every `equilibration_interval` blocks, nudges the fleet size toward
//! the size at which driver utility is zero. Never touches P2/P3
//! vehicles — only adds or removes idle (P1) ones.

use rand::Rng;

use crate::city::{City, Location};
use crate::config::EquilibrationMode;
use crate::entities::{Vehicle, VehiclePhase};
use crate::history::{HistoryStore, Metric};

/// Fraction of the current fleet a single equilibration step may add
/// or remove, and the fraction of current utility translated into a
/// vehicle-count delta (§4.9).
const DAMPING: f64 = 0.4;
const MAX_FLEET_CHANGE_FRACTION: f64 = 0.10;

/// Driver utility for the most recent equilibration-interval window:
/// `price * (1 - commission) * fraction_p3 - reservation_wage`.
pub fn driver_utility(history: &HistoryStore, price: f64, commission: f64, reservation_wage: f64) -> f64 {
    let total_vehicle_time = history.equilibration(Metric::VehicleTime).sum();
    let p3_time = history.equilibration(Metric::VehicleTimeP3).sum();
    let fraction_p3 = if total_vehicle_time > 0.0 { p3_time / total_vehicle_time } else { 0.0 };
    price * (1.0 - commission) * fraction_p3 - reservation_wage
}

/// Outcome of one equilibration step, reported for diagnostics/tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct EquilibrationResult {
    pub utility: f64,
    pub vehicle_delta: i64,
}

/// Run one equilibration step: compute driver utility over the last
/// interval and add/remove P1 vehicles toward zero utility, capped at
/// +/-10% of the current fleet. Never mutates P2/P3 vehicles. Returns
/// the utility and the signed change in fleet size actually applied.
pub fn equilibrate<R: Rng + ?Sized>(
    mode: EquilibrationMode,
    history: &HistoryStore,
    city: &City,
    vehicles: &mut Vec<Vehicle>,
    price: f64,
    commission: f64,
    reservation_wage: f64,
    rng: &mut R,
) -> EquilibrationResult {
    if mode == EquilibrationMode::None {
        return EquilibrationResult::default();
    }

    let utility = driver_utility(history, price, commission, reservation_wage);
    let current_count = vehicles.len() as f64;
    let raw_delta = (DAMPING * current_count * utility).floor() as i64;
    let cap = (current_count * MAX_FLEET_CHANGE_FRACTION).floor().max(1.0) as i64;
    let delta = raw_delta.clamp(-cap, cap);

    if delta > 0 {
        add_vehicles(city, vehicles, delta as usize, rng);
    } else if delta < 0 {
        remove_idle_vehicles(vehicles, (-delta) as usize);
    }

    EquilibrationResult { utility, vehicle_delta: delta }
}

/// Append `count` new idle vehicles at random locations/directions.
pub fn add_vehicles<R: Rng + ?Sized>(city: &City, vehicles: &mut Vec<Vehicle>, count: usize, rng: &mut R) {
    for _ in 0..count {
        let next_index = vehicles.len();
        let location = city.sample_location(rng, false);
        let direction = crate::city::Direction::ALL[rng.gen_range(0..4)];
        vehicles.push(Vehicle::new(next_index, location, direction));
    }
}

/// Remove up to `count` idle (P1) vehicles from the tail of the fleet.
/// Never removes a P2/P3 vehicle; if fewer than `count` are idle, only
/// those are removed. Indices of surviving vehicles are renumbered.
pub fn remove_idle_vehicles(vehicles: &mut Vec<Vehicle>, count: usize) {
    let mut removed = 0;
    let mut i = vehicles.len();
    while removed < count && i > 0 {
        i -= 1;
        if vehicles[i].phase == VehiclePhase::P1 {
            vehicles.remove(i);
            removed += 1;
        }
    }
    for (idx, v) in vehicles.iter_mut().enumerate() {
        v.index = idx;
    }
}

/// Apply a manual vehicle-count target (used when equilibration is
/// off): add idle vehicles if `target > current`, remove idle ones
/// from the tail if `target < current`. Never touches P2/P3.
pub fn reconcile_manual_vehicle_count<R: Rng + ?Sized>(
    city: &City,
    vehicles: &mut Vec<Vehicle>,
    target: usize,
    rng: &mut R,
) {
    let current = vehicles.len();
    if target > current {
        add_vehicles(city, vehicles, target - current, rng);
    } else if target < current {
        remove_idle_vehicles(vehicles, current - target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn manual_add_appends_idle_vehicles() {
        let city = City::new(10, 0.0, false);
        let mut vehicles = vec![Vehicle::new(0, Location::new(0, 0), crate::city::Direction::North)];
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        reconcile_manual_vehicle_count(&city, &mut vehicles, 3, &mut rng);
        assert_eq!(vehicles.len(), 3);
        assert!(vehicles.iter().all(|v| v.phase == VehiclePhase::P1));
    }

    #[test]
    fn manual_remove_never_touches_busy_vehicles() {
        let mut vehicles = vec![
            Vehicle::new(0, Location::new(0, 0), crate::city::Direction::North),
            Vehicle::new(1, Location::new(0, 0), crate::city::Direction::North),
        ];
        vehicles[1].assign(0, Location::new(1, 1), Location::new(2, 2));
        remove_idle_vehicles(&mut vehicles, 5);
        assert_eq!(vehicles.len(), 1);
        assert_eq!(vehicles[0].phase, VehiclePhase::P2);
    }

    #[test]
    fn zero_utility_gives_zero_delta() {
        let history = HistoryStore::new(5, 5, 5);
        let result = equilibrate(
            EquilibrationMode::Supply,
            &history,
            &City::new(10, 0.0, false),
            &mut vec![Vehicle::new(0, Location::new(0, 0), crate::city::Direction::North)],
            1.0,
            0.0,
            0.0,
            &mut rand::rngs::StdRng::seed_from_u64(1),
        );
        assert_eq!(result.utility, 0.0);
        assert_eq!(result.vehicle_delta, 0);
    }
}
