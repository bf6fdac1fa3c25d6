//! The block stepper (§4.6): owns every entity and rolling-history
//! structure and advances the simulation one block at a time.
//!
//! Mirrors the crate this project is adapted from in spirit — a single
//! struct that owns its world and is driven by repeated calls to one
//! "advance" method from an external loop — but the world here is a
//! flat set of `Vec`s indexed by integer, not an ECS `World`.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::city::{City, Direction};
use crate::config::{apply_impulses, ConfigError, EquilibrationMode, SimulationConfig, TargetState};
use crate::convergence::{ConvergenceTracker, DEFAULT_CONVERGENCE_METRICS};
use crate::dispatch::{create_dispatch_algorithm, DispatchAlgorithm};
use crate::entities::{Trip, TripPhase, Vehicle, VehiclePhase};
use crate::equilibration::{equilibrate, reconcile_manual_vehicle_count};
use crate::history::HistoryStore;
use crate::measures::{push_block_history, BlockState, DerivedMeasures};
use crate::profiling::{BlockTimings, PhaseTimer};
use crate::results::{ConvergenceSummary, MapState, RunMetadata, RunResults, TripSnapshot, VehicleSnapshot};

/// Trips and cancelled/completed bookkeeping are swept every this many
/// blocks (§4.6 step 10, §5 Resource policy).
const GARBAGE_COLLECTION_INTERVAL: u64 = 200;

/// Owns the whole simulated world and advances it one block at a time.
pub struct Simulation {
    config: SimulationConfig,
    target_state: TargetState,
    city: City,
    vehicles: Vec<Vehicle>,
    trips: Vec<Trip>,
    rng: StdRng,
    history: HistoryStore,
    convergence: ConvergenceTracker,
    dispatch_algorithm: Box<dyn DispatchAlgorithm>,
    request_capital: f64,
    request_rate: f64,
    block: u64,
    timings: Option<BlockTimings>,
    last_block_state: Option<BlockState>,
}

impl Simulation {
    /// Validate `config` and build the initial world: `vehicle_count`
    /// idle vehicles at random locations, no trips, every rolling
    /// buffer at zero.
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        let config = config.validate()?;
        let target_state = config.to_target_state();
        let city = City::new(config.city_size, target_state.inhomogeneity, config.inhomogeneous_destinations);
        let mut rng = StdRng::seed_from_u64(config.random_number_seed);

        let mut vehicles = Vec::with_capacity(config.vehicle_count);
        for i in 0..config.vehicle_count {
            let location = city.sample_location(&mut rng, false);
            let direction = Direction::ALL[rng.gen_range(0..4)];
            vehicles.push(Vehicle::new(i, location, direction));
        }

        let history = HistoryStore::new(
            config.smoothing_window,
            config.results_window,
            config.equilibration_interval.max(1),
        );
        let convergence = ConvergenceTracker::new(
            config.convergence_n_chains,
            config.convergence_chain_length,
            config.convergence_threshold,
        );
        let dispatch_algorithm = create_dispatch_algorithm(config.dispatch_method, config.forward_dispatch_bias);
        let request_rate = initial_request_rate(&target_state);

        Ok(Self {
            config,
            target_state,
            city,
            vehicles,
            trips: Vec::new(),
            rng,
            history,
            convergence,
            dispatch_algorithm,
            request_capital: 0.0,
            request_rate,
            block: 0,
            timings: None,
            last_block_state: None,
        })
    }

    /// The most recent flat per-block state (§6), without advancing
    /// the simulation. `None` before the first call to `next_block`.
    pub fn block_state(&self) -> Option<&BlockState> {
        self.last_block_state.as_ref()
    }

    /// Enable per-phase wall-clock timing, retrievable via
    /// [`Simulation::print_profiling_summary`]. Off by default; the
    /// stepper pays nothing for it unless a caller opts in.
    pub fn with_profiling(mut self) -> Self {
        self.timings = Some(BlockTimings::default());
        self
    }

    pub fn print_profiling_summary(&self) {
        if let Some(timings) = &self.timings {
            timings.print_summary();
        }
    }

    pub fn block(&self) -> u64 {
        self.block
    }

    pub fn vehicles(&self) -> &[Vehicle] {
        &self.vehicles
    }

    pub fn trips(&self) -> &[Trip] {
        &self.trips
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Advance the simulation by one block, returning the flat
    /// per-block state (§6). Runs the ten steps of §4.6 in order.
    pub fn next_block(&mut self) -> BlockState {
        {
            let _t = PhaseTimer::start(self.timings.as_mut(), "impulses");
            apply_impulses(&mut self.target_state, &self.config.impulses, self.block);
        }
        {
            let _t = PhaseTimer::start(self.timings.as_mut(), "reconcile");
            self.reconcile_target_state();
        }
        {
            let _t = PhaseTimer::start(self.timings.as_mut(), "request_arrivals");
            self.request_arrivals();
        }
        {
            let _t = PhaseTimer::start(self.timings.as_mut(), "vehicle_physics");
            self.vehicle_physics();
        }
        {
            let _t = PhaseTimer::start(self.timings.as_mut(), "dispatch");
            self.dispatch_algorithm
                .dispatch(&self.city, &mut self.vehicles, &mut self.trips, &mut self.rng);
        }
        {
            let _t = PhaseTimer::start(self.timings.as_mut(), "cancellation");
            self.cancel_stale_trips();
        }
        {
            let _t = PhaseTimer::start(self.timings.as_mut(), "history_push");
            push_block_history(
                &mut self.history,
                &self.vehicles,
                &mut self.trips,
                self.request_rate,
                self.target_state.price,
            );
        }
        let measures = {
            let _t = PhaseTimer::start(self.timings.as_mut(), "derived_measures");
            let measures = DerivedMeasures::compute(
                &self.history,
                self.target_state.price,
                self.target_state.platform_commission,
                self.target_state.reservation_wage,
            );
            self.convergence.update(&self.history, &DEFAULT_CONVERGENCE_METRICS);
            measures
        };
        {
            let _t = PhaseTimer::start(self.timings.as_mut(), "equilibration");
            self.maybe_equilibrate();
        }
        {
            let _t = PhaseTimer::start(self.timings.as_mut(), "garbage_collection");
            if self.block > 0 && self.block % GARBAGE_COLLECTION_INTERVAL == 0 {
                self.collect_garbage();
            }
        }

        self.block += 1;

        let state = BlockState {
            block: self.block,
            city_size: self.city.city_size,
            vehicle_count: self.vehicles.len(),
            base_demand: self.target_state.base_demand,
            measures,
        };
        self.last_block_state = Some(state.clone());
        state
    }

    /// Run `n` blocks back to back, returning every block's state.
    pub fn run_n_blocks(&mut self, n: u64) -> Vec<BlockState> {
        (0..n).map(|_| self.next_block()).collect()
    }

    /// The per-block vehicle/trip position snapshot (§6 "map" view).
    /// Built only on demand, never by `next_block` itself.
    pub fn map_state(&self) -> MapState {
        MapState {
            block: self.block,
            vehicles: self.vehicles.iter().map(VehicleSnapshot::from).collect(),
            trips: self.trips.iter().map(TripSnapshot::from).collect(),
        }
    }

    /// End-of-run summary: echoed config, results-window derived
    /// measures, and the convergence verdict.
    pub fn run_results(&self) -> RunResults {
        let measures = DerivedMeasures::compute(
            &self.history,
            self.target_state.price,
            self.target_state.platform_commission,
            self.target_state.reservation_wage,
        );
        let convergence = ConvergenceSummary::from_tracker(&self.convergence);
        let metadata = RunMetadata {
            version: env!("CARGO_PKG_VERSION"),
            blocks_simulated: self.block,
            blocks_analyzed: self.block.min(self.history.results_window() as u64),
        };
        RunResults { config: self.config.clone(), measures, convergence, metadata }
    }

    /// §4.6 step 2: pull `target_state` into the committed world.
    fn reconcile_target_state(&mut self) {
        if self.target_state.city_size != self.city.city_size {
            self.city = City::new(
                self.target_state.city_size,
                self.target_state.inhomogeneity,
                self.city.inhomogeneous_destinations,
            );
            for v in &mut self.vehicles {
                v.location = self.city.wrap_location(v.location);
                if let Some(p) = v.pickup_location {
                    v.pickup_location = Some(self.city.wrap_location(p));
                }
                if let Some(d) = v.dropoff_location {
                    v.dropoff_location = Some(self.city.wrap_location(d));
                }
            }
            for t in &mut self.trips {
                t.origin = self.city.wrap_location(t.origin);
                t.destination = self.city.wrap_location(t.destination);
            }
        } else {
            self.city.inhomogeneity = self.target_state.inhomogeneity;
        }

        if !self.target_state.equilibrate {
            reconcile_manual_vehicle_count(&self.city, &mut self.vehicles, self.target_state.vehicle_count, &mut self.rng);
        }

        self.request_rate = if self.target_state.equilibration == EquilibrationMode::Price && self.target_state.equilibrate {
            self.target_state.base_demand * self.target_state.price.powf(-self.target_state.demand_elasticity)
        } else {
            self.target_state.base_demand
        };
    }

    /// §4.6 step 3.
    fn request_arrivals(&mut self) {
        self.request_capital += self.request_rate;
        while self.request_capital >= 1.0 {
            let (origin, destination) = self.city.sample_trip_endpoints(
                &mut self.rng,
                self.config.min_trip_distance,
                self.target_state.max_trip_distance,
            );
            let distance = self.city.distance(origin, destination);
            let index = self.trips.len();
            self.trips.push(Trip::new(index, origin, destination, distance));
            self.request_capital -= 1.0;
        }
    }

    /// §4.6 step 4: move every vehicle, then resolve pickup/dropoff
    /// arrivals. `update_location` runs before `update_direction`
    /// (§4.2 ordering note).
    fn vehicle_physics(&mut self) {
        for i in 0..self.vehicles.len() {
            self.vehicles[i].step_location(&self.city, self.target_state.idle_vehicles_moving);
            self.vehicles[i].update_direction(&self.city, self.target_state.idle_vehicles_moving, &mut self.rng);

            match self.vehicles[i].phase {
                VehiclePhase::P2 => {
                    if Some(self.vehicles[i].location) == self.vehicles[i].pickup_location {
                        self.vehicles[i].arrive_at_pickup();
                        if let Some(t) = self.vehicles[i].trip_index {
                            self.trips[t].transition(TripPhase::Riding);
                        }
                    }
                }
                VehiclePhase::P3 => {
                    if Some(self.vehicles[i].location) == self.vehicles[i].dropoff_location {
                        let old_trip = self.vehicles[i].trip_index;
                        let next = self.vehicles[i].arrive_at_dropoff();
                        if let Some(t) = old_trip {
                            self.trips[t].transition(TripPhase::Completed);
                        }
                        if let Some(next_idx) = next {
                            let origin = self.trips[next_idx].origin;
                            let destination = self.trips[next_idx].destination;
                            self.vehicles[i].start_forward_dispatched_trip(next_idx, origin, destination);
                        }
                    }
                }
                VehiclePhase::P1 => {}
            }
        }
    }

    /// §4.6 step 6.
    fn cancel_stale_trips(&mut self) {
        for t in &mut self.trips {
            if t.phase == TripPhase::Unassigned
                && t.phase_time[TripPhase::Unassigned as usize] as i32 >= self.city.city_size
            {
                t.transition(TripPhase::Cancelled);
            }
        }
    }

    /// §4.6 step 9: run at most once per `equilibration_interval`
    /// blocks, skipping block 0.
    fn maybe_equilibrate(&mut self) {
        if !self.target_state.equilibrate || self.config.equilibration_interval == 0 {
            return;
        }
        let interval = self.config.equilibration_interval as u64;
        if self.block > 0 && self.block % interval == 0 {
            equilibrate(
                self.target_state.equilibration,
                &self.history,
                &self.city,
                &mut self.vehicles,
                self.target_state.price,
                self.target_state.platform_commission,
                self.target_state.reservation_wage,
                &mut self.rng,
            );
        }
    }

    /// §4.6 step 10: drop trips already retired to `Inactive` (counted
    /// exactly once by `push_block_history`) and renumber the
    /// survivors so `trip.index` stays contiguous, patching every
    /// vehicle's `trip_index`/`forward_dispatch_trip_index`.
    fn collect_garbage(&mut self) {
        let mut old_to_new = HashMap::with_capacity(self.trips.len());
        let mut survivors = Vec::with_capacity(self.trips.len());
        for trip in self.trips.drain(..) {
            if trip.is_active() {
                let new_index = survivors.len();
                old_to_new.insert(trip.index, new_index);
                let mut trip = trip;
                trip.index = new_index;
                survivors.push(trip);
            }
        }
        self.trips = survivors;

        for v in &mut self.vehicles {
            if let Some(old) = v.trip_index {
                v.trip_index = old_to_new.get(&old).copied();
            }
            if let Some(old) = v.forward_dispatch_trip_index {
                v.forward_dispatch_trip_index = old_to_new.get(&old).copied();
            }
        }
    }
}

fn initial_request_rate(target: &TargetState) -> f64 {
    if target.equilibration == EquilibrationMode::Price && target.equilibrate {
        target.base_demand * target.price.powf(-target.demand_elasticity)
    } else {
        target.base_demand
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_simulation_has_requested_vehicle_count_and_no_trips() {
        let sim = Simulation::new(SimulationConfig::default().with_vehicle_count(5)).unwrap();
        assert_eq!(sim.vehicles().len(), 5);
        assert!(sim.trips().is_empty());
        assert_eq!(sim.block(), 0);
    }

    #[test]
    fn running_blocks_eventually_creates_and_serves_trips() {
        let config = SimulationConfig::default()
            .with_seed(42)
            .with_city_size(8)
            .with_vehicle_count(12)
            .with_base_demand(0.8)
            .with_results_window(50);
        let mut sim = Simulation::new(config).unwrap();
        let states = sim.run_n_blocks(300);
        assert_eq!(states.len(), 300);
        assert_eq!(sim.block(), 300);
        assert!(sim.trips().len() < 10_000, "trip list should stay bounded by garbage collection");

        let results = sim.run_results();
        assert!(results.measures.check_sum_p > 0.0, "some vehicle time should have accumulated");
    }

    #[test]
    fn garbage_collection_keeps_vehicle_trip_references_valid() {
        let config = SimulationConfig::default()
            .with_seed(7)
            .with_city_size(6)
            .with_vehicle_count(6)
            .with_base_demand(1.5);
        let mut sim = Simulation::new(config).unwrap();
        sim.run_n_blocks(201);
        for v in sim.vehicles() {
            if let Some(idx) = v.trip_index {
                assert!(idx < sim.trips().len());
            }
        }
    }

    #[test]
    fn no_vehicle_is_ever_on_two_active_trips() {
        let config = SimulationConfig::default()
            .with_seed(3)
            .with_city_size(8)
            .with_vehicle_count(4)
            .with_base_demand(2.0);
        let mut sim = Simulation::new(config).unwrap();
        for _ in 0..50 {
            sim.next_block();
            let mut seen = std::collections::HashSet::new();
            for v in sim.vehicles() {
                if let Some(idx) = v.trip_index {
                    assert!(seen.insert(idx), "trip {idx} assigned to more than one vehicle");
                }
            }
        }
    }
}
