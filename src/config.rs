//! Construction-time configuration, mid-run target state, and the
//! configuration error type.
//!
//! `SimulationConfig` is built the way the crate this project is
//! adapted from builds its scenario parameters: a plain struct with a
//! `Default` impl plus chained `with_*` builder methods, rather than a
//! derive-heavy builder crate.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which dispatch policy the simulation uses to match idle vehicles to
/// waiting trips (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchMethod {
    /// Adaptive sparse/dense nearest-vehicle search.
    Default,
    /// Adaptive search that also considers P3 vehicles for a queued
    /// next trip.
    ForwardDispatch,
    /// Pure linear scan over vehicles (legacy baseline).
    P1Legacy,
    /// Uniformly random among dispatchable vehicles.
    Random,
}

/// Which quantity, if any, the equilibration controller adjusts every
/// `equilibration_interval` blocks (§4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EquilibrationMode {
    None,
    /// Adjust fleet size toward zero driver surplus.
    Supply,
    /// As `Supply`, plus recompute request rate whenever price changes.
    Price,
}

/// A scheduled override of one or more [`TargetState`] fields, applied
/// at the start of a specific block (§4.6 step 1). Grounded in
/// `original_source/ridehail/simulation.py`'s `impulse_list`, dropped
/// by the distilled spec but reinstated here since nothing in §1's
/// Non-goals excludes it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Impulse {
    pub block: u64,
    pub base_demand: Option<f64>,
    pub price: Option<f64>,
    pub vehicle_count: Option<usize>,
    pub inhomogeneity: Option<f64>,
}

/// Control parameters the caller may change mid-run; reconciled against
/// the committed simulation state at the top of every block (§4.6
/// step 2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetState {
    pub vehicle_count: usize,
    pub base_demand: f64,
    pub inhomogeneity: f64,
    pub price: f64,
    pub platform_commission: f64,
    pub reservation_wage: f64,
    pub demand_elasticity: f64,
    pub equilibrate: bool,
    pub equilibration: EquilibrationMode,
    pub city_size: i32,
    pub max_trip_distance: i32,
    pub idle_vehicles_moving: bool,
}

impl TargetState {
    fn apply_impulse(&mut self, impulse: &Impulse) {
        if let Some(v) = impulse.base_demand {
            self.base_demand = v;
        }
        if let Some(v) = impulse.price {
            self.price = v;
        }
        if let Some(v) = impulse.vehicle_count {
            self.vehicle_count = v;
        }
        if let Some(v) = impulse.inhomogeneity {
            self.inhomogeneity = v;
        }
    }
}

/// Construction-time configuration (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub city_size: i32,
    pub vehicle_count: usize,
    pub base_demand: f64,
    pub inhomogeneity: f64,
    pub inhomogeneous_destinations: bool,
    pub min_trip_distance: i32,
    pub max_trip_distance: i32,
    pub idle_vehicles_moving: bool,
    /// 0 means unbounded (run until stopped externally).
    pub time_blocks: u64,
    pub random_number_seed: u64,

    pub results_window: usize,
    pub smoothing_window: usize,

    pub dispatch_method: DispatchMethod,
    pub forward_dispatch_bias: f64,

    pub price: f64,
    pub platform_commission: f64,
    pub reservation_wage: f64,
    pub demand_elasticity: f64,
    pub equilibrate: bool,
    pub equilibration: EquilibrationMode,
    pub equilibration_interval: usize,

    /// Real-world unit-conversion factors; used only by external
    /// collaborators rendering block ticks as wall-clock time. Unused
    /// by the stepper itself.
    pub minutes_per_block: Option<f64>,
    pub mean_vehicle_speed: Option<f64>,
    pub per_km_price: Option<f64>,

    pub convergence_n_chains: usize,
    pub convergence_chain_length: usize,
    pub convergence_threshold: f64,

    pub impulses: Vec<Impulse>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            city_size: 8,
            vehicle_count: 10,
            base_demand: 0.5,
            inhomogeneity: 0.0,
            inhomogeneous_destinations: false,
            min_trip_distance: 0,
            max_trip_distance: 8,
            idle_vehicles_moving: true,
            time_blocks: 1000,
            random_number_seed: 0,
            results_window: 200,
            smoothing_window: 20,
            dispatch_method: DispatchMethod::Default,
            forward_dispatch_bias: 0.0,
            price: 1.0,
            platform_commission: 0.0,
            reservation_wage: 0.0,
            demand_elasticity: 0.0,
            equilibrate: false,
            equilibration: EquilibrationMode::None,
            equilibration_interval: 50,
            minutes_per_block: None,
            mean_vehicle_speed: None,
            per_km_price: None,
            convergence_n_chains: 4,
            convergence_chain_length: 50,
            convergence_threshold: 1.1,
            impulses: Vec::new(),
        }
    }
}

impl SimulationConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.random_number_seed = seed;
        self
    }

    pub fn with_city_size(mut self, city_size: i32) -> Self {
        self.city_size = city_size;
        self
    }

    pub fn with_vehicle_count(mut self, vehicle_count: usize) -> Self {
        self.vehicle_count = vehicle_count;
        self
    }

    pub fn with_base_demand(mut self, base_demand: f64) -> Self {
        self.base_demand = base_demand;
        self
    }

    pub fn with_time_blocks(mut self, time_blocks: u64) -> Self {
        self.time_blocks = time_blocks;
        self
    }

    pub fn with_results_window(mut self, results_window: usize) -> Self {
        self.results_window = results_window;
        self
    }

    pub fn with_dispatch_method(mut self, method: DispatchMethod) -> Self {
        self.dispatch_method = method;
        self
    }

    pub fn with_forward_dispatch_bias(mut self, bias: f64) -> Self {
        self.forward_dispatch_bias = bias;
        self
    }

    pub fn with_economics(
        mut self,
        price: f64,
        platform_commission: f64,
        reservation_wage: f64,
        demand_elasticity: f64,
    ) -> Self {
        self.price = price;
        self.platform_commission = platform_commission;
        self.reservation_wage = reservation_wage;
        self.demand_elasticity = demand_elasticity;
        self
    }

    pub fn with_equilibration(mut self, mode: EquilibrationMode, interval: usize) -> Self {
        self.equilibrate = mode != EquilibrationMode::None;
        self.equilibration = mode;
        self.equilibration_interval = interval;
        self
    }

    pub fn with_impulses(mut self, impulses: Vec<Impulse>) -> Self {
        self.impulses = impulses;
        self
    }

    pub fn with_max_trip_distance(mut self, max_trip_distance: i32) -> Self {
        self.max_trip_distance = max_trip_distance;
        self
    }

    /// Validate and normalize this configuration. Rounds an odd
    /// `city_size` up to the next even number (with a one-time
    /// diagnostic, not an error) and rejects anything that would leave
    /// the stepper unable to run a single block (§7).
    pub fn validate(&self) -> Result<SimulationConfig, ConfigError> {
        let mut cfg = self.clone();
        if cfg.city_size % 2 != 0 {
            eprintln!(
                "ridehail_core: city_size {} is odd, rounding up to {}",
                cfg.city_size,
                cfg.city_size + 1
            );
            cfg.city_size += 1;
        }
        if cfg.city_size <= 0 {
            return Err(ConfigError::NonPositive("city_size"));
        }
        if cfg.vehicle_count == 0 {
            return Err(ConfigError::NonPositive("vehicle_count"));
        }
        if cfg.results_window == 0 || cfg.smoothing_window == 0 {
            return Err(ConfigError::NonPositive("results_window/smoothing_window"));
        }
        if cfg.equilibrate && cfg.equilibration_interval == 0 {
            return Err(ConfigError::NonPositive("equilibration_interval"));
        }
        if cfg.min_trip_distance < 0 || cfg.min_trip_distance > cfg.max_trip_distance {
            return Err(ConfigError::InvalidTripDistanceRange {
                min: cfg.min_trip_distance,
                max: cfg.max_trip_distance,
            });
        }
        if cfg.base_demand < 0.0 {
            return Err(ConfigError::NegativeDemand(cfg.base_demand));
        }
        Ok(cfg)
    }

    pub fn to_target_state(&self) -> TargetState {
        TargetState {
            vehicle_count: self.vehicle_count,
            base_demand: self.base_demand,
            inhomogeneity: self.inhomogeneity,
            price: self.price,
            platform_commission: self.platform_commission,
            reservation_wage: self.reservation_wage,
            demand_elasticity: self.demand_elasticity,
            equilibrate: self.equilibrate,
            equilibration: self.equilibration,
            city_size: self.city_size,
            max_trip_distance: self.max_trip_distance,
            idle_vehicles_moving: self.idle_vehicles_moving,
        }
    }
}

/// Configuration error class from §7: raised only during construction,
/// never once a simulation is running.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    NonPositive(&'static str),
    InvalidTripDistanceRange { min: i32, max: i32 },
    NegativeDemand(f64),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NonPositive(field) => write!(f, "{field} must be positive"),
            ConfigError::InvalidTripDistanceRange { min, max } => {
                write!(f, "min_trip_distance ({min}) must be <= max_trip_distance ({max})")
            }
            ConfigError::NegativeDemand(d) => write!(f, "base_demand ({d}) must not be negative"),
        }
    }
}

impl std::error::Error for ConfigError {}

pub(crate) fn apply_impulses(target: &mut TargetState, impulses: &[Impulse], block: u64) {
    for impulse in impulses {
        if impulse.block == block {
            target.apply_impulse(impulse);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn odd_city_size_is_rounded_up() {
        let cfg = SimulationConfig::default().with_city_size(7).validate().unwrap();
        assert_eq!(cfg.city_size, 8);
    }

    #[test]
    fn zero_vehicle_count_is_rejected() {
        let err = SimulationConfig::default()
            .with_vehicle_count(0)
            .validate()
            .unwrap_err();
        assert_eq!(err, ConfigError::NonPositive("vehicle_count"));
    }

    #[test]
    fn inverted_trip_distance_range_is_rejected() {
        let mut cfg = SimulationConfig::default();
        cfg.min_trip_distance = 5;
        cfg.max_trip_distance = 2;
        assert!(cfg.validate().is_err());
    }
}
