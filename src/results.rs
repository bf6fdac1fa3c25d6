//! End-of-run results object and the per-block "map view" used by
//! animation collaborators (spec.md §6, supplemented per `SPEC_FULL.md`
//! §10.5).

use serde::{Deserialize, Serialize};

use crate::city::{Direction, Location};
use crate::config::SimulationConfig;
use crate::convergence::ConvergenceTracker;
use crate::entities::{Trip, TripPhase, Vehicle, VehiclePhase};
use crate::measures::DerivedMeasures;

/// One vehicle's position/phase for a map-view snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleSnapshot {
    pub phase: VehiclePhase,
    pub location: Location,
    pub direction: Direction,
}

impl From<&Vehicle> for VehicleSnapshot {
    fn from(v: &Vehicle) -> Self {
        Self { phase: v.phase, location: v.location, direction: v.direction }
    }
}

/// One trip's endpoints/phase for a map-view snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripSnapshot {
    pub phase: TripPhase,
    pub origin: Location,
    pub destination: Location,
    pub distance: i32,
}

impl From<&Trip> for TripSnapshot {
    fn from(t: &Trip) -> Self {
        Self { phase: t.phase, origin: t.origin, destination: t.destination, distance: t.distance }
    }
}

/// Vehicle and trip positions for one block, in addition to the flat
/// scalar state map. Built only on demand (`Simulation::map_state`),
/// never computed by `next_block` itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapState {
    pub block: u64,
    pub vehicles: Vec<VehicleSnapshot>,
    pub trips: Vec<TripSnapshot>,
}

/// Convergence verdict as reported in end-of-run results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvergenceSummary {
    pub converged: bool,
    pub max_rhat: Option<f64>,
    pub worst_metric: Option<String>,
}

impl ConvergenceSummary {
    pub fn from_tracker(tracker: &ConvergenceTracker) -> Self {
        let (converged, max_rhat, worst_metric) = tracker.check_convergence();
        Self { converged, max_rhat, worst_metric: worst_metric.map(|m| m.name().to_string()) }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub version: &'static str,
    pub blocks_simulated: u64,
    pub blocks_analyzed: u64,
}

/// End-of-run results: the echoed config, derived measures over the
/// results window, and the convergence verdict. Produced whether or
/// not the run converged (§7) — callers decide what "not converged"
/// means for their own purposes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResults {
    pub config: SimulationConfig,
    pub measures: DerivedMeasures,
    pub convergence: ConvergenceSummary,
    pub metadata: RunMetadata,
}
