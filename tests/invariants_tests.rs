//! Per-block invariants that must hold after every step-10 sweep (§8).

mod support;

use ridehail_core::config::SimulationConfig;
use ridehail_core::entities::{TripPhase, VehiclePhase};
use ridehail_core::simulation::Simulation;

fn config() -> SimulationConfig {
    support::test_config()
        .with_seed(11)
        .with_city_size(10)
        .with_vehicle_count(20)
        .with_base_demand(3.0)
}

#[test]
fn vehicle_trip_index_matches_phase() {
    let mut sim = Simulation::new(config()).unwrap();
    for _ in 0..300 {
        sim.next_block();
        for v in sim.vehicles() {
            assert_eq!(v.phase == VehiclePhase::P1, v.trip_index.is_none());
        }
    }
}

#[test]
fn locations_stay_on_grid() {
    let mut sim = Simulation::new(config()).unwrap();
    for _ in 0..300 {
        sim.next_block();
        let n = sim.config().city_size;
        for v in sim.vehicles() {
            assert!(v.location.x >= 0 && v.location.x < n);
            assert!(v.location.y >= 0 && v.location.y < n);
        }
        for t in sim.trips() {
            assert!(t.origin.x >= 0 && t.origin.x < n && t.origin.y >= 0 && t.origin.y < n);
            assert!(t.destination.x >= 0 && t.destination.x < n && t.destination.y >= 0 && t.destination.y < n);
        }
    }
}

#[test]
fn waiting_and_riding_trips_have_exactly_one_matching_vehicle() {
    let mut sim = Simulation::new(config()).unwrap();
    for _ in 0..300 {
        sim.next_block();
        for t in sim.trips() {
            match t.phase {
                TripPhase::Waiting => {
                    let matching = sim
                        .vehicles()
                        .iter()
                        .filter(|v| v.trip_index == Some(t.index) && v.phase == VehiclePhase::P2)
                        .count();
                    assert_eq!(matching, 1, "waiting trip {} should have exactly one P2 vehicle", t.index);
                }
                TripPhase::Riding => {
                    let matching = sim
                        .vehicles()
                        .iter()
                        .filter(|v| v.trip_index == Some(t.index) && v.phase == VehiclePhase::P3)
                        .count();
                    assert_eq!(matching, 1, "riding trip {} should have exactly one P3 vehicle", t.index);
                }
                _ => {}
            }
        }
    }
}

#[test]
fn trip_indices_are_contiguous_after_garbage_collection() {
    let mut sim = Simulation::new(config()).unwrap();
    sim.run_n_blocks(201);
    for (i, t) in sim.trips().iter().enumerate() {
        assert_eq!(t.index, i);
    }
}

#[test]
fn identical_seeds_produce_identical_runs() {
    let mut a = Simulation::new(config()).unwrap();
    let mut b = Simulation::new(config()).unwrap();
    let states_a = a.run_n_blocks(250);
    let states_b = b.run_n_blocks(250);
    for (sa, sb) in states_a.iter().zip(states_b.iter()) {
        assert_eq!(sa.block, sb.block);
        assert_eq!(sa.vehicle_count, sb.vehicle_count);
        assert_eq!(sa.measures.fraction_p1, sb.measures.fraction_p1);
        assert_eq!(sa.measures.mean_wait_time, sb.measures.mean_wait_time);
    }
    assert_eq!(a.trips().len(), b.trips().len());
    for (ta, tb) in a.trips().iter().zip(b.trips().iter()) {
        assert_eq!(ta.origin, tb.origin);
        assert_eq!(ta.destination, tb.destination);
        assert_eq!(ta.phase, tb.phase);
    }
}
