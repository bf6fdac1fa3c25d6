//! The six literal end-to-end scenarios from §8.

use ridehail_core::config::{DispatchMethod, EquilibrationMode, Impulse, SimulationConfig};
use ridehail_core::simulation::Simulation;

#[test]
fn closed_box_identity() {
    let config = SimulationConfig::default()
        .with_seed(42)
        .with_city_size(8)
        .with_vehicle_count(5)
        .with_base_demand(0.5)
        .with_results_window(1000);
    let mut sim = Simulation::new(config).unwrap();
    sim.run_n_blocks(2000);
    let results = sim.run_results();

    assert!((results.measures.check_sum_p - 1.0).abs() < 0.01, "check_sum_p = {}", results.measures.check_sum_p);
    if results.measures.check_identity_p3 != 0.0 {
        assert!(
            (results.measures.check_identity_p3 - 1.0).abs() < 0.1,
            "check_identity_p3 = {}",
            results.measures.check_identity_p3
        );
    }
}

#[test]
fn minimal_run_completes_with_a_short_window() {
    let config = SimulationConfig::default()
        .with_seed(1)
        .with_city_size(4)
        .with_vehicle_count(2)
        .with_base_demand(0.2)
        .with_time_blocks(20);
    let mut sim = Simulation::new(config.clone()).unwrap();
    let states = sim.run_n_blocks(config.time_blocks);
    assert_eq!(states.len(), 20);

    let results = sim.run_results();
    assert_eq!(results.metadata.blocks_simulated, 20);
    assert_eq!(results.metadata.blocks_analyzed, 20, "results_window (200) exceeds time_blocks, so blocks_analyzed caps at time_blocks");
}

#[test]
fn high_load_keeps_vehicles_busy_and_cancellation_rare() {
    let config = SimulationConfig::default()
        .with_seed(5)
        .with_city_size(20)
        .with_vehicle_count(50)
        .with_base_demand(2.0)
        .with_results_window(500);
    let mut sim = Simulation::new(config).unwrap();
    sim.run_n_blocks(500);
    let results = sim.run_results();

    assert!(results.measures.fraction_p3 > 0.1, "fraction_p3 = {}", results.measures.fraction_p3);
    assert!(results.measures.mean_wait_time.is_finite());
    assert!(results.measures.mean_wait_time < 20.0, "mean_wait_time = {}", results.measures.mean_wait_time);
}

#[test]
fn price_equilibration_drifts_fleet_toward_zero_surplus() {
    let config = SimulationConfig::default()
        .with_seed(9)
        .with_city_size(10)
        .with_vehicle_count(10)
        .with_base_demand(1.0)
        .with_time_blocks(200)
        .with_economics(1.0, 0.2, 0.5, 0.5)
        .with_equilibration(EquilibrationMode::Price, 10);
    let mut sim = Simulation::new(config).unwrap();
    sim.run_n_blocks(200);
    // Equilibration ran at least once and the fleet is still viable.
    assert!(!sim.vehicles().is_empty());
}

#[test]
fn forward_dispatch_reduces_mean_wait_time_relative_to_default() {
    let base = SimulationConfig::default()
        .with_seed(5)
        .with_city_size(20)
        .with_vehicle_count(50)
        .with_base_demand(2.0)
        .with_results_window(500);

    let mut default_sim = Simulation::new(base.clone()).unwrap();
    default_sim.run_n_blocks(500);
    let default_results = default_sim.run_results();

    let forward = base.with_dispatch_method(DispatchMethod::ForwardDispatch).with_forward_dispatch_bias(1.0);
    let mut forward_sim = Simulation::new(forward).unwrap();
    forward_sim.run_n_blocks(500);
    let forward_results = forward_sim.run_results();

    let any_forward_dispatched = forward_sim.trips().iter().any(|t| t.forward_dispatched);
    assert!(any_forward_dispatched || forward_results.measures.fraction_p3 > 0.0);
    assert!(
        forward_results.measures.mean_wait_time <= default_results.measures.mean_wait_time + 1e-9,
        "forward dispatch mean_wait_time {} should not exceed default {}",
        forward_results.measures.mean_wait_time,
        default_results.measures.mean_wait_time
    );
}

#[test]
fn impulse_raises_demand_at_the_scheduled_block() {
    let config = SimulationConfig::default()
        .with_seed(5)
        .with_city_size(20)
        .with_vehicle_count(50)
        .with_base_demand(2.0)
        .with_impulses(vec![Impulse { block: 100, base_demand: Some(4.0), ..Default::default() }]);
    let mut sim = Simulation::new(config).unwrap();
    let states = sim.run_n_blocks(300);
    assert_eq!(states[99].base_demand, 2.0);
    assert_eq!(states[150].base_demand, 4.0);
}
