//! Shared test-config factory for integration tests.

use ridehail_core::config::SimulationConfig;

/// A small, fast-to-run default configuration; tests override whatever
/// fields matter to them via the builder methods.
pub fn test_config() -> SimulationConfig {
    SimulationConfig::default()
        .with_seed(1)
        .with_city_size(8)
        .with_vehicle_count(10)
        .with_base_demand(1.0)
        .with_results_window(100)
}
