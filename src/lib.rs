//! # Ride-Hailing Dispatch Simulation Core
//!
//! A discrete-time simulation engine for modeling ride-hailing
//! marketplaces on a toroidal integer grid.
//!
//! ## Overview
//!
//! This crate provides the core simulation engine, including:
//!
//! - **Block Stepper**: a single-threaded, deterministic ten-step loop
//! - **Toroidal City Grid**: integer `(x, y)` locations, Manhattan distance
//! - **Dispatch Engine**: pluggable nearest-vehicle matching strategies
//! - **Rolling History**: circular-buffer metrics and derived measures
//! - **Convergence & Equilibration**: Gelman-Rubin diagnostics and an
//!   economic fleet-size controller
//!
//! ## Key Concepts
//!
//! - **Discrete Blocks**: all simulation progress happens one block at
//!   a time, driven by repeated calls to [`simulation::Simulation::next_block`]
//! - **Deterministic**: a single seeded RNG threaded through the whole
//!   run makes results reproducible for a fixed seed
//! - **Single Owner**: vehicles and trips live in flat `Vec`s indexed
//!   by integer; there is no vehicle<->trip back-reference
//!
//! ## Example
//!
//! ```rust,no_run
//! use ridehail_core::config::SimulationConfig;
//! use ridehail_core::simulation::Simulation;
//!
//! let config = SimulationConfig::default().with_seed(42).with_vehicle_count(50);
//! let mut sim = Simulation::new(config).expect("valid configuration");
//! let states = sim.run_n_blocks(1_000);
//! let results = sim.run_results();
//! ```

pub mod circular_buffer;
pub mod city;
pub mod config;
pub mod convergence;
pub mod dispatch;
pub mod entities;
pub mod equilibration;
pub mod history;
pub mod measures;
pub mod profiling;
pub mod results;
pub mod simulation;
