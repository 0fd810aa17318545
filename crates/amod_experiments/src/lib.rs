//! Experiment harness for the AMoD demand equilibration engine.
//!
//! Wraps `amod_core` with the pieces an equilibrium study needs around the
//! engine itself:
//!
//! - [`parameters`]: experiment parameter sets (fleet sizes, fare
//!   multiplier, AMoD constant, iteration count) with JSON round-tripping
//! - [`runner`]: the sweep loop alternating the equilibration engine with a
//!   fleet-side [`ServiceLevelFeed`], plus a synthetic feed for closed-loop
//!   runs without the real fleet simulator
//! - [`export`]: append-only results CSV and oracle diagnostics writers
//!
//! # Quick start
//!
//! ```no_run
//! use amod_experiments::{
//!     append_results_csv, init_logging, run_equilibrium_sweep, ExperimentParams, SyntheticFeed,
//! };
//!
//! init_logging();
//! let params = ExperimentParams::default().with_fleet_sizes(vec![150, 200, 250]);
//! let engine = params.equilibrium();
//! let mut feed = SyntheticFeed::new(42);
//! let records = run_equilibrium_sweep(&params, &engine, &mut feed).unwrap();
//! append_results_csv(&records, "output/results.csv").unwrap();
//! ```

pub mod export;
pub mod parameters;
pub mod runner;

pub use export::{append_results_csv, write_diversion_csv, write_key_stats, write_lookup_stats};
pub use parameters::ExperimentParams;
pub use runner::{
    run_equilibrium_sweep, IterationRecord, ServiceLevelFeed, ServiceObservation, SyntheticFeed,
};

/// Initialize `env_logger` with an `info` default filter. Safe to call more
/// than once; later calls are no-ops.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
