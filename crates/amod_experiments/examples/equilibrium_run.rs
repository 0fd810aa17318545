//! Run a small closed-loop equilibrium sweep against a synthetic fleet feed
//! and print the per-iteration results.
//!
//! Run with: cargo run -p amod_experiments --example equilibrium_run

use std::error::Error;
use std::path::Path;

use amod_core::equilibrium::EquilibriumLoop;
use amod_core::mode_choice::{ChoiceCoefficients, FarePolicy, TripPurpose, TripRecord};
use amod_core::segments::{SegmentSchema, SegmentSpec};
use amod_core::test_helpers::{sample_cbd_trip, sample_intrazonal_trip};
use amod_experiments::{
    append_results_csv, init_logging, run_equilibrium_sweep, ExperimentParams, SyntheticFeed,
};

const CBD_RECORDS: usize = 30;
const INTRAZONAL_RECORDS: usize = 50;

/// Generate a small demo dataset: CBD trips with varied drive times, and
/// intrazonal trips with varied walk competitiveness.
fn write_demo_data(dir: &Path) -> Result<SegmentSchema, Box<dyn Error>> {
    std::fs::create_dir_all(dir)?;

    let cbd: Vec<TripRecord> = (0..CBD_RECORDS)
        .map(|i| {
            let mut trip = sample_cbd_trip();
            trip.car_time_s += 60.0 * i as f64;
            trip.expansion_factor = 8.0 + i as f64 * 0.5;
            trip
        })
        .collect();
    write_segment(&dir.join("cbd.csv"), &cbd)?;

    let intrazonal: Vec<TripRecord> = (0..INTRAZONAL_RECORDS)
        .map(|i| {
            let mut trip = sample_intrazonal_trip();
            trip.walk_time_s = 1_200.0 + 90.0 * i as f64;
            trip.expansion_factor = 5.0 + (i % 7) as f64;
            trip
        })
        .collect();
    write_segment(&dir.join("intrazonal.csv"), &intrazonal)?;

    let schema = SegmentSchema::new(vec![
        SegmentSpec {
            purpose: TripPurpose::Cbd,
            path: dir.join("cbd.csv"),
            records: 0..CBD_RECORDS,
        },
        SegmentSpec {
            purpose: TripPurpose::IntrazonalOther,
            path: dir.join("intrazonal.csv"),
            records: CBD_RECORDS..CBD_RECORDS + INTRAZONAL_RECORDS,
        },
    ])?;
    Ok(schema)
}

fn write_segment(path: &Path, trips: &[TripRecord]) -> Result<(), Box<dyn Error>> {
    let mut writer = csv::Writer::from_path(path)?;
    for trip in trips {
        writer.serialize(trip)?;
    }
    writer.flush()?;
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    init_logging();

    let out_dir = Path::new("output");
    let schema = write_demo_data(&out_dir.join("demo-data"))?;

    let params = ExperimentParams::default()
        .with_fleet_sizes(vec![100, 200, 400])
        .with_iteration_steps(10);
    let engine = EquilibriumLoop::new(
        schema,
        ChoiceCoefficients::default().with_amod_asc(params.amod_asc),
        FarePolicy::default().with_multiplier(params.fare_multiplier),
    )
    .with_volume_scale(params.volume_scale);

    let mut feed = SyntheticFeed::new(42);
    let records = run_equilibrium_sweep(&params, &engine, &mut feed)?;

    println!("--- Equilibrium sweep ({}) ---", params.label());
    for record in &records {
        println!(
            "fleet {:>4} step {:>2}: volume {:8.2}  welfare gain {:8.2}  mean wait {:6.1}s",
            record.fleet_size,
            record.step,
            record.total_volume,
            record.welfare_gain,
            record.mean_wait_s,
        );
    }

    let results_path = out_dir.join(format!("results-{}.csv", params.label()));
    append_results_csv(&records, &results_path)?;
    println!("results appended to {}", results_path.display());
    Ok(())
}
