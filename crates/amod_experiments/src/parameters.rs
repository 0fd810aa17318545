//! Experiment parameter sets for equilibrium sweeps.

use std::path::PathBuf;

use amod_core::equilibrium::{EquilibriumLoop, DEFAULT_VOLUME_SCALE};
use amod_core::mode_choice::{ChoiceCoefficients, FarePolicy};
use amod_core::segments::SegmentSchema;
use serde::{Deserialize, Serialize};

/// One experiment: a set of fleet sizes swept over a common model setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentParams {
    /// Fleet sizes to equilibrate, one sweep each.
    pub fleet_sizes: Vec<usize>,
    pub vehicle_capacity: usize,
    /// Scales the metered AMoD fare components.
    pub fare_multiplier: f64,
    /// Alternative-specific constant of the AMoD mode, the policy lever.
    pub amod_asc: f64,
    /// Equilibrium iterations per fleet size.
    pub iteration_steps: usize,
    /// Fraction of the demand window one iteration's volume represents.
    pub volume_scale: f64,
    /// Directory holding the per-purpose trip CSVs.
    pub data_dir: PathBuf,
}

impl Default for ExperimentParams {
    fn default() -> Self {
        Self {
            fleet_sizes: vec![200],
            vehicle_capacity: 4,
            fare_multiplier: 1.0,
            amod_asc: -3.5,
            iteration_steps: 10,
            volume_scale: DEFAULT_VOLUME_SCALE,
            data_dir: PathBuf::from("data"),
        }
    }
}

impl ExperimentParams {
    pub fn with_fleet_sizes(mut self, fleet_sizes: Vec<usize>) -> Self {
        self.fleet_sizes = fleet_sizes;
        self
    }

    pub fn with_fare_multiplier(mut self, fare_multiplier: f64) -> Self {
        self.fare_multiplier = fare_multiplier;
        self
    }

    pub fn with_amod_asc(mut self, amod_asc: f64) -> Self {
        self.amod_asc = amod_asc;
        self
    }

    pub fn with_iteration_steps(mut self, iteration_steps: usize) -> Self {
        self.iteration_steps = iteration_steps;
        self
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    /// Run nickname used in result file names, e.g. `AVPT-3.5`.
    pub fn label(&self) -> String {
        format!("AVPT{}", self.amod_asc)
    }

    /// Load a parameter set from a JSON file.
    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let file = std::fs::File::open(path.as_ref())?;
        Ok(serde_json::from_reader(file)?)
    }

    /// Write the parameter set to a JSON file alongside the results.
    pub fn to_json_file(&self, path: impl AsRef<std::path::Path>) -> Result<(), Box<dyn std::error::Error>> {
        let file = std::fs::File::create(path.as_ref())?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    /// Build the equilibration engine this experiment describes, with the
    /// reference segment layout resolved against `data_dir`.
    pub fn equilibrium(&self) -> EquilibriumLoop {
        let schema = SegmentSchema::reference_layout(&self.data_dir);
        let coefficients = ChoiceCoefficients::default().with_amod_asc(self.amod_asc);
        let fares = FarePolicy::default().with_multiplier(self.fare_multiplier);
        EquilibriumLoop::new(schema, coefficients, fares).with_volume_scale(self.volume_scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_reference_experiment() {
        let params = ExperimentParams::default();
        assert_eq!(params.fleet_sizes, vec![200]);
        assert_eq!(params.vehicle_capacity, 4);
        assert_eq!(params.iteration_steps, 10);
        assert_eq!(params.label(), "AVPT-3.5");
    }

    #[test]
    fn parameters_round_trip_through_json() {
        let params = ExperimentParams::default()
            .with_fleet_sizes(vec![150, 250])
            .with_fare_multiplier(1.2)
            .with_amod_asc(-4.0);
        let json = serde_json::to_string(&params).expect("serialize");
        let back: ExperimentParams = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.fleet_sizes, vec![150, 250]);
        assert_eq!(back.fare_multiplier, 1.2);
        assert_eq!(back.label(), "AVPT-4");
    }

    #[test]
    fn equilibrium_uses_the_reference_record_space() {
        let engine = ExperimentParams::default().equilibrium();
        assert_eq!(engine.record_count(), 1057);
    }

    #[test]
    fn parameters_round_trip_through_a_json_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("params.json");
        let params = ExperimentParams::default().with_iteration_steps(3);
        params.to_json_file(&path).expect("write");
        let back = ExperimentParams::from_json_file(&path).expect("read");
        assert_eq!(back.iteration_steps, 3);
        assert_eq!(back.fleet_sizes, params.fleet_sizes);
    }
}
