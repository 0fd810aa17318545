//! The demand equilibration loop.
//!
//! One call to [`EquilibriumLoop::run_step`] is one iteration of the
//! demand-supply fixed point: load every trip-purpose segment, pair each
//! record with its current service-level estimate, evaluate the choice
//! model per record, and fold the resulting raw AMoD volumes into the
//! shared demand matrix by successive averages.
//!
//! Steps are strictly sequential (step `s`'s matrix is step `s+1`'s input),
//! but the per-record evaluations inside a step are independent pure
//! computations and run on a rayon pool.

use std::path::PathBuf;

use log::{debug, info};
use rayon::prelude::*;

use crate::demand::{DemandError, DemandMatrix};
use crate::mode_choice::{
    evaluate_trip, ChoiceCoefficients, ChoiceError, DiversionShares, FarePolicy, TripRecord,
};
use crate::segments::{SchemaError, SegmentSchema, SegmentSpec};
use crate::service_level::{ServiceLevel, ServiceLevelTable};

/// Fraction of the demand window each iteration's choice volume represents.
/// The reference dataset models a 3-hour window around a 1-hour study period.
pub const DEFAULT_VOLUME_SCALE: f64 = 1.0 / 3.0;

/// Errors from an equilibrium step.
#[derive(Debug)]
pub enum EquilibriumError {
    Schema(SchemaError),
    Csv {
        path: PathBuf,
        source: csv::Error,
    },
    /// A segment file's row count disagrees with its declared record range.
    SegmentLength {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },
    /// The demand matrix or service table is sized for a different schema.
    RecordCountMismatch {
        schema: usize,
        demand: usize,
        service: usize,
    },
    Choice {
        m_id: usize,
        source: ChoiceError,
    },
    Demand(DemandError),
}

impl std::fmt::Display for EquilibriumError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EquilibriumError::Schema(err) => write!(f, "{}", err),
            EquilibriumError::Csv { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            EquilibriumError::SegmentLength {
                path,
                expected,
                actual,
            } => write!(
                f,
                "{} has {} rows, schema expects {}",
                path.display(),
                actual,
                expected
            ),
            EquilibriumError::RecordCountMismatch {
                schema,
                demand,
                service,
            } => write!(
                f,
                "record counts disagree: schema {}, demand matrix {}, service table {}",
                schema, demand, service
            ),
            EquilibriumError::Choice { m_id, source } => {
                write!(f, "choice model failed on record {}: {}", m_id, source)
            }
            EquilibriumError::Demand(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for EquilibriumError {}

impl From<SchemaError> for EquilibriumError {
    fn from(err: SchemaError) -> Self {
        EquilibriumError::Schema(err)
    }
}

impl From<DemandError> for EquilibriumError {
    fn from(err: DemandError) -> Self {
        EquilibriumError::Demand(err)
    }
}

/// Per-record reporting row produced by an iteration.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DiversionRow {
    pub m_id: usize,
    pub expansion_factor: f64,
    pub amod_probability: f64,
    /// Raw choice volume before MSA smoothing, already volume-scaled.
    pub amod_volume: f64,
    pub wait_time_s: f64,
    pub detour_factor: f64,
    pub logsum_with: f64,
    pub logsum_without: f64,
    pub diversion: Option<DiversionShares>,
}

/// Everything one iteration reports besides the updated demand matrix.
#[derive(Debug, Clone)]
pub struct IterationOutcome {
    pub step: usize,
    /// Total smoothed forecast volume after the update.
    pub total_volume: f64,
    pub logsum_with_amod: f64,
    pub logsum_without_amod: f64,
    pub rows: Vec<DiversionRow>,
}

impl IterationOutcome {
    /// Welfare benefit of offering the AMoD service this iteration.
    pub fn welfare_gain(&self) -> f64 {
        self.logsum_with_amod - self.logsum_without_amod
    }
}

/// The equilibration engine: schema plus model parameters.
#[derive(Debug, Clone)]
pub struct EquilibriumLoop {
    schema: SegmentSchema,
    coefficients: ChoiceCoefficients,
    fares: FarePolicy,
    volume_scale: f64,
}

impl EquilibriumLoop {
    pub fn new(schema: SegmentSchema, coefficients: ChoiceCoefficients, fares: FarePolicy) -> Self {
        Self {
            schema,
            coefficients,
            fares,
            volume_scale: DEFAULT_VOLUME_SCALE,
        }
    }

    pub fn with_volume_scale(mut self, volume_scale: f64) -> Self {
        self.volume_scale = volume_scale;
        self
    }

    pub fn record_count(&self) -> usize {
        self.schema.record_count()
    }

    pub fn schema(&self) -> &SegmentSchema {
        &self.schema
    }

    /// Run one equilibrium iteration at 0-indexed `step`.
    ///
    /// The demand matrix is MSA-updated in place and its cumulative-share
    /// column rebuilt; the returned outcome carries the reporting rows.
    pub fn run_step(
        &self,
        step: usize,
        demand: &mut DemandMatrix,
        service: &ServiceLevelTable,
    ) -> Result<IterationOutcome, EquilibriumError> {
        let record_count = self.schema.record_count();
        if demand.len() != record_count || service.len() != record_count {
            return Err(EquilibriumError::RecordCountMismatch {
                schema: record_count,
                demand: demand.len(),
                service: service.len(),
            });
        }

        let mut rows = Vec::with_capacity(record_count);
        for segment in self.schema.segments() {
            rows.extend(self.evaluate_segment(segment, service)?);
        }

        let raw: Vec<f64> = rows.iter().map(|row| row.amod_volume).collect();
        demand.msa_update(step, &raw)?;
        let total_volume = demand.rebuild_cumulative_shares()?;

        let logsum_with_amod = rows.iter().map(|row| row.logsum_with).sum();
        let logsum_without_amod = rows.iter().map(|row| row.logsum_without).sum();
        info!(
            "equilibrium step {}: total volume {:.2}, welfare gain {:.2}",
            step,
            total_volume,
            logsum_with_amod - logsum_without_amod
        );

        Ok(IterationOutcome {
            step,
            total_volume,
            logsum_with_amod,
            logsum_without_amod,
            rows,
        })
    }

    fn evaluate_segment(
        &self,
        segment: &SegmentSpec,
        service: &ServiceLevelTable,
    ) -> Result<Vec<DiversionRow>, EquilibriumError> {
        let trips = load_segment(segment)?;
        debug!(
            "segment {}: {} records from {}",
            segment.purpose.label(),
            trips.len(),
            segment.path.display()
        );

        let first_id = segment.records.start;
        trips
            .into_par_iter()
            .enumerate()
            .map(|(offset, trip)| {
                let m_id = first_id + offset;
                let level: ServiceLevel = service.level(m_id);
                let outcome =
                    evaluate_trip(segment.purpose, &trip, level, &self.coefficients, &self.fares)
                        .map_err(|source| EquilibriumError::Choice { m_id, source })?;
                Ok(DiversionRow {
                    m_id,
                    expansion_factor: trip.expansion_factor,
                    amod_probability: outcome.shares.amod,
                    amod_volume: outcome.amod_volume * self.volume_scale,
                    wait_time_s: level.wait_time_s,
                    detour_factor: level.detour_factor,
                    logsum_with: outcome.logsum_with,
                    logsum_without: outcome.logsum_without,
                    diversion: outcome.diversion,
                })
            })
            .collect()
    }
}

fn load_segment(segment: &SegmentSpec) -> Result<Vec<TripRecord>, EquilibriumError> {
    let wrap = |source: csv::Error| EquilibriumError::Csv {
        path: segment.path.clone(),
        source,
    };
    let mut reader = csv::Reader::from_path(&segment.path).map_err(wrap)?;
    let trips: Vec<TripRecord> = reader
        .deserialize()
        .collect::<Result<_, csv::Error>>()
        .map_err(wrap)?;

    let expected = segment.records.len();
    if trips.len() != expected {
        return Err(EquilibriumError::SegmentLength {
            path: segment.path.clone(),
            expected,
            actual: trips.len(),
        });
    }
    Ok(trips)
}
