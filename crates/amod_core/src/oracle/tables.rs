//! Precomputed OD lookup tables and link congestion overrides.
//!
//! Distances and durations are precomputed offline for the fixed set of OD
//! records and serialized with bincode; the congestion table maps rounded
//! link endpoints to empirically observed durations that replace the
//! engine's free-flow estimates. Table generation is a separate batch job;
//! this module only loads, saves and queries.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::coords::{Coord, LinkKey, OdKey};

/// Errors from loading or saving lookup tables.
#[derive(Debug)]
pub enum TableError {
    Io(std::io::Error),
    Codec(bincode::Error),
}

impl std::fmt::Display for TableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableError::Io(err) => write!(f, "lookup table I/O error: {}", err),
            TableError::Codec(err) => write!(f, "lookup table encoding error: {}", err),
        }
    }
}

impl std::error::Error for TableError {}

impl From<std::io::Error> for TableError {
    fn from(err: std::io::Error) -> Self {
        TableError::Io(err)
    }
}

impl From<bincode::Error> for TableError {
    fn from(err: bincode::Error) -> Self {
        TableError::Codec(err)
    }
}

/// Precomputed lookup tables, all keyed at the shared rounding precision.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LookupTables {
    distances: HashMap<OdKey, f64>,
    durations: HashMap<OdKey, f64>,
    link_congestion: HashMap<LinkKey, f64>,
}

impl LookupTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from in-memory maps (tests, or callers that decode their own files).
    pub fn from_parts(
        distances: HashMap<OdKey, f64>,
        durations: HashMap<OdKey, f64>,
        link_congestion: HashMap<LinkKey, f64>,
    ) -> Self {
        Self {
            distances,
            durations,
            link_congestion,
        }
    }

    /// Load bincode-serialized tables from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TableError> {
        let data = fs::read(path)?;
        Ok(bincode::deserialize(&data)?)
    }

    /// Serialize the tables to disk.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), TableError> {
        let data = bincode::serialize(self)?;
        fs::write(path, data)?;
        Ok(())
    }

    pub fn insert_distance(&mut self, origin: Coord, destination: Coord, meters: f64) {
        self.distances.insert(OdKey::new(origin, destination), meters);
    }

    pub fn insert_duration(&mut self, origin: Coord, destination: Coord, seconds: f64) {
        self.durations.insert(OdKey::new(origin, destination), seconds);
    }

    pub fn insert_link_congestion(&mut self, start: Coord, end: Coord, seconds: f64) {
        self.link_congestion.insert(LinkKey::new(start, end), seconds);
    }

    pub fn distance(&self, od: &OdKey) -> Option<f64> {
        self.distances.get(od).copied()
    }

    pub fn duration(&self, od: &OdKey) -> Option<f64> {
        self.durations.get(od).copied()
    }

    pub fn congested_duration(&self, link: &LinkKey) -> Option<f64> {
        self.link_congestion.get(link).copied()
    }

    pub fn od_pair_count(&self) -> (usize, usize) {
        (self.distances.len(), self.durations.len())
    }

    pub fn congestion_link_count(&self) -> usize {
        self.link_congestion.len()
    }
}
