//! Per-record AMoD service-level aggregates fed back by the fleet simulator.

use serde::{Deserialize, Serialize};

/// Wait time assumed before the fleet has produced any observations, seconds.
pub const INITIAL_WAIT_S: f64 = 400.0;

/// Detour factor assumed before the fleet has produced any observations.
pub const INITIAL_DETOUR: f64 = 1.25;

/// Mean service level of one OD record, as consumed by the choice model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ServiceLevel {
    pub wait_time_s: f64,
    /// Ratio of realized to direct in-vehicle time, >= 1 in practice.
    pub detour_factor: f64,
}

impl Default for ServiceLevel {
    fn default() -> Self {
        Self {
            wait_time_s: INITIAL_WAIT_S,
            detour_factor: INITIAL_DETOUR,
        }
    }
}

/// Running aggregate of one record's observations within an iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceAggregate {
    pub summed_wait_s: f64,
    pub summed_detour: f64,
    pub occurrences: u64,
}

impl ServiceAggregate {
    /// Mean wait/detour; the initial constants when nothing was observed.
    pub fn mean(&self) -> ServiceLevel {
        if self.occurrences == 0 {
            ServiceLevel::default()
        } else {
            let n = self.occurrences as f64;
            ServiceLevel {
                wait_time_s: self.summed_wait_s / n,
                detour_factor: self.summed_detour / n,
            }
        }
    }
}

/// Attempt to record an observation outside the fixed record space.
#[derive(Debug)]
pub struct RecordOutOfRange {
    pub m_id: usize,
    pub len: usize,
}

impl std::fmt::Display for RecordOutOfRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "record id {} outside the {}-record service table",
            self.m_id, self.len
        )
    }
}

impl std::error::Error for RecordOutOfRange {}

/// Fixed-length table of per-record aggregates, indexed by record id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceLevelTable {
    rows: Vec<ServiceAggregate>,
}

impl ServiceLevelTable {
    pub fn new(record_count: usize) -> Self {
        Self {
            rows: vec![ServiceAggregate::default(); record_count],
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Accumulate one served-trip observation from the fleet simulator.
    pub fn record(
        &mut self,
        m_id: usize,
        wait_time_s: f64,
        detour_factor: f64,
    ) -> Result<(), RecordOutOfRange> {
        let len = self.len();
        let row = self
            .rows
            .get_mut(m_id)
            .ok_or(RecordOutOfRange { m_id, len })?;
        row.summed_wait_s += wait_time_s;
        row.summed_detour += detour_factor;
        row.occurrences += 1;
        Ok(())
    }

    /// Mean service level for a record; defaults when out of range or unobserved.
    pub fn level(&self, m_id: usize) -> ServiceLevel {
        self.rows
            .get(m_id)
            .map(ServiceAggregate::mean)
            .unwrap_or_default()
    }

    pub fn aggregate(&self, m_id: usize) -> Option<&ServiceAggregate> {
        self.rows.get(m_id)
    }

    /// Zero all aggregates for the next iteration. Length is preserved.
    pub fn reset(&mut self) {
        for row in &mut self.rows {
            *row = ServiceAggregate::default();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn unobserved_record_uses_initial_constants() {
        let table = ServiceLevelTable::new(3);
        let level = table.level(1);
        assert_eq!(level.wait_time_s, INITIAL_WAIT_S);
        assert_eq!(level.detour_factor, INITIAL_DETOUR);
    }

    #[test]
    fn recorded_observations_average() {
        let mut table = ServiceLevelTable::new(2);
        table.record(0, 300.0, 1.2).expect("in range");
        table.record(0, 500.0, 1.4).expect("in range");
        let level = table.level(0);
        assert_relative_eq!(level.wait_time_s, 400.0);
        assert_relative_eq!(level.detour_factor, 1.3);
        // The other record is untouched.
        assert_eq!(table.level(1).wait_time_s, INITIAL_WAIT_S);
    }

    #[test]
    fn out_of_range_record_is_an_error() {
        let mut table = ServiceLevelTable::new(2);
        let err = table.record(5, 100.0, 1.1).unwrap_err();
        assert_eq!(err.m_id, 5);
        assert_eq!(err.len, 2);
    }

    #[test]
    fn reset_keeps_length_and_restores_defaults() {
        let mut table = ServiceLevelTable::new(2);
        table.record(1, 250.0, 1.5).expect("in range");
        table.reset();
        assert_eq!(table.len(), 2);
        assert_eq!(table.level(1).wait_time_s, INITIAL_WAIT_S);
        assert_eq!(table.aggregate(1).expect("row").occurrences, 0);
    }
}
