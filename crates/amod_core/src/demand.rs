//! The smoothed AMoD demand matrix exchanged with the fleet simulator.
//!
//! One entry per OD record, fixed length for the lifetime of an experiment.
//! Per-step raw choice volumes are folded in by the method of successive
//! averages; the cumulative-share column is the empirical CDF the fleet
//! simulator inverts to sample synthetic arrivals proportional to forecast
//! demand.

use rand::Rng;
use serde::Serialize;

/// One OD record's row of the demand matrix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DemandEntry {
    pub smoothed_volume: f64,
    /// Prefix sum of smoothed volume over record ids, divided by the total.
    pub cumulative_share: f64,
}

/// Errors from demand-matrix updates.
#[derive(Debug)]
pub enum DemandError {
    /// A raw-choice vector of the wrong length; the record space is fixed.
    LengthMismatch { expected: usize, actual: usize },
    /// All smoothed volumes are zero; the share column is undefined.
    ZeroTotalVolume,
}

impl std::fmt::Display for DemandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DemandError::LengthMismatch { expected, actual } => write!(
                f,
                "expected {} raw choice volumes, got {}",
                expected, actual
            ),
            DemandError::ZeroTotalVolume => {
                write!(f, "total forecast volume is zero; shares are undefined")
            }
        }
    }
}

impl std::error::Error for DemandError {}

/// Fixed-length matrix of smoothed volumes and cumulative shares.
#[derive(Debug, Clone, Serialize)]
pub struct DemandMatrix {
    entries: Vec<DemandEntry>,
}

impl DemandMatrix {
    pub fn new(record_count: usize) -> Self {
        Self {
            entries: vec![DemandEntry::default(); record_count],
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, m_id: usize) -> Option<&DemandEntry> {
        self.entries.get(m_id)
    }

    pub fn entries(&self) -> &[DemandEntry] {
        &self.entries
    }

    pub fn total_volume(&self) -> f64 {
        self.entries.iter().map(|e| e.smoothed_volume).sum()
    }

    /// Fold step `step`'s raw choice volumes into the smoothed column:
    /// `smoothed = raw/(s+1) + smoothed_prev·s/(s+1)` with 0-indexed `s`.
    ///
    /// The weight on the newest observation shrinks as iterations accumulate,
    /// damping oscillation between demand and supply.
    pub fn msa_update(&mut self, step: usize, raw_choices: &[f64]) -> Result<(), DemandError> {
        if raw_choices.len() != self.entries.len() {
            return Err(DemandError::LengthMismatch {
                expected: self.entries.len(),
                actual: raw_choices.len(),
            });
        }
        let s = step as f64;
        for (entry, &raw) in self.entries.iter_mut().zip(raw_choices) {
            entry.smoothed_volume = raw / (s + 1.0) + entry.smoothed_volume * s / (s + 1.0);
        }
        Ok(())
    }

    /// Recompute the cumulative-share column from the smoothed volumes.
    /// Returns the total forecast volume.
    pub fn rebuild_cumulative_shares(&mut self) -> Result<f64, DemandError> {
        let total = self.total_volume();
        if !(total > 0.0) {
            return Err(DemandError::ZeroTotalVolume);
        }
        let mut accum = 0.0;
        for entry in &mut self.entries {
            accum += entry.smoothed_volume;
            entry.cumulative_share = accum / total;
        }
        Ok(total)
    }

    /// Draw a record id with probability proportional to its smoothed volume,
    /// by inversion on the cumulative-share column. `None` on an empty matrix.
    pub fn sample_record<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<usize> {
        if self.entries.is_empty() {
            return None;
        }
        let u: f64 = rng.gen();
        let idx = self
            .entries
            .partition_point(|entry| entry.cumulative_share <= u);
        Some(idx.min(self.entries.len() - 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn msa_step_zero_adopts_the_raw_volume() {
        let mut matrix = DemandMatrix::new(3);
        matrix.msa_update(0, &[5.0, 0.0, 2.5]).expect("update");
        assert_eq!(matrix.entry(0).unwrap().smoothed_volume, 5.0);
        assert_eq!(matrix.entry(2).unwrap().smoothed_volume, 2.5);
    }

    #[test]
    fn msa_with_constant_input_is_a_fixed_point() {
        let mut matrix = DemandMatrix::new(2);
        matrix.msa_update(0, &[4.0, 1.0]).expect("update");
        matrix.msa_update(1, &[4.0, 1.0]).expect("update");
        // Constant input: step 1 must reproduce it exactly.
        assert_eq!(matrix.entry(0).unwrap().smoothed_volume, 4.0);
        assert_eq!(matrix.entry(1).unwrap().smoothed_volume, 1.0);
    }

    #[test]
    fn msa_holds_a_constant_signal_through_step_20() {
        let mut matrix = DemandMatrix::new(1);
        for step in 0..=20 {
            matrix.msa_update(step, &[7.5]).expect("update");
        }
        assert_relative_eq!(matrix.entry(0).unwrap().smoothed_volume, 7.5, epsilon = 1e-9);
    }

    #[test]
    fn msa_converges_to_a_constant_signal() {
        let mut matrix = DemandMatrix::new(1);
        // A transient at step 0, then a constant signal.
        matrix.msa_update(0, &[100.0]).expect("update");
        for step in 1..=20 {
            matrix.msa_update(step, &[10.0]).expect("update");
        }
        // Remaining weight of the transient is 1/21.
        assert_relative_eq!(
            matrix.entry(0).unwrap().smoothed_volume,
            10.0 + 90.0 / 21.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn msa_rejects_wrong_length() {
        let mut matrix = DemandMatrix::new(3);
        let err = matrix.msa_update(0, &[1.0]).unwrap_err();
        assert!(matches!(
            err,
            DemandError::LengthMismatch {
                expected: 3,
                actual: 1
            }
        ));
    }

    #[test]
    fn cumulative_shares_are_monotone_and_end_at_one() {
        let mut matrix = DemandMatrix::new(4);
        matrix.msa_update(0, &[1.0, 0.0, 3.0, 2.0]).expect("update");
        let total = matrix.rebuild_cumulative_shares().expect("shares");
        assert_relative_eq!(total, 6.0);

        let mut last = 0.0;
        for entry in matrix.entries() {
            assert!(entry.cumulative_share >= last);
            last = entry.cumulative_share;
        }
        assert_relative_eq!(last, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn zero_total_volume_is_an_error() {
        let mut matrix = DemandMatrix::new(2);
        assert!(matches!(
            matrix.rebuild_cumulative_shares().unwrap_err(),
            DemandError::ZeroTotalVolume
        ));
    }

    #[test]
    fn sampling_respects_the_share_column() {
        let mut matrix = DemandMatrix::new(3);
        matrix.msa_update(0, &[0.0, 10.0, 0.0]).expect("update");
        matrix.rebuild_cumulative_shares().expect("shares");

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            // All the mass sits on record 1.
            assert_eq!(matrix.sample_record(&mut rng), Some(1));
        }
    }

    #[test]
    fn sampling_distribution_tracks_volumes() {
        let mut matrix = DemandMatrix::new(2);
        matrix.msa_update(0, &[3.0, 1.0]).expect("update");
        matrix.rebuild_cumulative_shares().expect("shares");

        let mut rng = StdRng::seed_from_u64(42);
        let draws = 10_000;
        let hits = (0..draws)
            .filter(|_| matrix.sample_record(&mut rng) == Some(0))
            .count();
        let share = hits as f64 / draws as f64;
        assert!((share - 0.75).abs() < 0.02, "share was {}", share);
    }
}
