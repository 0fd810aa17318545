//! Lookup-vs-engine counters and congestion-key usage histograms.

use std::collections::HashMap;

use serde::Serialize;

use crate::coords::LinkKey;

/// Running counters of how each oracle operation was answered: from the
/// precomputed tables, or down the engine path (live call or cached engine
/// answer).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OracleStats {
    pub distance_lookup: u64,
    pub distance_engine: u64,
    pub duration_lookup: u64,
    pub duration_engine: u64,
    pub both_lookup: u64,
    pub both_engine: u64,
    /// `get_routing` calls whose OD pair was present in the distance table.
    pub routing_could_lookup: u64,
    pub routing_uses_engine: u64,
}

/// Usage record for one congestion-table key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinkUse {
    /// Step distance observed the first time the key was seen.
    pub distance_m: f64,
    pub uses: u64,
}

/// Snapshot returned by [`Oracle::flush_stats`](super::Oracle::flush_stats):
/// the counters plus the found/unfound congestion-key histograms, sorted by
/// key for deterministic reports.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OracleReport {
    pub stats: OracleStats,
    pub found_links: Vec<(LinkKey, LinkUse)>,
    pub unfound_links: Vec<(LinkKey, LinkUse)>,
}

impl OracleReport {
    pub(super) fn from_parts(
        stats: OracleStats,
        found: HashMap<LinkKey, LinkUse>,
        unfound: HashMap<LinkKey, LinkUse>,
    ) -> Self {
        let mut found_links: Vec<_> = found.into_iter().collect();
        found_links.sort_by_key(|(key, _)| *key);
        let mut unfound_links: Vec<_> = unfound.into_iter().collect();
        unfound_links.sort_by_key(|(key, _)| *key);
        Self {
            stats,
            found_links,
            unfound_links,
        }
    }

    /// Observations on links that had congestion data.
    pub fn total_found_uses(&self) -> u64 {
        self.found_links.iter().map(|(_, use_)| use_.uses).sum()
    }

    /// Observations on links without congestion data.
    pub fn total_unfound_uses(&self) -> u64 {
        self.unfound_links.iter().map(|(_, use_)| use_.uses).sum()
    }
}

/// Record one use of `key` in `histogram`, keeping the first-seen distance.
pub(super) fn record_link_use(
    histogram: &mut HashMap<LinkKey, LinkUse>,
    key: LinkKey,
    distance_m: f64,
) {
    histogram
        .entry(key)
        .or_insert(LinkUse { distance_m, uses: 0 })
        .uses += 1;
}
