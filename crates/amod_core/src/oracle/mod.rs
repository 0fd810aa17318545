//! Distance/duration oracle: lookup tables first, routing engine on miss.
//!
//! The oracle answers three OD queries (distance, duration, both) and a
//! full-route query with per-link congestion overrides. Precomputed tables
//! are consulted first; misses go to the routing engine through the
//! [`RoutingApi`] seam, behind an LRU of engine answers. When the road
//! network is administratively disabled, closed-form approximations replace
//! the engine. All counters and caches live on the oracle instance.

mod diagnostics;
mod engine;
mod tables;

pub use diagnostics::{LinkUse, OracleReport, OracleStats};
pub use engine::{EngineConfig, EngineError, OsrmEngine, RouteLeg, RouteStep, RoutingApi};
pub use tables::{LookupTables, TableError};

use std::collections::HashMap;
use std::num::NonZeroUsize;

use log::debug;
use lru::LruCache;

use crate::coords::{equirectangular_distance_m, Coord, LinkKey, OdKey};

/// Errors surfaced by oracle queries.
#[derive(Debug)]
pub enum OracleError {
    Engine(EngineError),
    /// The recomputed route duration disagrees with the running sum tracked
    /// while applying congestion overrides. A modeling bug, not retryable.
    InconsistentRoute { recomputed: f64, tracked: f64 },
}

impl std::fmt::Display for OracleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OracleError::Engine(err) => write!(f, "{}", err),
            OracleError::InconsistentRoute { recomputed, tracked } => write!(
                f,
                "route duration {} disagrees with tracked step sum {}",
                recomputed, tracked
            ),
        }
    }
}

impl std::error::Error for OracleError {}

impl From<EngineError> for OracleError {
    fn from(err: EngineError) -> Self {
        OracleError::Engine(err)
    }
}

/// Oracle behavior knobs.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// When false, the engine is never called; closed-form fallbacks answer
    /// everything the tables cannot.
    pub road_network_enabled: bool,
    /// Vehicle speed for the duration fallback, in meters per second.
    pub constant_speed_mps: f64,
    /// Capacity of the engine-answer LRU.
    pub cache_capacity: usize,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            road_network_enabled: true,
            constant_speed_mps: 9.0,
            cache_capacity: 20_000,
        }
    }
}

impl OracleConfig {
    pub fn without_road_network(mut self) -> Self {
        self.road_network_enabled = false;
        self
    }
}

/// Table-first distance/duration/routing oracle.
pub struct Oracle {
    tables: LookupTables,
    engine: Box<dyn RoutingApi>,
    config: OracleConfig,
    /// Engine answers, keyed like the tables, so repeated misses do not
    /// repeat HTTP calls.
    engine_cache: LruCache<OdKey, (f64, f64)>,
    stats: OracleStats,
    found_links: HashMap<LinkKey, LinkUse>,
    unfound_links: HashMap<LinkKey, LinkUse>,
}

impl Oracle {
    pub fn new(tables: LookupTables, engine: Box<dyn RoutingApi>, config: OracleConfig) -> Self {
        let capacity =
            NonZeroUsize::new(config.cache_capacity.max(1)).expect("capacity clamped above zero");
        Self {
            tables,
            engine,
            config,
            engine_cache: LruCache::new(capacity),
            stats: OracleStats::default(),
            found_links: HashMap::new(),
            unfound_links: HashMap::new(),
        }
    }

    /// Counters so far; histograms are only visible through [`Self::flush_stats`].
    pub fn stats(&self) -> OracleStats {
        self.stats
    }

    /// Road-network distance in meters.
    ///
    /// Table first; on miss, the engine when the road network is enabled,
    /// else the equirectangular approximation.
    pub fn get_distance(&mut self, origin: Coord, destination: Coord) -> Result<f64, OracleError> {
        let od = OdKey::new(origin, destination);
        if let Some(meters) = self.tables.distance(&od) {
            self.stats.distance_lookup += 1;
            return Ok(meters);
        }
        self.stats.distance_engine += 1;

        if !self.config.road_network_enabled {
            return Ok(equirectangular_distance_m(origin, destination));
        }
        let (meters, _) = self.engine_distance_duration(od, origin, destination)?;
        Ok(meters)
    }

    /// Road-network duration in seconds.
    ///
    /// Table first; on miss, the engine when enabled, else distance over the
    /// constant fallback speed (which itself prefers the distance table).
    pub fn get_duration(&mut self, origin: Coord, destination: Coord) -> Result<f64, OracleError> {
        let od = OdKey::new(origin, destination);
        if let Some(seconds) = self.tables.duration(&od) {
            self.stats.duration_lookup += 1;
            return Ok(seconds);
        }
        self.stats.duration_engine += 1;

        if !self.config.road_network_enabled {
            let meters = self.get_distance(origin, destination)?;
            return Ok(meters / self.config.constant_speed_mps);
        }
        let (_, seconds) = self.engine_distance_duration(od, origin, destination)?;
        Ok(seconds)
    }

    /// Distance and duration together.
    ///
    /// The tables answer only when BOTH hit for the pair; otherwise a single
    /// combined engine call answers both.
    pub fn get_distance_duration(
        &mut self,
        origin: Coord,
        destination: Coord,
    ) -> Result<(f64, f64), OracleError> {
        let od = OdKey::new(origin, destination);
        if let (Some(meters), Some(seconds)) = (self.tables.distance(&od), self.tables.duration(&od))
        {
            self.stats.both_lookup += 1;
            return Ok((meters, seconds));
        }
        self.stats.both_engine += 1;
        debug!("distance_duration falling through the lookup tables");

        if !self.config.road_network_enabled {
            let meters = equirectangular_distance_m(origin, destination);
            return Ok((meters, meters / self.config.constant_speed_mps));
        }
        self.engine_distance_duration(od, origin, destination)
    }

    /// Full first leg of the best route, with per-link congestion overrides.
    ///
    /// Every step's rounded (start, end) key is looked up in the congestion
    /// table; on a hit the free-flow step duration is replaced and the key
    /// recorded in the found histogram, otherwise the free-flow value stays
    /// and non-degenerate keys land in the unfound histogram. The leg's
    /// total duration is recomputed as the sum of step durations and checked
    /// against the running sum tracked during the override pass.
    pub fn get_routing(
        &mut self,
        origin: Coord,
        destination: Coord,
    ) -> Result<RouteLeg, OracleError> {
        let od = OdKey::new(origin, destination);
        if self.tables.distance(&od).is_some() {
            self.stats.routing_could_lookup += 1;
        } else {
            self.stats.routing_uses_engine += 1;
        }

        let mut leg = self.engine.route_leg(origin, destination)?;

        let mut tracked = 0.0;
        for step in &mut leg.steps {
            let key = LinkKey::new(step.start, step.end);
            match self.tables.congested_duration(&key) {
                Some(congested) => {
                    diagnostics::record_link_use(&mut self.found_links, key, step.distance_m);
                    step.duration_s = congested;
                    tracked += congested;
                }
                None => {
                    tracked += step.duration_s;
                    if !key.is_zero_length() {
                        diagnostics::record_link_use(&mut self.unfound_links, key, step.distance_m);
                    }
                }
            }
        }

        let recomputed: f64 = leg.steps.iter().map(|step| step.duration_s).sum();
        // Written so a NaN anywhere in the sums also fails the check.
        if !((recomputed - tracked).abs() <= 1e-6) {
            return Err(OracleError::InconsistentRoute { recomputed, tracked });
        }
        leg.duration_s = recomputed;
        Ok(leg)
    }

    /// Snapshot the counters and histograms, then reset them.
    pub fn flush_stats(&mut self) -> OracleReport {
        OracleReport::from_parts(
            std::mem::take(&mut self.stats),
            std::mem::take(&mut self.found_links),
            std::mem::take(&mut self.unfound_links),
        )
    }

    fn engine_distance_duration(
        &mut self,
        od: OdKey,
        origin: Coord,
        destination: Coord,
    ) -> Result<(f64, f64), OracleError> {
        if let Some(&answer) = self.engine_cache.get(&od) {
            return Ok(answer);
        }
        let answer = self.engine.distance_duration(origin, destination)?;
        self.engine_cache.put(od, answer);
        Ok(answer)
    }
}
