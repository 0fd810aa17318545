//! Result and diagnostics writers.
//!
//! Results append to a per-experiment CSV so repeated sweeps accumulate in
//! one file; the oracle diagnostics flush to a plain-text counters report
//! plus found/unfound congestion-key CSVs.

use std::error::Error;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use amod_core::equilibrium::IterationOutcome;
use amod_core::oracle::OracleReport;

use crate::runner::IterationRecord;

/// Append sweep results to `path`, writing the header only when the file is
/// created fresh.
pub fn append_results_csv(
    records: &[IterationRecord],
    path: impl AsRef<Path>,
) -> Result<(), Box<dyn Error>> {
    if records.is_empty() {
        return Err("no iteration records to export".into());
    }
    let path = path.as_ref();
    let write_header = !path.exists();
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(write_header)
        .from_writer(file);
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write one iteration's full per-record diversion table.
pub fn write_diversion_csv(
    outcome: &IterationOutcome,
    path: impl AsRef<Path>,
) -> Result<(), Box<dyn Error>> {
    let mut writer = csv::Writer::from_path(path.as_ref())?;
    writer.write_record([
        "m_id",
        "expansion_factor",
        "amod_probability",
        "amod_volume",
        "wait_time_s",
        "detour_factor",
        "logsum_with",
        "logsum_without",
        "diversion_car",
        "diversion_walk",
        "diversion_bike",
        "diversion_taxi",
        "diversion_bus",
        "diversion_rail",
        "diversion_intermodal",
    ])?;
    for row in &outcome.rows {
        let diversion = |pick: fn(&amod_core::mode_choice::DiversionShares) -> f64| {
            row.diversion
                .as_ref()
                .map(|shares| pick(shares).to_string())
                .unwrap_or_default()
        };
        writer.write_record([
            row.m_id.to_string(),
            row.expansion_factor.to_string(),
            row.amod_probability.to_string(),
            row.amod_volume.to_string(),
            row.wait_time_s.to_string(),
            row.detour_factor.to_string(),
            row.logsum_with.to_string(),
            row.logsum_without.to_string(),
            diversion(|s| s.car),
            diversion(|s| s.walk),
            diversion(|s| s.bike),
            diversion(|s| s.taxi),
            diversion(|s| s.bus),
            diversion(|s| s.rail),
            diversion(|s| s.park_ride),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Append the lookup-vs-engine counters as a plain-text report.
pub fn write_lookup_stats(
    report: &OracleReport,
    path: impl AsRef<Path>,
) -> Result<(), Box<dyn Error>> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path.as_ref())?;
    let stats = &report.stats;
    writeln!(file, "get_distance using lookup table: {}", stats.distance_lookup)?;
    writeln!(file, "get_duration using lookup table: {}", stats.duration_lookup)?;
    writeln!(
        file,
        "get_distance_duration using lookup table: {}",
        stats.both_lookup
    )?;
    writeln!(file, "get_distance using routing engine: {}", stats.distance_engine)?;
    writeln!(file, "get_duration using routing engine: {}", stats.duration_engine)?;
    writeln!(
        file,
        "get_distance_duration using routing engine: {}",
        stats.both_engine
    )?;
    writeln!(
        file,
        "get_routing that could use lookup table: {}",
        stats.routing_could_lookup
    )?;
    writeln!(
        file,
        "get_routing that can't use lookup table: {}",
        stats.routing_uses_engine
    )?;
    Ok(())
}

/// Write the congestion-key summary plus the found/unfound key CSVs.
///
/// Each key CSV row is `start_lng, start_lat, end_lng, end_lat, distance_m,
/// uses`.
pub fn write_key_stats(
    report: &OracleReport,
    summary_path: impl AsRef<Path>,
    found_path: impl AsRef<Path>,
    unfound_path: impl AsRef<Path>,
) -> Result<(), Box<dyn Error>> {
    write_key_csv(&report.found_links, found_path)?;
    write_key_csv(&report.unfound_links, unfound_path)?;

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(summary_path.as_ref())?;
    writeln!(
        file,
        "unique links with traffic data used: {}",
        report.found_links.len()
    )?;
    writeln!(
        file,
        "number of observations on links with traffic data: {}",
        report.total_found_uses()
    )?;
    writeln!(
        file,
        "unique links without traffic data used: {}",
        report.unfound_links.len()
    )?;
    writeln!(
        file,
        "number of observations on links without traffic data: {}",
        report.total_unfound_uses()
    )?;
    Ok(())
}

fn write_key_csv(
    links: &[(amod_core::coords::LinkKey, amod_core::oracle::LinkUse)],
    path: impl AsRef<Path>,
) -> Result<(), Box<dyn Error>> {
    let mut writer = csv::Writer::from_path(path.as_ref())?;
    writer.write_record([
        "start_lng",
        "start_lat",
        "end_lng",
        "end_lat",
        "distance_m",
        "uses",
    ])?;
    for (key, link_use) in links {
        let (slng, slat, elng, elat) = key.to_degrees();
        writer.write_record([
            slng.to_string(),
            slat.to_string(),
            elng.to_string(),
            elat.to_string(),
            link_use.distance_m.to_string(),
            link_use.uses.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use amod_core::oracle::{LookupTables, Oracle, OracleConfig, OracleStats};

    fn sample_records() -> Vec<IterationRecord> {
        vec![IterationRecord {
            fleet_size: 200,
            step: 0,
            total_volume: 12.5,
            logsum_with_amod: -140.0,
            logsum_without_amod: -141.0,
            welfare_gain: 1.0,
            mean_wait_s: 400.0,
            mean_detour: 1.25,
            diversion_car: -0.4,
            diversion_walk: -0.05,
            diversion_bike: -0.05,
            diversion_taxi: -0.1,
            diversion_bus: -0.2,
            diversion_rail: -0.15,
            diversion_intermodal: -0.05,
        }]
    }

    #[test]
    fn results_csv_appends_without_repeating_the_header() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("results.csv");

        append_results_csv(&sample_records(), &path).expect("first write");
        append_results_csv(&sample_records(), &path).expect("second write");

        let contents = std::fs::read_to_string(&path).expect("read");
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("fleet_size,step,total_volume"));
        assert_eq!(lines[1], lines[2]);
    }

    #[test]
    fn empty_results_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(append_results_csv(&[], dir.path().join("results.csv")).is_err());
    }

    #[test]
    fn lookup_stats_report_lists_all_counters() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("lookup-stats.txt");

        let report = OracleReport {
            stats: OracleStats {
                distance_lookup: 10,
                both_engine: 2,
                ..Default::default()
            },
            ..Default::default()
        };
        write_lookup_stats(&report, &path).expect("write");

        let contents = std::fs::read_to_string(&path).expect("read");
        assert!(contents.contains("get_distance using lookup table: 10"));
        assert!(contents.contains("get_distance_duration using routing engine: 2"));
        assert_eq!(contents.lines().count(), 8);
    }

    #[test]
    fn key_stats_write_summary_and_csvs() {
        use amod_core::coords::Coord;
        use amod_core::oracle::{RouteLeg, RouteStep, RoutingApi};

        // Drive a real oracle so the report carries both histograms.
        struct OneRoute(RouteLeg);
        impl RoutingApi for OneRoute {
            fn distance_duration(
                &mut self,
                _o: Coord,
                _d: Coord,
            ) -> Result<(f64, f64), amod_core::oracle::EngineError> {
                Ok((0.0, 0.0))
            }
            fn route_leg(
                &mut self,
                _o: Coord,
                _d: Coord,
            ) -> Result<RouteLeg, amod_core::oracle::EngineError> {
                Ok(self.0.clone())
            }
        }

        let a = Coord::new(-0.02, 51.29);
        let mid = Coord::new(0.01, 51.33);
        let b = Coord::new(0.18, 51.44);
        let leg = RouteLeg {
            distance_m: 700.0,
            duration_s: 70.0,
            steps: vec![
                RouteStep {
                    distance_m: 300.0,
                    duration_s: 30.0,
                    start: a,
                    end: mid,
                },
                RouteStep {
                    distance_m: 400.0,
                    duration_s: 40.0,
                    start: mid,
                    end: b,
                },
            ],
        };
        let mut tables = LookupTables::new();
        tables.insert_link_congestion(a, mid, 45.0);
        let mut oracle = Oracle::new(tables, Box::new(OneRoute(leg)), OracleConfig::default());
        oracle.get_routing(a, b).expect("route");
        let report = oracle.flush_stats();

        let dir = tempfile::tempdir().expect("tempdir");
        let summary = dir.path().join("key-stats.txt");
        let found = dir.path().join("found-keys.csv");
        let unfound = dir.path().join("unfound-keys.csv");
        write_key_stats(&report, &summary, &found, &unfound).expect("write");

        let summary = std::fs::read_to_string(summary).expect("read summary");
        assert!(summary.contains("unique links with traffic data used: 1"));
        assert!(summary.contains("unique links without traffic data used: 1"));

        let found = std::fs::read_to_string(found).expect("read found");
        let mut lines = found.lines();
        assert_eq!(
            lines.next().unwrap(),
            "start_lng,start_lat,end_lng,end_lat,distance_m,uses"
        );
        let row: Vec<_> = lines.next().unwrap().split(',').collect();
        assert_eq!(row[0], "-0.02");
        assert_eq!(row[4], "300");
        assert_eq!(row[5], "1");
    }
}
