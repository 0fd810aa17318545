//! Named trip-purpose segments and their record-id ranges.
//!
//! Each segment names its trip purpose, its CSV source and the half-open
//! `m_id` range its rows occupy. Ranges are validated to be contiguous from
//! zero and non-overlapping, so segment membership is explicit schema
//! instead of implicit row position.

use std::ops::Range;
use std::path::{Path, PathBuf};

use crate::mode_choice::TripPurpose;

/// One segment of the trip table.
#[derive(Debug, Clone)]
pub struct SegmentSpec {
    pub purpose: TripPurpose,
    pub path: PathBuf,
    pub records: Range<usize>,
}

/// Schema validation failures.
#[derive(Debug, PartialEq, Eq)]
pub enum SchemaError {
    NoSegments,
    /// Segments must start at record 0 and tile the id space without gaps.
    NotContiguous {
        segment: &'static str,
        expected_start: usize,
        actual_start: usize,
    },
    EmptySegment(&'static str),
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaError::NoSegments => write!(f, "segment schema is empty"),
            SchemaError::NotContiguous {
                segment,
                expected_start,
                actual_start,
            } => write!(
                f,
                "segment {} starts at record {}, expected {}",
                segment, actual_start, expected_start
            ),
            SchemaError::EmptySegment(segment) => {
                write!(f, "segment {} covers no records", segment)
            }
        }
    }
}

impl std::error::Error for SchemaError {}

/// Validated, ordered collection of segments covering the whole record space.
#[derive(Debug, Clone)]
pub struct SegmentSchema {
    segments: Vec<SegmentSpec>,
}

impl SegmentSchema {
    pub fn new(segments: Vec<SegmentSpec>) -> Result<Self, SchemaError> {
        if segments.is_empty() {
            return Err(SchemaError::NoSegments);
        }
        let mut expected_start = 0;
        for segment in &segments {
            if segment.records.is_empty() {
                return Err(SchemaError::EmptySegment(segment.purpose.label()));
            }
            if segment.records.start != expected_start {
                return Err(SchemaError::NotContiguous {
                    segment: segment.purpose.label(),
                    expected_start,
                    actual_start: segment.records.start,
                });
            }
            expected_start = segment.records.end;
        }
        Ok(Self { segments })
    }

    /// The four-segment layout of the reference dataset, resolved against a
    /// data directory.
    pub fn reference_layout(data_dir: impl AsRef<Path>) -> Self {
        let dir = data_dir.as_ref();
        let segments = vec![
            SegmentSpec {
                purpose: TripPurpose::Cbd,
                path: dir.join("cbd_trips.csv"),
                records: 0..174,
            },
            SegmentSpec {
                purpose: TripPurpose::IntrazonalBus,
                path: dir.join("intrazonal_bus_trips.csv"),
                records: 174..244,
            },
            SegmentSpec {
                purpose: TripPurpose::IntrazonalRail,
                path: dir.join("intrazonal_rail_trips.csv"),
                records: 244..770,
            },
            SegmentSpec {
                purpose: TripPurpose::IntrazonalOther,
                path: dir.join("intrazonal_other_trips.csv"),
                records: 770..1057,
            },
        ];
        Self::new(segments).expect("reference layout is well formed")
    }

    /// Total number of OD records across all segments.
    pub fn record_count(&self) -> usize {
        self.segments
            .last()
            .map(|segment| segment.records.end)
            .unwrap_or(0)
    }

    pub fn segments(&self) -> &[SegmentSpec] {
        &self.segments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(purpose: TripPurpose, records: Range<usize>) -> SegmentSpec {
        SegmentSpec {
            purpose,
            path: PathBuf::from("unused.csv"),
            records,
        }
    }

    #[test]
    fn reference_layout_covers_the_full_record_space() {
        let schema = SegmentSchema::reference_layout("data");
        assert_eq!(schema.record_count(), 1057);
        assert_eq!(schema.segments().len(), 4);
    }

    #[test]
    fn gap_between_segments_is_rejected() {
        let err = SegmentSchema::new(vec![
            spec(TripPurpose::Cbd, 0..10),
            spec(TripPurpose::IntrazonalBus, 12..20),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            SchemaError::NotContiguous {
                segment: "intrazonal-bus",
                expected_start: 10,
                actual_start: 12,
            }
        );
    }

    #[test]
    fn overlap_is_rejected() {
        let err = SegmentSchema::new(vec![
            spec(TripPurpose::Cbd, 0..10),
            spec(TripPurpose::IntrazonalBus, 8..20),
        ])
        .unwrap_err();
        assert!(matches!(err, SchemaError::NotContiguous { .. }));
    }

    #[test]
    fn empty_schema_and_empty_segments_are_rejected() {
        assert_eq!(
            SegmentSchema::new(Vec::new()).unwrap_err(),
            SchemaError::NoSegments
        );
        let err = SegmentSchema::new(vec![spec(TripPurpose::Cbd, 0..0)]).unwrap_err();
        assert_eq!(err, SchemaError::EmptySegment("cbd"));
    }
}
