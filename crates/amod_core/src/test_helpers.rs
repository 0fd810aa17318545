//! Shared fixtures for tests, benches and examples.
//!
//! Gated behind the default-on `test-helpers` feature so downstream test
//! code and benches can build realistic records without repeating thirty
//! field assignments.

use crate::mode_choice::TripRecord;

/// A CBD-bound trip with every mode available: a ~7 km drive, slow walk,
/// competitive rail, and an AMoD connector leg onto rail.
pub fn sample_cbd_trip() -> TripRecord {
    TripRecord {
        car_time_s: 1_500.0,
        car_dist_m: 7_200.0,
        walk_time_s: 5_400.0,
        bike_time_s: 2_100.0,
        num_cars: 1.0,
        parking_fare: 4.0,
        congestion_charged: true,

        bus_time_s: 2_700.0,
        bus_walk_time_s: 600.0,
        bus_fare: 1.65,
        bus_transfers: 1.0,
        bus_available: true,

        rail_time_s: 1_900.0,
        rail_walk_time_s: 480.0,
        rail_fare: 3.1,
        rail_transfers: 0.0,
        rail_available: true,

        park_ride_time_s: 2_200.0,
        park_ride_walk_time_s: 360.0,
        park_ride_fare: 4.4,
        park_ride_transfers: 1.0,
        park_ride_available: true,

        amod_time_s: 480.0,
        amod_dist_m: 2_400.0,
        amod_pt_time_s: 1_400.0,
        amod_steps: 3.0,

        expansion_factor: 12.5,
    }
}

/// A short intrazonal trip: bus is the only transit option and the AMoD
/// service competes door to door.
pub fn sample_intrazonal_trip() -> TripRecord {
    TripRecord {
        car_time_s: 600.0,
        car_dist_m: 2_800.0,
        walk_time_s: 2_400.0,
        bike_time_s: 900.0,
        num_cars: 0.0,
        parking_fare: 0.0,
        congestion_charged: false,

        bus_time_s: 1_300.0,
        bus_walk_time_s: 420.0,
        bus_fare: 1.65,
        bus_transfers: 0.0,
        bus_available: true,

        rail_time_s: 0.0,
        rail_walk_time_s: 0.0,
        rail_fare: 0.0,
        rail_transfers: 0.0,
        rail_available: false,

        park_ride_time_s: 0.0,
        park_ride_walk_time_s: 0.0,
        park_ride_fare: 0.0,
        park_ride_transfers: 0.0,
        park_ride_available: false,

        amod_time_s: 0.0,
        amod_dist_m: 0.0,
        amod_pt_time_s: 0.0,
        amod_steps: 0.0,

        expansion_factor: 8.0,
    }
}
