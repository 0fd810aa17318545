use amod_core::mode_choice::{
    evaluate_trip, ChoiceCoefficients, FarePolicy, TripPurpose, TripRecord,
};
use amod_core::service_level::ServiceLevel;
use approx::assert_relative_eq;

/// A record where everything except driving is out of reach: transit masked,
/// walk/bike/taxi/AMoD utilities pushed far enough that their exponentiated
/// values underflow to exactly zero while the car's stays positive.
fn car_only_trip() -> TripRecord {
    TripRecord {
        car_time_s: 250_000.0,
        car_dist_m: 1_000.0,
        walk_time_s: 450_000.0,
        bike_time_s: 420_000.0,
        num_cars: 1.0,
        parking_fare: 0.0,
        congestion_charged: false,

        bus_time_s: 0.0,
        bus_walk_time_s: 0.0,
        bus_fare: 0.0,
        bus_transfers: 0.0,
        bus_available: false,

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

        expansion_factor: 10.0,
    }
}

#[test]
fn car_only_choice_set_gives_the_car_everything() {
    let coefficients = ChoiceCoefficients::default();
    let fares = FarePolicy::default();
    let level = ServiceLevel {
        wait_time_s: 1.0e6,
        detour_factor: 1.25,
    };

    let outcome = evaluate_trip(
        TripPurpose::IntrazonalOther,
        &car_only_trip(),
        level,
        &coefficients,
        &fares,
    )
    .expect("evaluate");

    assert_eq!(outcome.shares.car, 1.0);
    assert_eq!(outcome.shares.walk, 0.0);
    assert_eq!(outcome.shares.bike, 0.0);
    assert_eq!(outcome.shares.taxi, 0.0);
    assert_eq!(outcome.shares.bus, 0.0);
    assert_eq!(outcome.shares.rail, 0.0);
    assert_eq!(outcome.shares.park_ride, 0.0);
    assert_eq!(outcome.shares.amod, 0.0);

    // With exp(u_car) the whole denominator, the logsum collapses to
    // ln(exp(u_car)) = u_car, weighted by the expansion factor.
    let trip = car_only_trip();
    let tt = trip.car_time_s / 600.0;
    let car_cost = trip.car_dist_m / 1000.0 * amod_core::mode_choice::CAR_FUEL_COST_PER_KM;
    let u_car = coefficients.asc_car
        + coefficients.beta_car_tt * tt
        + coefficients.beta_car_ownership * trip.num_cars
        + coefficients.beta_cost * car_cost;
    assert_relative_eq!(
        outcome.logsum_with,
        u_car * trip.expansion_factor,
        epsilon = 1e-6
    );
    assert_relative_eq!(outcome.logsum_with, outcome.logsum_without, epsilon = 1e-9);
    assert!(outcome.diversion.is_none());
}

#[test]
fn probability_sums_hold_across_purposes_and_service_levels() {
    let coefficients = ChoiceCoefficients::default();
    let fares = FarePolicy::default();
    let cbd = amod_core::test_helpers::sample_cbd_trip();
    let intra = amod_core::test_helpers::sample_intrazonal_trip();

    for (purpose, trip) in [
        (TripPurpose::Cbd, &cbd),
        (TripPurpose::IntrazonalBus, &intra),
        (TripPurpose::IntrazonalRail, &intra),
        (TripPurpose::IntrazonalOther, &intra),
    ] {
        for wait in [60.0, 400.0, 1_200.0] {
            for detour in [1.0, 1.25, 1.5] {
                let outcome = evaluate_trip(
                    purpose,
                    trip,
                    ServiceLevel {
                        wait_time_s: wait,
                        detour_factor: detour,
                    },
                    &coefficients,
                    &fares,
                )
                .expect("evaluate");
                assert_relative_eq!(outcome.shares.sum(), 1.0, epsilon = 1e-9);
                assert_relative_eq!(outcome.baseline.sum(), 1.0, epsilon = 1e-9);
            }
        }
    }
}

#[test]
fn lowering_the_amod_asc_shrinks_its_share() {
    let fares = FarePolicy::default();
    let trip = amod_core::test_helpers::sample_cbd_trip();
    let level = ServiceLevel::default();

    let base = evaluate_trip(
        TripPurpose::Cbd,
        &trip,
        level,
        &ChoiceCoefficients::default(),
        &fares,
    )
    .expect("evaluate");
    let discouraged = evaluate_trip(
        TripPurpose::Cbd,
        &trip,
        level,
        &ChoiceCoefficients::default().with_amod_asc(-6.0),
        &fares,
    )
    .expect("evaluate");

    assert!(discouraged.shares.amod < base.shares.amod);
    // The baseline is untouched by the AMoD constant.
    assert_relative_eq!(
        discouraged.baseline.car,
        base.baseline.car,
        epsilon = 1e-12
    );
}
