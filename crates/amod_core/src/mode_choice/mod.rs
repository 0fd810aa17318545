//! Nested-logit mode choice.
//!
//! Pure functions from one trip's attributes plus the current AMoD service
//! level to choice probabilities, welfare logsums and diversion shares.
//!
//! The model is a two-level nested logit: car, walk, bike and taxi compete
//! at the top level against a transit nest pooling bus, rail, park-and-ride
//! and the AMoD service under a single dissimilarity parameter. A parallel
//! evaluation without AMoD in the nest yields the baseline the diversion
//! shares are measured against.

mod coefficients;
mod fares;
mod nest;

pub use coefficients::{ChoiceCoefficients, TT_UNIT_S};
pub use fares::{
    taxi_fare, FarePolicy, CAR_FUEL_COST_PER_KM, CONGESTION_CHARGE, CURRENCY_PER_POUND,
    KM_PER_MILE, TAXI_FLAG_FALL, TAXI_WAIT_UNITS,
};
pub use nest::{inclusive_value, ModeUtility};

use serde::{Deserialize, Serialize};

use crate::service_level::ServiceLevel;

/// Serde helper: 0/1 CSV flags as booleans.
mod flag {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(flag: &bool, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_u8(u8::from(*flag))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<bool, D::Error> {
        Ok(u8::deserialize(de)? != 0)
    }
}

/// The eight travel modes of the choice set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Mode {
    Car,
    Walk,
    Bike,
    Taxi,
    Bus,
    Rail,
    ParkRide,
    Amod,
}

impl Mode {
    pub const ALL: [Mode; 8] = [
        Mode::Car,
        Mode::Walk,
        Mode::Bike,
        Mode::Taxi,
        Mode::Bus,
        Mode::Rail,
        Mode::ParkRide,
        Mode::Amod,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Mode::Car => "car",
            Mode::Walk => "walk",
            Mode::Bike => "bike",
            Mode::Taxi => "taxi",
            Mode::Bus => "bus",
            Mode::Rail => "rail",
            Mode::ParkRide => "intermodal",
            Mode::Amod => "amod",
        }
    }
}

/// Trip-purpose segment. CBD trips use the AMoD service as a transit
/// connector; intrazonal trips use it door to door.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TripPurpose {
    Cbd,
    IntrazonalBus,
    IntrazonalRail,
    IntrazonalOther,
}

impl TripPurpose {
    pub fn is_intrazonal(self) -> bool {
        !matches!(self, TripPurpose::Cbd)
    }

    pub fn label(self) -> &'static str {
        match self {
            TripPurpose::Cbd => "cbd",
            TripPurpose::IntrazonalBus => "intrazonal-bus",
            TripPurpose::IntrazonalRail => "intrazonal-rail",
            TripPurpose::IntrazonalOther => "intrazonal-other",
        }
    }
}

/// One OD record's trip attributes.
///
/// Times are seconds, distances meters, money pounds unless noted. The
/// `*_available` flags mask transit sub-modes; car, walk, bike and taxi are
/// always present. `expansion_factor` is the population weight applied to
/// volumes and logsums.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRecord {
    pub car_time_s: f64,
    pub car_dist_m: f64,
    pub walk_time_s: f64,
    pub bike_time_s: f64,
    /// Household car ownership count.
    pub num_cars: f64,
    pub parking_fare: f64,
    #[serde(with = "flag")]
    pub congestion_charged: bool,

    pub bus_time_s: f64,
    pub bus_walk_time_s: f64,
    pub bus_fare: f64,
    pub bus_transfers: f64,
    #[serde(with = "flag")]
    pub bus_available: bool,

    pub rail_time_s: f64,
    pub rail_walk_time_s: f64,
    pub rail_fare: f64,
    pub rail_transfers: f64,
    #[serde(with = "flag")]
    pub rail_available: bool,

    pub park_ride_time_s: f64,
    pub park_ride_walk_time_s: f64,
    pub park_ride_fare: f64,
    pub park_ride_transfers: f64,
    #[serde(with = "flag")]
    pub park_ride_available: bool,

    /// AMoD leg time/distance for CBD trips (the connector leg).
    pub amod_time_s: f64,
    pub amod_dist_m: f64,
    /// Transit in-vehicle time after the AMoD connection (CBD only).
    pub amod_pt_time_s: f64,
    /// Journey step count of the combined AMoD+transit trip (CBD only).
    pub amod_steps: f64,

    pub expansion_factor: f64,
}

/// Choice probabilities per mode. Sums to 1 over the full alternative set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ModeShares {
    pub car: f64,
    pub walk: f64,
    pub bike: f64,
    pub taxi: f64,
    pub bus: f64,
    pub rail: f64,
    pub park_ride: f64,
    pub amod: f64,
}

impl ModeShares {
    pub fn sum(&self) -> f64 {
        self.car + self.walk + self.bike + self.taxi + self.bus + self.rail + self.park_ride
            + self.amod
    }

    pub fn get(&self, mode: Mode) -> f64 {
        match mode {
            Mode::Car => self.car,
            Mode::Walk => self.walk,
            Mode::Bike => self.bike,
            Mode::Taxi => self.taxi,
            Mode::Bus => self.bus,
            Mode::Rail => self.rail,
            Mode::ParkRide => self.park_ride,
            Mode::Amod => self.amod,
        }
    }
}

/// Share of AMoD demand drawn from each competing mode:
/// `(P_k(with) − P_k(without)) / P_AMoD`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DiversionShares {
    pub car: f64,
    pub walk: f64,
    pub bike: f64,
    pub taxi: f64,
    pub bus: f64,
    pub rail: f64,
    pub park_ride: f64,
}

/// Everything the equilibration loop needs from one trip evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChoiceOutcome {
    pub shares: ModeShares,
    /// Probabilities with AMoD stripped from the nest; its `amod` field is 0.
    pub baseline: ModeShares,
    /// `ln(denominator) · expansion_factor`, with AMoD offered.
    pub logsum_with: f64,
    pub logsum_without: f64,
    /// The raw choice volume, `P_AMoD · expansion_factor`.
    pub amod_volume: f64,
    /// `None` when `P_AMoD` is zero; the ratio is undefined there.
    pub diversion: Option<DiversionShares>,
}

/// Errors from a single trip evaluation.
#[derive(Debug)]
pub enum ChoiceError {
    /// A linear utility came out NaN or infinite; bad input data.
    NonFiniteUtility { mode: Mode, value: f64 },
    /// The choice-set denominator is zero or non-finite.
    DegenerateDenominator { value: f64 },
}

impl std::fmt::Display for ChoiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChoiceError::NonFiniteUtility { mode, value } => {
                write!(f, "non-finite {} utility: {}", mode.label(), value)
            }
            ChoiceError::DegenerateDenominator { value } => {
                write!(f, "degenerate choice denominator: {}", value)
            }
        }
    }
}

impl std::error::Error for ChoiceError {}

/// Linear utilities of the full alternative set for one trip.
struct Utilities {
    car: f64,
    walk: f64,
    bike: f64,
    taxi: f64,
    bus: ModeUtility,
    rail: ModeUtility,
    park_ride: ModeUtility,
    amod: f64,
}

fn linear_utilities(
    purpose: TripPurpose,
    trip: &TripRecord,
    level: ServiceLevel,
    c: &ChoiceCoefficients,
    fares: &FarePolicy,
) -> Utilities {
    let tt = |seconds: f64| seconds / TT_UNIT_S;

    let car_cost = trip.parking_fare
        + trip.car_dist_m / 1000.0 * CAR_FUEL_COST_PER_KM
        + if trip.congestion_charged {
            CONGESTION_CHARGE
        } else {
            0.0
        };
    let car = c.asc_car
        + c.beta_car_tt * tt(trip.car_time_s)
        + c.beta_car_ownership * trip.num_cars
        + c.beta_cost * car_cost;

    let walk = c.beta_walk_tt * tt(trip.walk_time_s);
    let bike = c.asc_bike + c.beta_bike_tt * tt(trip.bike_time_s);

    let taxi = c.asc_taxi
        + c.beta_taxi_tt * (tt(trip.car_time_s) + TAXI_WAIT_UNITS)
        + c.beta_taxi_dist * trip.car_dist_m / 1000.0
        + c.beta_cost * taxi_fare(trip.car_dist_m);

    let bus = ModeUtility::available_if(
        trip.bus_available,
        c.asc_bus
            + c.beta_bus_tt * tt(trip.bus_time_s - trip.bus_walk_time_s)
            + c.beta_cost * trip.bus_fare
            + c.beta_transit_transfers * trip.bus_transfers
            + c.beta_transit_walk_tt * tt(trip.bus_walk_time_s),
    );

    let rail = ModeUtility::available_if(
        trip.rail_available,
        c.asc_rail
            + c.beta_rail_tt * tt(trip.rail_time_s - trip.rail_walk_time_s)
            + c.beta_cost * trip.rail_fare
            + c.beta_transit_transfers * trip.rail_transfers
            + c.beta_transit_walk_tt * tt(trip.rail_walk_time_s),
    );

    // The extra transfer onto the connecting car leg is counted explicitly.
    let park_ride = ModeUtility::available_if(
        trip.park_ride_available,
        c.asc_park_ride
            + c.beta_park_ride_tt * tt(trip.park_ride_time_s - trip.park_ride_walk_time_s)
            + c.beta_cost * trip.park_ride_fare
            + c.beta_transit_transfers * (trip.park_ride_transfers + 1.0)
            + c.beta_transit_walk_tt * tt(trip.park_ride_walk_time_s),
    );

    let amod = match purpose {
        TripPurpose::Cbd => {
            let cost = fares.amod_fare_pounds(trip.amod_time_s, trip.amod_dist_m)
                - fares.connection_discount_pounds()
                + trip.rail_fare;
            c.asc_amod
                + c.beta_amod_car_tt
                    * (level.detour_factor * tt(trip.amod_time_s) + tt(level.wait_time_s))
                + c.beta_amod_pt_tt * tt(trip.amod_pt_time_s)
                + c.beta_transit_transfers * trip.amod_steps
                + c.beta_amod_cost * cost
        }
        _ => {
            // Door-to-door service: the AV leg is the car trip itself.
            let cost = fares.amod_fare_pounds(trip.car_time_s, trip.car_dist_m);
            c.asc_amod
                + c.beta_amod_car_tt
                    * (level.detour_factor * tt(trip.car_time_s) + tt(level.wait_time_s))
                + c.beta_amod_cost * cost
        }
    };

    Utilities {
        car,
        walk,
        bike,
        taxi,
        bus,
        rail,
        park_ride,
        amod,
    }
}

fn ensure_finite(mode: Mode, utility: ModeUtility) -> Result<(), ChoiceError> {
    if let Some(value) = utility.linear() {
        if !value.is_finite() {
            return Err(ChoiceError::NonFiniteUtility { mode, value });
        }
    }
    Ok(())
}

/// Evaluate the nested-logit model for one trip.
///
/// Returns probabilities over the full alternative set, the without-AMoD
/// baseline, both welfare logsums and the guarded diversion shares.
pub fn evaluate_trip(
    purpose: TripPurpose,
    trip: &TripRecord,
    level: ServiceLevel,
    coefficients: &ChoiceCoefficients,
    fares: &FarePolicy,
) -> Result<ChoiceOutcome, ChoiceError> {
    let u = linear_utilities(purpose, trip, level, coefficients, fares);

    ensure_finite(Mode::Car, ModeUtility::Available(u.car))?;
    ensure_finite(Mode::Walk, ModeUtility::Available(u.walk))?;
    ensure_finite(Mode::Bike, ModeUtility::Available(u.bike))?;
    ensure_finite(Mode::Taxi, ModeUtility::Available(u.taxi))?;
    ensure_finite(Mode::Bus, u.bus)?;
    ensure_finite(Mode::Rail, u.rail)?;
    ensure_finite(Mode::ParkRide, u.park_ride)?;
    ensure_finite(Mode::Amod, ModeUtility::Available(u.amod))?;

    let mu = coefficients.mu_transit;

    let exp_car = u.car.exp();
    let exp_walk = u.walk.exp();
    let exp_bike = u.bike.exp();
    let exp_taxi = u.taxi.exp();
    let exp_bus = u.bus.exp_scaled(mu);
    let exp_rail = u.rail.exp_scaled(mu);
    let exp_park_ride = u.park_ride.exp_scaled(mu);
    let exp_amod = (mu * u.amod).exp();

    let top_level = exp_car + exp_walk + exp_bike + exp_taxi;

    let nest_with = exp_bus + exp_rail + exp_park_ride + exp_amod;
    let inclusive_with = inclusive_value(nest_with, mu);
    let denom_with = inclusive_with + top_level;

    let nest_without = exp_bus + exp_rail + exp_park_ride;
    let inclusive_without = inclusive_value(nest_without, mu);
    let denom_without = inclusive_without + top_level;

    for denom in [denom_with, denom_without] {
        if !denom.is_finite() || denom <= 0.0 {
            return Err(ChoiceError::DegenerateDenominator { value: denom });
        }
    }

    let nested_with = |exp_m: f64| {
        if nest_with > 0.0 {
            inclusive_with / denom_with * exp_m / nest_with
        } else {
            0.0
        }
    };
    let shares = ModeShares {
        car: exp_car / denom_with,
        walk: exp_walk / denom_with,
        bike: exp_bike / denom_with,
        taxi: exp_taxi / denom_with,
        bus: nested_with(exp_bus),
        rail: nested_with(exp_rail),
        park_ride: nested_with(exp_park_ride),
        amod: nested_with(exp_amod),
    };

    let nested_without = |exp_m: f64| {
        if nest_without > 0.0 {
            inclusive_without / denom_without * exp_m / nest_without
        } else {
            0.0
        }
    };
    let baseline = ModeShares {
        car: exp_car / denom_without,
        walk: exp_walk / denom_without,
        bike: exp_bike / denom_without,
        taxi: exp_taxi / denom_without,
        bus: nested_without(exp_bus),
        rail: nested_without(exp_rail),
        park_ride: nested_without(exp_park_ride),
        amod: 0.0,
    };

    let diversion = if shares.amod > 0.0 {
        Some(DiversionShares {
            car: (shares.car - baseline.car) / shares.amod,
            walk: (shares.walk - baseline.walk) / shares.amod,
            bike: (shares.bike - baseline.bike) / shares.amod,
            taxi: (shares.taxi - baseline.taxi) / shares.amod,
            bus: (shares.bus - baseline.bus) / shares.amod,
            rail: (shares.rail - baseline.rail) / shares.amod,
            park_ride: (shares.park_ride - baseline.park_ride) / shares.amod,
        })
    } else {
        None
    };

    Ok(ChoiceOutcome {
        shares,
        baseline,
        logsum_with: denom_with.ln() * trip.expansion_factor,
        logsum_without: denom_without.ln() * trip.expansion_factor,
        amod_volume: shares.amod * trip.expansion_factor,
        diversion,
    })
}
