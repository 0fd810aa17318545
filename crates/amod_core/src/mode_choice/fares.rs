//! Taxi and AMoD fare schedules, plus the car cost constants.

use serde::{Deserialize, Serialize};

pub const KM_PER_MILE: f64 = 1.609344;

/// Fares are quoted in dollars; utilities take pounds.
pub const CURRENCY_PER_POUND: f64 = 1.33;

/// Taxi flag-fall in pounds.
pub const TAXI_FLAG_FALL: f64 = 2.6;

/// Metered taxi bands: (band width in km, rate per mile within the band).
/// The last band is open-ended.
const TAXI_BANDS: [(f64, f64); 5] = [
    (1.0, 5.1),
    (1.0, 4.1),
    (2.0, 3.85),
    (2.0, 4.0),
    (f64::INFINITY, 4.0),
];

/// Taxi wait penalty in utility time units (3 minutes).
pub const TAXI_WAIT_UNITS: f64 = 0.3;

/// Car running cost per km in pounds (fuel price over fleet-average economy).
pub const CAR_FUEL_COST_PER_KM: f64 = 5.2416 / 76.165;

/// Daily congestion charge in pounds, applied when the trip crosses the zone.
pub const CONGESTION_CHARGE: f64 = 11.5;

/// Metered taxi fare in pounds for a trip of `distance_m` meters.
///
/// Flag-fall plus banded per-mile rates, piecewise linear in distance:
/// continuous at every band boundary and monotone non-decreasing.
pub fn taxi_fare(distance_m: f64) -> f64 {
    let mut remaining_km = (distance_m / 1000.0).max(0.0);
    let mut metered = 0.0;
    for (width_km, rate_per_mile) in TAXI_BANDS {
        let in_band = remaining_km.min(width_km);
        metered += rate_per_mile * in_band;
        remaining_km -= in_band;
        if remaining_km <= 0.0 {
            break;
        }
    }
    TAXI_FLAG_FALL + metered / KM_PER_MILE
}

/// AMoD fare schedule in dollars; conversion to pounds happens at quote time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FarePolicy {
    /// Per-trip base.
    pub base: f64,
    pub per_minute: f64,
    pub per_km: f64,
    /// Multiplier reflecting shared rides (0.75 = 25% off).
    pub sharing_discount: f64,
    /// Rebate for trips connecting to transit, in dollars.
    pub connection_discount: f64,
    /// Fare floor in dollars, applied before the connection rebate.
    pub min_fare: f64,
}

impl Default for FarePolicy {
    fn default() -> Self {
        Self {
            base: 0.831,
            per_minute: 0.111,
            per_km: 0.547,
            sharing_discount: 0.75,
            connection_discount: 1.33,
            min_fare: 1.73,
        }
    }
}

impl FarePolicy {
    /// Scale the metered components only; discounts and the floor stay put.
    pub fn with_multiplier(&self, multiplier: f64) -> Self {
        Self {
            base: self.base * multiplier,
            per_minute: self.per_minute * multiplier,
            per_km: self.per_km * multiplier,
            ..self.clone()
        }
    }

    /// Metered AMoD fare in pounds: shared-ride discounted, floored at the
    /// minimum fare.
    pub fn amod_fare_pounds(&self, time_s: f64, distance_m: f64) -> f64 {
        let metered = (self.base + self.per_minute * time_s / 60.0 + self.per_km * distance_m / 1000.0)
            * self.sharing_discount
            / CURRENCY_PER_POUND;
        metered.max(self.min_fare / CURRENCY_PER_POUND)
    }

    /// Transit-connection rebate in pounds.
    pub fn connection_discount_pounds(&self) -> f64 {
        self.connection_discount / CURRENCY_PER_POUND
    }
}
