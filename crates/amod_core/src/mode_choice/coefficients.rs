//! Estimated coefficients of the nested-logit model.
//!
//! These are fixed inputs from a prior estimation, not fitted here. Travel
//! times enter the utilities in 10-minute units and costs in pounds.

use serde::{Deserialize, Serialize};

/// Seconds per utility time unit (times enter as `t / 600`).
pub const TT_UNIT_S: f64 = 600.0;

/// Alternative-specific constants and attribute weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceCoefficients {
    pub asc_car: f64,
    pub asc_bike: f64,
    pub asc_taxi: f64,
    pub asc_bus: f64,
    pub asc_rail: f64,
    pub asc_park_ride: f64,
    /// The policy lever varied between experiments.
    pub asc_amod: f64,

    pub beta_car_tt: f64,
    pub beta_walk_tt: f64,
    pub beta_bike_tt: f64,
    pub beta_taxi_tt: f64,
    pub beta_bus_tt: f64,
    pub beta_rail_tt: f64,
    pub beta_park_ride_tt: f64,

    pub beta_cost: f64,
    pub beta_car_ownership: f64,
    pub beta_taxi_dist: f64,
    pub beta_transit_transfers: f64,
    pub beta_transit_walk_tt: f64,

    /// Dissimilarity (scale) parameter of the transit nest.
    pub mu_transit: f64,

    pub beta_amod_car_tt: f64,
    pub beta_amod_pt_tt: f64,
    pub beta_amod_cost: f64,
}

impl Default for ChoiceCoefficients {
    fn default() -> Self {
        Self {
            asc_car: -2.35,
            asc_bike: -5.01,
            asc_taxi: -5.81,
            asc_bus: -2.87,
            asc_rail: -3.14,
            asc_park_ride: -3.58,
            asc_amod: -3.5,

            beta_car_tt: -1.04,
            beta_walk_tt: -1.21,
            beta_bike_tt: -1.07,
            beta_taxi_tt: -1.83,
            beta_bus_tt: -0.37,
            beta_rail_tt: -0.362,
            beta_park_ride_tt: -0.277,

            beta_cost: -0.144,
            beta_car_ownership: 0.751,
            beta_taxi_dist: 0.439,
            beta_transit_transfers: -0.452,
            beta_transit_walk_tt: -0.536,

            mu_transit: 3.23,

            beta_amod_car_tt: -0.37,
            beta_amod_pt_tt: -0.362,
            beta_amod_cost: -0.144,
        }
    }
}

impl ChoiceCoefficients {
    pub fn with_amod_asc(mut self, asc: f64) -> Self {
        self.asc_amod = asc;
        self
    }
}
