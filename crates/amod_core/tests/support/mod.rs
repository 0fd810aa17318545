//! Shared test support: a counting mock routing engine.

use std::cell::Cell;
use std::rc::Rc;

use amod_core::coords::Coord;
use amod_core::oracle::{EngineError, RouteLeg, RouteStep, RoutingApi};

/// Mock engine with canned answers and externally readable call counters.
pub struct MockEngine {
    pub od_calls: Rc<Cell<usize>>,
    pub route_calls: Rc<Cell<usize>>,
    pub distance_m: f64,
    pub duration_s: f64,
    pub leg: Option<RouteLeg>,
}

impl MockEngine {
    pub fn new(distance_m: f64, duration_s: f64) -> Self {
        Self {
            od_calls: Rc::new(Cell::new(0)),
            route_calls: Rc::new(Cell::new(0)),
            distance_m,
            duration_s,
            leg: None,
        }
    }

    pub fn with_leg(mut self, leg: RouteLeg) -> Self {
        self.leg = Some(leg);
        self
    }

    /// Handles onto the counters, kept after the engine is boxed away.
    pub fn counters(&self) -> (Rc<Cell<usize>>, Rc<Cell<usize>>) {
        (Rc::clone(&self.od_calls), Rc::clone(&self.route_calls))
    }
}

impl RoutingApi for MockEngine {
    fn distance_duration(
        &mut self,
        _origin: Coord,
        _destination: Coord,
    ) -> Result<(f64, f64), EngineError> {
        self.od_calls.set(self.od_calls.get() + 1);
        Ok((self.distance_m, self.duration_s))
    }

    fn route_leg(&mut self, _origin: Coord, _destination: Coord) -> Result<RouteLeg, EngineError> {
        self.route_calls.set(self.route_calls.get() + 1);
        self.leg
            .clone()
            .ok_or(EngineError::MalformedResponse("no canned route"))
    }
}

/// A two-step leg whose totals are consistent with its steps.
pub fn two_step_leg(a: Coord, mid: Coord, b: Coord) -> RouteLeg {
    RouteLeg {
        distance_m: 900.0,
        duration_s: 90.0,
        steps: vec![
            RouteStep {
                distance_m: 400.0,
                duration_s: 40.0,
                start: a,
                end: mid,
            },
            RouteStep {
                distance_m: 500.0,
                duration_s: 50.0,
                start: mid,
                end: b,
            },
        ],
    }
}
