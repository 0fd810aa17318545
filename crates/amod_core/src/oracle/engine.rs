//! Routing-engine client and process supervision.
//!
//! [`OsrmEngine`] supervises a local `osrm-routed` process and speaks its
//! HTTP `/route/v1/driving` protocol through a blocking client. The
//! [`RoutingApi`] trait is the seam the oracle talks through, so tests can
//! substitute a counting mock without a live engine.

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use log::{info, warn};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::coords::Coord;

/// OSRM answers a bare root request with 400; anything else means the port
/// is not serving a routing engine.
const HEALTHY_STATUS: u16 = 400;

/// Errors from the routing engine or its supervision.
#[derive(Debug)]
pub enum EngineError {
    /// The `osrm-routed` binary was not found. Unrecoverable configuration error.
    MissingBinary(PathBuf),
    /// The preprocessed road network file was not found. Unrecoverable.
    MissingMapData(PathBuf),
    /// A prior instance already answers on the configured port.
    PortInUse(u16),
    /// Spawning the engine process failed.
    Spawn(std::io::Error),
    /// The engine came up but did not pass the health probe after the grace period.
    StartupFailed,
    /// Transport-level failure that is not a timeout.
    Http(reqwest::Error),
    /// The engine answered with a non-"Ok" code.
    Api(String),
    /// The engine answered "Ok" but the payload was missing expected fields.
    MalformedResponse(&'static str),
    /// Restart-and-retry attempts were exhausted.
    Unreachable { attempts: u32 },
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::MissingBinary(path) => {
                write!(f, "routing engine binary not found at {}", path.display())
            }
            EngineError::MissingMapData(path) => {
                write!(f, "road network data not found at {}", path.display())
            }
            EngineError::PortInUse(port) => {
                write!(f, "a routing engine is already running on port {}", port)
            }
            EngineError::Spawn(err) => write!(f, "failed to spawn routing engine: {}", err),
            EngineError::StartupFailed => write!(f, "routing engine failed its startup probe"),
            EngineError::Http(err) => write!(f, "routing engine request failed: {}", err),
            EngineError::Api(code) => write!(f, "routing engine returned error: {}", code),
            EngineError::MalformedResponse(what) => {
                write!(f, "routing engine response missing {}", what)
            }
            EngineError::Unreachable { attempts } => {
                write!(f, "routing engine unreachable after {} attempts", attempts)
            }
        }
    }
}

impl std::error::Error for EngineError {}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        EngineError::Http(err)
    }
}

/// Supervision and request parameters for the engine process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Path to the `osrm-routed` executable.
    pub binary: PathBuf,
    /// Path to the preprocessed `.osrm` road network.
    pub map_data: PathBuf,
    pub host: String,
    pub port: u16,
    /// Per-request timeout; a timeout triggers a restart-and-retry.
    pub request_timeout: Duration,
    /// Wait after spawning before the first health probe.
    pub startup_grace: Duration,
    /// Restart-and-retry budget for a single request.
    pub max_retries: u32,
    /// Pause between a restart and the retried request.
    pub retry_backoff: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("osrm-routed"),
            map_data: PathBuf::from("map.osrm"),
            host: "localhost".to_string(),
            port: 5000,
            request_timeout: Duration::from_secs(30),
            startup_grace: Duration::from_secs(2),
            max_retries: 3,
            retry_backoff: Duration::from_secs(2),
        }
    }
}

impl EngineConfig {
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_paths(mut self, binary: impl Into<PathBuf>, map_data: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self.map_data = map_data.into();
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// One step of a route leg, with its rounded-key endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RouteStep {
    pub distance_m: f64,
    pub duration_s: f64,
    pub start: Coord,
    pub end: Coord,
}

/// The first leg of the best route between an OD pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteLeg {
    pub distance_m: f64,
    pub duration_s: f64,
    pub steps: Vec<RouteStep>,
}

/// The engine operations the oracle depends on.
///
/// `distance_duration` answers both quantities in one request (the engine
/// reports both on every route), `route_leg` requests full turn-by-turn
/// steps. `&mut self` reflects that a real engine may restart itself
/// mid-call; it also keeps the oracle single-caller by construction.
pub trait RoutingApi {
    fn distance_duration(
        &mut self,
        origin: Coord,
        destination: Coord,
    ) -> Result<(f64, f64), EngineError>;

    fn route_leg(&mut self, origin: Coord, destination: Coord) -> Result<RouteLeg, EngineError>;
}

// Minimal OSRM JSON response structures.

#[derive(Deserialize)]
struct OsrmResponse {
    code: String,
    message: Option<String>,
    routes: Option<Vec<OsrmRoute>>,
}

#[derive(Deserialize)]
struct OsrmRoute {
    legs: Vec<OsrmLeg>,
}

#[derive(Deserialize)]
struct OsrmLeg {
    distance: f64, // meters
    duration: f64, // seconds
    #[serde(default)]
    steps: Vec<OsrmStep>,
}

#[derive(Deserialize)]
struct OsrmStep {
    distance: f64,
    duration: f64,
    #[serde(default)]
    intersections: Vec<OsrmIntersection>,
}

#[derive(Deserialize)]
struct OsrmIntersection {
    location: [f64; 2], // [lng, lat]
}

/// A supervised `osrm-routed` process plus its HTTP client.
#[derive(Debug)]
pub struct OsrmEngine {
    config: EngineConfig,
    client: Client,
    process: Option<Child>,
}

impl OsrmEngine {
    /// Validate the configuration and build the client. Fails fast when the
    /// binary or map data is missing; does not start the process yet.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        if !config.binary.is_file() {
            return Err(EngineError::MissingBinary(config.binary));
        }
        if !config.map_data.is_file() {
            return Err(EngineError::MissingMapData(config.map_data));
        }
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            config,
            client,
            process: None,
        })
    }

    /// Start the engine process and wait for it to pass the health probe.
    ///
    /// Fails with [`EngineError::PortInUse`] when something already answers
    /// on the configured port, and [`EngineError::StartupFailed`] when the
    /// spawned process does not come up within the grace period.
    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.health_check() {
            return Err(EngineError::PortInUse(self.config.port));
        }

        let child = Command::new(&self.config.binary)
            .arg("-p")
            .arg(self.config.port.to_string())
            .arg(&self.config.map_data)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(EngineError::Spawn)?;
        self.process = Some(child);

        std::thread::sleep(self.config.startup_grace);
        if !self.health_check() {
            self.kill();
            return Err(EngineError::StartupFailed);
        }
        info!("routing engine serving on {}", self.config.base_url());
        Ok(())
    }

    /// Probe the engine. Healthy iff the root request answers with HTTP 400.
    pub fn health_check(&self) -> bool {
        match self.client.get(format!("{}/", self.config.base_url())).send() {
            Ok(response) => response.status().as_u16() == HEALTHY_STATUS,
            Err(_) => false,
        }
    }

    /// Kill the supervised process, if any.
    pub fn kill(&mut self) {
        if let Some(mut child) = self.process.take() {
            let _ = child.kill();
            let _ = child.wait();
            info!("routing engine on {} killed", self.config.base_url());
        }
    }

    /// Kill and start again.
    pub fn restart(&mut self) -> Result<(), EngineError> {
        self.kill();
        self.start()
    }

    fn route_url(&self, origin: Coord, destination: Coord, steps: bool) -> String {
        format!(
            "{}/route/v1/driving/{},{};{},{}?alternatives=false&steps={}&annotations=false&geometries=geojson",
            self.config.base_url(),
            origin.lng,
            origin.lat,
            destination.lng,
            destination.lat,
            steps,
        )
    }

    /// Issue one request, restarting the engine and retrying on timeout.
    ///
    /// The retry budget is bounded: after `max_retries` restarts the request
    /// fails with [`EngineError::Unreachable`]. A non-"Ok" answer is not
    /// retried; the engine understood the request and rejected it.
    fn call(&mut self, url: &str) -> Result<OsrmResponse, EngineError> {
        let mut attempts = 0;
        loop {
            match self.client.get(url).send() {
                Ok(response) => {
                    let parsed: OsrmResponse = response.json()?;
                    if parsed.code != "Ok" {
                        let detail = parsed.message.unwrap_or(parsed.code);
                        return Err(EngineError::Api(detail));
                    }
                    return Ok(parsed);
                }
                Err(err) if err.is_timeout() => {
                    attempts += 1;
                    if attempts > self.config.max_retries {
                        return Err(EngineError::Unreachable { attempts });
                    }
                    warn!(
                        "routing request timed out, restarting engine (attempt {}/{}): {}",
                        attempts, self.config.max_retries, url
                    );
                    self.restart()?;
                    std::thread::sleep(self.config.retry_backoff);
                }
                Err(err) => return Err(EngineError::Http(err)),
            }
        }
    }

    fn fetch_leg(&mut self, origin: Coord, destination: Coord, steps: bool) -> Result<OsrmLeg, EngineError> {
        let url = self.route_url(origin, destination, steps);
        let response = self.call(&url)?;
        response
            .routes
            .and_then(|routes| routes.into_iter().next())
            .and_then(|route| route.legs.into_iter().next())
            .ok_or(EngineError::MalformedResponse("routes[0].legs[0]"))
    }
}

impl Drop for OsrmEngine {
    fn drop(&mut self) {
        self.kill();
    }
}

impl RoutingApi for OsrmEngine {
    fn distance_duration(
        &mut self,
        origin: Coord,
        destination: Coord,
    ) -> Result<(f64, f64), EngineError> {
        let leg = self.fetch_leg(origin, destination, false)?;
        Ok((leg.distance, leg.duration))
    }

    fn route_leg(&mut self, origin: Coord, destination: Coord) -> Result<RouteLeg, EngineError> {
        let leg = self.fetch_leg(origin, destination, true)?;
        let steps = leg
            .steps
            .iter()
            .map(|step| {
                let start = step
                    .intersections
                    .first()
                    .ok_or(EngineError::MalformedResponse("step intersections"))?;
                let end = step
                    .intersections
                    .last()
                    .ok_or(EngineError::MalformedResponse("step intersections"))?;
                Ok(RouteStep {
                    distance_m: step.distance,
                    duration_s: step.duration,
                    start: Coord::new(start.location[0], start.location[1]),
                    end: Coord::new(end.location[0], end.location[1]),
                })
            })
            .collect::<Result<Vec<_>, EngineError>>()?;
        Ok(RouteLeg {
            distance_m: leg.distance,
            duration_s: leg.duration,
            steps,
        })
    }
}
