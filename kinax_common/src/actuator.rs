//! Actuator driver contract.
//!
//! This module defines:
//! - `Actuator` trait - the capability set {read, start, stop} a logical axis consumes
//! - `ActuatorInfo` - unit, limits and precision attached at construction
//! - `DriverError` - errors raised by driver implementations
//! - `ActuatorSpec` / `DriverFactory` - construction-time description and factory type

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by actuator drivers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DriverError {
    /// Hardware or driver reported a fault.
    #[error("{actuator}: fault: {reason}")]
    Fault { actuator: String, reason: String },

    /// Requested target lies outside the actuator's limits.
    #[error("{actuator}: target {target} outside limits [{lower}, {upper}]")]
    LimitViolation {
        actuator: String,
        target: f64,
        lower: f64,
        upper: f64,
    },

    /// Communication with the device failed.
    #[error("Hardware communication error: {0}")]
    Communication(String),

    /// No driver registered under this name.
    #[error("Driver not found: {0}")]
    DriverNotFound(String),

    /// A driver with this name is already registered.
    #[error("Driver already registered: {0}")]
    DuplicateDriver(String),

    /// Driver-specific parameter missing or malformed.
    #[error("Invalid driver parameter: {0}")]
    InvalidParameter(String),
}

/// Actuator status as reported by its driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ActuatorStatus {
    #[default]
    Ok,
    Busy,
    Warn,
    Error,
}

impl ActuatorStatus {
    #[inline]
    pub const fn is_busy(self) -> bool {
        matches!(self, Self::Busy)
    }

    #[inline]
    pub const fn is_error(self) -> bool {
        matches!(self, Self::Error)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Busy => "busy",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ActuatorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed interval of legal positions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Limits {
    pub lower: f64,
    pub upper: f64,
}

impl Limits {
    pub const fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    /// Effectively unbounded.
    pub const fn open() -> Self {
        Self {
            lower: f64::MIN,
            upper: f64::MAX,
        }
    }

    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

impl fmt::Display for Limits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.lower, self.upper)
    }
}

/// Static metadata attached to an actuator at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActuatorInfo {
    pub unit: String,
    pub limits: Limits,
    /// Arrival tolerance in actuator units.
    pub precision: f64,
}

/// One `read()` result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub value: f64,
    pub status: ActuatorStatus,
}

/// A single physical movable/readable owned by an external driver.
///
/// Implementations use interior mutability; a logical axis only holds shared
/// handles and never mutates driver state other than through `start`/`stop`.
/// `read` and `start` may block on a hardware round-trip.
pub trait Actuator: Send + Sync {
    fn name(&self) -> &str;

    fn info(&self) -> &ActuatorInfo;

    /// Current value and status.
    fn read(&self) -> Result<Reading, DriverError>;

    /// Begin moving towards `target`. Returns once the command is accepted.
    fn start(&self, target: f64) -> Result<(), DriverError>;

    /// Halt motion at the current position.
    fn stop(&self) -> Result<(), DriverError>;

    /// Last accepted target, if any.
    fn target(&self) -> Option<f64> {
        None
    }
}

/// Shared actuator handle.
pub type SharedActuator = Arc<dyn Actuator>;

/// Construction-time description of one actuator.
///
/// ```toml
/// [[actuators]]
/// name = "mth1"
/// unit = "deg"
/// driver = "sim"
/// limits = [0.0, 90.0]
/// precision = 0.001
/// params = { initial = 20.0, speed = 5.0 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActuatorSpec {
    pub name: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default = "default_driver")]
    pub driver: String,
    pub limits: [f64; 2],
    pub precision: f64,
    /// Driver-specific parameters.
    #[serde(default)]
    pub params: toml::Table,
}

fn default_driver() -> String {
    "sim".to_string()
}

impl ActuatorSpec {
    pub fn info(&self) -> ActuatorInfo {
        ActuatorInfo {
            unit: self.unit.clone(),
            limits: Limits::new(self.limits[0], self.limits[1]),
            precision: self.precision,
        }
    }

    /// Numeric driver parameter, accepting TOML integers as well as floats.
    pub fn param_f64(&self, key: &str) -> Result<Option<f64>, DriverError> {
        match self.params.get(key) {
            None => Ok(None),
            Some(toml::Value::Float(v)) => Ok(Some(*v)),
            Some(toml::Value::Integer(v)) => Ok(Some(*v as f64)),
            Some(other) => Err(DriverError::InvalidParameter(format!(
                "{}.{key}: expected number, found {}",
                self.name,
                other.type_str()
            ))),
        }
    }
}

/// Factory creating an actuator from its spec.
pub type DriverFactory =
    Box<dyn Fn(&ActuatorSpec) -> Result<SharedActuator, DriverError> + Send + Sync>;
