//! Prelude module for common re-exports.
//!
//! ```rust
//! use kinax_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig};

// ─── Actuators ──────────────────────────────────────────────────────
pub use crate::actuator::{
    Actuator, ActuatorInfo, ActuatorSpec, ActuatorStatus, DriverError, DriverFactory, Limits,
    Reading, SharedActuator,
};

// ─── Logical axes ───────────────────────────────────────────────────
pub use crate::axis::error::{AxisError, FaultFlags};
pub use crate::axis::state::MoveState;

// ─── Channel ────────────────────────────────────────────────────────
pub use crate::channel::{Channel, ChannelValue, Field};

// ─── Constants ──────────────────────────────────────────────────────
pub use crate::consts::{MAX_MEMBERS, MAX_WAYPOINTS};
