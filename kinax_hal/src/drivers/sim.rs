//! Simulated actuators.
//!
//! Motion is evaluated lazily from the clock: a commanded move records its
//! origin, start time and target, and every `read()` derives the position at
//! the current clock time. No background thread is needed, and a manual
//! clock makes partial moves reproducible in tests.

mod clock;
mod motor;

pub use clock::SimClock;
pub use motor::SimMotor;

use kinax_common::actuator::{ActuatorSpec, DriverError, SharedActuator};
use std::sync::Arc;

/// Driver name registered by [`crate::DriverRegistry::with_simulation`].
pub const DRIVER_NAME: &str = "sim";

/// Build a simulated motor from its spec.
///
/// Recognised parameters: `initial` (start position; 0 when legal, otherwise
/// the lower limit) and `speed` (units per second; omit for instant moves).
pub fn create(spec: &ActuatorSpec, clock: &Arc<SimClock>) -> Result<SharedActuator, DriverError> {
    let info = spec.info();
    let initial = spec.param_f64("initial")?.unwrap_or_else(|| {
        if info.limits.contains(0.0) {
            0.0
        } else {
            info.limits.lower
        }
    });
    if !info.limits.contains(initial) {
        return Err(DriverError::InvalidParameter(format!(
            "{}.initial = {initial} outside limits {}",
            spec.name, info.limits
        )));
    }
    let speed = spec.param_f64("speed")?;
    if let Some(s) = speed {
        if s.is_nan() || s <= 0.0 {
            return Err(DriverError::InvalidParameter(format!(
                "{}.speed must be positive, got {s}",
                spec.name
            )));
        }
    }
    let motor = SimMotor::new(&spec.name, info, initial, Arc::clone(clock)).with_speed(speed);
    Ok(Arc::new(motor))
}
