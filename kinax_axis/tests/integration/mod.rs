mod cone;
mod config;
mod counter_rotation;
mod double_mono;
mod interlock;
mod obstacle;
mod round_trip;

use kinax_axis::axis::LogicalAxis;
use kinax_axis::config::load_config_from_str;
use kinax_axis::context::DeviceContext;
use kinax_axis::recovery::{MemoryStore, RecoveryStore};
use kinax_common::actuator::{ActuatorInfo, Limits, SharedActuator};
use kinax_common::axis::error::AxisError;
use kinax_common::axis::state::MoveState;
use kinax_common::channel::MemoryChannel;
use kinax_hal::{DriverRegistry, SimClock, SimMotor};
use std::sync::Arc;

// ── Helpers ─────────────────────────────────────────────────────────

pub fn sim_motor(
    name: &str,
    limits: [f64; 2],
    precision: f64,
    initial: f64,
    speed: Option<f64>,
    clock: &Arc<SimClock>,
) -> Arc<SimMotor> {
    let info = ActuatorInfo {
        unit: String::new(),
        limits: Limits::new(limits[0], limits[1]),
        precision,
    };
    Arc::new(SimMotor::new(name, info, initial, Arc::clone(clock)).with_speed(speed))
}

pub fn shared(motor: &Arc<SimMotor>) -> SharedActuator {
    motor.clone()
}

pub fn context_with_store(
    doc: &str,
    clock: &Arc<SimClock>,
    store: Arc<dyn RecoveryStore>,
) -> (DeviceContext, Arc<MemoryChannel>) {
    let config = load_config_from_str(doc).unwrap();
    let registry = DriverRegistry::with_simulation(Arc::clone(clock));
    let channel = Arc::new(MemoryChannel::new());
    let ctx = DeviceContext::build(&config, &registry, channel.clone(), store).unwrap();
    (ctx, channel)
}

pub fn context(doc: &str, clock: &Arc<SimClock>) -> DeviceContext {
    context_with_store(doc, clock, Arc::new(MemoryStore::new())).0
}

/// Poll until the axis leaves the moving states, at most `limit` times.
pub fn settle(axis: &mut LogicalAxis, limit: usize) -> Result<MoveState, AxisError> {
    for _ in 0..limit {
        let state = axis.poll()?;
        if !state.is_moving() && state != MoveState::Stopped {
            return Ok(state);
        }
    }
    Ok(axis.state())
}

pub fn position(ctx: &DeviceContext, actuator: &str) -> f64 {
    ctx.actuator(actuator).unwrap().read().unwrap().value
}
