use super::clock::SimClock;
use kinax_common::actuator::{
    Actuator, ActuatorInfo, ActuatorStatus, DriverError, Reading,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Linear-motion segment currently being executed.
#[derive(Debug, Clone)]
struct Motion {
    origin: f64,
    started_at: Duration,
    target: f64,
    commanded: Option<f64>,
    fault: Option<String>,
}

/// Virtual motor moving linearly at a fixed speed.
///
/// Counts every `start`/`stop` it receives so tests can assert that a
/// refused move issued no commands.
pub struct SimMotor {
    name: String,
    info: ActuatorInfo,
    /// Units per second; `None` moves instantly.
    speed: Option<f64>,
    clock: Arc<SimClock>,
    motion: Mutex<Motion>,
    commands: AtomicUsize,
}

impl SimMotor {
    pub fn new(name: &str, info: ActuatorInfo, initial: f64, clock: Arc<SimClock>) -> Self {
        let started_at = clock.now();
        Self {
            name: name.to_string(),
            info,
            speed: None,
            clock,
            motion: Mutex::new(Motion {
                origin: initial,
                started_at,
                target: initial,
                commanded: None,
                fault: None,
            }),
            commands: AtomicUsize::new(0),
        }
    }

    pub fn with_speed(mut self, speed: Option<f64>) -> Self {
        self.speed = speed;
        self
    }

    fn position(&self, m: &Motion, now: Duration) -> f64 {
        let Some(speed) = self.speed else {
            return m.target;
        };
        let distance = m.target - m.origin;
        let travelled = speed * now.saturating_sub(m.started_at).as_secs_f64();
        if travelled >= distance.abs() {
            m.target
        } else {
            m.origin + distance.signum() * travelled
        }
    }

    /// Current position without counting as a command.
    pub fn position_now(&self) -> f64 {
        let m = self.motion.lock();
        self.position(&m, self.clock.now())
    }

    /// Set the position directly, as an operator or a desynchronised drive
    /// would. Not counted as a command.
    pub fn force_position(&self, value: f64) {
        let mut m = self.motion.lock();
        m.origin = value;
        m.target = value;
        m.started_at = self.clock.now();
        debug!(motor = %self.name, value, "position forced");
    }

    /// Make subsequent reads report an error and reject moves.
    pub fn inject_fault(&self, reason: &str) {
        let now = self.clock.now();
        let mut m = self.motion.lock();
        let here = self.position(&m, now);
        m.origin = here;
        m.target = here;
        m.started_at = now;
        m.fault = Some(reason.to_string());
        warn!(motor = %self.name, reason, "fault injected");
    }

    pub fn clear_fault(&self) {
        self.motion.lock().fault = None;
    }

    /// Number of `start`/`stop` commands received.
    pub fn command_count(&self) -> usize {
        self.commands.load(Ordering::SeqCst)
    }

    fn fault_error(&self, reason: &str) -> DriverError {
        DriverError::Fault {
            actuator: self.name.clone(),
            reason: reason.to_string(),
        }
    }
}

impl Actuator for SimMotor {
    fn name(&self) -> &str {
        &self.name
    }

    fn info(&self) -> &ActuatorInfo {
        &self.info
    }

    fn read(&self) -> Result<Reading, DriverError> {
        let now = self.clock.now();
        let m = self.motion.lock();
        let value = self.position(&m, now);
        let status = if m.fault.is_some() {
            ActuatorStatus::Error
        } else if value != m.target {
            ActuatorStatus::Busy
        } else {
            ActuatorStatus::Ok
        };
        trace!(motor = %self.name, value, %status, "read");
        Ok(Reading { value, status })
    }

    fn start(&self, target: f64) -> Result<(), DriverError> {
        self.commands.fetch_add(1, Ordering::SeqCst);
        let now = self.clock.now();
        let mut m = self.motion.lock();
        if let Some(reason) = &m.fault {
            return Err(self.fault_error(reason));
        }
        if !self.info.limits.contains(target) {
            return Err(DriverError::LimitViolation {
                actuator: self.name.clone(),
                target,
                lower: self.info.limits.lower,
                upper: self.info.limits.upper,
            });
        }
        m.origin = self.position(&m, now);
        m.started_at = now;
        m.target = target;
        m.commanded = Some(target);
        debug!(motor = %self.name, from = m.origin, target, "start");
        Ok(())
    }

    fn stop(&self) -> Result<(), DriverError> {
        self.commands.fetch_add(1, Ordering::SeqCst);
        let now = self.clock.now();
        let mut m = self.motion.lock();
        let here = self.position(&m, now);
        m.origin = here;
        m.target = here;
        m.started_at = now;
        debug!(motor = %self.name, at = here, "stop");
        Ok(())
    }

    fn target(&self) -> Option<f64> {
        self.motion.lock().commanded
    }
}
