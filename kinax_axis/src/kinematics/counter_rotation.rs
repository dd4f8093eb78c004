//! Counter-rotation transform.
//!
//! One logical value drives two opposed motors:
//!
//! ```text
//! master = u + applied_offset + slave_offset
//! slave  = -u
//! u      = ((master - applied_offset - slave_offset) - slave) / 2
//! ```
//!
//! The inverse averages both motors' estimates, so a pair left slightly out of
//! step by a stop still reads a well-defined value. `applied_offset` is
//! recovery state: adopted from the persisted record when present, otherwise
//! captured from the motors' current desynchronisation.

use super::{Kinematics, LiveState};
use crate::plan::{ActuatorPlan, LogicalTarget, WaypointSequence};
use crate::recovery::RecoveryRecord;
use kinax_common::axis::error::AxisError;
use serde::{Deserialize, Serialize};
use tracing::info;

pub const ROLES: [&str; 2] = ["master", "slave"];

const MASTER: usize = 0;
const SLAVE: usize = 1;

/// Counter-rotation calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CounterRotationCalibration {
    /// Static correction added to the master target.
    #[serde(default)]
    pub slave_offset: f64,
}

#[derive(Debug, Clone)]
pub struct CounterRotation {
    cal: CounterRotationCalibration,
    applied_offset: f64,
}

impl CounterRotation {
    pub fn new(cal: CounterRotationCalibration) -> Self {
        Self {
            cal,
            applied_offset: 0.0,
        }
    }

    fn offset(&self) -> f64 {
        self.applied_offset + self.cal.slave_offset
    }
}

impl Kinematics for CounterRotation {
    fn kind(&self) -> &'static str {
        "counter_rotation"
    }

    fn roles(&self) -> &[&'static str] {
        &ROLES
    }

    fn forward(&self, target: f64, live: &LiveState<'_>) -> Result<WaypointSequence, AxisError> {
        let mut plan = ActuatorPlan::new();
        plan.set(MASTER, target + self.offset(), live.precision(MASTER))?
            .set(SLAVE, -target, live.precision(SLAVE))?;
        let logical = LogicalTarget {
            value: target,
            tolerance: self.tolerance(target, live),
        };
        Ok(WaypointSequence::single(logical, plan))
    }

    fn inverse(&self, live: &LiveState<'_>) -> Result<f64, AxisError> {
        let master = live.position(MASTER)?;
        let slave = live.position(SLAVE)?;
        Ok(0.5 * ((master - self.offset()) - slave))
    }

    fn reconcile(&mut self, stored: Option<&RecoveryRecord>, live: &LiveState<'_>) {
        match stored {
            Some(record) => {
                self.applied_offset = record.applied_offset;
                info!(offset = self.applied_offset, "adopted persisted offset");
            }
            None => {
                let (master, slave) = match (live.position(MASTER), live.position(SLAVE)) {
                    (Ok(m), Ok(s)) => (m, s),
                    _ => return,
                };
                self.applied_offset = master + slave - self.cal.slave_offset;
                info!(
                    offset = self.applied_offset,
                    master, slave, "captured offset from current positions"
                );
            }
        }
    }

    fn applied_offset(&self) -> f64 {
        self.applied_offset
    }
}
