//! Plan ledger: per-actuator claims for the lifetime of a plan.

use kinax_common::axis::error::AxisError;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::trace;

/// Actuator name → owning axis.
#[derive(Debug, Default)]
pub struct PlanLedger {
    claims: Mutex<HashMap<String, String>>,
}

impl PlanLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim every actuator in `actuators` for `owner`, or none of them.
    ///
    /// Re-claiming an actuator the owner already holds succeeds.
    pub fn claim(&self, owner: &str, actuators: &[&str]) -> Result<(), AxisError> {
        let mut claims = self.claims.lock();
        for name in actuators {
            if let Some(holder) = claims.get(*name) {
                if holder != owner {
                    return Err(AxisError::ActuatorClaimed {
                        actuator: (*name).to_string(),
                        owner: holder.clone(),
                    });
                }
            }
        }
        for name in actuators {
            claims.insert((*name).to_string(), owner.to_string());
        }
        trace!(owner, ?actuators, "claimed");
        Ok(())
    }

    /// Drop every claim held by `owner`.
    pub fn release(&self, owner: &str) {
        self.claims.lock().retain(|_, holder| holder != owner);
    }

    pub fn owner_of(&self, actuator: &str) -> Option<String> {
        self.claims.lock().get(actuator).cloned()
    }
}
