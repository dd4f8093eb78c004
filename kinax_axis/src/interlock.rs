//! Interlock coupling.
//!
//! A rule forbids moving a dependent device while a controller device is in a
//! given state. Rules are evaluated synchronously, read the controller only,
//! and never command it.

use kinax_common::actuator::SharedActuator;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// Controller state that blocks the dependent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "when", rename_all = "snake_case")]
pub enum InterlockCondition {
    /// Controller value in `[lower, upper]`.
    ValueWithin { lower: f64, upper: f64 },
    /// Controller value within `tolerance` of `setpoint`.
    ValueNear { setpoint: f64, tolerance: f64 },
    /// Controller is moving.
    Busy,
}

impl fmt::Display for InterlockCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValueWithin { lower, upper } => write!(f, "value in [{lower}, {upper}]"),
            Self::ValueNear {
                setpoint,
                tolerance,
            } => write!(f, "value at {setpoint} ± {tolerance}"),
            Self::Busy => f.write_str("busy"),
        }
    }
}

/// One resolved rule.
pub struct InterlockRule {
    pub name: String,
    /// Device whose moves are restricted: an actuator or a logical axis.
    pub dependent: String,
    pub controller: SharedActuator,
    pub condition: InterlockCondition,
    /// Only proposed targets in this range are restricted.
    pub target_range: Option<[f64; 2]>,
}

impl fmt::Debug for InterlockRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterlockRule")
            .field("name", &self.name)
            .field("dependent", &self.dependent)
            .field("controller", &self.controller.name())
            .field("condition", &self.condition)
            .field("target_range", &self.target_range)
            .finish()
    }
}

impl InterlockRule {
    fn applies_to(&self, proposed: f64) -> bool {
        match self.target_range {
            Some([lo, hi]) => proposed >= lo && proposed <= hi,
            None => true,
        }
    }

    /// `Some(reason)` if the rule blocks `proposed` right now.
    fn denial(&self, proposed: f64) -> Option<String> {
        if !self.applies_to(proposed) {
            return None;
        }
        let controller = self.controller.name();
        let reading = match self.controller.read() {
            Ok(r) => r,
            Err(e) => {
                warn!(rule = %self.name, controller, error = %e, "controller unreadable");
                return Some(format!(
                    "{}: controller {controller} unreadable ({e})",
                    self.name
                ));
            }
        };
        let blocked = match self.condition {
            InterlockCondition::ValueWithin { lower, upper } => {
                reading.value >= lower && reading.value <= upper
            }
            InterlockCondition::ValueNear {
                setpoint,
                tolerance,
            } => (reading.value - setpoint).abs() <= tolerance,
            InterlockCondition::Busy => reading.status.is_busy(),
        };
        blocked.then(|| {
            format!(
                "{}: {} may not move to {proposed} while {controller} is {} ({})",
                self.name, self.dependent, self.condition, reading.value
            )
        })
    }
}

/// All rules of an instrument.
#[derive(Debug, Default)]
pub struct Interlocks {
    rules: Vec<InterlockRule>,
}

impl Interlocks {
    pub fn new(rules: Vec<InterlockRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[InterlockRule] {
        &self.rules
    }

    /// Whether `dependent` may move to `proposed`; the reason is empty when
    /// allowed.
    pub fn is_target_allowed(&self, dependent: &str, proposed: f64) -> (bool, String) {
        for rule in self.rules.iter().filter(|r| r.dependent == dependent) {
            if let Some(reason) = rule.denial(proposed) {
                debug!(dependent, proposed, %reason, "interlock denied");
                return (false, reason);
            }
        }
        (true, String::new())
    }
}
