//! Instrument configuration.
//!
//! One TOML file describes the actuators, the logical axes built on them and
//! the interlocks between devices:
//!
//! ```toml
//! [shared]
//! service_name = "diffractometer"
//!
//! [supervisor]
//! poll_interval_ms = 20
//!
//! [[actuators]]
//! name = "mth1"
//! limits = [0.0, 90.0]
//! precision = 0.001
//!
//! [[axes]]
//! name = "wavelength"
//! members = { crystal1 = "mth1", crystal2 = "mth2", translation = "mtx" }
//! [axes.kinematics]
//! type = "double_monochromator"
//! d_spacing = 3.335
//! distance = 100.0
//! ```
//!
//! Validation covers name uniqueness, reference resolution, member roles,
//! calibration sanity and interlock topology. Cone geometry is checked when
//! the transform is built.

use crate::interlock::InterlockCondition;
use crate::kinematics::cone::{self, ConeCalibration};
use crate::kinematics::counter_rotation::{self, CounterRotationCalibration};
use crate::kinematics::coupled_pair::{self, MonochromatorCalibration};
use crate::kinematics::is_positive;
use crate::kinematics::obstacle::ObstacleCalibration;
use kinax_common::actuator::ActuatorSpec;
use kinax_common::config::{ConfigError, ConfigLoader, SharedConfig, check_range};
use kinax_common::consts::{
    DEFAULT_MOVE_TIMEOUT_S, DEFAULT_POLL_INTERVAL_MS, POLL_INTERVAL_MAX_MS, POLL_INTERVAL_MIN_MS,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ─── Sections ───────────────────────────────────────────────────────

/// Supervisor loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupervisorConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Per-waypoint arrival timeout.
    #[serde(default = "default_move_timeout")]
    pub move_timeout_s: f64,
    /// Recovery state file used by the binary; `DEFAULT_STATE_FILE` when absent.
    #[serde(default)]
    pub state_file: Option<PathBuf>,
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_move_timeout() -> f64 {
    DEFAULT_MOVE_TIMEOUT_S
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            move_timeout_s: DEFAULT_MOVE_TIMEOUT_S,
            state_file: None,
        }
    }
}

impl SupervisorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn move_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.move_timeout_s)
    }
}

/// Transform selection with its calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KinematicsConfig {
    DoubleMonochromator(MonochromatorCalibration),
    CounterRotation(CounterRotationCalibration),
    Cone(ConeCalibration),
    Obstacle(ObstacleCalibration),
}

impl KinematicsConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DoubleMonochromator(_) => "double_monochromator",
            Self::CounterRotation(_) => "counter_rotation",
            Self::Cone(_) => "cone",
            Self::Obstacle(_) => "obstacle",
        }
    }

    /// Member roles in transform order.
    pub fn roles(&self) -> &'static [&'static str] {
        match self {
            Self::DoubleMonochromator(_) => &coupled_pair::ROLES,
            Self::CounterRotation(_) => &counter_rotation::ROLES,
            Self::Cone(_) => &cone::ROLES,
            Self::Obstacle(cal) => cal.roles(),
        }
    }

    /// Non-member devices the transform reads.
    pub fn observed(&self) -> Vec<String> {
        match self {
            Self::Obstacle(cal) => cal.sources(),
            _ => Vec::new(),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::DoubleMonochromator(cal) => cal.validate(),
            Self::Obstacle(cal) => cal.validate(),
            Self::CounterRotation(_) | Self::Cone(_) => Ok(()),
        }
    }
}

/// One logical axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisConfig {
    pub name: String,
    #[serde(default)]
    pub unit: String,
    /// Role → actuator name.
    pub members: BTreeMap<String, String>,
    pub kinematics: KinematicsConfig,
}

impl AxisConfig {
    /// Member actuator names in role order.
    pub fn ordered_members(&self) -> Result<Vec<&str>, ConfigError> {
        self.kinematics
            .roles()
            .iter()
            .map(|role| {
                self.members.get(*role).map(String::as_str).ok_or_else(|| {
                    ConfigError::ValidationError(format!(
                        "axis {}: missing member for role {role}",
                        self.name
                    ))
                })
            })
            .collect()
    }
}

/// One interlock rule, by device name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterlockConfig {
    pub name: String,
    /// Actuator or logical axis whose moves are restricted.
    pub dependent: String,
    /// Actuator whose state is checked.
    pub controller: String,
    pub condition: InterlockCondition,
    #[serde(default)]
    pub target_range: Option<[f64; 2]>,
}

/// Whole instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentConfig {
    pub shared: SharedConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default)]
    pub actuators: Vec<ActuatorSpec>,
    #[serde(default)]
    pub axes: Vec<AxisConfig>,
    #[serde(default)]
    pub interlocks: Vec<InterlockConfig>,
}

// ─── Loading ────────────────────────────────────────────────────────

/// Load and validate an instrument file.
pub fn load_config(path: &Path) -> Result<InstrumentConfig, ConfigError> {
    let config = InstrumentConfig::load(path)?;
    config.validate()?;
    Ok(config)
}

/// Parse and validate an in-memory document.
pub fn load_config_from_str(content: &str) -> Result<InstrumentConfig, ConfigError> {
    let config = InstrumentConfig::parse(content)?;
    config.validate()?;
    Ok(config)
}

// ─── Validation ─────────────────────────────────────────────────────

fn invalid(msg: String) -> ConfigError {
    ConfigError::ValidationError(msg)
}

/// `lo <= hi`, false for NaN.
fn ordered(lo: f64, hi: f64) -> bool {
    lo <= hi
}

impl InstrumentConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.validate_supervisor()?;
        let actuators = self.validate_actuators()?;
        self.validate_axes(&actuators)?;
        self.validate_interlocks(&actuators)?;
        Ok(())
    }

    pub fn actuator(&self, name: &str) -> Option<&ActuatorSpec> {
        self.actuators.iter().find(|a| a.name == name)
    }

    pub fn axis(&self, name: &str) -> Option<&AxisConfig> {
        self.axes.iter().find(|a| a.name == name)
    }

    fn validate_supervisor(&self) -> Result<(), ConfigError> {
        check_range(
            "supervisor.poll_interval_ms",
            self.supervisor.poll_interval_ms,
            POLL_INTERVAL_MIN_MS,
            POLL_INTERVAL_MAX_MS,
        )?;
        let t = self.supervisor.move_timeout_s;
        if !is_positive(t) {
            return Err(invalid(format!(
                "supervisor.move_timeout_s must be positive, got {t}"
            )));
        }
        Ok(())
    }

    fn validate_actuators(&self) -> Result<HashSet<&str>, ConfigError> {
        let mut names = HashSet::new();
        for spec in &self.actuators {
            if spec.name.trim().is_empty() {
                return Err(invalid("actuator name cannot be empty".to_string()));
            }
            if !names.insert(spec.name.as_str()) {
                return Err(invalid(format!("duplicate actuator {}", spec.name)));
            }
            let [lo, hi] = spec.limits;
            if !ordered(lo, hi) {
                return Err(invalid(format!(
                    "actuator {}: limits [{lo}, {hi}] not ordered",
                    spec.name
                )));
            }
            if !is_positive(spec.precision) {
                return Err(invalid(format!(
                    "actuator {}: precision must be positive",
                    spec.name
                )));
            }
        }
        Ok(names)
    }

    fn validate_axes(&self, actuators: &HashSet<&str>) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        let mut owner: HashMap<&str, &str> = HashMap::new();
        for axis in &self.axes {
            if axis.name.trim().is_empty() {
                return Err(invalid("axis name cannot be empty".to_string()));
            }
            if !names.insert(axis.name.as_str()) || actuators.contains(axis.name.as_str()) {
                return Err(invalid(format!("duplicate device name {}", axis.name)));
            }

            let roles = axis.kinematics.roles();
            if let Some(extra) = axis.members.keys().find(|r| !roles.contains(&r.as_str())) {
                return Err(invalid(format!(
                    "axis {}: unknown role {extra} for {} (expected {roles:?})",
                    axis.name,
                    axis.kinematics.kind()
                )));
            }
            let members = axis.ordered_members()?;
            for member in &members {
                if !actuators.contains(member) {
                    return Err(invalid(format!(
                        "axis {}: unknown actuator {member}",
                        axis.name
                    )));
                }
                if let Some(previous) = owner.insert(member, &axis.name) {
                    return Err(invalid(format!(
                        "actuator {member} is a member of both {previous} and {}",
                        axis.name
                    )));
                }
            }

            axis.kinematics
                .validate()
                .map_err(|e| invalid(format!("axis {}: {e}", axis.name)))?;

            for source in axis.kinematics.observed() {
                if !actuators.contains(source.as_str()) {
                    return Err(invalid(format!(
                        "axis {}: region source {source} is not an actuator",
                        axis.name
                    )));
                }
                if members.contains(&source.as_str()) {
                    return Err(invalid(format!(
                        "axis {}: region source {source} is one of its own members",
                        axis.name
                    )));
                }
            }
        }
        Ok(())
    }

    fn validate_interlocks(&self, actuators: &HashSet<&str>) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        for rule in &self.interlocks {
            if !names.insert(rule.name.as_str()) {
                return Err(invalid(format!("duplicate interlock {}", rule.name)));
            }
            if !actuators.contains(rule.controller.as_str()) {
                return Err(invalid(format!(
                    "interlock {}: controller {} is not an actuator",
                    rule.name, rule.controller
                )));
            }
            let axis = self.axis(&rule.dependent);
            if axis.is_none() && !actuators.contains(rule.dependent.as_str()) {
                return Err(invalid(format!(
                    "interlock {}: unknown dependent {}",
                    rule.name, rule.dependent
                )));
            }
            let own_member = axis.is_some_and(|a| a.members.values().any(|m| *m == rule.controller));
            if rule.controller == rule.dependent || own_member {
                return Err(invalid(format!(
                    "interlock {}: {} cannot be interlocked on itself",
                    rule.name, rule.dependent
                )));
            }
            if let Some([lo, hi]) = rule.target_range {
                if !ordered(lo, hi) {
                    return Err(invalid(format!(
                        "interlock {}: target_range [{lo}, {hi}] not ordered",
                        rule.name
                    )));
                }
            }
            match rule.condition {
                InterlockCondition::ValueWithin { lower, upper } if !ordered(lower, upper) => {
                    return Err(invalid(format!(
                        "interlock {}: range [{lower}, {upper}] not ordered",
                        rule.name
                    )));
                }
                InterlockCondition::ValueNear { tolerance, .. } if tolerance.is_nan() || tolerance < 0.0 => {
                    return Err(invalid(format!(
                        "interlock {}: tolerance must not be negative",
                        rule.name
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
