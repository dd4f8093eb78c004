//! Device context.
//!
//! Resolves every device name once, at construction: actuators come from the
//! driver registry, logical axes get their members and observed devices as
//! shared handles, and interlock rules get their controller. Nothing is looked
//! up by name after `build` returns.

use crate::axis::{AxisEnv, AxisOptions, AxisParts, AxisStatus, LogicalAxis};
use crate::config::{InstrumentConfig, KinematicsConfig};
use crate::interlock::{InterlockRule, Interlocks};
use crate::kinematics;
use crate::ledger::PlanLedger;
use crate::recovery::RecoveryStore;
use crate::supervisor::Supervisor;
use kinax_common::actuator::{ActuatorInfo, DriverError, SharedActuator};
use kinax_common::axis::error::AxisError;
use kinax_common::channel::Channel;
use kinax_common::config::ConfigError;
use kinax_hal::DriverRegistry;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Shared, lockable axis.
pub type AxisHandle = Arc<Mutex<LogicalAxis>>;

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("Axis {axis}: {source}")]
    Axis {
        axis: String,
        #[source]
        source: AxisError,
    },
}

pub struct DeviceContext {
    actuators: BTreeMap<String, SharedActuator>,
    /// Axes in configuration order.
    axes: Vec<(String, AxisHandle)>,
    env: AxisEnv,
    poll_interval: Duration,
}

impl DeviceContext {
    /// Validate `config` and build every device it names.
    pub fn build(
        config: &InstrumentConfig,
        registry: &DriverRegistry,
        channel: Arc<dyn Channel>,
        store: Arc<dyn RecoveryStore>,
    ) -> Result<Self, ContextError> {
        config.validate()?;

        let mut actuators = BTreeMap::new();
        for spec in &config.actuators {
            let actuator = registry.create(spec)?;
            actuators.insert(spec.name.clone(), actuator);
        }

        let rules = config
            .interlocks
            .iter()
            .map(|rule| {
                Ok(InterlockRule {
                    name: rule.name.clone(),
                    dependent: rule.dependent.clone(),
                    controller: lookup(&actuators, &rule.controller)?,
                    condition: rule.condition,
                    target_range: rule.target_range,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let env = AxisEnv {
            channel,
            store,
            interlocks: Arc::new(Interlocks::new(rules)),
            ledger: Arc::new(PlanLedger::new()),
        };
        let options = AxisOptions {
            move_timeout: config.supervisor.move_timeout(),
        };

        let mut axes = Vec::with_capacity(config.axes.len());
        for axis_cfg in &config.axes {
            let members = axis_cfg
                .ordered_members()?
                .into_iter()
                .map(|name| lookup(&actuators, name))
                .collect::<Result<Vec<_>, _>>()?;
            let kinematics = build_kinematics(&axis_cfg.kinematics, &members)?;
            let observed = kinematics
                .observed()
                .iter()
                .map(|name| lookup(&actuators, name))
                .collect::<Result<Vec<_>, _>>()?;
            let parts = AxisParts {
                name: axis_cfg.name.clone(),
                unit: axis_cfg.unit.clone(),
                kinematics,
                members,
                observed,
            };
            let axis = LogicalAxis::new(parts, env.clone(), options).map_err(|source| {
                ContextError::Axis {
                    axis: axis_cfg.name.clone(),
                    source,
                }
            })?;
            axes.push((axis_cfg.name.clone(), Arc::new(Mutex::new(axis))));
        }

        info!(
            instrument = %config.shared.service_name,
            actuators = actuators.len(),
            axes = axes.len(),
            interlocks = config.interlocks.len(),
            "device context ready"
        );
        Ok(Self {
            actuators,
            axes,
            env,
            poll_interval: config.supervisor.poll_interval(),
        })
    }

    pub fn actuator(&self, name: &str) -> Option<&SharedActuator> {
        self.actuators.get(name)
    }

    pub fn actuator_names(&self) -> impl Iterator<Item = &str> {
        self.actuators.keys().map(String::as_str)
    }

    pub fn axis(&self, name: &str) -> Option<AxisHandle> {
        self.axes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, handle)| Arc::clone(handle))
    }

    pub fn axes(&self) -> impl Iterator<Item = &AxisHandle> {
        self.axes.iter().map(|(_, handle)| handle)
    }

    pub fn axis_names(&self) -> impl Iterator<Item = &str> {
        self.axes.iter().map(|(name, _)| name.as_str())
    }

    pub fn env(&self) -> &AxisEnv {
        &self.env
    }

    pub fn status(&self) -> Vec<AxisStatus> {
        self.axes().map(|axis| axis.lock().status()).collect()
    }

    /// Replace the calibration of axis `name`.
    pub fn reconfigure(&self, name: &str, config: &KinematicsConfig) -> Result<(), ContextError> {
        let handle = self.axis(name).ok_or_else(|| {
            ConfigError::ValidationError(format!("unknown axis {name}"))
        })?;
        let mut axis = handle.lock();
        let kinematics = build_kinematics(config, axis.members())?;
        axis.reconfigure(kinematics)
            .map_err(|source| ContextError::Axis {
                axis: name.to_string(),
                source,
            })
    }

    /// Supervisor over every axis, stopping them when `shutdown` is raised.
    pub fn supervisor(&self, shutdown: Arc<AtomicBool>) -> Supervisor {
        Supervisor::new(
            self.axes().cloned().collect(),
            self.poll_interval,
            shutdown,
        )
    }
}

fn lookup(
    actuators: &BTreeMap<String, SharedActuator>,
    name: &str,
) -> Result<SharedActuator, ConfigError> {
    actuators
        .get(name)
        .cloned()
        .ok_or_else(|| ConfigError::ValidationError(format!("unknown device {name}")))
}

fn build_kinematics(
    config: &KinematicsConfig,
    members: &[SharedActuator],
) -> Result<Box<dyn kinematics::Kinematics>, ConfigError> {
    let infos: Vec<&ActuatorInfo> = members.iter().map(|a| a.info()).collect();
    kinematics::build(config, &infos)
}
