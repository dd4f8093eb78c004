//! Driver registry.
//!
//! Maps driver names to factories. Constructed at startup and passed to the
//! device context by value; there is no process-global registry.

use crate::drivers::sim::{self, SimClock};
use kinax_common::actuator::{ActuatorSpec, DriverError, DriverFactory, SharedActuator};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Registry of available actuator drivers.
pub struct DriverRegistry {
    factories: HashMap<String, DriverFactory>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with the `sim` driver bound to `clock`.
    pub fn with_simulation(clock: Arc<SimClock>) -> Self {
        let mut registry = Self::new();
        let factory: DriverFactory = Box::new(move |spec| sim::create(spec, &clock));
        registry.factories.insert(sim::DRIVER_NAME.to_string(), factory);
        registry
    }

    /// # Errors
    /// `DriverError::DuplicateDriver` if `name` is already registered.
    pub fn register(&mut self, name: &str, factory: DriverFactory) -> Result<(), DriverError> {
        if self.factories.contains_key(name) {
            return Err(DriverError::DuplicateDriver(name.to_string()));
        }
        self.factories.insert(name.to_string(), factory);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Instantiate the actuator described by `spec`.
    ///
    /// # Errors
    /// `DriverError::DriverNotFound` for an unknown driver, or whatever the
    /// factory reports.
    pub fn create(&self, spec: &ActuatorSpec) -> Result<SharedActuator, DriverError> {
        let factory = self
            .factories
            .get(&spec.driver)
            .ok_or_else(|| DriverError::DriverNotFound(spec.driver.clone()))?;
        debug!(actuator = %spec.name, driver = %spec.driver, "creating actuator");
        factory(spec)
    }

    /// Registered driver names, sorted.
    pub fn list_drivers(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}
