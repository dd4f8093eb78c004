//! # kinax HAL
//!
//! Pluggable actuator drivers behind the [`kinax_common::actuator::Actuator`]
//! contract.
//!
//! - [`DriverRegistry`] maps driver names to factories (no global state).
//! - [`drivers::sim`] provides virtual motors with a wall or manual clock,
//!   used by tests and by dry runs of an instrument configuration.

pub mod driver_registry;
pub mod drivers;

pub use driver_registry::DriverRegistry;
pub use drivers::sim::{SimClock, SimMotor};
