//! # kinax common library
//!
//! Types shared by every crate in the workspace:
//!
//! - **actuator**: the driver contract (`read`, `start`, `stop`) consumed by
//!   logical axes, plus the construction-time [`actuator::ActuatorSpec`].
//! - **axis**: the logical-axis [`axis::state::MoveState`] and error taxonomy.
//! - **channel**: the key/value propagation contract for values and status.
//! - **config**: TOML loading via [`config::ConfigLoader`].
//! - **consts**: workspace-wide capacity limits.

pub mod actuator;
pub mod axis;
pub mod channel;
pub mod config;
pub mod consts;
pub mod prelude;
