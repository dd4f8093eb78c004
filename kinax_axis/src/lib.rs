//! # kinax axis
//!
//! Constrained logical axes for beamline instruments. A logical axis presents
//! one scalar (an energy, a scattering angle, a cone angle) and drives a
//! coordinated group of physical actuators to realise it.
//!
//! ## Layers
//!
//! 1. **kinematics**: forward/inverse transforms: double monochromator,
//!    counter-rotation, cone and obstacle-constrained axes
//! 2. **sequencer**: waypoint ordering around forbidden regions
//! 3. **interlock** / **ledger**: authorization before anything moves
//! 4. **axis**: the [`LogicalAxis`] and its move state machine
//! 5. **consistency** / **recovery**: post-move verification and the
//!    persisted offsets that survive a restart
//! 6. **context** / **supervisor**: building devices from configuration and
//!    polling moves to completion
//!
//! No axis ever reports a value it has not checked against the transform.

pub mod axis;
pub mod config;
pub mod consistency;
pub mod context;
pub mod interlock;
pub mod kinematics;
pub mod ledger;
pub mod plan;
pub mod recovery;
pub mod sequencer;
pub mod state;
pub mod supervisor;

pub use axis::{AxisEnv, AxisOptions, AxisParts, AxisStatus, LogicalAxis};
pub use config::{InstrumentConfig, KinematicsConfig, load_config};
pub use context::{AxisHandle, ContextError, DeviceContext};
pub use kinematics::{Kinematics, LiveState};
pub use recovery::{FileStore, MemoryStore, RecoveryRecord, RecoveryStore};
pub use supervisor::{PollStats, Supervisor};
