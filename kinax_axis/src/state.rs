//! Move state machine for logical axes.

pub mod machine;

pub use machine::{MoveEvent, MoveStateMachine, Transition};
