//! Logical-axis shared types.

pub mod error;
pub mod state;
