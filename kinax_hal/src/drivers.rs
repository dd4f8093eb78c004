//! Built-in drivers.

pub mod sim;
