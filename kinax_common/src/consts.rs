//! System-wide constants for the kinax workspace.
//!
//! Single source of truth for capacity limits and defaults.

use static_assertions::const_assert;

/// Maximum number of physical actuators backing one logical axis.
pub const MAX_MEMBERS: usize = 8;

/// Maximum number of waypoints in one sequence.
pub const MAX_WAYPOINTS: usize = 8;

/// Default supervisor poll interval in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Bounds for the configured poll interval.
pub const POLL_INTERVAL_MIN_MS: u64 = 1;
pub const POLL_INTERVAL_MAX_MS: u64 = 10_000;

/// Default timeout for one waypoint to arrive, in seconds.
pub const DEFAULT_MOVE_TIMEOUT_S: f64 = 300.0;

/// Default recovery state file name.
pub const DEFAULT_STATE_FILE: &str = "kinax_state.bin";

// Cone axes need four members, obstacle routes up to three waypoints.
const_assert!(MAX_MEMBERS >= 4);
const_assert!(MAX_WAYPOINTS >= 3);
const_assert!(POLL_INTERVAL_MIN_MS <= DEFAULT_POLL_INTERVAL_MS);
const_assert!(DEFAULT_POLL_INTERVAL_MS <= POLL_INTERVAL_MAX_MS);
