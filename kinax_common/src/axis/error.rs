//! Logical-axis error taxonomy.
//!
//! Pre-dispatch errors (`OutOfRange`, `InterlockDenied`, `NoRoute`,
//! `ActuatorClaimed`) are returned synchronously and leave no side effects.
//! Post-dispatch errors latch a [`FaultFlags`] bit in the axis status; flags in
//! [`FaultFlags::CRITICAL_MASK`] keep the axis latched until acknowledged.

use crate::actuator::DriverError;
use bitflags::bitflags;
use thiserror::Error;

/// Errors surfaced by logical axes and kinematic transforms.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AxisError {
    /// Forward solution falls outside a declared physical limit.
    #[error("Out of range: {0}")]
    OutOfRange(String),

    /// Readings disagree with the forward-computed solution.
    #[error("Position inconsistency: {0}")]
    PositionInconsistency(String),

    /// Authorization refused by an interlock.
    #[error("Interlock denied: {0}")]
    InterlockDenied(String),

    /// A forbidden region moved under a live dependency mid-sequence.
    #[error("Sequencing conflict: {0}")]
    SequencingConflict(String),

    /// No legal route around the forbidden regions.
    #[error("No legal route: {0}")]
    NoRoute(String),

    /// Propagated verbatim from the driver.
    #[error("Actuator fault: {0}")]
    ActuatorFault(#[from] DriverError),

    /// Another in-flight plan already owns this actuator.
    #[error("Actuator {actuator} is claimed by {owner}")]
    ActuatorClaimed { actuator: String, owner: String },

    /// Members did not report arrival in time.
    #[error("Arrival timeout: {0}")]
    ArrivalTimeout(String),

    /// Operation not allowed in the current move state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Recovery state could not be read or written.
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl AxisError {
    /// Only sequencing conflicts may be retried with the same target.
    #[inline]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::SequencingConflict(_))
    }

    /// Fault flag latched when this error ends a move.
    pub const fn flag(&self) -> FaultFlags {
        match self {
            Self::OutOfRange(_) => FaultFlags::OUT_OF_RANGE,
            Self::PositionInconsistency(_) => FaultFlags::POSITION_INCONSISTENT,
            Self::InterlockDenied(_) => FaultFlags::INTERLOCK_DENIED,
            Self::SequencingConflict(_) => FaultFlags::SEQUENCING_CONFLICT,
            Self::NoRoute(_) => FaultFlags::NO_ROUTE,
            Self::ActuatorFault(_) => FaultFlags::ACTUATOR_FAULT,
            Self::ArrivalTimeout(_) => FaultFlags::ARRIVAL_TIMEOUT,
            Self::ActuatorClaimed { .. } | Self::InvalidState(_) | Self::Persistence(_) => {
                FaultFlags::empty()
            }
        }
    }
}

bitflags! {
    /// Latched per-axis fault flags.
    ///
    /// CRITICAL flags (latch the axis until acknowledged):
    /// POSITION_INCONSISTENT, ACTUATOR_FAULT, ARRIVAL_TIMEOUT.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FaultFlags: u8 {
        const OUT_OF_RANGE          = 0x01;
        /// **CRITICAL**
        const POSITION_INCONSISTENT = 0x02;
        const INTERLOCK_DENIED      = 0x04;
        const SEQUENCING_CONFLICT   = 0x08;
        const NO_ROUTE              = 0x10;
        /// **CRITICAL**
        const ACTUATOR_FAULT        = 0x20;
        /// **CRITICAL**
        const ARRIVAL_TIMEOUT       = 0x40;
    }
}

impl FaultFlags {
    pub const CRITICAL_MASK: Self = Self::from_bits_truncate(
        Self::POSITION_INCONSISTENT.bits()
            | Self::ACTUATOR_FAULT.bits()
            | Self::ARRIVAL_TIMEOUT.bits(),
    );

    #[inline]
    pub const fn has_critical(&self) -> bool {
        self.intersects(Self::CRITICAL_MASK)
    }

    /// Flag names for status output.
    pub fn names(&self) -> Vec<String> {
        self.iter_names().map(|(name, _)| name.to_string()).collect()
    }
}

impl Default for FaultFlags {
    fn default() -> Self {
        Self::empty()
    }
}
