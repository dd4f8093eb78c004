//! Logical axis.
//!
//! Owns one kinematic transform and its member actuators, and drives every
//! move through the [`MoveStateMachine`]:
//!
//! 1. plan: snapshot readings, forward transform, limit check, interlocks,
//!    plan-ledger claim (any failure leaves the axis untouched)
//! 2. dispatch the current waypoint
//! 3. [`LogicalAxis::poll`] until the members report arrival, then either
//!    re-authorize and dispatch the next waypoint or verify the final one
//!
//! The axis never sleeps; the caller owns the polling cadence
//! (see [`crate::supervisor`]). Reconciliation runs at construction, after a
//! stop and after reconfiguration.

use crate::consistency;
use crate::interlock::Interlocks;
use crate::kinematics::{Kinematics, LiveState};
use crate::ledger::PlanLedger;
use crate::plan::{ActuatorPlan, LogicalTarget, MemberIndex, WaypointSequence};
use crate::recovery::{MemoryStore, RecoveryRecord, RecoveryStore};
use crate::state::{MoveEvent, MoveStateMachine, Transition};
use kinax_common::actuator::{ActuatorStatus, DriverError, SharedActuator};
use kinax_common::axis::error::{AxisError, FaultFlags};
use kinax_common::axis::state::MoveState;
use kinax_common::channel::{self, Channel, ChannelValue, Field, TracingChannel};
use kinax_common::consts::DEFAULT_MOVE_TIMEOUT_S;
use serde::Serialize;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Shared collaborators of every axis in a process.
#[derive(Clone)]
pub struct AxisEnv {
    pub channel: Arc<dyn Channel>,
    pub store: Arc<dyn RecoveryStore>,
    pub interlocks: Arc<Interlocks>,
    pub ledger: Arc<PlanLedger>,
}

impl Default for AxisEnv {
    fn default() -> Self {
        Self {
            channel: Arc::new(TracingChannel),
            store: Arc::new(MemoryStore::new()),
            interlocks: Arc::new(Interlocks::default()),
            ledger: Arc::new(PlanLedger::new()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AxisOptions {
    /// Maximum time for one waypoint to arrive.
    pub move_timeout: Duration,
}

impl Default for AxisOptions {
    fn default() -> Self {
        Self {
            move_timeout: Duration::from_secs_f64(DEFAULT_MOVE_TIMEOUT_S),
        }
    }
}

/// Everything an axis is built from.
pub struct AxisParts {
    pub name: String,
    pub unit: String,
    pub kinematics: Box<dyn Kinematics>,
    /// Member actuators in role order.
    pub members: Vec<SharedActuator>,
    /// Devices named by [`Kinematics::observed`], same order.
    pub observed: Vec<SharedActuator>,
}

/// Status snapshot for reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxisStatus {
    pub name: String,
    pub unit: String,
    pub kinematics: &'static str,
    pub state: MoveState,
    pub value: Option<f64>,
    pub target: Option<f64>,
    pub faults: Vec<String>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum Request {
    Logical(f64),
    Member { index: MemberIndex, target: f64 },
}

#[derive(Debug)]
struct ActiveMove {
    sequence: WaypointSequence,
    cursor: usize,
    dispatched_at: Instant,
}

impl ActiveMove {
    fn waypoint(&self) -> Result<&ActuatorPlan, AxisError> {
        self.sequence.get(self.cursor).ok_or_else(|| {
            AxisError::InvalidState(format!("no waypoint {} in sequence", self.cursor))
        })
    }

    fn is_last(&self) -> bool {
        self.cursor + 1 >= self.sequence.len()
    }
}

/// One consistent set of readings.
#[derive(Debug)]
struct Snapshot {
    positions: Vec<f64>,
    precisions: Vec<f64>,
    statuses: Vec<ActuatorStatus>,
    observed: Vec<f64>,
}

impl Snapshot {
    fn live(&self) -> LiveState<'_> {
        LiveState::new(&self.positions, &self.precisions).with_observed(&self.observed)
    }
}

pub struct LogicalAxis {
    name: String,
    unit: String,
    members: Vec<SharedActuator>,
    observed: Vec<SharedActuator>,
    kinematics: Box<dyn Kinematics>,
    machine: MoveStateMachine,
    active: Option<ActiveMove>,
    /// Target the axis is known to hold while `Verified`.
    verified: Option<LogicalTarget>,
    last_value: Option<f64>,
    /// Set when the last stop left the members off the transform.
    interrupted: bool,
    faults: FaultFlags,
    last_error: Option<AxisError>,
    env: AxisEnv,
    options: AxisOptions,
}

impl LogicalAxis {
    /// Build the axis and reconcile it with its persisted record.
    ///
    /// # Errors
    /// `InvalidState` when the member or observed counts do not match the
    /// transform.
    pub fn new(parts: AxisParts, env: AxisEnv, options: AxisOptions) -> Result<Self, AxisError> {
        check_shape(parts.kinematics.as_ref(), &parts.members, &parts.observed)?;
        let mut axis = Self {
            name: parts.name,
            unit: parts.unit,
            members: parts.members,
            observed: parts.observed,
            kinematics: parts.kinematics,
            machine: MoveStateMachine::new(),
            active: None,
            verified: None,
            last_value: None,
            interrupted: false,
            faults: FaultFlags::empty(),
            last_error: None,
            env,
            options,
        };
        info!(
            axis = %axis.name,
            kinematics = axis.kinematics.kind(),
            members = axis.members.len(),
            "logical axis created"
        );
        axis.reconcile_with_store();
        Ok(axis)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    #[inline]
    pub fn state(&self) -> MoveState {
        self.machine.state()
    }

    pub fn faults(&self) -> FaultFlags {
        self.faults
    }

    pub fn last_error(&self) -> Option<&AxisError> {
        self.last_error.as_ref()
    }

    pub fn kinematics(&self) -> &dyn Kinematics {
        self.kinematics.as_ref()
    }

    pub fn members(&self) -> &[SharedActuator] {
        &self.members
    }

    /// Member actuator playing `role`.
    pub fn member(&self, role: &str) -> Option<&SharedActuator> {
        self.role_index(role).and_then(|i| self.members.get(i))
    }

    fn role_index(&self, role: &str) -> Option<MemberIndex> {
        self.kinematics.roles().iter().position(|r| *r == role)
    }

    // ─── Moves ──────────────────────────────────────────────────────

    /// Plan and dispatch a move to logical `target`, cancelling any move in
    /// flight.
    ///
    /// # Errors
    /// Pre-dispatch failures (`OutOfRange`, `NoRoute`, `InterlockDenied`,
    /// `SequencingConflict`, `ActuatorClaimed`) leave the axis as it was.
    /// A driver refusing the command faults the axis.
    pub fn start(&mut self, target: f64) -> Result<(), AxisError> {
        self.cancel_in_flight()?;
        self.begin(Request::Logical(target))
    }

    /// Jog the single member playing `role`.
    ///
    /// # Errors
    /// `PositionInconsistency` while the axis is latched inconsistent,
    /// `InvalidState` while faulted or for an unknown role.
    pub fn move_member(&mut self, role: &str, target: f64) -> Result<(), AxisError> {
        let index = self.role_index(role).ok_or_else(|| {
            AxisError::InvalidState(format!("{} has no member role {role}", self.name))
        })?;
        match self.state() {
            MoveState::Inconsistent => {
                return Err(AxisError::PositionInconsistency(format!(
                    "{} is inconsistent; re-plan or acknowledge before jogging {role}",
                    self.name
                )));
            }
            MoveState::Faulted => {
                return Err(AxisError::InvalidState(format!(
                    "{} is faulted; acknowledge before jogging {role}",
                    self.name
                )));
            }
            _ => {}
        }
        self.cancel_in_flight()?;
        self.begin(Request::Member { index, target })
    }

    fn cancel_in_flight(&mut self) -> Result<(), AxisError> {
        if self.state().is_moving() {
            info!(axis = %self.name, "cancelling move in flight");
            self.stop()?;
        }
        Ok(())
    }

    fn begin(&mut self, request: Request) -> Result<(), AxisError> {
        self.transition(MoveEvent::Plan)?;
        let sequence = match self.plan(request) {
            Ok(sequence) => sequence,
            Err(e) => {
                warn!(axis = %self.name, error = %e, "move rejected");
                self.transition(MoveEvent::PlanRejected)?;
                return Err(e);
            }
        };
        debug!(
            axis = %self.name,
            waypoints = sequence.len(),
            target = ?sequence.logical().map(|t| t.value),
            "planned"
        );
        if let Some(logical) = sequence.logical() {
            self.publish(&self.name, Field::Target, ChannelValue::Number(logical.value));
        }
        self.verified = None;
        self.interrupted = false;
        self.faults = FaultFlags::empty();
        self.last_error = None;
        self.active = Some(ActiveMove {
            sequence,
            cursor: 0,
            dispatched_at: Instant::now(),
        });
        self.dispatch_current()
    }

    fn plan(&self, request: Request) -> Result<WaypointSequence, AxisError> {
        let snap = self.snapshot()?;
        let live = snap.live();
        let sequence = match request {
            Request::Logical(target) => self.kinematics.forward(target, &live)?,
            Request::Member { index, target } => {
                let mut plan = ActuatorPlan::new();
                plan.set(index, target, live.precision(index))?;
                WaypointSequence::jog(plan)
            }
        };
        self.check_limits(&sequence)?;
        let first = sequence
            .get(0)
            .ok_or_else(|| AxisError::NoRoute(format!("{}: empty sequence", self.name)))?;
        self.authorize(sequence.logical(), first, &live)?;

        let names: Vec<&str> = sequence
            .members()
            .into_iter()
            .filter_map(|i| self.members.get(i).map(|a| a.name()))
            .collect();
        self.env.ledger.claim(&self.name, &names)?;
        Ok(sequence)
    }

    fn check_limits(&self, sequence: &WaypointSequence) -> Result<(), AxisError> {
        for mv in sequence.waypoints().iter().flat_map(|w| w.moves()) {
            let actuator = self.member_at(mv.member)?;
            let limits = actuator.info().limits;
            if !limits.contains(mv.target) {
                return Err(AxisError::OutOfRange(format!(
                    "{} target {} outside limits {limits}",
                    actuator.name(),
                    mv.target
                )));
            }
        }
        Ok(())
    }

    /// Interlocks for the axis and every member commanded by `waypoint`,
    /// then the transform's own live re-check.
    fn authorize(
        &self,
        logical: Option<LogicalTarget>,
        waypoint: &ActuatorPlan,
        live: &LiveState<'_>,
    ) -> Result<(), AxisError> {
        if let Some(target) = logical {
            let (allowed, reason) = self.env.interlocks.is_target_allowed(&self.name, target.value);
            if !allowed {
                return Err(AxisError::InterlockDenied(reason));
            }
        }
        for mv in waypoint.moves() {
            let actuator = self.member_at(mv.member)?;
            let (allowed, reason) = self
                .env
                .interlocks
                .is_target_allowed(actuator.name(), mv.target);
            if !allowed {
                return Err(AxisError::InterlockDenied(reason));
            }
        }
        self.kinematics.revalidate(waypoint, live)
    }

    fn dispatch_current(&mut self) -> Result<(), AxisError> {
        let waypoint = match &self.active {
            Some(active) => active.waypoint()?.clone(),
            None => return Err(AxisError::InvalidState("no active move".to_string())),
        };
        for mv in waypoint.moves() {
            let actuator = self.member_at(mv.member)?.clone();
            if let Err(e) = actuator.start(mv.target) {
                return Err(self.fail(e.into()));
            }
            self.publish(actuator.name(), Field::Target, ChannelValue::Number(mv.target));
        }
        if let Some(active) = self.active.as_mut() {
            active.dispatched_at = Instant::now();
            info!(
                axis = %self.name,
                waypoint = active.cursor + 1,
                of = active.sequence.len(),
                "dispatched"
            );
        }
        self.transition(MoveEvent::Dispatch)?;
        Ok(())
    }

    /// Advance the active move by one observation.
    ///
    /// Returns the state after the poll. Post-dispatch failures are latched
    /// in the status and also returned.
    pub fn poll(&mut self) -> Result<MoveState, AxisError> {
        match self.state() {
            MoveState::Dispatched => {
                self.transition(MoveEvent::Polled)?;
            }
            MoveState::Arriving => {}
            MoveState::Stopped => {
                self.reconcile_after_stop()?;
                return Ok(self.state());
            }
            other => return Ok(other),
        }

        let snap = match self.snapshot() {
            Ok(snap) => snap,
            Err(e) => return Err(self.fail(e)),
        };
        let (waypoint, is_last, dispatched_at) = match &self.active {
            Some(active) => (active.waypoint()?.clone(), active.is_last(), active.dispatched_at),
            None => return Err(AxisError::InvalidState("no active move".to_string())),
        };

        for mv in waypoint.moves() {
            if snap.statuses.get(mv.member).is_some_and(|s| s.is_error()) {
                let actuator = self.member_at(mv.member)?.name().to_string();
                let fault = DriverError::Fault {
                    actuator,
                    reason: "driver reports ERROR".to_string(),
                };
                return Err(self.fail(fault.into()));
            }
        }
        let busy = waypoint
            .members()
            .any(|i| snap.statuses.get(i).is_some_and(|s| s.is_busy()));
        if busy {
            if dispatched_at.elapsed() > self.options.move_timeout {
                let e = AxisError::ArrivalTimeout(format!(
                    "{} waypoint not reached within {:?}",
                    self.name, self.options.move_timeout
                ));
                return Err(self.fail(e));
            }
            return Ok(self.state());
        }

        let live = snap.live();
        if let Err(e) = consistency::check_arrival(&waypoint, &live) {
            return Err(self.mismatch(e));
        }
        if !is_last {
            return self.advance(&live);
        }
        self.finish(&waypoint, &snap)
    }

    /// Move on to the next waypoint once the current one has arrived.
    fn advance(&mut self, live: &LiveState<'_>) -> Result<MoveState, AxisError> {
        let (logical, next) = match self.active.as_mut() {
            Some(active) => {
                active.cursor += 1;
                (active.sequence.logical(), active.waypoint()?.clone())
            }
            None => return Err(AxisError::InvalidState("no active move".to_string())),
        };
        if let Err(e) = self.authorize(logical, &next, live) {
            warn!(axis = %self.name, error = %e, "next waypoint refused, sequence aborted");
            self.active = None;
            self.env.ledger.release(&self.name);
            self.transition(MoveEvent::Conflict)?;
            self.latch(&e);
            return Err(e);
        }
        self.dispatch_current()?;
        Ok(self.state())
    }

    fn finish(&mut self, waypoint: &ActuatorPlan, snap: &Snapshot) -> Result<MoveState, AxisError> {
        let logical = self.active.take().and_then(|a| a.sequence.logical());
        self.env.ledger.release(&self.name);
        let live = snap.live();

        let Some(target) = logical else {
            // Jog: nothing to verify against but the transform itself.
            return match self.kinematics.inverse(&live) {
                Ok(value) => {
                    self.transition(MoveEvent::Released)?;
                    self.accept_value(value, None, &snap.positions);
                    Ok(self.state())
                }
                Err(e) => Err(self.mismatch(e)),
            };
        };

        match consistency::verify(self.kinematics.as_ref(), waypoint, &target, &live) {
            Ok(value) => {
                self.transition(MoveEvent::Arrived)?;
                self.verified = Some(target);
                self.accept_value(value, Some(target.value), &snap.positions);
                info!(axis = %self.name, value, "verified");
                Ok(self.state())
            }
            Err(e) => Err(self.mismatch(e)),
        }
    }

    // ─── Stop and recovery ──────────────────────────────────────────

    /// Halt every member of the active plan in parallel.
    ///
    /// A no-op at rest. Latched states halt all members but stay latched.
    /// A moving axis goes to `Stopped` and back to `Idle` once the logical
    /// value has been rebuilt from the readings, or to `Inconsistent` when
    /// no value can be rebuilt.
    ///
    /// # Errors
    /// The first driver error from the stop commands; the state change
    /// happens regardless.
    pub fn stop(&mut self) -> Result<(), AxisError> {
        let state = self.state();
        if !state.accepts_stop() {
            debug!(axis = %self.name, %state, "stop ignored at rest");
            return Ok(());
        }
        if state.is_latched() || state == MoveState::Stopped {
            let all: Vec<MemberIndex> = (0..self.members.len()).collect();
            let result = self.halt(&all);
            if state == MoveState::Stopped {
                let _ = self.reconcile_after_stop();
            }
            return result;
        }

        let indices = self
            .active
            .take()
            .map(|a| a.sequence.members())
            .unwrap_or_else(|| (0..self.members.len()).collect());
        let result = self.halt(&indices);
        self.env.ledger.release(&self.name);
        self.transition(MoveEvent::Stop)?;
        info!(axis = %self.name, "stopped");
        let _ = self.reconcile_after_stop();
        result
    }

    fn halt(&self, indices: &[MemberIndex]) -> Result<(), AxisError> {
        let results: Vec<Result<(), DriverError>> = thread::scope(|s| {
            let handles: Vec<_> = indices
                .iter()
                .filter_map(|&i| self.members.get(i))
                .map(|actuator| s.spawn(move || actuator.stop()))
                .collect();
            handles
                .into_iter()
                .map(|h| {
                    h.join().unwrap_or_else(|_| {
                        Err(DriverError::Communication("stop thread panicked".to_string()))
                    })
                })
                .collect()
        });
        match results.into_iter().find_map(Result::err) {
            Some(e) => {
                warn!(axis = %self.name, error = %e, "stop command failed");
                Err(e.into())
            }
            None => Ok(()),
        }
    }

    /// `Stopped → Idle` once every member is at rest.
    ///
    /// Readings that no longer satisfy the transform are reconstructed with
    /// [`Kinematics::recover`]; when even that fails the axis latches
    /// `Inconsistent`. Members that cannot be read keep the axis `Stopped`
    /// and the read error is returned.
    fn reconcile_after_stop(&mut self) -> Result<(), AxisError> {
        let snap = match self.snapshot() {
            Ok(snap) => snap,
            Err(e) => {
                warn!(axis = %self.name, error = %e, "cannot read members after stop");
                self.last_error = Some(e.clone());
                return Err(e);
            }
        };
        if snap.statuses.iter().any(|s| s.is_busy()) {
            debug!(axis = %self.name, "members still settling");
            return Ok(());
        }
        let live = snap.live();
        let (value, interrupted) = match self.kinematics.inverse(&live) {
            Ok(value) => (value, false),
            Err(e) => match self.kinematics.recover(&live) {
                Ok(value) => {
                    warn!(axis = %self.name, error = %e, value, "members stopped off the transform");
                    (value, true)
                }
                Err(_) => {
                    warn!(axis = %self.name, error = %e, "reconciliation failed");
                    self.transition(MoveEvent::Detect)?;
                    self.latch(&e);
                    return Ok(());
                }
            },
        };
        self.transition(MoveEvent::Reconciled)?;
        self.interrupted = interrupted;
        self.accept_value(value, None, &snap.positions);
        info!(axis = %self.name, value, "reconciled after stop");
        Ok(())
    }

    /// Adopt or capture recovery state at construction.
    fn reconcile_with_store(&mut self) {
        let stored = match self.env.store.load(&self.name) {
            Ok(record) => record,
            Err(e) => {
                warn!(axis = %self.name, error = %e, "recovery record unreadable, capturing afresh");
                None
            }
        };
        let snap = match self.snapshot() {
            Ok(snap) => snap,
            Err(e) => {
                warn!(axis = %self.name, error = %e, "cannot read members at startup");
                self.last_error = Some(e);
                self.publish_status();
                return;
            }
        };
        let live = snap.live();
        self.kinematics.reconcile(stored.as_ref(), &live);
        if let Some(record) = &stored {
            if !record.matches(&snap.positions, &snap.precisions) {
                warn!(
                    axis = %self.name,
                    stored = ?record.reference_positions,
                    now = ?snap.positions,
                    "members moved since last save"
                );
            }
        }
        match self.kinematics.inverse(&live) {
            Ok(value) => self.accept_value(value, None, &snap.positions),
            Err(e) => {
                warn!(axis = %self.name, error = %e, "inconsistent at startup");
                // Idle → Inconsistent is always legal.
                let _ = self.transition(MoveEvent::Detect);
                self.latch(&e);
            }
        }
        self.publish_status();
    }

    /// Replace the transform, e.g. after a calibration change.
    ///
    /// A move in flight is stopped first. The new transform is reconciled
    /// against the stored record, and a `Verified` axis falls back to `Idle`.
    pub fn reconfigure(&mut self, kinematics: Box<dyn Kinematics>) -> Result<(), AxisError> {
        check_shape(kinematics.as_ref(), &self.members, &self.observed)?;
        if kinematics.roles() != self.kinematics.roles()
            || kinematics.observed() != self.kinematics.observed()
        {
            return Err(AxisError::InvalidState(format!(
                "{}: reconfiguration must keep roles and observed devices",
                self.name
            )));
        }
        self.cancel_in_flight()?;
        info!(axis = %self.name, kinematics = kinematics.kind(), "reconfiguring");
        self.kinematics = kinematics;
        if self.state() == MoveState::Verified {
            self.transition(MoveEvent::Settle)?;
        }
        self.verified = None;
        self.reconcile_with_store();
        Ok(())
    }

    // ─── Checks ─────────────────────────────────────────────────────

    /// Check the resting state against the transform and, when `Verified`,
    /// against the verified target. Never commands hardware.
    ///
    /// # Errors
    /// `PositionInconsistency` when the check fails (the axis latches) or the
    /// axis is already latched inconsistent; `InvalidState` while moving or
    /// faulted.
    pub fn verify(&mut self) -> Result<f64, AxisError> {
        let state = self.state();
        match state {
            MoveState::Inconsistent => {
                return Err(AxisError::PositionInconsistency(format!(
                    "{} is latched inconsistent",
                    self.name
                )));
            }
            MoveState::Faulted => {
                return Err(AxisError::InvalidState(format!("{} is faulted", self.name)));
            }
            s if s.is_moving() => {
                return Err(AxisError::InvalidState(format!("{} is moving", self.name)));
            }
            _ => {}
        }
        let snap = self.snapshot()?;
        let expected = if state == MoveState::Verified {
            self.verified
        } else {
            None
        };
        match consistency::verify_resting(self.kinematics.as_ref(), &snap.live(), expected) {
            Ok(value) => Ok(value),
            Err(e) => {
                warn!(axis = %self.name, error = %e, "resting check failed");
                self.transition(MoveEvent::Detect)?;
                self.latch(&e);
                Err(e)
            }
        }
    }

    /// Current logical value from the readings. Publishes it.
    ///
    /// After a stop that left the members off the transform, the recovered
    /// estimate is reported until the next move.
    pub fn read(&self) -> Result<f64, AxisError> {
        let snap = self.snapshot()?;
        let live = snap.live();
        let value = match self.kinematics.inverse(&live) {
            Ok(value) => value,
            Err(_) if self.interrupted && self.state() == MoveState::Idle => {
                self.kinematics.recover(&live)?
            }
            Err(e) => return Err(e),
        };
        self.publish(&self.name, Field::Value, ChannelValue::Number(value));
        Ok(value)
    }

    /// Clear latched faults.
    pub fn acknowledge(&mut self) -> Result<(), AxisError> {
        if self.state().is_latched() {
            self.transition(MoveEvent::Acknowledge)?;
        }
        info!(axis = %self.name, faults = ?self.faults.names(), "acknowledged");
        self.faults = FaultFlags::empty();
        self.last_error = None;
        self.publish_status();
        Ok(())
    }

    pub fn status(&self) -> AxisStatus {
        let target = self
            .active
            .as_ref()
            .and_then(|a| a.sequence.logical())
            .or(self.verified)
            .map(|t| t.value);
        AxisStatus {
            name: self.name.clone(),
            unit: self.unit.clone(),
            kinematics: self.kinematics.kind(),
            state: self.state(),
            value: self.last_value,
            target,
            faults: self.faults.names(),
            last_error: self.last_error.as_ref().map(ToString::to_string),
        }
    }

    // ─── Internals ──────────────────────────────────────────────────

    fn member_at(&self, index: MemberIndex) -> Result<&SharedActuator, AxisError> {
        self.members.get(index).ok_or_else(|| {
            AxisError::InvalidState(format!("{} has no member {index}", self.name))
        })
    }

    fn snapshot(&self) -> Result<Snapshot, AxisError> {
        let mut snap = Snapshot {
            positions: Vec::with_capacity(self.members.len()),
            precisions: Vec::with_capacity(self.members.len()),
            statuses: Vec::with_capacity(self.members.len()),
            observed: Vec::with_capacity(self.observed.len()),
        };
        for actuator in &self.members {
            let reading = actuator.read()?;
            snap.positions.push(reading.value);
            snap.precisions.push(actuator.info().precision);
            snap.statuses.push(reading.status);
        }
        for device in &self.observed {
            snap.observed.push(device.read()?.value);
        }
        Ok(snap)
    }

    fn transition(&mut self, event: MoveEvent) -> Result<MoveState, AxisError> {
        let from = self.state();
        match self.machine.handle_event(event) {
            Transition::Ok(to) => {
                debug!(axis = %self.name, %from, %to, ?event, "transition");
                self.publish_status();
                Ok(to)
            }
            Transition::Rejected(reason) => Err(AxisError::InvalidState(format!(
                "{}: {event:?} in {from}: {reason}",
                self.name
            ))),
        }
    }

    /// Post-dispatch failure: halt, release, latch `Faulted`.
    fn fail(&mut self, e: AxisError) -> AxisError {
        let indices = self
            .active
            .take()
            .map(|a| a.sequence.members())
            .unwrap_or_else(|| (0..self.members.len()).collect());
        let _ = self.halt(&indices);
        self.env.ledger.release(&self.name);
        if let Err(rejected) = self.transition(MoveEvent::Fault) {
            warn!(axis = %self.name, error = %rejected, "fault transition refused");
        }
        error!(axis = %self.name, error = %e, "move faulted");
        self.latch(&e);
        e
    }

    /// Readings disagree with the plan: latch `Inconsistent`.
    fn mismatch(&mut self, e: AxisError) -> AxisError {
        self.active = None;
        self.env.ledger.release(&self.name);
        if let Err(rejected) = self.transition(MoveEvent::Mismatch) {
            warn!(axis = %self.name, error = %rejected, "mismatch transition refused");
        }
        error!(axis = %self.name, error = %e, "position inconsistency");
        self.latch(&e);
        e
    }

    fn latch(&mut self, e: &AxisError) {
        self.faults |= e.flag();
        self.last_error = Some(e.clone());
        self.publish_status();
    }

    fn accept_value(&mut self, value: f64, target: Option<f64>, positions: &[f64]) {
        self.last_value = Some(value);
        self.publish(&self.name, Field::Value, ChannelValue::Number(value));
        self.persist(target, positions);
    }

    /// Failures are logged only; a move never fails because of them.
    fn persist(&self, target: Option<f64>, positions: &[f64]) {
        let record = RecoveryRecord::new(self.kinematics.applied_offset(), positions.to_vec(), target);
        if let Err(e) = self.env.store.save(&self.name, &record) {
            warn!(axis = %self.name, error = %e, "failed to persist recovery record");
        }
    }

    fn publish(&self, device: &str, field: Field, value: ChannelValue) {
        self.env.channel.publish(&channel::key(device, field), value);
    }

    fn publish_status(&self) {
        let summary = self.state().summary();
        self.publish(
            &self.name,
            Field::Status,
            ChannelValue::Text(summary.as_str().to_string()),
        );
    }
}

fn check_shape(
    kinematics: &dyn Kinematics,
    members: &[SharedActuator],
    observed: &[SharedActuator],
) -> Result<(), AxisError> {
    if members.len() != kinematics.roles().len() {
        return Err(AxisError::InvalidState(format!(
            "{} needs {} members, got {}",
            kinematics.kind(),
            kinematics.roles().len(),
            members.len()
        )));
    }
    if observed.len() != kinematics.observed().len() {
        return Err(AxisError::InvalidState(format!(
            "{} observes {} devices, got {}",
            kinematics.kind(),
            kinematics.observed().len(),
            observed.len()
        )));
    }
    Ok(())
}

// ─── Tests ──────────────────────────────────────────────────────────
