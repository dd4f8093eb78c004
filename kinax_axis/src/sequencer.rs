//! Route planning around forbidden rotation intervals.
//!
//! A rotation member may not rest in, or pass through, any forbidden
//! [`Interval`]. Intervals flagged `passable_when_lifted` may be crossed once a
//! lift member sits at its safe position. On periodic axes both traversal
//! directions are candidates; the shortest legal one wins, and a direct route
//! wins a tie against one that needs the lift.
//!
//! The interval bounds are computed from live state by the caller, both when
//! the route is planned and again right before each waypoint is dispatched.

use kinax_common::actuator::Limits;
use kinax_common::axis::error::AxisError;
use tracing::debug;

/// Closed forbidden interval of rotation positions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub lower: f64,
    pub upper: f64,
    pub passable_when_lifted: bool,
}

impl Interval {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self {
            lower: lower.min(upper),
            upper: lower.max(upper),
            passable_when_lifted: false,
        }
    }

    pub fn passable(mut self, passable_when_lifted: bool) -> Self {
        self.passable_when_lifted = passable_when_lifted;
        self
    }

    /// Whether `position` lies inside, on every turn when `period` is set.
    pub fn contains(&self, position: f64, period: Option<f64>) -> bool {
        match period {
            None => position >= self.lower && position <= self.upper,
            Some(p) => {
                let shifted = self.lower + (position - self.lower).rem_euclid(p);
                shifted <= self.upper
            }
        }
    }

    /// Whether travelling between `from` and `to` touches this interval.
    pub fn blocks(&self, from: f64, to: f64, period: Option<f64>) -> bool {
        let (lo, hi) = (from.min(to), from.max(to));
        match period {
            None => lo <= self.upper && hi >= self.lower,
            Some(p) => {
                // Some copy [lower + kp, upper + kp] must overlap [lo, hi].
                let k_min = ((lo - self.upper) / p).ceil();
                let k_max = ((hi - self.lower) / p).floor();
                k_min <= k_max
            }
        }
    }
}

/// Inputs for one routing decision.
#[derive(Debug, Clone, Copy)]
pub struct RouteRequest {
    pub current: f64,
    pub target: f64,
    pub limits: Limits,
    pub period: Option<f64>,
    pub lift_available: bool,
}

/// Chosen route.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Route {
    /// Raw rotation target; may differ from the request by whole turns.
    pub rotation_target: f64,
    /// Whether the lift must be raised for the traversal.
    pub lifted: bool,
    /// Travel distance.
    pub travel: f64,
}

/// Choose a legal route, or reject the request.
///
/// # Errors
/// - `OutOfRange` when no representation of the target is inside the limits
/// - `NoRoute` when the target rests in a forbidden interval or every
///   candidate path is blocked
pub fn plan_sequence(request: &RouteRequest, regions: &[Interval]) -> Result<Route, AxisError> {
    let RouteRequest {
        current,
        target,
        limits,
        period,
        lift_available,
    } = *request;

    if let Some(region) = regions.iter().find(|r| r.contains(target, period)) {
        return Err(AxisError::NoRoute(format!(
            "target {target} lies in forbidden region [{}, {}]",
            region.lower, region.upper
        )));
    }

    let candidates = candidate_targets(current, target, period, limits);
    let mut in_limits = candidates.iter().copied().filter(|t| limits.contains(*t)).peekable();
    if in_limits.peek().is_none() {
        return Err(AxisError::OutOfRange(format!(
            "target {target} outside rotation limits {limits}"
        )));
    }

    let mut best: Option<Route> = None;
    for candidate in in_limits {
        let hard = regions
            .iter()
            .any(|r| !r.passable_when_lifted && r.blocks(current, candidate, period));
        if hard {
            debug!(candidate, "route blocked by fixed obstacle");
            continue;
        }
        let lifted = regions
            .iter()
            .any(|r| r.passable_when_lifted && r.blocks(current, candidate, period));
        if lifted && !lift_available {
            debug!(candidate, "route needs a lift that is not fitted");
            continue;
        }
        let route = Route {
            rotation_target: candidate,
            lifted,
            travel: (candidate - current).abs(),
        };
        best = match best {
            Some(b) if (b.travel, b.lifted) <= (route.travel, route.lifted) => Some(b),
            _ => Some(route),
        };
    }

    best.ok_or_else(|| {
        AxisError::NoRoute(format!(
            "every path from {current} to {target} crosses a forbidden region"
        ))
    })
}

/// Every `target + k·period` inside `limits` on a periodic axis, nearest turns
/// first and the forward direction before the backward one; the direct path
/// otherwise.
fn candidate_targets(current: f64, target: f64, period: Option<f64>, limits: Limits) -> Vec<f64> {
    let Some(p) = period.filter(|p| *p > 0.0) else {
        return vec![target];
    };
    let forward = current + (target - current).rem_euclid(p);
    let turns = ((limits.upper - limits.lower) / p).ceil();
    let turns = if turns.is_finite() { turns as i64 + 1 } else { 1 };
    let mut candidates = vec![forward];
    for k in 1..=turns {
        let k = k as f64;
        candidates.push(forward - k * p);
        candidates.push(forward + k * p);
    }
    candidates.retain(|t| limits.contains(*t));
    candidates
}

/// Re-check one rotation step against live intervals right before dispatch.
///
/// # Errors
/// `SequencingConflict` when the step has become illegal.
pub fn check_rotation_step(
    from: f64,
    to: f64,
    period: Option<f64>,
    lifted: bool,
    regions: &[Interval],
) -> Result<(), AxisError> {
    for region in regions {
        if region.contains(to, period) {
            return Err(AxisError::SequencingConflict(format!(
                "waypoint {to} now lies in forbidden region [{}, {}]",
                region.lower, region.upper
            )));
        }
        if region.blocks(from, to, period) && !(region.passable_when_lifted && lifted) {
            return Err(AxisError::SequencingConflict(format!(
                "path {from} -> {to} now crosses forbidden region [{}, {}]",
                region.lower, region.upper
            )));
        }
    }
    Ok(())
}
