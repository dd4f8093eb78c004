//! Obstacle-constrained rotation.
//!
//! A rotation member routed around forbidden intervals, optionally with a
//! lift member that can raise the load clear of low obstacles. Intervals may
//! be fixed or follow a live device (the angular shadow of a movable
//! beamstop). When a route needs the lift the sequence is:
//!
//! ```text
//! [lift → safe] → [rotation → target] → [lift → where it was]
//! ```

use super::{Kinematics, LiveState, is_positive, periodic_distance, wrap};
use crate::plan::{ActuatorPlan, LogicalTarget, WaypointSequence};
use crate::sequencer::{self, Interval, RouteRequest};
use kinax_common::actuator::Limits;
use kinax_common::axis::error::AxisError;
use kinax_common::config::ConfigError;
use serde::{Deserialize, Serialize};

const ROTATION_ONLY: [&str; 1] = ["rotation"];
const WITH_LIFT: [&str; 2] = ["rotation", "lift"];

const ROTATION: usize = 0;
const LIFT: usize = 1;

/// Forbidden region as configured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegionSpec {
    /// Fixed interval.
    Fixed {
        lower: f64,
        upper: f64,
        #[serde(default)]
        passable_when_lifted: bool,
    },
    /// Interval centred on `source + offset`.
    Shadow {
        source: String,
        #[serde(default)]
        offset: f64,
        half_width: f64,
        #[serde(default)]
        passable_when_lifted: bool,
    },
}

/// Lift member settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiftSpec {
    /// Position at which lift-passable regions may be crossed.
    pub safe_position: f64,
}

/// Obstacle calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ObstacleCalibration {
    /// Rotation period, e.g. 360 for a full circle.
    #[serde(default)]
    pub period: Option<f64>,
    #[serde(default)]
    pub lift: Option<LiftSpec>,
    #[serde(default)]
    pub regions: Vec<RegionSpec>,
}

impl ObstacleCalibration {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(p) = self.period {
            if !is_positive(p) {
                return Err(ConfigError::ValidationError(format!(
                    "period must be positive, got {p}"
                )));
            }
        }
        for region in &self.regions {
            let (width, passable) = match region {
                RegionSpec::Fixed {
                    lower,
                    upper,
                    passable_when_lifted,
                } => {
                    if lower > upper {
                        return Err(ConfigError::ValidationError(format!(
                            "region [{lower}, {upper}] has lower > upper"
                        )));
                    }
                    (upper - lower, *passable_when_lifted)
                }
                RegionSpec::Shadow {
                    half_width,
                    passable_when_lifted,
                    ..
                } => {
                    if !is_positive(*half_width) {
                        return Err(ConfigError::ValidationError(
                            "shadow half_width must be positive".to_string(),
                        ));
                    }
                    (2.0 * half_width, *passable_when_lifted)
                }
            };
            if let Some(p) = self.period {
                if width >= p {
                    return Err(ConfigError::ValidationError(format!(
                        "region width {width} covers the whole period"
                    )));
                }
            }
            if passable && self.lift.is_none() {
                return Err(ConfigError::ValidationError(
                    "passable_when_lifted region needs a lift".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Distinct shadow sources, in declaration order.
    pub fn sources(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for region in &self.regions {
            if let RegionSpec::Shadow { source, .. } = region {
                if !out.contains(source) {
                    out.push(source.clone());
                }
            }
        }
        out
    }

    pub fn roles(&self) -> &'static [&'static str] {
        if self.lift.is_some() {
            &WITH_LIFT
        } else {
            &ROTATION_ONLY
        }
    }
}

#[derive(Debug, Clone)]
pub struct ObstacleAxis {
    cal: ObstacleCalibration,
    limits: Limits,
    sources: Vec<String>,
}

impl ObstacleAxis {
    pub fn new(cal: ObstacleCalibration, rotation_limits: Limits) -> Result<Self, ConfigError> {
        cal.validate()?;
        let sources = cal.sources();
        Ok(Self {
            cal,
            limits: rotation_limits,
            sources,
        })
    }

    /// Forbidden intervals evaluated against live observed values.
    pub fn regions(&self, live: &LiveState<'_>) -> Result<Vec<Interval>, AxisError> {
        self.cal
            .regions
            .iter()
            .map(|spec| match spec {
                RegionSpec::Fixed {
                    lower,
                    upper,
                    passable_when_lifted,
                } => Ok(Interval::new(*lower, *upper).passable(*passable_when_lifted)),
                RegionSpec::Shadow {
                    source,
                    offset,
                    half_width,
                    passable_when_lifted,
                } => {
                    let index = self
                        .sources
                        .iter()
                        .position(|s| s == source)
                        .unwrap_or(usize::MAX);
                    let centre = live.observed.get(index).copied().ok_or_else(|| {
                        AxisError::SequencingConflict(format!("no live value for {source}"))
                    })? + offset;
                    Ok(Interval::new(centre - half_width, centre + half_width)
                        .passable(*passable_when_lifted))
                }
            })
            .collect()
    }

    fn lift_is_safe(&self, live: &LiveState<'_>) -> bool {
        match (&self.cal.lift, live.positions.get(LIFT)) {
            (Some(spec), Some(pos)) => (pos - spec.safe_position).abs() <= live.precision(LIFT),
            _ => false,
        }
    }

    fn logical(&self, rotation: f64) -> f64 {
        match self.cal.period {
            Some(p) => wrap(rotation, p),
            None => rotation,
        }
    }
}

impl Kinematics for ObstacleAxis {
    fn kind(&self) -> &'static str {
        "obstacle"
    }

    fn roles(&self) -> &[&'static str] {
        self.cal.roles()
    }

    fn observed(&self) -> &[String] {
        &self.sources
    }

    fn forward(&self, target: f64, live: &LiveState<'_>) -> Result<WaypointSequence, AxisError> {
        if !target.is_finite() {
            return Err(AxisError::OutOfRange(format!("rotation target {target}")));
        }
        let regions = self.regions(live)?;
        let request = RouteRequest {
            current: live.position(ROTATION)?,
            target,
            limits: self.limits,
            period: self.cal.period,
            lift_available: self.cal.lift.is_some(),
        };
        let route = sequencer::plan_sequence(&request, &regions)?;

        let logical = LogicalTarget {
            value: self.logical(target),
            tolerance: self.tolerance(target, live),
        };
        let mut rotate = ActuatorPlan::new();
        rotate.set(ROTATION, route.rotation_target, live.precision(ROTATION))?;

        let (true, Some(lift)) = (route.lifted, &self.cal.lift) else {
            return Ok(WaypointSequence::single(logical, rotate));
        };
        let rest = live.position(LIFT)?;
        let mut raise = ActuatorPlan::new();
        raise.set(LIFT, lift.safe_position, live.precision(LIFT))?;
        let mut lower = ActuatorPlan::new();
        lower.set(LIFT, rest, live.precision(LIFT))?;

        let mut sequence = WaypointSequence::new(logical);
        sequence.push(raise)?;
        sequence.push(rotate)?;
        sequence.push(lower)?;
        Ok(sequence)
    }

    fn inverse(&self, live: &LiveState<'_>) -> Result<f64, AxisError> {
        Ok(self.logical(live.position(ROTATION)?))
    }

    fn tolerance(&self, _target: f64, live: &LiveState<'_>) -> f64 {
        live.precision(ROTATION)
    }

    fn distance(&self, a: f64, b: f64) -> f64 {
        match self.cal.period {
            Some(p) => periodic_distance(a, b, p),
            None => (a - b).abs(),
        }
    }

    fn revalidate(&self, waypoint: &ActuatorPlan, live: &LiveState<'_>) -> Result<(), AxisError> {
        let regions = self.regions(live)?;
        let rotation = live.position(ROTATION)?;
        if let Some(to) = waypoint.target_of(ROTATION) {
            sequencer::check_rotation_step(
                rotation,
                to,
                self.cal.period,
                self.lift_is_safe(live),
                &regions,
            )?;
        }
        // Lowering the lift is only legal away from every region.
        if let (Some(to), Some(lift)) = (waypoint.target_of(LIFT), &self.cal.lift) {
            let lowering = (to - lift.safe_position).abs() > live.precision(LIFT);
            if lowering {
                if let Some(r) = regions.iter().find(|r| r.contains(rotation, self.cal.period)) {
                    return Err(AxisError::SequencingConflict(format!(
                        "cannot lower lift at {rotation} inside [{}, {}]",
                        r.lower, r.upper
                    )));
                }
            }
        }
        Ok(())
    }
}
