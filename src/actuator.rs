//! Actuator abstraction over rotational joints
//!
//! Two capability variants drive the sensor toward a direction:
//!
//! - [`LimitedJoint`]: bounded rotation commanded by absolute target angle. Rotor
//!   and hinge behavior differ only in their [`JointLimits`].
//! - [`ContinuousJoint`]: unbounded rotation commanded by angular rate, such as a
//!   gyroscopic stabilizer turning the whole construct.
//!
//! Both expose `align_to_vector`, and the [`Mount`] trait lifts them to the two
//! drive axes the search routines use.
//!
//! `align_to_vector` must only be called while the joint is (assumed) stationary;
//! a moving joint reports an angle that is already stale and precision degrades.

use core::f64::consts::PI;

use log::trace;
use nalgebra::Vector3;

use crate::math::{Vector3Ext, angle_between, signed_angle_about_axis};
use crate::types::{DriveAxis, JointKind, JointLimits, JointSettings};

/// Bounded joint hardware collaborator
///
/// Positive travel turns the payload clockwise looking down [`axis`](Self::axis)
/// toward the joint, which is the positive sense of
/// [`signed_angle_about_axis`].
pub trait JointHardware {
    /// Current angle in radians
    fn angle(&self) -> f64;
    /// Current angular velocity in radians per second
    fn velocity(&self) -> f64;
    /// World-frame unit rotation axis
    fn axis(&self) -> Vector3<f64>;
    /// Travel to `angle` at `velocity`; the velocity sign selects the direction
    fn set_target(&mut self, angle: f64, velocity: f64);
    /// Free rotation at `rate` radians per second
    fn set_velocity(&mut self, rate: f64);
    /// Holding and driving torque
    fn set_torque(&mut self, torque: f64);
    fn lock(&mut self);
    fn unlock(&mut self);
    fn enable(&mut self);
}

/// Continuous (rate-commanded) hardware collaborator
pub trait GyroHardware {
    /// World-frame unit axes for the pitch, yaw and roll rates
    fn axes(&self) -> [Vector3<f64>; 3];
    /// Current commanded pitch, yaw and roll rates in radians per second
    fn rates(&self) -> Vector3<f64>;
    /// Right-handed rates about [`axes`](Self::axes)
    fn set_rates(&mut self, rates: Vector3<f64>);
    /// Take over (or release) manual control of the construct
    fn set_override(&mut self, enabled: bool);
    fn enable(&mut self);
}

/// Sensor-bearing assembly with two drive axes
pub trait Mount {
    /// Free rotation of one drive axis at `rate` radians per second
    fn drive(&mut self, axis: DriveAxis, rate: f64);
    /// Turn `origin` (a world-frame vector fixed to the sensor) toward `target`
    ///
    /// Returns true once no further command is needed.
    fn align(&mut self, origin: &Vector3<f64>, target: &Vector3<f64>) -> bool;
    /// Zero every command
    fn stop(&mut self);
    fn lock(&mut self);
    fn unlock(&mut self);
}

/// Plans an absolute move of `theta` radians from `current`
///
/// Returns `(target_angle, velocity)`. Wrapping joints fold the target back into
/// `[-limit, limit]` by adding or subtracting `2 × limit` once, and keep the
/// velocity sign of `theta`, so the joint travels the shorter arc through the
/// seam. Non-wrapping joints clamp the target to the window minus the overshoot
/// buffer and move toward it directly.
///
/// # Example
/// ```
/// use helio_seek::{JointKind, JointLimits, JointSettings, plan_travel};
///
/// let rotor = JointLimits::for_kind(JointKind::Rotor, &JointSettings::default());
/// let (target, velocity) = plan_travel(&rotor, 170f64.to_radians(), 20f64.to_radians(), 0.5);
/// assert!((target.to_degrees() + 170.0).abs() < 1e-9);
/// assert!(velocity > 0.0);
/// ```
pub fn plan_travel(limits: &JointLimits, current: f64, theta: f64, speed: f64) -> (f64, f64) {
    let limit = limits.travel_limit;
    let raw = current + theta;

    if limits.wraps {
        let target = if raw > limit {
            raw - 2.0 * limit
        } else if raw < -limit {
            raw + 2.0 * limit
        } else {
            raw
        };
        return (target, speed.copysign(theta));
    }

    let bound = (limit - limits.overshoot_epsilon).max(0.0);
    let target = raw.clamp(-bound, bound);
    let travel = target - current;
    let velocity = if travel == 0.0 {
        0.0
    } else {
        speed.copysign(travel)
    };
    (target, velocity)
}

/// Wraps an angle difference into `(-π, π]`
pub fn wrap_angle(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(2.0 * PI) - PI;
    if wrapped <= -PI { wrapped + 2.0 * PI } else { wrapped }
}

/// Bounded joint commanded by absolute target angle
#[derive(Debug)]
pub struct LimitedJoint<H> {
    hardware: H,
    kind: JointKind,
    limits: JointLimits,
    settings: JointSettings,
}

impl<H: JointHardware> LimitedJoint<H> {
    /// Wrap hardware with the travel policy of its capability tag
    pub fn new(hardware: H, kind: JointKind, settings: JointSettings) -> Self {
        Self {
            hardware,
            kind,
            limits: JointLimits::for_kind(kind, &settings),
            settings,
        }
    }

    pub fn kind(&self) -> JointKind {
        self.kind
    }

    pub fn limits(&self) -> JointLimits {
        self.limits
    }

    pub fn angle(&self) -> f64 {
        self.hardware.angle()
    }

    pub fn hardware(&self) -> &H {
        &self.hardware
    }

    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hardware
    }

    /// Turn `origin` toward `target` about this joint's axis
    ///
    /// Both vectors are projected onto the plane perpendicular to the joint axis.
    /// Returns the residual angle that was commanded, or `0.0` when it was
    /// already under the precision threshold and nothing was sent.
    pub fn align_to_vector(&mut self, origin: &Vector3<f64>, target: &Vector3<f64>) -> f64 {
        let axis = self.hardware.axis();
        let theta = signed_angle_about_axis(origin, target, &axis);
        if theta.abs() < self.settings.precision {
            return 0.0;
        }
        self.travel(theta);
        theta
    }

    /// Command an absolute angle along the shorter arc
    pub fn move_to(&mut self, angle: f64) -> f64 {
        let theta = if self.limits.wraps {
            wrap_angle(angle - self.hardware.angle())
        } else {
            angle - self.hardware.angle()
        };
        if theta.abs() < self.settings.precision {
            return 0.0;
        }
        self.travel(theta);
        theta
    }

    pub fn set_velocity(&mut self, rate: f64) {
        self.hardware.set_velocity(rate);
    }

    pub fn set_torque(&mut self, torque: f64) {
        self.hardware.set_torque(torque);
    }

    pub fn lock(&mut self) {
        self.hardware.lock();
    }

    pub fn unlock(&mut self) {
        self.hardware.unlock();
    }

    fn travel(&mut self, theta: f64) {
        let speed = (theta.abs() * self.settings.gain).min(self.settings.max_rate);
        let (target, velocity) =
            plan_travel(&self.limits, self.hardware.angle(), theta, speed);
        trace!(
            "{} travel {:.5} rad -> target {:.5} at {:.4} rad/s",
            self.kind, theta, target, velocity
        );
        self.hardware.set_target(target, velocity);
    }
}

/// Rate-commanded joint turning the whole construct
#[derive(Debug)]
pub struct ContinuousJoint<G> {
    hardware: G,
    settings: JointSettings,
}

impl<G: GyroHardware> ContinuousJoint<G> {
    pub fn new(mut hardware: G, settings: JointSettings) -> Self {
        hardware.enable();
        hardware.set_override(true);
        Self { hardware, settings }
    }

    pub fn hardware(&self) -> &G {
        &self.hardware
    }

    pub fn hardware_mut(&mut self) -> &mut G {
        &mut self.hardware
    }

    /// Rate command proportional to the residual rotation from `origin` to `target`
    ///
    /// Each rate component is clamped to the configured maximum. Returns true,
    /// with all rates zeroed, once every component driving the alignment is under
    /// the precision threshold.
    pub fn align_to_vector(&mut self, origin: &Vector3<f64>, target: &Vector3<f64>) -> bool {
        let origin = origin.safe_normalize();
        let target = target.safe_normalize();
        let angle = angle_between(&origin, &target);

        let mut axis = origin.cross(&target).safe_normalize();
        if axis.is_degenerate() {
            if angle < PI / 2.0 {
                self.hardware.set_rates(Vector3::zeros());
                return true;
            }
            // Opposite vectors: any perpendicular axis works
            axis = origin.cross(&Vector3::x()).safe_normalize();
            if axis.is_degenerate() {
                axis = origin.cross(&Vector3::y()).safe_normalize();
            }
        }

        let rotation = axis * angle;
        let [pitch_axis, yaw_axis, roll_axis] = self.hardware.axes();
        let residual = Vector3::new(
            rotation.dot(&pitch_axis),
            rotation.dot(&yaw_axis),
            rotation.dot(&roll_axis),
        );

        if residual.iter().all(|component| component.abs() < self.settings.precision) {
            self.hardware.set_rates(Vector3::zeros());
            return true;
        }

        let max_rate = self.settings.max_rate;
        let rates = residual.map(|component| (component * self.settings.gain).clamp(-max_rate, max_rate));
        self.hardware.set_rates(rates);
        false
    }
}

impl<G: GyroHardware> Mount for ContinuousJoint<G> {
    fn drive(&mut self, axis: DriveAxis, rate: f64) {
        let mut rates = self.hardware.rates();
        match axis {
            DriveAxis::Primary => rates.y = rate,
            DriveAxis::Secondary => rates.x = rate,
        }
        rates.z = 0.0;
        self.hardware.set_rates(rates);
    }

    fn align(&mut self, origin: &Vector3<f64>, target: &Vector3<f64>) -> bool {
        self.align_to_vector(origin, target)
    }

    fn stop(&mut self) {
        self.hardware.set_rates(Vector3::zeros());
    }

    fn lock(&mut self) {
        self.hardware.set_rates(Vector3::zeros());
        self.hardware.set_override(true);
    }

    fn unlock(&mut self) {
        self.hardware.set_override(false);
    }
}

/// Base rotor carrying a hinge, with the sensor on the hinge
#[derive(Debug)]
pub struct Gimbal<J> {
    rotor: LimitedJoint<J>,
    hinge: LimitedJoint<J>,
    hinge_gate: f64,
}

impl<J: JointHardware> Gimbal<J> {
    pub fn new(rotor: LimitedJoint<J>, hinge: LimitedJoint<J>, settings: &JointSettings) -> Self {
        Self {
            rotor,
            hinge,
            hinge_gate: settings.hinge_gate,
        }
    }

    pub fn rotor(&self) -> &LimitedJoint<J> {
        &self.rotor
    }

    pub fn hinge(&self) -> &LimitedJoint<J> {
        &self.hinge
    }

    /// Apply calibrated torques to both joints
    pub fn set_torque(&mut self, rotor: f64, hinge: f64) {
        self.rotor.set_torque(rotor);
        self.hinge.set_torque(hinge);
    }

    fn joint_mut(&mut self, axis: DriveAxis) -> &mut LimitedJoint<J> {
        match axis {
            DriveAxis::Primary => &mut self.rotor,
            DriveAxis::Secondary => &mut self.hinge,
        }
    }
}

impl<J: JointHardware> Mount for Gimbal<J> {
    fn drive(&mut self, axis: DriveAxis, rate: f64) {
        self.joint_mut(axis).set_velocity(rate);
    }

    fn align(&mut self, origin: &Vector3<f64>, target: &Vector3<f64>) -> bool {
        let rotor_residual = self.rotor.align_to_vector(origin, target);
        if rotor_residual.abs() >= self.hinge_gate {
            return false;
        }
        // The hinge axis turns with the rotor, so it only follows once the rotor is close
        let hinge_residual = self.hinge.align_to_vector(origin, target);
        rotor_residual == 0.0 && hinge_residual == 0.0
    }

    fn stop(&mut self) {
        self.rotor.set_velocity(0.0);
        self.hinge.set_velocity(0.0);
    }

    fn lock(&mut self) {
        self.rotor.lock();
        self.hinge.lock();
    }

    fn unlock(&mut self) {
        self.rotor.unlock();
        self.hinge.unlock();
    }
}
