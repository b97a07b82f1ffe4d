//! Deterministic simulation of a source orbit, a rotor/hinge gimbal and its sensor,
//! and a free gyro-stabilized body for continuous joints
//!
//! The rotor turns about world `+Z`; the hinge sits on the rotor and tilts the
//! sensor. With rotor angle `a` and hinge angle `h` the sensor faces
//! `(cos h cos a, -cos h sin a, sin h)`. Positive joint travel is clockwise
//! looking down the joint axis, matching [`JointHardware`].
//!
//! Time only moves when [`SimRig::step`] is called, so a test or demo drives
//! the rig and the controller in lockstep:
//!
//! ```
//! use helio_seek::sim::{SimRig, SourceOrbit};
//! use helio_seek::{RotationSign, Sensor};
//! use nalgebra::Vector3;
//!
//! let orbit = SourceOrbit::new(Vector3::z(), RotationSign::Positive, 0.01, Vector3::x());
//! let rig = SimRig::new(orbit, 0.1);
//! let sensor = rig.sensor();
//! assert_eq!(sensor.output(), Some(rig.max_output()));
//!
//! rig.step();
//! assert!(sensor.output().unwrap() < rig.max_output());
//! ```

use core::f64::consts::{FRAC_PI_2, PI};
use std::cell::RefCell;
use std::ops::Range;
use std::rc::Rc;

use nalgebra::{UnitQuaternion, Vector3};

use crate::actuator::{ContinuousJoint, Gimbal, GyroHardware, JointHardware, LimitedJoint, wrap_angle};
use crate::math::{Direction3, Vector3Ext, project_onto_plane, rotate_signed};
use crate::orbit::OrbitModel;
use crate::sensor::Sensor;
use crate::types::{JointKind, JointSettings, RotationSign};

/// Circular orbit of the light source around the origin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceOrbit {
    pub plane_normal: Direction3,
    pub direction: RotationSign,
    pub angular_speed: f64,
    /// Source direction at time zero, in the orbital plane
    pub start: Direction3,
}

impl SourceOrbit {
    /// `start` is projected into the plane; a start parallel to the normal falls back to any in-plane vector
    pub fn new(
        plane_normal: Vector3<f64>,
        direction: RotationSign,
        angular_speed: f64,
        start: Vector3<f64>,
    ) -> Self {
        let plane_normal = plane_normal.safe_normalize();
        let mut start = project_onto_plane(&start, &plane_normal);
        if start.is_degenerate() {
            start = project_onto_plane(&Vector3::x(), &plane_normal);
        }
        if start.is_degenerate() {
            start = project_onto_plane(&Vector3::y(), &plane_normal);
        }
        Self {
            plane_normal,
            direction,
            angular_speed,
            start,
        }
    }

    /// Source direction `time` seconds after the start
    pub fn position(&self, time: f64) -> Direction3 {
        let angle = self.direction.signum() * self.angular_speed * time;
        rotate_signed(&self.start, &self.plane_normal, angle)
    }

    /// The fully mapped model this orbit should be estimated as
    pub fn model(&self, max_angular_speed: f64) -> OrbitModel {
        let mut model = OrbitModel::new(max_angular_speed);
        model.set_plane_normal(self.plane_normal);
        model.set_direction(self.direction);
        model.set_angular_speed(self.angular_speed);
        model
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct JointState {
    angle: f64,
    velocity: f64,
    target: Option<f64>,
    torque: f64,
    locked: bool,
    enabled: bool,
    wraps: bool,
    limit: f64,
}

impl JointState {
    fn new(kind: JointKind, angle: f64) -> Self {
        let (wraps, limit) = match kind {
            JointKind::Rotor => (true, PI),
            JointKind::Hinge => (false, FRAC_PI_2),
        };
        Self {
            angle,
            velocity: 0.0,
            target: None,
            torque: 0.0,
            locked: false,
            enabled: true,
            wraps,
            limit,
        }
    }

    fn advance(&mut self, dt: f64) {
        if self.locked || !self.enabled || self.velocity == 0.0 {
            return;
        }
        let step = self.velocity * dt;

        match self.target {
            Some(target) => {
                let remaining = if !self.wraps {
                    target - self.angle
                } else if step > 0.0 {
                    (target - self.angle).rem_euclid(2.0 * PI)
                } else {
                    -(self.angle - target).rem_euclid(2.0 * PI)
                };
                if remaining.abs() <= step.abs() || remaining.signum() != step.signum() {
                    self.angle = target;
                    self.velocity = 0.0;
                    self.target = None;
                } else {
                    self.angle += step;
                }
            }
            None => self.angle += step,
        }

        if self.wraps {
            self.angle = wrap_angle(self.angle);
        } else if self.angle.abs() > self.limit {
            self.angle = self.angle.clamp(-self.limit, self.limit);
            self.velocity = 0.0;
            self.target = None;
        }
    }
}

#[derive(Debug, Clone)]
struct RigState {
    tick: u64,
    tick_interval: f64,
    orbit: SourceOrbit,
    rotor: JointState,
    hinge: JointState,
    max_output: f64,
    shadows: Vec<Range<u64>>,
    dropouts: Vec<Range<u64>>,
}

impl RigState {
    fn time(&self) -> f64 {
        self.tick as f64 * self.tick_interval
    }

    fn joint(&self, kind: JointKind) -> &JointState {
        match kind {
            JointKind::Rotor => &self.rotor,
            JointKind::Hinge => &self.hinge,
        }
    }

    fn joint_mut(&mut self, kind: JointKind) -> &mut JointState {
        match kind {
            JointKind::Rotor => &mut self.rotor,
            JointKind::Hinge => &mut self.hinge,
        }
    }

    fn forward(&self) -> Direction3 {
        let (a, h) = (self.rotor.angle, self.hinge.angle);
        Vector3::new(h.cos() * a.cos(), -h.cos() * a.sin(), h.sin())
    }

    fn down(&self) -> Direction3 {
        let (a, h) = (self.rotor.angle, self.hinge.angle);
        Vector3::new(h.sin() * a.cos(), -h.sin() * a.sin(), -h.cos())
    }

    fn exposure(&self) -> f64 {
        self.forward().dot(&self.orbit.position(self.time())).max(0.0)
    }
}

/// Shared simulation state; every handle observes the same rig
#[derive(Debug, Clone)]
pub struct SimRig {
    state: Rc<RefCell<RigState>>,
}

impl SimRig {
    /// Rig at rest facing `+X` with both joints at zero
    pub fn new(orbit: SourceOrbit, tick_interval: f64) -> Self {
        let state = RigState {
            tick: 0,
            tick_interval,
            orbit,
            rotor: JointState::new(JointKind::Rotor, 0.0),
            hinge: JointState::new(JointKind::Hinge, 0.0),
            max_output: 120.0,
            shadows: Vec::new(),
            dropouts: Vec::new(),
        };
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    /// Place both joints
    pub fn with_pose(self, rotor: f64, hinge: f64) -> Self {
        {
            let mut state = self.state.borrow_mut();
            state.rotor.angle = wrap_angle(rotor);
            state.hinge.angle = hinge.clamp(-FRAC_PI_2, FRAC_PI_2);
        }
        self
    }

    pub fn with_max_output(self, max_output: f64) -> Self {
        self.state.borrow_mut().max_output = max_output;
        self
    }

    /// Sensor reads zero during `ticks`
    pub fn add_shadow(&self, ticks: Range<u64>) {
        self.state.borrow_mut().shadows.push(ticks);
    }

    /// Sensor reports nothing during `ticks`
    pub fn add_dropout(&self, ticks: Range<u64>) {
        self.state.borrow_mut().dropouts.push(ticks);
    }

    /// Advance time by one tick, moving the joints and the source
    pub fn step(&self) {
        let mut state = self.state.borrow_mut();
        let dt = state.tick_interval;
        state.rotor.advance(dt);
        state.hinge.advance(dt);
        state.tick += 1;
    }

    pub fn tick(&self) -> u64 {
        self.state.borrow().tick
    }

    pub fn time(&self) -> f64 {
        self.state.borrow().time()
    }

    pub fn orbit(&self) -> SourceOrbit {
        self.state.borrow().orbit
    }

    pub fn source(&self) -> Direction3 {
        let state = self.state.borrow();
        state.orbit.position(state.time())
    }

    pub fn forward(&self) -> Direction3 {
        self.state.borrow().forward()
    }

    pub fn down(&self) -> Direction3 {
        self.state.borrow().down()
    }

    /// Geometric exposure, ignoring shadows and dropouts
    pub fn exposure(&self) -> f64 {
        self.state.borrow().exposure()
    }

    pub fn max_output(&self) -> f64 {
        self.state.borrow().max_output
    }

    pub fn joint_angle(&self, kind: JointKind) -> f64 {
        self.state.borrow().joint(kind).angle
    }

    pub fn joint_torque(&self, kind: JointKind) -> f64 {
        self.state.borrow().joint(kind).torque
    }

    pub fn joint(&self, kind: JointKind) -> SimJoint {
        SimJoint {
            kind,
            state: Rc::clone(&self.state),
        }
    }

    pub fn sensor(&self) -> SimSensor {
        SimSensor {
            state: Rc::clone(&self.state),
        }
    }

    /// Gimbal over this rig's rotor and hinge
    pub fn gimbal(&self, settings: &JointSettings) -> Gimbal<SimJoint> {
        let rotor = LimitedJoint::new(self.joint(JointKind::Rotor), JointKind::Rotor, *settings);
        let hinge = LimitedJoint::new(self.joint(JointKind::Hinge), JointKind::Hinge, *settings);
        Gimbal::new(rotor, hinge, settings)
    }
}

/// Handle on one joint of a [`SimRig`]
#[derive(Debug, Clone)]
pub struct SimJoint {
    kind: JointKind,
    state: Rc<RefCell<RigState>>,
}

impl SimJoint {
    pub fn kind(&self) -> JointKind {
        self.kind
    }

    pub fn is_locked(&self) -> bool {
        self.state.borrow().joint(self.kind).locked
    }
}

impl JointHardware for SimJoint {
    fn angle(&self) -> f64 {
        self.state.borrow().joint(self.kind).angle
    }

    fn velocity(&self) -> f64 {
        self.state.borrow().joint(self.kind).velocity
    }

    fn axis(&self) -> Vector3<f64> {
        match self.kind {
            JointKind::Rotor => Vector3::z(),
            JointKind::Hinge => {
                let a = self.state.borrow().rotor.angle;
                Vector3::new(a.sin(), a.cos(), 0.0)
            }
        }
    }

    fn set_target(&mut self, angle: f64, velocity: f64) {
        let mut state = self.state.borrow_mut();
        let joint = state.joint_mut(self.kind);
        joint.target = Some(angle);
        joint.velocity = velocity;
    }

    fn set_velocity(&mut self, rate: f64) {
        let mut state = self.state.borrow_mut();
        let joint = state.joint_mut(self.kind);
        joint.target = None;
        joint.velocity = rate;
    }

    fn set_torque(&mut self, torque: f64) {
        self.state.borrow_mut().joint_mut(self.kind).torque = torque;
    }

    fn lock(&mut self) {
        self.state.borrow_mut().joint_mut(self.kind).locked = true;
    }

    fn unlock(&mut self) {
        self.state.borrow_mut().joint_mut(self.kind).locked = false;
    }

    fn enable(&mut self) {
        self.state.borrow_mut().joint_mut(self.kind).enabled = true;
    }
}

/// Exposure sensor riding on the hinge of a [`SimRig`]
#[derive(Debug, Clone)]
pub struct SimSensor {
    state: Rc<RefCell<RigState>>,
}

impl Sensor for SimSensor {
    fn output(&self) -> Option<f64> {
        let state = self.state.borrow();
        if state.dropouts.iter().any(|ticks| ticks.contains(&state.tick)) {
            return None;
        }
        if state.shadows.iter().any(|ticks| ticks.contains(&state.tick)) {
            return Some(0.0);
        }
        Some(state.exposure() * state.max_output)
    }

    fn max_output(&self) -> f64 {
        self.state.borrow().max_output
    }

    fn forward(&self) -> Vector3<f64> {
        self.state.borrow().forward()
    }

    fn down(&self) -> Vector3<f64> {
        self.state.borrow().down()
    }
}

/// Free body turned by pitch, yaw and roll rates in its own frame
///
/// Body `+Z` is forward, body `-Y` is down.
#[derive(Debug, Clone, PartialEq)]
pub struct SimGyroMount {
    orientation: UnitQuaternion<f64>,
    rates: Vector3<f64>,
    overridden: bool,
    enabled: bool,
}

impl SimGyroMount {
    pub fn new(orientation: UnitQuaternion<f64>) -> Self {
        Self {
            orientation,
            rates: Vector3::zeros(),
            overridden: false,
            enabled: false,
        }
    }

    pub fn orientation(&self) -> UnitQuaternion<f64> {
        self.orientation
    }

    pub fn forward(&self) -> Direction3 {
        self.orientation * Vector3::z()
    }

    pub fn down(&self) -> Direction3 {
        self.orientation * -Vector3::y()
    }

    pub fn is_overridden(&self) -> bool {
        self.overridden
    }

    /// Integrate the commanded rates for `dt` seconds
    pub fn step(&mut self, dt: f64) {
        if !(self.enabled && self.overridden) {
            return;
        }
        let world = self.orientation * self.rates;
        self.orientation = UnitQuaternion::from_scaled_axis(world * dt) * self.orientation;
    }
}

impl Default for SimGyroMount {
    fn default() -> Self {
        Self::new(UnitQuaternion::identity())
    }
}

impl GyroHardware for SimGyroMount {
    fn axes(&self) -> [Vector3<f64>; 3] {
        [
            self.orientation * Vector3::x(),
            self.orientation * Vector3::y(),
            self.orientation * Vector3::z(),
        ]
    }

    fn rates(&self) -> Vector3<f64> {
        self.rates
    }

    fn set_rates(&mut self, rates: Vector3<f64>) {
        self.rates = rates;
    }

    fn set_override(&mut self, enabled: bool) {
        self.overridden = enabled;
    }

    fn enable(&mut self) {
        self.enabled = true;
    }
}

#[derive(Debug, Clone)]
struct GyroRigState {
    tick: u64,
    tick_interval: f64,
    orbit: SourceOrbit,
    body: SimGyroMount,
    max_output: f64,
}

impl GyroRigState {
    fn exposure(&self) -> f64 {
        let time = self.tick as f64 * self.tick_interval;
        self.body.forward().dot(&self.orbit.position(time)).max(0.0)
    }
}

/// A [`SimGyroMount`] body carrying an exposure sensor, with the source orbit
///
/// Like [`SimRig`], every handle observes the same shared state and time moves
/// only on [`step`](Self::step).
#[derive(Debug, Clone)]
pub struct SimGyroRig {
    state: Rc<RefCell<GyroRigState>>,
}

impl SimGyroRig {
    /// Body facing the source at time zero, its down vector opposite the plane normal
    pub fn new(orbit: SourceOrbit, tick_interval: f64) -> Self {
        let orientation = UnitQuaternion::face_towards(&orbit.start, &orbit.plane_normal);
        let state = GyroRigState {
            tick: 0,
            tick_interval,
            orbit,
            body: SimGyroMount::new(orientation),
            max_output: 120.0,
        };
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    /// Place the body
    pub fn with_orientation(self, orientation: UnitQuaternion<f64>) -> Self {
        self.state.borrow_mut().body.orientation = orientation;
        self
    }

    /// Advance time by one tick, turning the body at its commanded rates
    pub fn step(&self) {
        let mut state = self.state.borrow_mut();
        let dt = state.tick_interval;
        state.body.step(dt);
        state.tick += 1;
    }

    pub fn tick(&self) -> u64 {
        self.state.borrow().tick
    }

    pub fn orientation(&self) -> UnitQuaternion<f64> {
        self.state.borrow().body.orientation()
    }

    pub fn forward(&self) -> Direction3 {
        self.state.borrow().body.forward()
    }

    /// Commanded pitch, yaw and roll rates
    pub fn rates(&self) -> Vector3<f64> {
        self.state.borrow().body.rates
    }

    pub fn exposure(&self) -> f64 {
        self.state.borrow().exposure()
    }

    pub fn max_output(&self) -> f64 {
        self.state.borrow().max_output
    }

    pub fn gyro(&self) -> SimGyro {
        SimGyro {
            state: Rc::clone(&self.state),
        }
    }

    pub fn sensor(&self) -> SimGyroSensor {
        SimGyroSensor {
            state: Rc::clone(&self.state),
        }
    }

    /// Continuous joint turning this rig's body
    pub fn joint(&self, settings: &JointSettings) -> ContinuousJoint<SimGyro> {
        ContinuousJoint::new(self.gyro(), *settings)
    }
}

/// Gyroscope handle on a [`SimGyroRig`]
#[derive(Debug, Clone)]
pub struct SimGyro {
    state: Rc<RefCell<GyroRigState>>,
}

impl SimGyro {
    pub fn is_overridden(&self) -> bool {
        self.state.borrow().body.is_overridden()
    }
}

impl GyroHardware for SimGyro {
    fn axes(&self) -> [Vector3<f64>; 3] {
        self.state.borrow().body.axes()
    }

    fn rates(&self) -> Vector3<f64> {
        self.state.borrow().body.rates()
    }

    fn set_rates(&mut self, rates: Vector3<f64>) {
        self.state.borrow_mut().body.set_rates(rates);
    }

    fn set_override(&mut self, enabled: bool) {
        self.state.borrow_mut().body.set_override(enabled);
    }

    fn enable(&mut self) {
        self.state.borrow_mut().body.enable();
    }
}

/// Exposure sensor fixed to the body of a [`SimGyroRig`]
#[derive(Debug, Clone)]
pub struct SimGyroSensor {
    state: Rc<RefCell<GyroRigState>>,
}

impl Sensor for SimGyroSensor {
    fn output(&self) -> Option<f64> {
        let state = self.state.borrow();
        Some(state.exposure() * state.max_output)
    }

    fn max_output(&self) -> f64 {
        self.state.borrow().max_output
    }

    fn forward(&self) -> Vector3<f64> {
        self.state.borrow().body.forward()
    }

    fn down(&self) -> Vector3<f64> {
        self.state.borrow().body.down()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::Mount;
    use crate::types::DriveAxis;
    use crate::math::signed_angle_about_axis;
    use approx::assert_abs_diff_eq;

    fn orbit() -> SourceOrbit {
        SourceOrbit::new(Vector3::z(), RotationSign::Positive, 0.05, Vector3::x())
    }

    #[test]
    fn test_orbit_position() {
        let orbit = orbit();
        assert_abs_diff_eq!(orbit.position(0.0), Vector3::x(), epsilon = 1e-12);
        let quarter = FRAC_PI_2 / orbit.angular_speed;
        assert_abs_diff_eq!(orbit.position(quarter), Vector3::y(), epsilon = 1e-12);

        let backwards = SourceOrbit { direction: RotationSign::Negative, ..orbit };
        assert_abs_diff_eq!(backwards.position(quarter), -Vector3::y(), epsilon = 1e-12);
    }

    #[test]
    fn test_pose_geometry() {
        let rig = SimRig::new(orbit(), 0.1).with_pose(FRAC_PI_2, 0.0);
        // Positive rotor travel turns clockwise about +Z
        assert_abs_diff_eq!(rig.forward(), -Vector3::y(), epsilon = 1e-12);
        assert_abs_diff_eq!(rig.down(), -Vector3::z(), epsilon = 1e-12);

        let rig = SimRig::new(orbit(), 0.1).with_pose(0.0, 0.3);
        assert_abs_diff_eq!(rig.forward().z, 0.3f64.sin(), epsilon = 1e-12);
        assert_abs_diff_eq!(rig.forward().dot(&rig.down()), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_joint_axes_match_travel_sense() {
        let rig = SimRig::new(orbit(), 0.1).with_pose(0.7, 0.2);
        let before = rig.forward();
        let axis = rig.joint(JointKind::Hinge).axis();

        let mut hinge = rig.joint(JointKind::Hinge);
        hinge.set_velocity(0.5);
        rig.step();

        let turned = signed_angle_about_axis(&before, &rig.forward(), &axis);
        assert_abs_diff_eq!(turned, 0.05, epsilon = 1e-9);
    }

    #[test]
    fn test_target_travel_wraps_through_seam() {
        let rig = SimRig::new(orbit(), 0.1).with_pose(3.0, 0.0);
        let mut rotor = rig.joint(JointKind::Rotor);
        rotor.set_target(-3.0, 0.2);

        for _ in 0..20 {
            rig.step();
        }
        assert_abs_diff_eq!(rig.joint_angle(JointKind::Rotor), -3.0, epsilon = 1e-12);
        assert_eq!(rotor.velocity(), 0.0);
    }

    #[test]
    fn test_hinge_stops_at_hard_limit() {
        let rig = SimRig::new(orbit(), 0.1);
        let mut hinge = rig.joint(JointKind::Hinge);
        hinge.set_velocity(1.0);
        for _ in 0..30 {
            rig.step();
        }
        assert_abs_diff_eq!(rig.joint_angle(JointKind::Hinge), FRAC_PI_2);
        assert_eq!(hinge.velocity(), 0.0);
    }

    #[test]
    fn test_locked_joint_holds() {
        let rig = SimRig::new(orbit(), 0.1);
        let mut rotor = rig.joint(JointKind::Rotor);
        rotor.set_velocity(0.5);
        rotor.lock();
        rig.step();
        assert!(rotor.is_locked());
        assert_eq!(rig.joint_angle(JointKind::Rotor), 0.0);
    }

    #[test]
    fn test_sensor_windows() {
        let rig = SimRig::new(orbit(), 0.1).with_max_output(10.0);
        rig.add_shadow(1..2);
        rig.add_dropout(2..3);
        let sensor = rig.sensor();

        assert_abs_diff_eq!(sensor.output().unwrap(), 10.0, epsilon = 1e-12);
        rig.step();
        assert_eq!(sensor.output(), Some(0.0));
        rig.step();
        assert_eq!(sensor.output(), None);
        rig.step();
        assert!(sensor.output().unwrap() > 9.9);
    }

    #[test]
    fn test_gimbal_points_at_source() {
        let settings = JointSettings::default();
        let rig = SimRig::new(orbit(), 0.1).with_pose(-2.5, -0.4);
        let mut gimbal = rig.gimbal(&settings);
        let target = Vector3::new(0.2, 0.9, 0.3).normalize();

        let mut settled = false;
        for _ in 0..300 {
            settled = gimbal.align(&rig.forward(), &target);
            if settled {
                break;
            }
            rig.step();
        }
        assert!(settled);
        assert!(rig.forward().dot(&target) > 1.0 - 1e-6);
    }

    #[test]
    fn test_gyro_mount_converges() {
        let mut joint = ContinuousJoint::new(SimGyroMount::default(), JointSettings::default());
        assert!(joint.hardware().is_overridden());
        let target = Vector3::new(0.5, -0.2, 0.8).normalize();

        let mut settled = false;
        for _ in 0..400 {
            let forward = joint.hardware().forward();
            settled = joint.align(&forward, &target);
            if settled {
                break;
            }
            joint.hardware_mut().step(0.1);
        }
        assert!(settled);
        assert!(joint.hardware().forward().dot(&target) > 1.0 - 1e-6);
    }

    #[test]
    fn test_gyro_rig_drive_turns_body() {
        let rig = SimGyroRig::new(orbit(), 0.1);
        let sensor = rig.sensor();
        assert_abs_diff_eq!(rig.forward(), Vector3::x(), epsilon = 1e-12);
        assert_abs_diff_eq!(sensor.down(), -Vector3::z(), epsilon = 1e-12);
        assert_abs_diff_eq!(sensor.output().unwrap(), rig.max_output(), epsilon = 1e-9);

        let mut joint = rig.joint(&JointSettings::default());
        assert!(joint.hardware().is_overridden());

        // Primary is yaw about the body's up axis, here world +Z
        joint.drive(DriveAxis::Primary, 0.5);
        rig.step();
        let yawed = signed_angle_about_axis(&Vector3::x(), &rig.forward(), &Vector3::z());
        assert_abs_diff_eq!(yawed, -0.05, epsilon = 1e-9);
        assert_abs_diff_eq!(sensor.output().unwrap(), rig.exposure() * rig.max_output(), epsilon = 1e-9);

        // Secondary pitches the forward vector out of the horizontal plane
        joint.stop();
        joint.drive(DriveAxis::Secondary, 0.5);
        rig.step();
        assert!(rig.forward().z.abs() > 0.04);
        assert_eq!(rig.rates().z, 0.0);
        assert_eq!(rig.tick(), 2);
    }
}
