//! Scalar-feedback search routines
//!
//! Every routine is a plain, serializable struct advanced one tick at a time by
//! `step`. A step reads one [`Sample`], issues actuator commands through a
//! [`Mount`] and returns; it never blocks, and it never fails. It either makes
//! progress, waits, or reports a [`Finding`].

use log::{debug, info};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::actuator::Mount;
use crate::math::{
    Direction3, Vector3Ext, is_aligned, plane_normal_from_rays, project_onto_plane, rotate_signed,
};
use crate::orbit::OrbitModel;
use crate::types::{ControllerSettings, DriveAxis, RotationSign};

/// One tick's worth of sensor state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Normalized exposure in `[0, 1]`
    pub exposure: f64,
    /// World-frame sensor forward
    pub forward: Vector3<f64>,
    /// World-frame sensor down
    pub down: Vector3<f64>,
}

/// Outcome of a single routine step
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Progress {
    /// Commands issued, call again next tick
    Running,
    /// Holding still on purpose
    Waiting,
    /// The routine has produced its result
    Finished(Finding),
}

/// Result reported by a finished routine
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Finding {
    PlaneNormal(Direction3),
    Direction(RotationSign),
    AngularSpeed(f64),
    /// The requested alignment has been reached
    Aligned,
    /// Exposure fell too low to continue; the source must be re-acquired
    SourceLost,
    /// A parameter the routine depends on is not mapped
    MissingParameter,
}

/// Search rate for hill climbing: fast when far from the source, never below `min_speed`
fn search_rate(exposure: f64, min_speed: f64) -> f64 {
    ((1.0 - exposure) / 2.0).max(min_speed)
}

/// In-plane sweep rate, proportional to the misalignment angle `acos(exposure)`
fn sweep_rate(exposure: f64, settings: &ControllerSettings) -> f64 {
    let gap = exposure.clamp(-1.0, 1.0).acos();
    (settings.tracking.sweep_gain * gap)
        .max(settings.search.min_speed)
        .min(settings.joint.max_rate)
}

/// Any unit vector in the plane perpendicular to `normal`
fn in_plane_seed(preferred: &Vector3<f64>, fallback: &Vector3<f64>, normal: &Vector3<f64>) -> Direction3 {
    let projected = project_onto_plane(preferred, normal);
    if !projected.is_degenerate() {
        return projected;
    }
    let projected = project_onto_plane(fallback, normal);
    if !projected.is_degenerate() {
        return projected;
    }
    let projected = project_onto_plane(&Vector3::x(), normal);
    if projected.is_degenerate() {
        project_onto_plane(&Vector3::y(), normal)
    } else {
        projected
    }
}

/// Discovers the plane normal from two reference rays toward the source
///
/// Drives one axis at a time at `max(min_speed, (1 - exposure) / 2)`. The first
/// drop in exposure on an axis flips its sign, the second switches to the other
/// axis. Each time exposure reaches the ray threshold the sensor forward is
/// recorded; the normal is the normalized cross product of two such rays taken
/// far enough apart in time for the source to have moved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaneNormalSearch {
    axis: DriveAxis,
    signs: [f64; 2],
    drops: u32,
    stall: u32,
    last_exposure: Option<f64>,
    first_ray: Option<Direction3>,
    wait: u32,
}

impl PlaneNormalSearch {
    pub fn new() -> Self {
        Self {
            axis: DriveAxis::Primary,
            signs: [1.0, 1.0],
            drops: 0,
            stall: 0,
            last_exposure: None,
            first_ray: None,
            wait: 0,
        }
    }

    pub fn axis(&self) -> DriveAxis {
        self.axis
    }

    pub fn sign(&self, axis: DriveAxis) -> f64 {
        self.signs[axis as usize]
    }

    pub fn first_ray(&self) -> Option<Direction3> {
        self.first_ray
    }

    pub fn is_waiting(&self) -> bool {
        self.wait > 0
    }

    pub fn step<M: Mount>(
        &mut self,
        sample: &Sample,
        mount: &mut M,
        settings: &ControllerSettings,
    ) -> Progress {
        let search = &settings.search;

        if self.wait > 0 {
            self.wait -= 1;
            mount.stop();
            if self.wait == 0 {
                self.last_exposure = None;
            }
            return Progress::Waiting;
        }

        let exposure = sample.exposure;
        if exposure >= search.ray_exposure {
            mount.stop();
            let Some(first) = self.first_ray else {
                info!("reference ray #1 recorded at {:?}", sample.forward);
                self.first_ray = Some(sample.forward);
                self.rebias(search.ray_pause_ticks);
                return Progress::Waiting;
            };

            if let Some(normal) = plane_normal_from_rays(&first, &sample.forward, search.min_ray_separation) {
                info!("plane normal found: {normal:?}");
                return Progress::Finished(Finding::PlaneNormal(normal));
            }
            debug!("reference ray #2 too close to ray #1, waiting for the source to move");
            self.rebias(search.ray_pause_ticks);
            return Progress::Waiting;
        }

        if let Some(previous) = self.last_exposure {
            let delta = exposure - previous;
            if delta < -search.negative_delta {
                self.stall = 0;
                self.drops += 1;
                if self.drops == 1 {
                    self.signs[self.axis as usize] *= -1.0;
                    debug!("exposure fell, reversing {:?}", self.axis);
                } else {
                    self.switch_axis(mount);
                }
            } else if delta.abs() <= search.negative_delta {
                self.stall += 1;
                if self.stall >= search.stall_ticks {
                    debug!("no exposure change for {} ticks on {:?}", self.stall, self.axis);
                    self.switch_axis(mount);
                    self.signs[self.axis as usize] *= -1.0;
                }
            } else {
                self.stall = 0;
            }
        }
        self.last_exposure = Some(exposure);

        let rate = search_rate(exposure, search.min_speed) * self.signs[self.axis as usize];
        mount.drive(self.axis, rate);
        Progress::Running
    }

    fn switch_axis<M: Mount>(&mut self, mount: &mut M) {
        mount.drive(self.axis, 0.0);
        self.axis = self.axis.other();
        self.drops = 0;
        self.stall = 0;
        debug!("search switched to {:?}", self.axis);
    }

    /// Pause, then resume from a different starting bias
    fn rebias(&mut self, pause_ticks: u32) {
        self.wait = pause_ticks.max(1);
        self.axis = self.axis.other();
        self.signs = [-self.signs[0], -self.signs[1]];
        self.drops = 0;
        self.stall = 0;
        self.last_exposure = None;
    }
}

impl Default for PlaneNormalSearch {
    fn default() -> Self {
        Self::new()
    }
}

/// Points the sensor's down vector along the plane normal
///
/// Whichever of `±normal` is closer to the current down vector is used, so
/// mounts that only reach one hemisphere still get there. Once aligned, the
/// sensor forward lies in the orbital plane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalAlignment;

impl NormalAlignment {
    pub fn step<M: Mount>(
        &mut self,
        sample: &Sample,
        mount: &mut M,
        model: &OrbitModel,
        settings: &ControllerSettings,
    ) -> Progress {
        let Some(normal) = model.plane_normal() else {
            return Progress::Finished(Finding::MissingParameter);
        };
        let target = if sample.down.dot(&normal) >= 0.0 { normal } else { -normal };

        if is_aligned(&target, &sample.down, settings.search.normal_tolerance) {
            mount.stop();
            return Progress::Finished(Finding::Aligned);
        }
        if mount.align(&sample.down, &target) {
            // Best the mount can reach, e.g. a hinge resting on its buffered stop
            mount.stop();
            return Progress::Finished(Finding::Aligned);
        }
        Progress::Running
    }
}

/// Sweeps the sensor forward around the orbital plane until it faces the source
///
/// Same hill climb as the plane-normal search, but along a single bearing that
/// stays in the plane, so only one sign needs to be found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSweep {
    bearing: Option<Direction3>,
    sign: f64,
    last_exposure: Option<f64>,
}

impl SourceSweep {
    pub fn new() -> Self {
        Self {
            bearing: None,
            sign: 1.0,
            last_exposure: None,
        }
    }

    pub fn step<M: Mount>(
        &mut self,
        sample: &Sample,
        mount: &mut M,
        model: &OrbitModel,
        settings: &ControllerSettings,
    ) -> Progress {
        let Some(normal) = model.plane_normal() else {
            return Progress::Finished(Finding::MissingParameter);
        };
        let exposure = sample.exposure;
        if exposure >= settings.tracking.aligned_exposure {
            mount.stop();
            info!("aligned with source at exposure {exposure:.6}");
            return Progress::Finished(Finding::Aligned);
        }

        if let Some(previous) = self.last_exposure {
            if exposure - previous < -settings.search.negative_delta {
                self.sign = -self.sign;
            }
        }
        self.last_exposure = Some(exposure);

        let bearing = self
            .bearing
            .unwrap_or_else(|| in_plane_seed(&sample.forward, &sample.down, &normal));
        let rate = sweep_rate(exposure, settings) * self.sign;
        let bearing = rotate_signed(&bearing, &normal, rate * settings.tick_interval);
        self.bearing = Some(bearing);

        mount.align(&sample.forward, &bearing);
        Progress::Running
    }
}

impl Default for SourceSweep {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum ProbePhase {
    /// Moving to (or holding at) the base bearing
    Settle,
    /// Watching exposure drift with the sensor still
    Idle,
    /// Moving to the yawed bearing
    Offset,
}

/// Determines the rotation direction from two exposure comparisons
///
/// With the sensor forward in the orbital plane, the source drifting past a
/// still sensor raises or lowers exposure depending on which side of forward it
/// is and which way it turns. Yawing the sensor counter-clockwise by a fixed
/// offset reveals the side. The direction is positive exactly when the two
/// comparisons disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionProbe {
    phase: ProbePhase,
    base: Option<Direction3>,
    reference: f64,
    idle_increased: bool,
    candidate: Option<RotationSign>,
    agreeing: u32,
}

impl DirectionProbe {
    pub fn new() -> Self {
        Self {
            phase: ProbePhase::Settle,
            base: None,
            reference: 0.0,
            idle_increased: false,
            candidate: None,
            agreeing: 0,
        }
    }

    /// Consecutive agreeing measurements so far
    pub fn agreeing(&self) -> u32 {
        self.agreeing
    }

    pub fn candidate(&self) -> Option<RotationSign> {
        self.candidate
    }

    /// Direction implied by the idle drift and the offset comparison
    pub fn classify(idle_increased: bool, offset_increased: bool) -> RotationSign {
        if idle_increased ^ offset_increased {
            RotationSign::Positive
        } else {
            RotationSign::Negative
        }
    }

    pub fn step<M: Mount>(
        &mut self,
        sample: &Sample,
        mount: &mut M,
        model: &OrbitModel,
        settings: &ControllerSettings,
    ) -> Progress {
        let Some(normal) = model.plane_normal() else {
            return Progress::Finished(Finding::MissingParameter);
        };
        let probe = &settings.direction;
        let offset = probe.yaw_offset;
        let base = *self
            .base
            .get_or_insert_with(|| in_plane_seed(&sample.forward, &sample.down, &normal));
        let exposure = sample.exposure;

        match self.phase {
            ProbePhase::Settle => {
                if !self.arrived(sample, mount, &base, probe.settle_tolerance) {
                    return Progress::Running;
                }
                if exposure <= 0.0 {
                    // Source behind the sensor: step toward it
                    self.base = Some(rotate_signed(&base, &normal, offset));
                } else if exposure > offset.cos() {
                    // Too close to the source for the offset to tell sides apart
                    self.base = Some(rotate_signed(&base, &normal, -2.0 * offset));
                } else {
                    self.reference = exposure;
                    self.phase = ProbePhase::Idle;
                }
                Progress::Running
            }
            ProbePhase::Idle => {
                mount.stop();
                if exposure == self.reference {
                    self.phase = ProbePhase::Settle;
                    return Progress::Waiting;
                }
                self.idle_increased = exposure > self.reference;
                self.reference = exposure;
                self.phase = ProbePhase::Offset;
                Progress::Waiting
            }
            ProbePhase::Offset => {
                let target = rotate_signed(&base, &normal, offset);
                if !self.arrived(sample, mount, &target, probe.settle_tolerance) {
                    return Progress::Running;
                }
                let offset_increased = exposure > self.reference;
                let measured = Self::classify(self.idle_increased, offset_increased);
                self.phase = ProbePhase::Settle;

                if self.candidate == Some(measured) {
                    self.agreeing += 1;
                } else {
                    if self.candidate.is_some() {
                        debug!("direction sample disagrees, restarting count");
                    }
                    self.candidate = Some(measured);
                    self.agreeing = 1;
                }
                debug!(
                    "direction sample {measured:?} (idle up: {}, offset up: {offset_increased}), {} agreeing",
                    self.idle_increased, self.agreeing
                );

                if self.agreeing >= probe.required_samples {
                    info!("rotation direction found: {measured:?}");
                    return Progress::Finished(Finding::Direction(measured));
                }
                Progress::Running
            }
        }
    }

    fn arrived<M: Mount>(
        &self,
        sample: &Sample,
        mount: &mut M,
        target: &Direction3,
        tolerance: f64,
    ) -> bool {
        let settled = mount.align(&sample.forward, target);
        if settled || is_aligned(target, &sample.forward, tolerance) {
            mount.stop();
            return true;
        }
        false
    }
}

impl Default for DirectionProbe {
    fn default() -> Self {
        Self::new()
    }
}

/// Estimates angular speed from how fast exposure decays on a still sensor
///
/// With the sensor forward in the orbital plane, `acos(exposure)` is the angle
/// to the source, so its change per tick is the orbital rate. Samples are taken
/// only after two consecutive drops, which keeps the tick in which the source
/// crosses the sensor forward out of the average.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeedSampler {
    samples: Vec<f64>,
    previous: Option<f64>,
    falling: u32,
}

impl SpeedSampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn step<M: Mount>(
        &mut self,
        sample: &Sample,
        mount: &mut M,
        model: &OrbitModel,
        settings: &ControllerSettings,
    ) -> Progress {
        mount.stop();
        let exposure = sample.exposure;
        if exposure < settings.speed.sample_floor {
            debug!(
                "exposure {exposure:.4} under sampling floor with {} samples",
                self.samples.len()
            );
            self.previous = None;
            self.falling = 0;
            return Progress::Finished(Finding::SourceLost);
        }

        if let Some(previous) = self.previous {
            if exposure < previous {
                self.falling += 1;
            } else {
                self.falling = 0;
            }
            if self.falling >= 2 && exposure <= settings.speed.sample_ceiling {
                let rate = (exposure.acos() - previous.acos()).abs() / settings.tick_interval;
                if rate <= model.max_angular_speed() {
                    self.samples.push(rate);
                } else {
                    debug!("discarded implausible rate sample {rate}");
                }
            }
        }
        self.previous = Some(exposure);

        let target = settings.speed.sample_count as usize;
        if self.samples.len() >= target {
            let speed = self.samples.iter().sum::<f64>() / self.samples.len() as f64;
            info!("angular speed found: {speed:.6} rad/s from {} samples", self.samples.len());
            return Progress::Finished(Finding::AngularSpeed(speed));
        }
        Progress::Waiting
    }
}

/// Continuous tracking of a fully mapped orbit
///
/// The bearing turns about the plane normal at the orbital rate plus a
/// correction. The correction is zero while exposure is at or above the aligned
/// threshold, grows as exposure falls below it, and reverses whenever exposure
/// keeps falling while it is applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingLoop {
    bearing: Option<Direction3>,
    correction_sign: f64,
    last_exposure: Option<f64>,
    aligned: bool,
}

impl TrackingLoop {
    pub fn new() -> Self {
        Self {
            bearing: None,
            correction_sign: 1.0,
            last_exposure: None,
            aligned: false,
        }
    }

    /// True while exposure is at or above the aligned threshold
    pub fn is_aligned(&self) -> bool {
        self.aligned
    }

    pub fn bearing(&self) -> Option<Direction3> {
        self.bearing
    }

    /// Correction rate for the current exposure, in radians per second
    pub fn correction(&mut self, exposure: f64, settings: &ControllerSettings) -> f64 {
        let tracking = &settings.tracking;
        let falling = self
            .last_exposure
            .is_some_and(|previous| exposure - previous < -settings.search.negative_delta);
        self.last_exposure = Some(exposure);

        if exposure >= tracking.aligned_exposure {
            if !self.aligned {
                info!("tracking aligned at exposure {exposure:.6}");
            }
            self.aligned = true;
            return 0.0;
        }

        if falling && !self.aligned {
            self.correction_sign = -self.correction_sign;
        }
        self.aligned = false;
        let shortfall = tracking.aligned_exposure - exposure;
        self.correction_sign * (shortfall * tracking.correction_gain).max(tracking.min_correction)
    }

    pub fn step<M: Mount>(
        &mut self,
        sample: &Sample,
        mount: &mut M,
        model: &OrbitModel,
        settings: &ControllerSettings,
    ) -> Progress {
        let (Some(normal), Some(orbital_rate)) = (model.plane_normal(), model.signed_rate()) else {
            return Progress::Finished(Finding::MissingParameter);
        };

        let rate = orbital_rate + self.correction(sample.exposure, settings);
        let bearing = self
            .bearing
            .unwrap_or_else(|| in_plane_seed(&sample.forward, &sample.down, &normal));
        let bearing = rotate_signed(&bearing, &normal, rate * settings.tick_interval);
        self.bearing = Some(bearing);

        mount.align(&sample.forward, &bearing);
        Progress::Running
    }
}

impl Default for TrackingLoop {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// Mount that records the last command and never moves
    #[derive(Debug, Default)]
    struct ScriptedMount {
        drives: Vec<(DriveAxis, f64)>,
        aligns: Vec<Vector3<f64>>,
        settled: bool,
        stops: u32,
    }

    impl Mount for ScriptedMount {
        fn drive(&mut self, axis: DriveAxis, rate: f64) {
            self.drives.push((axis, rate));
        }
        fn align(&mut self, _origin: &Vector3<f64>, target: &Vector3<f64>) -> bool {
            self.aligns.push(*target);
            self.settled
        }
        fn stop(&mut self) {
            self.stops += 1;
        }
        fn lock(&mut self) {}
        fn unlock(&mut self) {}
    }

    fn sample(exposure: f64, forward: Vector3<f64>) -> Sample {
        Sample {
            exposure,
            forward,
            down: -Vector3::z(),
        }
    }

    fn mapped_model() -> OrbitModel {
        let mut model = OrbitModel::default();
        model.set_plane_normal(Vector3::z());
        model.set_direction(RotationSign::Positive);
        model.set_angular_speed(0.01);
        model
    }

    #[test]
    fn test_search_rate() {
        assert_abs_diff_eq!(search_rate(0.0, 0.005), 0.5);
        assert_abs_diff_eq!(search_rate(0.999, 0.005), 0.005);
    }

    #[test]
    fn test_plane_search_flips_then_switches_axis() {
        let settings = ControllerSettings::default();
        let mut mount = ScriptedMount::default();
        let mut search = PlaneNormalSearch::new();
        let forward = Vector3::x();

        search.step(&sample(0.5, forward), &mut mount, &settings);
        assert_eq!(mount.drives.last(), Some(&(DriveAxis::Primary, 0.25)));

        // First drop reverses the current axis
        search.step(&sample(0.4, forward), &mut mount, &settings);
        assert_eq!(search.axis(), DriveAxis::Primary);
        assert_eq!(search.sign(DriveAxis::Primary), -1.0);
        assert_eq!(mount.drives.last(), Some(&(DriveAxis::Primary, -0.3)));

        // Improvement keeps going
        search.step(&sample(0.6, forward), &mut mount, &settings);
        assert_eq!(search.axis(), DriveAxis::Primary);

        // Second drop moves on to the other axis
        search.step(&sample(0.5, forward), &mut mount, &settings);
        assert_eq!(search.axis(), DriveAxis::Secondary);
        assert_eq!(search.sign(DriveAxis::Secondary), 1.0);
        assert_eq!(mount.drives.last(), Some(&(DriveAxis::Secondary, 0.25)));
    }

    #[test]
    fn test_plane_search_switches_axis_on_stall() {
        let mut settings = ControllerSettings::default();
        settings.search.stall_ticks = 3;
        let mut mount = ScriptedMount::default();
        let mut search = PlaneNormalSearch::new();

        for _ in 0..4 {
            search.step(&sample(0.0, Vector3::x()), &mut mount, &settings);
        }
        assert_eq!(search.axis(), DriveAxis::Secondary);
        assert_eq!(search.sign(DriveAxis::Secondary), -1.0);
    }

    #[test]
    fn test_plane_search_records_two_rays() {
        let mut settings = ControllerSettings::default();
        settings.search.ray_pause_ticks = 2;
        let mut mount = ScriptedMount::default();
        let mut search = PlaneNormalSearch::new();

        let progress = search.step(&sample(1.0, Vector3::x()), &mut mount, &settings);
        assert_eq!(progress, Progress::Waiting);
        assert_eq!(search.first_ray(), Some(Vector3::x()));
        assert!(search.is_waiting());
        // Resumes from a different bias
        assert_eq!(search.axis(), DriveAxis::Secondary);
        assert_eq!(search.sign(DriveAxis::Primary), -1.0);

        assert_eq!(search.step(&sample(0.3, Vector3::x()), &mut mount, &settings), Progress::Waiting);
        assert_eq!(search.step(&sample(0.3, Vector3::x()), &mut mount, &settings), Progress::Waiting);
        assert!(!search.is_waiting());

        // A ray too close to the first is discarded
        let near = Vector3::new(1.0, 0.0, 0.001).normalize();
        assert_eq!(search.step(&sample(1.0, near), &mut mount, &settings), Progress::Waiting);
        assert_eq!(search.first_ray(), Some(Vector3::x()));

        search.step(&sample(0.3, Vector3::x()), &mut mount, &settings);
        search.step(&sample(0.3, Vector3::x()), &mut mount, &settings);
        let progress = search.step(&sample(1.0, Vector3::z()), &mut mount, &settings);
        let Progress::Finished(Finding::PlaneNormal(normal)) = progress else {
            panic!("expected a plane normal, got {progress:?}");
        };
        assert_abs_diff_eq!(normal, -Vector3::y(), epsilon = 1e-12);
    }

    #[test]
    fn test_normal_alignment_picks_reachable_sign() {
        let settings = ControllerSettings::default();
        let mut mount = ScriptedMount::default();
        let mut model = OrbitModel::default();
        model.set_plane_normal(Vector3::new(0.0, 0.1, 1.0));

        let progress = NormalAlignment.step(&sample(0.5, Vector3::x()), &mut mount, &model, &settings);
        assert_eq!(progress, Progress::Running);
        // Down points along -z, so the negative normal is the target
        assert!(mount.aligns[0].z < 0.0);

        let aligned = Sample {
            exposure: 0.5,
            forward: Vector3::x(),
            down: -model.plane_normal().unwrap(),
        };
        let progress = NormalAlignment.step(&aligned, &mut mount, &model, &settings);
        assert_eq!(progress, Progress::Finished(Finding::Aligned));
    }

    #[test]
    fn test_routines_require_mapped_parameters() {
        let settings = ControllerSettings::default();
        let mut mount = ScriptedMount::default();
        let empty = OrbitModel::default();
        let input = sample(0.5, Vector3::x());

        let missing = Progress::Finished(Finding::MissingParameter);
        assert_eq!(NormalAlignment.step(&input, &mut mount, &empty, &settings), missing);
        assert_eq!(SourceSweep::new().step(&input, &mut mount, &empty, &settings), missing);
        assert_eq!(DirectionProbe::new().step(&input, &mut mount, &empty, &settings), missing);
        assert_eq!(TrackingLoop::new().step(&input, &mut mount, &empty, &settings), missing);
    }

    #[test]
    fn test_source_sweep_reverses_on_drop() {
        let settings = ControllerSettings::default();
        let mut mount = ScriptedMount::default();
        let model = mapped_model();
        let mut sweep = SourceSweep::new();

        sweep.step(&sample(0.5, Vector3::x()), &mut mount, &model, &settings);
        let first = mount.aligns[0];
        assert!(first.y > 0.0, "positive sweep turns counter-clockwise");

        sweep.step(&sample(0.4, Vector3::x()), &mut mount, &model, &settings);
        let second = mount.aligns[1];
        assert!(second.y < first.y, "a drop reverses the sweep");

        let progress = sweep.step(&sample(0.99999, Vector3::x()), &mut mount, &model, &settings);
        assert_eq!(progress, Progress::Finished(Finding::Aligned));
    }

    #[test]
    fn test_direction_classification() {
        assert_eq!(DirectionProbe::classify(true, false), RotationSign::Positive);
        assert_eq!(DirectionProbe::classify(false, true), RotationSign::Positive);
        assert_eq!(DirectionProbe::classify(true, true), RotationSign::Negative);
        assert_eq!(DirectionProbe::classify(false, false), RotationSign::Negative);
    }

    #[test]
    fn test_direction_probe_needs_consistent_samples() {
        let settings = ControllerSettings::default();
        let mut mount = ScriptedMount {
            settled: true,
            ..Default::default()
        };
        let model = mapped_model();
        let mut probe = DirectionProbe::new();
        let forward = Vector3::x();

        // One measurement cycle: settle, idle drift, offset comparison
        let mut cycle = |probe: &mut DirectionProbe, idle: f64, offset: f64| {
            probe.step(&sample(0.6, forward), &mut mount, &model, &settings);
            probe.step(&sample(idle, forward), &mut mount, &model, &settings);
            probe.step(&sample(offset, forward), &mut mount, &model, &settings)
        };

        // idle up, offset down -> positive
        assert_eq!(cycle(&mut probe, 0.61, 0.5), Progress::Running);
        assert_eq!(probe.agreeing(), 1);
        // inconsistent sample restarts the count
        assert_eq!(cycle(&mut probe, 0.59, 0.5), Progress::Running);
        assert_eq!(probe.candidate(), Some(RotationSign::Negative));
        assert_eq!(probe.agreeing(), 1);

        assert_eq!(cycle(&mut probe, 0.59, 0.4), Progress::Running);
        assert_eq!(
            cycle(&mut probe, 0.59, 0.4),
            Progress::Finished(Finding::Direction(RotationSign::Negative))
        );
    }

    #[test]
    fn test_direction_probe_shifts_off_the_source() {
        let settings = ControllerSettings::default();
        let mut mount = ScriptedMount {
            settled: true,
            ..Default::default()
        };
        let model = mapped_model();
        let mut probe = DirectionProbe::new();

        // Exposure above cos(offset): base bearing moves clockwise by twice the offset
        probe.step(&sample(0.99, Vector3::x()), &mut mount, &model, &settings);
        probe.step(&sample(0.6, Vector3::x()), &mut mount, &model, &settings);
        let shifted = mount.aligns[1];
        assert_abs_diff_eq!(shifted.y, -(0.8f64).sin(), epsilon = 1e-12);
    }

    #[test]
    fn test_speed_sampler_averages_clean_samples() {
        let mut settings = ControllerSettings::default();
        settings.speed.sample_count = 4;
        settings.tick_interval = 0.5;
        let mut mount = ScriptedMount::default();
        let model = mapped_model();
        let mut sampler = SpeedSampler::new();

        // Source passes the sensor forward, then recedes at 0.01 rad/s
        let angles = [0.104, 0.101, 0.102, 0.107, 0.112, 0.117, 0.122];
        let mut progress = Progress::Waiting;
        for angle in angles {
            progress = sampler.step(&sample(f64::cos(angle), Vector3::x()), &mut mount, &model, &settings);
        }
        let Progress::Finished(Finding::AngularSpeed(speed)) = progress else {
            panic!("expected a speed, got {progress:?}");
        };
        assert_abs_diff_eq!(speed, 0.01, epsilon = 1e-6);
        assert_eq!(sampler.samples().len(), 4);
    }

    #[test]
    fn test_speed_sampler_skips_the_peak() {
        let settings = ControllerSettings::default();
        let mut mount = ScriptedMount::default();
        let model = mapped_model();
        let mut sampler = SpeedSampler::new();

        for angle in [0.0, 0.01, 0.02, 0.03, 0.04, 0.05] {
            sampler.step(&sample(f64::cos(angle), Vector3::x()), &mut mount, &model, &settings);
        }
        assert!(sampler.samples().is_empty());
    }

    #[test]
    fn test_speed_sampler_reports_lost_source() {
        let settings = ControllerSettings::default();
        let mut mount = ScriptedMount::default();
        let model = mapped_model();
        let mut sampler = SpeedSampler::new();

        let progress = sampler.step(&sample(0.2, Vector3::x()), &mut mount, &model, &settings);
        assert_eq!(progress, Progress::Finished(Finding::SourceLost));
    }

    #[test]
    fn test_tracking_correction() {
        let settings = ControllerSettings::default();
        let mut tracking = TrackingLoop::new();

        assert_eq!(tracking.correction(0.99999, &settings), 0.0);
        assert!(tracking.is_aligned());

        let first = tracking.correction(0.9, &settings);
        assert!(first > 0.0);
        assert!(!tracking.is_aligned());

        // Still falling while correcting: reverse
        let second = tracking.correction(0.8, &settings);
        assert!(second < 0.0);
        assert!(second.abs() > first.abs(), "correction grows with the shortfall");

        // Rising: keep the sign
        let third = tracking.correction(0.85, &settings);
        assert!(third < 0.0);
    }
}
