use core::f64::consts::PI;

use helio_seek::actuator::wrap_angle;
use helio_seek::{
    JointKind, JointLimits, JointSettings, Vector3Ext, angle_between, plan_travel,
    plane_normal_from_rays, project_onto_plane, rotate_around_axis, rotate_signed,
    signed_angle_about_axis,
};
use nalgebra::Vector3;
use rand::prelude::*;
use rand_pcg::Pcg64;

const EPSILON: f64 = 1e-9;
const CASES: usize = 500;

fn random_vector(rng: &mut Pcg64) -> Vector3<f64> {
    Vector3::new(
        rng.random_range(-1.0..1.0),
        rng.random_range(-1.0..1.0),
        rng.random_range(-1.0..1.0),
    )
}

/// Random vector that is comfortably non-degenerate and not parallel to `axis`
fn random_off_axis(rng: &mut Pcg64, axis: &Vector3<f64>) -> Vector3<f64> {
    loop {
        let v = random_vector(rng);
        if v.magnitude() > 0.1 && angle_between(&v, axis) > 0.1 && angle_between(&v, axis) < PI - 0.1 {
            return v;
        }
    }
}

fn random_axis(rng: &mut Pcg64) -> Vector3<f64> {
    loop {
        let v = random_vector(rng);
        if v.magnitude() > 0.1 {
            return v.safe_normalize();
        }
    }
}

/// Signed angles stay in (-π, π] and the clockwise rotation by that angle reproduces the target
#[test]
fn test_signed_angle_rotation_roundtrip() {
    let mut rng = Pcg64::seed_from_u64(7);
    for _ in 0..CASES {
        let axis = random_axis(&mut rng);
        let from = random_off_axis(&mut rng, &axis);
        let to = random_off_axis(&mut rng, &axis);

        let angle = signed_angle_about_axis(&from, &to, &axis);
        assert!(angle > -PI && angle <= PI, "angle {angle} out of range");

        let from_in_plane = project_onto_plane(&from, &axis);
        let to_in_plane = project_onto_plane(&to, &axis);
        let (clockwise, _) = rotate_around_axis(&from_in_plane, &axis, angle);
        assert!(
            (clockwise - to_in_plane).magnitude() < 1e-7,
            "clockwise rotation by {angle} missed the target"
        );
    }
}

/// The clockwise and counter-clockwise candidates are mirror images
#[test]
fn test_rotation_candidates_are_opposite() {
    let mut rng = Pcg64::seed_from_u64(11);
    for _ in 0..CASES {
        let axis = random_axis(&mut rng);
        let v = random_vector(&mut rng);
        let angle = rng.random_range(-PI..PI);

        let (clockwise, counter_clockwise) = rotate_around_axis(&v, &axis, angle);
        let (back, _) = rotate_around_axis(&counter_clockwise, &axis, angle);
        assert!((back - v).magnitude() < EPSILON);
        assert!((rotate_signed(&v, &axis, -angle) - clockwise).magnitude() < EPSILON);
        assert!((clockwise.magnitude() - v.magnitude()).abs() < EPSILON);
    }
}

/// Projections are unit length and perpendicular to the normal, or zero when parallel
#[test]
fn test_projection_is_unit_and_perpendicular() {
    let mut rng = Pcg64::seed_from_u64(13);
    for _ in 0..CASES {
        let normal = random_axis(&mut rng) * rng.random_range(0.5..10.0);
        let v = random_off_axis(&mut rng, &normal);

        let projected = project_onto_plane(&v, &normal);
        assert!((projected.magnitude() - 1.0).abs() < EPSILON);
        assert!(projected.dot(&normal.safe_normalize()).abs() < EPSILON);
        assert!(project_onto_plane(&(normal * 3.0), &normal).is_degenerate());
    }
}

/// Rays at least the minimum separation apart give a normal orthogonal to both
#[test]
fn test_plane_normal_from_random_rays() {
    let mut rng = Pcg64::seed_from_u64(17);
    for _ in 0..CASES {
        let normal = random_axis(&mut rng);
        let first = project_onto_plane(&random_off_axis(&mut rng, &normal), &normal);
        let separation = rng.random_range(0.06..3.0);
        let second = rotate_signed(&first, &normal, separation);

        let found = plane_normal_from_rays(&first, &second, 0.05).expect("rays are separated");
        assert!((found - normal).magnitude() < 1e-7, "counter-clockwise rays give the normal itself");
        assert!(plane_normal_from_rays(&first, &rotate_signed(&first, &normal, 0.01), 0.05).is_none());
    }
}

/// Wrapped angles land in (-π, π] and differ from the input by whole turns
#[test]
fn test_wrap_angle_range() {
    let mut rng = Pcg64::seed_from_u64(19);
    for _ in 0..CASES {
        let angle = rng.random_range(-50.0..50.0);
        let wrapped = wrap_angle(angle);
        assert!(wrapped > -PI && wrapped <= PI);
        let turns = (angle - wrapped) / (2.0 * PI);
        assert!((turns - turns.round()).abs() < 1e-9);
    }
    assert_eq!(wrap_angle(-PI), PI);
}

/// Rotor targets stay in the window and always travel the requested sense
#[test]
fn test_rotor_travel_stays_in_window() {
    let rotor = JointLimits::for_kind(JointKind::Rotor, &JointSettings::default());
    let mut rng = Pcg64::seed_from_u64(23);
    for _ in 0..CASES {
        let current = rng.random_range(-PI..PI);
        let theta = rng.random_range(-PI..PI);
        let (target, velocity) = plan_travel(&rotor, current, theta, 0.5);

        assert!(target >= -PI && target <= PI, "target {target} left the window");
        assert_eq!(velocity.signum(), theta.signum());
        assert!((wrap_angle(target - current - theta)).abs() < 1e-9);
    }
}

/// Hinge targets stay inside the buffered stops
#[test]
fn test_hinge_travel_is_clamped() {
    let settings = JointSettings::default();
    let hinge = JointLimits::for_kind(JointKind::Hinge, &settings);
    let mut rng = Pcg64::seed_from_u64(29);
    for _ in 0..CASES {
        let current = rng.random_range(-1.5..1.5);
        let theta = rng.random_range(-PI..PI);
        let (target, velocity) = plan_travel(&hinge, current, theta, 0.5);

        let bound = hinge.travel_limit - settings.hinge_overshoot_epsilon;
        assert!(target.abs() <= bound + EPSILON);
        if velocity != 0.0 {
            assert_eq!(velocity.signum(), (target - current).signum());
        }
    }
}
