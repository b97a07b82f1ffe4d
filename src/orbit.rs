//! Orbit model: the three estimated parameters of the source's orbit
//!
//! Each field is independently mapped or unmapped. Setters validate their input
//! and silently keep the previous value on rejection; remote snapshots merge
//! through the same setters.

use core::fmt;
use core::str::FromStr;

use log::{debug, warn};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::math::{Direction3, Vector3Ext, format_vector, parse_vector, rotate_signed};
use crate::types::{Field, RotationSign};

/// Default ceiling on a plausible orbital rate, in radians per second
pub const DEFAULT_MAX_ANGULAR_SPEED: f64 = 0.1;

/// Estimated orbit of the light source
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use helio_seek::{Field, OrbitModel};
///
/// let mut model = OrbitModel::new(0.1);
/// assert!(!model.is_mapped(Field::PlaneNormal));
///
/// model.set_plane_normal(Vector3::new(0.0, 0.0, 2.0));
/// assert_eq!(model.plane_normal(), Some(Vector3::z()));
///
/// // Out-of-range speeds are rejected, not clamped
/// model.set_angular_speed(5.0);
/// assert!(!model.is_mapped(Field::AngularSpeed));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrbitModel {
    plane_normal: Direction3,
    direction: Option<RotationSign>,
    angular_speed: f64,
    max_angular_speed: f64,
}

impl OrbitModel {
    /// Empty model accepting speeds up to `max_angular_speed`
    pub fn new(max_angular_speed: f64) -> Self {
        Self {
            plane_normal: Vector3::zeros(),
            direction: None,
            angular_speed: 0.0,
            max_angular_speed,
        }
    }

    pub fn plane_normal(&self) -> Option<Direction3> {
        (!self.plane_normal.is_degenerate()).then_some(self.plane_normal)
    }

    pub fn direction(&self) -> Option<RotationSign> {
        self.direction
    }

    pub fn angular_speed(&self) -> Option<f64> {
        (self.angular_speed > 0.0).then_some(self.angular_speed)
    }

    pub fn max_angular_speed(&self) -> f64 {
        self.max_angular_speed
    }

    /// Signed orbital rate (speed × direction) once both are mapped
    pub fn signed_rate(&self) -> Option<f64> {
        Some(self.angular_speed()? * self.direction?.signum())
    }

    /// Normalizes and stores the plane normal; rejects zero and non-finite input
    pub fn set_plane_normal(&mut self, normal: Vector3<f64>) -> bool {
        let normalized = normal.safe_normalize();
        if normalized.is_degenerate() {
            warn!("rejected plane normal {normal:?}");
            return false;
        }
        self.plane_normal = normalized;
        true
    }

    pub fn set_direction(&mut self, direction: RotationSign) {
        self.direction = Some(direction);
    }

    /// Stores a wire-form direction; only `1` and `-1` are accepted
    pub fn set_direction_value(&mut self, value: i8) -> bool {
        match RotationSign::from_i8(value) {
            Some(direction) => {
                self.direction = Some(direction);
                true
            }
            None => {
                warn!("rejected rotation direction {value}");
                false
            }
        }
    }

    /// Stores the angular speed; rejects values ≤ 0 or above the plausible maximum
    pub fn set_angular_speed(&mut self, speed: f64) -> bool {
        if !(speed > 0.0 && speed <= self.max_angular_speed) {
            warn!(
                "rejected angular speed {speed} (limit {})",
                self.max_angular_speed
            );
            return false;
        }
        self.angular_speed = speed;
        true
    }

    pub fn is_mapped(&self, field: Field) -> bool {
        match field {
            Field::PlaneNormal => self.plane_normal().is_some(),
            Field::Direction => self.direction.is_some(),
            Field::AngularSpeed => self.angular_speed().is_some(),
        }
    }

    pub fn is_fully_mapped(&self) -> bool {
        Field::ALL.iter().all(|field| self.is_mapped(*field))
    }

    pub fn mapped_count(&self) -> usize {
        Field::ALL.iter().filter(|field| self.is_mapped(**field)).count()
    }

    /// Unmaps one field; other fields are left as they are
    pub fn clear(&mut self, field: Field) {
        match field {
            Field::PlaneNormal => self.plane_normal = Vector3::zeros(),
            Field::Direction => self.direction = None,
            Field::AngularSpeed => self.angular_speed = 0.0,
        }
    }

    pub fn clear_all(&mut self) {
        for field in Field::ALL {
            self.clear(field);
        }
    }

    /// Source direction `elapsed` seconds after `direction` along the orbit
    pub fn advance(&self, direction: &Direction3, elapsed: f64) -> Option<Direction3> {
        let normal = self.plane_normal()?;
        Some(rotate_signed(direction, &normal, self.signed_rate()? * elapsed))
    }

    /// Copy of the mapped state for the wire and for storage
    pub fn snapshot(&self) -> OrbitSnapshot {
        OrbitSnapshot {
            plane_normal: self.plane_normal,
            direction: self.direction.map_or(0, RotationSign::as_i8),
            angular_speed: self.angular_speed,
        }
    }

    /// Writes every field of `snapshot` through the setters, unmapping absent ones
    pub fn restore(&mut self, snapshot: &OrbitSnapshot) {
        self.clear_all();
        self.copy_mapped(snapshot);
    }

    /// Merge a remote snapshot
    ///
    /// Accepted only when the snapshot maps at least as many valid fields as
    /// this model; every valid incoming field then overwrites the local one, and
    /// fields the snapshot leaves unmapped keep their local value. A direction is
    /// only meaningful against the normal it was measured with, so a local
    /// direction kept under an antiparallel incoming normal is flipped.
    pub fn merge(&mut self, snapshot: &OrbitSnapshot) -> MergeOutcome {
        let mut incoming = OrbitModel::new(self.max_angular_speed);
        incoming.copy_mapped(snapshot);

        let (remote, local) = (incoming.mapped_count(), self.mapped_count());
        if remote < local {
            debug!("rejected snapshot mapping {remote} fields, local maps {local}");
            return MergeOutcome::Rejected;
        }

        if let (Some(theirs), Some(ours), Some(sense), None) = (
            incoming.plane_normal(),
            self.plane_normal(),
            self.direction,
            incoming.direction,
        ) {
            if theirs.dot(&ours) < 0.0 {
                debug!("incoming normal is antiparallel, flipping local direction");
                self.direction = Some(sense.flipped());
            }
        }

        if let Some(normal) = incoming.plane_normal() {
            self.plane_normal = normal;
        }
        if let Some(direction) = incoming.direction {
            self.direction = Some(direction);
        }
        if let Some(speed) = incoming.angular_speed() {
            self.angular_speed = speed;
        }
        MergeOutcome::Accepted
    }

    fn copy_mapped(&mut self, snapshot: &OrbitSnapshot) {
        if !snapshot.plane_normal.is_degenerate() {
            self.set_plane_normal(snapshot.plane_normal);
        }
        if snapshot.direction != 0 {
            self.set_direction_value(snapshot.direction);
        }
        if snapshot.angular_speed != 0.0 {
            self.set_angular_speed(snapshot.angular_speed);
        }
    }
}

impl Default for OrbitModel {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ANGULAR_SPEED)
    }
}

/// Result of merging a remote snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Accepted,
    Rejected,
}

/// Wire form of an orbit model: `(plane normal, direction, angular speed)`
///
/// Encoded as `X:Y:Z|direction|speed`, with direction `0` and speed `0` for
/// unmapped fields.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrbitSnapshot {
    pub plane_normal: Direction3,
    pub direction: i8,
    pub angular_speed: f64,
}

impl OrbitSnapshot {
    /// Fields holding a value of the right shape
    ///
    /// The speed ceiling is a property of the receiving model, so an accepted
    /// count can still be lower after [`OrbitModel::merge`] validates it.
    pub fn mapped_count(&self) -> usize {
        usize::from(!self.plane_normal.is_degenerate())
            + usize::from(RotationSign::from_i8(self.direction).is_some())
            + usize::from(self.angular_speed > 0.0 && self.angular_speed.is_finite())
    }
}

impl fmt::Display for OrbitSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}",
            format_vector(&self.plane_normal),
            self.direction,
            self.angular_speed
        )
    }
}

impl FromStr for OrbitSnapshot {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ParseError::Snapshot(s.to_string());

        let mut parts = s.split('|');
        let (Some(normal), Some(direction), Some(speed), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed());
        };

        let plane_normal = parse_vector(normal).map_err(|_| malformed())?;
        let direction = direction.trim().parse::<i8>().map_err(|_| malformed())?;
        let angular_speed = speed.trim().parse::<f64>().map_err(|_| malformed())?;
        if !angular_speed.is_finite() {
            return Err(malformed());
        }

        Ok(Self {
            plane_normal,
            direction,
            angular_speed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn mapped_model() -> OrbitModel {
        let mut model = OrbitModel::default();
        model.set_plane_normal(Vector3::new(0.0, 3.0, 4.0));
        model.set_direction(RotationSign::Negative);
        model.set_angular_speed(0.002);
        model
    }

    #[test]
    fn test_new_model_is_unmapped() {
        let model = OrbitModel::default();
        assert_eq!(model.mapped_count(), 0);
        assert_eq!(model.plane_normal(), None);
        assert_eq!(model.direction(), None);
        assert_eq!(model.angular_speed(), None);
        assert_eq!(model.signed_rate(), None);
    }

    #[test]
    fn test_setters_reject_invalid_input() {
        let mut model = mapped_model();
        let before = model;

        assert!(!model.set_plane_normal(Vector3::zeros()));
        assert!(!model.set_plane_normal(Vector3::new(f64::NAN, 0.0, 1.0)));
        assert!(!model.set_angular_speed(-0.01));
        assert!(!model.set_angular_speed(0.0));
        assert!(!model.set_angular_speed(0.5));
        assert!(!model.set_direction_value(0));
        assert!(!model.set_direction_value(3));

        assert_eq!(model, before);
    }

    #[test]
    fn test_plane_normal_is_normalized() {
        let model = mapped_model();
        assert_abs_diff_eq!(model.plane_normal().unwrap(), Vector3::new(0.0, 0.6, 0.8), epsilon = 1e-12);
    }

    #[test]
    fn test_clear_does_not_cascade() {
        let mut model = mapped_model();
        model.clear(Field::PlaneNormal);
        assert!(!model.is_mapped(Field::PlaneNormal));
        assert!(model.is_mapped(Field::Direction));
        assert!(model.is_mapped(Field::AngularSpeed));

        model.clear_all();
        assert_eq!(model.mapped_count(), 0);
    }

    #[test]
    fn test_signed_rate_and_advance() {
        let model = mapped_model();
        assert_abs_diff_eq!(model.signed_rate().unwrap(), -0.002);

        let mut flat = OrbitModel::default();
        flat.set_plane_normal(Vector3::z());
        flat.set_direction(RotationSign::Positive);
        flat.set_angular_speed(0.01);
        let advanced = flat.advance(&Vector3::x(), 100.0).unwrap();
        assert_abs_diff_eq!(advanced, Vector3::new(1f64.cos(), 1f64.sin(), 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_snapshot_wire_form() {
        let snapshot = mapped_model().snapshot();
        let text = snapshot.to_string();
        assert_eq!(text, "0:0.6:0.8|-1|0.002");
        assert_eq!(text.parse::<OrbitSnapshot>().unwrap(), snapshot);

        let empty = OrbitModel::default().snapshot();
        assert_eq!(empty.to_string(), "0:0:0|0|0");
        assert_eq!(empty.mapped_count(), 0);

        assert!("0:0:1|1".parse::<OrbitSnapshot>().is_err());
        assert!("0:0:1|x|0.1".parse::<OrbitSnapshot>().is_err());
        assert!("0:0:1|1|0.1|extra".parse::<OrbitSnapshot>().is_err());
        assert!("0:0:1|1|inf".parse::<OrbitSnapshot>().is_err());
    }

    #[test]
    fn test_merge_policy() {
        let mut partial = OrbitModel::default();
        partial.set_plane_normal(Vector3::x());

        // A fuller snapshot wins
        let full = mapped_model().snapshot();
        assert_eq!(partial.merge(&full), MergeOutcome::Accepted);
        assert!(partial.is_fully_mapped());
        assert_abs_diff_eq!(partial.plane_normal().unwrap(), full.plane_normal, epsilon = 1e-12);
        assert_eq!(partial.direction(), Some(RotationSign::Negative));
        let merged = partial;

        // A sparser snapshot is refused
        let mut sparse = OrbitModel::default();
        sparse.set_plane_normal(Vector3::y());
        assert_eq!(partial.merge(&sparse.snapshot()), MergeOutcome::Rejected);
        assert_eq!(partial, merged);
    }

    #[test]
    fn test_merge_keeps_fields_the_snapshot_lacks() {
        let mut local = OrbitModel::default();
        local.set_plane_normal(Vector3::x());
        local.set_direction(RotationSign::Positive);

        let mut remote = OrbitModel::default();
        remote.set_plane_normal(Vector3::y());
        remote.set_angular_speed(0.003);

        assert_eq!(local.merge(&remote.snapshot()), MergeOutcome::Accepted);
        assert_eq!(local.plane_normal(), Some(Vector3::y()));
        assert_eq!(local.direction(), Some(RotationSign::Positive));
        assert_eq!(local.angular_speed(), Some(0.003));
    }

    #[test]
    fn test_merge_antiparallel_normal_flips_direction() {
        let mut local = OrbitModel::default();
        local.set_plane_normal(Vector3::z());
        local.set_direction(RotationSign::Positive);

        let remote: OrbitSnapshot = "0:0:-1|0|0.01".parse().unwrap();
        assert_eq!(local.merge(&remote), MergeOutcome::Accepted);
        assert_eq!(local.plane_normal(), Some(-Vector3::z()));
        assert_eq!(local.direction(), Some(RotationSign::Negative));

        // Same physical rotation as before the merge
        let mut reference = OrbitModel::default();
        reference.set_plane_normal(Vector3::z());
        reference.set_direction(RotationSign::Positive);
        reference.set_angular_speed(0.01);
        let expected = reference.advance(&Vector3::x(), 10.0).unwrap();
        let merged = local.advance(&Vector3::x(), 10.0).unwrap();
        assert!(merged.y > 0.09);
        assert_abs_diff_eq!(merged, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_merge_takes_incoming_direction_as_is() {
        let mut local = OrbitModel::default();
        local.set_plane_normal(Vector3::z());
        local.set_direction(RotationSign::Positive);

        let remote: OrbitSnapshot = "0:0:-1|1|0".parse().unwrap();
        assert_eq!(local.merge(&remote), MergeOutcome::Accepted);
        assert_eq!(local.plane_normal(), Some(-Vector3::z()));
        assert_eq!(local.direction(), Some(RotationSign::Positive));
    }

    #[test]
    fn test_merge_counts_only_valid_fields() {
        let junk: OrbitSnapshot = "0:0:-1|7|5.0".parse().unwrap();
        assert_eq!(junk.mapped_count(), 2);

        let mut local = OrbitModel::default();
        local.set_plane_normal(Vector3::z());
        local.set_direction(RotationSign::Positive);
        let before = local;

        // Direction 7 is never valid and 5.0 rad/s is above the ceiling
        assert_eq!(local.merge(&junk), MergeOutcome::Rejected);
        assert_eq!(local, before);

        let mut sparse = OrbitModel::default();
        sparse.set_plane_normal(Vector3::x());
        assert_eq!(sparse.merge(&junk), MergeOutcome::Accepted);
        assert_eq!(sparse.plane_normal(), Some(-Vector3::z()));
        assert_eq!(sparse.direction(), None);
        assert_eq!(sparse.angular_speed(), None);
    }

    #[test]
    fn test_restore_validates_through_setters() {
        let mut model = mapped_model();
        let corrupt = OrbitSnapshot {
            plane_normal: Vector3::z(),
            direction: 5,
            angular_speed: 9.0,
        };
        model.restore(&corrupt);
        assert_eq!(model.plane_normal(), Some(Vector3::z()));
        assert_eq!(model.direction(), None);
        assert_eq!(model.angular_speed(), None);
    }
}
