//! Geometric primitives for plane projection, signed angles and axis rotation

use nalgebra::{Rotation3, Unit, Vector3};

use crate::error::ParseError;

/// Unit-length 3D direction. The zero vector is the "unmapped" sentinel.
pub type Direction3 = Vector3<f64>;

/// Squared magnitude below which a vector is treated as degenerate
const DEGENERATE_SQUARED: f64 = 1e-18;

/// Extension trait for Vector3 operations
pub trait Vector3Ext {
    /// Normalize the vector, returning zero vector if magnitude is zero
    fn safe_normalize(&self) -> Vector3<f64>;

    /// True for the zero sentinel (and anything too short to normalize)
    fn is_degenerate(&self) -> bool;
}

impl Vector3Ext for Vector3<f64> {
    fn safe_normalize(&self) -> Vector3<f64> {
        let magnitude_squared = self.magnitude_squared();
        if magnitude_squared > DEGENERATE_SQUARED && magnitude_squared.is_finite() {
            *self / magnitude_squared.sqrt()
        } else {
            Vector3::zeros()
        }
    }

    fn is_degenerate(&self) -> bool {
        !(self.magnitude_squared() > DEGENERATE_SQUARED)
    }
}

/// Projects `vector` onto the plane perpendicular to `plane_normal` and normalizes it
///
/// Returns the zero vector when `vector` is parallel to `plane_normal`; callers
/// must check for that before using the result as a direction.
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use helio_seek::project_onto_plane;
///
/// let projected = project_onto_plane(&Vector3::new(1.0, 0.0, 1.0), &Vector3::z());
/// assert!((projected - Vector3::x()).magnitude() < 1e-12);
/// ```
pub fn project_onto_plane(vector: &Vector3<f64>, plane_normal: &Vector3<f64>) -> Direction3 {
    let normal = plane_normal.safe_normalize();
    (vector - normal * vector.dot(&normal)).safe_normalize()
}

/// Signed angle in `(-π, π]` that takes `from` onto `to` about `axis`
///
/// Both operands are projected onto the plane perpendicular to `axis` first.
/// The magnitude is `acos(from·to)`; the sign is the sign of `(from × axis)·to`,
/// so a positive angle is a clockwise turn looking down `axis` toward the origin.
/// Degenerate projections yield `0.0`.
pub fn signed_angle_about_axis(from: &Vector3<f64>, to: &Vector3<f64>, axis: &Vector3<f64>) -> f64 {
    let from = project_onto_plane(from, axis);
    let to = project_onto_plane(to, axis);
    if from.is_degenerate() || to.is_degenerate() {
        return 0.0;
    }

    let angle = from.dot(&to).clamp(-1.0, 1.0).acos();
    if from.cross(axis).dot(&to) < 0.0 {
        -angle
    } else {
        angle
    }
}

/// Both candidates of rotating `vector` about `axis` by `angle` radians
///
/// Which physical sense a joint turns in depends on the joint, so both are
/// returned: `.0` is the clockwise candidate (matching the sign convention of
/// [`signed_angle_about_axis`]) and `.1` the counter-clockwise (right-handed) one.
pub fn rotate_around_axis(
    vector: &Vector3<f64>,
    axis: &Vector3<f64>,
    angle: f64,
) -> (Direction3, Direction3) {
    let axis = axis.safe_normalize();
    if axis.is_degenerate() {
        return (*vector, *vector);
    }

    let axis = Unit::new_unchecked(axis);
    let clockwise = Rotation3::from_axis_angle(&axis, -angle) * vector;
    let counter_clockwise = Rotation3::from_axis_angle(&axis, angle) * vector;
    (clockwise, counter_clockwise)
}

/// Right-handed rotation of `vector` about `axis` by a signed `angle`
///
/// Positive angles are counter-clockwise, which is the positive orbital sense
/// used for [`crate::RotationSign::Positive`].
pub fn rotate_signed(vector: &Vector3<f64>, axis: &Vector3<f64>, angle: f64) -> Direction3 {
    rotate_around_axis(vector, axis, angle).1
}

/// True when `measured` is within `tolerance` of `target`
///
/// The tolerance is a fraction of the dot-product range (`dot >= 1 - tolerance`),
/// not an angle.
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use helio_seek::is_aligned;
///
/// let v = Vector3::new(0.0, 1.0, 0.0);
/// assert!(is_aligned(&v, &v, 0.0));
/// assert!(!is_aligned(&v, &-v, 1.5));
/// ```
pub fn is_aligned(target: &Vector3<f64>, measured: &Vector3<f64>, tolerance: f64) -> bool {
    target.dot(measured) >= 1.0 - tolerance
}

/// Angle in `[0, π]` between two vectors, `0.0` if either is degenerate
pub fn angle_between(a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
    let a = a.safe_normalize();
    let b = b.safe_normalize();
    if a.is_degenerate() || b.is_degenerate() {
        return 0.0;
    }
    a.dot(&b).clamp(-1.0, 1.0).acos()
}

/// Encodes a vector in the `X:Y:Z` wire and storage form
pub fn format_vector(vector: &Vector3<f64>) -> String {
    format!("{}:{}:{}", vector.x, vector.y, vector.z)
}

/// Parses the `X:Y:Z` form produced by [`format_vector`]
///
/// Surrounding braces and whitespace are tolerated so `{X:1 Y:2 Z:3}`-style
/// text with axis labels also parses.
pub fn parse_vector(text: &str) -> Result<Vector3<f64>, ParseError> {
    let trimmed = text.trim().trim_start_matches('{').trim_end_matches('}');
    let labelled = trimmed.contains('X') || trimmed.contains('x');

    let components: Vec<f64> = if labelled {
        trimmed
            .split_whitespace()
            .map(|part| {
                let value = part.split_once(':').map(|(_, value)| value).unwrap_or(part);
                value.parse::<f64>()
            })
            .collect::<Result<_, _>>()
            .map_err(|_| ParseError::Vector(text.to_string()))?
    } else {
        trimmed
            .split(':')
            .map(|part| part.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|_| ParseError::Vector(text.to_string()))?
    };

    match components.as_slice() {
        [x, y, z] if x.is_finite() && y.is_finite() && z.is_finite() => {
            Ok(Vector3::new(*x, *y, *z))
        }
        _ => Err(ParseError::Vector(text.to_string())),
    }
}

/// Normal of the plane spanned by two reference rays, `normalize(first × second)`
///
/// Returns `None` when the rays are closer than `min_separation` radians, since
/// near-parallel rays make the cross product dominated by measurement error.
pub fn plane_normal_from_rays(
    first: &Vector3<f64>,
    second: &Vector3<f64>,
    min_separation: f64,
) -> Option<Direction3> {
    if angle_between(first, second) < min_separation {
        return None;
    }
    let normal = first.cross(second).safe_normalize();
    (!normal.is_degenerate()).then_some(normal)
}
