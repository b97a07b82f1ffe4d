//! Core types, settings and conventions for the helio-seek library

use core::f64::consts::{FRAC_PI_2, PI};
use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, ParseError};

/// One independently mappable field of the orbit model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    /// Normal of the source's rotation plane
    PlaneNormal,
    /// Handedness of the rotation about the plane normal
    Direction,
    /// Angular speed of the source in radians per second
    AngularSpeed,
}

impl Field {
    pub const ALL: [Field; 3] = [Field::PlaneNormal, Field::Direction, Field::AngularSpeed];
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::PlaneNormal => "normal",
            Field::Direction => "direction",
            Field::AngularSpeed => "speed",
        };
        f.write_str(name)
    }
}

impl FromStr for Field {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" | "planenormal" | "plane_normal" => Ok(Field::PlaneNormal),
            "direction" | "rotationdirection" => Ok(Field::Direction),
            "speed" | "angularspeed" | "angular_speed" => Ok(Field::AngularSpeed),
            _ => Err(ParseError::Field(s.to_string())),
        }
    }
}

/// Rotation sense of the source about the plane normal
///
/// `Positive` is counter-clockwise (right-handed) about the normal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RotationSign {
    Positive,
    Negative,
}

impl RotationSign {
    /// `+1.0` or `-1.0`
    pub fn signum(self) -> f64 {
        match self {
            RotationSign::Positive => 1.0,
            RotationSign::Negative => -1.0,
        }
    }

    /// Wire form: `1` or `-1`
    pub fn as_i8(self) -> i8 {
        match self {
            RotationSign::Positive => 1,
            RotationSign::Negative => -1,
        }
    }

    /// Accepts only `1` and `-1`
    pub fn from_i8(value: i8) -> Option<Self> {
        match value {
            1 => Some(RotationSign::Positive),
            -1 => Some(RotationSign::Negative),
            _ => None,
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            RotationSign::Positive => RotationSign::Negative,
            RotationSign::Negative => RotationSign::Positive,
        }
    }
}

/// Capability tag of a bounded, absolute-angle joint
///
/// The tag selects the travel-limit policy: a rotor wraps around a full turn,
/// a hinge is hard-clamped to a quarter turn either side of center.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JointKind {
    Rotor,
    Hinge,
}

impl fmt::Display for JointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JointKind::Rotor => f.write_str("rotor"),
            JointKind::Hinge => f.write_str("hinge"),
        }
    }
}

/// Travel-limit policy of a limited joint
///
/// Behavior differences between joint kinds are carried here as data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointLimits {
    /// Half-width of the travel window in radians; targets live in `[-limit, limit]`
    pub travel_limit: f64,
    /// Whether targets outside the window wrap by `2 × travel_limit`
    pub wraps: bool,
    /// Buffer kept between a clamped target and the hard stop, in radians
    pub overshoot_epsilon: f64,
}

impl JointLimits {
    /// Limits for a joint kind under the given settings
    pub fn for_kind(kind: JointKind, settings: &JointSettings) -> Self {
        match kind {
            JointKind::Rotor => Self {
                travel_limit: PI,
                wraps: true,
                overshoot_epsilon: 0.0,
            },
            JointKind::Hinge => Self {
                travel_limit: FRAC_PI_2,
                wraps: false,
                overshoot_epsilon: settings.hinge_overshoot_epsilon,
            },
        }
    }
}

/// One of the two drive axes of a mount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriveAxis {
    /// Base rotor, or yaw for a continuous mount
    Primary,
    /// Hinge, or pitch for a continuous mount
    Secondary,
}

impl DriveAxis {
    pub fn other(self) -> Self {
        match self {
            DriveAxis::Primary => DriveAxis::Secondary,
            DriveAxis::Secondary => DriveAxis::Primary,
        }
    }
}

/// Name of the routine the controller is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoutineKind {
    Idle,
    DeterminingPlaneNormal,
    AligningToPlaneNormal,
    AligningToSource,
    DeterminingDirection,
    DeterminingAngularSpeed,
    Tracking,
    Paused,
}

impl fmt::Display for RoutineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Joint alignment settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JointSettings {
    /// Residual angle below which no command is issued, in radians
    pub precision: f64,
    /// Maximum commanded rate in radians per second
    pub max_rate: f64,
    /// Commanded rate per radian of residual misalignment
    pub gain: f64,
    /// Buffer a hinge keeps behind its hard stop, in radians
    pub hinge_overshoot_epsilon: f64,
    /// Residual a rotor must reach before the hinge on top of it moves, in radians
    pub hinge_gate: f64,
}

impl Default for JointSettings {
    fn default() -> Self {
        Self {
            precision: 1e-4,
            max_rate: 0.75,
            gain: 4.0,
            hinge_overshoot_epsilon: 0.01,
            hinge_gate: 0.2,
        }
    }
}

/// Plane-normal search settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Slowest search rate in radians per second
    pub min_speed: f64,
    /// Exposure drop per tick that counts as "getting worse"
    pub negative_delta: f64,
    /// Exposure at which the sensor is taken to face the source exactly
    pub ray_exposure: f64,
    /// Ticks to wait between the first and the second reference ray
    pub ray_pause_ticks: u32,
    /// Smallest accepted angle between the two reference rays, in radians
    pub min_ray_separation: f64,
    /// Ticks without exposure change before the search changes axis
    pub stall_ticks: u32,
    /// Dot-product tolerance for sensor-down alignment with the plane normal
    pub normal_tolerance: f64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            min_speed: 0.005,
            negative_delta: 1e-9,
            ray_exposure: 1.0 - 1e-6,
            ray_pause_ticks: 600,
            min_ray_separation: 0.05,
            stall_ticks: 40,
            normal_tolerance: 1e-5,
        }
    }
}

/// Rotation-direction probe settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectionSettings {
    /// Yaw offset applied about the plane normal, in radians
    pub yaw_offset: f64,
    /// Consecutive agreeing measurements required
    pub required_samples: u32,
    /// Dot-product tolerance for a yaw move to count as finished
    pub settle_tolerance: f64,
}

impl Default for DirectionSettings {
    fn default() -> Self {
        Self {
            yaw_offset: 0.4,
            required_samples: 3,
            settle_tolerance: 1e-6,
        }
    }
}

/// Angular-speed sampling settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedSettings {
    /// Number of rate samples averaged into the estimate
    pub sample_count: u32,
    /// Exposure below which sampling stops and the sensor re-acquires the source
    pub sample_floor: f64,
    /// Samples are taken only once exposure has fallen to this level
    pub sample_ceiling: f64,
}

impl Default for SpeedSettings {
    fn default() -> Self {
        Self {
            sample_count: 32,
            sample_floor: 0.5,
            sample_ceiling: 0.995,
        }
    }
}

/// Source acquisition and tracking settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingSettings {
    /// Exposure at or above which the sensor counts as aligned with the source
    pub aligned_exposure: f64,
    /// Correction rate per unit of exposure shortfall, in radians per second
    pub correction_gain: f64,
    /// Smallest non-zero correction rate in radians per second
    pub min_correction: f64,
    /// Acquisition sweep rate per radian of estimated misalignment
    pub sweep_gain: f64,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            aligned_exposure: 0.9998,
            correction_gain: 0.5,
            min_correction: 0.01,
            sweep_gain: 8.0,
        }
    }
}

/// Transient sensor fault settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaultSettings {
    /// Exposure below which a sudden drop counts as occlusion
    pub pause_threshold: f64,
    /// Previous exposure must be at least this for a drop to count as occlusion
    pub occlusion_floor: f64,
    /// Ticks the active routine waits out a fault
    pub pause_ticks: u32,
}

impl Default for FaultSettings {
    fn default() -> Self {
        Self {
            pause_threshold: 0.02,
            occlusion_floor: 0.2,
            pause_ticks: 30,
        }
    }
}

/// Controller settings
///
/// Groups every tunable of the controller. Unspecified JSON fields take their
/// default values.
///
/// # Example
/// ```
/// use helio_seek::ControllerSettings;
///
/// let settings = ControllerSettings::from_json(r#"{ "tick_interval": 0.5 }"#).unwrap();
/// assert_eq!(settings.tick_interval, 0.5);
/// assert_eq!(settings.direction.required_samples, 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerSettings {
    /// Seconds between ticks
    pub tick_interval: f64,
    /// Highest plausible orbital rate in radians per second
    pub max_angular_speed: f64,
    /// Ticks between data requests while the model is incomplete
    pub request_interval_ticks: u32,
    pub joint: JointSettings,
    pub search: SearchSettings,
    pub direction: DirectionSettings,
    pub speed: SpeedSettings,
    pub tracking: TrackingSettings,
    pub fault: FaultSettings,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            tick_interval: 0.1,
            max_angular_speed: 0.1,
            request_interval_ticks: 100,
            joint: JointSettings::default(),
            search: SearchSettings::default(),
            direction: DirectionSettings::default(),
            speed: SpeedSettings::default(),
            tracking: TrackingSettings::default(),
            fault: FaultSettings::default(),
        }
    }
}

impl ControllerSettings {
    /// Parse and validate settings from JSON
    pub fn from_json(text: &str) -> Result<Self, ConfigurationError> {
        let settings: Self = serde_json::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the routines cannot run with
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let positive = [
            ("tick_interval", self.tick_interval),
            ("max_angular_speed", self.max_angular_speed),
            ("joint.precision", self.joint.precision),
            ("joint.max_rate", self.joint.max_rate),
            ("joint.gain", self.joint.gain),
            ("search.min_speed", self.search.min_speed),
            ("direction.yaw_offset", self.direction.yaw_offset),
            ("tracking.sweep_gain", self.tracking.sweep_gain),
        ];
        for (name, value) in positive {
            if !(value > 0.0 && value.is_finite()) {
                return Err(ConfigurationError::InvalidSettings(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }

        let unit_interval = [
            ("search.ray_exposure", self.search.ray_exposure),
            ("speed.sample_floor", self.speed.sample_floor),
            ("speed.sample_ceiling", self.speed.sample_ceiling),
            ("tracking.aligned_exposure", self.tracking.aligned_exposure),
            ("fault.pause_threshold", self.fault.pause_threshold),
            ("fault.occlusion_floor", self.fault.occlusion_floor),
        ];
        for (name, value) in unit_interval {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigurationError::InvalidSettings(format!(
                    "{name} must lie in (0, 1], got {value}"
                )));
            }
        }

        if self.speed.sample_ceiling <= self.speed.sample_floor {
            return Err(ConfigurationError::InvalidSettings(
                "speed.sample_ceiling must exceed speed.sample_floor".to_string(),
            ));
        }

        if self.speed.sample_count == 0 || self.direction.required_samples == 0 {
            return Err(ConfigurationError::InvalidSettings(
                "sample counts must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
