//! Scalar feedback sensor and exposure classification

use log::warn;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::types::FaultSettings;

/// Scalar irradiance sensor collaborator
pub trait Sensor {
    /// Current output, `None` when the device reports nothing
    fn output(&self) -> Option<f64>;
    /// Output at perfect alignment; depends on the device size
    fn max_output(&self) -> f64;
    /// World-frame unit vector the sensor faces
    fn forward(&self) -> Vector3<f64>;
    /// World-frame unit vector perpendicular to `forward`, "down" in the sensor frame
    fn down(&self) -> Vector3<f64>;
}

/// Normalized exposure in `[0, 1]`, or `None` when no usable reading exists
///
/// # Example
/// ```
/// use helio_seek::exposure;
///
/// assert_eq!(exposure(Some(60.0), 120.0), Some(0.5));
/// assert_eq!(exposure(Some(60.0), 0.0), None);
/// assert_eq!(exposure(None, 120.0), None);
/// ```
pub fn exposure(output: Option<f64>, max_output: f64) -> Option<f64> {
    let output = output?;
    if !(max_output > 0.0) || !max_output.is_finite() {
        return None;
    }
    let value = output / max_output;
    if value.is_nan() {
        return None;
    }
    Some(value.clamp(0.0, 1.0))
}

/// Classified exposure sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    /// Usable exposure
    Valid(f64),
    /// Sensor reported nothing usable
    Unavailable,
    /// Exposure collapsed in a way the geometry cannot produce in one tick
    Occluded(f64),
}

/// Tracks the previous exposure to spot occlusion drops
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExposureMonitor {
    last: Option<f64>,
}

impl ExposureMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify a fresh reading against the previous one
    pub fn classify(&mut self, exposure: Option<f64>, settings: &FaultSettings) -> Reading {
        let Some(value) = exposure else {
            warn!("sensor reading unavailable");
            return Reading::Unavailable;
        };

        let previous = self.last.unwrap_or(0.0);
        if previous >= settings.occlusion_floor && value < settings.pause_threshold {
            warn!("exposure dropped from {previous:.4} to {value:.4}, treating as occlusion");
            return Reading::Occluded(value);
        }

        self.last = Some(value);
        Reading::Valid(value)
    }

    /// Forget the baseline so the post-fault reading is accepted as-is
    pub fn reset(&mut self) {
        self.last = None;
    }

    pub fn last(&self) -> Option<f64> {
        self.last
    }
}
