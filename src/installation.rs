//! Multi-rig manager
//!
//! Once one controller has mapped the orbit, any number of installations can
//! follow the source with it. Each installation pairs a reference sensor with a
//! rotor/hinge gimbal that also carries a number of harvesting devices; the
//! device count only matters for torque calibration.

use core::fmt;
use core::mem;
use std::collections::BTreeMap;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::actuator::{Gimbal, JointHardware, Mount};
use crate::error::ConfigurationError;
use crate::orbit::OrbitModel;
use crate::routines::{Finding, NormalAlignment, Progress, Sample, SourceSweep, TrackingLoop};
use crate::sensor::{Sensor, exposure};
use crate::types::ControllerSettings;

/// Lifecycle of an installation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstallationStatus {
    Idle,
    AligningToPlaneNormal,
    AligningToSun,
    MatchingRotation,
    Aligned,
}

impl InstallationStatus {
    fn is_tracking(self) -> bool {
        matches!(self, InstallationStatus::MatchingRotation | InstallationStatus::Aligned)
    }
}

impl fmt::Display for InstallationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Joint torque as a function of the carried device count
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TorqueSettings {
    /// Torque for an empty assembly
    pub base: f64,
    /// Additional torque per carried device
    pub per_device: f64,
    /// Fraction of the rotor torque applied to the hinge
    pub hinge_share: f64,
}

impl Default for TorqueSettings {
    fn default() -> Self {
        Self {
            base: 5_000.0,
            per_device: 2_000.0,
            hinge_share: 0.5,
        }
    }
}

impl TorqueSettings {
    /// `(rotor, hinge)` torque for `devices` carried devices
    pub fn for_devices(&self, devices: u32) -> (f64, f64) {
        let rotor = self.base + self.per_device * f64::from(devices);
        (rotor, rotor * self.hinge_share)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Phase {
    Idle,
    AligningToPlaneNormal(NormalAlignment),
    AligningToSun(SourceSweep),
    Tracking(TrackingLoop),
}

/// One sensor and gimbal with its carried devices
#[derive(Debug)]
pub struct Installation<J, S> {
    id: String,
    gimbal: Gimbal<J>,
    sensor: S,
    devices: u32,
    phase: Phase,
}

impl<J: JointHardware, S: Sensor> Installation<J, S> {
    pub fn new(id: impl Into<String>, gimbal: Gimbal<J>, sensor: S, devices: u32) -> Self {
        Self {
            id: id.into(),
            gimbal,
            sensor,
            devices,
            phase: Phase::Idle,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn devices(&self) -> u32 {
        self.devices
    }

    pub fn gimbal(&self) -> &Gimbal<J> {
        &self.gimbal
    }

    pub fn status(&self) -> InstallationStatus {
        match &self.phase {
            Phase::Idle => InstallationStatus::Idle,
            Phase::AligningToPlaneNormal(_) => InstallationStatus::AligningToPlaneNormal,
            Phase::AligningToSun(_) => InstallationStatus::AligningToSun,
            Phase::Tracking(tracking) if tracking.is_aligned() => InstallationStatus::Aligned,
            Phase::Tracking(_) => InstallationStatus::MatchingRotation,
        }
    }

    /// Apply torques scaled to the device count
    pub fn calibrate_torque(&mut self, torque: &TorqueSettings) -> (f64, f64) {
        let (rotor, hinge) = torque.for_devices(self.devices);
        self.gimbal.set_torque(rotor, hinge);
        (rotor, hinge)
    }

    /// Stop and start over from `Idle`
    pub fn reset(&mut self) {
        self.gimbal.stop();
        self.phase = Phase::Idle;
    }

    /// Advance one tick against a shared model
    pub fn step(&mut self, model: &OrbitModel, settings: &ControllerSettings) -> InstallationStatus {
        let before = self.status();
        let Some(exposure) = exposure(self.sensor.output(), self.sensor.max_output()) else {
            warn!("installation '{}': sensor unavailable, holding", self.id);
            self.gimbal.stop();
            return before;
        };
        let sample = Sample {
            exposure,
            forward: self.sensor.forward(),
            down: self.sensor.down(),
        };

        let gimbal = &mut self.gimbal;
        self.phase = match mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Idle if model.is_fully_mapped() => Phase::AligningToPlaneNormal(NormalAlignment),
            Phase::Idle => Phase::Idle,
            Phase::AligningToPlaneNormal(mut alignment) => match alignment.step(&sample, gimbal, model, settings) {
                Progress::Finished(Finding::Aligned) => Phase::AligningToSun(SourceSweep::new()),
                Progress::Finished(_) => Phase::Idle,
                _ => Phase::AligningToPlaneNormal(alignment),
            },
            Phase::AligningToSun(mut sweep) => match sweep.step(&sample, gimbal, model, settings) {
                Progress::Finished(Finding::Aligned) => Phase::Tracking(TrackingLoop::new()),
                Progress::Finished(_) => Phase::Idle,
                _ => Phase::AligningToSun(sweep),
            },
            Phase::Tracking(mut tracking) => match tracking.step(&sample, gimbal, model, settings) {
                Progress::Finished(_) => Phase::Idle,
                _ => Phase::Tracking(tracking),
            },
        };

        let after = self.status();
        if before != after {
            if !(before.is_tracking() && after.is_tracking()) {
                self.gimbal.stop();
            }
            info!("installation '{}': {before} -> {after}", self.id);
        }
        after
    }
}

/// Registry of installations by unique id
#[derive(Debug)]
pub struct Manager<J, S> {
    installations: BTreeMap<String, Installation<J, S>>,
    settings: ControllerSettings,
    torque: TorqueSettings,
}

impl<J: JointHardware, S: Sensor> Manager<J, S> {
    pub fn new(settings: ControllerSettings, torque: TorqueSettings) -> Result<Self, ConfigurationError> {
        settings.validate()?;
        Ok(Self {
            installations: BTreeMap::new(),
            settings,
            torque,
        })
    }

    /// Add an installation and calibrate its torque
    pub fn register(&mut self, mut installation: Installation<J, S>) -> Result<(), ConfigurationError> {
        if self.installations.contains_key(installation.id()) {
            return Err(ConfigurationError::DuplicateInstallation(installation.id().to_string()));
        }
        let (rotor, hinge) = installation.calibrate_torque(&self.torque);
        info!(
            "registered installation '{}' with {} devices (torque {rotor}/{hinge})",
            installation.id(),
            installation.devices()
        );
        self.installations.insert(installation.id().to_string(), installation);
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Option<Installation<J, S>> {
        let mut installation = self.installations.remove(id)?;
        installation.reset();
        Some(installation)
    }

    pub fn get(&self, id: &str) -> Option<&Installation<J, S>> {
        self.installations.get(id)
    }

    pub fn len(&self) -> usize {
        self.installations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.installations.is_empty()
    }

    /// Step every installation once
    pub fn step_all(&mut self, model: &OrbitModel) {
        for installation in self.installations.values_mut() {
            installation.step(model, &self.settings);
        }
    }

    pub fn statuses(&self) -> BTreeMap<&str, InstallationStatus> {
        self.installations
            .iter()
            .map(|(id, installation)| (id.as_str(), installation.status()))
            .collect()
    }

    pub fn all_aligned(&self) -> bool {
        !self.is_empty()
            && self
                .installations
                .values()
                .all(|installation| installation.status() == InstallationStatus::Aligned)
    }
}
