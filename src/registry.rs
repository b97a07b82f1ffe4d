//! Device catalog keyed by name and capability tag
//!
//! Hosts register every joint with the [`JointKind`] it was configured as, then
//! assemble mounts and controllers by name. Missing devices and devices of the
//! wrong kind are setup errors; nothing is removed from the catalog unless the
//! whole assembly succeeds.

use std::collections::BTreeMap;

use log::info;
use serde::{Deserialize, Serialize};

use crate::actuator::{Gimbal, JointHardware, LimitedJoint};
use crate::controller::Controller;
use crate::error::ConfigurationError;
use crate::sensor::Sensor;
use crate::types::{ControllerSettings, JointKind, JointSettings};

/// Device names making up one rig
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceNames {
    pub sensor: String,
    pub rotor: String,
    pub hinge: String,
}

/// Devices available to the host, not yet assembled
#[derive(Debug)]
pub struct DeviceCatalog<J, S> {
    joints: BTreeMap<String, (JointKind, J)>,
    sensors: BTreeMap<String, S>,
}

impl<J, S> Default for DeviceCatalog<J, S> {
    fn default() -> Self {
        Self {
            joints: BTreeMap::new(),
            sensors: BTreeMap::new(),
        }
    }
}

impl<J: JointHardware, S: Sensor> DeviceCatalog<J, S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a joint under its capability tag, replacing any device of the same name
    pub fn add_joint(&mut self, name: impl Into<String>, kind: JointKind, hardware: J) {
        self.joints.insert(name.into(), (kind, hardware));
    }

    pub fn add_sensor(&mut self, name: impl Into<String>, sensor: S) {
        self.sensors.insert(name.into(), sensor);
    }

    pub fn joint_kind(&self, name: &str) -> Option<JointKind> {
        self.joints.get(name).map(|(kind, _)| *kind)
    }

    pub fn has_sensor(&self, name: &str) -> bool {
        self.sensors.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.joints.len() + self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_joint(&self, name: &str, expected: JointKind) -> Result<(), ConfigurationError> {
        match self.joint_kind(name) {
            None => Err(ConfigurationError::MissingDevice {
                name: name.to_string(),
                kind: expected.to_string(),
            }),
            Some(found) if found != expected => Err(ConfigurationError::KindMismatch {
                name: name.to_string(),
                expected,
                found,
            }),
            Some(_) => Ok(()),
        }
    }

    fn check_sensor(&self, name: &str) -> Result<(), ConfigurationError> {
        if self.has_sensor(name) {
            Ok(())
        } else {
            Err(ConfigurationError::MissingDevice {
                name: name.to_string(),
                kind: "sensor".to_string(),
            })
        }
    }

    fn take_joint(&mut self, name: &str, settings: &JointSettings) -> Result<LimitedJoint<J>, ConfigurationError> {
        let (kind, mut hardware) = self
            .joints
            .remove(name)
            .ok_or_else(|| ConfigurationError::MissingDevice {
                name: name.to_string(),
                kind: "joint".to_string(),
            })?;
        hardware.enable();
        Ok(LimitedJoint::new(hardware, kind, *settings))
    }

    /// Remove a rotor and a hinge from the catalog and assemble them
    pub fn build_gimbal(
        &mut self,
        rotor: &str,
        hinge: &str,
        settings: &JointSettings,
    ) -> Result<Gimbal<J>, ConfigurationError> {
        self.check_joint(rotor, JointKind::Rotor)?;
        self.check_joint(hinge, JointKind::Hinge)?;

        let rotor = self.take_joint(rotor, settings)?;
        let hinge = self.take_joint(hinge, settings)?;
        Ok(Gimbal::new(rotor, hinge, settings))
    }

    pub fn take_sensor(&mut self, name: &str) -> Result<S, ConfigurationError> {
        self.check_sensor(name)?;
        self.sensors
            .remove(name)
            .ok_or_else(|| ConfigurationError::MissingDevice {
                name: name.to_string(),
                kind: "sensor".to_string(),
            })
    }

    /// Assemble a controller over the named devices
    pub fn build_controller(
        &mut self,
        names: &DeviceNames,
        settings: ControllerSettings,
    ) -> Result<Controller<Gimbal<J>, S>, ConfigurationError> {
        settings.validate()?;
        self.check_sensor(&names.sensor)?;
        self.check_joint(&names.rotor, JointKind::Rotor)?;
        self.check_joint(&names.hinge, JointKind::Hinge)?;

        let gimbal = self.build_gimbal(&names.rotor, &names.hinge, &settings.joint)?;
        let sensor = self.take_sensor(&names.sensor)?;
        info!(
            "assembled controller: sensor '{}', rotor '{}', hinge '{}'",
            names.sensor, names.rotor, names.hinge
        );
        Controller::new(gimbal, sensor, settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimJoint, SimRig, SimSensor, SourceOrbit};
    use crate::types::{RotationSign, RoutineKind};
    use nalgebra::Vector3;

    fn catalog() -> (SimRig, DeviceCatalog<SimJoint, SimSensor>) {
        let orbit = SourceOrbit::new(Vector3::z(), RotationSign::Positive, 0.01, Vector3::x());
        let rig = SimRig::new(orbit, 0.1);
        let mut catalog = DeviceCatalog::new();
        catalog.add_joint("base", JointKind::Rotor, rig.joint(JointKind::Rotor));
        catalog.add_joint("arm", JointKind::Hinge, rig.joint(JointKind::Hinge));
        catalog.add_sensor("panel", rig.sensor());
        (rig, catalog)
    }

    fn names(sensor: &str, rotor: &str, hinge: &str) -> DeviceNames {
        DeviceNames {
            sensor: sensor.to_string(),
            rotor: rotor.to_string(),
            hinge: hinge.to_string(),
        }
    }

    #[test]
    fn test_build_controller() {
        let (_rig, mut catalog) = catalog();
        let controller = catalog
            .build_controller(&names("panel", "base", "arm"), ControllerSettings::default())
            .unwrap();
        assert_eq!(controller.routine_kind(), RoutineKind::Idle);
        assert_eq!(controller.mount().rotor().kind(), JointKind::Rotor);
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_missing_device() {
        let (_rig, mut catalog) = catalog();
        let result = catalog.build_controller(&names("panel", "base", "elbow"), ControllerSettings::default());
        assert!(matches!(
            result,
            Err(ConfigurationError::MissingDevice { ref name, .. }) if name == "elbow"
        ));
        // Nothing was consumed
        assert_eq!(catalog.len(), 3);
    }

    #[test]
    fn test_kind_mismatch() {
        let (_rig, mut catalog) = catalog();
        let result = catalog.build_gimbal("arm", "base", &JointSettings::default());
        assert!(matches!(
            result,
            Err(ConfigurationError::KindMismatch {
                expected: JointKind::Rotor,
                found: JointKind::Hinge,
                ..
            })
        ));
        assert_eq!(catalog.joint_kind("arm"), Some(JointKind::Hinge));
    }

    #[test]
    fn test_device_names_from_json() {
        let names: DeviceNames =
            serde_json::from_str(r#"{ "sensor": "panel", "rotor": "base", "hinge": "arm" }"#).unwrap();
        assert_eq!(names.hinge, "arm");
    }
}
