//! Helio Seek - sensorless orbit estimation and tracking for a single light source
//!
//! A sensor that reports only a scalar exposure (how directly it faces the
//! source) is moved by a rotor/hinge gimbal or a rate-commanded gyro mount. By
//! searching for exposure peaks and comparing exposure changes, the controller
//! learns the source's orbital plane normal, its rotation direction and its
//! angular speed, then keeps the sensor pointed at the source.
//!
//! # Features
//!
//! - Plane-normal discovery from two reference rays
//! - Rotation-direction and angular-speed estimation from exposure comparisons
//! - Feed-forward tracking with exposure-driven correction
//! - Bounded (rotor/hinge) and continuous (gyro) joints behind one [`Mount`] trait
//! - Transient sensor faults pause the active routine instead of aborting it
//! - Peer synchronization of partially mapped models
//! - Serializable routine state, so a restart resumes mid-search
//! - A deterministic simulated rig for tests and demos
//!
//! # Quick Start
//!
//! ```rust
//! use helio_seek::sim::{SimRig, SourceOrbit};
//! use helio_seek::sync::LocalNetwork;
//! use helio_seek::{Command, Controller, ControllerSettings, MemoryStorage, RotationSign, RoutineKind};
//! use nalgebra::Vector3;
//!
//! let settings = ControllerSettings::default();
//! let orbit = SourceOrbit::new(Vector3::z(), RotationSign::Positive, 0.01, Vector3::x());
//! let rig = SimRig::new(orbit, settings.tick_interval);
//!
//! // A previously mapped orbit goes straight to tracking
//! let mut controller = Controller::new(rig.gimbal(&settings.joint), rig.sensor(), settings)
//!     .unwrap()
//!     .with_model(orbit.model(settings.max_angular_speed));
//! controller.execute(Command::Run);
//!
//! let network = LocalNetwork::new();
//! let mut bus = network.endpoint(1);
//! let mut storage = MemoryStorage::new();
//! for _ in 0..100 {
//!     controller.tick(&mut bus, &mut storage);
//!     rig.step();
//! }
//! assert_eq!(controller.routine_kind(), RoutineKind::Tracking);
//! ```

pub mod actuator;
pub mod command;
pub mod controller;
pub mod error;
pub mod installation;
mod math;
pub mod orbit;
pub mod persist;
pub mod registry;
pub mod routines;
pub mod sensor;
pub mod sim;
pub mod sync;
mod types;

// Re-export all public types and functions
pub use actuator::{ContinuousJoint, Gimbal, GyroHardware, JointHardware, LimitedJoint, Mount, plan_travel};
pub use command::Command;
pub use controller::{Controller, Routine, StatusReport};
pub use error::{ConfigurationError, ParseError};
pub use installation::{Installation, InstallationStatus, Manager, TorqueSettings};
pub use math::{
    Direction3, Vector3Ext, angle_between, format_vector, is_aligned, parse_vector, plane_normal_from_rays,
    project_onto_plane, rotate_around_axis, rotate_signed, signed_angle_about_axis,
};
pub use orbit::{MergeOutcome, OrbitModel, OrbitSnapshot};
pub use persist::{MemoryStorage, Storage};
pub use registry::{DeviceCatalog, DeviceNames};
pub use sensor::{ExposureMonitor, Reading, Sensor, exposure};
pub use sync::{Messenger, SyncChannel};
pub use types::{
    ControllerSettings, DirectionSettings, DriveAxis, FaultSettings, Field, JointKind, JointLimits,
    JointSettings, RotationSign, RoutineKind, SearchSettings, SpeedSettings, TrackingSettings,
};
