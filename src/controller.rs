//! Tick-driven estimator and tracker
//!
//! The [`Controller`] owns the mount, the sensor and the orbit model. A host
//! calls [`Controller::tick`] at a fixed interval; each tick drains peer
//! messages, classifies the exposure reading, advances the active routine one
//! step and persists the result. Discoveries are written to the model and
//! announced to peers.
//!
//! Routine order follows the model: the plane normal first, then (with the
//! sensor down vector on the normal) the rotation direction, then (with the
//! sensor facing the source) the angular speed, then continuous tracking.

use core::fmt;
use core::mem;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::actuator::Mount;
use crate::command::Command;
use crate::error::ConfigurationError;
use crate::math::{Direction3, is_aligned};
use crate::orbit::{OrbitModel, OrbitSnapshot};
use crate::persist::{CONTROLLER_SECTION, ROUTINE_KEY, Storage, load_orbit, save_orbit};
use crate::routines::{
    DirectionProbe, Finding, NormalAlignment, PlaneNormalSearch, Progress, Sample, SourceSweep,
    SpeedSampler, TrackingLoop,
};
use crate::sensor::{ExposureMonitor, Reading, Sensor, exposure};
use crate::sync::{Messenger, SyncChannel};
use crate::types::{ControllerSettings, Field, RoutineKind};

/// Active routine together with everything it has accumulated
///
/// Alignment stages carry the routine that follows them, and a pause carries
/// the routine it will resume, so the whole chain serializes as one value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum Routine {
    #[default]
    Idle,
    DeterminingPlaneNormal(PlaneNormalSearch),
    AligningToPlaneNormal {
        alignment: NormalAlignment,
        then: Box<Routine>,
    },
    AligningToSource {
        sweep: SourceSweep,
        then: Box<Routine>,
    },
    DeterminingDirection(DirectionProbe),
    DeterminingAngularSpeed(SpeedSampler),
    Tracking(TrackingLoop),
    Paused {
        remaining: u32,
        resume: Box<Routine>,
    },
}

impl Routine {
    pub fn kind(&self) -> RoutineKind {
        match self {
            Routine::Idle => RoutineKind::Idle,
            Routine::DeterminingPlaneNormal(_) => RoutineKind::DeterminingPlaneNormal,
            Routine::AligningToPlaneNormal { .. } => RoutineKind::AligningToPlaneNormal,
            Routine::AligningToSource { .. } => RoutineKind::AligningToSource,
            Routine::DeterminingDirection(_) => RoutineKind::DeterminingDirection,
            Routine::DeterminingAngularSpeed(_) => RoutineKind::DeterminingAngularSpeed,
            Routine::Tracking(_) => RoutineKind::Tracking,
            Routine::Paused { .. } => RoutineKind::Paused,
        }
    }

    /// The stage this chain ends in, looking through alignments and pauses
    pub fn goal(&self) -> RoutineKind {
        match self {
            Routine::AligningToPlaneNormal { then, .. } | Routine::AligningToSource { then, .. } => {
                match then.goal() {
                    RoutineKind::Idle => self.kind(),
                    goal => goal,
                }
            }
            Routine::Paused { resume, .. } => resume.goal(),
            other => other.kind(),
        }
    }

    fn align_then(then: Routine) -> Routine {
        Routine::AligningToPlaneNormal {
            alignment: NormalAlignment,
            then: Box::new(then),
        }
    }
}

/// Snapshot of controller state for operators
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusReport {
    pub tick: u64,
    pub routine: RoutineKind,
    pub goal: RoutineKind,
    pub model: OrbitSnapshot,
    pub mapped: [bool; 3],
    pub exposure: Option<f64>,
    pub aligned: bool,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "tick {}: {} (goal {})", self.tick, self.routine, self.goal)?;
        for (field, mapped) in Field::ALL.iter().zip(self.mapped) {
            writeln!(f, "  {field}: {}", if mapped { "mapped" } else { "unmapped" })?;
        }
        writeln!(f, "  model: {}", self.model)?;
        match self.exposure {
            Some(exposure) => write!(f, "  exposure: {exposure:.6}")?,
            None => write!(f, "  exposure: unavailable")?,
        }
        if self.aligned {
            write!(f, " (aligned)")?;
        }
        Ok(())
    }
}

/// Orbit estimator and tracker over one mount and one sensor
#[derive(Debug)]
pub struct Controller<M, S> {
    mount: M,
    sensor: S,
    settings: ControllerSettings,
    model: OrbitModel,
    routine: Routine,
    monitor: ExposureMonitor,
    sync: SyncChannel,
    ticks: u64,
    last_exposure: Option<f64>,
}

impl<M: Mount, S: Sensor> Controller<M, S> {
    /// Idle controller with an empty model
    pub fn new(mount: M, sensor: S, settings: ControllerSettings) -> Result<Self, ConfigurationError> {
        settings.validate()?;
        Ok(Self {
            mount,
            sensor,
            settings,
            model: OrbitModel::new(settings.max_angular_speed),
            routine: Routine::Idle,
            monitor: ExposureMonitor::new(),
            sync: SyncChannel::new(settings.request_interval_ticks),
            ticks: 0,
            last_exposure: None,
        })
    }

    /// Start from a known model
    pub fn with_model(mut self, model: OrbitModel) -> Self {
        self.model = model;
        self
    }

    pub fn model(&self) -> &OrbitModel {
        &self.model
    }

    pub fn routine(&self) -> &Routine {
        &self.routine
    }

    pub fn routine_kind(&self) -> RoutineKind {
        self.routine.kind()
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    pub fn mount(&self) -> &M {
        &self.mount
    }

    pub fn mount_mut(&mut self) -> &mut M {
        &mut self.mount
    }

    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn last_exposure(&self) -> Option<f64> {
        self.last_exposure
    }

    /// True while tracking with exposure at or above the aligned threshold
    pub fn is_aligned(&self) -> bool {
        matches!(&self.routine, Routine::Tracking(tracking) if tracking.is_aligned())
    }

    /// Routine the model calls for next
    pub fn next_routine(&self) -> RoutineKind {
        self.plan().kind()
    }

    /// Fresh routine chain for the current model
    pub fn plan(&self) -> Routine {
        if !self.model.is_mapped(Field::PlaneNormal) {
            Routine::DeterminingPlaneNormal(PlaneNormalSearch::new())
        } else if !self.model.is_mapped(Field::Direction) {
            Routine::align_then(Routine::DeterminingDirection(DirectionProbe::new()))
        } else if !self.model.is_mapped(Field::AngularSpeed) {
            Routine::align_then(Routine::AligningToSource {
                sweep: SourceSweep::new(),
                then: Box::new(Routine::DeterminingAngularSpeed(SpeedSampler::new())),
            })
        } else {
            Routine::Tracking(TrackingLoop::new())
        }
    }

    pub fn status(&self) -> StatusReport {
        StatusReport {
            tick: self.ticks,
            routine: self.routine.kind(),
            goal: self.routine.goal(),
            model: self.model.snapshot(),
            mapped: Field::ALL.map(|field| self.model.is_mapped(field)),
            exposure: self.last_exposure,
            aligned: self.is_aligned(),
        }
    }

    /// Dispatch an operator command
    ///
    /// Model changes are persisted by the next [`tick`](Self::tick).
    pub fn execute(&mut self, command: Command) -> Option<StatusReport> {
        info!("command: {command}");
        match command {
            Command::Run => self.switch(self.plan()),
            Command::Halt => {
                self.mount.stop();
                self.switch(Routine::Idle);
            }
            Command::Reinitialize => {
                self.model.clear_all();
                self.switch(self.plan());
            }
            Command::Clear(field) => {
                match field {
                    Some(field) => self.model.clear(field),
                    None => self.model.clear_all(),
                }
                if self.routine.kind() != RoutineKind::Idle {
                    self.switch(self.plan());
                }
            }
            Command::AlignToSource => {
                if self.model.is_mapped(Field::PlaneNormal) {
                    self.switch(Routine::align_then(Routine::AligningToSource {
                        sweep: SourceSweep::new(),
                        then: Box::new(Routine::Idle),
                    }));
                } else {
                    warn!("cannot align to source without a plane normal");
                }
            }
            Command::Debug => {
                let status = self.status();
                info!("{status}");
                return Some(status);
            }
        }
        None
    }

    /// One control cycle
    pub fn tick<B, St>(&mut self, bus: &mut B, storage: &mut St) -> StatusReport
    where
        B: Messenger + ?Sized,
        St: Storage + ?Sized,
    {
        let normal_before = self.model.plane_normal();
        let report = self.sync.drain(bus, &mut self.model);
        if report.changed() {
            self.replan_after_merge(normal_before);
        }
        self.sync.request_if_due(bus, &self.model);

        let reading = self.monitor.classify(
            exposure(self.sensor.output(), self.sensor.max_output()),
            &self.settings.fault,
        );
        self.last_exposure = match reading {
            Reading::Valid(value) | Reading::Occluded(value) => Some(value),
            Reading::Unavailable => None,
        };

        let routine = mem::take(&mut self.routine);
        let before = routine.kind();
        let (next, discovered) = self.step(routine, reading);
        self.transition(before, next);

        if let Some(field) = discovered {
            info!("discovered {field}: {}", self.model.snapshot());
            self.sync.announce(bus, &self.model);
        }

        self.persist(storage);
        self.ticks += 1;
        self.status()
    }

    /// Reload the model and the routine state written by earlier ticks
    pub fn restore<St: Storage + ?Sized>(&mut self, storage: &St) {
        self.model = load_orbit(storage, self.settings.max_angular_speed);
        self.routine = match storage.read_field(CONTROLLER_SECTION, ROUTINE_KEY) {
            Some(json) => serde_json::from_str(&json).unwrap_or_else(|err| {
                warn!("discarding stored routine state: {err}");
                Routine::Idle
            }),
            None => Routine::Idle,
        };
        self.monitor.reset();
        info!(
            "restored {} with {} mapped fields",
            self.routine.kind(),
            self.model.mapped_count()
        );
        self.replan_if_obsolete();
    }

    fn persist<St: Storage + ?Sized>(&self, storage: &mut St) {
        save_orbit(storage, &self.model);
        match serde_json::to_string(&self.routine) {
            Ok(json) => storage.write_field(CONTROLLER_SECTION, ROUTINE_KEY, json),
            Err(err) => warn!("could not store routine state: {err}"),
        }
    }

    /// Install `next`, zeroing actuator commands when the routine kind changes
    fn switch(&mut self, next: Routine) {
        self.transition(self.routine.kind(), next);
    }

    fn transition(&mut self, before: RoutineKind, next: Routine) {
        let after = next.kind();
        if before != after {
            self.mount.stop();
            info!("{before} -> {after}");
        }
        self.routine = next;
    }

    /// Restart every routine steering by a plane normal a peer has since moved
    fn replan_after_merge(&mut self, normal_before: Option<Direction3>) {
        let moved = match (normal_before, self.model.plane_normal()) {
            (Some(before), Some(after)) => !is_aligned(&before, &after, self.settings.search.normal_tolerance),
            _ => false,
        };
        if moved && self.routine.kind() != RoutineKind::Idle {
            info!("plane normal moved, restarting {}", self.routine.goal());
            self.switch(self.plan());
        } else {
            self.replan_if_obsolete();
        }
    }

    /// Restart when a peer has already supplied what the routine is looking for
    fn replan_if_obsolete(&mut self) {
        let obsolete = match self.routine.goal() {
            RoutineKind::DeterminingPlaneNormal => self.model.is_mapped(Field::PlaneNormal),
            RoutineKind::DeterminingDirection => self.model.is_mapped(Field::Direction),
            RoutineKind::DeterminingAngularSpeed => self.model.is_mapped(Field::AngularSpeed),
            _ => false,
        };
        if obsolete {
            info!("{} no longer needed", self.routine.goal());
            self.switch(self.plan());
        }
    }

    fn step(&mut self, routine: Routine, reading: Reading) -> (Routine, Option<Field>) {
        let routine = match routine {
            Routine::Idle => return (Routine::Idle, None),
            Routine::Paused { remaining, resume } => {
                if remaining > 1 {
                    return (
                        Routine::Paused {
                            remaining: remaining - 1,
                            resume,
                        },
                        None,
                    );
                }
                // Accept whatever the sensor reads next as the new baseline
                self.monitor.reset();
                return (*resume, None);
            }
            active => active,
        };

        let sample = match reading {
            Reading::Valid(exposure) => Sample {
                exposure,
                forward: self.sensor.forward(),
                down: self.sensor.down(),
            },
            Reading::Unavailable | Reading::Occluded(_) => {
                let remaining = self.settings.fault.pause_ticks.max(1);
                warn!("pausing {} for {remaining} ticks", routine.kind());
                self.mount.stop();
                let resume = Box::new(routine);
                return (Routine::Paused { remaining, resume }, None);
            }
        };

        let settings = &self.settings;
        let mount = &mut self.mount;
        let model = &mut self.model;

        match routine {
            Routine::DeterminingPlaneNormal(mut search) => match search.step(&sample, mount, settings) {
                Progress::Finished(Finding::PlaneNormal(normal)) => {
                    let found = model.set_plane_normal(normal).then_some(Field::PlaneNormal);
                    (self.plan(), found)
                }
                Progress::Finished(_) => (self.plan(), None),
                _ => (Routine::DeterminingPlaneNormal(search), None),
            },
            Routine::AligningToPlaneNormal { mut alignment, then } => {
                match alignment.step(&sample, mount, model, settings) {
                    Progress::Finished(Finding::Aligned) => (*then, None),
                    Progress::Finished(_) => (self.plan(), None),
                    _ => (Routine::AligningToPlaneNormal { alignment, then }, None),
                }
            }
            Routine::AligningToSource { mut sweep, then } => match sweep.step(&sample, mount, model, settings) {
                Progress::Finished(Finding::Aligned) => (*then, None),
                Progress::Finished(_) => (self.plan(), None),
                _ => (Routine::AligningToSource { sweep, then }, None),
            },
            Routine::DeterminingDirection(mut probe) => match probe.step(&sample, mount, model, settings) {
                Progress::Finished(Finding::Direction(direction)) => {
                    model.set_direction(direction);
                    (self.plan(), Some(Field::Direction))
                }
                Progress::Finished(_) => (self.plan(), None),
                _ => (Routine::DeterminingDirection(probe), None),
            },
            Routine::DeterminingAngularSpeed(mut sampler) => {
                match sampler.step(&sample, mount, model, settings) {
                    Progress::Finished(Finding::AngularSpeed(speed)) => {
                        let found = model.set_angular_speed(speed).then_some(Field::AngularSpeed);
                        (self.plan(), found)
                    }
                    Progress::Finished(Finding::SourceLost) => {
                        let resume = Routine::DeterminingAngularSpeed(sampler);
                        let sweep = Routine::AligningToSource {
                            sweep: SourceSweep::new(),
                            then: Box::new(resume),
                        };
                        (sweep, None)
                    }
                    Progress::Finished(_) => (self.plan(), None),
                    _ => (Routine::DeterminingAngularSpeed(sampler), None),
                }
            }
            Routine::Tracking(mut tracking) => match tracking.step(&sample, mount, model, settings) {
                Progress::Finished(_) => (self.plan(), None),
                _ => (Routine::Tracking(tracking), None),
            },
            other => (other, None),
        }
    }
}
