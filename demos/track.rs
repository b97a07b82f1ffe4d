//! Maps a simulated orbit from scratch, then tracks it
//!
//! Run with `RUST_LOG=info cargo run --example track` to see the routine
//! transitions; an optional argument sets the orbital rate in rad/s.

use helio_seek::sim::{SimRig, SourceOrbit};
use helio_seek::sync::LocalNetwork;
use helio_seek::{
    Command, Controller, ControllerSettings, MemoryStorage, RotationSign, RoutineKind, angle_between,
};
use nalgebra::Vector3;

const MAX_TICKS: u64 = 20_000;
const TRACKING_TICKS: u64 = 1_000;
const REPORT_EVERY: u64 = 500;

fn main() {
    env_logger::init();

    let speed = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse::<f64>().ok())
        .unwrap_or(0.002);

    let mut settings = ControllerSettings::default();
    settings.search.ray_pause_ticks = 100;

    let orbit = SourceOrbit::new(Vector3::new(0.1, 0.4, 1.0), RotationSign::Negative, speed, Vector3::x());
    let rig = SimRig::new(orbit, settings.tick_interval);
    let mut controller = match Controller::new(rig.gimbal(&settings.joint), rig.sensor(), settings) {
        Ok(controller) => controller,
        Err(err) => {
            eprintln!("invalid settings: {err}");
            return;
        }
    };

    let network = LocalNetwork::new();
    let mut bus = network.endpoint(1);
    let mut storage = MemoryStorage::new();

    controller.execute(Command::Run);
    let mut tracking_since = None;
    for tick in 0..MAX_TICKS {
        let status = controller.tick(&mut bus, &mut storage);
        rig.step();

        if tick % REPORT_EVERY == 0 {
            println!(
                "tick {tick:>6}  {:<24} exposure {:.6}",
                status.routine.to_string(),
                rig.exposure()
            );
        }
        if status.routine == RoutineKind::Tracking && tracking_since.is_none() {
            println!("orbit mapped after {tick} ticks ({:.0} s)", rig.time());
            tracking_since = Some(tick);
        }
        if tracking_since.is_some_and(|since| tick - since >= TRACKING_TICKS) {
            break;
        }
    }

    let model = controller.model();
    println!();
    println!("true orbit:      normal {:?}, {:?} at {speed} rad/s", orbit.plane_normal, orbit.direction);
    println!("estimated orbit: {}", model.snapshot());
    if let Some(normal) = model.plane_normal() {
        let error = angle_between(&normal, &orbit.plane_normal);
        let error = error.min(core::f64::consts::PI - error);
        println!("normal error:    {:.3} deg (up to sign)", error.to_degrees());
    }
    if let Some(estimated) = model.angular_speed() {
        println!("speed error:     {:.3} %", 100.0 * (estimated - speed).abs() / speed);
    }
    println!("final exposure:  {:.6}", rig.exposure());
    println!("{}", controller.status());
}
