//! Joystick Drive Example
//!
//! Runs a fin node against a simulated servo controller board and drives two
//! pectoral fins from a synthetic joystick: the throttle axis sets the beat
//! amplitude, the yaw axis shifts the pitch offset of each fin in opposite
//! directions.
//!
//! Run with: RUST_LOG=info cargo run --example joystick_drive

use finmix::prelude::*;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Simulated board: six servo channels, two inputs
struct SimulatedBoard;

impl ChannelSource for SimulatedBoard {
    fn channel_modes(&mut self) -> Result<Vec<ChannelMode>, MixError> {
        let mut modes = vec![ChannelMode::Servo; 6];
        modes.extend([ChannelMode::Input, ChannelMode::Input]);
        Ok(modes)
    }
}

/// Keeps the most recent setpoint batch
#[derive(Clone, Default)]
struct LatestProfiles(Arc<Mutex<Vec<Profile>>>);

impl ProfileSink for LatestProfiles {
    fn set_profiles(&mut self, profiles: &[Profile]) -> Result<(), MixError> {
        let mut latest = self
            .0
            .lock()
            .map_err(|_| MixError::DownstreamUnavailable("profile buffer poisoned".into()))?;
        latest.clear();
        latest.extend_from_slice(profiles);
        Ok(())
    }
}

const THROTTLE: usize = 1;
const YAW: usize = 0;

/// Fin beating at 1.5 Hz with throttle-driven amplitude and yaw-driven offset
fn pectoral_fin(pitch_servo: i32, flap_servo: i32, yaw_sign: f64) -> Fin {
    let yaw = if yaw_sign < 0.0 {
        TransferFunction::new(Shape::Identity).inverted_arguments()
    } else {
        TransferFunction::IDENTITY
    };

    let pitch = Actuator::new(pitch_servo)
        .with(Parameter::Frequency, OutputChannel::new(1.5))
        .with(
            Parameter::Amplitude,
            OutputChannel::new(0.4).with(Connection::new(THROTTLE, Shape::Ramp)),
        )
        .with(
            Parameter::Offset,
            OutputChannel::new(0.3).with(Connection::new(YAW, yaw)),
        );

    let flap = Actuator::new(flap_servo)
        .with(Parameter::Frequency, OutputChannel::new(1.5))
        .with(
            Parameter::Amplitude,
            OutputChannel::new(0.6).with(Connection::new(THROTTLE, Shape::Ramp)),
        )
        .with(Parameter::Phase, OutputChannel::new(std::f64::consts::FRAC_PI_2));

    Fin::new(pitch, flap)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let profiles = LatestProfiles::default();
    let node = FinNode::new(
        Config::default(),
        Box::new(SimulatedBoard),
        Box::new(profiles.clone()),
    )
    .unwrap();
    let (client, handle) = node.spawn();

    // Configure both fins over the request surface
    for fin in [pectoral_fin(0, 1, 1.0), pectoral_fin(2, 3, -1.0)] {
        let response = client.configure(Request::AddFin { fin }).unwrap();
        println!("AddFin -> {:?}", response.payload);
    }

    // Invalid ids come back as warnings, never as panics
    let response = client.configure(Request::GetFin { fin: 5 }).unwrap();
    println!("GetFin 5 -> warning: {:?}", response.warning);

    // Preview what a full-throttle sample would command
    let preview = client
        .configure(Request::GetOutputs {
            inputs: vec![0.0, 1.0],
        })
        .unwrap();
    println!("Preview at full throttle: {:?}", preview.payload);

    // Ramp throttle up while sweeping yaw, 20 samples per second
    for step in 0..40 {
        let t = step as f64 / 20.0;
        let throttle = (t / 1.5).min(1.0);
        let yaw = libm::sin(t * 2.0);
        client.input(vec![yaw, throttle]).unwrap();
        thread::sleep(Duration::from_millis(50));
    }

    let actuals = client
        .servo(ServoRequest::GetActuals {
            servos: vec![0, 1, 2, 3],
        })
        .unwrap();
    if let ServoPayload::Actuals(actuals) = actuals.payload {
        for (id, a) in actuals.iter().enumerate() {
            println!(
                "servo {}: f={:.3} Hz  A={:.3} rad  phi={:.3} rad  off={:.3} rad",
                id, a.frequency, a.amplitude, a.phase, a.offset
            );
        }
    }

    if let Ok(latest) = profiles.0.lock() {
        for p in latest.iter() {
            println!(
                "channel {}: position={:+.3} rad  speed={:+.3} rad/s",
                p.channel, p.position, p.speed
            );
        }
    }

    client.shutdown().unwrap();
    handle.join().unwrap();
}
