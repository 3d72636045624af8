//! Servo Oscillator Controller
//!
//! Periodic tick that moves each servo's smoothed state toward its commanded
//! target with a first-order smoother and turns the result into a sinusoidal
//! position/speed setpoint:
//!
//! ```text
//! actual[p] += gain[p] * dt * (command[p] - actual[p])
//! position   = home + offset + amplitude * sin(ω (t + 2/f) + phase)
//! speed      = ω * amplitude * cos(ω t + phase)
//! ```
//!
//! The smoother is not clamped: when `gain * dt > 1` the actual state
//! overshoots its target. Position is evaluated two ticks ahead to cover
//! transport latency to the hardware; speed is evaluated at the current tick.

use std::f64::consts::TAU;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::actuator::Parameter;
use crate::config::ControllerConfig;
use crate::dispatch::Liveness;
use crate::error::MixError;
use crate::servo::ServoRegistry;

/// Sentinel for "no limit requested"
pub const UNBOUNDED: f64 = f64::INFINITY;

/// Number of ticks the position setpoint is evaluated ahead
pub const LOOKAHEAD_TICKS: f64 = 2.0;

/// Setpoint for one hardware channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub channel: usize,
    /// \[rad\]
    pub position: f64,
    /// \[rad/s\]
    pub speed: f64,
    /// \[rad/s²\], [`UNBOUNDED`] when unlimited
    pub acceleration: f64,
}

/// External hardware-profile service
pub trait ProfileSink {
    fn set_profiles(&mut self, profiles: &[Profile]) -> Result<(), MixError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControllerState {
    /// No tick has run yet
    Idle,
    Running { last_tick: f64 },
}

#[derive(Debug, Clone)]
pub struct OscillatorController {
    frequency: f64,
    start_time: f64,
    state: ControllerState,
    pub liveness: Liveness,
}

impl OscillatorController {
    /// Controller ticking at `frequency` Hz with time origin `start_time` \[s\]
    pub fn new(frequency: f64, start_time: f64) -> Self {
        Self {
            frequency,
            start_time,
            state: ControllerState::Idle,
            liveness: Liveness::new(),
        }
    }

    pub fn from_config(config: &ControllerConfig, start_time: f64) -> Self {
        Self::new(config.frequency, start_time)
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn period(&self) -> f64 {
        1.0 / self.frequency
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Advance every servo to time `now` \[s\] and compute its setpoint
    ///
    /// Smoothing only runs for a positive step, so a repeated or earlier
    /// `now` leaves the actual state where it is.
    pub fn tick(&mut self, now: f64, servos: &mut ServoRegistry) -> Vec<Profile> {
        let dt = match self.state {
            ControllerState::Idle => 0.0,
            ControllerState::Running { last_tick } => now - last_tick,
        };
        self.state = ControllerState::Running { last_tick: now };

        let t0 = now - self.start_time;
        let t_ahead = t0 + LOOKAHEAD_TICKS / self.frequency;

        servos
            .iter_mut()
            .map(|servo| {
                if dt > 0.0 {
                    for p in Parameter::ALL {
                        let error = servo.command.get(p) - servo.actual.get(p);
                        *servo.actual.get_mut(p) += servo.gain.get(p) * dt * error;
                    }
                }

                let actual = servo.actual;
                let omega = TAU * actual.frequency;
                Profile {
                    channel: servo.channel,
                    position: servo.home
                        + actual.offset
                        + actual.amplitude * libm::sin(omega * t_ahead + actual.phase),
                    speed: omega * actual.amplitude * libm::cos(omega * t0 + actual.phase),
                    acceleration: UNBOUNDED,
                }
            })
            .collect()
    }

    /// Tick and push the setpoints to `sink` as one batch
    ///
    /// A liveness tick is recorded only when the sink accepts the batch. The
    /// smoothed state advances either way.
    pub fn tick_and_send(
        &mut self,
        now: f64,
        servos: &mut ServoRegistry,
        sink: &mut dyn ProfileSink,
    ) -> Result<usize, MixError> {
        let profiles = self.tick(now, servos);
        match sink.set_profiles(&profiles) {
            Ok(()) => {
                self.liveness.tick();
                Ok(profiles.len())
            }
            Err(e) => {
                debug!("Sending {} profile(s) failed: {}", profiles.len(), e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::Commands;
    use approx::assert_relative_eq;

    struct RecordingSink {
        sent: Vec<Vec<Profile>>,
        fail: bool,
    }

    impl ProfileSink for RecordingSink {
        fn set_profiles(&mut self, profiles: &[Profile]) -> Result<(), MixError> {
            if self.fail {
                return Err(MixError::DownstreamUnavailable("set_profiles".into()));
            }
            self.sent.push(profiles.to_vec());
            Ok(())
        }
    }

    fn single_servo(gain: f64) -> ServoRegistry {
        ServoRegistry::with_channels(&[6], Commands::splat(gain))
    }

    #[test]
    fn test_first_tick_has_zero_dt() {
        let mut servos = single_servo(0.9);
        servos.set_targets(&[(0, Commands::new(2.0, 1.0, 0.5, 0.3))]).unwrap();

        let mut controller = OscillatorController::new(50.0, 0.0);
        assert_eq!(controller.state(), ControllerState::Idle);

        let profiles = controller.tick(10.0, &mut servos);
        assert_eq!(servos.get(0).unwrap().actual, Commands::ZERO);
        assert_eq!(controller.state(), ControllerState::Running { last_tick: 10.0 });
        assert_eq!(profiles[0].channel, 6);
        assert_eq!(profiles[0].position, 0.0);
        assert_eq!(profiles[0].speed, 0.0);
        assert!(profiles[0].acceleration.is_infinite());
    }

    #[test]
    fn test_amplitude_convergence() {
        let mut servos = single_servo(0.9);
        servos.set_parameter(Parameter::Amplitude, &[(0, 1.0)]).unwrap();

        let dt = 0.02;
        let mut controller = OscillatorController::new(50.0, 0.0);
        controller.tick(0.0, &mut servos);
        for n in 1..=200 {
            controller.tick(n as f64 * dt, &mut servos);
            let expected = 1.0 - (1.0 - 0.9 * dt).powi(n);
            assert_relative_eq!(
                servos.get(0).unwrap().actual.amplitude,
                expected,
                epsilon = 1e-9
            );
        }
    }

    #[test]
    fn test_large_gain_overshoots() {
        let mut servos = single_servo(75.0);
        servos.set_parameter(Parameter::Offset, &[(0, 1.0)]).unwrap();

        let mut controller = OscillatorController::new(50.0, 0.0);
        controller.tick(0.0, &mut servos);
        controller.tick(0.02, &mut servos);
        // gain * dt = 1.5
        assert_relative_eq!(servos.get(0).unwrap().actual.offset, 1.5, epsilon = 1e-12);
    }

    #[test]
    fn test_backwards_time_holds_state() {
        let mut servos = single_servo(0.9);
        servos.set_parameter(Parameter::Amplitude, &[(0, 1.0)]).unwrap();

        let mut controller = OscillatorController::new(50.0, 0.0);
        controller.tick(0.0, &mut servos);
        controller.tick(1.0, &mut servos);
        assert_relative_eq!(servos.get(0).unwrap().actual.amplitude, 0.9, epsilon = 1e-12);

        controller.tick(0.5, &mut servos);
        assert_relative_eq!(servos.get(0).unwrap().actual.amplitude, 0.9, epsilon = 1e-12);
        assert_eq!(controller.state(), ControllerState::Running { last_tick: 0.5 });

        controller.tick(0.5, &mut servos);
        assert_relative_eq!(servos.get(0).unwrap().actual.amplitude, 0.9, epsilon = 1e-12);
    }

    #[test]
    fn test_setpoint_lookahead() {
        let mut servos = single_servo(0.0);
        {
            let servo = servos.get_mut(0).unwrap();
            servo.home = 0.1;
            servo.actual = Commands::new(0.5, 0.8, 0.2, -0.3);
        }

        let mut controller = OscillatorController::new(50.0, 1.0);
        let profile = controller.tick(3.0, &mut servos)[0];

        let omega = TAU * 0.5;
        let t0 = 2.0;
        let t2 = t0 + 2.0 / 50.0;
        assert_relative_eq!(
            profile.position,
            0.1 - 0.3 + 0.8 * (omega * t2 + 0.2).sin(),
            epsilon = 1e-12
        );
        assert_relative_eq!(
            profile.speed,
            omega * 0.8 * (omega * t0 + 0.2).cos(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_liveness_only_on_accepted_batch() {
        let mut servos = single_servo(0.9);
        let mut controller = OscillatorController::new(50.0, 0.0);
        let mut sink = RecordingSink {
            sent: Vec::new(),
            fail: true,
        };

        assert!(controller.tick_and_send(0.0, &mut servos, &mut sink).is_err());
        assert_eq!(controller.liveness.ticks(), 0);

        sink.fail = false;
        assert_eq!(controller.tick_and_send(0.02, &mut servos, &mut sink).unwrap(), 1);
        assert_eq!(controller.liveness.ticks(), 1);
        assert_eq!(sink.sent.len(), 1);
    }

    #[test]
    fn test_empty_registry_sends_empty_batch() {
        let mut servos = ServoRegistry::default();
        let mut controller = OscillatorController::new(50.0, 0.0);
        let mut sink = RecordingSink {
            sent: Vec::new(),
            fail: false,
        };
        assert_eq!(controller.tick_and_send(0.0, &mut servos, &mut sink).unwrap(), 0);
        assert!(sink.sent[0].is_empty());
    }
}
