//! Servo Registry
//!
//! Fixed collection of physical servo slots. The registry is built once from
//! the hardware channel report and never resized afterwards. Servo ids are
//! positions in this registry; the hardware channel is stored separately.
//!
//! Batch getters never fail: unknown ids read back as NaN. Batch setters apply
//! every valid entry, warn about each unknown id, and report the first one.

use crate::actuator::{nan_as_null, Commands, Parameter};
use crate::dispatch::{CommandSink, ServoCommand};
use crate::error::MixError;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

/// Servo id, a position in the [`ServoRegistry`]
pub type ServoId = usize;

/// Operating mode of one hardware channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelMode {
    Servo,
    ServoMultiplied,
    Output,
    Input,
}

/// Hardware capability reporting the mode of every channel
pub trait ChannelSource {
    fn channel_modes(&mut self) -> Result<Vec<ChannelMode>, MixError>;
}

/// One physical servo slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Servo {
    /// Hardware channel driven by this servo
    pub channel: usize,
    /// Position offset added to every setpoint \[rad\]
    pub home: f64,
    /// Per-parameter smoothing gains \[1/s\]
    pub gain: Commands,
    /// Target the smoother converges to
    pub command: Commands,
    /// Smoothed state used for setpoint generation
    pub actual: Commands,
}

impl Servo {
    pub fn new(channel: usize, gain: Commands) -> Self {
        Self {
            channel,
            home: 0.0,
            gain,
            command: Commands::ZERO,
            actual: Commands::ZERO,
        }
    }
}

/// Commanded and smoothed value of one parameter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterState {
    #[serde(with = "nan_as_null")]
    pub command: f64,
    #[serde(with = "nan_as_null")]
    pub actual: f64,
}

impl ParameterState {
    const NAN: ParameterState = ParameterState {
        command: f64::NAN,
        actual: f64::NAN,
    };
}

#[derive(Debug, Clone)]
pub struct ServoRegistry {
    servos: Vec<Servo>,
    default_gain: Commands,
    max_servos: usize,
}

impl Default for ServoRegistry {
    fn default() -> Self {
        Self::new(Commands::splat(0.9), usize::MAX)
    }
}

impl ServoRegistry {
    /// Empty registry; discovered servos start with `default_gain`
    pub fn new(default_gain: Commands, max_servos: usize) -> Self {
        Self {
            servos: Vec::new(),
            default_gain,
            max_servos,
        }
    }

    /// Registry populated directly from a list of hardware channels
    pub fn with_channels(channels: &[usize], default_gain: Commands) -> Self {
        Self {
            servos: channels
                .iter()
                .map(|&channel| Servo::new(channel, default_gain))
                .collect(),
            default_gain,
            max_servos: channels.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.servos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servos.is_empty()
    }

    pub fn max_servos(&self) -> usize {
        self.max_servos
    }

    /// Discover servos from the hardware channel report
    ///
    /// Every channel in [`ChannelMode::Servo`] becomes a servo, in channel
    /// order, up to `max_servos`. A populated registry is left untouched.
    pub fn populate(&mut self, source: &mut dyn ChannelSource) -> Result<usize, MixError> {
        if !self.servos.is_empty() {
            return Ok(self.servos.len());
        }

        let modes = source.channel_modes().map_err(|e| {
            error!("No servos available: channel discovery failed: {}", e);
            e
        })?;

        let default_gain = self.default_gain;
        self.servos = modes
            .iter()
            .enumerate()
            .filter(|(_, mode)| **mode == ChannelMode::Servo)
            .map(|(channel, _)| Servo::new(channel, default_gain))
            .take(self.max_servos)
            .collect();

        info!("Hardware reported {} available servo(s).", self.servos.len());
        Ok(self.servos.len())
    }

    pub fn get(&self, id: ServoId) -> Option<&Servo> {
        self.servos.get(id)
    }

    pub fn get_mut(&mut self, id: ServoId) -> Option<&mut Servo> {
        self.servos.get_mut(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Servo> {
        self.servos.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Servo> {
        self.servos.iter_mut()
    }

    // ------------------------------------------------------------------
    // Batch getters
    // ------------------------------------------------------------------

    fn read<T>(&self, ids: &[ServoId], missing: T, f: impl Fn(&Servo) -> T) -> Vec<T>
    where
        T: Copy,
    {
        ids.iter()
            .map(|&id| self.servos.get(id).map_or(missing, &f))
            .collect()
    }

    pub fn homes(&self, ids: &[ServoId]) -> Vec<f64> {
        self.read(ids, f64::NAN, |s| s.home)
    }

    pub fn gains(&self, ids: &[ServoId]) -> Vec<Commands> {
        self.read(ids, Commands::nan(), |s| s.gain)
    }

    pub fn commands(&self, ids: &[ServoId]) -> Vec<Commands> {
        self.read(ids, Commands::nan(), |s| s.command)
    }

    pub fn actuals(&self, ids: &[ServoId]) -> Vec<Commands> {
        self.read(ids, Commands::nan(), |s| s.actual)
    }

    /// Commanded and actual value of one parameter per servo
    pub fn parameter(&self, ids: &[ServoId], parameter: Parameter) -> Vec<ParameterState> {
        self.read(ids, ParameterState::NAN, |s| ParameterState {
            command: s.command.get(parameter),
            actual: s.actual.get(parameter),
        })
    }

    // ------------------------------------------------------------------
    // Batch setters
    // ------------------------------------------------------------------

    fn write<T>(
        &mut self,
        request: &str,
        entries: &[(ServoId, T)],
        f: impl Fn(&mut Servo, &T),
    ) -> Result<(), MixError> {
        let mut result = Ok(());
        for (id, value) in entries {
            match self.servos.get_mut(*id) {
                Some(servo) => f(servo, value),
                None => {
                    let err = MixError::ServoNotFound(*id as i64);
                    warn!("{} request failed: {}", request, err);
                    if result.is_ok() {
                        result = Err(err);
                    }
                }
            }
        }
        result
    }

    pub fn set_homes(&mut self, entries: &[(ServoId, f64)]) -> Result<(), MixError> {
        self.write("SetHomes", entries, |s, &home| s.home = home)
    }

    pub fn set_gains(&mut self, entries: &[(ServoId, Commands)]) -> Result<(), MixError> {
        self.write("SetGains", entries, |s, &gain| s.gain = gain)
    }

    /// Overwrite the command target of each servo
    pub fn set_targets(&mut self, entries: &[(ServoId, Commands)]) -> Result<(), MixError> {
        self.write("SetCommands", entries, |s, &command| s.command = command)
    }

    /// Overwrite one commanded parameter of each servo
    pub fn set_parameter(
        &mut self,
        parameter: Parameter,
        entries: &[(ServoId, f64)],
    ) -> Result<(), MixError> {
        let request = match parameter {
            Parameter::Frequency => "SetFrequencies",
            Parameter::Amplitude => "SetAmplitudes",
            Parameter::Phase => "SetPhases",
            Parameter::Offset => "SetOffsets",
        };
        self.write(request, entries, |s, &value| s.command.set(parameter, value))
    }
}

impl CommandSink for ServoRegistry {
    fn set_commands(&mut self, batch: &[ServoCommand]) -> Result<(), MixError> {
        let entries: Vec<_> = batch.iter().map(|c| (c.servo, c.commands)).collect();
        self.set_targets(&entries)
    }
}
