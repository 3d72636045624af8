//! Actuators and Commands
//!
//! An actuator is one degree of freedom of a fin. It bundles four output
//! channels, one per oscillation parameter, behind a single servo assignment.

use crate::channel::OutputChannel;
use crate::error::MixError;
use serde::{Deserialize, Serialize};

/// Servo id value meaning "not assigned"
pub const UNASSIGNED: i32 = -1;

/// The four parameters of a sinusoidal motion profile
///
/// Also names the four output-channel slots of an [`Actuator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parameter {
    Frequency,
    Amplitude,
    Phase,
    Offset,
}

impl Parameter {
    pub const ALL: [Parameter; 4] = [
        Parameter::Frequency,
        Parameter::Amplitude,
        Parameter::Phase,
        Parameter::Offset,
    ];

    pub fn id(&self) -> i64 {
        match self {
            Parameter::Frequency => 0,
            Parameter::Amplitude => 1,
            Parameter::Phase => 2,
            Parameter::Offset => 3,
        }
    }

    pub fn from_id(id: i64) -> Option<Self> {
        match id {
            0 => Some(Parameter::Frequency),
            1 => Some(Parameter::Amplitude),
            2 => Some(Parameter::Phase),
            3 => Some(Parameter::Offset),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Parameter::Frequency => "frequency",
            Parameter::Amplitude => "amplitude",
            Parameter::Phase => "phase",
            Parameter::Offset => "offset",
        }
    }
}

/// Desired oscillatory motion: frequency \[Hz\], amplitude \[rad\], phase \[rad\], offset \[rad\]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Commands {
    #[serde(default, with = "nan_as_null")]
    pub frequency: f64,
    #[serde(default, with = "nan_as_null")]
    pub amplitude: f64,
    #[serde(default, with = "nan_as_null")]
    pub phase: f64,
    #[serde(default, with = "nan_as_null")]
    pub offset: f64,
}

impl Commands {
    pub const ZERO: Commands = Commands::splat(0.0);

    pub const fn new(frequency: f64, amplitude: f64, phase: f64, offset: f64) -> Self {
        Self {
            frequency,
            amplitude,
            phase,
            offset,
        }
    }

    /// Same value for all four parameters
    pub const fn splat(value: f64) -> Self {
        Self::new(value, value, value, value)
    }

    /// All four parameters NaN, used for unknown servos
    pub const fn nan() -> Self {
        Self::splat(f64::NAN)
    }

    pub fn get(&self, parameter: Parameter) -> f64 {
        match parameter {
            Parameter::Frequency => self.frequency,
            Parameter::Amplitude => self.amplitude,
            Parameter::Phase => self.phase,
            Parameter::Offset => self.offset,
        }
    }

    pub fn get_mut(&mut self, parameter: Parameter) -> &mut f64 {
        match parameter {
            Parameter::Frequency => &mut self.frequency,
            Parameter::Amplitude => &mut self.amplitude,
            Parameter::Phase => &mut self.phase,
            Parameter::Offset => &mut self.offset,
        }
    }

    pub fn set(&mut self, parameter: Parameter, value: f64) {
        *self.get_mut(parameter) = value;
    }
}

/// One degree of freedom of a fin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actuator {
    /// Assigned servo, negative when unassigned
    #[serde(default = "default_servo")]
    pub servo: i32,

    #[serde(default)]
    pub frequency: OutputChannel,
    #[serde(default)]
    pub amplitude: OutputChannel,
    #[serde(default)]
    pub phase: OutputChannel,
    #[serde(default)]
    pub offset: OutputChannel,
}

fn default_servo() -> i32 {
    UNASSIGNED
}

impl Default for Actuator {
    fn default() -> Self {
        Self::new(UNASSIGNED)
    }
}

impl Actuator {
    pub fn new(servo: i32) -> Self {
        Self {
            servo,
            frequency: OutputChannel::default(),
            amplitude: OutputChannel::default(),
            phase: OutputChannel::default(),
            offset: OutputChannel::default(),
        }
    }

    /// Builder-style output channel assignment
    pub fn with(mut self, slot: Parameter, channel: OutputChannel) -> Self {
        self.set_output_channel(slot, channel);
        self
    }

    /// Assigned servo id, `None` when unassigned
    pub fn servo_id(&self) -> Option<usize> {
        usize::try_from(self.servo).ok()
    }

    pub fn is_assigned(&self) -> bool {
        self.servo >= 0
    }

    /// Evaluate all four channels; unassigned actuators always yield zero
    pub fn evaluate(&self, inputs: &[f64]) -> Result<Commands, MixError> {
        if !self.is_assigned() {
            return Ok(Commands::ZERO);
        }
        Ok(Commands {
            frequency: self.frequency.evaluate(inputs)?,
            amplitude: self.amplitude.evaluate(inputs)?,
            phase: self.phase.evaluate(inputs)?,
            offset: self.offset.evaluate(inputs)?,
        })
    }

    pub fn output_channel(&self, slot: Parameter) -> &OutputChannel {
        match slot {
            Parameter::Frequency => &self.frequency,
            Parameter::Amplitude => &self.amplitude,
            Parameter::Phase => &self.phase,
            Parameter::Offset => &self.offset,
        }
    }

    pub fn output_channel_mut(&mut self, slot: Parameter) -> &mut OutputChannel {
        match slot {
            Parameter::Frequency => &mut self.frequency,
            Parameter::Amplitude => &mut self.amplitude,
            Parameter::Phase => &mut self.phase,
            Parameter::Offset => &mut self.offset,
        }
    }

    pub fn set_output_channel(&mut self, slot: Parameter, channel: OutputChannel) {
        *self.output_channel_mut(slot) = channel;
    }

    /// All four channels in slot order
    pub fn output_channels(&self) -> OutputChannels {
        OutputChannels {
            frequency: self.frequency.clone(),
            amplitude: self.amplitude.clone(),
            phase: self.phase.clone(),
            offset: self.offset.clone(),
        }
    }

    pub fn set_output_channels(&mut self, channels: OutputChannels) {
        self.frequency = channels.frequency;
        self.amplitude = channels.amplitude;
        self.phase = channels.phase;
        self.offset = channels.offset;
    }
}

/// The four output channels of an actuator, detached from its servo
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OutputChannels {
    #[serde(default)]
    pub frequency: OutputChannel,
    #[serde(default)]
    pub amplitude: OutputChannel,
    #[serde(default)]
    pub phase: OutputChannel,
    #[serde(default)]
    pub offset: OutputChannel,
}

/// Serde adapter for values that read as NaN when unknown
///
/// NaN is written as `null` and `null` reads back as NaN, so batch readbacks
/// naming unknown servos survive formats without a NaN literal.
pub mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_nan() {
            serializer.serialize_none()
        } else {
            serializer.serialize_some(value)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }

    /// Element-wise form for `Vec<f64>`
    pub mod vec {
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
            serializer.collect_seq(values.iter().map(|v| (!v.is_nan()).then_some(*v)))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
            let values = Vec::<Option<f64>>::deserialize(deserializer)?;
            Ok(values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
        }
    }
}
