//! # Finmix: Fin Actuator Mixing and Oscillator Control
//!
//! `finmix` drives the oscillating fins of a robotic vehicle from external
//! control inputs such as joystick axes. It combines a runtime-configurable
//! signal-mixing network with a gain-smoothed oscillator controller that turns
//! the mixed commands into position/speed setpoints for physical servos.
//!
//! ## Architecture
//!
//! The library is organized in three layers:
//!
//! - **Layer 1: Mixing Network** - Transfer functions, output channels, actuators and fins
//! - **Layer 2: Registries** - Positional fin registry with stable handles, fixed servo registry
//! - **Layer 3: Runtime** - Dispatch pipeline, oscillator controller and the single-threaded node
//!
//! Input sample → dispatch → servo command targets → controller tick →
//! smoothed state → sinusoidal setpoints → hardware-profile service.
//!
//! ## Quick Start
//!
//! ```rust
//! use finmix::prelude::*;
//!
//! // One fin whose pitch actuator drives servo 0
//! let mut state = MixingState::new();
//! let fin = state.fins.add_fin(Fin::new(Actuator::new(0), Actuator::default()));
//!
//! // Amplitude follows the positive half of input 1, scaled by 0.5
//! state
//!     .fins
//!     .set_output_channel(fin, ActuatorSlot::Pitch, Parameter::Amplitude, OutputChannel::new(0.5))
//!     .unwrap();
//! state
//!     .fins
//!     .connect(fin, ActuatorSlot::Pitch, Parameter::Amplitude, Connection::new(1, Shape::Ramp))
//!     .unwrap();
//!
//! // Mix a joystick sample into the servo registry
//! let mut servos = ServoRegistry::with_channels(&[0], Commands::splat(0.9));
//! state.dispatch(&[0.0, 0.8], &mut servos).unwrap();
//! assert_eq!(servos.get(0).unwrap().command.amplitude, 0.4);
//!
//! // Smooth toward the command and generate setpoints at 50 Hz
//! let mut controller = OscillatorController::new(50.0, 0.0);
//! controller.tick(0.0, &mut servos);
//! let profiles = controller.tick(0.02, &mut servos);
//! assert_eq!(profiles.len(), 1);
//! ```

pub mod actuator;
pub mod channel;
pub mod config;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod fin;
pub mod node;
pub mod protocol;
pub mod registry;
pub mod serialize;
pub mod servo;
pub mod transfer;

/// Prelude module for convenient imports
pub mod prelude {
    // Layer 1: Mixing Network
    pub use crate::actuator::{Actuator, Commands, OutputChannels, Parameter, UNASSIGNED};
    pub use crate::channel::{CoefficientId, Connection, OutputChannel};
    pub use crate::fin::{ActuatorSlot, Fin};
    pub use crate::transfer::{Shape, ShapeCodes, TransferFunction};

    // Layer 2: Registries
    pub use crate::registry::{FinHandle, FinId, FinRegistry};
    pub use crate::servo::{
        ChannelMode, ChannelSource, ParameterState, Servo, ServoId, ServoRegistry,
    };

    // Layer 3: Runtime
    pub use crate::controller::{
        ControllerState, OscillatorController, Profile, ProfileSink, LOOKAHEAD_TICKS, UNBOUNDED,
    };
    pub use crate::dispatch::{CommandSink, Liveness, MixingState, ServoCommand};
    pub use crate::node::{Event, FinNode, NodeClient};

    // Configuration Surface
    pub use crate::protocol::{
        Payload, Request, Response, ServoPayload, ServoRequest, ServoResponse,
    };

    // Configuration and Persistence
    pub use crate::config::{Config, ConnectionConfig, ControllerConfig, DispatchConfig, GainConfig};
    pub use crate::serialize::{FinSetDef, FIN_SET_VERSION};

    // Errors
    pub use crate::error::{ConfigError, ErrorKind, MixError};
}

// Re-export key types at crate root for convenience
pub use prelude::*;
