//! Configuration Protocol
//!
//! Transport-agnostic request/response surface over the fin and servo
//! registries. Requests carry raw integer ids exactly as a remote caller sends
//! them; every id is validated before anything is touched. A failed request
//! never changes state and comes back as `success == false` with a warning.
//!
//! # Example
//!
//! ```
//! use finmix::prelude::*;
//!
//! let mut state = MixingState::new();
//! let added = state.handle_request(Request::AddFin { fin: Fin::default() });
//! assert_eq!(added.payload, Payload::FinId(0));
//!
//! let missing = state.handle_request(Request::GetFin { fin: 3 });
//! assert!(!missing.success);
//! assert_eq!(missing.warning.as_deref(), Some("Fin 3 does not exist."));
//! ```

use log::warn;
use serde::{Deserialize, Serialize};

use crate::actuator::{nan_as_null, Actuator, Commands, OutputChannels, Parameter};
use crate::channel::{CoefficientId, Connection, OutputChannel};
use crate::dispatch::{MixingState, ServoCommand};
use crate::error::MixError;
use crate::fin::{ActuatorSlot, Fin};
use crate::registry::{FinId, FinRegistry};
use crate::servo::{ParameterState, ServoId, ServoRegistry};

// ---------------------------------------------------------------------------
// Fin configuration
// ---------------------------------------------------------------------------

/// Configuration request addressed to the fin registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    AddFin {
        fin: Fin,
    },
    RemoveFin {
        fin: i64,
    },
    GetFin {
        fin: i64,
    },
    SetFin {
        fin: i64,
        value: Fin,
    },
    GetFins,
    SetFins {
        fins: Vec<Fin>,
    },
    GetActuator {
        fin: i64,
        actuator: i64,
    },
    SetActuator {
        fin: i64,
        actuator: i64,
        value: Actuator,
    },
    GetActuators {
        fin: i64,
    },
    SetActuators {
        fin: i64,
        pitch: Actuator,
        flap: Actuator,
    },
    GetOutputChannel {
        fin: i64,
        actuator: i64,
        channel: i64,
    },
    SetOutputChannel {
        fin: i64,
        actuator: i64,
        channel: i64,
        value: OutputChannel,
    },
    GetOutputChannels {
        fin: i64,
        actuator: i64,
    },
    SetOutputChannels {
        fin: i64,
        actuator: i64,
        channels: OutputChannels,
    },
    GetCoefficient {
        fin: i64,
        actuator: i64,
        channel: i64,
        coefficient: i64,
    },
    SetCoefficient {
        fin: i64,
        actuator: i64,
        channel: i64,
        coefficient: i64,
        value: Connection,
    },
    GetCoefficients {
        fin: i64,
        actuator: i64,
        channel: i64,
    },
    SetCoefficients {
        fin: i64,
        actuator: i64,
        channel: i64,
        coefficients: Vec<Connection>,
    },
    Connect {
        fin: i64,
        actuator: i64,
        channel: i64,
        connection: Connection,
    },
    Disconnect {
        fin: i64,
        actuator: i64,
        channel: i64,
        coefficient: i64,
    },
    /// Evaluate all assigned actuators without dispatching
    GetOutputs {
        inputs: Vec<f64>,
    },
}

impl Request {
    pub fn name(&self) -> &'static str {
        match self {
            Request::AddFin { .. } => "AddFin",
            Request::RemoveFin { .. } => "RemoveFin",
            Request::GetFin { .. } => "GetFin",
            Request::SetFin { .. } => "SetFin",
            Request::GetFins => "GetFins",
            Request::SetFins { .. } => "SetFins",
            Request::GetActuator { .. } => "GetActuator",
            Request::SetActuator { .. } => "SetActuator",
            Request::GetActuators { .. } => "GetActuators",
            Request::SetActuators { .. } => "SetActuators",
            Request::GetOutputChannel { .. } => "GetOutputChannel",
            Request::SetOutputChannel { .. } => "SetOutputChannel",
            Request::GetOutputChannels { .. } => "GetOutputChannels",
            Request::SetOutputChannels { .. } => "SetOutputChannels",
            Request::GetCoefficient { .. } => "GetCoefficient",
            Request::SetCoefficient { .. } => "SetCoefficient",
            Request::GetCoefficients { .. } => "GetCoefficients",
            Request::SetCoefficients { .. } => "SetCoefficients",
            Request::Connect { .. } => "Connect",
            Request::Disconnect { .. } => "Disconnect",
            Request::GetOutputs { .. } => "GetOutputs",
        }
    }
}

/// Data returned by a successful request
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Payload {
    #[default]
    None,
    FinId(FinId),
    CoefficientId(CoefficientId),
    Fin(Fin),
    Fins(Vec<Fin>),
    Actuator(Actuator),
    Actuators {
        pitch: Actuator,
        flap: Actuator,
    },
    OutputChannel(OutputChannel),
    OutputChannels(OutputChannels),
    Coefficient(Connection),
    Coefficients(Vec<Connection>),
    Outputs(Vec<ServoCommand>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(default)]
    pub payload: Payload,
}

impl Response {
    pub fn ok(payload: Payload) -> Self {
        Self {
            success: true,
            warning: None,
            payload,
        }
    }

    pub fn failure(error: &MixError) -> Self {
        Self {
            success: false,
            warning: Some(error.to_string()),
            payload: Payload::None,
        }
    }

    fn from_result(result: Result<Payload, MixError>) -> Self {
        match result {
            Ok(payload) => Self::ok(payload),
            Err(e) => Self::failure(&e),
        }
    }
}

/// Validated (fin, actuator, output channel) address
type ChannelAddress = (FinId, ActuatorSlot, Parameter);

impl FinRegistry {
    fn resolve_fin(&self, fin: i64) -> Result<FinId, MixError> {
        usize::try_from(fin)
            .ok()
            .filter(|&id| id < self.len())
            .ok_or(MixError::FinNotFound(fin))
    }

    fn resolve_actuator(&self, fin: i64, actuator: i64) -> Result<(FinId, ActuatorSlot), MixError> {
        let id = self.resolve_fin(fin)?;
        let slot =
            ActuatorSlot::from_id(actuator).ok_or(MixError::ActuatorNotFound { fin, actuator })?;
        Ok((id, slot))
    }

    fn resolve_channel(
        &self,
        fin: i64,
        actuator: i64,
        channel: i64,
    ) -> Result<ChannelAddress, MixError> {
        let (id, slot) = self.resolve_actuator(fin, actuator)?;
        let parameter = Parameter::from_id(channel).ok_or(MixError::OutputChannelNotFound {
            fin,
            actuator,
            channel,
        })?;
        Ok((id, slot, parameter))
    }

    fn resolve_coefficient(
        &self,
        fin: i64,
        actuator: i64,
        channel: i64,
        coefficient: i64,
    ) -> Result<(ChannelAddress, CoefficientId), MixError> {
        let address = self.resolve_channel(fin, actuator, channel)?;
        let id = usize::try_from(coefficient).map_err(|_| MixError::CoefficientNotFound {
            fin,
            actuator,
            channel,
            id: coefficient,
        })?;
        Ok((address, id))
    }

    /// Execute a configuration request
    pub fn handle_request(&mut self, request: Request) -> Response {
        let name = request.name();
        let result = self.execute(request);
        if let Err(e) = &result {
            warn!("{} request failed: {}", name, e);
        }
        Response::from_result(result)
    }

    fn execute(&mut self, request: Request) -> Result<Payload, MixError> {
        match request {
            Request::AddFin { fin } => Ok(Payload::FinId(self.add_fin(fin))),
            Request::RemoveFin { fin } => {
                let id = self.resolve_fin(fin)?;
                self.remove_fin(id)?;
                Ok(Payload::None)
            }
            Request::GetFin { fin } => {
                let id = self.resolve_fin(fin)?;
                Ok(Payload::Fin(self.fin(id)?.clone()))
            }
            Request::SetFin { fin, value } => {
                let id = self.resolve_fin(fin)?;
                self.set_fin(id, value)?;
                Ok(Payload::None)
            }
            Request::GetFins => Ok(Payload::Fins(self.to_vec())),
            Request::SetFins { fins } => {
                self.set_fins(fins)?;
                Ok(Payload::None)
            }
            Request::GetActuator { fin, actuator } => {
                let (id, slot) = self.resolve_actuator(fin, actuator)?;
                Ok(Payload::Actuator(self.actuator(id, slot)?.clone()))
            }
            Request::SetActuator {
                fin,
                actuator,
                value,
            } => {
                let (id, slot) = self.resolve_actuator(fin, actuator)?;
                self.set_actuator(id, slot, value)?;
                Ok(Payload::None)
            }
            Request::GetActuators { fin } => {
                let id = self.resolve_fin(fin)?;
                let (pitch, flap) = self.actuators(id)?;
                Ok(Payload::Actuators {
                    pitch: pitch.clone(),
                    flap: flap.clone(),
                })
            }
            Request::SetActuators { fin, pitch, flap } => {
                let id = self.resolve_fin(fin)?;
                self.set_actuators(id, pitch, flap)?;
                Ok(Payload::None)
            }
            Request::GetOutputChannel {
                fin,
                actuator,
                channel,
            } => {
                let (id, slot, p) = self.resolve_channel(fin, actuator, channel)?;
                Ok(Payload::OutputChannel(self.output_channel(id, slot, p)?.clone()))
            }
            Request::SetOutputChannel {
                fin,
                actuator,
                channel,
                value,
            } => {
                let (id, slot, p) = self.resolve_channel(fin, actuator, channel)?;
                self.set_output_channel(id, slot, p, value)?;
                Ok(Payload::None)
            }
            Request::GetOutputChannels { fin, actuator } => {
                let (id, slot) = self.resolve_actuator(fin, actuator)?;
                Ok(Payload::OutputChannels(self.output_channels(id, slot)?))
            }
            Request::SetOutputChannels {
                fin,
                actuator,
                channels,
            } => {
                let (id, slot) = self.resolve_actuator(fin, actuator)?;
                self.set_output_channels(id, slot, channels)?;
                Ok(Payload::None)
            }
            Request::GetCoefficient {
                fin,
                actuator,
                channel,
                coefficient,
            } => {
                let ((id, slot, p), c) =
                    self.resolve_coefficient(fin, actuator, channel, coefficient)?;
                Ok(Payload::Coefficient(*self.coefficient(id, slot, p, c)?))
            }
            Request::SetCoefficient {
                fin,
                actuator,
                channel,
                coefficient,
                value,
            } => {
                let ((id, slot, p), c) =
                    self.resolve_coefficient(fin, actuator, channel, coefficient)?;
                self.set_coefficient(id, slot, p, c, value)?;
                Ok(Payload::None)
            }
            Request::GetCoefficients {
                fin,
                actuator,
                channel,
            } => {
                let (id, slot, p) = self.resolve_channel(fin, actuator, channel)?;
                Ok(Payload::Coefficients(self.coefficients(id, slot, p)?.to_vec()))
            }
            Request::SetCoefficients {
                fin,
                actuator,
                channel,
                coefficients,
            } => {
                let (id, slot, p) = self.resolve_channel(fin, actuator, channel)?;
                self.set_coefficients(id, slot, p, coefficients)?;
                Ok(Payload::None)
            }
            Request::Connect {
                fin,
                actuator,
                channel,
                connection,
            } => {
                let (id, slot, p) = self.resolve_channel(fin, actuator, channel)?;
                Ok(Payload::CoefficientId(self.connect(id, slot, p, connection)?))
            }
            Request::Disconnect {
                fin,
                actuator,
                channel,
                coefficient,
            } => {
                let ((id, slot, p), c) =
                    self.resolve_coefficient(fin, actuator, channel, coefficient)?;
                self.disconnect(id, slot, p, c)?;
                Ok(Payload::None)
            }
            Request::GetOutputs { inputs } => Ok(Payload::Outputs(self.outputs(&inputs)?)),
        }
    }
}

impl MixingState {
    /// Execute a configuration request against the owned fin registry
    pub fn handle_request(&mut self, request: Request) -> Response {
        self.fins.handle_request(request)
    }
}

// ---------------------------------------------------------------------------
// Servo access
// ---------------------------------------------------------------------------

/// Request addressed to the servo registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ServoRequest {
    GetHomes {
        servos: Vec<ServoId>,
    },
    GetGains {
        servos: Vec<ServoId>,
    },
    GetCommands {
        servos: Vec<ServoId>,
    },
    GetActuals {
        servos: Vec<ServoId>,
    },
    /// Commanded and actual value of one parameter
    GetParameter {
        parameter: Parameter,
        servos: Vec<ServoId>,
    },
    SetHomes {
        entries: Vec<(ServoId, f64)>,
    },
    SetGains {
        entries: Vec<(ServoId, Commands)>,
    },
    SetCommands {
        entries: Vec<(ServoId, Commands)>,
    },
    SetParameter {
        parameter: Parameter,
        entries: Vec<(ServoId, f64)>,
    },
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ServoPayload {
    #[default]
    None,
    Homes(#[serde(with = "nan_as_null::vec")] Vec<f64>),
    Gains(Vec<Commands>),
    Commands(Vec<Commands>),
    Actuals(Vec<Commands>),
    Parameter(Vec<ParameterState>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServoResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(default)]
    pub payload: ServoPayload,
}

impl ServoResponse {
    fn from_result(result: Result<(), MixError>, payload: ServoPayload) -> Self {
        match result {
            Ok(()) => Self {
                success: true,
                warning: None,
                payload,
            },
            Err(e) => Self {
                success: false,
                warning: Some(e.to_string()),
                payload,
            },
        }
    }
}

impl ServoRegistry {
    /// Execute a servo request; getters always succeed
    pub fn handle_request(&mut self, request: ServoRequest) -> ServoResponse {
        let read = |payload| ServoResponse::from_result(Ok(()), payload);
        match request {
            ServoRequest::GetHomes { servos } => read(ServoPayload::Homes(self.homes(&servos))),
            ServoRequest::GetGains { servos } => read(ServoPayload::Gains(self.gains(&servos))),
            ServoRequest::GetCommands { servos } => {
                read(ServoPayload::Commands(self.commands(&servos)))
            }
            ServoRequest::GetActuals { servos } => {
                read(ServoPayload::Actuals(self.actuals(&servos)))
            }
            ServoRequest::GetParameter { parameter, servos } => {
                read(ServoPayload::Parameter(self.parameter(&servos, parameter)))
            }
            ServoRequest::SetHomes { entries } => {
                ServoResponse::from_result(self.set_homes(&entries), ServoPayload::None)
            }
            ServoRequest::SetGains { entries } => {
                ServoResponse::from_result(self.set_gains(&entries), ServoPayload::None)
            }
            ServoRequest::SetCommands { entries } => {
                ServoResponse::from_result(self.set_targets(&entries), ServoPayload::None)
            }
            ServoRequest::SetParameter { parameter, entries } => ServoResponse::from_result(
                self.set_parameter(parameter, &entries),
                ServoPayload::None,
            ),
        }
    }
}
