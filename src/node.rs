//! Fin Node
//!
//! Single-threaded owner of every piece of runtime state: the fin registry,
//! the servo registry, the controller and the two hardware capabilities.
//! Configuration requests, input samples and periodic ticks are handled one at
//! a time, so a dispatch never observes a partially updated fin.
//!
//! [`FinNode::run`] multiplexes the event channel with the controller and
//! discovery timers. The `step_*` methods perform the same transitions
//! synchronously.

use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, select, tick, unbounded, Receiver, Sender};
use log::{debug, info};

use crate::config::Config;
use crate::controller::{OscillatorController, ProfileSink};
use crate::dispatch::MixingState;
use crate::error::{ConfigError, MixError};
use crate::protocol::{Request, Response, ServoRequest, ServoResponse};
use crate::registry::FinRegistry;
use crate::serialize::FinSetDef;
use crate::servo::{ChannelSource, ServoRegistry};

/// Work item delivered to a running node
#[derive(Debug)]
pub enum Event {
    Configure(Request, Sender<Response>),
    Servo(ServoRequest, Sender<ServoResponse>),
    /// One external input sample, e.g. joystick axes
    Input(Vec<f64>),
    Shutdown,
}

pub struct FinNode {
    config: Config,
    mixing: MixingState,
    servos: ServoRegistry,
    controller: OscillatorController,
    channels: Box<dyn ChannelSource + Send>,
    profiles: Box<dyn ProfileSink + Send>,
    epoch: Instant,
}

impl FinNode {
    /// Build a node from a validated configuration
    pub fn new(
        config: Config,
        channels: Box<dyn ChannelSource + Send>,
        profiles: Box<dyn ProfileSink + Send>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let servos = ServoRegistry::new(
            config.controller.gain.to_commands(),
            config.controller.max_servos,
        );
        let controller = OscillatorController::from_config(&config.controller, 0.0);
        Ok(Self {
            config,
            mixing: MixingState::new(),
            servos,
            controller,
            channels,
            profiles,
            epoch: Instant::now(),
        })
    }

    pub fn with_fins(mut self, fins: FinRegistry) -> Self {
        self.mixing.fins = fins;
        self
    }

    /// Load the fin set named by the configuration, if any
    pub fn load_fins(&mut self) -> Result<usize, ConfigError> {
        let Some(path) = self.config.fins.clone() else {
            return Ok(0);
        };
        let def = FinSetDef::load(&path)?;
        self.mixing.fins = FinRegistry::from_def(&def);
        info!("Loaded {} fin(s) from {}.", def.fins.len(), path.display());
        Ok(def.fins.len())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn mixing(&self) -> &MixingState {
        &self.mixing
    }

    pub fn fins(&self) -> &FinRegistry {
        &self.mixing.fins
    }

    pub fn servos(&self) -> &ServoRegistry {
        &self.servos
    }

    pub fn controller(&self) -> &OscillatorController {
        &self.controller
    }

    /// Seconds since the node was created
    pub fn elapsed(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// True when no input sample was dispatched within the expected period
    pub fn input_stale(&self) -> bool {
        let period = 1.0 / self.config.dispatch.expected_frequency;
        self.mixing
            .liveness
            .idle_secs()
            .map_or(true, |idle| idle > period)
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    /// Discover servos unless already populated; true once servos exist
    pub fn step_connect(&mut self) -> bool {
        if self.servos.is_empty() {
            // Failures are logged by the registry and retried on the next timer.
            let _ = self.servos.populate(self.channels.as_mut());
        }
        !self.servos.is_empty()
    }

    pub fn step_configure(&mut self, request: Request) -> Response {
        self.mixing.handle_request(request)
    }

    pub fn step_servo(&mut self, request: ServoRequest) -> ServoResponse {
        self.servos.handle_request(request)
    }

    /// Mix one input sample into servo command targets
    pub fn step_input(&mut self, inputs: &[f64]) -> Result<usize, MixError> {
        self.mixing.dispatch(inputs, &mut self.servos).map_err(|e| {
            debug!("Input sample of {} value(s) dropped: {}", inputs.len(), e);
            e
        })
    }

    /// Run one controller tick at `now` seconds since the node epoch
    pub fn step_control(&mut self, now: f64) -> Result<usize, MixError> {
        self.controller
            .tick_and_send(now, &mut self.servos, self.profiles.as_mut())
    }

    /// Handle one event; returns true when the node should stop
    pub fn handle_event(&mut self, event: Event) -> bool {
        match event {
            Event::Configure(request, reply) => {
                if reply.send(self.step_configure(request)).is_err() {
                    debug!("Configuration reply dropped: requester is gone");
                }
            }
            Event::Servo(request, reply) => {
                if reply.send(self.step_servo(request)).is_err() {
                    debug!("Servo reply dropped: requester is gone");
                }
            }
            Event::Input(inputs) => {
                let _ = self.step_input(&inputs);
            }
            Event::Shutdown => return true,
        }
        false
    }

    // ------------------------------------------------------------------
    // Event loop
    // ------------------------------------------------------------------

    /// Run until `Shutdown` arrives or every sender is dropped
    pub fn run(mut self, events: Receiver<Event>) {
        self.step_connect();

        let control = tick(Duration::from_secs_f64(self.config.controller.period()));
        let retry = tick(Duration::from_secs_f64(self.config.connection.retry));
        info!(
            "Fin node running: controller at {} Hz, {} fin(s), {} servo(s).",
            self.config.controller.frequency,
            self.mixing.fins.len(),
            self.servos.len()
        );

        loop {
            select! {
                recv(events) -> msg => match msg {
                    Ok(event) => {
                        if self.handle_event(event) {
                            break;
                        }
                    }
                    Err(_) => break,
                },
                recv(control) -> _ => {
                    let now = self.elapsed();
                    let _ = self.step_control(now);
                }
                recv(retry) -> _ => {
                    if self.servos.is_empty() {
                        self.step_connect();
                    }
                }
            }
        }

        info!(
            "Fin node stopped after {} dispatch(es) and {} controller tick(s).",
            self.mixing.liveness.ticks(),
            self.controller.liveness.ticks()
        );
    }

    /// Run the node on its own thread
    pub fn spawn(self) -> (NodeClient, JoinHandle<()>) {
        let (tx, rx) = unbounded();
        let handle = std::thread::spawn(move || self.run(rx));
        (NodeClient { events: tx }, handle)
    }
}

/// Synchronous front end to a running [`FinNode`]
#[derive(Debug, Clone)]
pub struct NodeClient {
    events: Sender<Event>,
}

fn node_gone() -> MixError {
    MixError::DownstreamUnavailable("fin node is not running".into())
}

impl NodeClient {
    pub fn new(events: Sender<Event>) -> Self {
        Self { events }
    }

    pub fn configure(&self, request: Request) -> Result<Response, MixError> {
        let (tx, rx) = bounded(1);
        self.events
            .send(Event::Configure(request, tx))
            .map_err(|_| node_gone())?;
        rx.recv().map_err(|_| node_gone())
    }

    pub fn servo(&self, request: ServoRequest) -> Result<ServoResponse, MixError> {
        let (tx, rx) = bounded(1);
        self.events
            .send(Event::Servo(request, tx))
            .map_err(|_| node_gone())?;
        rx.recv().map_err(|_| node_gone())
    }

    pub fn input(&self, inputs: Vec<f64>) -> Result<(), MixError> {
        self.events
            .send(Event::Input(inputs))
            .map_err(|_| node_gone())
    }

    pub fn shutdown(&self) -> Result<(), MixError> {
        self.events.send(Event::Shutdown).map_err(|_| node_gone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::{Actuator, Commands, Parameter};
    use crate::channel::{Connection, OutputChannel};
    use crate::controller::Profile;
    use crate::fin::Fin;
    use crate::protocol::{Payload, ServoPayload};
    use crate::servo::ChannelMode;
    use crate::transfer::Shape;
    use approx::assert_relative_eq;
    use std::sync::{Arc, Mutex};

    /// Reports `servos` servo channels after `failures` failed attempts
    struct FlakyChannels {
        failures: usize,
        servos: usize,
    }

    impl ChannelSource for FlakyChannels {
        fn channel_modes(&mut self) -> Result<Vec<ChannelMode>, MixError> {
            if self.failures > 0 {
                self.failures -= 1;
                return Err(MixError::DownstreamUnavailable("get_channels".into()));
            }
            Ok(vec![ChannelMode::Servo; self.servos])
        }
    }

    #[derive(Clone, Default)]
    struct SharedProfiles(Arc<Mutex<Vec<Vec<Profile>>>>);

    impl ProfileSink for SharedProfiles {
        fn set_profiles(&mut self, profiles: &[Profile]) -> Result<(), MixError> {
            self.0.lock().unwrap().push(profiles.to_vec());
            Ok(())
        }
    }

    fn test_node(failures: usize) -> (FinNode, SharedProfiles) {
        let sink = SharedProfiles::default();
        let node = FinNode::new(
            Config::default(),
            Box::new(FlakyChannels {
                failures,
                servos: 4,
            }),
            Box::new(sink.clone()),
        )
        .unwrap();
        (node, sink)
    }

    fn amplitude_fin(servo: i32, amplitude: OutputChannel) -> Fin {
        Fin::new(
            Actuator::new(servo).with(Parameter::Amplitude, amplitude),
            Actuator::default(),
        )
    }

    #[test]
    fn test_input_to_setpoint() {
        let (mut node, sink) = test_node(0);
        assert!(node.step_connect());

        let added = node.step_configure(Request::AddFin {
            fin: amplitude_fin(1, OutputChannel::new(0.5)),
        });
        assert_eq!(added.payload, Payload::FinId(0));

        assert_eq!(node.step_input(&[0.3]).unwrap(), 1);
        assert_eq!(node.servos().get(1).unwrap().command.amplitude, 0.5);

        node.step_control(0.0).unwrap();
        node.step_control(0.02).unwrap();
        assert_relative_eq!(
            node.servos().get(1).unwrap().actual.amplitude,
            0.9 * 0.02 * 0.5,
            epsilon = 1e-12
        );

        let sent = sink.0.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].len(), 4);
        assert_eq!(sent[1][1].channel, 1);
        assert_eq!(node.controller().liveness.ticks(), 2);
        assert_eq!(node.mixing().liveness.ticks(), 1);
    }

    #[test]
    fn test_ramp_scenario() {
        let (mut node, _) = test_node(0);
        node.step_connect();
        node.step_configure(Request::AddFin {
            fin: amplitude_fin(3, OutputChannel::new(2.0)),
        });
        let response = node.step_configure(Request::Connect {
            fin: 0,
            actuator: 0,
            channel: 1,
            connection: Connection::new(1, Shape::Ramp),
        });
        assert_eq!(response.payload, Payload::CoefficientId(0));

        node.step_input(&[0.0, 0.7]).unwrap();
        assert_relative_eq!(node.servos().get(3).unwrap().command.amplitude, 1.4, epsilon = 1e-12);
        node.step_input(&[0.0, -0.5]).unwrap();
        assert_eq!(node.servos().get(3).unwrap().command.amplitude, 0.0);
    }

    #[test]
    fn test_short_sample_leaves_targets() {
        let (mut node, _) = test_node(0);
        node.step_connect();
        node.step_configure(Request::AddFin {
            fin: amplitude_fin(0, OutputChannel::new(1.0).with(Connection::identity(2))),
        });
        node.step_input(&[0.0, 0.0, 0.4]).unwrap();

        let err = node.step_input(&[0.9]).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::IndexOutOfRange);
        assert_eq!(node.servos().get(0).unwrap().command.amplitude, 0.4);
        assert_eq!(node.mixing().liveness.ticks(), 1);
    }

    #[test]
    fn test_input_before_discovery() {
        let (mut node, _) = test_node(1);
        assert!(!node.step_connect());
        node.step_configure(Request::AddFin {
            fin: amplitude_fin(0, OutputChannel::new(1.0)),
        });

        let err = node.step_input(&[]).unwrap_err();
        assert_eq!(err, MixError::ServoNotFound(0));
        assert_eq!(node.mixing().liveness.ticks(), 0);

        assert!(node.input_stale());
        assert!(node.step_connect());
        assert_eq!(node.servos().len(), 4);
        node.step_input(&[]).unwrap();
        assert_eq!(node.mixing().liveness.ticks(), 1);
        assert!(!node.input_stale());
    }

    #[test]
    fn test_discovery_cap_from_config() {
        let mut config = Config::default();
        config.controller.max_servos = 2;
        config.controller.gain.phase = 0.3;
        let mut node = FinNode::new(
            config,
            Box::new(FlakyChannels {
                failures: 0,
                servos: 6,
            }),
            Box::new(SharedProfiles::default()),
        )
        .unwrap();
        node.step_connect();
        assert_eq!(node.servos().len(), 2);
        assert_eq!(node.servos().get(0).unwrap().gain.phase, 0.3);
    }

    #[test]
    fn test_handle_event_replies() {
        let (mut node, _) = test_node(0);
        node.step_connect();

        let (tx, rx) = bounded(1);
        assert!(!node.handle_event(Event::Configure(Request::GetFin { fin: 0 }, tx)));
        let response = rx.recv().unwrap();
        assert_eq!(response.warning.as_deref(), Some("Fin 0 does not exist."));

        let (tx, rx) = bounded(1);
        node.handle_event(Event::Servo(
            ServoRequest::SetCommands {
                entries: vec![(2, Commands::splat(0.2))],
            },
            tx,
        ));
        assert!(rx.recv().unwrap().success);
        assert_eq!(node.servos().get(2).unwrap().command, Commands::splat(0.2));

        assert!(node.handle_event(Event::Shutdown));
    }

    #[test]
    fn test_spawned_node_processes_in_order() {
        let (node, _) = test_node(0);
        let (client, handle) = node.spawn();

        let response = client
            .configure(Request::AddFin {
                fin: amplitude_fin(2, OutputChannel::new(0.75)),
            })
            .unwrap();
        assert!(response.success);

        client.input(vec![1.0]).unwrap();
        let response = client
            .servo(ServoRequest::GetCommands { servos: vec![2, 9] })
            .unwrap();
        match response.payload {
            ServoPayload::Commands(commands) => {
                assert_eq!(commands[0].amplitude, 0.75);
                assert!(commands[1].amplitude.is_nan());
            }
            other => panic!("unexpected payload: {:?}", other),
        }

        client.shutdown().unwrap();
        handle.join().unwrap();
        assert!(client.input(vec![0.0]).is_err());
    }

    #[test]
    fn test_load_fins_from_config() {
        let path = std::env::temp_dir().join(format!("finmix-node-{}.json", std::process::id()));
        FinSetDef::new("pair")
            .with_fin(amplitude_fin(0, OutputChannel::new(0.1)))
            .with_fin(amplitude_fin(1, OutputChannel::new(0.2)))
            .save(&path)
            .unwrap();

        let mut config = Config::default();
        config.fins = Some(path.clone());
        let mut node = FinNode::new(
            config,
            Box::new(FlakyChannels {
                failures: 0,
                servos: 2,
            }),
            Box::new(SharedProfiles::default()),
        )
        .unwrap();
        let loaded = node.load_fins();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.unwrap(), 2);
        assert_eq!(node.fins().len(), 2);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = Config::default();
        config.controller.frequency = 0.0;
        let result = FinNode::new(
            config,
            Box::new(FlakyChannels {
                failures: 0,
                servos: 1,
            }),
            Box::new(SharedProfiles::default()),
        );
        assert!(matches!(result, Err(ConfigError::InvalidFrequency(f)) if f == 0.0));

        let mut config = Config::default();
        config.connection.retry = 0.0;
        let result = FinNode::new(
            config,
            Box::new(FlakyChannels {
                failures: 0,
                servos: 1,
            }),
            Box::new(SharedProfiles::default()),
        );
        assert!(matches!(result, Err(ConfigError::InvalidRetry(_))));
    }
}
