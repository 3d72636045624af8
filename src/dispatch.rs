//! Mixing Dispatch Pipeline
//!
//! Turns one external input sample into a batch of servo commands: every
//! assigned actuator is evaluated in registry order and the resulting batch
//! is pushed to a [`CommandSink`] in a single call.

use crate::actuator::Commands;
use crate::error::MixError;
use crate::registry::FinRegistry;
use log::debug;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Commands addressed to one servo
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ServoCommand {
    pub servo: usize,
    pub commands: Commands,
}

/// Receiver of command batches, typically the servo registry
pub trait CommandSink {
    fn set_commands(&mut self, batch: &[ServoCommand]) -> Result<(), MixError>;
}

/// Counts successful cycles of a periodic callback
#[derive(Debug, Clone, Default)]
pub struct Liveness {
    ticks: u64,
    last: Option<Instant>,
}

impl Liveness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&mut self) {
        self.ticks += 1;
        self.last = Some(Instant::now());
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn last_tick(&self) -> Option<Instant> {
        self.last
    }

    /// Seconds since the last tick, `None` before the first one
    pub fn idle_secs(&self) -> Option<f64> {
        self.last.map(|t| t.elapsed().as_secs_f64())
    }
}

impl FinRegistry {
    /// Evaluate every assigned actuator, in dispatch order
    ///
    /// The whole sample is rejected if any connection references an input
    /// beyond its length.
    pub fn outputs(&self, inputs: &[f64]) -> Result<Vec<ServoCommand>, MixError> {
        self.assigned()
            .filter_map(|(_, _, actuator)| {
                actuator.servo_id().map(|servo| {
                    actuator
                        .evaluate(inputs)
                        .map(|commands| ServoCommand { servo, commands })
                })
            })
            .collect()
    }
}

/// Fin configuration plus the liveness record of the dispatch path
#[derive(Debug, Clone, Default)]
pub struct MixingState {
    pub fins: FinRegistry,
    pub liveness: Liveness,
}

impl MixingState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fins(fins: FinRegistry) -> Self {
        Self {
            fins,
            liveness: Liveness::new(),
        }
    }

    /// Evaluate every assigned actuator without sending anything
    pub fn outputs(&self, inputs: &[f64]) -> Result<Vec<ServoCommand>, MixError> {
        self.fins.outputs(inputs)
    }

    /// Dispatch one input sample, returning the number of commands sent
    ///
    /// A liveness tick is recorded when nothing is assigned or when the sink
    /// accepted the batch. Failures leave the liveness record untouched.
    pub fn dispatch(
        &mut self,
        inputs: &[f64],
        sink: &mut dyn CommandSink,
    ) -> Result<usize, MixError> {
        let batch = self.outputs(inputs)?;
        if batch.is_empty() {
            self.liveness.tick();
            return Ok(0);
        }

        match sink.set_commands(&batch) {
            Ok(()) => {
                self.liveness.tick();
                Ok(batch.len())
            }
            Err(e) => {
                debug!("Dispatch of {} command(s) failed: {}", batch.len(), e);
                Err(e)
            }
        }
    }
}
