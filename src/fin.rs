//! Fins
//!
//! A fin carries two independently actuated degrees of freedom.

use crate::actuator::{Actuator, Commands};
use crate::error::MixError;
use serde::{Deserialize, Serialize};

/// Actuator slot within a fin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActuatorSlot {
    Pitch,
    Flap,
}

impl ActuatorSlot {
    /// Evaluation order: pitch before flap
    pub const ALL: [ActuatorSlot; 2] = [ActuatorSlot::Pitch, ActuatorSlot::Flap];

    pub fn id(&self) -> i64 {
        match self {
            ActuatorSlot::Pitch => 0,
            ActuatorSlot::Flap => 1,
        }
    }

    pub fn from_id(id: i64) -> Option<Self> {
        match id {
            0 => Some(ActuatorSlot::Pitch),
            1 => Some(ActuatorSlot::Flap),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Fin {
    #[serde(default)]
    pub pitch: Actuator,
    #[serde(default)]
    pub flap: Actuator,
}

impl Fin {
    pub fn new(pitch: Actuator, flap: Actuator) -> Self {
        Self { pitch, flap }
    }

    pub fn actuator(&self, slot: ActuatorSlot) -> &Actuator {
        match slot {
            ActuatorSlot::Pitch => &self.pitch,
            ActuatorSlot::Flap => &self.flap,
        }
    }

    pub fn actuator_mut(&mut self, slot: ActuatorSlot) -> &mut Actuator {
        match slot {
            ActuatorSlot::Pitch => &mut self.pitch,
            ActuatorSlot::Flap => &mut self.flap,
        }
    }

    pub fn set_actuator(&mut self, slot: ActuatorSlot, actuator: Actuator) {
        *self.actuator_mut(slot) = actuator;
    }

    /// Assigned actuators, pitch before flap
    pub fn assigned(&self) -> impl Iterator<Item = (ActuatorSlot, &Actuator)> {
        ActuatorSlot::ALL
            .into_iter()
            .map(move |slot| (slot, self.actuator(slot)))
            .filter(|(_, a)| a.is_assigned())
    }

    /// Evaluate both actuators for an input sample
    pub fn evaluate(&self, inputs: &[f64]) -> Result<(Commands, Commands), MixError> {
        Ok((self.pitch.evaluate(inputs)?, self.flap.evaluate(inputs)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::Parameter;
    use crate::channel::OutputChannel;

    #[test]
    fn test_slot_ids() {
        assert_eq!(ActuatorSlot::from_id(0), Some(ActuatorSlot::Pitch));
        assert_eq!(ActuatorSlot::from_id(1), Some(ActuatorSlot::Flap));
        assert_eq!(ActuatorSlot::from_id(2), None);
        assert_eq!(ActuatorSlot::Flap.id(), 1);
    }

    #[test]
    fn test_assigned_order() {
        let fin = Fin::new(Actuator::new(4), Actuator::new(2));
        let servos: Vec<_> = fin.assigned().map(|(_, a)| a.servo).collect();
        assert_eq!(servos, vec![4, 2]);

        let only_flap = Fin::new(Actuator::default(), Actuator::new(0));
        let slots: Vec<_> = only_flap.assigned().map(|(s, _)| s).collect();
        assert_eq!(slots, vec![ActuatorSlot::Flap]);
    }

    #[test]
    fn test_set_actuator() {
        let mut fin = Fin::default();
        fin.set_actuator(
            ActuatorSlot::Flap,
            Actuator::new(5).with(Parameter::Amplitude, OutputChannel::new(0.3)),
        );
        let (pitch, flap) = fin.evaluate(&[]).unwrap();
        assert_eq!(pitch, Commands::ZERO);
        assert_eq!(flap.amplitude, 0.3);
    }
}
