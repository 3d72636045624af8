//! Fin Registry
//!
//! The registry owns every configured fin and exposes the typed configuration
//! surface. Fins are addressed by their position: adding appends, removing
//! shifts every later fin down by one. A positional id held across a removal
//! may therefore name a different fin afterwards.
//!
//! For callers that need a reference surviving the removal of other fins, the
//! registry hands out generation-tagged [`FinHandle`]s backed by a slot map.
//! A handle becomes stale only when its own fin is removed.

use crate::actuator::{Actuator, OutputChannels, Parameter};
use crate::channel::{CoefficientId, Connection, OutputChannel};
use crate::error::MixError;
use crate::fin::{ActuatorSlot, Fin};
use log::info;
use slotmap::{new_key_type, SlotMap};

/// Positional fin id
pub type FinId = usize;

new_key_type! {
    /// Stable, generation-tagged reference to a fin
    pub struct FinHandle;
}

/// Ordered, index-addressed collection of fins
#[derive(Debug, Clone, Default)]
pub struct FinRegistry {
    fins: SlotMap<FinHandle, Fin>,
    order: Vec<FinHandle>,
}

fn fin_err(fin: FinId) -> MixError {
    MixError::FinNotFound(fin as i64)
}

fn coefficient_err(fin: FinId, slot: ActuatorSlot, channel: Parameter, id: usize) -> MixError {
    MixError::CoefficientNotFound {
        fin: fin as i64,
        actuator: slot.id(),
        channel: channel.id(),
        id: id as i64,
    }
}

impl FinRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    // ------------------------------------------------------------------
    // Whole fins
    // ------------------------------------------------------------------

    /// Append a fin, returning its positional id
    pub fn add_fin(&mut self, fin: Fin) -> FinId {
        let handle = self.fins.insert(fin);
        self.order.push(handle);
        let id = self.order.len() - 1;
        info!("Added fin {} ({} fin(s) configured).", id, self.order.len());
        id
    }

    /// Remove a fin; every later fin moves down by one position
    pub fn remove_fin(&mut self, id: FinId) -> Result<Fin, MixError> {
        if id >= self.order.len() {
            return Err(fin_err(id));
        }
        let handle = self.order.remove(id);
        let fin = self.fins.remove(handle).ok_or_else(|| fin_err(id))?;
        info!("Removed fin {} ({} fin(s) configured).", id, self.order.len());
        Ok(fin)
    }

    pub fn fin(&self, id: FinId) -> Result<&Fin, MixError> {
        self.order
            .get(id)
            .and_then(|&h| self.fins.get(h))
            .ok_or_else(|| fin_err(id))
    }

    fn fin_mut(&mut self, id: FinId) -> Result<&mut Fin, MixError> {
        let handle = *self.order.get(id).ok_or_else(|| fin_err(id))?;
        self.fins.get_mut(handle).ok_or_else(|| fin_err(id))
    }

    /// Replace a whole fin
    pub fn set_fin(&mut self, id: FinId, fin: Fin) -> Result<(), MixError> {
        *self.fin_mut(id)? = fin;
        Ok(())
    }

    /// Iterate fins in positional order
    pub fn fins(&self) -> impl Iterator<Item = &Fin> {
        self.order.iter().filter_map(move |&h| self.fins.get(h))
    }

    pub fn to_vec(&self) -> Vec<Fin> {
        self.fins().cloned().collect()
    }

    /// Resize the registry to `fins.len()` and set every element
    ///
    /// Positions that survive the resize keep their handles. Every element is
    /// attempted; the first failure is reported and earlier elements are not
    /// rolled back.
    pub fn set_fins(&mut self, fins: Vec<Fin>) -> Result<(), MixError> {
        while self.order.len() > fins.len() {
            if let Some(handle) = self.order.pop() {
                self.fins.remove(handle);
            }
        }
        while self.order.len() < fins.len() {
            let handle = self.fins.insert(Fin::default());
            self.order.push(handle);
        }

        let mut result = Ok(());
        for (id, fin) in fins.into_iter().enumerate() {
            if let Err(e) = self.set_fin(id, fin) {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }

    // ------------------------------------------------------------------
    // Stable handles
    // ------------------------------------------------------------------

    /// Stable handle for the fin currently at `id`
    pub fn handle(&self, id: FinId) -> Option<FinHandle> {
        self.order.get(id).copied()
    }

    pub fn fin_by_handle(&self, handle: FinHandle) -> Option<&Fin> {
        self.fins.get(handle)
    }

    /// Current position of a handle, `None` once its fin is removed
    pub fn position_of(&self, handle: FinHandle) -> Option<FinId> {
        if !self.fins.contains_key(handle) {
            return None;
        }
        self.order.iter().position(|&h| h == handle)
    }

    // ------------------------------------------------------------------
    // Actuators
    // ------------------------------------------------------------------

    pub fn actuator(&self, fin: FinId, slot: ActuatorSlot) -> Result<&Actuator, MixError> {
        Ok(self.fin(fin)?.actuator(slot))
    }

    pub fn set_actuator(
        &mut self,
        fin: FinId,
        slot: ActuatorSlot,
        actuator: Actuator,
    ) -> Result<(), MixError> {
        self.fin_mut(fin)?.set_actuator(slot, actuator);
        Ok(())
    }

    /// Both actuators of a fin, pitch first
    pub fn actuators(&self, fin: FinId) -> Result<(&Actuator, &Actuator), MixError> {
        let f = self.fin(fin)?;
        Ok((&f.pitch, &f.flap))
    }

    pub fn set_actuators(
        &mut self,
        fin: FinId,
        pitch: Actuator,
        flap: Actuator,
    ) -> Result<(), MixError> {
        let f = self.fin_mut(fin)?;
        f.pitch = pitch;
        f.flap = flap;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Output channels
    // ------------------------------------------------------------------

    pub fn output_channel(
        &self,
        fin: FinId,
        slot: ActuatorSlot,
        channel: Parameter,
    ) -> Result<&OutputChannel, MixError> {
        Ok(self.actuator(fin, slot)?.output_channel(channel))
    }

    fn output_channel_mut(
        &mut self,
        fin: FinId,
        slot: ActuatorSlot,
        channel: Parameter,
    ) -> Result<&mut OutputChannel, MixError> {
        Ok(self.fin_mut(fin)?.actuator_mut(slot).output_channel_mut(channel))
    }

    pub fn set_output_channel(
        &mut self,
        fin: FinId,
        slot: ActuatorSlot,
        channel: Parameter,
        output_channel: OutputChannel,
    ) -> Result<(), MixError> {
        *self.output_channel_mut(fin, slot, channel)? = output_channel;
        Ok(())
    }

    pub fn output_channels(
        &self,
        fin: FinId,
        slot: ActuatorSlot,
    ) -> Result<OutputChannels, MixError> {
        Ok(self.actuator(fin, slot)?.output_channels())
    }

    pub fn set_output_channels(
        &mut self,
        fin: FinId,
        slot: ActuatorSlot,
        channels: OutputChannels,
    ) -> Result<(), MixError> {
        self.fin_mut(fin)?
            .actuator_mut(slot)
            .set_output_channels(channels);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Coefficients
    // ------------------------------------------------------------------

    pub fn coefficient(
        &self,
        fin: FinId,
        slot: ActuatorSlot,
        channel: Parameter,
        id: CoefficientId,
    ) -> Result<&Connection, MixError> {
        self.output_channel(fin, slot, channel)?
            .coefficient(id)
            .ok_or_else(|| coefficient_err(fin, slot, channel, id))
    }

    pub fn set_coefficient(
        &mut self,
        fin: FinId,
        slot: ActuatorSlot,
        channel: Parameter,
        id: CoefficientId,
        connection: Connection,
    ) -> Result<(), MixError> {
        let target = self
            .output_channel_mut(fin, slot, channel)?
            .coefficient_mut(id)
            .ok_or_else(|| coefficient_err(fin, slot, channel, id))?;
        *target = connection;
        Ok(())
    }

    pub fn coefficients(
        &self,
        fin: FinId,
        slot: ActuatorSlot,
        channel: Parameter,
    ) -> Result<&[Connection], MixError> {
        Ok(&self.output_channel(fin, slot, channel)?.connections)
    }

    /// Replace all connections of an output channel, keeping its constant
    pub fn set_coefficients(
        &mut self,
        fin: FinId,
        slot: ActuatorSlot,
        channel: Parameter,
        connections: Vec<Connection>,
    ) -> Result<(), MixError> {
        self.output_channel_mut(fin, slot, channel)?.connections = connections;
        Ok(())
    }

    /// Append a connection, returning its coefficient id
    pub fn connect(
        &mut self,
        fin: FinId,
        slot: ActuatorSlot,
        channel: Parameter,
        connection: Connection,
    ) -> Result<CoefficientId, MixError> {
        let output = self.output_channel_mut(fin, slot, channel)?;
        Ok(output.connect(connection.input, connection.function))
    }

    /// Remove the connection at ordinal position `id`
    pub fn disconnect(
        &mut self,
        fin: FinId,
        slot: ActuatorSlot,
        channel: Parameter,
        id: CoefficientId,
    ) -> Result<Connection, MixError> {
        self.output_channel_mut(fin, slot, channel)?
            .disconnect(id)
            .ok_or_else(|| coefficient_err(fin, slot, channel, id))
    }

    // ------------------------------------------------------------------
    // Evaluation order
    // ------------------------------------------------------------------

    /// Assigned actuators by fin position ascending, pitch before flap
    pub fn assigned(&self) -> impl Iterator<Item = (FinId, ActuatorSlot, &Actuator)> {
        self.fins()
            .enumerate()
            .flat_map(|(id, fin)| fin.assigned().map(move |(slot, a)| (id, slot, a)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::Shape;

    fn tagged_fin(servo: i32) -> Fin {
        Fin::new(Actuator::new(servo), Actuator::default())
    }

    #[test]
    fn test_add_returns_sequential_ids() {
        let mut registry = FinRegistry::new();
        assert_eq!(registry.add_fin(tagged_fin(10)), 0);
        assert_eq!(registry.add_fin(tagged_fin(11)), 1);
        assert_eq!(registry.add_fin(tagged_fin(12)), 2);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_remove_shifts_ids() {
        let mut registry = FinRegistry::new();
        registry.add_fin(tagged_fin(10));
        registry.add_fin(tagged_fin(11));
        registry.add_fin(tagged_fin(12));

        let removed = registry.remove_fin(0).unwrap();
        assert_eq!(removed.pitch.servo, 10);
        assert_eq!(registry.fin(0).unwrap().pitch.servo, 11);
        assert_eq!(registry.fin(1).unwrap().pitch.servo, 12);
        assert!(registry.fin(2).is_err());
    }

    #[test]
    fn test_out_of_range_leaves_state_unchanged() {
        let mut registry = FinRegistry::new();
        registry.add_fin(tagged_fin(1));
        let before = registry.to_vec();

        assert_eq!(registry.remove_fin(1).unwrap_err(), MixError::FinNotFound(1));
        assert!(registry.set_fin(3, tagged_fin(9)).is_err());
        assert!(registry
            .connect(2, ActuatorSlot::Pitch, Parameter::Phase, Connection::identity(0))
            .is_err());
        assert_eq!(registry.to_vec(), before);
    }

    #[test]
    fn test_set_fin_replaces_everything() {
        let mut registry = FinRegistry::new();
        registry.add_fin(tagged_fin(1));
        registry
            .connect(0, ActuatorSlot::Pitch, Parameter::Amplitude, Connection::identity(0))
            .unwrap();

        registry.set_fin(0, tagged_fin(2)).unwrap();
        let fin = registry.fin(0).unwrap();
        assert_eq!(fin.pitch.servo, 2);
        assert_eq!(fin.pitch.amplitude.coefficient_count(), 0);
    }

    #[test]
    fn test_set_fins_resizes() {
        let mut registry = FinRegistry::new();
        registry.add_fin(tagged_fin(1));
        registry.add_fin(tagged_fin(2));
        registry.add_fin(tagged_fin(3));
        let kept = registry.handle(0).unwrap();
        let dropped = registry.handle(2).unwrap();

        registry.set_fins(vec![tagged_fin(7), tagged_fin(8)]).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.fin(1).unwrap().pitch.servo, 8);
        assert_eq!(registry.position_of(kept), Some(0));
        assert_eq!(registry.position_of(dropped), None);

        registry
            .set_fins(vec![tagged_fin(1), tagged_fin(2), tagged_fin(3), tagged_fin(4)])
            .unwrap();
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.fin(3).unwrap().pitch.servo, 4);

        registry.set_fins(Vec::new()).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_handles_survive_other_removals() {
        let mut registry = FinRegistry::new();
        registry.add_fin(tagged_fin(1));
        registry.add_fin(tagged_fin(2));
        let second = registry.handle(1).unwrap();

        registry.remove_fin(0).unwrap();
        assert_eq!(registry.position_of(second), Some(0));
        assert_eq!(registry.fin_by_handle(second).unwrap().pitch.servo, 2);

        registry.remove_fin(0).unwrap();
        assert_eq!(registry.position_of(second), None);
        assert!(registry.fin_by_handle(second).is_none());
    }

    #[test]
    fn test_connect_and_disconnect() {
        let mut registry = FinRegistry::new();
        registry.add_fin(Fin::default());
        let slot = ActuatorSlot::Flap;
        let p = Parameter::Frequency;

        assert_eq!(registry.connect(0, slot, p, Connection::new(3, Shape::Ramp)).unwrap(), 0);
        assert_eq!(registry.connect(0, slot, p, Connection::new(1, Shape::Step)).unwrap(), 1);

        let removed = registry.disconnect(0, slot, p, 0).unwrap();
        assert_eq!(removed.input, 3);
        assert_eq!(registry.coefficient(0, slot, p, 0).unwrap().input, 1);

        let err = registry.disconnect(0, slot, p, 1).unwrap_err();
        assert_eq!(
            err,
            MixError::CoefficientNotFound {
                fin: 0,
                actuator: 1,
                channel: 0,
                id: 1
            }
        );
    }

    #[test]
    fn test_coefficient_accessors() {
        let mut registry = FinRegistry::new();
        registry.add_fin(Fin::default());
        let slot = ActuatorSlot::Pitch;
        let p = Parameter::Offset;

        registry
            .set_coefficients(0, slot, p, vec![Connection::identity(0), Connection::identity(1)])
            .unwrap();
        registry
            .set_coefficient(0, slot, p, 1, Connection::new(5, Shape::Absolute))
            .unwrap();
        let all = registry.coefficients(0, slot, p).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1], Connection::new(5, Shape::Absolute));
        assert!(registry
            .set_coefficient(0, slot, p, 2, Connection::identity(0))
            .is_err());
    }

    #[test]
    fn test_output_channel_accessors() {
        let mut registry = FinRegistry::new();
        registry.add_fin(Fin::default());
        registry
            .set_output_channel(0, ActuatorSlot::Pitch, Parameter::Amplitude, OutputChannel::new(0.5))
            .unwrap();
        assert_eq!(
            registry
                .output_channel(0, ActuatorSlot::Pitch, Parameter::Amplitude)
                .unwrap()
                .constant,
            0.5
        );
        let channels = registry.output_channels(0, ActuatorSlot::Pitch).unwrap();
        registry
            .set_output_channels(0, ActuatorSlot::Flap, channels)
            .unwrap();
        assert_eq!(registry.fin(0).unwrap().flap.amplitude.constant, 0.5);
    }

    #[test]
    fn test_assigned_order() {
        let mut registry = FinRegistry::new();
        registry.add_fin(Fin::new(Actuator::new(0), Actuator::new(1)));
        registry.add_fin(Fin::new(Actuator::default(), Actuator::default()));
        registry.add_fin(Fin::new(Actuator::default(), Actuator::new(2)));

        let order: Vec<_> = registry
            .assigned()
            .map(|(fin, slot, a)| (fin, slot, a.servo))
            .collect();
        assert_eq!(
            order,
            vec![
                (0, ActuatorSlot::Pitch, 0),
                (0, ActuatorSlot::Flap, 1),
                (2, ActuatorSlot::Flap, 2),
            ]
        );
    }
}
