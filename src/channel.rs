//! Output Channels
//!
//! An output channel computes one scalar actuator parameter as a constant
//! multiplied by the shaped values of its connected inputs. Connections are
//! held in insertion order and addressed by ordinal position only.

use crate::error::MixError;
use crate::transfer::TransferFunction;
use serde::{Deserialize, Serialize};

/// Ordinal position of a connection within its output channel
pub type CoefficientId = usize;

/// One shaped input feeding an output channel's product
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Connection {
    /// Index into the input sample
    pub input: usize,

    #[serde(default)]
    pub function: TransferFunction,
}

impl Connection {
    pub fn new(input: usize, function: impl Into<TransferFunction>) -> Self {
        Self {
            input,
            function: function.into(),
        }
    }

    /// Identity-shaped connection
    pub fn identity(input: usize) -> Self {
        Self::new(input, TransferFunction::IDENTITY)
    }

    /// Shaped value of this connection for an input sample
    pub fn evaluate(&self, inputs: &[f64]) -> Result<f64, MixError> {
        let x = inputs
            .get(self.input)
            .copied()
            .ok_or(MixError::IndexOutOfRange {
                index: self.input,
                len: inputs.len(),
            })?;
        Ok(self.function.evaluate(x))
    }
}

/// Constant times the product of shaped input connections
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OutputChannel {
    #[serde(default)]
    pub constant: f64,

    #[serde(default)]
    pub connections: Vec<Connection>,
}

impl OutputChannel {
    pub fn new(constant: f64) -> Self {
        Self {
            constant,
            connections: Vec::new(),
        }
    }

    /// Builder-style connect
    pub fn with(mut self, connection: Connection) -> Self {
        self.connections.push(connection);
        self
    }

    /// Evaluate the channel for one input sample
    pub fn evaluate(&self, inputs: &[f64]) -> Result<f64, MixError> {
        self.connections
            .iter()
            .try_fold(self.constant, |acc, c| Ok(acc * c.evaluate(inputs)?))
    }

    /// Append a connection, returning its coefficient id
    pub fn connect(&mut self, input: usize, function: impl Into<TransferFunction>) -> CoefficientId {
        self.connections.push(Connection::new(input, function));
        self.connections.len() - 1
    }

    /// Remove the connection at ordinal position `id`
    ///
    /// Later connections move down by one position.
    pub fn disconnect(&mut self, id: CoefficientId) -> Option<Connection> {
        if id >= self.connections.len() {
            return None;
        }
        Some(self.connections.remove(id))
    }

    pub fn coefficient(&self, id: CoefficientId) -> Option<&Connection> {
        self.connections.get(id)
    }

    pub fn coefficient_mut(&mut self, id: CoefficientId) -> Option<&mut Connection> {
        self.connections.get_mut(id)
    }

    pub fn coefficient_count(&self) -> usize {
        self.connections.len()
    }

    /// Largest input index referenced, if any connection exists
    pub fn max_input(&self) -> Option<usize> {
        self.connections.iter().map(|c| c.input).max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::Shape;
    use approx::assert_relative_eq;

    #[test]
    fn test_constant_only() {
        let channel = OutputChannel::new(2.5);
        assert_eq!(channel.evaluate(&[]).unwrap(), 2.5);
        assert_eq!(channel.evaluate(&[1.0, -4.0, 9.0]).unwrap(), 2.5);
    }

    #[test]
    fn test_default_is_zero() {
        let channel = OutputChannel::default();
        assert_eq!(channel.evaluate(&[0.3]).unwrap(), 0.0);
    }

    #[test]
    fn test_inverted_square() {
        let channel = OutputChannel::new(2.0).with(Connection::new(
            1,
            TransferFunction::new(Shape::Square).inverted_arguments(),
        ));
        assert_eq!(channel.evaluate(&[0.0, 3.0]).unwrap(), 18.0);
    }

    #[test]
    fn test_product_of_connections() {
        let mut channel = OutputChannel::new(0.5);
        channel.connect(0, Shape::Identity);
        channel.connect(2, Shape::Absolute);
        assert_relative_eq!(
            channel.evaluate(&[0.4, 9.0, -3.0]).unwrap(),
            0.6,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_out_of_range_input_fails() {
        let channel = OutputChannel::new(1.0).with(Connection::identity(3));
        let err = channel.evaluate(&[1.0, 2.0]).unwrap_err();
        assert_eq!(err, MixError::IndexOutOfRange { index: 3, len: 2 });
    }

    #[test]
    fn test_connect_returns_ordinal() {
        let mut channel = OutputChannel::new(1.0);
        assert_eq!(channel.connect(4, Shape::Ramp), 0);
        assert_eq!(channel.connect(4, Shape::Step), 1);
        assert_eq!(channel.connect(0, Shape::Identity), 2);
        assert_eq!(channel.coefficient_count(), 3);
        assert_eq!(channel.max_input(), Some(4));
    }

    #[test]
    fn test_disconnect_by_position() {
        // Input indices deliberately differ from ordinal positions.
        let mut channel = OutputChannel::new(1.0);
        channel.connect(2, Shape::Ramp);
        channel.connect(0, Shape::Step);
        channel.connect(1, Shape::Square);

        let removed = channel.disconnect(0).unwrap();
        assert_eq!(removed.input, 2);
        assert_eq!(channel.coefficient(0).unwrap().input, 0);
        assert_eq!(channel.coefficient(1).unwrap().input, 1);
        assert!(channel.disconnect(2).is_none());
        assert_eq!(channel.coefficient_count(), 2);
    }
}
