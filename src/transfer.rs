//! Transfer Functions
//!
//! Scalar shaping functions applied to a single input sample before it enters
//! an output channel's product. A transfer function is a closed shape plus two
//! sign modifiers; evaluation is a single exhaustive match.

use serde::{Deserialize, Serialize};

/// Shape of a transfer function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    /// y = x
    #[default]
    Identity,

    /// y = x for x > 0, else 0
    Ramp,

    /// y = 1 - x for x > 0, else 1
    Slope,

    /// y = 1 for x > 0, else 0
    Step,

    /// y = |x|
    Absolute,

    /// y = x²
    Square,

    /// y = x·e^(x-1) for x > 0, else 0
    Exponential,
}

impl Shape {
    pub const ALL: [Shape; 7] = [
        Shape::Identity,
        Shape::Ramp,
        Shape::Slope,
        Shape::Step,
        Shape::Absolute,
        Shape::Square,
        Shape::Exponential,
    ];

    /// Apply the bare shape, without modifiers
    pub fn apply(&self, x: f64) -> f64 {
        match self {
            Shape::Identity => x,
            Shape::Ramp => {
                if x > 0.0 {
                    x
                } else {
                    0.0
                }
            }
            Shape::Slope => {
                if x > 0.0 {
                    1.0 - x
                } else {
                    1.0
                }
            }
            Shape::Step => {
                if x > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Shape::Absolute => libm::fabs(x),
            Shape::Square => x * x,
            Shape::Exponential => {
                if x > 0.0 {
                    x * libm::exp(x - 1.0)
                } else {
                    0.0
                }
            }
        }
    }

    /// Numeric wire code in the standard table
    pub fn code(&self) -> u8 {
        ShapeCodes::Standard
            .encode(*self)
            .unwrap_or_default()
    }

    /// Decode a numeric wire code from the standard table
    pub fn from_code(code: u8) -> Option<Self> {
        ShapeCodes::Standard.decode(code)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Shape::Identity => "identity",
            Shape::Ramp => "ramp",
            Shape::Slope => "slope",
            Shape::Step => "step",
            Shape::Absolute => "absolute",
            Shape::Square => "square",
            Shape::Exponential => "exponential",
        }
    }
}

/// Numeric code tables for shapes
///
/// Two deployments exist: the standard one carries all seven shapes, the
/// compact one has no `slope` and numbers the remaining shapes densely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeCodes {
    #[default]
    Standard,
    Compact,
}

impl ShapeCodes {
    fn table(&self) -> &'static [Shape] {
        const COMPACT: [Shape; 6] = [
            Shape::Identity,
            Shape::Ramp,
            Shape::Step,
            Shape::Absolute,
            Shape::Square,
            Shape::Exponential,
        ];
        match self {
            ShapeCodes::Standard => &Shape::ALL,
            ShapeCodes::Compact => &COMPACT,
        }
    }

    /// Decode a code, `None` when the table has no such entry
    pub fn decode(&self, code: u8) -> Option<Shape> {
        self.table().get(code as usize).copied()
    }

    /// Encode a shape, `None` when the table cannot express it
    pub fn encode(&self, shape: Shape) -> Option<u8> {
        self.table()
            .iter()
            .position(|&s| s == shape)
            .map(|i| i as u8)
    }
}

/// A shaped, optionally sign-inverted scalar function
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TransferFunction {
    pub shape: Shape,

    /// Negate the argument before shaping
    #[serde(default)]
    pub invert_arguments: bool,

    /// Negate the shaped value
    #[serde(default)]
    pub invert_values: bool,
}

impl TransferFunction {
    pub const IDENTITY: TransferFunction = TransferFunction::new(Shape::Identity);

    pub const fn new(shape: Shape) -> Self {
        Self {
            shape,
            invert_arguments: false,
            invert_values: false,
        }
    }

    pub const fn inverted_arguments(mut self) -> Self {
        self.invert_arguments = true;
        self
    }

    pub const fn inverted_values(mut self) -> Self {
        self.invert_values = true;
        self
    }

    /// Evaluate the function. Total and pure.
    pub fn evaluate(&self, x: f64) -> f64 {
        let x = if self.invert_arguments { -x } else { x };
        let y = self.shape.apply(x);
        if self.invert_values {
            -y
        } else {
            y
        }
    }
}

impl From<Shape> for TransferFunction {
    fn from(shape: Shape) -> Self {
        Self::new(shape)
    }
}
