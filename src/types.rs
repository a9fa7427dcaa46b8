//! Signal element types, state bits and typed values.
//!
//! Every signal in a memory block starts with one state byte followed by
//! the value in little-endian byte order:
//!
//! ```text
//!   addr      addr+1 ...
//!   ┌───────┬─────────────────────┐
//!   │ state │ value (n × size)    │   numeric, n elements
//!   └───────┴─────────────────────┘
//!   ┌───────┐
//!   │ state │                         boolean scalar: value is bit 7
//!   └───────┘
//!   ┌───────┬──────────────┐
//!   │ state │ (n+7)/8 bits │          boolean array
//!   └───────┴──────────────┘
//!   ┌───────┬──────────────┐
//!   │ state │ n bytes, NUL │          string
//!   └───────┴──────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Malformed;

/// Element type of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalType {
    Boolean,
    Char,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    Float,
    Double,
    Str,
}

impl SignalType {
    /// Look up a type by the name used in info blocks ("ushort", "float" ...).
    pub fn from_name(name: &str) -> Result<Self, Malformed> {
        Ok(match name {
            "boolean" => Self::Boolean,
            "char" => Self::Char,
            "uchar" => Self::UChar,
            "short" => Self::Short,
            "ushort" => Self::UShort,
            "int" => Self::Int,
            "uint" => Self::UInt,
            "long" | "int64" => Self::Long,
            "float" => Self::Float,
            "double" => Self::Double,
            "str" => Self::Str,
            _ => return Err(Malformed::UnknownType),
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Char => "char",
            Self::UChar => "uchar",
            Self::Short => "short",
            Self::UShort => "ushort",
            Self::Int => "int",
            Self::UInt => "uint",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
            Self::Str => "str",
        }
    }

    /// Size of one element in bytes.  Booleans are bit-packed, strings are
    /// counted per byte.
    pub const fn size(self) -> usize {
        match self {
            Self::Boolean | Self::Char | Self::UChar | Self::Str => 1,
            Self::Short | Self::UShort => 2,
            Self::Int | Self::UInt | Self::Float => 4,
            Self::Long | Self::Double => 8,
        }
    }

    /// Bytes a signal of `n` elements occupies in a memory block, state byte
    /// included.
    pub const fn footprint(self, n: usize) -> usize {
        let n = if n < 1 { 1 } else { n };
        match self {
            Self::Boolean if n == 1 => 1,
            Self::Boolean => n.div_ceil(8) + 1,
            Self::Str => n.saturating_add(1),
            _ => n.saturating_mul(self.size()).saturating_add(1),
        }
    }
}

impl core::fmt::Display for SignalType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// State bits
// ---------------------------------------------------------------------------

/// Bits of the state byte preceding every signal value.
pub mod state {
    /// Value is live: the memory block is connected.
    pub const CONNECTED: u8 = 0x01;
    /// Warning level.
    pub const YELLOW: u8 = 0x02;
    /// Error level.
    pub const ORANGE: u8 = 0x04;
    /// Fault level (yellow | orange).
    pub const RED: u8 = 0x06;
    /// Value of a scalar boolean signal.
    pub const BOOLEAN_VALUE: u8 = 0x80;
}

// ---------------------------------------------------------------------------
// Typed values
// ---------------------------------------------------------------------------

/// A signal value as read from or written to a memory block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SignalValue {
    /// The signal could not be resolved, or its block is gone.
    Unavailable,
    Boolean(bool),
    Char(i8),
    UChar(u8),
    Short(i16),
    UShort(u16),
    Int(i32),
    UInt(u32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
    /// Elements of an array signal, all of the signal's element type.
    Array(Vec<SignalValue>),
}

impl SignalValue {
    pub fn is_available(&self) -> bool {
        !matches!(self, Self::Unavailable)
    }

    /// Integer view of a scalar; unavailable or non-numeric values read as 0.
    pub fn as_i64(&self) -> i64 {
        match self {
            Self::Boolean(b) => i64::from(*b),
            Self::Char(v) => i64::from(*v),
            Self::UChar(v) => i64::from(*v),
            Self::Short(v) => i64::from(*v),
            Self::UShort(v) => i64::from(*v),
            Self::Int(v) => i64::from(*v),
            Self::UInt(v) => i64::from(*v),
            Self::Long(v) => *v,
            Self::Float(v) => *v as i64,
            Self::Double(v) => *v as i64,
            Self::Str(s) => s.trim().parse().unwrap_or(0),
            Self::Unavailable | Self::Array(_) => 0,
        }
    }

    /// Floating point view of a scalar; unavailable reads as 0.0.
    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Float(v) => f64::from(*v),
            Self::Double(v) => *v,
            Self::Str(s) => s.trim().parse().unwrap_or(0.0),
            other => other.as_i64() as f64,
        }
    }

    /// Convert to the given element type.  Strings and arrays are only
    /// converted to themselves.
    pub fn coerce(&self, ty: SignalType) -> SignalValue {
        match (ty, self) {
            (_, Self::Unavailable) => Self::Unavailable,
            (SignalType::Str, Self::Str(s)) => Self::Str(s.clone()),
            (SignalType::Str, v) => Self::Str(match v {
                Self::Float(_) | Self::Double(_) => v.as_f64().to_string(),
                _ => v.as_i64().to_string(),
            }),
            (_, Self::Array(items)) => {
                Self::Array(items.iter().map(|v| v.coerce(ty)).collect())
            }
            (SignalType::Boolean, v) => Self::Boolean(v.as_i64() != 0 || v.as_f64() != 0.0),
            (SignalType::Char, v) => Self::Char(v.as_i64() as i8),
            (SignalType::UChar, v) => Self::UChar(v.as_i64() as u8),
            (SignalType::Short, v) => Self::Short(v.as_i64() as i16),
            (SignalType::UShort, v) => Self::UShort(v.as_i64() as u16),
            (SignalType::Int, v) => Self::Int(v.as_i64() as i32),
            (SignalType::UInt, v) => Self::UInt(v.as_i64() as u32),
            (SignalType::Long, v) => Self::Long(v.as_i64()),
            (SignalType::Float, v) => Self::Float(v.as_f64() as f32),
            (SignalType::Double, v) => Self::Double(v.as_f64()),
        }
    }
}
