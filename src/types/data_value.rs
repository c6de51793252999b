// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Values exchanged with the server: `Variant`, `DataValue` and the UTC `DateTime` alias.

use std::fmt;

use crate::types::{node_id::NodeId, status_code::StatusCode};

/// Timestamps are always UTC.
pub type DateTime = chrono::DateTime<chrono::Utc>;

/// A `Variant` holds the built-in types that the client passes around as values.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub enum Variant {
    #[default]
    Empty,
    Boolean(bool),
    Byte(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
    String(String),
    DateTime(DateTime),
    ByteString(Vec<u8>),
    NodeId(Box<NodeId>),
    StatusCode(StatusCode),
    Array(Vec<Variant>),
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Variant::Empty => write!(f, "Empty"),
            Variant::Boolean(v) => write!(f, "{}", v),
            Variant::Byte(v) => write!(f, "{}", v),
            Variant::Int16(v) => write!(f, "{}", v),
            Variant::UInt16(v) => write!(f, "{}", v),
            Variant::Int32(v) => write!(f, "{}", v),
            Variant::UInt32(v) => write!(f, "{}", v),
            Variant::Int64(v) => write!(f, "{}", v),
            Variant::UInt64(v) => write!(f, "{}", v),
            Variant::Float(v) => write!(f, "{}", v),
            Variant::Double(v) => write!(f, "{}", v),
            Variant::String(v) => write!(f, "{}", v),
            Variant::DateTime(v) => write!(f, "{}", v.to_rfc3339()),
            Variant::ByteString(v) => write!(f, "ByteString[{}]", v.len()),
            Variant::NodeId(v) => write!(f, "{}", v),
            Variant::StatusCode(v) => write!(f, "{}", v),
            Variant::Array(v) => {
                write!(f, "[")?;
                for (i, e) in v.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                write!(f, "]")
            }
        }
    }
}

macro_rules! from_primitive {
    ( $( $t:ty => $v:ident ),* ) => {
        $(
            impl From<$t> for Variant {
                fn from(v: $t) -> Self {
                    Variant::$v(v)
                }
            }
        )*
    }
}

from_primitive!(
    bool => Boolean,
    u8 => Byte,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f32 => Float,
    f64 => Double,
    String => String,
    DateTime => DateTime,
    StatusCode => StatusCode
);

impl<'a> From<&'a str> for Variant {
    fn from(v: &'a str) -> Self {
        Variant::String(v.to_string())
    }
}

impl From<NodeId> for Variant {
    fn from(v: NodeId) -> Self {
        Variant::NodeId(Box::new(v))
    }
}

impl Variant {
    /// Tests if the variant holds nothing.
    pub fn is_empty(&self) -> bool {
        matches!(self, Variant::Empty)
    }

    /// Widening conversion to u32 for the integral types, used when reading server limits.
    pub fn as_u32(&self) -> Option<u32> {
        match *self {
            Variant::Byte(v) => Some(v as u32),
            Variant::UInt16(v) => Some(v as u32),
            Variant::UInt32(v) => Some(v),
            Variant::Int16(v) if v >= 0 => Some(v as u32),
            Variant::Int32(v) if v >= 0 => Some(v as u32),
            Variant::UInt64(v) => u32::try_from(v).ok(),
            Variant::Int64(v) => u32::try_from(v).ok(),
            _ => None,
        }
    }

    /// Returns the value as an i32 for integral types that fit, used for enumerations.
    pub fn as_i32(&self) -> Option<i32> {
        match *self {
            Variant::Byte(v) => Some(v as i32),
            Variant::Int16(v) => Some(v as i32),
            Variant::UInt16(v) => Some(v as i32),
            Variant::Int32(v) => Some(v),
            Variant::UInt32(v) => i32::try_from(v).ok(),
            Variant::Int64(v) => i32::try_from(v).ok(),
            _ => None,
        }
    }
}

/// A data value is a value of a variable in the OPC UA server and contains information about its
/// value, status and change timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DataValue {
    /// The value. BaseDataType
    pub value: Option<Variant>,
    /// The status associated with the value.
    pub status: Option<StatusCode>,
    /// The source timestamp associated with the value.
    pub source_timestamp: Option<DateTime>,
    /// The number of 10 picosecond intervals for the source timestamp.
    pub source_picoseconds: Option<u16>,
    /// The server timestamp associated with the value.
    pub server_timestamp: Option<DateTime>,
    /// The number of 10 picosecond intervals for the server timestamp.
    pub server_picoseconds: Option<u16>,
}

impl<T> From<T> for DataValue
where
    T: Into<Variant>,
{
    fn from(v: T) -> Self {
        DataValue::new_now(v)
    }
}

impl DataValue {
    /// Creates a data value from the supplied value with the source and server timestamps set to now.
    pub fn new_now<V>(value: V) -> DataValue
    where
        V: Into<Variant>,
    {
        let now = chrono::Utc::now();
        DataValue {
            value: Some(value.into()),
            status: Some(StatusCode::Good),
            source_timestamp: Some(now),
            source_picoseconds: None,
            server_timestamp: Some(now),
            server_picoseconds: None,
        }
    }

    /// Creates an empty DataValue carrying only a status.
    pub fn null_with_status(status: StatusCode) -> DataValue {
        DataValue {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Returns the status code or Good if there is no code on the value
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::Good)
    }

    /// Test if the value held by this data value is known to be good
    pub fn is_valid(&self) -> bool {
        self.status().is_good()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_defaults_to_good() {
        let dv = DataValue::default();
        assert_eq!(dv.status(), StatusCode::Good);
        assert!(DataValue::from(10i32).is_valid());
        assert!(!DataValue::null_with_status(StatusCode::BadNodeIdUnknown).is_valid());
    }

    #[test]
    fn integral_conversions() {
        assert_eq!(Variant::from(7u16).as_u32(), Some(7));
        assert_eq!(Variant::from(-1i32).as_u32(), None);
        assert_eq!(Variant::from(u64::MAX).as_u32(), None);
        assert_eq!(Variant::from(3i64).as_i32(), Some(3));
        assert_eq!(Variant::from("x").as_i32(), None);
    }

    #[test]
    fn display_array() {
        let v = Variant::Array(vec![1i32.into(), "a".into(), Variant::Empty]);
        assert_eq!(v.to_string(), "[1, a, Empty]");
    }
}
