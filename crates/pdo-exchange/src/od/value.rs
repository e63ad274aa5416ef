// crates/pdo-exchange/src/od/value.rs
use core::convert::TryInto;
use core::fmt;

/// Wire type of a register, used to decode process-data slices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Boolean,
    Integer8,
    Integer16,
    Integer32,
    Integer64,
    Unsigned8,
    Unsigned16,
    Unsigned32,
    Unsigned64,
    Real32,
    Real64,
    /// Fixed-length raw bytes.
    OctetString(usize),
}

impl DataType {
    /// Number of bytes the type occupies in a process-data image.
    pub fn byte_width(&self) -> usize {
        match self {
            DataType::Boolean | DataType::Integer8 | DataType::Unsigned8 => 1,
            DataType::Integer16 | DataType::Unsigned16 => 2,
            DataType::Integer32 | DataType::Unsigned32 | DataType::Real32 => 4,
            DataType::Integer64 | DataType::Unsigned64 | DataType::Real64 => 8,
            DataType::OctetString(len) => *len,
        }
    }
}

/// A decoded register value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Value {
    Boolean(bool),
    Integer8(i8),
    Integer16(i16),
    Integer32(i32),
    Integer64(i64),
    Unsigned8(u8),
    Unsigned16(u16),
    Unsigned32(u32),
    Unsigned64(u64),
    Real32(f32),
    Real64(f64),
    OctetString(Vec<u8>),
}

/// Errors raised while converting between bytes and values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// The slice does not hold enough bytes for the type.
    BufferTooShort { expected: usize, actual: usize },
    /// The value variant does not match the register's data type.
    TypeMismatch { expected: DataType },
    /// The encoded value does not fill its slot in the process image exactly.
    LengthMismatch { expected: usize, actual: usize },
}

impl fmt::Display for ValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferTooShort { expected, actual } => write!(
                f,
                "Buffer too short: need {} bytes, got {}",
                expected, actual
            ),
            Self::TypeMismatch { expected } => {
                write!(f, "Value does not match register type {:?}", expected)
            }
            Self::LengthMismatch { expected, actual } => write!(
                f,
                "Encoded value is {} bytes, the mapped slot holds {}",
                actual, expected
            ),
        }
    }
}

impl std::error::Error for ValueError {}

impl Value {
    /// Serializes the value into its little-endian process-data representation.
    pub fn serialize(&self) -> Vec<u8> {
        match self {
            Value::Boolean(v) => vec![u8::from(*v)],
            Value::Integer8(v) => v.to_le_bytes().to_vec(),
            Value::Integer16(v) => v.to_le_bytes().to_vec(),
            Value::Integer32(v) => v.to_le_bytes().to_vec(),
            Value::Integer64(v) => v.to_le_bytes().to_vec(),
            Value::Unsigned8(v) => v.to_le_bytes().to_vec(),
            Value::Unsigned16(v) => v.to_le_bytes().to_vec(),
            Value::Unsigned32(v) => v.to_le_bytes().to_vec(),
            Value::Unsigned64(v) => v.to_le_bytes().to_vec(),
            Value::Real32(v) => v.to_le_bytes().to_vec(),
            Value::Real64(v) => v.to_le_bytes().to_vec(),
            Value::OctetString(v) => v.clone(),
        }
    }

    /// Serializes the value after checking it matches `data_type`.
    pub fn serialize_as(&self, data_type: DataType) -> Result<Vec<u8>, ValueError> {
        let matches = matches!(
            (self, data_type),
            (Value::Boolean(_), DataType::Boolean)
                | (Value::Integer8(_), DataType::Integer8)
                | (Value::Integer16(_), DataType::Integer16)
                | (Value::Integer32(_), DataType::Integer32)
                | (Value::Integer64(_), DataType::Integer64)
                | (Value::Unsigned8(_), DataType::Unsigned8)
                | (Value::Unsigned16(_), DataType::Unsigned16)
                | (Value::Unsigned32(_), DataType::Unsigned32)
                | (Value::Unsigned64(_), DataType::Unsigned64)
                | (Value::Real32(_), DataType::Real32)
                | (Value::Real64(_), DataType::Real64)
        );
        match (self, data_type) {
            (Value::OctetString(bytes), DataType::OctetString(len)) if bytes.len() == len => {
                Ok(bytes.clone())
            }
            _ if matches => Ok(self.serialize()),
            _ => Err(ValueError::TypeMismatch {
                expected: data_type,
            }),
        }
    }

    /// Deserializes a little-endian slice into a value of `data_type`.
    ///
    /// Extra trailing bytes are ignored, matching how mapped slices are cut
    /// out of a larger image.
    pub fn deserialize(data: &[u8], data_type: DataType) -> Result<Value, ValueError> {
        let expected = data_type.byte_width();
        if data.len() < expected {
            return Err(ValueError::BufferTooShort {
                expected,
                actual: data.len(),
            });
        }

        macro_rules! deserialize_fixed {
            ($variant:path, $type:ty) => {{
                // Length already checked above.
                let bytes: [u8; core::mem::size_of::<$type>()] = data
                    [..core::mem::size_of::<$type>()]
                    .try_into()
                    .map_err(|_| ValueError::BufferTooShort {
                        expected,
                        actual: data.len(),
                    })?;
                Ok($variant(<$type>::from_le_bytes(bytes)))
            }};
        }

        match data_type {
            DataType::Boolean => Ok(Value::Boolean(data[0] != 0)),
            DataType::Integer8 => deserialize_fixed!(Value::Integer8, i8),
            DataType::Integer16 => deserialize_fixed!(Value::Integer16, i16),
            DataType::Integer32 => deserialize_fixed!(Value::Integer32, i32),
            DataType::Integer64 => deserialize_fixed!(Value::Integer64, i64),
            DataType::Unsigned8 => deserialize_fixed!(Value::Unsigned8, u8),
            DataType::Unsigned16 => deserialize_fixed!(Value::Unsigned16, u16),
            DataType::Unsigned32 => deserialize_fixed!(Value::Unsigned32, u32),
            DataType::Unsigned64 => deserialize_fixed!(Value::Unsigned64, u64),
            DataType::Real32 => deserialize_fixed!(Value::Real32, f32),
            DataType::Real64 => deserialize_fixed!(Value::Real64, f64),
            DataType::OctetString(len) => Ok(Value::OctetString(data[..len].to_vec())),
        }
    }
}
