//! Conversion between dimension values and their on-disk encodings.
//!
//! Every encoding accepts values in `[-1.0, 1.0]`. Floating point encodings
//! store the value as is. Integer encodings are lossy fixed point:
//!
//! - signed: `trunc(v * MAX)`, decoded as `raw / MAX`
//! - unsigned: `trunc((v + 1) * MAX)`, decoded as `raw / MAX - 1`
//!
//! where `MAX` is the largest value of the *signed* type of the same width,
//! for the unsigned encodings too. All encodings are little-endian.

use bytes::{Buf, BufMut};
use dumbvec_error::{DumbvecError, ErrorCodes};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    #[error("Value {value} is outside the encodable range [-1, 1]")]
    ValueOutOfRange { value: f64 },
    #[error("Unsupported vector type code {0}")]
    UnsupportedType(u8),
    #[error("Unsupported vector type `{0}`")]
    UnsupportedTypeName(String),
    #[error("Expected {expected} bytes to decode a {vector_type} value, got {got}")]
    InvalidWidth {
        vector_type: VectorType,
        expected: usize,
        got: usize,
    },
}

impl DumbvecError for CodecError {
    fn code(&self) -> ErrorCodes {
        match self {
            CodecError::ValueOutOfRange { .. } => ErrorCodes::OutOfRange,
            CodecError::UnsupportedType(_) => ErrorCodes::InvalidArgument,
            CodecError::UnsupportedTypeName(_) => ErrorCodes::InvalidArgument,
            CodecError::InvalidWidth { .. } => ErrorCodes::DataLoss,
        }
    }
}

/// The on-disk encoding of every dimension of every vector in an index.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum VectorType {
    #[default]
    Float32 = 0,
    Float64 = 1,
    Int8 = 8,
    Int16 = 9,
    Int32 = 10,
    Uint8 = 16,
    Uint16 = 17,
    Uint32 = 18,
}

impl VectorType {
    pub const ALL: [VectorType; 8] = [
        VectorType::Float32,
        VectorType::Float64,
        VectorType::Int8,
        VectorType::Int16,
        VectorType::Int32,
        VectorType::Uint8,
        VectorType::Uint16,
        VectorType::Uint32,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Bytes per encoded dimension.
    pub fn width(self) -> usize {
        match self {
            VectorType::Float32 => 4,
            VectorType::Float64 => 8,
            VectorType::Int8 | VectorType::Uint8 => 1,
            VectorType::Int16 | VectorType::Uint16 => 2,
            VectorType::Int32 | VectorType::Uint32 => 4,
        }
    }

    /// The fixed-point scale, or `None` for floating point encodings.
    pub fn scale(self) -> Option<f64> {
        match self {
            VectorType::Float32 | VectorType::Float64 => None,
            VectorType::Int8 | VectorType::Uint8 => Some(i8::MAX as f64),
            VectorType::Int16 | VectorType::Uint16 => Some(i16::MAX as f64),
            VectorType::Int32 | VectorType::Uint32 => Some(i32::MAX as f64),
        }
    }

    pub fn is_lossless(self) -> bool {
        self.scale().is_none()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VectorType::Float32 => "float32",
            VectorType::Float64 => "float64",
            VectorType::Int8 => "int8",
            VectorType::Int16 => "int16",
            VectorType::Int32 => "int32",
            VectorType::Uint8 => "uint8",
            VectorType::Uint16 => "uint16",
            VectorType::Uint32 => "uint32",
        }
    }
}

impl TryFrom<u8> for VectorType {
    type Error = CodecError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        VectorType::ALL
            .into_iter()
            .find(|t| t.code() == code)
            .ok_or(CodecError::UnsupportedType(code))
    }
}

impl std::str::FromStr for VectorType {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VectorType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CodecError::UnsupportedTypeName(s.to_string()))
    }
}

impl std::fmt::Display for VectorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Appends the encoding of `value` to `buf`.
pub fn encode_into(
    value: f64,
    vector_type: VectorType,
    buf: &mut impl BufMut,
) -> Result<(), CodecError> {
    // Also rejects NaN.
    if !(-1.0..=1.0).contains(&value) {
        return Err(CodecError::ValueOutOfRange { value });
    }
    match vector_type {
        VectorType::Float32 => buf.put_f32_le(value as f32),
        VectorType::Float64 => buf.put_f64_le(value),
        VectorType::Int8 => buf.put_i8((value * i8::MAX as f64).trunc() as i8),
        VectorType::Int16 => buf.put_i16_le((value * i16::MAX as f64).trunc() as i16),
        VectorType::Int32 => buf.put_i32_le((value * i32::MAX as f64).trunc() as i32),
        VectorType::Uint8 => buf.put_u8(((value + 1.0) * i8::MAX as f64).trunc() as u8),
        VectorType::Uint16 => buf.put_u16_le(((value + 1.0) * i16::MAX as f64).trunc() as u16),
        VectorType::Uint32 => buf.put_u32_le(((value + 1.0) * i32::MAX as f64).trunc() as u32),
    }
    Ok(())
}

pub fn encode(value: f64, vector_type: VectorType) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::with_capacity(vector_type.width());
    encode_into(value, vector_type, &mut buf)?;
    Ok(buf)
}

/// Consumes one encoded value from the front of `buf`.
pub fn decode_from(buf: &mut impl Buf, vector_type: VectorType) -> Result<f64, CodecError> {
    let width = vector_type.width();
    if buf.remaining() < width {
        return Err(CodecError::InvalidWidth {
            vector_type,
            expected: width,
            got: buf.remaining(),
        });
    }
    let value = match vector_type {
        VectorType::Float32 => buf.get_f32_le() as f64,
        VectorType::Float64 => buf.get_f64_le(),
        VectorType::Int8 => buf.get_i8() as f64 / i8::MAX as f64,
        VectorType::Int16 => buf.get_i16_le() as f64 / i16::MAX as f64,
        VectorType::Int32 => buf.get_i32_le() as f64 / i32::MAX as f64,
        VectorType::Uint8 => buf.get_u8() as f64 / i8::MAX as f64 - 1.0,
        VectorType::Uint16 => buf.get_u16_le() as f64 / i16::MAX as f64 - 1.0,
        VectorType::Uint32 => buf.get_u32_le() as f64 / i32::MAX as f64 - 1.0,
    };
    Ok(value)
}

/// Decodes exactly one value; `bytes` must be `vector_type.width()` long.
pub fn decode(bytes: &[u8], vector_type: VectorType) -> Result<f64, CodecError> {
    if bytes.len() != vector_type.width() {
        return Err(CodecError::InvalidWidth {
            vector_type,
            expected: vector_type.width(),
            got: bytes.len(),
        });
    }
    let mut buf = bytes;
    decode_from(&mut buf, vector_type)
}
