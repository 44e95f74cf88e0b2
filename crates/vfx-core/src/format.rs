//! Channel element types.
//!
//! Deep images pack samples whose channels may each use a different storage
//! type (half Z, float color, uint sample ids, ...). This module provides
//! the canonical runtime description of one channel element.
//!
//! # Types
//!
//! - [`BaseType`] - Scalar kind and width (U8 .. U64, I8 .. I64, F16, F32, F64)
//! - [`TypeDesc`] - Element type of one channel, wrapping a [`BaseType`]
//!
//! # Usage
//!
//! ```rust
//! use vfx_core::format::{BaseType, TypeDesc};
//!
//! let z = TypeDesc::FLOAT;
//! assert_eq!(z.size(), 4);
//!
//! let id: TypeDesc = "uint".parse().unwrap();
//! assert_eq!(id.basetype, BaseType::UInt32);
//! assert!(id.is_integer());
//! ```

use std::str::FromStr;

use crate::error::Error;

/// Scalar kind and bit width of a channel element.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BaseType {
    /// 8-bit unsigned integer.
    UInt8,
    /// 8-bit signed integer.
    Int8,
    /// 16-bit unsigned integer.
    UInt16,
    /// 16-bit signed integer.
    Int16,
    /// 32-bit unsigned integer.
    UInt32,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit unsigned integer.
    UInt64,
    /// 64-bit signed integer.
    Int64,
    /// 16-bit half-precision float.
    Half,
    /// 32-bit single-precision float.
    #[default]
    Float,
    /// 64-bit double-precision float.
    Double,
}

impl BaseType {
    /// Every base type, in declaration order.
    pub const ALL: [BaseType; 11] = [
        Self::UInt8,
        Self::Int8,
        Self::UInt16,
        Self::Int16,
        Self::UInt32,
        Self::Int32,
        Self::UInt64,
        Self::Int64,
        Self::Half,
        Self::Float,
        Self::Double,
    ];

    /// Size of one element in bytes.
    #[inline]
    pub const fn size(&self) -> usize {
        match self {
            Self::UInt8 | Self::Int8 => 1,
            Self::UInt16 | Self::Int16 | Self::Half => 2,
            Self::UInt32 | Self::Int32 | Self::Float => 4,
            Self::UInt64 | Self::Int64 | Self::Double => 8,
        }
    }

    /// Number of bits per element.
    #[inline]
    pub const fn bits(&self) -> u32 {
        self.size() as u32 * 8
    }

    /// Whether this is a floating-point type.
    #[inline]
    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Half | Self::Float | Self::Double)
    }

    /// Whether this is an integer type.
    #[inline]
    pub const fn is_integer(&self) -> bool {
        !self.is_float()
    }

    /// Whether this is a signed type. Floats count as signed.
    #[inline]
    pub const fn is_signed(&self) -> bool {
        !matches!(
            self,
            Self::UInt8 | Self::UInt16 | Self::UInt32 | Self::UInt64
        )
    }

    /// Short name, as accepted by [`FromStr`].
    pub const fn name(&self) -> &'static str {
        match self {
            Self::UInt8 => "uint8",
            Self::Int8 => "int8",
            Self::UInt16 => "uint16",
            Self::Int16 => "int16",
            Self::UInt32 => "uint",
            Self::Int32 => "int",
            Self::UInt64 => "uint64",
            Self::Int64 => "int64",
            Self::Half => "half",
            Self::Float => "float",
            Self::Double => "double",
        }
    }
}

impl std::fmt::Display for BaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BaseType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ty = match s.to_ascii_lowercase().as_str() {
            "uint8" | "u8" | "uchar" => Self::UInt8,
            "int8" | "i8" | "char" => Self::Int8,
            "uint16" | "u16" | "ushort" => Self::UInt16,
            "int16" | "i16" | "short" => Self::Int16,
            "uint" | "uint32" | "u32" => Self::UInt32,
            "int" | "int32" | "i32" => Self::Int32,
            "uint64" | "u64" => Self::UInt64,
            "int64" | "i64" => Self::Int64,
            "half" | "f16" => Self::Half,
            "float" | "f32" => Self::Float,
            "double" | "f64" => Self::Double,
            _ => return Err(Error::unknown_type(s)),
        };
        Ok(ty)
    }
}

/// Element type of one channel.
///
/// A thin wrapper over [`BaseType`]: deep channels are always scalar, so
/// there is no aggregate or array information to carry.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TypeDesc {
    /// Scalar kind.
    pub basetype: BaseType,
}

impl TypeDesc {
    /// 8-bit unsigned.
    pub const UINT8: TypeDesc = TypeDesc::new(BaseType::UInt8);
    /// 16-bit unsigned.
    pub const UINT16: TypeDesc = TypeDesc::new(BaseType::UInt16);
    /// 32-bit unsigned, the usual type of id and sample-count channels.
    pub const UINT: TypeDesc = TypeDesc::new(BaseType::UInt32);
    /// 32-bit signed.
    pub const INT: TypeDesc = TypeDesc::new(BaseType::Int32);
    /// Half float.
    pub const HALF: TypeDesc = TypeDesc::new(BaseType::Half);
    /// Single float.
    pub const FLOAT: TypeDesc = TypeDesc::new(BaseType::Float);
    /// Double float.
    pub const DOUBLE: TypeDesc = TypeDesc::new(BaseType::Double);

    /// Creates a type from its base type.
    #[inline]
    pub const fn new(basetype: BaseType) -> Self {
        Self { basetype }
    }

    /// Size of one element in bytes.
    #[inline]
    pub const fn size(&self) -> usize {
        self.basetype.size()
    }

    /// Whether this is a floating-point type.
    #[inline]
    pub const fn is_float(&self) -> bool {
        self.basetype.is_float()
    }

    /// Whether this is an integer type.
    #[inline]
    pub const fn is_integer(&self) -> bool {
        self.basetype.is_integer()
    }
}

impl From<BaseType> for TypeDesc {
    fn from(basetype: BaseType) -> Self {
        Self::new(basetype)
    }
}

impl FromStr for TypeDesc {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<BaseType>().map(Self::new)
    }
}

impl std::fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.basetype.fmt(f)
    }
}
