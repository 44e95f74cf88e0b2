//! Typed reads and writes of one channel element.
//!
//! Elements live in the arena as native-endian bytes of their declared
//! [`BaseType`]. Access is a plain type switch on that base type:
//!
//! - float channels (half, float, double) convert numerically to and from
//!   the requested `f32`/`u32`;
//! - integer channels hold bit patterns, never numbers to convert: a `u32`
//!   view is the stored bits zero-extended (or truncated) to 32 bits, and an
//!   `f32` view is those same 32 bits reinterpreted with [`f32::from_bits`].
//!
//! Writes are symmetric. A `u32` or the `to_bits()` of an `f32` is narrowed
//! to the integer channel's width.

use half::f16;
use vfx_core::BaseType;

macro_rules! load {
    ($ty:ty, $bytes:expr) => {{
        let mut raw = [0u8; std::mem::size_of::<$ty>()];
        raw.copy_from_slice(&$bytes[..std::mem::size_of::<$ty>()]);
        <$ty>::from_ne_bytes(raw)
    }};
}

macro_rules! store {
    ($value:expr, $bytes:expr) => {{
        let raw = $value.to_ne_bytes();
        $bytes[..raw.len()].copy_from_slice(&raw);
    }};
}

/// Reads an element as `f32`.
///
/// Integer elements are reinterpreted, not converted.
#[inline]
pub fn read_f32(ty: BaseType, bytes: &[u8]) -> f32 {
    match ty {
        BaseType::Half => load!(f16, bytes).to_f32(),
        BaseType::Float => load!(f32, bytes),
        BaseType::Double => load!(f64, bytes) as f32,
        BaseType::UInt8
        | BaseType::Int8
        | BaseType::UInt16
        | BaseType::Int16
        | BaseType::UInt32
        | BaseType::Int32
        | BaseType::UInt64
        | BaseType::Int64 => f32::from_bits(read_bits(ty, bytes)),
    }
}

/// Reads an element as `u32`.
///
/// Integer elements keep their bit pattern, zero-extended or truncated to
/// 32 bits.
#[inline]
pub fn read_u32(ty: BaseType, bytes: &[u8]) -> u32 {
    match ty {
        BaseType::Half => float_to_u32(load!(f16, bytes).to_f32() as f64),
        BaseType::Float => float_to_u32(load!(f32, bytes) as f64),
        BaseType::Double => float_to_u32(load!(f64, bytes)),
        BaseType::UInt8
        | BaseType::Int8
        | BaseType::UInt16
        | BaseType::Int16
        | BaseType::UInt32
        | BaseType::Int32
        | BaseType::UInt64
        | BaseType::Int64 => read_bits(ty, bytes),
    }
}

/// Writes an `f32` into an element.
///
/// Integer elements receive `value.to_bits()` narrowed to their width.
#[inline]
pub fn write_f32(ty: BaseType, bytes: &mut [u8], value: f32) {
    match ty {
        BaseType::Half => store!(f16::from_f32(value), bytes),
        BaseType::Float => store!(value, bytes),
        BaseType::Double => store!(value as f64, bytes),
        BaseType::UInt8
        | BaseType::Int8
        | BaseType::UInt16
        | BaseType::Int16
        | BaseType::UInt32
        | BaseType::Int32
        | BaseType::UInt64
        | BaseType::Int64 => write_bits(ty, bytes, value.to_bits()),
    }
}

/// Writes a `u32` into an element.
///
/// Integer elements receive the bit pattern, truncated to their width.
#[inline]
pub fn write_u32(ty: BaseType, bytes: &mut [u8], value: u32) {
    match ty {
        BaseType::Half => store!(f16::from_f32(value as f32), bytes),
        BaseType::Float => store!(value as f32, bytes),
        BaseType::Double => store!(value as f64, bytes),
        BaseType::UInt8
        | BaseType::Int8
        | BaseType::UInt16
        | BaseType::Int16
        | BaseType::UInt32
        | BaseType::Int32
        | BaseType::UInt64
        | BaseType::Int64 => write_bits(ty, bytes, value),
    }
}

#[inline]
fn read_bits(ty: BaseType, bytes: &[u8]) -> u32 {
    match ty {
        BaseType::UInt8 | BaseType::Int8 => bytes[0] as u32,
        BaseType::UInt16 | BaseType::Int16 => load!(u16, bytes) as u32,
        BaseType::UInt64 | BaseType::Int64 => load!(u64, bytes) as u32,
        _ => load!(u32, bytes),
    }
}

#[inline]
fn write_bits(ty: BaseType, bytes: &mut [u8], bits: u32) {
    match ty {
        BaseType::UInt8 | BaseType::Int8 => bytes[0] = bits as u8,
        BaseType::UInt16 | BaseType::Int16 => store!(bits as u16, bytes),
        BaseType::UInt64 | BaseType::Int64 => store!(bits as u64, bytes),
        _ => store!(bits, bytes),
    }
}

#[inline]
fn float_to_u32(v: f64) -> u32 {
    v.round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip_f32(ty: BaseType, v: f32) -> f32 {
        let mut buf = [0u8; 8];
        write_f32(ty, &mut buf, v);
        read_f32(ty, &buf)
    }

    #[test]
    fn test_float_types() {
        assert_eq!(roundtrip_f32(BaseType::Float, 0.1), 0.1);
        assert_eq!(roundtrip_f32(BaseType::Double, 0.1), 0.1);
        assert_eq!(roundtrip_f32(BaseType::Half, 0.5), 0.5);
        assert_eq!(roundtrip_f32(BaseType::Half, 0.1), f16::from_f32(0.1).to_f32());
    }

    #[test]
    fn test_integer_channels_reinterpret_bits() {
        let mut buf = [0u8; 8];
        write_u32(BaseType::UInt32, &mut buf, 16_777_217);
        assert_eq!(read_f32(BaseType::UInt32, &buf).to_bits(), 16_777_217);
        assert_eq!(read_u32(BaseType::UInt32, &buf), 16_777_217);

        write_f32(BaseType::UInt32, &mut buf, 0.5);
        assert_eq!(read_u32(BaseType::UInt32, &buf), 0.5f32.to_bits());
        assert_eq!(read_f32(BaseType::UInt32, &buf), 0.5);

        write_f32(BaseType::Int32, &mut buf, -3.25);
        assert_eq!(read_f32(BaseType::Int32, &buf), -3.25);
    }

    #[test]
    fn test_uint_bits_exact() {
        let mut buf = [0u8; 8];
        write_u32(BaseType::UInt32, &mut buf, u32::MAX - 7);
        assert_eq!(read_u32(BaseType::UInt32, &buf), u32::MAX - 7);

        write_u32(BaseType::Int32, &mut buf, 0xdead_beef);
        assert_eq!(read_u32(BaseType::Int32, &buf), 0xdead_beef);
    }

    #[test]
    fn test_narrow_and_wide_integers() {
        let mut buf = [0u8; 8];
        write_u32(BaseType::UInt8, &mut buf, 0x1ff);
        assert_eq!(buf[0], 0xff);
        assert_eq!(read_u32(BaseType::UInt8, &buf), 0xff);

        write_u32(BaseType::Int16, &mut buf, 0xffff);
        assert_eq!(read_u32(BaseType::Int16, &buf), 0xffff);

        buf = [0xaa; 8];
        write_u32(BaseType::UInt64, &mut buf, 0x1234_5678);
        assert_eq!(u64::from_ne_bytes(buf), 0x1234_5678);
        assert_eq!(read_u32(BaseType::UInt64, &buf), 0x1234_5678);
    }

    #[test]
    fn test_float_read_as_uint() {
        let mut buf = [0u8; 8];
        write_f32(BaseType::Float, &mut buf, 41.6);
        assert_eq!(read_u32(BaseType::Float, &buf), 42);
        write_u32(BaseType::Half, &mut buf, 12);
        assert_eq!(read_f32(BaseType::Half, &buf), 12.0);
    }
}
