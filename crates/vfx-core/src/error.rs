//! Error types for vfx-core operations.
//!
//! These cover the shared value types: parsing channel element types and
//! validating an [`ImageSpec`](crate::spec::ImageSpec) before a deep store is
//! shaped from it.
//!
//! # Usage
//!
//! ```rust
//! use vfx_core::{Error, ImageSpec, TypeDesc};
//!
//! let spec = ImageSpec::deep(4, 4, &["R", "A", "Z"], TypeDesc::FLOAT);
//! assert!(spec.validate().is_ok());
//!
//! let err = Error::channel_mismatch(3, 2);
//! assert!(err.to_string().contains("3"));
//! ```

use thiserror::Error;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the core value types.
#[derive(Debug, Error)]
pub enum Error {
    /// Channel count disagrees with the number of names or formats given.
    #[error("channel mismatch: expected {expected}, got {got}")]
    ChannelMismatch {
        /// Declared channel count
        expected: usize,
        /// Number of entries actually supplied
        got: usize,
    },

    /// Image dimensions cannot describe a pixel grid.
    #[error("invalid dimensions: {width}x{height}x{depth} ({reason})")]
    InvalidDimensions {
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
        /// Requested depth
        depth: u32,
        /// Why the dimensions are invalid
        reason: String,
    },

    /// A type name that does not name any [`BaseType`](crate::format::BaseType).
    #[error("unknown channel type: {0}")]
    UnknownType(String),

    /// Two channels share a name.
    #[error("duplicate channel name: {0}")]
    DuplicateChannel(String),
}

impl Error {
    /// Creates an [`Error::ChannelMismatch`] error.
    #[inline]
    pub fn channel_mismatch(expected: usize, got: usize) -> Self {
        Self::ChannelMismatch { expected, got }
    }

    /// Creates an [`Error::InvalidDimensions`] error.
    #[inline]
    pub fn invalid_dimensions(width: u32, height: u32, depth: u32, reason: impl Into<String>) -> Self {
        Self::InvalidDimensions {
            width,
            height,
            depth,
            reason: reason.into(),
        }
    }

    /// Creates an [`Error::UnknownType`] error.
    #[inline]
    pub fn unknown_type(name: impl Into<String>) -> Self {
        Self::UnknownType(name.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_mismatch() {
        let err = Error::channel_mismatch(5, 3);
        let msg = err.to_string();
        assert!(msg.contains('5'));
        assert!(msg.contains('3'));
    }

    #[test]
    fn test_invalid_dimensions() {
        let err = Error::invalid_dimensions(0, 10, 1, "zero width");
        assert!(err.to_string().contains("0x10x1"));
        assert!(err.to_string().contains("zero width"));
    }
}
