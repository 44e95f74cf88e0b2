//! Error types for deep data operations.
//!
//! Index errors are caller bugs: every accessor checks its indices and
//! reports them here instead of returning zero or touching foreign samples.

use thiserror::Error;

/// Deep data operation error.
#[derive(Debug, Error)]
pub enum DeepError {
    /// Pixel index past the end of the store.
    #[error("pixel {pixel} out of range for {pixels} pixels")]
    PixelOutOfRange {
        /// Requested pixel
        pixel: usize,
        /// Pixel count of the store
        pixels: usize,
    },

    /// Channel index past the end of the channel table.
    #[error("channel {channel} out of range for {channels} channels")]
    ChannelOutOfRange {
        /// Requested channel
        channel: usize,
        /// Channel count of the store
        channels: usize,
    },

    /// Sample index (or sample range) outside a pixel's active samples.
    #[error("sample {sample} out of range for pixel {pixel} with {samples} samples")]
    SampleOutOfRange {
        /// Pixel addressed
        pixel: usize,
        /// Requested sample index or range end
        sample: usize,
        /// Active sample count of the pixel
        samples: usize,
    },

    /// A bulk array has the wrong length.
    #[error("size mismatch for {what}: expected {expected}, got {actual}")]
    SizeMismatch {
        /// What was being sized
        what: &'static str,
        /// Expected length
        expected: usize,
        /// Supplied length
        actual: usize,
    },

    /// Malformed arguments to `init` and friends.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Two stores do not share the same channel types.
    #[error("channel layouts differ")]
    LayoutMismatch,

    /// The sample arena could not grow.
    #[error("failed to allocate {requested} bytes for deep samples")]
    AllocationFailed {
        /// Bytes requested
        requested: usize,
    },

    /// Error from the core value types.
    #[error(transparent)]
    Core(#[from] vfx_core::Error),
}

/// Result type for deep data operations.
pub type DeepResult<T> = Result<T, DeepError>;

impl DeepError {
    /// Returns `true` for index errors (pixel, channel or sample).
    #[inline]
    pub fn is_out_of_range(&self) -> bool {
        matches!(
            self,
            Self::PixelOutOfRange { .. }
                | Self::ChannelOutOfRange { .. }
                | Self::SampleOutOfRange { .. }
        )
    }
}

