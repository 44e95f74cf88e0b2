//! Image specification.
//!
//! [`ImageSpec`] is the "header" a format reader hands to a deep store: the
//! pixel grid dimensions and the channel list, with a name and an element
//! type per channel.
//!
//! # Per-channel formats
//!
//! Deep files routinely mix types, e.g. half color with float depth and a
//! uint id channel. `format` is the default type; `channel_formats`, when
//! non-empty, overrides it channel by channel and must have one entry per
//! channel.
//!
//! ```rust
//! use vfx_core::{ImageSpec, TypeDesc};
//!
//! let mut spec = ImageSpec::deep(64, 32, &["R", "G", "B", "A", "Z"], TypeDesc::HALF);
//! spec.channel_formats = vec![
//!     TypeDesc::HALF,
//!     TypeDesc::HALF,
//!     TypeDesc::HALF,
//!     TypeDesc::HALF,
//!     TypeDesc::FLOAT,
//! ];
//! assert_eq!(spec.image_pixels(), 64 * 32);
//! assert_eq!(spec.channel_format(4), TypeDesc::FLOAT);
//! assert!(spec.validate().is_ok());
//! ```

use crate::error::{Error, Result};
use crate::format::TypeDesc;

/// Image dimensions and channel layout.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageSpec {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Image depth (1 for 2D images)
    pub depth: u32,
    /// Number of channels per pixel
    pub nchannels: usize,
    /// Default element type for every channel
    pub format: TypeDesc,
    /// Per-channel element types; empty means all channels use `format`
    pub channel_formats: Vec<TypeDesc>,
    /// Channel names (e.g., ["R", "G", "B", "A", "Z"])
    pub channel_names: Vec<String>,
    /// Whether pixels hold a variable number of samples
    pub deep: bool,
}

impl ImageSpec {
    /// Creates a flat spec with `nchannels` unnamed channels of `format`.
    pub fn new(width: u32, height: u32, nchannels: usize, format: TypeDesc) -> Self {
        Self {
            width,
            height,
            depth: 1,
            nchannels,
            format,
            channel_formats: Vec::new(),
            channel_names: Vec::new(),
            deep: false,
        }
    }

    /// Creates a deep spec with the given channel names, all of type `format`.
    pub fn deep(width: u32, height: u32, names: &[&str], format: TypeDesc) -> Self {
        let mut spec = Self::new(width, height, names.len(), format);
        spec.channel_names = names.iter().map(|n| n.to_string()).collect();
        spec.deep = true;
        spec
    }

    /// Total number of pixels (`width * height * depth`).
    #[inline]
    pub fn image_pixels(&self) -> u64 {
        self.width as u64 * self.height as u64 * self.depth.max(1) as u64
    }

    /// Element type of channel `c`.
    ///
    /// Falls back to `format` when no per-channel formats are set.
    pub fn channel_format(&self, c: usize) -> TypeDesc {
        self.channel_formats.get(c).copied().unwrap_or(self.format)
    }

    /// Name of channel `c`, or a generated `channel{c}` name when unnamed.
    pub fn channel_name(&self, c: usize) -> String {
        self.channel_names
            .get(c)
            .cloned()
            .unwrap_or_else(|| format!("channel{}", c))
    }

    /// Index of the channel called `name`, if any.
    pub fn channel_index(&self, name: &str) -> Option<usize> {
        self.channel_names.iter().position(|n| n == name)
    }

    /// Per-channel element types, expanded to one entry per channel.
    pub fn all_channel_formats(&self) -> Vec<TypeDesc> {
        (0..self.nchannels).map(|c| self.channel_format(c)).collect()
    }

    /// Channel names, expanded to one entry per channel.
    pub fn all_channel_names(&self) -> Vec<String> {
        (0..self.nchannels).map(|c| self.channel_name(c)).collect()
    }

    /// Checks that names and formats agree with `nchannels` and that names
    /// are unique.
    pub fn validate(&self) -> Result<()> {
        if (self.width == 0) != (self.height == 0) {
            return Err(Error::invalid_dimensions(
                self.width,
                self.height,
                self.depth,
                "one axis is empty",
            ));
        }
        if !self.channel_names.is_empty() && self.channel_names.len() != self.nchannels {
            return Err(Error::channel_mismatch(self.nchannels, self.channel_names.len()));
        }
        if !self.channel_formats.is_empty() && self.channel_formats.len() != self.nchannels {
            return Err(Error::channel_mismatch(self.nchannels, self.channel_formats.len()));
        }
        for (i, name) in self.channel_names.iter().enumerate() {
            if self.channel_names[..i].contains(name) {
                return Err(Error::DuplicateChannel(name.clone()));
            }
        }
        Ok(())
    }
}

impl Default for ImageSpec {
    fn default() -> Self {
        Self::new(0, 0, 0, TypeDesc::FLOAT)
    }
}

impl std::fmt::Display for ImageSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}x{}x{} {} {}ch{}",
            self.width,
            self.height,
            self.depth,
            self.format,
            self.nchannels,
            if self.deep { " deep" } else { "" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_deep() {
        let spec = ImageSpec::deep(10, 20, &["A", "Z"], TypeDesc::FLOAT);
        assert!(spec.deep);
        assert_eq!(spec.nchannels, 2);
        assert_eq!(spec.image_pixels(), 200);
        assert_eq!(spec.channel_index("Z"), Some(1));
        assert_eq!(spec.to_string(), "10x20x1 float 2ch deep");
    }

    #[test]
    fn test_channel_format_fallback() {
        let mut spec = ImageSpec::new(2, 2, 3, TypeDesc::HALF);
        assert_eq!(spec.channel_format(2), TypeDesc::HALF);
        assert_eq!(spec.channel_name(1), "channel1");
        spec.channel_formats = vec![TypeDesc::HALF, TypeDesc::FLOAT, TypeDesc::UINT];
        assert_eq!(spec.all_channel_formats()[2], TypeDesc::UINT);
    }

    #[test]
    fn test_validate() {
        let mut spec = ImageSpec::deep(2, 2, &["R", "Z"], TypeDesc::FLOAT);
        assert!(spec.validate().is_ok());

        spec.channel_formats = vec![TypeDesc::FLOAT];
        assert!(matches!(spec.validate(), Err(Error::ChannelMismatch { expected: 2, got: 1 })));

        spec.channel_formats.clear();
        spec.channel_names = vec!["Z".into(), "Z".into()];
        assert!(matches!(spec.validate(), Err(Error::DuplicateChannel(_))));

        let empty_axis = ImageSpec::new(0, 4, 1, TypeDesc::FLOAT);
        assert!(empty_axis.validate().is_err());
    }
}
