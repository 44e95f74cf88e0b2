//! Channel descriptor table.
//!
//! Each channel of a deep store has a name, an element type and a semantic
//! role. The table is built once at `init` time: it computes byte offsets
//! within a sample, resolves the special channels (Z, Zback, alpha and the
//! colored alphas) and, for every channel, the alpha channel that weights
//! it during split and merge.
//!
//! # Role detection
//!
//! Names are matched case-insensitively. A layer prefix (`diffuse.R`) is
//! stripped before matching colors, but only unprefixed names define the
//! special channels.
//!
//! | Name               | Role    |
//! |--------------------|---------|
//! | `Z`                | Z       |
//! | `Zback`            | Zback   |
//! | `A`, `Alpha`       | A       |
//! | `AR`/`RA`, `AG`/`GA`, `AB`/`BA` | AR, AG, AB |
//!
//! # Alpha association
//!
//! Float channels are treated as premultiplied by an alpha: red, green and
//! blue use AR, AG and AB (each falling back to A), alpha channels use
//! themselves, any other float channel uses A. Depth channels and integer
//! channels are never alpha-weighted; they pass through split and merge
//! unchanged.

use vfx_core::TypeDesc;

use crate::error::{DeepError, DeepResult};

/// Semantic role of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChannelRole {
    /// Ordinary data channel (color, normals, ids, ...).
    #[default]
    None,
    /// Front depth.
    Z,
    /// Back depth.
    Zback,
    /// Alpha.
    A,
    /// Red alpha.
    AR,
    /// Green alpha.
    AG,
    /// Blue alpha.
    AB,
}

impl ChannelRole {
    /// Role for a channel name.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "z" => Self::Z,
            "zback" => Self::Zback,
            "a" | "alpha" => Self::A,
            "ar" | "ra" => Self::AR,
            "ag" | "ga" => Self::AG,
            "ab" | "ba" => Self::AB,
            _ => Self::None,
        }
    }

    /// Whether this is one of the alpha roles.
    #[inline]
    pub fn is_alpha(&self) -> bool {
        matches!(self, Self::A | Self::AR | Self::AG | Self::AB)
    }

    /// Whether this is Z or Zback.
    #[inline]
    pub fn is_depth(&self) -> bool {
        matches!(self, Self::Z | Self::Zback)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColorComponent {
    Red,
    Green,
    Blue,
}

fn color_component(name: &str) -> Option<ColorComponent> {
    let base = name.rsplit('.').next().unwrap_or(name);
    match base.to_ascii_lowercase().as_str() {
        "r" | "red" => Some(ColorComponent::Red),
        "g" | "green" => Some(ColorComponent::Green),
        "b" | "blue" => Some(ColorComponent::Blue),
        _ => None,
    }
}

/// One channel's static metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelDesc {
    /// Channel name.
    pub name: String,
    /// Element type.
    pub ty: TypeDesc,
    /// Semantic role.
    pub role: ChannelRole,
    /// Byte offset of this channel within a sample.
    pub offset: usize,
    /// Alpha channel that weights this channel, if any.
    pub alpha: Option<usize>,
}

/// Immutable per-store channel table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelTable {
    channels: Vec<ChannelDesc>,
    samplesize: usize,
    z: Option<usize>,
    zback: Option<usize>,
    a: Option<usize>,
    ar: Option<usize>,
    ag: Option<usize>,
    ab: Option<usize>,
}

impl ChannelTable {
    /// Builds the table.
    ///
    /// `types` holds either one type per channel or a single type shared by
    /// all of them. `names` must hold one name per channel.
    pub fn new(nchannels: usize, types: &[TypeDesc], names: &[impl AsRef<str>]) -> DeepResult<Self> {
        if types.len() != nchannels && !(types.len() == 1 && nchannels > 0) {
            return Err(DeepError::InvalidArgument(format!(
                "{} channel types given for {} channels",
                types.len(),
                nchannels
            )));
        }
        if names.len() != nchannels {
            return Err(DeepError::InvalidArgument(format!(
                "{} channel names given for {} channels",
                names.len(),
                nchannels
            )));
        }

        let mut table = Self::default();
        let mut offset = 0usize;
        for (c, name) in names.iter().enumerate() {
            let name = name.as_ref();
            let ty = if types.len() == 1 { types[0] } else { types[c] };
            let role = ChannelRole::from_name(name);
            let mut unused = None;
            let slot = match role {
                ChannelRole::Z => &mut table.z,
                ChannelRole::Zback => &mut table.zback,
                ChannelRole::A => &mut table.a,
                ChannelRole::AR => &mut table.ar,
                ChannelRole::AG => &mut table.ag,
                ChannelRole::AB => &mut table.ab,
                ChannelRole::None => &mut unused,
            };
            if slot.is_none() {
                *slot = Some(c);
            }
            table.channels.push(ChannelDesc {
                name: name.to_string(),
                ty,
                role,
                offset,
                alpha: None,
            });
            offset += ty.size();
        }
        table.samplesize = offset;

        let alphas: Vec<Option<usize>> = (0..nchannels).map(|c| table.associated_alpha(c)).collect();
        for (desc, alpha) in table.channels.iter_mut().zip(alphas) {
            desc.alpha = alpha;
        }
        Ok(table)
    }

    fn associated_alpha(&self, c: usize) -> Option<usize> {
        let desc = &self.channels[c];
        if desc.role.is_depth() || desc.ty.is_integer() {
            return None;
        }
        if desc.role.is_alpha() {
            return Some(c);
        }
        match color_component(&desc.name) {
            Some(ColorComponent::Red) => self.ar_channel(),
            Some(ColorComponent::Green) => self.ag_channel(),
            Some(ColorComponent::Blue) => self.ab_channel(),
            None => self.a,
        }
    }

    /// Number of channels.
    #[inline]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Whether the table has no channels.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Bytes per sample (sum of all channel sizes).
    #[inline]
    pub fn samplesize(&self) -> usize {
        self.samplesize
    }

    /// Descriptor of channel `c`.
    pub fn get(&self, c: usize) -> DeepResult<&ChannelDesc> {
        self.channels.get(c).ok_or(DeepError::ChannelOutOfRange {
            channel: c,
            channels: self.channels.len(),
        })
    }

    /// All descriptors.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, ChannelDesc> {
        self.channels.iter()
    }

    /// Z channel.
    #[inline]
    pub fn z_channel(&self) -> Option<usize> {
        self.z
    }

    /// Zback channel, falling back to Z.
    #[inline]
    pub fn zback_channel(&self) -> Option<usize> {
        self.zback.or(self.z)
    }

    /// Alpha channel.
    #[inline]
    pub fn a_channel(&self) -> Option<usize> {
        self.a
    }

    /// Red alpha channel, falling back to A.
    #[inline]
    pub fn ar_channel(&self) -> Option<usize> {
        self.ar.or(self.a)
    }

    /// Green alpha channel, falling back to A.
    #[inline]
    pub fn ag_channel(&self) -> Option<usize> {
        self.ag.or(self.a)
    }

    /// Blue alpha channel, falling back to A.
    #[inline]
    pub fn ab_channel(&self) -> Option<usize> {
        self.ab.or(self.a)
    }

    /// Element types of all channels, in channel order.
    pub fn types(&self) -> Vec<TypeDesc> {
        self.channels.iter().map(|c| c.ty).collect()
    }

    /// Whether `other` has the same channel types in the same order.
    pub fn same_types(&self, other: &ChannelTable) -> bool {
        self.channels.len() == other.channels.len()
            && self.channels.iter().zip(&other.channels).all(|(a, b)| a.ty == b.ty)
    }
}
