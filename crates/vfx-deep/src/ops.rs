//! Whole-image deep operations.
//!
//! Flat images are passed as interleaved `f32` buffers of
//! `pixels * channels` values, in the pixel order of the deep store.
//!
//! # Operations
//!
//! - [`flatten`] - Composite every deep pixel down to one value per channel
//! - [`deepen`] - Turn a flat image into a deep one with one sample per pixel
//! - [`deep_merge`] - Merge two deep images, optionally culling hidden samples
//! - [`deep_holdout`] - Cut a deep image by the opaque depth of another
//!
//! When the `parallel` feature is enabled, [`flatten`] uses rayon.
//!
//! # Example
//!
//! ```rust
//! use vfx_core::{ImageSpec, TypeDesc};
//! use vfx_deep::ops::{deepen, flatten};
//!
//! let spec = ImageSpec::deep(2, 1, &["R", "A"], TypeDesc::FLOAT);
//! let flat = [0.5, 0.5, 0.0, 0.0];
//! let deep = deepen(&spec, &flat, 10.0).unwrap();
//! assert_eq!(deep.all_samples(), &[1, 0]);
//!
//! let back = flatten(&deep).unwrap();
//! assert_eq!(&back[..3], &[0.5, 0.5, 10.0]);
//! ```

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::{debug, warn};
use vfx_core::{ImageSpec, TypeDesc};

use crate::channels::ChannelRole;
use crate::deepdata::DeepData;
use crate::error::{DeepError, DeepResult};

/// Composites every pixel of `deep` front to back.
///
/// Returns `pixels * channels` values laid out like the deep store's
/// channels. See [`DeepData::composite_pixel_into`] for the per-channel
/// rules. Fails if the store has no alpha channel.
pub fn flatten(deep: &DeepData) -> DeepResult<Vec<f32>> {
    if deep.a_channel().is_none()
        && (deep.ar_channel().is_none() || deep.ag_channel().is_none() || deep.ab_channel().is_none())
    {
        return Err(DeepError::InvalidArgument("no alpha channel could be identified".into()));
    }
    let nch = deep.channels();
    let mut out = vec![0.0f32; deep.pixels() * nch];
    if nch == 0 {
        return Ok(out);
    }
    flatten_into(deep, &mut out, nch)?;
    debug!(pixels = deep.pixels(), channels = nch, "deep image flattened");
    Ok(out)
}

#[cfg(feature = "parallel")]
fn flatten_into(deep: &DeepData, out: &mut [f32], nch: usize) -> DeepResult<()> {
    out.par_chunks_mut(nch)
        .enumerate()
        .try_for_each(|(pixel, px)| deep.composite_pixel_into(pixel, px))
}

#[cfg(not(feature = "parallel"))]
fn flatten_into(deep: &DeepData, out: &mut [f32], nch: usize) -> DeepResult<()> {
    out.chunks_mut(nch)
        .enumerate()
        .try_for_each(|(pixel, px)| deep.composite_pixel_into(pixel, px))
}

fn default_names(nch: usize) -> Vec<String> {
    let names: &[&str] = match nch {
        1 => &["Y"],
        2 => &["Y", "A"],
        3 => &["R", "G", "B"],
        4 => &["R", "G", "B", "A"],
        _ => return (0..nch).map(|c| format!("channel{}", c)).collect(),
    };
    names.iter().map(|n| n.to_string()).collect()
}

/// Converts a flat image into a deep image of float channels.
///
/// A pixel gets one sample if any non-depth channel is nonzero, or if the
/// image carries its own Z and that depth is finite and nonzero; other
/// pixels get none. Without a Z channel in `spec`, one is appended and set
/// to `z` for every sample.
pub fn deepen(spec: &ImageSpec, flat: &[f32], z: f32) -> DeepResult<DeepData> {
    spec.validate()?;
    let nch = spec.nchannels;
    let npixels = usize::try_from(spec.image_pixels())
        .map_err(|_| DeepError::InvalidArgument(format!("{} pixels do not fit in memory", spec.image_pixels())))?;
    if flat.len() != npixels * nch {
        return Err(DeepError::SizeMismatch {
            what: "flat pixels",
            expected: npixels * nch,
            actual: flat.len(),
        });
    }

    let mut names = if spec.channel_names.is_empty() {
        default_names(nch)
    } else {
        spec.channel_names.clone()
    };
    let roles: Vec<ChannelRole> = names.iter().map(|n| ChannelRole::from_name(n)).collect();
    let add_z = !roles.contains(&ChannelRole::Z);
    if add_z {
        names.push("Z".to_string());
    }

    let counts: Vec<u32> = if nch == 0 {
        vec![0; npixels]
    } else {
        flat.chunks(nch)
            .map(|px| {
                let color = px
                    .iter()
                    .zip(&roles)
                    .any(|(&v, role)| !role.is_depth() && v != 0.0);
                let depth = !add_z
                    && px
                        .iter()
                        .zip(&roles)
                        .any(|(&v, role)| role.is_depth() && v != 0.0 && v < 1.0e30);
                u32::from(color || depth)
            })
            .collect()
    };

    let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let mut deep = DeepData::new(npixels, &[TypeDesc::FLOAT], &name_refs)?;
    deep.set_all_samples(&counts)?;

    for (pixel, &n) in counts.iter().enumerate() {
        if n == 0 {
            continue;
        }
        let px = &flat[pixel * nch..(pixel + 1) * nch];
        for (c, &v) in px.iter().enumerate() {
            deep.set_deep_value(pixel, c, 0, v)?;
        }
        if add_z {
            deep.set_deep_value(pixel, nch, 0, z)?;
        }
    }
    debug!(pixels = npixels, add_z, "flat image deepened");
    Ok(deep)
}

/// Merges two deep images of the same shape and channel layout.
///
/// Every pixel of `b` is merged into the matching pixel of `a` with
/// [`DeepData::merge_deep_pixels`]; with `occlusion_cull`, samples hidden
/// behind the merged opaque depth are then dropped.
pub fn deep_merge(a: &DeepData, b: &DeepData, occlusion_cull: bool) -> DeepResult<DeepData> {
    if !a.same_channeltypes(b) {
        return Err(DeepError::LayoutMismatch);
    }
    if a.pixels() != b.pixels() {
        return Err(DeepError::SizeMismatch {
            what: "pixels",
            expected: a.pixels(),
            actual: b.pixels(),
        });
    }

    let names = (0..a.channels())
        .map(|c| a.channelname(c))
        .collect::<DeepResult<Vec<_>>>()?;
    let mut dst = DeepData::with_config(a.pixels(), &a.all_channeltypes(), &names, *a.config())?;

    // Reserve both inputs up front; splits may still need a few more.
    for pixel in 0..a.pixels() {
        dst.set_capacity(pixel, a.capacity(pixel)? + b.capacity(pixel)?)?;
    }

    if a.z_channel().is_none() {
        warn!("deep_merge: no Z channel, samples are concatenated");
    }

    let mut culled = 0usize;
    for pixel in 0..a.pixels() {
        dst.copy_deep_pixel(pixel, a, pixel)?;
        dst.merge_deep_pixels(pixel, b, pixel)?;
        if occlusion_cull {
            culled += dst.occlusion_cull(pixel)?;
        }
    }
    debug!(pixels = a.pixels(), culled, "deep images merged");
    Ok(dst)
}

/// Removes the parts of `src` behind the opaque depth of `holdout`.
///
/// Samples straddling the holdout's opaque depth are split there and their
/// back part dropped. Pixels where the holdout never becomes opaque are
/// kept whole.
pub fn deep_holdout(src: &DeepData, holdout: &DeepData) -> DeepResult<DeepData> {
    if src.pixels() != holdout.pixels() {
        return Err(DeepError::SizeMismatch {
            what: "pixels",
            expected: src.pixels(),
            actual: holdout.pixels(),
        });
    }
    let mut dst = src.clone();
    let Some(zc) = dst.z_channel() else {
        warn!("deep_holdout: source has no Z channel, nothing held out");
        return Ok(dst);
    };

    let mut removed = 0usize;
    for pixel in 0..dst.pixels() {
        let zlimit = holdout.opaque_z(pixel)?;
        if !zlimit.is_finite() || dst.samples(pixel)? == 0 {
            continue;
        }
        dst.split(pixel, zlimit)?;
        dst.sort(pixel)?;
        let n = dst.samples(pixel)?;
        let mut cut = n;
        for s in 0..n {
            if dst.deep_value(pixel, zc, s)? >= zlimit {
                cut = s;
                break;
            }
        }
        if cut < n {
            dst.erase_samples(pixel, cut, n - cut)?;
            removed += n - cut;
        }
    }
    debug!(pixels = dst.pixels(), removed, "deep holdout applied");
    Ok(dst)
}
