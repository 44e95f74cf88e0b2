//! Depth algorithms on single deep pixels.
//!
//! All operations here work on one pixel at a time and follow the volumetric
//! sample model of deep compositing: a sample spans `[Z, Zback)` with
//! uniform optical density, and every float channel other than depth is
//! premultiplied by the alpha it is associated with (see
//! [`crate::channels`]).
//!
//! A pixel without a Z channel is left alone: split, sort and merge become
//! no-ops and report that nothing happened. Out-of-range pixels are errors.
//!
//! # Splitting
//!
//! A sample of alpha `a` cut at fraction `f` of its depth extent gives a
//! front part of alpha `1 - (1-a)^f`. Premultiplied colors are scaled by the
//! same factor relative to `a`, so compositing the halves back with "over"
//! returns the original sample. Fully opaque samples copy their values to
//! both halves; fully transparent ones split linearly.
//!
//! # Merging
//!
//! Two samples covering the same range combine as two media mixed in one
//! volume: alpha is `a1 + a2 - a1*a2`, colors are weighted by each sample's
//! optical depth `-ln(1-a)`.

use tracing::trace;

use crate::deepdata::DeepData;
use crate::error::{DeepError, DeepResult};

/// Depth assigned to depth channels of pixels without samples when
/// flattening.
pub const EMPTY_DEPTH: f32 = 1.0e30;

#[inline]
fn optical_depth(a: f32) -> f32 {
    -(-a).ln_1p()
}

/// Alpha of the two parts of a sample of alpha `a` cut at fractions
/// `xf` / `xb` of its extent. `a` must be below 1.
#[inline]
fn split_alpha(a: f32, xf: f32, xb: f32) -> (f32, f32) {
    if a > f32::MIN_POSITIVE {
        let u = optical_depth(a);
        (-(-xf * u).exp_m1(), -(-xb * u).exp_m1())
    } else {
        (a * xf, a * xb)
    }
}

/// Premultiplied value `v` of a sample of alpha `a` cut at `xf` / `xb`.
#[inline]
fn split_value(v: f32, a: f32, xf: f32, xb: f32) -> (f32, f32) {
    if a > f32::MIN_POSITIVE {
        let (af, ab) = split_alpha(a, xf, xb);
        (v * af / a, v * ab / a)
    } else {
        (v * xf, v * xb)
    }
}

/// Premultiplied color of two co-located samples mixed together.
fn merge_value(c1: f32, a1: f32, c2: f32, a2: f32) -> f32 {
    if a1 >= 1.0 && a2 >= 1.0 {
        return (c1 + c2) * 0.5;
    }
    if a1 >= 1.0 {
        return c1;
    }
    if a2 >= 1.0 {
        return c2;
    }

    let am = a1 + a2 - a1 * a2;

    let u1 = optical_depth(a1);
    let v1 = if u1 < a1 * f32::MAX { u1 / a1 } else { 1.0 };
    let u2 = optical_depth(a2);
    let v2 = if u2 < a2 * f32::MAX { u2 / a2 } else { 1.0 };

    let u = u1 + u2;
    let w = if u > 1.0 || am < u * f32::MAX { am / u } else { 1.0 };

    (c1 * v1 + c2 * v2) * w
}

impl DeepData {
    /// Sample indices of `pixel` in stable ascending-Z order.
    ///
    /// Identity order when the store has no Z channel.
    pub(crate) fn z_order(&self, pixel: usize) -> Vec<usize> {
        let n = self.count(pixel);
        let mut order: Vec<usize> = (0..n).collect();
        if let Some(zc) = self.z_channel() {
            // -0.0 and 0.0 are the same depth and must tie.
            let keys: Vec<f32> = (0..n).map(|s| self.get_f32(pixel, zc, s) + 0.0).collect();
            order.sort_by(|&a, &b| keys[a].total_cmp(&keys[b]));
        }
        order
    }

    fn clamped_alpha(&self, pixel: usize, channel: usize, sample: usize) -> f32 {
        self.get_f32(pixel, channel, sample).clamp(0.0, 1.0)
    }

    /// Splits every sample of `pixel` whose range strictly contains
    /// `zsplit` into a front part `[Z, zsplit)` and a back part
    /// `[zsplit, Zback)`.
    ///
    /// Returns whether any sample was split. Pixels of a store without
    /// distinct Z and Zback channels are never split.
    pub fn split(&mut self, pixel: usize, zsplit: f32) -> DeepResult<bool> {
        self.check_pixel(pixel)?;
        let (Some(zc), Some(zbc)) = (self.z_channel(), self.zback_channel()) else {
            return Ok(false);
        };
        if zc == zbc {
            return Ok(false);
        }

        let alphas: Vec<Option<usize>> = self.channel_table().iter().map(|d| d.alpha).collect();
        let mut did_split = false;
        let mut s = 0;
        while s < self.count(pixel) {
            let zf = self.get_f32(pixel, zc, s);
            let zb = self.get_f32(pixel, zbc, s);
            if !(zf < zsplit && zsplit < zb) {
                s += 1;
                continue;
            }

            self.alloc()?;
            self.insert_samples(pixel, s + 1, 1)?;
            self.copy_sample_within(pixel, s, s + 1);
            self.put_f32(pixel, zbc, s, zsplit);
            self.put_f32(pixel, zc, s + 1, zsplit);

            let xf = (zsplit - zf) / (zb - zf);
            let xb = (zb - zsplit) / (zb - zf);

            // Colors read the unsplit alphas, so they go first.
            for (c, alpha) in alphas.iter().enumerate() {
                let Some(ac) = *alpha else { continue };
                if ac == c {
                    continue;
                }
                let a = self.clamped_alpha(pixel, ac, s);
                if a >= 1.0 {
                    continue;
                }
                let (vf, vb) = split_value(self.get_f32(pixel, c, s), a, xf, xb);
                self.put_f32(pixel, c, s, vf);
                self.put_f32(pixel, c, s + 1, vb);
            }
            for (c, alpha) in alphas.iter().enumerate() {
                if *alpha != Some(c) {
                    continue;
                }
                let a = self.clamped_alpha(pixel, c, s);
                if a >= 1.0 {
                    continue;
                }
                let (af, ab) = split_alpha(a, xf, xb);
                self.put_f32(pixel, c, s, af);
                self.put_f32(pixel, c, s + 1, ab);
            }

            trace!(pixel, sample = s, zsplit, "sample split");
            did_split = true;
            // Neither part can contain zsplit in its interior.
            s += 2;
        }
        Ok(did_split)
    }

    /// Stable-sorts the samples of `pixel` by ascending Z.
    ///
    /// Does nothing when the store has no Z channel.
    pub fn sort(&mut self, pixel: usize) -> DeepResult<()> {
        self.check_pixel(pixel)?;
        if self.z_channel().is_none() || self.count(pixel) < 2 {
            return Ok(());
        }
        let order = self.z_order(pixel);
        if order.iter().enumerate().all(|(i, &s)| i == s) {
            return Ok(());
        }
        self.permute_samples(pixel, &order);
        Ok(())
    }

    /// Combines samples of `pixel` that cover identical depth ranges.
    ///
    /// Expects the pixel sorted and split at all sample boundaries (see
    /// [`DeepData::tidy`]), so that ranges are either identical or
    /// disjoint. Returns the number of samples removed.
    ///
    /// Alpha-weighted channels are mixed; other channels keep the value of
    /// the earlier sample.
    pub fn merge_overlaps(&mut self, pixel: usize) -> DeepResult<usize> {
        self.check_pixel(pixel)?;
        let Some(zc) = self.z_channel() else {
            return Ok(0);
        };
        let zbc = self.zback_channel().unwrap_or(zc);
        if self.count(pixel) < 2 {
            return Ok(0);
        }
        self.alloc()?;

        let mut removed = 0;
        let mut s = 1;
        while s < self.count(pixel) {
            let z = self.get_f32(pixel, zc, s);
            let zb = self.get_f32(pixel, zbc, s);

            let mut target = None;
            let mut j = s;
            while j > 0 {
                j -= 1;
                if self.get_f32(pixel, zc, j) != z {
                    break;
                }
                if self.get_f32(pixel, zbc, j) == zb {
                    target = Some(j);
                    break;
                }
            }

            match target {
                Some(t) => {
                    self.merge_sample_into(pixel, t, s);
                    self.erase_samples(pixel, s, 1)?;
                    removed += 1;
                }
                None => s += 1,
            }
        }
        if removed > 0 {
            trace!(pixel, removed, "overlapping samples merged");
        }
        Ok(removed)
    }

    /// Mixes sample `src` into sample `dst` of the same pixel.
    fn merge_sample_into(&mut self, pixel: usize, dst: usize, src: usize) {
        let alphas: Vec<Option<usize>> = self.channel_table().iter().map(|d| d.alpha).collect();
        for (c, alpha) in alphas.iter().enumerate() {
            let Some(ac) = *alpha else { continue };
            if ac == c {
                continue;
            }
            let a1 = self.clamped_alpha(pixel, ac, dst);
            let a2 = self.clamped_alpha(pixel, ac, src);
            let c1 = self.get_f32(pixel, c, dst);
            let c2 = self.get_f32(pixel, c, src);
            self.put_f32(pixel, c, dst, merge_value(c1, a1, c2, a2));
        }
        for (c, alpha) in alphas.iter().enumerate() {
            if *alpha != Some(c) {
                continue;
            }
            let a1 = self.clamped_alpha(pixel, c, dst);
            let a2 = self.clamped_alpha(pixel, c, src);
            self.put_f32(pixel, c, dst, a1 + a2 - a1 * a2);
        }
    }

    /// Splits `pixel` at every sample's Z and Zback, sorts it, and merges
    /// the now identical ranges.
    pub fn tidy(&mut self, pixel: usize) -> DeepResult<()> {
        self.check_pixel(pixel)?;
        let Some(zc) = self.z_channel() else {
            return Ok(());
        };
        let zbc = self.zback_channel().unwrap_or(zc);

        let n = self.count(pixel);
        let mut bounds = Vec::with_capacity(n * 2);
        for s in 0..n {
            bounds.push(self.get_f32(pixel, zc, s));
            bounds.push(self.get_f32(pixel, zbc, s));
        }
        bounds.sort_by(f32::total_cmp);
        bounds.dedup();

        for z in bounds {
            self.split(pixel, z)?;
        }
        self.sort(pixel)?;
        self.merge_overlaps(pixel)?;
        Ok(())
    }

    /// Merges the samples of `srcpixel` in `src` into `pixel`.
    ///
    /// Both pixels are split at each other's boundaries and co-located
    /// samples are mixed, leaving `pixel` sorted with disjoint or identical
    /// ranges merged. Without a Z channel the source samples are appended.
    pub fn merge_deep_pixels(&mut self, pixel: usize, src: &DeepData, srcpixel: usize) -> DeepResult<()> {
        if !self.same_channeltypes(src) {
            return Err(DeepError::LayoutMismatch);
        }
        self.check_pixel(pixel)?;
        src.check_pixel(srcpixel)?;

        let nsrc = src.count(srcpixel);
        if nsrc == 0 {
            return Ok(());
        }
        let ndst = self.count(pixel);
        if ndst == 0 {
            return self.copy_deep_pixel(pixel, src, srcpixel);
        }

        self.insert_samples(pixel, ndst, nsrc)?;
        for s in 0..nsrc {
            self.copy_deep_sample(pixel, ndst + s, src, srcpixel, s)?;
        }
        if self.z_channel().is_none() {
            return Ok(());
        }
        self.tidy(pixel)
    }

    /// Depth at which `pixel` becomes opaque, using the configured
    /// opacity threshold.
    ///
    /// See [`DeepData::opaque_z_with_threshold`].
    pub fn opaque_z(&self, pixel: usize) -> DeepResult<f32> {
        self.opaque_z_with_threshold(pixel, self.config().opacity_threshold)
    }

    /// Composites samples of `pixel` front to back and returns the Zback of
    /// the first sample at which every alpha (AR, AG and AB, each falling
    /// back to A) reaches `threshold`.
    ///
    /// Returns `f32::INFINITY` when the pixel never gets there, including
    /// pixels without samples and stores without Z or alpha.
    pub fn opaque_z_with_threshold(&self, pixel: usize, threshold: f32) -> DeepResult<f32> {
        Ok(self
            .opaque_sample(pixel, threshold)?
            .map_or(f32::INFINITY, |(_, zback)| zback))
    }

    /// Position in Z order and Zback of the sample that makes `pixel`
    /// opaque.
    fn opaque_sample(&self, pixel: usize, threshold: f32) -> DeepResult<Option<(usize, f32)>> {
        self.check_pixel(pixel)?;
        let Some(zc) = self.z_channel() else {
            return Ok(None);
        };
        let zbc = self.zback_channel().unwrap_or(zc);
        let channels = [self.ar_channel(), self.ag_channel(), self.ab_channel()];
        if channels.iter().any(Option::is_none) {
            return Ok(None);
        }
        let channels: Vec<usize> = channels.into_iter().flatten().collect();

        let mut acc = [0.0f32; 3];
        for (pos, s) in self.z_order(pixel).into_iter().enumerate() {
            for (accum, &ac) in acc.iter_mut().zip(&channels) {
                let a = self.clamped_alpha(pixel, ac, s);
                *accum += a * (1.0 - *accum);
            }
            if acc.iter().all(|&a| a >= threshold) {
                return Ok(Some((pos, self.get_f32(pixel, zbc, s))));
            }
        }
        Ok(None)
    }

    /// Removes samples of `pixel` that lie entirely behind its opaque depth.
    ///
    /// The pixel is left sorted. Returns the number of samples removed.
    pub fn occlusion_cull(&mut self, pixel: usize) -> DeepResult<usize> {
        self.sort(pixel)?;
        let threshold = self.config().opacity_threshold;
        let Some((opaque, zlimit)) = self.opaque_sample(pixel, threshold)? else {
            return Ok(0);
        };
        let Some(zc) = self.z_channel() else {
            return Ok(0);
        };

        // Sorted, so z_order positions are sample indices.
        let n = self.count(pixel);
        let cut = (opaque + 1..n)
            .find(|&s| self.get_f32(pixel, zc, s) >= zlimit)
            .unwrap_or(n);
        let removed = n - cut;
        if removed > 0 {
            self.erase_samples(pixel, cut, removed)?;
            trace!(pixel, removed, zlimit, "occluded samples culled");
        }
        Ok(removed)
    }

    /// Flattens `pixel` into one value per channel.
    ///
    /// See [`DeepData::composite_pixel_into`].
    pub fn composite_pixel(&self, pixel: usize) -> DeepResult<Vec<f32>> {
        let mut out = vec![0.0; self.channels()];
        self.composite_pixel_into(pixel, &mut out)?;
        Ok(out)
    }

    /// Flattens `pixel` into `out`, one value per channel.
    ///
    /// Alpha-weighted channels are composited front to back with "over".
    /// Other channels (depth, integer ids, unweighted data) take the value
    /// of the front-most sample. A pixel without samples yields zeros, with
    /// depth channels at [`EMPTY_DEPTH`].
    pub fn composite_pixel_into(&self, pixel: usize, out: &mut [f32]) -> DeepResult<()> {
        self.check_pixel(pixel)?;
        let nch = self.channels();
        if out.len() != nch {
            return Err(DeepError::SizeMismatch {
                what: "composite output",
                expected: nch,
                actual: out.len(),
            });
        }

        let table = self.channel_table();
        out.fill(0.0);
        if self.count(pixel) == 0 {
            for (o, desc) in out.iter_mut().zip(table.iter()) {
                if desc.role.is_depth() {
                    *o = EMPTY_DEPTH;
                }
            }
            return Ok(());
        }

        let alphas: Vec<Option<usize>> = table.iter().map(|d| d.alpha).collect();
        let mut weights = vec![1.0f32; nch];
        for (i, s) in self.z_order(pixel).into_iter().enumerate() {
            for (c, alpha) in alphas.iter().enumerate() {
                weights[c] = match alpha {
                    Some(ac) => 1.0 - out[*ac].clamp(0.0, 1.0),
                    None => 0.0,
                };
            }
            for (c, alpha) in alphas.iter().enumerate() {
                let v = self.get_f32(pixel, c, s);
                match alpha {
                    Some(_) => out[c] += weights[c] * v,
                    None if i == 0 => out[c] = v,
                    None => {}
                }
            }
        }
        Ok(())
    }
}
