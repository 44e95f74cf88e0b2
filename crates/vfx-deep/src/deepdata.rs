//! Deep pixel store.
//!
//! [`DeepData`] holds the contents of an image of "deep" pixels: each pixel
//! owns a variable number of samples, and each sample is a packed tuple of
//! per-channel values whose types may differ (half color, float depth, uint
//! ids, ...).
//!
//! # Layout
//!
//! All samples of all pixels live in one byte arena. A per-pixel directory
//! of three parallel arrays maps a pixel to its record:
//!
//! ```text
//! pixel:      0      1      2      3
//! nsamples:   2      0      3      1
//! capacity:   2      0      4      1
//! offset:     0      -      2*ss   6*ss        (ss = samplesize)
//!
//! arena: [p0 s0][p0 s1][p2 s0][p2 s1][p2 s2][p2 free][p3 s0]
//! ```
//!
//! Within a sample, channels are stored back to back in channel order, each
//! as native-endian bytes of its declared type.
//!
//! # Lifecycle
//!
//! `init` only shapes the store: counts and capacities are plain metadata
//! and no arena exists yet, so calling `set_samples`/`set_capacity` on many
//! pixels is cheap. The arena is laid out in pixel order on the first write
//! (or an explicit [`DeepData::alloc`]). After that, a record that outgrows
//! its capacity moves to fresh space at the end of the arena; the region it
//! left is dead until [`DeepData::compact`] repacks the arena.
//!
//! Capacity is sticky: shrinking the sample count never releases space, so
//! algorithms that repeatedly insert and erase do not churn the allocator.
//!
//! # Example
//!
//! ```rust
//! use vfx_deep::DeepData;
//! use vfx_core::TypeDesc;
//!
//! let types = [TypeDesc::HALF, TypeDesc::HALF, TypeDesc::HALF, TypeDesc::HALF, TypeDesc::FLOAT];
//! let mut deep = DeepData::new(100, &types, &["R", "G", "B", "A", "Z"]).unwrap();
//!
//! deep.set_samples(0, 2).unwrap();
//! deep.set_deep_value(0, 3, 0, 0.5).unwrap(); // A
//! deep.set_deep_value(0, 4, 0, 10.0).unwrap(); // Z
//!
//! assert_eq!(deep.samples(0).unwrap(), 2);
//! assert_eq!(deep.deep_value(0, 4, 0).unwrap(), 10.0);
//! assert!(deep.samples(100).is_err());
//! ```

use std::borrow::Cow;

use tracing::{debug, trace};
use vfx_core::{ImageSpec, TypeDesc};

use crate::channels::ChannelTable;
use crate::config::DeepConfig;
use crate::error::{DeepError, DeepResult};
use crate::value;

/// Arena occupancy figures, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArenaStats {
    /// Bytes holding active samples.
    pub live_bytes: usize,
    /// Bytes reserved by pixel capacities (live plus spare slots).
    pub reserved_bytes: usize,
    /// Bytes left behind by relocated or shrunk records.
    pub dead_bytes: usize,
    /// Total arena length.
    pub arena_bytes: usize,
}

/// Deep pixel data with a variable number of samples per pixel.
#[derive(Debug, Clone, Default)]
pub struct DeepData {
    npixels: usize,
    channels: ChannelTable,
    /// Active samples per pixel.
    nsamples: Vec<u32>,
    /// Reserved sample slots per pixel.
    capacity: Vec<u32>,
    /// Byte offset of each record in `data`; meaningful once allocated.
    offsets: Vec<usize>,
    data: Vec<u8>,
    dead_bytes: usize,
    initialized: bool,
    allocated: bool,
    config: DeepConfig,
}

fn to_count(n: usize) -> DeepResult<u32> {
    u32::try_from(n).map_err(|_| DeepError::InvalidArgument(format!("sample count {} exceeds u32", n)))
}

fn alloc_zeroed(bytes: usize) -> DeepResult<Vec<u8>> {
    let mut data = Vec::new();
    data.try_reserve_exact(bytes)
        .map_err(|_| DeepError::AllocationFailed { requested: bytes })?;
    data.resize(bytes, 0);
    Ok(data)
}

impl DeepData {
    /// Creates an empty, uninitialized store.
    pub fn new_empty() -> Self {
        Self::default()
    }

    /// Creates a store of `npixels` pixels with one channel per name.
    ///
    /// `types` holds one type per channel or a single type for all.
    pub fn new(npixels: usize, types: &[TypeDesc], names: &[&str]) -> DeepResult<Self> {
        Self::with_config(npixels, types, names, DeepConfig::default())
    }

    /// Like [`DeepData::new`], with an explicit configuration.
    pub fn with_config(
        npixels: usize,
        types: &[TypeDesc],
        names: &[&str],
        config: DeepConfig,
    ) -> DeepResult<Self> {
        let mut dd = Self {
            config,
            ..Self::default()
        };
        dd.init(npixels, names.len(), types, names)?;
        Ok(dd)
    }

    /// Creates a store shaped by an image spec.
    pub fn from_spec(spec: &ImageSpec) -> DeepResult<Self> {
        let mut dd = Self::new_empty();
        dd.init_from_spec(spec)?;
        Ok(dd)
    }

    /// Shapes the store: pixel count and channel layout.
    ///
    /// All pixels start with zero samples and no arena is allocated. Any
    /// previous contents are discarded.
    pub fn init(
        &mut self,
        npixels: usize,
        nchannels: usize,
        types: &[TypeDesc],
        names: &[impl AsRef<str>],
    ) -> DeepResult<()> {
        let channels = ChannelTable::new(nchannels, types, names)?;
        self.npixels = npixels;
        self.channels = channels;
        self.nsamples = vec![0; npixels];
        self.capacity = vec![0; npixels];
        self.offsets = vec![0; npixels];
        self.data = Vec::new();
        self.dead_bytes = 0;
        self.allocated = false;
        self.initialized = true;
        debug!(
            pixels = npixels,
            channels = nchannels,
            samplesize = self.channels.samplesize(),
            "deep data initialized"
        );
        Ok(())
    }

    /// Shapes the store from an image spec.
    ///
    /// Uses the spec's per-channel formats when present, its default
    /// format otherwise; unnamed channels get `channel{N}` names.
    pub fn init_from_spec(&mut self, spec: &ImageSpec) -> DeepResult<()> {
        spec.validate()?;
        let npixels = usize::try_from(spec.image_pixels())
            .map_err(|_| DeepError::InvalidArgument(format!("{} pixels do not fit in memory", spec.image_pixels())))?;
        let types = spec.all_channel_formats();
        let names = spec.all_channel_names();
        self.init(npixels, spec.nchannels, &types, &names)
    }

    /// Sets every pixel's sample count to zero.
    ///
    /// Shape, capacities and the arena are kept.
    pub fn clear(&mut self) {
        self.nsamples.fill(0);
    }

    /// Releases the arena and resets all counts and capacities.
    ///
    /// The store stays initialized with the same shape.
    pub fn free(&mut self) {
        self.nsamples.fill(0);
        self.capacity.fill(0);
        self.offsets.fill(0);
        self.data = Vec::new();
        self.dead_bytes = 0;
        self.allocated = false;
    }

    /// Whether `init` has been called.
    #[inline]
    pub fn initialized(&self) -> bool {
        self.initialized
    }

    /// Whether the sample arena exists. While it does not, `set_capacity`
    /// only updates metadata.
    #[inline]
    pub fn allocated(&self) -> bool {
        self.allocated
    }

    /// Number of pixels.
    #[inline]
    pub fn pixels(&self) -> usize {
        self.npixels
    }

    /// Number of channels.
    #[inline]
    pub fn channels(&self) -> usize {
        self.channels.len()
    }

    /// Store configuration.
    #[inline]
    pub fn config(&self) -> &DeepConfig {
        &self.config
    }

    /// Replaces the store configuration.
    pub fn set_config(&mut self, config: DeepConfig) {
        self.config = config;
    }

    /// The channel descriptor table.
    #[inline]
    pub fn channel_table(&self) -> &ChannelTable {
        &self.channels
    }

    /// Z channel index.
    #[inline]
    pub fn z_channel(&self) -> Option<usize> {
        self.channels.z_channel()
    }

    /// Zback channel index, or Z if there is no Zback.
    #[inline]
    pub fn zback_channel(&self) -> Option<usize> {
        self.channels.zback_channel()
    }

    /// Alpha channel index.
    #[inline]
    pub fn a_channel(&self) -> Option<usize> {
        self.channels.a_channel()
    }

    /// AR channel index, or A if there is no AR.
    #[inline]
    pub fn ar_channel(&self) -> Option<usize> {
        self.channels.ar_channel()
    }

    /// AG channel index, or A if there is no AG.
    #[inline]
    pub fn ag_channel(&self) -> Option<usize> {
        self.channels.ag_channel()
    }

    /// AB channel index, or A if there is no AB.
    #[inline]
    pub fn ab_channel(&self) -> Option<usize> {
        self.channels.ab_channel()
    }

    /// Name of channel `c`.
    pub fn channelname(&self, c: usize) -> DeepResult<&str> {
        Ok(self.channels.get(c)?.name.as_str())
    }

    /// Type of channel `c`.
    pub fn channeltype(&self, c: usize) -> DeepResult<TypeDesc> {
        Ok(self.channels.get(c)?.ty)
    }

    /// Size in bytes of one value of channel `c`.
    pub fn channelsize(&self, c: usize) -> DeepResult<usize> {
        Ok(self.channels.get(c)?.ty.size())
    }

    /// Size in bytes of one sample (all channels).
    #[inline]
    pub fn samplesize(&self) -> usize {
        self.channels.samplesize()
    }

    /// Whether `other` has the same channel types in the same order.
    pub fn same_channeltypes(&self, other: &DeepData) -> bool {
        self.channels.same_types(&other.channels)
    }

    #[inline]
    pub(crate) fn check_pixel(&self, pixel: usize) -> DeepResult<()> {
        if pixel < self.npixels {
            Ok(())
        } else {
            Err(DeepError::PixelOutOfRange {
                pixel,
                pixels: self.npixels,
            })
        }
    }

    #[inline]
    fn check_sample(&self, pixel: usize, sample: usize) -> DeepResult<()> {
        self.check_pixel(pixel)?;
        let samples = self.nsamples[pixel] as usize;
        if sample < samples {
            Ok(())
        } else {
            Err(DeepError::SampleOutOfRange {
                pixel,
                sample,
                samples,
            })
        }
    }

    #[inline]
    fn check_channel(&self, channel: usize) -> DeepResult<()> {
        self.channels.get(channel).map(|_| ())
    }

    /// Number of samples in `pixel`.
    pub fn samples(&self, pixel: usize) -> DeepResult<usize> {
        self.check_pixel(pixel)?;
        Ok(self.nsamples[pixel] as usize)
    }

    /// Unchecked sample count, for loops over a validated pixel.
    #[inline]
    pub(crate) fn count(&self, pixel: usize) -> usize {
        self.nsamples[pixel] as usize
    }

    /// Sets the number of samples in `pixel`.
    ///
    /// Growing past the capacity relocates the record to fit exactly `n`
    /// samples; newly visible samples are zero. Shrinking keeps the
    /// capacity.
    pub fn set_samples(&mut self, pixel: usize, n: usize) -> DeepResult<()> {
        self.check_pixel(pixel)?;
        let n32 = to_count(n)?;
        let old = self.nsamples[pixel];
        if n32 > self.capacity[pixel] {
            self.set_record_capacity(pixel, n32)?;
        }
        if self.allocated && n32 > old {
            let ss = self.samplesize();
            let start = self.offsets[pixel] + old as usize * ss;
            self.data[start..start + (n32 - old) as usize * ss].fill(0);
        }
        self.nsamples[pixel] = n32;
        Ok(())
    }

    /// Sets the sample count of every pixel at once.
    ///
    /// `counts` must have one entry per pixel. All growth is planned in one
    /// pass with a single arena reservation.
    pub fn set_all_samples(&mut self, counts: &[u32]) -> DeepResult<()> {
        if counts.len() != self.npixels {
            return Err(DeepError::SizeMismatch {
                what: "sample counts",
                expected: self.npixels,
                actual: counts.len(),
            });
        }

        if !self.allocated {
            for ((n, cap), &count) in self.nsamples.iter_mut().zip(&mut self.capacity).zip(counts) {
                *n = count;
                *cap = (*cap).max(count);
            }
            debug!(pixels = counts.len(), "sample counts set before allocation");
            return Ok(());
        }

        let ss = self.samplesize();
        let growth: usize = counts
            .iter()
            .zip(&self.capacity)
            .filter(|(count, cap)| count > cap)
            .map(|(&count, _)| count as usize * ss)
            .sum();
        if growth > 0 {
            self.data
                .try_reserve(growth)
                .map_err(|_| DeepError::AllocationFailed { requested: growth })?;
        }

        let mut relocated = 0usize;
        for (pixel, &count) in counts.iter().enumerate() {
            if count > self.capacity[pixel] {
                self.relocate(pixel, count)?;
                relocated += 1;
            }
            let old = self.nsamples[pixel];
            if count > old {
                let start = self.offsets[pixel] + old as usize * ss;
                self.data[start..start + (count - old) as usize * ss].fill(0);
            }
            self.nsamples[pixel] = count;
        }
        debug!(relocated, growth_bytes = growth, "sample counts set");
        self.maybe_compact()
    }

    /// Reserved sample slots for `pixel`.
    pub fn capacity(&self, pixel: usize) -> DeepResult<usize> {
        self.check_pixel(pixel)?;
        Ok(self.capacity[pixel] as usize)
    }

    /// Sets the reserved sample slots for `pixel`.
    ///
    /// Before allocation this only records the number. Afterwards, growth
    /// relocates the record and shrinking leaves the tail slots dead.
    /// Shrinking below the sample count truncates the count.
    pub fn set_capacity(&mut self, pixel: usize, n: usize) -> DeepResult<()> {
        self.check_pixel(pixel)?;
        let n32 = to_count(n)?;
        self.set_record_capacity(pixel, n32)?;
        self.maybe_compact()
    }

    fn set_record_capacity(&mut self, pixel: usize, cap: u32) -> DeepResult<()> {
        let old = self.capacity[pixel];
        if cap == old {
            return Ok(());
        }
        if !self.allocated {
            self.capacity[pixel] = cap;
            self.nsamples[pixel] = self.nsamples[pixel].min(cap);
            return Ok(());
        }
        if cap > old {
            self.relocate(pixel, cap)
        } else {
            self.dead_bytes += (old - cap) as usize * self.samplesize();
            self.capacity[pixel] = cap;
            self.nsamples[pixel] = self.nsamples[pixel].min(cap);
            Ok(())
        }
    }

    /// Moves a record to fresh arena space sized for `cap` samples.
    ///
    /// A record that already ends the arena grows in place.
    fn relocate(&mut self, pixel: usize, cap: u32) -> DeepResult<()> {
        debug_assert!(self.allocated);
        let ss = self.samplesize();
        let old_cap = self.capacity[pixel] as usize;
        let old_off = self.offsets[pixel];
        let new_bytes = cap as usize * ss;

        if old_off + old_cap * ss == self.data.len() && old_cap > 0 {
            let extra = new_bytes - old_cap * ss;
            self.data
                .try_reserve(extra)
                .map_err(|_| DeepError::AllocationFailed { requested: extra })?;
            self.data.resize(old_off + new_bytes, 0);
            trace!(pixel, cap, "record grown in place");
        } else {
            let new_off = self.data.len();
            self.data
                .try_reserve(new_bytes)
                .map_err(|_| DeepError::AllocationFailed { requested: new_bytes })?;
            self.data.resize(new_off + new_bytes, 0);
            let keep = self.nsamples[pixel].min(cap) as usize * ss;
            self.data.copy_within(old_off..old_off + keep, new_off);
            self.offsets[pixel] = new_off;
            self.dead_bytes += old_cap * ss;
            trace!(pixel, cap, from = old_off, to = new_off, "record relocated");
        }
        self.capacity[pixel] = cap;
        Ok(())
    }

    fn maybe_compact(&mut self) -> DeepResult<()> {
        let Some(ratio) = self.config.auto_compact_ratio else {
            return Ok(());
        };
        let reserved = self.data.len() - self.dead_bytes;
        if self.dead_bytes > 0 && self.dead_bytes as f64 > ratio as f64 * reserved as f64 {
            self.compact()?;
        }
        Ok(())
    }

    /// Lays out the arena now, in pixel order, if it does not exist yet.
    pub fn alloc(&mut self) -> DeepResult<()> {
        if self.allocated {
            return Ok(());
        }
        let ss = self.samplesize();
        let slots: usize = self.capacity.iter().map(|&c| c as usize).sum();
        let bytes = slots
            .checked_mul(ss)
            .ok_or(DeepError::AllocationFailed { requested: usize::MAX })?;
        self.data = alloc_zeroed(bytes)?;

        let mut offset = 0usize;
        for (off, &cap) in self.offsets.iter_mut().zip(&self.capacity) {
            *off = offset;
            offset += cap as usize * ss;
        }
        self.dead_bytes = 0;
        self.allocated = true;
        debug!(bytes, pixels = self.npixels, "deep arena allocated");
        Ok(())
    }

    /// Repacks the arena in pixel order, dropping dead regions.
    ///
    /// Capacities are kept.
    pub fn compact(&mut self) -> DeepResult<()> {
        if !self.allocated {
            return Ok(());
        }
        let ss = self.samplesize();
        let bytes = self.capacity.iter().map(|&c| c as usize).sum::<usize>() * ss;
        let mut data = alloc_zeroed(bytes)?;

        let mut offset = 0usize;
        for pixel in 0..self.npixels {
            let live = self.nsamples[pixel] as usize * ss;
            let old = self.offsets[pixel];
            data[offset..offset + live].copy_from_slice(&self.data[old..old + live]);
            self.offsets[pixel] = offset;
            offset += self.capacity[pixel] as usize * ss;
        }
        debug!(
            before = self.data.len(),
            after = bytes,
            "deep arena compacted"
        );
        self.data = data;
        self.dead_bytes = 0;
        Ok(())
    }

    /// Trims every capacity to its sample count and compacts.
    pub fn shrink_to_fit(&mut self) -> DeepResult<()> {
        if !self.allocated {
            self.capacity.copy_from_slice(&self.nsamples);
            return Ok(());
        }
        let ss = self.samplesize();
        for (cap, &n) in self.capacity.iter_mut().zip(&self.nsamples) {
            self.dead_bytes += (*cap - n) as usize * ss;
            *cap = n;
        }
        self.compact()
    }

    /// Arena occupancy.
    pub fn arena_stats(&self) -> ArenaStats {
        let ss = self.samplesize();
        let live: usize = self.nsamples.iter().map(|&n| n as usize).sum::<usize>() * ss;
        let reserved: usize = self.capacity.iter().map(|&c| c as usize).sum::<usize>() * ss;
        ArenaStats {
            live_bytes: live,
            reserved_bytes: reserved,
            dead_bytes: self.dead_bytes,
            arena_bytes: self.data.len(),
        }
    }

    /// Inserts `n` zeroed samples into `pixel` before sample `pos`.
    ///
    /// `pos` may equal the sample count, which appends. Outgrowing the
    /// capacity relocates the record with the configured growth policy.
    pub fn insert_samples(&mut self, pixel: usize, pos: usize, n: usize) -> DeepResult<()> {
        self.check_pixel(pixel)?;
        let count = self.nsamples[pixel] as usize;
        if pos > count {
            return Err(DeepError::SampleOutOfRange {
                pixel,
                sample: pos,
                samples: count,
            });
        }
        if n == 0 {
            return Ok(());
        }
        let new_count = count
            .checked_add(n)
            .ok_or_else(|| DeepError::InvalidArgument(format!("cannot insert {n} samples into pixel {pixel}")))
            .and_then(to_count)?;

        if !self.allocated {
            self.nsamples[pixel] = new_count;
            self.capacity[pixel] = self.capacity[pixel].max(new_count);
            return Ok(());
        }

        let cap = self.capacity[pixel];
        if new_count > cap {
            let grown = self.config.grown_capacity(cap, new_count);
            self.relocate(pixel, grown)?;
        }

        let ss = self.samplesize();
        let base = self.offsets[pixel];
        let at = base + pos * ss;
        let tail = (count - pos) * ss;
        self.data.copy_within(at..at + tail, at + n * ss);
        self.data[at..at + n * ss].fill(0);
        self.nsamples[pixel] = new_count;
        self.maybe_compact()
    }

    /// Removes `n` samples from `pixel` starting at sample `pos`.
    ///
    /// The capacity is kept.
    pub fn erase_samples(&mut self, pixel: usize, pos: usize, n: usize) -> DeepResult<()> {
        self.check_pixel(pixel)?;
        let count = self.nsamples[pixel] as usize;
        let end = pos.checked_add(n).filter(|&end| end <= count);
        if end.is_none() {
            return Err(DeepError::SampleOutOfRange {
                pixel,
                sample: pos.saturating_add(n),
                samples: count,
            });
        }
        if n == 0 {
            return Ok(());
        }
        if self.allocated {
            let ss = self.samplesize();
            let at = self.offsets[pixel] + pos * ss;
            let tail = (count - pos - n) * ss;
            self.data.copy_within(at + n * ss..at + n * ss + tail, at);
        }
        self.nsamples[pixel] = (count - n) as u32;
        Ok(())
    }

    #[inline]
    fn element_offset(&self, pixel: usize, channel: usize, sample: usize) -> usize {
        let within = self.channels.get(channel).map_or(0, |d| d.offset);
        self.offsets[pixel] + sample * self.samplesize() + within
    }

    /// Unchecked float read for validated indices; zero before allocation.
    #[inline]
    pub(crate) fn get_f32(&self, pixel: usize, channel: usize, sample: usize) -> f32 {
        debug_assert!(pixel < self.npixels && sample < self.count(pixel));
        if !self.allocated {
            return 0.0;
        }
        let Ok(desc) = self.channels.get(channel) else {
            return 0.0;
        };
        let at = self.offsets[pixel] + sample * self.samplesize() + desc.offset;
        value::read_f32(desc.ty.basetype, &self.data[at..at + desc.ty.size()])
    }

    /// Unchecked float write for validated indices on an allocated store.
    #[inline]
    pub(crate) fn put_f32(&mut self, pixel: usize, channel: usize, sample: usize, v: f32) {
        debug_assert!(self.allocated && pixel < self.npixels && sample < self.count(pixel));
        let Ok(desc) = self.channels.get(channel) else {
            return;
        };
        let ty = desc.ty;
        let at = self.offsets[pixel] + sample * self.samplesize() + desc.offset;
        value::write_f32(ty.basetype, &mut self.data[at..at + ty.size()], v);
    }

    /// Value of one channel of one sample, as `f32`.
    ///
    /// Integer channels are reinterpreted: the result is `f32::from_bits` of
    /// the stored bits.
    pub fn deep_value(&self, pixel: usize, channel: usize, sample: usize) -> DeepResult<f32> {
        self.check_sample(pixel, sample)?;
        self.check_channel(channel)?;
        Ok(self.get_f32(pixel, channel, sample))
    }

    /// Value of one channel of one sample, as `u32`.
    ///
    /// Integer channels return their stored bits.
    pub fn deep_value_uint(&self, pixel: usize, channel: usize, sample: usize) -> DeepResult<u32> {
        self.check_sample(pixel, sample)?;
        let desc = self.channels.get(channel)?;
        if !self.allocated {
            return Ok(0);
        }
        let at = self.element_offset(pixel, channel, sample);
        Ok(value::read_u32(desc.ty.basetype, &self.data[at..at + desc.ty.size()]))
    }

    /// Sets one channel of one sample from an `f32`.
    ///
    /// Integer channels receive `v.to_bits()` narrowed to their width.
    pub fn set_deep_value(&mut self, pixel: usize, channel: usize, sample: usize, v: f32) -> DeepResult<()> {
        self.check_sample(pixel, sample)?;
        self.check_channel(channel)?;
        self.alloc()?;
        self.put_f32(pixel, channel, sample, v);
        Ok(())
    }

    /// Sets one channel of one sample from a `u32`.
    ///
    /// Integer channels receive the bits unchanged.
    pub fn set_deep_value_uint(&mut self, pixel: usize, channel: usize, sample: usize, v: u32) -> DeepResult<()> {
        self.check_sample(pixel, sample)?;
        let ty = self.channels.get(channel)?.ty;
        self.alloc()?;
        let at = self.element_offset(pixel, channel, sample);
        value::write_u32(ty.basetype, &mut self.data[at..at + ty.size()], v);
        Ok(())
    }

    /// Bytes of one channel value, or `None` when the sample does not exist
    /// (including pixels with no samples) or the arena is not allocated.
    ///
    /// The slice borrows the store, so no mutation can move it.
    pub fn data_ptr(&self, pixel: usize, channel: usize, sample: usize) -> DeepResult<Option<&[u8]>> {
        self.check_pixel(pixel)?;
        let size = self.channels.get(channel)?.ty.size();
        if !self.allocated || sample >= self.count(pixel) {
            return Ok(None);
        }
        let at = self.element_offset(pixel, channel, sample);
        Ok(Some(&self.data[at..at + size]))
    }

    /// Mutable bytes of one channel value, allocating the arena if needed.
    pub fn data_ptr_mut(&mut self, pixel: usize, channel: usize, sample: usize) -> DeepResult<Option<&mut [u8]>> {
        self.check_pixel(pixel)?;
        let size = self.channels.get(channel)?.ty.size();
        if sample >= self.count(pixel) {
            return Ok(None);
        }
        self.alloc()?;
        let at = self.element_offset(pixel, channel, sample);
        Ok(Some(&mut self.data[at..at + size]))
    }

    /// Packed bytes of all active samples of `pixel`.
    ///
    /// Empty for pixels without samples or before allocation.
    pub fn pixel_data(&self, pixel: usize) -> DeepResult<&[u8]> {
        self.check_pixel(pixel)?;
        if !self.allocated {
            return Ok(&[]);
        }
        let at = self.offsets[pixel];
        Ok(&self.data[at..at + self.count(pixel) * self.samplesize()])
    }

    /// Mutable packed bytes of all active samples of `pixel`.
    pub fn pixel_data_mut(&mut self, pixel: usize) -> DeepResult<&mut [u8]> {
        self.check_pixel(pixel)?;
        self.alloc()?;
        let at = self.offsets[pixel];
        let len = self.count(pixel) * self.samplesize();
        Ok(&mut self.data[at..at + len])
    }

    /// Channel types, in channel order.
    pub fn all_channeltypes(&self) -> Vec<TypeDesc> {
        self.channels.types()
    }

    /// Sample counts of all pixels.
    #[inline]
    pub fn all_samples(&self) -> &[u32] {
        &self.nsamples
    }

    fn is_tight(&self) -> bool {
        let ss = self.samplesize();
        let mut expected = 0usize;
        for pixel in 0..self.npixels {
            if self.capacity[pixel] != self.nsamples[pixel]
                || (self.nsamples[pixel] > 0 && self.offsets[pixel] != expected)
            {
                return false;
            }
            expected += self.nsamples[pixel] as usize * ss;
        }
        expected == self.data.len()
    }

    /// Active samples of all pixels, packed in pixel order.
    ///
    /// Borrows the arena when it already has exactly that layout.
    pub fn all_data(&self) -> Cow<'_, [u8]> {
        if self.allocated && self.is_tight() {
            return Cow::Borrowed(&self.data);
        }
        let ss = self.samplesize();
        let live: usize = self.nsamples.iter().map(|&n| n as usize).sum::<usize>() * ss;
        if !self.allocated {
            return Cow::Owned(vec![0; live]);
        }
        let mut packed = Vec::with_capacity(live);
        for pixel in 0..self.npixels {
            let at = self.offsets[pixel];
            packed.extend_from_slice(&self.data[at..at + self.count(pixel) * ss]);
        }
        Cow::Owned(packed)
    }

    /// Fills all active samples from bytes packed as [`DeepData::all_data`]
    /// returns them.
    pub fn set_all_data(&mut self, bytes: &[u8]) -> DeepResult<()> {
        let ss = self.samplesize();
        let live: usize = self.nsamples.iter().map(|&n| n as usize).sum::<usize>() * ss;
        if bytes.len() != live {
            return Err(DeepError::SizeMismatch {
                what: "sample data",
                expected: live,
                actual: bytes.len(),
            });
        }
        self.alloc()?;
        let mut src = 0usize;
        for pixel in 0..self.npixels {
            let len = self.count(pixel) * ss;
            let at = self.offsets[pixel];
            self.data[at..at + len].copy_from_slice(&bytes[src..src + len]);
            src += len;
        }
        Ok(())
    }

    /// One slice per pixel over its active samples, `None` for pixels
    /// without samples.
    pub fn get_pointers(&self) -> Vec<Option<&[u8]>> {
        let ss = self.samplesize();
        (0..self.npixels)
            .map(|pixel| {
                let n = self.count(pixel);
                if n == 0 || !self.allocated {
                    return None;
                }
                let at = self.offsets[pixel];
                Some(&self.data[at..at + n * ss])
            })
            .collect()
    }

    /// Copies one sample of `src` over sample `sample` of `pixel`.
    ///
    /// Both stores must have the same channel types.
    pub fn copy_deep_sample(
        &mut self,
        pixel: usize,
        sample: usize,
        src: &DeepData,
        srcpixel: usize,
        srcsample: usize,
    ) -> DeepResult<()> {
        if !self.same_channeltypes(src) {
            return Err(DeepError::LayoutMismatch);
        }
        self.check_sample(pixel, sample)?;
        src.check_sample(srcpixel, srcsample)?;
        self.alloc()?;

        let ss = self.samplesize();
        let at = self.offsets[pixel] + sample * ss;
        let dst = &mut self.data[at..at + ss];
        if src.allocated {
            let from = src.offsets[srcpixel] + srcsample * ss;
            dst.copy_from_slice(&src.data[from..from + ss]);
        } else {
            dst.fill(0);
        }
        Ok(())
    }

    /// Replaces all samples of `pixel` with those of `srcpixel` in `src`.
    ///
    /// Both stores must have the same channel types.
    pub fn copy_deep_pixel(&mut self, pixel: usize, src: &DeepData, srcpixel: usize) -> DeepResult<()> {
        if !self.same_channeltypes(src) {
            return Err(DeepError::LayoutMismatch);
        }
        self.check_pixel(pixel)?;
        src.check_pixel(srcpixel)?;
        let n = src.count(srcpixel);
        self.set_samples(pixel, n)?;
        if n == 0 {
            return Ok(());
        }
        self.alloc()?;

        let len = n * self.samplesize();
        let at = self.offsets[pixel];
        let dst = &mut self.data[at..at + len];
        if src.allocated {
            let from = src.offsets[srcpixel];
            dst.copy_from_slice(&src.data[from..from + len]);
        } else {
            dst.fill(0);
        }
        Ok(())
    }

    /// Copies sample `from` over sample `to` within one pixel.
    pub(crate) fn copy_sample_within(&mut self, pixel: usize, from: usize, to: usize) {
        debug_assert!(self.allocated && from < self.count(pixel) && to < self.count(pixel));
        let ss = self.samplesize();
        let base = self.offsets[pixel];
        self.data
            .copy_within(base + from * ss..base + (from + 1) * ss, base + to * ss);
    }

    /// Reorders the samples of `pixel` so that new sample `i` is old
    /// sample `order[i]`.
    pub(crate) fn permute_samples(&mut self, pixel: usize, order: &[usize]) {
        debug_assert_eq!(order.len(), self.count(pixel));
        if !self.allocated {
            return;
        }
        let ss = self.samplesize();
        let base = self.offsets[pixel];
        let original = self.data[base..base + order.len() * ss].to_vec();
        for (dst, &src) in order.iter().enumerate() {
            self.data[base + dst * ss..base + (dst + 1) * ss]
                .copy_from_slice(&original[src * ss..(src + 1) * ss]);
        }
    }
}
