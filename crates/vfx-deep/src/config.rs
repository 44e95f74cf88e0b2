//! Tuning knobs for a deep store.

/// Store configuration.
///
/// # Example
///
/// ```rust
/// use vfx_deep::{DeepConfig, DeepData};
/// use vfx_core::TypeDesc;
///
/// let config = DeepConfig {
///     opacity_threshold: 0.999,
///     ..DeepConfig::default()
/// };
/// let dd = DeepData::with_config(16, &[TypeDesc::FLOAT; 2], &["A", "Z"], config).unwrap();
/// assert_eq!(dd.config().opacity_threshold, 0.999);
/// ```
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeepConfig {
    /// Accumulated alpha at which a pixel counts as opaque in
    /// `opaque_z` and `occlusion_cull`.
    pub opacity_threshold: f32,
    /// Capacity multiplier applied when `insert_samples` outgrows a record.
    pub growth_factor: u32,
    /// Smallest capacity a growing record is given.
    pub min_capacity: u32,
    /// Compact the arena once dead bytes exceed this multiple of the
    /// reserved bytes. `None` disables automatic compaction.
    pub auto_compact_ratio: Option<f32>,
}

impl Default for DeepConfig {
    fn default() -> Self {
        Self {
            opacity_threshold: 1.0 - f32::EPSILON,
            growth_factor: 2,
            min_capacity: 4,
            auto_compact_ratio: None,
        }
    }
}

impl DeepConfig {
    /// Capacity to give a record of capacity `current` that must hold
    /// `needed` samples.
    #[inline]
    pub fn grown_capacity(&self, current: u32, needed: u32) -> u32 {
        needed
            .max(current.saturating_mul(self.growth_factor.max(1)))
            .max(self.min_capacity)
    }
}
