//! # vfx-deep
//!
//! Deep pixel storage and depth compositing.
//!
//! A deep image stores, per pixel, a variable-length list of samples. Each
//! sample covers a depth range `[Z, Zback)` and carries color, alpha and any
//! other channels, each with its own element type.
//!
//! # Modules
//!
//! - [`deepdata`] - The sample store: directory, arena and typed accessors
//! - [`channels`] - Channel table and semantic roles (Z, Zback, A, AR/AG/AB)
//! - [`ops`] - Whole-image flatten, deepen, merge and holdout
//!
//! Per-pixel depth algorithms (`split`, `sort`, `merge_overlaps`,
//! `merge_deep_pixels`, `opaque_z`, `occlusion_cull`) are methods on
//! [`DeepData`].
//!
//! # Example
//!
//! ```rust
//! use vfx_core::TypeDesc;
//! use vfx_deep::DeepData;
//!
//! let mut deep = DeepData::new(1, &[TypeDesc::FLOAT], &["R", "A", "Z", "Zback"]).unwrap();
//! deep.set_samples(0, 1).unwrap();
//! for (c, v) in [0.3, 0.6, 1.0, 5.0].into_iter().enumerate() {
//!     deep.set_deep_value(0, c, 0, v).unwrap();
//! }
//!
//! assert!(deep.split(0, 2.0).unwrap());
//! assert_eq!(deep.samples(0).unwrap(), 2);
//! assert_eq!(deep.opaque_z(0).unwrap(), f32::INFINITY);
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod algo;
pub mod channels;
mod config;
pub mod deepdata;
mod error;
pub mod ops;
mod value;

pub use algo::EMPTY_DEPTH;
pub use channels::{ChannelDesc, ChannelRole, ChannelTable};
pub use config::DeepConfig;
pub use deepdata::{ArenaStats, DeepData};
pub use error::{DeepError, DeepResult};
pub use value::{read_f32, read_u32, write_f32, write_u32};
