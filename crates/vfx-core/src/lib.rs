//! # vfx-core
//!
//! Core value types shared by the deep-image crates.
//!
//! - [`TypeDesc`], [`BaseType`] - Element type of one channel
//! - [`ImageSpec`] - Pixel grid dimensions and channel layout
//! - [`Error`], [`Result`] - Validation errors for the above
//!
//! ## Crate Structure
//!
//! ```text
//! vfx-core (this crate)
//!    ^
//!    |
//!    +-- vfx-deep (deep pixel store and depth algorithms)
//!    +-- vfx-bench
//! ```
//!
//! ## Feature Flags
//!
//! - `serde` - Serialization for [`BaseType`] and [`TypeDesc`]

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod format;
pub mod spec;

pub use error::*;
pub use format::*;
pub use spec::*;

/// Prelude module for convenient imports.
///
/// ```
/// use vfx_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::format::{BaseType, TypeDesc};
    pub use crate::spec::ImageSpec;
}
