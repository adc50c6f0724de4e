//! Utility types and functions.
//!
//! This module contains fundamental types used throughout the crate:
//! - [`Error`] / [`Result`] - Error handling
//! - Math type re-exports from glam
//! - Timestamp helpers

mod error;
mod math;
pub mod clock;

pub use error::*;
pub use math::*;
