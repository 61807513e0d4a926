//! Core domain model for playlake.
//!
//! This crate defines the raw input record schemas (song metadata and
//! usage-log events), the star-schema rows derived from them, the songplay
//! surrogate key, and the calendar decomposition of event timestamps.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod error;
pub mod model;
pub mod time;

pub use error::{Error, Result};
pub use time::{Calendar, TimeParts};
