//! Utilities Module
//!
//! Settings and logging shared across the crate.

pub mod logging;
pub mod settings;
