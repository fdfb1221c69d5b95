//! Shared utilities for the particles CLI

pub mod format;
pub mod table;

pub use format::*;
pub use table::*;
