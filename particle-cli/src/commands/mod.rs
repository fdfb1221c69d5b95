//! Command implementations

pub mod sheet;
pub mod simulate;
