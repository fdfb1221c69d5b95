//! Small helpers shared by the particle crates.

pub mod debug;
