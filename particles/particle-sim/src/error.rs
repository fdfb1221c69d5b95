use particle_sheet::SheetError;
use thiserror::Error;

use crate::attributes::ParticleAttribute;

/// Error types for building and driving particle systems
#[derive(Error, Debug)]
pub enum ParticleError {
    /// A sheet could not be loaded
    #[error("Sheet error: {0}")]
    Sheet(#[from] SheetError),

    /// An operator reads an attribute nothing earlier in the pipeline writes
    #[error("Operator '{operator}' reads {attribute:?} before anything writes it")]
    UnwrittenAttribute {
        operator: &'static str,
        attribute: ParticleAttribute,
    },

    /// Control point id outside the supported range
    #[error("Invalid control point: {0}")]
    InvalidControlPoint(usize),

    /// More particles requested than a collection can hold
    #[error("Capacity exceeded: requested {requested}, maximum {max}")]
    CapacityExceeded { requested: usize, max: usize },

    /// Attribute has no per-particle storage in this collection
    #[error("Attribute not allocated: {0:?}")]
    AttributeNotAllocated(ParticleAttribute),

    /// Definition or operator configuration is unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Operator context data has an unexpected type
    #[error("Context data mismatch for operator '{operator}'")]
    ContextMismatch { operator: &'static str },
}

/// Result type using ParticleError
pub type Result<T> = std::result::Result<T, ParticleError>;
