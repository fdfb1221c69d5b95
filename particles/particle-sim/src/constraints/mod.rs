//! Built-in constraints
//!
//! Constraints run after the operators of every step and pull positions
//! back into a valid region. Each reports whether it moved anything so the
//! collection can stop iterating once all of them are satisfied.

mod collision;
mod distance;
mod path;

pub use collision::{WorldCollision, WorldCollisionConfig};
pub use distance::{
    ConstrainDistance, ConstrainDistanceConfig, PlaneConstraint, PlaneConstraintConfig,
};
pub use path::{ConstrainToPath, ConstrainToPathConfig};

use glam::Vec3;

/// Point at `min..=max` distance from `center` closest to `position`, or
/// `None` when it already lies in the shell
pub(crate) fn clamp_to_shell(position: Vec3, center: Vec3, min: f32, max: f32) -> Option<Vec3> {
    let offset = position - center;
    let distance = offset.length();
    if distance > max {
        Some(center + offset * (max / distance))
    } else if distance < min && distance > 0.0 {
        Some(center + offset * (min / distance))
    } else {
        None
    }
}
