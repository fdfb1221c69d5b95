//! Distance and plane constraints

use glam::Vec3;

use crate::attributes::{AttributeMask, ParticleAttribute};
use crate::control_points::{ControlPointMask, check_control_point, control_point_mask};
use crate::error::Result;
use crate::operator::{Constraint, OperatorContext, OperatorInfo};
use crate::state::ParticleState;

use super::clamp_to_shell;

/// Shell around a control point
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-support", serde(default))]
pub struct ConstrainDistanceConfig {
    pub min_distance: f32,
    pub max_distance: f32,
    pub control_point: usize,
    /// Offset of the shell centre in the control point's frame
    pub center_offset: Vec3,
    /// Ignore the control point and centre the shell at the offset
    pub global_center: bool,
}

impl Default for ConstrainDistanceConfig {
    fn default() -> Self {
        Self {
            min_distance: 0.0,
            max_distance: 100.0,
            control_point: 0,
            center_offset: Vec3::ZERO,
            global_center: false,
        }
    }
}

/// Keeps particles between a minimum and maximum distance of a centre
#[derive(Debug, Clone, Default)]
pub struct ConstrainDistance {
    config: ConstrainDistanceConfig,
}

impl ConstrainDistance {
    pub fn new(config: ConstrainDistanceConfig) -> Self {
        Self { config }
    }

    fn center(&self, state: &ParticleState) -> Vec3 {
        if self.config.global_center {
            return self.config.center_offset;
        }
        let point = state.control_points.get(self.config.control_point);
        point
            .transform_with_origin(point.position)
            .transform_point3(self.config.center_offset)
    }
}

impl OperatorInfo for ConstrainDistance {
    fn name(&self) -> &'static str {
        "Constrain distance to control point"
    }

    fn written_attributes(&self) -> AttributeMask {
        AttributeMask::XYZ
    }

    fn read_attributes(&self) -> AttributeMask {
        AttributeMask::XYZ
    }

    fn read_control_points(&self) -> ControlPointMask {
        if self.config.global_center {
            0
        } else {
            control_point_mask(self.config.control_point)
        }
    }

    fn validate(&self) -> Result<()> {
        check_control_point(self.config.control_point)?;
        Ok(())
    }
}

impl Constraint for ConstrainDistance {
    fn constrain(&self, state: &mut ParticleState, _ctx: &mut OperatorContext<'_>) -> bool {
        let center = self.center(state);
        let (min, max) = (self.config.min_distance, self.config.max_distance);
        let mut changed = false;
        for particle in 0..state.active() {
            let xyz = state.store.vector(ParticleAttribute::Xyz, particle);
            if let Some(clamped) = clamp_to_shell(xyz, center, min, max) {
                state.store.set_vector(ParticleAttribute::Xyz, particle, clamped);
                changed = true;
            }
        }
        changed
    }
}

/// Half-space definition
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-support", serde(default))]
pub struct PlaneConstraintConfig {
    /// Point on the plane, relative to the control point unless global
    pub point_on_plane: Vec3,
    /// Side of the plane particles stay on
    pub plane_normal: Vec3,
    pub control_point: usize,
    /// Use the point as a world position
    pub global_origin: bool,
    /// Use the normal as a world direction instead of the control point's
    /// frame
    pub global_normal: bool,
}

impl Default for PlaneConstraintConfig {
    fn default() -> Self {
        Self {
            point_on_plane: Vec3::ZERO,
            plane_normal: Vec3::Z,
            control_point: 0,
            global_origin: false,
            global_normal: false,
        }
    }
}

/// Keeps particles on the positive side of a plane
#[derive(Debug, Clone, Default)]
pub struct PlaneConstraint {
    config: PlaneConstraintConfig,
}

impl PlaneConstraint {
    pub fn new(config: PlaneConstraintConfig) -> Self {
        Self { config }
    }

    fn plane(&self, state: &ParticleState) -> (Vec3, Vec3) {
        let config = &self.config;
        let point = state.control_points.get(config.control_point);
        let transform = point.transform_with_origin(point.position);
        let origin = if config.global_origin {
            config.point_on_plane
        } else {
            transform.transform_point3(config.point_on_plane)
        };
        let normal = if config.global_normal {
            config.plane_normal
        } else {
            transform.transform_vector3(config.plane_normal)
        };
        (origin, normal.normalize_or_zero())
    }
}

impl OperatorInfo for PlaneConstraint {
    fn name(&self) -> &'static str {
        "Prevent passing through a plane"
    }

    fn written_attributes(&self) -> AttributeMask {
        AttributeMask::XYZ
    }

    fn read_attributes(&self) -> AttributeMask {
        AttributeMask::XYZ
    }

    fn read_control_points(&self) -> ControlPointMask {
        control_point_mask(self.config.control_point)
    }

    fn validate(&self) -> Result<()> {
        check_control_point(self.config.control_point)?;
        Ok(())
    }
}

impl Constraint for PlaneConstraint {
    fn constrain(&self, state: &mut ParticleState, _ctx: &mut OperatorContext<'_>) -> bool {
        let (origin, normal) = self.plane(state);
        let mut changed = false;
        for particle in 0..state.active() {
            let xyz = state.store.vector(ParticleAttribute::Xyz, particle);
            let depth = (xyz - origin).dot(normal);
            if depth < 0.0 {
                state
                    .store
                    .set_vector(ParticleAttribute::Xyz, particle, xyz - normal * depth);
                changed = true;
            }
        }
        changed
    }
}
