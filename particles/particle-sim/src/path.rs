//! Quadratic bezier paths between control points

use glam::Vec3;

use crate::control_points::{ControlPointMask, check_control_point, control_point_mask};
use crate::error::Result;

/// How the bulge direction of a path is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum BulgeControl {
    /// Random offset per evaluation
    #[default]
    Random,
    /// Along the forward axis of the start control point
    StartOrientation,
    /// Along the forward axis of the end control point
    EndOrientation,
}

/// Path description shared by path-based operators
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct PathParams {
    /// Control point at `t = 0`
    pub start_control_point: usize,
    /// Control point at `t = 1`
    pub end_control_point: usize,
    /// Bulge magnitude
    pub bulge: f32,
    /// Bulge direction source
    pub bulge_control: BulgeControl,
    /// Position of the middle point along the start-end segment
    pub mid_point: f32,
}

impl Default for PathParams {
    fn default() -> Self {
        Self {
            start_control_point: 0,
            end_control_point: 0,
            bulge: 0.0,
            bulge_control: BulgeControl::Random,
            mid_point: 0.5,
        }
    }
}

impl PathParams {
    /// Control points the path samples
    pub fn control_point_mask(&self) -> ControlPointMask {
        control_point_mask(self.start_control_point) | control_point_mask(self.end_control_point)
    }

    /// Both ends must name valid control points
    pub fn validate(&self) -> Result<()> {
        check_control_point(self.start_control_point)?;
        check_control_point(self.end_control_point)?;
        Ok(())
    }
}

/// Start, middle and end point of a quadratic bezier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathValues {
    /// Point at `t = 0`
    pub start: Vec3,
    /// Control point
    pub mid: Vec3,
    /// Point at `t = 1`
    pub end: Vec3,
}

impl PathValues {
    /// Straight path with the middle point at `mid_point`
    pub fn straight(start: Vec3, end: Vec3, mid_point: f32) -> Self {
        Self {
            start,
            mid: start.lerp(end, mid_point),
            end,
        }
    }

    /// Evaluate `lerp(lerp(start, mid, t), lerp(mid, end, t), t)`
    #[inline]
    pub fn evaluate(&self, t: f32) -> Vec3 {
        let l0 = self.start + (self.mid - self.start) * t;
        let l1 = self.mid + (self.end - self.mid) * t;
        l0 + (l1 - l0) * t
    }

    /// Bulge the middle point along a control point's forward axis.
    ///
    /// The offset shrinks to zero when the path already runs along that axis.
    pub fn bulge_along(&mut self, forward: Vec3, bulge: f32) {
        let target = self.end - self.start;
        let length = target.length();
        let scale = if length > 1.0e-6 {
            1.0 - (target / length).dot(forward).abs()
        } else {
            0.0
        };
        let forward_length = forward.length();
        if forward_length > 1.0e-6 {
            self.mid += forward * (bulge * length * scale / forward_length);
        }
    }
}
