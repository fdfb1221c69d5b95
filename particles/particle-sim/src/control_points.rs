//! Control points
//!
//! Control points are transforms supplied by the game between simulation
//! steps. Each keeps its position at the current and the previous step, and
//! any time in between is sampled by linear interpolation.

use glam::{Mat4, Vec3};

use crate::batch::FourVectors;
use crate::error::{ParticleError, Result};

/// Number of control points per collection
pub const MAX_CONTROL_POINTS: usize = 64;

/// Bitmask over control point ids
pub type ControlPointMask = u64;

/// Mask covering the inclusive id range `first..=last`
pub fn control_point_range_mask(first: usize, last: usize) -> ControlPointMask {
    let (first, last) = (first.min(63), last.min(63));
    if first > last {
        return 0;
    }
    let upper = if last == 63 {
        u64::MAX
    } else {
        (1u64 << (last + 1)) - 1
    };
    upper & !((1u64 << first) - 1)
}

/// Mask for a single control point id
pub fn control_point_mask(id: usize) -> ControlPointMask {
    if id < MAX_CONTROL_POINTS { 1 << id } else { 0 }
}

/// One externally driven transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlPoint {
    /// Position at the current step
    pub position: Vec3,
    /// Position at the previous step
    pub prev_position: Vec3,
    /// Forward axis
    pub forward: Vec3,
    /// Right axis
    pub right: Vec3,
    /// Up axis
    pub up: Vec3,
    /// Parent control point
    pub parent: Option<usize>,
}

impl Default for ControlPoint {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            prev_position: Vec3::ZERO,
            forward: Vec3::X,
            right: Vec3::NEG_Y,
            up: Vec3::Z,
            parent: None,
        }
    }
}

impl ControlPoint {
    /// Transform with columns forward, left, up and `origin`
    pub fn transform_with_origin(&self, origin: Vec3) -> Mat4 {
        Mat4::from_cols(
            self.forward.extend(0.0),
            (-self.right).extend(0.0),
            self.up.extend(0.0),
            origin.extend(1.0),
        )
    }
}

/// Source of control point transforms owned by the game
pub trait ControlPointSource {
    /// Position and orientation `(position, forward, right, up)` of a control
    /// point, or `None` when the source does not drive it
    fn control_point(&self, id: usize) -> Option<(Vec3, Vec3, Vec3, Vec3)>;
}

/// The control points of one collection
#[derive(Debug, Clone)]
pub struct ControlPointSet {
    points: [ControlPoint; MAX_CONTROL_POINTS],
    highest: usize,
}

impl Default for ControlPointSet {
    fn default() -> Self {
        Self {
            points: [ControlPoint::default(); MAX_CONTROL_POINTS],
            highest: 0,
        }
    }
}

/// The id itself, or [`ParticleError::InvalidControlPoint`] when it is
/// outside the control point table
pub fn check_control_point(id: usize) -> Result<usize> {
    if id < MAX_CONTROL_POINTS {
        Ok(id)
    } else {
        Err(ParticleError::InvalidControlPoint(id))
    }
}

impl ControlPointSet {
    /// All control points at the origin with the default basis
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest id that has been set
    pub fn highest_index(&self) -> usize {
        self.highest
    }

    /// Control point by id, the default point for out-of-range ids
    pub fn get(&self, id: usize) -> ControlPoint {
        self.points.get(id).copied().unwrap_or_default()
    }

    fn touch(&mut self, id: usize) {
        self.highest = self.highest.max(id);
    }

    /// Move a control point
    pub fn set_position(&mut self, id: usize, position: Vec3) -> Result<()> {
        let id = check_control_point(id)?;
        self.touch(id);
        self.points[id].position = position;
        Ok(())
    }

    /// Set both the current and the previous position
    pub fn set_position_and_previous(&mut self, id: usize, position: Vec3) -> Result<()> {
        let id = check_control_point(id)?;
        self.touch(id);
        self.points[id].position = position;
        self.points[id].prev_position = position;
        Ok(())
    }

    /// Orient a control point
    pub fn set_orientation(&mut self, id: usize, forward: Vec3, right: Vec3, up: Vec3) -> Result<()> {
        let id = check_control_point(id)?;
        self.touch(id);
        let point = &mut self.points[id];
        point.forward = forward;
        point.right = right;
        point.up = up;
        Ok(())
    }

    /// Set position and orientation from a transform whose columns are
    /// forward, left, up and origin
    pub fn set_transform(&mut self, id: usize, transform: &Mat4) -> Result<()> {
        let forward = transform.x_axis.truncate();
        let left = transform.y_axis.truncate();
        let up = transform.z_axis.truncate();
        self.set_orientation(id, forward, -left, up)?;
        self.set_position(id, transform.w_axis.truncate())
    }

    /// Link a control point to a parent
    pub fn set_parent(&mut self, id: usize, parent: Option<usize>) -> Result<()> {
        let id = check_control_point(id)?;
        if let Some(parent) = parent {
            check_control_point(parent)?;
        }
        self.touch(id);
        self.points[id].parent = parent;
        Ok(())
    }

    /// Copy current positions into the previous slots
    pub fn update_previous(&mut self) {
        for point in &mut self.points[..=self.highest] {
            point.prev_position = point.position;
        }
    }

    /// Pull the ids named by `mask` from a source
    pub fn update_from(&mut self, source: &dyn ControlPointSource, mask: ControlPointMask) {
        for id in 0..MAX_CONTROL_POINTS {
            if mask & (1 << id) == 0 {
                continue;
            }
            if let Some((position, forward, right, up)) = source.control_point(id) {
                self.touch(id);
                let point = &mut self.points[id];
                point.position = position;
                point.forward = forward;
                point.right = right;
                point.up = up;
            }
        }
    }

    /// Position at `time`, interpolated between the previous step
    /// (`cur_time - dt`) and the current one.
    ///
    /// Times at or before the previous step, and a zero `dt`, give the
    /// current position rather than the previous one.
    pub fn position_at_time(&self, id: usize, time: f32, cur_time: f32, dt: f32) -> Vec3 {
        let point = self.get(id);
        let prev_time = cur_time - dt;
        let time = time.max(prev_time);
        let delta = time - prev_time;
        if dt == 0.0 || delta == 0.0 {
            return point.position;
        }
        point
            .prev_position
            .lerp(point.position, (delta / dt).min(1.0))
    }

    /// Transform at `time`; only the position is interpolated
    pub fn transform_at_time(&self, id: usize, time: f32, cur_time: f32, dt: f32) -> Mat4 {
        self.get(id)
            .transform_with_origin(self.position_at_time(id, time, cur_time, dt))
    }

    /// Finite-difference velocity over the previous step, zero when `dt` is 0
    pub fn velocity(&self, id: usize, dt: f32) -> Vec3 {
        if dt == 0.0 {
            return Vec3::ZERO;
        }
        let point = self.get(id);
        (point.position - point.prev_position) / dt
    }

    /// Transform a batch of local positions into the control point's frame
    pub fn transform_batch(&self, id: usize, local: &FourVectors, origin: Vec3) -> FourVectors {
        let point = self.get(id);
        local.rotate_by(point.forward, point.right, point.up) + FourVectors::splat(origin)
    }
}
