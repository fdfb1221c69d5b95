//! Position initializers
//!
//! Each of these places a new particle and seeds its previous position so
//! the difference between the two, divided by the previous step length,
//! is the initial velocity.

use glam::Vec3;
use std::any::Any;

use crate::attributes::{AttributeMask, ParticleAttribute};
use crate::control_points::{
    ControlPointMask, check_control_point, control_point_mask, control_point_range_mask,
};
use crate::error::Result;
use crate::operator::{Initializer, OperatorContext, OperatorInfo};
use crate::path::PathParams;
use crate::state::ParticleState;

fn creation_time(state: &ParticleState, particle: usize) -> f32 {
    let earliest = state.clock.cur_time - state.clock.dt;
    state
        .store
        .float(ParticleAttribute::CreationTime, particle)
        .max(earliest)
}

fn place(state: &mut ParticleState, particle: usize, position: Vec3, previous: Vec3) {
    state
        .store
        .set_vector(ParticleAttribute::Xyz, particle, position);
    state
        .store
        .set_vector(ParticleAttribute::PrevXyz, particle, previous);
}

/// Sphere emission parameters
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-support", serde(default))]
pub struct CreateWithinSphereConfig {
    pub radius_min: f32,
    pub radius_max: f32,
    /// Per-axis stretch of the sphere
    pub distance_bias: Vec3,
    /// Axes with a non-zero component only spawn on their positive side
    pub distance_bias_absolute: Vec3,
    /// Apply the bias in the control point's frame
    pub bias_in_local_system: bool,
    pub control_point: usize,
    /// Outward speed range
    pub speed_min: f32,
    pub speed_max: f32,
    pub speed_random_exponent: f32,
    /// Extra velocity range in the control point's frame
    pub local_speed_min: Vec3,
    pub local_speed_max: Vec3,
    /// Control point whose position scales distance (x), speed (y) and
    /// local speed (z)
    pub scale_control_point: Option<usize>,
}

impl Default for CreateWithinSphereConfig {
    fn default() -> Self {
        Self {
            radius_min: 0.0,
            radius_max: 0.0,
            distance_bias: Vec3::ONE,
            distance_bias_absolute: Vec3::ZERO,
            bias_in_local_system: false,
            control_point: 0,
            speed_min: 0.0,
            speed_max: 0.0,
            speed_random_exponent: 1.0,
            local_speed_min: Vec3::ZERO,
            local_speed_max: Vec3::ZERO,
            scale_control_point: None,
        }
    }
}

/// Spawns particles inside a (possibly stretched) sphere around a control
/// point, optionally moving outwards
#[derive(Debug, Clone, Default)]
pub struct CreateWithinSphere {
    config: CreateWithinSphereConfig,
}

impl CreateWithinSphere {
    pub fn new(config: CreateWithinSphereConfig) -> Self {
        Self { config }
    }
}

impl OperatorInfo for CreateWithinSphere {
    fn name(&self) -> &'static str {
        "Position Within Sphere Random"
    }

    fn written_attributes(&self) -> AttributeMask {
        AttributeMask::XYZ | AttributeMask::PREV_XYZ
    }

    fn read_attributes(&self) -> AttributeMask {
        AttributeMask::CREATION_TIME
    }

    fn read_control_points(&self) -> ControlPointMask {
        control_point_mask(self.config.control_point) | self.non_positional_control_points()
    }

    fn non_positional_control_points(&self) -> ControlPointMask {
        self.config.scale_control_point.map_or(0, control_point_mask)
    }

    fn validate(&self) -> Result<()> {
        check_control_point(self.config.control_point)?;
        if let Some(id) = self.config.scale_control_point {
            check_control_point(id)?;
        }
        Ok(())
    }
}

impl Initializer for CreateWithinSphere {
    fn init_scalar(
        &self,
        state: &mut ParticleState,
        start: usize,
        count: usize,
        _mask: AttributeMask,
        _ctx: &mut OperatorContext<'_>,
    ) {
        let config = &self.config;
        let scale = config
            .scale_control_point
            .map_or(Vec3::ONE, |id| state.control_points.get(id).position);
        let biased = config.distance_bias != Vec3::ONE;
        let has_local_speed =
            config.local_speed_min != Vec3::ZERO || config.local_speed_max != Vec3::ZERO;
        let point = state.control_points.get(config.control_point);

        for particle in start..start + count {
            let ct = creation_time(state, particle);
            let (mut direction, length) = state.random.random_vector_in_unit_sphere();
            for axis in 0..3 {
                if config.distance_bias_absolute[axis] != 0.0 {
                    direction[axis] = direction[axis].abs();
                }
            }
            direction = (direction * config.distance_bias).normalize_or_zero();

            let distance = (config.radius_min + (config.radius_max - config.radius_min) * length)
                * scale.x;
            let local = direction * distance;
            let position = if biased && config.bias_in_local_system {
                state
                    .control_point_transform_at_time(config.control_point, ct)
                    .transform_point3(local)
            } else {
                local + state.control_point_at_time(config.control_point, ct)
            };

            let mut offset = Vec3::ZERO;
            if config.speed_max > 0.0 {
                let speed = state.random.random_float_exp(
                    config.speed_min,
                    config.speed_max,
                    config.speed_random_exponent,
                );
                offset -= direction * speed * scale.y;
            }
            if has_local_speed {
                let speed = state
                    .random
                    .random_vector(config.local_speed_min, config.local_speed_max)
                    * scale.z;
                offset -= point.forward * speed.x - point.right * speed.y + point.up * speed.z;
            }
            offset *= state.clock.prev_dt;

            place(state, particle, position, position + offset);
        }
    }
}

/// Random offset range
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-support", serde(default))]
pub struct PositionOffsetConfig {
    pub offset_min: Vec3,
    pub offset_max: Vec3,
    /// Rotate the offset into the control point's frame
    pub local_coords: bool,
    /// Multiply the offset by the particle radius
    pub proportional: bool,
    pub control_point: usize,
}

/// Shifts already placed particles by a random offset
#[derive(Debug, Clone, Default)]
pub struct PositionOffset {
    config: PositionOffsetConfig,
}

impl PositionOffset {
    pub fn new(config: PositionOffsetConfig) -> Self {
        Self { config }
    }
}

impl OperatorInfo for PositionOffset {
    fn name(&self) -> &'static str {
        "Position Modify Offset Random"
    }

    fn written_attributes(&self) -> AttributeMask {
        AttributeMask::XYZ | AttributeMask::PREV_XYZ
    }

    fn read_attributes(&self) -> AttributeMask {
        let mut mask = AttributeMask::XYZ | AttributeMask::PREV_XYZ | AttributeMask::CREATION_TIME;
        if self.config.proportional {
            mask |= AttributeMask::RADIUS;
        }
        mask
    }

    fn read_control_points(&self) -> ControlPointMask {
        control_point_mask(self.config.control_point)
    }

    fn validate(&self) -> Result<()> {
        check_control_point(self.config.control_point)?;
        Ok(())
    }
}

impl Initializer for PositionOffset {
    fn init_scalar(
        &self,
        state: &mut ParticleState,
        start: usize,
        count: usize,
        _mask: AttributeMask,
        _ctx: &mut OperatorContext<'_>,
    ) {
        let config = &self.config;
        for particle in start..start + count {
            let mut offset = state.random.random_vector(config.offset_min, config.offset_max);
            if config.proportional {
                offset *= state.store.float(ParticleAttribute::Radius, particle);
            }
            if config.local_coords {
                let ct = state.store.float(ParticleAttribute::CreationTime, particle);
                offset = state
                    .control_point_transform_at_time(config.control_point, ct)
                    .transform_vector3(offset);
            }
            let position = state.store.vector(ParticleAttribute::Xyz, particle) + offset;
            let previous = state.store.vector(ParticleAttribute::PrevXyz, particle) + offset;
            place(state, particle, position, previous);
        }
    }

    fn init_multiple_override(&self) -> bool {
        true
    }
}

/// Path spawn parameters
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-support", serde(default))]
pub struct CreateAlongPathConfig {
    pub path: PathParams,
    /// Random offset from the path in every axis
    pub max_distance: f32,
    /// Use a random consecutive pair of control points between the path's
    /// start and end
    pub use_random_control_point_pair: bool,
}

/// Spawns particles at random points of a bezier path
#[derive(Debug, Clone, Default)]
pub struct CreateAlongPath {
    config: CreateAlongPathConfig,
}

impl CreateAlongPath {
    pub fn new(config: CreateAlongPathConfig) -> Self {
        Self { config }
    }
}

impl OperatorInfo for CreateAlongPath {
    fn name(&self) -> &'static str {
        "Position Along Path Random"
    }

    fn written_attributes(&self) -> AttributeMask {
        AttributeMask::XYZ | AttributeMask::PREV_XYZ
    }

    fn read_attributes(&self) -> AttributeMask {
        AttributeMask::CREATION_TIME
    }

    fn read_control_points(&self) -> ControlPointMask {
        let path = &self.config.path;
        if self.config.use_random_control_point_pair {
            path.control_point_mask()
                | control_point_range_mask(path.start_control_point, path.end_control_point)
        } else {
            path.control_point_mask()
        }
    }

    fn validate(&self) -> Result<()> {
        self.config.path.validate()
    }
}

impl Initializer for CreateAlongPath {
    fn init_scalar(
        &self,
        state: &mut ParticleState,
        start: usize,
        count: usize,
        _mask: AttributeMask,
        _ctx: &mut OperatorContext<'_>,
    ) {
        let config = &self.config;
        let max_distance = config.max_distance;

        for particle in start..start + count {
            let ct = state.store.float(ParticleAttribute::CreationTime, particle);
            let mut params = config.path;
            if config.use_random_control_point_pair
                && params.end_control_point > params.start_control_point
            {
                let end = state.random.random_int(
                    params.start_control_point as i32 + 1,
                    params.end_control_point as i32,
                );
                params.end_control_point = end as usize;
                params.start_control_point = end as usize - 1;
            }

            let path = state.calculate_path_values(&params, ct);
            let t = state.random.random_float(0.0, 1.0);
            let offset = state.random.random_vector_uniform(-max_distance, max_distance);
            let position = path.evaluate(t) + offset;
            place(state, particle, position, position);
        }
    }
}

/// Evenly spaced path spawn parameters
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-support", serde(default))]
pub struct CreateSequentialPathConfig {
    pub path: PathParams,
    pub max_distance: f32,
    /// Particles spread along one pass of the path
    pub particles_to_map: u32,
    /// Restart at the beginning after a pass; otherwise bounce back
    pub loop_path: bool,
    /// Store `(t, start, end)` in the hitbox-relative position
    pub save_offset: bool,
}

impl Default for CreateSequentialPathConfig {
    fn default() -> Self {
        Self {
            path: PathParams::default(),
            max_distance: 0.0,
            particles_to_map: 100,
            loop_path: true,
            save_offset: false,
        }
    }
}

#[derive(Debug)]
struct PathCursor {
    t: f32,
    step: f32,
}

const PATH_END_TOLERANCE: f32 = 1.0e-4;

/// Spawns particles one after another along a bezier path
#[derive(Debug, Clone, Default)]
pub struct CreateSequentialPath {
    config: CreateSequentialPathConfig,
}

impl CreateSequentialPath {
    pub fn new(config: CreateSequentialPathConfig) -> Self {
        Self { config }
    }
}

impl OperatorInfo for CreateSequentialPath {
    fn name(&self) -> &'static str {
        "Position Along Path Sequential"
    }

    fn written_attributes(&self) -> AttributeMask {
        let mut mask = AttributeMask::XYZ | AttributeMask::PREV_XYZ;
        if self.config.save_offset {
            mask |= AttributeMask::HITBOX_RELATIVE_XYZ;
        }
        mask
    }

    fn read_attributes(&self) -> AttributeMask {
        AttributeMask::CREATION_TIME
    }

    fn read_control_points(&self) -> ControlPointMask {
        self.config.path.control_point_mask()
    }

    fn validate(&self) -> Result<()> {
        self.config.path.validate()
    }

    fn create_context(&self) -> Option<Box<dyn Any + Send + Sync>> {
        let steps = self.config.particles_to_map.max(2) - 1;
        Some(Box::new(PathCursor {
            t: 0.0,
            step: 1.0 / steps as f32,
        }))
    }
}

impl Initializer for CreateSequentialPath {
    fn init_scalar(
        &self,
        state: &mut ParticleState,
        start: usize,
        count: usize,
        _mask: AttributeMask,
        ctx: &mut OperatorContext<'_>,
    ) {
        let config = &self.config;
        let Some(cursor) = ctx.data_mut::<PathCursor>() else {
            return;
        };

        for particle in start..start + count {
            if cursor.t > 1.0 + PATH_END_TOLERANCE || cursor.t < -PATH_END_TOLERANCE {
                if config.loop_path {
                    cursor.t -= 1.0;
                } else {
                    cursor.step = -cursor.step;
                    cursor.t += 2.0 * cursor.step;
                }
            }

            let ct = state.store.float(ParticleAttribute::CreationTime, particle);
            let path = state.calculate_path_values(&config.path, ct);
            let offset = state
                .random
                .random_vector_uniform(-config.max_distance, config.max_distance);
            let position = path.evaluate(cursor.t) + offset;
            place(state, particle, position, position);

            if config.save_offset {
                state.store.set_vector(
                    ParticleAttribute::HitboxRelativeXyz,
                    particle,
                    Vec3::new(
                        cursor.t,
                        config.path.start_control_point as f32,
                        config.path.end_control_point as f32,
                    ),
                );
            }
            cursor.t += cursor.step;
        }
    }
}

/// Travel parameters towards a target control point
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-support", serde(default))]
pub struct MoveBetweenPointsConfig {
    pub speed_min: f32,
    pub speed_max: f32,
    /// Random spread around the target
    pub end_spread: f32,
    /// Move the start point towards the target by this distance
    pub start_offset: f32,
    /// Push the target away from the start by this distance
    pub end_offset: f32,
    pub end_control_point: usize,
    /// Extend the lifetime by the trail length so trails reach the target
    pub trail_bias: bool,
}

impl Default for MoveBetweenPointsConfig {
    fn default() -> Self {
        Self {
            speed_min: 1.0,
            speed_max: 1.0,
            end_spread: 0.0,
            start_offset: 0.0,
            end_offset: 0.0,
            end_control_point: 1,
            trail_bias: false,
        }
    }
}

/// Aims particles at a control point and sets their lifetime so they die on
/// arrival
#[derive(Debug, Clone, Default)]
pub struct MoveBetweenPoints {
    config: MoveBetweenPointsConfig,
}

impl MoveBetweenPoints {
    pub fn new(config: MoveBetweenPointsConfig) -> Self {
        Self { config }
    }
}

impl OperatorInfo for MoveBetweenPoints {
    fn name(&self) -> &'static str {
        "Move Particles Between 2 Control Points"
    }

    fn written_attributes(&self) -> AttributeMask {
        AttributeMask::XYZ | AttributeMask::PREV_XYZ | AttributeMask::LIFE_DURATION
    }

    fn read_attributes(&self) -> AttributeMask {
        let mut mask = AttributeMask::XYZ | AttributeMask::PREV_XYZ | AttributeMask::CREATION_TIME;
        if self.config.trail_bias {
            mask |= AttributeMask::TRAIL_LENGTH;
        }
        mask
    }

    fn read_control_points(&self) -> ControlPointMask {
        control_point_mask(self.config.end_control_point)
    }

    fn validate(&self) -> Result<()> {
        check_control_point(self.config.end_control_point)?;
        Ok(())
    }
}

impl Initializer for MoveBetweenPoints {
    fn init_scalar(
        &self,
        state: &mut ParticleState,
        start: usize,
        count: usize,
        _mask: AttributeMask,
        _ctx: &mut OperatorContext<'_>,
    ) {
        let config = &self.config;
        for particle in start..start + count {
            let mut start_point = state.store.vector(ParticleAttribute::Xyz, particle);
            let ct = state.store.float(ParticleAttribute::CreationTime, particle);
            let mut end_point = state.control_point_at_time(config.end_control_point, ct);
            if config.end_spread > 0.0 {
                let (spread, _) = state.random.random_vector_in_unit_sphere();
                end_point += spread * config.end_spread;
            }

            let mut delta = end_point - start_point;
            let mut length = delta.length();
            if config.end_offset != 0.0 {
                end_point += delta * (config.end_offset / (length + f32::EPSILON));
                delta = end_point - start_point;
                length = delta.length();
            }
            if config.start_offset != 0.0 {
                start_point += delta * (config.start_offset / (length + f32::EPSILON));
                delta = end_point - start_point;
                length = delta.length();
            }

            let speed = state.random.random_float(config.speed_min, config.speed_max);
            let mut lifetime = length / (speed + f32::EPSILON);
            if config.trail_bias {
                lifetime += state.store.float(ParticleAttribute::TrailLength, particle);
            }
            state
                .store
                .set_float(ParticleAttribute::LifeDuration, particle, lifetime);

            let step = delta * (speed / (length + f32::EPSILON)) * state.clock.prev_dt;
            place(state, particle, start_point, start_point - step);
        }
    }

    fn init_multiple_override(&self) -> bool {
        self.config.trail_bias
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::BulgeControl;

    fn state(count: usize) -> ParticleState {
        let mut state = ParticleState::for_tests(
            AttributeMask::LIFE_DURATION | AttributeMask::HITBOX_RELATIVE_XYZ,
            64,
        );
        state.clock.cur_time = 1.0;
        state.clock.dt = 0.1;
        state.clock.prev_dt = 0.1;
        let range = state.spawn(count);
        for particle in range {
            state
                .store
                .set_float(ParticleAttribute::CreationTime, particle, 1.0);
        }
        state
    }

    fn init(initializer: &dyn Initializer, state: &mut ParticleState, count: usize) {
        let mut data = initializer.create_context();
        let mut ctx = OperatorContext::new(data.as_deref_mut(), None, false);
        initializer.init_scalar(state, 0, count, AttributeMask::all(), &mut ctx);
    }

    #[test]
    fn test_sphere_shell() {
        let mut state = state(50);
        state
            .control_points
            .set_position_and_previous(0, Vec3::new(5.0, 0.0, 0.0))
            .unwrap();
        let sphere = CreateWithinSphere::new(CreateWithinSphereConfig {
            radius_min: 2.0,
            radius_max: 2.0,
            speed_min: 10.0,
            speed_max: 10.0,
            ..Default::default()
        });
        init(&sphere, &mut state, 50);
        for particle in 0..50 {
            let position = state.store.vector(ParticleAttribute::Xyz, particle);
            let previous = state.store.vector(ParticleAttribute::PrevXyz, particle);
            let centre = Vec3::new(5.0, 0.0, 0.0);
            assert!((position.distance(centre) - 2.0).abs() < 1e-4);
            // moving outwards at 10 units per second over a 0.1s step
            assert!((position.distance(previous) - 1.0).abs() < 1e-4);
            assert!(previous.distance(centre) < position.distance(centre));
        }
    }

    #[test]
    fn test_sphere_absolute_bias_keeps_positive_side() {
        let mut state = state(30);
        let sphere = CreateWithinSphere::new(CreateWithinSphereConfig {
            radius_min: 1.0,
            radius_max: 3.0,
            distance_bias_absolute: Vec3::new(0.0, 0.0, 1.0),
            ..Default::default()
        });
        init(&sphere, &mut state, 30);
        for particle in 0..30 {
            assert!(state.store.vector(ParticleAttribute::Xyz, particle).z >= 0.0);
        }
    }

    #[test]
    fn test_sequential_path_spacing_and_loop() {
        let mut state = state(7);
        state
            .control_points
            .set_position_and_previous(1, Vec3::new(4.0, 0.0, 0.0))
            .unwrap();
        let path = CreateSequentialPath::new(CreateSequentialPathConfig {
            path: PathParams {
                start_control_point: 0,
                end_control_point: 1,
                bulge_control: BulgeControl::StartOrientation,
                ..Default::default()
            },
            particles_to_map: 5,
            save_offset: true,
            ..Default::default()
        });
        init(&path, &mut state, 7);
        let xs: Vec<f32> = (0..7)
            .map(|p| state.store.vector(ParticleAttribute::Xyz, p).x)
            .collect();
        for (x, expected) in xs.iter().zip([0.0, 1.0, 2.0, 3.0, 4.0, 1.0, 2.0]) {
            assert!((x - expected).abs() < 1e-4, "{xs:?}");
        }
        let saved = state.store.vector(ParticleAttribute::HitboxRelativeXyz, 2);
        assert!((saved.x - 0.5).abs() < 1e-5);
        assert_eq!(saved.z, 1.0);
    }

    #[test]
    fn test_sequential_path_bounces() {
        let mut state = state(7);
        state
            .control_points
            .set_position_and_previous(1, Vec3::new(4.0, 0.0, 0.0))
            .unwrap();
        let path = CreateSequentialPath::new(CreateSequentialPathConfig {
            path: PathParams {
                start_control_point: 0,
                end_control_point: 1,
                bulge_control: BulgeControl::StartOrientation,
                ..Default::default()
            },
            particles_to_map: 5,
            loop_path: false,
            ..Default::default()
        });
        init(&path, &mut state, 7);
        let x5 = state.store.vector(ParticleAttribute::Xyz, 5).x;
        let x6 = state.store.vector(ParticleAttribute::Xyz, 6).x;
        assert!((x5 - 3.0).abs() < 1e-4);
        assert!((x6 - 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_move_between_points_lifetime() {
        let mut state = state(4);
        state
            .control_points
            .set_position_and_previous(1, Vec3::new(0.0, 10.0, 0.0))
            .unwrap();
        let mover = MoveBetweenPoints::new(MoveBetweenPointsConfig {
            speed_min: 5.0,
            speed_max: 5.0,
            ..Default::default()
        });
        init(&mover, &mut state, 4);
        for particle in 0..4 {
            let lifetime = state.store.float(ParticleAttribute::LifeDuration, particle);
            assert!((lifetime - 2.0).abs() < 1e-4);
            let velocity = (state.store.vector(ParticleAttribute::Xyz, particle)
                - state.store.vector(ParticleAttribute::PrevXyz, particle))
                / 0.1;
            assert!(velocity.distance(Vec3::new(0.0, 5.0, 0.0)) < 1e-3);
        }
    }

    #[test]
    fn test_offset_proportional_to_radius() {
        let mut state = ParticleState::for_tests(AttributeMask::RADIUS, 8);
        state.spawn(2);
        state.store.set_float(ParticleAttribute::Radius, 1, 2.0);
        let offset = PositionOffset::new(PositionOffsetConfig {
            offset_min: Vec3::ONE,
            offset_max: Vec3::ONE,
            proportional: true,
            ..Default::default()
        });
        init(&offset, &mut state, 2);
        assert_eq!(
            state.store.vector(ParticleAttribute::Xyz, 1),
            Vec3::splat(2.0)
        );
        assert_eq!(
            state.store.vector(ParticleAttribute::PrevXyz, 1),
            Vec3::splat(2.0)
        );
    }
}
