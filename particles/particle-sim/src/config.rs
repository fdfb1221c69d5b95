//! Particle system configuration

use glam::Vec3;

use crate::error::{ParticleError, Result};
use crate::random::RandomStream;
use crate::store::MAX_PARTICLES_IN_A_SYSTEM;

/// Default longest simulation sub-step
pub const DEFAULT_MAX_TIME_STEP: f32 = 0.1;

/// Per-definition simulation settings
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-support", serde(default))]
pub struct SimulationConfig {
    /// Live particle limit
    pub max_particles: usize,
    /// Particles created on the first frame
    pub initial_particles: usize,
    /// Longest sub-step in seconds; 0 or less uses the default
    pub max_time_step: f32,
    /// Shortest sub-step in seconds
    pub min_time_step: f32,
    /// Clamp on the time simulated per call during the first frames, 0 for none
    pub maximum_sim_time: f32,
    /// Lower bound for the first-frames clamp
    pub minimum_sim_time: f32,
    /// Frames the first-frames clamp applies to
    pub minimum_frames: u32,
    /// Freeze the collection once its time passes this
    pub stop_simulation_after_time: f32,
    /// Fixed random seed; `None` picks one per collection
    pub random_seed: Option<u32>,
    /// Killing keeps particle order instead of filling holes from the end
    pub order_important: bool,
    /// Radius of particles without a radius initializer
    pub constant_radius: f32,
    /// Roll of particles without a rotation initializer
    pub constant_rotation: f32,
    /// Roll speed of particles without a rotation speed initializer
    pub constant_rotation_speed: f32,
    /// Tint of particles without a colour initializer, RGBA 0-255
    pub constant_color: [u8; 4],
    /// Sequence number of particles without a sequence initializer
    pub constant_sequence_number: u32,
    /// Second sequence number
    pub constant_sequence_number1: u32,
    /// Normal of particles without a normal initializer
    pub constant_normal: Vec3,
    /// Lifetime of particles without a lifetime initializer
    pub constant_lifetime: f32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_particles: 1000,
            initial_particles: 0,
            max_time_step: DEFAULT_MAX_TIME_STEP,
            min_time_step: 0.0,
            maximum_sim_time: 0.0,
            minimum_sim_time: 0.0,
            minimum_frames: 0,
            stop_simulation_after_time: f32::MAX,
            random_seed: None,
            order_important: false,
            constant_radius: 5.0,
            constant_rotation: 0.0,
            constant_rotation_speed: 0.0,
            constant_color: [255, 255, 255, 255],
            constant_sequence_number: 0,
            constant_sequence_number1: 0,
            constant_normal: Vec3::Z,
            constant_lifetime: 1.0,
        }
    }
}

impl SimulationConfig {
    /// Longest sub-step actually used
    pub fn effective_max_time_step(&self) -> f32 {
        if self.max_time_step > 0.0 {
            self.max_time_step
        } else {
            DEFAULT_MAX_TIME_STEP
        }
    }

    /// Constant tint as linear 0-1 RGB
    pub fn constant_tint(&self) -> Vec3 {
        let [r, g, b, _] = self.constant_color;
        Vec3::new(f32::from(r), f32::from(g), f32::from(b)) / 255.0
    }

    /// Constant alpha in 0-1
    pub fn constant_alpha(&self) -> f32 {
        f32::from(self.constant_color[3]) / 255.0
    }

    /// Reject unusable settings
    pub fn validate(&self) -> Result<()> {
        if self.max_particles > MAX_PARTICLES_IN_A_SYSTEM {
            return Err(ParticleError::CapacityExceeded {
                requested: self.max_particles,
                max: MAX_PARTICLES_IN_A_SYSTEM,
            });
        }
        if self.min_time_step < 0.0 {
            return Err(ParticleError::InvalidConfig(format!(
                "negative minimum time step {}",
                self.min_time_step
            )));
        }
        Ok(())
    }
}

/// Strength envelope for one operator.
///
/// Times are in seconds of collection time. With every field at its default
/// the operator always runs at full strength.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-support", serde(default))]
pub struct OperatorTiming {
    pub start_fade_in_time: f32,
    pub end_fade_in_time: f32,
    pub start_fade_out_time: f32,
    pub end_fade_out_time: f32,
    /// Repeat the envelope over this period, 0 for no repetition
    pub fade_oscillate_period: f32,
    /// Sample id for a random time offset, 0 for none
    pub time_offset_seed: u32,
    pub time_offset_min: f32,
    pub time_offset_max: f32,
    /// Sample id for a random time scale, 0 for none
    pub time_scale_seed: u32,
    pub time_scale_min: f32,
    pub time_scale_max: f32,
    /// Sample id for a random strength multiplier, 0 for none
    pub strength_scale_seed: u32,
    pub strength_min_scale: f32,
    pub strength_max_scale: f32,
}

impl Default for OperatorTiming {
    fn default() -> Self {
        Self {
            start_fade_in_time: 0.0,
            end_fade_in_time: 0.0,
            start_fade_out_time: 0.0,
            end_fade_out_time: 0.0,
            fade_oscillate_period: 0.0,
            time_offset_seed: 0,
            time_offset_min: 0.0,
            time_offset_max: 0.0,
            time_scale_seed: 0,
            time_scale_min: 1.0,
            time_scale_max: 1.0,
            strength_scale_seed: 0,
            strength_min_scale: 1.0,
            strength_max_scale: 1.0,
        }
    }
}

impl OperatorTiming {
    /// Whether every field is at its default
    pub fn is_fast_path(&self) -> bool {
        *self == Self::default()
    }

    /// Strength at collection time `cur_time`, 0 when the operator is off
    pub fn strength(&self, cur_time: f32, random: &RandomStream) -> f32 {
        if self.is_fast_path() {
            return 1.0;
        }

        let mut time = cur_time;
        if self.time_offset_seed != 0 {
            time += random.random_float_at(
                self.time_offset_seed,
                self.time_offset_min,
                self.time_offset_max,
            );
            time = time.max(0.0);
        }
        if self.time_scale_seed != 0 && time > self.start_fade_in_time {
            let scale = random
                .random_float_at(self.time_scale_seed, self.time_scale_min, self.time_scale_max)
                .max(0.0001);
            time = self.start_fade_in_time + (time - self.start_fade_in_time) / scale;
        }
        if self.fade_oscillate_period > 0.0 {
            time = (cur_time / self.fade_oscillate_period).fract();
        }

        let mut strength = fade_in_out(
            self.start_fade_in_time,
            self.end_fade_in_time,
            self.start_fade_out_time,
            self.end_fade_out_time,
            time,
        );
        if self.strength_scale_seed != 0 {
            let scale = random.random_float_at(
                self.strength_scale_seed,
                self.strength_min_scale,
                self.strength_max_scale,
            );
            strength *= scale.max(0.0);
        }
        strength
    }
}

/// Remap `value` from `[in_a, in_b]` to `[out_a, out_b]` without clamping
#[inline]
pub fn remap(value: f32, in_a: f32, in_b: f32, out_a: f32, out_b: f32) -> f32 {
    if in_a == in_b {
        return if value >= in_b { out_b } else { out_a };
    }
    out_a + (out_b - out_a) * (value - in_a) / (in_b - in_a)
}

/// Trapezoid envelope: 0 before `fade_in_start`, ramps to 1 by
/// `fade_in_end`, holds, ramps back to 0 between the fade-out times. A
/// `fade_out_end` of 0 never fades out.
pub fn fade_in_out(
    fade_in_start: f32,
    fade_in_end: f32,
    fade_out_start: f32,
    fade_out_end: f32,
    time: f32,
) -> f32 {
    if fade_in_start > time {
        return 0.0;
    }
    if fade_out_end > 0.0 && fade_out_end < time {
        return 0.0;
    }

    let fade_in_end = fade_in_end.max(fade_in_start);
    let fade_out_start = fade_out_start.max(fade_in_end);
    let fade_out_end = fade_out_end.max(fade_out_start);

    let mut strength: f32 = 1.0;
    if fade_in_end > time && fade_in_end > fade_in_start {
        strength = strength.min(remap(time, fade_in_start, fade_in_end, 0.0, 1.0));
    }
    if time > fade_out_start && fade_out_end > fade_out_start {
        strength = strength.min(remap(time, fade_out_end, fade_out_start, 0.0, 1.0));
    }
    strength
}
