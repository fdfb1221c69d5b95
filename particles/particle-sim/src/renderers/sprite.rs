//! Camera-facing sprites

use particle_sheet::SEQUENCE_SAMPLE_COUNT;

use crate::attributes::{AttributeMask, ParticleAttribute};
use crate::operator::{OperatorInfo, RenderSink, Renderer, SpriteQuad};
use crate::state::ParticleState;

/// Sheet animation settings
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-support", serde(default))]
pub struct SpriteRendererConfig {
    /// Animation cycles per second
    pub animation_rate: f32,
    /// Play exactly one cycle over each particle's lifetime
    pub fit_cycle_to_lifetime: bool,
}

impl Default for SpriteRendererConfig {
    fn default() -> Self {
        Self {
            animation_rate: 0.1,
            fit_cycle_to_lifetime: false,
        }
    }
}

/// Emits one [`SpriteQuad`] per live particle
///
/// Attributes the pipeline never writes come from the collection's
/// constants, so the renderer works on any pipeline that positions
/// particles.
#[derive(Debug, Clone, Default)]
pub struct SpriteRenderer {
    config: SpriteRendererConfig,
}

impl SpriteRenderer {
    pub fn new(config: SpriteRendererConfig) -> Self {
        Self { config }
    }

    fn age_scale(&self, lifetime: f32) -> f32 {
        let cycles_per_second = if self.config.fit_cycle_to_lifetime {
            if lifetime > 0.0 { 1.0 / lifetime } else { 0.0 }
        } else {
            self.config.animation_rate
        };
        cycles_per_second * SEQUENCE_SAMPLE_COUNT as f32
    }
}

impl OperatorInfo for SpriteRenderer {
    fn name(&self) -> &'static str {
        "render_animated_sprites"
    }

    fn written_attributes(&self) -> AttributeMask {
        AttributeMask::empty()
    }

    fn read_attributes(&self) -> AttributeMask {
        AttributeMask::XYZ | AttributeMask::CREATION_TIME
    }
}

impl Renderer for SpriteRenderer {
    fn render(&self, state: &ParticleState, sink: &mut dyn RenderSink) {
        let store = &state.store;
        let now = state.clock.cur_time;
        for particle in 0..state.active() {
            let age = now - store.float(ParticleAttribute::CreationTime, particle);
            let lifetime = store.float(ParticleAttribute::LifeDuration, particle);
            let sequence = store
                .float(ParticleAttribute::SequenceNumber, particle)
                .max(0.0) as usize;
            sink.push_sprite(SpriteQuad {
                position: store.vector(ParticleAttribute::Xyz, particle),
                radius: store.float(ParticleAttribute::Radius, particle),
                rotation: store.float(ParticleAttribute::Rotation, particle),
                color: store.vector(ParticleAttribute::TintRgb, particle),
                alpha: store.float(ParticleAttribute::Alpha, particle),
                sample: *state.sheet_sample(age.max(0.0), self.age_scale(lifetime), sequence),
            });
        }
    }
}
