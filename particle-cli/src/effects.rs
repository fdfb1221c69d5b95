//! Built-in effects for the simulate command

use anyhow::Result;
use clap::ValueEnum;
use particle_sheet::Sheet;
use particle_sim::prelude::*;
use particle_sim::{CollisionMode, TraceResult, WorldQuery};
use std::sync::Arc;

/// Effects the CLI can run without an external definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Effect {
    /// One burst of falling sparks
    Sparks,
    /// A rising column of puffs that grow and fade
    Smoke,
    /// Shells that burst into debris when they expire
    Fireworks,
}

/// Settings shared by every built-in effect
#[derive(Debug, Clone, Default)]
pub struct EffectOptions {
    pub seed: Option<u32>,
    /// Bounce off a floor at this height
    pub floor: Option<f32>,
    /// Sheet to pick random sequences from
    pub sheet: Option<Arc<Sheet>>,
}

/// Infinite horizontal floor
#[derive(Debug, Clone, Copy)]
pub struct Floor {
    pub height: f32,
}

impl WorldQuery for Floor {
    fn trace_line(&self, start: Vec3, end: Vec3, _contents_mask: u32, _group: i32) -> TraceResult {
        let (above, below) = (start.z - self.height, end.z - self.height);
        if above >= 0.0 && below < 0.0 {
            let fraction = above / (above - below);
            TraceResult {
                fraction,
                end_position: start.lerp(end, fraction),
                plane_normal: Vec3::Z,
                start_solid: false,
            }
        } else {
            TraceResult::miss(end)
        }
    }
}

fn floor_collision(bounce: f32) -> WorldCollision {
    WorldCollision::new(WorldCollisionConfig {
        mode: CollisionMode::PerParticleTrace,
        bounce,
        slide: 0.2,
        ..Default::default()
    })
}

fn config(max_particles: usize, seed: Option<u32>) -> SimulationConfig {
    SimulationConfig {
        max_particles,
        random_seed: seed,
        ..Default::default()
    }
}

fn finish(
    mut builder: particle_sim::DefinitionBuilder,
    options: &EffectOptions,
    bounce: f32,
) -> Result<ParticleSystemDefinition> {
    if options.floor.is_some() {
        builder = builder.constraint(floor_collision(bounce));
    }
    if let Some(sheet) = &options.sheet {
        let last = sheet.sequence_count().saturating_sub(1) as i32;
        builder = builder
            .initializer(RandomSequence::new(RandomSequenceConfig {
                min: 0,
                max: last,
                order: SequenceOrder::Random,
            }))
            .sheet(Arc::clone(sheet));
    }
    Ok(builder.renderer(SpriteRenderer::default()).build()?)
}

fn sparks(options: &EffectOptions) -> Result<ParticleSystemDefinition> {
    let builder = ParticleSystemDefinition::builder("sparks")
        .config(config(256, options.seed))
        .emitter(InstantaneousEmitter::new(InstantaneousEmitterConfig {
            count: 200,
            ..Default::default()
        }))
        .initializer(CreateWithinSphere::new(CreateWithinSphereConfig {
            radius_max: 4.0,
            speed_min: 100.0,
            speed_max: 300.0,
            local_speed_min: Vec3::new(0.0, 0.0, 100.0),
            local_speed_max: Vec3::new(0.0, 0.0, 200.0),
            ..Default::default()
        }))
        .initializer(RandomLifetime::new(RandomRange::new(1.0, 2.0)))
        .initializer(RandomRadius::new(RandomRange::new(1.0, 2.0)))
        .initializer(RandomColor::new(RandomColorConfig {
            color1: [255, 200, 64, 255],
            color2: [255, 96, 0, 255],
        }))
        .initializer(RandomAlpha::default())
        .operator(BasicMovement::new(BasicMovementConfig {
            gravity: Vec3::new(0.0, 0.0, -800.0),
            drag: 0.05,
        }))
        .operator(AlphaFade::default())
        .operator(LifespanDecay);
    finish(builder, options, 0.4)
}

fn smoke(options: &EffectOptions) -> Result<ParticleSystemDefinition> {
    let builder = ParticleSystemDefinition::builder("smoke")
        .config(config(512, options.seed))
        .emitter(ContinuousEmitter::new(ContinuousEmitterConfig {
            emission_rate: 40.0,
            ..Default::default()
        }))
        .initializer(CreateWithinSphere::new(CreateWithinSphereConfig {
            radius_max: 8.0,
            speed_min: 10.0,
            speed_max: 30.0,
            ..Default::default()
        }))
        .initializer(RandomLifetime::new(RandomRange::new(2.0, 3.0)))
        .initializer(RandomRadius::new(RandomRange::new(4.0, 8.0)))
        .initializer(RandomAlpha::default())
        .initializer(RandomRotation::default())
        .operator(BasicMovement::new(BasicMovementConfig {
            gravity: Vec3::new(0.0, 0.0, 30.0),
            drag: 0.2,
        }))
        .operator(RadiusScale::new(RadiusScaleConfig {
            start_scale: 1.0,
            end_scale: 3.0,
            ..Default::default()
        }))
        .operator(RotationSpin::new(RotationSpinConfig {
            spin_rate_degrees: 20.0,
            use_rotation_speed: false,
        }))
        .operator(AlphaFade::default())
        .operator(LifespanDecay);
    finish(builder, options, 0.0)
}

fn fireworks(options: &EffectOptions) -> Result<ParticleSystemDefinition> {
    let debris = ParticleSystemDefinition::builder("fireworks_debris")
        .config(config(1024, options.seed.map(|seed| seed.wrapping_add(1))))
        .emitter(ParentDeathEmitter::default())
        .initializer(VelocityRandom::new(VelocityRandomConfig {
            speed_min: -150.0,
            speed_max: 150.0,
            ..Default::default()
        }))
        .initializer(RandomLifetime::new(RandomRange::new(1.0, 1.5)))
        .initializer(RandomColor::new(RandomColorConfig {
            color1: [255, 64, 64, 255],
            color2: [64, 128, 255, 255],
        }))
        .initializer(RandomAlpha::default())
        .operator(BasicMovement::new(BasicMovementConfig {
            gravity: Vec3::new(0.0, 0.0, -200.0),
            drag: 0.1,
        }))
        .operator(AlphaFade::default())
        .operator(LifespanDecay);
    let debris = finish(debris, options, 0.2)?;

    let builder = ParticleSystemDefinition::builder("fireworks")
        .config(config(16, options.seed))
        .emitter(InstantaneousEmitter::new(InstantaneousEmitterConfig {
            count: 12,
            ..Default::default()
        }))
        .initializer(CreateWithinSphere::new(CreateWithinSphereConfig {
            radius_max: 2.0,
            speed_min: 20.0,
            speed_max: 60.0,
            local_speed_min: Vec3::new(0.0, 0.0, 300.0),
            local_speed_max: Vec3::new(0.0, 0.0, 400.0),
            ..Default::default()
        }))
        .initializer(RandomLifetime::new(RandomRange::new(0.8, 1.0)))
        .operator(BasicMovement::new(BasicMovementConfig {
            gravity: Vec3::new(0.0, 0.0, -200.0),
            drag: 0.0,
        }))
        .operator(LifespanDecay)
        .child(Arc::new(debris));
    finish(builder, options, 0.2)
}

/// Assemble a built-in effect
pub fn build(effect: Effect, options: &EffectOptions) -> Result<ParticleSystemDefinition> {
    log::debug!("Building {effect:?} with {options:?}");
    match effect {
        Effect::Sparks => sparks(options),
        Effect::Smoke => smoke(options),
        Effect::Fireworks => fireworks(options),
    }
}

/// Simulation context for the options: tracing against the floor when one
/// is set
pub fn context(options: &EffectOptions) -> SimulationContext {
    match options.floor {
        Some(height) => SimulationContext::new().with_world(Arc::new(Floor { height })),
        None => SimulationContext::new(),
    }
}
