//! Whole-collection stepping behaviour

mod common;

use common::{collection, displacements, init_logging, positions};
use glam::Vec3;
use particle_sim::prelude::*;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use test_case::test_case;

fn burst(count: u32) -> InstantaneousEmitter {
    InstantaneousEmitter::new(InstantaneousEmitterConfig {
        count,
        ..Default::default()
    })
}

fn fixed_lifetime(seconds: f32) -> RandomLifetime {
    RandomLifetime::new(RandomRange::new(seconds, seconds))
}

fn config(max_time_step: f32) -> SimulationConfig {
    SimulationConfig {
        max_time_step,
        ..Default::default()
    }
}

#[test]
fn test_control_point_velocity_is_inherited() {
    init_logging();
    let definition = ParticleSystemDefinition::builder("inherit")
        .config(SimulationConfig {
            max_particles: 1000,
            max_time_step: 1.0,
            ..Default::default()
        })
        .emitter(burst(1000))
        .initializer(CreateWithinSphere::default())
        .initializer(InheritVelocity::default())
        .build()
        .unwrap();
    let mut effect = collection(definition);

    effect.simulate(0.0);
    effect
        .set_control_point_position(0, Vec3::new(10.0, 0.0, 0.0))
        .unwrap();
    effect.simulate(0.5);

    assert_eq!(effect.active_particles(), 1000);
    for displacement in displacements(&effect) {
        let velocity = displacement / 0.5;
        assert!(
            velocity.distance(Vec3::new(20.0, 0.0, 0.0)) < 1e-3,
            "{velocity}"
        );
    }
    for position in positions(&effect) {
        assert!(position.distance(Vec3::new(10.0, 0.0, 0.0)) < 1e-4);
    }
}

#[test]
fn test_particles_expire_after_lifetime() {
    let definition = ParticleSystemDefinition::builder("expire")
        .config(config(0.125))
        .emitter(burst(20))
        .initializer(fixed_lifetime(0.25))
        .operator(LifespanDecay)
        .build()
        .unwrap();
    let mut effect = collection(definition);

    effect.simulate(0.0);
    assert!(!effect.is_finished());
    effect.simulate(0.125);
    effect.simulate(0.125);
    assert_eq!(effect.active_particles(), 20);

    effect.simulate(0.125);
    assert_eq!(effect.active_particles(), 0);
    assert!(effect.is_finished());
}

#[test_case(80.0, 1.0, 80 ; "eighty per second")]
#[test_case(8.0, 0.5, 4 ; "eight per second for half a second")]
#[test_case(4.0, 0.125, 0 ; "carry not yet whole")]
fn test_continuous_emission_rate(rate: f32, seconds: f32, expected: usize) {
    let definition = ParticleSystemDefinition::builder("stream")
        .config(config(0.125))
        .emitter(ContinuousEmitter::new(ContinuousEmitterConfig {
            emission_rate: rate,
            ..Default::default()
        }))
        .build()
        .unwrap();
    let mut effect = collection(definition);

    effect.simulate(0.0);
    effect.simulate(seconds);
    assert_eq!(effect.active_particles(), expected);
}

#[test]
fn test_initial_particles_spawn_on_first_frame() {
    let definition = ParticleSystemDefinition::builder("initial")
        .config(SimulationConfig {
            initial_particles: 12,
            ..Default::default()
        })
        .build()
        .unwrap();
    let mut effect = collection(definition);

    effect.simulate(0.0);
    assert_eq!(effect.active_particles(), 12);
}

#[test]
fn test_burst_clamped_to_capacity() {
    let definition = ParticleSystemDefinition::builder("clamped")
        .config(SimulationConfig {
            max_particles: 16,
            ..Default::default()
        })
        .emitter(burst(100))
        .build()
        .unwrap();
    let mut effect = collection(definition);

    effect.simulate(0.0);
    effect.simulate(0.1);
    assert_eq!(effect.active_particles(), 16);
}

#[test]
fn test_parent_death_spawns_children_in_place() {
    let child = ParticleSystemDefinition::builder("debris")
        .emitter(ParentDeathEmitter::default())
        .build()
        .unwrap();
    let parent = ParticleSystemDefinition::builder("shell")
        .config(config(0.125))
        .emitter(burst(10))
        .initializer(CreateWithinSphere::new(CreateWithinSphereConfig {
            radius_min: 5.0,
            radius_max: 5.0,
            ..Default::default()
        }))
        .initializer(fixed_lifetime(0.25))
        .operator(LifespanDecay)
        .child(Arc::new(child))
        .build()
        .unwrap();
    let mut effect = collection(parent);
    effect
        .set_control_point_position(0, Vec3::new(0.0, 0.0, 100.0))
        .unwrap();

    effect.simulate(0.0);
    effect.simulate(0.125);
    effect.simulate(0.125);
    assert_eq!(effect.children()[0].active_particles(), 0);

    effect.simulate(0.125);
    assert_eq!(effect.active_particles(), 0);
    let debris = &effect.children()[0];
    assert_eq!(debris.active_particles(), 10);
    for position in positions(debris) {
        assert!((position.distance(Vec3::new(0.0, 0.0, 100.0)) - 5.0).abs() < 1e-3);
    }
}

#[test]
fn test_delayed_child_waits_for_its_start() {
    let child = ParticleSystemDefinition::builder("late")
        .emitter(burst(5))
        .build()
        .unwrap();
    let parent = ParticleSystemDefinition::builder("host")
        .child_with_delay(Arc::new(child), 0.5)
        .build()
        .unwrap();
    let mut effect = collection(parent);

    effect.simulate(0.0);
    effect.simulate(0.25);
    effect.simulate(0.5);
    assert_eq!(effect.children()[0].active_particles(), 0);

    effect.simulate(0.1);
    assert_eq!(effect.children()[0].active_particles(), 5);
}

#[test]
fn test_stop_emission_removes_everything() {
    let definition = ParticleSystemDefinition::builder("stream")
        .emitter(ContinuousEmitter::default())
        .build()
        .unwrap();
    let mut effect = collection(definition);

    effect.simulate(0.0);
    effect.simulate(0.1);
    assert!(effect.active_particles() > 0);
    assert!(!effect.is_finished());

    effect.stop_emission(false, true);
    effect.simulate(0.1);
    assert_eq!(effect.active_particles(), 0);
    assert!(effect.is_emission_stopped());
    assert!(effect.is_finished());

    effect.start_emission(false);
    effect.simulate(0.1);
    assert!(effect.active_particles() > 0);
}

#[test]
fn test_restart_fires_burst_again() {
    let definition = ParticleSystemDefinition::builder("again")
        .emitter(burst(10))
        .build()
        .unwrap();
    let mut effect = collection(definition);

    effect.simulate(0.0);
    effect.simulate(0.1);
    effect.simulate(0.1);
    assert_eq!(effect.active_particles(), 10);

    effect.restart(RestartMode::Reset);
    effect.simulate(0.1);
    assert_eq!(effect.active_particles(), 20);
}

#[test]
fn test_skip_past_burst() {
    let definition = ParticleSystemDefinition::builder("skipped")
        .emitter(burst(10))
        .build()
        .unwrap();
    let mut effect = collection(definition);

    effect.skip_to_time(1.0);
    effect.simulate(0.1);
    assert_eq!(effect.active_particles(), 0);
    assert!((effect.cur_time() - 1.1).abs() < 1e-5);
}

#[test]
fn test_freezes_after_stop_time() {
    let definition = ParticleSystemDefinition::builder("frozen")
        .config(SimulationConfig {
            stop_simulation_after_time: 0.2,
            ..Default::default()
        })
        .build()
        .unwrap();
    let mut effect = collection(definition);

    effect.simulate(0.0);
    effect.simulate(0.3);
    assert!(effect.is_frozen());
    let frozen_at = effect.cur_time();
    effect.simulate(0.3);
    assert_eq!(effect.cur_time(), frozen_at);
}

#[test]
fn test_gravity_accelerates_downwards() {
    let definition = ParticleSystemDefinition::builder("falling")
        .config(config(0.125))
        .emitter(burst(4))
        .initializer(CreateWithinSphere::default())
        .operator(BasicMovement::new(BasicMovementConfig {
            gravity: Vec3::new(0.0, 0.0, -64.0),
            drag: 0.0,
        }))
        .build()
        .unwrap();
    let mut effect = collection(definition);

    effect.simulate(0.0);
    effect.simulate(0.125);
    let first = displacements(&effect)[0].z;
    effect.simulate(0.125);
    let second = displacements(&effect)[0].z;

    assert!(first < 0.0);
    assert!(second < first);
}

#[test]
fn test_bounds_cover_live_particles() {
    let definition = ParticleSystemDefinition::builder("cloud")
        .emitter(burst(64))
        .initializer(CreateWithinSphere::new(CreateWithinSphereConfig {
            radius_max: 10.0,
            ..Default::default()
        }))
        .build()
        .unwrap();
    let mut effect = collection(definition);
    effect
        .set_control_point_position(0, Vec3::new(0.0, 0.0, 50.0))
        .unwrap();

    assert_eq!(effect.bounds(), None);
    effect.simulate(0.0);
    effect.simulate(0.1);

    // bounds grow each particle by its radius, here the unwritten constant
    let radius = effect.state().store.constant(ParticleAttribute::Radius).x;
    let positions = positions(&effect);
    let lowest = positions.iter().copied().reduce(Vec3::min).unwrap();
    let highest = positions.iter().copied().reduce(Vec3::max).unwrap();

    let (min, max) = effect.bounds().unwrap();
    assert!((min - (lowest - Vec3::splat(radius))).abs().max_element() < 1e-4);
    assert!((max - (highest + Vec3::splat(radius))).abs().max_element() < 1e-4);
    assert!(lowest.z >= 40.0 - 1e-3 && highest.z <= 60.0 + 1e-3);
}

#[test]
fn test_render_emits_a_quad_per_particle() {
    let definition = ParticleSystemDefinition::builder("sprites")
        .emitter(burst(7))
        .initializer(RandomRadius::default())
        .renderer(SpriteRenderer::default())
        .build()
        .unwrap();
    let mut effect = collection(definition);

    effect.simulate(0.0);
    effect.simulate(0.1);

    let mut quads: Vec<SpriteQuad> = Vec::new();
    effect.render(&mut quads);
    assert_eq!(quads.len(), 7);
    assert_eq!(
        quads.iter().map(|quad| quad.position).collect::<Vec<_>>(),
        positions(&effect)
    );
}

#[test]
fn test_out_of_range_control_point_is_rejected() {
    let result = ParticleSystemDefinition::builder("far")
        .emitter(burst(1))
        .initializer(CreateWithinSphere::new(CreateWithinSphereConfig {
            control_point: 64,
            ..Default::default()
        }))
        .build();
    assert!(matches!(result, Err(ParticleError::InvalidControlPoint(64))));

    let result = ParticleSystemDefinition::builder("far_constraint")
        .emitter(burst(1))
        .constraint(ConstrainDistance::new(ConstrainDistanceConfig {
            control_point: 70,
            ..Default::default()
        }))
        .build();
    assert!(matches!(result, Err(ParticleError::InvalidControlPoint(70))));
}

#[test]
fn test_read_before_write_is_rejected() {
    let result = ParticleSystemDefinition::builder("broken")
        .emitter(burst(1))
        .operator(LifespanDecay)
        .build();
    assert!(matches!(
        result,
        Err(ParticleError::UnwrittenAttribute {
            attribute: ParticleAttribute::LifeDuration,
            ..
        })
    ));
}
