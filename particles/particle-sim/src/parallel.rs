//! Stepping many collections at once
//!
//! Collections never see each other's stores outside of the parent/child
//! chain, which each collection drives itself, so independent top-level
//! collections can be stepped on separate worker threads.

use rayon::prelude::*;

use crate::collection::ParticleCollection;
use crate::operator::SpriteQuad;

/// Advance every collection by `dt` on the rayon pool
pub fn simulate_all(collections: &mut [ParticleCollection], dt: f32) {
    collections
        .par_iter_mut()
        .for_each(|collection| collection.simulate(dt));
}

/// Render every collection into its own quad list, in input order
pub fn render_all(collections: &[ParticleCollection]) -> Vec<Vec<SpriteQuad>> {
    collections
        .par_iter()
        .map(|collection| {
            let mut quads = Vec::with_capacity(collection.active_particles());
            collection.render(&mut quads);
            quads
        })
        .collect()
}
