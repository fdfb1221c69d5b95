//! Structure-of-arrays attribute storage
//!
//! Each per-particle attribute owns one column sized to the padded capacity.
//! Vector attributes interleave their components in groups of four particles
//! (`xxxx yyyy zzzz`) so a batch is a contiguous 12-float run. Attributes
//! without per-particle storage read a single constant value.

use custom_debug::Debug;
use glam::Vec3;
use particle_utils::debug;

use crate::attributes::{ATTRIBUTE_COUNT, AttributeKind, AttributeMask, ParticleAttribute};
use crate::batch::{F32x4, FourInts, FourVectors, LANES};
use crate::error::{ParticleError, Result};

/// Hard upper bound on particles per collection
pub const MAX_PARTICLES_IN_A_SYSTEM: usize = 5000;

#[derive(Debug, Clone)]
enum Column {
    Float(#[debug(with = debug::trimmed_collection_fmt)] Vec<f32>),
    Int(#[debug(with = debug::trimmed_collection_fmt)] Vec<i32>),
    Vector(#[debug(with = debug::trimmed_collection_fmt)] Vec<f32>),
}

impl Column {
    fn new(kind: AttributeKind, capacity: usize) -> Self {
        match kind {
            AttributeKind::Float => Self::Float(vec![0.0; capacity]),
            AttributeKind::Int => Self::Int(vec![0; capacity]),
            AttributeKind::Vector => Self::Vector(vec![0.0; capacity * 3]),
        }
    }

    fn copy_particle(&mut self, from: usize, to: usize) {
        match self {
            Self::Float(data) => data[to] = data[from],
            Self::Int(data) => data[to] = data[from],
            Self::Vector(data) => {
                for component in 0..3 {
                    data[vector_index(to, component)] = data[vector_index(from, component)];
                }
            }
        }
    }

    fn copy_from(&mut self, source: &Self, particle: usize) {
        match (self, source) {
            (Self::Float(dst), Self::Float(src)) => dst[particle] = src[particle],
            (Self::Int(dst), Self::Int(src)) => dst[particle] = src[particle],
            (Self::Vector(dst), Self::Vector(src)) => {
                for component in 0..3 {
                    let index = vector_index(particle, component);
                    dst[index] = src[index];
                }
            }
            _ => {}
        }
    }
}

#[inline]
fn vector_index(particle: usize, component: usize) -> usize {
    (particle / LANES) * LANES * 3 + component * LANES + (particle % LANES)
}

/// Capacity allocated for a requested maximum: padded to whole batches plus
/// one spare batch so block writes past the live count stay in bounds.
pub fn padded_capacity(max_particles: usize) -> usize {
    LANES + LANES * max_particles.div_ceil(LANES)
}

/// Columnar particle storage for one collection
#[derive(Debug, Clone)]
pub struct AttributeStore {
    columns: Vec<Option<Column>>,
    initial: Vec<Option<Column>>,
    constants: [Vec3; ATTRIBUTE_COUNT],
    per_particle: AttributeMask,
    initial_copies: AttributeMask,
    max_particles: usize,
    capacity: usize,
    active: usize,
}

impl AttributeStore {
    /// Allocate storage.
    ///
    /// `per_particle` attributes get a column each. `initial_copies` names
    /// per-particle attributes that also keep their spawn-time value in a
    /// second column.
    pub fn new(
        per_particle: AttributeMask,
        initial_copies: AttributeMask,
        max_particles: usize,
    ) -> Result<Self> {
        if max_particles > MAX_PARTICLES_IN_A_SYSTEM {
            return Err(ParticleError::CapacityExceeded {
                requested: max_particles,
                max: MAX_PARTICLES_IN_A_SYSTEM,
            });
        }

        let per_particle = per_particle | AttributeMask::ALWAYS_PER_PARTICLE;
        let initial_copies = initial_copies & per_particle;
        let capacity = padded_capacity(max_particles);

        let columns = ParticleAttribute::ALL
            .iter()
            .map(|attribute| {
                per_particle
                    .has(*attribute)
                    .then(|| Column::new(attribute.kind(), capacity))
            })
            .collect();
        let initial = ParticleAttribute::ALL
            .iter()
            .map(|attribute| {
                initial_copies
                    .has(*attribute)
                    .then(|| Column::new(attribute.kind(), capacity))
            })
            .collect();

        Ok(Self {
            columns,
            initial,
            constants: [Vec3::ZERO; ATTRIBUTE_COUNT],
            per_particle,
            initial_copies,
            max_particles,
            capacity,
            active: 0,
        })
    }

    /// Maximum number of live particles
    pub fn max_particles(&self) -> usize {
        self.max_particles
    }

    /// Allocated column length in particles
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live particles
    pub fn active(&self) -> usize {
        self.active
    }

    /// Batches covering the live particles
    pub fn active_blocks(&self) -> usize {
        self.active.div_ceil(LANES)
    }

    /// Live lanes in the last batch, 4 for a full batch
    pub fn live_in_last_block(&self) -> usize {
        match self.active % LANES {
            0 => LANES,
            n => n,
        }
    }

    /// Set the live count, clamped to the maximum
    pub fn set_active(&mut self, active: usize) {
        self.active = active.min(self.max_particles);
    }

    /// Attributes with per-particle storage
    pub fn per_particle_mask(&self) -> AttributeMask {
        self.per_particle
    }

    /// Attributes keeping a spawn-time copy
    pub fn initial_copy_mask(&self) -> AttributeMask {
        self.initial_copies
    }

    /// Whether the attribute has per-particle storage
    pub fn is_per_particle(&self, attribute: ParticleAttribute) -> bool {
        self.per_particle.has(attribute)
    }

    /// Value read for attributes without per-particle storage
    pub fn constant(&self, attribute: ParticleAttribute) -> Vec3 {
        self.constants[attribute.index()]
    }

    /// Set the constant for a scalar attribute
    pub fn set_constant_float(&mut self, attribute: ParticleAttribute, value: f32) {
        self.constants[attribute.index()] = Vec3::new(value, 0.0, 0.0);
    }

    /// Set the constant for a vector attribute
    pub fn set_constant_vector(&mut self, attribute: ParticleAttribute, value: Vec3) {
        self.constants[attribute.index()] = value;
    }

    fn column(&self, attribute: ParticleAttribute) -> Option<&Column> {
        self.columns[attribute.index()].as_ref()
    }

    fn column_mut(&mut self, attribute: ParticleAttribute) -> Option<&mut Column> {
        self.columns[attribute.index()].as_mut()
    }

    /// Scalar attribute of one particle
    #[inline]
    pub fn float(&self, attribute: ParticleAttribute, particle: usize) -> f32 {
        match self.column(attribute) {
            Some(Column::Float(data)) => data[particle],
            Some(Column::Int(data)) => data[particle] as f32,
            Some(Column::Vector(data)) => data[vector_index(particle, 0)],
            None => self.constant(attribute).x,
        }
    }

    /// Write a scalar attribute; ignored without per-particle storage
    #[inline]
    pub fn set_float(&mut self, attribute: ParticleAttribute, particle: usize, value: f32) {
        match self.column_mut(attribute) {
            Some(Column::Float(data)) => data[particle] = value,
            Some(Column::Int(data)) => data[particle] = value as i32,
            _ => {}
        }
    }

    /// Integer attribute of one particle
    #[inline]
    pub fn int(&self, attribute: ParticleAttribute, particle: usize) -> i32 {
        match self.column(attribute) {
            Some(Column::Int(data)) => data[particle],
            Some(Column::Float(data)) => data[particle] as i32,
            _ => self.constant(attribute).x as i32,
        }
    }

    /// Write an integer attribute; ignored without per-particle storage
    #[inline]
    pub fn set_int(&mut self, attribute: ParticleAttribute, particle: usize, value: i32) {
        match self.column_mut(attribute) {
            Some(Column::Int(data)) => data[particle] = value,
            Some(Column::Float(data)) => data[particle] = value as f32,
            _ => {}
        }
    }

    /// Vector attribute of one particle
    #[inline]
    pub fn vector(&self, attribute: ParticleAttribute, particle: usize) -> Vec3 {
        match self.column(attribute) {
            Some(Column::Vector(data)) => Vec3::new(
                data[vector_index(particle, 0)],
                data[vector_index(particle, 1)],
                data[vector_index(particle, 2)],
            ),
            _ => self.constant(attribute),
        }
    }

    /// Write a vector attribute; ignored without per-particle storage
    #[inline]
    pub fn set_vector(&mut self, attribute: ParticleAttribute, particle: usize, value: Vec3) {
        if let Some(Column::Vector(data)) = self.column_mut(attribute) {
            data[vector_index(particle, 0)] = value.x;
            data[vector_index(particle, 1)] = value.y;
            data[vector_index(particle, 2)] = value.z;
        }
    }

    /// Scalar attribute of one batch
    #[inline]
    pub fn float4(&self, attribute: ParticleAttribute, block: usize) -> F32x4 {
        match self.column(attribute) {
            Some(Column::Float(data)) => {
                let base = block * LANES;
                F32x4(std::array::from_fn(|lane| data[base + lane]))
            }
            _ => F32x4(std::array::from_fn(|lane| {
                self.float(attribute, block * LANES + lane)
            })),
        }
    }

    /// Write a scalar attribute for one batch
    #[inline]
    pub fn set_float4(&mut self, attribute: ParticleAttribute, block: usize, value: F32x4) {
        if let Some(Column::Float(data)) = self.column_mut(attribute) {
            let base = block * LANES;
            data[base..base + LANES].copy_from_slice(&value.0);
        }
    }

    /// Integer attribute of one batch
    #[inline]
    pub fn int4(&self, attribute: ParticleAttribute, block: usize) -> FourInts {
        FourInts(std::array::from_fn(|lane| {
            self.int(attribute, block * LANES + lane)
        }))
    }

    /// Vector attribute of one batch
    #[inline]
    pub fn vector4(&self, attribute: ParticleAttribute, block: usize) -> FourVectors {
        match self.column(attribute) {
            Some(Column::Vector(data)) => {
                let base = block * LANES * 3;
                let lanes = |component: usize| {
                    let start = base + component * LANES;
                    F32x4(std::array::from_fn(|lane| data[start + lane]))
                };
                FourVectors {
                    x: lanes(0),
                    y: lanes(1),
                    z: lanes(2),
                }
            }
            _ => FourVectors::splat(self.constant(attribute)),
        }
    }

    /// Write a vector attribute for one batch
    #[inline]
    pub fn set_vector4(&mut self, attribute: ParticleAttribute, block: usize, value: &FourVectors) {
        if let Some(Column::Vector(data)) = self.column_mut(attribute) {
            let base = block * LANES * 3;
            data[base..base + LANES].copy_from_slice(&value.x.0);
            data[base + LANES..base + 2 * LANES].copy_from_slice(&value.y.0);
            data[base + 2 * LANES..base + 3 * LANES].copy_from_slice(&value.z.0);
        }
    }

    /// Raw float column: scalar columns hold one float per particle, vector
    /// columns the batch-interleaved layout
    pub fn float_column(&self, attribute: ParticleAttribute) -> Result<&[f32]> {
        match self.column(attribute) {
            Some(Column::Float(data) | Column::Vector(data)) => Ok(data),
            _ => Err(ParticleError::AttributeNotAllocated(attribute)),
        }
    }

    /// Mutable raw float column
    pub fn float_column_mut(&mut self, attribute: ParticleAttribute) -> Result<&mut [f32]> {
        match self.column_mut(attribute) {
            Some(Column::Float(data) | Column::Vector(data)) => Ok(data),
            _ => Err(ParticleError::AttributeNotAllocated(attribute)),
        }
    }

    /// Raw integer column
    pub fn int_column(&self, attribute: ParticleAttribute) -> Result<&[i32]> {
        match self.column(attribute) {
            Some(Column::Int(data)) => Ok(data),
            _ => Err(ParticleError::AttributeNotAllocated(attribute)),
        }
    }

    /// Spawn-time value of a scalar attribute.
    ///
    /// Attributes without a separate copy are never updated after spawn, so
    /// the current value is the initial one.
    pub fn initial_float(&self, attribute: ParticleAttribute, particle: usize) -> f32 {
        match self.initial[attribute.index()].as_ref() {
            Some(Column::Float(data)) => data[particle],
            Some(Column::Int(data)) => data[particle] as f32,
            _ => self.float(attribute, particle),
        }
    }

    /// Spawn-time value of an integer attribute
    pub fn initial_int(&self, attribute: ParticleAttribute, particle: usize) -> i32 {
        match self.initial[attribute.index()].as_ref() {
            Some(Column::Int(data)) => data[particle],
            _ => self.int(attribute, particle),
        }
    }

    /// Spawn-time value of a vector attribute
    pub fn initial_vector(&self, attribute: ParticleAttribute, particle: usize) -> Vec3 {
        match self.initial[attribute.index()].as_ref() {
            Some(Column::Vector(data)) => Vec3::new(
                data[vector_index(particle, 0)],
                data[vector_index(particle, 1)],
                data[vector_index(particle, 2)],
            ),
            _ => self.vector(attribute, particle),
        }
    }

    /// Snapshot current values into the spawn-time copies
    pub fn copy_initial_values(&mut self, start: usize, count: usize) {
        for attribute in self.initial_copies.attributes() {
            let index = attribute.index();
            if let (Some(source), Some(initial)) =
                (self.columns[index].as_ref(), self.initial[index].as_mut())
            {
                for particle in start..start + count {
                    initial.copy_from(source, particle);
                }
            }
        }
    }

    /// Fill the named attributes of one particle from their constants
    pub fn fill_from_constants(&mut self, mask: AttributeMask, particle: usize) {
        for attribute in (mask & self.per_particle).attributes() {
            let constant = self.constant(attribute);
            match attribute.kind() {
                AttributeKind::Float => self.set_float(attribute, particle, constant.x),
                AttributeKind::Int => self.set_int(attribute, particle, constant.x as i32),
                AttributeKind::Vector => self.set_vector(attribute, particle, constant),
            }
        }
    }

    /// Copy every attribute, current and initial, from one slot to another
    pub fn move_particle(&mut self, from: usize, to: usize) {
        if from == to {
            return;
        }
        for column in self.columns.iter_mut().chain(self.initial.iter_mut()).flatten() {
            column.copy_particle(from, to);
        }
    }

    /// Bounding box of live particle positions grown by their radii
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        (0..self.active)
            .map(|particle| {
                let center = self.vector(ParticleAttribute::Xyz, particle);
                let radius = Vec3::splat(self.float(ParticleAttribute::Radius, particle).abs());
                (center - radius, center + radius)
            })
            .reduce(|(min_a, max_a), (min_b, max_b)| (min_a.min(min_b), max_a.max(max_b)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(max: usize) -> AttributeStore {
        AttributeStore::new(
            AttributeMask::RADIUS | AttributeMask::PARTICLE_ID | AttributeMask::TINT_RGB,
            AttributeMask::RADIUS,
            max,
        )
        .unwrap()
    }

    #[test]
    fn test_padded_capacity() {
        assert_eq!(padded_capacity(0), 4);
        assert_eq!(padded_capacity(1), 8);
        assert_eq!(padded_capacity(8), 12);
        assert_eq!(padded_capacity(10), 16);
    }

    #[test]
    fn test_rejects_oversized() {
        assert!(matches!(
            AttributeStore::new(AttributeMask::empty(), AttributeMask::empty(), 5001),
            Err(ParticleError::CapacityExceeded { requested: 5001, .. })
        ));
    }

    #[test]
    fn test_constant_attributes() {
        let mut store = store(8);
        assert!(!store.is_per_particle(ParticleAttribute::Alpha));
        store.set_constant_float(ParticleAttribute::Alpha, 0.5);
        store.set_float(ParticleAttribute::Alpha, 3, 1.0);
        assert_eq!(store.float(ParticleAttribute::Alpha, 3), 0.5);
        assert_eq!(store.float4(ParticleAttribute::Alpha, 0), F32x4::splat(0.5));
        assert!(store.float_column(ParticleAttribute::Alpha).is_err());
    }

    #[test]
    fn test_vector_layout_is_batch_interleaved() {
        let mut store = store(8);
        store.set_vector(ParticleAttribute::Xyz, 5, Vec3::new(1.0, 2.0, 3.0));
        let column = store.float_column(ParticleAttribute::Xyz).unwrap();
        assert_eq!(column[12 + 1], 1.0);
        assert_eq!(column[12 + 4 + 1], 2.0);
        assert_eq!(column[12 + 8 + 1], 3.0);

        let block = store.vector4(ParticleAttribute::Xyz, 1);
        assert_eq!(block.lane(1), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_block_and_scalar_views_agree() {
        let mut store = store(8);
        for p in 0..8 {
            store.set_float(ParticleAttribute::Radius, p, p as f32);
        }
        store.set_float4(ParticleAttribute::Radius, 1, F32x4([9.0, 8.0, 7.0, 6.0]));
        assert_eq!(store.float(ParticleAttribute::Radius, 4), 9.0);
        assert_eq!(store.float(ParticleAttribute::Radius, 3), 3.0);
    }

    #[test]
    fn test_initial_copies() {
        let mut store = store(4);
        store.set_float(ParticleAttribute::Radius, 0, 2.0);
        store.copy_initial_values(0, 1);
        store.set_float(ParticleAttribute::Radius, 0, 7.0);
        assert_eq!(store.initial_float(ParticleAttribute::Radius, 0), 2.0);
        // no separate copy: current value is returned
        store.set_int(ParticleAttribute::ParticleId, 0, 11);
        assert_eq!(store.initial_int(ParticleAttribute::ParticleId, 0), 11);
    }

    #[test]
    fn test_move_particle() {
        let mut store = store(8);
        store.set_vector(ParticleAttribute::TintRgb, 6, Vec3::ONE);
        store.set_int(ParticleAttribute::ParticleId, 6, 42);
        store.move_particle(6, 1);
        assert_eq!(store.vector(ParticleAttribute::TintRgb, 1), Vec3::ONE);
        assert_eq!(store.int(ParticleAttribute::ParticleId, 1), 42);
    }

    #[test]
    fn test_bounds() {
        let mut store = store(4);
        assert!(store.bounds().is_none());
        store.set_active(2);
        store.set_vector(ParticleAttribute::Xyz, 0, Vec3::new(-1.0, 0.0, 0.0));
        store.set_vector(ParticleAttribute::Xyz, 1, Vec3::new(3.0, 2.0, 1.0));
        store.set_float(ParticleAttribute::Radius, 0, 1.0);
        store.set_float(ParticleAttribute::Radius, 1, 1.0);
        let (min, max) = store.bounds().unwrap();
        assert_eq!(min, Vec3::new(-2.0, -1.0, -1.0));
        assert_eq!(max, Vec3::new(4.0, 3.0, 2.0));
    }

    #[test]
    fn test_tail_lanes() {
        let mut store = store(16);
        store.set_active(6);
        assert_eq!(store.active_blocks(), 2);
        assert_eq!(store.live_in_last_block(), 2);
        store.set_active(8);
        assert_eq!(store.live_in_last_block(), 4);
        store.set_active(100);
        assert_eq!(store.active(), 16);
    }
}
