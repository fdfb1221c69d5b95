//! Random numbers for operators
//!
//! Scalar code draws from a shared table of uniform floats addressed by
//! `(seed + sample id) & 4095`, which makes a seeded collection reproducible
//! and lets an operator ask for "the n-th random number of particle p".
//! Block code checks a four-lane generator out of a bounded pool so
//! collections simulated on different threads never share generator state.

use glam::Vec3;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::f32::consts::TAU;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::batch::{F32x4, FourInts, LANES};

/// Entries in the shared random table
pub const RANDOM_TABLE_SIZE: usize = 4096;

const TABLE_MASK: u32 = RANDOM_TABLE_SIZE as u32 - 1;

/// Table of uniform floats in `[0, 1)`
#[derive(Debug, Clone)]
pub struct RandomTable {
    values: Box<[f32]>,
}

impl RandomTable {
    /// Fill the table from a seeded generator
    pub fn new(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let values = (0..RANDOM_TABLE_SIZE)
            .map(|_| rng.random::<f32>())
            .collect();
        Self { values }
    }

    /// Entry at a wrapped index
    #[inline]
    pub fn get(&self, index: u32) -> f32 {
        self.values[(index & TABLE_MASK) as usize]
    }
}

impl Default for RandomTable {
    fn default() -> Self {
        Self::new(0x5eed_0f_9a27)
    }
}

/// A collection's view of the random table
#[derive(Debug, Clone)]
pub struct RandomStream {
    table: Arc<RandomTable>,
    seed: u32,
    query_count: u32,
}

impl RandomStream {
    /// Stream starting at `seed`
    pub fn new(table: Arc<RandomTable>, seed: u32) -> Self {
        Self {
            table,
            seed,
            query_count: 0,
        }
    }

    /// Collection seed
    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Change the seed and restart the sequence
    pub fn reseed(&mut self, seed: u32) {
        self.seed = seed;
        self.query_count = 0;
    }

    fn next_id(&mut self, advance: u32) -> u32 {
        let id = self.query_count;
        self.query_count = self.query_count.wrapping_add(advance);
        id
    }

    /// Uniform value in `[0, 1)` for a sample id
    #[inline]
    pub fn unit_at(&self, sample_id: u32) -> f32 {
        self.table.get(self.seed.wrapping_add(sample_id))
    }

    /// Value in `[min, max)` for a sample id
    #[inline]
    pub fn random_float_at(&self, sample_id: u32, min: f32, max: f32) -> f32 {
        self.unit_at(sample_id) * (max - min) + min
    }

    /// Value in `[min, max)` for a sample id, biased by `exponent`
    pub fn random_float_exp_at(&self, sample_id: u32, min: f32, max: f32, exponent: f32) -> f32 {
        self.unit_at(sample_id).powf(exponent) * (max - min) + min
    }

    /// Vector with each component in `[min, max)`; consumes three ids
    pub fn random_vector_at(&self, sample_id: u32, min: Vec3, max: Vec3) -> Vec3 {
        Vec3::new(
            self.random_float_at(sample_id, min.x, max.x),
            self.random_float_at(sample_id.wrapping_add(1), min.y, max.y),
            self.random_float_at(sample_id.wrapping_add(2), min.z, max.z),
        )
    }

    /// Next value in `[min, max)`
    pub fn random_float(&mut self, min: f32, max: f32) -> f32 {
        let id = self.next_id(1);
        self.random_float_at(id, min, max)
    }

    /// Next value in `[min, max)`, biased by `exponent`
    pub fn random_float_exp(&mut self, min: f32, max: f32, exponent: f32) -> f32 {
        let id = self.next_id(1);
        self.random_float_exp_at(id, min, max, exponent)
    }

    /// Next integer in `[min, max]`
    pub fn random_int(&mut self, min: i32, max: i32) -> i32 {
        let id = self.next_id(1);
        let range = (max + 1 - min) as f32;
        (self.unit_at(id) * range) as i32 + min
    }

    /// Next vector with each component in `[min, max)`
    pub fn random_vector(&mut self, min: Vec3, max: Vec3) -> Vec3 {
        let id = self.next_id(3);
        self.random_vector_at(id, min, max)
    }

    /// Next vector with every component in `[min, max)`
    pub fn random_vector_uniform(&mut self, min: f32, max: f32) -> Vec3 {
        self.random_vector(Vec3::splat(min), Vec3::splat(max))
    }

    /// Point in the unit ball and its distance from the centre.
    ///
    /// The radius is the cube root of a uniform draw so points are spread
    /// evenly through the volume.
    pub fn random_vector_in_unit_sphere(&mut self) -> (Vec3, f32) {
        let id = self.next_id(3);
        let u = self.random_float_at(id, 0.0001, 1.0);
        let v = self.random_float_at(id.wrapping_add(1), 0.0001, 1.0);
        let w = self.random_float_at(id.wrapping_add(2), 0.0001, 1.0);

        let phi = (1.0 - 2.0 * u).acos();
        let theta = TAU * v;
        let r = w.cbrt();
        let sin_phi = phi.sin();
        (
            Vec3::new(
                r * sin_phi * theta.cos(),
                r * sin_phi * theta.sin(),
                r * phi.cos(),
            ),
            r,
        )
    }

    /// Per-lane values in `[0, 1)` addressed by lane ids plus a shared offset
    #[inline]
    pub fn unit_x4(&self, ids: FourInts, offset: u32) -> F32x4 {
        let base = self.seed.wrapping_add(offset);
        F32x4(std::array::from_fn(|lane| {
            self.table.get(base.wrapping_add(ids.lane(lane) as u32))
        }))
    }
}

/// Four-lane generator used by block initializers
#[derive(Debug, Clone)]
pub struct RandContext {
    lanes: [StdRng; LANES],
}

impl RandContext {
    /// Generator seeded deterministically from `seed`
    pub fn new(seed: u64) -> Self {
        Self {
            lanes: std::array::from_fn(|lane| {
                StdRng::seed_from_u64(seed.wrapping_mul(LANES as u64).wrapping_add(lane as u64))
            }),
        }
    }

    /// Four uniform values in `[0, 1)`
    pub fn next_x4(&mut self) -> F32x4 {
        F32x4(std::array::from_fn(|lane| self.lanes[lane].random::<f32>()))
    }
}

/// Statistics for monitoring pool reuse
#[derive(Debug, Default)]
pub struct PoolStatistics {
    /// Checkouts served from the pool
    pub hits: AtomicU64,
    /// Checkouts that created a new context
    pub misses: AtomicU64,
    /// Contexts handed back
    pub returns: AtomicU64,
    /// Contexts dropped because the pool was full
    pub discards: AtomicU64,
}

impl PoolStatistics {
    /// Fraction of checkouts served from the pool (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

/// Configuration for the generator pool
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of idle contexts kept
    pub max_contexts: usize,
    /// Whether to collect statistics
    pub collect_stats: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_contexts: 16,
            collect_stats: true,
        }
    }
}

/// Bounded pool of [`RandContext`]s
#[derive(Debug)]
pub struct RandContextPool {
    idle: Mutex<VecDeque<RandContext>>,
    next_seed: AtomicU64,
    stats: PoolStatistics,
    config: PoolConfig,
}

impl Default for RandContextPool {
    fn default() -> Self {
        Self::new()
    }
}

impl RandContextPool {
    /// Pool with default configuration
    pub fn new() -> Self {
        Self::with_config(PoolConfig::default())
    }

    /// Pool with custom configuration
    pub fn with_config(config: PoolConfig) -> Self {
        Self {
            idle: Mutex::new(VecDeque::new()),
            next_seed: AtomicU64::new(1),
            stats: PoolStatistics::default(),
            config,
        }
    }

    /// Check a context out; it returns to the pool when the guard drops
    pub fn checkout(&self) -> PooledRandContext<'_> {
        let reused = self.idle.lock().pop_front();
        let context = match reused {
            Some(context) => {
                if self.config.collect_stats {
                    self.stats.hits.fetch_add(1, Ordering::Relaxed);
                }
                context
            }
            None => {
                if self.config.collect_stats {
                    self.stats.misses.fetch_add(1, Ordering::Relaxed);
                }
                RandContext::new(self.next_seed.fetch_add(1, Ordering::Relaxed))
            }
        };

        PooledRandContext {
            context: Some(context),
            pool: self,
        }
    }

    fn give_back(&self, context: RandContext) {
        if self.config.collect_stats {
            self.stats.returns.fetch_add(1, Ordering::Relaxed);
        }
        let mut idle = self.idle.lock();
        if idle.len() < self.config.max_contexts {
            idle.push_back(context);
        } else if self.config.collect_stats {
            self.stats.discards.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Pool statistics
    pub fn stats(&self) -> &PoolStatistics {
        &self.stats
    }

    /// Number of idle contexts
    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }
}

/// Checked-out generator, returned to its pool on drop
#[derive(Debug)]
pub struct PooledRandContext<'a> {
    context: Option<RandContext>,
    pool: &'a RandContextPool,
}

impl PooledRandContext<'_> {
    /// Mutable access to the generator
    pub fn get_mut(&mut self) -> &mut RandContext {
        self.context
            .as_mut()
            .expect("PooledRandContext context was taken")
    }

    /// Shared access to the generator
    pub fn get_ref(&self) -> &RandContext {
        self.context
            .as_ref()
            .expect("PooledRandContext context was taken")
    }
}

impl Deref for PooledRandContext<'_> {
    type Target = RandContext;

    fn deref(&self) -> &RandContext {
        self.get_ref()
    }
}

impl DerefMut for PooledRandContext<'_> {
    fn deref_mut(&mut self) -> &mut RandContext {
        self.get_mut()
    }
}

impl Drop for PooledRandContext<'_> {
    fn drop(&mut self) {
        if let Some(context) = self.context.take() {
            self.pool.give_back(context);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(seed: u32) -> RandomStream {
        RandomStream::new(Arc::new(RandomTable::new(7)), seed)
    }

    #[test]
    fn test_table_range() {
        let table = RandomTable::new(1);
        for i in 0..RANDOM_TABLE_SIZE as u32 {
            let value = table.get(i);
            assert!((0.0..1.0).contains(&value));
        }
        assert_eq!(table.get(5), table.get(5 + 4096));
    }

    #[test]
    fn test_sequential_draws_follow_sample_ids() {
        let mut s = stream(100);
        let expected: Vec<f32> = (0..4).map(|id| s.random_float_at(id, 2.0, 4.0)).collect();
        let drawn: Vec<f32> = (0..4).map(|_| s.random_float(2.0, 4.0)).collect();
        assert_eq!(drawn, expected);
    }

    #[test]
    fn test_vectors_consume_three_ids() {
        let mut s = stream(3);
        let _ = s.random_vector_uniform(0.0, 1.0);
        assert_eq!(s.random_float(0.0, 1.0), s.unit_at(3));
    }

    #[test]
    fn test_random_int_inclusive() {
        let mut s = stream(0);
        for _ in 0..2000 {
            let value = s.random_int(2, 5);
            assert!((2..=5).contains(&value));
        }
    }

    #[test]
    fn test_unit_sphere() {
        let mut s = stream(11);
        for _ in 0..500 {
            let (v, r) = s.random_vector_in_unit_sphere();
            assert!(v.length() <= 1.0 + 1e-5);
            assert!((v.length() - r).abs() < 1e-4);
        }
    }

    #[test]
    fn test_lanes_match_scalar_ids() {
        let s = stream(9);
        let lanes = s.unit_x4(FourInts([1, 2, 3, 4]), 10);
        for lane in 0..4 {
            assert_eq!(lanes.lane(lane), s.unit_at(11 + lane as u32));
        }
    }

    #[test]
    fn test_pool_reuse_and_stats() {
        let pool = RandContextPool::with_config(PoolConfig {
            max_contexts: 1,
            collect_stats: true,
        });
        {
            let mut a = pool.checkout();
            let _b = pool.checkout();
            let values = a.next_x4();
            assert!(values.0.iter().all(|v| (0.0..1.0).contains(v)));
        }
        assert_eq!(pool.idle_count(), 1);
        assert_eq!(pool.stats().discards.load(Ordering::Relaxed), 1);

        let _c = pool.checkout();
        assert_eq!(pool.stats().hits.load(Ordering::Relaxed), 1);
        assert!((pool.stats().hit_rate() - 1.0 / 3.0).abs() < 1e-9);
    }
}
