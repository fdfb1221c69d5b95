//! World collision cache
//!
//! Tracing a ray per particle per step is the expensive part of colliding
//! with the world. The cache keeps recent trace results (start, end, hit
//! point, hit normal) and answers a particle's query from the nearest cached
//! segment when it is close enough, so fresh traces scale with cache misses
//! rather than with particle count.

use glam::Vec3;
use log::{debug, trace};
use parking_lot::Mutex;
use std::fmt;
use std::sync::OnceLock;

/// Maximum cached planes per cache
pub const MAX_WORLD_PLANAR_CONSTRAINTS: usize = 26 + 15;

/// Sentinel stored for a missed trace
pub const INVALID_POINT: Vec3 = Vec3::splat(f32::MAX);

/// Whether a point or normal is the miss sentinel
#[inline]
pub fn is_invalid(v: Vec3) -> bool {
    v == INVALID_POINT
}

/// Result of one world trace
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceResult {
    /// Fraction of the segment travelled before the hit, 1 for a miss
    pub fraction: f32,
    /// Where the trace stopped
    pub end_position: Vec3,
    /// Normal of the plane hit
    pub plane_normal: Vec3,
    /// The start point was inside solid geometry
    pub start_solid: bool,
}

impl TraceResult {
    /// A trace that hit nothing
    pub fn miss(end: Vec3) -> Self {
        Self {
            fraction: 1.0,
            end_position: end,
            plane_normal: Vec3::ZERO,
            start_solid: false,
        }
    }

    /// Whether the trace stopped on geometry
    pub fn hit(&self) -> bool {
        self.fraction < 1.0 && !self.start_solid
    }
}

/// World geometry queries supplied by the host
pub trait WorldQuery: Send + Sync + fmt::Debug {
    /// Trace a segment against the world
    fn trace_line(
        &self,
        start: Vec3,
        end: Vec3,
        contents_mask: u32,
        collision_group: i32,
    ) -> TraceResult;
}

/// A world with no geometry
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyWorld;

impl WorldQuery for EmptyWorld {
    fn trace_line(&self, _start: Vec3, end: Vec3, _mask: u32, _group: i32) -> TraceResult {
        TraceResult::miss(end)
    }
}

/// How a cache is filled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum CollisionMode {
    /// Trace each particle's own movement, reusing nearby cached traces
    PerParticleTrace,
    /// Fan out traces around an origin each rebuild, dropping misses
    PerFramePlaneset,
    /// Fan out traces around an origin, keeping misses so every direction
    /// stays covered
    UseNearestTrace,
    /// One trace straight down per rebuild, then per-particle traces
    InitialTraceDown,
}

impl CollisionMode {
    /// Number of modes, one cache slot each
    pub const COUNT: usize = 4;

    fn slot(self) -> usize {
        match self {
            Self::PerParticleTrace => 0,
            Self::PerFramePlaneset => 1,
            Self::UseNearestTrace => 2,
            Self::InitialTraceDown => 3,
        }
    }

    /// Directions traced when the cache is rebuilt
    pub fn rebuild_directions(self) -> Vec<Vec3> {
        match self {
            Self::PerParticleTrace => Vec::new(),
            Self::InitialTraceDown => vec![Vec3::NEG_Z],
            Self::PerFramePlaneset | Self::UseNearestTrace => fan_out_directions(),
        }
    }

    /// Whether missed rebuild traces stay in the cache
    pub fn keeps_misses(self) -> bool {
        matches!(self, Self::UseNearestTrace | Self::InitialTraceDown)
    }
}

/// The 26 axis, edge and corner directions of a cube, normalised
pub fn fan_out_directions() -> Vec<Vec3> {
    let mut directions = Vec::with_capacity(26);
    for x in -1i8..=1 {
        for y in -1i8..=1 {
            for z in -1i8..=1 {
                if x == 0 && y == 0 && z == 0 {
                    continue;
                }
                directions.push(Vec3::new(f32::from(x), f32::from(y), f32::from(z)).normalize());
            }
        }
    }
    directions
}

/// Parameters for tracing into a cache
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceParams {
    /// Length of rebuild traces
    pub trace_length: f32,
    /// Contents mask passed to the world
    pub contents_mask: u32,
    /// Collision group passed to the world
    pub collision_group: i32,
}

impl Default for TraceParams {
    fn default() -> Self {
        Self {
            trace_length: 1024.0,
            contents_mask: u32::MAX,
            collision_group: 0,
        }
    }
}

/// One cached trace
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CachedPlane {
    /// Trace start
    pub start: Vec3,
    /// Trace end
    pub end: Vec3,
    /// Hit point, [`INVALID_POINT`] for a miss
    pub point: Vec3,
    /// Hit normal, [`INVALID_POINT`] for a miss
    pub normal: Vec3,
    /// Slot holds a result
    pub active: bool,
}

impl CachedPlane {
    fn from_trace(start: Vec3, end: Vec3, result: &TraceResult) -> Self {
        let (point, normal) = if result.hit() {
            (result.end_position, result.plane_normal)
        } else {
            (INVALID_POINT, INVALID_POINT)
        };
        Self {
            start,
            end,
            point,
            normal,
            active: true,
        }
    }

    /// Whether the trace hit something
    pub fn is_valid(&self) -> bool {
        !is_invalid(self.point) && !is_invalid(self.normal)
    }

    /// Squared distance used to match a query segment against this one
    pub fn match_distance_squared(&self, start: Vec3, end: Vec3) -> f32 {
        start
            .distance_squared(self.start)
            .max(end.distance_squared(self.end))
    }
}

/// Reusable set of trace results
#[derive(Debug, Clone)]
pub struct CollisionCache {
    planes: Vec<CachedPlane>,
    capacity: usize,
    active_planes: usize,
    next_index: usize,
    origin: Option<Vec3>,
    rebuild_time: f32,
    traces_issued: u64,
}

impl CollisionCache {
    /// Empty cache holding at most `capacity` planes (clamped to the maximum)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, MAX_WORLD_PLANAR_CONSTRAINTS);
        Self {
            planes: Vec::with_capacity(capacity),
            capacity,
            active_planes: 0,
            next_index: 0,
            origin: None,
            rebuild_time: 0.0,
            traces_issued: 0,
        }
    }

    /// Maximum number of planes
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Planes currently held
    pub fn planes(&self) -> &[CachedPlane] {
        &self.planes[..self.active_planes]
    }

    /// Number of planes currently held
    pub fn active_planes(&self) -> usize {
        self.active_planes
    }

    /// Origin of the last rebuild
    pub fn origin(&self) -> Option<Vec3> {
        self.origin
    }

    /// Simulation time of the last rebuild
    pub fn rebuild_time(&self) -> f32 {
        self.rebuild_time
    }

    /// Total traces issued through this cache
    pub fn traces_issued(&self) -> u64 {
        self.traces_issued
    }

    /// Drop every plane and force a rebuild on next use
    pub fn invalidate(&mut self) {
        self.planes.clear();
        self.active_planes = 0;
        self.next_index = 0;
        self.origin = None;
    }

    /// Whether a query from `origin` needs a rebuild
    pub fn needs_rebuild(&self, origin: Vec3, tolerance: f32) -> bool {
        self.origin
            .is_none_or(|cached| cached.distance_squared(origin) > tolerance * tolerance)
    }

    /// Store a trace at the rotating index, evicting the oldest entry when full
    pub fn insert(&mut self, plane: CachedPlane) -> usize {
        let index = self.next_index;
        if index < self.planes.len() {
            self.planes[index] = plane;
        } else {
            self.planes.push(plane);
        }
        self.next_index = (self.next_index + 1) % self.capacity;
        self.active_planes = (self.active_planes + 1).min(self.capacity);
        index
    }

    fn trace(
        &mut self,
        world: &dyn WorldQuery,
        start: Vec3,
        end: Vec3,
        params: &TraceParams,
    ) -> CachedPlane {
        self.traces_issued += 1;
        let result = world.trace_line(start, end, params.contents_mask, params.collision_group);
        CachedPlane::from_trace(start, end, &result)
    }

    /// Rebuild around `origin` when it has moved more than `tolerance` since
    /// the last rebuild. Returns whether a rebuild happened.
    pub fn ensure_built(
        &mut self,
        world: &dyn WorldQuery,
        mode: CollisionMode,
        origin: Vec3,
        tolerance: f32,
        time: f32,
        params: &TraceParams,
    ) -> bool {
        if !self.needs_rebuild(origin, tolerance) {
            return false;
        }
        self.rebuild(world, mode, origin, time, params);
        true
    }

    /// Recompute the cache around `origin`
    pub fn rebuild(
        &mut self,
        world: &dyn WorldQuery,
        mode: CollisionMode,
        origin: Vec3,
        time: f32,
        params: &TraceParams,
    ) {
        self.invalidate();
        let before = self.traces_issued;
        for direction in mode.rebuild_directions().into_iter().take(self.capacity) {
            let end = origin + direction * params.trace_length;
            let plane = self.trace(world, origin, end, params);
            if plane.is_valid() || mode.keeps_misses() {
                self.insert(plane);
            }
        }
        self.origin = Some(origin);
        self.rebuild_time = time;
        debug!(
            "Rebuilt {:?} collision cache at {origin}: {} traces, {} planes",
            mode,
            self.traces_issued - before,
            self.active_planes
        );
    }

    /// Nearest cached plane to a segment within `tolerance_squared`
    pub fn nearest(&self, start: Vec3, end: Vec3, tolerance_squared: f32) -> Option<&CachedPlane> {
        self.planes()
            .iter()
            .filter(|plane| plane.active)
            .map(|plane| (plane.match_distance_squared(start, end), plane))
            .filter(|(distance, _)| *distance <= tolerance_squared)
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, plane)| plane)
    }

    /// Cached result for a segment, tracing and caching a fresh one on a miss
    pub fn lookup_or_trace(
        &mut self,
        world: &dyn WorldQuery,
        start: Vec3,
        end: Vec3,
        tolerance_squared: f32,
        params: &TraceParams,
    ) -> CachedPlane {
        if let Some(plane) = self.nearest(start, end, tolerance_squared) {
            return *plane;
        }
        trace!("Collision cache miss, tracing {start} -> {end}");
        let plane = self.trace(world, start, end, params);
        self.insert(plane);
        plane
    }

    /// Plane whose trace direction best matches `direction`
    pub fn best_in_direction(&self, origin: Vec3, direction: Vec3) -> Option<&CachedPlane> {
        let direction = direction.normalize_or_zero();
        self.planes()
            .iter()
            .filter(|plane| plane.active)
            .map(|plane| {
                let trace_dir = (plane.end - plane.start).normalize_or_zero();
                let offset = plane.start.distance_squared(origin);
                (trace_dir.dot(direction) - offset * f32::EPSILON, plane)
            })
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, plane)| plane)
    }
}

/// Lazily created caches, one per mode, shared down a parent/child chain.
/// Every cache holds [`MAX_WORLD_PLANAR_CONSTRAINTS`] planes whatever the
/// particle count, so a planeset always covers all of its directions.
#[derive(Debug, Default)]
pub struct CollisionSlots {
    slots: [OnceLock<Mutex<CollisionCache>>; CollisionMode::COUNT],
}

impl CollisionSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache for a mode, created on first use
    pub fn get(&self, mode: CollisionMode) -> &Mutex<CollisionCache> {
        self.slots[mode.slot()]
            .get_or_init(|| Mutex::new(CollisionCache::new(MAX_WORLD_PLANAR_CONSTRAINTS)))
    }

    /// Cache for a mode if it has been created
    pub fn existing(&self, mode: CollisionMode) -> Option<&Mutex<CollisionCache>> {
        self.slots[mode.slot()].get()
    }
}
