//! Geometry primitives shared across the nucleosim workspace.
//!
//! Everything here operates in two coordinate systems: continuous world
//! coordinates (micrometers) and the voxel-index space of some grid. A grid
//! is described by its physical `offset` (world coordinate of its first
//! voxel's low corner) and per-axis `resolution` (voxels per unit length);
//! different grids are independently offset and resolved, so conversions
//! always go through a [`GridFrame`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when constructing geometry values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GeomError {
    /// Indicates invalid grid parameters (zero extent, non-positive resolution).
    #[error("invalid grid: {0}")]
    InvalidGrid(&'static str),
    /// Indicates invalid bounding-box corners.
    #[error("invalid AABB: {0}")]
    InvalidAabb(&'static str),
    /// Indicates an invalid sphere-set element.
    #[error("invalid sphere set: {0}")]
    InvalidSphereSet(&'static str),
}

/// Continuous 3-D world coordinate.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    /// Construct a new vector.
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Vector with all components equal.
    #[must_use]
    pub const fn splat(v: f32) -> Self {
        Self::new(v, v, v)
    }

    /// Component by axis index (0 = x, 1 = y, 2 = z).
    #[must_use]
    pub fn axis(self, axis: usize) -> f32 {
        match axis {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    /// Elementwise product.
    #[must_use]
    pub fn elem_mul(self, rhs: Self) -> Self {
        Self::new(self.x * rhs.x, self.y * rhs.y, self.z * rhs.z)
    }

    /// Elementwise quotient.
    #[must_use]
    pub fn elem_div(self, rhs: Self) -> Self {
        Self::new(self.x / rhs.x, self.y / rhs.y, self.z / rhs.z)
    }

    /// Uniform scale.
    #[must_use]
    pub fn scale(self, s: f32) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s)
    }

    /// Squared Euclidean length.
    #[must_use]
    pub fn len_sq(self) -> f32 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }
}

impl std::ops::Add for Vec3 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl std::ops::Neg for Vec3 {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

/// Placement of a voxel grid in world coordinates: extent in voxels, world
/// coordinate of the low corner, and voxels per unit length per axis.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GridFrame {
    pub dims: [usize; 3],
    pub offset: Vec3,
    pub resolution: Vec3,
}

impl GridFrame {
    /// Validate and construct a grid frame.
    pub fn new(dims: [usize; 3], offset: Vec3, resolution: Vec3) -> Result<Self, GeomError> {
        if dims.iter().any(|&d| d == 0) {
            return Err(GeomError::InvalidGrid("grid extent must be non-zero"));
        }
        if resolution.x <= 0.0 || resolution.y <= 0.0 || resolution.z <= 0.0 {
            return Err(GeomError::InvalidGrid("resolution must be positive"));
        }
        Ok(Self {
            dims,
            offset,
            resolution,
        })
    }

    /// Total voxel count.
    #[must_use]
    pub fn voxel_count(&self) -> usize {
        self.dims[0] * self.dims[1] * self.dims[2]
    }

    /// Flat storage index for a voxel (x fastest, z slowest).
    #[inline]
    #[must_use]
    pub fn flat(&self, idx: [usize; 3]) -> usize {
        (idx[2] * self.dims[1] + idx[1]) * self.dims[0] + idx[0]
    }

    /// Whether the voxel index lies inside the grid.
    #[must_use]
    pub fn in_bounds(&self, idx: [usize; 3]) -> bool {
        idx[0] < self.dims[0] && idx[1] < self.dims[1] && idx[2] < self.dims[2]
    }

    /// World coordinate of a voxel's center.
    #[must_use]
    pub fn voxel_center(&self, idx: [usize; 3]) -> Vec3 {
        Vec3::new(
            (idx[0] as f32 + 0.5) / self.resolution.x,
            (idx[1] as f32 + 0.5) / self.resolution.y,
            (idx[2] as f32 + 0.5) / self.resolution.z,
        ) + self.offset
    }

    /// World coordinate of the grid's far corner.
    #[must_use]
    pub fn far_corner(&self) -> Vec3 {
        self.offset
            + Vec3::new(
                self.dims[0] as f32 / self.resolution.x,
                self.dims[1] as f32 / self.resolution.y,
                self.dims[2] as f32 / self.resolution.z,
            )
    }

    /// Voxel index holding a world coordinate: subtract the offset, scale by
    /// the resolution, truncate. Returns `None` outside the grid.
    #[must_use]
    pub fn world_to_voxel(&self, point: Vec3) -> Option<[usize; 3]> {
        let local = (point - self.offset).elem_mul(self.resolution);
        if local.x < 0.0 || local.y < 0.0 || local.z < 0.0 {
            return None;
        }
        let idx = [local.x as usize, local.y as usize, local.z as usize];
        self.in_bounds(idx).then_some(idx)
    }
}

/// Inclusive-exclusive voxel index range produced by AABB projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRange {
    pub lo: [usize; 3],
    pub hi: [usize; 3],
}

impl PixelRange {
    /// A range containing no voxels.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            lo: [0; 3],
            hi: [0; 3],
        }
    }

    /// Whether the range contains no voxels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        (0..3).any(|axis| self.hi[axis] <= self.lo[axis])
    }

    /// Number of voxels in the range.
    #[must_use]
    pub fn voxel_count(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        (0..3).map(|axis| self.hi[axis] - self.lo[axis]).product()
    }

    /// Whether a voxel index falls inside the range.
    #[must_use]
    pub fn contains(&self, idx: [usize; 3]) -> bool {
        (0..3).all(|axis| idx[axis] >= self.lo[axis] && idx[axis] < self.hi[axis])
    }
}

/// Axis-aligned bounding box in continuous world coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Aabb {
    min: Vec3,
    max: Vec3,
}

impl Aabb {
    /// Construct from explicit corners; inverted corners fail fast.
    pub fn from_corners(min: Vec3, max: Vec3) -> Result<Self, GeomError> {
        if min.x > max.x || min.y > max.y || min.z > max.z {
            return Err(GeomError::InvalidAabb("min corner exceeds max corner"));
        }
        Ok(Self { min, max })
    }

    /// An inverted box that accumulates via [`Aabb::include`].
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::INFINITY),
            max: Vec3::splat(f32::NEG_INFINITY),
        }
    }

    /// Whether nothing has been accumulated (or the box is degenerate on
    /// every axis).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.min.x >= self.max.x && self.min.y >= self.max.y && self.min.z >= self.max.z
    }

    /// Low corner.
    #[must_use]
    pub const fn min_corner(&self) -> Vec3 {
        self.min
    }

    /// High corner.
    #[must_use]
    pub const fn max_corner(&self) -> Vec3 {
        self.max
    }

    /// Grow the box to cover the span `[lo, hi]`.
    pub fn include(&mut self, lo: Vec3, hi: Vec3) {
        self.min.x = self.min.x.min(lo.x);
        self.min.y = self.min.y.min(lo.y);
        self.min.z = self.min.z.min(lo.z);
        self.max.x = self.max.x.max(hi.x);
        self.max.y = self.max.y.max(hi.y);
        self.max.z = self.max.z.max(hi.z);
    }

    /// Project the box into a target grid's voxel-index space, clipped to the
    /// grid's bounds.
    ///
    /// The min corner rounds down and the max corner rounds up (exclusive),
    /// so every voxel whose center lies inside the box is covered by the
    /// returned range. Degenerate or fully-outside boxes yield an empty
    /// range, never an error.
    #[must_use]
    pub fn project_to_grid(&self, frame: &GridFrame) -> PixelRange {
        if self.is_empty() {
            return PixelRange::empty();
        }
        let mut lo = [0usize; 3];
        let mut hi = [0usize; 3];
        for axis in 0..3 {
            let extent = frame.dims[axis] as f32;
            let res = frame.resolution.axis(axis);
            let off = frame.offset.axis(axis);
            let a = (self.min.axis(axis) - off) * res;
            let b = (self.max.axis(axis) - off) * res;
            let lo_px = a.floor().clamp(0.0, extent);
            let hi_px = b.ceil().clamp(lo_px, extent);
            lo[axis] = lo_px as usize;
            hi[axis] = hi_px as usize;
        }
        PixelRange { lo, hi }
    }
}

/// Dense 3-D voxel grid positioned in world coordinates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VoxelGrid<T> {
    frame: GridFrame,
    voxels: Vec<T>,
}

/// Scalar grid of signed distances.
pub type ScalarGrid = VoxelGrid<f32>;
/// Integer label volume shared by all agents during rasterization.
pub type LabelVolume = VoxelGrid<u16>;

impl<T: Copy> VoxelGrid<T> {
    /// Construct a grid filled with `initial`.
    pub fn new(
        dims: [usize; 3],
        offset: Vec3,
        resolution: Vec3,
        initial: T,
    ) -> Result<Self, GeomError> {
        let frame = GridFrame::new(dims, offset, resolution)?;
        Ok(Self {
            voxels: vec![initial; frame.voxel_count()],
            frame,
        })
    }

    /// The grid's placement in world coordinates.
    #[must_use]
    pub const fn frame(&self) -> &GridFrame {
        &self.frame
    }

    /// Extent in voxels per axis.
    #[must_use]
    pub const fn dims(&self) -> [usize; 3] {
        self.frame.dims
    }

    /// World coordinate of the low corner.
    #[must_use]
    pub const fn offset(&self) -> Vec3 {
        self.frame.offset
    }

    /// Voxels per unit length per axis.
    #[must_use]
    pub const fn resolution(&self) -> Vec3 {
        self.frame.resolution
    }

    /// Immutable access to a voxel.
    #[must_use]
    pub fn get(&self, idx: [usize; 3]) -> Option<T> {
        self.frame
            .in_bounds(idx)
            .then(|| self.voxels[self.frame.flat(idx)])
    }

    /// Mutable access to a voxel.
    pub fn get_mut(&mut self, idx: [usize; 3]) -> Option<&mut T> {
        if self.frame.in_bounds(idx) {
            let flat = self.frame.flat(idx);
            Some(&mut self.voxels[flat])
        } else {
            None
        }
    }

    /// Fill every voxel with `value`.
    pub fn fill(&mut self, value: T) {
        self.voxels.fill(value);
    }

    /// Flat voxel storage (x fastest, z slowest).
    #[must_use]
    pub fn voxels(&self) -> &[T] {
        &self.voxels
    }

    /// Mutable flat voxel storage.
    #[must_use]
    pub fn voxels_mut(&mut self) -> &mut [T] {
        &mut self.voxels
    }
}

/// Sign/zero convention of a distance field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DistanceModel {
    /// Inside carries distance <= 0 with the boundary exactly 0; outside
    /// carries a positive gradient.
    ZeroInGradOut,
    /// Strictly inside carries a negative gradient approaching 0 at the
    /// boundary; boundary and outside are exactly 0.
    GradInZeroOut,
}

/// Signed-distance-field shape representation.
///
/// The cached AABB is computed once at construction from the mask's
/// inside-and-boundary voxels and is not recomputed automatically; call
/// [`DistanceField::recompute_aabb`] after reshaping the grid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DistanceField {
    grid: ScalarGrid,
    model: DistanceModel,
    aabb: Aabb,
}

impl DistanceField {
    /// Build a distance field from a binary mask (nonzero = inside) using a
    /// two-pass chamfer transform, polarity chosen by `model`.
    ///
    /// Deterministic for a given mask and model. Distances are measured in
    /// world units, respecting anisotropic resolution.
    pub fn from_mask(mask: &LabelVolume, model: DistanceModel) -> Result<Self, GeomError> {
        let frame = *mask.frame();
        let dims = frame.dims;
        let count = frame.voxel_count();

        let inside: Vec<bool> = mask.voxels().iter().map(|&v| v != 0).collect();
        let boundary = classify_boundary(&inside, dims);

        let mut dist = vec![f32::INFINITY; count];
        for (flat, &on_boundary) in boundary.iter().enumerate() {
            if on_boundary {
                dist[flat] = 0.0;
            }
        }
        chamfer_sweep(&mut dist, &frame);

        let mut values = ScalarGrid::new(dims, frame.offset, frame.resolution, 0.0)?;
        for flat in 0..count {
            let d = if dist[flat].is_finite() {
                dist[flat]
            } else {
                f32::MAX
            };
            values.voxels_mut()[flat] = if inside[flat] {
                if boundary[flat] { 0.0 } else { -d }
            } else {
                match model {
                    DistanceModel::ZeroInGradOut => d,
                    DistanceModel::GradInZeroOut => 0.0,
                }
            };
        }

        let aabb = mask_aabb(&inside, &frame);
        Ok(Self {
            grid: values,
            model,
            aabb,
        })
    }

    /// The distance model this field was built with.
    #[must_use]
    pub const fn model(&self) -> DistanceModel {
        self.model
    }

    /// The underlying scalar distance grid.
    #[must_use]
    pub const fn grid(&self) -> &ScalarGrid {
        &self.grid
    }

    /// Mutable access to the distance grid. The cached AABB is left stale;
    /// callers that reshape the field must follow up with
    /// [`DistanceField::recompute_aabb`].
    pub fn grid_mut(&mut self) -> &mut ScalarGrid {
        &mut self.grid
    }

    /// The cached bounding box of the boundary-relevant region.
    #[must_use]
    pub const fn aabb(&self) -> &Aabb {
        &self.aabb
    }

    /// Recompute the cached AABB as the tight bound of all voxels the field
    /// can claim under its model.
    pub fn recompute_aabb(&mut self) {
        let frame = *self.grid.frame();
        let mut aabb = Aabb::empty();
        for z in 0..frame.dims[2] {
            for y in 0..frame.dims[1] {
                for x in 0..frame.dims[0] {
                    let idx = [x, y, z];
                    let value = self.grid.voxels()[frame.flat(idx)];
                    if self.claims(value) {
                        include_voxel(&mut aabb, idx, &frame);
                    }
                }
            }
        }
        self.aabb = aabb;
    }

    /// Inclusion rule for a sampled distance value.
    ///
    /// A voxel is claimed when the distance is negative, or when it is
    /// exactly 0 under `ZeroInGradOut` (where 0 marks the boundary itself).
    /// Under `GradInZeroOut` an exact 0 denotes boundary/outside and is
    /// excluded, giving a one-voxel-shell difference between the models.
    #[must_use]
    pub fn claims(&self, distance: f32) -> bool {
        distance < 0.0 || (distance == 0.0 && self.model == DistanceModel::ZeroInGradOut)
    }

    /// Sample the field at a world coordinate with nearest-voxel truncation
    /// (no interpolation). Returns `None` outside the native grid.
    #[must_use]
    pub fn sample_world(&self, point: Vec3) -> Option<f32> {
        let idx = self.grid.frame().world_to_voxel(point)?;
        self.grid.get(idx)
    }

    /// Whether a world coordinate is inside the shape under this model.
    #[must_use]
    pub fn contains_world(&self, point: Vec3) -> bool {
        self.sample_world(point).is_some_and(|d| self.claims(d))
    }
}

fn include_voxel(aabb: &mut Aabb, idx: [usize; 3], frame: &GridFrame) {
    let lo = frame.offset
        + Vec3::new(
            idx[0] as f32 / frame.resolution.x,
            idx[1] as f32 / frame.resolution.y,
            idx[2] as f32 / frame.resolution.z,
        );
    let hi = lo
        + Vec3::new(
            1.0 / frame.resolution.x,
            1.0 / frame.resolution.y,
            1.0 / frame.resolution.z,
        );
    aabb.include(lo, hi);
}

fn mask_aabb(inside: &[bool], frame: &GridFrame) -> Aabb {
    let mut aabb = Aabb::empty();
    for z in 0..frame.dims[2] {
        for y in 0..frame.dims[1] {
            for x in 0..frame.dims[0] {
                let idx = [x, y, z];
                if inside[frame.flat(idx)] {
                    include_voxel(&mut aabb, idx, frame);
                }
            }
        }
    }
    aabb
}

/// Mark inside voxels with at least one 6-neighbor outside the shape; voxels
/// on the grid edge count as boundary (off-grid is outside).
fn classify_boundary(inside: &[bool], dims: [usize; 3]) -> Vec<bool> {
    let flat = |x: usize, y: usize, z: usize| (z * dims[1] + y) * dims[0] + x;
    let mut boundary = vec![false; inside.len()];
    for z in 0..dims[2] {
        for y in 0..dims[1] {
            for x in 0..dims[0] {
                if !inside[flat(x, y, z)] {
                    continue;
                }
                let exposed = x == 0
                    || y == 0
                    || z == 0
                    || x + 1 == dims[0]
                    || y + 1 == dims[1]
                    || z + 1 == dims[2]
                    || !inside[flat(x - 1, y, z)]
                    || !inside[flat(x + 1, y, z)]
                    || !inside[flat(x, y - 1, z)]
                    || !inside[flat(x, y + 1, z)]
                    || !inside[flat(x, y, z - 1)]
                    || !inside[flat(x, y, z + 1)];
                boundary[flat(x, y, z)] = exposed;
            }
        }
    }
    boundary
}

/// Two-pass chamfer propagation over a 26-neighborhood, weighted by the
/// physical voxel step per axis.
fn chamfer_sweep(dist: &mut [f32], frame: &GridFrame) {
    let dims = frame.dims;
    let step = Vec3::new(
        1.0 / frame.resolution.x,
        1.0 / frame.resolution.y,
        1.0 / frame.resolution.z,
    );

    // Forward half of the 26-neighborhood: offsets preceding the origin in
    // (z, y, x) scan order.
    let mut forward: Vec<([i64; 3], f32)> = Vec::with_capacity(13);
    for dz in -1i64..=1 {
        for dy in -1i64..=1 {
            for dx in -1i64..=1 {
                let precedes = dz < 0 || (dz == 0 && (dy < 0 || (dy == 0 && dx < 0)));
                if precedes {
                    let weight = ((dx as f32 * step.x).powi(2)
                        + (dy as f32 * step.y).powi(2)
                        + (dz as f32 * step.z).powi(2))
                    .sqrt();
                    forward.push(([dx, dy, dz], weight));
                }
            }
        }
    }

    let flat = |x: i64, y: i64, z: i64| {
        ((z as usize) * dims[1] + y as usize) * dims[0] + x as usize
    };
    let in_bounds = |x: i64, y: i64, z: i64| {
        x >= 0 && y >= 0 && z >= 0 && (x as usize) < dims[0] && (y as usize) < dims[1] && (z as usize) < dims[2]
    };

    // Forward pass.
    for z in 0..dims[2] as i64 {
        for y in 0..dims[1] as i64 {
            for x in 0..dims[0] as i64 {
                let here = flat(x, y, z);
                let mut best = dist[here];
                for &([dx, dy, dz], weight) in &forward {
                    if in_bounds(x + dx, y + dy, z + dz) {
                        let candidate = dist[flat(x + dx, y + dy, z + dz)] + weight;
                        if candidate < best {
                            best = candidate;
                        }
                    }
                }
                dist[here] = best;
            }
        }
    }

    // Backward pass with mirrored offsets.
    for z in (0..dims[2] as i64).rev() {
        for y in (0..dims[1] as i64).rev() {
            for x in (0..dims[0] as i64).rev() {
                let here = flat(x, y, z);
                let mut best = dist[here];
                for &([dx, dy, dz], weight) in &forward {
                    if in_bounds(x - dx, y - dy, z - dz) {
                        let candidate = dist[flat(x - dx, y - dy, z - dz)] + weight;
                        if candidate < best {
                            best = candidate;
                        }
                    }
                }
                dist[here] = best;
            }
        }
    }
}

/// A single sphere in world coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
}

impl Sphere {
    /// Construct a new sphere.
    #[must_use]
    pub const fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }
}

/// Union-of-spheres shape representation used by mobile agents.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SphereSet {
    spheres: Vec<Sphere>,
}

impl SphereSet {
    /// Construct from spheres; non-positive radii fail fast.
    pub fn new(spheres: Vec<Sphere>) -> Result<Self, GeomError> {
        if spheres.iter().any(|s| s.radius <= 0.0) {
            return Err(GeomError::InvalidSphereSet("sphere radius must be positive"));
        }
        Ok(Self { spheres })
    }

    /// The spheres in the set.
    #[must_use]
    pub fn spheres(&self) -> &[Sphere] {
        &self.spheres
    }

    /// Number of spheres.
    #[must_use]
    pub fn len(&self) -> usize {
        self.spheres.len()
    }

    /// Whether the set holds no spheres.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.spheres.is_empty()
    }

    /// Whether a world coordinate lies in any sphere.
    #[must_use]
    pub fn contains(&self, point: Vec3) -> bool {
        self.spheres
            .iter()
            .any(|s| (point - s.center).len_sq() <= s.radius * s.radius)
    }

    /// Shift every sphere by `delta`.
    pub fn translate(&mut self, delta: Vec3) {
        for sphere in &mut self.spheres {
            sphere.center = sphere.center + delta;
        }
    }

    /// Tight bounding box of the union.
    #[must_use]
    pub fn aabb(&self) -> Aabb {
        let mut aabb = Aabb::empty();
        for sphere in &self.spheres {
            let r = Vec3::splat(sphere.radius);
            aabb.include(sphere.center - r, sphere.center + r);
        }
        aabb
    }
}
