//! Rasterization of agent geometry into a shared label volume.
//!
//! Every sweep first projects the shape's AABB into the target volume's
//! voxel-index space, so the cost is linear in the projected region, never
//! the full volume. Sampling is nearest-voxel: the target voxel's center is
//! transformed into the shape's native grid and truncated, no interpolation.

use std::sync::atomic::{AtomicU16, Ordering};

use nucleosim_geom::{DistanceField, GridFrame, LabelVolume, SphereSet};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::agent::Geometry;

/// Write/conflict counters from one rasterization sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Voxels claimed by the sweep.
    pub written: usize,
    /// Claims that found a different nonzero label already present.
    pub conflicts: usize,
}

impl SweepStats {
    /// Combine counters from two sweeps.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            written: self.written + other.written,
            conflicts: self.conflicts + other.conflicts,
        }
    }
}

/// Concurrency policy for painting multiple agents into one volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RasterPolicy {
    /// Sequential pass in caller order; overlaps resolve last-write-wins.
    SingleWriter,
    /// Agents fan out in parallel; voxels are claimed with an atomic
    /// compare-exchange, so overlaps resolve first-claim-wins.
    AtomicClaim,
}

/// Stamp any published geometry variant into the volume.
pub fn stamp_geometry(geometry: &Geometry, id: u16, volume: &mut LabelVolume) -> SweepStats {
    match geometry {
        Geometry::DistanceField(field) => stamp_distance_field(field, id, volume),
        Geometry::Spheres(set) => stamp_sphere_set(set, id, volume),
    }
}

/// Paint `id` into every voxel of `volume` the distance field claims.
///
/// Overwrite conflicts (a different nonzero label already present) are
/// expected when agents overlap; they are logged and resolved by
/// last-write-wins, never aborting the sweep.
pub fn stamp_distance_field(
    field: &DistanceField,
    id: u16,
    volume: &mut LabelVolume,
) -> SweepStats {
    let frame = *volume.frame();
    let range = field.aabb().project_to_grid(&frame);
    let mut stats = SweepStats::default();

    for z in range.lo[2]..range.hi[2] {
        for y in range.lo[1]..range.hi[1] {
            for x in range.lo[0]..range.hi[0] {
                let idx = [x, y, z];
                let centre = frame.voxel_center(idx);
                // AABB projection keeps legitimately contained centres inside
                // the native grid; a miss here is a contract violation.
                let Some(dist) = field.sample_world(centre) else {
                    debug!(
                        agent = id,
                        voxel = ?idx,
                        "counter-voxel falls outside the native distance grid"
                    );
                    continue;
                };
                if !field.claims(dist) {
                    continue;
                }
                if let Some(voxel) = volume.get_mut(idx) {
                    if *voxel != 0 && *voxel != id {
                        debug!(agent = id, previous = *voxel, voxel = ?idx, "mask overwrite");
                        stats.conflicts += 1;
                    }
                    *voxel = id;
                    stats.written += 1;
                }
            }
        }
    }
    stats
}

/// Paint `id` into every voxel whose center lies inside the sphere union.
pub fn stamp_sphere_set(set: &SphereSet, id: u16, volume: &mut LabelVolume) -> SweepStats {
    let frame = *volume.frame();
    let range = set.aabb().project_to_grid(&frame);
    let mut stats = SweepStats::default();

    for z in range.lo[2]..range.hi[2] {
        for y in range.lo[1]..range.hi[1] {
            for x in range.lo[0]..range.hi[0] {
                let idx = [x, y, z];
                if !set.contains(frame.voxel_center(idx)) {
                    continue;
                }
                if let Some(voxel) = volume.get_mut(idx) {
                    if *voxel != 0 && *voxel != id {
                        debug!(agent = id, previous = *voxel, voxel = ?idx, "mask overwrite");
                        stats.conflicts += 1;
                    }
                    *voxel = id;
                    stats.written += 1;
                }
            }
        }
    }
    stats
}

/// Atomic-claim variant of [`stamp_geometry`] writing through a shared label
/// buffer laid out per `frame`.
pub fn stamp_geometry_atomic(
    geometry: &Geometry,
    id: u16,
    frame: &GridFrame,
    labels: &[AtomicU16],
) -> SweepStats {
    match geometry {
        Geometry::DistanceField(field) => stamp_distance_field_atomic(field, id, frame, labels),
        Geometry::Spheres(set) => stamp_sphere_set_atomic(set, id, frame, labels),
    }
}

/// Atomic-claim variant of [`stamp_distance_field`]. A voxel is claimed by a
/// 0 -> id compare-exchange, so concurrent writers cannot lose updates; an
/// already-claimed voxel is logged as a conflict and left untouched.
pub fn stamp_distance_field_atomic(
    field: &DistanceField,
    id: u16,
    frame: &GridFrame,
    labels: &[AtomicU16],
) -> SweepStats {
    let range = field.aabb().project_to_grid(frame);
    let mut stats = SweepStats::default();

    for z in range.lo[2]..range.hi[2] {
        for y in range.lo[1]..range.hi[1] {
            for x in range.lo[0]..range.hi[0] {
                let idx = [x, y, z];
                let Some(dist) = field.sample_world(frame.voxel_center(idx)) else {
                    debug!(
                        agent = id,
                        voxel = ?idx,
                        "counter-voxel falls outside the native distance grid"
                    );
                    continue;
                };
                if field.claims(dist) {
                    stats = stats.merge(claim_voxel(frame, labels, idx, id));
                }
            }
        }
    }
    stats
}

/// Atomic-claim variant of [`stamp_sphere_set`].
pub fn stamp_sphere_set_atomic(
    set: &SphereSet,
    id: u16,
    frame: &GridFrame,
    labels: &[AtomicU16],
) -> SweepStats {
    let range = set.aabb().project_to_grid(frame);
    let mut stats = SweepStats::default();

    for z in range.lo[2]..range.hi[2] {
        for y in range.lo[1]..range.hi[1] {
            for x in range.lo[0]..range.hi[0] {
                let idx = [x, y, z];
                if set.contains(frame.voxel_center(idx)) {
                    stats = stats.merge(claim_voxel(frame, labels, idx, id));
                }
            }
        }
    }
    stats
}

fn claim_voxel(frame: &GridFrame, labels: &[AtomicU16], idx: [usize; 3], id: u16) -> SweepStats {
    let mut stats = SweepStats::default();
    match labels[frame.flat(idx)].compare_exchange(0, id, Ordering::Relaxed, Ordering::Relaxed) {
        Ok(_) => stats.written += 1,
        Err(existing) if existing == id => stats.written += 1,
        Err(existing) => {
            debug!(agent = id, kept = existing, voxel = ?idx, "atomic claim lost");
            stats.conflicts += 1;
        }
    }
    stats
}
