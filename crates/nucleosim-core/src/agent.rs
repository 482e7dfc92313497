//! The agent phase contract and the geometry values agents publish.

use nucleosim_geom::{Aabb, DistanceField, LabelVolume, SphereSet};
use serde::{Deserialize, Serialize};
use slotmap::{SecondaryMap, new_key_type};

use crate::display::DisplayUnit;
use crate::raster::SweepStats;

new_key_type! {
    /// Stable handle for agents in the officer's registry. Handed to each
    /// agent at spawn as its non-owning back-reference to the driver.
    pub struct AgentKey;
}

/// Convenience alias for associating side data with agents.
pub type AgentMap<T> = SecondaryMap<AgentKey, T>;

/// Geometry value exposed by an agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Geometry {
    /// Signed-distance-field shape (static reference shapes).
    DistanceField(DistanceField),
    /// Union-of-spheres shape (mobile nuclei).
    Spheres(SphereSet),
}

impl Geometry {
    /// Bounding box of the shape's relevant region.
    #[must_use]
    pub fn aabb(&self) -> Aabb {
        match self {
            Self::DistanceField(field) => *field.aabb(),
            Self::Spheres(set) => set.aabb(),
        }
    }

    /// Borrow the distance field, if this is one.
    #[must_use]
    pub fn as_distance_field(&self) -> Option<&DistanceField> {
        match self {
            Self::DistanceField(field) => Some(field),
            Self::Spheres(_) => None,
        }
    }

    /// Borrow the sphere set, if this is one.
    #[must_use]
    pub fn as_spheres(&self) -> Option<&SphereSet> {
        match self {
            Self::Spheres(set) => Some(set),
            Self::DistanceField(_) => None,
        }
    }
}

/// An agent's last-committed geometry as recorded by the officer.
///
/// Entries are refreshed only during phase 5, which is what makes phase-3
/// reads a consistent snapshot of the previous tick.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedGeometry {
    pub id: u16,
    pub kind: String,
    pub geometry: Geometry,
}

/// Read-only view of the population's published geometry, handed to agents
/// during phase 3.
pub struct NeighborView<'a> {
    own: AgentKey,
    published: &'a AgentMap<PublishedGeometry>,
}

impl<'a> NeighborView<'a> {
    pub(crate) fn new(own: AgentKey, published: &'a AgentMap<PublishedGeometry>) -> Self {
        Self { own, published }
    }

    /// Iterate over every other agent's published geometry.
    pub fn others(&self) -> impl Iterator<Item = &'a PublishedGeometry> + '_ {
        self.published
            .iter()
            .filter(move |(key, _)| *key != self.own)
            .map(|(_, entry)| entry)
    }

    /// Number of other agents visible in the view.
    #[must_use]
    pub fn len(&self) -> usize {
        self.published.len().saturating_sub(1)
    }

    /// Whether no other agents are visible.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The per-tick lifecycle every agent variant implements.
///
/// The officer invokes the five phases in this exact order, once per tick,
/// across the whole population, with a full barrier between phases: every
/// agent completes phase N before any agent begins phase N+1. Phases 1-4
/// prepare a private staging geometry; phase 5 commits it, so no agent ever
/// observes a half-updated neighbor.
pub trait Agent: Send {
    /// Process-unique label id (also the value stamped into mask volumes).
    fn id(&self) -> u16;

    /// Human-readable type tag.
    fn kind(&self) -> &str;

    /// Read-only view of the published geometry. Ownership never leaves the
    /// agent; the geometry is only mutated inside the agent's own phases.
    fn geometry(&self) -> &Geometry;

    /// The agent's own simulated time.
    fn current_time(&self) -> f32;

    /// Record the officer registry handle. Called once after spawn.
    fn set_officer(&mut self, key: AgentKey);

    /// Phase 1: advance the agent's own clock by its increment and build
    /// internal (self-driven) deltas. Must not read other agents' state.
    fn advance_and_build_internal_forces(&mut self, global_dt: f32);

    /// Phase 2: apply internal deltas to the private staging geometry.
    fn adjust_geometry_by_internal_forces(&mut self);

    /// Phase 3: read other agents' previously-published geometry to compute
    /// interaction effects. No-op for variants with no external interaction.
    fn collect_external_forces(&mut self, view: &NeighborView<'_>);

    /// Phase 4: merge external effects into the same staging geometry.
    fn adjust_geometry_by_external_forces(&mut self);

    /// Phase 5: commit the staging geometry into the published geometry.
    /// Returns whether anything changed; a `false` commit preserves geometry
    /// identity across ticks.
    fn update_geometry(&mut self) -> bool;

    /// Debug rendering into a wireframe display. Read-only; gated by the
    /// agent's detailed-drawing flag.
    fn draw_debug(&self, display: &mut dyn DisplayUnit);

    /// Stamp the agent's identity into a label volume (ground-truth mask).
    /// Read-only with respect to simulation state.
    fn draw_mask(&self, volume: &mut LabelVolume) -> SweepStats;
}

#[cfg(test)]
mod tests {
    use super::*;
    use nucleosim_geom::{DistanceModel, Sphere, Vec3};

    #[test]
    fn geometry_aabb_dispatches_per_variant() {
        let set = SphereSet::new(vec![Sphere::new(Vec3::splat(2.0), 1.0)]).expect("set");
        let geometry = Geometry::Spheres(set);
        assert_eq!(geometry.aabb().min_corner(), Vec3::splat(1.0));
        assert!(geometry.as_spheres().is_some());
        assert!(geometry.as_distance_field().is_none());

        let mut mask =
            LabelVolume::new([4, 4, 4], Vec3::default(), Vec3::splat(1.0), 0).expect("mask");
        *mask.get_mut([1, 1, 1]).expect("voxel") = 1;
        let field = DistanceField::from_mask(&mask, DistanceModel::ZeroInGradOut).expect("field");
        let geometry = Geometry::DistanceField(field);
        assert_eq!(geometry.aabb().min_corner(), Vec3::splat(1.0));
        assert_eq!(geometry.aabb().max_corner(), Vec3::splat(2.0));
        assert!(geometry.as_distance_field().is_some());
    }

    #[test]
    fn neighbor_view_excludes_the_owner() {
        let mut registry: slotmap::SlotMap<AgentKey, ()> = slotmap::SlotMap::with_key();
        let a = registry.insert(());
        let b = registry.insert(());
        let mut published: AgentMap<PublishedGeometry> = AgentMap::new();
        let set = SphereSet::new(vec![Sphere::new(Vec3::default(), 1.0)]).expect("set");
        published.insert(
            a,
            PublishedGeometry {
                id: 1,
                kind: "nucleus".into(),
                geometry: Geometry::Spheres(set.clone()),
            },
        );
        published.insert(
            b,
            PublishedGeometry {
                id: 2,
                kind: "nucleus".into(),
                geometry: Geometry::Spheres(set),
            },
        );

        let view = NeighborView::new(a, &published);
        let others: Vec<u16> = view.others().map(|entry| entry.id).collect();
        assert_eq!(others, vec![2]);
        assert_eq!(view.len(), 1);
        assert!(!view.is_empty());
    }
}
