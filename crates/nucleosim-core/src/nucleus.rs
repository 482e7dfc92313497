//! Mobile nucleus agent: a sphere-union shape that drifts each tick and is
//! kept inside the reference shapes published by shape hinters.

use nucleosim_geom::{LabelVolume, SphereSet, Vec3};
use tracing::debug;

use crate::agent::{Agent, AgentKey, Geometry, NeighborView};
use crate::display::{self, DisplayUnit};
use crate::raster::{self, SweepStats};
use crate::SimError;

const DEBUG_ID_BIT: u32 = 1 << 16;
const BOX_STYLE: u8 = 2;

/// Dynamic cell-nucleus agent.
///
/// Follows the double-buffer pattern: phases 1-4 only touch the private
/// `future` staging set; phase 5 copy-commits it into the published geometry.
#[derive(Debug)]
pub struct Nucleus {
    id: u16,
    kind: String,
    geometry: Geometry,
    future: SphereSet,
    drift: Vec3,
    staged_delta: Vec3,
    blocked: bool,
    curr_time: f32,
    incr_time: f32,
    detailed_drawing: bool,
    officer: Option<AgentKey>,
}

impl Nucleus {
    /// Create a nucleus from its initial sphere set and a drift velocity
    /// (world units per unit time).
    pub fn new(
        id: u16,
        kind: impl Into<String>,
        spheres: SphereSet,
        drift: Vec3,
        curr_time: f32,
        incr_time: f32,
    ) -> Result<Self, SimError> {
        if id == 0 {
            return Err(SimError::InvalidConfig("agent id 0 is the background label"));
        }
        if !(incr_time > 0.0) {
            return Err(SimError::InvalidConfig("incr_time must be positive"));
        }
        debug!(id, spheres = spheres.len(), "nucleus created");
        Ok(Self {
            id,
            kind: kind.into(),
            future: spheres.clone(),
            geometry: Geometry::Spheres(spheres),
            drift,
            staged_delta: Vec3::default(),
            blocked: false,
            curr_time,
            incr_time,
            detailed_drawing: false,
            officer: None,
        })
    }

    /// Toggle verbose wireframe output.
    #[must_use]
    pub fn with_detailed_drawing(mut self, enabled: bool) -> Self {
        self.detailed_drawing = enabled;
        self
    }

    /// Current drift velocity.
    #[must_use]
    pub const fn drift(&self) -> Vec3 {
        self.drift
    }

    /// The officer handle recorded at spawn, if any.
    #[must_use]
    pub fn officer(&self) -> Option<AgentKey> {
        self.officer
    }
}

impl Agent for Nucleus {
    fn id(&self) -> u16 {
        self.id
    }

    fn kind(&self) -> &str {
        &self.kind
    }

    fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    fn current_time(&self) -> f32 {
        self.curr_time
    }

    fn set_officer(&mut self, key: AgentKey) {
        self.officer = Some(key);
    }

    fn advance_and_build_internal_forces(&mut self, _global_dt: f32) {
        self.curr_time += self.incr_time;
        self.staged_delta = self.drift.scale(self.incr_time);
    }

    fn adjust_geometry_by_internal_forces(&mut self) {
        if let Some(current) = self.geometry.as_spheres() {
            self.future = current.clone();
        }
        self.future.translate(self.staged_delta);
    }

    fn collect_external_forces(&mut self, view: &NeighborView<'_>) {
        // Only previously-published geometry is consulted here; the barrier
        // after phase 2 guarantees it is a consistent snapshot.
        self.blocked = false;
        for neighbor in view.others() {
            if let Geometry::DistanceField(field) = &neighbor.geometry {
                let escapes = self
                    .future
                    .spheres()
                    .iter()
                    .any(|sphere| !field.contains_world(sphere.center));
                if escapes {
                    self.blocked = true;
                    debug!(agent = self.id, shell = neighbor.id, "staged move escapes shell");
                }
            }
        }
    }

    fn adjust_geometry_by_external_forces(&mut self) {
        if self.blocked {
            // Reject the staged move and turn around for the next tick.
            if let Some(current) = self.geometry.as_spheres() {
                self.future = current.clone();
            }
            self.drift = -self.drift;
        }
    }

    fn update_geometry(&mut self) -> bool {
        match self.geometry.as_spheres() {
            Some(current) if *current == self.future => false,
            _ => {
                self.geometry = Geometry::Spheres(self.future.clone());
                true
            }
        }
    }

    fn draw_debug(&self, display: &mut dyn DisplayUnit) {
        if !self.detailed_drawing {
            return;
        }
        if let Some(set) = self.geometry.as_spheres() {
            let aabb = set.aabb();
            if aabb.is_empty() {
                return;
            }
            let mut debug_id = (u32::from(self.id) << 17) | DEBUG_ID_BIT;
            debug_id += display::draw_box(
                display,
                debug_id,
                BOX_STYLE,
                aabb.min_corner(),
                aabb.max_corner(),
            );
            let _ = debug_id;
        }
    }

    fn draw_mask(&self, volume: &mut LabelVolume) -> SweepStats {
        raster::stamp_geometry(&self.geometry, self.id, volume)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentMap, PublishedGeometry};
    use nucleosim_geom::{DistanceField, DistanceModel, Sphere};
    use slotmap::SlotMap;

    fn single_sphere(center: Vec3) -> SphereSet {
        SphereSet::new(vec![Sphere::new(center, 1.0)]).expect("set")
    }

    fn shell_field() -> DistanceField {
        let mut mask =
            LabelVolume::new([12, 12, 12], Vec3::default(), Vec3::splat(1.0), 0).expect("mask");
        for z in 1..11 {
            for y in 1..11 {
                for x in 1..11 {
                    *mask.get_mut([x, y, z]).expect("voxel") = 1;
                }
            }
        }
        DistanceField::from_mask(&mask, DistanceModel::ZeroInGradOut).expect("field")
    }

    fn run_tick(nucleus: &mut Nucleus, published: &AgentMap<PublishedGeometry>, own: AgentKey) {
        nucleus.advance_and_build_internal_forces(0.1);
        nucleus.adjust_geometry_by_internal_forces();
        let view = NeighborView::new(own, published);
        nucleus.collect_external_forces(&view);
        nucleus.adjust_geometry_by_external_forces();
        nucleus.update_geometry();
    }

    #[test]
    fn drift_is_staged_then_committed() {
        let mut nucleus = Nucleus::new(
            2,
            "nucleus",
            single_sphere(Vec3::splat(5.0)),
            Vec3::new(10.0, 0.0, 0.0),
            0.0,
            0.1,
        )
        .expect("nucleus");

        nucleus.advance_and_build_internal_forces(0.1);
        nucleus.adjust_geometry_by_internal_forces();
        // Published geometry untouched until commit.
        let published_center = nucleus.geometry().as_spheres().expect("spheres").spheres()[0].center;
        assert_eq!(published_center, Vec3::splat(5.0));

        assert!(nucleus.update_geometry());
        let committed = nucleus.geometry().as_spheres().expect("spheres").spheres()[0].center;
        assert_eq!(committed, Vec3::new(6.0, 5.0, 5.0));
        assert_eq!(nucleus.current_time(), 0.1);

        // Committing again without new forces changes nothing.
        assert!(!nucleus.update_geometry());
    }

    #[test]
    fn shell_containment_blocks_and_reverses_drift() {
        let mut registry: SlotMap<AgentKey, ()> = SlotMap::with_key();
        let shell_key = registry.insert(());
        let nucleus_key = registry.insert(());

        let mut published: AgentMap<PublishedGeometry> = AgentMap::new();
        published.insert(
            shell_key,
            PublishedGeometry {
                id: 1,
                kind: "shell".into(),
                geometry: Geometry::DistanceField(shell_field()),
            },
        );

        // Starts near the +x wall of the [1, 11) shell, drifting outward.
        let mut nucleus = Nucleus::new(
            2,
            "nucleus",
            single_sphere(Vec3::new(10.0, 6.0, 6.0)),
            Vec3::new(20.0, 0.0, 0.0),
            0.0,
            0.1,
        )
        .expect("nucleus");
        published.insert(
            nucleus_key,
            PublishedGeometry {
                id: 2,
                kind: "nucleus".into(),
                geometry: nucleus.geometry().clone(),
            },
        );

        run_tick(&mut nucleus, &published, nucleus_key);
        // Staged move to x = 12 escapes the shell: rejected, drift reversed.
        let center = nucleus.geometry().as_spheres().expect("spheres").spheres()[0].center;
        assert_eq!(center, Vec3::new(10.0, 6.0, 6.0));
        assert_eq!(nucleus.drift(), Vec3::new(-20.0, 0.0, 0.0));

        run_tick(&mut nucleus, &published, nucleus_key);
        // Reversed drift moves back inside.
        let center = nucleus.geometry().as_spheres().expect("spheres").spheres()[0].center;
        assert_eq!(center, Vec3::new(8.0, 6.0, 6.0));
    }

    #[test]
    fn debug_draw_respects_the_detail_flag() {
        let nucleus = Nucleus::new(
            2,
            "nucleus",
            single_sphere(Vec3::splat(3.0)),
            Vec3::default(),
            0.0,
            0.1,
        )
        .expect("nucleus");
        let mut display = crate::display::VectorDisplay::new();
        nucleus.draw_debug(&mut display);
        assert!(display.lines.is_empty());

        let nucleus = nucleus.with_detailed_drawing(true);
        nucleus.draw_debug(&mut display);
        assert_eq!(display.lines.len(), 12);
    }
}
