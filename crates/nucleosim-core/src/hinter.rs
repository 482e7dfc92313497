//! Static shape-hint agent: keeps the same distance-field shape for the
//! whole simulation and exists to be seen (and rasterized) by others.

use nucleosim_geom::{DistanceField, LabelVolume};
use tracing::{debug, warn};

use crate::agent::{Agent, AgentKey, Geometry, NeighborView};
use crate::display::{self, DisplayUnit};
use crate::raster::{self, SweepStats};
use crate::SimError;

/// Debug-id bit marking wireframe primitives as debug output.
const DEBUG_ID_BIT: u32 = 1 << 16;
/// Line style used for the grid bounding box.
const BOX_STYLE: u8 = 4;

/// Agent carrying an immutable reference shape (e.g., an embryo shell).
#[derive(Debug)]
pub struct ShapeHinter {
    id: u16,
    kind: String,
    geometry: Geometry,
    curr_time: f32,
    incr_time: f32,
    detailed_drawing: bool,
    officer: Option<AgentKey>,
}

impl ShapeHinter {
    /// The same (given) shape is kept during the whole simulation.
    pub fn new(
        id: u16,
        kind: impl Into<String>,
        shape: DistanceField,
        curr_time: f32,
        incr_time: f32,
    ) -> Result<Self, SimError> {
        if id == 0 {
            return Err(SimError::InvalidConfig("agent id 0 is the background label"));
        }
        if !(incr_time > 0.0) {
            return Err(SimError::InvalidConfig("incr_time must be positive"));
        }
        debug!(id, "shape hinter created");
        Ok(Self {
            id,
            kind: kind.into(),
            geometry: Geometry::DistanceField(shape),
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

    /// The officer handle recorded at spawn, if any.
    #[must_use]
    pub fn officer(&self) -> Option<AgentKey> {
        self.officer
    }
}

impl Agent for ShapeHinter {
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
    }

    fn adjust_geometry_by_internal_forces(&mut self) {
        // Nothing staged; the shape never moves.
    }

    fn collect_external_forces(&mut self, _view: &NeighborView<'_>) {
        // A hinter does not respond to its surroundings.
    }

    fn adjust_geometry_by_external_forces(&mut self) {}

    fn update_geometry(&mut self) -> bool {
        // The published geometry never changed, so the commit is a no-op and
        // geometry identity is preserved across ticks.
        false
    }

    fn draw_debug(&self, display: &mut dyn DisplayUnit) {
        if !self.detailed_drawing {
            return;
        }
        if let Some(field) = self.geometry.as_distance_field() {
            let mut debug_id = (u32::from(self.id) << 17) | DEBUG_ID_BIT;
            // Bounding box of the complete native distance grid.
            let frame = field.grid().frame();
            debug_id += display::draw_box(
                display,
                debug_id,
                BOX_STYLE,
                frame.offset,
                frame.far_corner(),
            );
            let _ = debug_id;
            // TODO: render spheres along a chosen isoline with caller-given
            // sparsity; until then this is reported, never silently skipped.
            warn!(agent = self.id, "isoline rendering not implemented");
        }
    }

    fn draw_mask(&self, volume: &mut LabelVolume) -> SweepStats {
        raster::stamp_geometry(&self.geometry, self.id, volume)
    }
}
