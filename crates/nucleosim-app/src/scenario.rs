//! Scene setup: builds the initial agent population and the target volume.

use anyhow::{Context, Result};
use nucleosim_core::{Nucleus, Officer, ShapeHinter, SimConfig};
use nucleosim_geom::{
    DistanceField, DistanceModel, LabelVolume, Sphere, SphereSet, Vec3,
};
use rand::Rng;
use tracing::info;

/// Parameters for the default "a few agents in a shell" scenario.
#[derive(Debug, Clone)]
pub struct ScenarioParams {
    /// Target volume extent per axis, in voxels.
    pub volume_dim: usize,
    /// Voxels per unit length, identical on every axis.
    pub resolution: f32,
    /// Number of mobile nuclei spawned inside the shell.
    pub nuclei: usize,
    /// Distance model for the embryo shell.
    pub model: DistanceModel,
    /// Enable verbose wireframe output on all agents.
    pub detailed_drawing: bool,
}

impl Default for ScenarioParams {
    fn default() -> Self {
        Self {
            volume_dim: 64,
            resolution: 1.0,
            nuclei: 6,
            model: DistanceModel::ZeroInGradOut,
            detailed_drawing: false,
        }
    }
}

/// Label id reserved for the embryo shell hinter; nuclei count up from it.
const SHELL_ID: u16 = 1;

/// Build an officer populated with one embryo-shell hinter and a ring of
/// drifting nuclei inside it.
pub fn build_population(config: &SimConfig, params: &ScenarioParams) -> Result<Officer> {
    let mut officer = Officer::new(config.clone()).context("driver setup")?;
    let mut rng = config.seeded_rng();

    let shell = build_shell_field(params).context("embryo shell construction")?;
    let hinter = ShapeHinter::new(SHELL_ID, "embryo shell", shell, 0.0, config.time_increment)
        .context("shape hinter construction")?
        .with_detailed_drawing(params.detailed_drawing);
    officer.spawn(Box::new(hinter)).context("spawn hinter")?;

    let extent = params.volume_dim as f32 / params.resolution;
    let centre = Vec3::splat(extent * 0.5);
    let ring_radius = extent * 0.2;
    let nucleus_radius = (extent * 0.04).max(1.0);
    for index in 0..params.nuclei {
        let angle = index as f32 / params.nuclei.max(1) as f32 * std::f32::consts::TAU;
        let position = centre
            + Vec3::new(
                ring_radius * angle.cos(),
                ring_radius * angle.sin(),
                rng.random_range(-1.0..1.0),
            );
        let spheres = SphereSet::new(vec![Sphere::new(position, nucleus_radius)])
            .context("nucleus shape")?;
        let speed = extent * 0.05;
        let drift = Vec3::new(
            speed * angle.cos(),
            speed * angle.sin(),
            0.0,
        );
        let nucleus = Nucleus::new(
            SHELL_ID + 1 + index as u16,
            "nucleus",
            spheres,
            drift,
            0.0,
            config.time_increment,
        )
        .context("nucleus construction")?
        .with_detailed_drawing(params.detailed_drawing);
        officer.spawn(Box::new(nucleus)).context("spawn nucleus")?;
    }

    info!(
        agents = officer.agent_count(),
        nuclei = params.nuclei,
        "population seeded"
    );
    Ok(officer)
}

/// Empty label volume matching the scenario's grid.
pub fn build_target_volume(params: &ScenarioParams) -> Result<LabelVolume> {
    let dims = [params.volume_dim; 3];
    LabelVolume::new(dims, Vec3::default(), Vec3::splat(params.resolution), 0)
        .context("target volume")
}

/// Ellipsoidal embryo-shell mask converted to a distance field.
fn build_shell_field(params: &ScenarioParams) -> Result<DistanceField> {
    let dims = [params.volume_dim; 3];
    let mut mask = LabelVolume::new(dims, Vec3::default(), Vec3::splat(params.resolution), 0)
        .context("shell mask")?;

    let half = params.volume_dim as f32 * 0.5;
    let radii = Vec3::new(half * 0.85, half * 0.7, half * 0.6);
    for z in 0..dims[2] {
        for y in 0..dims[1] {
            for x in 0..dims[0] {
                let p = Vec3::new(
                    x as f32 + 0.5 - half,
                    y as f32 + 0.5 - half,
                    z as f32 + 0.5 - half,
                );
                let q = p.elem_div(radii);
                if q.len_sq() <= 1.0 {
                    if let Some(voxel) = mask.get_mut([x, y, z]) {
                        *voxel = 1;
                    }
                }
            }
        }
    }

    DistanceField::from_mask(&mask, params.model).context("distance transform")
}
