use anyhow::Result;
use clap::{Parser, ValueEnum};
use nucleosim_core::{RasterPolicy, SimConfig};
use nucleosim_geom::DistanceModel;
use tracing::info;

mod scenario;

use scenario::ScenarioParams;

/// Run the nucleosim demo scenario and capture a ground-truth label volume.
#[derive(Debug, Parser)]
#[command(name = "nucleosim", version, about)]
struct Args {
    /// Number of simulation ticks to run.
    #[arg(long, default_value_t = 100)]
    ticks: u64,

    /// RNG seed for reproducible scenarios.
    #[arg(long)]
    seed: Option<u64>,

    /// Number of mobile nuclei inside the embryo shell.
    #[arg(long, default_value_t = 6)]
    nuclei: usize,

    /// Target volume extent per axis, in voxels.
    #[arg(long, default_value_t = 64)]
    volume_dim: usize,

    /// Distance model used for the embryo shell.
    #[arg(long, value_enum, default_value = "zero-in")]
    model: ModelArg,

    /// Rasterization concurrency policy.
    #[arg(long, value_enum, default_value = "single-writer")]
    policy: PolicyArg,

    /// Enable verbose wireframe output on all agents.
    #[arg(long)]
    detailed: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModelArg {
    /// Inside <= 0, boundary exactly 0, outside positive.
    ZeroIn,
    /// Strictly inside negative, boundary and outside exactly 0.
    GradIn,
}

impl From<ModelArg> for DistanceModel {
    fn from(arg: ModelArg) -> Self {
        match arg {
            ModelArg::ZeroIn => Self::ZeroInGradOut,
            ModelArg::GradIn => Self::GradInZeroOut,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyArg {
    /// Sequential last-write-wins pass in spawn order.
    SingleWriter,
    /// Parallel first-claim-wins pass with atomic voxel claims.
    AtomicClaim,
}

impl From<PolicyArg> for RasterPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::SingleWriter => Self::SingleWriter,
            PolicyArg::AtomicClaim => Self::AtomicClaim,
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = SimConfig {
        rng_seed: args.seed,
        detailed_drawing: args.detailed,
        ..SimConfig::default()
    };
    let params = ScenarioParams {
        volume_dim: args.volume_dim,
        nuclei: args.nuclei,
        model: args.model.into(),
        detailed_drawing: args.detailed,
        ..ScenarioParams::default()
    };

    let mut officer = scenario::build_population(&config, &params)?;
    info!(ticks = args.ticks, "starting simulation");
    for _ in 0..args.ticks {
        officer.step();
    }
    if let Some(summary) = officer.history().last() {
        info!(
            tick = summary.tick.0,
            agents = summary.agent_count,
            commits = summary.geometry_commits,
            "simulation finished"
        );
    }

    let mut volume = scenario::build_target_volume(&params)?;
    let stats = officer.render_to_labels(&mut volume, args.policy.into());
    let labelled = volume.voxels().iter().filter(|&&v| v != 0).count();
    info!(
        written = stats.written,
        conflicts = stats.conflicts,
        labelled,
        total = volume.voxels().len(),
        "ground truth captured"
    );

    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
