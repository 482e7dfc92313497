//! Simulation core for nucleosim: the per-tick agent phase contract, the
//! officer driving it, and rasterization of agent geometry into a shared
//! label volume for synthetic ground-truth capture.

use rand::{SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod agent;
pub mod display;
pub mod hinter;
pub mod nucleus;
pub mod officer;
pub mod raster;

pub use agent::{Agent, AgentKey, Geometry, NeighborView, PublishedGeometry};
pub use display::{DisplayUnit, LineSegment, NullDisplay, VectorDisplay, draw_box};
pub use hinter::ShapeHinter;
pub use nucleus::Nucleus;
pub use officer::{Officer, TickEvents, TickSummary};
pub use raster::{RasterPolicy, SweepStats};

/// Errors raised when constructing simulation state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SimError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// Indicates two agents competing for the same label id.
    #[error("duplicate agent id {0}")]
    DuplicateAgentId(u16),
}

/// High level simulation clock (ticks processed since boot).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tick(pub u64);

impl Tick {
    /// Returns the next sequential tick.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Resets the tick counter back to zero.
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }
}

/// Static configuration for a nucleosim run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimConfig {
    /// Global time increment handed to phase 1 each tick. Agents keep their
    /// own clocks and increments; this value is advisory.
    pub time_increment: f32,
    /// Enables verbose wireframe output on agents that honor it.
    pub detailed_drawing: bool,
    /// Optional RNG seed for reproducible scenarios.
    pub rng_seed: Option<u64>,
    /// Maximum number of recent tick summaries retained in memory.
    pub history_capacity: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            time_increment: 0.1,
            detailed_drawing: false,
            rng_seed: None,
            history_capacity: 256,
        }
    }
}

impl SimConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), SimError> {
        if !(self.time_increment > 0.0) {
            return Err(SimError::InvalidConfig("time_increment must be positive"));
        }
        if self.history_capacity == 0 {
            return Err(SimError::InvalidConfig(
                "history_capacity must be non-zero",
            ));
        }
        Ok(())
    }

    /// Deterministic RNG derived from the configured seed.
    #[must_use]
    pub fn seeded_rng(&self) -> SmallRng {
        SmallRng::seed_from_u64(self.rng_seed.unwrap_or(0x5EED_CE11_0000_0001))
    }
}
