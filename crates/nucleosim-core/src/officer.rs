//! The simulation driver ("officer"): owns the agent population, advances
//! global time through the five-phase contract, and captures ground truth.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU16, Ordering};

use nucleosim_geom::LabelVolume;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use crate::agent::{Agent, AgentKey, AgentMap, NeighborView, PublishedGeometry};
use crate::display::DisplayUnit;
use crate::raster::{self, RasterPolicy, SweepStats};
use crate::{SimConfig, SimError, Tick};

/// Events emitted after processing a simulation tick.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TickEvents {
    pub tick: Tick,
    /// Agents whose phase-5 commit actually changed their published geometry.
    pub geometry_commits: usize,
}

/// Per-tick summary retained in the history ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickSummary {
    pub tick: Tick,
    pub agent_count: usize,
    pub geometry_commits: usize,
}

/// Owns the agents and drives the phase contract.
pub struct Officer {
    config: SimConfig,
    tick: Tick,
    agents: SlotMap<AgentKey, Box<dyn Agent>>,
    published: AgentMap<PublishedGeometry>,
    /// Spawn order; fixes the sweep order for commits and rasterization.
    order: Vec<AgentKey>,
    history: VecDeque<TickSummary>,
}

impl std::fmt::Debug for Officer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Officer")
            .field("tick", &self.tick)
            .field("agent_count", &self.agents.len())
            .finish()
    }
}

impl Officer {
    /// Instantiate a driver from a validated configuration.
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        config.validate()?;
        let history_capacity = config.history_capacity;
        Ok(Self {
            config,
            tick: Tick::zero(),
            agents: SlotMap::with_key(),
            published: AgentMap::new(),
            order: Vec::new(),
            history: VecDeque::with_capacity(history_capacity),
        })
    }

    /// Register an agent, hand it its back-reference, and publish its
    /// initial geometry. Label ids must be process-unique.
    pub fn spawn(&mut self, agent: Box<dyn Agent>) -> Result<AgentKey, SimError> {
        let id = agent.id();
        if self.published.values().any(|entry| entry.id == id) {
            return Err(SimError::DuplicateAgentId(id));
        }
        let kind = agent.kind().to_string();
        let geometry = agent.geometry().clone();
        let key = self.agents.insert(agent);
        if let Some(agent) = self.agents.get_mut(key) {
            agent.set_officer(key);
        }
        self.published.insert(key, PublishedGeometry { id, kind, geometry });
        self.order.push(key);
        Ok(key)
    }

    /// Remove an agent from the population.
    pub fn remove(&mut self, key: AgentKey) -> bool {
        self.published.remove(key);
        self.order.retain(|&k| k != key);
        self.agents.remove(key).is_some()
    }

    /// Number of live agents.
    #[must_use]
    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    /// Whether the key refers to a live agent.
    #[must_use]
    pub fn contains(&self, key: AgentKey) -> bool {
        self.agents.contains_key(key)
    }

    /// The last-committed geometry record for an agent.
    #[must_use]
    pub fn published(&self, key: AgentKey) -> Option<&PublishedGeometry> {
        self.published.get(key)
    }

    /// Published geometry records in spawn order.
    pub fn published_in_order(&self) -> impl Iterator<Item = &PublishedGeometry> {
        self.order.iter().filter_map(|&key| self.published.get(key))
    }

    /// Returns an immutable reference to configuration.
    #[must_use]
    pub const fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Current simulation tick.
    #[must_use]
    pub const fn tick(&self) -> Tick {
        self.tick
    }

    /// Iterate over retained tick summaries.
    pub fn history(&self) -> impl Iterator<Item = &TickSummary> {
        self.history.iter()
    }

    /// Execute one tick: the five phases in fixed order over the whole
    /// population, with a full barrier between phases.
    ///
    /// Phases 1, 2, and 4 touch only agent-private state and fan out over
    /// rayon; phase 3 is a parallel read of the published table; phase 5 is
    /// the sequential commit that refreshes the published table, so nothing
    /// phase 3 reads mutates before the tick completes.
    pub fn step(&mut self) -> TickEvents {
        let dt = self.config.time_increment;

        // Phase 1: advance clocks, build internal forces.
        Self::parallel_phase(&mut self.agents, move |agent| {
            agent.advance_and_build_internal_forces(dt);
        });

        // Phase 2: internal forces into the private staging geometry.
        Self::parallel_phase(&mut self.agents, |agent| {
            agent.adjust_geometry_by_internal_forces();
        });

        // Phase 3: read the previous tick's published snapshot.
        {
            let published = &self.published;
            let mut slots: Vec<(AgentKey, &mut Box<dyn Agent>)> = self.agents.iter_mut().collect();
            slots.par_iter_mut().for_each(|(key, agent)| {
                let view = NeighborView::new(*key, published);
                agent.collect_external_forces(&view);
            });
        }

        // Phase 4: external effects into the same staging geometry.
        Self::parallel_phase(&mut self.agents, |agent| {
            agent.adjust_geometry_by_external_forces();
        });

        // Phase 5: commit, refreshing the published table in spawn order.
        let mut commits = 0usize;
        for &key in &self.order {
            if let Some(agent) = self.agents.get_mut(key) {
                if agent.update_geometry() {
                    if let Some(entry) = self.published.get_mut(key) {
                        entry.geometry = agent.geometry().clone();
                    }
                    commits += 1;
                }
            }
        }

        self.tick = self.tick.next();
        let summary = TickSummary {
            tick: self.tick,
            agent_count: self.agents.len(),
            geometry_commits: commits,
        };
        if self.history.len() >= self.config.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(summary);

        TickEvents {
            tick: self.tick,
            geometry_commits: commits,
        }
    }

    fn parallel_phase<F>(agents: &mut SlotMap<AgentKey, Box<dyn Agent>>, phase: F)
    where
        F: Fn(&mut dyn Agent) + Send + Sync,
    {
        let mut slots: Vec<&mut Box<dyn Agent>> = agents.values_mut().collect();
        slots.par_iter_mut().for_each(|agent| phase(agent.as_mut()));
    }

    /// Rasterize every agent's identity into the label volume.
    ///
    /// `SingleWriter` sweeps agents sequentially in spawn order, so overlaps
    /// resolve last-write-wins. `AtomicClaim` fans agents out over rayon and
    /// claims voxels with compare-exchange, so overlaps resolve
    /// first-claim-wins; both policies log conflicts and never abort.
    pub fn render_to_labels(&self, volume: &mut LabelVolume, policy: RasterPolicy) -> SweepStats {
        match policy {
            RasterPolicy::SingleWriter => {
                let mut stats = SweepStats::default();
                for &key in &self.order {
                    if let Some(agent) = self.agents.get(key) {
                        stats = stats.merge(agent.draw_mask(volume));
                    }
                }
                stats
            }
            RasterPolicy::AtomicClaim => {
                let frame = *volume.frame();
                let labels: Vec<AtomicU16> = volume
                    .voxels()
                    .iter()
                    .map(|&value| AtomicU16::new(value))
                    .collect();
                let entries: Vec<&PublishedGeometry> = self.published_in_order().collect();
                let stats = entries
                    .par_iter()
                    .map(|entry| {
                        raster::stamp_geometry_atomic(&entry.geometry, entry.id, &frame, &labels)
                    })
                    .reduce(SweepStats::default, SweepStats::merge);
                for (voxel, label) in volume.voxels_mut().iter_mut().zip(&labels) {
                    *voxel = label.load(Ordering::Relaxed);
                }
                stats
            }
        }
    }

    /// Forward debug drawing to every agent in spawn order.
    pub fn draw_debug(&self, display: &mut dyn DisplayUnit) {
        for &key in &self.order {
            if let Some(agent) = self.agents.get(key) {
                agent.draw_debug(display);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Geometry;
    use crate::display::DisplayUnit;
    use crate::raster::SweepStats;
    use nucleosim_geom::{Sphere, SphereSet, Vec3};
    use std::sync::{Arc, Mutex};

    /// Agent that records which phase ran when, for barrier-order checks.
    struct ProbeAgent {
        id: u16,
        geometry: Geometry,
        log: Arc<Mutex<Vec<(u8, u16)>>>,
        time: f32,
    }

    impl ProbeAgent {
        fn new(id: u16, log: Arc<Mutex<Vec<(u8, u16)>>>) -> Self {
            let set = SphereSet::new(vec![Sphere::new(Vec3::splat(id as f32), 0.5)])
                .expect("set");
            Self {
                id,
                geometry: Geometry::Spheres(set),
                log,
                time: 0.0,
            }
        }

        fn record(&self, phase: u8) {
            self.log.lock().expect("log lock").push((phase, self.id));
        }
    }

    impl Agent for ProbeAgent {
        fn id(&self) -> u16 {
            self.id
        }

        fn kind(&self) -> &str {
            "probe"
        }

        fn geometry(&self) -> &Geometry {
            &self.geometry
        }

        fn current_time(&self) -> f32 {
            self.time
        }

        fn set_officer(&mut self, _key: AgentKey) {}

        fn advance_and_build_internal_forces(&mut self, _global_dt: f32) {
            self.time += 1.0;
            self.record(1);
        }

        fn adjust_geometry_by_internal_forces(&mut self) {
            self.record(2);
        }

        fn collect_external_forces(&mut self, _view: &NeighborView<'_>) {
            self.record(3);
        }

        fn adjust_geometry_by_external_forces(&mut self) {
            self.record(4);
        }

        fn update_geometry(&mut self) -> bool {
            self.record(5);
            false
        }

        fn draw_debug(&self, _display: &mut dyn DisplayUnit) {}

        fn draw_mask(&self, _volume: &mut LabelVolume) -> SweepStats {
            SweepStats::default()
        }
    }

    #[test]
    fn spawn_rejects_duplicate_label_ids() {
        let mut officer = Officer::new(SimConfig::default()).expect("officer");
        let log = Arc::new(Mutex::new(Vec::new()));
        officer
            .spawn(Box::new(ProbeAgent::new(1, Arc::clone(&log))))
            .expect("spawn");
        let err = officer.spawn(Box::new(ProbeAgent::new(1, log)));
        assert_eq!(err.err(), Some(SimError::DuplicateAgentId(1)));
    }

    #[test]
    fn remove_forgets_the_agent() {
        let mut officer = Officer::new(SimConfig::default()).expect("officer");
        let log = Arc::new(Mutex::new(Vec::new()));
        let key = officer
            .spawn(Box::new(ProbeAgent::new(1, log)))
            .expect("spawn");
        assert!(officer.contains(key));
        assert!(officer.remove(key));
        assert!(!officer.contains(key));
        assert!(officer.published(key).is_none());
        assert_eq!(officer.agent_count(), 0);
        assert!(!officer.remove(key));
    }

    #[test]
    fn phases_are_barrier_ordered_across_the_population() {
        let mut officer = Officer::new(SimConfig::default()).expect("officer");
        let log = Arc::new(Mutex::new(Vec::new()));
        for id in 1..=8 {
            officer
                .spawn(Box::new(ProbeAgent::new(id, Arc::clone(&log))))
                .expect("spawn");
        }

        for _ in 0..3 {
            officer.step();
        }

        let entries = log.lock().expect("log lock");
        // 8 agents x 5 phases x 3 ticks.
        assert_eq!(entries.len(), 8 * 5 * 3);
        for (tick_idx, tick_entries) in entries.chunks(8 * 5).enumerate() {
            for (phase_idx, phase_entries) in tick_entries.chunks(8).enumerate() {
                let expected_phase = phase_idx as u8 + 1;
                for &(phase, agent) in phase_entries {
                    assert_eq!(
                        phase, expected_phase,
                        "agent {agent} ran phase {phase} during the phase-{expected_phase} \
                         window of tick {tick_idx}"
                    );
                }
            }
        }
    }

    #[test]
    fn step_counts_commits_and_fills_history() {
        let config = SimConfig {
            history_capacity: 2,
            ..SimConfig::default()
        };
        let mut officer = Officer::new(config).expect("officer");
        let log = Arc::new(Mutex::new(Vec::new()));
        officer
            .spawn(Box::new(ProbeAgent::new(1, log)))
            .expect("spawn");

        for _ in 0..3 {
            let events = officer.step();
            // Probe agents never commit geometry.
            assert_eq!(events.geometry_commits, 0);
        }
        assert_eq!(officer.tick(), Tick(3));
        let history: Vec<_> = officer.history().copied().collect();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].tick, Tick(2));
        assert_eq!(history[1].tick, Tick(3));
        assert_eq!(history[1].agent_count, 1);
    }
}
