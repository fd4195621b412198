//! Deterministic forced enemy spawner
//!
//! The host places one nest per anchor when the round starts. Once the
//! normalized time of day passes the trigger, every nest hatches into an
//! enemy at the nest's position and heading. Only the host runs this.

use glam::Vec3;
use rand::Rng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::state::RngState;
use crate::consts::TIME_ANIM_MAX;
use crate::event_seed;
use crate::settings::{CreatureKind, SpawnToggles, SpawnerTuning};

/// Instructions for the host's spawning systems
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SpawnCommand {
    PlaceNest { nest: usize, position: Vec3, yaw: f32 },
    RemoveNest { nest: usize },
    SpawnEnemy { kind: CreatureKind, position: Vec3, yaw: f32 },
}

/// Host clock as seen by the spawner
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TimeOfDay {
    /// 0 at dawn, 1 at the end of the day
    pub normalized: f32,
    pub started: bool,
}

impl TimeOfDay {
    /// Value for time-synced animators, only once the clock runs
    pub fn animator_value(&self) -> Option<f32> {
        self.started.then(|| self.normalized.clamp(0.0, TIME_ANIM_MAX))
    }
}

#[derive(Debug, Clone)]
struct Nest {
    position: Vec3,
    yaw: f32,
}

#[derive(Debug, Clone)]
pub struct ForcedSpawner {
    kind: CreatureKind,
    anchors: Vec<Vec3>,
    /// Creature has a nest prefab to place before hatching
    has_nest_prefab: bool,
    tuning: SpawnerTuning,
    nests: Vec<Nest>,
    enabled: bool,
    rng: Pcg32,
}

impl ForcedSpawner {
    pub fn new(
        kind: CreatureKind,
        anchors: Vec<Vec3>,
        has_nest_prefab: bool,
        tuning: SpawnerTuning,
        map_seed: u64,
    ) -> Self {
        Self {
            kind,
            anchors,
            has_nest_prefab,
            tuning,
            nests: Vec::new(),
            enabled: true,
            rng: RngState::new(event_seed(map_seed)).to_rng(),
        }
    }

    pub fn kind(&self) -> &CreatureKind {
        &self.kind
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Round start: place nests, or disable when not host / toggled off
    pub fn start(&mut self, is_host: bool, toggles: &SpawnToggles) -> Vec<SpawnCommand> {
        if !is_host {
            self.enabled = false;
            return Vec::new();
        }
        if !toggles.is_enabled(&self.kind) {
            log::info!("Forced spawning for {} is disabled in the config", self.kind.as_str());
            self.enabled = false;
            return Vec::new();
        }
        if !self.has_nest_prefab {
            return Vec::new();
        }

        let mut commands = Vec::with_capacity(self.anchors.len());
        for &position in &self.anchors {
            let yaw = self.rng.random_range(-180..180) as f32;
            commands.push(SpawnCommand::PlaceNest {
                nest: self.nests.len(),
                position,
                yaw,
            });
            self.nests.push(Nest { position, yaw });
        }
        log::info!("Placed {} {} nests", self.nests.len(), self.kind.as_str());
        commands
    }

    /// Per-frame check; hatches everything once, then disables itself
    pub fn tick(&mut self, time: TimeOfDay, is_host: bool) -> Vec<SpawnCommand> {
        if !self.enabled
            || !is_host
            || !time.started
            || time.normalized <= self.tuning.trigger_time
        {
            return Vec::new();
        }

        let mut commands = Vec::new();
        if self.has_nest_prefab {
            for (i, nest) in self.nests.drain(..).enumerate() {
                commands.push(SpawnCommand::RemoveNest { nest: i });
                commands.push(SpawnCommand::SpawnEnemy {
                    kind: self.kind.clone(),
                    position: nest.position,
                    yaw: nest.yaw,
                });
            }
        } else {
            for &position in &self.anchors {
                commands.push(SpawnCommand::SpawnEnemy {
                    kind: self.kind.clone(),
                    position,
                    yaw: 0.0,
                });
            }
        }
        let spawned = commands
            .iter()
            .filter(|c| matches!(c, SpawnCommand::SpawnEnemy { .. }))
            .count();
        log::info!("Force spawned {} x{}", self.kind.as_str(), spawned);
        self.enabled = false;
        commands
    }
}
