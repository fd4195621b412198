//! Falling shipment parts crushing the local player
//!
//! A part that hits the local player while faster than the kill threshold
//! kills them. Settlement switches the hazard off through
//! [`BodyConfig::crush_enabled`](super::settle::BodyConfig).

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::state::ObjectId;
use crate::settings::CrushTuning;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CauseOfDeath {
    Crushing,
}

/// Kill request for the host's player controller
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Kill {
    pub object: ObjectId,
    /// Velocity handed to the ragdoll
    pub body_velocity: Vec3,
    pub cause: CauseOfDeath,
    pub death_animation: u32,
    pub spawn_body: bool,
}

#[derive(Debug, Clone)]
pub struct CrushHazard {
    tuning: CrushTuning,
}

impl CrushHazard {
    pub fn new(tuning: CrushTuning) -> Self {
        Self { tuning }
    }

    /// Part `object` collided with the local player while moving at `velocity`
    pub fn on_player_contact(&self, object: ObjectId, velocity: Vec3, crush_enabled: bool) -> Option<Kill> {
        if !crush_enabled || velocity.length() <= self.tuning.kill_velocity_threshold {
            return None;
        }
        log::info!("Player crushed by {:?} at {:.2} m/s", object, velocity.length());
        Some(Kill {
            object,
            body_velocity: velocity,
            cause: CauseOfDeath::Crushing,
            death_animation: 0,
            spawn_body: true,
        })
    }
}
