//! Settlement detection for dropped shipment parts
//!
//! A detector watches one physics object. After the first qualifying
//! contact it waits `initial_delay`, then samples the object's speed every
//! `check_interval` until it drops to `threshold` or `max_time` elapses.
//! The `max_time` bound guarantees that every contacted object eventually
//! reports, even if the physics never comes to rest.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::state::ObjectId;
use crate::settings::SettleTuning;

/// Surface tag of whatever the object touched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurfaceTag {
    Grass,
    Aluminum,
    Player,
    Other,
}

impl SurfaceTag {
    /// Only ground surfaces start settlement
    pub fn starts_settlement(&self) -> bool {
        matches!(self, SurfaceTag::Grass | SurfaceTag::Aluminum)
    }
}

/// Detector lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettleState {
    /// Falling, no ground contact yet
    Idle,
    /// Touched ground, waiting out the initial delay
    Contacted,
    /// Sampling velocity
    Polling,
    /// Done; detector is inert
    Settled,
}

/// Physics/navigation flags the host mirrors onto the object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyConfig {
    pub use_gravity: bool,
    pub kinematic: bool,
    /// Convex collider while falling, precise mesh once settled
    pub convex_collider: bool,
    /// Nav-mesh obstacle carving
    pub nav_carving: bool,
    /// Crushing players on impact
    pub crush_enabled: bool,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            use_gravity: true,
            kinematic: false,
            convex_collider: true,
            nav_carving: false,
            crush_enabled: true,
        }
    }
}

/// One-shot notification emitted when an object settles
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Settled {
    pub object: ObjectId,
    /// Seconds since first contact
    pub elapsed: f32,
    /// True when the max-time bound forced settlement
    pub forced: bool,
}

/// Watches a single object until it comes to rest
#[derive(Debug, Clone)]
pub struct SettlementDetector {
    object: ObjectId,
    tuning: SettleTuning,
    state: SettleState,
    /// Seconds since first contact
    elapsed: f32,
    /// Seconds until the next velocity sample
    until_check: f32,
    body: BodyConfig,
}

impl SettlementDetector {
    pub fn new(object: ObjectId, tuning: SettleTuning) -> Self {
        Self {
            object,
            tuning,
            state: SettleState::Idle,
            elapsed: 0.0,
            until_check: 0.0,
            body: BodyConfig::default(),
        }
    }

    pub fn object(&self) -> ObjectId {
        self.object
    }

    pub fn state(&self) -> SettleState {
        self.state
    }

    pub fn body(&self) -> BodyConfig {
        self.body
    }

    pub fn is_settled(&self) -> bool {
        self.state == SettleState::Settled
    }

    /// Contact callback. Returns true exactly once, on the contact that
    /// starts settlement (host plays impact sound and smoke).
    pub fn on_contact(&mut self, surface: SurfaceTag) -> bool {
        if self.state != SettleState::Idle || !surface.starts_settlement() {
            return false;
        }
        self.state = SettleState::Contacted;
        self.elapsed = 0.0;
        self.until_check = self.tuning.initial_delay.max(0.0);
        log::debug!("Object {:?} touched {:?}, watching for settlement", self.object, surface);
        true
    }

    /// Advance by `dt` with the object's current velocity
    pub fn tick(&mut self, dt: f32, velocity: Vec3) -> Option<Settled> {
        if !matches!(self.state, SettleState::Contacted | SettleState::Polling) {
            return None;
        }

        self.elapsed += dt;
        self.until_check -= dt;

        let max_time = self.tuning.max_time.max(0.0);
        if self.elapsed >= max_time {
            return Some(self.settle(true));
        }

        if self.until_check > 0.0 {
            return None;
        }

        self.state = SettleState::Polling;
        self.until_check += self.tuning.check_interval.max(0.0);
        if self.until_check < 0.0 {
            // Frame longer than the interval: sample again next tick
            self.until_check = 0.0;
        }

        if velocity.length() <= self.tuning.threshold {
            return Some(self.settle(false));
        }
        None
    }

    fn settle(&mut self, forced: bool) -> Settled {
        self.state = SettleState::Settled;
        self.body = BodyConfig {
            use_gravity: false,
            kinematic: true,
            convex_collider: false,
            nav_carving: true,
            crush_enabled: false,
        };
        if forced {
            log::warn!(
                "Object {:?} still moving after {:.1}s, forcing settlement",
                self.object,
                self.elapsed
            );
        } else {
            log::debug!("Object {:?} settled after {:.2}s", self.object, self.elapsed);
        }
        Settled {
            object: self.object,
            elapsed: self.elapsed,
            forced,
        }
    }
}
