//! Shared simulation types
//!
//! Identifiers, transforms and the seeded RNG wrapper used by every event.

use glam::Vec3;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

/// Host-assigned identifier of a physics object (a shipment part)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u32);

/// Which side of the session this instance runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// Advances shared state and triggers state-affecting phases
    Coordinator,
    /// Replays visual/audio signals only
    Observer,
}

impl Role {
    pub fn is_coordinator(&self) -> bool {
        matches!(self, Role::Coordinator)
    }
}

/// Position plus Euler rotation in degrees (x = pitch, y = yaw, z = roll)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub euler: Vec3,
}

impl Transform {
    pub fn new(position: Vec3, euler: Vec3) -> Self {
        Self { position, euler }
    }

    /// Same transform with pitch and roll zeroed, yaw kept
    pub fn leveled(&self) -> Self {
        Self {
            position: self.position,
            euler: Vec3::new(0.0, self.euler.y, 0.0),
        }
    }
}

/// A supply shipment: a parent object whose children fall and settle individually
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: u32,
    /// Child objects that must each report settlement
    pub parts: Vec<ObjectId>,
}

impl Shipment {
    pub fn new(id: u32, parts: Vec<ObjectId>) -> Self {
        Self { id, parts }
    }
}

/// RNG state wrapper for serialization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RngState {
    pub seed: u64,
    pub stream: u64,
}

impl RngState {
    pub fn new(seed: u64) -> Self {
        Self { seed, stream: 0 }
    }

    pub fn with_stream(seed: u64, stream: u64) -> Self {
        Self { seed, stream }
    }

    pub fn to_rng(&self) -> Pcg32 {
        if self.stream == 0 {
            Pcg32::seed_from_u64(self.seed)
        } else {
            Pcg32::new(self.seed, self.stream)
        }
    }
}
