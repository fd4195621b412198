//! Deterministic map event logic
//!
//! Everything here is driven by the host:
//! - Time only advances through `tick(dt)` calls
//! - Seeded RNG only (map seed + offset)
//! - Callbacks in, drained commands and signals out
//! - No engine, network or audio playback dependencies

pub mod crush;
pub mod delivery;
pub mod fumes;
pub mod heat;
pub mod settle;
pub mod shuffle;
pub mod spawner;
pub mod state;
pub mod tick;

pub use crush::{CauseOfDeath, CrushHazard, Kill};
pub use delivery::{
    DeliveryError, DeliveryEvent, DeliveryPhase, DeliveryPlan, DeliverySignal, RingState,
};
pub use fumes::{FumesEffect, FumesZone};
pub use heat::{HeatPhase, HeatState, HeatZone, stamina_with_heat};
pub use settle::{BodyConfig, SettleState, Settled, SettlementDetector, SurfaceTag};
pub use shuffle::{ShuffleError, shuffle_in_sync};
pub use spawner::{ForcedSpawner, SpawnCommand, TimeOfDay};
pub use state::{ObjectId, RngState, Role, Shipment, Transform};
pub use tick::{MapState, PlayerInput, TickInput, TickOutput, ZoneContact, ZoneEvent, tick};
