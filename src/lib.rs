//! Ring Portal - scripted map events for a hosted multiplayer game
//!
//! Core modules:
//! - `sim`: Deterministic event logic (delivery sequencer, settlement, heat, spawners)
//! - `audio`: Movement sound sub-sequence for the portal ring
//! - `settings`: Data-driven tuning and spawn toggles

pub mod audio;
pub mod settings;
pub mod sim;

pub use settings::{Settings, SettingsError};

/// Event configuration constants
pub mod consts {
    /// Default host frame step (60 Hz)
    pub const SIM_DT: f32 = 1.0 / 60.0;

    /// Offset added to the map seed for every event RNG
    pub const EVENT_SEED_OFFSET: u64 = 42;

    /// PCG stream for the portal audio picks (kept apart from tilt/shuffle draws)
    pub const AUDIO_RNG_STREAM: u64 = 7;

    /// Extra wait after the movement sound fade before spin-up
    pub const FADE_SETTLE_GAP: f32 = 0.5;

    /// Spin-down lasts this fraction of the spin-up ramp
    pub const SPIN_DOWN_FACTOR: f32 = 0.2;

    /// Upper clamp for the time-of-day animator parameter
    pub const TIME_ANIM_MAX: f32 = 0.99;

    /// Clamp range for drunkenness inertia inside fumes
    pub const DRUNK_INERTIA_MIN: f32 = 0.1;
    pub const DRUNK_INERTIA_MAX: f32 = 10.0;
}

/// Linear interpolation, `t` is not clamped
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Ease-in-out curve with flat tangents at both ends, `t` clamped to [0, 1]
#[inline]
pub fn ease_in_out(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Seed used by every event RNG derived from a map seed
#[inline]
pub fn event_seed(map_seed: u64) -> u64 {
    map_seed.wrapping_add(consts::EVENT_SEED_OFFSET)
}
