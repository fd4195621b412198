//! Map event settings
//!
//! Spawn toggles plus tuning for every event, loaded from a JSON file at
//! startup. Missing fields fall back to their defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while reading or writing settings
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings json invalid: {0}")]
    Json(#[from] serde_json::Error),
}

/// Creatures with a forced-spawn toggle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreatureKind {
    Flowerman,
    BaboonHawk,
    RadMech,
    /// Any creature without a dedicated toggle
    Other(String),
}

impl CreatureKind {
    pub fn as_str(&self) -> &str {
        match self {
            CreatureKind::Flowerman => "Flowerman",
            CreatureKind::BaboonHawk => "Baboon hawk",
            CreatureKind::RadMech => "RadMech",
            CreatureKind::Other(name) => name,
        }
    }

    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "flowerman" => CreatureKind::Flowerman,
            "baboon hawk" => CreatureKind::BaboonHawk,
            "radmech" => CreatureKind::RadMech,
            _ => CreatureKind::Other(name.to_string()),
        }
    }
}

/// Per-creature forced spawning switches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnToggles {
    pub force_spawn_flowerman: bool,
    pub force_spawn_baboon: bool,
    pub force_spawn_radmech: bool,
}

impl Default for SpawnToggles {
    fn default() -> Self {
        Self {
            force_spawn_flowerman: true,
            force_spawn_baboon: true,
            force_spawn_radmech: true,
        }
    }
}

impl SpawnToggles {
    /// Whether forced spawning is enabled for `kind` (untoggled kinds are always on)
    pub fn is_enabled(&self, kind: &CreatureKind) -> bool {
        match kind {
            CreatureKind::Flowerman => self.force_spawn_flowerman,
            CreatureKind::BaboonHawk => self.force_spawn_baboon,
            CreatureKind::RadMech => self.force_spawn_radmech,
            CreatureKind::Other(_) => true,
        }
    }
}

/// Ring portal delivery timings and limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryTuning {
    /// Peak outer ring speed
    pub max_rotation_speed: f32,
    /// Outer ring speed at rest
    pub base_outer_speed: f32,
    /// Inner ring speed at rest
    pub base_inner_speed: f32,
    /// Inner ring peak as a fraction of the outer peak
    pub inner_speed_factor: f32,
    /// Spin-up ramp length (seconds)
    pub rotation_change_duration: f32,
    /// Wait before and after each drop (seconds)
    pub cooldown_duration: f32,
    /// Travel time between drop sites (seconds)
    pub movement_duration: f32,
    /// Maximum random tilt on X and Z (degrees)
    pub max_tilt_angle: f32,
    /// Re-tilt ramp length (seconds)
    pub tilt_change_duration: f32,
    /// Movement sound fade-out (seconds)
    pub fade_out_duration: f32,
    /// Reuse shipments and sites by modulo once the schedule outruns them
    pub wrap_selection: bool,
    /// Force past open/close animation waits after this many seconds
    pub animation_timeout: Option<f32>,
}

impl Default for DeliveryTuning {
    fn default() -> Self {
        Self {
            max_rotation_speed: 5.0,
            base_outer_speed: 1.0,
            base_inner_speed: 0.5,
            inner_speed_factor: 0.75,
            rotation_change_duration: 10.0,
            cooldown_duration: 5.0,
            movement_duration: 30.0,
            max_tilt_angle: 25.0,
            tilt_change_duration: 30.0,
            fade_out_duration: 1.0,
            wrap_selection: true,
            animation_timeout: None,
        }
    }
}

/// Shipment settlement polling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettleTuning {
    /// Speed at or below which an object counts as settled
    pub threshold: f32,
    pub initial_delay: f32,
    pub check_interval: f32,
    /// Fail-safe: settle regardless after this long
    pub max_time: f32,
}

impl Default for SettleTuning {
    fn default() -> Self {
        Self {
            threshold: 0.01,
            initial_delay: 0.5,
            check_interval: 0.1,
            max_time: 15.0,
        }
    }
}

/// Heatwave zone exposure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatTuning {
    /// Seconds in zone before severity reaches 1
    pub time_in_zone_max: f32,
    /// Seconds for severity 1 to decay to 0
    pub reset_duration: f32,
    /// Scales how hard severity bends stamina use/regen
    pub stamina_multiplier: f32,
}

impl Default for HeatTuning {
    fn default() -> Self {
        Self {
            time_in_zone_max: 10.0,
            reset_duration: 5.0,
            stamina_multiplier: 1.0,
        }
    }
}

/// Toxic fumes zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FumesTuning {
    /// Seconds between damage ticks
    pub damage_interval: f32,
    pub damage_amount: u32,
    /// Larger values slow the drunkenness build-up
    pub drunkenness_power: f32,
}

impl Default for FumesTuning {
    fn default() -> Self {
        Self {
            damage_interval: 5.0,
            damage_amount: 3,
            drunkenness_power: 1.5,
        }
    }
}

/// Forced spawner timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnerTuning {
    /// Normalized time of day after which nests hatch
    pub trigger_time: f32,
}

impl Default for SpawnerTuning {
    fn default() -> Self {
        Self { trigger_time: 0.5 }
    }
}

/// Falling shipment parts crushing the local player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrushTuning {
    /// Part speed that has to be exceeded for a hit to kill
    pub kill_velocity_threshold: f32,
}

impl Default for CrushTuning {
    fn default() -> Self {
        Self {
            kill_velocity_threshold: 0.0,
        }
    }
}

/// All map event settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub spawning: SpawnToggles,
    pub delivery: DeliveryTuning,
    pub settle: SettleTuning,
    pub crush: CrushTuning,
    pub heat: HeatTuning,
    pub fumes: FumesTuning,
    pub spawner: SpawnerTuning,
}

impl Settings {
    /// Parse settings from JSON
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load settings from a file, falling back to defaults on any failure
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(json) => match Self::from_json(&json) {
                Ok(settings) => {
                    log::info!("Loaded settings from {}", path.display());
                    return settings;
                }
                Err(e) => log::warn!("Ignoring {}: {}", path.display(), e),
            },
            Err(e) => log::info!("No settings at {} ({})", path.display(), e),
        }

        log::info!("Using default settings");
        Self::default()
    }

    /// Write settings as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        log::info!("Settings saved to {}", path.as_ref().display());
        Ok(())
    }
}
