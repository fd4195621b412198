//! Toxic fumes zone: periodic suffocation damage and a drunkenness push

use crate::consts::{DRUNK_INERTIA_MAX, DRUNK_INERTIA_MIN};
use crate::settings::FumesTuning;

/// Effect of one frame spent inside the fumes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FumesEffect {
    /// New drunkenness inertia for the player
    pub drunk_inertia: f32,
    /// Suffocation damage to apply this frame, if any
    pub damage: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct FumesZone {
    tuning: FumesTuning,
    damage_timer: f32,
}

impl FumesZone {
    pub fn new(tuning: FumesTuning) -> Self {
        Self {
            tuning,
            damage_timer: 0.0,
        }
    }

    pub fn damage_timer(&self) -> f32 {
        self.damage_timer
    }

    /// Local player stayed inside for `dt` seconds
    pub fn on_stay(&mut self, dt: f32, drunk_inertia: f32, drunk_speed: f32) -> FumesEffect {
        self.damage_timer += dt;

        let power = self.tuning.drunkenness_power.max(f32::EPSILON);
        let drunk_inertia =
            (drunk_inertia + dt / power * drunk_speed).clamp(DRUNK_INERTIA_MIN, DRUNK_INERTIA_MAX);

        let damage = if self.damage_timer >= self.tuning.damage_interval {
            self.damage_timer = 0.0;
            Some(self.tuning.damage_amount)
        } else {
            None
        };

        FumesEffect {
            drunk_inertia,
            damage,
        }
    }
}
