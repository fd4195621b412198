//! Heat exhaustion accumulator
//!
//! `HeatState` is the per-player exposure context; every `HeatZone` the
//! player can walk into mutates the same state through its callbacks.
//! Severity climbs linearly while inside a zone and decays linearly after
//! leaving. Accumulation and decay are never active together.

use serde::{Deserialize, Serialize};

use crate::settings::HeatTuning;

/// What the accumulator is doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeatPhase {
    Idle,
    Accumulating,
    Decaying,
}

/// Running decay. Elapsed time is pre-seeded from the starting severity so
/// partial severities clear proportionally faster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct Decay {
    elapsed: f32,
    duration: f32,
}

/// Exposure state for one player
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeatState {
    severity: f32,
    /// Seconds of exposure that correspond to the current severity
    exhaustion_timer: f32,
    /// Number of zones currently overlapping the player
    occupancy: u32,
    decay: Option<Decay>,
}

impl HeatState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalized exposure in [0, 1]
    pub fn severity(&self) -> f32 {
        self.severity
    }

    /// Weight for the exhaustion post-process volume
    pub fn filter_weight(&self) -> f32 {
        self.severity.clamp(0.0, 1.0)
    }

    pub fn exhaustion_timer(&self) -> f32 {
        self.exhaustion_timer
    }

    pub fn occupancy(&self) -> u32 {
        self.occupancy
    }

    pub fn phase(&self) -> HeatPhase {
        if self.decay.is_some() {
            HeatPhase::Decaying
        } else if self.occupancy > 0 {
            HeatPhase::Accumulating
        } else {
            HeatPhase::Idle
        }
    }

    pub fn is_decaying(&self) -> bool {
        self.decay.is_some()
    }

    /// Advance a running decay by `dt`
    pub fn tick(&mut self, dt: f32) {
        let Some(decay) = self.decay.as_mut() else {
            return;
        };
        decay.elapsed += dt;
        if decay.duration <= 0.0 || decay.elapsed >= decay.duration {
            self.decay = None;
            self.set_severity(0.0);
            self.exhaustion_timer = 0.0;
            log::debug!("Heat severity fully reset");
            return;
        }
        let remaining = 1.0 - decay.elapsed / decay.duration;
        self.set_severity(remaining.min(self.severity));
    }

    fn start_decay(&mut self, reset_duration: f32) {
        if self.decay.is_some() {
            return;
        }
        let duration = reset_duration.max(0.0);
        self.decay = Some(Decay {
            elapsed: duration * (1.0 - self.severity),
            duration,
        });
    }

    /// Stop decaying and resynthesize the timer from the current severity
    fn resume_accumulation(&mut self, time_in_zone_max: f32) {
        self.decay = None;
        self.exhaustion_timer = time_in_zone_max.max(0.0) * self.severity;
    }

    fn accumulate(&mut self, dt: f32, time_in_zone_max: f32) {
        if time_in_zone_max <= 0.0 {
            self.exhaustion_timer = 0.0;
            self.set_severity(1.0);
            return;
        }
        self.exhaustion_timer = (self.exhaustion_timer + dt).min(time_in_zone_max);
        self.set_severity(self.exhaustion_timer / time_in_zone_max);
    }

    fn set_severity(&mut self, severity: f32) {
        self.severity = severity.clamp(0.0, 1.0);
    }
}

/// A heatwave trigger volume
#[derive(Debug, Clone)]
pub struct HeatZone {
    tuning: HeatTuning,
    /// Whether the local player is inside this zone
    occupied: bool,
}

impl HeatZone {
    pub fn new(tuning: HeatTuning) -> Self {
        Self {
            tuning,
            occupied: false,
        }
    }

    pub fn tuning(&self) -> &HeatTuning {
        &self.tuning
    }

    pub fn is_occupied(&self) -> bool {
        self.occupied
    }

    /// Local player entered the zone
    pub fn on_enter(&mut self, state: &mut HeatState) {
        if self.occupied {
            return;
        }
        if state.occupancy == 0 {
            state.resume_accumulation(self.tuning.time_in_zone_max);
        }
        state.occupancy += 1;
        self.occupied = true;
    }

    /// Local player is inside the zone this frame
    pub fn on_stay(&mut self, state: &mut HeatState, dt: f32, incapacitated: bool) {
        if !self.occupied {
            self.on_enter(state);
        }
        if incapacitated {
            state.start_decay(self.tuning.reset_duration);
            return;
        }
        if state.decay.is_some() {
            state.resume_accumulation(self.tuning.time_in_zone_max);
        }
        state.accumulate(dt, self.tuning.time_in_zone_max);
    }

    /// Local player left the zone
    pub fn on_exit(&mut self, state: &mut HeatState) {
        if !self.occupied {
            return;
        }
        self.occupied = false;
        state.occupancy = state.occupancy.saturating_sub(1);
        if state.occupancy == 0 {
            state.start_decay(self.tuning.reset_duration);
        }
    }

    /// Zone object is being destroyed. Clears any severity that is not
    /// already decaying, even while other zones are still occupied.
    pub fn on_destroy(&mut self, state: &mut HeatState) {
        if self.occupied {
            self.occupied = false;
            state.occupancy = state.occupancy.saturating_sub(1);
        }
        if state.severity > 0.0 && state.decay.is_none() {
            state.set_severity(0.0);
            state.exhaustion_timer = 0.0;
            log::info!("Heatwave zone destroyed, removing heatstroke");
        }
    }
}

/// Bend a stamina change by heat severity.
///
/// Consumption is multiplied by `1 + severity * multiplier`, regeneration
/// divided by it. `prev` is the meter before the host's player update and
/// `current` after it; the result stays within [0, 1].
pub fn stamina_with_heat(prev: f32, current: f32, severity: f32, multiplier: f32) -> f32 {
    if severity <= 0.0 {
        return current;
    }
    let factor = 1.0 + severity * multiplier;
    let delta = current - prev;
    if delta < 0.0 {
        (prev + delta * factor).max(0.0)
    } else if delta > 0.0 {
        (prev + delta / factor).min(1.0)
    } else {
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const DT: f32 = 0.125;

    fn zone() -> HeatZone {
        HeatZone::new(HeatTuning {
            time_in_zone_max: 10.0,
            reset_duration: 5.0,
            stamina_multiplier: 1.0,
        })
    }

    fn stay_for(zone: &mut HeatZone, state: &mut HeatState, secs: f32) {
        let steps = (secs / DT).round() as u32;
        for _ in 0..steps {
            zone.on_stay(state, DT, false);
        }
    }

    #[test]
    fn test_accumulates_linearly() {
        let mut state = HeatState::new();
        let mut z = zone();
        z.on_enter(&mut state);
        assert_eq!(state.phase(), HeatPhase::Accumulating);

        stay_for(&mut z, &mut state, 5.0);
        assert!((state.severity() - 0.5).abs() < 1e-4);

        stay_for(&mut z, &mut state, 20.0);
        assert_eq!(state.severity(), 1.0);
    }

    #[test]
    fn test_exit_decays_to_zero() {
        let mut state = HeatState::new();
        let mut z = zone();
        z.on_enter(&mut state);
        stay_for(&mut z, &mut state, 10.0);
        z.on_exit(&mut state);
        assert_eq!(state.phase(), HeatPhase::Decaying);

        // Full severity takes the full reset duration
        for _ in 0..20 {
            state.tick(DT);
        }
        assert!((state.severity() - 0.5).abs() < 1e-4);
        for _ in 0..20 {
            state.tick(DT);
        }
        assert_eq!(state.severity(), 0.0);
        assert_eq!(state.phase(), HeatPhase::Idle);
    }

    #[test]
    fn test_partial_severity_decays_faster() {
        let mut state = HeatState::new();
        let mut z = zone();
        z.on_enter(&mut state);
        stay_for(&mut z, &mut state, 5.0);
        z.on_exit(&mut state);

        // 0.5 severity clears in half the reset duration
        let mut secs = 0.0;
        while state.is_decaying() {
            state.tick(DT);
            secs += DT;
            assert!(secs <= 5.0);
        }
        assert!((secs - 2.5).abs() <= DT);
        assert_eq!(state.severity(), 0.0);
    }

    #[test]
    fn test_reentry_resumes_without_jump() {
        let mut state = HeatState::new();
        let mut z = zone();
        z.on_enter(&mut state);
        stay_for(&mut z, &mut state, 6.0);
        z.on_exit(&mut state);
        for _ in 0..8 {
            state.tick(DT);
        }
        let before = state.severity();
        assert!(before > 0.0 && before < 0.6);

        z.on_enter(&mut state);
        assert!(!state.is_decaying());
        assert!((state.exhaustion_timer() - 10.0 * before).abs() < 1e-4);

        z.on_stay(&mut state, DT, false);
        let step = state.severity() - before;
        assert!(step >= 0.0);
        assert!(step <= DT / 10.0 + 1e-5);
    }

    #[test]
    fn test_incapacitated_decays_then_resumes() {
        let mut state = HeatState::new();
        let mut z = zone();
        z.on_enter(&mut state);
        stay_for(&mut z, &mut state, 8.0);

        z.on_stay(&mut state, DT, true);
        assert_eq!(state.phase(), HeatPhase::Decaying);
        for _ in 0..4 {
            state.tick(DT);
        }
        let before = state.severity();
        assert!(before < 0.8);

        // Back on their feet inside the zone: decay cancelled, no jump
        z.on_stay(&mut state, DT, false);
        assert_eq!(state.phase(), HeatPhase::Accumulating);
        assert!(state.severity() - before <= DT / 10.0 + 1e-5);
    }

    #[test]
    fn test_overlapping_zones_decay_only_when_all_left() {
        let mut state = HeatState::new();
        let mut a = zone();
        let mut b = zone();
        a.on_enter(&mut state);
        b.on_enter(&mut state);
        assert_eq!(state.occupancy(), 2);
        stay_for(&mut a, &mut state, 2.0);

        a.on_exit(&mut state);
        assert_eq!(state.phase(), HeatPhase::Accumulating);
        b.on_exit(&mut state);
        assert_eq!(state.phase(), HeatPhase::Decaying);
    }

    #[test]
    fn test_destroy_resets_stuck_severity() {
        let mut state = HeatState::new();
        let mut z = zone();
        z.on_enter(&mut state);
        stay_for(&mut z, &mut state, 4.0);

        z.on_destroy(&mut state);
        assert_eq!(state.severity(), 0.0);
        assert_eq!(state.occupancy(), 0);
    }

    #[test]
    fn test_destroy_resets_while_another_zone_is_occupied() {
        let mut state = HeatState::new();
        let mut a = zone();
        let mut b = zone();
        a.on_enter(&mut state);
        b.on_enter(&mut state);
        stay_for(&mut a, &mut state, 4.0);
        assert!((state.severity() - 0.4).abs() < 1e-5);

        a.on_destroy(&mut state);
        assert_eq!(state.severity(), 0.0);
        assert_eq!(state.exhaustion_timer(), 0.0);
        assert_eq!(state.occupancy(), 1);
        assert!(!state.is_decaying());

        // Still inside B: exposure builds up again from zero
        stay_for(&mut b, &mut state, 1.0);
        assert!((state.severity() - 0.1).abs() < 1e-5);
    }

    #[test]
    fn test_destroy_leaves_running_decay_alone() {
        let mut state = HeatState::new();
        let mut z = zone();
        z.on_enter(&mut state);
        stay_for(&mut z, &mut state, 4.0);
        z.on_exit(&mut state);
        state.tick(DT);
        let sev = state.severity();

        z.on_destroy(&mut state);
        assert_eq!(state.severity(), sev);
        assert!(state.is_decaying());
    }

    #[test]
    fn test_stamina_modulation() {
        // No heat: untouched
        assert_eq!(stamina_with_heat(0.5, 0.4, 0.0, 1.0), 0.4);
        // Full heat doubles drain
        assert!((stamina_with_heat(0.5, 0.4, 1.0, 1.0) - 0.3).abs() < 1e-6);
        // Full heat halves regen
        assert!((stamina_with_heat(0.5, 0.6, 1.0, 1.0) - 0.55).abs() < 1e-6);
        // Clamped
        assert_eq!(stamina_with_heat(0.05, 0.0, 1.0, 1.0), 0.0);
        assert_eq!(stamina_with_heat(1.0, 1.0, 1.0, 1.0), 1.0);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Enter(usize),
        Stay(usize, f32, bool),
        Exit(usize),
        Tick(f32),
        Destroy(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0usize..2).prop_map(Op::Enter),
            (0usize..2, 0.0f32..30.0, any::<bool>()).prop_map(|(z, dt, inc)| Op::Stay(z, dt, inc)),
            (0usize..2).prop_map(Op::Exit),
            (0.0f32..30.0).prop_map(Op::Tick),
            (0usize..2).prop_map(Op::Destroy),
        ]
    }

    proptest! {
        #[test]
        fn prop_severity_stays_in_unit_range(ops in proptest::collection::vec(op(), 0..200)) {
            let mut state = HeatState::new();
            let mut zones = [zone(), zone()];
            for op in ops {
                match op {
                    Op::Enter(i) => zones[i].on_enter(&mut state),
                    Op::Stay(i, dt, inc) => zones[i].on_stay(&mut state, dt, inc),
                    Op::Exit(i) => zones[i].on_exit(&mut state),
                    Op::Tick(dt) => state.tick(dt),
                    Op::Destroy(i) => zones[i].on_destroy(&mut state),
                }
                prop_assert!((0.0..=1.0).contains(&state.severity()));
                let occupied = zones.iter().filter(|z| z.is_occupied()).count() as u32;
                prop_assert_eq!(state.occupancy(), occupied);
            }
        }
    }
}
