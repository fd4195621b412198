//! Per-frame map update
//!
//! Routes one frame of host callbacks to every event on the map and
//! collects what the host has to act on.

use std::collections::BTreeMap;

use glam::Vec3;

use super::crush::{CrushHazard, Kill};
use super::delivery::{DeliveryError, DeliveryEvent, DeliveryPlan, DeliverySignal};
use super::fumes::FumesZone;
use super::heat::{HeatState, HeatZone, stamina_with_heat};
use super::settle::{BodyConfig, SettlementDetector, Settled, SurfaceTag};
use super::spawner::{ForcedSpawner, SpawnCommand, TimeOfDay};
use super::state::{ObjectId, Role, Transform};
use crate::audio::{AudioClips, AudioCommand};
use crate::settings::{CreatureKind, Settings};

/// Overlap callback kinds for trigger volumes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneContact {
    Enter,
    Stay,
    Exit,
    /// The zone object is being destroyed
    Destroyed,
}

/// Overlap callback for the heat zone at `zone`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneEvent {
    pub zone: usize,
    pub contact: ZoneContact,
}

/// Local player readings taken around the host's own player update
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlayerInput {
    /// Stamina before the host's player update
    pub stamina_prev: f32,
    /// Stamina after it
    pub stamina: f32,
    pub incapacitated: bool,
    pub drunk_inertia: f32,
    pub drunk_speed: f32,
}

/// Host callbacks gathered during one frame
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    pub time_of_day: TimeOfDay,
    pub portal_open_finished: bool,
    pub portal_close_finished: bool,
    /// Signals received from the coordinator (observers only)
    pub delivery_signals: Vec<DeliverySignal>,
    /// First collisions reported by falling parts
    pub contacts: Vec<(ObjectId, SurfaceTag)>,
    /// Parts that collided with the local player this frame
    pub player_hits: Vec<ObjectId>,
    /// Current velocity of falling parts; unreported parts count as at rest
    pub velocities: BTreeMap<ObjectId, Vec3>,
    pub heat_zones: Vec<ZoneEvent>,
    /// Fumes zones the local player stayed in this frame
    pub fumes_zones: Vec<usize>,
    /// None when there is no local player
    pub player: Option<PlayerInput>,
}

/// Everything the host has to apply after a frame
#[derive(Debug, Clone, Default)]
pub struct TickOutput {
    /// Signals to broadcast (coordinator only)
    pub signals: Vec<DeliverySignal>,
    pub audio: Vec<AudioCommand>,
    pub spawns: Vec<SpawnCommand>,
    /// Parts that hit the ground this frame (impact sound and smoke)
    pub impacts: Vec<ObjectId>,
    pub settled: Vec<Settled>,
    /// New rigidbody/collider setup for settled parts
    pub bodies: Vec<(ObjectId, BodyConfig)>,
    /// Local player crushed by a falling part
    pub kill: Option<Kill>,
    /// Suffocation damage to deal to the local player
    pub damage: u32,
    pub drunk_inertia: Option<f32>,
    /// Stamina with heat applied
    pub stamina: Option<f32>,
    pub heat_severity: f32,
    /// Parameter for time-synced animators, once the clock has started
    pub time_of_day_anim: Option<f32>,
}

/// All events on one map instance
#[derive(Debug, Clone)]
pub struct MapState {
    pub settings: Settings,
    pub role: Role,
    pub map_seed: u64,
    pub delivery: Option<DeliveryEvent>,
    pub heat: HeatState,
    pub heat_zones: Vec<HeatZone>,
    pub fumes_zones: Vec<FumesZone>,
    pub spawners: Vec<ForcedSpawner>,
    pub crush: CrushHazard,
    /// Settlement watchers for parts of dropped shipments
    pub falling: BTreeMap<ObjectId, SettlementDetector>,
}

impl MapState {
    pub fn new(settings: Settings, role: Role, map_seed: u64) -> Self {
        Self {
            role,
            map_seed,
            delivery: None,
            heat: HeatState::new(),
            heat_zones: Vec::new(),
            fumes_zones: Vec::new(),
            crush: CrushHazard::new(settings.crush.clone()),
            spawners: Vec::new(),
            falling: BTreeMap::new(),
            settings,
        }
    }

    pub fn is_host(&self) -> bool {
        self.role.is_coordinator()
    }

    /// Set up the ring portal delivery event
    pub fn with_delivery(
        mut self,
        plan: DeliveryPlan,
        start: Transform,
        clips: AudioClips,
    ) -> Result<Self, DeliveryError> {
        self.delivery = Some(DeliveryEvent::new(
            self.role,
            plan,
            self.settings.delivery.clone(),
            start,
            clips,
            self.map_seed,
        )?);
        Ok(self)
    }

    pub fn add_heat_zone(&mut self) -> usize {
        self.heat_zones.push(HeatZone::new(self.settings.heat.clone()));
        self.heat_zones.len() - 1
    }

    pub fn add_fumes_zone(&mut self) -> usize {
        self.fumes_zones.push(FumesZone::new(self.settings.fumes.clone()));
        self.fumes_zones.len() - 1
    }

    pub fn add_spawner(&mut self, kind: CreatureKind, anchors: Vec<Vec3>, has_nest_prefab: bool) -> usize {
        self.spawners.push(ForcedSpawner::new(
            kind,
            anchors,
            has_nest_prefab,
            self.settings.spawner.clone(),
            self.map_seed,
        ));
        self.spawners.len() - 1
    }

    /// Round start hook: places spawner nests
    pub fn start_round(&mut self) -> Vec<SpawnCommand> {
        let is_host = self.is_host();
        let toggles = &self.settings.spawning;
        self.spawners
            .iter_mut()
            .flat_map(|s| s.start(is_host, toggles))
            .collect()
    }

    fn watch_shipment(&mut self, shipment: u32) {
        let Some(delivery) = &self.delivery else {
            return;
        };
        let Some(found) = delivery.shipments().iter().find(|s| s.id == shipment) else {
            log::warn!("Spawned shipment {} is not part of this event", shipment);
            return;
        };
        for &part in &found.parts {
            self.falling
                .insert(part, SettlementDetector::new(part, self.settings.settle.clone()));
        }
    }
}

/// Advance every event on the map by one frame
pub fn tick(state: &mut MapState, input: &TickInput, dt: f32) -> TickOutput {
    let mut out = TickOutput::default();

    tick_delivery(state, input, dt, &mut out);
    tick_hazards(state, input, dt, &mut out);

    out.time_of_day_anim = input.time_of_day.animator_value();
    let is_host = state.is_host();
    for spawner in &mut state.spawners {
        out.spawns.extend(spawner.tick(input.time_of_day, is_host));
    }

    out
}

fn tick_delivery(state: &mut MapState, input: &TickInput, dt: f32, out: &mut TickOutput) {
    // Settlement first so the sequencer sees this frame's results
    for (object, surface) in &input.contacts {
        if let Some(detector) = state.falling.get_mut(object)
            && detector.on_contact(*surface)
        {
            out.impacts.push(*object);
        }
    }
    // Settled parts are no longer watched and never crush
    for object in &input.player_hits {
        let Some(detector) = state.falling.get(object) else {
            continue;
        };
        let velocity = input.velocities.get(object).copied().unwrap_or(Vec3::ZERO);
        if let Some(kill) = state
            .crush
            .on_player_contact(*object, velocity, detector.body().crush_enabled)
        {
            out.kill.get_or_insert(kill);
        }
    }
    for (object, detector) in &mut state.falling {
        let velocity = input.velocities.get(object).copied().unwrap_or(Vec3::ZERO);
        if let Some(settled) = detector.tick(dt, velocity) {
            out.bodies.push((*object, detector.body()));
            out.settled.push(settled);
        }
    }
    state.falling.retain(|_, d| !d.is_settled());

    let Some(delivery) = state.delivery.as_mut() else {
        return;
    };

    for settled in &out.settled {
        delivery.on_object_settled(settled.object);
    }
    for signal in &input.delivery_signals {
        delivery.apply_signal(signal);
    }
    if input.portal_open_finished {
        delivery.on_portal_open_finished();
    }
    if input.portal_close_finished {
        delivery.on_portal_close_finished();
    }

    delivery.tick(dt);
    out.signals = delivery.drain_signals();
    out.audio = delivery.drain_audio();

    // The coordinator drops only what it broadcast itself
    let replicated: &[DeliverySignal] = if state.is_host() {
        &[]
    } else {
        input.delivery_signals.as_slice()
    };
    let spawned: Vec<u32> = out
        .signals
        .iter()
        .chain(replicated)
        .filter_map(|s| match s {
            DeliverySignal::SpawnShipment { shipment, .. } => Some(*shipment),
            _ => None,
        })
        .collect();
    for shipment in spawned {
        state.watch_shipment(shipment);
    }
}

fn tick_hazards(state: &mut MapState, input: &TickInput, dt: f32, out: &mut TickOutput) {
    let incapacitated = input.player.is_some_and(|p| p.incapacitated);

    for event in &input.heat_zones {
        let Some(zone) = state.heat_zones.get_mut(event.zone) else {
            log::warn!("Overlap for unknown heat zone {}", event.zone);
            continue;
        };
        match event.contact {
            ZoneContact::Enter => zone.on_enter(&mut state.heat),
            ZoneContact::Stay => zone.on_stay(&mut state.heat, dt, incapacitated),
            ZoneContact::Exit => zone.on_exit(&mut state.heat),
            ZoneContact::Destroyed => zone.on_destroy(&mut state.heat),
        }
    }
    state.heat.tick(dt);
    out.heat_severity = state.heat.severity();

    let Some(player) = input.player else {
        return;
    };
    out.stamina = Some(stamina_with_heat(
        player.stamina_prev,
        player.stamina,
        state.heat.severity(),
        state.settings.heat.stamina_multiplier,
    ));

    let mut drunk_inertia = player.drunk_inertia;
    for &index in &input.fumes_zones {
        let Some(zone) = state.fumes_zones.get_mut(index) else {
            log::warn!("Overlap for unknown fumes zone {}", index);
            continue;
        };
        let effect = zone.on_stay(dt, drunk_inertia, player.drunk_speed);
        drunk_inertia = effect.drunk_inertia;
        out.damage += effect.damage.unwrap_or(0);
        out.drunk_inertia = Some(drunk_inertia);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::SIM_DT;
    use crate::sim::delivery::DeliveryPhase;
    use crate::sim::heat::HeatPhase;
    use crate::sim::state::Shipment;

    fn plan() -> DeliveryPlan {
        DeliveryPlan {
            schedule: vec![1.0],
            shipments: vec![Shipment::new(7, vec![ObjectId(1), ObjectId(2), ObjectId(3)])],
            drop_sites: vec![Vec3::new(20.0, 0.0, 20.0)],
        }
    }

    fn map(role: Role) -> MapState {
        MapState::new(Settings::default(), role, 42)
            .with_delivery(plan(), Transform::default(), AudioClips::default())
            .unwrap()
    }

    #[test]
    fn test_delivery_through_map_tick() {
        let mut state = map(Role::Coordinator);
        let mut landed: Vec<ObjectId> = Vec::new();
        let mut settled = Vec::new();
        let mut broadcast = Vec::new();

        for _ in 0..(200.0 / SIM_DT) as usize {
            let phase = state.delivery.as_ref().map(|d| d.phase());
            let input = TickInput {
                portal_open_finished: phase == Some(DeliveryPhase::Opening),
                portal_close_finished: phase == Some(DeliveryPhase::Closing),
                contacts: state.falling.keys().map(|id| (*id, SurfaceTag::Grass)).collect(),
                ..Default::default()
            };
            let out = tick(&mut state, &input, SIM_DT);
            landed.extend(&out.impacts);
            for (_, body) in &out.bodies {
                assert!(body.kinematic && body.nav_carving);
            }
            settled.extend(out.settled.iter().map(|s| s.object));
            broadcast.extend(out.signals);
            if state.delivery.as_ref().is_some_and(|d| d.is_finished()) {
                break;
            }
        }

        assert_eq!(landed, vec![ObjectId(1), ObjectId(2), ObjectId(3)]);
        assert_eq!(settled, landed);
        assert!(state.falling.is_empty());
        assert!(broadcast.contains(&DeliverySignal::ShipmentSettled {
            shipment: 7,
            parts: vec![ObjectId(1), ObjectId(2), ObjectId(3)],
        }));
        assert_eq!(broadcast.last(), Some(&DeliverySignal::IndexAdvanced { index: 1 }));
    }

    #[test]
    fn test_observer_watches_replicated_drops() {
        let mut state = map(Role::Observer);
        let input = TickInput {
            delivery_signals: vec![DeliverySignal::SpawnShipment {
                index: 0,
                shipment: 7,
                site: Vec3::new(20.0, 0.0, 20.0),
            }],
            ..Default::default()
        };
        let out = tick(&mut state, &input, SIM_DT);
        assert!(out.signals.is_empty());
        assert_eq!(state.falling.len(), 3);

        // Bodies still switch over locally once parts settle
        let input = TickInput {
            contacts: vec![(ObjectId(2), SurfaceTag::Aluminum)],
            ..Default::default()
        };
        let out = tick(&mut state, &input, SIM_DT);
        assert_eq!(out.impacts, vec![ObjectId(2)]);
        let mut bodies = Vec::new();
        for _ in 0..60 {
            bodies.extend(tick(&mut state, &TickInput::default(), SIM_DT).bodies);
        }
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0].0, ObjectId(2));
    }

    #[test]
    fn test_coordinator_ignores_echoed_drops() {
        let mut state = map(Role::Coordinator);
        let input = TickInput {
            delivery_signals: vec![DeliverySignal::SpawnShipment {
                index: 0,
                shipment: 7,
                site: Vec3::new(20.0, 0.0, 20.0),
            }],
            ..Default::default()
        };
        let out = tick(&mut state, &input, SIM_DT);
        assert!(out.signals.is_empty());
        assert!(state.falling.is_empty());
    }

    #[test]
    fn test_falling_parts_crush_until_settled() {
        let mut state = map(Role::Observer);
        let spawn = TickInput {
            delivery_signals: vec![DeliverySignal::SpawnShipment {
                index: 0,
                shipment: 7,
                site: Vec3::new(20.0, 0.0, 20.0),
            }],
            ..Default::default()
        };
        tick(&mut state, &spawn, SIM_DT);

        let falling = Vec3::new(0.0, -6.0, 0.0);
        let hit = TickInput {
            player_hits: vec![ObjectId(1)],
            velocities: BTreeMap::from([(ObjectId(1), falling)]),
            ..Default::default()
        };
        let kill = tick(&mut state, &hit, SIM_DT).kill.unwrap();
        assert_eq!(kill.object, ObjectId(1));
        assert_eq!(kill.body_velocity, falling);

        // Resting part: speed does not exceed the threshold
        let resting = TickInput {
            player_hits: vec![ObjectId(2)],
            ..Default::default()
        };
        assert!(tick(&mut state, &resting, SIM_DT).kill.is_none());

        // Once settled the part is inert, whatever the host reports
        let land = TickInput {
            contacts: vec![(ObjectId(1), SurfaceTag::Grass)],
            ..Default::default()
        };
        tick(&mut state, &land, SIM_DT);
        for _ in 0..60 {
            tick(&mut state, &TickInput::default(), SIM_DT);
        }
        assert!(!state.falling.contains_key(&ObjectId(1)));
        assert!(tick(&mut state, &hit, SIM_DT).kill.is_none());
    }

    #[test]
    fn test_time_of_day_animator_output() {
        let mut state = MapState::new(Settings::default(), Role::Observer, 1);
        let before = TickInput::default();
        assert_eq!(tick(&mut state, &before, SIM_DT).time_of_day_anim, None);

        let late = TickInput {
            time_of_day: TimeOfDay { normalized: 1.0, started: true },
            ..Default::default()
        };
        assert_eq!(tick(&mut state, &late, SIM_DT).time_of_day_anim, Some(0.99));
    }

    #[test]
    fn test_heat_zone_drives_stamina() {
        let mut state = MapState::new(Settings::default(), Role::Coordinator, 1);
        let zone = state.add_heat_zone();
        let player = PlayerInput {
            stamina_prev: 0.5,
            stamina: 0.4,
            ..Default::default()
        };

        let enter = TickInput {
            heat_zones: vec![ZoneEvent { zone, contact: ZoneContact::Enter }],
            player: Some(player),
            ..Default::default()
        };
        tick(&mut state, &enter, 0.0);

        let stay = TickInput {
            heat_zones: vec![ZoneEvent { zone, contact: ZoneContact::Stay }],
            player: Some(player),
            ..Default::default()
        };
        let mut out = TickOutput::default();
        for _ in 0..40 {
            out = tick(&mut state, &stay, 0.125);
        }
        assert!((out.heat_severity - 0.5).abs() < 1e-4);
        // Drain of 0.1 scaled by 1.5
        assert!((out.stamina.unwrap() - 0.35).abs() < 1e-4);

        let exit = TickInput {
            heat_zones: vec![ZoneEvent { zone, contact: ZoneContact::Exit }],
            ..Default::default()
        };
        tick(&mut state, &exit, 0.0);
        assert_eq!(state.heat.phase(), HeatPhase::Decaying);
        for _ in 0..40 {
            tick(&mut state, &TickInput::default(), 0.125);
        }
        assert_eq!(state.heat.severity(), 0.0);
        assert_eq!(state.heat.phase(), HeatPhase::Idle);
    }

    #[test]
    fn test_fumes_and_unknown_zones() {
        let mut state = MapState::new(Settings::default(), Role::Coordinator, 1);
        let zone = state.add_fumes_zone();
        let input = TickInput {
            fumes_zones: vec![zone, 9],
            heat_zones: vec![ZoneEvent { zone: 3, contact: ZoneContact::Stay }],
            player: Some(PlayerInput {
                drunk_inertia: 1.0,
                drunk_speed: 1.0,
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut damage = 0;
        for _ in 0..24 {
            let out = tick(&mut state, &input, 0.25);
            damage += out.damage;
            assert!(out.drunk_inertia.is_some());
        }
        assert_eq!(damage, 3);
        assert_eq!(state.heat.severity(), 0.0);
    }

    #[test]
    fn test_spawners_hatch_on_schedule() {
        let mut state = MapState::new(Settings::default(), Role::Coordinator, 5);
        state.add_spawner(CreatureKind::RadMech, vec![Vec3::ZERO, Vec3::X], true);
        state.add_spawner(CreatureKind::from_name("flowerman"), vec![Vec3::Z], false);

        let placed = state.start_round();
        assert_eq!(placed.len(), 2);

        let morning = TickInput {
            time_of_day: TimeOfDay { normalized: 0.2, started: true },
            ..Default::default()
        };
        assert!(tick(&mut state, &morning, SIM_DT).spawns.is_empty());

        let evening = TickInput {
            time_of_day: TimeOfDay { normalized: 0.7, started: true },
            ..Default::default()
        };
        let spawns = tick(&mut state, &evening, SIM_DT).spawns;
        let enemies = spawns
            .iter()
            .filter(|c| matches!(c, SpawnCommand::SpawnEnemy { .. }))
            .count();
        assert_eq!(enemies, 3);
        assert!(tick(&mut state, &evening, SIM_DT).spawns.is_empty());
    }

    #[test]
    fn test_clients_do_not_spawn() {
        let mut state = MapState::new(Settings::default(), Role::Observer, 5);
        state.add_spawner(CreatureKind::BaboonHawk, vec![Vec3::ZERO], true);
        assert!(state.start_round().is_empty());
    }
}
