//! Ring Portal headless runner
//!
//! Plays a full delivery event on a simulated host: animations finish
//! after a fixed delay and dropped parts fall, bounce and come to rest.
//! Usage: `ring-portal [settings.json] [map seed]`

use std::collections::BTreeMap;

use glam::Vec3;

use ring_portal::Settings;
use ring_portal::audio::{AudioClips, Clip};
use ring_portal::consts::SIM_DT;
use ring_portal::sim::{
    DeliveryPhase, DeliveryPlan, MapState, ObjectId, Role, Settled, Shipment, SurfaceTag,
    TickInput, Transform, tick,
};

/// Seconds the simulated animator takes to open or close the portal
const ANIMATION_SECS: f32 = 3.0;
/// Seconds a dropped part falls before touching the ground
const FALL_SECS: f32 = 1.5;
/// Per-frame velocity damping once a part is on the ground
const GROUND_DAMPING: f32 = 0.92;
/// Give up after this much simulated time
const MAX_SIM_SECS: f32 = 600.0;

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let settings = match args.next() {
        Some(path) => Settings::load(path),
        None => Settings::default(),
    };
    let map_seed = args.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    log::info!("Ring Portal (native) starting, map seed {}", map_seed);

    let plan = DeliveryPlan {
        schedule: vec![10.0, 40.0, 70.0],
        shipments: (0..3)
            .map(|id| Shipment::new(id, (0..4).map(|p| ObjectId(id * 100 + p)).collect()))
            .collect(),
        drop_sites: vec![
            Vec3::new(-60.0, 0.0, 35.0),
            Vec3::new(15.0, 0.0, -80.0),
            Vec3::new(90.0, 0.0, 10.0),
        ],
    };
    let clips = AudioClips {
        start_moving: vec![Clip::new("ring_start_01", 2.0), Clip::new("ring_start_02", 2.5)],
        movement: vec![Clip::new("ring_hum_01", 4.0), Clip::new("ring_hum_02", 3.5)],
        spin_up: Some(Clip::new("ring_spin_up", 6.0)),
    };
    let start = Transform::new(Vec3::new(0.0, 120.0, 0.0), Vec3::new(12.0, 30.0, -8.0));

    let mut state = match MapState::new(settings, Role::Coordinator, map_seed).with_delivery(plan, start, clips) {
        Ok(state) => state,
        Err(e) => {
            log::error!("Failed to set up delivery event: {}", e);
            return;
        }
    };

    let mut host = SimulatedHost::default();
    let mut elapsed = 0.0;
    while elapsed < MAX_SIM_SECS {
        let input = host.input(&state);
        let out = tick(&mut state, &input, SIM_DT);
        elapsed += SIM_DT;

        for signal in &out.signals {
            log::info!("[{:7.2}s] broadcast {:?}", elapsed, signal);
        }
        for command in &out.audio {
            log::debug!("[{:7.2}s] audio {:?}", elapsed, command);
        }
        for object in &out.impacts {
            log::debug!("[{:7.2}s] impact {:?}", elapsed, object);
        }
        host.observe(&state, &out.settled);

        if state.delivery.as_ref().is_none_or(|d| d.is_finished()) {
            break;
        }
    }

    match &state.delivery {
        Some(d) if d.is_finished() => println!(
            "Delivered {} shipments in {:.1}s, {} parts anchored",
            d.index(),
            elapsed,
            d.anchored().len()
        ),
        Some(d) => println!("Stopped after {:.1}s at delivery {} ({:?})", elapsed, d.index(), d.phase()),
        None => println!("No delivery event"),
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // Library only on wasm; the host drives `tick` directly
}

/// Stand-in for engine animation and physics
#[derive(Default)]
struct SimulatedHost {
    anim_clock: f32,
    /// Falling parts: (seconds until ground contact, vertical speed)
    parts: BTreeMap<ObjectId, (f32, f32)>,
}

impl SimulatedHost {
    fn input(&mut self, state: &MapState) -> TickInput {
        let mut input = TickInput::default();

        let phase = state.delivery.as_ref().map(|d| d.phase());
        match phase {
            Some(DeliveryPhase::Opening | DeliveryPhase::Closing) => {
                self.anim_clock += SIM_DT;
                if self.anim_clock >= ANIMATION_SECS {
                    self.anim_clock = 0.0;
                    input.portal_open_finished = phase == Some(DeliveryPhase::Opening);
                    input.portal_close_finished = phase == Some(DeliveryPhase::Closing);
                }
            }
            _ => self.anim_clock = 0.0,
        }

        for object in state.falling.keys() {
            let (until_ground, speed) = self.parts.entry(*object).or_insert((FALL_SECS, 9.0));
            *until_ground -= SIM_DT;
            if *until_ground <= 0.0 {
                if *until_ground > -SIM_DT {
                    input.contacts.push((*object, SurfaceTag::Grass));
                }
                *speed *= GROUND_DAMPING;
            }
            input.velocities.insert(*object, Vec3::new(0.0, -*speed, 0.0));
        }
        input
    }

    fn observe(&mut self, state: &MapState, settled: &[Settled]) {
        for s in settled {
            self.parts.remove(&s.object);
        }
        self.parts.retain(|id, _| state.falling.contains_key(id));
    }
}
