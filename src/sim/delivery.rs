//! Ring portal delivery event
//!
//! A rotating ring hovers over the map and, on a schedule, drops supply
//! shipments at shuffled drop sites. Each delivery runs a fixed sequence:
//!
//! 1. move and level over the next drop site (eased)
//! 2. spin both rings up
//! 3. open the portal, wait for the open animation
//! 4. spin back down
//! 5. cooldown, drop the shipment, wait for every part to settle, cooldown
//! 6. close the portal, wait for the close animation
//! 7. tilt to a new random attitude
//!
//! The coordinator drives the sequence from `tick` and broadcasts
//! [`DeliverySignal`]s; observers replay them and only ever follow the
//! coordinator's delivery index.

use std::collections::BTreeSet;

use glam::Vec3;
use rand::Rng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::shuffle::{ShuffleError, shuffle_in_sync};
use super::state::{ObjectId, RngState, Role, Shipment, Transform};
use crate::audio::{AudioClips, AudioCommand, MovementAudio};
use crate::consts::{FADE_SETTLE_GAP, SPIN_DOWN_FACTOR};
use crate::settings::DeliveryTuning;
use crate::{ease_in_out, event_seed, lerp};

/// Errors raised while setting up a delivery event
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("shipments and drop sites do not line up: {0}")]
    Mismatch(#[from] ShuffleError),
}

/// One-way announcements from the coordinator to every participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DeliverySignal {
    StartMovementSound,
    StopMovementSound,
    SpinUpCue,
    /// Activate the shipment; its parts start falling
    SpawnShipment { index: u32, shipment: u32, site: Vec3 },
    /// Every part came to rest; reparent them to the drop-site anchor
    ShipmentSettled { shipment: u32, parts: Vec<ObjectId> },
    /// Shared delivery index after a completed sequence
    IndexAdvanced { index: u32 },
}

/// Coarse view of where the sequencer is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryPhase {
    /// Waiting for the next scheduled delivery
    Idle,
    Positioning,
    /// Movement sound fading out
    FadeWait,
    SpinUp,
    /// Waiting for the open animation
    Opening,
    SpinDown,
    Cooldown,
    /// Waiting for shipment parts to settle
    Dropping,
    /// Waiting for the close animation
    Closing,
    Tilting,
    /// All scheduled deliveries done; event disabled
    Finished,
}

/// Animated ring parameters mirrored onto the host's transform and animator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RingState {
    pub transform: Transform,
    pub outer_speed: f32,
    pub inner_speed: f32,
    pub portal_active: bool,
    pub open_finished: bool,
    pub close_finished: bool,
}

/// Inputs for a delivery event before shuffling
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeliveryPlan {
    /// Seconds since activation at which each delivery may start
    pub schedule: Vec<f32>,
    pub shipments: Vec<Shipment>,
    pub drop_sites: Vec<Vec3>,
}

/// Fixed-length ramp advanced by elapsed time
#[derive(Debug, Clone, Copy)]
struct Ramp {
    elapsed: f32,
    duration: f32,
}

impl Ramp {
    fn new(duration: f32) -> Self {
        Self {
            elapsed: 0.0,
            duration,
        }
    }

    /// Advance and return progress in [0, 1]
    fn advance(&mut self, dt: f32) -> f32 {
        self.elapsed += dt;
        if self.duration <= 0.0 {
            1.0
        } else {
            (self.elapsed / self.duration).min(1.0)
        }
    }

    fn is_done(&self) -> bool {
        self.elapsed >= self.duration
    }
}

#[derive(Debug, Clone, Copy)]
enum AfterCooldown {
    Drop,
    Close,
}

#[derive(Debug, Clone)]
enum Step {
    Idle,
    Positioning { ramp: Ramp, from: Transform, to: Transform },
    FadeWait { remaining: f32 },
    SpinUp { ramp: Ramp },
    Opening { waited: f32 },
    SpinDown { ramp: Ramp },
    Cooldown { remaining: f32, then: AfterCooldown },
    Dropping { shipment: u32, pending: BTreeSet<ObjectId>, settled: Vec<ObjectId> },
    Closing { waited: f32 },
    Tilting { ramp: Ramp, from: Vec3, to: Vec3 },
    Finished,
}

enum Flow {
    Stay(Step),
    Next(Step),
}

/// One ring portal delivery event instance
#[derive(Debug, Clone)]
pub struct DeliveryEvent {
    role: Role,
    tuning: DeliveryTuning,
    schedule: Vec<f32>,
    shipments: Vec<Shipment>,
    drop_sites: Vec<Vec3>,
    /// Shared delivery index; only the coordinator advances it
    index: u32,
    /// Seconds since activation
    timer: f32,
    delivering: bool,
    step: Step,
    ring: RingState,
    rng: Pcg32,
    audio: MovementAudio,
    /// Parts reparented to drop-site anchors so far
    anchored: Vec<ObjectId>,
    signals: Vec<DeliverySignal>,
}

impl DeliveryEvent {
    /// Shuffle shipments and drop sites in sync and set up the event.
    ///
    /// Every participant must pass the same plan and map seed. Empty
    /// shipments or drop sites leave the event disabled.
    pub fn new(
        role: Role,
        plan: DeliveryPlan,
        tuning: DeliveryTuning,
        start: Transform,
        clips: AudioClips,
        map_seed: u64,
    ) -> Result<Self, DeliveryError> {
        let DeliveryPlan {
            schedule,
            mut shipments,
            mut drop_sites,
        } = plan;

        let seed = event_seed(map_seed);
        let mut rng = RngState::new(seed).to_rng();
        shuffle_in_sync(&mut drop_sites, &mut shipments, &mut rng)?;

        let mut event = Self {
            role,
            ring: RingState {
                transform: start,
                outer_speed: tuning.base_outer_speed,
                inner_speed: tuning.base_inner_speed,
                portal_active: false,
                open_finished: false,
                close_finished: false,
            },
            audio: MovementAudio::new(clips, tuning.fade_out_duration, seed),
            tuning,
            schedule,
            shipments,
            drop_sites,
            index: 0,
            timer: 0.0,
            delivering: false,
            step: Step::Idle,
            rng,
            anchored: Vec::new(),
            signals: Vec::new(),
        };

        if event.shipments.is_empty() {
            log::error!("Delivery event has no shipments or drop sites, disabling");
            event.step = Step::Finished;
        } else {
            log::info!(
                "Delivery event ready: {} shipments, {} scheduled deliveries",
                event.shipments.len(),
                event.schedule.len()
            );
        }
        Ok(event)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn timer(&self) -> f32 {
        self.timer
    }

    pub fn ring(&self) -> &RingState {
        &self.ring
    }

    /// Shipments in delivery order
    pub fn shipments(&self) -> &[Shipment] {
        &self.shipments
    }

    /// Drop sites in delivery order
    pub fn drop_sites(&self) -> &[Vec3] {
        &self.drop_sites
    }

    pub fn anchored(&self) -> &[ObjectId] {
        &self.anchored
    }

    pub fn is_delivering(&self) -> bool {
        self.delivering
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.step, Step::Finished)
    }

    pub fn phase(&self) -> DeliveryPhase {
        match self.step {
            Step::Idle => DeliveryPhase::Idle,
            Step::Positioning { .. } => DeliveryPhase::Positioning,
            Step::FadeWait { .. } => DeliveryPhase::FadeWait,
            Step::SpinUp { .. } => DeliveryPhase::SpinUp,
            Step::Opening { .. } => DeliveryPhase::Opening,
            Step::SpinDown { .. } => DeliveryPhase::SpinDown,
            Step::Cooldown { .. } => DeliveryPhase::Cooldown,
            Step::Dropping { .. } => DeliveryPhase::Dropping,
            Step::Closing { .. } => DeliveryPhase::Closing,
            Step::Tilting { .. } => DeliveryPhase::Tilting,
            Step::Finished => DeliveryPhase::Finished,
        }
    }

    /// Number of deliveries before the event disables itself
    pub fn delivery_count(&self) -> usize {
        if self.tuning.wrap_selection {
            self.schedule.len()
        } else {
            self.schedule.len().min(self.shipments.len())
        }
    }

    /// Shipment/drop-site slot used by the current index
    fn selection(&self) -> usize {
        self.index as usize % self.shipments.len().max(1)
    }

    /// Signals broadcast since the last drain
    pub fn drain_signals(&mut self) -> Vec<DeliverySignal> {
        std::mem::take(&mut self.signals)
    }

    /// Audio commands for the local ring since the last drain
    pub fn drain_audio(&mut self) -> Vec<AudioCommand> {
        self.audio.drain()
    }

    /// Per-frame update
    pub fn tick(&mut self, dt: f32) {
        self.audio.tick(dt);

        if self.is_finished() {
            return;
        }
        if self.index as usize >= self.delivery_count() {
            self.finish();
            return;
        }
        if !self.role.is_coordinator() {
            return;
        }

        self.timer += dt;
        if !self.delivering && self.timer >= self.schedule[self.index as usize] {
            self.start_sequence();
        }
        if self.delivering {
            self.advance(dt);
        }
    }

    /// Begin the next delivery now. Refused while a sequence is running,
    /// after the last delivery, and on observers.
    pub fn start_sequence(&mut self) -> bool {
        if !self.role.is_coordinator()
            || self.delivering
            || self.is_finished()
            || self.index as usize >= self.delivery_count()
        {
            return false;
        }

        log::info!("Starting delivery sequence for shipment {}", self.index);
        self.delivering = true;
        self.ring.portal_active = false;
        self.ring.open_finished = false;
        self.ring.close_finished = false;
        self.emit(DeliverySignal::StartMovementSound);

        let from = self.ring.transform;
        let site = self.drop_sites[self.selection()];
        let to = Transform::new(Vec3::new(site.x, from.position.y, site.z), from.leveled().euler);
        self.step = Step::Positioning {
            ramp: Ramp::new(self.tuning.movement_duration),
            from,
            to,
        };
        true
    }

    /// Open animation callback
    pub fn on_portal_open_finished(&mut self) {
        if matches!(self.step, Step::Opening { .. }) {
            log::info!("Portal open animation finished");
            self.ring.open_finished = true;
        } else {
            log::debug!("Open animation callback outside the open wait, ignored");
        }
    }

    /// Close animation callback
    pub fn on_portal_close_finished(&mut self) {
        if matches!(self.step, Step::Closing { .. }) {
            log::info!("Portal close animation finished");
            self.ring.close_finished = true;
        } else {
            log::debug!("Close animation callback outside the close wait, ignored");
        }
    }

    /// Settlement notification for a part of the dropping shipment.
    /// Returns false for parts that are not awaited.
    pub fn on_object_settled(&mut self, object: ObjectId) -> bool {
        if let Step::Dropping {
            pending, settled, ..
        } = &mut self.step
            && pending.remove(&object)
        {
            settled.push(object);
            log::debug!("Part {:?} settled, {} to go", object, pending.len());
            return true;
        }
        if self.role.is_coordinator() {
            log::warn!("Ignoring settlement of {:?}, not part of the current drop", object);
        }
        false
    }

    /// Replay a signal received from the coordinator
    pub fn apply_signal(&mut self, signal: &DeliverySignal) {
        if self.role.is_coordinator() {
            log::warn!("Coordinator ignores replicated signal {:?}", signal);
            return;
        }
        self.replay(signal);
        if let DeliverySignal::IndexAdvanced { index } = signal {
            self.sync_index(*index);
        }
    }

    /// Follow the coordinator's delivery index. Rejects values that would
    /// move the index backwards.
    pub fn sync_index(&mut self, index: u32) -> bool {
        if self.role.is_coordinator() {
            return false;
        }
        if index < self.index {
            log::warn!("Rejecting index sync {} < {}", index, self.index);
            return false;
        }
        self.index = index;
        true
    }

    fn emit(&mut self, signal: DeliverySignal) {
        self.replay(&signal);
        self.signals.push(signal);
    }

    /// Local side effects of a signal, shared by coordinator and observers
    fn replay(&mut self, signal: &DeliverySignal) {
        match signal {
            DeliverySignal::StartMovementSound => self.audio.start(),
            DeliverySignal::StopMovementSound => self.audio.stop(),
            DeliverySignal::SpinUpCue => self.audio.play_spin_up(),
            DeliverySignal::ShipmentSettled { parts, .. } => self.anchored.extend_from_slice(parts),
            DeliverySignal::SpawnShipment { .. } | DeliverySignal::IndexAdvanced { .. } => {}
        }
    }

    fn finish(&mut self) {
        log::info!("All shipments delivered, disabling station");
        self.delivering = false;
        self.step = Step::Finished;
    }

    /// Run phases until one has to wait. Only the first phase gets `dt`;
    /// phases entered during this frame start at zero elapsed time.
    fn advance(&mut self, dt: f32) {
        let mut dt = dt;
        while self.delivering && self.run_step(dt) {
            dt = 0.0;
        }
    }

    fn run_step(&mut self, dt: f32) -> bool {
        let step = std::mem::replace(&mut self.step, Step::Idle);
        let flow = match step {
            Step::Idle | Step::Finished => Flow::Stay(step),

            Step::Positioning { mut ramp, from, to } => {
                let c = ease_in_out(ramp.advance(dt));
                self.ring.transform = Transform::new(
                    from.position.lerp(to.position, c),
                    from.euler.lerp(to.euler, c),
                );
                if ramp.is_done() {
                    self.ring.transform = to;
                    log::info!("Finished moving to drop site {}", self.selection());
                    self.emit(DeliverySignal::StopMovementSound);
                    Flow::Next(Step::FadeWait {
                        remaining: self.tuning.fade_out_duration + FADE_SETTLE_GAP,
                    })
                } else {
                    Flow::Stay(Step::Positioning { ramp, from, to })
                }
            }

            Step::FadeWait { remaining } => {
                let remaining = remaining - dt;
                if remaining > 0.0 {
                    Flow::Stay(Step::FadeWait { remaining })
                } else {
                    log::info!("Increasing rotation speed");
                    self.emit(DeliverySignal::SpinUpCue);
                    Flow::Next(Step::SpinUp {
                        ramp: Ramp::new(self.tuning.rotation_change_duration),
                    })
                }
            }

            Step::SpinUp { mut ramp } => {
                let t = ramp.advance(dt);
                self.set_spin(t);
                if ramp.is_done() {
                    self.set_spin(1.0);
                    log::info!("Activating portal");
                    self.ring.portal_active = true;
                    self.ring.open_finished = false;
                    Flow::Next(Step::Opening { waited: 0.0 })
                } else {
                    Flow::Stay(Step::SpinUp { ramp })
                }
            }

            Step::Opening { waited } => {
                let waited = waited + dt;
                if self.ring.open_finished || self.wait_timed_out(waited, "open") {
                    self.ring.open_finished = true;
                    Flow::Next(Step::SpinDown {
                        ramp: Ramp::new(self.tuning.rotation_change_duration * SPIN_DOWN_FACTOR),
                    })
                } else {
                    Flow::Stay(Step::Opening { waited })
                }
            }

            Step::SpinDown { mut ramp } => {
                let t = ramp.advance(dt);
                self.set_spin(1.0 - t);
                if ramp.is_done() {
                    self.set_spin(0.0);
                    Flow::Next(Step::Cooldown {
                        remaining: self.tuning.cooldown_duration,
                        then: AfterCooldown::Drop,
                    })
                } else {
                    Flow::Stay(Step::SpinDown { ramp })
                }
            }

            Step::Cooldown { remaining, then } => {
                let remaining = remaining - dt;
                if remaining > 0.0 {
                    Flow::Stay(Step::Cooldown { remaining, then })
                } else {
                    match then {
                        AfterCooldown::Drop => Flow::Next(self.begin_drop()),
                        AfterCooldown::Close => {
                            log::info!("Closing portal");
                            self.ring.portal_active = false;
                            self.ring.close_finished = false;
                            Flow::Next(Step::Closing { waited: 0.0 })
                        }
                    }
                }
            }

            Step::Dropping {
                shipment,
                pending,
                settled,
            } => {
                if pending.is_empty() {
                    log::info!("Shipment {} dropped, {} parts anchored", shipment, settled.len());
                    self.emit(DeliverySignal::ShipmentSettled {
                        shipment,
                        parts: settled,
                    });
                    Flow::Next(Step::Cooldown {
                        remaining: self.tuning.cooldown_duration,
                        then: AfterCooldown::Close,
                    })
                } else {
                    Flow::Stay(Step::Dropping {
                        shipment,
                        pending,
                        settled,
                    })
                }
            }

            Step::Closing { waited } => {
                let waited = waited + dt;
                if self.ring.close_finished || self.wait_timed_out(waited, "close") {
                    self.ring.close_finished = true;
                    log::info!("Tilting the station");
                    let from = self.ring.transform.euler;
                    let max_tilt = self.tuning.max_tilt_angle;
                    let tilt_x = self.rng.random::<f32>() * max_tilt;
                    let tilt_z = self.rng.random::<f32>() * max_tilt;
                    Flow::Next(Step::Tilting {
                        ramp: Ramp::new(self.tuning.tilt_change_duration),
                        from,
                        to: Vec3::new(tilt_x, from.y, tilt_z),
                    })
                } else {
                    Flow::Stay(Step::Closing { waited })
                }
            }

            Step::Tilting { mut ramp, from, to } => {
                let t = ramp.advance(dt);
                self.ring.transform.euler = from.lerp(to, t);
                if ramp.is_done() {
                    self.ring.transform.euler = to;
                    Flow::Next(self.complete_sequence())
                } else {
                    Flow::Stay(Step::Tilting { ramp, from, to })
                }
            }
        };

        match flow {
            Flow::Stay(step) => {
                self.step = step;
                false
            }
            Flow::Next(step) => {
                self.step = step;
                true
            }
        }
    }

    /// Outer and inner ring speeds at spin-up progress `t`
    fn set_spin(&mut self, t: f32) {
        let max = self.tuning.max_rotation_speed;
        self.ring.outer_speed = lerp(self.tuning.base_outer_speed, max, t);
        self.ring.inner_speed = lerp(
            self.tuning.base_inner_speed,
            max * self.tuning.inner_speed_factor,
            t,
        );
    }

    fn wait_timed_out(&self, waited: f32, what: &str) -> bool {
        match self.tuning.animation_timeout {
            Some(limit) if waited >= limit => {
                log::warn!("Portal {} animation never reported after {:.1}s, forcing ahead", what, waited);
                true
            }
            _ => false,
        }
    }

    fn begin_drop(&mut self) -> Step {
        let slot = self.selection();
        let shipment = &self.shipments[slot];
        let id = shipment.id;
        let pending: BTreeSet<ObjectId> = shipment.parts.iter().copied().collect();
        if pending.is_empty() {
            log::warn!("Shipment {} has no parts, nothing to wait for", id);
        }

        log::info!("Spawning and dropping shipment {}", id);
        self.emit(DeliverySignal::SpawnShipment {
            index: self.index,
            shipment: id,
            site: self.drop_sites[slot],
        });
        Step::Dropping {
            shipment: id,
            pending,
            settled: Vec::new(),
        }
    }

    fn complete_sequence(&mut self) -> Step {
        self.index += 1;
        self.delivering = false;
        log::info!("Delivery sequence completed, index now {}", self.index);
        self.emit(DeliverySignal::IndexAdvanced { index: self.index });

        if self.index as usize >= self.delivery_count() {
            log::info!("All shipments delivered, disabling station");
            Step::Finished
        } else {
            Step::Idle
        }
    }
}
