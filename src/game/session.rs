//! Client game session: one update thread driving prediction, remote
//! interpolation and the outbound cadence from a drained network queue

use glam::DVec2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde_json::Value;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, info, trace, warn};

use super::health::DamageOutcome;
use super::prediction::{LocalPlayer, Reconciled};
use super::remote::{RemoteWorld, StateApply};
use super::weapon::{Grenade, Volley};
use super::InputFrame;
use crate::config::Config;
use crate::util::rate_limit::SendAccumulator;
use crate::util::time::clamp_delta;
use crate::ws::client::{NetEvent, NetLink};
use crate::ws::protocol::{
    ClientMsg, DamageReport, RespawnInfo, ServerMsg, ShotReport, ShotTrace, StateUpdate,
};

/// How long a shot line stays on screen (seconds)
pub const TRACER_LIFETIME: f64 = 0.15;

/// Short-lived visual line for a shot
#[derive(Debug, Clone, PartialEq)]
pub struct Tracer {
    pub owner_id: u32,
    pub origin: DVec2,
    pub end: DVec2,
    pub age: f64,
}

impl Tracer {
    fn update(&mut self, dt: f64) -> bool {
        self.age += dt;
        self.age < TRACER_LIFETIME
    }
}

/// Notifications for the application layer
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Welcomed { id: u32 },
    RemoteJoined { id: u32, char_id: String },
    RemoteLeft { id: u32 },
    RemoteExpired { id: u32 },
    LocalDamaged { amount: i32, remaining: i32 },
    LocalDied,
    LocalRespawned,
    GameOver { results: Value },
    Disconnected,
}

/// Session counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub messages_applied: u64,
    pub stale_dropped: u64,
    pub states_sent: u64,
    pub shots_sent: u64,
}

/// A connected game session
pub struct GameSession {
    link: NetLink,
    connected: bool,
    welcomed: bool,
    server_time_baseline: u64,
    char_id: String,
    local: LocalPlayer,
    remotes: RemoteWorld,
    tracers: Vec<Tracer>,
    grenades: Vec<Grenade>,
    send_gate: SendAccumulator,
    out_seq: u64,
    rng: ChaCha8Rng,
    events: Vec<SessionEvent>,
    game_over: Option<Value>,
    stats: SessionStats,
}

impl GameSession {
    pub fn new(config: &Config, link: NetLink) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        Self {
            link,
            connected: true,
            welcomed: false,
            server_time_baseline: 0,
            char_id: config.char_id.clone(),
            local: LocalPlayer::default(),
            remotes: RemoteWorld::new(),
            tracers: Vec::new(),
            grenades: Vec::new(),
            send_gate: SendAccumulator::new(config.send_rate),
            out_seq: 0,
            rng,
            events: Vec::new(),
            game_over: None,
            stats: SessionStats::default(),
        }
    }

    /// Run one frame. `grounded` is the host's collision result for the
    /// local player, `now` the wall clock in ms, `raw_dt` the frame time in s.
    pub fn tick(&mut self, input: &InputFrame, grounded: bool, now: u64, raw_dt: f64) {
        let dt = clamp_delta(raw_dt);

        self.process_inbound(now);

        if self.welcomed {
            if let Some(volley) = self.local.tick(input, grounded, now, dt, &mut self.rng) {
                self.on_volley(volley, now);
            }
        }

        self.grenades.retain_mut(|g| g.update(dt));
        self.tracers.retain_mut(|t| t.update(dt));

        self.remotes.update(dt);
        for id in self.remotes.evict_stale(now) {
            self.events.push(SessionEvent::RemoteExpired { id });
        }

        if self.send_gate.advance(dt) && self.welcomed {
            self.send_state(now);
        }
    }

    /// Apply every queued network event
    fn process_inbound(&mut self, now: u64) {
        loop {
            match self.link.inbound.try_recv() {
                Ok(NetEvent::Message(msg)) => self.handle_message(msg, now),
                Ok(NetEvent::Closed) => self.mark_closed(),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.mark_closed();
                    break;
                }
            }
        }
    }

    fn handle_message(&mut self, msg: ServerMsg, now: u64) {
        let applied = match msg {
            ServerMsg::Welcome { id, server_time } => {
                self.handle_welcome(id, server_time);
                true
            }
            ServerMsg::JoinBroadcast { id, char_id } => {
                self.handle_join(id, char_id, now);
                true
            }
            ServerMsg::State(update) => self.handle_state(&update, now),
            ServerMsg::Shot(trace) => {
                self.handle_shot(&trace);
                true
            }
            ServerMsg::Damage(report) => {
                self.handle_damage(&report, now);
                true
            }
            ServerMsg::Respawn(info) => {
                self.handle_respawn(&info, now);
                true
            }
            ServerMsg::Leave { id } => {
                if self.remotes.remove(id).is_some() {
                    info!(remote_id = id, "Remote left");
                    self.events.push(SessionEvent::RemoteLeft { id });
                }
                true
            }
            ServerMsg::GameOver { results } => {
                info!("Game over");
                self.game_over = Some(results.clone());
                self.events.push(SessionEvent::GameOver { results });
                true
            }
            ServerMsg::Unknown => {
                trace!("Ignoring unknown message type");
                false
            }
        };
        if applied {
            self.stats.messages_applied += 1;
        }
    }

    fn handle_welcome(&mut self, id: u32, server_time: u64) {
        if self.welcomed && self.local.id() != id {
            warn!(old_id = self.local.id(), new_id = id, "Reassigned local id");
        }
        // A state for our own id may have arrived before the welcome
        self.remotes.remove(id);

        self.local.assign_id(id);
        self.server_time_baseline = server_time;
        self.welcomed = true;
        info!(player_id = id, server_time, "Welcomed by server");
        self.events.push(SessionEvent::Welcomed { id });
    }

    fn is_local(&self, id: u32) -> bool {
        self.welcomed && id == self.local.id()
    }

    fn handle_join(&mut self, id: u32, char_id: String, now: u64) {
        if self.is_local(id) {
            return;
        }
        if self.remotes.spawn_placeholder(id, &char_id, now) {
            info!(remote_id = id, char_id = %char_id, "Remote joined");
            self.events.push(SessionEvent::RemoteJoined { id, char_id });
        }
    }

    /// Returns false when the state was dropped as stale
    fn handle_state(&mut self, update: &StateUpdate, now: u64) -> bool {
        if update.server_time != 0 && update.server_time < self.server_time_baseline {
            trace!(
                id = update.id,
                server_time = update.server_time,
                baseline = self.server_time_baseline,
                "State older than welcome dropped"
            );
            self.stats.stale_dropped += 1;
            return false;
        }

        if self.is_local(update.id) {
            match self.local.apply_server_state(update, now) {
                Reconciled::Stale => {
                    self.stats.stale_dropped += 1;
                    return false;
                }
                Reconciled::Applied { died: true } => self.events.push(SessionEvent::LocalDied),
                Reconciled::Applied { died: false } => {}
            }
            return true;
        }

        match self.remotes.apply_state(update, now) {
            StateApply::Spawned => {
                let char_id = self
                    .remotes
                    .get(update.id)
                    .map(|e| e.char_id.clone())
                    .unwrap_or_default();
                self.events.push(SessionEvent::RemoteJoined {
                    id: update.id,
                    char_id,
                });
            }
            StateApply::Updated => {}
            StateApply::Stale => {
                self.stats.stale_dropped += 1;
                return false;
            }
        }
        true
    }

    fn handle_shot(&mut self, trace: &ShotTrace) {
        // Our own shots were drawn when fired
        if self.is_local(trace.attacker) || !self.remotes.contains(trace.attacker) {
            return;
        }
        let direction = DVec2::new(trace.dx, trace.dy).normalize_or_zero();
        if direction == DVec2::ZERO {
            return;
        }
        let origin = DVec2::new(trace.ox, trace.oy);
        self.tracers.push(Tracer {
            owner_id: trace.attacker,
            origin,
            end: origin + direction * trace.range,
            age: 0.0,
        });
    }

    fn handle_damage(&mut self, report: &DamageReport, now: u64) {
        if self.is_local(report.victim) {
            match self.local.apply_damage(report, now) {
                DamageOutcome::Damaged { remaining } => {
                    debug!(damage = report.damage, remaining, "Local player hit");
                    self.events.push(SessionEvent::LocalDamaged {
                        amount: report.damage,
                        remaining,
                    });
                }
                DamageOutcome::Died => {
                    info!(player_id = report.victim, "Local player killed");
                    self.events.push(SessionEvent::LocalDied);
                }
                DamageOutcome::Ignored => {}
            }
            return;
        }

        if report.dead && self.remotes.mark_dead(report.victim) {
            debug!(remote_id = report.victim, "Remote killed");
        }
    }

    fn handle_respawn(&mut self, info: &RespawnInfo, now: u64) {
        let position = DVec2::new(info.x, info.y);
        if self.is_local(info.id) {
            self.local.respawn(position);
            info!(player_id = info.id, x = info.x, y = info.y, "Local player respawned");
            self.events.push(SessionEvent::LocalRespawned);
        } else {
            self.remotes.respawn(info.id, position, &info.char_id, now);
        }
    }

    fn on_volley(&mut self, volley: Volley, now: u64) {
        let shot = volley.reported;
        let seq = self.next_seq();
        let sent = self.send(ClientMsg::Shot(ShotReport {
            ox: shot.origin.x,
            oy: shot.origin.y,
            dx: shot.direction.x,
            dy: shot.direction.y,
            range: shot.range,
            damage: shot.damage,
            ts: now,
            seq,
            weapon: shot.weapon.id().to_string(),
        }));
        if sent {
            self.stats.shots_sent += 1;
        }

        let owner_id = self.local.id();
        for pellet in volley.shots() {
            self.tracers.push(Tracer {
                owner_id,
                origin: pellet.origin,
                end: pellet.end(),
                age: 0.0,
            });
        }
        if let Some(grenade) = volley.grenade {
            self.grenades.push(grenade);
        }
    }

    fn send_state(&mut self, now: u64) {
        let seq = self.next_seq();
        let report = self.local.state_report(now, seq);
        if self.send(ClientMsg::State(report)) {
            self.stats.states_sent += 1;
        }
    }

    fn next_seq(&mut self) -> u64 {
        self.out_seq += 1;
        self.out_seq
    }

    /// Queue an outbound message; false once the connection is gone
    fn send(&mut self, msg: ClientMsg) -> bool {
        if !self.connected {
            return false;
        }
        if self.link.outbound.send(msg).is_err() {
            self.mark_closed();
            return false;
        }
        true
    }

    fn mark_closed(&mut self) {
        if self.connected {
            self.connected = false;
            info!("Disconnected from server");
            self.events.push(SessionEvent::Disconnected);
        }
    }

    /// Leave the room and stop sending
    pub fn disconnect(&mut self) {
        if self.connected {
            if let Err(e) = self.link.outbound.send(ClientMsg::Leave) {
                debug!(error = %e, "Failed to queue leave message");
            }
        }
        self.mark_closed();
    }

    /// Take the events queued since the last call
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn local(&self) -> &LocalPlayer {
        &self.local
    }

    /// Mutable access for host-side collision resolution
    pub fn local_mut(&mut self) -> &mut LocalPlayer {
        &mut self.local
    }

    pub fn remotes(&self) -> &RemoteWorld {
        &self.remotes
    }

    pub fn tracers(&self) -> &[Tracer] {
        &self.tracers
    }

    pub fn grenades(&self) -> &[Grenade] {
        &self.grenades
    }

    pub fn char_id(&self) -> &str {
        &self.char_id
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_welcomed(&self) -> bool {
        self.welcomed
    }

    pub fn server_time_baseline(&self) -> u64 {
        self.server_time_baseline
    }

    pub fn game_over(&self) -> Option<&Value> {
        self.game_over.as_ref()
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }
}
