//! Local player prediction and reconciliation against server messages
//!
//! The local player is simulated every tick from local input and rendered
//! immediately. Server messages about the local player correct its state with
//! a fixed precedence: involuntary states (airborne, dead, hit) declared by
//! the server always win, voluntary ones (idle, walk, run) only count as a
//! landing signal. Horizontal position stays client authoritative; it is only
//! pulled toward the server when the two have diverged badly, and then through
//! a decaying visual offset rather than a snap.

use glam::DVec2;
use rand::Rng;
use tracing::{debug, trace};

use super::attack::AttackState;
use super::health::{DamageOutcome, Health};
use super::movement::{LocoOverrides, MovementController, MovementState};
use super::weapon::{ShooterState, Volley, Weapon, WeaponKind};
use super::{InputFrame, LocoState};
use crate::ws::protocol::{DamageReport, StateReport, StateUpdate};

/// How long a hit keeps the player in the hit state
pub const HIT_STUN_MS: u64 = 300;
/// Position drift beyond which the server position is adopted
pub const DIVERGENCE_THRESHOLD: f64 = 256.0;
/// Exponential decay rate of the visual correction offset (1/s)
pub const ERROR_CORRECTION_SPEED: f64 = 10.0;

/// What a local state message changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// Older than an update already applied
    Stale,
    /// Applied; `died` is set when the server declared the death
    Applied { died: bool },
}

/// The locally controlled player
#[derive(Debug, Clone)]
pub struct LocalPlayer {
    id: u32,
    position: DVec2,
    position_error: DVec2,
    facing_right: bool,
    controller: MovementController,
    movement: MovementState,
    attack: AttackState,
    weapon: Weapon,
    health: Health,
    loco: LocoState,
    hit_until: u64,
    fire_held: bool,
    press_latched: bool,
    collidable: bool,
    visible: bool,
    /// Server declared the player airborne; contact alone does not land it
    server_airborne: bool,
    last_server_seq: u64,
}

impl LocalPlayer {
    pub fn new(controller: MovementController) -> Self {
        Self {
            id: 0,
            position: DVec2::ZERO,
            position_error: DVec2::ZERO,
            facing_right: true,
            controller,
            movement: MovementState::new(),
            attack: AttackState::new(),
            weapon: Weapon::new(WeaponKind::default()),
            health: Health::default(),
            loco: LocoState::Idle,
            hit_until: 0,
            fire_held: false,
            press_latched: false,
            collidable: true,
            visible: true,
            server_airborne: false,
            last_server_seq: 0,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Logical (predicted) position
    pub fn position(&self) -> DVec2 {
        self.position
    }

    /// Position to render: prediction plus the decaying correction offset
    pub fn visual_position(&self) -> DVec2 {
        self.position + self.position_error
    }

    pub fn velocity(&self) -> DVec2 {
        self.movement.velocity()
    }

    pub fn facing_right(&self) -> bool {
        self.facing_right
    }

    pub fn grounded(&self) -> bool {
        self.movement.grounded
    }

    pub fn movement(&self) -> &MovementState {
        &self.movement
    }

    pub fn attack(&self) -> &AttackState {
        &self.attack
    }

    pub fn weapon(&self) -> &Weapon {
        &self.weapon
    }

    pub fn health(&self) -> &Health {
        &self.health
    }

    pub fn loco(&self) -> LocoState {
        self.loco
    }

    pub fn is_collidable(&self) -> bool {
        self.collidable
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn last_server_seq(&self) -> u64 {
        self.last_server_seq
    }

    /// Bind the player to the id assigned by the server
    pub fn assign_id(&mut self, id: u32) {
        self.id = id;
        self.last_server_seq = 0;
        self.weapon.on_equip(id);
    }

    /// Swap weapons; runtime counters start fresh and any bout is dropped
    pub fn equip(&mut self, kind: WeaponKind) {
        if self.health.is_dead() || kind == self.weapon.kind() {
            return;
        }
        self.weapon = Weapon::new(kind);
        self.weapon.on_equip(self.id);
        self.attack.reset();
        self.press_latched = false;
        debug!(player_id = self.id, weapon = kind.id(), "Weapon equipped");
    }

    /// Run one prediction step. `grounded` comes from collision detection.
    /// Returns the volley fired this tick, if any.
    pub fn tick<R: Rng + ?Sized>(
        &mut self,
        input: &InputFrame,
        grounded: bool,
        now: u64,
        dt: f64,
        rng: &mut R,
    ) -> Option<Volley> {
        self.position_error *= (-ERROR_CORRECTION_SPEED * dt).exp();
        self.weapon.update(dt);

        if self.health.is_dead() {
            self.loco = LocoState::Die;
            return None;
        }

        if let Some(kind) = input.select {
            self.equip(kind);
        }

        let intent = input.movement;
        if intent.left != intent.right {
            self.facing_right = intent.right;
        }

        // Only a descending player touching ground ends a server-declared airtime
        if self.server_airborne && grounded && self.movement.vy > 0.0 {
            self.server_airborne = false;
        }
        let grounded = grounded && !self.server_airborne;

        self.controller
            .step(&mut self.movement, intent, grounded, now, dt);
        self.position += self.movement.velocity() * dt;

        if input.fire && !self.fire_held {
            self.attack.on_fire_start(now);
            self.press_latched = true;
        } else if !input.fire && self.fire_held {
            self.attack.on_fire_end(now);
        }
        self.fire_held = input.fire;
        self.attack.advance(now);

        let volley = self.fire_weapon(input.fire, now, rng);
        if !self.attack.is_shooting() {
            self.press_latched = false;
        }

        self.loco = self.controller.locomotion(
            &self.movement,
            LocoOverrides {
                dead: false,
                hit: now < self.hit_until,
                shooting: self.attack.is_shooting(),
            },
        );

        volley
    }

    fn fire_weapon<R: Rng + ?Sized>(
        &mut self,
        trigger_held: bool,
        now: u64,
        rng: &mut R,
    ) -> Option<Volley> {
        if !self.attack.ready_to_fire() {
            return None;
        }

        let wants_fire = if self.weapon.kind().is_automatic() {
            trigger_held
        } else {
            self.press_latched
        };
        if !wants_fire {
            return None;
        }

        let shooter = ShooterState {
            id: self.id,
            position: self.position,
            facing_right: self.facing_right,
        };
        let volley = self.weapon.try_fire(&shooter, now, rng)?;
        self.press_latched = false;
        self.movement.knockback += volley.kickback;
        Some(volley)
    }

    /// Apply an authoritative state message about the local player
    pub fn apply_server_state(&mut self, update: &StateUpdate, now: u64) -> Reconciled {
        if update.seq > 0 && update.seq <= self.last_server_seq {
            trace!(seq = update.seq, last = self.last_server_seq, "Stale local state dropped");
            return Reconciled::Stale;
        }
        self.last_server_seq = self.last_server_seq.max(update.seq);

        let mut died = false;
        match LocoState::from_tag(&update.anim) {
            Some(LocoState::Die) => died = self.die(),
            Some(LocoState::Hit) => {
                if self.health.is_alive() {
                    self.hit_until = now + HIT_STUN_MS;
                    self.loco = LocoState::Hit;
                }
            }
            Some(state @ (LocoState::Jump | LocoState::DoubleJump | LocoState::Fall)) => {
                if self.health.is_alive() {
                    self.movement.grounded = false;
                    self.server_airborne = true;
                    self.loco = state;
                }
            }
            Some(LocoState::Idle | LocoState::Walk | LocoState::Run) => {
                // Only meaningful as a landing signal
                let airborne =
                    self.server_airborne || self.loco.is_airborne() || !self.movement.grounded;
                if self.health.is_alive() && airborne {
                    self.server_airborne = false;
                    self.movement.land();
                    self.loco = self.controller.locomotion(
                        &self.movement,
                        LocoOverrides {
                            shooting: self.attack.is_shooting(),
                            ..Default::default()
                        },
                    );
                }
            }
            Some(LocoState::Shooting) | None => {}
        }

        let has_position = update.x != 0.0 || update.y != 0.0;
        if has_position && self.health.is_alive() {
            self.correct_divergence(DVec2::new(update.x, update.y));
        }

        Reconciled::Applied { died }
    }

    /// Adopt the server position when prediction has drifted too far, hiding
    /// the jump behind a visual offset that decays over the next ticks
    fn correct_divergence(&mut self, server_position: DVec2) {
        let error = server_position - self.position;
        if error.length() <= DIVERGENCE_THRESHOLD {
            return;
        }
        debug!(
            player_id = self.id,
            drift = error.length(),
            "Prediction diverged, blending toward server position"
        );
        self.position += error;
        self.position_error -= error;
    }

    /// Apply a damage message addressed to the local player
    pub fn apply_damage(&mut self, report: &DamageReport, now: u64) -> DamageOutcome {
        if self.health.is_dead() {
            return DamageOutcome::Ignored;
        }

        let mut outcome = self.health.apply_damage(report.damage);
        if report.dead && outcome != DamageOutcome::Died {
            self.health.kill();
            outcome = DamageOutcome::Died;
        }

        match outcome {
            DamageOutcome::Died => {
                self.on_death();
            }
            DamageOutcome::Damaged { .. } => {
                self.controller
                    .apply_knockback(&mut self.movement, report.kx, report.ky);
                self.hit_until = now + HIT_STUN_MS;
                self.loco = LocoState::Hit;
            }
            DamageOutcome::Ignored => {
                // Zero damage can still carry a shove
                self.controller
                    .apply_knockback(&mut self.movement, report.kx, report.ky);
            }
        }
        outcome
    }

    /// Force the dead state; returns true on the transition
    pub fn die(&mut self) -> bool {
        if !self.health.kill() {
            return false;
        }
        self.on_death();
        true
    }

    fn on_death(&mut self) {
        self.movement.halt();
        self.attack.reset();
        self.press_latched = false;
        self.hit_until = 0;
        self.server_airborne = false;
        self.collidable = false;
        self.visible = false;
        self.loco = LocoState::Die;
        debug!(player_id = self.id, "Local player died");
    }

    /// Respawn at `position`: the only time the local position is snapped.
    /// Returns true if the player was dead.
    pub fn respawn(&mut self, position: DVec2) -> bool {
        let was_dead = self.health.revive();
        if !was_dead {
            self.health.set_health(self.health.max());
        }

        self.position = position;
        self.position_error = DVec2::ZERO;
        self.movement.halt();
        self.movement.grounded = false;
        self.attack.reset();
        self.weapon.on_equip(self.id);
        self.press_latched = false;
        self.hit_until = 0;
        self.server_airborne = false;
        self.collidable = true;
        self.visible = true;
        self.loco = LocoState::Fall;
        was_dead
    }

    /// Flat-floor contact used when no level geometry is loaded.
    /// Clamps to the floor and reports whether the player stands on it.
    pub fn resolve_floor(&mut self, floor_y: f64) -> bool {
        if self.position.y >= floor_y && self.movement.vy >= 0.0 {
            self.position.y = floor_y;
            true
        } else {
            false
        }
    }

    /// Build the outbound state report
    pub fn state_report(&self, ts: u64, seq: u64) -> StateReport {
        let velocity = self.velocity();
        StateReport {
            x: self.position.x,
            y: self.position.y,
            vx: velocity.x,
            vy: velocity.y,
            facing: self.facing_right,
            on_ground: self.movement.grounded,
            anim: self.loco.as_tag().to_string(),
            phase: if self.attack.is_shooting() {
                self.attack.phase().as_tag().to_string()
            } else {
                String::new()
            },
            ts,
            seq,
        }
    }
}

impl Default for LocalPlayer {
    fn default() -> Self {
        Self::new(MovementController::default())
    }
}
