//! Remote player interpolation
//!
//! Remote players are never simulated. Each state message replaces the
//! target snapshot wholesale and the rendered position eases toward it every
//! tick. Entities that stop receiving updates are evicted.

use std::collections::HashMap;

use glam::DVec2;
use tracing::{debug, trace};

use super::LocoState;
use crate::util::time::elapsed_ms;
use crate::ws::protocol::StateUpdate;

/// Remotes silent for this long are removed
pub const REMOTE_TIMEOUT_MS: u64 = 5000;
/// Interpolation rate toward the target (1/s)
pub const SMOOTHING_RATE: f64 = 12.0;

const IDLE_SPEED: f64 = 10.0;
const WALK_SPEED: f64 = 300.0;

/// Last authoritative snapshot of a remote player
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotTarget {
    pub position: DVec2,
    pub velocity: DVec2,
    pub facing_right: bool,
    pub on_ground: bool,
    pub anim: String,
    pub phase: String,
}

/// A remote player as seen by this client
#[derive(Debug, Clone)]
pub struct RemoteEntity {
    pub id: u32,
    pub char_id: String,
    pub visible_position: DVec2,
    pub target: SnapshotTarget,
    pub last_seq: u64,
    pub last_update: u64,
    /// No state received yet (joined or respawned placeholder)
    pub placeholder: bool,
    pub hidden: bool,
}

impl RemoteEntity {
    fn new(id: u32, char_id: String, now: u64) -> Self {
        Self {
            id,
            char_id,
            visible_position: DVec2::ZERO,
            target: SnapshotTarget::default(),
            last_seq: 0,
            last_update: now,
            placeholder: true,
            hidden: false,
        }
    }

    /// Locomotion state to display
    pub fn loco(&self) -> LocoState {
        LocoState::from_tag(&self.target.anim).unwrap_or_else(|| derive_loco(self.target.velocity.x))
    }

    pub fn facing_right(&self) -> bool {
        self.target.facing_right
    }

    fn interpolate(&mut self, dt: f64) {
        let blend = (SMOOTHING_RATE * dt).min(1.0);
        self.visible_position += (self.target.position - self.visible_position) * blend;
    }
}

fn derive_loco(vx: f64) -> LocoState {
    let speed = vx.abs();
    if speed < IDLE_SPEED {
        LocoState::Idle
    } else if speed < WALK_SPEED {
        LocoState::Walk
    } else {
        LocoState::Run
    }
}

/// Result of applying a state message to the remote set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateApply {
    /// The id was unknown and has been created
    Spawned,
    Updated,
    /// Older than an update already applied
    Stale,
}

/// All remote players keyed by id
#[derive(Debug, Default)]
pub struct RemoteWorld {
    entities: HashMap<u32, RemoteEntity>,
}

impl RemoteWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a joined player without overwriting a known one.
    /// Returns true if a new entity was created.
    pub fn spawn_placeholder(&mut self, id: u32, char_id: &str, now: u64) -> bool {
        if self.entities.contains_key(&id) {
            return false;
        }
        self.entities
            .insert(id, RemoteEntity::new(id, char_id.to_string(), now));
        true
    }

    /// Apply a state message for a remote id
    pub fn apply_state(&mut self, update: &StateUpdate, now: u64) -> StateApply {
        let mut spawned = false;
        let entity = self.entities.entry(update.id).or_insert_with(|| {
            spawned = true;
            RemoteEntity::new(update.id, update.char_id.clone(), now)
        });

        if update.seq > 0 && update.seq <= entity.last_seq {
            trace!(
                remote_id = update.id,
                seq = update.seq,
                last = entity.last_seq,
                "Stale remote state dropped"
            );
            return StateApply::Stale;
        }

        entity.last_seq = entity.last_seq.max(update.seq);
        entity.last_update = now;
        entity.target = SnapshotTarget {
            position: DVec2::new(update.x, update.y),
            velocity: DVec2::new(update.vx, update.vy),
            facing_right: update.facing,
            on_ground: update.on_ground,
            anim: update.anim.clone(),
            phase: update.phase.clone(),
        };
        if !update.char_id.is_empty() {
            entity.char_id.clone_from(&update.char_id);
        }

        // First snapshot places the entity instead of sliding in from the origin
        if entity.placeholder {
            entity.visible_position = entity.target.position;
            entity.placeholder = false;
        }

        if spawned {
            debug!(remote_id = update.id, "Remote spawned from state");
            StateApply::Spawned
        } else {
            StateApply::Updated
        }
    }

    /// Ease every visible position toward its target
    pub fn update(&mut self, dt: f64) {
        for entity in self.entities.values_mut() {
            entity.interpolate(dt);
        }
    }

    /// Remove entities without an update for `REMOTE_TIMEOUT_MS`; returns their ids
    pub fn evict_stale(&mut self, now: u64) -> Vec<u32> {
        let mut expired: Vec<u32> = self
            .entities
            .values()
            .filter(|e| elapsed_ms(now, e.last_update) >= REMOTE_TIMEOUT_MS)
            .map(|e| e.id)
            .collect();
        expired.sort_unstable();

        for id in &expired {
            self.entities.remove(id);
            debug!(remote_id = id, "Remote timed out");
        }
        expired
    }

    pub fn remove(&mut self, id: u32) -> Option<RemoteEntity> {
        self.entities.remove(&id)
    }

    /// Hide a remote after a fatal hit. Returns false for unknown ids.
    pub fn mark_dead(&mut self, id: u32) -> bool {
        match self.entities.get_mut(&id) {
            Some(entity) => {
                entity.hidden = true;
                true
            }
            None => false,
        }
    }

    /// Recreate or unhide a remote at `position` (snapped)
    pub fn respawn(&mut self, id: u32, position: DVec2, char_id: &str, now: u64) {
        let entity = self
            .entities
            .entry(id)
            .or_insert_with(|| RemoteEntity::new(id, char_id.to_string(), now));
        entity.hidden = false;
        entity.placeholder = false;
        entity.last_update = now;
        entity.visible_position = position;
        entity.target.position = position;
        entity.target.velocity = DVec2::ZERO;
        entity.target.anim.clear();
        entity.target.phase.clear();
        if !char_id.is_empty() {
            entity.char_id = char_id.to_string();
        }
    }

    pub fn get(&self, id: u32) -> Option<&RemoteEntity> {
        self.entities.get(&id)
    }

    pub fn contains(&self, id: u32) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RemoteEntity> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
