//! Horizontal locomotion, jumping and knockback for the locally controlled player

use glam::DVec2;

use super::LocoState;
use crate::util::time::elapsed_ms;

/// Jumps available between two landings (ground jump + one air jump)
pub const MAX_JUMPS: u8 = 2;

/// Movement tuning constants
#[derive(Debug, Clone, Copy)]
pub struct MovementStats {
    /// Walking speed (px/s)
    pub walk_speed: f64,
    /// Running speed after a double tap (px/s)
    pub run_speed: f64,
    /// Acceleration toward the target speed while grounded (px/s²)
    pub ground_accel: f64,
    /// Acceleration toward the target speed while airborne (px/s²)
    pub air_accel: f64,
    /// Extra per-tick multiplier applied when grounded with no horizontal intent
    pub ground_decay: f64,
    /// Speeds below this snap to zero when stopping on the ground
    pub stop_epsilon: f64,
    /// Linear knockback decay (px/s per second)
    pub knockback_decay: f64,
    /// Initial upward speed of the ground jump
    pub jump_speed: f64,
    /// Initial upward speed of the air jump
    pub double_jump_speed: f64,
    /// Downward acceleration while airborne (px/s²)
    pub gravity: f64,
    /// Terminal fall speed
    pub max_fall_speed: f64,
    /// Two presses of the same direction within this window start running
    pub double_tap_window_ms: u64,
    /// Horizontal speed under which a grounded player displays idle
    pub walk_threshold: f64,
}

impl Default for MovementStats {
    fn default() -> Self {
        Self {
            walk_speed: 240.0,
            run_speed: 400.0,
            ground_accel: 6000.0,
            air_accel: 900.0,
            ground_decay: 0.75,
            stop_epsilon: 2.0,
            knockback_decay: 1500.0,
            jump_speed: 620.0,
            double_jump_speed: 540.0,
            gravity: 1800.0,
            max_fall_speed: 1200.0,
            double_tap_window_ms: 200,
            walk_threshold: 10.0,
        }
    }
}

/// Horizontal direction of a movement intent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

/// Raw movement intents for one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoveIntent {
    pub left: bool,
    pub right: bool,
    /// Jump pressed this frame (edge, not level)
    pub jump: bool,
}

/// Mutable movement state of one player
#[derive(Debug, Clone, Default)]
pub struct MovementState {
    /// Input-driven horizontal velocity, knockback excluded
    pub move_vx: f64,
    /// Vertical velocity (negative is up)
    pub vy: f64,
    /// Additive horizontal knockback
    pub knockback: f64,
    pub grounded: bool,
    pub jump_count: u8,
    pub running: bool,
    held_left: bool,
    held_right: bool,
    last_tap: Option<(Direction, u64)>,
}

impl MovementState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Combined velocity (input + knockback)
    pub fn velocity(&self) -> DVec2 {
        DVec2::new(self.move_vx + self.knockback, self.vy)
    }

    /// Clear all motion, used on death and respawn
    pub fn halt(&mut self) {
        self.move_vx = 0.0;
        self.vy = 0.0;
        self.knockback = 0.0;
        self.running = false;
        self.jump_count = 0;
    }

    /// Mark the player as landed (server landing signal)
    pub fn land(&mut self) {
        self.grounded = true;
        self.jump_count = 0;
        if self.vy > 0.0 {
            self.vy = 0.0;
        }
    }
}

/// Flags that override the movement-derived locomotion state
#[derive(Debug, Clone, Copy, Default)]
pub struct LocoOverrides {
    pub dead: bool,
    pub hit: bool,
    pub shooting: bool,
}

/// Movement controller for the locally predicted player
#[derive(Debug, Clone, Default)]
pub struct MovementController {
    stats: MovementStats,
}

impl MovementController {
    pub fn new(stats: MovementStats) -> Self {
        Self { stats }
    }

    pub fn stats(&self) -> &MovementStats {
        &self.stats
    }

    /// Advance one tick. `grounded` comes from collision detection.
    /// Returns true when a jump was performed this tick.
    pub fn step(
        &self,
        state: &mut MovementState,
        intent: MoveIntent,
        grounded: bool,
        now: u64,
        dt: f64,
    ) -> bool {
        // A rising player has not landed, whatever the contact test says
        let grounded = grounded && state.vy >= 0.0;
        if grounded && !state.grounded {
            state.jump_count = 0;
        }
        state.grounded = grounded;

        self.track_taps(state, intent, now);

        let target = self.target_velocity(state, intent);
        let accel = if grounded {
            self.stats.ground_accel
        } else {
            self.stats.air_accel
        };
        state.move_vx = approach(state.move_vx, target, accel * dt);

        if grounded && target == 0.0 {
            state.move_vx *= self.stats.ground_decay;
            if state.move_vx.abs() < self.stats.stop_epsilon {
                state.move_vx = 0.0;
            }
        }

        state.knockback = approach(state.knockback, 0.0, self.stats.knockback_decay * dt);

        let jumped = intent.jump && self.try_jump(state);

        if state.grounded && state.vy >= 0.0 {
            state.vy = 0.0;
        } else if !jumped {
            state.vy = (state.vy + self.stats.gravity * dt).min(self.stats.max_fall_speed);
        }

        jumped
    }

    /// Signed target horizontal speed for the current intents
    pub fn target_velocity(&self, state: &MovementState, intent: MoveIntent) -> f64 {
        let speed = if state.running {
            self.stats.run_speed
        } else {
            self.stats.walk_speed
        };
        match (intent.left, intent.right) {
            (true, false) => -speed,
            (false, true) => speed,
            _ => 0.0,
        }
    }

    /// Consume one jump if the budget allows, otherwise leave the state untouched
    pub fn try_jump(&self, state: &mut MovementState) -> bool {
        if state.jump_count >= MAX_JUMPS {
            return false;
        }

        if state.grounded && state.jump_count == 0 {
            state.vy = -self.stats.jump_speed;
            state.jump_count = 1;
        } else {
            // Walking off a ledge forfeits the ground jump
            state.vy = -self.stats.double_jump_speed;
            state.jump_count = MAX_JUMPS;
        }
        state.grounded = false;
        true
    }

    /// Apply a knockback impulse: horizontal part decays over time,
    /// vertical part is added to the current vertical speed once.
    pub fn apply_knockback(&self, state: &mut MovementState, kx: f64, ky: f64) {
        state.knockback += kx;
        if ky != 0.0 {
            state.vy += ky;
            if ky < 0.0 {
                state.grounded = false;
            }
        }
    }

    /// Locomotion state shown for the player
    pub fn locomotion(&self, state: &MovementState, overrides: LocoOverrides) -> LocoState {
        if overrides.dead {
            return LocoState::Die;
        }
        if overrides.hit {
            return LocoState::Hit;
        }
        if overrides.shooting {
            return LocoState::Shooting;
        }

        if !state.grounded {
            return if state.vy < 0.0 {
                if state.jump_count >= MAX_JUMPS {
                    LocoState::DoubleJump
                } else {
                    LocoState::Jump
                }
            } else {
                LocoState::Fall
            };
        }

        if state.velocity().x.abs() < self.stats.walk_threshold {
            LocoState::Idle
        } else if state.running {
            LocoState::Run
        } else {
            LocoState::Walk
        }
    }

    fn track_taps(&self, state: &mut MovementState, intent: MoveIntent, now: u64) {
        let pressed = if intent.left && !state.held_left {
            Some(Direction::Left)
        } else if intent.right && !state.held_right {
            Some(Direction::Right)
        } else {
            None
        };

        if let Some(direction) = pressed {
            let double_tap = matches!(
                state.last_tap,
                Some((last, at)) if last == direction
                    && elapsed_ms(now, at) <= self.stats.double_tap_window_ms
            );
            if double_tap {
                state.running = true;
                state.last_tap = None;
            } else {
                state.last_tap = Some((direction, now));
            }
        }

        if !intent.left && !intent.right {
            state.running = false;
        }

        state.held_left = intent.left;
        state.held_right = intent.right;
    }
}

/// Move `current` toward `target` by at most `max_delta`
fn approach(current: f64, target: f64, max_delta: f64) -> f64 {
    if current < target {
        (current + max_delta).min(target)
    } else {
        (current - max_delta).max(target)
    }
}
