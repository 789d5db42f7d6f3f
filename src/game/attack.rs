//! Attack phase state machine (raise / hold / lower cadence)
//!
//! Independent of any weapon: it only tells the weapon and animation layers
//! whether the weapon is being raised, held ready, or lowered.

use crate::util::time::elapsed_ms;

/// Weapon raise duration before firing can start
pub const RAISE_MS: u64 = 200;
/// Delay after trigger release before lowering starts
pub const HOLD_MS: u64 = 120;
/// Lowering duration
pub const LOWER_MS: u64 = 400;
/// Re-fire window in which the raise is skipped
pub const SKIP_RAISE_GRACE_MS: u64 = 220;

/// Attack phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttackPhase {
    /// Weapon being raised
    #[default]
    Begin,
    /// Weapon raised, firing loop
    Idle,
    /// Weapon being lowered
    End,
}

impl AttackPhase {
    /// Wire tag
    pub fn as_tag(self) -> &'static str {
        match self {
            AttackPhase::Begin => "begin",
            AttackPhase::Idle => "idle",
            AttackPhase::End => "end",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "begin" => Some(AttackPhase::Begin),
            "idle" => Some(AttackPhase::Idle),
            "end" => Some(AttackPhase::End),
            _ => None,
        }
    }
}

/// Per-entity attack state machine
#[derive(Debug, Clone, Default)]
pub struct AttackState {
    phase: AttackPhase,
    phase_started_at: u64,
    shooting: bool,
    stop_queued: bool,
    released_at: u64,
    /// When the last full cycle returned to Begin
    last_cycle_end: Option<u64>,
}

impl AttackState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> AttackPhase {
        self.phase
    }

    pub fn phase_started_at(&self) -> u64 {
        self.phase_started_at
    }

    pub fn is_shooting(&self) -> bool {
        self.shooting
    }

    pub fn stop_queued(&self) -> bool {
        self.stop_queued
    }

    /// Weapon is raised and may fire
    pub fn ready_to_fire(&self) -> bool {
        self.shooting && self.phase == AttackPhase::Idle
    }

    /// Fire intent pressed
    pub fn on_fire_start(&mut self, now: u64) {
        self.stop_queued = false;

        if !self.shooting {
            self.shooting = true;
            let recently_lowered = self
                .last_cycle_end
                .is_some_and(|at| elapsed_ms(now, at) <= SKIP_RAISE_GRACE_MS);
            if recently_lowered {
                self.enter(AttackPhase::Idle, now);
            } else {
                self.enter(AttackPhase::Begin, now);
            }
            return;
        }

        if self.phase == AttackPhase::End {
            if elapsed_ms(now, self.phase_started_at) <= SKIP_RAISE_GRACE_MS {
                self.enter(AttackPhase::Idle, now);
            } else {
                self.enter(AttackPhase::Begin, now);
            }
        }
    }

    /// Fire intent released
    pub fn on_fire_end(&mut self, now: u64) {
        if self.shooting && !self.stop_queued {
            self.stop_queued = true;
            self.released_at = now;
        }
    }

    /// Advance timers; performs at most one transition per call
    pub fn advance(&mut self, now: u64) {
        if !self.shooting {
            return;
        }

        let in_phase = elapsed_ms(now, self.phase_started_at);
        match self.phase {
            AttackPhase::Begin => {
                if in_phase >= RAISE_MS {
                    self.enter(AttackPhase::Idle, now);
                }
            }
            AttackPhase::Idle => {
                if self.stop_queued && elapsed_ms(now, self.released_at) >= HOLD_MS {
                    self.enter(AttackPhase::End, now);
                }
            }
            AttackPhase::End => {
                if in_phase >= LOWER_MS {
                    self.shooting = false;
                    self.stop_queued = false;
                    self.last_cycle_end = Some(now);
                    self.enter(AttackPhase::Begin, now);
                }
            }
        }
    }

    /// Drop any bout in progress (death, respawn)
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn enter(&mut self, phase: AttackPhase, now: u64) {
        self.phase = phase;
        self.phase_started_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_cycle() {
        let mut attack = AttackState::new();
        attack.on_fire_start(1000);
        assert!(attack.is_shooting());
        assert_eq!(attack.phase(), AttackPhase::Begin);

        attack.advance(1000 + RAISE_MS - 1);
        assert_eq!(attack.phase(), AttackPhase::Begin);
        attack.advance(1000 + RAISE_MS);
        assert_eq!(attack.phase(), AttackPhase::Idle);
        assert!(attack.ready_to_fire());

        // Held trigger keeps looping in Idle
        attack.advance(5000);
        assert_eq!(attack.phase(), AttackPhase::Idle);

        attack.on_fire_end(5000);
        attack.advance(5000 + HOLD_MS - 1);
        assert_eq!(attack.phase(), AttackPhase::Idle);
        attack.advance(5000 + HOLD_MS);
        assert_eq!(attack.phase(), AttackPhase::End);

        let end_start = 5000 + HOLD_MS;
        attack.advance(end_start + LOWER_MS - 1);
        assert!(attack.is_shooting());
        attack.advance(end_start + LOWER_MS);
        assert_eq!(attack.phase(), AttackPhase::Begin);
        assert!(!attack.is_shooting());
        assert!(!attack.stop_queued());
    }

    #[test]
    fn one_transition_per_advance() {
        let mut attack = AttackState::new();
        attack.on_fire_start(0);
        attack.on_fire_end(10);
        // Long stall: raise, hold and lower are all overdue
        attack.advance(2000);
        assert_eq!(attack.phase(), AttackPhase::Idle);
        attack.advance(2000);
        assert_eq!(attack.phase(), AttackPhase::End);
    }

    #[test]
    fn refire_during_end_skips_raise() {
        let mut attack = AttackState::new();
        attack.on_fire_start(0);
        attack.advance(RAISE_MS);
        attack.on_fire_end(300);
        attack.advance(300 + HOLD_MS);
        assert_eq!(attack.phase(), AttackPhase::End);

        attack.on_fire_start(300 + HOLD_MS + 100);
        assert_eq!(attack.phase(), AttackPhase::Idle);
        assert!(!attack.stop_queued());
    }

    #[test]
    fn refire_late_in_end_raises_again() {
        let mut attack = AttackState::new();
        attack.on_fire_start(0);
        attack.advance(RAISE_MS);
        attack.on_fire_end(300);
        let end_start = 300 + HOLD_MS;
        attack.advance(end_start);

        attack.on_fire_start(end_start + SKIP_RAISE_GRACE_MS + 50);
        assert_eq!(attack.phase(), AttackPhase::Begin);
    }

    #[test]
    fn refire_right_after_cycle_skips_raise() {
        let mut attack = AttackState::new();
        attack.on_fire_start(0);
        attack.advance(RAISE_MS);
        attack.on_fire_end(RAISE_MS);
        attack.advance(RAISE_MS + HOLD_MS);
        let done = RAISE_MS + HOLD_MS + LOWER_MS;
        attack.advance(done);
        assert!(!attack.is_shooting());

        attack.on_fire_start(done + 100);
        assert_eq!(attack.phase(), AttackPhase::Idle);

        let mut attack = AttackState::new();
        attack.on_fire_start(0);
        attack.advance(RAISE_MS);
        attack.on_fire_end(RAISE_MS);
        attack.advance(RAISE_MS + HOLD_MS);
        attack.advance(done);
        attack.on_fire_start(done + SKIP_RAISE_GRACE_MS + 1);
        assert_eq!(attack.phase(), AttackPhase::Begin);
    }

    #[test]
    fn press_cancels_queued_stop() {
        let mut attack = AttackState::new();
        attack.on_fire_start(0);
        attack.advance(RAISE_MS);
        attack.on_fire_end(250);
        attack.on_fire_start(300);
        attack.advance(1000);
        assert_eq!(attack.phase(), AttackPhase::Idle);
    }

    #[test]
    fn reset_clears_bout() {
        let mut attack = AttackState::new();
        attack.on_fire_start(0);
        attack.advance(RAISE_MS);
        attack.reset();
        assert_eq!(attack.phase(), AttackPhase::Begin);
        assert!(!attack.is_shooting());
    }
}
