//! Hit points, death and revive

/// Default maximum health of a player
pub const DEFAULT_MAX_HEALTH: i32 = 300;

/// Result of applying damage, the owner runs side effects on `Died`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageOutcome {
    /// Dead already, or a non-positive amount
    Ignored,
    /// Health reduced, still alive
    Damaged { remaining: i32 },
    /// This hit was fatal; reported exactly once
    Died,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Health {
    current: i32,
    max: i32,
    dead: bool,
}

impl Health {
    pub fn new(max: i32) -> Self {
        let max = max.max(1);
        Self {
            current: max,
            max,
            dead: false,
        }
    }

    pub fn current(&self) -> i32 {
        self.current
    }

    pub fn max(&self) -> i32 {
        self.max
    }

    pub fn is_dead(&self) -> bool {
        self.dead
    }

    pub fn is_alive(&self) -> bool {
        !self.dead
    }

    /// Subtract damage, flooring at zero
    pub fn apply_damage(&mut self, amount: i32) -> DamageOutcome {
        if self.dead || amount <= 0 {
            return DamageOutcome::Ignored;
        }

        self.current = (self.current - amount).max(0);
        if self.current == 0 {
            self.dead = true;
            DamageOutcome::Died
        } else {
            DamageOutcome::Damaged {
                remaining: self.current,
            }
        }
    }

    /// Force the dead state (server declared the death). Returns true on the
    /// transition, false if already dead.
    pub fn kill(&mut self) -> bool {
        if self.dead {
            return false;
        }
        self.current = 0;
        self.dead = true;
        true
    }

    /// Leave the dead state with full health. No-op while alive.
    pub fn revive(&mut self) -> bool {
        if !self.dead {
            return false;
        }
        self.current = self.max;
        self.dead = false;
        true
    }

    /// Authoritative override, ignored while dead. Never kills on its own.
    pub fn set_health(&mut self, value: i32) {
        if self.dead {
            return;
        }
        self.current = value.clamp(0, self.max);
    }
}

impl Default for Health {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HEALTH)
    }
}
