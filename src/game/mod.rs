//! Game simulation modules

pub mod attack;
pub mod health;
pub mod movement;
pub mod prediction;
pub mod remote;
pub mod session;
pub mod weapon;

pub use attack::{AttackPhase, AttackState};
pub use health::{DamageOutcome, Health};
pub use movement::{MoveIntent, MovementController, MovementState, MovementStats};
pub use prediction::LocalPlayer;
pub use remote::{RemoteEntity, RemoteWorld, StateApply};
pub use session::{GameSession, SessionEvent, Tracer};
pub use weapon::{ShotDescriptor, Volley, Weapon, WeaponKind, WeaponStats};

/// Locomotion/animation state shown for a player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocoState {
    #[default]
    Idle,
    Walk,
    Run,
    Jump,
    DoubleJump,
    Fall,
    Shooting,
    Hit,
    Die,
}

impl LocoState {
    /// Wire tag used in the `anim` field
    pub fn as_tag(self) -> &'static str {
        match self {
            LocoState::Idle => "idle",
            LocoState::Walk => "walk",
            LocoState::Run => "run",
            LocoState::Jump => "jump",
            LocoState::DoubleJump => "double_jump",
            LocoState::Fall => "fall",
            LocoState::Shooting => "shooting",
            LocoState::Hit => "hit",
            LocoState::Die => "die",
        }
    }

    /// Parse a wire tag; unknown or empty tags carry no information
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "idle" => Some(LocoState::Idle),
            "walk" => Some(LocoState::Walk),
            "run" => Some(LocoState::Run),
            "jump" => Some(LocoState::Jump),
            "double_jump" => Some(LocoState::DoubleJump),
            "fall" => Some(LocoState::Fall),
            "shooting" => Some(LocoState::Shooting),
            "hit" => Some(LocoState::Hit),
            "die" | "dead" => Some(LocoState::Die),
            _ => None,
        }
    }

    pub fn is_airborne(self) -> bool {
        matches!(self, LocoState::Jump | LocoState::DoubleJump | LocoState::Fall)
    }
}

/// Player input for one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputFrame {
    pub movement: MoveIntent,
    /// Fire button held
    pub fire: bool,
    /// Weapon requested this frame, if any
    pub select: Option<WeaponKind>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loco_tags_round_trip() {
        for state in [
            LocoState::Idle,
            LocoState::Walk,
            LocoState::Run,
            LocoState::Jump,
            LocoState::DoubleJump,
            LocoState::Fall,
            LocoState::Shooting,
            LocoState::Hit,
            LocoState::Die,
        ] {
            assert_eq!(LocoState::from_tag(state.as_tag()), Some(state));
        }
        assert_eq!(LocoState::from_tag(""), None);
        assert_eq!(LocoState::from_tag("DEAD"), Some(LocoState::Die));
    }
}
