//! Weapon model - fire cadence, recoil, spread and shot descriptors
//!
//! Every weapon shares one firing contract; the behavioral differences are a
//! match over [`WeaponKind`] and the stats table in [`WeaponStats::for_kind`].

use std::f64::consts::{PI, TAU};

use glam::DVec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Downward acceleration applied to lobbed projectiles (px/s²)
pub const GRENADE_GRAVITY: f64 = 1200.0;

/// Weapon types available to a player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponKind {
    /// Semi-automatic, recoil and sway
    #[default]
    Pistol,
    /// Fully automatic
    MachineGun,
    /// Several pellets per trigger pull
    Shotgun,
    /// Lobbed projectile with a fuse
    Grenade,
    /// Instant full-range beam
    Railgun,
}

impl WeaponKind {
    pub const ALL: [WeaponKind; 5] = [
        WeaponKind::Pistol,
        WeaponKind::MachineGun,
        WeaponKind::Shotgun,
        WeaponKind::Grenade,
        WeaponKind::Railgun,
    ];

    /// Identifier reported in outbound shot messages
    pub fn id(self) -> &'static str {
        match self {
            WeaponKind::Pistol => "pistol",
            WeaponKind::MachineGun => "machine_gun",
            WeaponKind::Shotgun => "shotgun",
            WeaponKind::Grenade => "grenade",
            WeaponKind::Railgun => "railgun",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.id() == id)
    }

    /// Re-fires every tick while the trigger is held
    pub fn is_automatic(self) -> bool {
        matches!(self, WeaponKind::MachineGun)
    }
}

/// How a shot travels once fired
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Delivery {
    /// Straight bullet with travel time
    Bullet { speed: f64 },
    /// Arcing projectile that expires after `lifetime` seconds
    Lobbed {
        speed: f64,
        /// Launch elevation above horizontal (radians)
        launch_angle: f64,
        lifetime: f64,
    },
    /// Resolved instantly along the whole range
    HitScan,
}

/// Weapon stats per weapon kind
#[derive(Debug, Clone, Copy)]
pub struct WeaponStats {
    pub name: &'static str,
    /// Damage per hit (per pellet for spread weapons)
    pub damage: i32,
    /// Minimum time between shots (seconds)
    pub fire_interval: f64,
    /// Shoot range (px)
    pub range: f64,
    pub delivery: Delivery,
    /// Projectiles per trigger pull
    pub pellets: u32,
    /// Full spread arc for multi-pellet weapons (radians)
    pub spread: f64,
    /// Half-angle of the uniform noise cone (radians)
    pub noise: f64,
    /// Muzzle offset from the shooter when facing right; x mirrors when facing left
    pub muzzle_offset: DVec2,
    /// Recoil added per shot (radians)
    pub recoil_per_shot: f64,
    /// Recoil ceiling (radians)
    pub recoil_max: f64,
    /// Linear recoil recovery (radians per second)
    pub recoil_decay: f64,
    /// Sway amplitude (radians)
    pub sway_amplitude: f64,
    /// Sway frequency (Hz)
    pub sway_frequency: f64,
    /// Horizontal impulse pushed back onto the shooter
    pub kickback: f64,
}

impl WeaponStats {
    pub fn for_kind(kind: WeaponKind) -> Self {
        match kind {
            WeaponKind::Pistol => Self {
                name: "Pistol",
                damage: 20,
                fire_interval: 0.35,
                range: 900.0,
                delivery: Delivery::Bullet { speed: 1400.0 },
                pellets: 1,
                spread: 0.0,
                noise: 0.02,
                muzzle_offset: DVec2::new(28.0, -6.0),
                recoil_per_shot: 0.06,
                recoil_max: 0.3,
                recoil_decay: 0.12,
                sway_amplitude: 0.01,
                sway_frequency: 0.5,
                kickback: 60.0,
            },
            WeaponKind::MachineGun => Self {
                name: "Machine Gun",
                damage: 9,
                fire_interval: 0.08,
                range: 800.0,
                delivery: Delivery::Bullet { speed: 1600.0 },
                pellets: 1,
                spread: 0.0,
                noise: 0.05,
                muzzle_offset: DVec2::new(34.0, -4.0),
                recoil_per_shot: 0.025,
                recoil_max: 0.25,
                recoil_decay: 0.15,
                sway_amplitude: 0.02,
                sway_frequency: 1.0,
                kickback: 15.0,
            },
            WeaponKind::Shotgun => Self {
                name: "Shotgun",
                damage: 12,
                fire_interval: 0.9,
                range: 450.0,
                delivery: Delivery::Bullet { speed: 1200.0 },
                pellets: 6,
                spread: 0.35,
                noise: 0.0,
                muzzle_offset: DVec2::new(32.0, -4.0),
                recoil_per_shot: 0.0,
                recoil_max: 0.0,
                recoil_decay: 0.0,
                sway_amplitude: 0.0,
                sway_frequency: 0.0,
                kickback: 180.0,
            },
            WeaponKind::Grenade => Self {
                name: "Grenade",
                damage: 80,
                fire_interval: 1.5,
                range: 700.0 * 1.6,
                delivery: Delivery::Lobbed {
                    speed: 700.0,
                    launch_angle: 35f64.to_radians(),
                    lifetime: 1.6,
                },
                pellets: 1,
                spread: 0.0,
                noise: 0.0,
                muzzle_offset: DVec2::new(16.0, -20.0),
                recoil_per_shot: 0.0,
                recoil_max: 0.0,
                recoil_decay: 0.0,
                sway_amplitude: 0.0,
                sway_frequency: 0.0,
                kickback: 0.0,
            },
            WeaponKind::Railgun => Self {
                name: "Railgun",
                damage: 150,
                fire_interval: 2.5,
                range: 3000.0,
                delivery: Delivery::HitScan,
                pellets: 1,
                spread: 0.0,
                noise: 0.005,
                muzzle_offset: DVec2::new(40.0, -6.0),
                recoil_per_shot: 0.0,
                recoil_max: 0.0,
                recoil_decay: 0.0,
                sway_amplitude: 0.0,
                sway_frequency: 0.0,
                kickback: 120.0,
            },
        }
    }
}

/// What the weapon needs to know about its shooter
#[derive(Debug, Clone, Copy)]
pub struct ShooterState {
    pub id: u32,
    pub position: DVec2,
    pub facing_right: bool,
}

impl ShooterState {
    fn facing_sign(&self) -> f64 {
        if self.facing_right {
            1.0
        } else {
            -1.0
        }
    }
}

/// One resolved shot, reported to the server for validation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShotDescriptor {
    pub origin: DVec2,
    /// Unit direction
    pub direction: DVec2,
    pub range: f64,
    pub damage: i32,
    pub weapon: WeaponKind,
    pub timestamp: u64,
}

impl ShotDescriptor {
    /// End point of the full-range line
    pub fn end(&self) -> DVec2 {
        self.origin + self.direction * self.range
    }
}

/// Lobbed projectile simulated locally until its fuse runs out
#[derive(Debug, Clone)]
pub struct Grenade {
    pub owner_id: u32,
    pub position: DVec2,
    pub velocity: DVec2,
    pub damage: i32,
    pub age: f64,
    pub lifetime: f64,
}

impl Grenade {
    /// Advance the arc, returns false once expired
    pub fn update(&mut self, dt: f64) -> bool {
        self.velocity.y += GRENADE_GRAVITY * dt;
        self.position += self.velocity * dt;
        self.age += dt;
        self.age < self.lifetime
    }
}

/// Everything produced by one successful trigger pull
#[derive(Debug, Clone)]
pub struct Volley {
    /// The shot sent to the network layer
    pub reported: ShotDescriptor,
    /// Additional pellets, resolved locally only
    pub extra_pellets: Vec<ShotDescriptor>,
    pub grenade: Option<Grenade>,
    /// Signed horizontal impulse for the shooter
    pub kickback: f64,
}

impl Volley {
    /// All shots of the volley, reported one first
    pub fn shots(&self) -> impl Iterator<Item = &ShotDescriptor> {
        std::iter::once(&self.reported).chain(self.extra_pellets.iter())
    }
}

/// An equipped weapon with its runtime counters
#[derive(Debug, Clone)]
pub struct Weapon {
    kind: WeaponKind,
    stats: WeaponStats,
    since_last_shot: f64,
    recoil: f64,
    sway_phase: f64,
    owner_id: Option<u32>,
}

impl Weapon {
    pub fn new(kind: WeaponKind) -> Self {
        let stats = WeaponStats::for_kind(kind);
        Self {
            kind,
            stats,
            since_last_shot: stats.fire_interval,
            recoil: 0.0,
            sway_phase: 0.0,
            owner_id: None,
        }
    }

    pub fn kind(&self) -> WeaponKind {
        self.kind
    }

    pub fn stats(&self) -> &WeaponStats {
        &self.stats
    }

    pub fn owner_id(&self) -> Option<u32> {
        self.owner_id
    }

    pub fn recoil(&self) -> f64 {
        self.recoil
    }

    pub fn since_last_shot(&self) -> f64 {
        self.since_last_shot
    }

    pub fn can_fire(&self) -> bool {
        self.since_last_shot >= self.stats.fire_interval
    }

    /// Bind to a shooter and reset runtime counters; ready to fire at once
    pub fn on_equip(&mut self, shooter_id: u32) {
        self.owner_id = Some(shooter_id);
        self.since_last_shot = self.stats.fire_interval;
        self.recoil = 0.0;
        self.sway_phase = 0.0;
    }

    /// Advance cooldown, recoil recovery and sway; call every tick
    pub fn update(&mut self, dt: f64) {
        self.since_last_shot += dt;
        self.recoil = (self.recoil - self.stats.recoil_decay * dt).max(0.0);
        self.sway_phase = (self.sway_phase + self.stats.sway_frequency * TAU * dt) % TAU;
    }

    /// Fire if the interval has elapsed since the last successful shot
    pub fn try_fire<R: Rng + ?Sized>(
        &mut self,
        shooter: &ShooterState,
        now: u64,
        rng: &mut R,
    ) -> Option<Volley> {
        if !self.can_fire() {
            return None;
        }
        self.since_last_shot = 0.0;

        let sign = shooter.facing_sign();
        let origin = shooter.position
            + DVec2::new(self.stats.muzzle_offset.x * sign, self.stats.muzzle_offset.y);
        let baseline = if shooter.facing_right { 0.0 } else { PI };

        let shot = |direction: DVec2| ShotDescriptor {
            origin,
            direction,
            range: self.stats.range,
            damage: self.stats.damage,
            weapon: self.kind,
            timestamp: now,
        };

        let mut grenade = None;
        let mut extra_pellets = Vec::new();
        let reported = match self.kind {
            WeaponKind::Pistol | WeaponKind::MachineGun => {
                // Recoil raises the muzzle; up is negative y
                let angle = baseline - sign * self.recoil
                    + self.stats.sway_amplitude * self.sway_phase.sin()
                    + jitter(rng, self.stats.noise);
                self.recoil = (self.recoil + self.stats.recoil_per_shot).min(self.stats.recoil_max);
                shot(DVec2::from_angle(angle))
            }
            WeaponKind::Shotgun => {
                let half_arc = self.stats.spread / 2.0;
                let mut pellets = (0..self.stats.pellets.max(1))
                    .map(|_| shot(DVec2::from_angle(baseline + jitter(rng, half_arc))));
                let first = pellets.next()?;
                extra_pellets = pellets.collect();
                first
            }
            WeaponKind::Grenade => {
                let Delivery::Lobbed {
                    speed,
                    launch_angle,
                    lifetime,
                } = self.stats.delivery
                else {
                    return None;
                };
                let direction = DVec2::new(sign * launch_angle.cos(), -launch_angle.sin());
                grenade = Some(Grenade {
                    owner_id: shooter.id,
                    position: origin,
                    velocity: direction * speed,
                    damage: self.stats.damage,
                    age: 0.0,
                    lifetime,
                });
                shot(direction)
            }
            WeaponKind::Railgun => {
                shot(DVec2::from_angle(baseline + jitter(rng, self.stats.noise)))
            }
        };

        Some(Volley {
            reported,
            extra_pellets,
            grenade,
            kickback: -sign * self.stats.kickback,
        })
    }
}

fn jitter<R: Rng + ?Sized>(rng: &mut R, half_width: f64) -> f64 {
    if half_width > 0.0 {
        rng.gen_range(-half_width..=half_width)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn shooter(facing_right: bool) -> ShooterState {
        ShooterState {
            id: 1,
            position: DVec2::new(100.0, 200.0),
            facing_right,
        }
    }

    #[test]
    fn fire_interval_gates_shots() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut weapon = Weapon::new(WeaponKind::Pistol);
        weapon.on_equip(1);
        let interval = weapon.stats().fire_interval;

        assert!(weapon.try_fire(&shooter(true), 0, &mut rng).is_some());
        assert_eq!(weapon.since_last_shot(), 0.0);

        for _ in 0..9 {
            weapon.update(interval / 10.0);
            assert!(weapon.try_fire(&shooter(true), 0, &mut rng).is_none());
        }

        weapon.update(interval / 5.0);
        assert!(weapon.try_fire(&shooter(true), 0, &mut rng).is_some());
        assert_eq!(weapon.since_last_shot(), 0.0);
        assert!(weapon.try_fire(&shooter(true), 0, &mut rng).is_none());
    }

    #[test]
    fn directions_are_unit_and_follow_facing() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for kind in WeaponKind::ALL {
            for facing_right in [true, false] {
                let mut weapon = Weapon::new(kind);
                weapon.on_equip(1);
                let volley = weapon.try_fire(&shooter(facing_right), 5, &mut rng).unwrap();
                for shot in volley.shots() {
                    assert!((shot.direction.length() - 1.0).abs() < 1e-9);
                    assert_eq!(shot.direction.x > 0.0, facing_right, "{kind:?}");
                    assert_eq!(shot.weapon, kind);
                    assert_eq!(shot.timestamp, 5);
                }
            }
        }
    }

    #[test]
    fn recoil_accumulates_clamps_and_decays() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut weapon = Weapon::new(WeaponKind::MachineGun);
        weapon.on_equip(1);
        let stats = *weapon.stats();

        for _ in 0..50 {
            weapon.update(stats.fire_interval);
            weapon.try_fire(&shooter(true), 0, &mut rng);
        }
        assert!((weapon.recoil() - stats.recoil_max).abs() < 1e-9);

        weapon.update(10.0);
        assert_eq!(weapon.recoil(), 0.0);
    }

    #[test]
    fn pistol_kicks_shooter_backwards() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut weapon = Weapon::new(WeaponKind::Pistol);
        weapon.on_equip(1);
        let volley = weapon.try_fire(&shooter(true), 0, &mut rng).unwrap();
        assert!(volley.kickback < 0.0);
        assert!(volley.reported.origin.x > 100.0);
    }

    #[test]
    fn shotgun_reports_only_first_pellet() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut weapon = Weapon::new(WeaponKind::Shotgun);
        weapon.on_equip(1);
        let stats = *weapon.stats();
        let volley = weapon.try_fire(&shooter(true), 0, &mut rng).unwrap();

        assert_eq!(volley.extra_pellets.len() as u32, stats.pellets - 1);
        for shot in volley.shots() {
            assert!(shot.direction.y.atan2(shot.direction.x).abs() <= stats.spread / 2.0 + 1e-9);
        }
    }

    #[test]
    fn grenade_arcs_up_then_falls_and_expires() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut weapon = Weapon::new(WeaponKind::Grenade);
        weapon.on_equip(1);
        let volley = weapon.try_fire(&shooter(false), 0, &mut rng).unwrap();
        assert!(volley.reported.direction.y < 0.0);
        assert!(volley.reported.direction.x < 0.0);

        let mut grenade = volley.grenade.expect("grenade spawned");
        let start_y = grenade.position.y;
        let mut alive_ticks = 0;
        while grenade.update(1.0 / 60.0) {
            alive_ticks += 1;
        }
        assert!(grenade.velocity.y > 0.0);
        assert!(grenade.position.y > start_y - 1000.0);
        assert!((90..=97).contains(&alive_ticks), "{alive_ticks}");
    }

    #[test]
    fn railgun_is_instant_full_range() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut weapon = Weapon::new(WeaponKind::Railgun);
        weapon.on_equip(1);
        let volley = weapon.try_fire(&shooter(true), 0, &mut rng).unwrap();
        assert_eq!(weapon.stats().delivery, Delivery::HitScan);
        assert!(volley.grenade.is_none());
        assert_eq!(volley.reported.range, 3000.0);
        let highest = WeaponKind::ALL
            .into_iter()
            .map(|kind| WeaponStats::for_kind(kind).damage)
            .max();
        assert_eq!(highest, Some(volley.reported.damage));
    }

    #[test]
    fn equip_resets_runtime_state() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut weapon = Weapon::new(WeaponKind::Pistol);
        weapon.on_equip(1);
        weapon.try_fire(&shooter(true), 0, &mut rng);
        assert!(!weapon.can_fire());
        assert!(weapon.recoil() > 0.0);

        weapon.on_equip(2);
        assert!(weapon.can_fire());
        assert_eq!(weapon.recoil(), 0.0);
        assert_eq!(weapon.owner_id(), Some(2));
    }

    #[test]
    fn ids_round_trip() {
        for kind in WeaponKind::ALL {
            assert_eq!(WeaponKind::from_id(kind.id()), Some(kind));
        }
        assert_eq!(WeaponKind::from_id("bazooka"), None);
    }
}
