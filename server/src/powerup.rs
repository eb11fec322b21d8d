//! Pickups that appear on random cells and upgrade whoever steps on them
//!
//! A powerup spawns with a per-tick probability, sits on the board for a
//! random number of ticks and is consumed by the first player on its cell.

use crate::entity::{EffectKind, Player};
use crate::projectile::Weapon;
use rand::Rng;
use std::ops::RangeInclusive;

/// Health added by a health pickup. Health has no upper bound.
pub const HEALTH_BONUS: i32 = 25;
/// Default probability that a powerup spawns on a given tick.
pub const SPAWN_CHANCE: f64 = 0.01;
/// Ticks a powerup stays on the board before it disappears.
pub const TTL_RANGE: RangeInclusive<i32> = 100..=200;

/// What a pickup does to the player who collects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerupKind {
    Health,
    HomingMissile,
    BigBullet,
    Lazer,
    ExplosiveBullet,
    Haste,
}

impl PowerupKind {
    pub const ALL: [PowerupKind; 6] = [
        PowerupKind::Health,
        PowerupKind::HomingMissile,
        PowerupKind::BigBullet,
        PowerupKind::Lazer,
        PowerupKind::ExplosiveBullet,
        PowerupKind::Haste,
    ];

    /// Uniform pick over [`PowerupKind::ALL`].
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }

    pub fn glyph(self) -> char {
        match self {
            PowerupKind::Health => '♥',
            PowerupKind::HomingMissile => '⌾',
            PowerupKind::BigBullet => '●',
            PowerupKind::Lazer => '/',
            PowerupKind::ExplosiveBullet => '✢',
            PowerupKind::Haste => '»',
        }
    }

    /// Terminal color index; 0 means the default color.
    pub fn color(self) -> u8 {
        match self {
            PowerupKind::Health => 197,
            PowerupKind::HomingMissile => 136,
            PowerupKind::Lazer => 204,
            PowerupKind::Haste => 45,
            PowerupKind::BigBullet | PowerupKind::ExplosiveBullet => 0,
        }
    }

    /// Applies the pickup. Weapon pickups replace the current weapon.
    pub fn apply(self, player: &mut Player) {
        match self {
            PowerupKind::Health => player.health += HEALTH_BONUS,
            PowerupKind::HomingMissile => player.weapon = Weapon::HomingMissile,
            PowerupKind::BigBullet => player.weapon = Weapon::BigBullet,
            PowerupKind::Lazer => player.weapon = Weapon::Lazer,
            PowerupKind::ExplosiveBullet => player.weapon = Weapon::ExplosiveBullet,
            PowerupKind::Haste => player.attach_effect(EffectKind::Haste),
        }
    }
}

/// A powerup lying on the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Powerup {
    pub row: i32,
    pub col: i32,
    /// Ticks left before it disappears uncollected.
    pub ttl: i32,
    pub kind: PowerupKind,
}

impl Powerup {
    /// Creates a powerup at a cell with the given lifetime.
    pub fn new(row: i32, col: i32, ttl: i32, kind: PowerupKind) -> Self {
        Self { row, col, ttl, kind }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_health_powerup_exceeds_start_health() {
        let mut player = Player::new("bob", '@', 0, 0);
        PowerupKind::Health.apply(&mut player);
        assert_eq!(player.health, 125);
    }

    #[test]
    fn test_weapon_powerups_swap_weapon() {
        let cases = [
            (PowerupKind::HomingMissile, Weapon::HomingMissile),
            (PowerupKind::BigBullet, Weapon::BigBullet),
            (PowerupKind::Lazer, Weapon::Lazer),
            (PowerupKind::ExplosiveBullet, Weapon::ExplosiveBullet),
        ];

        for (kind, weapon) in cases {
            let mut player = Player::new("bob", '@', 0, 0);
            kind.apply(&mut player);
            assert_eq!(player.weapon, weapon);
        }
    }

    #[test]
    fn test_haste_powerup_attaches_effect() {
        let mut player = Player::new("bob", '@', 0, 0);
        PowerupKind::Haste.apply(&mut player);
        assert_eq!(player.step, 2);
        assert_eq!(player.effects.len(), 1);
    }

    #[test]
    fn test_random_kind_covers_all() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..500 {
            seen.insert(PowerupKind::random(&mut rng).glyph());
        }
        assert_eq!(seen.len(), PowerupKind::ALL.len());
    }
}
