//! Weapons and the projectiles they put on the board
//!
//! [`Weapon`] is what a player holds and fires; [`ProjectileKind`] is what
//! actually travels. Most weapons fire a single projectile of the matching
//! kind. The Lazer never exists on the board itself: firing it emits three
//! single-tick laser beams. Detonating explosive bullets leave stationary
//! fragments behind them.

use crate::entity::{Direction, Player};
use std::time::Duration;

pub const BULLET_TTL: i32 = 20;
pub const BIG_BULLET_TTL: i32 = 10;
pub const LASER_TTL: i32 = 1;
pub const LAZER_BEAMS: i32 = 3;
pub const EXPLOSIVE_TTL: i32 = 15;
pub const EXPLOSION_MAX_RADIUS: i32 = 4;
pub const FRAGMENT_TTL: i32 = 2;
pub const HOMING_TTL: i32 = 20;

/// Weapon a player has equipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Weapon {
    #[default]
    Bullet,
    BigBullet,
    Lazer,
    ExplosiveBullet,
    HomingMissile,
}

impl Weapon {
    /// Minimum wall-clock time between two shots, relative to the base fire interval.
    pub fn interval(self, base: Duration) -> Duration {
        match self {
            Weapon::Bullet => base,
            Weapon::BigBullet => base.mul_f64(1.1),
            Weapon::Lazer => base.mul_f64(0.5),
            Weapon::ExplosiveBullet => base * 2,
            Weapon::HomingMissile => base.mul_f64(1.5),
        }
    }

    /// Builds the projectiles for one shot fired from `(row, col)`.
    ///
    /// `players` is consulted only by the homing missile, which picks its
    /// target here and never again.
    pub fn fire(
        self,
        owner: &str,
        row: i32,
        col: i32,
        direction: Direction,
        players: &[Player],
    ) -> Vec<Projectile> {
        let single = |kind, ttl| vec![Projectile::new(owner, row, col, direction, ttl, kind)];

        match self {
            Weapon::Bullet => single(ProjectileKind::Bullet, BULLET_TTL),
            Weapon::BigBullet => single(ProjectileKind::BigBullet, BIG_BULLET_TTL),
            Weapon::ExplosiveBullet => single(
                ProjectileKind::ExplosiveBullet {
                    max_radius: EXPLOSION_MAX_RADIUS,
                },
                EXPLOSIVE_TTL,
            ),
            Weapon::HomingMissile => single(
                ProjectileKind::HomingMissile {
                    target: acquire_target(owner, row, col, players),
                    row_first: true,
                },
                HOMING_TTL,
            ),
            Weapon::Lazer => {
                let (dr, dc) = direction.delta();
                (0..LAZER_BEAMS)
                    .map(|i| {
                        Projectile::new(
                            owner,
                            row + dr * i,
                            col + dc * i,
                            direction,
                            LASER_TTL,
                            ProjectileKind::SingleLaser,
                        )
                    })
                    .collect()
            }
        }
    }
}

/// Nearest other player by Manhattan distance; the first one found wins ties.
fn acquire_target(owner: &str, row: i32, col: i32, players: &[Player]) -> Option<String> {
    let mut best: Option<(&Player, i32)> = None;
    for player in players.iter().filter(|p| p.name != owner) {
        let distance = (player.row - row).abs() + (player.col - col).abs();
        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((player, distance));
        }
    }
    best.map(|(player, _)| player.name.clone())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectileKind {
    Bullet,
    BigBullet,
    /// Zero-velocity bullet left behind by an explosion.
    StaticBullet,
    /// Double-speed beam emitted by the Lazer.
    SingleLaser,
    /// Travels until its ttl drops to `max_radius`, then detonates in place.
    ExplosiveBullet { max_radius: i32 },
    /// Chases the player named at spawn, alternating row and column steps.
    HomingMissile {
        target: Option<String>,
        row_first: bool,
    },
}

impl ProjectileKind {
    pub fn damage(&self) -> i32 {
        match self {
            ProjectileKind::Bullet | ProjectileKind::StaticBullet => 10,
            ProjectileKind::BigBullet => 20,
            ProjectileKind::SingleLaser => 3,
            ProjectileKind::ExplosiveBullet { .. } => 15,
            ProjectileKind::HomingMissile { .. } => 5,
        }
    }

    pub fn color(&self) -> u8 {
        match self {
            ProjectileKind::SingleLaser => 204,
            ProjectileKind::HomingMissile { .. } => 136,
            _ => 0,
        }
    }

    /// Cells covered per tick.
    pub fn speed(&self) -> i32 {
        match self {
            ProjectileKind::StaticBullet => 0,
            ProjectileKind::SingleLaser => 2,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projectile {
    /// Name of the player who fired it. The owner may no longer be on the board.
    pub owner: String,
    pub row: i32,
    pub col: i32,
    pub direction: Direction,
    pub ttl: i32,
    pub kind: ProjectileKind,
}

impl Projectile {
    pub fn new(
        owner: impl Into<String>,
        row: i32,
        col: i32,
        direction: Direction,
        ttl: i32,
        kind: ProjectileKind,
    ) -> Self {
        Self {
            owner: owner.into(),
            row,
            col,
            direction,
            ttl,
            kind,
        }
    }

    pub fn damage(&self) -> i32 {
        self.kind.damage()
    }

    pub fn color(&self) -> u8 {
        self.kind.color()
    }

    pub fn glyph(&self) -> char {
        match &self.kind {
            ProjectileKind::Bullet | ProjectileKind::StaticBullet => '·',
            ProjectileKind::BigBullet => '●',
            ProjectileKind::SingleLaser if self.direction.is_vertical() => '│',
            ProjectileKind::SingleLaser => '─',
            ProjectileKind::ExplosiveBullet { max_radius } if self.ttl > *max_radius => {
                match self.direction {
                    Direction::Up => '▵',
                    Direction::Down => '▿',
                    Direction::Left => '◃',
                    Direction::Right | Direction::None => '▹',
                }
            }
            ProjectileKind::ExplosiveBullet { .. } => '◌',
            ProjectileKind::HomingMissile { .. } => '☼',
        }
    }

    /// Name of the homing target, if this is a homing missile that locked one.
    pub fn target(&self) -> Option<&str> {
        match &self.kind {
            ProjectileKind::HomingMissile { target, .. } => target.as_deref(),
            _ => None,
        }
    }

    /// Moves one tick and ages the projectile.
    ///
    /// Returns projectiles spawned by this step (explosion fragments), which
    /// the caller adds to the board after the current pass.
    pub fn advance(&mut self, players: &[Player], rows: i32, cols: i32) -> Vec<Projectile> {
        let mut spawned = Vec::new();

        match &mut self.kind {
            ProjectileKind::HomingMissile { target, row_first } => {
                let target_cell = target
                    .as_deref()
                    .and_then(|name| players.iter().find(|p| p.name == name))
                    .map(|p| (p.row, p.col));

                match target_cell {
                    Some((row, col)) => {
                        let moved = if *row_first {
                            step_toward(&mut self.row, row) || step_toward(&mut self.col, col)
                        } else {
                            step_toward(&mut self.col, col) || step_toward(&mut self.row, row)
                        };
                        if moved {
                            *row_first = !*row_first;
                        }
                    }
                    None => translate(&mut self.row, &mut self.col, self.direction, 1),
                }
            }
            ProjectileKind::ExplosiveBullet { max_radius } => {
                let max_radius = *max_radius;
                if self.ttl > max_radius {
                    translate(&mut self.row, &mut self.col, self.direction, 1);
                } else {
                    spawned = self.detonate(max_radius - self.ttl, rows, cols);
                }
            }
            kind => {
                let speed = kind.speed();
                translate(&mut self.row, &mut self.col, self.direction, speed);
            }
        }

        self.ttl -= 1;
        spawned
    }

    /// Fragments on the perimeter of the square ring of half-width `radius`.
    fn detonate(&self, radius: i32, rows: i32, cols: i32) -> Vec<Projectile> {
        let mut fragments = Vec::new();
        let mut place = |row: i32, col: i32| {
            if (0..rows).contains(&row) && (0..cols).contains(&col) {
                fragments.push(Projectile::new(
                    self.owner.clone(),
                    row,
                    col,
                    Direction::None,
                    FRAGMENT_TTL,
                    ProjectileKind::StaticBullet,
                ));
            }
        };

        for i in -radius..=radius {
            if i.abs() == radius {
                for j in -radius..=radius {
                    place(self.row + i, self.col + j);
                }
            } else {
                place(self.row + i, self.col - radius);
                place(self.row + i, self.col + radius);
            }
        }
        fragments
    }
}

fn translate(row: &mut i32, col: &mut i32, direction: Direction, speed: i32) {
    let (dr, dc) = direction.delta();
    *row += dr * speed;
    *col += dc * speed;
}

fn step_toward(value: &mut i32, goal: i32) -> bool {
    match (*value).cmp(&goal) {
        std::cmp::Ordering::Less => *value += 1,
        std::cmp::Ordering::Greater => *value -= 1,
        std::cmp::Ordering::Equal => return false,
    }
    true
}
