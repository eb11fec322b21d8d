//! Players, directions and status effects

use crate::projectile::Weapon;
use std::time::{Duration, Instant};

pub const START_HEALTH: i32 = 100;

/// Travel direction on the board. Rows grow downward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    None,
}

impl Direction {
    /// `(row, col)` offset of one step.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (-1, 0),
            Direction::Down => (1, 0),
            Direction::Left => (0, -1),
            Direction::Right => (0, 1),
            Direction::None => (0, 0),
        }
    }

    pub fn is_vertical(self) -> bool {
        matches!(self, Direction::Up | Direction::Down)
    }
}

/// Timed modifier attached to a player by a powerup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectKind {
    /// Doubles the movement step while active.
    Haste,
}

impl EffectKind {
    pub fn duration(self) -> i32 {
        match self {
            EffectKind::Haste => 60,
        }
    }

    fn start(self, player: &mut Player) {
        match self {
            EffectKind::Haste => player.step *= 2,
        }
    }

    fn end(self, player: &mut Player) {
        match self {
            EffectKind::Haste => player.step = (player.step / 2).max(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEffect {
    pub kind: EffectKind,
    pub ttl: i32,
}

/// A player on the board
#[derive(Debug, Clone)]
pub struct Player {
    pub name: String,
    pub glyph: char,
    pub row: i32,
    pub col: i32,
    /// Removed from the board at zero or below. No upper bound.
    pub health: i32,
    pub weapon: Weapon,
    /// Time of the last accepted move. `None` until the first one, so a
    /// fresh player is never throttled.
    pub last_move: Option<Instant>,
    /// Time of the last accepted shot, same convention as `last_move`.
    pub last_shot: Option<Instant>,
    /// Cells covered by one move.
    pub step: i32,
    pub effects: Vec<StatusEffect>,
}

impl Player {
    pub fn new(name: impl Into<String>, glyph: char, row: i32, col: i32) -> Self {
        Self {
            name: name.into(),
            glyph,
            row,
            col,
            health: START_HEALTH,
            weapon: Weapon::default(),
            last_move: None,
            last_shot: None,
            step: 1,
            effects: Vec::new(),
        }
    }

    pub fn is_at(&self, row: i32, col: i32) -> bool {
        self.row == row && self.col == col
    }

    pub fn is_dead(&self) -> bool {
        self.health <= 0
    }

    pub fn can_move(&self, now: Instant, interval: Duration) -> bool {
        cooled_down(self.last_move, now, interval)
    }

    pub fn can_shoot(&self, now: Instant, interval: Duration) -> bool {
        cooled_down(self.last_shot, now, interval)
    }

    /// Applies the effect's start side effect and tracks it until expiry.
    pub fn attach_effect(&mut self, kind: EffectKind) {
        kind.start(self);
        self.effects.push(StatusEffect {
            kind,
            ttl: kind.duration(),
        });
    }

    /// Ages every active effect by one tick, reversing and dropping expired ones.
    pub fn step_effects(&mut self) {
        let effects = std::mem::take(&mut self.effects);
        for mut effect in effects {
            effect.ttl -= 1;
            if effect.ttl <= 0 {
                effect.kind.end(self);
            } else {
                self.effects.push(effect);
            }
        }
    }
}

fn cooled_down(last: Option<Instant>, now: Instant, interval: Duration) -> bool {
    last.map_or(true, |at| now.saturating_duration_since(at) >= interval)
}
