//! Authoritative board state and the per-tick simulation
//!
//! Everything here is owned by the game loop and touched only from it. One
//! call to [`GameState::update`] advances the board by exactly one tick:
//! powerup spawn, projectile pass, powerup pass, deaths and status effects,
//! then the win check. Both entity passes walk a snapshot of the live list
//! and rebuild it afterwards, so each entity is handled exactly once per tick.

use crate::entity::{Direction, Player};
use crate::powerup::{self, Powerup, PowerupKind};
use crate::projectile::Projectile;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{keys, Cell};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

pub const INITIAL_STATUS: &str = "What a game :)";

/// Wall-clock rate limits for player actions.
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    pub move_interval: Duration,
    /// Fire interval of the base bullet; other weapons scale it.
    pub fire_interval: Duration,
}

impl Timing {
    pub fn from_tick(tick_interval: Duration) -> Self {
        Self {
            move_interval: tick_interval,
            fire_interval: tick_interval * 2,
        }
    }
}

/// How a finished game ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Winner(String),
    /// Nobody is left on the board.
    Draw,
}

impl Outcome {
    /// Name sent in the `endgame` message.
    pub fn winner_name(&self) -> &str {
        match self {
            Outcome::Winner(name) => name,
            Outcome::Draw => "",
        }
    }
}

/// What happened during one tick.
#[derive(Debug, Default)]
pub struct TickReport {
    pub hits: Vec<String>,
    pub pickups: Vec<String>,
    pub deaths: Vec<String>,
    pub outcome: Option<Outcome>,
}

/// Drawable state pushed to clients after each tick.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub cells: Vec<Cell>,
    pub health: BTreeMap<String, i32>,
    pub status: String,
}

/// The authoritative board: every live entity plus the status line.
///
/// Coordinates are `(row, col)` with `(0, 0)` in the top-left corner. Rows grow
/// downwards, so firing up decreases the row.
#[derive(Debug, Clone)]
pub struct GameState {
    /// Number of completed calls to [`GameState::update`].
    pub tick: u64,
    pub rows: i32,
    pub cols: i32,
    /// Admission order. Homing target ties and snapshot order follow it.
    pub players: Vec<Player>,
    /// Spawn order.
    pub projectiles: Vec<Projectile>,
    /// Spawn order.
    pub powerups: Vec<Powerup>,
    /// Last notable event, shown to every client.
    pub status: String,
    timing: Timing,
    powerup_chance: f64,
    end_on_last_player: bool,
    rng: StdRng,
}

impl GameState {
    /// Creates an empty board.
    ///
    /// Action cooldowns are derived from `tick_interval`. A `seed` makes
    /// powerup spawns reproducible; `None` seeds from the OS.
    pub fn new(rows: i32, cols: i32, tick_interval: Duration, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            tick: 0,
            rows,
            cols,
            players: Vec::new(),
            projectiles: Vec::new(),
            powerups: Vec::new(),
            status: INITIAL_STATUS.to_string(),
            timing: Timing::from_tick(tick_interval),
            powerup_chance: powerup::SPAWN_CHANCE,
            end_on_last_player: true,
            rng,
        }
    }

    /// Cooldowns in effect on this board.
    pub fn timing(&self) -> Timing {
        self.timing
    }

    /// Overrides the per-tick powerup spawn probability (clamped to `[0, 1]`).
    pub fn set_powerup_chance(&mut self, chance: f64) {
        self.powerup_chance = chance.clamp(0.0, 1.0);
    }

    /// With `false`, a lone survivor keeps playing and only an empty board ends the game.
    pub fn set_end_on_last_player(&mut self, enabled: bool) {
        self.end_on_last_player = enabled;
    }

    /// Whether a cell lies on the board.
    pub fn in_bounds(&self, row: i32, col: i32) -> bool {
        (0..self.rows).contains(&row) && (0..self.cols).contains(&col)
    }

    /// Places a player on the board with full health and the base weapon.
    ///
    /// Validation happens at admission; names are assumed unique here.
    pub fn add_player(&mut self, name: &str, glyph: char, row: i32, col: i32) {
        info!("Added player {} '{}' at ({}, {})", name, glyph, row, col);
        self.players.push(Player::new(name, glyph, row, col));
    }

    /// Takes a player off the board, returning it if it was there.
    pub fn remove_player(&mut self, name: &str) -> Option<Player> {
        let index = self.players.iter().position(|p| p.name == name)?;
        info!("Removed player {}", name);
        Some(self.players.remove(index))
    }

    /// Looks up a player still on the board.
    pub fn player(&self, name: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.name == name)
    }

    /// Mutable lookup by name.
    pub fn player_mut(&mut self, name: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.name == name)
    }

    /// Subtracts health directly. Death is resolved on the next tick.
    pub fn apply_damage(&mut self, name: &str, amount: i32) {
        if let Some(player) = self.player_mut(name) {
            player.health -= amount;
        }
    }

    /// Marks a player whose connection failed; the next tick removes it.
    pub fn mark_disconnected(&mut self, name: &str) {
        if let Some(player) = self.player_mut(name) {
            player.health = 0;
        }
        self.status = format!("{} disconnected", name);
    }

    /// Applies one keypress. Returns whether the board changed.
    ///
    /// Cooldowns, out-of-bounds moves and unknown key codes are all silent no-ops.
    pub fn player_action(&mut self, name: &str, key: i32, now: Instant) -> bool {
        match key {
            keys::MOVE_UP => self.try_move(name, Direction::Up, now),
            keys::MOVE_DOWN => self.try_move(name, Direction::Down, now),
            keys::MOVE_LEFT => self.try_move(name, Direction::Left, now),
            keys::MOVE_RIGHT => self.try_move(name, Direction::Right, now),
            keys::FIRE_UP => self.try_fire(name, Direction::Up, now),
            keys::FIRE_DOWN => self.try_fire(name, Direction::Down, now),
            keys::FIRE_LEFT => self.try_fire(name, Direction::Left, now),
            keys::FIRE_RIGHT => self.try_fire(name, Direction::Right, now),
            _ => {
                debug!("Ignoring key {} from {}", key, name);
                false
            }
        }
    }

    fn try_move(&mut self, name: &str, direction: Direction, now: Instant) -> bool {
        let (rows, cols) = (self.rows, self.cols);
        let interval = self.timing.move_interval;
        let Some(player) = self.player_mut(name) else {
            return false;
        };
        if !player.can_move(now, interval) {
            return false;
        }

        let (dr, dc) = direction.delta();
        let row = player.row + dr * player.step;
        let col = player.col + dc * player.step;
        if !(0..rows).contains(&row) || !(0..cols).contains(&col) {
            return false;
        }

        player.row = row;
        player.col = col;
        player.last_move = Some(now);
        debug!("{} moved to ({}, {})", name, row, col);
        true
    }

    fn try_fire(&mut self, name: &str, direction: Direction, now: Instant) -> bool {
        let Some(player) = self.player(name) else {
            return false;
        };
        if !player.can_shoot(now, player.weapon.interval(self.timing.fire_interval)) {
            return false;
        }

        let (dr, dc) = direction.delta();
        let shots = player.weapon.fire(
            name,
            player.row + dr,
            player.col + dc,
            direction,
            &self.players,
        );
        self.projectiles.extend(shots);

        if let Some(player) = self.player_mut(name) {
            player.last_shot = Some(now);
        }
        true
    }

    /// Advances the board by one tick.
    pub fn update(&mut self) -> TickReport {
        let mut report = TickReport::default();
        self.tick += 1;

        self.spawn_powerup();
        self.advance_projectiles(&mut report);
        self.collect_powerups(&mut report);
        self.resolve_deaths(&mut report);

        for player in &mut self.players {
            player.step_effects();
        }

        report.outcome = self.outcome();
        match &report.outcome {
            Some(Outcome::Winner(name)) => self.status = format!("{} is the winner!", name),
            Some(Outcome::Draw) => self.status = "Nobody survived".to_string(),
            None => {}
        }
        report
    }

    /// The game is over once at most one player is left.
    pub fn outcome(&self) -> Option<Outcome> {
        match self.players.as_slice() {
            [] => Some(Outcome::Draw),
            [last] if self.end_on_last_player => Some(Outcome::Winner(last.name.clone())),
            _ => None,
        }
    }

    fn spawn_powerup(&mut self) {
        if !self.rng.gen_bool(self.powerup_chance) {
            return;
        }

        let row = self.rng.gen_range(0..self.rows);
        let col = self.rng.gen_range(0..self.cols);
        let ttl = self.rng.gen_range(powerup::TTL_RANGE);
        let kind = PowerupKind::random(&mut self.rng);
        debug!("Spawned {:?} powerup at ({}, {})", kind, row, col);
        self.powerups.push(Powerup::new(row, col, ttl, kind));
    }

    fn advance_projectiles(&mut self, report: &mut TickReport) {
        let mut live = Vec::with_capacity(self.projectiles.len());
        let mut spawned = Vec::new();

        for mut projectile in std::mem::take(&mut self.projectiles) {
            spawned.extend(projectile.advance(&self.players, self.rows, self.cols));

            if !self.in_bounds(projectile.row, projectile.col) {
                continue;
            }

            let (row, col) = (projectile.row, projectile.col);
            if let Some(victim) = self.players.iter_mut().find(|p| p.is_at(row, col)) {
                victim.health -= projectile.damage();
                self.status = format!("{} was hit by a projectile!", victim.name);
                report.hits.push(victim.name.clone());
                continue;
            }

            if projectile.ttl > 0 {
                live.push(projectile);
            }
        }

        live.extend(spawned);
        self.projectiles = live;
    }

    fn collect_powerups(&mut self, report: &mut TickReport) {
        let mut live = Vec::with_capacity(self.powerups.len());

        for mut powerup in std::mem::take(&mut self.powerups) {
            powerup.ttl -= 1;

            let (row, col) = (powerup.row, powerup.col);
            if let Some(player) = self.players.iter_mut().find(|p| p.is_at(row, col)) {
                powerup.kind.apply(player);
                self.status = format!("{} picked up a powerup!", player.name);
                report.pickups.push(player.name.clone());
                continue;
            }

            if powerup.ttl > 0 {
                live.push(powerup);
            }
        }

        self.powerups = live;
    }

    fn resolve_deaths(&mut self, report: &mut TickReport) {
        let (dead, alive): (Vec<Player>, Vec<Player>) = std::mem::take(&mut self.players)
            .into_iter()
            .partition(Player::is_dead);
        self.players = alive;

        for player in dead {
            info!("{} died", player.name);
            self.status = format!("{} died!!!!", player.name);
            report.deaths.push(player.name);
        }
    }

    /// Players first, then projectiles, then powerups.
    pub fn snapshot(&self) -> Snapshot {
        let players = self
            .players
            .iter()
            .map(|p| Cell(p.row, p.col, p.glyph, 0));
        let projectiles = self
            .projectiles
            .iter()
            .map(|p| Cell(p.row, p.col, p.glyph(), p.color()));
        let powerups = self
            .powerups
            .iter()
            .map(|p| Cell(p.row, p.col, p.kind.glyph(), p.kind.color()));

        Snapshot {
            cells: players.chain(projectiles).chain(powerups).collect(),
            health: self
                .players
                .iter()
                .map(|p| (p.name.clone(), p.health))
                .collect(),
            status: self.status.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EffectKind;
    use crate::projectile::{ProjectileKind, Weapon, BULLET_TTL, EXPLOSION_MAX_RADIUS};

    const TICK: Duration = Duration::from_millis(80);

    fn quiet_game() -> GameState {
        let mut game = GameState::new(30, 80, TICK, Some(1));
        game.set_powerup_chance(0.0);
        game
    }

    fn duel() -> GameState {
        let mut game = quiet_game();
        game.add_player("alice", '@', 20, 10);
        game.add_player("bob", '#', 20, 60);
        game
    }

    #[test]
    fn test_game_creation() {
        let game = quiet_game();
        assert_eq!(game.tick, 0);
        assert!(game.players.is_empty());
        assert_eq!(game.status, INITIAL_STATUS);
        assert_eq!(game.timing().fire_interval, TICK * 2);
    }

    #[test]
    fn test_move_throttled_by_interval() {
        let mut game = duel();
        let now = Instant::now();

        assert!(game.player_action("alice", keys::MOVE_UP, now));
        assert!(!game.player_action("alice", keys::MOVE_UP, now + TICK / 2));
        assert_eq!(game.player("alice").unwrap().row, 19);

        assert!(game.player_action("alice", keys::MOVE_UP, now + TICK));
        assert_eq!(game.player("alice").unwrap().row, 18);
    }

    #[test]
    fn test_move_out_of_bounds_rejected() {
        let mut game = quiet_game();
        game.add_player("alice", '@', 0, 79);
        let now = Instant::now();

        assert!(!game.player_action("alice", keys::MOVE_UP, now));
        assert!(!game.player_action("alice", keys::MOVE_RIGHT, now));
        let alice = game.player("alice").unwrap();
        assert!(alice.is_at(0, 79));
        assert!(alice.last_move.is_none());
    }

    #[test]
    fn test_hasted_move_covers_two_cells() {
        let mut game = duel();
        game.player_mut("alice").unwrap().attach_effect(EffectKind::Haste);

        assert!(game.player_action("alice", keys::MOVE_LEFT, Instant::now()));
        assert_eq!(game.player("alice").unwrap().col, 8);
    }

    #[test]
    fn test_fresh_player_acts_without_waiting() {
        let mut game = duel();
        let now = Instant::now();

        // Cooldowns start at the first action, not at spawn
        assert!(game.player_action("alice", keys::FIRE_UP, now));
        assert!(game.player_action("alice", keys::MOVE_DOWN, now));
        assert_eq!(game.projectiles.len(), 1);
        assert_eq!(game.player("alice").unwrap().row, 21);
    }

    #[test]
    fn test_unknown_key_ignored() {
        let mut game = duel();
        assert!(!game.player_action("alice", 42, Instant::now()));
        assert!(!game.player_action("nobody", keys::MOVE_UP, Instant::now()));
        assert!(game.player("alice").unwrap().is_at(20, 10));
    }

    #[test]
    fn test_fire_rate_limited_per_weapon() {
        let mut game = duel();
        let now = Instant::now();

        assert!(game.player_action("alice", keys::FIRE_UP, now));
        assert!(!game.player_action("alice", keys::FIRE_UP, now + TICK));
        assert!(game.player_action("alice", keys::FIRE_UP, now + TICK * 2));
        assert_eq!(game.projectiles.len(), 2);

        let bullet = &game.projectiles[0];
        assert_eq!((bullet.row, bullet.col), (19, 10));
        assert_eq!(bullet.owner, "alice");
    }

    #[test]
    fn test_lazer_fire_adds_three_beams_not_lazer() {
        let mut game = duel();
        game.player_mut("alice").unwrap().weapon = Weapon::Lazer;

        assert!(game.player_action("alice", keys::FIRE_RIGHT, Instant::now()));
        assert_eq!(game.projectiles.len(), 3);
        assert!(game
            .projectiles
            .iter()
            .all(|p| p.kind == ProjectileKind::SingleLaser));
    }

    #[test]
    fn test_bullet_leaves_through_top_boundary() {
        let mut game = quiet_game();
        game.add_player("alice", '@', 25, 5);
        game.add_player("bob", '#', 25, 70);
        game.projectiles.push(Projectile::new(
            "alice",
            10,
            40,
            Direction::Up,
            BULLET_TTL,
            ProjectileKind::Bullet,
        ));

        for _ in 0..10 {
            game.update();
        }
        assert_eq!(game.projectiles.len(), 1);
        assert_eq!(game.projectiles[0].row, 0);

        game.update();
        assert!(game.projectiles.is_empty());
    }

    #[test]
    fn test_projectile_hit_damages_and_is_removed() {
        let mut game = duel();
        game.projectiles.push(Projectile::new(
            "alice",
            20,
            58,
            Direction::Right,
            BULLET_TTL,
            ProjectileKind::Bullet,
        ));

        game.update();
        assert_eq!(game.player("bob").unwrap().health, 100);
        assert_eq!(game.projectiles.len(), 1);

        let report = game.update();
        assert_eq!(game.player("bob").unwrap().health, 90);
        assert!(game.projectiles.is_empty());
        assert_eq!(report.hits, vec!["bob".to_string()]);
        assert_eq!(game.status, "bob was hit by a projectile!");
    }

    #[test]
    fn test_expiring_laser_still_hits() {
        let mut game = duel();
        game.projectiles.push(Projectile::new(
            "alice",
            20,
            58,
            Direction::Right,
            1,
            ProjectileKind::SingleLaser,
        ));

        game.update();
        assert_eq!(game.player("bob").unwrap().health, 97);
        assert!(game.projectiles.is_empty());
    }

    #[test]
    fn test_every_expired_entity_removed_exactly_once() {
        let mut game = duel();
        // Adjacent entities that all expire on the same tick
        for col in 30..35 {
            game.projectiles.push(Projectile::new(
                "alice",
                5,
                col,
                Direction::None,
                1,
                ProjectileKind::StaticBullet,
            ));
            game.powerups.push(Powerup::new(6, col, 1, PowerupKind::Health));
        }
        game.projectiles.push(Projectile::new(
            "alice",
            7,
            30,
            Direction::None,
            5,
            ProjectileKind::StaticBullet,
        ));

        game.update();
        assert_eq!(game.projectiles.len(), 1);
        assert_eq!(game.projectiles[0].ttl, 4);
        assert!(game.powerups.is_empty());
    }

    #[test]
    fn test_adjacent_hits_each_processed() {
        let mut game = quiet_game();
        game.add_player("alice", '@', 10, 10);
        game.add_player("bob", '#', 10, 11);
        game.add_player("carol", '$', 10, 12);
        for col in 10..13 {
            game.projectiles.push(Projectile::new(
                "dave",
                10,
                col,
                Direction::None,
                3,
                ProjectileKind::StaticBullet,
            ));
        }

        let report = game.update();
        assert_eq!(report.hits.len(), 3);
        assert!(game.projectiles.is_empty());
        assert!(game.players.iter().all(|p| p.health == 90));
    }

    #[test]
    fn test_powerup_pickup_applies_effect() {
        let mut game = duel();
        game.powerups
            .push(Powerup::new(20, 10, 50, PowerupKind::ExplosiveBullet));

        let report = game.update();
        assert!(game.powerups.is_empty());
        assert_eq!(game.player("alice").unwrap().weapon, Weapon::ExplosiveBullet);
        assert_eq!(report.pickups, vec!["alice".to_string()]);
        assert_eq!(game.status, "alice picked up a powerup!");
    }

    #[test]
    fn test_powerup_expires() {
        let mut game = duel();
        game.powerups.push(Powerup::new(0, 0, 2, PowerupKind::Health));

        game.update();
        assert_eq!(game.powerups.len(), 1);
        game.update();
        assert!(game.powerups.is_empty());
    }

    #[test]
    fn test_powerups_spawn_when_certain() {
        let mut game = quiet_game();
        game.set_powerup_chance(1.0);

        game.update();
        assert_eq!(game.powerups.len(), 1);
        let spawned = &game.powerups[0];
        assert!(game.in_bounds(spawned.row, spawned.col));
        assert!(powerup::TTL_RANGE.contains(&(spawned.ttl + 1)));
    }

    #[test]
    fn test_death_removes_player_once_and_names_winner() {
        let mut game = quiet_game();
        game.add_player("alice", '@', 5, 5);
        game.add_player("bob", '#', 6, 6);
        game.add_player("carol", '$', 7, 7);

        game.apply_damage("carol", 150);
        let report = game.update();
        assert_eq!(report.deaths, vec!["carol".to_string()]);
        assert_eq!(game.players.len(), 2);
        assert_eq!(game.status, "carol died!!!!");
        assert!(report.outcome.is_none());

        game.apply_damage("bob", 100);
        let report = game.update();
        assert_eq!(report.deaths, vec!["bob".to_string()]);
        assert_eq!(report.outcome, Some(Outcome::Winner("alice".to_string())));
        assert_eq!(game.status, "alice is the winner!");
    }

    #[test]
    fn test_last_players_dying_together_is_a_draw() {
        let mut game = duel();
        game.apply_damage("alice", 100);
        game.apply_damage("bob", 100);

        let report = game.update();
        assert_eq!(report.outcome, Some(Outcome::Draw));
        assert_eq!(report.outcome.unwrap().winner_name(), "");
        assert_eq!(game.status, "Nobody survived");
    }

    #[test]
    fn test_lone_survivor_keeps_playing_when_configured() {
        let mut game = duel();
        game.set_end_on_last_player(false);
        game.apply_damage("bob", 100);

        let report = game.update();
        assert!(report.outcome.is_none());
        assert_eq!(game.status, "bob died!!!!");

        game.apply_damage("alice", 100);
        assert_eq!(game.update().outcome, Some(Outcome::Draw));
    }

    #[test]
    fn test_disconnect_zeroes_health() {
        let mut game = duel();
        game.mark_disconnected("bob");
        assert_eq!(game.player("bob").unwrap().health, 0);
        assert_eq!(game.status, "bob disconnected");

        let report = game.update();
        assert_eq!(report.deaths, vec!["bob".to_string()]);
        assert_eq!(report.outcome, Some(Outcome::Winner("alice".to_string())));
    }

    #[test]
    fn test_homing_target_fixed_at_spawn() {
        let mut game = quiet_game();
        game.add_player("alice", '@', 10, 10);
        game.add_player("bob", '#', 10, 20);
        game.add_player("carol", '$', 25, 70);
        game.player_mut("alice").unwrap().weapon = Weapon::HomingMissile;

        assert!(game.player_action("alice", keys::FIRE_RIGHT, Instant::now()));
        assert_eq!(game.projectiles[0].target(), Some("bob"));

        // Move bob far away and carol right next to the missile
        let bob = game.player_mut("bob").unwrap();
        bob.row = 29;
        bob.col = 79;
        let carol = game.player_mut("carol").unwrap();
        carol.row = 10;
        carol.col = 13;

        game.update();
        let missile = &game.projectiles[0];
        assert_eq!(missile.target(), Some("bob"));
        assert_eq!((missile.row, missile.col), (11, 11));
    }

    #[test]
    fn test_explosion_fragment_count_matches_ring() {
        let mut game = duel();
        let mut shell = Projectile::new(
            "alice",
            15,
            40,
            Direction::Up,
            EXPLOSION_MAX_RADIUS,
            ProjectileKind::ExplosiveBullet {
                max_radius: EXPLOSION_MAX_RADIUS,
            },
        );
        // Radius 2 ring next tick
        shell.ttl = EXPLOSION_MAX_RADIUS - 2;
        game.projectiles.push(shell);

        game.update();
        let fragments = game
            .projectiles
            .iter()
            .filter(|p| p.kind == ProjectileKind::StaticBullet)
            .count();
        assert_eq!(fragments, 16);
    }

    #[test]
    fn test_effects_step_each_tick() {
        let mut game = duel();
        game.player_mut("alice").unwrap().attach_effect(EffectKind::Haste);

        for _ in 0..EffectKind::Haste.duration() {
            game.update();
        }
        let alice = game.player("alice").unwrap();
        assert_eq!(alice.step, 1);
        assert!(alice.effects.is_empty());
    }

    #[test]
    fn test_snapshot_order_and_health() {
        let mut game = duel();
        game.projectiles.push(Projectile::new(
            "alice",
            1,
            1,
            Direction::Down,
            5,
            ProjectileKind::BigBullet,
        ));
        game.powerups.push(Powerup::new(2, 2, 9, PowerupKind::Lazer));

        let snapshot = game.snapshot();
        assert_eq!(
            snapshot.cells,
            vec![
                Cell(20, 10, '@', 0),
                Cell(20, 60, '#', 0),
                Cell(1, 1, '●', 0),
                Cell(2, 2, '/', 204),
            ]
        );
        assert_eq!(snapshot.health.get("alice"), Some(&100));
        assert_eq!(snapshot.health.len(), 2);
        assert_eq!(snapshot.status, INITIAL_STATUS);
    }
}
