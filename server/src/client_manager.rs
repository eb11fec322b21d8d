//! Player roster shared by the acceptor and the game loop
//!
//! This module owns the list of admitted players before and during a game:
//! - Handshake validation, in a fixed rule order, with a named rejection reason
//! - Capacity enforcement and random spawn placement
//! - Handing each admitted connection over to the game loop when play starts
//!
//! The roster is the only state both concurrent units touch. It lives behind a
//! single `tokio::sync::Mutex` (see [`SharedRoster`]) and every method here is
//! synchronous, so the lock is never held across I/O.

use log::info;
use rand::Rng;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Roster handle shared between the acceptor task and the game loop.
pub type SharedRoster<C> = Arc<Mutex<ClientManager<C>>>;

/// Glyphs a player may not use: board decorations and every projectile and powerup glyph.
pub const BANNED_GLYPHS: &[char] = &[
    '|', '-', '+', '/', '\\', '.', '`', '·', '●', '│', '─', '▵', '▿', '◃', '▹', '◌', '☼', '♥',
    '⌾', '✢', '»',
];

/// Spawn cells tried before accepting an occupied one.
const SPAWN_ATTEMPTS: usize = 16;

/// Why a handshake was refused. Checked in declaration order; the first failing rule wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeRejection {
    NameNotAlphanumeric,
    DuplicateName,
    GameStarted,
    InvalidCharacter,
    BannedCharacter,
    DuplicateCharacter,
}

impl HandshakeRejection {
    /// Text sent to the client in `fail_reason`.
    pub fn reason(self) -> &'static str {
        match self {
            HandshakeRejection::NameNotAlphanumeric => "Invalid player name, must be alphanumeric",
            HandshakeRejection::DuplicateName => "Duplicate player name",
            HandshakeRejection::GameStarted => "Game already started",
            HandshakeRejection::InvalidCharacter => {
                "Invalid player character, must be a single character"
            }
            HandshakeRejection::BannedCharacter => "Banned player character",
            HandshakeRejection::DuplicateCharacter => "Duplicate character",
        }
    }
}

impl fmt::Display for HandshakeRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

/// An admitted player and, until the game starts, its connection.
#[derive(Debug)]
pub struct Client<C> {
    /// Alphanumeric, unique ignoring case.
    pub name: String,
    /// Drawn on the board; unique and not a banned glyph.
    pub glyph: char,
    /// Spawn cell chosen at admission.
    pub row: i32,
    pub col: i32,
    /// Taken by the game loop at game start.
    pub connection: Option<C>,
}

/// Admitted players in admission order.
///
/// Generic over the connection type so the roster can hold TCP streams in
/// production and in-memory pipes in tests.
#[derive(Debug)]
pub struct ClientManager<C> {
    /// Admitted players, oldest first.
    clients: Vec<Client<C>>,
    /// Capacity. The acceptor stops admitting once it is reached.
    max_clients: usize,
    /// Board size, used for spawn cells and reported in `handshake_ack`.
    rows: i32,
    cols: i32,
    /// Set once by [`ClientManager::start`]. Later handshakes are rejected.
    started: bool,
}

impl<C> ClientManager<C> {
    /// Creates an empty roster for a board of `rows` x `cols` cells.
    pub fn new(max_clients: usize, rows: i32, cols: i32) -> Self {
        Self {
            clients: Vec::new(),
            max_clients,
            rows,
            cols,
            started: false,
        }
    }

    /// Creates an empty roster wrapped for sharing between tasks.
    ///
    /// Lock it only around the synchronous calls below, never across I/O.
    pub fn shared(max_clients: usize, rows: i32, cols: i32) -> SharedRoster<C> {
        Arc::new(Mutex::new(Self::new(max_clients, rows, cols)))
    }

    /// Checks a handshake against the current roster.
    ///
    /// Returns the parsed glyph on success.
    pub fn validate(&self, name: &str, glyph: &str) -> Result<char, HandshakeRejection> {
        if name.is_empty() || !name.chars().all(char::is_alphanumeric) {
            return Err(HandshakeRejection::NameNotAlphanumeric);
        }

        let lowered = name.to_lowercase();
        if self.clients.iter().any(|c| c.name.to_lowercase() == lowered) {
            return Err(HandshakeRejection::DuplicateName);
        }

        if self.started {
            return Err(HandshakeRejection::GameStarted);
        }

        let mut chars = glyph.chars();
        let glyph = match (chars.next(), chars.next()) {
            (Some(glyph), None) => glyph,
            _ => return Err(HandshakeRejection::InvalidCharacter),
        };

        if glyph.is_control() || glyph.is_whitespace() || BANNED_GLYPHS.contains(&glyph) {
            return Err(HandshakeRejection::BannedCharacter);
        }

        if self.clients.iter().any(|c| c.glyph == glyph) {
            return Err(HandshakeRejection::DuplicateCharacter);
        }

        Ok(glyph)
    }

    /// Validates and admits a player in one step.
    ///
    /// Returns the spawn cell on success. Capacity is the caller's check: a
    /// full roster refuses connections before any handshake is read.
    pub fn admit(
        &mut self,
        name: &str,
        glyph: &str,
        connection: C,
    ) -> Result<(i32, i32), HandshakeRejection> {
        let glyph = self.validate(name, glyph)?;
        let (row, col) = self.spawn_cell();

        info!(
            "Admitted {} '{}' at ({}, {}) [{}/{}]",
            name,
            glyph,
            row,
            col,
            self.clients.len() + 1,
            self.max_clients
        );
        self.clients.push(Client {
            name: name.to_string(),
            glyph,
            row,
            col,
            connection: Some(connection),
        });

        Ok((row, col))
    }

    /// Uniformly random cell, preferring one no other player spawns on.
    fn spawn_cell(&self) -> (i32, i32) {
        let mut rng = rand::thread_rng();
        let mut cell = (0, 0);
        for _ in 0..SPAWN_ATTEMPTS {
            cell = (rng.gen_range(0..self.rows), rng.gen_range(0..self.cols));
            if !self.clients.iter().any(|c| (c.row, c.col) == cell) {
                break;
            }
        }
        cell
    }

    /// Removes a player.
    ///
    /// Called by the game loop on disconnect, so the roster always lists the
    /// players still connected. Returns false if it was already gone.
    pub fn remove(&mut self, name: &str) -> bool {
        match self.clients.iter().position(|c| c.name == name) {
            Some(index) => {
                self.clients.remove(index);
                info!("{} left the roster", name);
                true
            }
            None => false,
        }
    }

    /// Marks the game as started and hands over every connection, in admission order.
    pub fn start(&mut self) -> Vec<(String, C)> {
        self.started = true;
        self.clients
            .iter_mut()
            .filter_map(|c| c.connection.take().map(|conn| (c.name.clone(), conn)))
            .collect()
    }

    /// Whether [`ClientManager::start`] has run.
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Whether the roster has reached capacity.
    ///
    /// The acceptor checks this before reading a handshake and starts the
    /// game when it turns true.
    pub fn is_full(&self) -> bool {
        self.clients.len() >= self.max_clients
    }

    /// Admitted players in admission order.
    pub fn clients(&self) -> &[Client<C>] {
        &self.clients
    }

    /// Board size as `(rows, cols)`.
    pub fn game_size(&self) -> (i32, i32) {
        (self.rows, self.cols)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
