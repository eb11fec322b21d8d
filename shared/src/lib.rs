//! Wire protocol shared by the arena server and its clients
//!
//! Messages travel as length-prefixed JSON documents (see [`framing`]). The
//! `type` field discriminates the message; every message that belongs to a
//! transaction also carries `tid`, the `[sequence, originator]` pair naming it.

pub mod framing;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub use framing::{decode, encode, read_frame, write_frame, FramingError};

/// Originator name used for transactions the server starts.
pub const SERVER_ORIGINATOR: &str = "server";

/// Key codes a client may send in a `keypress`.
///
/// Movement uses WASD, firing uses the curses arrow-key codes.
pub mod keys {
    pub const MOVE_UP: i32 = 119; // 'w'
    pub const MOVE_DOWN: i32 = 115; // 's'
    pub const MOVE_LEFT: i32 = 97; // 'a'
    pub const MOVE_RIGHT: i32 = 100; // 'd'
    pub const FIRE_DOWN: i32 = 258;
    pub const FIRE_UP: i32 = 259;
    pub const FIRE_LEFT: i32 = 260;
    pub const FIRE_RIGHT: i32 = 261;

    pub const ALL: [i32; 8] = [
        MOVE_UP, MOVE_DOWN, MOVE_LEFT, MOVE_RIGHT, FIRE_DOWN, FIRE_UP, FIRE_LEFT, FIRE_RIGHT,
    ];
}

/// Composite transaction key: a sequence number and the identity that started the exchange.
///
/// Serializes as the JSON array `[sequence, originator]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionKey(pub u64, pub String);

impl TransactionKey {
    pub fn new(sequence: u64, originator: impl Into<String>) -> Self {
        Self(sequence, originator.into())
    }

    pub fn sequence(&self) -> u64 {
        self.0
    }

    pub fn originator(&self) -> &str {
        &self.1
    }
}

impl fmt::Display for TransactionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.0, self.1)
    }
}

/// One drawable board cell: `[row, col, glyph, color]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell(pub i32, pub i32, pub char, pub u8);

/// Every message exchanged between server and client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    Handshake {
        player_name: String,
        player_character: String,
    },
    HandshakeAck {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fail_reason: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        game_size: Option<(i32, i32)>,
    },
    GameStart,
    Keypress {
        key: i32,
        tid: TransactionKey,
    },
    KeypressAck {
        tid: TransactionKey,
    },
    GameState {
        game_state: Vec<Cell>,
        players_health: BTreeMap<String, i32>,
        status: String,
        tid: TransactionKey,
    },
    Endgame {
        winner: String,
        tid: TransactionKey,
    },
    UnknownMessage {
        tid: TransactionKey,
    },
    Ping {
        tid: TransactionKey,
    },
    Pong {
        tid: TransactionKey,
    },
}

impl Message {
    /// The wire name of this message's `type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Handshake { .. } => "handshake",
            Message::HandshakeAck { .. } => "handshake_ack",
            Message::GameStart => "game_start",
            Message::Keypress { .. } => "keypress",
            Message::KeypressAck { .. } => "keypress_ack",
            Message::GameState { .. } => "game_state",
            Message::Endgame { .. } => "endgame",
            Message::UnknownMessage { .. } => "unknown_message",
            Message::Ping { .. } => "ping",
            Message::Pong { .. } => "pong",
        }
    }

    /// The transaction this message belongs to, if it is transaction-scoped.
    pub fn tid(&self) -> Option<&TransactionKey> {
        match self {
            Message::Handshake { .. } | Message::HandshakeAck { .. } | Message::GameStart => None,
            Message::Keypress { tid, .. }
            | Message::KeypressAck { tid }
            | Message::GameState { tid, .. }
            | Message::Endgame { tid, .. }
            | Message::UnknownMessage { tid }
            | Message::Ping { tid }
            | Message::Pong { tid } => Some(tid),
        }
    }

    pub fn handshake_accepted(rows: i32, cols: i32) -> Self {
        Message::HandshakeAck {
            success: true,
            fail_reason: None,
            game_size: Some((rows, cols)),
        }
    }

    pub fn handshake_rejected(reason: impl Into<String>) -> Self {
        Message::HandshakeAck {
            success: false,
            fail_reason: Some(reason.into()),
            game_size: None,
        }
    }
}

/// Routing header read from an inbound frame before its full type is known.
///
/// Frames whose `type` the receiver does not understand still carry a
/// routable `tid`, so the envelope is parsed separately from [`Message`].
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub tid: TransactionKey,
}
