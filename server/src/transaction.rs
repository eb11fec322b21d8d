//! Keyed, resumable request/response exchanges multiplexed over one connection
//!
//! Each exchange is a [`Transaction`]: a key, the frames received for it so far,
//! and a [`Handler`] state machine. The [`TransactionEngine`] owns the table of
//! live transactions and the sequence counter for keys the server allocates.
//!
//! A handler is resumed once per event. It answers with a [`Step`]: either a
//! message to send while waiting for the peer, a final message (or none) that
//! retires the transaction, or a verdict that the peer is dead.

use crate::game::{GameState, Outcome, Snapshot};
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::Value;
use shared::{Envelope, Message, TransactionKey, SERVER_ORIGINATOR};
use std::collections::HashMap;
use std::time::Instant;
use thiserror::Error;

/// A frame that cannot be routed to any transaction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("frame has no string `type` field")]
    MissingType,

    #[error("frame has no valid `tid` field")]
    MissingTid,
}

/// What a handler wants done after being resumed.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Send this message and keep the transaction live for the reply.
    Await(Message),
    /// Send the message, if any, and retire the transaction.
    Finish(Option<Message>),
    /// Retire the transaction and drop the peer's connection.
    PeerDead,
}

/// Per-transaction state machine.
#[derive(Debug, Clone)]
pub enum Handler {
    /// Server-initiated liveness check: sends `ping`, expects `pong`.
    Heartbeat { pinged: bool },
    /// Answers a peer's `ping`.
    PongResponder,
    /// Applies a movement or fire intent, then acknowledges it.
    Keypress,
    /// Server-initiated state push.
    Snapshot(Snapshot),
    /// Server-initiated end-of-game push.
    Endgame(String),
    /// Fallback for message types without a handler.
    Unknown,
}

impl Handler {
    /// Handler for a peer-initiated exchange of the given type.
    pub fn for_type(kind: &str) -> Self {
        match kind {
            "ping" => Handler::PongResponder,
            "keypress" => Handler::Keypress,
            _ => Handler::Unknown,
        }
    }

    pub fn endgame(outcome: &Outcome) -> Self {
        Handler::Endgame(outcome.winner_name().to_string())
    }

    fn resume(&mut self, key: &TransactionKey, history: &[Value], ctx: &mut Context<'_>) -> Step {
        let tid = key.clone();
        match self {
            Handler::Heartbeat { pinged } if !*pinged => {
                *pinged = true;
                Step::Await(Message::Ping { tid })
            }
            Handler::Heartbeat { .. } => match history.last().and_then(frame_kind) {
                Some("pong") => {
                    info!("{} is alive", ctx.peer);
                    Step::Finish(None)
                }
                other => {
                    warn!("{} answered heartbeat with {:?}; treating as dead", ctx.peer, other);
                    Step::PeerDead
                }
            },
            Handler::PongResponder => Step::Finish(Some(Message::Pong { tid })),
            Handler::Keypress => {
                match history.last().map(|frame| Message::deserialize(frame)) {
                    Some(Ok(Message::Keypress { key, .. })) => {
                        if let Some(board) = ctx.board.as_deref_mut() {
                            board.player_action(ctx.peer, key, ctx.now);
                        }
                    }
                    _ => debug!("Ignoring malformed keypress from {}", ctx.peer),
                }
                Step::Finish(Some(Message::KeypressAck { tid }))
            }
            Handler::Snapshot(snapshot) => Step::Finish(Some(Message::GameState {
                game_state: std::mem::take(&mut snapshot.cells),
                players_health: std::mem::take(&mut snapshot.health),
                status: std::mem::take(&mut snapshot.status),
                tid,
            })),
            Handler::Endgame(winner) => Step::Finish(Some(Message::Endgame {
                winner: std::mem::take(winner),
                tid,
            })),
            Handler::Unknown => Step::Finish(Some(Message::UnknownMessage { tid })),
        }
    }
}

fn frame_kind(frame: &Value) -> Option<&str> {
    frame.get("type").and_then(Value::as_str)
}

/// State handed to a handler while it runs.
struct Context<'a> {
    peer: &'a str,
    board: Option<&'a mut GameState>,
    now: Instant,
}

/// One live exchange.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub key: TransactionKey,
    /// Player on the other end of the exchange.
    pub peer: String,
    pub history: Vec<Value>,
    handler: Handler,
}

/// Outcome of routing one inbound frame.
#[derive(Debug, Default, PartialEq)]
pub struct Dispatch {
    pub reply: Option<Message>,
    /// The peer failed a liveness check and should be disconnected.
    pub peer_dead: bool,
}

#[derive(Debug, Default)]
pub struct TransactionEngine {
    next_seq: u64,
    table: HashMap<TransactionKey, Transaction>,
}

impl TransactionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with a given sequence number, e.g. to keep keys distinct across restarts of a test.
    pub fn with_first_sequence(first: u64) -> Self {
        Self {
            next_seq: first,
            table: HashMap::new(),
        }
    }

    fn allocate_key(&mut self) -> TransactionKey {
        let key = TransactionKey::new(self.next_seq, SERVER_ORIGINATOR);
        self.next_seq += 1;
        key
    }

    /// Starts a server-initiated exchange with `peer` and returns its first message.
    pub fn begin(&mut self, peer: &str, handler: Handler) -> (TransactionKey, Option<Message>) {
        let key = self.allocate_key();
        let mut transaction = Transaction {
            key: key.clone(),
            peer: peer.to_string(),
            history: Vec::new(),
            handler,
        };

        let mut ctx = Context {
            peer,
            board: None,
            now: Instant::now(),
        };
        let step = transaction
            .handler
            .resume(&key, &transaction.history, &mut ctx);

        let message = match step {
            Step::Await(message) => {
                self.table.insert(key.clone(), transaction);
                Some(message)
            }
            Step::Finish(message) => message,
            Step::PeerDead => None,
        };
        (key, message)
    }

    /// Routes one inbound frame from `peer`.
    ///
    /// A frame for a live key owned by `peer` resumes that transaction. Any
    /// other frame opens a new transaction under the echoed key, with the
    /// handler its type maps to.
    pub fn on_frame(
        &mut self,
        peer: &str,
        frame: Value,
        board: &mut GameState,
        now: Instant,
    ) -> Result<Dispatch, ProtocolError> {
        let kind = frame_kind(&frame).ok_or(ProtocolError::MissingType)?;
        let envelope = Envelope::deserialize(&frame).map_err(|_| ProtocolError::MissingTid)?;
        let key = envelope.tid;

        let mut transaction = match self.table.remove(&key) {
            Some(live) if live.peer == peer => live,
            foreign => {
                if let Some(live) = foreign {
                    debug!("{} sent a frame on {} owned by {}", peer, key, live.peer);
                    self.table.insert(key.clone(), live);
                    return Ok(Dispatch {
                        reply: Some(Message::UnknownMessage { tid: key }),
                        peer_dead: false,
                    });
                }
                let handler = Handler::for_type(kind);
                if matches!(handler, Handler::Unknown) {
                    warn!("Unknown message type '{}' from {}", kind, peer);
                }
                Transaction {
                    key: key.clone(),
                    peer: peer.to_string(),
                    history: Vec::new(),
                    handler,
                }
            }
        };

        transaction.history.push(frame);
        let mut ctx = Context {
            peer,
            board: Some(board),
            now,
        };
        let step = transaction
            .handler
            .resume(&key, &transaction.history, &mut ctx);

        let dispatch = match step {
            Step::Await(message) => {
                self.table.insert(key, transaction);
                Dispatch {
                    reply: Some(message),
                    peer_dead: false,
                }
            }
            Step::Finish(reply) => Dispatch {
                reply,
                peer_dead: false,
            },
            Step::PeerDead => Dispatch {
                reply: None,
                peer_dead: true,
            },
        };
        Ok(dispatch)
    }

    /// Drops every live transaction with `peer`, e.g. after it disconnects.
    pub fn forget_peer(&mut self, peer: &str) {
        self.table.retain(|_, transaction| transaction.peer != peer);
    }

    pub fn is_live(&self, key: &TransactionKey) -> bool {
        self.table.contains_key(key)
    }

    pub fn live_count(&self) -> usize {
        self.table.len()
    }
}
