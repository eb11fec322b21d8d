//! Game loop: ties simulation ticks to protocol I/O for every player
//!
//! The loop owns the board, the transaction engine and every connection's
//! write half. Each connection's read half runs in its own task that decodes
//! frames and forwards them over an unbounded channel, so the loop only ever
//! waits in one place: a `select!` over that inbox, the tick interval and the
//! optional heartbeat interval.

use crate::client_manager::SharedRoster;
use crate::config::ServerConfig;
use crate::connection::Connection;
use crate::error::{Result, ServerError};
use crate::game::{GameState, Outcome};
use crate::transaction::{Handler, TransactionEngine};
use log::{debug, info, warn};
use serde_json::Value;
use shared::{read_frame, write_frame, Message};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};

/// Ticks a single write may take before the player counts as gone.
const WRITE_TIMEOUT_TICKS: u32 = 4;
/// Lower bound on the write timeout for very fast tick rates.
const MIN_WRITE_TIMEOUT: Duration = Duration::from_millis(100);

/// Messages sent from reader tasks to the game loop
#[derive(Debug)]
pub enum ServerMessage {
    FrameReceived { player: String, frame: Value },
    ClientGone { player: String, reason: String },
}

/// A connected player's outbound half.
struct Seat<W> {
    name: String,
    writer: W,
}

pub struct GameLoop<S: Connection> {
    board: GameState,
    engine: TransactionEngine,
    roster: SharedRoster<S>,
    /// Connected players in admission order, spectators included.
    seats: Vec<Seat<S::Writer>>,
    readers: HashMap<String, JoinHandle<()>>,
    tick_interval: Duration,
    heartbeat_interval: Option<Duration>,
    /// Bound on one outbound frame. A player that stops reading is dropped
    /// instead of stalling the tick.
    write_timeout: Duration,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl<S: Connection> GameLoop<S> {
    /// Starts the game: closes the roster, places every player on the board
    /// and sends each of them `game_start`.
    pub async fn start(roster: SharedRoster<S>, config: &ServerConfig) -> Self {
        let (rows, cols) = config.game_size();
        let mut board = GameState::new(rows, cols, config.tick_interval, config.seed);
        board.set_end_on_last_player(config.end_on_last_player);

        let connections = {
            let mut roster = roster.lock().await;
            for client in roster.clients() {
                board.add_player(&client.name, client.glyph, client.row, client.col);
            }
            roster.start()
        };

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let mut game_loop = Self {
            board,
            engine: TransactionEngine::new(),
            roster,
            seats: Vec::with_capacity(connections.len()),
            readers: HashMap::new(),
            tick_interval: config.tick_interval,
            heartbeat_interval: config.heartbeat_interval,
            write_timeout: (config.tick_interval * WRITE_TIMEOUT_TICKS).max(MIN_WRITE_TIMEOUT),
            server_tx,
            server_rx,
        };

        for (name, connection) in connections {
            let (reader, writer) = connection.into_halves();
            game_loop.spawn_reader(name.clone(), reader);
            game_loop.seats.push(Seat { name, writer });
        }

        info!("Game started with {} players", game_loop.seats.len());
        let names: Vec<String> = game_loop.seats.iter().map(|s| s.name.clone()).collect();
        for name in names {
            game_loop.send(&name, Message::GameStart).await;
        }
        game_loop
    }

    /// Spawns the task that decodes frames from one player
    fn spawn_reader(&mut self, player: String, mut reader: S::Reader) {
        let server_tx = self.server_tx.clone();
        let name = player.clone();

        let handle = tokio::spawn(async move {
            loop {
                let message = match read_frame::<_, Value>(&mut reader).await {
                    Ok(frame) => ServerMessage::FrameReceived {
                        player: player.clone(),
                        frame,
                    },
                    Err(e) => ServerMessage::ClientGone {
                        player: player.clone(),
                        reason: e.to_string(),
                    },
                };
                let gone = matches!(message, ServerMessage::ClientGone { .. });

                if server_tx.send(message).is_err() || gone {
                    break;
                }
            }
        });
        self.readers.insert(name, handle);
    }

    pub fn board(&self) -> &GameState {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut GameState {
        &mut self.board
    }

    pub fn engine(&self) -> &TransactionEngine {
        &self.engine
    }

    /// Names of players whose connection is still open.
    pub fn connected(&self) -> Vec<&str> {
        self.seats.iter().map(|s| s.name.as_str()).collect()
    }

    /// Writes one message to a player.
    ///
    /// A failed write, or one that does not finish within the write timeout,
    /// disconnects the player the same way a failed read does.
    async fn send(&mut self, player: &str, message: Message) -> bool {
        let Some(seat) = self.seats.iter_mut().find(|s| s.name == player) else {
            return false;
        };

        match timeout(self.write_timeout, write_frame(&mut seat.writer, &message)).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                self.disconnect(player, &e.to_string()).await;
                false
            }
            Err(_) => {
                self.disconnect(player, "write timed out").await;
                false
            }
        }
    }

    /// Processes one message from a reader task
    pub async fn handle_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::FrameReceived { player, frame } => {
                if !self.seats.iter().any(|s| s.name == player) {
                    return;
                }

                match self
                    .engine
                    .on_frame(&player, frame, &mut self.board, Instant::now())
                {
                    Ok(dispatch) => {
                        if let Some(reply) = dispatch.reply {
                            self.send(&player, reply).await;
                        }
                        if dispatch.peer_dead {
                            self.disconnect(&player, "failed heartbeat").await;
                        }
                    }
                    Err(e) => {
                        let e = ServerError::from(e);
                        self.disconnect(&player, &e.to_string()).await;
                    }
                }
            }
            ServerMessage::ClientGone { player, reason } => {
                self.disconnect(&player, &reason).await;
            }
        }
    }

    /// Drops a player's connection and marks it dead on the board.
    async fn disconnect(&mut self, player: &str, reason: &str) {
        let Some(index) = self.seats.iter().position(|s| s.name == player) else {
            return;
        };
        warn!("{} disconnected: {}", player, reason);

        self.seats.remove(index);
        if let Some(reader) = self.readers.remove(player) {
            reader.abort();
        }
        self.engine.forget_peer(player);
        self.roster.lock().await.remove(player);
        self.board.mark_disconnected(player);
    }

    /// Starts one heartbeat exchange with every connected player.
    pub async fn ping_all(&mut self) {
        let names: Vec<String> = self.seats.iter().map(|s| s.name.clone()).collect();
        for name in names {
            let (key, ping) = self.engine.begin(&name, Handler::Heartbeat { pinged: false });
            debug!("Pinging {} on {}", name, key);
            if let Some(ping) = ping {
                self.send(&name, ping).await;
            }
        }
    }

    /// Runs one simulation tick and pushes the resulting snapshot to everyone.
    ///
    /// When the tick ends the game, every player also receives `endgame` and
    /// the outcome is returned.
    pub async fn tick(&mut self) -> Option<Outcome> {
        let report = self.board.update();

        if self.board.tick % 60 == 0 {
            debug!(
                "Tick {}: {} players, {} projectiles, {} powerups, {} live transactions",
                self.board.tick,
                self.board.players.len(),
                self.board.projectiles.len(),
                self.board.powerups.len(),
                self.engine.live_count()
            );
        }

        let snapshot = self.board.snapshot();
        let names: Vec<String> = self.seats.iter().map(|s| s.name.clone()).collect();
        for name in &names {
            let (_, message) = self.engine.begin(name, Handler::Snapshot(snapshot.clone()));
            if let Some(message) = message {
                self.send(name, message).await;
            }
        }

        let outcome = report.outcome?;
        info!("Game over: {}", self.board.status);

        let names: Vec<String> = self.seats.iter().map(|s| s.name.clone()).collect();
        for name in &names {
            let (_, message) = self.engine.begin(name, Handler::endgame(&outcome));
            if let Some(message) = message {
                self.send(name, message).await;
            }
        }
        Some(outcome)
    }

    /// Services players and advances the board until the game ends.
    pub async fn run(mut self) -> Result<Outcome> {
        let mut ticker = interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // Skip the first tick since it fires immediately
        ticker.tick().await;

        let heartbeat_enabled = self.heartbeat_interval.is_some();
        let mut heartbeat = interval(self.heartbeat_interval.unwrap_or(self.tick_interval));
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Skip);
        heartbeat.tick().await;

        loop {
            tokio::select! {
                Some(message) = self.server_rx.recv() => {
                    self.handle_message(message).await;
                },

                _ = ticker.tick() => {
                    if let Some(outcome) = self.tick().await {
                        self.shutdown();
                        return Ok(outcome);
                    }
                },

                _ = heartbeat.tick(), if heartbeat_enabled => {
                    self.ping_all().await;
                },
            }
        }
    }

    fn shutdown(&mut self) {
        for (_, reader) in self.readers.drain() {
            reader.abort();
        }
        self.seats.clear();
    }
}
