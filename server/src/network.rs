//! Server lifecycle: waiting for players, starting the game, running it to the end

use crate::acceptor::Acceptor;
use crate::client_manager::{ClientManager, SharedRoster};
use crate::config::ServerConfig;
use crate::error::Result;
use crate::game::Outcome;
use crate::game_loop::GameLoop;
use log::info;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;

/// Main server coordinating the acceptor and the game loop
///
/// Lifecycle: Waiting (acceptor admits players) → Started (`game_start`
/// sent, tick loop running) → Ended (`endgame` sent, [`Server::run`] returns).
pub struct Server {
    config: ServerConfig,
    listener: TcpListener,
    roster: SharedRoster<TcpStream>,
    roster_full: Arc<Notify>,
    start_signal: Arc<Notify>,
}

impl Server {
    /// Validates the configuration and binds the listening socket.
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        config.validate()?;
        let listener = TcpListener::bind(config.bind_addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        let (rows, cols) = config.game_size();
        let roster = ClientManager::shared(config.max_players, rows, cols);
        Ok(Server {
            config,
            listener,
            roster,
            roster_full: Arc::new(Notify::new()),
            start_signal: Arc::new(Notify::new()),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Handle the operator uses to start the game early.
    ///
    /// `notify_one` before [`Server::run`] reaches the wait is not lost.
    pub fn start_signal(&self) -> Arc<Notify> {
        Arc::clone(&self.start_signal)
    }

    pub fn roster(&self) -> SharedRoster<TcpStream> {
        Arc::clone(&self.roster)
    }

    /// Runs the whole game and returns how it ended.
    pub async fn run(self) -> Result<Outcome> {
        let acceptor = Acceptor::new(
            self.listener,
            Arc::clone(&self.roster),
            Arc::clone(&self.roster_full),
        )
        .spawn();

        tokio::select! {
            _ = self.start_signal.notified() => info!("Start signal received"),
            _ = self.roster_full.notified() => info!("Roster full, starting"),
        }
        acceptor.abort();

        let game_loop = GameLoop::start(self.roster, &self.config).await;
        let outcome = game_loop.run().await?;

        match &outcome {
            Outcome::Winner(name) => info!("{} is the winner", name),
            Outcome::Draw => info!("Nobody survived"),
        }
        Ok(outcome)
    }
}
