use crate::error::{Result, ServerError};
use std::net::SocketAddr;
use std::time::Duration;

/// Default simulation cadence, about 12 Hz.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(83);

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the acceptor listens on.
    pub bind_addr: SocketAddr,
    /// Roster capacity. Reaching it starts the game.
    pub max_players: usize,
    /// Board height.
    pub rows: i32,
    /// Board width.
    pub cols: i32,
    /// Wall-clock time between simulation ticks.
    pub tick_interval: Duration,
    /// Cadence of heartbeat pings. `None` leaves heartbeats to explicit calls.
    pub heartbeat_interval: Option<Duration>,
    /// End the game as soon as a single player remains.
    pub end_on_last_player: bool,
    /// Seed for the simulation RNG. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 12345)),
            max_players: 10,
            rows: 30,
            cols: 80,
            tick_interval: DEFAULT_TICK_INTERVAL,
            heartbeat_interval: None,
            end_on_last_player: true,
            seed: None,
        }
    }
}

impl ServerConfig {
    pub fn game_size(&self) -> (i32, i32) {
        (self.rows, self.cols)
    }

    /// Rejects settings the roster, board or timers cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.max_players == 0 {
            return Err(ServerError::Config("max_players must be at least 1".into()));
        }
        if self.rows < 1 || self.cols < 1 {
            return Err(ServerError::Config(format!(
                "board must be at least 1x1, got {}x{}",
                self.rows, self.cols
            )));
        }
        if self.tick_interval.is_zero() {
            return Err(ServerError::Config("tick_interval must be non-zero".into()));
        }
        if self.heartbeat_interval.is_some_and(|every| every.is_zero()) {
            return Err(ServerError::Config("heartbeat_interval must be non-zero".into()));
        }
        Ok(())
    }
}
