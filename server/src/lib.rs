//! # Arena Server Library
//!
//! Authoritative server for a real-time multiplayer arena shooter played on a
//! character grid. Clients send key presses; the server owns every position,
//! health value, projectile and powerup, and pushes a snapshot of the board
//! to every player after each tick.
//!
//! ## Architecture
//!
//! ### Two concurrent units
//! The **acceptor** ([`acceptor`]) runs while the server waits for the game to
//! start. It validates each handshake and admits players into the roster
//! ([`client_manager`]). The **game loop** ([`game_loop`]) takes over once the
//! operator starts the game or the roster fills up. The roster is the only
//! state the two share, and it sits behind one mutex.
//!
//! ### Transactions
//! Every exchange after the handshake is a keyed transaction
//! ([`transaction`]): a keypress and its ack, a snapshot push, a heartbeat
//! ping and its pong. The engine resumes the matching handler for each inbound
//! frame and retires a transaction as soon as its handler is done.
//!
//! ### Simulation
//! [`game::GameState`] advances the board one tick at a time: powerup spawns,
//! projectile movement and hits, powerup pickups, deaths and status effects,
//! then the win check. Weapons and projectiles live in [`projectile`],
//! powerups in [`powerup`], players and status effects in [`entity`].
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind(ServerConfig::default()).await?;
//!
//!     // Start as soon as someone presses the button, or when the roster is full
//!     let start = server.start_signal();
//!     tokio::spawn(async move { start.notify_one() });
//!
//!     let outcome = server.run().await?;
//!     println!("winner: {:?}", outcome.winner_name());
//!     Ok(())
//! }
//! ```

pub mod acceptor;
pub mod client_manager;
pub mod config;
pub mod connection;
pub mod entity;
pub mod error;
pub mod game;
pub mod game_loop;
pub mod network;
pub mod powerup;
pub mod projectile;
pub mod transaction;
