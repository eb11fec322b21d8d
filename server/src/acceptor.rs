//! Connection acceptor: handshake validation and roster admission
//!
//! Runs as its own task while the server waits for the game to start. Each
//! connection is handled to completion (handshake read, validation, ack)
//! before the next `accept`, so a stalled handshake holds up the queue until
//! [`HANDSHAKE_TIMEOUT`] fires.

use crate::client_manager::{HandshakeRejection, SharedRoster};
use crate::connection::Connection;
use crate::error::{Result, ServerError};
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::Value;
use shared::{read_frame, write_frame, Message};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// How long `accept` may block before the start condition is checked again.
pub const ACCEPT_POLL: Duration = Duration::from_secs(1);

/// How long a new connection has to send its handshake.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// What became of one incoming connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Admitted { name: String, row: i32, col: i32 },
    Rejected(HandshakeRejection),
    /// The roster was full; the connection was closed without reading anything.
    Refused,
}

/// Runs one handshake on `stream` and admits it into `roster` on success.
///
/// Rejections are answered with a failed `handshake_ack` and reported as
/// [`Admission::Rejected`]. A first frame that is not a handshake, or none
/// within [`HANDSHAKE_TIMEOUT`], is an error and the stream is dropped.
pub async fn admit_connection<S: Connection>(
    mut stream: S,
    roster: &SharedRoster<S>,
) -> Result<Admission> {
    let (rows, cols) = {
        let roster = roster.lock().await;
        if roster.is_full() {
            return Ok(Admission::Refused);
        }
        roster.game_size()
    };

    let frame: Value = timeout(HANDSHAKE_TIMEOUT, read_frame(&mut stream))
        .await
        .map_err(|_| ServerError::Handshake("no handshake before timeout".to_string()))??;

    let (name, glyph) = match Message::deserialize(&frame) {
        Ok(Message::Handshake {
            player_name,
            player_character,
        }) => (player_name, player_character),
        _ => {
            let kind = frame.get("type").and_then(Value::as_str).unwrap_or("<none>");
            return Err(ServerError::Handshake(format!(
                "expected handshake, got '{}'",
                kind
            )));
        }
    };

    let verdict = roster.lock().await.validate(&name, &glyph);
    if let Err(rejection) = verdict {
        info!("Rejected {}: {}", name, rejection);
        write_frame(&mut stream, &Message::handshake_rejected(rejection.reason())).await?;
        return Ok(Admission::Rejected(rejection));
    }

    write_frame(&mut stream, &Message::handshake_accepted(rows, cols)).await?;

    // The game may have started while the ack was in flight
    let (row, col) = roster.lock().await.admit(&name, &glyph, stream).map_err(|rejection| {
        ServerError::Handshake(format!("{} lost admission: {}", name, rejection))
    })?;

    Ok(Admission::Admitted { name, row, col })
}

/// Accepts TCP connections into the roster until the game starts.
pub struct Acceptor {
    listener: TcpListener,
    roster: SharedRoster<TcpStream>,
    /// Signalled when an admission fills the roster.
    roster_full: Arc<Notify>,
}

impl Acceptor {
    pub fn new(
        listener: TcpListener,
        roster: SharedRoster<TcpStream>,
        roster_full: Arc<Notify>,
    ) -> Self {
        Self {
            listener,
            roster,
            roster_full,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(self) {
        loop {
            if self.roster.lock().await.is_started() {
                debug!("Game started, acceptor exiting");
                break;
            }

            let (stream, addr) = match timeout(ACCEPT_POLL, self.listener.accept()).await {
                Err(_) => continue,
                Ok(Err(e)) => {
                    warn!("Failed to accept connection: {}", e);
                    continue;
                }
                Ok(Ok(accepted)) => accepted,
            };

            match admit_connection(stream, &self.roster).await {
                Ok(Admission::Admitted { name, .. }) => {
                    info!("{} joined from {}", name, addr);
                    if self.roster.lock().await.is_full() {
                        info!("Roster full");
                        self.roster_full.notify_one();
                    }
                }
                Ok(Admission::Rejected(_)) => {}
                Ok(Admission::Refused) => info!("Refused {}: roster full", addr),
                Err(e) => warn!("Dropped connection from {}: {}", addr, e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client_manager::ClientManager;
    use tokio::io::DuplexStream;

    fn roster(capacity: usize) -> SharedRoster<DuplexStream> {
        ClientManager::shared(capacity, 30, 80)
    }

    async fn handshake(
        roster: &SharedRoster<DuplexStream>,
        name: &str,
        glyph: &str,
    ) -> (Result<Admission>, DuplexStream) {
        let (server_end, mut client_end) = tokio::io::duplex(4096);
        let request = Message::Handshake {
            player_name: name.to_string(),
            player_character: glyph.to_string(),
        };
        write_frame(&mut client_end, &request).await.unwrap();

        let admission = admit_connection(server_end, roster).await;
        (admission, client_end)
    }

    #[tokio::test]
    async fn test_accepted_handshake_returns_board_size() {
        let roster = roster(4);
        let (admission, mut client) = handshake(&roster, "bob1", "@").await;

        assert!(matches!(admission.unwrap(), Admission::Admitted { ref name, .. } if name == "bob1"));
        let ack: Message = read_frame(&mut client).await.unwrap();
        assert_eq!(ack, Message::handshake_accepted(30, 80));
        assert_eq!(roster.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_handshake_names_reason() {
        let roster = roster(4);
        let (admission, mut client) = handshake(&roster, "bob 1", "@").await;

        assert_eq!(
            admission.unwrap(),
            Admission::Rejected(HandshakeRejection::NameNotAlphanumeric)
        );
        let ack: Message = read_frame(&mut client).await.unwrap();
        assert_eq!(
            ack,
            Message::handshake_rejected("Invalid player name, must be alphanumeric")
        );
        assert!(roster.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_second_duplicate_is_rejected() {
        let roster = roster(4);
        let (first, _bob) = handshake(&roster, "bob", "@").await;
        assert!(matches!(first.unwrap(), Admission::Admitted { .. }));

        let (second, _other) = handshake(&roster, "Bob", "#").await;
        assert_eq!(second.unwrap(), Admission::Rejected(HandshakeRejection::DuplicateName));

        let (third, _carol) = handshake(&roster, "carol", "@").await;
        assert_eq!(
            third.unwrap(),
            Admission::Rejected(HandshakeRejection::DuplicateCharacter)
        );
    }

    #[tokio::test]
    async fn test_full_roster_refuses_without_reading() {
        let roster = roster(1);
        let (first, _alice) = handshake(&roster, "alice", "@").await;
        assert!(matches!(first.unwrap(), Admission::Admitted { .. }));

        let (second, mut client) = handshake(&roster, "bob", "#").await;
        assert_eq!(second.unwrap(), Admission::Refused);
        // Server end dropped: the client sees the stream close
        assert!(read_frame::<_, Message>(&mut client).await.unwrap_err().is_closed());
    }

    #[tokio::test]
    async fn test_non_handshake_first_frame_closes() {
        let roster = roster(4);
        let (server_end, mut client_end) = tokio::io::duplex(4096);
        write_frame(&mut client_end, &Message::GameStart).await.unwrap();

        let result = admit_connection(server_end, &roster).await;
        assert!(matches!(result, Err(ServerError::Handshake(_))));
        assert!(roster.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_peer_closing_before_handshake_is_framing_error() {
        let roster = roster(4);
        let (server_end, client_end) = tokio::io::duplex(4096);
        drop(client_end);

        let result = admit_connection(server_end, &roster).await;
        assert!(matches!(result, Err(ServerError::Framing(ref e)) if e.is_closed()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_peer_times_out() {
        let roster = roster(4);
        let (server_end, _client_end) = tokio::io::duplex(4096);

        let result = admit_connection(server_end, &roster).await;
        assert!(matches!(result, Err(ServerError::Handshake(_))));
    }
}
