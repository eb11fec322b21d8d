//! Headless bot for play-testing the server
//!
//! Joins with the given name and glyph, answers pings, mashes random keys at a
//! fixed rate and logs the status line until the game ends.

use clap::Parser;
use log::{debug, info, warn};
use rand::seq::SliceRandom;
use shared::{keys, read_frame, write_frame, FramingError, Message, TransactionKey};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:12345")]
    server: String,

    /// Player name (alphanumeric)
    #[arg(short = 'n', long, default_value = "bot")]
    name: String,

    /// Single character drawn for this player
    #[arg(short = 'g', long, default_value = "B")]
    glyph: String,

    /// Random keys sent per second
    #[arg(short = 'k', long, default_value = "8", value_parser = clap::value_parser!(u64).range(1..=1000))]
    keys_per_sec: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let mut stream = TcpStream::connect(&args.server).await?;
    info!("Connected to {}", args.server);

    let handshake = Message::Handshake {
        player_name: args.name.clone(),
        player_character: args.glyph.clone(),
    };
    write_frame(&mut stream, &handshake).await?;

    match read_frame::<_, Message>(&mut stream).await? {
        Message::HandshakeAck {
            success: true,
            game_size,
            ..
        } => info!("Joined as {} on a {:?} board", args.name, game_size),
        Message::HandshakeAck { fail_reason, .. } => {
            println!("Rejected: {}", fail_reason.unwrap_or_default());
            return Ok(());
        }
        other => {
            println!("Unexpected reply to handshake: {}", other.kind());
            return Ok(());
        }
    }

    let (mut reader, mut writer) = stream.into_split();
    let (inbox_tx, mut inbox) = mpsc::unbounded_channel::<Result<Message, FramingError>>();

    tokio::spawn(async move {
        loop {
            let result = read_frame::<_, Message>(&mut reader).await;
            let failed = result.is_err();
            if inbox_tx.send(result).is_err() || failed {
                break;
            }
        }
    });

    let mut ticker = interval(Duration::from_millis(1000 / args.keys_per_sec));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut started = false;
    let mut sequence = 0u64;
    let mut last_status = String::new();

    loop {
        tokio::select! {
            incoming = inbox.recv() => {
                let message = match incoming {
                    Some(Ok(message)) => message,
                    Some(Err(e)) => {
                        warn!("Connection lost: {}", e);
                        break;
                    }
                    None => break,
                };

                match message {
                    Message::GameStart => {
                        info!("Game started");
                        started = true;
                    }
                    Message::GameState { status, players_health, .. } => {
                        if status != last_status {
                            info!("{} | {:?}", status, players_health);
                            last_status = status;
                        }
                    }
                    Message::Ping { tid } => {
                        write_frame(&mut writer, &Message::Pong { tid }).await?;
                    }
                    Message::Endgame { winner, .. } => {
                        match winner.as_str() {
                            "" => println!("Game over: nobody survived"),
                            name => println!("Game over: {} won", name),
                        }
                        break;
                    }
                    other => debug!("Received {}", other.kind()),
                }
            },

            _ = ticker.tick(), if started => {
                let Some(&key) = keys::ALL.choose(&mut rand::thread_rng()) else {
                    continue;
                };
                let keypress = Message::Keypress {
                    key,
                    tid: TransactionKey::new(sequence, args.name.clone()),
                };
                sequence += 1;
                write_frame(&mut writer, &keypress).await?;
            },
        }
    }

    Ok(())
}
