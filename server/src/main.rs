use clap::Parser;
use log::{info, warn};
use server::config::ServerConfig;
use server::network::Server;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// IP address to listen on
    #[arg(long, default_value = "0.0.0.0")]
    ip: IpAddr,

    /// Port to listen on
    #[arg(short, long, default_value = "12345")]
    port: u16,

    /// Roster capacity; the game starts by itself once it is reached
    #[arg(short, long, default_value = "10", value_parser = clap::value_parser!(u16).range(1..))]
    max_players: u16,

    /// Board size as ROWS COLS
    #[arg(long, num_args = 2, value_names = ["ROWS", "COLS"], default_values_t = [30, 80])]
    game_size: Vec<u16>,

    /// Milliseconds between simulation ticks
    #[arg(long, default_value = "83", value_parser = clap::value_parser!(u64).range(1..))]
    tick_ms: u64,

    /// Ping every player this often (seconds); off when omitted
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    heartbeat_secs: Option<u64>,

    /// Seed for the simulation RNG
    #[arg(long)]
    seed: Option<u64>,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        let (rows, cols) = match self.game_size.as_slice() {
            [rows, cols] => (i32::from(*rows).max(1), i32::from(*cols).max(1)),
            _ => (30, 80),
        };

        ServerConfig {
            bind_addr: SocketAddr::new(self.ip, self.port),
            max_players: usize::from(self.max_players),
            rows,
            cols,
            tick_interval: Duration::from_millis(self.tick_ms),
            heartbeat_interval: self.heartbeat_secs.map(Duration::from_secs),
            seed: self.seed,
            ..ServerConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let config = Args::parse().into_config();
    info!(
        "Board {}x{}, up to {} players, tick {:?}",
        config.rows, config.cols, config.max_players, config.tick_interval
    );

    let server = Server::bind(config).await?;

    // Operator start signal: Enter on stdin
    let start = server.start_signal();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        match lines.next_line().await {
            Ok(Some(_)) => start.notify_one(),
            // No terminal attached; wait for the roster to fill
            Ok(None) => info!("stdin closed, game starts when the roster is full"),
            Err(e) => warn!("Failed to read stdin: {}", e),
        }
    });
    println!("Accepting players, press Enter to start the game");

    let outcome = server.run().await?;
    match outcome.winner_name() {
        "" => println!("Nobody survived"),
        winner => println!("{} is the winner!", winner),
    }

    Ok(())
}
