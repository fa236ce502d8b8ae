use clap::Parser;
use log::{error, info};
use server::config::{GameRules, LobbyConfig, ServerConfig};
use server::network::Server;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Simulation ticks per second
    #[arg(short, long, default_value = "60")]
    tick_rate: u32,

    /// Open connections allowed, joined or not
    #[arg(long, default_value = "32")]
    max_connections: usize,

    /// Players needed before the lobby wait timer starts
    #[arg(long, default_value = "2")]
    min_players: usize,

    /// Lobby capacity, at most 4
    #[arg(long, default_value = "4")]
    max_players: usize,

    /// Seconds to wait for more players once the minimum is met
    #[arg(long, default_value = "20")]
    lobby_wait: u64,

    /// Countdown length in seconds
    #[arg(long, default_value = "10")]
    countdown: u64,

    /// Fill empty spawn corners with this many bots
    #[arg(short, long, default_value = "0")]
    bots: usize,

    /// Seed for map generation and power-up drops
    #[arg(long)]
    seed: Option<u64>,

    /// Upper bound for blast radius
    #[arg(long)]
    max_flame: Option<u32>,

    /// Upper bound for simultaneous bombs
    #[arg(long)]
    max_bombs: Option<u32>,

    /// Upper bound for speed in pixels per tick
    #[arg(long)]
    max_speed: Option<f32>,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        let lobby = LobbyConfig {
            min_players: self.min_players,
            max_players: self.max_players,
            wait_time: Duration::from_secs(self.lobby_wait),
            countdown: Duration::from_secs(self.countdown),
        }
        .normalized();

        let rules = GameRules {
            tick_rate: self.tick_rate.max(1),
            seed: self.seed,
            max_flame: self.max_flame,
            max_bombs: self.max_bombs,
            max_speed: self.max_speed,
            ..GameRules::default()
        };

        ServerConfig {
            addr: format!("{}:{}", self.host, self.port),
            max_connections: self.max_connections,
            bots: self.bots,
            lobby,
            rules,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let config = Args::parse().into_config();
    info!(
        "Lobby needs {}-{} players, {} bots, {} Hz",
        config.lobby.min_players, config.lobby.max_players, config.bots, config.rules.tick_rate
    );

    let mut server = Server::new(config).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped with error: {}", e);
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
