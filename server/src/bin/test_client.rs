//! Headless client for poking a running server by hand.
//!
//! Joins the lobby, prints what the server says and, once a game starts,
//! wanders around dropping the occasional bomb.

use clap::Parser;
use log::{info, warn};
use rand::Rng;
use server::network::{read_packet, write_packet};
use shared::{Direction, Packet};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::interval;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Nickname to join with
    #[arg(short, long, default_value = "tester")]
    nickname: String,

    /// Milliseconds between random inputs while a game runs
    #[arg(long, default_value = "400")]
    input_interval: u64,

    /// Message sent to chat right after joining
    #[arg(long)]
    greeting: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let stream = TcpStream::connect(&args.server).await?;
    stream.set_nodelay(true)?;
    info!("Connected to {}", args.server);

    let (mut reader, mut writer) = stream.into_split();
    let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Packet>();
    let (inbound_tx, mut inbound) = mpsc::unbounded_channel::<Packet>();

    // Reads stay in their own task so a select branch never cuts a frame in half.
    tokio::spawn(async move {
        loop {
            match read_packet(&mut reader).await {
                Ok(Some(packet)) => {
                    if inbound_tx.send(packet).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Read failed: {}", e);
                    break;
                }
            }
        }
    });

    let writer_task = tokio::spawn(async move {
        while let Some(packet) = outbound_rx.recv().await {
            if let Err(e) = write_packet(&mut writer, &packet).await {
                warn!("Send failed: {}", e);
                break;
            }
        }
    });

    outbound.send(Packet::Join {
        nickname: args.nickname.clone(),
    })?;
    if let Some(text) = args.greeting {
        outbound.send(Packet::SendChat { text })?;
    }

    let mut in_game = false;
    let mut held: Option<Direction> = None;
    let mut ticker = interval(Duration::from_millis(args.input_interval.max(1)));

    loop {
        tokio::select! {
            packet = inbound.recv() => {
                match packet {
                    Some(Packet::GameStarted(snapshot)) => {
                        info!("Game started with {} players", snapshot.players.len());
                        in_game = true;
                    }
                    Some(Packet::Diff { tick, changes }) => {
                        info!("Tick {}: {} changes", tick, changes.len());
                    }
                    Some(Packet::GameOver(result)) => {
                        match result.winner {
                            Some(winner) => info!("Game over, {} wins", winner.nickname),
                            None => info!("Game over, nobody survived"),
                        }
                        in_game = false;
                        held = None;
                        outbound.send(Packet::Join {
                            nickname: args.nickname.clone(),
                        })?;
                    }
                    Some(Packet::Disconnected { reason }) => {
                        info!("Disconnected by server: {}", reason);
                        break;
                    }
                    Some(other) => info!("Received {:?}", other),
                    None => {
                        info!("Server closed the connection");
                        break;
                    }
                }
            }

            _ = ticker.tick(), if in_game => {
                let mut rng = rand::thread_rng();
                if let Some(direction) = held.take() {
                    outbound.send(Packet::StopMoving { direction })?;
                }
                let direction = Direction::ALL[rng.gen_range(0..Direction::ALL.len())];
                outbound.send(Packet::StartMoving { direction })?;
                held = Some(direction);
                if rng.gen_bool(0.2) {
                    outbound.send(Packet::PlaceBomb)?;
                }
            }

            _ = tokio::signal::ctrl_c() => {
                outbound.send(Packet::Disconnect)?;
                break;
            }
        }
    }

    drop(outbound);
    writer_task.await?;
    Ok(())
}
