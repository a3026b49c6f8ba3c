use std::path::PathBuf;

use clap::Parser;
use glam::IVec2;
use log::{info, warn};
use server::game::GameServer;
use server::net::NetworkServer;
use shared::Level;
use tokio::time::{interval, Duration, MissedTickBehavior};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "12420")]
    port: u16,

    /// Milliseconds between simulation ticks
    #[arg(short, long, default_value = "80")]
    tick_ms: u64,

    /// Level save file
    #[arg(short, long, default_value = "level.bin")]
    level_file: PathBuf,

    /// Chunk side length in cells
    #[arg(short, long, default_value = "16", value_parser = clap::value_parser!(i32).range(1..))]
    chunk_size: i32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let mut level = Level::new(IVec2::splat(args.chunk_size), false);
    if args.level_file.exists() {
        if let Err(err) = level.load(&args.level_file) {
            warn!("Could not load {}: {err}", args.level_file.display());
        }
        // Loading is not a change anyone needs to hear about.
        level.take_events();
    }

    let mut net = NetworkServer::bind(&format!("{}:{}", args.host, args.port)).await?;
    let mut game = GameServer::new(level, args.level_file);

    let mut ticker = interval(Duration::from_millis(args.tick_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!("Server ready, ticking every {} ms", args.tick_ms);

    loop {
        tokio::select! {
            event = net.recv() => {
                match event {
                    Some(event) => game.handle_event(event),
                    None => {
                        warn!("Network task stopped");
                        break;
                    }
                }
            }
            _ = ticker.tick() => {
                game.tick();
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    game.shutdown();
    Ok(())
}
