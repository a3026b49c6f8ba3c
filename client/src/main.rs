use std::time::Duration;

use clap::Parser;
use client::game::GameClient;
use client::net::Connection;
use glam::IVec2;
use log::info;
use shared::{LevelObject, Movable, ObjectKind};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{interval, MissedTickBehavior};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:12420")]
    server: String,

    /// Account name: lowercase letters, digits, _ and -
    #[arg(short, long)]
    username: String,

    /// Name shown to other players (defaults to the username)
    #[arg(short, long)]
    display_name: Option<String>,

    /// Message processing budget per frame in milliseconds
    #[arg(long, default_value = "10")]
    pump_budget_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let display_name = args
        .display_name
        .clone()
        .unwrap_or_else(|| args.username.clone());

    info!("Connecting to {} as {}", args.server, args.username);
    let conn = Connection::connect(&args.server, &args.username, &display_name).await?;
    let mut client = GameClient::new(conn, args.username.clone());

    println!("Type :help for commands, anything else to chat");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = interval(Duration::from_millis(80));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let budget = Duration::from_millis(args.pump_budget_ms);
    let mut printed = 0u64;
    let mut announced = false;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                client.process_messages(budget);
                client.update();
                if !announced && client.joined() {
                    announced = true;
                    println!("Joined as {}", args.username);
                }
                print_new_messages(&client, &mut printed);
                if let Some(reason) = client.disconnected() {
                    println!("Disconnected: {reason}");
                    return Ok(());
                }
            }
            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        if !handle_line(&mut client, line.trim()) {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    client.disconnect("Player left");
    // Give the writer task a moment to get the goodbye out.
    tokio::time::sleep(Duration::from_millis(50)).await;
    Ok(())
}

fn print_new_messages(client: &GameClient, printed: &mut u64) {
    let total = client.messages_total();
    if total == *printed {
        return;
    }
    let new = (total - *printed) as usize;
    let kept = client.messages().count();
    for line in client.messages().skip(kept.saturating_sub(new)) {
        println!("{line}");
    }
    *printed = total;
}

/// Run one console line. Returns false when the player wants out.
fn handle_line(client: &mut GameClient, line: &str) -> bool {
    if line.is_empty() {
        return true;
    }
    let Some(command) = line.strip_prefix(':') else {
        client.send_chat(line);
        return true;
    };
    let parts: Vec<&str> = command.split_whitespace().collect();
    match parts.first().copied() {
        Some("help") => {
            println!(":move <dx> <dy>        hold a movement direction");
            println!(":stop                  stop moving");
            println!(":place <kind> <x> <y>  place an object");
            println!("                       kinds: floor wall box ice grass bomb message light");
            println!(":dig <x> <y>           remove the top object at a cell");
            println!(":players               list players");
            println!(":quit                  leave");
            println!("Anything else is chat; lines starting with / run as server commands");
        }
        Some("move") => match parse_two(&parts[1..]) {
            Some((dx, dy)) => client.set_move_intent(IVec2::new(dx, dy)),
            None => println!("Usage: :move <dx> <dy>"),
        },
        Some("stop") => client.set_move_intent(IVec2::ZERO),
        Some("place") => match parts.get(1).copied().zip(parse_two(&parts[2..])) {
            Some((kind, (x, y))) => match object_for(kind, IVec2::new(x, y)) {
                Some(object) => client.place_object(&object),
                None => println!("Unknown kind {kind}"),
            },
            None => println!("Usage: :place <kind> <x> <y>"),
        },
        Some("dig") => match parse_two(&parts[1..]) {
            Some((x, y)) => {
                if !client.dig_at(IVec2::new(x, y)) {
                    println!("Nothing there");
                }
            }
            None => println!("Usage: :dig <x> <y>"),
        },
        Some("players") => {
            for name in client.player_names() {
                println!("{name}");
            }
        }
        Some("quit") => return false,
        _ => println!("Unknown command, try :help"),
    }
    true
}

fn parse_two(args: &[&str]) -> Option<(i32, i32)> {
    let x = args.first()?.parse().ok()?;
    let y = args.get(1)?.parse().ok()?;
    Some((x, y))
}

fn object_for(kind: &str, position: IVec2) -> Option<LevelObject> {
    let kind = match kind {
        "floor" => ObjectKind::Floor,
        "wall" => ObjectKind::Wall(Movable::default()),
        "box" => ObjectKind::BoxBlock(Movable::default()),
        "ice" => ObjectKind::Ice,
        "grass" => ObjectKind::Grass,
        "bomb" => ObjectKind::Bomb,
        "message" => ObjectKind::Message,
        "light" => ObjectKind::Light {
            color: [1.0, 1.0, 1.0],
        },
        _ => return None,
    };
    Some(LevelObject::new(position, kind))
}
