use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use gridward_connection::Connection;
use gridward_session::{
    BotSpawnPattern, ConsoleCommand, NewConnection, NullPersistenceSink, NullScriptHook, TickLoop,
};
use gridward_shared::{Config, ConnectionIdAllocator};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// Server bind IPv4 address.
    #[clap(long)]
    ip: Option<String>,

    /// Server TCP port.
    #[clap(long, default_value = "7777")]
    port: u16,

    /// Tick rate, in ticks per second.
    #[clap(long, default_value = "20")]
    tick_rate: u32,

    /// Chebyshev distance within which a player is visible to another.
    #[clap(long, default_value = "12")]
    view_range: i32,

    /// Minimum time between two accepted moves from the same player, in milliseconds.
    #[clap(long, default_value = "150")]
    move_cooldown_ms: u64,

    /// Map width in tiles.
    #[clap(long, default_value = "256")]
    map_width: i32,

    /// Map height in tiles.
    #[clap(long, default_value = "256")]
    map_height: i32,
}

impl Args {
    fn into_config(self) -> Config {
        Config {
            tick_rate: self.tick_rate,
            view_range: self.view_range,
            move_cooldown: Duration::from_millis(self.move_cooldown_ms),
            map_width: self.map_width,
            map_height: self.map_height,
            ..Config::default()
        }
    }
}

#[tokio::main]
pub async fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .format_target(false)
        .format_timestamp_micros()
        .init();
    let args = Args::parse();

    let ip = match &args.ip {
        Some(addr) => Ipv4Addr::from_str(addr)?,
        None => Ipv4Addr::UNSPECIFIED,
    };
    let port = args.port;
    let config = args.into_config();

    let handle = TickLoop::spawn(config, Box::new(NullScriptHook), Box::new(NullPersistenceSink));

    let listener = TcpListener::bind(SocketAddr::V4(SocketAddrV4::new(ip, port))).await?;
    log::info!("listening on {}", listener.local_addr()?);

    // Both loops observe shutdown through a `Token`, not a cloned `Guard`: a `Guard` cancels the
    // server when it drops, and either loop can end on its own (accept errors out, stdin hits
    // EOF, the operator types `exit`) well before a real server shutdown is requested.
    let accept_cancel = handle.cancel_guard.token();
    let new_connections = handle.new_connections.clone();
    tokio::spawn(accept_loop(listener, accept_cancel, new_connections));

    let console_cancel = handle.cancel_guard.token();
    tokio::spawn(console_loop(console_cancel, handle.console_commands.clone()));

    handle.cancel_guard.cancelled().await;
    log::info!("shutting down");

    Ok(())
}

async fn accept_loop(
    listener: TcpListener,
    cancel: gridward_shared::cancel::Token,
    new_connections: tokio::sync::mpsc::Sender<NewConnection>,
) {
    let mut conn_ids = ConnectionIdAllocator::new();
    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            accepted = listener.accept() => {
                let (stream, addr) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        log::warn!("accept failed: {e}");
                        continue;
                    }
                };
                let conn_id = conn_ids.allocate();
                log::info!("{conn_id}: accepted connection from {addr}");
                let (guard, requests, events) = Connection::spawn(conn_id, stream);
                let new_conn = NewConnection {
                    conn_id,
                    guard,
                    requests,
                    events,
                };
                if new_connections.send(new_conn).await.is_err() {
                    break;
                }
            }
        }
    }
}

/// Reads operator commands from stdin and enqueues them onto the tick loop's console channel.
/// Recognized commands: `stop`, `reload-scripts`, `stats`, `spawn-bots <count> <spread|clustered>`,
/// `remove-bots`, `exit`. `exit` only ends this loop; it does not stop the server.
async fn console_loop(
    cancel: gridward_shared::cancel::Token,
    commands: tokio::sync::mpsc::Sender<ConsoleCommand>,
) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            line = lines.next_line() => {
                let Ok(Some(line)) = line else { break };
                match parse_console_line(&line) {
                    Some(ConsoleLine::Exit) => break,
                    Some(ConsoleLine::Command(cmd)) => {
                        if commands.send(cmd).await.is_err() {
                            break;
                        }
                    }
                    None => log::warn!("unrecognized console command: {line}"),
                }
            }
        }
    }
}

enum ConsoleLine {
    Command(ConsoleCommand),
    Exit,
}

fn parse_console_line(line: &str) -> Option<ConsoleLine> {
    let mut parts = line.split_whitespace();
    match parts.next()? {
        "stop" => Some(ConsoleLine::Command(ConsoleCommand::Stop)),
        "reload-scripts" => Some(ConsoleLine::Command(ConsoleCommand::ReloadScripts)),
        "stats" => Some(ConsoleLine::Command(ConsoleCommand::Stats)),
        "remove-bots" => Some(ConsoleLine::Command(ConsoleCommand::RemoveBots)),
        "exit" => Some(ConsoleLine::Exit),
        "spawn-bots" => {
            let count: usize = parts.next()?.parse().ok()?;
            let pattern = match parts.next()? {
                "spread" => BotSpawnPattern::Spread,
                "clustered" => BotSpawnPattern::Clustered,
                _ => return None,
            };
            Some(ConsoleLine::Command(ConsoleCommand::SpawnBots { count, pattern }))
        }
        _ => None,
    }
}
