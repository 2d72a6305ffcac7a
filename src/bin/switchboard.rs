//! Switchboard Driver Binary
//!
//! Runs a script of connection events against an in-process transport and
//! prints every frame the engine pushes.
//!
//! ## Script commands
//! ```text
//! open <fd>
//! close <fd>
//! send <fd> <frame>
//! token <channel>
//! sleep <ms>
//! ```

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use switchboard::config::JournalSyncStrategy;
use switchboard::{Config, Fd, MemoryTransport, ProtocolVariant, Switchboard};
use tracing_subscriber::{fmt, EnvFilter};

/// Switchboard script driver
#[derive(Parser, Debug)]
#[command(name = "switchboard")]
#[command(about = "Drive the message-routing engine from a script")]
#[command(version)]
struct Args {
    /// Script file; reads stdin when omitted
    script: Option<PathBuf>,

    /// Wire protocol generation
    #[arg(long, value_enum, default_value = "acknowledged")]
    protocol: Protocol,

    /// Deliver broadcasts back to the sender
    #[arg(long)]
    include_self: bool,

    /// Redeliver outbound messages until acknowledged
    #[arg(long)]
    ack: bool,

    /// Redelivery attempts per message
    #[arg(long, default_value = "3")]
    ack_attempts: u32,

    /// Base redelivery delay in seconds
    #[arg(long, default_value = "5")]
    ack_timeout: f64,

    /// Send channel presence updates
    #[arg(long)]
    presence: bool,

    /// Require single-use tokens on channel-connect
    #[arg(long)]
    server_token: Option<String>,

    /// Journal tables under this directory
    #[arg(short, long)]
    journal_dir: Option<PathBuf>,

    /// fsync journals after every write
    #[arg(long)]
    sync_every_write: bool,

    /// Log per-message timing
    #[arg(long)]
    profile: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Protocol {
    Legacy,
    Acknowledged,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,switchboard=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    tracing::info!("Switchboard v{}", switchboard::VERSION);

    let config = match build_config(&args) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };
    let transport = Arc::new(MemoryTransport::new());
    let engine = match Switchboard::open(config, transport.clone()) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!("Failed to open switchboard: {}", e);
            std::process::exit(1);
        }
    };

    let input: Box<dyn BufRead> = match &args.script {
        Some(path) => match File::open(path) {
            Ok(f) => Box::new(BufReader::new(f)),
            Err(e) => {
                tracing::error!("Cannot read {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => Box::new(BufReader::new(io::stdin())),
    };

    for (n, line) in input.lines().enumerate() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                tracing::error!("Read failed: {}", e);
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Err(msg) = run_command(&engine, &transport, &args, line) {
            eprintln!("line {}: {}", n + 1, msg);
        }
        print_sent(&transport);
    }
}

fn build_config(args: &Args) -> switchboard::Result<Config> {
    let mut builder = Config::builder()
        .protocol(match args.protocol {
            Protocol::Legacy => ProtocolVariant::Legacy,
            Protocol::Acknowledged => ProtocolVariant::Acknowledged,
        })
        .include_self_in_broadcast(args.include_self)
        .use_acknowledgment(args.ack)
        .acknowledgment_attempts(args.ack_attempts)
        .acknowledgment_timeout_secs(args.ack_timeout)?
        .use_presence(args.presence)
        .track_profile(args.profile);

    if let Some(token) = &args.server_token {
        builder = builder.server_auth_token(token.clone());
    }
    if let Some(dir) = &args.journal_dir {
        builder = builder.journal_dir(dir.clone());
    }
    if args.sync_every_write {
        builder = builder.journal_sync_strategy(JournalSyncStrategy::EveryWrite);
    }
    Ok(builder.build())
}

fn run_command(
    engine: &Switchboard,
    transport: &MemoryTransport,
    args: &Args,
    line: &str,
) -> Result<(), String> {
    let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();

    match cmd {
        "open" => {
            transport.open(parse_fd(rest)?);
        }
        "close" => {
            let fd = parse_fd(rest)?;
            transport.close(fd);
            engine.close_connection(fd).map_err(|e| e.to_string())?;
        }
        "send" => {
            let (fd, frame) = rest
                .split_once(' ')
                .ok_or_else(|| "usage: send <fd> <frame>".to_string())?;
            // Client-visible faults were already pushed to the sender
            if let Err(e) = engine.handle_frame(parse_fd(fd)?, frame.trim().as_bytes()) {
                tracing::debug!("send failed: {}", e);
            }
        }
        "token" => {
            let server_token = args
                .server_token
                .as_deref()
                .ok_or_else(|| "no --server-token configured".to_string())?;
            let token = engine
                .issue_token(server_token, rest)
                .map_err(|e| e.to_string())?;
            println!("token {}: {}", rest, token);
        }
        "sleep" => {
            let ms: u64 = rest.parse().map_err(|_| format!("bad duration: {}", rest))?;
            thread::sleep(Duration::from_millis(ms));
        }
        other => return Err(format!("unknown command: {}", other)),
    }
    Ok(())
}

fn parse_fd(s: &str) -> Result<Fd, String> {
    s.parse().map_err(|_| format!("bad fd: {}", s))
}

fn print_sent(transport: &MemoryTransport) {
    for (fd, frame) in transport.take_sent() {
        println!("-> fd {}: {}", fd, frame);
    }
}
