//! shm-chat: interactive two-process chat
//!
//! Start two copies, give each the pid printed by the other, then type.
//! Ctrl+D or Ctrl+C in either one ends both.

use clap::Parser;
use shm_chat::input;
use shm_chat::session::await_peer_identity;
use shm_chat::{ChatConfig, NotificationListener, PeerId, Result, Session, Shutdown, SignalNotifier};
use std::io::{self, BufReader, Write};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "shm-chat")]
#[command(about = "Chat with another process over shared memory", long_about = None)]
struct Cli {
    /// Process ID of the other peer (prompted for when omitted)
    #[arg(short, long, value_parser = parse_peer)]
    peer: Option<PeerId>,

    /// Delivery polling interval in milliseconds
    #[arg(long, default_value = "10")]
    poll_interval_ms: u64,
}

impl Cli {
    fn into_config(self) -> ChatConfig {
        ChatConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            peer: self.peer,
            ..ChatConfig::default()
        }
    }
}

fn parse_peer(s: &str) -> std::result::Result<PeerId, String> {
    s.parse::<u32>()
        .ok()
        .and_then(PeerId::new)
        .ok_or_else(|| format!("'{}' is not a valid process ID", s))
}

fn main() {
    env_logger::init();
    let config = Cli::parse().into_config();

    match run(config) {
        Ok(Some(shutdown)) => log::info!("exiting after {:?}", shutdown),
        Ok(None) => log::info!("exiting before a peer was chosen"),
        Err(e) => {
            eprintln!("shm-chat: {}", e);
            std::process::exit(1);
        }
    }
}

fn run(config: ChatConfig) -> Result<Option<Shutdown>> {
    // Signals must be blocked before any other thread is spawned
    let listener = NotificationListener::install()?;

    let local = PeerId::current();
    let mut stdout = io::stdout();
    writeln!(stdout, "This process's ID: {}", local)?;
    stdout.flush()?;

    let max_line = config.region_size.saturating_sub(1).max(1);
    let lines = input::spawn_reader(BufReader::new(io::stdin()), max_line)?;

    let remote = match config.peer {
        Some(peer) => peer,
        None => match await_peer_identity(&lines, listener.receiver(), &mut stdout)? {
            Some(peer) => peer,
            None => return Ok(None),
        },
    };

    let mut session = Session::establish(local, remote, &config, SignalNotifier, stdout)?;
    let shutdown = session.run(&lines, listener.receiver())?;
    Ok(Some(shutdown))
}
