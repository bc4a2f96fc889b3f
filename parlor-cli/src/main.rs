use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use parlor_core::ParticipantId;
use parlor_session::{MemoryRelay, SilenceSource, VoiceSession, VoiceSessionConfig};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "parlor")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run two voice sessions against an in-process relay and wait for
    /// them to bridge. Exercises signaling, negotiation, and teardown
    /// without any external infrastructure.
    Loopback {
        #[arg(long, default_value = "demo")]
        room: String,

        #[arg(long, default_value_t = 20)]
        timeout_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Loopback { room, timeout_secs } => {
            run_loopback(&room, Duration::from_secs(timeout_secs)).await
        }
    }
}

async fn run_loopback(room: &str, timeout: Duration) -> Result<()> {
    println!("{}", "Starting loopback voice demo...".green().bold());

    let relay = MemoryRelay::new();
    let alice = VoiceSession::new(
        VoiceSessionConfig::new(room, "alice", "Alice"),
        relay.client(),
        Arc::new(SilenceSource),
    )?;
    let bob = VoiceSession::new(
        VoiceSessionConfig::new(room, "bob", "Bob"),
        relay.client(),
        Arc::new(SilenceSource),
    )?;

    alice.join_room().await?;
    println!("  {} joined '{}'", "alice".cyan(), room);
    bob.join_room().await?;
    println!("  {} joined '{}'", "bob".cyan(), room);

    let bridged = tokio::join!(
        wait_bridged(&alice, bob.participant_id(), timeout),
        wait_bridged(&bob, alice.participant_id(), timeout),
    );

    match bridged {
        (true, true) => println!("{}", "Sessions bridged, audio path is up.".green().bold()),
        _ => println!(
            "{}",
            "Timed out waiting for the sessions to bridge.".red().bold()
        ),
    }

    bob.leave_room().await;
    alice.leave_room().await;
    println!("{}", "Both sessions torn down.".green());

    Ok(())
}

async fn wait_bridged(session: &VoiceSession, peer: &ParticipantId, timeout: Duration) -> bool {
    let mut rx = session.watch_state();
    let _ = tokio::time::timeout(timeout, async {
        while !rx.borrow().is_connected_to(peer) {
            if rx.changed().await.is_err() {
                break;
            }
        }
    })
    .await;
    session.state().is_connected_to(peer)
}
