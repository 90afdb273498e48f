mod synthetic;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use duet_client::{
    CallEvent, CallSession, FacingMode, MediaConstraints, SessionConfig, SignalingLink,
    VideoSource, WebRtcTransportFactory, format_elapsed,
};
use duet_core::{IceServerConfig, RoomId};
use duet_server::ServerConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use synthetic::SyntheticMediaSource;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "duet")]
#[command(version, about = "Two-party video calls over a tiny signaling server")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the signaling server. Flags override DUET_BIND and add to TURN_URL.
    Serve {
        #[arg(long)]
        bind: Option<SocketAddr>,

        #[arg(long)]
        turn_url: Option<String>,

        #[arg(long, requires = "turn_url")]
        turn_username: Option<String>,

        #[arg(long, requires = "turn_url")]
        turn_credential: Option<String>,
    },

    /// Print a fresh room token to share with the other participant.
    Room,

    /// Join a room with synthetic media and print the call's progress.
    Call {
        #[arg(long, default_value = "ws://127.0.0.1:3000/ws")]
        server: String,

        /// Room token; a new one is generated when omitted.
        #[arg(long)]
        room: Option<String>,

        /// Seconds allowed for negotiation to connect.
        #[arg(long, default_value_t = 30)]
        deadline: u64,

        #[arg(long)]
        no_video: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            bind,
            turn_url,
            turn_username,
            turn_credential,
        } => {
            init_tracing();

            let mut config = ServerConfig::from_env()?;
            if let Some(bind) = bind {
                config.bind_addr = bind;
            }
            if let Some(url) = turn_url {
                config.ice_servers.push(IceServerConfig {
                    urls: vec![url],
                    username: turn_username,
                    credential: turn_credential,
                });
            }

            println!("{}", "🚀 Starting duet signaling server...".green().bold());
            println!("   📡 ws://{}/ws", config.bind_addr);
            duet_server::serve(config).await?;
        }

        Commands::Room => {
            println!("{}", RoomId::generate().as_str().cyan().bold());
        }

        Commands::Call {
            server,
            room,
            deadline,
            no_video,
        } => {
            init_tracing();
            run_call(&server, room, deadline, no_video).await?;
        }
    }

    Ok(())
}

async fn run_call(server: &str, room: Option<String>, deadline: u64, no_video: bool) -> Result<()> {
    let room_id = room
        .map(|token| RoomId::parse(&token))
        .transpose()
        .context("Invalid room token")?;

    let link = SignalingLink::connect(server).await?;
    let config = SessionConfig {
        negotiation_deadline: Duration::from_secs(deadline),
        constraints: MediaConstraints {
            audio: true,
            video: (!no_video).then_some(VideoSource::Camera(FacingMode::User)),
        },
        ..Default::default()
    };

    let (session, handle, mut events) = CallSession::new(
        room_id,
        config,
        link,
        Arc::new(SyntheticMediaSource::default()),
        Arc::new(WebRtcTransportFactory),
    );
    println!(
        "{} {}",
        "📞 Joining room".green().bold(),
        session.room_id().as_str().cyan().bold()
    );
    let task = session.spawn();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => {
                    if print_event(&event) {
                        break;
                    }
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                println!("{}", "Hanging up...".yellow());
                handle.hangup().await;
            }
        }
    }

    let state = task.await.context("Call session panicked")?;
    tracing::debug!("Call session returned {}", state);
    Ok(())
}

/// Returns true once the call is over.
fn print_event(event: &CallEvent) -> bool {
    match event {
        CallEvent::Joined { role, peer_present } => {
            let peer = if *peer_present {
                "peer is here"
            } else {
                "waiting for peer"
            };
            println!("{} as {} ({})", "Joined".green(), role, peer);
        }
        CallEvent::PeerJoined => println!("{}", "Peer joined".green()),
        CallEvent::StateChanged(state) => println!("   {} {}", "state".dimmed(), state),
        CallEvent::Connected => println!("{}", "✨ Connected".green().bold()),
        CallEvent::PeerLeft => println!("{}", "Peer left".yellow()),
        CallEvent::RoomFull => println!("{}", "Room is full".red().bold()),
        CallEvent::Error(kind) => println!("{} {}", "Error:".red().bold(), kind),
        CallEvent::ElapsedTick(seconds) => println!("   ⏱  {}", format_elapsed(*seconds).cyan()),
        CallEvent::Ended { state, elapsed } => {
            match elapsed {
                Some(elapsed) => println!(
                    "Call {} after {}",
                    state,
                    format_elapsed(elapsed.as_secs())
                ),
                None => println!("Call {}", state),
            }
            return true;
        }
    }
    false
}
