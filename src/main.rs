//! Arena Client - headless driver for the platform shooter client core
//!
//! Connects to the game server, then runs the fixed-rate update loop:
//! - scripted patrol input for the local player
//! - flat floor standing in for level collision
//! - session events logged as they happen

use std::time::{Duration, Instant};

use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use arena_client::config::Config;
use arena_client::game::{GameSession, InputFrame, MoveIntent, SessionEvent};
use arena_client::util::time::unix_millis;
use arena_client::ws;

/// Ground height of the stand-in level
const FLOOR_Y: f64 = 600.0;
/// Frames spent walking in one direction before turning around
const PATROL_FRAMES: u64 = 180;
/// Frames between trigger pulls
const FIRE_EVERY_FRAMES: u64 = 45;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    info!("Starting Arena Client");
    info!(server = %config.server_url, char_id = %config.char_id, "Connecting");

    let (link, tasks) = ws::connect(&config.connect_url()).await?;
    let mut session = GameSession::new(&config, link);

    let frame = Duration::from_micros(1_000_000 / u64::from(config.frame_rate));
    let mut ticker = interval(frame);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let mut last = Instant::now();
    let mut frame_no: u64 = 0;
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut shutdown => {
                session.disconnect();
                break;
            }
        }

        let now = Instant::now();
        let dt = now.duration_since(last).as_secs_f64();
        last = now;

        let grounded = session.local_mut().resolve_floor(FLOOR_Y);
        session.tick(&patrol_input(frame_no), grounded, unix_millis(), dt);
        frame_no += 1;

        if !log_events(&mut session) {
            break;
        }
    }

    drop(session);
    tasks.shutdown().await;

    info!("Client shutdown complete");
    Ok(())
}

/// Walk back and forth, jumping at each turn and tapping the trigger
fn patrol_input(frame_no: u64) -> InputFrame {
    let leg = (frame_no / PATROL_FRAMES) % 2;
    let in_leg = frame_no % PATROL_FRAMES;
    InputFrame {
        movement: MoveIntent {
            left: leg == 1,
            right: leg == 0,
            jump: in_leg == 0,
        },
        fire: frame_no % FIRE_EVERY_FRAMES < 2,
        select: None,
    }
}

/// Log queued session events; returns false once the session is over
fn log_events(session: &mut GameSession) -> bool {
    let mut running = true;
    for event in session.drain_events() {
        match event {
            SessionEvent::Welcomed { id } => info!(player_id = id, "Joined room"),
            SessionEvent::RemoteJoined { id, char_id } => {
                info!(remote_id = id, char_id = %char_id, "Player joined")
            }
            SessionEvent::RemoteLeft { id } => info!(remote_id = id, "Player left"),
            SessionEvent::RemoteExpired { id } => {
                warn!(remote_id = id, "Player timed out")
            }
            SessionEvent::LocalDamaged { amount, remaining } => {
                info!(amount, remaining, "Took damage")
            }
            SessionEvent::LocalDied => info!("Died"),
            SessionEvent::LocalRespawned => info!("Respawned"),
            SessionEvent::GameOver { results } => {
                info!(results = %results, "Game over");
                session.disconnect();
                running = false;
            }
            SessionEvent::Disconnected => {
                warn!("Connection closed");
                running = false;
            }
        }
    }
    running
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        }
    }
}
