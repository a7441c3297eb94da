//! # Autopilot Example
//!
//! Demonstrates a complete werewolf client lifecycle:
//!
//! 1. Connect to the game server via WebSocket
//! 2. Create and start a game
//! 3. Mirror server events into the local game state
//! 4. Answer every prompt automatically (first valid target, canned speech)
//! 5. Shut down gracefully on game over or Ctrl+C
//!
//! ## Running
//!
//! ```sh
//! # Start the game server on localhost:8000, then:
//! cargo run --example play
//!
//! # Override the server URL:
//! WEREWOLF_SERVER_URL=ws://my-server:8000/ws cargo run --example play
//! ```

use werewolf_client::{
    ActionRequirement, CommandSender, ConnectionConfig, GameState, Session, WebSocketConnector,
};

/// Default server URL when `WEREWOLF_SERVER_URL` is not set.
const DEFAULT_URL: &str = "ws://localhost:8000/ws";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Set `RUST_LOG=werewolf_client=debug` for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let url = std::env::var("WEREWOLF_SERVER_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    tracing::info!("Connecting to {url}");

    // ── Connect ─────────────────────────────────────────────────────
    let mut session = Session::start(WebSocketConnector::new(), ConnectionConfig::new(url));
    session.connect()?;
    session.wait_connected().await?;

    let commands = session.commands();
    commands.create_game("RustPlayer")?;
    commands.start_game()?;

    let mut states = session.state_changes();
    let mut reveals = session.subscribe_seer_results();
    let mut confirmed = false;
    let mut answered: Option<ActionRequirement> = None;

    // ── Event loop ──────────────────────────────────────────────────
    loop {
        tokio::select! {
            changed = states.changed() => {
                if changed.is_err() {
                    tracing::info!("Session closed, exiting");
                    break;
                }
                let state = states.borrow_and_update().clone();
                report(&state);

                if !confirmed && state.human_role.is_some() {
                    commands.confirm_role()?;
                    confirmed = true;
                }

                if state.action_required.is_some() && state.action_required != answered {
                    if let Some(requirement) = &state.action_required {
                        if let Err(e) = answer(&commands, requirement) {
                            tracing::warn!("Could not answer {}: {e}", requirement.kind());
                        }
                    }
                    answered = state.action_required.clone();
                }

                if state.is_over() {
                    tracing::info!("Game over: {:?}", state.result);
                    break;
                }
            }

            reveal = reveals.recv() => {
                if let Ok(reveal) = reveal {
                    tracing::info!(
                        "Seer reveal: {} good={:?}",
                        reveal.target_name.as_deref().unwrap_or("?"),
                        reveal.is_good
                    );
                }
            }

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, shutting down");
                break;
            }
        }
    }

    // ── Shutdown ────────────────────────────────────────────────────
    tracing::info!("{} events received", session.event_count().await);
    session.shutdown().await;
    Ok(())
}

/// Print a one-line summary of the mirrored state.
fn report(state: &GameState) {
    let alive = state.alive_players().count();
    tracing::info!(
        "round {} | {} | {alive}/{} alive | prompt: {}",
        state.round,
        state.phase,
        state.players.len(),
        state
            .action_required
            .as_ref()
            .map_or_else(|| "-".to_owned(), |r| r.kind().to_string())
    );
    if let Some(message) = state.system_messages.last() {
        tracing::info!("  {message}");
    }
}

/// Answer a prompt with the first valid target.
fn answer(
    commands: &CommandSender,
    requirement: &ActionRequirement,
) -> werewolf_client::Result<()> {
    let first = requirement
        .valid_targets()
        .and_then(|targets| targets.iter().next().copied());
    match (requirement, first) {
        (ActionRequirement::WolfKill { .. }, Some(target)) => commands.wolf_kill(target),
        (ActionRequirement::SeerCheck { .. }, Some(target)) => commands.seer_check(target),
        (ActionRequirement::WitchAction { can_save, .. }, _) => {
            commands.witch_action(*can_save, None)
        }
        (ActionRequirement::Vote { .. }, Some(target)) => commands.vote(target),
        (ActionRequirement::HunterShoot { .. }, Some(target)) => commands.hunter_shoot(target),
        (ActionRequirement::Speak { .. }, _) => commands.speak("I have nothing to hide."),
        _ => Ok(()),
    }
}
