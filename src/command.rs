//! Outbound player commands.
//!
//! [`CommandSender`] turns player intents into [`ClientMessage`]s and hands
//! them to the connection. Nothing is queued while disconnected: every method
//! fails fast with [`ClientError::NotConnected`] and the caller decides whether
//! to retry once the connection is back.

use serde_json::{json, Map, Value};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::connection::ConnectionHandle;
use crate::error::{ClientError, Result};
use crate::protocol::{ActionKind, ClientMessage, PlayerId, ROLE_CONFIRMED};
use crate::session::SessionInput;

/// Cloneable sender for the four game commands plus typed action helpers.
///
/// Obtained from [`Session::commands`](crate::session::Session::commands).
#[derive(Debug, Clone)]
pub struct CommandSender {
    connection: ConnectionHandle,
    local: mpsc::UnboundedSender<SessionInput>,
}

impl CommandSender {
    pub(crate) fn new(
        connection: ConnectionHandle,
        local: mpsc::UnboundedSender<SessionInput>,
    ) -> Self {
        Self { connection, local }
    }

    /// Ask the server for a new game with the human seated as `player_name`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] while disconnected.
    pub fn create_game(&self, player_name: impl Into<String>) -> Result<()> {
        self.connection.send(ClientMessage::CreateGame {
            player_name: player_name.into(),
        })
    }

    /// Deal roles and start the created game.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] while disconnected.
    pub fn start_game(&self) -> Result<()> {
        self.connection.send(ClientMessage::StartGame)
    }

    /// Answer the current action requirement.
    ///
    /// The requirement is cleared locally so the prompt disappears without
    /// waiting for the next server event. The clear is queued ahead of the
    /// frame, so a server reply to this very command is always applied after
    /// it. `seer_check` is the exception: its prompt stays up until the
    /// inspection result arrives.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] while disconnected; the local
    /// requirement is left untouched in that case.
    pub fn perform_action(&self, action: &str, data: Map<String, Value>) -> Result<()> {
        if !self.connection.is_connected() {
            warn!(action, "dropping action while not connected");
            return Err(ClientError::NotConnected);
        }
        let keeps_prompt = action
            .parse::<ActionKind>()
            .is_ok_and(ActionKind::is_two_step);
        if !keeps_prompt {
            self.clear_action_required()?;
        }
        self.connection.send(ClientMessage::Action {
            action: action.to_owned(),
            data,
        })
    }

    /// Acknowledge the role card.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] while disconnected.
    pub fn confirm_role(&self) -> Result<()> {
        self.connection.send(ClientMessage::Action {
            action: ROLE_CONFIRMED.to_owned(),
            data: Map::new(),
        })
    }

    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] while disconnected.
    pub fn wolf_kill(&self, target: PlayerId) -> Result<()> {
        self.targeted(ActionKind::WolfKill, target)
    }

    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] while disconnected.
    pub fn seer_check(&self, target: PlayerId) -> Result<()> {
        self.targeted(ActionKind::SeerCheck, target)
    }

    /// Use the antidote on tonight's victim and/or poison `poison_target`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] while disconnected.
    pub fn witch_action(&self, save: bool, poison_target: Option<PlayerId>) -> Result<()> {
        let mut data = Map::new();
        data.insert("save".into(), Value::Bool(save));
        if let Some(target) = poison_target {
            data.insert("poison_target".into(), json!(target));
        }
        self.perform_action(ActionKind::WitchAction.as_str(), data)
    }

    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] while disconnected.
    pub fn speak(&self, content: impl Into<String>) -> Result<()> {
        let mut data = Map::new();
        data.insert("content".into(), Value::String(content.into()));
        self.perform_action(ActionKind::Speak.as_str(), data)
    }

    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] while disconnected.
    pub fn vote(&self, target: PlayerId) -> Result<()> {
        self.targeted(ActionKind::Vote, target)
    }

    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] while disconnected.
    pub fn hunter_shoot(&self, target: PlayerId) -> Result<()> {
        self.targeted(ActionKind::HunterShoot, target)
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    fn targeted(&self, kind: ActionKind, target: PlayerId) -> Result<()> {
        let mut data = Map::new();
        data.insert("target_id".into(), json!(target));
        self.perform_action(kind.as_str(), data)
    }

    fn clear_action_required(&self) -> Result<()> {
        debug!("clearing answered action requirement");
        self.local
            .send(SessionInput::ClearActionRequired)
            .map_err(|_| ClientError::SessionClosed)
    }
}
